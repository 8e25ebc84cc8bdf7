//! Appending indirect objects after the original file body.
//!
//! [`ObjectAppender`] owns the output stream and the running byte offset.
//! Every byte of the update goes through it, so the offset it reports is
//! always the position the next byte will land at in the final file.

use crate::error::Result;
use crate::object::ObjectRef;
use std::io::Write;

/// An object written during this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedObject {
    /// Reference of the new object (generation 0)
    pub obj_ref: ObjectRef,
    /// Absolute offset of the `<id> 0 obj` line in the output
    pub offset: u64,
    /// Bytes written, including the `obj`/`endobj` wrapper
    pub length: u64,
}

/// Serializes new indirect objects and tracks where they land.
#[derive(Debug)]
pub struct ObjectAppender<W: Write> {
    out: W,
    next_id: u32,
    offset: u64,
    appended: Vec<AppendedObject>,
}

impl<W: Write> ObjectAppender<W> {
    /// Start appending at byte `offset` of `out`; the first object gets `first_id`.
    pub fn new(out: W, first_id: u32, offset: u64) -> Self {
        Self {
            out,
            next_id: first_id,
            offset,
            appended: Vec::new(),
        }
    }

    /// ID the next [`add_object`](Self::add_object) call will allocate.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Offset the next byte will be written at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Objects written so far, in file order.
    pub fn appended(&self) -> &[AppendedObject] {
        &self.appended
    }

    /// Write `<id> 0 obj\n{content}\nendobj\n` and allocate the next ID.
    pub fn add_object(&mut self, content: &[u8]) -> Result<ObjectRef> {
        let obj_ref = ObjectRef::fresh(self.next_id);
        let start = self.offset;

        let header = format!("{} 0 obj\n", obj_ref.id);
        self.write_raw(header.as_bytes())?;
        self.write_raw(content)?;
        self.write_raw(b"\nendobj\n")?;

        let record = AppendedObject {
            obj_ref,
            offset: start,
            length: self.offset - start,
        };
        log::debug!(
            "Appended object {} at byte {} ({} bytes)",
            obj_ref.id,
            record.offset,
            record.length
        );

        self.appended.push(record);
        self.next_id += 1;
        Ok(obj_ref)
    }

    /// Write bytes that are not an indirect object (xref, trailer).
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Flush and hand back the output with the appended records.
    pub fn finish(mut self) -> Result<(W, Vec<AppendedObject>)> {
        self.out.flush()?;
        Ok((self.out, self.appended))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_object_records_offsets() {
        let mut appender = ObjectAppender::new(Vec::new(), 42, 1000);

        let first = appender.add_object(b"<< /A 1 >>").unwrap();
        let second = appender.add_object(b"null").unwrap();

        assert_eq!(first, ObjectRef::fresh(42));
        assert_eq!(second, ObjectRef::fresh(43));
        assert_eq!(appender.next_id(), 44);

        let records = appender.appended().to_vec();
        assert_eq!(records[0].offset, 1000);
        assert_eq!(records[0].length, b"42 0 obj\n<< /A 1 >>\nendobj\n".len() as u64);
        assert_eq!(records[1].offset, 1000 + records[0].length);

        let (out, appended) = appender.finish().unwrap();
        assert_eq!(appended.len(), 2);
        assert_eq!(out, b"42 0 obj\n<< /A 1 >>\nendobj\n43 0 obj\nnull\nendobj\n".to_vec());
    }

    #[test]
    fn test_raw_writes_advance_offset() {
        let mut appender = ObjectAppender::new(Vec::new(), 1, 10);
        appender.write_raw(b"xref\n").unwrap();
        assert_eq!(appender.offset(), 15);
        assert!(appender.appended().is_empty());
    }

    #[test]
    fn test_io_error_is_surfaced() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut appender = ObjectAppender::new(Broken, 1, 0);
        let err = appender.add_object(b"null").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
        assert_eq!(appender.next_id(), 1);
    }
}
