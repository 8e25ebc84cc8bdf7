//! Rewriting the classic xref table for an incremental update.
//!
//! The new table is the old one with a larger item count in its header and
//! one extra row per appended object. Old rows are copied byte for byte.

use crate::error::{Error, Result};
use crate::writer::appender::{AppendedObject, ObjectAppender};
use crate::xref::{parse_table_header, XrefEntry, XrefInformation, XrefKind};
use std::io::Write;

/// Write the extended xref table and return the offset of its `xref` keyword.
///
/// `section` holds the source bytes from `info.start_pos` onwards (at least
/// up to `info.end_pos`). `rows` are the objects appended in this pass in
/// ascending ID order, starting at `info.item_count`.
///
/// # Errors
///
/// - `UnsupportedXrefType` for xref streams and multi-subsection tables
/// - `XrefHeaderMismatch` when the header does not read `xref` EOL `0 <item_count>`
/// - `ObjectIdMismatch` when `rows` do not continue the table contiguously
/// - `OffsetOverflow` when a row offset needs more than 10 digits; nothing is written
pub fn rewrite_xref<W: Write>(
    appender: &mut ObjectAppender<W>,
    info: &XrefInformation,
    section: &[u8],
    rows: &[AppendedObject],
) -> Result<u64> {
    check_rewritable(info)?;

    let table_len = usize::try_from(info.length).map_err(|_| Error::InvalidXref)?;
    let table = section.get(..table_len).ok_or(Error::InvalidXref)?;

    let header = parse_table_header(table)?;
    if header.first != 0 || header.count != info.item_count {
        return Err(Error::XrefHeaderMismatch {
            expected: format!("xref 0 {}", info.item_count),
            found: format!("xref {} {}", header.first, header.count),
        });
    }

    for (i, row) in rows.iter().enumerate() {
        let expected = info.item_count + i as u32;
        if row.obj_ref.id != expected {
            return Err(Error::ObjectIdMismatch {
                expected,
                allocated: row.obj_ref.id,
            });
        }
    }

    let new_rows = rows
        .iter()
        .map(|row| XrefEntry::in_use(row.offset).to_bytes())
        .collect::<Result<Vec<_>>>()?;

    let new_count = info.item_count + rows.len() as u32;
    let xref_start = appender.offset();
    log::info!("Writing xref table at byte {} ({} -> {} rows)", xref_start, info.item_count, new_count);

    appender.write_raw(format!("xref\n0 {}", new_count).as_bytes())?;

    let old_rows = &table[header.header_len..];
    appender.write_raw(old_rows)?;
    if !old_rows.ends_with(b"\n") && !old_rows.ends_with(b"\r") {
        appender.write_raw(b"\n")?;
    }

    for row in &new_rows {
        appender.write_raw(row)?;
    }

    Ok(xref_start)
}

/// Reject layouts this writer cannot extend in place.
pub fn check_rewritable(info: &XrefInformation) -> Result<()> {
    if info.kind != XrefKind::Table {
        return Err(Error::UnsupportedXrefType(info.kind.to_string()));
    }
    if info.subsections != 1 {
        return Err(Error::UnsupportedXrefType(format!("table with {} subsections", info.subsections)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    const SECTION: &[u8] = b"xref\n0 3\n0000000000 65535 f\r\n0000000009 00000 n\r\n0000000058 00000 n\r\ntrailer\n";

    fn info(item_count: u32) -> XrefInformation {
        XrefInformation {
            kind: XrefKind::Table,
            start_pos: 500,
            length: (SECTION.len() - b"trailer\n".len()) as u64,
            end_pos: 500 + (SECTION.len() - b"trailer\n".len()) as u64,
            trailer_end_pos: 0,
            item_count,
            subsections: 1,
        }
    }

    fn row(id: u32, offset: u64, length: u64) -> AppendedObject {
        AppendedObject {
            obj_ref: ObjectRef::fresh(id),
            offset,
            length,
        }
    }

    #[test]
    fn test_rewrites_header_and_appends_rows() {
        let mut appender = ObjectAppender::new(Vec::new(), 5, 800);
        let rows = [row(3, 600, 80), row(4, 680, 120)];

        let xref_start = rewrite_xref(&mut appender, &info(3), SECTION, &rows).unwrap();
        assert_eq!(xref_start, 800);

        let (out, _) = appender.finish().unwrap();
        let expected = b"xref\n0 5\n0000000000 65535 f\r\n0000000009 00000 n\r\n0000000058 00000 n\r\n0000000600 00000 n\r\n0000000680 00000 n\r\n";
        assert_eq!(out, expected.to_vec());
    }

    #[test]
    fn test_rejects_stream_kind() {
        let mut appender = ObjectAppender::new(Vec::new(), 3, 0);
        let mut stream_info = info(3);
        stream_info.kind = XrefKind::Stream;

        let err = rewrite_xref(&mut appender, &stream_info, SECTION, &[]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedXrefType(ref kind) if kind == "stream"));
        assert_eq!(appender.offset(), 0);
    }

    #[test]
    fn test_header_count_must_match_item_count() {
        let mut appender = ObjectAppender::new(Vec::new(), 4, 0);
        let err = rewrite_xref(&mut appender, &info(4), SECTION, &[]).unwrap_err();
        assert!(matches!(err, Error::XrefHeaderMismatch { .. }));
    }

    #[test]
    fn test_rows_must_continue_table() {
        let mut appender = ObjectAppender::new(Vec::new(), 9, 0);
        let err = rewrite_xref(&mut appender, &info(3), SECTION, &[row(9, 10, 10)]).unwrap_err();
        assert!(matches!(err, Error::ObjectIdMismatch { expected: 3, allocated: 9 }));
    }

    #[test]
    fn test_oversized_offset_writes_nothing() {
        let mut appender = ObjectAppender::new(Vec::new(), 3, 0);
        let rows = [row(3, 600, 80), row(4, 10_000_000_000, 120)];

        let err = rewrite_xref(&mut appender, &info(3), SECTION, &rows).unwrap_err();
        assert!(matches!(err, Error::OffsetOverflow(10_000_000_000)));
        assert_eq!(appender.offset(), 0);
    }

    #[test]
    fn test_multi_subsection_rejected() {
        let mut multi = info(3);
        multi.subsections = 2;
        assert!(matches!(check_rewritable(&multi), Err(Error::UnsupportedXrefType(_))));
    }
}
