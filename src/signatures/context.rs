//! The signing pass.
//!
//! [`SignContext`] copies the source file to the output unchanged, appends
//! the signature objects and closes the update with a new xref table and
//! trailer:
//!
//! ```text
//! [original][EOL?][image?][form?][annotation][catalog][signature][xref][trailer][startxref value][%%EOF]
//! ```
//!
//! The input is read once, front to back. The xref table and trailer of the
//! source are captured while they stream past, so nothing seeks.

use super::catalog::build_catalog;
use super::placeholder::PdfSigner;
use super::types::{SignOptions, SignatureAppearance};
use super::visual::{CatalogData, VisualSignatureBuilder, VisualSignatureData};
use crate::document::{PdfDocument, SourceDocument};
use crate::error::{Error, Result};
use crate::object::ObjectRef;
use crate::writer::{check_rewritable, rewrite_trailer, rewrite_xref, AppendedObject, ObjectAppender};
use crate::xref::XrefInformation;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const COPY_CHUNK: usize = 64 * 1024;

/// What a signing pass wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutcome {
    /// The signature field widget
    pub annotation: ObjectRef,
    /// The replacement catalog
    pub catalog: CatalogData,
    /// The signature dictionary
    pub signature: AppendedObject,
    /// Where the widget was attached
    pub visual: VisualSignatureData,
    /// Offset of the new `xref` keyword
    pub xref_start: u64,
    /// Item count of the new table and the new trailer `/Size`
    pub item_count: u32,
    /// Every object appended, in file order
    pub appended: Vec<AppendedObject>,
    /// Total bytes in the output
    pub output_len: u64,
}

/// Source bytes that the rewriters need.
struct CopiedSource {
    /// `[start_pos, trailer_end_pos)` of the source
    section: Vec<u8>,
    len: u64,
    ends_with_eol: bool,
}

/// One signing pass over a source document.
pub struct SignContext<'a, R: Read, W: Write, D: SourceDocument + ?Sized> {
    input: R,
    output: W,
    doc: &'a D,
    appearance: &'a SignatureAppearance,
    signature_content: Vec<u8>,
}

impl<'a, R: Read, W: Write, D: SourceDocument + ?Sized> SignContext<'a, R, W, D> {
    /// Pass reading the raw file from `input`, parsed as `doc`, into `output`.
    ///
    /// `signature_content` is the body of the signature dictionary object,
    /// usually [`PdfSigner::build_placeholder`].
    pub fn new(
        input: R,
        output: W,
        doc: &'a D,
        appearance: &'a SignatureAppearance,
        signature_content: Vec<u8>,
    ) -> Self {
        Self {
            input,
            output,
            doc,
            appearance,
            signature_content,
        }
    }

    /// Run the pass and hand back the output.
    ///
    /// On error the output holds a partial update and must be discarded.
    pub fn sign(mut self) -> Result<(W, SignOutcome)> {
        let info = self.doc.xref_information().clone();
        check_rewritable(&info)?;

        let source = self.copy_source(&info)?;
        log::info!(
            "Copied {} source bytes; xref at {} with {} items",
            source.len,
            info.start_pos,
            info.item_count
        );

        let builder = VisualSignatureBuilder::new(self.doc, self.appearance);
        let mut catalog_data = CatalogData::default();
        let visual = builder.locate(&mut catalog_data)?;

        let first_id = info.item_count;
        let annotation_id = first_id + builder.appearance_object_count();
        let catalog_id = annotation_id + 1;
        let signature_id = catalog_id + 1;

        let mut appender = ObjectAppender::new(self.output, first_id, source.len);
        if !source.ends_with_eol {
            log::warn!("Source does not end with an end-of-line; adding one");
            appender.write_raw(b"\n")?;
        }

        let annotation = builder.build_visual_signature(&mut appender, &visual, ObjectRef::fresh(signature_id))?;
        let annotation_ref = appender.add_object(&annotation)?;
        expect_id(annotation_id, annotation_ref)?;

        let catalog_ref = appender.add_object(&build_catalog(self.doc, annotation_ref)?)?;
        expect_id(catalog_id, catalog_ref)?;

        let signature_ref = appender.add_object(&self.signature_content)?;
        expect_id(signature_id, signature_ref)?;

        let appended = appender.appended().to_vec();
        let catalog_record = appended[appended.len() - 2];
        let signature_record = appended[appended.len() - 1];
        catalog_data.object_id = catalog_ref.id;
        catalog_data.offset = catalog_record.offset;
        catalog_data.length = catalog_record.length;
        log::debug!("Catalog {} replaced by {}", catalog_data.root_string, catalog_ref);

        let xref_start = rewrite_xref(&mut appender, &info, &source.section, &appended)?;
        let item_count = first_id + appended.len() as u32;

        let table_len = usize::try_from(info.length).map_err(|_| Error::InvalidXref)?;
        let trailer_segment = source.section.get(table_len..).ok_or(Error::InvalidXref)?;
        rewrite_trailer(&mut appender, trailer_segment, catalog_ref, item_count, xref_start)?;

        let output_len = appender.offset();
        let (output, appended) = appender.finish()?;
        log::info!(
            "Signature field {} written; {} objects appended, {} bytes total",
            annotation_ref,
            appended.len(),
            output_len
        );

        Ok((
            output,
            SignOutcome {
                annotation: annotation_ref,
                catalog: catalog_data,
                signature: signature_record,
                visual,
                xref_start,
                item_count,
                appended,
                output_len,
            },
        ))
    }

    /// Copy the whole input to the output, keeping the xref/trailer section.
    fn copy_source(&mut self, info: &XrefInformation) -> Result<CopiedSource> {
        if info.end_pos < info.start_pos || info.trailer_end_pos < info.end_pos {
            return Err(Error::InvalidXref);
        }

        let mut section = Vec::new();
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut pos = 0u64;
        let mut last = None;

        loop {
            let n = match self.input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let chunk = &buf[..n];
            self.output.write_all(chunk)?;

            let chunk_end = pos + n as u64;
            let from = info.start_pos.max(pos);
            let to = info.trailer_end_pos.min(chunk_end);
            if from < to {
                section.extend_from_slice(&chunk[(from - pos) as usize..(to - pos) as usize]);
            }

            last = chunk.last().copied();
            pos = chunk_end;
        }

        if pos < info.trailer_end_pos {
            return Err(Error::InvalidPdf(format!(
                "source is {} bytes but its trailer ends at {}",
                pos, info.trailer_end_pos
            )));
        }

        Ok(CopiedSource {
            section,
            len: pos,
            ends_with_eol: matches!(last, Some(b'\n') | Some(b'\r')),
        })
    }
}

fn expect_id(expected: u32, allocated: ObjectRef) -> Result<()> {
    if allocated.id != expected {
        return Err(Error::ObjectIdMismatch {
            expected,
            allocated: allocated.id,
        });
    }
    Ok(())
}

/// Sign `input` into `output` with a placeholder signature built from `options`.
///
/// ```no_run
/// use pdf_sigstamp::signatures::{sign_file, SignOptions, SignatureAppearance};
///
/// let outcome = sign_file(
///     "contract.pdf",
///     "contract-signed.pdf",
///     &SignatureAppearance::invisible(),
///     SignOptions::default().with_reason("Approved"),
/// )?;
/// println!("signature object at byte {}", outcome.signature.offset);
/// # Ok::<(), pdf_sigstamp::error::Error>(())
/// ```
pub fn sign_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    appearance: &SignatureAppearance,
    options: SignOptions,
) -> Result<SignOutcome> {
    let doc = PdfDocument::open(input.as_ref())?;
    let placeholder = PdfSigner::new(options).build_placeholder();

    let out = BufWriter::new(File::create(output.as_ref())?);
    let (_, outcome) = SignContext::new(doc.data(), out, &doc, appearance, placeholder).sign()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;

    fn simple_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let catalog = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let pages = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
        let page = pdf.len();
        pdf.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f\r\n");
        for offset in [catalog, pages, page] {
            pdf.extend_from_slice(format!("{:010} 00000 n\r\n", offset).as_bytes());
        }
        pdf.extend_from_slice(format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{}\n%%EOF", xref).as_bytes());
        pdf
    }

    #[test]
    fn test_invisible_pass() {
        let pdf = simple_pdf();
        let doc = PdfDocument::from_bytes(pdf.clone()).unwrap();
        let appearance = SignatureAppearance::invisible();

        let (out, outcome) = SignContext::new(pdf.as_slice(), Vec::new(), &doc, &appearance, b"<< /Type /Sig >>".to_vec())
            .sign()
            .unwrap();

        assert_eq!(&out[..pdf.len()], pdf.as_slice());
        assert_eq!(out[pdf.len()], b'\n');
        assert_eq!(outcome.annotation, ObjectRef::fresh(4));
        assert_eq!(outcome.catalog.object_id, 5);
        assert_eq!(outcome.catalog.root_string, "1 0 R");
        assert_eq!(outcome.signature.obj_ref, ObjectRef::fresh(6));
        assert_eq!(outcome.signature.offset, outcome.catalog.offset + outcome.catalog.length);
        assert_eq!(outcome.item_count, 7);
        assert_eq!(outcome.output_len, out.len() as u64);

        let text = String::from_utf8_lossy(&out).into_owned();
        assert!(text.contains("/Size 7 /Root 5 0 R"));
        assert!(text.ends_with(&format!("startxref\n{}\n%%EOF\n", outcome.xref_start)));
    }

    struct StreamXref {
        inner: PdfDocument,
        info: XrefInformation,
    }

    impl SourceDocument for StreamXref {
        fn xref_information(&self) -> &XrefInformation {
            &self.info
        }

        fn trailer(&self) -> &crate::object::Dictionary {
            self.inner.trailer()
        }

        fn resolve(&self, obj_ref: ObjectRef) -> Result<crate::object::Object> {
            self.inner.resolve(obj_ref)
        }
    }

    #[test]
    fn test_xref_stream_is_rejected_before_writing() {
        let pdf = simple_pdf();
        let inner = PdfDocument::from_bytes(pdf.clone()).unwrap();
        let mut info = inner.xref_information().clone();
        info.kind = crate::xref::XrefKind::Stream;
        let doc = StreamXref { inner, info };
        let appearance = SignatureAppearance::invisible();

        let mut out = Vec::new();
        let err = SignContext::new(pdf.as_slice(), &mut out, &doc, &appearance, Vec::new())
            .sign()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedXrefType(_)));
        assert!(out.is_empty());
    }
}
