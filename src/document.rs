//! Source document access.
//!
//! [`SourceDocument`] is everything the signing pass needs from a reader:
//! the latest xref section's positions, the trailer, and object resolution.
//! Page lookup and signature counting are derived from those three.
//!
//! [`PdfDocument`] implements it for files with classic xref tables.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::parse_indirect_object_at;
use crate::xref::{find_xref_offset, parse_xref_section, XrefEntry, XrefInformation, XrefKind};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

/// Maximum nesting of `/Kids` in the page tree
const MAX_PAGE_TREE_DEPTH: u32 = 64;

/// Maximum length of a `/Prev` chain
const MAX_PREV_CHAIN: u32 = 100;

/// Read access to the PDF being signed.
pub trait SourceDocument {
    /// Positions and counts of the latest xref section.
    fn xref_information(&self) -> &XrefInformation;

    /// The latest trailer dictionary.
    fn trailer(&self) -> &Dictionary;

    /// Load an indirect object.
    fn resolve(&self, obj_ref: ObjectRef) -> Result<Object>;

    /// Follow `obj` if it is a reference, otherwise clone it.
    fn resolve_value(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.resolve(*r),
            other => Ok(other.clone()),
        }
    }

    /// Reference to the document catalog from the trailer's `/Root`.
    fn root_ref(&self) -> Result<ObjectRef> {
        let root = self
            .trailer()
            .get("Root")
            .ok_or_else(|| Error::TrailerFieldNotFound("Root".to_string()))?;
        root.as_reference().ok_or_else(|| Error::InvalidObjectType {
            expected: "Reference".to_string(),
            found: root.type_name().to_string(),
        })
    }

    /// The document catalog dictionary.
    fn catalog(&self) -> Result<Dictionary> {
        Ok(self.resolve(self.root_ref()?)?.expect_dict()?.clone())
    }

    /// The interactive form dictionary, if the catalog has one.
    fn acroform(&self) -> Result<Option<Dictionary>> {
        match self.catalog()?.get("AcroForm") {
            Some(value) => Ok(Some(self.resolve_value(value)?.expect_dict()?.clone())),
            None => Ok(None),
        }
    }

    /// All leaf pages in document order.
    fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let catalog = self.catalog()?;
        let pages_ref = match catalog.get("Pages").and_then(Object::as_reference) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        let mut refs = Vec::new();
        let mut visited = HashSet::new();
        collect_pages(self, pages_ref, 0, &mut visited, &mut refs)?;
        Ok(refs)
    }

    /// Reference to the page with 1-based number `page_number`.
    fn page_by_number(&self, page_number: u32) -> Result<ObjectRef> {
        let refs = self.page_refs()?;
        let not_found = || Error::PageNotFound {
            requested: page_number,
            count: refs.len(),
        };

        let index = usize::try_from(page_number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(not_found)?;
        refs.get(index).copied().ok_or_else(not_found)
    }

    /// Number of `/FT /Sig` fields already listed in `/AcroForm /Fields`.
    fn existing_signature_count(&self) -> Result<usize> {
        let acroform = match self.acroform()? {
            Some(form) => form,
            None => return Ok(0),
        };
        let fields = match acroform.get("Fields") {
            Some(value) => self.resolve_value(value)?,
            None => return Ok(0),
        };

        let mut count = 0;
        for field in fields.as_array().map(Vec::as_slice).unwrap_or_default() {
            let field = self.resolve_value(field)?;
            if field.as_dict().and_then(|d| d.get("FT")).and_then(Object::as_name) == Some("Sig") {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn collect_pages<D: SourceDocument + ?Sized>(
    doc: &D,
    node_ref: ObjectRef,
    depth: u32,
    visited: &mut HashSet<ObjectRef>,
    refs: &mut Vec<ObjectRef>,
) -> Result<()> {
    if depth > MAX_PAGE_TREE_DEPTH {
        return Err(Error::RecursionLimitExceeded(MAX_PAGE_TREE_DEPTH));
    }
    if !visited.insert(node_ref) {
        return Err(Error::CircularReference(node_ref));
    }

    let node = doc.resolve(node_ref)?;
    let dict = node.expect_dict()?;
    let kids = dict.get("Kids").and_then(Object::as_array);

    match (dict.get("Type").and_then(Object::as_name), kids) {
        (Some("Page"), _) | (None, None) => refs.push(node_ref),
        (_, Some(kids)) => {
            for kid in kids {
                if let Some(kid_ref) = kid.as_reference() {
                    collect_pages(doc, kid_ref, depth + 1, visited, refs)?;
                }
            }
        },
        (Some(other), None) => log::warn!("Skipping page tree node {} of type /{}", node_ref, other),
    }

    Ok(())
}

/// A PDF file loaded into memory with a classic xref table.
///
/// ```no_run
/// use pdf_sigstamp::document::{PdfDocument, SourceDocument};
///
/// let doc = PdfDocument::open("contract.pdf")?;
/// println!("{} objects, {} signatures", doc.xref_information().item_count, doc.existing_signature_count()?);
/// # Ok::<(), pdf_sigstamp::error::Error>(())
/// ```
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    info: XrefInformation,
    trailer: Dictionary,
    entries: BTreeMap<u32, XrefEntry>,
    object_cache: RefCell<HashMap<ObjectRef, Object>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("xref", &self.info)
            .field("xref_entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Read and index the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Index an in-memory PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing, `startxref` cannot be
    /// found, or the latest xref section cannot be scanned.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;
        let offset = find_xref_offset(&mut Cursor::new(data.as_slice()))?;
        let latest = parse_xref_section(&data, offset)?;

        let mut entries = latest.entries;
        if latest.info.kind == XrefKind::Table {
            merge_previous_sections(&data, &latest.trailer, &mut entries)?;
        }

        log::debug!(
            "Opened PDF {}.{}: {} xref, {} rows",
            version.0,
            version.1,
            latest.info.kind,
            entries.len()
        );

        Ok(Self {
            data,
            version,
            info: latest.info,
            trailer: latest.trailer,
            entries,
            object_cache: RefCell::new(HashMap::new()),
        })
    }

    /// PDF version from the header as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Raw file bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Xref rows of the latest section merged with older `/Prev` sections.
    pub fn xref_entries(&self) -> &BTreeMap<u32, XrefEntry> {
        &self.entries
    }
}

/// Follow `/Prev` links; rows from newer sections win.
fn merge_previous_sections(
    data: &[u8],
    trailer: &Dictionary,
    entries: &mut BTreeMap<u32, XrefEntry>,
) -> Result<()> {
    let mut prev = trailer.get("Prev").and_then(Object::as_integer);
    let mut seen = HashSet::new();

    while let Some(offset) = prev {
        let offset = u64::try_from(offset).map_err(|_| Error::InvalidXref)?;
        if !seen.insert(offset) {
            return Err(Error::InvalidPdf(format!("xref /Prev chain loops at byte {}", offset)));
        }
        if seen.len() as u32 > MAX_PREV_CHAIN {
            return Err(Error::InvalidPdf(format!("xref /Prev chain exceeds {} sections", MAX_PREV_CHAIN)));
        }

        let section = parse_xref_section(data, offset)?;
        if section.info.kind != XrefKind::Table {
            log::warn!("Ignoring /Prev xref stream at byte {}", offset);
            break;
        }
        for (id, entry) in section.entries {
            entries.entry(id).or_insert(entry);
        }
        prev = section.trailer.get("Prev").and_then(Object::as_integer);
    }

    Ok(())
}

/// Parse `%PDF-M.m` within the first KiB.
fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let marker = b"%PDF-";
    let pos = window
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| Error::InvalidPdf("missing %PDF- header".to_string()))?;

    let version = &window[pos + marker.len()..];
    match version {
        [major, b'.', minor, ..] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok((major - b'0', minor - b'0'))
        },
        _ => Err(Error::InvalidPdf("malformed PDF version".to_string())),
    }
}

impl SourceDocument for PdfDocument {
    fn xref_information(&self) -> &XrefInformation {
        &self.info
    }

    fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    fn resolve(&self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.borrow().get(&obj_ref) {
            return Ok(cached.clone());
        }

        let entry = self
            .entries
            .get(&obj_ref.id)
            .filter(|e| e.in_use && e.generation == obj_ref.gen)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;

        let offset = usize::try_from(entry.offset).map_err(|_| Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
        let (found, object) = parse_indirect_object_at(&self.data, offset)?;
        if found != obj_ref {
            return Err(Error::ParseError {
                offset,
                reason: format!("expected object {} but found {}", obj_ref, found),
            });
        }

        log::debug!("Resolved {} at byte {} ({})", obj_ref, offset, object.type_name());
        self.object_cache.borrow_mut().insert(obj_ref, object.clone());
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a classic PDF from object bodies, numbering them from 1.
    fn build_pdf(bodies: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", bodies.len() + 1).as_bytes());
        out.extend_from_slice(&XrefEntry::free(0, 65535).to_bytes().unwrap());
        for offset in offsets {
            out.extend_from_slice(&XrefEntry::in_use(offset as u64).to_bytes().unwrap());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} {}>>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                trailer_extra,
                xref_pos
            )
            .as_bytes(),
        );
        out
    }

    fn two_page_doc() -> PdfDocument {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>",
                "<< /Type /Page /Parent 2 0 R >>",
                "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 4 0 R >>",
            ],
            "/Root 1 0 R ",
        );
        PdfDocument::from_bytes(data).unwrap()
    }

    #[test]
    fn test_open_reads_version_and_xref() {
        let doc = two_page_doc();
        assert_eq!(doc.version(), (1, 7));
        assert_eq!(doc.xref_information().kind, XrefKind::Table);
        assert_eq!(doc.xref_information().item_count, 6);
        assert_eq!(doc.root_ref().unwrap(), ObjectRef::new(1, 0));
    }

    #[test]
    fn test_pages_in_document_order() {
        let doc = two_page_doc();
        assert_eq!(doc.page_refs().unwrap(), vec![ObjectRef::new(3, 0), ObjectRef::new(5, 0)]);
        assert_eq!(doc.page_by_number(2).unwrap(), ObjectRef::new(5, 0));
    }

    #[test]
    fn test_page_number_out_of_range() {
        let doc = two_page_doc();
        assert!(matches!(doc.page_by_number(3), Err(Error::PageNotFound { requested: 3, count: 2 })));
        assert!(matches!(doc.page_by_number(0), Err(Error::PageNotFound { requested: 0, .. })));
    }

    #[test]
    fn test_page_tree_cycle_is_reported() {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] >>",
                "<< /Type /Pages /Kids [2 0 R] >>",
            ],
            "/Root 1 0 R ",
        );
        let doc = PdfDocument::from_bytes(data).unwrap();
        assert!(matches!(doc.page_refs(), Err(Error::CircularReference(_))));
    }

    #[test]
    fn test_missing_root_is_trailer_field_error() {
        let data = build_pdf(&["<< /Type /Catalog >>"], "");
        let doc = PdfDocument::from_bytes(data).unwrap();
        assert!(matches!(doc.root_ref(), Err(Error::TrailerFieldNotFound(ref key)) if key == "Root"));
    }

    #[test]
    fn test_counts_existing_signature_fields() {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [4 0 R 5 0 R 6 0 R] >> >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 2 0 R >>",
                "<< /FT /Sig /T (Signature 1) >>",
                "<< /FT /Tx /T (Name) >>",
                "<< /FT /Sig /T (Signature 2) >>",
            ],
            "/Root 1 0 R ",
        );
        let doc = PdfDocument::from_bytes(data).unwrap();
        assert_eq!(doc.existing_signature_count().unwrap(), 2);
    }

    #[test]
    fn test_no_acroform_means_no_signatures() {
        assert_eq!(two_page_doc().existing_signature_count().unwrap(), 0);
    }

    #[test]
    fn test_resolve_unknown_object() {
        let doc = two_page_doc();
        assert!(matches!(doc.resolve(ObjectRef::new(40, 0)), Err(Error::ObjectNotFound(40, 0))));
    }

    #[test]
    fn test_rejects_missing_header() {
        assert!(matches!(PdfDocument::from_bytes(b"hello".to_vec()), Err(Error::InvalidPdf(_))));
    }
}
