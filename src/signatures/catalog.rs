//! Replacement document catalog.
//!
//! An incremental update cannot edit the old catalog in place, so a new one
//! is appended and the trailer's `/Root` is pointed at it. It keeps every
//! entry of the old catalog and carries an `/AcroForm` listing the new
//! signature field.

use crate::document::SourceDocument;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::ObjectSerializer;

/// `SignaturesExist | AppendOnly` (ISO 32000-1:2008, Table 219).
pub const SIG_FLAGS: i64 = 3;

/// Serialize the new catalog with `field_ref` added to `/AcroForm /Fields`.
pub fn build_catalog<D: SourceDocument + ?Sized>(doc: &D, field_ref: ObjectRef) -> Result<Vec<u8>> {
    let old = doc.catalog()?;

    let mut catalog: Dictionary = old
        .iter()
        .filter(|(key, _)| key.as_str() != "AcroForm")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    catalog.insert("AcroForm".to_string(), Object::Dictionary(build_acroform(doc, field_ref)?));

    Ok(ObjectSerializer::new().serialize(&Object::Dictionary(catalog)))
}

/// The old form with the field appended, or a fresh one.
fn build_acroform<D: SourceDocument + ?Sized>(doc: &D, field_ref: ObjectRef) -> Result<Dictionary> {
    let old = doc.acroform()?.unwrap_or_default();

    let mut fields = match old.get("Fields") {
        Some(value) => doc
            .resolve_value(value)?
            .as_array()
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    };
    fields.push(Object::Reference(field_ref));
    log::debug!("AcroForm lists {} field(s)", fields.len());

    let mut form: Dictionary = old
        .into_iter()
        .filter(|(key, _)| key != "Fields" && key != "SigFlags")
        .collect();
    form.insert("Fields".to_string(), Object::Array(fields));
    form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
    Ok(form)
}
