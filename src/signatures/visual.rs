//! Signature field widget and its appearance.
//!
//! The widget annotation is the signature field itself (merged field and
//! widget dictionary). When the signature is visible its `/AP /N` entry
//! points at a form XObject that draws the caller's image; the image and
//! form are appended before the annotation so every reference points
//! backwards in the file.

use super::types::{AnnotationFlags, Rect, SignatureAppearance};
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::{ImageAppearance, JpegImage, ObjectAppender, ObjectSerializer};
use std::io::Write;

/// The catalog being replaced and the one replacing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogData {
    /// Textual reference of the original catalog, e.g. `10 0 R`
    pub root_string: String,
    /// ID of the new catalog object
    pub object_id: u32,
    /// Offset of the new catalog object
    pub offset: u64,
    /// Length of the new catalog object
    pub length: u64,
}

/// What the builder found in the source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualSignatureData {
    /// Page the widget is attached to, if the document has a page tree
    pub page_object_id: Option<u32>,
    /// Full reference of that page
    pub page_ref: Option<ObjectRef>,
    /// Signature fields already in the form
    pub existing_signatures: usize,
}

/// Builds the signature widget annotation.
pub struct VisualSignatureBuilder<'a, D: SourceDocument + ?Sized> {
    doc: &'a D,
    appearance: &'a SignatureAppearance,
    serializer: ObjectSerializer,
}

impl<'a, D: SourceDocument + ?Sized> VisualSignatureBuilder<'a, D> {
    /// Builder for `appearance` on `doc`.
    pub fn new(doc: &'a D, appearance: &'a SignatureAppearance) -> Self {
        Self {
            doc,
            appearance,
            serializer: ObjectSerializer::new(),
        }
    }

    /// Objects the appearance adds in front of the annotation.
    pub fn appearance_object_count(&self) -> u32 {
        if self.appearance.visible {
            2
        } else {
            0
        }
    }

    /// Resolve the catalog and target page without writing anything.
    ///
    /// Fills `catalog.root_string`.
    ///
    /// # Errors
    ///
    /// - `PageNotFound` when the document has pages but not the requested one
    /// - `Image` for a visible appearance without an image
    pub fn locate(&self, catalog: &mut CatalogData) -> Result<VisualSignatureData> {
        if self.appearance.visible && self.appearance.image.is_none() {
            return Err(Error::Image("visible signature requires an image".to_string()));
        }

        let root_ref = self.doc.root_ref()?;
        catalog.root_string = root_ref.to_string();

        let mut data = VisualSignatureData {
            existing_signatures: self.doc.existing_signature_count()?,
            ..Default::default()
        };

        if self.doc.catalog()?.contains_key("Pages") {
            let page_ref = self.doc.page_by_number(self.appearance.page)?;
            data.page_object_id = Some(page_ref.id);
            data.page_ref = Some(page_ref);
            log::debug!("Signature widget goes on page {} ({})", self.appearance.page, page_ref);
        } else {
            log::warn!("Catalog {} has no /Pages; the signature widget has no /P", root_ref);
        }

        Ok(data)
    }

    /// Append the appearance objects (when visible) and return the annotation dictionary.
    ///
    /// `signature_ref` is the ID the signature dictionary will be written under.
    pub fn build_visual_signature<W: Write>(
        &self,
        appender: &mut ObjectAppender<W>,
        data: &VisualSignatureData,
        signature_ref: ObjectRef,
    ) -> Result<Vec<u8>> {
        let mut annot = Dictionary::new();
        annot.insert("Type".to_string(), Object::Name("Annot".to_string()));
        annot.insert("Subtype".to_string(), Object::Name("Widget".to_string()));

        if self.appearance.visible {
            let form_ref = self.append_appearance(appender)?;
            annot.insert("Rect".to_string(), self.appearance.rect.to_object());

            let mut ap = Dictionary::new();
            ap.insert("N".to_string(), Object::Reference(form_ref));
            annot.insert("AP".to_string(), Object::Dictionary(ap));
        } else {
            annot.insert("Rect".to_string(), Rect::zero().to_object());
        }

        if let Some(page_ref) = data.page_ref {
            annot.insert("P".to_string(), Object::Reference(page_ref));
        }
        annot.insert(
            "F".to_string(),
            Object::Integer(AnnotationFlags::signature_widget().bits() as i64),
        );
        annot.insert("FT".to_string(), Object::Name("Sig".to_string()));
        annot.insert(
            "T".to_string(),
            Object::String(format!("Signature {}", data.existing_signatures + 1).into_bytes()),
        );
        annot.insert("V".to_string(), Object::Reference(signature_ref));

        Ok(self.serializer.serialize(&Object::Dictionary(annot)))
    }

    /// Append the image and the form XObject painting it; returns the form.
    fn append_appearance<W: Write>(&self, appender: &mut ObjectAppender<W>) -> Result<ObjectRef> {
        let image = self
            .appearance
            .image
            .as_ref()
            .ok_or_else(|| Error::Image("visible signature requires an image".to_string()))?;
        let jpeg = JpegImage::encode(image)?;

        let image_ref = appender.add_object(&self.serializer.serialize(&jpeg.to_xobject()))?;
        let form = ImageAppearance::new(image_ref, jpeg.width, jpeg.height);
        let form_ref = appender.add_object(&self.serializer.serialize(&form.to_xobject()))?;

        log::debug!("Appearance: image {} drawn by form {}", image_ref, form_ref);
        Ok(form_ref)
    }
}
