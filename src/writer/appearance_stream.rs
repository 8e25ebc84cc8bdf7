//! Form XObject that paints the appearance image.
//!
//! The form's bounding box is the image size in points. The annotation's
//! `/Rect` decides where (and at what scale) the viewer places it.

use crate::object::{Dictionary, Object, ObjectRef};

/// Resource name for an image XObject, derived from its object number.
///
/// ```
/// # use pdf_sigstamp::object::ObjectRef;
/// # use pdf_sigstamp::writer::image_resource_name;
/// assert_eq!(image_resource_name(ObjectRef::fresh(42)), "Im42");
/// ```
pub fn image_resource_name(image_ref: ObjectRef) -> String {
    format!("Im{}", image_ref.id)
}

/// Builder for the `/AP /N` form XObject of a visible signature.
#[derive(Debug, Clone, Copy)]
pub struct ImageAppearance {
    image_ref: ObjectRef,
    width: u32,
    height: u32,
}

impl ImageAppearance {
    /// Appearance painting `image_ref` at `width` x `height`.
    pub fn new(image_ref: ObjectRef, width: u32, height: u32) -> Self {
        Self {
            image_ref,
            width,
            height,
        }
    }

    /// Content stream: scale the unit square to the image and draw it.
    pub fn content(&self) -> Vec<u8> {
        format!(
            "q {} 0 0 {} 0 0 cm\n/{} Do\nQ\n",
            self.width,
            self.height,
            image_resource_name(self.image_ref)
        )
        .into_bytes()
    }

    /// Build the form XObject stream.
    pub fn to_xobject(&self) -> Object {
        let content = self.content();

        let mut xobjects = Dictionary::new();
        xobjects.insert(image_resource_name(self.image_ref), Object::Reference(self.image_ref));
        let mut resources = Dictionary::new();
        resources.insert("XObject".to_string(), Object::Dictionary(xobjects));

        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
        dict.insert(
            "BBox".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(self.width as i64),
                Object::Integer(self.height as i64),
            ]),
        );
        dict.insert("Resources".to_string(), Object::Dictionary(resources));
        dict.insert("FormType".to_string(), Object::Integer(1));
        dict.insert("Length".to_string(), Object::Integer(content.len() as i64));

        Object::Stream {
            dict,
            data: bytes::Bytes::from(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ObjectSerializer;

    #[test]
    fn test_content_uses_object_number() {
        let appearance = ImageAppearance::new(ObjectRef::fresh(42), 150, 60);
        assert_eq!(appearance.content(), b"q 150 0 0 60 0 0 cm\n/Im42 Do\nQ\n".to_vec());
    }

    #[test]
    fn test_form_xobject_serialization() {
        let appearance = ImageAppearance::new(ObjectRef::fresh(7), 20, 10);
        let text = ObjectSerializer::new().serialize_to_string(&appearance.to_xobject());

        assert!(text.starts_with("<<\n  /Type /XObject\n  /Subtype /Form\n  /BBox [0 0 20 10]\n"));
        assert!(text.contains("  /Resources << /XObject << /Im7 7 0 R >> >>\n"));
        assert!(text.contains("  /FormType 1\n  /Length 29\n>>\nstream\nq 20 0 0 10 0 0 cm\n/Im7 Do\nQ\n\nendstream"));
    }
}
