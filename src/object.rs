//! PDF object types.
//!
//! Dictionaries keep the key order they were parsed in, so an object that is
//! copied into the update serializes its entries in the same order as the source.

use indexmap::IndexMap;

/// Dictionary entries keyed by name (without the leading `/`).
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }

    /// Reference to a freshly appended object (generation 0).
    pub fn fresh(id: u32) -> Self {
        Self { id, gen: 0 }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Borrow the dictionary or report what was found instead.
    pub fn expect_dict(&self) -> crate::error::Result<&Dictionary> {
        self.as_dict()
            .ok_or_else(|| crate::error::Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: self.type_name().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(10, 0).to_string(), "10 0 R");
        assert_eq!(ObjectRef::new(7, 2).to_string(), "7 2 R");
        assert_eq!(ObjectRef::fresh(43).to_string(), "43 0 R");
    }

    #[test]
    fn test_object_ref_ordering() {
        assert!(ObjectRef::fresh(4) < ObjectRef::fresh(5));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Object::Null.type_name(), "Null");
        assert_eq!(Object::Integer(1).type_name(), "Integer");
        assert_eq!(Object::Dictionary(Dictionary::new()).type_name(), "Dictionary");
        assert_eq!(Object::Reference(ObjectRef::new(1, 0)).type_name(), "Reference");
    }

    #[test]
    fn test_as_dict_on_stream() {
        let mut dict = Dictionary::new();
        dict.insert("Length".to_string(), Object::Integer(3));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"abc"),
        };
        assert_eq!(stream.as_dict().and_then(|d| d.get("Length")), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_expect_dict_reports_found_type() {
        let err = Object::Integer(5).expect_dict().unwrap_err();
        assert!(err.to_string().contains("expected Dictionary, found Integer"));
    }

    #[test]
    fn test_dictionary_preserves_insertion_order() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        dict.insert("Pages".to_string(), Object::Reference(ObjectRef::new(2, 0)));
        dict.insert("Lang".to_string(), Object::String(b"en".to_vec()));
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Type", "Pages", "Lang"]);
    }
}
