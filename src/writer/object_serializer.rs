//! PDF object serialization.
//!
//! Serializes objects to their byte representation (ISO 32000-1:2008, 7.3).
//! Dictionaries are written in their stored key order. The top level of a
//! pretty-printed dictionary puts each key on its own line indented by two
//! spaces; nested dictionaries stay inline.

use crate::object::{Dictionary, Object};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a serializer that pretty-prints top-level dictionaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj, 0);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    fn write_object(&self, w: &mut Vec<u8>, obj: &Object, depth: usize) {
        match obj {
            Object::Null => w.extend_from_slice(b"null"),
            Object::Boolean(b) => w.extend_from_slice(if *b { &b"true"[..] } else { &b"false"[..] }),
            Object::Integer(i) => w.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => w.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(w, s),
            Object::Name(n) => write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr, depth),
            Object::Dictionary(dict) => self.write_dictionary(w, dict, depth),
            Object::Stream { dict, data } => self.write_stream(w, dict, data, depth),
            Object::Reference(r) => w.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_array(&self, w: &mut Vec<u8>, arr: &[Object], depth: usize) {
        w.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                w.push(b' ');
            }
            self.write_object(w, obj, depth + 1);
        }
        w.push(b']');
    }

    fn write_dictionary(&self, w: &mut Vec<u8>, dict: &Dictionary, depth: usize) {
        let pretty = !self.compact && depth == 0;
        w.extend_from_slice(b"<<");

        for (key, value) in dict {
            w.extend_from_slice(if pretty { &b"\n  "[..] } else { &b" "[..] });
            write_name(w, key);
            w.push(b' ');
            self.write_object(w, value, depth + 1);
        }

        if pretty {
            w.push(b'\n');
        } else {
            w.push(b' ');
        }
        w.extend_from_slice(b">>");
    }

    /// Streams get their `/Length` set from the data.
    fn write_stream(&self, w: &mut Vec<u8>, dict: &Dictionary, data: &[u8], depth: usize) {
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(w, &dict, depth);
        w.extend_from_slice(b"\nstream\n");
        w.extend_from_slice(data);
        w.extend_from_slice(b"\nendstream");
    }
}

/// Format a real number with at most 5 decimals, trailing zeros trimmed.
///
/// ```
/// # use pdf_sigstamp::writer::format_real;
/// assert_eq!(format_real(100.0), "100");
/// assert_eq!(format_real(12.5), "12.5");
/// assert_eq!(format_real(0.333333), "0.33333");
/// ```
pub fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return (value as i64).to_string();
    }
    let formatted = format!("{:.5}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write a string as a literal `(...)` if printable, hex `<...>` otherwise.
fn write_string(w: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if !is_printable {
        w.push(b'<');
        for byte in data {
            w.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        w.push(b'>');
        return;
    }

    w.push(b'(');
    for &byte in data {
        match byte {
            b'(' => w.extend_from_slice(b"\\("),
            b')' => w.extend_from_slice(b"\\)"),
            b'\\' => w.extend_from_slice(b"\\\\"),
            b'\n' => w.extend_from_slice(b"\\n"),
            b'\r' => w.extend_from_slice(b"\\r"),
            b'\t' => w.extend_from_slice(b"\\t"),
            _ => w.push(byte),
        }
    }
    w.push(b')');
}

/// Write a name, escaping delimiters and non-regular bytes as `#xx`.
fn write_name(w: &mut Vec<u8>, name: &str) {
    w.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'..=b'&'
            | b'\''
            | b'*'..=b'.'
            | b'0'..=b'9'
            | b':'
            | b';'
            | b'='
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'^'..=b'z'
            | b'|'
            | b'~' => w.push(byte),
            _ => w.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}
