//! PDF object parser.
//!
//! Combines tokens from the lexer into complete objects (arrays, dictionaries,
//! indirect references, streams) using recursive descent.
//!
//! All parsing functions return `IResult` from nom; [`parse_indirect_object_at`]
//! wraps them into the crate [`Result`] with the byte offset of the failure.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings.
///
/// Handles the escapes of ISO 32000-1:2008, 7.3.4.2: `\n \r \t \b \f \( \) \\`,
/// octal `\ddd` (1-3 digits) and line continuations. Unknown escapes keep
/// the backslash.
///
/// ```
/// # use pdf_sigstamp::parser::decode_literal_string_escapes;
/// let decoded = decode_literal_string_escapes(b"Section \\247 71.01");
/// assert_eq!(decoded, b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        match raw[i + 1] {
            b'n' => {
                result.push(b'\n');
                i += 2;
            },
            b'r' => {
                result.push(b'\r');
                i += 2;
            },
            b't' => {
                result.push(b'\t');
                i += 2;
            },
            b'b' => {
                result.push(8);
                i += 2;
            },
            b'f' => {
                result.push(12);
                i += 2;
            },
            c @ (b'(' | b')' | b'\\') => {
                result.push(c);
                i += 2;
            },
            b'\n' => {
                i += 2;
            },
            b'\r' => {
                i += 2;
                if i < raw.len() && raw[i] == b'\n' {
                    i += 1;
                }
            },
            c if (b'0'..b'8').contains(&c) => {
                let mut octal_value = 0u32;
                let mut octal_len = 0;
                while octal_len < 3 {
                    match raw.get(i + 1 + octal_len) {
                        Some(&d) if (b'0'..b'8').contains(&d) => {
                            octal_value = octal_value * 8 + (d - b'0') as u32;
                            octal_len += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal_value & 0xFF) as u8);
                i += 1 + octal_len;
            },
            _ => {
                result.push(b'\\');
                i += 1;
            },
        }
    }

    result
}

fn nom_error(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse a PDF object from input bytes.
///
/// Handles primitives, arrays, dictionaries, streams and indirect references
/// (`10 0 R`, recognised by two-token lookahead).
///
/// ```
/// use pdf_sigstamp::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Type /Page /Count 3 >>").unwrap();
/// assert_eq!(obj.as_dict().unwrap()["Count"].as_integer(), Some(3));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            if let Ok((input2, Token::Integer(gen))) = token(input) {
                if let Ok((input3, Token::R)) = token(input2) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                        return Ok((input3, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(bytes) => Ok((input, Object::String(decode_literal_string_escapes(bytes)))),

        Token::HexString(hex_bytes) => match decode_hex(hex_bytes) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Fail))),
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),

        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;

            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let (final_input, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((
                    final_input,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    },
                ));
            }

            Ok((remaining, Object::Dictionary(dict)))
        },

        _ => Err(nom_error(input, nom::error::ErrorKind::Tag)),
    }
}

/// Parse stream data after the `stream` keyword.
///
/// A direct `/Length` is trusted; an indirect or missing one falls back to
/// scanning for `endstream`.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        log::warn!("No end-of-line after stream keyword");
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = usize::try_from(length).map_err(|_| nom_error(input, nom::error::ErrorKind::Digit))?;
        if input.len() < length {
            return Err(nom_error(input, nom::error::ErrorKind::Eof));
        }

        let (data, remaining) = input.split_at(length);
        let (remaining, end) = token(remaining)?;
        if end != Token::StreamEnd {
            return Err(nom_error(remaining, nom::error::ErrorKind::Tag));
        }
        return Ok((remaining, data.to_vec()));
    }

    let keyword = b"endstream";
    let pos = input
        .windows(keyword.len())
        .position(|window| window == keyword)
        .ok_or_else(|| nom_error(input, nom::error::ErrorKind::Eof))?;

    let mut data = &input[..pos];
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&input[pos + keyword.len()..], data.to_vec()))
}

/// Parse a PDF array: `[ obj1 obj2 ... objN ]`
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        let (inp, tok) = token(remaining)?;
        if tok == Token::ArrayEnd {
            return Ok((inp, Object::Array(objects)));
        }

        let (inp, obj) = parse_object(remaining)?;
        objects.push(obj);
        remaining = inp;
    }
}

/// Parse a PDF dictionary: `<< /Key1 value1 /Key2 value2 ... >>`
///
/// Keys must be names. Duplicate keys keep the last value at the position of
/// the first occurrence.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        let (inp, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((inp, dict)),
            Token::Name(key) => {
                let (inp, value) = parse_object(inp)?;
                dict.insert(key, value);
                remaining = inp;
            },
            _ => return Err(nom_error(remaining, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Parse an indirect object: `<id> <gen> obj <object> endobj`.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (input, id) = token(input)?;
    let (input, gen) = token(input)?;
    let (input, obj_kw) = token(input)?;

    let obj_ref = match (id, gen, obj_kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart) => {
            match (u32::try_from(id), u16::try_from(gen)) {
                (Ok(id), Ok(gen)) => ObjectRef::new(id, gen),
                _ => return Err(nom_error(input, nom::error::ErrorKind::Digit)),
            }
        },
        _ => return Err(nom_error(input, nom::error::ErrorKind::Tag)),
    };

    let (input, object) = parse_object(input)?;

    // endobj is optional in the wild
    let input = match token(input) {
        Ok((rest, Token::ObjEnd)) => rest,
        _ => input,
    };

    Ok((input, (obj_ref, object)))
}

/// Parse the indirect object starting at `offset` in `data`.
///
/// Fails with [`Error::ParseError`] if the bytes at `offset` are not an
/// indirect object header.
pub fn parse_indirect_object_at(data: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let slice = data.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: "offset beyond end of file".to_string(),
    })?;

    parse_indirect_object(slice)
        .map(|(_, parsed)| parsed)
        .map_err(|e| {
            let failed_at = match &e {
                nom::Err::Error(inner) | nom::Err::Failure(inner) => data.len() - inner.input.len(),
                nom::Err::Incomplete(_) => data.len(),
            };
            Error::ParseError {
                offset: failed_at,
                reason: format!("malformed indirect object starting at byte {}", offset),
            }
        })
}

/// Decode a hex string to bytes.
///
/// Whitespace is ignored; an odd trailing digit is padded with 0.
///
/// ```
/// use pdf_sigstamp::parser::decode_hex;
///
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"7").unwrap(), vec![0x70]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter(|c| !c.is_ascii_whitespace())
        .copied()
        .collect();

    let mut result = Vec::with_capacity(digits.len() / 2 + 1);
    for chunk in digits.chunks(2) {
        let high = hex_value(chunk[0])?;
        let low = match chunk.get(1) {
            Some(&c) => hex_value(c)?,
            None => 0,
        };
        result.push(high << 4 | low);
    }

    Ok(result)
}

fn hex_value(c: u8) -> Result<u8> {
    (c as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("Invalid hex digit: {:?}", c as char),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let (_, obj) = parse_object(b"10 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(10, 0)));
    }

    #[test]
    fn test_integer_not_followed_by_r() {
        let (rest, obj) = parse_object(b"10 0 obj").unwrap();
        assert_eq!(obj, Object::Integer(10));
        assert_eq!(rest, b" 0 obj");
    }

    #[test]
    fn test_parse_nested_dictionary_keeps_order() {
        let (_, obj) = parse_object(b"<< /Type /Catalog /Pages 2 0 R /Names << /A [1 2] >> >>").unwrap();
        let dict = obj.as_dict().unwrap();
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Type", "Pages", "Names"]);
        assert_eq!(dict["Pages"].as_reference(), Some(ObjectRef::new(2, 0)));
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_with_indirect_length() {
        let input = b"<< /Length 9 0 R >>\nstream\nhello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_string_escapes() {
        let (_, obj) = parse_object(b"(Signature \\(1\\)\\n)").unwrap();
        assert_eq!(obj.as_string(), Some(&b"Signature (1)\n"[..]));
    }

    #[test]
    fn test_hex_string() {
        let (_, obj) = parse_object(b"<4F4B>").unwrap();
        assert_eq!(obj.as_string(), Some(&b"OK"[..]));
        assert!(decode_hex(b"4G").is_err());
    }

    #[test]
    fn test_unclosed_array_is_error() {
        assert!(parse_object(b"[1 2").is_err());
    }

    #[test]
    fn test_parse_indirect_object_at_offset() {
        let data = b"garbage 1 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let (obj_ref, obj) = parse_indirect_object_at(data, 8).unwrap();
        assert_eq!(obj_ref, ObjectRef::new(1, 0));
        assert_eq!(obj.as_dict().unwrap()["Type"].as_name(), Some("Catalog"));
    }

    #[test]
    fn test_parse_indirect_object_at_bad_offset() {
        let data = b"1 0 obj\nnull\nendobj\n";
        assert!(matches!(parse_indirect_object_at(data, 3), Err(Error::ParseError { .. })));
        assert!(matches!(parse_indirect_object_at(data, 500), Err(Error::ParseError { offset: 500, .. })));
    }
}
