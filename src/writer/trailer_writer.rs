//! Patching the trailer for an incremental update.
//!
//! The old trailer segment (`trailer` through the end-of-line after
//! `startxref`) is reused. Only the values of the top-level `/Root` and
//! `/Size` keys change; every other byte is copied as found.

use crate::error::{Error, Result};
use crate::lexer::{spanned_tokens, SpannedToken, Token};
use crate::object::ObjectRef;
use crate::writer::appender::ObjectAppender;
use std::io::Write;
use std::ops::Range;

/// Index just past the value that starts at token `i`.
fn value_end(tokens: &[SpannedToken<'_>], i: usize) -> Result<usize> {
    match &tokens[i].token {
        Token::Integer(_) => {
            let is_reference = matches!(
                (tokens.get(i + 1).map(|t| &t.token), tokens.get(i + 2).map(|t| &t.token)),
                (Some(Token::Integer(_)), Some(Token::R))
            );
            Ok(if is_reference { i + 3 } else { i + 1 })
        },
        Token::DictStart | Token::ArrayStart => {
            let mut depth = 0usize;
            for (j, tok) in tokens.iter().enumerate().skip(i) {
                match tok.token {
                    Token::DictStart | Token::ArrayStart => depth += 1,
                    Token::DictEnd | Token::ArrayEnd => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(j + 1);
                        }
                    },
                    _ => {},
                }
            }
            Err(Error::ParseError {
                offset: tokens[i].span.start,
                reason: "unterminated container in trailer".to_string(),
            })
        },
        Token::DictEnd | Token::ArrayEnd => Err(Error::ParseError {
            offset: tokens[i].span.start,
            reason: "trailer key without value".to_string(),
        }),
        _ => Ok(i + 1),
    }
}

/// Byte ranges of the values of top-level `key` entries in the first dictionary of `segment`.
fn top_level_value_spans(tokens: &[SpannedToken<'_>], key: &str) -> Result<Vec<Range<usize>>> {
    let dict_start = tokens
        .iter()
        .position(|t| t.token == Token::DictStart)
        .ok_or_else(|| Error::TrailerFieldNotFound(key.to_string()))?;

    let mut spans = Vec::new();
    let mut i = dict_start + 1;
    while i < tokens.len() {
        let name = match &tokens[i].token {
            Token::DictEnd => return Ok(spans),
            Token::Name(name) => name,
            _ => {
                return Err(Error::ParseError {
                    offset: tokens[i].span.start,
                    reason: "trailer key is not a name".to_string(),
                })
            },
        };

        let value_start = i + 1;
        if value_start >= tokens.len() {
            break;
        }
        let end = value_end(tokens, value_start)?;
        if name == key {
            spans.push(tokens[value_start].span.start..tokens[end - 1].span.end);
        }
        i = end;
    }

    Err(Error::ParseError {
        offset: tokens.last().map_or(0, |t| t.span.end),
        reason: "unterminated trailer dictionary".to_string(),
    })
}

/// Return `segment` with `/Root` pointing at `root` and `/Size` set to `size`.
///
/// # Errors
///
/// `TrailerFieldNotFound` if either key is absent from the top-level dictionary.
pub fn patch_trailer(segment: &[u8], root: ObjectRef, size: u32) -> Result<Vec<u8>> {
    let tokens = spanned_tokens(segment)?;

    let mut replacements = Vec::new();
    for (key, value) in [("Root", root.to_string()), ("Size", size.to_string())] {
        let spans = top_level_value_spans(&tokens, key)?;
        if spans.is_empty() {
            return Err(Error::TrailerFieldNotFound(key.to_string()));
        }
        replacements.extend(spans.into_iter().map(|span| (span, value.clone())));
    }
    replacements.sort_by_key(|(span, _)| span.start);

    let mut out = Vec::with_capacity(segment.len() + 8);
    let mut cursor = 0;
    for (span, value) in replacements {
        out.extend_from_slice(&segment[cursor..span.start]);
        out.extend_from_slice(value.as_bytes());
        cursor = span.end;
    }
    out.extend_from_slice(&segment[cursor..]);
    Ok(out)
}

/// Write the patched trailer segment, the new `startxref` offset and `%%EOF`.
///
/// The offset always starts on its own line, even when the source put it
/// on the same line as `startxref`.
pub fn rewrite_trailer<W: Write>(
    appender: &mut ObjectAppender<W>,
    segment: &[u8],
    root: ObjectRef,
    size: u32,
    xref_start: u64,
) -> Result<()> {
    let patched = patch_trailer(segment, root, size)?;
    log::debug!("Trailer patched: /Root {} /Size {}", root, size);

    appender.write_raw(&patched)?;
    if !patched.ends_with(b"\n") && !patched.ends_with(b"\r") {
        appender.write_raw(b"\n")?;
    }
    appender.write_raw(format!("{}\n", xref_start).as_bytes())?;
    appender.write_raw(b"%%EOF\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patches_root_and_size_only() {
        let segment = b"trailer\n<< /Size 42 /Root 10 0 R /Info 3 0 R /ID [<AB> <CD>] >>\nstartxref\n";
        let patched = patch_trailer(segment, ObjectRef::fresh(43), 45).unwrap();
        assert_eq!(
            patched,
            b"trailer\n<< /Size 45 /Root 43 0 R /Info 3 0 R /ID [<AB> <CD>] >>\nstartxref\n".to_vec()
        );
    }

    #[test]
    fn test_nested_root_key_is_left_alone() {
        let segment = b"trailer\n<</Extra<</Root 1 0 R/Size 7>>/Size 9/Root 2 0 R>>\r\nstartxref\r\n";
        let patched = patch_trailer(segment, ObjectRef::fresh(11), 12).unwrap();
        assert_eq!(
            patched,
            b"trailer\n<</Extra<</Root 1 0 R/Size 7>>/Size 12/Root 11 0 R>>\r\nstartxref\r\n".to_vec()
        );
    }

    #[test]
    fn test_size_text_elsewhere_is_not_replaced() {
        let segment = b"trailer\n<< /Root 1 0 R /Size 4 /Note (Size 4) >>\nstartxref\n";
        let patched = patch_trailer(segment, ObjectRef::fresh(5), 7).unwrap();
        assert_eq!(patched, b"trailer\n<< /Root 5 0 R /Size 7 /Note (Size 4) >>\nstartxref\n".to_vec());
    }

    #[test]
    fn test_missing_root() {
        let err = patch_trailer(b"trailer\n<< /Size 4 >>\nstartxref\n", ObjectRef::fresh(5), 7).unwrap_err();
        assert!(matches!(err, Error::TrailerFieldNotFound(ref key) if key == "Root"));
    }

    #[test]
    fn test_missing_size() {
        let err = patch_trailer(b"trailer\n<< /Root 1 0 R >>\nstartxref\n", ObjectRef::fresh(5), 7).unwrap_err();
        assert!(matches!(err, Error::TrailerFieldNotFound(ref key) if key == "Size"));
    }

    #[test]
    fn test_rewrite_appends_offset_and_eof() {
        let mut appender = ObjectAppender::new(Vec::new(), 1, 0);
        rewrite_trailer(
            &mut appender,
            b"trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n",
            ObjectRef::fresh(3),
            4,
            1234,
        )
        .unwrap();
        let (out, _) = appender.finish().unwrap();
        assert_eq!(out, b"trailer\n<< /Size 4 /Root 3 0 R >>\nstartxref\n1234\n%%EOF\n".to_vec());
    }

    #[test]
    fn test_offset_goes_on_its_own_line() {
        let mut appender = ObjectAppender::new(Vec::new(), 1, 0);
        rewrite_trailer(
            &mut appender,
            b"trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref",
            ObjectRef::fresh(3),
            4,
            1234,
        )
        .unwrap();
        let (out, _) = appender.finish().unwrap();
        assert_eq!(out, b"trailer\n<< /Size 4 /Root 3 0 R >>\nstartxref\n1234\n%%EOF\n".to_vec());
    }
}
