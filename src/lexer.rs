//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte sequences. Besides the object parser,
//! the trailer rewriter uses [`spanned_tokens`] to locate the exact bytes of
//! a dictionary value so it can be replaced without touching its neighbours.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};
use std::ops::Range;

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes, escapes not decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string bytes, whitespace preserved
    HexString(&'a [u8]),

    /// Name (e.g., "Type" from "/Type"), # escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,

    /// Any other bare word, such as `trailer` or `startxref`
    Keyword(&'a [u8]),
}

/// A token together with its byte range in the input it was lexed from.
#[derive(Debug, PartialEq, Clone)]
pub struct SpannedToken<'a> {
    /// The token itself
    pub token: Token<'a>,
    /// Byte range of the token, excluding surrounding whitespace
    pub span: Range<usize>,
}

fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

/// Parse whitespace characters (PDF Ref 1.7, Table 3.1).
///
/// Requires at least one whitespace character.
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    let (remaining, ws) = take_while(is_pdf_whitespace)(input)?;

    if ws.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Space)));
    }

    Ok((remaining, ()))
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
fn skip_ws(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut remaining = input;

    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }

        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }

        break;
    }

    Ok((remaining, input))
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Parse an integer or real number.
///
/// PDF allows leading +/- signs and numbers starting with a decimal point.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(digit_error(input));
    }

    if frac_part.is_some() {
        let mut num_str = String::new();
        if sign == Some('-') {
            num_str.push('-');
        }
        match int_part {
            Some(int) => num_str.push_str(std::str::from_utf8(int).map_err(|_| digit_error(input))?),
            None => num_str.push('0'),
        }
        num_str.push('.');
        match frac_part {
            Some(Some(frac)) => {
                num_str.push_str(std::str::from_utf8(frac).map_err(|_| digit_error(input))?)
            },
            _ => num_str.push('0'),
        }

        let num: f64 = num_str.parse().map_err(|_| digit_error(input))?;
        Ok((input, Token::Real(num)))
    } else {
        let int_bytes = int_part.ok_or_else(|| digit_error(input))?;
        let int_str = std::str::from_utf8(int_bytes).map_err(|_| digit_error(input))?;
        let mut num: i64 = int_str.parse().map_err(|_| digit_error(input))?;
        if sign == Some('-') {
            num = -num;
        }
        Ok((input, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Balanced nested parentheses and escape sequences are skipped over; the raw
/// content is returned and decoded by the parser.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 1;
                if pos < remaining.len() {
                    if remaining[pos].is_ascii_digit() {
                        // Octal escape: 1-3 digits
                        pos += 1;
                        if pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                        }
                        if pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                        }
                    } else {
                        pos += 1;
                    }
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => {
                pos += 1;
            },
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    let content = &remaining[..pos - 1];
    Ok((&remaining[pos..], Token::LiteralString(content)))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // Must not be a dictionary start (<<)
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || c.is_ascii_whitespace()),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names (ISO 32000-1:2008, 7.3.5).
///
/// ```
/// # use pdf_sigstamp::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes("Type"), "Type");
/// assert_eq!(decode_name_escapes("A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars();

    while let Some(ch) = chars.next() {
        if ch != '#' {
            result.push(ch);
            continue;
        }

        match (chars.next(), chars.next()) {
            (Some(h1), Some(h2)) => {
                let hex_str = format!("{}{}", h1, h2);
                match u8::from_str_radix(&hex_str, 16) {
                    Ok(byte) => result.push(byte as char),
                    Err(_) => {
                        result.push('#');
                        result.push(h1);
                        result.push(h2);
                    },
                }
            },
            (Some(h1), None) => {
                result.push('#');
                result.push(h1);
            },
            _ => result.push('#'),
        }
    }

    result
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_pdf_whitespace(c) && !is_delimiter(c)),
            |bytes| {
                let name_str = std::str::from_utf8(bytes).unwrap_or("");
                Token::Name(decode_name_escapes(name_str))
            },
        ),
    )(input)
}

/// Parse a bare word that is followed by whitespace, a delimiter or the end of input.
fn exact_word<'a>(
    word: &'static [u8],
    tok: Token<'static>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input: &'a [u8]| {
        let (rest, _) = tag(word)(input)?;
        match rest.first() {
            Some(&c) if !is_pdf_whitespace(c) && !is_delimiter(c) => {
                Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
            },
            _ => Ok((rest, tok.clone())),
        }
    }
}

/// Parse PDF keywords and delimiters.
///
/// Multi-character keywords are checked before single characters, `<<`
/// before `<` and `>>` before `>`.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        exact_word(b"false", Token::False),
        exact_word(b"true", Token::True),
        exact_word(b"null", Token::Null),
        exact_word(b"obj", Token::ObjStart),
        exact_word(b"endobj", Token::ObjEnd),
        exact_word(b"endstream", Token::StreamEnd),
        exact_word(b"stream", Token::StreamStart),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        exact_word(b"R", Token::R),
    ))(input)
}

/// Parse any remaining run of regular characters as a bare keyword.
fn parse_bare_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(|c: u8| !is_pdf_whitespace(c) && !is_delimiter(c)), Token::Keyword)(input)
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
        parse_bare_keyword,
    ))(input)
}

/// Tokenize `input` completely, recording the byte range of every token.
///
/// Fails with [`Error::ParseError`] at the first byte that does not start a token.
pub fn spanned_tokens(input: &[u8]) -> Result<Vec<SpannedToken<'_>>> {
    let mut tokens = Vec::new();
    let mut remaining = input;

    loop {
        let (after_ws, _) = skip_ws(remaining).map_err(|_| Error::ParseError {
            offset: input.len() - remaining.len(),
            reason: "unterminated whitespace".to_string(),
        })?;
        if after_ws.is_empty() {
            break;
        }

        let start = input.len() - after_ws.len();
        let (rest, tok) = token(after_ws).map_err(|_| Error::ParseError {
            offset: start,
            reason: "unrecognised token".to_string(),
        })?;
        let end = input.len() - rest.len();

        tokens.push(SpannedToken {
            token: tok,
            span: start..end,
        });
        remaining = rest;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_tokens() {
        assert_eq!(token(b"42").unwrap().1, Token::Integer(42));
        assert_eq!(token(b"-17 ").unwrap().1, Token::Integer(-17));
        assert_eq!(token(b"+5").unwrap().1, Token::Integer(5));
    }

    #[test]
    fn test_real_tokens() {
        assert_eq!(token(b"3.5").unwrap().1, Token::Real(3.5));
        assert_eq!(token(b".5").unwrap().1, Token::Real(0.5));
        assert_eq!(token(b"-2.").unwrap().1, Token::Real(-2.0));
    }

    #[test]
    fn test_name_token() {
        assert_eq!(token(b"/Root").unwrap().1, Token::Name("Root".to_string()));
        assert_eq!(token(b"/A#20B").unwrap().1, Token::Name("A B".to_string()));
    }

    #[test]
    fn test_literal_string_with_nesting() {
        let (rest, tok) = token(b"(a (b) \\) c) tail").unwrap();
        assert_eq!(tok, Token::LiteralString(b"a (b) \\) c"));
        assert_eq!(rest, b" tail");
    }

    #[test]
    fn test_hex_string_is_not_dict_start() {
        assert_eq!(token(b"<48656C>").unwrap().1, Token::HexString(b"48656C"));
        assert_eq!(token(b"<< /A 1 >>").unwrap().1, Token::DictStart);
    }

    #[test]
    fn test_keywords_need_word_boundary() {
        assert_eq!(token(b"R ").unwrap().1, Token::R);
        assert_eq!(token(b"obj\n").unwrap().1, Token::ObjStart);
        assert_eq!(token(b"trailer\n").unwrap().1, Token::Keyword(b"trailer"));
        assert_eq!(token(b"startxref\n").unwrap().1, Token::Keyword(b"startxref"));
        assert_eq!(token(b"nullable").unwrap().1, Token::Keyword(b"nullable"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let (_, tok) = token(b"% a comment\n  /Size").unwrap();
        assert_eq!(tok, Token::Name("Size".to_string()));
    }

    #[test]
    fn test_spanned_tokens_report_exact_ranges() {
        let input = b"trailer\n<< /Size 42 /Root 10 0 R >>\nstartxref\n";
        let tokens = spanned_tokens(input).unwrap();

        let root_value: Vec<&[u8]> = tokens
            .iter()
            .skip_while(|t| t.token != Token::Name("Root".to_string()))
            .skip(1)
            .take(3)
            .map(|t| &input[t.span.clone()])
            .collect();
        assert_eq!(root_value, vec![&b"10"[..], &b"0"[..], &b"R"[..]]);

        let last = tokens.last().unwrap();
        assert_eq!(last.token, Token::Keyword(b"startxref"));
        assert_eq!(&input[last.span.clone()], b"startxref");
    }

    #[test]
    fn test_spanned_tokens_rejects_garbage() {
        let result = spanned_tokens(b"<< /A ) >>");
        assert!(matches!(result, Err(Error::ParseError { offset: 6, .. })));
    }
}
