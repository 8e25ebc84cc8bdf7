//! Cross-reference section reader.
//!
//! Locates the most recent xref section through `startxref`, scans classic
//! tables into [`XrefEntry`] rows and records where the table, trailer and
//! `startxref` line sit in the file ([`XrefInformation`]). The incremental
//! writer copies those byte ranges verbatim, so positions here must be exact.
//!
//! Cross-reference streams are recognised so callers can reject them; their
//! entries are not decoded.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object_at, parse_object};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

/// Width of one classic xref row including its two-byte end-of-line.
pub const XREF_ENTRY_LEN: usize = 20;

/// Largest offset a row can hold.
pub const MAX_XREF_OFFSET: u64 = 9_999_999_999;

/// Upper bound on the rows of one subsection.
const MAX_SUBSECTION_COUNT: u32 = 10_000_000;

/// Layout of the cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    /// Classic `xref` keyword table
    Table,
    /// Cross-reference stream (`/Type /XRef`)
    Stream,
}

impl fmt::Display for XrefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XrefKind::Table => write!(f, "table"),
            XrefKind::Stream => write!(f, "stream"),
        }
    }
}

/// Where the latest xref section lives in the source file.
///
/// All positions are absolute byte offsets in the input:
/// `start_pos` is the `xref` keyword, `end_pos = start_pos + length` is the
/// `trailer` keyword, and `trailer_end_pos` is the first byte after the
/// end-of-line that follows `startxref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefInformation {
    /// Table or stream
    pub kind: XrefKind,
    /// Offset of the `xref` keyword
    pub start_pos: u64,
    /// Bytes from `xref` up to (not including) `trailer`
    pub length: u64,
    /// Offset of the `trailer` keyword
    pub end_pos: u64,
    /// Offset just past the end-of-line after `startxref`
    pub trailer_end_pos: u64,
    /// Row count declared by the first subsection header
    pub item_count: u32,
    /// Number of subsections in the table
    pub subsections: usize,
}

/// One row of a classic xref table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    /// Byte offset of the object (or next free object number)
    pub offset: u64,
    /// Generation number
    pub generation: u16,
    /// `n` rows are in use, `f` rows are free
    pub in_use: bool,
}

impl XrefEntry {
    /// Create an in-use entry at `offset` with generation 0.
    pub fn in_use(offset: u64) -> Self {
        Self {
            offset,
            generation: 0,
            in_use: true,
        }
    }

    /// Create a free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            offset: next_free,
            generation,
            in_use: false,
        }
    }

    /// Serialize as a fixed-width row: `nnnnnnnnnn ggggg n\r\n`.
    ///
    /// ```
    /// # use pdf_sigstamp::xref::XrefEntry;
    /// assert_eq!(XrefEntry::in_use(1234).to_bytes().unwrap(), *b"0000001234 00000 n\r\n");
    /// ```
    ///
    /// # Errors
    ///
    /// `OffsetOverflow` when the offset needs more than 10 digits.
    pub fn to_bytes(&self) -> Result<[u8; XREF_ENTRY_LEN]> {
        if self.offset > MAX_XREF_OFFSET {
            return Err(Error::OffsetOverflow(self.offset));
        }

        let kind = if self.in_use { 'n' } else { 'f' };
        let row = format!("{:010} {:05} {}\r\n", self.offset, self.generation, kind);
        let mut out = [0u8; XREF_ENTRY_LEN];
        out.copy_from_slice(row.as_bytes());
        Ok(out)
    }
}

/// The first subsection header of a classic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// First object number of the subsection
    pub first: u32,
    /// Rows in the subsection
    pub count: u32,
    /// Bytes from `xref` through the last digit of `count`
    pub header_len: usize,
}

/// A fully scanned xref section.
#[derive(Debug, Clone)]
pub struct XrefSection {
    /// Positions and counts
    pub info: XrefInformation,
    /// Rows keyed by object number (empty for xref streams)
    pub entries: BTreeMap<u32, XrefEntry>,
    /// Trailer dictionary (the stream dictionary for xref streams)
    pub trailer: Dictionary,
}

fn is_eol(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn skip_whitespace(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() && is_pdf_whitespace(data[pos]) {
        pos += 1;
    }
    pos
}

/// Length of the end-of-line sequence at `pos` (CRLF, LF or CR), 0 if none.
fn eol_len(data: &[u8], pos: usize) -> usize {
    match (data.get(pos), data.get(pos + 1)) {
        (Some(b'\r'), Some(b'\n')) => 2,
        (Some(b'\r'), _) | (Some(b'\n'), _) => 1,
        _ => 0,
    }
}

fn parse_decimal<T: std::str::FromStr>(digits: &[u8]) -> Result<T> {
    std::str::from_utf8(digits)?
        .parse::<T>()
        .map_err(|_| Error::InvalidXref)
}

/// Find the byte offset of the latest xref section by scanning the last 2 KiB
/// for `startxref`.
///
/// # Errors
///
/// Returns `Error::InvalidXref` if the keyword or its offset is missing.
pub fn find_xref_offset<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let read_size = std::cmp::min(2048, file_size);
    reader.seek(SeekFrom::Start(file_size - read_size))?;

    let mut buf = Vec::with_capacity(read_size as usize);
    reader.take(read_size).read_to_end(&mut buf)?;

    let keyword = b"startxref";
    let keyword_pos = buf
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits_start = skip_whitespace(&buf, keyword_pos + keyword.len());
    let digits_end = buf[digits_start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(buf.len(), |p| digits_start + p);
    if digits_start == digits_end {
        return Err(Error::InvalidXref);
    }

    let offset = parse_decimal::<u64>(&buf[digits_start..digits_end])?;
    log::debug!("startxref points at byte {}", offset);
    Ok(offset)
}

/// Parse the header of a classic table: `xref` EOL `first count`.
///
/// `section` must start at the `xref` keyword.
pub fn parse_table_header(section: &[u8]) -> Result<TableHeader> {
    if !section.starts_with(b"xref") {
        return Err(Error::InvalidXref);
    }

    let mut pos = skip_whitespace(section, 4);
    let first_start = pos;
    while pos < section.len() && section[pos].is_ascii_digit() {
        pos += 1;
    }
    let first = parse_decimal::<u32>(&section[first_start..pos])?;

    if pos >= section.len() || !matches!(section[pos], b' ' | b'\t') {
        return Err(Error::InvalidXref);
    }
    while pos < section.len() && matches!(section[pos], b' ' | b'\t') {
        pos += 1;
    }

    let count_start = pos;
    while pos < section.len() && section[pos].is_ascii_digit() {
        pos += 1;
    }
    let count = parse_decimal::<u32>(&section[count_start..pos])?;

    Ok(TableHeader {
        first,
        count,
        header_len: pos,
    })
}

/// Scan the xref section starting at `offset` in `data`.
///
/// Classic tables yield their rows and exact positions; a cross-reference
/// stream yields `XrefKind::Stream` with its dictionary as the trailer.
pub fn parse_xref_section(data: &[u8], offset: u64) -> Result<XrefSection> {
    let offset = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    if offset >= data.len() {
        return Err(Error::InvalidPdf(format!(
            "startxref offset {} is beyond end of file ({} bytes)",
            offset,
            data.len()
        )));
    }

    let start = skip_whitespace(data, offset);
    if data[start..].starts_with(b"xref") {
        log::debug!("Classic xref table at offset {}", start);
        parse_classic_table(data, start)
    } else if data.get(start).is_some_and(u8::is_ascii_digit) {
        log::debug!("Cross-reference stream at offset {}", start);
        parse_stream_header(data, start)
    } else {
        Err(Error::InvalidXref)
    }
}

/// Scan a classic table at `start` (the `xref` keyword).
fn parse_classic_table(data: &[u8], start: usize) -> Result<XrefSection> {
    let mut entries = BTreeMap::new();
    let mut item_count = None;
    let mut subsections = 0;
    let mut pos = start + 4;

    let end_pos = loop {
        pos = skip_whitespace(data, pos);
        if pos >= data.len() {
            return Err(Error::InvalidXref);
        }
        if data[pos..].starts_with(b"trailer") {
            break pos;
        }

        let (first, count, next) = read_subsection_header(data, pos)?;
        if count > MAX_SUBSECTION_COUNT {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }
        subsections += 1;
        item_count.get_or_insert(count);
        pos = next;

        for i in 0..count {
            pos = skip_whitespace(data, pos);
            let line_end = data[pos..]
                .iter()
                .position(|&c| is_eol(c))
                .map_or(data.len(), |p| pos + p);
            let entry = parse_row(&data[pos..line_end])?;
            entries.insert(first + i, entry);
            pos = line_end;
        }
    };

    let item_count = item_count.ok_or(Error::InvalidXref)?;

    let trailer_start = end_pos + b"trailer".len();
    let (after_dict, trailer) = match parse_object(&data[trailer_start..]) {
        Ok((rest, Object::Dictionary(dict))) => (rest, dict),
        _ => {
            return Err(Error::ParseError {
                offset: trailer_start,
                reason: "trailer is not a dictionary".to_string(),
            })
        },
    };

    let after_dict_pos = data.len() - after_dict.len();
    let (rest, kw) = token(after_dict).map_err(|_| Error::ParseError {
        offset: after_dict_pos,
        reason: "missing startxref after trailer".to_string(),
    })?;
    if kw != Token::Keyword(b"startxref") {
        return Err(Error::ParseError {
            offset: after_dict_pos,
            reason: "expected startxref after trailer".to_string(),
        });
    }
    let keyword_end = data.len() - rest.len();
    let trailer_end_pos = keyword_end + eol_len(data, keyword_end);

    let info = XrefInformation {
        kind: XrefKind::Table,
        start_pos: start as u64,
        length: (end_pos - start) as u64,
        end_pos: end_pos as u64,
        trailer_end_pos: trailer_end_pos as u64,
        item_count,
        subsections,
    };
    log::debug!("Scanned xref table: {:?}", info);

    Ok(XrefSection {
        info,
        entries,
        trailer,
    })
}

/// Read `first count` at `pos`, returning the position after the line.
fn read_subsection_header(data: &[u8], pos: usize) -> Result<(u32, u32, usize)> {
    let line_end = data[pos..]
        .iter()
        .position(|&c| is_eol(c))
        .map_or(data.len(), |p| pos + p);
    let line = std::str::from_utf8(&data[pos..line_end])?;
    let mut parts = line.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(count), None) => {
            let first = first.parse().map_err(|_| Error::InvalidXref)?;
            let count = count.parse().map_err(|_| Error::InvalidXref)?;
            Ok((first, count, line_end))
        },
        _ => Err(Error::InvalidXref),
    }
}

/// Parse one `offset generation n|f` row.
fn parse_row(line: &[u8]) -> Result<XrefEntry> {
    let line = std::str::from_utf8(line)?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        log::warn!("Malformed xref row: {:?}", line);
        return Err(Error::InvalidXref);
    }

    let offset: u64 = parts[0].parse().map_err(|_| Error::InvalidXref)?;
    let generation: u16 = parts[1].parse().map_err(|_| Error::InvalidXref)?;
    match parts[2] {
        "n" => Ok(XrefEntry {
            offset,
            generation,
            in_use: true,
        }),
        "f" => Ok(XrefEntry::free(offset, generation)),
        other => {
            log::warn!("Invalid xref row type {:?}", other);
            Err(Error::InvalidXref)
        },
    }
}

/// Recognise a cross-reference stream and take its dictionary as trailer.
fn parse_stream_header(data: &[u8], start: usize) -> Result<XrefSection> {
    let (_, object) = parse_indirect_object_at(data, start)?;
    let trailer = match object {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    if trailer.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidXref);
    }

    let item_count = trailer
        .get("Size")
        .and_then(Object::as_integer)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(Error::InvalidXref)?;

    Ok(XrefSection {
        info: XrefInformation {
            kind: XrefKind::Stream,
            start_pos: start as u64,
            length: 0,
            end_pos: start as u64,
            trailer_end_pos: start as u64,
            item_count,
            subsections: 0,
        },
        entries: BTreeMap::new(),
        trailer,
    })
}
