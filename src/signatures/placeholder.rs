//! Signature dictionary placeholder and post-pass preparation.
//!
//! The signature object is appended with a zero-filled `/Contents` and a
//! fixed-width `/ByteRange`. Once the incremental update is complete the
//! caller loads the output, lets [`PdfSigner::prepare`] patch the ByteRange,
//! hands [`PdfSigner::signed_bytes`] to an external signer and writes the
//! result back with [`PdfSigner::insert_signature`].

use super::byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
use super::types::SignOptions;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::writer::ObjectSerializer;
use chrono::{DateTime, Utc};

/// Where the signature value goes in a finished file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedSignature {
    /// The ByteRange written into the file
    pub byte_range: [i64; 4],
    /// Offset of the `<` opening the /Contents value
    pub contents_offset: usize,
}

/// Builds signature placeholders and fills them after the pass.
#[derive(Debug)]
pub struct PdfSigner {
    options: SignOptions,
    byte_range_calc: ByteRangeCalculator,
}

impl PdfSigner {
    /// Create a signer with the given options.
    pub fn new(options: SignOptions) -> Self {
        let byte_range_calc = ByteRangeCalculator::new(options.estimated_size);
        Self {
            options,
            byte_range_calc,
        }
    }

    /// Get the signing options.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Bytes reserved for `/Contents` including the angle brackets.
    pub fn placeholder_size(&self) -> usize {
        self.byte_range_calc.placeholder_size()
    }

    /// Signature dictionary with the current time as `/M`.
    pub fn build_placeholder(&self) -> Vec<u8> {
        self.build_placeholder_at(Utc::now())
    }

    /// Signature dictionary with `signing_time` as `/M`.
    pub fn build_placeholder_at(&self, signing_time: DateTime<Utc>) -> Vec<u8> {
        let mut dict = String::from("<<\n");
        dict.push_str("  /Type /Sig\n");
        dict.push_str("  /Filter /Adobe.PPKLite\n");
        dict.push_str(&format!("  /SubFilter /{}\n", self.options.sub_filter.as_pdf_name()));
        dict.push_str(&format!("  /ByteRange {}\n", BYTE_RANGE_PLACEHOLDER));
        dict.push_str(&format!("  /Contents {}\n", self.byte_range_calc.generate_placeholder()));

        let optional = [
            ("Name", &self.options.name),
            ("Reason", &self.options.reason),
            ("Location", &self.options.location),
            ("ContactInfo", &self.options.contact_info),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                dict.push_str(&format!("  /{} {}\n", key, pdf_text(value)));
            }
        }

        dict.push_str(&format!("  /M ({})\n", format_pdf_date(signing_time)));
        dict.push_str(">>");
        dict.into_bytes()
    }

    /// Patch the ByteRange of the signature object at `signature_offset`.
    ///
    /// `pdf_data` must be the complete output of the pass.
    pub fn prepare(&self, pdf_data: &mut [u8], signature_offset: u64) -> Result<PreparedSignature> {
        let sig_offset = usize::try_from(signature_offset)
            .map_err(|_| Error::InvalidPdf(format!("signature offset {} out of range", signature_offset)))?;

        let contents_offset = ByteRangeCalculator::find_contents_offset(pdf_data, sig_offset)
            .ok_or_else(|| Error::InvalidPdf(format!("no /Contents in signature at byte {}", sig_offset)))?;
        let byte_range_offset = ByteRangeCalculator::find_byte_range_offset(pdf_data, sig_offset)
            .ok_or_else(|| Error::InvalidPdf(format!("no /ByteRange in signature at byte {}", sig_offset)))?;

        let byte_range = self
            .byte_range_calc
            .calculate_byte_range(pdf_data.len(), contents_offset);
        ByteRangeCalculator::validate_byte_range(&byte_range, pdf_data.len())?;
        ByteRangeCalculator::patch_byte_range(pdf_data, byte_range_offset, &byte_range)?;

        log::debug!("ByteRange {}", ByteRangeCalculator::format_byte_range(&byte_range));
        Ok(PreparedSignature {
            byte_range,
            contents_offset,
        })
    }

    /// The bytes an external signer has to sign.
    pub fn signed_bytes(pdf_data: &[u8], prepared: &PreparedSignature) -> Result<Vec<u8>> {
        ByteRangeCalculator::extract_signed_bytes(pdf_data, &prepared.byte_range)
    }

    /// Write a DER signature into the `/Contents` placeholder.
    pub fn insert_signature(&self, pdf_data: &mut [u8], prepared: &PreparedSignature, signature: &[u8]) -> Result<()> {
        self.byte_range_calc
            .insert_signature(pdf_data, prepared.contents_offset, &bytes_to_hex(signature))
    }
}

/// Convert bytes to uppercase hex string.
fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

/// Text string: a literal for ASCII, otherwise UTF-16BE with a byte order mark.
fn pdf_text(value: &str) -> String {
    let bytes = if value.is_ascii() {
        value.as_bytes().to_vec()
    } else {
        let mut utf16 = vec![0xFE, 0xFF];
        utf16.extend(value.encode_utf16().flat_map(u16::to_be_bytes));
        utf16
    };
    ObjectSerializer::compact().serialize_to_string(&Object::String(bytes))
}

/// Format a timestamp as a PDF date: `D:YYYYMMDDHHmmSS+00'00'`.
pub fn format_pdf_date(time: DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}
