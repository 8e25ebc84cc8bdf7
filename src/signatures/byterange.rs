//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of file
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.
//! The ByteRange itself is written as a fixed-width placeholder so it can be
//! filled in after the file is complete without moving any byte.

use crate::error::{Error, Result};

/// Fixed-width ByteRange value written into the signature dictionary.
pub const BYTE_RANGE_PLACEHOLDER: &str = "[0 0000000000 0000000000 0000000000]";

/// How far past the signature object start the dictionary keys are searched.
const SEARCH_WINDOW: usize = 4096;

/// Calculator for PDF signature byte ranges.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator for a DER signature of up to `estimated_signature_size` bytes.
    ///
    /// The placeholder is `(signature_size * 2) + 2` bytes: hex digits plus
    /// the angle brackets.
    pub fn new(estimated_signature_size: usize) -> Self {
        Self {
            placeholder_size: estimated_signature_size * 2 + 2,
        }
    }

    /// Create a ByteRange calculator with a specific placeholder size.
    pub fn with_placeholder_size(placeholder_size: usize) -> Self {
        Self {
            placeholder_size: placeholder_size.max(2),
        }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Zero-filled hex string reserving room for the signature.
    pub fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size - 2))
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// `contents_offset` is the byte offset of the opening `<`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Concatenate the two ranges covered by the signature.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let [offset1, length1, offset2, length2] = (*byte_range).map(|v| usize::try_from(v).unwrap_or(usize::MAX));

        let first = offset1
            .checked_add(length1)
            .filter(|&end| end <= pdf_data.len())
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange first range exceeds file size: {} + {} > {}",
                    byte_range[0],
                    byte_range[1],
                    pdf_data.len()
                ))
            })?;
        let second = offset2
            .checked_add(length2)
            .filter(|&end| end <= pdf_data.len())
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange second range exceeds file size: {} + {} > {}",
                    byte_range[2],
                    byte_range[3],
                    pdf_data.len()
                ))
            })?;

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..first]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..second]);
        Ok(signed_bytes)
    }

    /// Check that a ByteRange covers the whole file except one gap.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }

        let expected_end = file_size as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end || length2 < 0 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 > offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Offset of the first byte of the value following `key` (after whitespace).
    fn find_key_value(pdf_data: &[u8], sig_dict_offset: usize, key: &[u8], opener: u8) -> Option<usize> {
        let search_end = sig_dict_offset.saturating_add(SEARCH_WINDOW).min(pdf_data.len());
        let window = pdf_data.get(sig_dict_offset..search_end)?;

        let mut pos = 0;
        while pos + key.len() < window.len() {
            if window[pos..].starts_with(key) {
                let value = window[pos + key.len()..]
                    .iter()
                    .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
                    .map(|p| pos + key.len() + p);
                if let Some(value) = value.filter(|&v| window[v] == opener) {
                    return Some(sig_dict_offset + value);
                }
            }
            pos += 1;
        }

        None
    }

    /// Find the opening `<` of the /Contents value of the signature at `sig_dict_offset`.
    pub fn find_contents_offset(pdf_data: &[u8], sig_dict_offset: usize) -> Option<usize> {
        Self::find_key_value(pdf_data, sig_dict_offset, b"/Contents", b'<')
    }

    /// Find the opening `[` of the /ByteRange value of the signature at `sig_dict_offset`.
    pub fn find_byte_range_offset(pdf_data: &[u8], sig_dict_offset: usize) -> Option<usize> {
        Self::find_key_value(pdf_data, sig_dict_offset, b"/ByteRange", b'[')
    }

    /// Overwrite the fixed-width ByteRange placeholder at `offset` in place.
    ///
    /// The formatted array is padded with spaces before `]` so the file size
    /// does not change.
    pub fn patch_byte_range(pdf_data: &mut [u8], offset: usize, byte_range: &[i64; 4]) -> Result<()> {
        let width = BYTE_RANGE_PLACEHOLDER.len();
        let slot = offset
            .checked_add(width)
            .and_then(|end| pdf_data.get_mut(offset..end))
            .ok_or_else(|| Error::InvalidPdf("ByteRange placeholder exceeds file bounds".to_string()))?;

        if slot.first() != Some(&b'[') || slot.last() != Some(&b']') {
            return Err(Error::InvalidPdf(format!("No ByteRange placeholder at byte {}", offset)));
        }

        let formatted = format!("{} {} {} {}", byte_range[0], byte_range[1], byte_range[2], byte_range[3]);
        if formatted.len() + 2 > width {
            return Err(Error::InvalidPdf(format!(
                "ByteRange {} does not fit in {} bytes",
                formatted, width
            )));
        }

        let padded = format!("[{:<inner$}]", formatted, inner = width - 2);
        slot.copy_from_slice(padded.as_bytes());
        Ok(())
    }

    /// Replace the placeholder at `contents_offset` with `signature_hex`, zero-padded.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, signature_hex: &str) -> Result<()> {
        let sig_len = signature_hex.len() + 2;
        if sig_len > self.placeholder_size {
            return Err(Error::InvalidPdf(format!(
                "Signature ({} bytes) exceeds placeholder size ({} bytes)",
                sig_len, self.placeholder_size
            )));
        }

        let slot = contents_offset
            .checked_add(self.placeholder_size)
            .and_then(|end| pdf_data.get_mut(contents_offset..end))
            .ok_or_else(|| Error::InvalidPdf("Signature insertion would exceed file bounds".to_string()))?;
        if slot.first() != Some(&b'<') || slot.last() != Some(&b'>') {
            return Err(Error::InvalidPdf(format!("No /Contents placeholder at byte {}", contents_offset)));
        }

        let sig_value = format!("<{:0<inner$}>", signature_hex, inner = self.placeholder_size - 2);
        slot.copy_from_slice(sig_value.as_bytes());
        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(8192)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(1024);
        assert_eq!(calc.placeholder_size(), 2050);
    }

    #[test]
    fn test_generate_placeholder() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let placeholder = calc.generate_placeholder();
        assert_eq!(placeholder, "<00000000>");
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::with_placeholder_size(100);
        assert_eq!(calc.calculate_byte_range(1000, 400), [0, 400, 500, 500]);
    }

    #[test]
    fn test_format_byte_range() {
        assert_eq!(ByteRangeCalculator::format_byte_range(&[0, 100, 200, 300]), "[0 100 200 300]");
    }

    #[test]
    fn test_extract_signed_bytes() {
        let signed = ByteRangeCalculator::extract_signed_bytes(b"AAABBBCCC", &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
    }

    #[test]
    fn test_extract_signed_bytes_out_of_bounds() {
        assert!(ByteRangeCalculator::extract_signed_bytes(b"AAABBBCCC", &[0, 3, 6, 4]).is_err());
        assert!(ByteRangeCalculator::extract_signed_bytes(b"AAA", &[0, -1, 0, 0]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 50], 200).is_ok());
        assert!(ByteRangeCalculator::validate_byte_range(&[10, 100, 150, 50], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 100], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 160, 150, 50], 200).is_err());
    }

    #[test]
    fn test_find_offsets() {
        let data = b"9 0 obj\n<< /Type /Sig /ByteRange [0 0000000000 0000000000 0000000000] /Contents <0000> >>";
        let br = ByteRangeCalculator::find_byte_range_offset(data, 0).unwrap();
        assert_eq!(&data[br..br + BYTE_RANGE_PLACEHOLDER.len()], BYTE_RANGE_PLACEHOLDER.as_bytes());
        let contents = ByteRangeCalculator::find_contents_offset(data, 0).unwrap();
        assert_eq!(&data[contents..contents + 6], b"<0000>");
    }

    #[test]
    fn test_patch_byte_range_keeps_width() {
        let mut data = format!("/ByteRange {} /Contents", BYTE_RANGE_PLACEHOLDER).into_bytes();
        let before = data.len();
        ByteRangeCalculator::patch_byte_range(&mut data, 11, &[0, 400, 502, 498]).unwrap();
        assert_eq!(data.len(), before);
        let expected = format!("/ByteRange [0 400 502 498{}] /Contents", " ".repeat(21));
        assert_eq!(std::str::from_utf8(&data).unwrap(), expected);
    }

    #[test]
    fn test_patch_byte_range_rejects_wrong_offset() {
        let mut data = format!("/ByteRange {}", BYTE_RANGE_PLACEHOLDER).into_bytes();
        assert!(ByteRangeCalculator::patch_byte_range(&mut data, 3, &[0, 1, 2, 3]).is_err());
    }

    #[test]
    fn test_insert_signature() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        calc.insert_signature(&mut pdf_data, 2, "ABCD").unwrap();
        assert_eq!(&pdf_data, b"XX<ABCD0000>YY");
    }

    #[test]
    fn test_insert_signature_too_large() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        assert!(calc.insert_signature(&mut pdf_data, 2, "AABBCCDDEE").is_err());
    }
}
