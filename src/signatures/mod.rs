//! Signature fields and incremental signing.
//!
//! A signing pass appends, after the untouched original file:
//!
//! - the appearance image and form XObject (visible signatures only)
//! - the signature field widget annotation
//! - a replacement catalog whose `/AcroForm` lists the new field
//! - the signature dictionary
//!
//! followed by the extended xref table and the patched trailer.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_sigstamp::document::PdfDocument;
//! use pdf_sigstamp::signatures::{PdfSigner, SignContext, SignOptions, SignatureAppearance};
//!
//! let doc = PdfDocument::open("contract.pdf")?;
//! let signer = PdfSigner::new(SignOptions::default().with_reason("Approved"));
//! let appearance = SignatureAppearance::invisible();
//!
//! let (mut signed, outcome) =
//!     SignContext::new(doc.data(), Vec::new(), &doc, &appearance, signer.build_placeholder()).sign()?;
//!
//! let prepared = signer.prepare(&mut signed, outcome.signature.offset)?;
//! let to_sign = PdfSigner::signed_bytes(&signed, &prepared)?;
//! # let pkcs7: Vec<u8> = to_sign;
//! signer.insert_signature(&mut signed, &prepared, &pkcs7)?;
//! # Ok::<(), pdf_sigstamp::error::Error>(())
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 7.5.6 - Incremental Updates
//! - ISO 32000-1:2008 Section 12.7.4.5 - Signature Fields
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures

mod byterange;
mod catalog;
mod context;
mod placeholder;
mod types;
mod visual;

pub use byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
pub use catalog::{build_catalog, SIG_FLAGS};
pub use context::{sign_file, SignContext, SignOutcome};
pub use placeholder::{format_pdf_date, PdfSigner, PreparedSignature};
pub use types::{AnnotationFlags, Rect, SignOptions, SignatureAppearance, SignatureSubFilter};
pub use visual::{CatalogData, VisualSignatureBuilder, VisualSignatureData};
