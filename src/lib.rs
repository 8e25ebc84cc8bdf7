#![allow(clippy::too_many_arguments)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # pdf_sigstamp
//!
//! Incremental-update signing for PDF files: adds a signature field, its
//! optional image appearance, a replacement catalog and a signature
//! dictionary after the original bytes, then closes the update with an
//! extended xref table and a patched trailer.
//!
//! ## Core Features
//!
//! - **Byte-exact incremental update**: the original file is a prefix of the output
//! - **Xref rewriting**: old rows copied verbatim, one fixed-width row per new object
//! - **Trailer patching**: `/Root` and `/Size` replaced by key, everything else kept
//! - **Visible signatures**: JPEG image XObject drawn by a form XObject appearance
//! - **Signature placeholder**: fixed-width `/ByteRange`, zero-filled `/Contents`,
//!   patched in place after the pass
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_sigstamp::signatures::{sign_file, SignOptions, SignatureAppearance};
//!
//! let outcome = sign_file(
//!     "contract.pdf",
//!     "contract-signed.pdf",
//!     &SignatureAppearance::invisible(),
//!     SignOptions::default(),
//! )?;
//! println!("new catalog: {} 0 R, /Size {}", outcome.catalog.object_id, outcome.item_count);
//! # Ok::<(), pdf_sigstamp::error::Error>(())
//! ```
//!
//! ## Limitations
//!
//! Only classic cross-reference tables with a single subsection are
//! extended. Files whose latest section is an xref stream are rejected with
//! [`Error::UnsupportedXrefType`](error::Error::UnsupportedXrefType).
//! No cryptography is performed; the signature value is produced elsewhere
//! and inserted with [`signatures::PdfSigner::insert_signature`].

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod xref;

// Incremental writing
pub mod writer;

// Signature fields and signing pass
pub mod signatures;

pub use document::{PdfDocument, SourceDocument};
pub use error::{Error, Result};
pub use object::{Dictionary, Object, ObjectRef};
pub use signatures::{sign_file, SignContext, SignOptions, SignOutcome, SignatureAppearance};
