//! Writing the incremental update.
//!
//! ## Architecture
//!
//! ```text
//! original bytes (copied verbatim)
//!     ↓
//! [ObjectAppender] image XObject? → form XObject? → annotation → catalog → signature
//!     ↓
//! [rewrite_xref] old table + one row per appended object
//!     ↓
//! [rewrite_trailer] old trailer with /Root and /Size patched, startxref, %%EOF
//! ```
//!
//! [`ObjectSerializer`] turns the object model into bytes for every
//! appended dictionary and stream.

pub mod appender;
mod appearance_stream;
mod image_handler;
mod object_serializer;
pub mod trailer_writer;
pub mod xref_writer;

pub use appender::{AppendedObject, ObjectAppender};
pub use appearance_stream::{image_resource_name, ImageAppearance};
pub use image_handler::{JpegImage, JPEG_QUALITY};
pub use object_serializer::{format_real, ObjectSerializer};
pub use trailer_writer::{patch_trailer, rewrite_trailer};
pub use xref_writer::{check_rewritable, rewrite_xref};
