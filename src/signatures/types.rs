//! Signature configuration types.

use crate::object::Object;
use bitflags::bitflags;
use image::DynamicImage;

bitflags! {
    /// Annotation flags (ISO 32000-1:2008, Table 165).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnnotationFlags: u32 {
        /// Bit 1: Do not display an unknown annotation type
        const INVISIBLE = 1 << 0;
        /// Bit 2: Do not display or print
        const HIDDEN = 1 << 1;
        /// Bit 3: Print the annotation when the page is printed
        const PRINT = 1 << 2;
        /// Bit 4: Do not scale with page zoom
        const NO_ZOOM = 1 << 3;
        /// Bit 5: Do not rotate with the page
        const NO_ROTATE = 1 << 4;
        /// Bit 6: Do not display on screen
        const NO_VIEW = 1 << 5;
        /// Bit 7: Do not allow interaction
        const READ_ONLY = 1 << 6;
        /// Bit 8: Do not allow deletion or changes to properties
        const LOCKED = 1 << 7;
    }
}

impl AnnotationFlags {
    /// Flags used on signature widgets: Print | Locked.
    pub fn signature_widget() -> Self {
        Self::PRINT | Self::LOCKED
    }
}

/// Rectangle in default user space: lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Lower-left x
    pub llx: f64,
    /// Lower-left y
    pub lly: f64,
    /// Upper-right x
    pub urx: f64,
    /// Upper-right y
    pub ury: f64,
}

impl Rect {
    /// Create a rectangle from its corners.
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// The `[0 0 0 0]` rectangle of an invisible field.
    pub fn zero() -> Self {
        Self::default()
    }

    /// PDF array form `[llx lly urx ury]`.
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.llx),
            Object::Real(self.lly),
            Object::Real(self.urx),
            Object::Real(self.ury),
        ])
    }
}

/// Where and how the signature field shows up.
#[derive(Debug, Clone, Default)]
pub struct SignatureAppearance {
    /// Whether the widget is drawn
    pub visible: bool,
    /// 1-based page the widget belongs to
    pub page: u32,
    /// Widget rectangle (ignored when invisible)
    pub rect: Rect,
    /// Image painted into the widget (required when visible)
    pub image: Option<DynamicImage>,
}

impl SignatureAppearance {
    /// An invisible field attached to page 1.
    pub fn invisible() -> Self {
        Self {
            visible: false,
            page: 1,
            rect: Rect::zero(),
            image: None,
        }
    }

    /// A visible field showing `image` inside `rect` on `page`.
    pub fn visible(page: u32, rect: Rect, image: DynamicImage) -> Self {
        Self {
            visible: true,
            page,
            rect,
            image: Some(image),
        }
    }

    /// Attach the field to another page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Options for the signature dictionary placeholder.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Signature sub-filter (format)
    pub sub_filter: SignatureSubFilter,
    /// Name of the signer
    pub name: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Location where the document was signed
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Bytes reserved for the signature value in `/Contents`
    pub estimated_size: usize,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            sub_filter: SignatureSubFilter::Pkcs7Detached,
            name: None,
            reason: None,
            location: None,
            contact_info: None,
            estimated_size: 8192,
        }
    }
}

impl SignOptions {
    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set contact information.
    pub fn with_contact_info(mut self, contact_info: impl Into<String>) -> Self {
        self.contact_info = Some(contact_info.into());
        self
    }

    /// Set the sub-filter.
    pub fn with_sub_filter(mut self, sub_filter: SignatureSubFilter) -> Self {
        self.sub_filter = sub_filter;
        self
    }

    /// Reserve `bytes` for the signature value.
    pub fn with_estimated_size(mut self, bytes: usize) -> Self {
        self.estimated_size = bytes;
        self
    }
}
