//! # Resource Classes
//!
//! Every slot holds exactly one of two media classes. The class is not chosen
//! by the client; it is derived from the upload's content type through a fixed
//! table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Media class of a pack resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// A still image.
    Image,
    /// An audio clip.
    Audio,
}

/// Content types accepted for upload, and the class each maps to.
pub const CONTENT_TYPES: &[(&str, ResourceClass)] = &[
    ("image/webp", ResourceClass::Image),
    ("image/jpeg", ResourceClass::Image),
    ("image/png", ResourceClass::Image),
    ("image/svg+xml", ResourceClass::Image),
    ("audio/aac", ResourceClass::Audio),
    ("audio/mpeg", ResourceClass::Audio),
    ("audio/wav", ResourceClass::Audio),
    ("audio/flac", ResourceClass::Audio),
];

impl ResourceClass {
    /// Both classes, in storage order.
    pub const ALL: [ResourceClass; 2] = [ResourceClass::Image, ResourceClass::Audio];

    /// Lowercase name used in storage and URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// Map a `Content-Type` header value to a class.
    ///
    /// Parameters after `;` are ignored and the media type is compared
    /// case-insensitively, so `Image/PNG; charset=binary` maps to
    /// [`ResourceClass::Image`].
    pub fn from_content_type(content_type: &str) -> Result<Self, ValidationError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        CONTENT_TYPES
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, class)| *class)
            .ok_or_else(|| ValidationError::UnsupportedContentType(content_type.to_string()))
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            other => Err(ValidationError::UnknownResourceClass(other.to_string())),
        }
    }
}
