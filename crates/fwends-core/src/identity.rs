//! # Identity Newtypes
//!
//! Domain-primitive newtypes for the identifiers that address packs and
//! their resource slots. Each identifier is a distinct type: a [`PackId`]
//! cannot be passed where a [`ResourceId`] is expected, and a [`RoleId`]
//! cannot be swapped with a [`StringId`] by argument order.
//!
//! ## Numeric identifiers
//!
//! [`PackId`] and [`ResourceId`] wrap Snowflake values (non-negative `i64`).
//! They serialize as decimal strings and deserialize from either a string or
//! an integer.
//!
//! ## Slot identifiers
//!
//! [`RoleId`] and [`StringId`] must match `^[a-z0-9_]{1,63}$`. The check is
//! done once, at construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;
use crate::resource::ResourceClass;

/// Maximum length of a role or string identifier.
pub const MAX_SLOT_ID_LEN: usize = 63;

/// Wire representation accepted when deserializing numeric ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericRepr {
    Text(String),
    Number(i64),
}

/// Plain decimal digits only; `i64::from_str` would also take a leading `+`.
fn parse_non_negative(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok()
}

// ---------------------------------------------------------------------------
// Numeric identifiers
// ---------------------------------------------------------------------------

/// Identifier of a pack, minted once by the Snowflake generator and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackId(i64);

impl PackId {
    /// Wrap a raw value, rejecting negative numbers.
    pub fn new(raw: i64) -> Result<Self, ValidationError> {
        if raw < 0 {
            return Err(ValidationError::InvalidPackId(raw.to_string()));
        }
        Ok(Self(raw))
    }

    /// Wrap a generator-issued value. The sign bit is cleared.
    pub(crate) fn from_generated(raw: i64) -> Self {
        Self(raw & i64::MAX)
    }

    /// The raw 63-bit value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PackId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_non_negative(s)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidPackId(s.to_string()))
    }
}

impl Serialize for PackId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PackId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumericRepr::deserialize(deserializer)? {
            NumericRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            NumericRepr::Number(n) => Self::new(n).map_err(serde::de::Error::custom),
        }
    }
}

/// Identifier of a single uploaded blob.
///
/// The decimal form is also the blob's object-store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(i64);

impl ResourceId {
    /// Wrap a raw value, rejecting negative numbers.
    pub fn new(raw: i64) -> Result<Self, ValidationError> {
        if raw < 0 {
            return Err(ValidationError::InvalidResourceId(raw.to_string()));
        }
        Ok(Self(raw))
    }

    /// Wrap a generator-issued value. The sign bit is cleared.
    pub(crate) fn from_generated(raw: i64) -> Self {
        Self(raw & i64::MAX)
    }

    /// The raw 63-bit value.
    pub fn get(self) -> i64 {
        self.0
    }

    /// Object-store key for this resource's blob.
    pub fn object_key(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_non_negative(s)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidResourceId(s.to_string()))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumericRepr::deserialize(deserializer)? {
            NumericRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            NumericRepr::Number(n) => Self::new(n).map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Slot identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// Whether `s` matches `^[a-z0-9_]{1,63}$`.
pub fn is_valid_slot_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SLOT_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// The role half of a slot coordinate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

impl RoleId {
    /// Create a role id, validating the identifier pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRoleId`] when the value does not
    /// match `^[a-z0-9_]{1,63}$`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if !is_valid_slot_id(&s) {
            return Err(ValidationError::InvalidRoleId(s));
        }
        Ok(Self(s))
    }

    /// Access the role id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoleId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleId> for String {
    fn from(value: RoleId) -> Self {
        value.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The string half of a slot coordinate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StringId(String);

impl StringId {
    /// Create a string id, validating the identifier pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStringId`] when the value does not
    /// match `^[a-z0-9_]{1,63}$`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if !is_valid_slot_id(&s) {
            return Err(ValidationError::InvalidStringId(s));
        }
        Ok(Self(s))
    }

    /// Access the string id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StringId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StringId> for String {
    fn from(value: StringId) -> Self {
        value.0
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty pack title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackTitle(String);

impl PackTitle {
    /// Create a title, rejecting the empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(Self(s))
    }

    /// Access the title text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackTitle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PackTitle> for String {
    fn from(value: PackTitle) -> Self {
        value.0
    }
}

/// Full key of a resource slot: `(pack, role, string, class)`.
///
/// Exactly one slot row may exist per key; its value is the id of the
/// resource currently occupying the slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    /// Owning pack.
    pub pack: PackId,
    /// Role coordinate.
    pub role: RoleId,
    /// String coordinate.
    pub string: StringId,
    /// Media class of the slot.
    pub class: ResourceClass,
}

impl SlotKey {
    /// The smallest key any slot of `pack` can have.
    ///
    /// Keys order pack first, so a range starting here visits that pack's
    /// slots before any other pack's.
    pub fn first_in(pack: PackId) -> Self {
        Self {
            pack,
            role: RoleId("0".to_owned()),
            string: StringId("0".to_owned()),
            class: ResourceClass::Image,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.pack, self.role, self.string, self.class)
    }
}
