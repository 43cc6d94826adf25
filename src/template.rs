// LogIQ - Online log template mining
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Template identity and token helpers
//!
//! A template is a log message with every literal number replaced by the
//! wildcard marker [`WILDCARD`]. Templates are identified by a fixed-width
//! fingerprint of their text, so two lines that collapse to the same
//! template string always share a [`TemplateId`].

use crate::error::{LogiqError, Result};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh64::xxh64;

/// Marker substituted for variable tokens.
pub const WILDCARD: &str = "<*>";

/// Delimiter separating the line prefix (timestamp, severity, service) from the message.
pub const PREFIX_DELIMITER: char = ']';

/// Number of delimited segments a line needs before its prefix is stripped.
const PREFIX_SEGMENTS: usize = 3;

/// Fixed-width fingerprint of a template string.
///
/// Computed as xxh64 (seed 0) over the template bytes and rendered as
/// 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(u64);

impl TemplateId {
    /// Width of the hex rendering.
    pub const HEX_WIDTH: usize = 16;

    /// Fingerprint a template string.
    pub fn of(template: &str) -> Self {
        Self(xxh64(template.as_bytes(), 0))
    }

    /// Wrap a raw digest.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw 64-bit digest.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for TemplateId {
    type Err = LogiqError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != Self::HEX_WIDTH || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LogiqError::InvalidTemplateId(format!(
                "expected {} hex digits, got {:?}",
                Self::HEX_WIDTH,
                s
            )));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| LogiqError::InvalidTemplateId(format!("{}: {}", s, e)))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TemplateId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TemplateId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// Strip the `<prefix> ] <prefix> ] ` part of a line, keeping the message.
///
/// Lines with fewer than three `]`-delimited segments are returned whole.
/// Any `]` inside the message itself is preserved.
pub fn extract_message(line: &str) -> &str {
    let mut parts = line.splitn(PREFIX_SEGMENTS, PREFIX_DELIMITER);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(rest)) => rest.trim(),
        _ => line,
    }
}

/// Whether a token carries a numeric run and must be masked.
pub fn is_variable(token: &str) -> bool {
    token.bytes().any(|b| b.is_ascii_digit())
}

/// Replace every token containing a digit with [`WILDCARD`].
pub fn mask_tokens<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    tokens
        .iter()
        .map(|&t| if is_variable(t) { WILDCARD } else { t })
        .collect()
}

/// Pull the concrete values out of `original` where `template` holds a wildcard.
///
/// Positions are compared pairwise up to the shorter of the two sequences.
pub fn extract_parameters(original: &[&str], template: &[&str]) -> Vec<String> {
    original
        .iter()
        .zip(template.iter())
        .filter(|(o, t)| **t == WILDCARD && **o != WILDCARD)
        .map(|(o, _)| (*o).to_string())
        .collect()
}
