//! Media identifiers.
//!
//! A [`MediaName`] is the filename of an audio file in the library. It is the
//! primary key for both the media store and the playback position table, so it
//! must never be able to address anything outside the library directory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Longest filename accepted, in bytes.
const MAX_NAME_LEN: usize = 255;

/// A validated plain filename within the library.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaName(String);

impl MediaName {
    /// Validate `name` as a library filename.
    ///
    /// Rejects empty names, path separators, `..`, leading dots (hidden and
    /// partial files) and NUL bytes.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_argument("media name is empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(Error::invalid_argument("media name is too long"));
        }
        if name.contains('/') || name.contains('\\') || name.contains('\0') {
            return Err(Error::invalid_argument(format!(
                "media name contains a path separator: {name}"
            )));
        }
        if name.contains("..") || name.starts_with('.') {
            return Err(Error::invalid_argument(format!(
                "media name is not a plain filename: {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Build a name from a free-form title (e.g. a video title) and extension.
    ///
    /// Characters that are not allowed in a filename are replaced with `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use audioshelf_common::MediaName;
    ///
    /// let name = MediaName::from_title("Part 1/2: The Road", "m4a").unwrap();
    /// assert_eq!(name.as_str(), "Part 1_2_ The Road.m4a");
    /// ```
    pub fn from_title(title: &str, extension: &str) -> Result<Self> {
        let mut stem: String = title
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        while stem.contains("..") {
            stem = stem.replace("..", ".");
        }
        let stem = stem.trim().trim_matches('.').trim();
        let stem = if stem.is_empty() { "untitled" } else { stem };

        let extension = extension.trim().trim_matches('.');
        if extension.is_empty() {
            return Err(Error::invalid_argument("media extension is empty"));
        }
        let max_stem = MAX_NAME_LEN.saturating_sub(extension.len() + 1);
        let mut cut = stem.len().min(max_stem);
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        let stem = stem[..cut].trim_end_matches('.');

        Self::parse(format!("{stem}.{extension}"))
    }

    /// The filename as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for MediaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MediaName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MediaName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<MediaName> for String {
    fn from(name: MediaName) -> Self {
        name.0
    }
}

/// An audio file in the library together with its current size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub name: MediaName,
    pub size_bytes: u64,
}
