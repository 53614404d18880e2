//! Audioshelf-Common: shared types, errors, and path utilities.
//!
//! - **Media names**: validated filenames used as the key for both the media
//!   library and the playback position table
//! - **Path utilities**: audio extension checks and content-type lookup
//! - **Error handling**: the unified [`Error`] with its HTTP status mapping
//!
//! # Examples
//!
//! ```
//! use audioshelf_common::{Error, MediaName, Result};
//! use audioshelf_common::paths::content_type_for;
//!
//! let name = MediaName::parse("dune.m4b").unwrap();
//! assert_eq!(content_type_for(name.as_str()), "audio/mp4");
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("media", "missing.mp3"))
//! }
//! assert_eq!(example().unwrap_err().http_status(), 404);
//! ```

pub mod error;
pub mod media;
pub mod paths;

pub use error::{Error, Result};
pub use media::{MediaItem, MediaName};
