//! Path utilities for recognising audio files by extension.

use std::path::Path;

/// Audio extensions listed in the library unless configured otherwise.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "mpeg", "m4a", "m4b", "ogg", "opus", "flac", "aac",
];

/// Default list of audio file extensions.
///
/// # Examples
///
/// ```
/// use audioshelf_common::paths::audio_extensions;
///
/// assert!(audio_extensions().contains(&"mp3"));
/// assert!(audio_extensions().contains(&"m4b"));
/// ```
#[must_use]
pub fn audio_extensions() -> &'static [&'static str] {
    AUDIO_EXTENSIONS
}

/// Check whether `path` has one of `extensions` (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use audioshelf_common::paths::has_extension;
///
/// let exts = ["mp3".to_string(), "wav".to_string()];
/// assert!(has_extension(Path::new("Book.MP3"), &exts));
/// assert!(!has_extension(Path::new("cover.jpg"), &exts));
/// ```
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.as_ref().eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Guess the MIME type from a file name's extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "m4b" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}
