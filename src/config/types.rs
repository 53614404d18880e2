use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static player assets served for unmatched routes.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Directory holding the audio files.
    #[serde(default = "default_library_path")]
    pub path: PathBuf,

    /// Extensions listed in the library (case-insensitive, without the dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Largest accepted upload or fetch, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_library_path() -> PathBuf {
    PathBuf::from("./audiobooks")
}

fn default_extensions() -> Vec<String> {
    audioshelf_common::paths::audio_extensions()
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_max_upload_bytes() -> u64 {
    4 * 1024 * 1024 * 1024
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
            extensions: default_extensions(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// JSON file holding the `name -> seconds` position table.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Copy an unparsable table aside to `<state_file>.corrupt-<unix secs>`
    /// before it is overwritten.
    #[serde(default = "default_backup_corrupt")]
    pub backup_corrupt: bool,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("./playback-times.json")
}

fn default_backup_corrupt() -> bool {
    true
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            backup_corrupt: default_backup_corrupt(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Explicit yt-dlp binary; looked up on `PATH` when unset.
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// yt-dlp format selector for the audio stream.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "bestaudio[ext=m4a]/bestaudio".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            yt_dlp_path: None,
            format: default_format(),
        }
    }
}
