mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./audioshelf.toml",
        "~/.config/audioshelf/config.toml",
        "/etc/audioshelf/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.library.extensions.is_empty() {
        anyhow::bail!("Library must list at least one file extension");
    }

    if config.library.max_upload_bytes == 0 {
        anyhow::bail!("library.max_upload_bytes cannot be 0");
    }

    if config.playback.state_file.as_os_str().is_empty() {
        anyhow::bail!("playback.state_file cannot be empty");
    }

    if let Some(ref dir) = config.server.static_dir {
        if !dir.exists() {
            tracing::warn!("Static directory does not exist: {:?}", dir);
        }
    }

    if config.fetch.enabled && config.fetch.format.trim().is_empty() {
        anyhow::bail!("fetch.format cannot be empty when fetching is enabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.library.path, Path::new("./audiobooks"));
        assert_eq!(
            config.playback.state_file,
            Path::new("./playback-times.json")
        );
        assert!(config.playback.backup_corrupt);
        assert!(!config.fetch.enabled);
        assert!(config.library.extensions.iter().any(|e| e == "mp3"));
        validate_config(&config).unwrap();
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [library]
            path = "/srv/books"
            extensions = ["mp3"]
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.library.extensions, vec!["mp3".to_string()]);
        assert_eq!(config.fetch.format, "bestaudio[ext=m4a]/bestaudio");
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_empty_extensions() {
        let mut config = Config::default();
        config.library.extensions.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audioshelf.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn load_config_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audioshelf.toml");
        std::fs::write(&path, "[playback]\nstate_file = \"/tmp/pos.json\"\n").unwrap();
        let config = load_config_or_default(Some(&path)).unwrap();
        assert_eq!(config.playback.state_file, Path::new("/tmp/pos.json"));
    }
}
