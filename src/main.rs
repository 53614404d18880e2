mod cli;

use audioshelf::{
    config, fetch,
    library::{FsMediaStore, MediaStore},
    playback::PositionStore,
    server,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Audioshelf server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "audioshelf=trace,tower_http=debug".to_string()
        } else {
            "audioshelf=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::List => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_library(cli.config.as_deref()))
        }
        Commands::Positions => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(show_positions(cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("audioshelf {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn list_library(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = FsMediaStore::from_config(&config.library)
        .with_context(|| format!("Failed to open library {:?}", config.library.path))?;

    let items = store.items().await?;
    if items.is_empty() {
        println!("No audio files in {}", store.root().display());
        return Ok(());
    }

    for item in &items {
        println!("{:>10}  {}", format_size(item.size_bytes), item.name);
    }
    println!("\n{} file(s) in {}", items.len(), store.root().display());
    Ok(())
}

async fn show_positions(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let positions = PositionStore::from_config(&config.playback);

    let table = positions.snapshot().await?;
    if table.is_empty() {
        println!("No saved playback positions");
        return Ok(());
    }

    for (name, seconds) in &table {
        println!("{:>10}  {}", format_offset(*seconds), name);
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    match fetch::locate_yt_dlp(&config.fetch) {
        Some(path) => {
            print!("✓ yt-dlp");
            if let Ok(output) = std::process::Command::new(&path).arg("--version").output() {
                let version = String::from_utf8_lossy(&output.stdout);
                if let Some(line) = version.lines().next().filter(|l| !l.is_empty()) {
                    print!(" ({})", line);
                }
            }
            println!(" - {}", path.display());
            if !config.fetch.enabled {
                println!("\nFetching is disabled; set [fetch] enabled = true to use it.");
            }
        }
        None => {
            println!("✗ yt-dlp");
            println!("\nyt-dlp is missing. Install it to enable fetching from URLs.");
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Library: {}", config.library.path.display());
            println!("  Extensions: {}", config.library.extensions.join(", "));
            println!("  State file: {}", config.playback.state_file.display());
            println!("  Fetch enabled: {}", config.fetch.enabled);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Library: {}", config.library.path.display());
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_offset(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn offsets_are_clock_style() {
        assert_eq!(format_offset(0.0), "00:00:00");
        assert_eq!(format_offset(42.5), "00:00:42");
        assert_eq!(format_offset(3725.0), "01:02:05");
    }
}
