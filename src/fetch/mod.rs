//! Fetch audio from remote video/audio pages into the library.
//!
//! [`YtDlpFetcher`] shells out to `yt-dlp`: one quick run resolves the title
//! and container extension, a second run streams the selected audio format
//! to stdout, which is piped straight into the media store.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_stream::try_stream;
use audioshelf_common::{Error, MediaName, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::io::ReaderStream;

use crate::config::FetchConfig;
use crate::library::{ByteStream, READ_CHUNK_SIZE};

const TOOL: &str = "yt-dlp";

/// Limit for the metadata run; the download itself is bounded by the client.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Audio resolved from a URL, ready to be stored.
pub struct FetchedAudio {
    pub title: String,
    /// Container extension without the dot, e.g. `m4a`.
    pub extension: String,
    pub stream: ByteStream,
}

impl FetchedAudio {
    /// Library name derived from the title and extension.
    pub fn media_name(&self) -> Result<MediaName> {
        MediaName::from_title(&self.title, &self.extension)
    }
}

#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_audio(&self, url: &str) -> Result<FetchedAudio>;
}

/// Locate `yt-dlp`: the configured path if it exists, otherwise `PATH`.
pub fn locate_yt_dlp(config: &FetchConfig) -> Option<PathBuf> {
    match config.yt_dlp_path.as_deref() {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(path) => {
            tracing::warn!(
                "Configured yt-dlp path does not exist: {:?}, searching PATH",
                path
            );
            which::which(TOOL).ok()
        }
        None => which::which(TOOL).ok(),
    }
}

/// Only absolute `http`/`https` URLs are handed to the tool.
pub fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .ok_or_else(|| Error::invalid_argument("url must start with http:// or https://"))?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(Error::invalid_argument("url has no host"));
    }
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::invalid_argument("url contains whitespace"));
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    format: String,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
        }
    }

    /// Build a fetcher when fetching is enabled and the tool can be found.
    pub fn from_config(config: &FetchConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match locate_yt_dlp(config) {
            Some(program) => {
                tracing::info!("Fetching enabled using {:?}", program);
                Some(Self::new(program, config.format.clone()))
            }
            None => {
                tracing::warn!("Fetching is enabled but yt-dlp was not found; /fetch is disabled");
                None
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn probe(&self, url: &str) -> Result<(String, String)> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--skip-download", "--no-playlist", "--no-warnings"])
            .args(["--print", "%(title)s\t%(ext)s"])
            .args(["-f", self.format.as_str()])
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!("Probing {} with {:?}", url, self.program);

        let output = tokio::time::timeout(PROBE_TIMEOUT, cmd.output())
            .await
            .map_err(|_| Error::tool(TOOL, format!("timed out after {:?}", PROBE_TIMEOUT)))?
            .map_err(|e| Error::tool(TOOL, format!("failed to execute: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool(
                TOOL,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn spawn_download(&self, url: &str) -> Result<Child> {
        Command::new(&self.program)
            .args(["--no-playlist", "--no-warnings", "--quiet", "--no-progress"])
            .args(["-f", self.format.as_str()])
            .args(["-o", "-"])
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool(TOOL, format!("failed to execute: {e}")))
    }
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch_audio(&self, url: &str) -> Result<FetchedAudio> {
        let url = validate_url(url)?;
        let (title, extension) = self.probe(url).await?;
        let child = self.spawn_download(url)?;

        tracing::info!(title = %title, "Downloading audio from {}", url);

        Ok(FetchedAudio {
            title,
            extension,
            stream: child_stdout(child)?.boxed(),
        })
    }
}

/// Parse the `--print "%(title)s\t%(ext)s"` output.
fn parse_probe_output(stdout: &str) -> Result<(String, String)> {
    let line = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::tool(TOOL, "printed no metadata"))?;
    let (title, ext) = line
        .rsplit_once('\t')
        .ok_or_else(|| Error::tool(TOOL, format!("unexpected metadata line: {line:?}")))?;

    let ext = ext.trim().to_ascii_lowercase();
    if ext.is_empty() || ext == "na" || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::tool(TOOL, format!("unusable extension: {ext:?}")));
    }
    Ok((title.trim().to_string(), ext))
}

/// Stream the child's stdout; a non-zero exit turns into a trailing error.
///
/// The child is killed if the stream is dropped early.
fn child_stdout(mut child: Child) -> Result<impl Stream<Item = io::Result<Bytes>> + Send> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("yt-dlp stdout was not captured".into()))?;
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf).await;
        }
        buf
    });

    Ok(try_stream! {
        let mut reader = ReaderStream::with_capacity(stdout, READ_CHUNK_SIZE);
        while let Some(chunk) = reader.next().await {
            yield chunk?;
        }

        let status = child.wait().await?;
        if !status.success() {
            let stderr = stderr_task.await.unwrap_or_default();
            Err::<(), io::Error>(io::Error::other(format!(
                "yt-dlp exited with {status}: {}",
                stderr.trim()
            )))?;
        }
    })
}
