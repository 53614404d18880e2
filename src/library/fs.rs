//! Directory-backed media store.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_stream::try_stream;
use audioshelf_common::paths::has_extension;
use audioshelf_common::{Error, MediaName, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use super::{ByteStream, MediaStore, READ_CHUNK_SIZE};
use crate::config::LibraryConfig;

/// Media store over a single flat directory.
///
/// Uploads are written to a uniquely named hidden `.{name}.<random>.partial`
/// file next to their destination and renamed into place once complete, so
/// a listing never shows half-written files and concurrent uploads of one
/// name never write into the same file.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
    extensions: Vec<String>,
    max_upload_bytes: u64,
}

impl FsMediaStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn new(
        root: impl Into<PathBuf>,
        extensions: Vec<String>,
        max_upload_bytes: u64,
    ) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            extensions,
            max_upload_bytes,
        })
    }

    pub fn from_config(config: &LibraryConfig) -> Result<Self> {
        Self::new(
            config.path.clone(),
            config.extensions.clone(),
            config.max_upload_bytes,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &MediaName) -> PathBuf {
        self.root.join(name.as_str())
    }

    fn create_partial(&self, name: &MediaName) -> Result<NamedTempFile> {
        let partial = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".partial")
            .tempfile_in(&self.root)?;
        Ok(partial)
    }

    async fn open(&self, name: &MediaName) -> Result<tokio::fs::File> {
        tokio::fs::File::open(self.path_of(name))
            .await
            .map_err(|e| not_found_or_io(e, name))
    }

    async fn write_partial(
        &self,
        mut file: tokio::fs::File,
        name: &MediaName,
        mut body: ByteStream,
    ) -> Result<u64> {
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_upload_bytes {
                return Err(Error::invalid_argument(format!(
                    "{name} exceeds the {} byte upload limit",
                    self.max_upload_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

fn not_found_or_io(e: io::Error, name: &MediaName) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::not_found("media", name)
    } else {
        Error::from(e)
    }
}

/// Pass `inner` through, failing with `UnexpectedEof` if it ends before
/// `expected` bytes were produced (the file shrank under us).
fn exact_length<S>(inner: S, expected: u64) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    try_stream! {
        let mut inner = Box::pin(inner);
        let mut produced: u64 = 0;
        while let Some(chunk) = inner.next().await {
            let chunk = chunk?;
            produced += chunk.len() as u64;
            yield chunk;
        }
        if produced < expected {
            Err::<(), io::Error>(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended after {produced} of {expected} bytes"),
            ))?;
        }
    }
}

#[async_trait::async_trait]
impl MediaStore for FsMediaStore {
    async fn list(&self) -> Result<Vec<MediaName>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !has_extension(&path, &self.extensions) {
                continue;
            }
            // Follow symlinks so linked-in books are listed too.
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::debug!(path = %path.display(), "Skipping non-UTF-8 file name");
                continue;
            };
            if let Ok(name) = MediaName::parse(file_name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn stat(&self, name: &MediaName) -> Result<u64> {
        let meta = tokio::fs::metadata(self.path_of(name))
            .await
            .map_err(|e| not_found_or_io(e, name))?;
        if !meta.is_file() {
            return Err(Error::not_found("media", name));
        }
        Ok(meta.len())
    }

    async fn open_reader(&self, name: &MediaName) -> Result<(u64, ByteStream)> {
        let file = self.open(name).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(Error::not_found("media", name));
        }
        let size = meta.len();

        let stream = ReaderStream::with_capacity(file.take(size), READ_CHUNK_SIZE);
        Ok((size, exact_length(stream, size).boxed()))
    }

    async fn open_range_reader(
        &self,
        name: &MediaName,
        start: u64,
        end: u64,
    ) -> Result<ByteStream> {
        if end < start {
            return Err(Error::invalid_argument(format!(
                "range end {end} precedes start {start}"
            )));
        }
        let length = end - start + 1;

        let mut file = self.open(name).await?;
        file.seek(SeekFrom::Start(start)).await?;

        let limited = file.take(length);
        let stream = ReaderStream::with_capacity(limited, READ_CHUNK_SIZE);
        Ok(exact_length(stream, length).boxed())
    }

    async fn put(&self, name: &MediaName, body: ByteStream) -> Result<u64> {
        // Dropping `partial` removes the temp file.
        let (file, partial) = self.create_partial(name)?.into_parts();
        let written = self
            .write_partial(tokio::fs::File::from_std(file), name, body)
            .await?;

        let dest = self.path_of(name);
        tokio::task::spawn_blocking(move || partial.persist(dest))
            .await
            .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))?
            .map_err(|e| Error::from(e.error))?;

        tracing::info!(name = %name, bytes = written, "Stored media file");
        Ok(written)
    }

    async fn delete(&self, name: &MediaName) -> Result<()> {
        tokio::fs::remove_file(self.path_of(name))
            .await
            .map_err(|e| not_found_or_io(e, name))?;
        tracing::info!(name = %name, "Deleted media file");
        Ok(())
    }

    fn accepts(&self, name: &MediaName) -> bool {
        has_extension(Path::new(name.as_str()), &self.extensions)
    }
}
