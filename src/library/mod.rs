//! Media library storage.
//!
//! The server never touches the filesystem directly; it goes through a
//! [`MediaStore`], which behaves like a flat blob store keyed by
//! [`MediaName`]. [`FsMediaStore`] is the directory-backed implementation.

mod fs;

pub use fs::FsMediaStore;

use audioshelf_common::{MediaItem, MediaName, Result};
use bytes::Bytes;
use futures::stream::BoxStream;

/// Chunk size used when streaming files out of the store.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// An incremental stream of file bytes.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Flat blob store holding the audio files.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Names of all audio files, sorted.
    async fn list(&self) -> Result<Vec<MediaName>>;

    /// Current size of `name` in bytes.
    ///
    /// Fails with `NotFound` when the file does not exist.
    async fn stat(&self, name: &MediaName) -> Result<u64>;

    /// Stream the whole file, returning its length at open time.
    ///
    /// The stream yields exactly that many bytes or ends with an error, even
    /// if the file is replaced or resized while it is being read.
    async fn open_reader(&self, name: &MediaName) -> Result<(u64, ByteStream)>;

    /// Stream the inclusive byte range `[start, end]`.
    ///
    /// The stream yields exactly `end - start + 1` bytes or ends with an
    /// error.
    async fn open_range_reader(&self, name: &MediaName, start: u64, end: u64)
        -> Result<ByteStream>;

    /// Store `body` under `name`, replacing any existing file.
    ///
    /// The file only becomes visible once the whole body has been written.
    /// Returns the number of bytes stored.
    async fn put(&self, name: &MediaName, body: ByteStream) -> Result<u64>;

    /// Remove `name` from the store.
    async fn delete(&self, name: &MediaName) -> Result<()>;

    /// Whether `name` has an extension the library lists.
    fn accepts(&self, name: &MediaName) -> bool;

    /// List every item together with its current size.
    ///
    /// Items that vanish between listing and stat are skipped.
    async fn items(&self) -> Result<Vec<MediaItem>> {
        let mut items = Vec::new();
        for name in self.list().await? {
            match self.stat(&name).await {
                Ok(size_bytes) => items.push(MediaItem { name, size_bytes }),
                Err(audioshelf_common::Error::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }
}
