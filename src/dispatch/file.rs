//! Byte streams for file replies and static mounts.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::AsyncReadExt;

/// Chunked file contents, produced lazily.
pub type ByteStream = BoxStream<'static, Result<Bytes, io::Error>>;

const READ_CHUNK: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("file not found")]
    NotFound,
    #[error("path escapes the mount root")]
    Forbidden,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Source of static file contents.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Open `relative` under `root`.
    async fn open(&self, root: &Path, relative: &str) -> Result<ByteStream, FileError>;
}

/// Reads files from the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileSource;

#[async_trait]
impl FileSource for DiskFileSource {
    async fn open(&self, root: &Path, relative: &str) -> Result<ByteStream, FileError> {
        let path = resolve(root, relative)?;
        open_path(&path).await
    }
}

/// Join `relative` onto `root`, refusing anything that climbs out of it.
pub fn resolve(root: &Path, relative: &str) -> Result<PathBuf, FileError> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FileError::Forbidden)
            }
        }
    }
    Ok(path)
}

/// Stream a file from disk.
pub async fn open_path(path: &Path) -> Result<ByteStream, FileError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FileError::NotFound),
        Err(e) => return Err(e.into()),
    };
    if !file.metadata().await?.is_file() {
        return Err(FileError::NotFound);
    }

    Ok(stream::unfold(Some(file), |file| async move {
        let mut file = file?;
        let mut buf = vec![0u8; READ_CHUNK];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed())
}

/// A stream over bytes already in memory.
pub fn from_bytes(bytes: impl Into<Bytes>) -> ByteStream {
    stream::once(futures_util::future::ready(Ok(bytes.into()))).boxed()
}

/// Split a stream into frames of at most `size` bytes, coalescing small reads.
///
/// Bytes read before a source error are flushed first; the error is the
/// last item.
pub fn rechunk(source: ByteStream, size: usize) -> ByteStream {
    struct State {
        source: ByteStream,
        pending: BytesMut,
        error: Option<io::Error>,
        done: bool,
    }

    let size = size.max(1);
    let state = State {
        source,
        pending: BytesMut::new(),
        error: None,
        done: false,
    };
    stream::unfold(state, move |mut state| async move {
        loop {
            if state.pending.len() >= size {
                let frame = state.pending.split_to(size).freeze();
                return Some((Ok(frame), state));
            }
            if state.done && !state.pending.is_empty() {
                let frame = state.pending.split().freeze();
                return Some((Ok(frame), state));
            }
            if let Some(e) = state.error.take() {
                return Some((Err(e), state));
            }
            if state.done {
                return None;
            }
            match state.source.next().await {
                Some(Ok(chunk)) => state.pending.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.error = Some(e);
                    state.done = true;
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}
