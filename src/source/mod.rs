//! Resolution of comic references to comics.
//!
//! Order: the built-in sentinel, then the local chunk cache, then the remote
//! service. `latest` always goes remote because the chunk cache is historical.

pub mod chunk;
pub mod remote;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::comic::{Comic, ComicRef, SENTINEL_ID};
use chunk::{Chunk, ChunkError, ChunkLoader, DEFAULT_CHUNK_SIZE, chunk_start, parse_chunk};
use remote::RemoteComics;

pub const DEFAULT_IMAGE_BASE: &str = "https://imgs.xkcd.com/comics/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("comic {0} not found")]
    NotFound(ComicRef),
    #[error("no reachable source for comic {comic}: {reason}")]
    Network { comic: ComicRef, reason: String },
    #[error("unreadable response for comic {comic}: {reason}")]
    Decode { comic: ComicRef, reason: String },
}

pub struct ComicSource {
    chunks: Option<Arc<dyn ChunkLoader>>,
    remote: Arc<dyn RemoteComics>,
    chunk_size: u32,
    image_base: String,
    loaded: Mutex<HashMap<u32, Arc<Chunk>>>,
}

impl ComicSource {
    pub fn new(remote: Arc<dyn RemoteComics>) -> Self {
        Self {
            chunks: None,
            remote,
            chunk_size: DEFAULT_CHUNK_SIZE,
            image_base: DEFAULT_IMAGE_BASE.to_owned(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_chunks(mut self, loader: Arc<dyn ChunkLoader>) -> Self {
        self.chunks = Some(loader);
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into();
        self
    }

    pub async fn resolve(&self, comic: ComicRef) -> Result<Comic, SourceError> {
        let id = match comic {
            ComicRef::Id(SENTINEL_ID) => return Ok(Comic::sentinel()),
            ComicRef::Latest => return self.remote.fetch(ComicRef::Latest).await,
            ComicRef::Id(id) => id,
        };

        if let Some(found) = self.resolve_local(id).await {
            return Ok(found);
        }
        self.remote.fetch(comic).await
    }

    async fn resolve_local(&self, id: u32) -> Option<Comic> {
        let loader = self.chunks.as_ref()?;
        let start = chunk_start(id, self.chunk_size);

        match self.chunk(loader.as_ref(), start).await {
            Ok(chunk) => {
                let found = chunk.get(id).map(|record| record.to_comic(&self.image_base));
                if found.is_none() {
                    tracing::debug!(id, start, "comic not in chunk; falling back to remote");
                }
                found
            }
            Err(err @ ChunkError::Missing { .. }) => {
                tracing::debug!(id, %err, "chunk cache miss; falling back to remote");
                None
            }
            Err(err) => {
                tracing::warn!(id, %err, "chunk cache unusable; falling back to remote");
                None
            }
        }
    }

    async fn chunk(&self, loader: &dyn ChunkLoader, start: u32) -> Result<Arc<Chunk>, ChunkError> {
        if let Some(chunk) = self.cached(start) {
            return Ok(chunk);
        }

        let text = loader.load(start).await?;
        let chunk = parse_chunk(&text)
            .map(Arc::new)
            .map_err(|reason| ChunkError::MalformedCache { start, reason })?;
        tracing::debug!(start, records = chunk.len(), "loaded chunk");

        // Concurrent loads of the same chunk store equal values.
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(start, Arc::clone(&chunk));
        Ok(chunk)
    }

    fn cached(&self, start: u32) -> Option<Arc<Chunk>> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&start)
            .cloned()
    }
}
