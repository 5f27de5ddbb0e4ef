use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use url::Url;

use crate::calendar::DEFAULT_COMICS_PER_PAGE;
use crate::cli::GlobalArgs;
use crate::history::ReadHistoryStore;
use crate::history::storage::FileStorage;
use crate::source::chunk::{DEFAULT_CHUNK_SIZE, DirChunkLoader, HttpChunkLoader};
use crate::source::remote::{HttpRemote, RemoteEndpoint, RemoteMode};
use crate::source::{ComicSource, DEFAULT_IMAGE_BASE};

pub const DEFAULT_REMOTE: &str = "https://xkcd.com";

/// Where pre-built chunk files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkLocation {
    Dir(PathBuf),
    Http(Url),
}

impl ChunkLocation {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            anyhow::bail!("chunk location is empty");
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw).with_context(|| format!("parse chunk url {raw:?}"))?;
            return Ok(Self::Http(url));
        }
        Ok(Self::Dir(PathBuf::from(raw)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub remote: Url,
    pub remote_mode: RemoteMode,
    pub chunks: Option<ChunkLocation>,
    pub image_base: String,
    pub chunk_size: u32,
    pub comics_per_page: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = match var("READXKCD_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => match var("HOME") {
                Some(home) => PathBuf::from(home).join(".readxkcd"),
                None => PathBuf::from(".readxkcd"),
            },
        };

        let remote_raw = var("READXKCD_REMOTE").unwrap_or_else(|| DEFAULT_REMOTE.to_owned());
        let remote = parse_http_url(&remote_raw)
            .with_context(|| format!("invalid READXKCD_REMOTE={remote_raw:?}"))?;

        let mode_raw = var("READXKCD_REMOTE_MODE").unwrap_or_default();
        let remote_mode = RemoteMode::parse(&mode_raw).with_context(|| {
            format!("invalid READXKCD_REMOTE_MODE={mode_raw:?}. expected one of: proxy, direct")
        })?;

        let chunks = var("READXKCD_CHUNKS")
            .map(|raw| {
                ChunkLocation::parse(&raw).with_context(|| format!("invalid READXKCD_CHUNKS={raw:?}"))
            })
            .transpose()?;

        let image_base = var("READXKCD_IMAGE_BASE").unwrap_or_else(|| DEFAULT_IMAGE_BASE.to_owned());
        let chunk_size = positive(var("READXKCD_CHUNK_SIZE"), "READXKCD_CHUNK_SIZE")?
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        let comics_per_page = positive(var("READXKCD_PER_PAGE"), "READXKCD_PER_PAGE")?
            .unwrap_or(DEFAULT_COMICS_PER_PAGE);

        Ok(Self {
            data_dir,
            remote,
            remote_mode,
            chunks,
            image_base,
            chunk_size,
            comics_per_page,
        })
    }

    /// Command-line flags take precedence over the environment.
    pub fn apply(&mut self, args: &GlobalArgs) -> anyhow::Result<()> {
        if let Some(dir) = &args.data_dir {
            self.data_dir.clone_from(dir);
        }
        if let Some(remote) = &args.remote {
            self.remote = parse_http_url(remote).with_context(|| format!("invalid --remote {remote:?}"))?;
        }
        if let Some(mode) = &args.remote_mode {
            self.remote_mode = RemoteMode::parse(mode)
                .with_context(|| format!("invalid --remote-mode {mode:?}"))?;
        }
        if let Some(chunks) = &args.chunks {
            self.chunks = Some(
                ChunkLocation::parse(chunks).with_context(|| format!("invalid --chunks {chunks:?}"))?,
            );
        }
        Ok(())
    }

    pub fn remote(&self) -> anyhow::Result<HttpRemote> {
        Ok(HttpRemote::new(
            HttpRemote::build_client()?,
            RemoteEndpoint::new(&self.remote, self.remote_mode),
        ))
    }

    pub fn source(&self) -> anyhow::Result<ComicSource> {
        let remote = self.remote()?;
        let mut source = ComicSource::new(Arc::new(remote))
            .with_chunk_size(self.chunk_size)
            .with_image_base(self.image_base.clone());
        source = match &self.chunks {
            Some(ChunkLocation::Dir(dir)) => source.with_chunks(Arc::new(DirChunkLoader::new(dir))),
            Some(ChunkLocation::Http(url)) => {
                let client = HttpRemote::build_client()?;
                source.with_chunks(Arc::new(HttpChunkLoader::new(client, url)))
            }
            None => source,
        };
        tracing::debug!(
            remote = %self.remote,
            mode = ?self.remote_mode,
            chunks = ?self.chunks,
            "configured comic source"
        );
        Ok(source)
    }

    pub fn history(&self) -> ReadHistoryStore {
        ReadHistoryStore::new(Arc::new(FileStorage::new(&self.data_dir)))
    }
}

fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("must be http/https: {url}");
    }
    Ok(url)
}

fn positive(raw: Option<String>, name: &str) -> anyhow::Result<Option<u32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => anyhow::bail!("invalid {name}={raw:?}. expected a positive integer"),
        Ok(value) => Ok(Some(value)),
    }
}
