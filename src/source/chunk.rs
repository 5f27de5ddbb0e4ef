use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use url::Url;

use crate::comic::{Comic, Trust, non_empty, published_date};
use crate::interactive::is_interactive;

pub const DEFAULT_CHUNK_SIZE: u32 = 500;
pub const CHUNK_SEPARATOR: char = '\t';

/// Column order written by the cache builder. Readers match columns by name.
pub const CHUNK_FIELDS: [&str; 9] = [
    "num",
    "safe_title",
    "img",
    "alt",
    "link",
    "news",
    "year",
    "month",
    "day",
];

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk {start} is not in the cache")]
    Missing { start: u32 },
    #[error("chunk {start} is unreachable: {reason}")]
    Unreachable { start: u32, reason: String },
    #[error("chunk {start} is malformed: {reason}")]
    MalformedCache { start: u32, reason: String },
}

/// First id-space offset of the chunk holding `id`. Chunk 0 covers `1..=size`.
#[must_use]
pub fn chunk_start(id: u32, chunk_size: u32) -> u32 {
    let size = chunk_size.max(1);
    (id.saturating_sub(1) / size) * size
}

#[must_use]
pub fn chunk_resource_name(start: u32) -> String {
    format!("xkcd_{start}.tsv")
}

/// Fetches the raw text of one chunk resource.
#[async_trait]
pub trait ChunkLoader: Send + Sync {
    async fn load(&self, start: u32) -> Result<String, ChunkError>;
}

#[derive(Debug, Clone)]
pub struct DirChunkLoader {
    dir: PathBuf,
}

impl DirChunkLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ChunkLoader for DirChunkLoader {
    async fn load(&self, start: u32) -> Result<String, ChunkError> {
        let path = self.dir.join(chunk_resource_name(start));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ChunkError::Missing { start })
            }
            Err(err) => Err(ChunkError::Unreachable {
                start,
                reason: format!("read {}: {err}", path.display()),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpChunkLoader {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpChunkLoader {
    pub fn new(client: reqwest::Client, base_url: &Url) -> Self {
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }
}

#[async_trait]
impl ChunkLoader for HttpChunkLoader {
    async fn load(&self, start: u32) -> Result<String, ChunkError> {
        let url = self
            .base_url
            .join(&chunk_resource_name(start))
            .map_err(|err| ChunkError::Unreachable {
                start,
                reason: format!("build chunk url: {err}"),
            })?;

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|err| ChunkError::Unreachable {
                start,
                reason: format!("GET {url}: {err}"),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ChunkError::Missing { start });
        }
        if !status.is_success() {
            return Err(ChunkError::Unreachable {
                start,
                reason: format!("GET {url}: status {status}"),
            });
        }

        response.text().await.map_err(|err| ChunkError::Unreachable {
            start,
            reason: format!("read body of {url}: {err}"),
        })
    }
}

/// One row of a chunk file, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub num: u32,
    pub safe_title: String,
    /// File name relative to the image base address, or an absolute URL.
    pub img: Option<String>,
    pub alt: String,
    pub link: Option<String>,
    pub news: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl ChunkRecord {
    /// Projects the stored row into a trusted [`Comic`].
    ///
    /// Interactivity comes from the allow-list, not the stored row, since
    /// comics can be added to the allow-list after a chunk was built.
    #[must_use]
    pub fn to_comic(&self, image_base: &str) -> Comic {
        let is_interactive = is_interactive(i64::from(self.num));
        let image_url = if is_interactive {
            None
        } else {
            self.img.as_ref().map(|img| {
                if img.starts_with("https://") || img.starts_with("http://") {
                    img.clone()
                } else {
                    format!("{image_base}{img}")
                }
            })
        };

        Comic {
            id: self.num,
            title: self.safe_title.clone(),
            alt_text: self.alt.clone(),
            image_url,
            is_interactive,
            external_link: self.link.clone(),
            news_html: self.news.clone(),
            published: published_date(self.year, self.month, self.day),
            trust: Trust::Trusted,
        }
    }

    fn field(&self, name: &str) -> String {
        let value = match name {
            "num" => self.num.to_string(),
            "safe_title" => self.safe_title.clone(),
            "img" => self.img.clone().unwrap_or_default(),
            "alt" => self.alt.clone(),
            "link" => self.link.clone().unwrap_or_default(),
            "news" => self.news.clone().unwrap_or_default(),
            "year" => self.year.map(|v| v.to_string()).unwrap_or_default(),
            "month" => self.month.map(|v| v.to_string()).unwrap_or_default(),
            "day" => self.day.map(|v| v.to_string()).unwrap_or_default(),
            _ => String::new(),
        };
        flatten_field(&value)
    }
}

/// Parsed records of one chunk, keyed by comic id.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    records: HashMap<u32, ChunkRecord>,
}

impl Chunk {
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&ChunkRecord> {
        self.records.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Parses chunk text: a header line of field names, then one record per line.
///
/// Rows with the wrong number of fields or an unparseable `num` are skipped.
/// A missing header or `num` column makes the whole chunk unusable.
pub fn parse_chunk(text: &str) -> Result<Chunk, String> {
    let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
    let header = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| "chunk is empty".to_owned())?;
    let columns: Vec<&str> = header.split(CHUNK_SEPARATOR).map(str::trim).collect();
    let column = |name: &str| columns.iter().position(|c| *c == name);

    let num_col = column("num").ok_or_else(|| "chunk header has no `num` column".to_owned())?;
    let title_col = column("safe_title").or_else(|| column("title"));
    let img_col = column("img");
    let alt_col = column("alt");
    let link_col = column("link");
    let news_col = column("news");
    let year_col = column("year");
    let month_col = column("month");
    let day_col = column("day");

    let mut records = HashMap::new();
    for (line_no, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(CHUNK_SEPARATOR).collect();
        if fields.len() != columns.len() {
            tracing::debug!(line = line_no + 2, "skipping chunk row with wrong field count");
            continue;
        }
        let Ok(num) = fields[num_col].trim().parse::<u32>() else {
            tracing::debug!(line = line_no + 2, "skipping chunk row with invalid num");
            continue;
        };

        let string_at = |col: Option<usize>| col.map(|c| fields[c].to_owned());
        let number_at = |col: Option<usize>| col.and_then(|c| fields[c].trim().parse::<i64>().ok());

        let record = ChunkRecord {
            num,
            safe_title: string_at(title_col).unwrap_or_default(),
            img: non_empty(string_at(img_col)),
            alt: string_at(alt_col).unwrap_or_default(),
            link: non_empty(string_at(link_col)),
            news: non_empty(string_at(news_col)),
            year: number_at(year_col).and_then(|v| i32::try_from(v).ok()),
            month: number_at(month_col).and_then(|v| u32::try_from(v).ok()),
            day: number_at(day_col).and_then(|v| u32::try_from(v).ok()),
        };
        records.insert(num, record);
    }

    Ok(Chunk { records })
}

/// Renders records in the chunk file format, in the given order.
#[must_use]
pub fn write_chunk(records: &[ChunkRecord]) -> String {
    let separator = CHUNK_SEPARATOR.to_string();
    let mut out = CHUNK_FIELDS.join(&separator);
    out.push('\n');
    for record in records {
        let row: Vec<String> = CHUNK_FIELDS.iter().map(|name| record.field(name)).collect();
        out.push_str(&row.join(&separator));
        out.push('\n');
    }
    out
}

// The format has no quoting, so separators and line breaks cannot survive.
fn flatten_field(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
