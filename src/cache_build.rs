//! Offline builder for the chunk cache read by [`crate::source::ComicSource`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::task::JoinSet;

use crate::cli::BuildCacheArgs;
use crate::comic::{ComicRef, SENTINEL_ID, non_empty};
use crate::config::Config;
use crate::source::SourceError;
use crate::source::chunk::{ChunkRecord, chunk_resource_name, chunk_start, write_chunk};
use crate::source::remote::{HttpRemote, Loose, UpstreamComic};

/// Upstream titles known to be wrong, by id.
const TITLE_CORRECTIONS: &[(u32, &str)] = &[
    (259, "Clichéd Exchanges"),
    (3015, "D&D Combinatorics"),
    (3028, "D&D Roll"),
];

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub fetched: usize,
    pub missing: usize,
    pub failed: usize,
    pub chunks: usize,
}

pub async fn run(config: &Config, args: &BuildCacheArgs) -> anyhow::Result<BuildSummary> {
    build(config.remote()?, &config.image_base, args).await
}

pub async fn build(
    remote: HttpRemote,
    image_base: &str,
    args: &BuildCacheArgs,
) -> anyhow::Result<BuildSummary> {
    if args.chunk_size == 0 {
        anyhow::bail!("--chunk-size must be positive");
    }
    let latest = match args.latest {
        Some(latest) => latest,
        None => {
            remote
                .fetch_upstream(ComicRef::Latest)
                .await
                .context("fetch latest comic")?
                .num
        }
    };
    tracing::info!(latest, out = %args.out.display(), "building chunk cache");

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir: {}", args.out.display()))?;
    if !args.force {
        let mut starts: Vec<u32> = (1..=latest).map(|id| chunk_start(id, args.chunk_size)).collect();
        starts.dedup();
        for start in starts {
            let path = args.out.join(chunk_resource_name(start));
            if path.exists() {
                anyhow::bail!(
                    "chunk file already exists: {} (pass --force to replace)",
                    path.display()
                );
            }
        }
    }

    let remote = Arc::new(remote);
    let concurrency = args.concurrency.max(1);
    let mut pending = (1..=latest).filter(|id| *id != SENTINEL_ID);
    let mut tasks = JoinSet::new();
    let mut summary = BuildSummary::default();
    let mut records = Vec::new();

    loop {
        while tasks.len() < concurrency {
            let Some(id) = pending.next() else {
                break;
            };
            let remote = Arc::clone(&remote);
            tasks.spawn(async move { (id, remote.fetch_upstream(ComicRef::Id(id)).await) });
        }
        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let (id, result) = joined.context("comic fetch task failed")?;
        match result {
            Ok(upstream) => {
                records.push(to_record(upstream, image_base));
                summary.fetched += 1;
                if summary.fetched % PROGRESS_EVERY == 0 {
                    tracing::info!(fetched = summary.fetched, latest, "fetching comics");
                }
            }
            Err(SourceError::NotFound(_)) => {
                tracing::debug!(id, "comic missing upstream");
                summary.missing += 1;
            }
            Err(err) => {
                tracing::warn!(id, %err, "failed to fetch comic");
                summary.failed += 1;
            }
        }
    }

    let mut chunks: BTreeMap<u32, Vec<ChunkRecord>> = BTreeMap::new();
    for record in records {
        chunks
            .entry(chunk_start(record.num, args.chunk_size))
            .or_default()
            .push(record);
    }
    for (start, mut rows) in chunks {
        rows.sort_by_key(|row| row.num);
        let path = args.out.join(chunk_resource_name(start));
        write_atomic(&path, &write_chunk(&rows))?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "wrote chunk");
        summary.chunks += 1;
    }

    tracing::info!(?summary, "chunk cache built");
    Ok(summary)
}

/// Normalizes one upstream payload into a cache row.
#[must_use]
pub fn to_record(upstream: UpstreamComic, image_base: &str) -> ChunkRecord {
    let safe_title = match TITLE_CORRECTIONS.iter().find(|(id, _)| *id == upstream.num) {
        Some((_, title)) => (*title).to_owned(),
        None => non_empty(upstream.safe_title)
            .or_else(|| non_empty(upstream.title))
            .unwrap_or_default(),
    };
    let img = non_empty(upstream.img).map(|img| match img.strip_prefix(image_base) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => img,
    });

    ChunkRecord {
        num: upstream.num,
        safe_title,
        img,
        alt: upstream.alt.unwrap_or_default(),
        link: non_empty(upstream.link),
        news: non_empty(upstream.news),
        year: upstream.year.as_ref().and_then(Loose::parse),
        month: upstream.month.as_ref().and_then(Loose::parse),
        day: upstream.day.as_ref().and_then(Loose::parse),
    }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp_path, contents)
        .with_context(|| format!("write tmp chunk: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp chunk to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DEFAULT_IMAGE_BASE;

    fn upstream(raw: &str) -> UpstreamComic {
        serde_json::from_str(raw).expect("valid upstream json")
    }

    #[test]
    fn strips_image_base_and_blanks_empty_fields() {
        let record = to_record(
            upstream(
                r#"{"num": 37, "safe_title": "Hyphen", "img": "https://imgs.xkcd.com/comics/hyphen.jpg",
                    "alt": "I do this constantly", "link": "", "news": "", "year": "2006", "month": "1", "day": "1"}"#,
            ),
            DEFAULT_IMAGE_BASE,
        );
        assert_eq!(record.img.as_deref(), Some("hyphen.jpg"));
        assert_eq!(record.link, None);
        assert_eq!(record.news, None);
        assert_eq!((record.year, record.month, record.day), (Some(2006), Some(1), Some(1)));
    }

    #[test]
    fn keeps_foreign_image_urls_whole() {
        let record = to_record(
            upstream(r#"{"num": 5, "safe_title": "x", "img": "https://elsewhere.example/a.png"}"#),
            DEFAULT_IMAGE_BASE,
        );
        assert_eq!(record.img.as_deref(), Some("https://elsewhere.example/a.png"));
    }

    #[test]
    fn applies_title_corrections() {
        let record = to_record(
            upstream(r#"{"num": 259, "safe_title": "Clich&eacute;d Exchanges"}"#),
            DEFAULT_IMAGE_BASE,
        );
        assert_eq!(record.safe_title, "Clichéd Exchanges");

        let record = to_record(
            upstream(r#"{"num": 3015, "safe_title": "D&amp;D Combinatorics"}"#),
            DEFAULT_IMAGE_BASE,
        );
        assert_eq!(record.safe_title, "D&D Combinatorics");
    }

    #[test]
    fn falls_back_to_title() {
        let record = to_record(
            upstream(r#"{"num": 8, "safe_title": "", "title": "Red Spiders"}"#),
            DEFAULT_IMAGE_BASE,
        );
        assert_eq!(record.safe_title, "Red Spiders");
    }
}
