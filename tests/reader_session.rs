mod xkcd_stub;

use std::path::Path;
use std::sync::Arc;

use rand::SeedableRng as _;
use rand::rngs::StdRng;
use readxkcd::cache_build;
use readxkcd::cli::BuildCacheArgs;
use readxkcd::comic::{ComicRef, Trust};
use readxkcd::history::ReadHistoryStore;
use readxkcd::history::storage::{FileStorage, MemoryStorage};
use readxkcd::navigation::{Intent, NavigationController, NavigationError, Outcome, Phase};
use readxkcd::source::chunk::{ChunkRecord, DirChunkLoader, write_chunk};
use readxkcd::source::remote::{HttpRemote, RemoteEndpoint, RemoteMode};
use readxkcd::source::{ComicSource, DEFAULT_IMAGE_BASE, SourceError};
use url::Url;
use xkcd_stub::{XkcdStub, XkcdStubConfig};

fn remote(stub: &XkcdStub) -> HttpRemote {
    let base = Url::parse(&stub.base_url).expect("stub url");
    HttpRemote::new(
        HttpRemote::build_client().expect("http client"),
        RemoteEndpoint::new(&base, RemoteMode::Direct),
    )
}

fn controller(source: ComicSource, history: ReadHistoryStore) -> NavigationController {
    NavigationController::new(Arc::new(source), history).with_rng(StdRng::seed_from_u64(42))
}

fn memory_history() -> ReadHistoryStore {
    let history = ReadHistoryStore::new(Arc::new(MemoryStorage::new()));
    history.set_incognito(false);
    history
}

fn record(num: u32) -> ChunkRecord {
    ChunkRecord {
        num,
        safe_title: format!("Cached {num}"),
        img: Some(format!("cached_{num}.png")),
        alt: String::new(),
        link: None,
        news: None,
        year: Some(2006),
        month: Some(1),
        day: Some(1),
    }
}

fn write_chunk_file(dir: &Path, name: &str, records: &[ChunkRecord]) {
    std::fs::write(dir.join(name), write_chunk(records)).expect("write chunk file");
}

#[tokio::test]
async fn invalid_ids_are_ignored_without_io() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 50,
        ..XkcdStubConfig::default()
    });
    let mut nav = controller(ComicSource::new(Arc::new(remote(&stub))), memory_history());

    assert_eq!(nav.dispatch(Intent::GoToId(0)).await?, Outcome::Ignored);
    assert_eq!(nav.dispatch(Intent::GoToId(-5)).await?, Outcome::Ignored);

    let snapshot = nav.snapshot();
    assert_eq!(snapshot.comic, None);
    assert_eq!(snapshot.phase, Phase::Loading);
    assert!(stub.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn sentinel_is_served_without_io() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 500,
        ..XkcdStubConfig::default()
    });
    let mut nav = controller(ComicSource::new(Arc::new(remote(&stub))), memory_history());

    assert_eq!(nav.dispatch(Intent::GoToId(404)).await?, Outcome::Shown(404));
    let comic = nav.current().expect("sentinel shown");
    assert!(comic.is_interactive);
    assert_eq!(comic.trust, Trust::Trusted);
    assert!(stub.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn stepping_past_the_newest_comic_disables_next() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 50,
        ..XkcdStubConfig::default()
    });
    let mut nav = controller(ComicSource::new(Arc::new(remote(&stub))), memory_history());

    nav.dispatch(Intent::GoToId(50)).await?;
    assert!(nav.can_go_next());

    let err = nav.dispatch(Intent::GoNext).await.expect_err("51 does not exist");
    assert_eq!(err, NavigationError::NotFound(51));

    let snapshot = nav.snapshot();
    assert_eq!(snapshot.comic.map(|c| c.id), Some(50));
    assert_eq!(snapshot.phase, Phase::Viewing);
    assert!(!snapshot.can_go_next);
    assert_eq!(snapshot.latest_known, Some(50));

    // The bound is now known, so no further request is made.
    let before = stub.requests().len();
    assert_eq!(nav.dispatch(Intent::GoNext).await?, Outcome::Ignored);
    assert_eq!(stub.requests().len(), before);
    Ok(())
}

#[tokio::test]
async fn cache_misses_fall_back_to_the_remote() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 50,
        ..XkcdStubConfig::default()
    });
    let chunks = tempfile::tempdir()?;
    let cached: Vec<ChunkRecord> = (1..=36).map(record).collect();
    write_chunk_file(chunks.path(), "xkcd_0.tsv", &cached);

    let source = ComicSource::new(Arc::new(remote(&stub)))
        .with_chunks(Arc::new(DirChunkLoader::new(chunks.path())));

    let trusted = source.resolve(ComicRef::Id(36)).await?;
    assert_eq!(trusted.trust, Trust::Trusted);
    assert_eq!(trusted.title, "Cached 36");
    assert_eq!(
        trusted.image_url.as_deref(),
        Some(format!("{DEFAULT_IMAGE_BASE}cached_36.png").as_str())
    );
    assert!(stub.requests().is_empty());

    let live = source.resolve(ComicRef::Id(37)).await?;
    assert_eq!(live.trust, Trust::Untrusted);
    assert_eq!(live.title, "Comic 37");
    assert_eq!(stub.requests(), vec!["/37/info.0.json"]);

    // Chunk 500 is not cached at all; the remote decides.
    let err = source.resolve(ComicRef::Id(501)).await.expect_err("beyond latest");
    assert_eq!(err, SourceError::NotFound(ComicRef::Id(501)));
    Ok(())
}

#[tokio::test]
async fn random_unread_prefers_unread_comics() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 5,
        ..XkcdStubConfig::default()
    });
    let history = memory_history();
    for id in [1, 2, 4, 5] {
        history.mark_read(id);
    }
    let mut nav = controller(ComicSource::new(Arc::new(remote(&stub))), history);

    assert_eq!(nav.dispatch(Intent::GoRandomUnread).await?, Outcome::Shown(3));
    Ok(())
}

#[tokio::test]
async fn random_unread_still_picks_when_everything_is_read() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 3,
        ..XkcdStubConfig::default()
    });
    let history = memory_history();
    for id in 1..=3 {
        history.mark_read(id);
    }
    let mut nav = controller(ComicSource::new(Arc::new(remote(&stub))), history);

    match nav.dispatch(Intent::GoRandomUnread).await? {
        Outcome::Shown(id) => assert!((1..=3).contains(&id)),
        Outcome::Ignored => panic!("random pick was ignored"),
    }
    Ok(())
}

#[tokio::test]
async fn reads_survive_a_restart() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 50,
        ..XkcdStubConfig::default()
    });
    let data = tempfile::tempdir()?;

    {
        let history = ReadHistoryStore::new(Arc::new(FileStorage::new(data.path())));
        history.set_incognito(false);
        let mut nav = controller(ComicSource::new(Arc::new(remote(&stub))), history);
        nav.start("https://reader.example/12").await?;
        nav.dispatch(Intent::GoNext).await?;
    }

    let history = ReadHistoryStore::new(Arc::new(FileStorage::new(data.path())));
    assert_eq!(history.last_viewed(), Some(13));
    assert_eq!(history.get_all().into_keys().collect::<Vec<_>>(), vec![12, 13]);
    assert!(!history.incognito());
    Ok(())
}

#[tokio::test]
async fn built_cache_is_served_as_trusted() -> anyhow::Result<()> {
    let stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 12,
        missing: vec![7],
    });
    let out = tempfile::tempdir()?;
    let args = BuildCacheArgs {
        out: out.path().to_path_buf(),
        latest: None,
        chunk_size: 5,
        concurrency: 3,
        force: false,
    };

    let summary = cache_build::build(remote(&stub), DEFAULT_IMAGE_BASE, &args).await?;
    assert_eq!(summary.fetched, 11);
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.chunks, 3);
    for name in ["xkcd_0.tsv", "xkcd_5.tsv", "xkcd_10.tsv"] {
        assert!(out.path().join(name).is_file(), "{name}");
    }

    let err = cache_build::build(remote(&stub), DEFAULT_IMAGE_BASE, &args)
        .await
        .expect_err("existing chunks are kept");
    assert!(err.to_string().contains("already exists"));

    let reader_stub = XkcdStub::spawn(XkcdStubConfig {
        latest: 12,
        missing: vec![7],
    });
    let source = ComicSource::new(Arc::new(remote(&reader_stub)))
        .with_chunk_size(5)
        .with_chunks(Arc::new(DirChunkLoader::new(out.path())));

    let comic = source.resolve(ComicRef::Id(3)).await?;
    assert_eq!(comic.trust, Trust::Trusted);
    assert_eq!(comic.title, "Comic 3");
    assert_eq!(
        comic.image_url.as_deref(),
        Some("https://imgs.xkcd.com/comics/comic_3.png")
    );
    let comic = source.resolve(ComicRef::Id(12)).await?;
    assert_eq!(comic.trust, Trust::Trusted);
    assert!(reader_stub.requests().is_empty());

    // Missing upstream at build time, so the reader asks again.
    let err = source.resolve(ComicRef::Id(7)).await.expect_err("still missing");
    assert_eq!(err, SourceError::NotFound(ComicRef::Id(7)));
    assert_eq!(reader_stub.requests(), vec!["/7/info.0.json"]);
    Ok(())
}
