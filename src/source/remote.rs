use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use url::Url;

use crate::comic::{Comic, ComicRef, Trust, non_empty, published_date};
use crate::interactive::is_interactive;
use crate::source::SourceError;

/// URL layout of the remote comic service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMode {
    /// The caching edge proxy: `/latest` and `/{id}`.
    Proxy,
    /// The upstream API: `/info.0.json` and `/{id}/info.0.json`.
    Direct,
}

impl RemoteMode {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "direct" => Ok(Self::Direct),
            "proxy" => Ok(Self::Proxy),
            other => anyhow::bail!("unsupported remote mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    base_url: Url,
    mode: RemoteMode,
}

impl RemoteEndpoint {
    pub fn new(base_url: &Url, mode: RemoteMode) -> Self {
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { base_url, mode }
    }

    pub fn url_for(&self, comic: ComicRef) -> anyhow::Result<Url> {
        let path = match (self.mode, comic) {
            (RemoteMode::Proxy, ComicRef::Latest) => "latest".to_owned(),
            (RemoteMode::Proxy, ComicRef::Id(id)) => id.to_string(),
            (RemoteMode::Direct, ComicRef::Latest) => "info.0.json".to_owned(),
            (RemoteMode::Direct, ComicRef::Id(id)) => format!("{id}/info.0.json"),
        };
        self.base_url
            .join(&path)
            .with_context(|| format!("join {path} onto {}", self.base_url))
    }
}

/// Live lookup of single comics.
#[async_trait]
pub trait RemoteComics: Send + Sync {
    async fn fetch(&self, comic: ComicRef) -> Result<Comic, SourceError>;
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    endpoint: RemoteEndpoint,
}

impl HttpRemote {
    pub fn new(client: reqwest::Client, endpoint: RemoteEndpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn build_client() -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build comic http client")
    }

    /// Fetches the upstream payload as sent, before projection.
    pub async fn fetch_upstream(&self, comic: ComicRef) -> Result<UpstreamComic, SourceError> {
        let url = self
            .endpoint
            .url_for(comic)
            .map_err(|err| SourceError::Network {
                comic,
                reason: format!("{err:#}"),
            })?;

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, crate::USER_AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| SourceError::Network {
                comic,
                reason: format!("GET {url}: {err}"),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(comic));
        }
        if !status.is_success() {
            return Err(SourceError::Network {
                comic,
                reason: format!("GET {url}: status {status}"),
            });
        }

        let raw = response.text().await.map_err(|err| SourceError::Network {
            comic,
            reason: format!("read body of {url}: {err}"),
        })?;
        serde_json::from_str(&raw).map_err(|err| SourceError::Decode {
            comic,
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl RemoteComics for HttpRemote {
    async fn fetch(&self, comic: ComicRef) -> Result<Comic, SourceError> {
        let upstream = self.fetch_upstream(comic).await?;
        tracing::debug!(%comic, num = upstream.num, "fetched remote comic");
        Ok(upstream.into_comic())
    }
}

/// The upstream JSON shape. Only the fields below are relied upon; anything
/// else the upstream sends is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamComic {
    pub num: u32,
    #[serde(default)]
    pub safe_title: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub news: Option<String>,
    #[serde(default)]
    pub year: Option<Loose>,
    #[serde(default)]
    pub month: Option<Loose>,
    #[serde(default)]
    pub day: Option<Loose>,
}

/// Upstream sends dates as strings; older mirrors send numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Number(i64),
    Text(String),
}

impl Loose {
    pub fn parse<T: TryFrom<i64>>(&self) -> Option<T> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<i64>().ok()?,
        };
        T::try_from(value).ok()
    }
}

impl UpstreamComic {
    #[must_use]
    pub fn into_comic(self) -> Comic {
        let is_interactive = is_interactive(i64::from(self.num));
        let title = non_empty(self.safe_title)
            .or_else(|| non_empty(self.title))
            .unwrap_or_default();
        let image_url = if is_interactive {
            None
        } else {
            non_empty(self.img)
        };

        Comic {
            id: self.num,
            title,
            alt_text: self.alt.unwrap_or_default(),
            image_url,
            is_interactive,
            external_link: non_empty(self.link),
            news_html: non_empty(self.news),
            published: published_date(
                self.year.as_ref().and_then(Loose::parse),
                self.month.as_ref().and_then(Loose::parse),
                self.day.as_ref().and_then(Loose::parse),
            ),
            trust: Trust::Untrusted,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn proxy_and_direct_paths() -> anyhow::Result<()> {
        let base = Url::parse("https://api.example.com")?;
        let proxy = RemoteEndpoint::new(&base, RemoteMode::Proxy);
        assert_eq!(
            proxy.url_for(ComicRef::Latest)?.as_str(),
            "https://api.example.com/latest"
        );
        assert_eq!(
            proxy.url_for(ComicRef::Id(37))?.as_str(),
            "https://api.example.com/37"
        );

        let base = Url::parse("https://xkcd.example/mirror")?;
        let direct = RemoteEndpoint::new(&base, RemoteMode::Direct);
        assert_eq!(
            direct.url_for(ComicRef::Latest)?.as_str(),
            "https://xkcd.example/mirror/info.0.json"
        );
        assert_eq!(
            direct.url_for(ComicRef::Id(37))?.as_str(),
            "https://xkcd.example/mirror/37/info.0.json"
        );
        Ok(())
    }

    #[test]
    fn parse_remote_mode() {
        assert_eq!(RemoteMode::parse("").unwrap(), RemoteMode::Direct);
        assert_eq!(RemoteMode::parse(" Proxy ").unwrap(), RemoteMode::Proxy);
        let err = RemoteMode::parse("cdn").unwrap_err().to_string();
        assert!(err.contains("unsupported remote mode"));
    }

    #[test]
    fn upstream_json_projects_to_untrusted_comic() -> anyhow::Result<()> {
        let raw = r#"{"month": "1", "num": 37, "link": "", "year": "2006", "news": "",
            "safe_title": "Hyphen", "transcript": "ignored", "alt": "I do this constantly",
            "img": "https://imgs.xkcd.com/comics/hyphen.jpg", "title": "Hyphen", "day": "1"}"#;
        let comic = serde_json::from_str::<UpstreamComic>(raw)?.into_comic();

        assert_eq!(comic.id, 37);
        assert_eq!(comic.title, "Hyphen");
        assert_eq!(comic.trust, Trust::Untrusted);
        assert_eq!(comic.external_link, None);
        assert_eq!(comic.news_html, None);
        assert_eq!(comic.published, NaiveDate::from_ymd_opt(2006, 1, 1));
        assert_eq!(
            comic.image_url.as_deref(),
            Some("https://imgs.xkcd.com/comics/hyphen.jpg")
        );
        Ok(())
    }

    #[test]
    fn upstream_json_tolerates_sparse_payloads() -> anyhow::Result<()> {
        let comic = serde_json::from_str::<UpstreamComic>(r#"{"num": 1110, "year": 2012}"#)?
            .into_comic();
        assert!(comic.is_interactive);
        assert_eq!(comic.title, "");
        assert_eq!(comic.published, None);
        Ok(())
    }
}
