use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Id of the reserved "not found" comic. It always resolves, offline.
pub const SENTINEL_ID: u32 = 404;

/// Where a [`Comic`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trust {
    /// Curated local chunk cache (or the built-in sentinel).
    Trusted,
    /// Parsed ad hoc from a live remote response.
    Untrusted,
}

/// The validated projection every comic source produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comic {
    pub id: u32,
    pub title: String,
    pub alt_text: String,
    /// Absent for interactive comics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_interactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
    pub trust: Trust,
}

impl Comic {
    /// The built-in comic for [`SENTINEL_ID`].
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            id: SENTINEL_ID,
            title: "404 Not Found".to_owned(),
            alt_text: String::new(),
            image_url: None,
            is_interactive: true,
            external_link: None,
            news_html: None,
            published: NaiveDate::from_ymd_opt(2008, 4, 2),
            trust: Trust::Trusted,
        }
    }
}

/// Builds a publication date from loosely typed parts, dropping impossible dates.
pub fn published_date(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year?, month?, day?)
}

/// Blank strings from upstream mean "not present".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// What a caller asks a comic source for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComicRef {
    Latest,
    Id(u32),
}

impl fmt::Display for ComicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}
