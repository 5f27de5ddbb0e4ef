//! Plain-text rendering of reader state.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::calendar::CalendarPage;
use crate::comic::{Comic, Trust};
use crate::navigation::{Phase, ReadStatus, Snapshot};
use crate::sanitize::sanitize_news_html;

const COMIC_PAGE_BASE: &str = "https://xkcd.com";
const CALENDAR_COLUMNS: usize = 10;

pub fn snapshot(out: &mut impl Write, snapshot: &Snapshot) -> io::Result<()> {
    if let Phase::Error(message) = &snapshot.phase {
        writeln!(out, "error: {message}")?;
    }
    let Some(comic) = &snapshot.comic else {
        if snapshot.phase == Phase::Loading {
            writeln!(out, "loading...")?;
        }
        return Ok(());
    };

    write_comic(out, comic, snapshot.show_alt_text)?;
    writeln!(out, "{}", read_status_line(snapshot.read_status))?;

    let mut flags = Vec::new();
    if snapshot.incognito {
        flags.push("incognito");
    }
    if comic.trust == Trust::Untrusted {
        flags.push("live");
    }
    let mut parts = Vec::new();
    if snapshot.can_go_prev {
        parts.push("< prev".to_owned());
    }
    if snapshot.can_go_next {
        parts.push("next >".to_owned());
    }
    if !flags.is_empty() {
        parts.push(format!("[{}]", flags.join(", ")));
    }
    writeln!(out, "{}", parts.join("  "))
}

fn write_comic(out: &mut impl Write, comic: &Comic, show_alt_text: bool) -> io::Result<()> {
    match comic.published {
        Some(date) => writeln!(out, "#{} {} ({date})", comic.id, comic.title)?,
        None => writeln!(out, "#{} {}", comic.id, comic.title)?,
    }
    if comic.is_interactive {
        writeln!(
            out,
            "interactive comic: open {COMIC_PAGE_BASE}/{}/ in a browser",
            comic.id
        )?;
    } else if let Some(image) = &comic.image_url {
        writeln!(out, "image: {image}")?;
    }
    if show_alt_text && !comic.alt_text.is_empty() {
        writeln!(out, "alt: {}", comic.alt_text)?;
    }
    if let Some(link) = &comic.external_link {
        writeln!(out, "link: {link}")?;
    }
    if let Some(news) = &comic.news_html {
        let text = news_text(news);
        if !text.is_empty() {
            writeln!(out, "news: {text}")?;
        }
    }
    Ok(())
}

fn read_status_line(status: ReadStatus) -> String {
    match status {
        ReadStatus::NotRead => "not read".to_owned(),
        ReadStatus::JustRead => "read for the first time".to_owned(),
        ReadStatus::PreviouslyRead(record) => format!(
            "read before: first {}, last {}",
            timestamp(record.first_read),
            timestamp(record.last_read)
        ),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Terminal text of a news snippet: sanitized first, then tags dropped with
/// breaks and paragraphs turned into spaces.
#[must_use]
pub fn news_text(html: &str) -> String {
    let clean = sanitize_news_html(html);
    let mut text = String::with_capacity(clean.len());
    let mut rest = clean.as_str();
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                let tag = &rest[open + 1..open + close];
                if tag.starts_with("br") || tag.starts_with('p') || tag.starts_with("/p") {
                    text.push(' ');
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    text.push_str(rest);
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn calendar(out: &mut impl Write, page: &CalendarPage) -> io::Result<()> {
    writeln!(out, "page {}/{}  (* = read)", page.page, page.total_pages)?;
    for row in page.cells.chunks(CALENDAR_COLUMNS) {
        let line = row
            .iter()
            .map(|cell| {
                let mark = if cell.read.is_some() { '*' } else { ' ' };
                format!("{:>5}{mark}", cell.id)
            })
            .collect::<String>();
        writeln!(out, "{}", line.trim_end())?;
    }
    let prev = if page.has_prev { "[ prev page" } else { "" };
    let next = if page.has_next { "next page ]" } else { "" };
    let footer = format!("{prev}  {next}");
    if !footer.trim().is_empty() {
        writeln!(out, "{}", footer.trim())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone as _};

    use super::*;
    use crate::calendar::CalendarCell;
    use crate::history::ReadRecord;

    fn comic() -> Comic {
        Comic {
            id: 37,
            title: "Hyphen".to_owned(),
            alt_text: "I do this constantly".to_owned(),
            image_url: Some("https://imgs.example/hyphen.jpg".to_owned()),
            is_interactive: false,
            external_link: None,
            news_html: Some("<b>Sale</b> at <a href=\"https://store.example\">the store</a><script>x()</script>".to_owned()),
            published: NaiveDate::from_ymd_opt(2006, 1, 1),
            trust: Trust::Untrusted,
        }
    }

    fn snapshot_of(comic: Comic) -> Snapshot {
        Snapshot {
            phase: Phase::Viewing,
            comic: Some(comic),
            read_status: ReadStatus::NotRead,
            can_go_prev: true,
            can_go_next: false,
            latest_known: Some(37),
            incognito: true,
            show_alt_text: true,
            address: "/37".to_owned(),
        }
    }

    fn render(snapshot_value: &Snapshot) -> String {
        let mut out = Vec::new();
        snapshot(&mut out, snapshot_value).expect("write to vec");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn renders_a_viewed_comic() {
        let text = render(&snapshot_of(comic()));
        assert_eq!(
            text,
            "#37 Hyphen (2006-01-01)\n\
             image: https://imgs.example/hyphen.jpg\n\
             alt: I do this constantly\n\
             news: Sale at the store\n\
             not read\n\
             < prev  [incognito, live]\n"
        );
    }

    #[test]
    fn hides_alt_text_and_points_interactive_comics_at_the_site() {
        let mut snapshot = snapshot_of(Comic::sentinel());
        snapshot.show_alt_text = false;
        snapshot.incognito = false;
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).single().expect("date");
        snapshot.read_status = ReadStatus::PreviouslyRead(ReadRecord {
            first_read: first,
            last_read: first,
        });

        let text = render(&snapshot);
        assert!(text.contains("interactive comic: open https://xkcd.com/404/"));
        assert!(!text.contains("alt:"));
        assert!(text.contains("read before: first 2024-05-01 08:30, last 2024-05-01 08:30"));
    }

    #[test]
    fn error_phase_keeps_the_shown_comic() {
        let mut snapshot = snapshot_of(comic());
        snapshot.phase = Phase::Error("network down".to_owned());
        let text = render(&snapshot);
        assert!(text.starts_with("error: network down\n#37 Hyphen"));
    }

    #[test]
    fn news_text_decodes_entities() {
        assert_eq!(news_text("a &amp; b<br>c<p>d</p>"), "a & b c d");
    }

    #[test]
    fn calendar_grid() {
        let read = ReadRecord {
            first_read: Utc.timestamp_opt(0, 0).single().expect("epoch"),
            last_read: Utc.timestamp_opt(0, 0).single().expect("epoch"),
        };
        let page = CalendarPage {
            page: 2,
            total_pages: 2,
            cells: (11..=22)
                .map(|id| CalendarCell {
                    id,
                    read: (id == 12).then_some(read),
                })
                .collect(),
            has_prev: true,
            has_next: false,
        };
        let mut out = Vec::new();
        calendar(&mut out, &page).expect("write to vec");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "page 2/2  (* = read)\n   11    12*   13    14    15    16    17    18    19    20\n   21    22\n[ prev page\n"
        );
    }
}
