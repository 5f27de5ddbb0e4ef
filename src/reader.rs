//! Command handlers behind the `readxkcd` binary.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context as _;

use crate::address::comic_path;
use crate::cli::{Cli, Command, ExportArgs, Switch};
use crate::config::Config;
use crate::history::ReadHistoryStore;
use crate::navigation::{Intent, NavigationController, NavigationError, Outcome};
use crate::render;

const SESSION_HELP: &str = "keys: n next, p prev, l latest, r random unread, g <id> go to, \
b/f back/forward, m mark unread, i incognito, a alt text, c calendar, [ ] calendar pages, q quit";

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("load config")?;
    config.apply(&cli.global).context("apply command-line overrides")?;
    let history = config.history();
    tracing::debug!(data_dir = %config.data_dir.display(), "opened history");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Show { target } => {
            let intent = match target.as_deref().map(str::trim) {
                None | Some("" | "latest") => Intent::GoLatest,
                Some(raw) => match raw.parse::<i64>() {
                    Ok(id) => Intent::GoToId(id),
                    Err(_) => Intent::UrlChanged(raw.to_owned()),
                },
            };
            navigate(&config, history, intent, &mut out).await?;
        }
        Command::Latest => navigate(&config, history, Intent::GoLatest, &mut out).await?,
        Command::Random => navigate(&config, history, Intent::GoRandomUnread, &mut out).await?,
        Command::Next => {
            let last = last_viewed(&history)?;
            navigate(&config, history, Intent::GoToId(i64::from(last) + 1), &mut out).await?;
        }
        Command::Prev => {
            let last = last_viewed(&history)?;
            navigate(&config, history, Intent::GoToId(i64::from(last) - 1), &mut out).await?;
        }
        Command::Resume => {
            let last = last_viewed(&history)?;
            navigate(&config, history, Intent::GoToId(i64::from(last)), &mut out).await?;
        }
        Command::Unread { id } => {
            let id = match id {
                Some(id) => id,
                None => last_viewed(&history)?,
            };
            if history.get(id).is_some() {
                history.mark_unread(id);
                writeln!(out, "marked comic {id} unread")?;
            } else {
                writeln!(out, "comic {id} was not marked read")?;
            }
        }
        Command::Session { start } => {
            let start = start
                .or_else(|| history.last_viewed().map(comic_path))
                .unwrap_or_else(|| "/".to_owned());
            let mut nav = controller(&config, history)?;
            let stdin = io::stdin();
            session(&mut nav, &start, stdin.lock(), &mut out).await?;
        }
        Command::Calendar(args) => {
            let mut nav = controller(&config, history)?;
            let page = match args.page {
                Some(page) => nav.open_calendar_at(page).await,
                None => nav.open_calendar().await,
            }
            .context("open calendar")?;
            render::calendar(&mut out, &page)?;
        }
        Command::Export(args) => export(&history, &args, &mut out)?,
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let summary = history.import_delimited(&text);
            writeln!(
                out,
                "imported {}: {} new, {} updated, {} unchanged, {} skipped",
                file.display(),
                summary.inserted,
                summary.updated,
                summary.unchanged,
                summary.skipped
            )?;
        }
        Command::Clear => {
            history.clear_all();
            writeln!(out, "read history cleared")?;
        }
        Command::Incognito { mode } => {
            let enabled = apply_switch(mode, history.incognito());
            if mode != Switch::Status {
                history.set_incognito(enabled);
            }
            writeln!(out, "incognito: {}", on_off(enabled))?;
        }
        Command::AltText { mode } => {
            let show = apply_switch(mode, history.show_alt_text());
            if mode != Switch::Status {
                history.set_show_alt_text(show);
            }
            writeln!(out, "alt text: {}", on_off(show))?;
        }
        Command::BuildCache(args) => {
            let summary = crate::cache_build::run(&config, &args)
                .await
                .context("build chunk cache")?;
            writeln!(
                out,
                "wrote {} chunk files to {} ({} comics, {} missing, {} failed)",
                summary.chunks,
                args.out.display(),
                summary.fetched,
                summary.missing,
                summary.failed
            )?;
        }
    }

    Ok(())
}

fn controller(config: &Config, history: ReadHistoryStore) -> anyhow::Result<NavigationController> {
    let source = Arc::new(config.source()?);
    Ok(NavigationController::new(source, history).with_comics_per_page(config.comics_per_page))
}

fn last_viewed(history: &ReadHistoryStore) -> anyhow::Result<u32> {
    history
        .last_viewed()
        .context("no comic has been read yet; reads are not recorded while incognito is on")
}

async fn navigate(
    config: &Config,
    history: ReadHistoryStore,
    intent: Intent,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut nav = controller(config, history)?;
    let result = nav.dispatch(intent.clone()).await;
    match result {
        Ok(Outcome::Shown(_)) => {
            render::snapshot(out, &nav.snapshot())?;
            Ok(())
        }
        Ok(Outcome::Ignored) => anyhow::bail!("no comic to show for {intent:?}"),
        Err(err) => Err(err).context("show comic"),
    }
}

fn export(history: &ReadHistoryStore, args: &ExportArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let mut text = history.export_delimited(args.format.separator());
    text.push('\n');
    match &args.out {
        Some(path) => {
            if path.exists() && !args.force {
                anyhow::bail!("export output already exists: {}", path.display());
            }
            std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), "exported read history");
        }
        None => out.write_all(text.as_bytes())?,
    }
    Ok(())
}

fn apply_switch(mode: Switch, current: bool) -> bool {
    match mode {
        Switch::On => true,
        Switch::Off => false,
        Switch::Toggle => !current,
        Switch::Status => current,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// One line of input in an interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Next,
    Prev,
    Latest,
    Random,
    GoTo(i64),
    Back,
    Forward,
    MarkUnread,
    Incognito,
    AltText,
    Calendar,
    CalendarPrev,
    CalendarNext,
    Help,
    Quit,
}

impl Key {
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        let key = match (command, arg) {
            ("n", "") => Self::Next,
            ("p", "") => Self::Prev,
            ("l", "") => Self::Latest,
            ("r", "") => Self::Random,
            ("b", "") => Self::Back,
            ("f", "") => Self::Forward,
            ("m", "") => Self::MarkUnread,
            ("i", "") => Self::Incognito,
            ("a", "") => Self::AltText,
            ("c", "") => Self::Calendar,
            ("[", "") => Self::CalendarPrev,
            ("]", "") => Self::CalendarNext,
            ("h" | "?", "") => Self::Help,
            ("q", "") => Self::Quit,
            ("g", id) => Self::GoTo(id.parse().ok()?),
            (id, "") => Self::GoTo(id.parse().ok()?),
            _ => return None,
        };
        Some(key)
    }
}

/// Runs the keyboard loop until `q` or end of input.
pub async fn session(
    nav: &mut NavigationController,
    start: &str,
    mut input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let started = nav.start(start).await;
    report(nav, started, out)?;

    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line).context("read input")? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let Some(key) = Key::parse(&line) else {
            writeln!(out, "unknown command {:?}; h for help", line.trim())?;
            continue;
        };

        let result = match key {
            Key::Quit => break,
            Key::Help => {
                writeln!(out, "{SESSION_HELP}")?;
                continue;
            }
            Key::Next => nav.dispatch(Intent::GoNext).await,
            Key::Prev => nav.dispatch(Intent::GoPrev).await,
            Key::Latest => nav.dispatch(Intent::GoLatest).await,
            Key::Random => nav.dispatch(Intent::GoRandomUnread).await,
            Key::GoTo(id) => nav.dispatch(Intent::GoToId(id)).await,
            Key::Back => nav.back().await,
            Key::Forward => nav.forward().await,
            Key::MarkUnread => {
                if !nav.mark_current_unread() {
                    writeln!(out, "no comic is shown")?;
                }
                render::snapshot(out, &nav.snapshot())?;
                continue;
            }
            Key::Incognito => {
                let enabled = nav.toggle_incognito();
                writeln!(out, "incognito: {}", on_off(enabled))?;
                continue;
            }
            Key::AltText => {
                nav.toggle_alt_text();
                render::snapshot(out, &nav.snapshot())?;
                continue;
            }
            Key::Calendar => {
                match nav.open_calendar().await {
                    Ok(page) => render::calendar(out, &page)?,
                    Err(err) => writeln!(out, "error: {err}")?,
                }
                continue;
            }
            Key::CalendarPrev | Key::CalendarNext => {
                let page = if key == Key::CalendarPrev {
                    nav.calendar_prev_page()
                } else {
                    nav.calendar_next_page()
                };
                match page {
                    Some(page) => render::calendar(out, &page)?,
                    None => writeln!(out, "open the calendar with c first")?,
                }
                continue;
            }
        };
        report(nav, result, out)?;
    }

    Ok(())
}

fn report(
    nav: &NavigationController,
    result: Result<Outcome, NavigationError>,
    out: &mut impl Write,
) -> io::Result<()> {
    match result {
        Ok(Outcome::Ignored) => return writeln!(out, "nothing there"),
        Err(NavigationError::NotFound(id)) if nav.current().is_some() => {
            writeln!(out, "comic {id} does not exist")?;
        }
        Ok(Outcome::Shown(_)) | Err(_) => {}
    }
    render::snapshot(out, &nav.snapshot())
}
