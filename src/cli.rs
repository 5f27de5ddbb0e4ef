use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Read xkcd from the terminal and keep track of what you have read")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the `READXKCD_*` environment variables.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Directory holding read history and session state.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the remote comic service.
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// `direct` for the upstream API, `proxy` for a readxkcd-proxy.
    #[arg(long, global = true)]
    pub remote_mode: Option<String>,

    /// Chunk cache directory or http(s) base URL.
    #[arg(long, global = true)]
    pub chunks: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a comic by id or address; the latest comic when omitted.
    Show {
        target: Option<String>,
    },
    /// Show the comic after the last viewed one.
    Next,
    /// Show the comic before the last viewed one.
    Prev,
    Latest,
    /// Show a random comic you have not read yet.
    Random,
    /// Show the last viewed comic again.
    Resume,
    /// Forget that a comic was read (the last viewed one by default).
    Unread {
        id: Option<u32>,
    },
    /// Interactive reading session on stdin/stdout.
    Session {
        /// Id or address to open first; defaults to the last viewed comic.
        start: Option<String>,
    },
    /// Grid of comic ids with read markers.
    Calendar(CalendarArgs),
    /// Write read history as CSV or TSV.
    Export(ExportArgs),
    /// Merge read history from a CSV or TSV file.
    Import {
        file: PathBuf,
    },
    /// Delete all read history.
    Clear,
    Incognito {
        #[arg(value_enum, default_value_t = Switch::Status)]
        mode: Switch,
    },
    AltText {
        #[arg(value_enum, default_value_t = Switch::Status)]
        mode: Switch,
    },
    /// Fetch every comic and write chunk cache files.
    BuildCache(BuildCacheArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
    Toggle,
    Status,
}

#[derive(Debug, Args)]
pub struct CalendarArgs {
    /// Page number (1 = oldest). Defaults to the page with the latest comic.
    #[arg(long)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HistoryFormat {
    Csv,
    Tsv,
}

impl HistoryFormat {
    #[must_use]
    pub fn separator(self) -> char {
        match self {
            Self::Csv => ',',
            Self::Tsv => '\t',
        }
    }
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(long, value_enum, default_value_t = HistoryFormat::Csv)]
    pub format: HistoryFormat,

    /// Output file; stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Overwrite an existing output file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct BuildCacheArgs {
    /// Output directory for chunk files.
    #[arg(long)]
    pub out: PathBuf,

    /// Highest id to fetch. Defaults to the latest comic.
    #[arg(long)]
    pub latest: Option<u32>,

    /// Comics per chunk file.
    #[arg(long, default_value_t = crate::source::chunk::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Maximum concurrent HTTP requests.
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Replace chunk files that already exist in `--out`.
    #[arg(long)]
    pub force: bool,
}
