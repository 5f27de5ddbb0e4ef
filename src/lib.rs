#![forbid(unsafe_code)]

pub mod address;
pub mod cache_build;
pub mod calendar;
pub mod cli;
pub mod comic;
pub mod config;
pub mod history;
pub mod interactive;
pub mod logging;
pub mod navigation;
pub mod proxy;
pub mod reader;
pub mod render;
pub mod sanitize;
pub mod source;

/// Sent with every request the reader makes.
pub const USER_AGENT: &str = concat!("readxkcd/", env!("CARGO_PKG_VERSION"));
