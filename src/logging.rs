use anyhow::Context as _;

pub const LOG_ENV: &str = "READXKCD_LOG";

/// Installs the stderr subscriber. The filter comes from `READXKCD_LOG`,
/// then `RUST_LOG`, then `default_directive`.
pub fn init(default_directive: &str) -> anyhow::Result<()> {
    let own = std::env::var(LOG_ENV).ok();
    let rust_log = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    let directive = select_directive(own.as_deref(), rust_log.as_deref(), default_directive);
    let filter = tracing_subscriber::EnvFilter::try_new(directive)
        .with_context(|| format!("build log filter from {directive:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

fn select_directive<'a>(
    own: Option<&'a str>,
    rust_log: Option<&'a str>,
    default_directive: &'a str,
) -> &'a str {
    [own, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(default_directive)
}
