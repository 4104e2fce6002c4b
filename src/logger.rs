//! Global `tracing` subscribers used by the binaries.

use std::fs::File;

use anyhow::Context;
use time::{format_description::parse, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{
    fmt::{
        time::{FormatTime, OffsetTime},
        writer::BoxMakeWriter,
    },
    FmtSubscriber,
};

/// Log everything to a new file named after the current date and `prefix`.
///
/// # Errors
/// Returned when the file cannot be created or a global subscriber is already set.
pub fn init_logger(prefix: &str) -> anyhow::Result<()> {
    let file_name = get_log_file_name(prefix)?;
    let file =
        File::create(&file_name).with_context(|| format!("could not create '{file_name}'"))?;
    let writer = BoxMakeWriter::new(file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(local_timer()?)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).context(
        "could not set global default tracing subscriber, one is probably already set",
    )
}

/// Log `INFO` and above to stderr.
///
/// # Errors
/// Returned when a global subscriber is already set.
pub fn init_stderr_logger() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .with_timer(local_timer()?)
        .with_writer(std::io::stderr)
        .finish();

    set_global_default(subscriber)
        .context("could not set global default tracing subscriber, one is probably already set")
}

fn local_timer() -> anyhow::Result<impl FormatTime + Send + Sync + 'static> {
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let format = parse("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]")
        .context("invalid log time format")?;
    Ok(OffsetTime::new(local_offset, format))
}

fn get_log_file_name(prefix: &str) -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]-[minute]-[second]")
        .context("invalid log file name format")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = now.format(&format).context("could not format log file date")?;
    Ok(format!("{stamp}_{prefix}_log.txt"))
}
