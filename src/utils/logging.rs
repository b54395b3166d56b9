use anyhow::{anyhow, Result};
use colored::Colorize;
use log::{Level, LevelFilter};
use std::path::{Path, PathBuf};

use crate::config::settings::LoggingSettings;
use crate::utils::io::ensure_dir;

/// `<dir>/<pipeline>-<yyyyMMdd>.txt`, one file per pipeline per day.
pub fn log_file_path(dir: &Path, pipeline: &str) -> PathBuf {
    let day = chrono::Local::now().format("%Y%m%d");
    dir.join(format!("{}-{}.txt", pipeline, day))
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| anyhow!("unknown log level '{}'", level))
}

pub fn format_line(timestamp: &str, level: Level, target: &str, message: &str) -> String {
    format!("{} {:<5} [{}] {}", timestamp, level, target, message)
}

fn colored_level(level: Level) -> String {
    let text = format!("{:<5}", level);
    match level {
        Level::Error => text.red().bold().to_string(),
        Level::Warn => text.yellow().to_string(),
        Level::Info => text.green().to_string(),
        Level::Debug | Level::Trace => text.dimmed().to_string(),
    }
}

/// Install the process-wide logger: a daily text file, plus stderr unless
/// `console` is false.
pub fn init(settings: &LoggingSettings, pipeline: &str, console: bool) -> Result<PathBuf> {
    let level = parse_level(&settings.level)?;
    let dir = Path::new(&settings.directory);
    ensure_dir(dir)?;
    let file = log_file_path(dir, pipeline);

    let mut dispatch = fern::Dispatch::new().level(level);

    if console {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    out.finish(format_args!(
                        "{} {} {}",
                        ts.to_string().dimmed(),
                        colored_level(record.level()),
                        message
                    ))
                })
                .chain(std::io::stderr()),
        );
    }

    dispatch = dispatch.chain(
        fern::Dispatch::new()
            .format(|out, message, record| {
                let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
                let line = format_line(&ts, record.level(), record.target(), &message.to_string());
                out.finish(format_args!("{}", line))
            })
            .chain(fern::log_file(&file)?),
    );

    dispatch.apply()?;
    log::debug!("logging to {}", file.display());
    Ok(file)
}
