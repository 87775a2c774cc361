use std::{ fs::{ self, OpenOptions }, path::Path, sync::Mutex };

use color_eyre::eyre::Result;
use time::{ OffsetDateTime, format_description };
use tracing::Level;
use tracing_subscriber::{ Layer, Registry, filter, fmt, layer::SubscriberExt };

/// Logs to stderr at a level chosen by `verbosity`, and at DEBUG to
/// `debug-<date>.log` inside `log_dir` when one is given.
pub fn setup(verbosity: u8, log_dir: Option<&Path>) -> Result<()> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter::LevelFilter::from_level(level));

    let debug_file_layer = match log_dir {
        Some(dir) => {
            let format_description = format_description::parse("[year]-[month]-[day]")?;
            let now = OffsetDateTime::now_utc().format(&format_description)?;

            fs::create_dir_all(dir)?;
            let debug_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(dir.join(format!("debug-{now}.log")))?;

            Some(
                fmt::layer()
                    .with_ansi(false)
                    .pretty()
                    .with_writer(Mutex::new(debug_file))
                    .with_filter(filter::LevelFilter::from_level(Level::DEBUG))
            )
        }
        None => None,
    };

    let subscriber = Registry::default().with(stderr_layer).with(debug_file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
