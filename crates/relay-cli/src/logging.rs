use std::sync::OnceLock;

use relay_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(&logging.level)?,
    };

    let mut file_writer = None;
    if let Some(dir) = &logging.directory {
        std::fs::create_dir_all(dir)?;
        let file_name = format!("relay.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        file_writer = Some(non_blocking);
    }

    if !logging.console && file_writer.is_none() {
        anyhow::bail!("logging disabled for both console and file");
    }

    let console_layer = logging
        .console
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let file_layer = file_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
