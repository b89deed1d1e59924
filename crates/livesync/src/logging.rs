use std::{fs::OpenOptions, path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "livesync=info,livesync_catalog=info";

/// Logs a stderr y, sin colores, a `log_file`. `RUST_LOG` sustituye al filtro por defecto.
pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("No se pudo abrir el log {}", log_file.display()))?;

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
        .try_init()
        .context("No se pudo instalar el subscriber de tracing")?;

    Ok(())
}
