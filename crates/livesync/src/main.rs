mod logging;

use anyhow::{Context, Result};
use livesync_catalog::{ConfigManager, LibraryConfig, LibraryManager, ProjectRecord};
use livesync_paths::LivesyncPaths;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e:#}");
        eprintln!("livesync: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let paths = LivesyncPaths::new().context("No se pudo preparar la carpeta de livesync")?;
    logging::init(&paths.log_file)?;

    // Mantener vivo hasta el final: solo un proceso toca el catálogo.
    let _lock = paths.lock()?;

    let config = LibraryConfig::load_or_default(&paths.settings_file)
        .with_context(|| format!("No se pudo leer {}", paths.settings_file.display()))?
        .resolve_relative(&paths.base_dir);

    let library = LibraryManager::new(ConfigManager::from(config)).context("No se pudo abrir el catálogo")?;

    if library.is_first_run()? {
        info!("Primera ejecución, catalogando {}", library.source_dir().display());
    }

    let sync = library.scan().await?;
    library.mark_has_run()?;

    for failure in &sync.reconcile.failed {
        warn!(path = %failure.path.display(), "No se guardó: {}", failure.error);
    }

    print_catalog(&library.catalog()?);
    Ok(())
}

fn print_catalog(records: &[ProjectRecord]) {
    for record in records {
        let bpm = record.tempo_bpm.map(|t| format!("{t:.2}")).unwrap_or_else(|| "-".into());
        let a = &record.annotations;
        let release = a.release_date.map(|d| d.to_string()).unwrap_or_default();

        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.name,
            bpm,
            record.size_bytes,
            a.genre,
            a.status,
            a.key,
            a.grade,
            release,
            record.path.display()
        );
    }
}
