//! Point d'entrée CLI pour alkis-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;
mod import;
mod report;

use cli::ImportArgs;

/// Importer les parcelles ALKIS (NAS/GML) vers PostGIS
#[derive(Parser)]
#[command(name = "alkis-pg")]
#[command(author, version)]
#[command(about = "Importer les parcelles ALKIS (NAS/GML) vers PostGIS")]
#[command(
    long_about = "Importe les extraits ALKIS (AX_Flurstueck, fichiers .xml/.xml.gz/.nas/.nas.gz) dans une table PostGIS, par lots avec repli ligne à ligne en cas d'échec."
)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    import: ImportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    info!(inputs = cli.import.inputs.len(), "Starting ALKIS import");
    cli::cmd_import(&cli.import).await
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
