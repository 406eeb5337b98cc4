//! Définition des arguments et orchestration d'un run d'import
//!
//! Un run: découverte des fichiers d'entrée (ordre trié, reproductible),
//! pipeline extraction → décodage → persistance par fichier, arrêt dès que
//! la limite globale est atteinte, commit terminal systématique.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info, warn};

use nas::{FeatureReader, Parcel};

use crate::import::batch::{BatchState, BatchWriter};
use crate::import::pool::{self, DatabaseConfig};
use crate::import::postgres;
use crate::report::ImportStats;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// NAS/GML file or directory containing ALKIS downloads
    #[arg(short, long = "input", value_name = "PATH", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Do not recurse into sub-directories
    #[arg(long)]
    pub no_recursive: bool,

    /// Number of parcels to bulk insert at once
    #[arg(long, default_value_t = 200)]
    pub batch_size: usize,

    /// Number of inserts per transaction commit (0 = commit only at the end)
    #[arg(long, default_value_t = 500)]
    pub commit_interval: u64,

    /// Stop after inserting this many parcels
    #[arg(long)]
    pub limit: Option<u64>,

    /// Target PostGIS table
    #[arg(long, default_value = "alkis_parcel")]
    pub table: String,

    /// SRID of the source coordinates (EPSG)
    #[arg(long, default_value_t = 25832)]
    pub srid: u32,

    /// Skip table/index creation (table must already exist)
    #[arg(long)]
    pub skip_ddl: bool,
}

/// Exécute la commande import
pub async fn cmd_import(args: &ImportArgs) -> Result<()> {
    // Connexion d'abord: sans base, le run avorte avant tout traitement
    let db_config = DatabaseConfig::from_env();
    let pool = pool::create_pool(&db_config).await?;
    pool::test_connection(&pool)
        .await
        .context("failed to connect to database")?;
    info!(
        host = %db_config.host,
        dbname = %db_config.dbname,
        user = %db_config.user,
        "database connection established"
    );

    let files = collect_sources(&args.inputs, !args.no_recursive);
    if files.is_empty() {
        warn!("no input files found");
        return Ok(());
    }
    info!(files = files.len(), "found input file(s)");

    // Une seule connexion et un seul contexte transactionnel pour le run
    let client = pool
        .get()
        .await
        .context("failed to get connection from pool")?;

    if !args.skip_ddl {
        postgres::ensure_table(&client, &args.table).await?;
    }

    let mut stats = ImportStats::default();
    let mut writer = BatchWriter::new(
        &client,
        &args.table,
        args.srid,
        args.batch_size,
        args.commit_interval,
        args.limit,
    );
    writer.begin().await?;

    for path in &files {
        match process_file(path, &mut writer, &mut stats).await {
            Ok(true) => {}
            Ok(false) => {
                info!(inserted = stats.parcels_inserted, "limit reached");
                break;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to process file");
            }
        }
    }

    // Commit terminal, même si certains fichiers ont échoué
    writer.finish(&mut stats).await?;

    stats.print_summary();
    Ok(())
}

/// Traite un fichier; retourne `false` quand la limite globale est atteinte
async fn process_file(
    path: &Path,
    writer: &mut BatchWriter<'_>,
    stats: &mut ImportStats,
) -> Result<bool> {
    stats.files_seen += 1;
    info!(file = %path.display(), "processing");

    let seen_before = stats.parcels_seen;
    let inserted_before = stats.parcels_inserted;
    let skipped_before = stats.parcels_skipped;
    let errors_before = stats.errors;

    for element in FeatureReader::open(path)? {
        let element = element?;

        if writer.limit_reached(stats) {
            writer.flush(stats).await?;
            return Ok(false);
        }

        stats.parcels_seen += 1;

        let Some(parcel) = Parcel::from_element(&element) else {
            stats.parcels_skipped += 1;
            continue;
        };

        if writer.push(parcel, stats).await? == BatchState::Done {
            return Ok(false);
        }
    }

    writer.flush(stats).await?;

    if writer.limit_reached(stats) {
        return Ok(false);
    }

    info!(
        file = %path.display(),
        seen = stats.parcels_seen - seen_before,
        inserted = stats.parcels_inserted - inserted_before,
        skipped = stats.parcels_skipped - skipped_before,
        errors = stats.errors - errors_before,
        "finished file"
    );

    Ok(true)
}

/// Collecte les fichiers d'entrée: chemins exacts et dossiers (récursif
/// par défaut), filtrés par extension, dédupliqués, triés
fn collect_sources(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for entry in inputs {
        if entry.is_dir() {
            collect_dir(entry, recursive, &mut files);
        } else if entry.is_file() {
            if nas::is_supported_input(entry) {
                files.insert(entry.clone());
            } else {
                debug!(file = %entry.display(), "skipping unsupported input file");
            }
        }
    }

    let ordered: Vec<PathBuf> = files.into_iter().collect();
    debug!(count = ordered.len(), "collected input files");
    ordered
}

fn collect_dir(dir: &Path, recursive: bool, files: &mut BTreeSet<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_dir(&path, recursive, files);
            }
        } else if nas::is_supported_input(&path) {
            files.insert(path);
        }
    }
}
