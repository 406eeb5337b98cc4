//! # alkis-pg
//!
//! Import de parcelles ALKIS (NAS/GML) vers PostGIS.
//!
//! ## Features
//!
//! - Lecture en streaming des extraits (plain ou gzip)
//! - Insertions par lots avec repli ligne à ligne en cas d'échec
//! - Cadence de commit configurable, limite globale d'insertion
//!
//! ## Usage CLI
//!
//! ```bash
//! # Import d'un dossier d'extraits ALKIS
//! alkis-pg --input ./data/sh/alkis/01_2025
//!
//! # Import limité, lots de 500
//! alkis-pg --input extract.xml.gz --batch-size 500 --limit 10000
//! ```

pub mod import;
pub mod report;

pub use report::ImportStats;
