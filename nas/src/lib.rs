//! # nas
//!
//! Parser pour les extraits ALKIS au format NAS/GML (cadastre allemand,
//! features `AX_Flurstueck`).
//!
//! ## Features
//!
//! - Lecture en streaming (fichiers multi-gigaoctets, mémoire bornée)
//! - Transport plain XML ou gzip (`.xml`, `.xml.gz`, `.nas`, `.nas.gz`)
//! - Reconstruction des rings fermés depuis les segments de courbes GML
//! - Extraction tolérante des attributs (champ absent → `None`, jamais fatal)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! for parcel in nas::FeatureReader::open(Path::new("extract.xml.gz"))? {
//!     let element = parcel?;
//!     if let Some(parcel) = nas::Parcel::from_element(&element) {
//!         println!("{}: {}", parcel.adv_id, parcel.wkt_geometry);
//!     }
//! }
//! ```

pub mod attributes;
pub mod element;
pub mod error;
pub mod geometry;
pub mod parcel;
pub mod reader;

pub use element::Element;
pub use error::NasError;
pub use parcel::Parcel;
pub use reader::FeatureReader;

use std::path::Path;

/// Extensions acceptées pour un extrait ALKIS
const SUPPORTED_SUFFIXES: [&str; 4] = [".xml", ".xml.gz", ".nas", ".nas.gz"];

/// Vérifie si un chemin ressemble à un extrait ALKIS supporté
/// (sur le nom de fichier uniquement, insensible à la casse)
pub fn is_supported_input(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();
    SUPPORTED_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}
