//! Types d'erreurs pour le crate nas

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un extrait NAS/GML
#[derive(Debug, Error)]
pub enum NasError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur du lexer XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Document malformé ou tronqué
    #[error("Invalid document {file}: {reason}")]
    InvalidDocument { file: String, reason: String },
}

impl NasError {
    /// Crée une erreur de document invalide avec contexte
    pub fn invalid_document(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
