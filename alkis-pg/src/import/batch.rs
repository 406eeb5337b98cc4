//! Moteur d'insertion par lots avec repli ligne à ligne
//!
//! Machine à états sur un run:
//! ACCUMULATING → BULK_ATTEMPT → (BULK_OK | BULK_FAILED → ROW_FALLBACK)
//! → ACCUMULATING | DONE.
//!
//! La tentative bulk tourne sous un savepoint: un échec n'annule que la
//! tentative, jamais les lots précédents encore non commités. Le repli
//! enveloppe chaque ligne dans son propre savepoint — seules les lignes
//! réellement invalides sont perdues, et elles sont comptées en erreurs.

use anyhow::{Context, Result};
use tokio_postgres::Client;
use tracing::{debug, error, info, warn};

use nas::Parcel;

use crate::import::postgres::{insert_sql, parcel_params};
use crate::report::ImportStats;

/// État du moteur après un push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Le buffer accepte encore des enregistrements
    Accumulating,
    /// Limite globale atteinte, plus aucune insertion ne démarrera
    Done,
}

/// Résultat d'un flush, pour l'observabilité et les tests de transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Buffer vide, rien à écrire
    Empty,
    /// Insertion bulk réussie
    BulkOk { rows: u64 },
    /// Bulk échoué, repli ligne à ligne
    Fallback { inserted: u64, failed: u64 },
}

/// Vrai quand le compteur cumulé franchit un multiple de l'intervalle.
/// Un bulk de n lignes qui saute par-dessus la frontière commit quand même.
pub fn crossed_commit_interval(before: u64, after: u64, interval: u64) -> bool {
    interval > 0 && before / interval < after / interval
}

/// Moteur de persistance: buffer, transaction et cadence de commit
pub struct BatchWriter<'a> {
    client: &'a Client,
    table: String,
    source_srid: u32,
    batch_size: usize,
    commit_interval: u64,
    limit: Option<u64>,
    buffer: Vec<Parcel>,
}

impl<'a> BatchWriter<'a> {
    pub fn new(
        client: &'a Client,
        table: &str,
        source_srid: u32,
        batch_size: usize,
        commit_interval: u64,
        limit: Option<u64>,
    ) -> Self {
        Self {
            client,
            table: table.to_string(),
            source_srid,
            batch_size,
            commit_interval,
            limit,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    /// Ouvre la transaction du run
    pub async fn begin(&self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .context("Failed to begin transaction")
    }

    /// Vrai si la limite globale d'insertion est atteinte
    pub fn limit_reached(&self, stats: &ImportStats) -> bool {
        self.limit
            .is_some_and(|limit| stats.parcels_inserted >= limit)
    }

    /// Place restante avant la limite, buffer compris
    fn remaining_allowance(&self, stats: &ImportStats) -> Option<u64> {
        self.limit
            .map(|limit| limit.saturating_sub(stats.parcels_inserted + self.buffer.len() as u64))
    }

    /// Ajoute un enregistrement au buffer, en flushant si la capacité ou
    /// la limite globale est atteinte. Retourne `Done` quand plus aucune
    /// insertion ne doit démarrer.
    pub async fn push(&mut self, parcel: Parcel, stats: &mut ImportStats) -> Result<BatchState> {
        // La limite est vérifiée avant d'accepter l'enregistrement, pour
        // ne jamais entamer une (N+1)-ième insertion
        if self.remaining_allowance(stats) == Some(0) {
            self.flush(stats).await?;
            if self.limit_reached(stats) {
                return Ok(BatchState::Done);
            }
        }

        self.buffer.push(parcel);

        if self.batch_size > 0 && self.buffer.len() >= self.batch_size {
            self.flush(stats).await?;
            if self.limit_reached(stats) {
                return Ok(BatchState::Done);
            }
        }

        Ok(BatchState::Accumulating)
    }

    /// Écrit le buffer: une tentative bulk, puis repli ligne à ligne si
    /// elle échoue. Les deux chemins persistent le même ensemble de
    /// lignes, au sous-ensemble réellement invalide près.
    pub async fn flush(&mut self, stats: &mut ImportStats) -> Result<FlushOutcome> {
        if self.buffer.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let rows = std::mem::take(&mut self.buffer);

        self.client
            .batch_execute("SAVEPOINT bulk_attempt")
            .await
            .context("Failed to create bulk savepoint")?;

        let sql = insert_sql(&self.table, self.source_srid, rows.len());
        let params: Vec<_> = rows.iter().flat_map(|p| parcel_params(p)).collect();

        match self.client.execute(&sql, &params).await {
            Ok(_) => {
                self.client
                    .batch_execute("RELEASE SAVEPOINT bulk_attempt")
                    .await
                    .context("Failed to release bulk savepoint")?;

                let before = stats.parcels_inserted;
                stats.parcels_inserted += rows.len() as u64;
                debug!(rows = rows.len(), "bulk insert ok");
                self.maybe_commit(before, stats.parcels_inserted).await?;

                Ok(FlushOutcome::BulkOk {
                    rows: rows.len() as u64,
                })
            }
            Err(e) => {
                warn!(
                    rows = rows.len(),
                    error = %e,
                    "failed to insert batch; falling back to row inserts"
                );
                self.client
                    .batch_execute("ROLLBACK TO SAVEPOINT bulk_attempt")
                    .await
                    .context("Failed to roll back bulk savepoint")?;

                self.row_fallback(&rows, stats).await
            }
        }
    }

    /// Rejoue chaque ligne du lot sous son propre savepoint
    async fn row_fallback(
        &self,
        rows: &[Parcel],
        stats: &mut ImportStats,
    ) -> Result<FlushOutcome> {
        let sql = insert_sql(&self.table, self.source_srid, 1);
        let statement = self
            .client
            .prepare(&sql)
            .await
            .context("Failed to prepare row insert")?;

        let mut inserted = 0u64;
        let mut failed = 0u64;

        for row in rows {
            self.client
                .batch_execute("SAVEPOINT row_attempt")
                .await
                .context("Failed to create row savepoint")?;

            match self.client.execute(&statement, &parcel_params(row)).await {
                Ok(_) => {
                    self.client
                        .batch_execute("RELEASE SAVEPOINT row_attempt")
                        .await
                        .context("Failed to release row savepoint")?;

                    let before = stats.parcels_inserted;
                    stats.parcels_inserted += 1;
                    inserted += 1;
                    self.maybe_commit(before, stats.parcels_inserted).await?;
                }
                Err(e) => {
                    error!(parcel = %row.adv_id, error = %e, "failed to insert parcel");
                    self.client
                        .batch_execute("ROLLBACK TO SAVEPOINT row_attempt")
                        .await
                        .context("Failed to roll back row savepoint")?;
                    stats.errors += 1;
                    failed += 1;
                }
            }
        }

        Ok(FlushOutcome::Fallback { inserted, failed })
    }

    /// Commit quand le compteur cumulé franchit l'intervalle, puis rouvre
    /// une transaction
    async fn maybe_commit(&self, before: u64, after: u64) -> Result<()> {
        if crossed_commit_interval(before, after, self.commit_interval) {
            self.client
                .batch_execute("COMMIT")
                .await
                .context("Failed to commit transaction")?;
            info!(inserted = after, "committed parcels");
            self.client
                .batch_execute("BEGIN")
                .await
                .context("Failed to begin transaction")?;
        }
        Ok(())
    }

    /// Commit terminal, toujours émis en fin de run
    pub async fn finish(mut self, stats: &mut ImportStats) -> Result<()> {
        self.flush(stats).await?;
        self.client
            .batch_execute("COMMIT")
            .await
            .context("Failed to commit final transaction")
    }
}
