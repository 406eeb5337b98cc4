//! Schéma et requêtes SQL pour la table des parcelles
//!
//! La géométrie est soumise en texte (projection source) et confiée à
//! PostGIS: parsing, représentation multi-parties forcée, reprojection
//! vers WGS84 au moment de l'écriture.

use anyhow::{Context, Result};
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;
use tracing::{info, warn};

use nas::Parcel;

/// Colonnes cibles, dans l'ordre de binding des paramètres
pub const INSERT_COLUMNS: [&str; 12] = [
    "adv_id",
    "start_time",
    "state_number",
    "administrative_district_number",
    "county_number",
    "municipality_number",
    "cadastral_district_number",
    "field_number_original",
    "denominator",
    "numerator",
    "different_legal_status",
    "geometry",
];

/// Active PostGIS si nécessaire (peut nécessiter des droits superuser).
/// Si l'extension existe déjà mais que l'utilisateur ne peut pas la
/// (re)créer, on dégrade gracieusement.
async fn ensure_postgis(client: &Client) -> Result<()> {
    match client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if exists {
                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "PostGIS extension is not installed and could not be created: {e}"
                ))
            }
        }
    }
}

/// Crée la table cible et ses index si absents
pub async fn ensure_table(client: &Client, table: &str) -> Result<()> {
    ensure_postgis(client).await?;

    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            row_id BIGSERIAL PRIMARY KEY,
            adv_id TEXT NOT NULL,
            start_time TIMESTAMPTZ,
            state_number TEXT,
            administrative_district_number INTEGER,
            county_number INTEGER,
            municipality_number INTEGER,
            cadastral_district_number INTEGER NOT NULL,
            field_number_original TEXT,
            denominator INTEGER,
            numerator INTEGER,
            different_legal_status BOOLEAN,
            geometry geometry(MultiPolygon, 4326)
        )
        "#
    );

    client
        .execute(&sql, &[])
        .await
        .with_context(|| format!("Failed to create table {table}"))?;

    // Index spatial
    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_geom ON {table} USING GIST (geometry)"
            ),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create geometry index on {table}"))?;

    // Index sur la Gemarkung pour lookup rapide
    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_gemarkung ON {table} (cadastral_district_number)"
            ),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create cadastral district index on {table}"))?;

    info!(table, "target table ready");
    Ok(())
}

/// Construit un INSERT multi-lignes. Le dernier placeholder de chaque
/// ligne est la géométrie en texte, parsée et reprojetée côté store.
pub fn insert_sql(table: &str, source_srid: u32, rows: usize) -> String {
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", table, INSERT_COLUMNS.join(", "));

    let mut placeholder = 1;
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for column in 0..INSERT_COLUMNS.len() {
            if column > 0 {
                sql.push_str(", ");
            }
            if column == INSERT_COLUMNS.len() - 1 {
                sql.push_str(&format!(
                    "ST_Multi(ST_Transform(ST_GeomFromText(${placeholder}, {source_srid}), 4326))"
                ));
            } else {
                sql.push_str(&format!("${placeholder}"));
            }
            placeholder += 1;
        }
        sql.push(')');
    }

    sql
}

/// Paramètres d'une parcelle, dans l'ordre de `INSERT_COLUMNS`
pub fn parcel_params(parcel: &Parcel) -> [&(dyn ToSql + Sync); 12] {
    [
        &parcel.adv_id,
        &parcel.start_time,
        &parcel.state_number,
        &parcel.administrative_district_number,
        &parcel.county_number,
        &parcel.municipality_number,
        &parcel.cadastral_district_number,
        &parcel.field_number_original,
        &parcel.denominator,
        &parcel.numerator,
        &parcel.different_legal_status,
        &parcel.wkt_geometry,
    ]
}
