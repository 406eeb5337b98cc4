//! Persistance vers PostgreSQL/PostGIS

pub mod batch;
pub mod pool;
pub mod postgres;
