//! Schema migrations for the openclaw control plane database.

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;
