//! Audits DefinitelyTyped packages against the npm registry.
//!
//! For every published `@types/*` package this crate determines whether the
//! real npm package already ships its own declarations, whether the declared
//! major/minor lags the current upstream release, and surfaces anomalies
//! (missing from the registry, unpublished, deprecated). Results are persisted
//! as one JSON record per package so repeated runs stay incremental.

pub mod cache;
pub mod check;
pub mod config;
pub mod dt;
pub mod registry;
pub mod report;
pub mod version;
