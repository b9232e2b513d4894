// Library root: athlete strength scoring (Z/T-scores) over a performance table.
//
// Modules in dependency order: schema -> dataset -> period -> scoring ->
// snapshot -> config.

pub mod config;
pub mod dataset;
pub mod period;
pub mod schema;
pub mod scoring;
pub mod snapshot;
