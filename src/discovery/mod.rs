//! Discovery module - sighting ingestion, passive table harvests, active sweeps

mod engine;
mod passive;
mod sweep;

pub use engine::DiscoveryEngine;
