//! Classification module - role signatures, scoring engine, monitoring strategies

mod engine;
mod signatures;
mod strategy;

pub use engine::{Classification, ClassifierEngine};
pub use signatures::{RoleSignature, BUILTIN_SIGNATURES};
pub use strategy::{monitoring_strategy_for, MonitoringStrategy, ProbeMethod};
