pub mod aggregates;
pub mod error;
pub mod metrics_store;
