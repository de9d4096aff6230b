pub mod error;
pub mod projector;
