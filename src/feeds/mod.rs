pub mod error;
pub mod feed_loader;
