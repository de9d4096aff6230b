pub mod error;
pub mod zone_layer;
pub mod zone_resolver;
