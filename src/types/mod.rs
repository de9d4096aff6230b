pub mod grid;
pub mod run;
pub mod station;
pub mod zone;
