pub mod models;
pub mod registry;
pub mod stats;
