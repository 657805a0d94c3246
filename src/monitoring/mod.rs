pub mod dashboard;
pub mod logger;
