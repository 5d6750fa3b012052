pub mod classifier;
pub mod definition;
pub mod models;
