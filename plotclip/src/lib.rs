pub mod aggregate;
pub mod catalog;
pub mod clip;
pub mod config;
pub mod csv_sink;
pub mod error;
pub mod geo_core;
pub mod geometry;
pub mod overlap;
pub mod pipeline;
pub mod probe;
pub mod stats;
