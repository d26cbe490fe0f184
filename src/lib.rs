pub mod classify;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod linker;
pub mod metrics;
pub mod model;
pub mod util;
pub mod vectors;
