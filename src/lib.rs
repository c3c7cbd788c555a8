pub mod cli;
pub mod config;
pub mod energy;
pub mod error;
pub mod model;
pub mod output;
pub mod topology;
