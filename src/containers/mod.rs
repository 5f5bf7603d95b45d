//! Run configuration and dataset containers

mod config;
mod data;
mod table;

pub use config::{Config, ConfigBuilder, Location, MIN_DATE_FORMAT};
pub use data::Data;
pub use table::Table;
