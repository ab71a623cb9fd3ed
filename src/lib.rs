#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate rocket;

#[macro_use]
extern crate serde_json;

pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod datastore;
pub mod error;
pub mod indexer;
pub mod ingestion;
pub mod monitoring;
pub mod observer;
pub mod types;
