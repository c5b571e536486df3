// Library for both binaries and the tests

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod relay;
pub mod routes;
pub mod serial;
pub mod signal;
pub mod stats;
pub mod topic;
pub mod window;
