pub mod align;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod mirbase;
pub mod ncbi;
pub mod output;
pub mod ratelimit;
pub mod resolver;
pub mod scorer;
pub mod store;
pub mod tair;
