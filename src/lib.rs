pub mod apis;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod types;

// Network access behind a blocking fetch seam
pub mod infra;
