// Infrastructure adapters: network access behind a blocking fetch seam.

pub mod http_client;

pub use http_client::{HttpFetcher, ReqwestFetcher, RetryPolicy, StaticFetcher};
