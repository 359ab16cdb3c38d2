pub mod staging;

pub use staging::{sha256_hex, StagingCache};
