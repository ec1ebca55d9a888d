mod server;

pub use server::{S3Config, ServerConfig, StorageConfig};
