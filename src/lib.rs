//! # filehost
//!
//! A multi-tenant file hosting service. Users register, receive an API key,
//! and create repositories backed by object-storage buckets that hold their
//! files. Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use filehost::server::{AppState, create_router};
//! use filehost::service::FileHost;
//! use filehost::storage::FsObjectStore;
//! use filehost::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/filehost.db")?;
//! store.initialize()?;
//!
//! let objects = FsObjectStore::new("./data".as_ref());
//! let host = FileHost::new(Arc::new(store), Arc::new(objects));
//! let router = create_router(Arc::new(AppState { host }));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): the `filehost` binary.
//! - `s3` (default): the S3-compatible object store backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod naming;
pub mod server;
pub mod service;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;
