//! HTTP transport over [`FileHost`](crate::service::FileHost).

mod accounts;
pub mod dto;
mod files;
pub mod response;
mod router;
mod repositories;

pub use files::MAX_UPLOAD_SIZE;
pub use router::{AppState, create_router};
