//! HTTP request handlers.
//!
//! - `viewer`: upload form, gallery and composite merge
//! - `health`: health, readiness and Prometheus metrics
//! - `common`: error responses and gallery entries

pub mod common;
pub mod health;
pub mod viewer;

pub use common::{ApiError, GalleryImage};
pub use health::{health_handler, metrics_handler, ready_handler};
pub use viewer::{convert_handler, gallery_handler, upload_handler};
