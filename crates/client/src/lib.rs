//! HTTP transport for the detection and tracking service.
//!
//! [`api::DetectionApi`] wraps one `reqwest::Client` and exposes a typed
//! method per service endpoint. [`config::ClientConfig`] carries the base
//! URL and timeouts, [`urls::MediaUrls`] builds direct links to uploaded
//! and rendered media.

pub mod api;
pub mod config;
pub mod upload;
pub mod urls;

pub use api::{ApiError, DetectionApi};
pub use config::ClientConfig;
pub use upload::MediaUpload;
