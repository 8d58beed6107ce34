//! Client-side session logic for the detection service.
//!
//! - [`store::SessionStore`] owns the current image and video session and
//!   persists the video half through a [`storage::SessionStorage`].
//! - [`paginator::Paginator`] browses the record history page by page.
//! - [`reconciler::BoxVisibilityReconciler`] manages hidden tracks for a
//!   video and asks the server to re-render when needed.
//! - [`tracker::track_video`] polls a video until processing completes.
//!
//! Controllers reach the network through the traits in [`ports`], which
//! [`tracklens_client::DetectionApi`] implements.

pub mod error;
pub mod paginator;
pub mod ports;
pub mod reconciler;
pub mod storage;
pub mod store;
pub mod tracker;

pub use error::SessionError;
pub use store::SessionStore;
