//! Domain types and pure state logic for the tracklens detection client.
//!
//! Nothing in this crate performs I/O. The transport lives in
//! `tracklens-client`; the stateful controllers that combine the two live
//! in `tracklens-session`.

pub mod error;
pub mod pagination;
pub mod records;
pub mod session;
pub mod types;
pub mod video;
pub mod visibility;
