//! Delivery of engine events to the notification collaborator.

mod batch;
pub use batch::{EventBatch, to_json_lines};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{NotifyClient, NotifyError};
