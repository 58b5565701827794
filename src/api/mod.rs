//! Authenticated HTTP transport for the admin API.
//!
//! - [`transport`] - JSON client with bearer injection and 401 handling
//! - [`payload`] - normalization of bare-array and `{ data: [...] }` responses

mod payload;
mod transport;

pub use payload::unwrap_list;
pub use transport::{ApiClient, ApiSettings, TransportError};

#[cfg(test)]
pub(crate) use transport::tests::RecordingRedirect;
