pub mod client;
pub mod envelope;
pub mod error;
pub mod form;
pub mod transport;

pub use client::ApiClient;
pub use envelope::{Ack, ApiResponse};
pub use error::ApiError;
pub use form::Form;
pub use transport::{ApiRequest, Body, HttpTransport, Method, RawResponse, Transport};

#[cfg(test)]
pub(crate) mod testing;
