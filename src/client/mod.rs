//! HTTP client abstraction and encrypted MessagePack protocol
//!
//! Provides request framing from session state, a transport seam, and the
//! executor that merges cookies and decrypts/decodes response bodies.

pub mod executor;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use executor::execute;
pub use request::{build_request, WireRequest};
pub use response::{ApiStatus, Body, ContentKind, RawResponse, Response};
pub use transport::{HttpTransport, Transport};

#[cfg(any(test, feature = "mock"))]
pub use mock::{ScriptedResponse, ScriptedTransport};
