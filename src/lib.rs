#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # Sekai Client
//!
//! Client for the game's private HTTP API: registers a device account and
//! exchanges AES-CBC encrypted MessagePack bodies with the backend.
//!
//! ## Architecture
//!
//! This library is organized into several key modules:
//!
//! - **[`error`]** - Error types and error handling
//! - **[`config`]** - Startup configuration loading and validation
//! - **[`crypto`]** - AES-CBC payload cipher
//! - **[`codec`]** - MessagePack body codec
//! - **[`session`]** - Shared session state and cookie jar
//! - **[`client`]** - Request framing, transport and response decoding
//! - **[`models`]** - Response records the pipeline reads
//! - **[`pipeline`]** - The named operation sequence
//!
//! ## Quick Start
//!
//! ```bash
//! sekai-client --config session.toml --agreement-out data_agreement.json
//! ```

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod session;

/// Error type alias for convenience
pub use error::{ClientError, Result};

/// Configuration type alias for convenience
pub use config::SessionConfig;

pub use pipeline::{GameClient, Operation, RunReport};
pub use session::{SessionCell, SessionState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "sekai-client";
