//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. The controller keeps the per-node access
//! client secrets in a [`SecretString`] so that `Debug` output and tracing
//! fields never contain the raw value.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct AccessCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = AccessCredentials {
//!     client_id: "frame-adam".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
