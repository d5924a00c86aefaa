//! Core types and error taxonomy for enrollment-certificate acquisition.
//!
//! This crate provides the foundational types shared by the CA client and the
//! node-side enrollment logic:
//!
//! - **Types**: the ECAP protocol messages ([`EnrollmentRequest`],
//!   [`CreateCertificateResponse`], ...) and the data model
//!   ([`EnrollmentResult`], [`CaCertificateChain`])
//! - **Errors**: a closed taxonomy in [`EnrollError`] so callers can branch on
//!   retryability without string matching
//!
//! # Example
//!
//! ```rust,ignore
//! use enroll_core::{EnrollError, Result};
//!
//! fn should_retry(result: &Result<()>) -> bool {
//!     matches!(result, Err(e) if e.is_retryable())
//! }
//! ```

mod error;
pub mod types;

pub use error::{EnrollError, ErrorKind, Result};
pub use types::*;
