//! Client for the enrollment Certificate Authority.
//!
//! This crate provides [`CaClient`], which speaks the ECAP protocol
//! (`CreateCertificate`, `ReadCACertificate`, `ReadCertificate`) as JSON
//! over HTTP, and the [`CertificateAuthority`] trait the enrollment logic is
//! written against.

mod authority;
mod client;
mod config;
pub mod api;

pub use authority::CertificateAuthority;
pub use client::{CaClient, CaClientBuilder, ROOT_IDENTITY_HINT};
pub use config::*;
pub use enroll_core::{EnrollError, Result};
