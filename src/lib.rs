//! GoodData REST API client
//!
//! This crate provides:
//! - Session handling for the two-cookie login protocol (`GDCAuthSST` + `GDCAuthTT`)
//! - Typed request/response models for user filters, users and attributes
//! - A streaming lookup that resolves attribute element titles to element URIs
//! - The `GoodDataApi` trait plus its HTTP implementation, `GoodDataClient`
//!
//! Every public operation logs in and acquires a temporary token before it runs,
//! so no session is ever reused between calls.

pub mod client;
pub mod config;
pub mod elements;
pub mod error;
mod http;
pub mod session;
pub mod types;

pub use client::{GoodDataApi, GoodDataClient};
pub use config::{ClientConfig, Scheme, TokenMethod};
pub use error::{GoodDataError, Operation, Result, VendorError};
pub use session::{Session, SessionState};
pub use types::*;
