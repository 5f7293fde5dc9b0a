//! Account signup
//!
//! A new account gets one zero-balance wallet per configured currency.

pub mod handlers;
pub mod service;

pub use service::{SignupRequest, SignupResponse, SignupService};
