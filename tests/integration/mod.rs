//! Integration tests for flow-sniffer
//!
//! # Test Organization
//!
//! - `fixtures`: wire-format builders shared by the other modules
//! - `pipeline`: engine behaviour across phases and repeated calls
//! - `fakedns`: fake-DNS composition with the in-memory engine
//! - `session`: dispatcher-side driver, budgets and configuration

pub mod fixtures;
pub mod pipeline;
#[cfg(feature = "fakedns")]
pub mod fakedns;
pub mod session;
