//! Relay handler tests.
//!
//! Tests are organized into modules by feature area:
//! - `common` - Test relays, recording dispatchers and flow endpoint stubs
//! - `handlers` - The CRM request endpoint driven in-process through the router

pub mod common;

mod handlers;
