//! CRM request endpoint tests.
//!
//! These drive the axum router in-process, one module per operation.

mod cors;
