//! Canonical domain model for COEX LED-display controllers.
//!
//! Everything above the gateway works against these types; vendor wire
//! shapes and field-name quirks stay inside `client_core`.

pub mod domain;
pub mod error;
