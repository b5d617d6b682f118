//! Homelet core library: rental marketplace application lifecycle.
//!
//! The [`leasing`] module owns the domain model and the state machine that
//! moves a tenant's application through pending, approved, rejected,
//! withdrawn, and expired. [`config`], [`telemetry`], and [`error`] carry the
//! service plumbing shared with the API binary.

pub mod config;
pub mod error;
pub mod leasing;
pub mod telemetry;
