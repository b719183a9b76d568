//! Loan application processing service.
//!
//! The core of the crate is [`workflows::loan`]: a fixed four-stage scoring
//! pipeline (credit scoring, loan decision, verification, risk monitoring)
//! that mutates a single [`workflows::loan::ProcessingState`] and always hands
//! back a finalized record, even when individual stages fail.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
