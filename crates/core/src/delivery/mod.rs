//! Reliable delivery of detection events
//!
//! Data flow: `submit(event)` -> upload queue -> worker (single active
//! sender) -> gateway call -> policy classifies the outcome -> stats update
//! on success, offline archive on failure. At startup the offline store is
//! drained back into the queue before new submissions are processed.

pub mod policy;
pub mod ports;
pub mod queue;
pub mod service;
