//! Unit tests for the queue module.
//!
//! Tests are organised by layer: domain rules, the in-memory repository
//! contract, and service orchestration.

mod support;
