//! Integration test suite for tapkey.
//!
//! Spends run end to end against in-memory collaborators; signatures are
//! checked against independently recomputed sighashes. Property tests cover
//! selection, change, drain, classification and derivation invariants.

pub mod helpers;
