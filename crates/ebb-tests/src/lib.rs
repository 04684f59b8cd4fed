//! Cross-crate test suite for Ebb.
//!
//! Property tests check the window invariants under randomized heights and
//! operation sequences; scenario tests replay literal histories end to end.

pub mod helpers;
