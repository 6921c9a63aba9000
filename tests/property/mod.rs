//! Property-based tests
//!
//! Uses proptest to generate feed interleavings and verify the store
//! invariants hold for all of them.
