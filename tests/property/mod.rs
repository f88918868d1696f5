//! Property-based tests
//!
//! Uses proptest to check the merge and unread-count invariants over random
//! delivery sequences

mod merge_proptest;
mod store_proptest;
