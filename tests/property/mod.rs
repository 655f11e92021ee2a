//! Property-based tests for registry invariants

mod registry_invariants;
