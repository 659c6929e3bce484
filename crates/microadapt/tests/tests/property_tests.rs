#[path = "property/engine_invariants.rs"]
mod engine_invariants;

#[path = "property/snapshot_fidelity.rs"]
mod snapshot_fidelity;
