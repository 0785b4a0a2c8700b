//! Derived views over a snapshot, built once per evaluation and shared by
//! every rule.

pub mod links;
pub mod temporal;
pub mod workload;
