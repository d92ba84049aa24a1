//! Process exit codes for fatal orchestration failures
//!
//! Distinct codes let wrapping test harnesses tell a backend problem from a
//! provisioning-logic failure.

/// A container/cluster backend call failed
pub const BACKEND_PROBLEM: i32 = 2;

/// A node mixed image-based directives with rule-resolved ones
pub const MIXED_IMAGE: i32 = 3;

/// The provisioning playbook reported failed tasks
pub const PLAYBOOK_FAILED: i32 = 4;
