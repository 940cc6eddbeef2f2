//! Fixed stage tables for each operation type.
//!
//! Stages execute strictly in order; each carries the progress percentage the
//! run advances to once that stage's backend call succeeds. Latency lives
//! behind the backend seam, never here.

use crate::user::OperationKind;

/// One ordered unit of work with its progress target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub name: &'static str,
    pub target_percent: u8,
}

const MODIFY_ID_STAGES: &[StageSpec] = &[
    StageSpec { name: "send-request", target_percent: 10 },
    StageSpec { name: "validate-new-id", target_percent: 30 },
    StageSpec { name: "update-account", target_percent: 50 },
    StageSpec { name: "update-dependent-records", target_percent: 70 },
    StageSpec { name: "verify-result", target_percent: 90 },
    StageSpec { name: "complete", target_percent: 100 },
];

const CLONE_TO_NEW_STAGES: &[StageSpec] = &[
    StageSpec { name: "send-request", target_percent: 10 },
    StageSpec { name: "validate-target", target_percent: 20 },
    StageSpec { name: "copy-account-data", target_percent: 40 },
    StageSpec { name: "update-local-id", target_percent: 60 },
    StageSpec { name: "sync-dependent-records", target_percent: 80 },
    StageSpec { name: "complete", target_percent: 100 },
];

/// The ordered stage sequence for `op`.
pub fn stages_for(op: OperationKind) -> &'static [StageSpec] {
    match op {
        OperationKind::ModifyId => MODIFY_ID_STAGES,
        OperationKind::CloneToNew => CLONE_TO_NEW_STAGES,
    }
}
