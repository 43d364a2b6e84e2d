//! The fault taxonomy (spec.md §4.9).

use serde::{Deserialize, Serialize};

use crate::chain::OperatorAddress;

/// Kinds of attributable leader misbehaviour (spec.md §4.9).
///
/// The coordination core only *records* faults; enforcement (slashing) is
/// entirely downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultType {
    /// Active phase ended without any acceptable message from the elected
    /// leader.
    LeaderIdleness,
    /// The leader sent a message whose proposal fails structural or
    /// action-checklist checks.
    LeaderMistake,
    /// A non-leader operator sent a `CoordinationMessage` for this
    /// (window, wallet).
    LeaderImpersonation,
}

/// A single attributable fault (spec.md §3 `Fault`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub culprit: OperatorAddress,
    pub fault_type: FaultType,
}

impl Fault {
    pub fn new(culprit: OperatorAddress, fault_type: FaultType) -> Self {
        Self {
            culprit,
            fault_type,
        }
    }
}

/// Tracks faults recorded during one `coordinate()` call, enforcing "at
/// most one fault per (window, culprit)" (spec.md §3 `Fault` invariant) by
/// only recording the first fault seen for a given culprit.
#[derive(Default, Debug)]
pub struct FaultLog {
    faults: Vec<Fault>,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `fault` unless this culprit already has one recorded for
    /// this coordination.
    pub fn record(&mut self, fault: Fault) {
        if !self.faults.iter().any(|f| f.culprit == fault.culprit) {
            self.faults.push(fault);
        }
    }

    pub fn into_vec(self) -> Vec<Fault> {
        self.faults
    }

    pub fn as_slice(&self) -> &[Fault] {
        &self.faults
    }
}
