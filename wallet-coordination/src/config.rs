//! Plain configuration values for the coordination core.
//!
//! This is a value type only: no file or environment parsing lives here.
//! Loading a [`Config`] from disk or `clap` is the surrounding process's
//! job, not the coordination core's.

use std::time::Duration;

/// Tunable parameters of the coordination protocol.
///
/// The `Default` impl matches the literal constants from the protocol
/// description (`F = 900`, `A = 80`, `P = 20`, `S = 32`, heartbeat 1-in-8,
/// full window every 16th window).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Coordination frequency `F`: windows occur every `F` blocks.
    pub coordination_frequency: u64,
    /// Active phase length `A`, in blocks.
    pub active_phase_blocks: u64,
    /// Passive phase length `P`, in blocks.
    pub passive_phase_blocks: u64,
    /// Safe-block shift `S`, in blocks.
    pub safe_block_shift: u64,
    /// Modulus applied to the first 8 seed bytes to decide heartbeat
    /// inclusion (default: include when `seed_u64 % heartbeat_modulus ==
    /// heartbeat_residue`).
    pub heartbeat_modulus: u64,
    /// Target residue for heartbeat inclusion.
    pub heartbeat_residue: u64,
    /// Every `full_window_period`-th window index is a "full window"
    /// (redemption + every sweep action, no heartbeat).
    pub full_window_period: u64,
    /// Expected wall-clock time per block, used to translate the active
    /// phase's block-denominated deadline into a `tokio::time` timeout
    /// (spec.md §5: "implementers translate to wall time via expected
    /// block period, or gate on block number via a chain subscription").
    pub expected_block_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordination_frequency: 900,
            active_phase_blocks: 80,
            passive_phase_blocks: 20,
            safe_block_shift: 32,
            heartbeat_modulus: 8,
            heartbeat_residue: 0,
            full_window_period: 16,
            expected_block_period: Duration::from_secs(600),
        }
    }
}

impl Config {
    /// Wall-clock duration of the active phase, per
    /// `expected_block_period`.
    pub fn active_phase_timeout(&self) -> Duration {
        self.expected_block_period * self.active_phase_blocks as u32
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.coordination_frequency, 900);
        assert_eq!(cfg.active_phase_blocks, 80);
        assert_eq!(cfg.passive_phase_blocks, 20);
        assert_eq!(cfg.safe_block_shift, 32);
        assert_eq!(cfg.full_window_period, 16);
    }
}
