//! Actions checklist derivation (spec.md §4.5).

use crate::config::Config;
use crate::proposal::WalletActionType;
use crate::seed::Seed;

/// Derives the ordered candidate action list for a window (spec.md §4.5).
///
/// Deterministic in `(window_index, seed)`. Empty for invalid windows
/// (`window_index == 0`, spec.md §8 invariant 6).
pub fn actions_checklist(window_index: u64, seed: &Seed, cfg: &Config) -> Vec<WalletActionType> {
    if window_index == 0 {
        return Vec::new();
    }

    if cfg.full_window_period != 0 && window_index % cfg.full_window_period == 0 {
        return vec![
            WalletActionType::Redemption,
            WalletActionType::DepositSweep,
            WalletActionType::MovedFundsSweep,
            WalletActionType::MovingFunds,
        ];
    }

    let mut checklist = vec![WalletActionType::Redemption];
    if includes_heartbeat(seed, cfg) {
        checklist.push(WalletActionType::Heartbeat);
    }
    checklist
}

/// Deterministic 1-in-`heartbeat_modulus` selection from the seed alone
/// (spec.md §4.5, §9 open question — resolved here and in `DESIGN.md`).
fn includes_heartbeat(seed: &Seed, cfg: &Config) -> bool {
    if cfg.heartbeat_modulus == 0 {
        return false;
    }
    seed.leading_u64() % cfg.heartbeat_modulus == cfg.heartbeat_residue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_from(u: u64) -> Seed {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&u.to_be_bytes());
        Seed(bytes)
    }

    #[test]
    fn invalid_window_has_empty_checklist() {
        let cfg = Config::default();
        assert_eq!(actions_checklist(0, &seed_from(123), &cfg), vec![]);
    }

    #[test]
    fn full_window_is_redemption_plus_every_sweep_no_heartbeat() {
        let cfg = Config::default();
        for k in 1..=10u64 {
            let got = actions_checklist(16 * k, &seed_from(0), &cfg);
            assert_eq!(
                got,
                vec![
                    WalletActionType::Redemption,
                    WalletActionType::DepositSweep,
                    WalletActionType::MovedFundsSweep,
                    WalletActionType::MovingFunds,
                ]
            );
        }
    }

    #[test]
    fn ordinary_window_starts_with_redemption() {
        let cfg = Config::default();
        let got = actions_checklist(1, &seed_from(1), &cfg);
        assert_eq!(got[0], WalletActionType::Redemption);
    }

    #[test]
    fn heartbeat_included_iff_seed_residue_matches() {
        let cfg = Config::default();
        let seed_with_heartbeat = seed_from(8); // 8 % 8 == 0 == residue
        let seed_without = seed_from(9); // 9 % 8 == 1 != residue

        assert_eq!(
            actions_checklist(1, &seed_with_heartbeat, &cfg),
            vec![WalletActionType::Redemption, WalletActionType::Heartbeat]
        );
        assert_eq!(
            actions_checklist(1, &seed_without, &cfg),
            vec![WalletActionType::Redemption]
        );
    }

    #[test]
    fn checklist_is_pure_function_of_index_and_seed() {
        let cfg = Config::default();
        let seed = seed_from(55);
        assert_eq!(
            actions_checklist(900, &seed, &cfg),
            actions_checklist(900, &seed, &cfg)
        );
    }
}
