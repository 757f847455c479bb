//! Fee and reward arithmetic.
//!
//! All amounts are integers scaled by [`DNA_BASE`], the smallest
//! indivisible unit of account balance. Every rate (burn share, stake
//! share, ...) is applied by multiplying before dividing so the result
//! is bit-identical across nodes regardless of how the underlying
//! bignum library orders its operations.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::config::Rate;
use crate::types::tx::TxKind;

/// Number of base units per whole coin.
pub const DNA_BASE: u64 = 1_000_000_000_000_000_000;

/// Numerator of the invitation surcharge, in thousandths of a coin per
/// validator: a sender pays `11000 / N` coins (scaled by `DNA_BASE`) on
/// top of any transferred amount when inviting a new identity.
const INVITE_SURCHARGE_NUMERATOR: u64 = 11_000;

/// Per-transaction fee: `(dna_base / validator_count) * size_in_bytes`.
/// Zero for `Kill`/`NewEpoch`, and zero when the validator count is
/// unknown (no validators yet, e.g. before the first epoch advance).
pub fn compute_fee(kind: TxKind, validator_count: u64, size_in_bytes: u64) -> BigUint {
    if matches!(kind, TxKind::Kill | TxKind::NewEpoch) || validator_count == 0 {
        return BigUint::zero();
    }
    (BigUint::from(DNA_BASE) / BigUint::from(validator_count)) * BigUint::from(size_in_bytes)
}

/// Invitation surcharge credited to the invitee on top of any
/// transferred amount: `ToInt((11000 / N) * dna_base)`. The numerator
/// and `dna_base` are multiplied together before dividing by `N` so the
/// fractional part of `11000 / N` is not truncated away early.
pub fn invite_surcharge(validator_count: u64) -> BigUint {
    if validator_count == 0 {
        return BigUint::zero();
    }
    (BigUint::from(INVITE_SURCHARGE_NUMERATOR) * BigUint::from(DNA_BASE)) / BigUint::from(validator_count)
}

/// Total amount debited from the sender: `amount + fee`, plus the
/// invitation surcharge for `Invite` transactions.
pub fn compute_cost(kind: TxKind, amount: &BigUint, fee: &BigUint, validator_count: u64) -> BigUint {
    let mut cost = amount + fee;
    if kind == TxKind::Invite {
        cost += invite_surcharge(validator_count);
    }
    cost
}

/// `true` if `balance` can cover `cost` without going negative.
pub fn can_afford(balance: &BigUint, cost: &BigUint) -> bool {
    balance >= cost
}

/// Splits a reward amount (the block reward, or one final-committee
/// member's share of the final-committee reward) between the
/// recipient's spendable balance and their non-withdrawable stake.
pub fn split_reward(reward: &BigUint, stake_reward_rate: Rate) -> (BigUint, BigUint) {
    let stake_share = stake_reward_rate.apply_to_biguint(reward);
    let balance_share = reward - &stake_share;
    (stake_share, balance_share)
}

/// Splits a block's collected transaction fees between the burned
/// portion and the proposer's fee reward.
pub fn split_collected_fees(total_fee: &BigUint, fee_burn_rate: Rate) -> (BigUint, BigUint) {
    let burn = fee_burn_rate.apply_to_biguint(total_fee);
    let fee_reward = total_fee - &burn;
    (burn, fee_reward)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_is_zero_for_kill_and_new_epoch() {
        assert!(compute_fee(TxKind::Kill, 10, 128).is_zero());
        assert!(compute_fee(TxKind::NewEpoch, 10, 128).is_zero());
    }

    #[test]
    fn fee_is_zero_with_no_validators() {
        assert!(compute_fee(TxKind::Regular, 0, 128).is_zero());
    }

    #[test]
    fn regular_transfer_fee_matches_worked_example() {
        // N=10, size=128: fee = (10^18/10)*128 = 1.28e19.
        let fee = compute_fee(TxKind::Regular, 10, 128);
        assert_eq!(fee, BigUint::from(12_800_000_000_000_000_000u128));
    }

    #[test]
    fn invite_surcharge_matches_worked_example() {
        // N=10: surcharge = ToInt(11000/10 * 10^18) = 1.1e21.
        let surcharge = invite_surcharge(10);
        assert_eq!(surcharge, BigUint::from(1_100_000_000_000_000_000_000u128));
    }

    #[test]
    fn invite_surcharge_preserves_fractional_precision() {
        // N=3: 11000/3 is not integral; multiplying dna_base in first
        // keeps the fraction instead of truncating it to zero.
        let surcharge = invite_surcharge(3);
        assert_eq!(
            surcharge,
            (BigUint::from(INVITE_SURCHARGE_NUMERATOR) * BigUint::from(DNA_BASE)) / BigUint::from(3u64)
        );
        assert!(surcharge > BigUint::zero());
    }

    #[test]
    fn split_reward_sums_back_to_the_original() {
        let reward = BigUint::from(1_000_000u64);
        let rate = Rate::new(500_000, 1_000_000);
        let (stake_share, balance_share) = split_reward(&reward, rate);
        assert_eq!(&stake_share + &balance_share, reward);
        assert_eq!(stake_share, BigUint::from(500_000u64));
    }

    #[test]
    fn split_collected_fees_sums_back_to_the_original() {
        let total_fee = BigUint::from(101u64);
        let rate = Rate::new(500_000, 1_000_000);
        let (burn, fee_reward) = split_collected_fees(&total_fee, rate);
        assert_eq!(&burn + &fee_reward, total_fee);
        assert_eq!(burn, BigUint::from(50u64));
    }

    #[test]
    fn can_afford_respects_cost() {
        let balance = BigUint::from(100u32);
        assert!(can_afford(&balance, &BigUint::from(100u32)));
        assert!(!can_afford(&balance, &BigUint::from(101u32)));
    }
}
