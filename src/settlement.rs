//! Settlement math: fee skim at resolution and pro-rata payout on claim
//!
//! ## Payout rule
//!
//! With winning pool `W`, losing pool `L` and `fee = floor(L * fee_bps / 10000)`,
//! the remainder `D = L - fee` stays in the losing vault and is paid out claim by
//! claim. A winning stake `s` receives `s + floor(D * s / W)`.
//!
//! A void market (`Outcome::Unset`) or one with nothing staked on the winning
//! side refunds every stake in full and charges no fee.

use crate::error::BinaryMarketError;
use crate::state::{Outcome, Side, BPS_DENOMINATOR, MAX_FEE_BPS};

/// How a resolved market pays its positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Every position gets its stake back
    Refund,
    /// Winners get their stake plus a share of `distributable`
    Payout {
        winner: Side,
        winning_total: u64,
        distributable: u64,
    },
}

impl Settlement {
    /// Amounts owed to a position with `stake` on `side`
    pub fn payout_for(&self, side: Side, stake: u64) -> Result<ClaimPayout, BinaryMarketError> {
        match *self {
            Settlement::Refund => Ok(ClaimPayout { side, stake, share: 0 }),
            Settlement::Payout {
                winner,
                winning_total,
                distributable,
            } => {
                if side != winner {
                    return Err(BinaryMarketError::NothingToClaim);
                }
                let share = pro_rata_share(distributable, stake, winning_total)?;
                Ok(ClaimPayout { side, stake, share })
            }
        }
    }
}

/// Effect of resolving a market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Lamports moved from the losing vault to the fee vault
    pub fee: u64,
    /// Losing pool left for winners
    pub distributable: u64,
    pub settlement: Settlement,
}

impl Resolution {
    /// Vault the fee is taken from
    pub fn fee_source(&self) -> Option<Side> {
        match self.settlement {
            Settlement::Payout { winner, .. } => Some(winner.opposite()),
            Settlement::Refund => None,
        }
    }
}

/// Lamports paid on one claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPayout {
    /// Side of the claiming position
    pub side: Side,
    /// Paid from the position's own vault
    pub stake: u64,
    /// Paid from the opposite vault
    pub share: u64,
}

impl ClaimPayout {
    pub fn total(&self) -> Result<u64, BinaryMarketError> {
        self.stake
            .checked_add(self.share)
            .ok_or(BinaryMarketError::ArithmeticOverflow)
    }
}

/// Calculate fee amount from total and basis points (rounded down)
pub fn calculate_fee(amount: u64, fee_bps: u16) -> Result<u64, BinaryMarketError> {
    if fee_bps > MAX_FEE_BPS {
        return Err(BinaryMarketError::InvalidFeeRate);
    }
    let fee = (amount as u128) * (fee_bps as u128) / (BPS_DENOMINATOR as u128);
    u64::try_from(fee).map_err(|_| BinaryMarketError::ArithmeticOverflow)
}

/// floor(distributable * stake / winning_total)
pub fn pro_rata_share(
    distributable: u64,
    stake: u64,
    winning_total: u64,
) -> Result<u64, BinaryMarketError> {
    if winning_total == 0 {
        return Err(BinaryMarketError::DivisionByZero);
    }
    let share = (distributable as u128)
        .checked_mul(stake as u128)
        .ok_or(BinaryMarketError::ArithmeticOverflow)?
        / (winning_total as u128);
    u64::try_from(share).map_err(|_| BinaryMarketError::ArithmeticOverflow)
}

/// Settlement mode for a market that has left Open
pub fn settlement_for(
    outcome: Outcome,
    total_yes: u64,
    total_no: u64,
    distributable: u64,
) -> Settlement {
    let winner = match outcome.winner() {
        Some(winner) => winner,
        None => return Settlement::Refund,
    };
    let winning_total = match winner {
        Side::Yes => total_yes,
        Side::No => total_no,
    };
    if winning_total == 0 {
        return Settlement::Refund;
    }
    Settlement::Payout {
        winner,
        winning_total,
        distributable,
    }
}

/// Compute fee and distributable remainder for a resolution
pub fn plan_resolution(
    outcome: Outcome,
    total_yes: u64,
    total_no: u64,
    fee_bps: u16,
) -> Result<Resolution, BinaryMarketError> {
    match settlement_for(outcome, total_yes, total_no, 0) {
        Settlement::Refund => Ok(Resolution {
            outcome,
            fee: 0,
            distributable: 0,
            settlement: Settlement::Refund,
        }),
        Settlement::Payout {
            winner,
            winning_total,
            ..
        } => {
            let losing_total = match winner {
                Side::Yes => total_no,
                Side::No => total_yes,
            };
            let fee = calculate_fee(losing_total, fee_bps)?;
            let distributable = losing_total
                .checked_sub(fee)
                .ok_or(BinaryMarketError::ArithmeticOverflow)?;
            Ok(Resolution {
                outcome,
                fee,
                distributable,
                settlement: Settlement::Payout {
                    winner,
                    winning_total,
                    distributable,
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    #[test]
    fn test_calculate_fee() {
        // 2 SOL with 2% fee = 0.04 SOL
        assert_eq!(calculate_fee(2 * LAMPORTS_PER_SOL, 200).unwrap(), 40_000_000);

        // Small pools round down to zero
        assert_eq!(calculate_fee(2, 200).unwrap(), 0);

        assert_eq!(calculate_fee(u64::MAX, 10_000).unwrap(), u64::MAX);
        assert_eq!(calculate_fee(100, 10_001), Err(BinaryMarketError::InvalidFeeRate));
    }

    #[test]
    fn test_pro_rata_share() {
        assert_eq!(pro_rata_share(1_960, 5, 8).unwrap(), 1_225);
        assert_eq!(pro_rata_share(2, 3, 8).unwrap(), 0);
        assert_eq!(pro_rata_share(u64::MAX, u64::MAX, u64::MAX).unwrap(), u64::MAX);
        assert_eq!(pro_rata_share(10, 1, 0), Err(BinaryMarketError::DivisionByZero));
    }

    #[test]
    fn test_two_percent_fee_scenario() {
        // YES 5 + 3 SOL, NO 2 SOL, fee 200 bps, YES wins
        let resolution = plan_resolution(
            Outcome::Yes,
            8 * LAMPORTS_PER_SOL,
            2 * LAMPORTS_PER_SOL,
            200,
        )
        .unwrap();
        assert_eq!(resolution.fee, 40_000_000);
        assert_eq!(resolution.distributable, 1_960_000_000);
        assert_eq!(resolution.fee_source(), Some(Side::No));

        let large = resolution
            .settlement
            .payout_for(Side::Yes, 5 * LAMPORTS_PER_SOL)
            .unwrap();
        let small = resolution
            .settlement
            .payout_for(Side::Yes, 3 * LAMPORTS_PER_SOL)
            .unwrap();
        assert_eq!(large.total().unwrap(), 6_225_000_000);
        assert_eq!(small.total().unwrap(), 3_735_000_000);
        assert_eq!(
            large.total().unwrap() + small.total().unwrap() + resolution.fee,
            10 * LAMPORTS_PER_SOL
        );

        assert_eq!(
            resolution.settlement.payout_for(Side::No, 2 * LAMPORTS_PER_SOL),
            Err(BinaryMarketError::NothingToClaim)
        );
    }

    #[test]
    fn test_rounding_leaves_bounded_dust() {
        // Same shape in raw units: fee rounds to 0, shares round down
        let resolution = plan_resolution(Outcome::Yes, 8, 2, 200).unwrap();
        assert_eq!(resolution.fee, 0);
        assert_eq!(resolution.distributable, 2);

        let paid: u64 = [5u64, 3]
            .iter()
            .map(|stake| resolution.settlement.payout_for(Side::Yes, *stake).unwrap().total().unwrap())
            .sum();
        assert_eq!(paid, 6 + 3);
        let dust = 10 - paid - resolution.fee;
        assert!(dust <= 2);
    }

    #[test]
    fn test_empty_winning_pool_refunds_without_fee() {
        let resolution = plan_resolution(Outcome::Yes, 0, 5, 200).unwrap();
        assert_eq!(resolution.settlement, Settlement::Refund);
        assert_eq!(resolution.fee, 0);
        assert_eq!(resolution.fee_source(), None);

        let refund = resolution.settlement.payout_for(Side::No, 5).unwrap();
        assert_eq!(refund, ClaimPayout { side: Side::No, stake: 5, share: 0 });
    }

    #[test]
    fn test_void_outcome_refunds() {
        let resolution = plan_resolution(Outcome::Unset, 10, 20, 9_000).unwrap();
        assert_eq!(resolution.settlement, Settlement::Refund);
        assert_eq!(resolution.fee, 0);
        assert_eq!(resolution.distributable, 0);
    }

    #[test]
    fn test_empty_losing_pool_returns_stakes() {
        let resolution = plan_resolution(Outcome::No, 0, 7, 500).unwrap();
        assert_eq!(resolution.fee, 0);
        let payout = resolution.settlement.payout_for(Side::No, 7).unwrap();
        assert_eq!(payout.total().unwrap(), 7);
    }

    #[test]
    fn test_full_fee_leaves_nothing_to_distribute() {
        let resolution = plan_resolution(Outcome::No, 400, 100, 10_000).unwrap();
        assert_eq!(resolution.fee, 400);
        assert_eq!(resolution.distributable, 0);
        assert_eq!(resolution.fee_source(), Some(Side::Yes));
    }
}
