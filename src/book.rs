//! Off-chain market book
//!
//! Replays the program's transitions against an in-memory arena: each market
//! record owns its vault balances and an index-addressed list of positions.
//! Every operation stages its writes on copies and commits them only when all
//! checks pass, so a failed call leaves the book untouched.
//!
//! ```
//! use binary_market_program::book::MarketBook;
//! use binary_market_program::state::{Outcome, Side};
//! use solana_program::pubkey::Pubkey;
//!
//! let (authority, alice, bob) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
//! let mut book = MarketBook::new();
//! let id = book
//!     .initialize_market(authority, "Rain tomorrow?".into(), 100, 0, authority, 0)
//!     .unwrap();
//!
//! book.place_bet(id, alice, Side::Yes, 30, 10).unwrap();
//! book.place_bet(id, bob, Side::No, 10, 10).unwrap();
//! book.resolve_market(id, authority, Outcome::Yes, 100).unwrap();
//!
//! assert_eq!(book.claim(id, alice, Side::Yes, 100).unwrap(), 40);
//! ```

use std::collections::HashMap;

use solana_program::pubkey::Pubkey;

use crate::error::BinaryMarketError;
use crate::pda::find_position_address;
use crate::settlement::{Resolution, Settlement};
use crate::state::{Market, MarketStatus, Outcome, Position, Side};
use crate::vault::{VaultBalances, VaultKind};

/// Index of a market in the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarketId(usize);

/// Index of a position within its market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionId(usize);

#[derive(Debug, Clone)]
struct MarketEntry {
    key: Pubkey,
    market: Market,
    vaults: VaultBalances,
    positions: Vec<Position>,
    lookup: HashMap<(Pubkey, Side), PositionId>,
}

/// Arena of markets
#[derive(Debug, Clone, Default)]
pub struct MarketBook {
    markets: Vec<MarketEntry>,
}

impl MarketBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: MarketId) -> Result<&MarketEntry, BinaryMarketError> {
        self.markets
            .get(id.0)
            .ok_or(BinaryMarketError::InvalidAccountData)
    }

    fn entry_mut(&mut self, id: MarketId) -> Result<&mut MarketEntry, BinaryMarketError> {
        self.markets
            .get_mut(id.0)
            .ok_or(BinaryMarketError::InvalidAccountData)
    }

    pub fn market(&self, id: MarketId) -> Option<&Market> {
        self.markets.get(id.0).map(|entry| &entry.market)
    }

    pub fn vaults(&self, id: MarketId) -> Option<VaultBalances> {
        self.markets.get(id.0).map(|entry| entry.vaults)
    }

    pub fn positions(&self, id: MarketId) -> &[Position] {
        self.markets
            .get(id.0)
            .map(|entry| entry.positions.as_slice())
            .unwrap_or(&[])
    }

    pub fn position(&self, id: MarketId, owner: &Pubkey, side: Side) -> Option<&Position> {
        let entry = self.markets.get(id.0)?;
        let index = entry.lookup.get(&(*owner, side))?;
        entry.positions.get(index.0)
    }

    /// Create a market with empty vaults
    pub fn initialize_market(
        &mut self,
        authority: Pubkey,
        question: String,
        close_time: i64,
        fee_bps: u16,
        resolver: Pubkey,
        current_time: i64,
    ) -> Result<MarketId, BinaryMarketError> {
        let market = Market::new(authority, resolver, question, close_time, fee_bps, current_time)?;
        let id = MarketId(self.markets.len());
        self.markets.push(MarketEntry {
            key: Pubkey::new_unique(),
            market,
            vaults: VaultBalances::default(),
            positions: Vec::new(),
            lookup: HashMap::new(),
        });
        Ok(id)
    }

    /// Stake on one side; repeated bets accumulate into the same position
    pub fn place_bet(
        &mut self,
        id: MarketId,
        owner: Pubkey,
        side: Side,
        amount: u64,
        current_time: i64,
    ) -> Result<PositionId, BinaryMarketError> {
        let entry = self.entry_mut(id)?;

        let mut market = entry.market.clone();
        market.record_bet(side, amount, current_time)?;

        let existing = entry.lookup.get(&(owner, side)).copied();
        let mut position = match existing {
            Some(index) => entry.positions[index.0].clone(),
            None => {
                let (_, bump) = find_position_address(&crate::id(), &entry.key, &owner, side);
                Position::new(entry.key, owner, side, bump, current_time)
            }
        };
        position.add_stake(amount, current_time)?;

        let mut vaults = entry.vaults;
        vaults.deposit(side.into(), amount)?;

        entry.market = market;
        entry.vaults = vaults;
        let index = match existing {
            Some(index) => {
                entry.positions[index.0] = position;
                index
            }
            None => {
                let index = PositionId(entry.positions.len());
                entry.positions.push(position);
                entry.lookup.insert((owner, side), index);
                index
            }
        };
        Ok(index)
    }

    /// Set the outcome and skim the fee into the fee vault
    pub fn resolve_market(
        &mut self,
        id: MarketId,
        caller: Pubkey,
        outcome: Outcome,
        current_time: i64,
    ) -> Result<Resolution, BinaryMarketError> {
        let entry = self.entry_mut(id)?;

        let mut market = entry.market.clone();
        let resolution = market.resolve(&caller, outcome, current_time)?;

        let mut vaults = entry.vaults;
        if let Some(source) = resolution.fee_source() {
            vaults.transfer(source.into(), VaultKind::Fee, resolution.fee)?;
        }

        entry.market = market;
        entry.vaults = vaults;
        Ok(resolution)
    }

    /// Settle a position. Returns the lamports paid to its owner.
    pub fn claim(
        &mut self,
        id: MarketId,
        owner: Pubkey,
        side: Side,
        current_time: i64,
    ) -> Result<u64, BinaryMarketError> {
        let entry = self.entry_mut(id)?;
        let index = *entry
            .lookup
            .get(&(owner, side))
            .ok_or(BinaryMarketError::NothingToClaim)?;

        let mut market = entry.market.clone();
        let mut position = entry.positions[index.0].clone();
        let payout = market.claim(&mut position, current_time)?;

        let mut vaults = entry.vaults;
        vaults.withdraw(payout.side.into(), payout.stake)?;
        vaults.withdraw(payout.side.opposite().into(), payout.share)?;

        entry.market = market;
        entry.vaults = vaults;
        entry.positions[index.0] = position;
        payout.total()
    }

    /// Pay collected fees to the authority
    pub fn withdraw_fees(
        &mut self,
        id: MarketId,
        caller: Pubkey,
        amount: u64,
    ) -> Result<(), BinaryMarketError> {
        let entry = self.entry_mut(id)?;

        let mut market = entry.market.clone();
        market.withdraw_fees(&caller, amount)?;

        let mut vaults = entry.vaults;
        vaults.withdraw(VaultKind::Fee, amount)?;

        entry.market = market;
        entry.vaults = vaults;
        Ok(())
    }

    /// Close the market. Returns what was left in the vaults (fees and dust).
    pub fn close_market(&mut self, id: MarketId, caller: Pubkey) -> Result<u64, BinaryMarketError> {
        let entry = self.entry_mut(id)?;

        let mut market = entry.market.clone();
        market.close(&caller)?;

        entry.market = market;
        Ok(entry.vaults.drain())
    }

    /// Check that vault balances reconcile with the market ledger
    pub fn check_invariants(&self, id: MarketId) -> Result<(), BinaryMarketError> {
        let entry = self.entry(id)?;
        let market = &entry.market;
        let vaults = &entry.vaults;

        let position_sum = |side: Side| -> u64 {
            entry
                .positions
                .iter()
                .filter(|position| position.side == side)
                .map(|position| position.amount)
                .sum()
        };
        for side in [Side::Yes, Side::No] {
            if position_sum(side) != market.total(side) {
                return Err(BinaryMarketError::VaultMismatch);
            }
        }

        match market.settlement() {
            None => {
                if vaults.yes != market.total_yes || vaults.no != market.total_no || vaults.fee != 0 {
                    return Err(BinaryMarketError::VaultMismatch);
                }
            }
            Some(settlement) => {
                if market.status == MarketStatus::Closed {
                    return if vaults.total() == 0 {
                        Ok(())
                    } else {
                        Err(BinaryMarketError::VaultMismatch)
                    };
                }
                if vaults.fee != market.withdrawable_fees() {
                    return Err(BinaryMarketError::VaultMismatch);
                }
                // Whatever left the stake vaults was paid to claimants or skimmed as fee
                let stake_left = vaults.yes.saturating_add(vaults.no);
                let accounted = stake_left
                    .checked_add(market.total_paid)
                    .and_then(|sum| sum.checked_add(market.fee_collected))
                    .ok_or(BinaryMarketError::ArithmeticOverflow)?;
                if accounted != market.pool() {
                    return Err(BinaryMarketError::VaultMismatch);
                }
                let owed_stake = market.unclaimed_stake();
                let covered = match settlement {
                    Settlement::Refund => [Side::Yes, Side::No].iter().all(|side| {
                        vaults.balance((*side).into())
                            >= market.total(*side).saturating_sub(market.claimed(*side))
                    }),
                    Settlement::Payout { winner, .. } => {
                        vaults.balance(winner.into()) >= owed_stake
                    }
                };
                if !covered {
                    return Err(BinaryMarketError::VaultMismatch);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const CLOSE: i64 = NOW + 600;
    const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    fn setup(fee_bps: u16) -> (MarketBook, MarketId, Pubkey) {
        let mut book = MarketBook::new();
        let authority = Pubkey::new_unique();
        let id = book
            .initialize_market(authority, "Will it rain?".into(), CLOSE, fee_bps, authority, NOW)
            .unwrap();
        (book, id, authority)
    }

    #[test]
    fn test_bets_accumulate_per_owner_and_side() {
        let (mut book, id, _) = setup(0);
        let alice = Pubkey::new_unique();

        let first = book.place_bet(id, alice, Side::Yes, 5, NOW).unwrap();
        let again = book.place_bet(id, alice, Side::Yes, 3, NOW + 1).unwrap();
        let hedge = book.place_bet(id, alice, Side::No, 2, NOW + 2).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, hedge);
        assert_eq!(book.positions(id).len(), 2);
        assert_eq!(book.position(id, &alice, Side::Yes).unwrap().amount, 8);
        assert_eq!(book.position(id, &alice, Side::No).unwrap().amount, 2);
        assert_eq!(book.vaults(id).unwrap(), VaultBalances { yes: 8, no: 2, fee: 0 });
        book.check_invariants(id).unwrap();
    }

    #[test]
    fn test_failed_bet_leaves_book_untouched() {
        let (mut book, id, _) = setup(0);
        let alice = Pubkey::new_unique();
        book.place_bet(id, alice, Side::Yes, 5, NOW).unwrap();

        assert_eq!(
            book.place_bet(id, alice, Side::Yes, 0, NOW),
            Err(BinaryMarketError::ZeroAmount)
        );
        assert_eq!(
            book.place_bet(id, alice, Side::Yes, u64::MAX, NOW),
            Err(BinaryMarketError::ArithmeticOverflow)
        );
        assert_eq!(
            book.place_bet(id, Pubkey::new_unique(), Side::No, 1, CLOSE),
            Err(BinaryMarketError::InvalidTiming)
        );

        assert_eq!(book.market(id).unwrap().total_yes, 5);
        assert_eq!(book.positions(id).len(), 1);
        assert_eq!(book.vaults(id).unwrap().yes, 5);
        book.check_invariants(id).unwrap();
    }

    #[test]
    fn test_two_percent_fee_scenario_conserves_pool() {
        let (mut book, id, authority) = setup(200);
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        book.place_bet(id, a, Side::Yes, 5 * LAMPORTS_PER_SOL, NOW).unwrap();
        book.place_bet(id, b, Side::Yes, 3 * LAMPORTS_PER_SOL, NOW).unwrap();
        book.place_bet(id, c, Side::No, 2 * LAMPORTS_PER_SOL, NOW).unwrap();
        book.check_invariants(id).unwrap();

        let resolution = book.resolve_market(id, authority, Outcome::Yes, CLOSE).unwrap();
        assert_eq!(resolution.fee, 40_000_000);
        assert_eq!(book.vaults(id).unwrap().fee, 40_000_000);
        book.check_invariants(id).unwrap();

        assert_eq!(
            book.close_market(id, authority),
            Err(BinaryMarketError::AccountNotEmpty)
        );

        let paid_a = book.claim(id, a, Side::Yes, CLOSE).unwrap();
        let paid_b = book.claim(id, b, Side::Yes, CLOSE).unwrap();
        assert_eq!(paid_a, 6_225_000_000);
        assert_eq!(paid_b, 3_735_000_000);
        assert_eq!(
            book.claim(id, c, Side::No, CLOSE),
            Err(BinaryMarketError::NothingToClaim)
        );
        assert_eq!(paid_a + paid_b + resolution.fee, 10 * LAMPORTS_PER_SOL);
        book.check_invariants(id).unwrap();

        let residual = book.close_market(id, authority).unwrap();
        assert_eq!(residual, 40_000_000);
        assert_eq!(book.market(id).unwrap().status, MarketStatus::Closed);
        book.check_invariants(id).unwrap();
    }

    #[test]
    fn test_rounding_dust_is_bounded_and_returned_on_close() {
        let (mut book, id, authority) = setup(200);
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        book.place_bet(id, a, Side::Yes, 5, NOW).unwrap();
        book.place_bet(id, b, Side::Yes, 3, NOW).unwrap();
        book.place_bet(id, c, Side::No, 2, NOW).unwrap();
        book.resolve_market(id, authority, Outcome::Yes, CLOSE).unwrap();

        let paid = book.claim(id, a, Side::Yes, CLOSE).unwrap() + book.claim(id, b, Side::Yes, CLOSE).unwrap();
        let fee = book.market(id).unwrap().fee_collected;
        let dust = 10 - paid - fee;
        assert!(dust <= 2);
        book.check_invariants(id).unwrap();

        assert_eq!(book.close_market(id, authority).unwrap(), dust + fee);
    }

    #[test]
    fn test_empty_winning_pool_refunds_losers_in_full() {
        let (mut book, id, authority) = setup(200);
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        book.place_bet(id, a, Side::No, 3, NOW).unwrap();
        book.place_bet(id, b, Side::No, 2, NOW).unwrap();

        let resolution = book.resolve_market(id, authority, Outcome::Yes, CLOSE).unwrap();
        assert_eq!(resolution.settlement, Settlement::Refund);
        assert_eq!(resolution.fee, 0);

        let refunded = book.claim(id, a, Side::No, CLOSE).unwrap() + book.claim(id, b, Side::No, CLOSE).unwrap();
        assert_eq!(refunded, 5);
        book.check_invariants(id).unwrap();
        assert_eq!(book.close_market(id, authority).unwrap(), 0);
    }

    #[test]
    fn test_void_market_refunds_everyone() {
        let (mut book, id, authority) = setup(1_000);
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        book.place_bet(id, a, Side::Yes, 7, NOW).unwrap();
        book.place_bet(id, b, Side::No, 9, NOW).unwrap();

        book.resolve_market(id, authority, Outcome::Unset, CLOSE).unwrap();
        assert!(book.market(id).unwrap().is_void());
        assert_eq!(
            book.close_market(id, authority),
            Err(BinaryMarketError::AccountNotEmpty)
        );

        assert_eq!(book.claim(id, a, Side::Yes, CLOSE).unwrap(), 7);
        assert_eq!(book.claim(id, b, Side::No, CLOSE).unwrap(), 9);
        assert_eq!(book.vaults(id).unwrap().total(), 0);
        book.check_invariants(id).unwrap();
        book.close_market(id, authority).unwrap();
    }

    #[test]
    fn test_resolve_is_single_shot() {
        let (mut book, id, authority) = setup(0);
        book.place_bet(id, Pubkey::new_unique(), Side::Yes, 1, NOW).unwrap();
        book.resolve_market(id, authority, Outcome::No, CLOSE).unwrap();
        assert_eq!(
            book.resolve_market(id, authority, Outcome::Yes, CLOSE + 1),
            Err(BinaryMarketError::AlreadyResolved)
        );
        assert_eq!(book.market(id).unwrap().outcome, Outcome::No);
    }

    #[test]
    fn test_withdraw_fees_before_close() {
        let (mut book, id, authority) = setup(5_000);
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        book.place_bet(id, a, Side::Yes, 100, NOW).unwrap();
        book.place_bet(id, b, Side::No, 100, NOW).unwrap();
        book.resolve_market(id, authority, Outcome::No, CLOSE).unwrap();
        assert_eq!(book.vaults(id).unwrap().fee, 50);

        book.withdraw_fees(id, authority, 30).unwrap();
        assert_eq!(
            book.withdraw_fees(id, authority, 21),
            Err(BinaryMarketError::InsufficientFunds)
        );
        book.check_invariants(id).unwrap();

        assert_eq!(book.claim(id, b, Side::No, CLOSE).unwrap(), 150);
        assert_eq!(book.close_market(id, authority).unwrap(), 20);
    }

    #[test]
    fn test_many_bettors_conservation() {
        let (mut book, id, authority) = setup(250);
        let bettors: Vec<(Pubkey, Side, u64)> = (0..40u64)
            .map(|i| {
                let side = if i % 3 == 0 { Side::No } else { Side::Yes };
                (Pubkey::new_unique(), side, 1_000 + i * 37)
            })
            .collect();
        for (owner, side, amount) in &bettors {
            book.place_bet(id, *owner, *side, *amount, NOW).unwrap();
            book.check_invariants(id).unwrap();
        }
        let pool = book.market(id).unwrap().pool();

        let resolution = book.resolve_market(id, authority, Outcome::Yes, CLOSE).unwrap();
        let mut paid = 0u64;
        let mut winners = 0u64;
        for (owner, side, _) in &bettors {
            match book.claim(id, *owner, *side, CLOSE) {
                Ok(amount) => {
                    paid += amount;
                    winners += 1;
                }
                Err(err) => assert_eq!(err, BinaryMarketError::NothingToClaim),
            }
            book.check_invariants(id).unwrap();
        }

        let dust = pool - paid - resolution.fee;
        assert!(dust <= winners);
        assert_eq!(book.close_market(id, authority).unwrap(), dust + resolution.fee);
    }

    #[test]
    fn test_unknown_market_or_position() {
        let (mut book, id, _) = setup(0);
        assert_eq!(
            book.claim(id, Pubkey::new_unique(), Side::Yes, CLOSE),
            Err(BinaryMarketError::NothingToClaim)
        );
        assert!(book.market(MarketId(7)).is_none());
        assert_eq!(
            book.place_bet(MarketId(7), Pubkey::new_unique(), Side::Yes, 1, NOW),
            Err(BinaryMarketError::InvalidAccountData)
        );
    }
}
