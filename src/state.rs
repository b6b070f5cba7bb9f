//! State definitions for the Binary Market Program
//!
//! Account structures and the market lifecycle (Open -> Resolved -> Closed).

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::error::BinaryMarketError;
use crate::settlement::{self, ClaimPayout, Resolution, Settlement};

// ============================================================================
// Discriminators
// ============================================================================

pub const MARKET_DISCRIMINATOR: u64 = 0x4D41524B45545F5F; // "MARKET__"
pub const POSITION_DISCRIMINATOR: u64 = 0x504F534954494F4E; // "POSITION"

// ============================================================================
// PDA Seeds
// ============================================================================

pub const VAULT_YES_SEED: &[u8] = b"vault_yes";
pub const VAULT_NO_SEED: &[u8] = b"vault_no";
pub const FEE_VAULT_SEED: &[u8] = b"fee_vault";
pub const POSITION_SEED: &[u8] = b"position";

// ============================================================================
// Constants
// ============================================================================

/// Maximum length of market question (bytes)
pub const MAX_QUESTION_LEN: usize = 160;

/// Fee denominator (1 bps = 0.01%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum fee rate (100%)
pub const MAX_FEE_BPS: u16 = 10_000;

// ============================================================================
// Enums
// ============================================================================

/// Side of a bet
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Seed byte used in the position PDA (YES = 1, NO = 2)
    pub fn index(self) -> u8 {
        match self {
            Side::Yes => 1,
            Side::No => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Side::Yes),
            2 => Some(Side::No),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

/// Market outcome. `Unset` until resolution; resolving with `Unset` voids the market.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unset,
    Yes,
    No,
}

impl Outcome {
    /// Winning side, if any
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::Unset => None,
            Outcome::Yes => Some(Side::Yes),
            Outcome::No => Some(Side::No),
        }
    }
}

impl From<Side> for Outcome {
    fn from(side: Side) -> Self {
        match side {
            Side::Yes => Outcome::Yes,
            Side::No => Outcome::No,
        }
    }
}

/// Market lifecycle status
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    /// Accepting bets until close_time
    Open,
    /// Outcome set, claims available
    Resolved,
    /// All stake claimed, vaults drained (terminal)
    Closed,
}

// ============================================================================
// Account Structures
// ============================================================================

/// A single binary market
///
/// Address: fresh keypair supplied by the creator.
/// Vaults: ["vault_yes" | "vault_no" | "fee_vault", market]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// Account discriminator
    pub discriminator: u64,

    /// Market creator (structural changes, closure refunds, fees)
    pub authority: Pubkey,

    /// Identity allowed to resolve the market
    pub resolver: Pubkey,

    pub status: MarketStatus,

    pub outcome: Outcome,

    /// Fee on the losing pool (basis points)
    pub fee_bps: u16,

    /// Betting deadline (Unix timestamp)
    pub close_time: i64,

    pub created_at: i64,

    /// Resolution timestamp (0 while open)
    pub resolved_at: i64,

    /// Aggregate YES stake
    pub total_yes: u64,

    /// Aggregate NO stake
    pub total_no: u64,

    /// Fee skimmed into the fee vault at resolution
    pub fee_collected: u64,

    /// Fee already paid out to the authority
    pub fees_withdrawn: u64,

    /// Losing pool after fee, earmarked for winners
    pub distributable: u64,

    /// YES stake already claimed
    pub claimed_yes: u64,

    /// NO stake already claimed
    pub claimed_no: u64,

    /// Lamports paid to claimants so far
    pub total_paid: u64,

    /// Rent-exempt reserve held by each vault account
    pub vault_rent: u64,

    pub bump_yes: u8,
    pub bump_no: u8,
    pub bump_fee: u8,

    /// Market question
    pub question: String,
}

impl Market {
    pub const SIZE: usize = 8   // discriminator
        + 32  // authority
        + 32  // resolver
        + 1   // status
        + 1   // outcome
        + 2   // fee_bps
        + 8   // close_time
        + 8   // created_at
        + 8   // resolved_at
        + 8   // total_yes
        + 8   // total_no
        + 8   // fee_collected
        + 8   // fees_withdrawn
        + 8   // distributable
        + 8   // claimed_yes
        + 8   // claimed_no
        + 8   // total_paid
        + 8   // vault_rent
        + 1 + 1 + 1 // bumps
        + 4 + MAX_QUESTION_LEN; // question

    /// Create a new open market after validating its parameters
    pub fn new(
        authority: Pubkey,
        resolver: Pubkey,
        question: String,
        close_time: i64,
        fee_bps: u16,
        current_time: i64,
    ) -> Result<Self, BinaryMarketError> {
        if question.len() > MAX_QUESTION_LEN {
            return Err(BinaryMarketError::QuestionTooLong);
        }
        if fee_bps > MAX_FEE_BPS {
            return Err(BinaryMarketError::InvalidFeeRate);
        }
        if close_time <= current_time {
            return Err(BinaryMarketError::InvalidTiming);
        }

        Ok(Self {
            discriminator: MARKET_DISCRIMINATOR,
            authority,
            resolver,
            status: MarketStatus::Open,
            outcome: Outcome::Unset,
            fee_bps,
            close_time,
            created_at: current_time,
            resolved_at: 0,
            total_yes: 0,
            total_no: 0,
            fee_collected: 0,
            fees_withdrawn: 0,
            distributable: 0,
            claimed_yes: 0,
            claimed_no: 0,
            total_paid: 0,
            vault_rent: 0,
            bump_yes: 0,
            bump_no: 0,
            bump_fee: 0,
            question,
        })
    }

    pub fn total(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.total_yes,
            Side::No => self.total_no,
        }
    }

    pub fn claimed(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.claimed_yes,
            Side::No => self.claimed_no,
        }
    }

    /// Total stake ever deposited
    pub fn pool(&self) -> u64 {
        self.total_yes.saturating_add(self.total_no)
    }

    /// Resolved with `Outcome::Unset`
    pub fn is_void(&self) -> bool {
        self.status != MarketStatus::Open && self.outcome == Outcome::Unset
    }

    /// Bets are accepted only while Open and strictly before close_time
    pub fn ensure_accepting_bets(&self, current_time: i64) -> Result<(), BinaryMarketError> {
        if self.status != MarketStatus::Open || current_time >= self.close_time {
            return Err(BinaryMarketError::InvalidTiming);
        }
        Ok(())
    }

    /// Add a bet to the side total
    pub fn record_bet(
        &mut self,
        side: Side,
        amount: u64,
        current_time: i64,
    ) -> Result<(), BinaryMarketError> {
        self.ensure_accepting_bets(current_time)?;
        if amount == 0 {
            return Err(BinaryMarketError::ZeroAmount);
        }

        let total = match side {
            Side::Yes => &mut self.total_yes,
            Side::No => &mut self.total_no,
        };
        *total = total
            .checked_add(amount)
            .ok_or(BinaryMarketError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Open -> Resolved. Returns the fee to move from the losing vault.
    pub fn resolve(
        &mut self,
        caller: &Pubkey,
        outcome: Outcome,
        current_time: i64,
    ) -> Result<Resolution, BinaryMarketError> {
        if self.status != MarketStatus::Open {
            return Err(BinaryMarketError::AlreadyResolved);
        }
        if *caller != self.resolver {
            return Err(BinaryMarketError::Unauthorized);
        }
        if current_time < self.close_time {
            return Err(BinaryMarketError::InvalidTiming);
        }

        let resolution =
            settlement::plan_resolution(outcome, self.total_yes, self.total_no, self.fee_bps)?;

        self.status = MarketStatus::Resolved;
        self.outcome = outcome;
        self.resolved_at = current_time;
        self.fee_collected = resolution.fee;
        self.distributable = resolution.distributable;
        Ok(resolution)
    }

    /// How claims are paid, once the market has left Open
    pub fn settlement(&self) -> Option<Settlement> {
        if self.status == MarketStatus::Open {
            return None;
        }
        Some(settlement::settlement_for(
            self.outcome,
            self.total_yes,
            self.total_no,
            self.distributable,
        ))
    }

    /// Settle one position. Both records are updated only on success.
    pub fn claim(
        &mut self,
        position: &mut Position,
        current_time: i64,
    ) -> Result<ClaimPayout, BinaryMarketError> {
        let settlement = match self.status {
            MarketStatus::Open => return Err(BinaryMarketError::NotResolved),
            MarketStatus::Closed => return Err(BinaryMarketError::MarketClosed),
            MarketStatus::Resolved => settlement::settlement_for(
                self.outcome,
                self.total_yes,
                self.total_no,
                self.distributable,
            ),
        };
        if position.claimed {
            return Err(BinaryMarketError::AlreadyClaimed);
        }

        let payout = settlement.payout_for(position.side, position.amount)?;
        let paid = payout.total()?;
        let claimed = self
            .claimed(position.side)
            .checked_add(position.amount)
            .ok_or(BinaryMarketError::ArithmeticOverflow)?;
        let total_paid = self
            .total_paid
            .checked_add(paid)
            .ok_or(BinaryMarketError::ArithmeticOverflow)?;

        match position.side {
            Side::Yes => self.claimed_yes = claimed,
            Side::No => self.claimed_no = claimed,
        }
        self.total_paid = total_paid;
        position.claimed = true;
        position.payout = paid;
        position.updated_at = current_time;
        Ok(payout)
    }

    /// Stake still owed to positions that can claim
    pub fn unclaimed_stake(&self) -> u64 {
        let outstanding = |side: Side| self.total(side).saturating_sub(self.claimed(side));
        match self.settlement() {
            None => self.pool(),
            Some(Settlement::Refund) => outstanding(Side::Yes).saturating_add(outstanding(Side::No)),
            Some(Settlement::Payout { winner, .. }) => outstanding(winner),
        }
    }

    pub fn withdrawable_fees(&self) -> u64 {
        self.fee_collected.saturating_sub(self.fees_withdrawn)
    }

    /// Pay part of the collected fee to the authority
    pub fn withdraw_fees(&mut self, caller: &Pubkey, amount: u64) -> Result<(), BinaryMarketError> {
        if *caller != self.authority {
            return Err(BinaryMarketError::Unauthorized);
        }
        match self.status {
            MarketStatus::Open => return Err(BinaryMarketError::NotResolved),
            MarketStatus::Closed => return Err(BinaryMarketError::MarketClosed),
            MarketStatus::Resolved => {}
        }
        if amount == 0 {
            return Err(BinaryMarketError::ZeroAmount);
        }
        if amount > self.withdrawable_fees() {
            return Err(BinaryMarketError::InsufficientFunds);
        }

        self.fees_withdrawn += amount;
        Ok(())
    }

    /// Resolved -> Closed, once nothing is left to claim
    pub fn close(&mut self, caller: &Pubkey) -> Result<(), BinaryMarketError> {
        if *caller != self.authority {
            return Err(BinaryMarketError::Unauthorized);
        }
        match self.status {
            MarketStatus::Open => return Err(BinaryMarketError::NotResolved),
            MarketStatus::Closed => return Err(BinaryMarketError::MarketClosed),
            MarketStatus::Resolved => {}
        }
        if self.unclaimed_stake() > 0 {
            return Err(BinaryMarketError::AccountNotEmpty);
        }

        self.status = MarketStatus::Closed;
        self.fees_withdrawn = self.fee_collected;
        Ok(())
    }
}

/// A user's stake on one side of one market
///
/// PDA Seeds: ["position", market, owner, [side.index()]]
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Account discriminator
    pub discriminator: u64,

    pub market: Pubkey,

    pub owner: Pubkey,

    pub side: Side,

    /// Accumulated stake (lamports)
    pub amount: u64,

    /// Has this position been settled?
    pub claimed: bool,

    /// Lamports received on claim
    pub payout: u64,

    pub created_at: i64,

    pub updated_at: i64,

    /// PDA bump
    pub bump: u8,
}

impl Position {
    pub const SIZE: usize = 8   // discriminator
        + 32  // market
        + 32  // owner
        + 1   // side
        + 8   // amount
        + 1   // claimed
        + 8   // payout
        + 8   // created_at
        + 8   // updated_at
        + 1;  // bump

    /// Create a new empty position
    pub fn new(market: Pubkey, owner: Pubkey, side: Side, bump: u8, created_at: i64) -> Self {
        Self {
            discriminator: POSITION_DISCRIMINATOR,
            market,
            owner,
            side,
            amount: 0,
            claimed: false,
            payout: 0,
            created_at,
            updated_at: created_at,
            bump,
        }
    }

    pub fn matches(&self, market: &Pubkey, owner: &Pubkey, side: Side) -> bool {
        self.market == *market && self.owner == *owner && self.side == side
    }

    /// Accumulate another bet on the same side
    pub fn add_stake(&mut self, amount: u64, current_time: i64) -> Result<(), BinaryMarketError> {
        if amount == 0 {
            return Err(BinaryMarketError::ZeroAmount);
        }
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(BinaryMarketError::ArithmeticOverflow)?;
        self.updated_at = current_time;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const CLOSE: i64 = NOW + 3600;

    fn open_market(resolver: Pubkey, fee_bps: u16) -> Market {
        Market::new(
            Pubkey::new_unique(),
            resolver,
            "Will BTC close above $70k this month?".to_string(),
            CLOSE,
            fee_bps,
            NOW,
        )
        .unwrap()
    }

    #[test]
    fn test_market_size_fits_max_question() {
        let mut market = open_market(Pubkey::new_unique(), 200);
        market.question = "q".repeat(MAX_QUESTION_LEN);
        let data = market.try_to_vec().unwrap();
        assert_eq!(data.len(), Market::SIZE);
    }

    #[test]
    fn test_position_size() {
        let position = Position::new(Pubkey::new_unique(), Pubkey::new_unique(), Side::No, 254, NOW);
        assert_eq!(position.try_to_vec().unwrap().len(), Position::SIZE);
    }

    #[test]
    fn test_side_index_roundtrip() {
        assert_eq!(Side::from_index(Side::Yes.index()), Some(Side::Yes));
        assert_eq!(Side::from_index(Side::No.index()), Some(Side::No));
        assert_eq!(Side::from_index(0), None);
        assert_eq!(Side::Yes.opposite(), Side::No);
    }

    #[test]
    fn test_new_market_validation() {
        let authority = Pubkey::new_unique();
        let long = "x".repeat(MAX_QUESTION_LEN + 1);
        assert_eq!(
            Market::new(authority, authority, long, CLOSE, 0, NOW),
            Err(BinaryMarketError::QuestionTooLong)
        );
        assert_eq!(
            Market::new(authority, authority, "q".into(), CLOSE, 10_001, NOW),
            Err(BinaryMarketError::InvalidFeeRate)
        );
        assert_eq!(
            Market::new(authority, authority, "q".into(), NOW, 0, NOW),
            Err(BinaryMarketError::InvalidTiming)
        );
        let market = Market::new(authority, authority, "q".into(), CLOSE, 10_000, NOW).unwrap();
        assert_eq!(market.status, MarketStatus::Open);
        assert_eq!(market.outcome, Outcome::Unset);
        assert_eq!(market.pool(), 0);
    }

    #[test]
    fn test_record_bet_timing_and_amount() {
        let mut market = open_market(Pubkey::new_unique(), 0);
        assert_eq!(market.record_bet(Side::Yes, 0, NOW), Err(BinaryMarketError::ZeroAmount));
        market.record_bet(Side::Yes, 5, NOW).unwrap();
        market.record_bet(Side::No, 2, NOW).unwrap();
        assert_eq!(market.total(Side::Yes), 5);
        assert_eq!(market.total(Side::No), 2);

        // close_time itself is too late
        assert_eq!(
            market.record_bet(Side::Yes, 1, CLOSE),
            Err(BinaryMarketError::InvalidTiming)
        );
        market.total_yes = u64::MAX;
        assert_eq!(
            market.record_bet(Side::Yes, 1, NOW),
            Err(BinaryMarketError::ArithmeticOverflow)
        );
        assert_eq!(market.total_yes, u64::MAX);
    }

    #[test]
    fn test_resolve_preconditions() {
        let resolver = Pubkey::new_unique();
        let mut market = open_market(resolver, 200);

        assert_eq!(
            market.resolve(&Pubkey::new_unique(), Outcome::Yes, CLOSE),
            Err(BinaryMarketError::Unauthorized)
        );
        assert_eq!(
            market.resolve(&resolver, Outcome::Yes, CLOSE - 1),
            Err(BinaryMarketError::InvalidTiming)
        );
        assert_eq!(market.status, MarketStatus::Open);

        market.resolve(&resolver, Outcome::Yes, CLOSE).unwrap();
        assert_eq!(market.status, MarketStatus::Resolved);
        assert_eq!(market.resolved_at, CLOSE);
        assert_eq!(
            market.resolve(&resolver, Outcome::No, CLOSE + 1),
            Err(BinaryMarketError::AlreadyResolved)
        );
        assert_eq!(market.outcome, Outcome::Yes);
    }

    #[test]
    fn test_bets_rejected_after_resolution_even_before_close_time() {
        let resolver = Pubkey::new_unique();
        let mut market = open_market(resolver, 0);
        market.resolve(&resolver, Outcome::No, CLOSE).unwrap();
        assert_eq!(
            market.record_bet(Side::Yes, 1, NOW),
            Err(BinaryMarketError::InvalidTiming)
        );
    }

    #[test]
    fn test_claim_flow_and_close() {
        let resolver = Pubkey::new_unique();
        let mut market = open_market(resolver, 200);
        let key = Pubkey::new_unique();
        let mut winner = Position::new(key, Pubkey::new_unique(), Side::Yes, 255, NOW);
        let mut loser = Position::new(key, Pubkey::new_unique(), Side::No, 255, NOW);

        market.record_bet(Side::Yes, 8_000, NOW).unwrap();
        winner.add_stake(8_000, NOW).unwrap();
        market.record_bet(Side::No, 2_000, NOW).unwrap();
        loser.add_stake(2_000, NOW).unwrap();

        assert_eq!(market.claim(&mut winner, NOW), Err(BinaryMarketError::NotResolved));

        let resolution = market.resolve(&resolver, Outcome::Yes, CLOSE).unwrap();
        assert_eq!(resolution.fee, 40);
        assert_eq!(market.unclaimed_stake(), 8_000);

        let authority = market.authority;
        assert_eq!(market.close(&authority), Err(BinaryMarketError::AccountNotEmpty));
        assert_eq!(market.claim(&mut loser, CLOSE), Err(BinaryMarketError::NothingToClaim));
        assert!(!loser.claimed);

        let payout = market.claim(&mut winner, CLOSE).unwrap();
        assert_eq!(payout.stake, 8_000);
        assert_eq!(payout.share, 1_960);
        assert_eq!(winner.payout, 9_960);
        assert!(winner.claimed);
        assert_eq!(market.claim(&mut winner, CLOSE), Err(BinaryMarketError::AlreadyClaimed));

        assert_eq!(market.unclaimed_stake(), 0);
        assert_eq!(market.close(&Pubkey::new_unique()), Err(BinaryMarketError::Unauthorized));
        market.close(&authority).unwrap();
        assert_eq!(market.status, MarketStatus::Closed);
        assert_eq!(market.close(&authority), Err(BinaryMarketError::MarketClosed));
        assert_eq!(
            market.resolve(&resolver, Outcome::No, CLOSE),
            Err(BinaryMarketError::AlreadyResolved)
        );
    }

    #[test]
    fn test_void_market_refunds_both_sides() {
        let resolver = Pubkey::new_unique();
        let mut market = open_market(resolver, 500);
        let key = Pubkey::new_unique();
        let mut yes = Position::new(key, Pubkey::new_unique(), Side::Yes, 255, NOW);
        let mut no = Position::new(key, Pubkey::new_unique(), Side::No, 255, NOW);
        market.record_bet(Side::Yes, 300, NOW).unwrap();
        yes.add_stake(300, NOW).unwrap();
        market.record_bet(Side::No, 700, NOW).unwrap();
        no.add_stake(700, NOW).unwrap();

        let resolution = market.resolve(&resolver, Outcome::Unset, CLOSE).unwrap();
        assert_eq!(resolution.fee, 0);
        assert!(market.is_void());
        assert_eq!(market.settlement(), Some(Settlement::Refund));

        assert_eq!(market.claim(&mut yes, CLOSE).unwrap().total().unwrap(), 300);
        assert_eq!(market.unclaimed_stake(), 700);
        assert_eq!(market.claim(&mut no, CLOSE).unwrap().total().unwrap(), 700);
        assert_eq!(market.unclaimed_stake(), 0);
    }

    #[test]
    fn test_withdraw_fees() {
        let resolver = Pubkey::new_unique();
        let mut market = open_market(resolver, 1_000);
        let authority = market.authority;
        market.record_bet(Side::Yes, 1_000, NOW).unwrap();
        market.record_bet(Side::No, 1_000, NOW).unwrap();

        assert_eq!(market.withdraw_fees(&authority, 1), Err(BinaryMarketError::NotResolved));
        market.resolve(&resolver, Outcome::Yes, CLOSE).unwrap();
        assert_eq!(market.withdrawable_fees(), 100);

        assert_eq!(market.withdraw_fees(&resolver, 10), Err(BinaryMarketError::Unauthorized));
        assert_eq!(market.withdraw_fees(&authority, 0), Err(BinaryMarketError::ZeroAmount));
        assert_eq!(
            market.withdraw_fees(&authority, 101),
            Err(BinaryMarketError::InsufficientFunds)
        );
        market.withdraw_fees(&authority, 60).unwrap();
        assert_eq!(market.withdrawable_fees(), 40);
    }

    #[test]
    fn test_position_add_stake() {
        let mut position = Position::new(Pubkey::new_unique(), Pubkey::new_unique(), Side::Yes, 255, NOW);
        position.add_stake(5, NOW).unwrap();
        position.add_stake(3, NOW + 1).unwrap();
        assert_eq!(position.amount, 8);
        assert_eq!(position.updated_at, NOW + 1);
        assert_eq!(position.add_stake(0, NOW), Err(BinaryMarketError::ZeroAmount));
        position.amount = u64::MAX;
        assert_eq!(position.add_stake(1, NOW), Err(BinaryMarketError::ArithmeticOverflow));
    }
}
