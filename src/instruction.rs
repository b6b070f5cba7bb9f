//! Instruction definitions for the Binary Market Program

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::pda::{find_position_address, find_vault_address};
use crate::state::{Outcome, Side};
use crate::vault::VaultKind;

/// All instructions supported by the Binary Market Program
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum BinaryMarketInstruction {
    /// Create a market with its YES, NO and fee vaults
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Authority (payer)
    /// 1. `[signer, writable]` Market (fresh keypair)
    /// 2. `[writable]` YES Vault PDA
    /// 3. `[writable]` NO Vault PDA
    /// 4. `[writable]` Fee Vault PDA
    /// 5. `[]` System Program
    InitializeMarket(InitializeMarketArgs),

    /// Stake lamports on one side
    ///
    /// Accounts:
    /// 0. `[signer, writable]` User
    /// 1. `[writable]` Market
    /// 2. `[writable]` YES Vault PDA
    /// 3. `[writable]` NO Vault PDA
    /// 4. `[writable]` Position PDA
    /// 5. `[]` System Program
    PlaceBet(PlaceBetArgs),

    /// Set the outcome (Resolver only) and skim the fee
    ///
    /// Accounts:
    /// 0. `[signer]` Resolver
    /// 1. `[writable]` Market
    /// 2. `[writable]` YES Vault PDA
    /// 3. `[writable]` NO Vault PDA
    /// 4. `[writable]` Fee Vault PDA
    ResolveMarket(ResolveMarketArgs),

    /// Collect winnings or a refund for one position
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Owner
    /// 1. `[writable]` Market
    /// 2. `[writable]` YES Vault PDA
    /// 3. `[writable]` NO Vault PDA
    /// 4. `[writable]` Position PDA
    Claim,

    /// Pay collected fees to the authority
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Authority
    /// 1. `[writable]` Market
    /// 2. `[writable]` Fee Vault PDA
    WithdrawFees(WithdrawFeesArgs),

    /// Close a fully claimed market and return every vault lamport to the authority
    ///
    /// Accounts:
    /// 0. `[signer, writable]` Authority
    /// 1. `[writable]` Market
    /// 2. `[writable]` YES Vault PDA
    /// 3. `[writable]` NO Vault PDA
    /// 4. `[writable]` Fee Vault PDA
    CloseMarket,
}

// ============================================================================
// Instruction Arguments
// ============================================================================

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct InitializeMarketArgs {
    /// Market question (max 160 bytes)
    pub question: String,
    /// Betting deadline (Unix timestamp, must be in the future)
    pub close_time: i64,
    /// Fee on the losing pool (0-10000 bps)
    pub fee_bps: u16,
    /// Identity allowed to resolve
    pub resolver: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlaceBetArgs {
    pub side: Side,
    /// Position seed byte; must equal `side.index()`
    pub side_index: u8,
    /// Lamports to stake
    pub amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolveMarketArgs {
    /// `Unset` voids the market and refunds every stake
    pub outcome: Outcome,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct WithdrawFeesArgs {
    pub amount: u64,
}

// ============================================================================
// Instruction Builders
// ============================================================================

fn vault_metas(program_id: &Pubkey, market: &Pubkey, kinds: &[VaultKind]) -> Vec<AccountMeta> {
    kinds
        .iter()
        .map(|kind| AccountMeta::new(find_vault_address(program_id, market, *kind).0, false))
        .collect()
}

/// Build `InitializeMarket`
pub fn initialize_market(
    program_id: &Pubkey,
    authority: &Pubkey,
    market: &Pubkey,
    args: InitializeMarketArgs,
) -> Result<Instruction, ProgramError> {
    let data = BinaryMarketInstruction::InitializeMarket(args).try_to_vec()?;

    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*market, true),
    ];
    accounts.extend(vault_metas(
        program_id,
        market,
        &[VaultKind::Yes, VaultKind::No, VaultKind::Fee],
    ));
    accounts.push(AccountMeta::new_readonly(system_program::ID, false));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Build `PlaceBet`; the side index is derived from `side`
pub fn place_bet(
    program_id: &Pubkey,
    user: &Pubkey,
    market: &Pubkey,
    side: Side,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = BinaryMarketInstruction::PlaceBet(PlaceBetArgs {
        side,
        side_index: side.index(),
        amount,
    })
    .try_to_vec()?;
    let (position, _) = find_position_address(program_id, market, user, side);

    let mut accounts = vec![
        AccountMeta::new(*user, true),
        AccountMeta::new(*market, false),
    ];
    accounts.extend(vault_metas(program_id, market, &[VaultKind::Yes, VaultKind::No]));
    accounts.push(AccountMeta::new(position, false));
    accounts.push(AccountMeta::new_readonly(system_program::ID, false));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Build `ResolveMarket`
pub fn resolve_market(
    program_id: &Pubkey,
    resolver: &Pubkey,
    market: &Pubkey,
    outcome: Outcome,
) -> Result<Instruction, ProgramError> {
    let data = BinaryMarketInstruction::ResolveMarket(ResolveMarketArgs { outcome }).try_to_vec()?;

    let mut accounts = vec![
        AccountMeta::new_readonly(*resolver, true),
        AccountMeta::new(*market, false),
    ];
    accounts.extend(vault_metas(
        program_id,
        market,
        &[VaultKind::Yes, VaultKind::No, VaultKind::Fee],
    ));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Build `Claim` for the owner's position on `side`
pub fn claim(
    program_id: &Pubkey,
    owner: &Pubkey,
    market: &Pubkey,
    side: Side,
) -> Result<Instruction, ProgramError> {
    let data = BinaryMarketInstruction::Claim.try_to_vec()?;
    let (position, _) = find_position_address(program_id, market, owner, side);

    let mut accounts = vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new(*market, false),
    ];
    accounts.extend(vault_metas(program_id, market, &[VaultKind::Yes, VaultKind::No]));
    accounts.push(AccountMeta::new(position, false));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Build `WithdrawFees`
pub fn withdraw_fees(
    program_id: &Pubkey,
    authority: &Pubkey,
    market: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = BinaryMarketInstruction::WithdrawFees(WithdrawFeesArgs { amount }).try_to_vec()?;

    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*market, false),
    ];
    accounts.extend(vault_metas(program_id, market, &[VaultKind::Fee]));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Build `CloseMarket`
pub fn close_market(
    program_id: &Pubkey,
    authority: &Pubkey,
    market: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = BinaryMarketInstruction::CloseMarket.try_to_vec()?;

    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*market, false),
    ];
    accounts.extend(vault_metas(
        program_id,
        market,
        &[VaultKind::Yes, VaultKind::No, VaultKind::Fee],
    ));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

// ============================================================================
// Tests
// ============================================================================
