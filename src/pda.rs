//! Program-derived addresses for vaults and positions
//!
//! Seeds:
//! - `["vault_yes", market]`
//! - `["vault_no", market]`
//! - `["fee_vault", market]`
//! - `["position", market, owner, [side.index()]]`

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::BinaryMarketError;
use crate::state::{Side, POSITION_SEED};
use crate::vault::VaultKind;

/// Derive a market vault address
pub fn find_vault_address(program_id: &Pubkey, market: &Pubkey, kind: VaultKind) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[kind.seed(), market.as_ref()], program_id)
}

/// Derive a position address for (market, owner, side)
pub fn find_position_address(
    program_id: &Pubkey,
    market: &Pubkey,
    owner: &Pubkey,
    side: Side,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[POSITION_SEED, market.as_ref(), owner.as_ref(), &[side.index()]],
        program_id,
    )
}

/// Check a supplied vault account against its derived address
pub fn verify_vault_address(
    expected: &Pubkey,
    program_id: &Pubkey,
    market: &Pubkey,
    kind: VaultKind,
) -> Result<u8, ProgramError> {
    let (pda, bump) = find_vault_address(program_id, market, kind);
    if pda != *expected {
        msg!("Error: Invalid {:?} vault PDA: expected {}, got {}", kind, pda, expected);
        return Err(BinaryMarketError::InvalidPDA.into());
    }
    Ok(bump)
}

/// Check a supplied position account against its derived address
pub fn verify_position_address(
    expected: &Pubkey,
    program_id: &Pubkey,
    market: &Pubkey,
    owner: &Pubkey,
    side: Side,
) -> Result<u8, ProgramError> {
    let (pda, bump) = find_position_address(program_id, market, owner, side);
    if pda != *expected {
        msg!("Error: Invalid position PDA: expected {}, got {}", pda, expected);
        return Err(BinaryMarketError::InvalidPDA.into());
    }
    Ok(bump)
}
