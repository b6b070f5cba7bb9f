//! Utility functions for the Binary Market Program

use borsh::BorshDeserialize;
use solana_program::{
    account_info::AccountInfo,
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};

use crate::error::BinaryMarketError;

/// Safely deserialize account data using BorshDeserialize::deserialize
/// This does NOT require the slice to be fully consumed, which is important
/// when the account has padding bytes at the end.
pub fn deserialize_account<T: BorshDeserialize>(data: &[u8]) -> Result<T, ProgramError> {
    T::deserialize(&mut &data[..])
        .map_err(|_| ProgramError::InvalidAccountData)
}

/// Check if a signer is authorized
pub fn check_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        msg!("Error: {} must sign", account.key);
        return Err(BinaryMarketError::InvalidSigner.into());
    }
    Ok(())
}

/// Check that an account is owned by this program
pub fn check_program_owner(account: &AccountInfo, program_id: &Pubkey) -> ProgramResult {
    if account.owner != program_id {
        msg!("Error: {} is not owned by this program", account.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Verify the System Program account
pub fn check_system_program(account: &AccountInfo) -> ProgramResult {
    if *account.key != system_program::ID {
        msg!("Error: Invalid System Program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Get current timestamp from Clock sysvar
pub fn get_current_timestamp() -> Result<i64, ProgramError> {
    let clock = Clock::get()?;
    Ok(clock.unix_timestamp)
}

/// Create a PDA account funded to rent exemption
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    pda: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    system_program: &AccountInfo<'a>,
    seeds: &[&[u8]],
) -> ProgramResult {
    create_program_account(payer, pda, space, owner, system_program, &[seeds])
}

/// Create a program-owned account at `target`, signing with `signer_seeds`
/// when `target` is a PDA.
///
/// Anyone can send lamports to an address before it is created, and
/// `create_account` rejects an address that already holds lamports. A
/// pre-funded target is topped up to rent exemption, then allocated and
/// assigned in place.
pub fn create_program_account<'a>(
    payer: &AccountInfo<'a>,
    target: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    system_program: &AccountInfo<'a>,
    signer_seeds: &[&[&[u8]]],
) -> ProgramResult {
    let rent = Rent::get()?;
    let required = rent.minimum_balance(space);
    let current = target.lamports();

    if current == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                target.key,
                required,
                space as u64,
                owner,
            ),
            &[payer.clone(), target.clone(), system_program.clone()],
            signer_seeds,
        );
    }

    if *target.owner != system_program::ID || !target.data_is_empty() {
        msg!("Error: {} is already in use", target.key);
        return Err(BinaryMarketError::AlreadyInitialized.into());
    }

    msg!("{} pre-funded with {} lamports", target.key, current);
    let top_up = required.saturating_sub(current);
    if top_up > 0 {
        invoke(
            &system_instruction::transfer(payer.key, target.key, top_up),
            &[payer.clone(), target.clone(), system_program.clone()],
        )?;
    }
    if space > 0 {
        invoke_signed(
            &system_instruction::allocate(target.key, space as u64),
            &[target.clone(), system_program.clone()],
            signer_seeds,
        )?;
    }
    invoke_signed(
        &system_instruction::assign(target.key, owner),
        &[target.clone(), system_program.clone()],
        signer_seeds,
    )
}
