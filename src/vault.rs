//! Lamport escrow for the three per-market vaults (YES, NO, fee)
//!
//! On-chain a vault is a zero-data account owned by this program. Its escrow
//! balance is everything above the rent-exempt reserve recorded in the market.
//! `VaultBalances` mirrors the same three pools for off-chain replay.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::invoke,
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
};

use crate::error::BinaryMarketError;
use crate::state::{Side, FEE_VAULT_SEED, VAULT_NO_SEED, VAULT_YES_SEED};
use crate::utils::create_pda_account;

/// Which of the three market vaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultKind {
    Yes,
    No,
    Fee,
}

impl VaultKind {
    pub fn seed(self) -> &'static [u8] {
        match self {
            VaultKind::Yes => VAULT_YES_SEED,
            VaultKind::No => VAULT_NO_SEED,
            VaultKind::Fee => FEE_VAULT_SEED,
        }
    }
}

impl From<Side> for VaultKind {
    fn from(side: Side) -> Self {
        match side {
            Side::Yes => VaultKind::Yes,
            Side::No => VaultKind::No,
        }
    }
}

// ============================================================================
// On-chain vault accounts
// ============================================================================

/// Create a zero-data vault PDA holding only its rent-exempt reserve
pub fn create_vault<'a>(
    payer: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    program_id: &Pubkey,
    market: &Pubkey,
    kind: VaultKind,
    bump: u8,
) -> ProgramResult {
    let seeds: &[&[u8]] = &[kind.seed(), market.as_ref(), &[bump]];
    create_pda_account(payer, vault, 0, program_id, system_program, seeds)
}

/// Lamports above the rent reserve
pub fn escrow_balance(vault: &AccountInfo, rent_reserve: u64) -> u64 {
    vault.lamports().saturating_sub(rent_reserve)
}

/// Fail unless the vault holds at least `liability` above its reserve
pub fn ensure_covers(vault: &AccountInfo, rent_reserve: u64, liability: u64) -> ProgramResult {
    let balance = escrow_balance(vault, rent_reserve);
    if balance < liability {
        msg!(
            "Error: Vault {} holds {} but owes {}",
            vault.key,
            balance,
            liability
        );
        return Err(BinaryMarketError::VaultMismatch.into());
    }
    Ok(())
}

/// Move lamports from a system-owned payer into a vault
pub fn deposit<'a>(
    from: &AccountInfo<'a>,
    vault: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    invoke(
        &system_instruction::transfer(from.key, vault.key, amount),
        &[from.clone(), vault.clone(), system_program.clone()],
    )
}

/// Pay out of a vault without touching its rent reserve
pub fn withdraw<'a>(
    vault: &AccountInfo<'a>,
    to: &AccountInfo<'a>,
    rent_reserve: u64,
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Ok(());
    }
    ensure_covers(vault, rent_reserve, amount)?;
    transfer_lamports(vault, to, amount)
}

/// Move every lamport out of a program-owned account, closing it. Returns the amount moved.
pub fn drain<'a>(vault: &AccountInfo<'a>, to: &AccountInfo<'a>) -> Result<u64, ProgramError> {
    let amount = vault.lamports();
    transfer_lamports(vault, to, amount)?;
    Ok(amount)
}

/// Transfer SOL out of a program-owned account
pub fn transfer_lamports<'a>(
    from: &AccountInfo<'a>,
    to: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    let from_balance = from
        .lamports()
        .checked_sub(amount)
        .ok_or(BinaryMarketError::InsufficientFunds)?;
    let to_balance = to
        .lamports()
        .checked_add(amount)
        .ok_or(BinaryMarketError::ArithmeticOverflow)?;
    **from.try_borrow_mut_lamports()? = from_balance;
    **to.try_borrow_mut_lamports()? = to_balance;
    Ok(())
}

// ============================================================================
// In-memory vaults
// ============================================================================

/// Escrow balances of one market's three vaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VaultBalances {
    pub yes: u64,
    pub no: u64,
    pub fee: u64,
}

impl VaultBalances {
    pub fn balance(&self, kind: VaultKind) -> u64 {
        match kind {
            VaultKind::Yes => self.yes,
            VaultKind::No => self.no,
            VaultKind::Fee => self.fee,
        }
    }

    fn balance_mut(&mut self, kind: VaultKind) -> &mut u64 {
        match kind {
            VaultKind::Yes => &mut self.yes,
            VaultKind::No => &mut self.no,
            VaultKind::Fee => &mut self.fee,
        }
    }

    pub fn deposit(&mut self, kind: VaultKind, amount: u64) -> Result<(), BinaryMarketError> {
        let balance = self.balance_mut(kind);
        *balance = balance
            .checked_add(amount)
            .ok_or(BinaryMarketError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn withdraw(&mut self, kind: VaultKind, amount: u64) -> Result<(), BinaryMarketError> {
        let balance = self.balance_mut(kind);
        *balance = balance
            .checked_sub(amount)
            .ok_or(BinaryMarketError::VaultMismatch)?;
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: VaultKind,
        to: VaultKind,
        amount: u64,
    ) -> Result<(), BinaryMarketError> {
        let mut staged = *self;
        staged.withdraw(from, amount)?;
        staged.deposit(to, amount)?;
        *self = staged;
        Ok(())
    }

    pub fn total(&self) -> u64 {
        self.yes.saturating_add(self.no).saturating_add(self.fee)
    }

    /// Empty all three vaults, returning what they held
    pub fn drain(&mut self) -> u64 {
        let total = self.total();
        *self = Self::default();
        total
    }
}
