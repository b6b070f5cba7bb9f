//! Instruction processor for the Binary Market Program

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    sysvar::Sysvar,
};

use crate::error::BinaryMarketError;
use crate::instruction::{
    BinaryMarketInstruction, InitializeMarketArgs, PlaceBetArgs, ResolveMarketArgs,
    WithdrawFeesArgs,
};
use crate::pda::{verify_position_address, verify_vault_address};
use crate::state::{
    Market, Position, Side, MARKET_DISCRIMINATOR, POSITION_DISCRIMINATOR, POSITION_SEED,
};
use crate::utils::{
    check_program_owner, check_signer, check_system_program, create_pda_account,
    create_program_account, deserialize_account, get_current_timestamp,
};
use crate::vault::{self, VaultKind};

/// Process an instruction
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = BinaryMarketInstruction::try_from_slice(instruction_data)
        .map_err(|_| BinaryMarketError::InvalidInstruction)?;

    match instruction {
        BinaryMarketInstruction::InitializeMarket(args) => {
            msg!("Instruction: InitializeMarket");
            process_initialize_market(program_id, accounts, args)
        }
        BinaryMarketInstruction::PlaceBet(args) => {
            msg!("Instruction: PlaceBet");
            process_place_bet(program_id, accounts, args)
        }
        BinaryMarketInstruction::ResolveMarket(args) => {
            msg!("Instruction: ResolveMarket");
            process_resolve_market(program_id, accounts, args)
        }
        BinaryMarketInstruction::Claim => {
            msg!("Instruction: Claim");
            process_claim(program_id, accounts)
        }
        BinaryMarketInstruction::WithdrawFees(args) => {
            msg!("Instruction: WithdrawFees");
            process_withdraw_fees(program_id, accounts, args)
        }
        BinaryMarketInstruction::CloseMarket => {
            msg!("Instruction: CloseMarket");
            process_close_market(program_id, accounts)
        }
    }
}

// ============================================================================
// Account loading
// ============================================================================

fn load_market(market_info: &AccountInfo, program_id: &Pubkey) -> Result<Market, ProgramError> {
    check_program_owner(market_info, program_id)?;
    let market = deserialize_account::<Market>(&market_info.data.borrow())?;
    if market.discriminator != MARKET_DISCRIMINATOR {
        msg!("Error: Invalid Market discriminator");
        return Err(BinaryMarketError::InvalidAccountData.into());
    }
    Ok(market)
}

fn load_position(position_info: &AccountInfo, program_id: &Pubkey) -> Result<Position, ProgramError> {
    check_program_owner(position_info, program_id)?;
    let position = deserialize_account::<Position>(&position_info.data.borrow())?;
    if position.discriminator != POSITION_DISCRIMINATOR {
        msg!("Error: Invalid Position discriminator");
        return Err(BinaryMarketError::InvalidAccountData.into());
    }
    Ok(position)
}

fn store<T: BorshSerialize>(value: &T, info: &AccountInfo) -> ProgramResult {
    value.serialize(&mut *info.data.borrow_mut())?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

fn process_initialize_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: InitializeMarketArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Authority (signer, payer)
    let authority_info = next_account_info(account_info_iter)?;
    check_signer(authority_info)?;

    // Account 1: Market (signer, fresh keypair)
    let market_info = next_account_info(account_info_iter)?;
    check_signer(market_info)?;

    // Account 2-4: Vault PDAs
    let vault_yes_info = next_account_info(account_info_iter)?;
    let vault_no_info = next_account_info(account_info_iter)?;
    let fee_vault_info = next_account_info(account_info_iter)?;

    // Account 5: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    check_system_program(system_program_info)?;

    if !market_info.data_is_empty() {
        msg!("Error: Market already initialized");
        return Err(BinaryMarketError::AlreadyInitialized.into());
    }

    let bump_yes = verify_vault_address(vault_yes_info.key, program_id, market_info.key, VaultKind::Yes)?;
    let bump_no = verify_vault_address(vault_no_info.key, program_id, market_info.key, VaultKind::No)?;
    let bump_fee = verify_vault_address(fee_vault_info.key, program_id, market_info.key, VaultKind::Fee)?;

    // Validate market parameters before creating anything
    let current_time = get_current_timestamp()?;
    let mut market = Market::new(
        *authority_info.key,
        args.resolver,
        args.question,
        args.close_time,
        args.fee_bps,
        current_time,
    )?;

    let rent = Rent::get()?;
    market.vault_rent = rent.minimum_balance(0);
    market.bump_yes = bump_yes;
    market.bump_no = bump_no;
    market.bump_fee = bump_fee;

    // Create Market account (fresh keypair, signed by the transaction)
    create_program_account(
        authority_info,
        market_info,
        Market::SIZE,
        program_id,
        system_program_info,
        &[],
    )?;

    // Create the three vaults
    for (vault_info, kind, bump) in [
        (vault_yes_info, VaultKind::Yes, bump_yes),
        (vault_no_info, VaultKind::No, bump_no),
        (fee_vault_info, VaultKind::Fee, bump_fee),
    ] {
        vault::create_vault(
            authority_info,
            vault_info,
            system_program_info,
            program_id,
            market_info.key,
            kind,
            bump,
        )?;
    }

    store(&market, market_info)?;

    msg!("Market created successfully");
    msg!("Market: {}", market_info.key);
    msg!("Authority: {}", authority_info.key);
    msg!("Resolver: {}", market.resolver);
    msg!("Close Time: {}", market.close_time);
    msg!("Fee: {} bps", market.fee_bps);

    Ok(())
}

fn process_place_bet(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: PlaceBetArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: User (signer, payer)
    let user_info = next_account_info(account_info_iter)?;
    check_signer(user_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2-3: Stake vaults
    let vault_yes_info = next_account_info(account_info_iter)?;
    let vault_no_info = next_account_info(account_info_iter)?;

    // Account 4: Position PDA (writable)
    let position_info = next_account_info(account_info_iter)?;

    // Account 5: System Program
    let system_program_info = next_account_info(account_info_iter)?;
    check_system_program(system_program_info)?;

    if Side::from_index(args.side_index) != Some(args.side) {
        msg!("Error: side_index {} does not match {:?}", args.side_index, args.side);
        return Err(BinaryMarketError::InvalidSide.into());
    }

    let mut market = load_market(market_info, program_id)?;
    verify_vault_address(vault_yes_info.key, program_id, market_info.key, VaultKind::Yes)?;
    verify_vault_address(vault_no_info.key, program_id, market_info.key, VaultKind::No)?;
    let position_bump = verify_position_address(
        position_info.key,
        program_id,
        market_info.key,
        user_info.key,
        args.side,
    )?;

    let current_time = get_current_timestamp()?;
    market.record_bet(args.side, args.amount, current_time)?;

    let is_new = position_info.data_is_empty();
    let mut position = if is_new {
        Position::new(*market_info.key, *user_info.key, args.side, position_bump, current_time)
    } else {
        let position = load_position(position_info, program_id)?;
        if !position.matches(market_info.key, user_info.key, args.side) {
            msg!("Error: Position does not belong to this market/owner/side");
            return Err(BinaryMarketError::PositionMismatch.into());
        }
        position
    };
    position.add_stake(args.amount, current_time)?;

    if is_new {
        let side_index = [args.side.index()];
        let bump = [position_bump];
        let seeds: &[&[u8]] = &[
            POSITION_SEED,
            market_info.key.as_ref(),
            user_info.key.as_ref(),
            &side_index,
            &bump,
        ];
        create_pda_account(
            user_info,
            position_info,
            Position::SIZE,
            program_id,
            system_program_info,
            seeds,
        )?;
    }

    let vault_info = match args.side {
        Side::Yes => vault_yes_info,
        Side::No => vault_no_info,
    };
    vault::deposit(user_info, vault_info, system_program_info, args.amount)?;
    vault::ensure_covers(vault_info, market.vault_rent, market.total(args.side))?;

    store(&market, market_info)?;
    store(&position, position_info)?;

    msg!(
        "Bet placed: {} {:?} {} lamports (position total {})",
        user_info.key,
        args.side,
        args.amount,
        position.amount
    );
    msg!("Pool: YES={}, NO={}", market.total_yes, market.total_no);

    Ok(())
}

fn process_resolve_market(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: ResolveMarketArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Resolver (signer)
    let resolver_info = next_account_info(account_info_iter)?;
    check_signer(resolver_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2-4: Vault PDAs
    let vault_yes_info = next_account_info(account_info_iter)?;
    let vault_no_info = next_account_info(account_info_iter)?;
    let fee_vault_info = next_account_info(account_info_iter)?;

    let mut market = load_market(market_info, program_id)?;
    verify_vault_address(vault_yes_info.key, program_id, market_info.key, VaultKind::Yes)?;
    verify_vault_address(vault_no_info.key, program_id, market_info.key, VaultKind::No)?;
    verify_vault_address(fee_vault_info.key, program_id, market_info.key, VaultKind::Fee)?;

    let current_time = get_current_timestamp()?;
    let resolution = market.resolve(resolver_info.key, args.outcome, current_time)?;

    // Skim the fee from the losing vault
    if let Some(source) = resolution.fee_source() {
        let source_info = match source {
            Side::Yes => vault_yes_info,
            Side::No => vault_no_info,
        };
        vault::withdraw(source_info, fee_vault_info, market.vault_rent, resolution.fee)?;
    }

    store(&market, market_info)?;

    msg!("Market {} resolved: {:?}", market_info.key, args.outcome);
    msg!("Fee: {}, Distributable: {}", resolution.fee, resolution.distributable);
    if market.is_void() {
        msg!("Market voided, all stakes refundable");
    }

    Ok(())
}

fn process_claim(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Owner (signer, receives payout)
    let owner_info = next_account_info(account_info_iter)?;
    check_signer(owner_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2-3: Stake vaults
    let vault_yes_info = next_account_info(account_info_iter)?;
    let vault_no_info = next_account_info(account_info_iter)?;

    // Account 4: Position PDA (writable)
    let position_info = next_account_info(account_info_iter)?;

    let mut market = load_market(market_info, program_id)?;
    verify_vault_address(vault_yes_info.key, program_id, market_info.key, VaultKind::Yes)?;
    verify_vault_address(vault_no_info.key, program_id, market_info.key, VaultKind::No)?;

    let mut position = load_position(position_info, program_id)?;
    if position.market != *market_info.key {
        msg!("Error: Position belongs to market {}", position.market);
        return Err(BinaryMarketError::PositionMismatch.into());
    }
    if position.owner != *owner_info.key {
        msg!("Error: Only the position owner can claim");
        return Err(BinaryMarketError::Unauthorized.into());
    }
    verify_position_address(
        position_info.key,
        program_id,
        market_info.key,
        owner_info.key,
        position.side,
    )?;

    let current_time = get_current_timestamp()?;
    let payout = market.claim(&mut position, current_time)?;

    let (own_vault, other_vault) = match payout.side {
        Side::Yes => (vault_yes_info, vault_no_info),
        Side::No => (vault_no_info, vault_yes_info),
    };
    vault::withdraw(own_vault, owner_info, market.vault_rent, payout.stake)?;
    vault::withdraw(other_vault, owner_info, market.vault_rent, payout.share)?;

    store(&market, market_info)?;
    store(&position, position_info)?;

    msg!(
        "Claimed: {} {:?} stake={} share={} total={}",
        owner_info.key,
        payout.side,
        payout.stake,
        payout.share,
        position.payout
    );

    Ok(())
}

fn process_withdraw_fees(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    args: WithdrawFeesArgs,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Authority (signer)
    let authority_info = next_account_info(account_info_iter)?;
    check_signer(authority_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2: Fee Vault PDA
    let fee_vault_info = next_account_info(account_info_iter)?;

    let mut market = load_market(market_info, program_id)?;
    verify_vault_address(fee_vault_info.key, program_id, market_info.key, VaultKind::Fee)?;

    market.withdraw_fees(authority_info.key, args.amount)?;
    vault::withdraw(fee_vault_info, authority_info, market.vault_rent, args.amount)?;

    store(&market, market_info)?;

    msg!(
        "Fees withdrawn: {} (remaining {})",
        args.amount,
        market.withdrawable_fees()
    );

    Ok(())
}

fn process_close_market(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    // Account 0: Authority (signer, receives vault lamports)
    let authority_info = next_account_info(account_info_iter)?;
    check_signer(authority_info)?;

    // Account 1: Market (writable)
    let market_info = next_account_info(account_info_iter)?;

    // Account 2-4: Vault PDAs
    let vault_yes_info = next_account_info(account_info_iter)?;
    let vault_no_info = next_account_info(account_info_iter)?;
    let fee_vault_info = next_account_info(account_info_iter)?;

    let mut market = load_market(market_info, program_id)?;
    verify_vault_address(vault_yes_info.key, program_id, market_info.key, VaultKind::Yes)?;
    verify_vault_address(vault_no_info.key, program_id, market_info.key, VaultKind::No)?;
    verify_vault_address(fee_vault_info.key, program_id, market_info.key, VaultKind::Fee)?;

    market.close(authority_info.key)?;

    // Rent reserves, unwithdrawn fees, rounding dust and donations go back to the authority
    let mut returned = 0u64;
    for vault_info in [vault_yes_info, vault_no_info, fee_vault_info] {
        returned = returned
            .checked_add(vault::drain(vault_info, authority_info)?)
            .ok_or(BinaryMarketError::ArithmeticOverflow)?;
    }

    // Write the Closed record, then reclaim the market's own rent
    store(&market, market_info)?;
    returned = returned
        .checked_add(vault::drain(market_info, authority_info)?)
        .ok_or(BinaryMarketError::ArithmeticOverflow)?;

    msg!("Market {} closed", market_info.key);
    msg!("Returned {} lamports to {}", returned, authority_info.key);

    Ok(())
}
