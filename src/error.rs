//! Error types for the Binary Market Program

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

/// Errors that may be returned by the Binary Market Program
#[derive(Clone, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum BinaryMarketError {
    // === General Errors (1-99) ===
    // 0 is reserved: system program AccountAlreadyInUse

    #[error("Invalid instruction")]
    InvalidInstruction = 1,

    #[error("Invalid account data")]
    InvalidAccountData = 2,

    #[error("Already initialized")]
    AlreadyInitialized = 3,

    #[error("Invalid signer")]
    InvalidSigner = 4,

    #[error("Invalid PDA")]
    InvalidPDA = 5,

    #[error("Unauthorized")]
    Unauthorized = 6,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 7,

    #[error("Division by zero (empty winning pool)")]
    DivisionByZero = 8,

    #[error("Insufficient funds")]
    InsufficientFunds = 9,

    // === Market Errors (100-199) ===

    #[error("Question too long")]
    QuestionTooLong = 100,

    #[error("Fee rate above 10000 bps")]
    InvalidFeeRate = 101,

    #[error("Invalid timing")]
    InvalidTiming = 102,

    #[error("Market already resolved")]
    AlreadyResolved = 103,

    #[error("Market not resolved")]
    NotResolved = 104,

    #[error("Market closed")]
    MarketClosed = 105,

    #[error("Vaults still hold unclaimed funds")]
    AccountNotEmpty = 106,

    #[error("Vault balance does not cover recorded stake")]
    VaultMismatch = 107,

    // === Position Errors (200-299) ===

    #[error("Amount must be greater than zero")]
    ZeroAmount = 200,

    #[error("Invalid side")]
    InvalidSide = 201,

    #[error("Already claimed")]
    AlreadyClaimed = 202,

    #[error("Nothing to claim")]
    NothingToClaim = 203,

    #[error("Position does not match market, owner or side")]
    PositionMismatch = 204,
}

impl From<BinaryMarketError> for ProgramError {
    fn from(e: BinaryMarketError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for BinaryMarketError {
    fn type_of() -> &'static str {
        "BinaryMarketError"
    }
}

impl PrintProgramError for BinaryMarketError {
    fn print<E>(&self)
    where
        E: 'static + std::error::Error + DecodeError<E> + PrintProgramError + FromPrimitive,
    {
        msg!("Error: {}", self);
    }
}
