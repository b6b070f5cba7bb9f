//! Binary Market Program
//!
//! Binary-outcome (YES/NO) prediction markets settled in lamports.
//!
//! ## Architecture
//!
//! - `pda`: deterministic addresses for vaults and positions
//! - `state`: Market / Position accounts and the market lifecycle
//! - `vault`: lamport escrow (YES pool, NO pool, fee pool)
//! - `settlement`: fee skim and pro-rata payout math
//! - `processor`: instruction handlers, one atomic transition each
//! - `book`: off-chain replay of the same transitions over an in-memory arena
//!
//! ## Key Features
//!
//! - Parimutuel payout: winners split the losing pool pro rata
//! - Basis-point fee skimmed from the losing pool at resolution
//! - Resolution delegated to a `resolver` that may differ from the creator
//! - Void (`Outcome::Unset`) and empty-winner markets refund every stake

pub mod book;
pub mod error;
pub mod instruction;
pub mod pda;
pub mod processor;
pub mod settlement;
pub mod state;
pub mod utils;
pub mod vault;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

// Re-export commonly used items
pub use error::BinaryMarketError;
pub use instruction::BinaryMarketInstruction;
pub use state::*;

solana_program::declare_id!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");
