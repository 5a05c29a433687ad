// Ticket Lottery Program
// A timed, ticketed lottery with a surprise drawing during the window and a final drawing after it

// Core modules
pub mod entrypoint;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

// Lottery engine
pub mod access;
pub mod lifecycle;
pub mod random;
pub mod registry;
pub mod treasury;
pub mod upgrade;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
