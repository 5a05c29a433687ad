// Ticket Lottery Program - Utility Functions
use solana_program::{
    account_info::AccountInfo,
    bpf_loader_upgradeable,
    entrypoint::ProgramResult,
    program::{invoke, invoke_signed},
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

use crate::state::{HOLDER_SEED, LOTTERY_SEED, TICKET_SEED};

/// Find the program derived address of the lottery account
pub fn lottery_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LOTTERY_SEED], program_id)
}

/// Find the program derived address of a holder's `holder_index`-th ticket
pub fn ticket_address(
    program_id: &Pubkey,
    lottery: &Pubkey,
    holder: &Pubkey,
    holder_index: u64,
) -> (Pubkey, u8) {
    let holder_index_bytes = holder_index.to_le_bytes();
    Pubkey::find_program_address(
        &[TICKET_SEED, lottery.as_ref(), holder.as_ref(), &holder_index_bytes],
        program_id,
    )
}

/// Find the program derived address of a holder's ticket count
pub fn holder_address(program_id: &Pubkey, lottery: &Pubkey, holder: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[HOLDER_SEED, lottery.as_ref(), holder.as_ref()], program_id)
}

/// Find the upgradeable loader's program data account of `program_id`
pub fn program_data_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id())
}

/// Create a rent-exempt account at a program derived address, owned by `owner`.
///
/// Anyone can send lamports to an address before it is created, so an account that
/// already holds lamports is topped up, allocated and assigned instead.
pub fn create_pda_account<'info>(
    payer: &AccountInfo<'info>,
    new_account: &AccountInfo<'info>,
    system_program: &AccountInfo<'info>,
    owner: &Pubkey,
    space: usize,
    seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::get()?;
    let required_lamports = rent.minimum_balance(space);

    if new_account.lamports() == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                new_account.key,
                required_lamports,
                space as u64,
                owner,
            ),
            &[payer.clone(), new_account.clone(), system_program.clone()],
            &[seeds],
        );
    }

    let shortfall = required_lamports.saturating_sub(new_account.lamports());
    if shortfall > 0 {
        invoke(
            &system_instruction::transfer(payer.key, new_account.key, shortfall),
            &[payer.clone(), new_account.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(new_account.key, space as u64),
        &[new_account.clone(), system_program.clone()],
        &[seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(new_account.key, owner),
        &[new_account.clone(), system_program.clone()],
        &[seeds],
    )
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * 1_000_000_000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_distinct_per_seed() {
        let program_id = Pubkey::new_unique();
        let (lottery, _) = lottery_address(&program_id);
        let holder = Pubkey::new_unique();
        let other = Pubkey::new_unique();

        assert_ne!(
            ticket_address(&program_id, &lottery, &holder, 0).0,
            ticket_address(&program_id, &lottery, &holder, 1).0
        );
        assert_ne!(
            ticket_address(&program_id, &lottery, &holder, 0).0,
            ticket_address(&program_id, &lottery, &other, 0).0
        );
        assert_ne!(holder_address(&program_id, &lottery, &holder).0, lottery);
        assert_eq!(lottery_address(&program_id).0, lottery);
    }

    #[test]
    fn sol_conversions() {
        assert_eq!(sol_to_lamports(0.5), 500_000_000);
        assert_eq!(lamports_to_sol(1_250_000_000), 1.25);
    }
}
