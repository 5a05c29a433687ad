use crate::{
    error::LotteryError,
    instruction::{LotteryInstruction, Query},
    random::{Draw, SlotHashEntropy},
    registry::{AccountTicketBook, Balanced, Mintable},
    state::{LotteryState, LOTTERY_ACCOUNT_LEN, LOTTERY_SEED},
    treasury::transfer_out,
    upgrade::ProgramDataInfo,
    utils,
};

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::Initialize { name, symbol } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(accounts, name, symbol, program_id)
            }
            LotteryInstruction::SetTicketPrice { price } => {
                msg!("Instruction: Set Ticket Price");
                Self::process_set_ticket_price(accounts, price, program_id)
            }
            LotteryInstruction::StartLottery { start_at, end_at } => {
                msg!("Instruction: Start Lottery");
                Self::process_start_lottery(accounts, start_at, end_at, program_id)
            }
            LotteryInstruction::EnterLottery { payment } => {
                msg!("Instruction: Enter Lottery");
                Self::process_enter_lottery(accounts, payment, program_id)
            }
            LotteryInstruction::AwardSurpriseWinner => {
                msg!("Instruction: Award Surprise Winner");
                Self::process_award_surprise_winner(accounts, program_id)
            }
            LotteryInstruction::EndLottery => {
                msg!("Instruction: End Lottery");
                Self::process_end_lottery(accounts, program_id)
            }
            LotteryInstruction::ClaimPrize { draw } => {
                msg!("Instruction: Claim Prize");
                Self::process_claim_prize(accounts, draw, program_id)
            }
            LotteryInstruction::TransferAdmin => {
                msg!("Instruction: Transfer Admin");
                Self::process_transfer_admin(accounts, program_id)
            }
            LotteryInstruction::CommitUpgrade => {
                msg!("Instruction: Commit Upgrade");
                Self::process_commit_upgrade(accounts, program_id)
            }
            LotteryInstruction::Query { query } => {
                msg!("Instruction: Query");
                Self::process_query(accounts, query, program_id)
            }
        }
    }

    /// Process the Initialize instruction
    ///
    /// Creates the lottery account once. Only the upgrade authority of the program may
    /// do so, which keeps anyone else from claiming the administrator role first.
    fn process_initialize(
        accounts: &[AccountInfo],
        name: String,
        symbol: String,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let program_data_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            msg!("Deployer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_system_program(system_program_info)?;

        let (expected_lottery_pubkey, bump_seed) = utils::lottery_address(program_id);
        if *lottery_info.key != expected_lottery_pubkey {
            msg!("Invalid lottery account address");
            return Err(ProgramError::InvalidArgument);
        }
        if lottery_info.owner == program_id
            && LotteryState::is_initialized_account(&lottery_info.data.borrow())
        {
            return Err(Self::fail(LotteryError::AlreadyInitialized));
        }

        let program_data = ProgramDataInfo::from_account_info(program_id, program_data_info)?;
        program_data.authorize(deployer_info.key).map_err(Self::fail)?;

        let state = LotteryState::new(*deployer_info.key, name, symbol, program_data.slot)
            .map_err(Self::fail)?;

        msg!("Creating lottery account");
        utils::create_pda_account(
            deployer_info,
            lottery_info,
            system_program_info,
            program_id,
            LOTTERY_ACCOUNT_LEN,
            &[LOTTERY_SEED, &[bump_seed]],
        )?;
        Self::store(&state, lottery_info)?;

        msg!(
            "Lottery initialized: Admin={}, Name={}, Symbol={}, TicketPrice={}",
            deployer_info.key,
            state.name,
            state.symbol,
            state.ticket_price()
        );
        Ok(())
    }

    fn process_set_ticket_price(
        accounts: &[AccountInfo],
        price: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::check_signer(admin_info)?;
        let mut state = Self::load(lottery_info, program_id)?;

        state.set_ticket_price(admin_info.key, price).map_err(Self::fail)?;
        Self::store(&state, lottery_info)
    }

    fn process_start_lottery(
        accounts: &[AccountInfo],
        start_at: i64,
        end_at: i64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::check_signer(admin_info)?;
        let mut state = Self::load(lottery_info, program_id)?;

        state
            .start_lottery(admin_info.key, start_at, end_at)
            .map_err(Self::fail)?;
        Self::store(&state, lottery_info)
    }

    /// Process the EnterLottery instruction
    ///
    /// Moves `payment` from the entrant into the lottery account and mints the ticket.
    fn process_enter_lottery(
        accounts: &[AccountInfo],
        payment: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let entrant_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let ticket_info = next_account_info(account_info_iter)?;
        let holder_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        Self::check_signer(entrant_info)?;
        Self::check_system_program(system_program_info)?;
        let mut state = Self::load(lottery_info, program_id)?;
        let clock = Clock::get()?;

        let ticket = state
            .enter_lottery(entrant_info.key, payment, clock.unix_timestamp)
            .map_err(Self::fail)?;

        invoke(
            &system_instruction::transfer(entrant_info.key, lottery_info.key, payment),
            &[
                entrant_info.clone(),
                lottery_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        let mut book = AccountTicketBook {
            program_id,
            lottery: lottery_info,
            payer: entrant_info,
            ticket: ticket_info,
            holder: holder_info,
            system_program: system_program_info,
        };
        book.mint(&ticket)?;
        msg!(
            "Holder {} owns {} tickets, pot {} lamports",
            entrant_info.key,
            book.balance_of(entrant_info.key),
            state.get_balance()
        );

        Self::store(&state, lottery_info)
    }

    /// Process the AwardSurpriseWinner instruction
    ///
    /// Records the winner and the owed prize. The transfer happens in ClaimPrize, so
    /// nothing the caller supplies can influence or veto the outcome.
    fn process_award_surprise_winner(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let slot_hashes_info = next_account_info(account_info_iter)?;

        Self::check_signer(caller_info)?;
        let mut state = Self::load(lottery_info, program_id)?;
        let clock = Clock::get()?;
        let entropy = SlotHashEntropy::from_sysvar(slot_hashes_info, &clock)?;

        state
            .award_surprise_winner(&entropy, clock.unix_timestamp)
            .map_err(Self::fail)?;
        Self::store(&state, lottery_info)
    }

    fn process_end_lottery(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let slot_hashes_info = next_account_info(account_info_iter)?;

        Self::check_signer(caller_info)?;
        let mut state = Self::load(lottery_info, program_id)?;
        let clock = Clock::get()?;
        let entropy = SlotHashEntropy::from_sysvar(slot_hashes_info, &clock)?;

        state
            .end_lottery(&entropy, clock.unix_timestamp)
            .map_err(Self::fail)?;
        Self::store(&state, lottery_info)
    }

    /// Process the ClaimPrize instruction
    ///
    /// Persists the release with the transfer guard raised, moves the lamports, then
    /// persists again with the guard cleared.
    fn process_claim_prize(
        accounts: &[AccountInfo],
        draw: Draw,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        Self::check_signer(caller_info)?;
        if !winner_info.is_writable {
            msg!("Winner account must be writable");
            return Err(ProgramError::InvalidArgument);
        }
        let mut state = Self::load(lottery_info, program_id)?;

        let payout = state.claim_prize(draw, winner_info.key).map_err(Self::fail)?;
        Self::store(&state, lottery_info)?;

        transfer_out(lottery_info, winner_info, payout.amount)?;

        state.settle_payout();
        Self::store(&state, lottery_info)
    }

    fn process_transfer_admin(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let new_admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::check_signer(admin_info)?;
        let mut state = Self::load(lottery_info, program_id)?;

        state
            .transfer_admin(admin_info.key, *new_admin_info.key)
            .map_err(Self::fail)?;
        Self::store(&state, lottery_info)
    }

    /// Process the CommitUpgrade instruction
    ///
    /// Storing rewrites the account at the current layout revision.
    fn process_commit_upgrade(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let program_data_info = next_account_info(account_info_iter)?;

        Self::check_signer(authority_info)?;
        let mut state = Self::load(lottery_info, program_id)?;
        let program_data = ProgramDataInfo::from_account_info(program_id, program_data_info)?;

        state
            .commit_upgrade(authority_info.key, &program_data)
            .map_err(Self::fail)?;
        Self::store(&state, lottery_info)
    }

    fn process_query(accounts: &[AccountInfo], query: Query, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let lottery_info = next_account_info(account_info_iter)?;

        let state = Self::load(lottery_info, program_id)?;
        set_return_data(&query.answer(&state)?);
        Ok(())
    }

    fn load(lottery_info: &AccountInfo, program_id: &Pubkey) -> Result<LotteryState, ProgramError> {
        if lottery_info.owner != program_id {
            msg!("Lottery account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let (expected_lottery_pubkey, _) = utils::lottery_address(program_id);
        if *lottery_info.key != expected_lottery_pubkey {
            msg!("Invalid lottery account address");
            return Err(ProgramError::InvalidArgument);
        }
        let data = lottery_info.data.borrow();
        LotteryState::unpack_from_account(&data)
    }

    fn store(state: &LotteryState, lottery_info: &AccountInfo) -> ProgramResult {
        state.pack_into_account(&mut lottery_info.data.borrow_mut())
    }

    fn check_signer(info: &AccountInfo) -> ProgramResult {
        if !info.is_signer {
            msg!("Account {} must sign the transaction", info.key);
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(())
    }

    fn check_system_program(info: &AccountInfo) -> ProgramResult {
        if !system_program::check_id(info.key) {
            msg!("Invalid system program account");
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    /// Logs a lottery error before it is surfaced as a custom program error.
    fn fail(err: LotteryError) -> ProgramError {
        msg!("Error: {}", err);
        err.into()
    }
}
