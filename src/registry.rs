use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    msg,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{
    error::LotteryError,
    state::{LotteryState, HOLDER_SEED, MAX_PARTICIPANTS, TICKET_SEED},
    utils,
};

/// A minted entry certificate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub holder: Pubkey,
    /// Run the ticket was bought in
    pub run: u64,
    pub minted_at: UnixTimestamp,
}

/// Ticket issuance with unique ids.
pub trait Mintable {
    fn mint(&mut self, ticket: &Ticket) -> Result<(), ProgramError>;
}

/// Holder -> ticket count.
pub trait Balanced {
    fn balance_of(&self, holder: &Pubkey) -> u64;
}

impl LotteryState {
    /// Books one entry for `caller`: appends it to the participants, credits `payment`
    /// to the pot and hands out the next ticket id. Overpayment stays in the pot.
    pub fn enter_lottery(
        &mut self,
        caller: &Pubkey,
        payment: u64,
        now: UnixTimestamp,
    ) -> Result<Ticket, LotteryError> {
        self.ensure_no_payout_in_progress()?;
        if !self.is_open_at(now) {
            return Err(LotteryError::NotOpen);
        }
        if payment < self.ticket_price {
            return Err(LotteryError::InsufficientPayment);
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(LotteryError::LotteryFull);
        }

        let pot = self.pot.checked_add(payment).ok_or(LotteryError::Overflow)?;
        let next_ticket_id = self
            .next_ticket_id
            .checked_add(1)
            .ok_or(LotteryError::Overflow)?;

        let ticket = Ticket {
            id: self.next_ticket_id,
            holder: *caller,
            run: self.run,
            minted_at: now,
        };
        self.pot = pot;
        self.next_ticket_id = next_ticket_id;
        self.participants.push(*caller);

        msg!("Ticket {} minted to {} for {} lamports", ticket.id, caller, payment);
        Ok(ticket)
    }
}

/// Persisted ticket account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketAccount {
    pub is_initialized: bool,
    pub lottery: Pubkey,
    pub id: u64,
    pub holder: Pubkey,
    pub run: u64,
    pub minted_at: UnixTimestamp,
}

/// Persisted per-holder ticket count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderAccount {
    pub is_initialized: bool,
    pub lottery: Pubkey,
    pub holder: Pubkey,
    pub ticket_count: u64,
}

impl Sealed for TicketAccount {}
impl Sealed for HolderAccount {}

impl IsInitialized for TicketAccount {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl IsInitialized for HolderAccount {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for TicketAccount {
    const LEN: usize = 1 + 32 + 8 + 32 + 8 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, TicketAccount::LEN];
        let (is_initialized, lottery, id, holder, run, minted_at) =
            array_refs![src, 1, 32, 8, 32, 8, 8];

        Ok(TicketAccount {
            is_initialized: is_initialized[0] != 0,
            lottery: Pubkey::new_from_array(*lottery),
            id: u64::from_le_bytes(*id),
            holder: Pubkey::new_from_array(*holder),
            run: u64::from_le_bytes(*run),
            minted_at: UnixTimestamp::from_le_bytes(*minted_at),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, TicketAccount::LEN];
        let (is_initialized_dst, lottery_dst, id_dst, holder_dst, run_dst, minted_at_dst) =
            mut_array_refs![dst, 1, 32, 8, 32, 8, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        lottery_dst.copy_from_slice(self.lottery.as_ref());
        *id_dst = self.id.to_le_bytes();
        holder_dst.copy_from_slice(self.holder.as_ref());
        *run_dst = self.run.to_le_bytes();
        *minted_at_dst = self.minted_at.to_le_bytes();
    }
}

impl Pack for HolderAccount {
    const LEN: usize = 1 + 32 + 32 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, HolderAccount::LEN];
        let (is_initialized, lottery, holder, ticket_count) = array_refs![src, 1, 32, 32, 8];

        Ok(HolderAccount {
            is_initialized: is_initialized[0] != 0,
            lottery: Pubkey::new_from_array(*lottery),
            holder: Pubkey::new_from_array(*holder),
            ticket_count: u64::from_le_bytes(*ticket_count),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, HolderAccount::LEN];
        let (is_initialized_dst, lottery_dst, holder_dst, ticket_count_dst) =
            mut_array_refs![dst, 1, 32, 32, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        lottery_dst.copy_from_slice(self.lottery.as_ref());
        holder_dst.copy_from_slice(self.holder.as_ref());
        *ticket_count_dst = self.ticket_count.to_le_bytes();
    }
}

/// Ticket book backed by program-derived accounts: one account per ticket and one
/// per holder. A ticket's address is derived from its holder and the holder's own
/// ticket count, so entries of different holders never name the same account.
/// The entrant pays the rent of both.
pub struct AccountTicketBook<'a, 'info> {
    pub program_id: &'a Pubkey,
    pub lottery: &'a AccountInfo<'info>,
    pub payer: &'a AccountInfo<'info>,
    pub ticket: &'a AccountInfo<'info>,
    pub holder: &'a AccountInfo<'info>,
    pub system_program: &'a AccountInfo<'info>,
}

impl<'a, 'info> AccountTicketBook<'a, 'info> {
    /// The holder record of `holder`, or `None` before its first ticket.
    fn holder_record(&self, holder: &Pubkey) -> Result<Option<HolderAccount>, ProgramError> {
        let (holder_address, _) = utils::holder_address(self.program_id, self.lottery.key, holder);
        if *self.holder.key != holder_address {
            msg!("Holder account does not match {}", holder);
            return Err(ProgramError::InvalidSeeds);
        }
        if self.holder.owner != self.program_id {
            return Ok(None);
        }
        HolderAccount::unpack(&self.holder.data.borrow()).map(Some)
    }
}

impl<'a, 'info> Mintable for AccountTicketBook<'a, 'info> {
    fn mint(&mut self, ticket: &Ticket) -> Result<(), ProgramError> {
        let record = self.holder_record(&ticket.holder)?;
        let holder_index = record.map_or(0, |record| record.ticket_count);

        let index_bytes = holder_index.to_le_bytes();
        let (ticket_address, ticket_bump) =
            utils::ticket_address(self.program_id, self.lottery.key, &ticket.holder, holder_index);
        if *self.ticket.key != ticket_address {
            msg!("Ticket account does not match ticket {} of {}", holder_index, ticket.holder);
            return Err(ProgramError::InvalidSeeds);
        }
        // A fresh holder index always maps to a fresh address
        if self.ticket.owner == self.program_id {
            return Err(ProgramError::AccountAlreadyInitialized);
        }
        utils::create_pda_account(
            self.payer,
            self.ticket,
            self.system_program,
            self.program_id,
            TicketAccount::LEN,
            &[
                TICKET_SEED,
                self.lottery.key.as_ref(),
                ticket.holder.as_ref(),
                &index_bytes,
                &[ticket_bump],
            ],
        )?;
        TicketAccount::pack(
            TicketAccount {
                is_initialized: true,
                lottery: *self.lottery.key,
                id: ticket.id,
                holder: ticket.holder,
                run: ticket.run,
                minted_at: ticket.minted_at,
            },
            &mut self.ticket.data.borrow_mut(),
        )?;

        let record = match record {
            Some(mut record) => {
                record.ticket_count = record
                    .ticket_count
                    .checked_add(1)
                    .ok_or(LotteryError::Overflow)?;
                record
            }
            None => {
                let (_, holder_bump) =
                    utils::holder_address(self.program_id, self.lottery.key, &ticket.holder);
                utils::create_pda_account(
                    self.payer,
                    self.holder,
                    self.system_program,
                    self.program_id,
                    HolderAccount::LEN,
                    &[
                        HOLDER_SEED,
                        self.lottery.key.as_ref(),
                        ticket.holder.as_ref(),
                        &[holder_bump],
                    ],
                )?;
                HolderAccount {
                    is_initialized: true,
                    lottery: *self.lottery.key,
                    holder: ticket.holder,
                    ticket_count: 1,
                }
            }
        };
        HolderAccount::pack(record, &mut self.holder.data.borrow_mut())?;

        Ok(())
    }
}

impl<'a, 'info> Balanced for AccountTicketBook<'a, 'info> {
    /// Only the holder account handed to this book can be answered for.
    fn balance_of(&self, holder: &Pubkey) -> u64 {
        match self.holder_record(holder) {
            Ok(Some(record)) => record.ticket_count,
            _ => 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::{tests::new_state, Phase};
    use std::collections::BTreeMap;

    /// In-memory ticket book
    #[derive(Default)]
    pub(crate) struct MemoryTicketBook {
        pub(crate) owners: BTreeMap<u64, Pubkey>,
    }

    impl Mintable for MemoryTicketBook {
        fn mint(&mut self, ticket: &Ticket) -> Result<(), ProgramError> {
            if self.owners.insert(ticket.id, ticket.holder).is_some() {
                return Err(ProgramError::AccountAlreadyInitialized);
            }
            Ok(())
        }
    }

    impl Balanced for MemoryTicketBook {
        fn balance_of(&self, holder: &Pubkey) -> u64 {
            self.owners.values().filter(|owner| *owner == holder).count() as u64
        }
    }

    pub(crate) fn open_state(admin: Pubkey) -> LotteryState {
        let mut state = new_state(admin);
        state.start_lottery(&admin, 1_000, 1_060).unwrap();
        state
    }

    #[test]
    fn entries_fill_participants_pot_and_ticket_book() {
        let admin = Pubkey::new_unique();
        let mut state = open_state(admin);
        let mut book = MemoryTicketBook::default();
        let price = state.ticket_price();
        let entrants: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();

        for (n, entrant) in entrants.iter().enumerate() {
            let ticket = state.enter_lottery(entrant, price, 1_010).unwrap();
            assert_eq!(ticket.id, n as u64);
            book.mint(&ticket).unwrap();
        }

        assert_eq!(state.participants(), entrants.as_slice());
        assert_eq!(state.get_balance(), 5 * price);
        for entrant in &entrants {
            assert_eq!(book.balance_of(entrant), 1);
        }
    }

    #[test]
    fn repeated_entries_weigh_the_same_identity_more() {
        let admin = Pubkey::new_unique();
        let mut state = open_state(admin);
        let mut book = MemoryTicketBook::default();
        let entrant = Pubkey::new_unique();
        let price = state.ticket_price();

        for _ in 0..3 {
            let ticket = state.enter_lottery(&entrant, price, 1_010).unwrap();
            book.mint(&ticket).unwrap();
        }

        assert_eq!(state.participants(), &[entrant, entrant, entrant]);
        assert_eq!(book.balance_of(&entrant), 3);
    }

    #[test]
    fn entry_outside_the_window_changes_nothing() {
        let admin = Pubkey::new_unique();
        let mut state = new_state(admin);
        let entrant = Pubkey::new_unique();
        let price = state.ticket_price();

        let err = state.enter_lottery(&entrant, price, 1_010).unwrap_err();
        assert_eq!(err, LotteryError::NotOpen);
        assert_eq!(err.kind(), ErrorKind::Phase);

        state.start_lottery(&admin, 1_000, 1_060).unwrap();
        let snapshot = state.clone();
        assert_eq!(state.enter_lottery(&entrant, price, 999), Err(LotteryError::NotOpen));
        assert_eq!(state.enter_lottery(&entrant, price, 1_061), Err(LotteryError::NotOpen));
        assert_eq!(state, snapshot);
    }

    #[test]
    fn underpayment_changes_nothing() {
        let admin = Pubkey::new_unique();
        let mut state = open_state(admin);
        let snapshot = state.clone();

        let err = state
            .enter_lottery(&Pubkey::new_unique(), state.ticket_price() - 1, 1_010)
            .unwrap_err();
        assert_eq!(err, LotteryError::InsufficientPayment);
        assert_eq!(err.kind(), ErrorKind::Fund);
        assert_eq!(state, snapshot);
    }

    #[test]
    fn overpayment_is_kept_in_the_pot() {
        let admin = Pubkey::new_unique();
        let mut state = open_state(admin);
        let price = state.ticket_price();

        state.enter_lottery(&Pubkey::new_unique(), price + 5, 1_010).unwrap();
        assert_eq!(state.get_balance(), price + 5);
    }

    #[test]
    fn participants_are_capped() {
        let admin = Pubkey::new_unique();
        let mut state = open_state(admin);
        let price = state.ticket_price();
        state.participants = vec![Pubkey::new_unique(); MAX_PARTICIPANTS];

        assert_eq!(
            state.enter_lottery(&Pubkey::new_unique(), price, 1_010),
            Err(LotteryError::LotteryFull)
        );
        assert_eq!(state.phase, Phase::Open);
    }

    #[test]
    fn ticket_and_holder_accounts_pack() {
        let ticket = TicketAccount {
            is_initialized: true,
            lottery: Pubkey::new_unique(),
            id: 4,
            holder: Pubkey::new_unique(),
            run: 2,
            minted_at: 1_700_000_000,
        };
        let mut data = vec![0u8; TicketAccount::LEN];
        TicketAccount::pack(ticket, &mut data).unwrap();
        assert_eq!(TicketAccount::unpack(&data).unwrap(), ticket);

        let holder = HolderAccount {
            is_initialized: true,
            lottery: ticket.lottery,
            holder: ticket.holder,
            ticket_count: 3,
        };
        let mut data = vec![0u8; HolderAccount::LEN];
        HolderAccount::pack(holder, &mut data).unwrap();
        assert_eq!(HolderAccount::unpack(&data).unwrap(), holder);
    }
}
