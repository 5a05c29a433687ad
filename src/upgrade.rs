// Persisted layout of the lottery account and the logic upgrade commit.
//
// The account starts with a header (discriminator, layout revision) followed by
// field groups in revision order. A group, once released, is never reordered,
// retyped or removed; later revisions only append groups. Older accounts read
// with defaults for the groups they lack and are rewritten at the current
// revision on their next store.
use arrayref::{array_ref, array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo, bpf_loader_upgradeable, msg, program_error::ProgramError,
    pubkey::Pubkey,
};
use std::convert::TryFrom;
use std::io::{self, Write};

use crate::{
    error::LotteryError,
    state::{LotteryState, Phase},
    utils,
};

pub const STATE_DISCRIMINATOR: [u8; 8] = *b"tktlotto";
/// Layout revision written by this logic
pub const LAYOUT_REVISION: u16 = 3;
pub const HEADER_LEN: usize = 8 + 2;

impl LotteryState {
    /// Decodes the lottery account, accepting every revision up to `LAYOUT_REVISION`.
    pub fn unpack_from_account(data: &[u8]) -> Result<Self, ProgramError> {
        let revision = Self::stored_revision(data)?;
        let mut body = &data[HEADER_LEN..];
        Self::read_fields(&mut body, revision).map_err(|err| {
            msg!("Failed to decode lottery state: {}", err);
            ProgramError::InvalidAccountData
        })
    }

    /// Encodes the state at the current revision.
    pub fn pack_into_account(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        self.pack_revision(data, LAYOUT_REVISION)
    }

    /// Layout revision of an initialized account.
    pub fn stored_revision(data: &[u8]) -> Result<u16, ProgramError> {
        if !Self::is_initialized_account(data) {
            return Err(LotteryError::NotInitialized.into());
        }
        let revision = u16::from_le_bytes([data[8], data[9]]);
        if revision == 0 {
            return Err(ProgramError::InvalidAccountData);
        }
        if revision > LAYOUT_REVISION {
            return Err(LotteryError::LayoutTooNew.into());
        }
        Ok(revision)
    }

    pub fn is_initialized_account(data: &[u8]) -> bool {
        data.len() >= HEADER_LEN && data[..8] == STATE_DISCRIMINATOR
    }

    pub(crate) fn pack_revision(&self, data: &mut [u8], revision: u16) -> Result<(), ProgramError> {
        let mut cursor: &mut [u8] = data;
        self.write_layout(&mut cursor, revision).map_err(|err| {
            msg!("Failed to encode lottery state: {}", err);
            ProgramError::AccountDataTooSmall
        })
    }

    fn write_layout<W: Write>(&self, writer: &mut W, revision: u16) -> io::Result<()> {
        writer.write_all(&STATE_DISCRIMINATOR)?;
        writer.write_all(&revision.to_le_bytes())?;
        self.write_revision_one(writer)?;
        if revision >= 2 {
            self.write_revision_two(writer)?;
        }
        if revision >= 3 {
            self.write_revision_three(writer)?;
        }
        Ok(())
    }

    fn write_revision_one<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.version.serialize(writer)?;
        self.admin.serialize(writer)?;
        self.name.serialize(writer)?;
        self.symbol.serialize(writer)?;
        self.ticket_price.serialize(writer)?;
        self.start_at.serialize(writer)?;
        self.end_at.serialize(writer)?;
        u8::from(self.phase).serialize(writer)?;
        self.run.serialize(writer)?;
        self.next_ticket_id.serialize(writer)?;
        self.pot.serialize(writer)?;
        self.participants.serialize(writer)?;
        self.surprise_winner.serialize(writer)?;
        self.lottery_winner.serialize(writer)?;
        self.last_deploy_slot.serialize(writer)?;
        self.payout_in_progress.serialize(writer)
    }

    fn write_revision_two<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.surprise_prize.serialize(writer)?;
        self.lottery_prize.serialize(writer)
    }

    fn write_revision_three<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.surprise_unclaimed.serialize(writer)?;
        self.lottery_unclaimed.serialize(writer)
    }

    fn read_fields(buf: &mut &[u8], revision: u16) -> io::Result<Self> {
        let version = u32::deserialize(buf)?;
        let admin = Pubkey::deserialize(buf)?;
        let name = String::deserialize(buf)?;
        let symbol = String::deserialize(buf)?;
        let ticket_price = u64::deserialize(buf)?;
        let start_at = i64::deserialize(buf)?;
        let end_at = i64::deserialize(buf)?;
        let phase = Phase::try_from(u8::deserialize(buf)?)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let run = u64::deserialize(buf)?;
        let next_ticket_id = u64::deserialize(buf)?;
        let pot = u64::deserialize(buf)?;
        let participants = Vec::<Pubkey>::deserialize(buf)?;
        let surprise_winner = Option::<Pubkey>::deserialize(buf)?;
        let lottery_winner = Option::<Pubkey>::deserialize(buf)?;
        let last_deploy_slot = u64::deserialize(buf)?;
        let payout_in_progress = bool::deserialize(buf)?;

        let (surprise_prize, lottery_prize) = if revision >= 2 {
            (u64::deserialize(buf)?, u64::deserialize(buf)?)
        } else {
            (0, 0)
        };
        let (surprise_unclaimed, lottery_unclaimed) = if revision >= 3 {
            (u64::deserialize(buf)?, u64::deserialize(buf)?)
        } else {
            (0, 0)
        };

        Ok(Self {
            version,
            admin,
            name,
            symbol,
            ticket_price,
            start_at,
            end_at,
            phase,
            run,
            next_ticket_id,
            pot,
            participants,
            surprise_winner,
            lottery_winner,
            last_deploy_slot,
            payout_in_progress,
            surprise_prize,
            lottery_prize,
            surprise_unclaimed,
            lottery_unclaimed,
        })
    }

    /// Records that the logic deployed at `program_data.slot` now runs this state.
    ///
    /// Only the program's upgrade authority may commit, and only once per deployment;
    /// each commit increments the version marker by one.
    pub fn commit_upgrade(
        &mut self,
        caller: &Pubkey,
        program_data: &ProgramDataInfo,
    ) -> Result<u32, LotteryError> {
        self.ensure_no_payout_in_progress()?;
        program_data.authorize(caller)?;
        if program_data.slot <= self.last_deploy_slot {
            return Err(LotteryError::NoNewLogic);
        }

        self.version = self.version.checked_add(1).ok_or(LotteryError::Overflow)?;
        self.last_deploy_slot = program_data.slot;
        msg!(
            "Upgrade committed: version {} deployed at slot {}",
            self.version,
            program_data.slot
        );
        Ok(self.version)
    }
}

/// The parts of the upgradeable loader's `ProgramData` account the lottery relies on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramDataInfo {
    /// Slot the current program binary was deployed at
    pub slot: u64,
    pub upgrade_authority: Option<Pubkey>,
}

impl ProgramDataInfo {
    /// Bincode tag of `UpgradeableLoaderState::ProgramData`
    const PROGRAM_DATA_TAG: u32 = 3;
    pub const METADATA_LEN: usize = 4 + 8 + 1 + 32;

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let src = data
            .get(..Self::METADATA_LEN)
            .ok_or(ProgramError::InvalidAccountData)?;
        let src = array_ref![src, 0, ProgramDataInfo::METADATA_LEN];
        let (tag, slot, has_authority, authority) = array_refs![src, 4, 8, 1, 32];

        if u32::from_le_bytes(*tag) != Self::PROGRAM_DATA_TAG {
            return Err(ProgramError::InvalidAccountData);
        }
        let upgrade_authority = match has_authority[0] {
            0 => None,
            1 => Some(Pubkey::new_from_array(*authority)),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Self {
            slot: u64::from_le_bytes(*slot),
            upgrade_authority,
        })
    }

    /// Reads the `ProgramData` account of `program_id`, checking its address and owner.
    pub fn from_account_info(
        program_id: &Pubkey,
        program_data_info: &AccountInfo,
    ) -> Result<Self, ProgramError> {
        let (expected, _) = utils::program_data_address(program_id);
        if *program_data_info.key != expected {
            msg!("Invalid program data account address");
            return Err(ProgramError::InvalidArgument);
        }
        if program_data_info.owner != &bpf_loader_upgradeable::id() {
            msg!("Program data account must be owned by the upgradeable loader");
            return Err(ProgramError::IncorrectProgramId);
        }
        Self::unpack(&program_data_info.data.borrow())
    }

    /// Fails unless `caller` is the upgrade authority. Immutable programs have none.
    pub fn authorize(&self, caller: &Pubkey) -> Result<(), LotteryError> {
        match self.upgrade_authority {
            Some(authority) if authority == *caller => Ok(()),
            Some(authority) => Err(LotteryError::Unauthorized {
                caller: *caller,
                required: authority,
            }),
            None => Err(LotteryError::Unauthorized {
                caller: *caller,
                required: Pubkey::default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededEntropy;
    use crate::registry::tests::open_state;
    use crate::state::{tests::new_state, LOTTERY_ACCOUNT_LEN, MAX_PARTICIPANTS};

    fn program_data(slot: u64, authority: Option<Pubkey>) -> ProgramDataInfo {
        ProgramDataInfo {
            slot,
            upgrade_authority: authority,
        }
    }

    fn busy_state() -> LotteryState {
        let admin = Pubkey::new_unique();
        let mut state = open_state(admin);
        for _ in 0..3 {
            state
                .enter_lottery(&Pubkey::new_unique(), state.ticket_price(), 1_010)
                .unwrap();
        }
        state.award_surprise_winner(&SeededEntropy(2), 1_020).unwrap();
        state
    }

    #[test]
    fn state_survives_the_account() {
        let state = busy_state();
        let mut data = vec![0u8; LOTTERY_ACCOUNT_LEN];

        state.pack_into_account(&mut data).unwrap();

        assert_eq!(LotteryState::stored_revision(&data).unwrap(), LAYOUT_REVISION);
        assert_eq!(LotteryState::unpack_from_account(&data).unwrap(), state);
    }

    #[test]
    fn full_participant_list_fits_the_account() {
        let mut state = new_state(Pubkey::new_unique());
        state.participants = vec![Pubkey::new_unique(); MAX_PARTICIPANTS];
        state.surprise_winner = Some(Pubkey::new_unique());
        state.lottery_winner = Some(Pubkey::new_unique());
        let mut data = vec![0u8; LOTTERY_ACCOUNT_LEN];

        state.pack_into_account(&mut data).unwrap();
    }

    #[test]
    fn shrinking_participants_leave_no_stale_reads() {
        let mut state = busy_state();
        let mut data = vec![0u8; LOTTERY_ACCOUNT_LEN];
        state.pack_into_account(&mut data).unwrap();

        state.participants.clear();
        state.surprise_prize = 17;
        state.pack_into_account(&mut data).unwrap();

        assert_eq!(LotteryState::unpack_from_account(&data).unwrap(), state);
    }

    #[test]
    fn revision_one_accounts_read_with_defaults() {
        let state = busy_state();
        assert_ne!(state.surprise_prize, 0);
        let mut old = vec![0u8; LOTTERY_ACCOUNT_LEN];
        state.pack_revision(&mut old, 1).unwrap();

        let migrated = LotteryState::unpack_from_account(&old).unwrap();
        assert_eq!(migrated.surprise_prize, 0);
        assert_eq!(migrated.lottery_prize, 0);
        assert_eq!(migrated.surprise_unclaimed, 0);
        assert_eq!(migrated.participants, state.participants);
        assert_eq!(migrated.pot, state.pot);
        assert_eq!(migrated.ticket_price, state.ticket_price);

        // Rewriting keeps every revision one byte in place
        let mut current = vec![0u8; LOTTERY_ACCOUNT_LEN];
        migrated.pack_into_account(&mut current).unwrap();
        let revision_one_len = {
            let mut sink = Vec::new();
            migrated.write_revision_one(&mut sink).unwrap();
            sink.len()
        };
        let body = HEADER_LEN..HEADER_LEN + revision_one_len;
        assert_eq!(old[body.clone()], current[body]);
        assert_eq!(LotteryState::stored_revision(&current).unwrap(), LAYOUT_REVISION);
    }

    #[test]
    fn revision_two_accounts_keep_their_prizes() {
        let state = busy_state();
        let mut old = vec![0u8; LOTTERY_ACCOUNT_LEN];
        state.pack_revision(&mut old, 2).unwrap();

        let migrated = LotteryState::unpack_from_account(&old).unwrap();
        assert_eq!(migrated.surprise_prize, state.surprise_prize);
        assert_eq!(migrated.surprise_unclaimed, 0);
        assert_eq!(migrated.lottery_unclaimed, 0);
    }

    #[test]
    fn newer_layouts_are_refused() {
        let state = new_state(Pubkey::new_unique());
        let mut data = vec![0u8; LOTTERY_ACCOUNT_LEN];
        state.pack_revision(&mut data, LAYOUT_REVISION + 1).unwrap();

        assert_eq!(
            LotteryState::unpack_from_account(&data),
            Err(LotteryError::LayoutTooNew.into())
        );
    }

    #[test]
    fn blank_accounts_are_not_initialized() {
        let data = vec![0u8; LOTTERY_ACCOUNT_LEN];
        assert!(!LotteryState::is_initialized_account(&data));
        assert_eq!(
            LotteryState::unpack_from_account(&data),
            Err(LotteryError::NotInitialized.into())
        );
    }

    #[test]
    fn commit_bumps_the_version_once_per_deployment() {
        let authority = Pubkey::new_unique();
        let mut state = busy_state();
        state.last_deploy_slot = 10;
        let before = state.clone();

        assert_eq!(state.get_version(), 1);
        assert_eq!(state.commit_upgrade(&authority, &program_data(11, Some(authority))), Ok(2));
        assert_eq!(state.get_version(), 2);
        assert_eq!(
            state.commit_upgrade(&authority, &program_data(11, Some(authority))),
            Err(LotteryError::NoNewLogic)
        );
        assert_eq!(state.get_version(), 2);

        assert_eq!(state.ticket_price, before.ticket_price);
        assert_eq!(state.participants, before.participants);
        assert_eq!(state.pot, before.pot);
    }

    #[test]
    fn only_the_upgrade_authority_commits() {
        let authority = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let mut state = new_state(Pubkey::new_unique());

        assert_eq!(
            state.commit_upgrade(&stranger, &program_data(100, Some(authority))),
            Err(LotteryError::Unauthorized {
                caller: stranger,
                required: authority
            })
        );
        assert!(state
            .commit_upgrade(&authority, &program_data(100, None))
            .is_err());
        assert_eq!(state.get_version(), 1);
    }

    #[test]
    fn program_data_metadata_is_decoded() {
        let authority = Pubkey::new_unique();
        let mut data = vec![0u8; ProgramDataInfo::METADATA_LEN + 16];
        data[0..4].copy_from_slice(&3u32.to_le_bytes());
        data[4..12].copy_from_slice(&77u64.to_le_bytes());
        data[12] = 1;
        data[13..45].copy_from_slice(authority.as_ref());

        assert_eq!(
            ProgramDataInfo::unpack(&data).unwrap(),
            program_data(77, Some(authority))
        );

        data[0] = 2;
        assert!(ProgramDataInfo::unpack(&data).is_err());
    }
}
