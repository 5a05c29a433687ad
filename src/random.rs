// Winner selection for the two drawings.
//
// The production seed comes from the SlotHashes sysvar and the clock. A block
// producer can observe or influence both, so outcomes are not unpredictable
// against a motivated leader.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo, clock::Clock, hash::hashv, msg, program_error::ProgramError,
    sysvar::slot_hashes,
};

/// Which drawing a seed or a prize belongs to
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Draw {
    Surprise,
    Final,
}

impl Draw {
    fn tag(self) -> u8 {
        match self {
            Draw::Surprise => 0,
            Draw::Final => 1,
        }
    }
}

/// Source of the 32 seed bytes a drawing selects its winner from.
pub trait EntropySource {
    fn seed(&self, draw: Draw, run: u64) -> [u8; 32];
}

/// Maps a seed onto `[0, len)`. `len` must be non-zero.
pub fn select_index(seed: &[u8; 32], len: usize) -> usize {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&seed[0..8]);
    let random_value = u64::from_le_bytes(bytes);

    (random_value % len as u64) as usize
}

/// Seed derived from the most recent slot hash and the clock.
pub struct SlotHashEntropy {
    recent_hash: [u8; 32],
    slot: u64,
    unix_timestamp: i64,
}

impl SlotHashEntropy {
    /// Reads the newest entry of the SlotHashes sysvar without deserializing the whole list.
    pub fn from_sysvar(
        slot_hashes_info: &AccountInfo,
        clock: &Clock,
    ) -> Result<Self, ProgramError> {
        if !slot_hashes::check_id(slot_hashes_info.key) {
            msg!("Expected the SlotHashes sysvar");
            return Err(ProgramError::InvalidArgument);
        }

        let data = slot_hashes_info.data.borrow();
        // u64 entry count, then (slot: u64, hash: [u8; 32]) entries, newest first
        let newest = data.get(16..48).ok_or(ProgramError::InvalidAccountData)?;
        let mut recent_hash = [0u8; 32];
        recent_hash.copy_from_slice(newest);

        Ok(Self {
            recent_hash,
            slot: clock.slot,
            unix_timestamp: clock.unix_timestamp,
        })
    }
}

impl EntropySource for SlotHashEntropy {
    fn seed(&self, draw: Draw, run: u64) -> [u8; 32] {
        hashv(&[
            &self.recent_hash,
            &self.slot.to_le_bytes(),
            &self.unix_timestamp.to_le_bytes(),
            &run.to_le_bytes(),
            &[draw.tag()],
        ])
        .to_bytes()
    }
}

/// Deterministic seed: the value itself lands in the bytes `select_index` reads,
/// so `SeededEntropy(n)` picks index `n % len`.
#[cfg(test)]
pub struct SeededEntropy(pub u64);

#[cfg(test)]
impl EntropySource for SeededEntropy {
    fn seed(&self, _draw: Draw, _run: u64) -> [u8; 32] {
        let mut seed = [0u8; 32];
        seed[0..8].copy_from_slice(&self.0.to_le_bytes());
        seed
    }
}
