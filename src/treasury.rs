use solana_program::{
    account_info::AccountInfo, clock::UnixTimestamp, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    error::LotteryError,
    random::{select_index, Draw, EntropySource},
    state::LotteryState,
};

/// A prize moving out of the pot. Drawings record one, `claim_prize` transfers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub draw: Draw,
    pub recipient: Pubkey,
    pub amount: u64,
}

impl LotteryState {
    /// Awards half of the pot (rounded down) to a participant drawn from the current run.
    /// Runs at most once per run, inside the open window. The prize stays in the lottery
    /// account until it is claimed.
    pub fn award_surprise_winner<E: EntropySource>(
        &mut self,
        entropy: &E,
        now: UnixTimestamp,
    ) -> Result<Payout, LotteryError> {
        self.ensure_no_payout_in_progress()?;
        if !self.is_open_at(now) {
            return Err(LotteryError::NotOpen);
        }
        if self.surprise_winner.is_some() {
            return Err(LotteryError::SurpriseAlreadyAwarded);
        }
        if self.participants.is_empty() {
            return Err(LotteryError::NoParticipants);
        }

        let winner = self.draw_participant(entropy, Draw::Surprise);
        let amount = self.pot / 2;

        self.pot -= amount;
        self.surprise_winner = Some(winner);
        self.surprise_prize = amount;
        self.surprise_unclaimed = amount;

        msg!("Surprise winner {} awarded {} lamports", winner, amount);
        Ok(Payout {
            draw: Draw::Surprise,
            recipient: winner,
            amount,
        })
    }

    /// Releases the unclaimed prize of `draw` to its recorded winner and raises the
    /// transfer guard. `recipient` must be that winner.
    pub fn claim_prize(&mut self, draw: Draw, recipient: &Pubkey) -> Result<Payout, LotteryError> {
        self.ensure_no_payout_in_progress()?;
        let (winner, unclaimed) = match draw {
            Draw::Surprise => (self.surprise_winner, &mut self.surprise_unclaimed),
            Draw::Final => (self.lottery_winner, &mut self.lottery_unclaimed),
        };
        let winner = match winner {
            Some(winner) if *unclaimed > 0 => winner,
            _ => return Err(LotteryError::NothingToClaim),
        };
        if winner != *recipient {
            return Err(LotteryError::WrongPrizeRecipient);
        }

        let amount = *unclaimed;
        *unclaimed = 0;
        self.payout_in_progress = true;

        msg!("{:?} prize of {} lamports released to {}", draw, amount, winner);
        Ok(Payout {
            draw,
            recipient: winner,
            amount,
        })
    }

    /// Whether either prize of the current run still waits for its transfer.
    pub fn has_unclaimed_prize(&self) -> bool {
        self.surprise_unclaimed > 0 || self.lottery_unclaimed > 0
    }

    /// Clears the transfer guard once the lamports of a payout have moved.
    pub fn settle_payout(&mut self) {
        self.payout_in_progress = false;
    }

    pub(crate) fn draw_participant<E: EntropySource>(&self, entropy: &E, draw: Draw) -> Pubkey {
        let seed = entropy.seed(draw, self.run);
        let index = select_index(&seed, self.participants.len());
        msg!("Drawn participant index {} of {}", index, self.participants.len());
        self.participants[index]
    }
}

/// Moves `amount` lamports out of the program-owned lottery account.
pub fn transfer_out(
    lottery_info: &AccountInfo,
    recipient_info: &AccountInfo,
    amount: u64,
) -> Result<(), ProgramError> {
    if amount == 0 {
        return Ok(());
    }

    let remaining = lottery_info
        .lamports()
        .checked_sub(amount)
        .ok_or(LotteryError::Overflow)?;
    let credited = recipient_info
        .lamports()
        .checked_add(amount)
        .ok_or(LotteryError::Overflow)?;

    **lottery_info.lamports.borrow_mut() = remaining;
    **recipient_info.lamports.borrow_mut() = credited;

    msg!("Transferred {} lamports to {}", amount, recipient_info.key);
    Ok(())
}
