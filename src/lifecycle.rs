use solana_program::{clock::UnixTimestamp, msg, pubkey::Pubkey};

use crate::{
    access::Ownable,
    error::LotteryError,
    random::{Draw, EntropySource},
    state::{LotteryState, Phase},
    treasury::Payout,
};

impl LotteryState {
    /// Schedules a run over `[start_at, end_at]`.
    ///
    /// From `NotStarted` or `Closed` this begins a new run: the run counter moves on and
    /// the participant list, both winners and both prizes are cleared. Tickets are never
    /// cleared. A closed run must have both prizes claimed first. While `Open`, the window
    /// may only be rescheduled before the first entry.
    pub fn start_lottery(
        &mut self,
        caller: &Pubkey,
        start_at: UnixTimestamp,
        end_at: UnixTimestamp,
    ) -> Result<(), LotteryError> {
        self.only_owner(caller)?;
        self.ensure_no_payout_in_progress()?;
        if start_at == 0 {
            return Err(LotteryError::ZeroStartTime);
        }
        if end_at <= start_at {
            return Err(LotteryError::EndBeforeStart);
        }

        match self.phase {
            Phase::Open => {
                if !self.participants.is_empty() {
                    return Err(LotteryError::RunInProgress);
                }
                msg!("Run {} rescheduled", self.run);
            }
            Phase::NotStarted | Phase::Closed => {
                if self.has_unclaimed_prize() {
                    return Err(LotteryError::PrizeUnclaimed);
                }
                self.run = self.run.checked_add(1).ok_or(LotteryError::Overflow)?;
                self.participants.clear();
                self.surprise_winner = None;
                self.lottery_winner = None;
                self.surprise_prize = 0;
                self.lottery_prize = 0;
                msg!("Run {} started", self.run);
            }
        }

        self.start_at = start_at;
        self.end_at = end_at;
        self.phase = Phase::Open;
        msg!("Lottery window: {} - {}", start_at, end_at);
        Ok(())
    }

    /// Closes the run once its window has elapsed, awarding the whole remaining pot to a
    /// participant drawn independently of the surprise drawing. The prize stays in the
    /// lottery account until it is claimed.
    ///
    /// A run without participants closes without a winner and returns no payout.
    pub fn end_lottery<E: EntropySource>(
        &mut self,
        entropy: &E,
        now: UnixTimestamp,
    ) -> Result<Option<Payout>, LotteryError> {
        self.ensure_no_payout_in_progress()?;
        if self.phase != Phase::Open {
            return Err(LotteryError::NoRunInProgress);
        }
        if now <= self.end_at {
            return Err(LotteryError::NotFinished);
        }

        self.phase = Phase::Closed;
        if self.participants.is_empty() {
            msg!("Run {} closed without participants", self.run);
            return Ok(None);
        }

        let winner = self.draw_participant(entropy, Draw::Final);
        let amount = self.pot;

        self.pot = 0;
        self.lottery_winner = Some(winner);
        self.lottery_prize = amount;
        self.lottery_unclaimed = amount;

        msg!("Run {} closed, lottery winner {} awarded {} lamports", self.run, winner, amount);
        Ok(Some(Payout {
            draw: Draw::Final,
            recipient: winner,
            amount,
        }))
    }
}
