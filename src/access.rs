use solana_program::{msg, pubkey::Pubkey};

use crate::{
    error::LotteryError,
    state::{LotteryState, Phase},
};

/// Single-identity authorization.
pub trait Ownable {
    fn owner(&self) -> &Pubkey;

    fn set_owner(&mut self, new_owner: Pubkey);

    /// Fails with `Unauthorized` unless `caller` is the owner.
    fn only_owner(&self, caller: &Pubkey) -> Result<(), LotteryError> {
        if caller != self.owner() {
            return Err(LotteryError::Unauthorized {
                caller: *caller,
                required: *self.owner(),
            });
        }
        Ok(())
    }

    /// Hands the owner role to `new_owner`; only the current owner may do so.
    fn transfer_ownership(
        &mut self,
        caller: &Pubkey,
        new_owner: Pubkey,
    ) -> Result<(), LotteryError> {
        self.only_owner(caller)?;
        self.set_owner(new_owner);
        Ok(())
    }
}

impl Ownable for LotteryState {
    fn owner(&self) -> &Pubkey {
        &self.admin
    }

    fn set_owner(&mut self, new_owner: Pubkey) {
        self.admin = new_owner;
    }
}

impl LotteryState {
    /// Administrator hand-off.
    pub fn transfer_admin(
        &mut self,
        caller: &Pubkey,
        new_admin: Pubkey,
    ) -> Result<(), LotteryError> {
        self.ensure_no_payout_in_progress()?;
        self.transfer_ownership(caller, new_admin)?;
        msg!("Administrator changed to {}", new_admin);
        Ok(())
    }

    /// Sets the price of the next entries. Refused once an open run holds entries.
    pub fn set_ticket_price(&mut self, caller: &Pubkey, price: u64) -> Result<(), LotteryError> {
        self.only_owner(caller)?;
        self.ensure_no_payout_in_progress()?;
        if price == 0 {
            return Err(LotteryError::ZeroTicketPrice);
        }
        if self.phase == Phase::Open && !self.participants.is_empty() {
            return Err(LotteryError::RunInProgress);
        }

        self.ticket_price = price;
        msg!("Ticket price updated to {} lamports", price);
        Ok(())
    }
}
