use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
    pubkey::Pubkey,
};
use thiserror::Error;

/// Which family a rejection belongs to. Every `LotteryError` maps to exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad price, bad timing parameters or malformed input
    Validation,
    /// Caller lacks the required identity
    Authorization,
    /// Operation attempted outside its lifecycle phase
    Phase,
    /// Payment or arithmetic on funds
    Fund,
}

/// Errors that may be returned by the lottery program
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    /// Lottery account was already initialized
    #[error("Lottery: already initialized")]
    AlreadyInitialized,

    /// Lottery account holds no lottery state
    #[error("Lottery: not initialized")]
    NotInitialized,

    /// Collection name or symbol is empty or too long
    #[error("Lottery: invalid collection identity")]
    InvalidCollectionIdentity,

    /// Ticket price must be positive
    #[error("Lottery: ticket price == 0")]
    ZeroTicketPrice,

    /// Start of the window must be set
    #[error("Lottery: start time == 0")]
    ZeroStartTime,

    /// Window must end after it starts
    #[error("Lottery: end time should be after the start time")]
    EndBeforeStart,

    /// The participant list of the run is at capacity
    #[error("Lottery: participant capacity reached")]
    LotteryFull,

    /// Prize recipient account is not the recorded winner
    #[error("Lottery: recipient is not the prize winner")]
    WrongPrizeRecipient,

    /// Persisted state was written by a newer logic revision
    #[error("Lottery: state layout is newer than this logic")]
    LayoutTooNew,

    /// Commit attempted without a newer program deployment
    #[error("Lottery: no new logic deployed since the last upgrade")]
    NoNewLogic,

    /// Caller is not the required identity
    #[error("Lottery: account {caller} is missing role {required}")]
    Unauthorized { caller: Pubkey, required: Pubkey },

    /// Entry or drawing outside the open window
    #[error("Lottery: the lottery is not open")]
    NotOpen,

    /// Drawing attempted with an empty participant list
    #[error("Lottery: no participants in the lottery")]
    NoParticipants,

    /// Surprise drawing already ran for this run
    #[error("Lottery: surprise winner already awarded")]
    SurpriseAlreadyAwarded,

    /// Final drawing attempted before the window elapsed
    #[error("Lottery: the lottery time is not finished")]
    NotFinished,

    /// Final drawing already ran, or no run was ever started
    #[error("Lottery: no lottery run in progress")]
    NoRunInProgress,

    /// Run already holds entries
    #[error("Lottery: a lottery run is in progress")]
    RunInProgress,

    /// An outbound transfer has not settled
    #[error("Lottery: payout in progress")]
    PayoutInProgress,

    /// A new run cannot start while a prize of the last one is owed
    #[error("Lottery: a prize of the last run is unclaimed")]
    PrizeUnclaimed,

    /// Payment below the ticket price
    #[error("Lottery: payment < ticket price")]
    InsufficientPayment,

    /// Arithmetic on balances overflowed
    #[error("Lottery: balance overflow")]
    Overflow,

    /// No prize is owed for the requested drawing
    #[error("Lottery: nothing to claim")]
    NothingToClaim,
}

impl LotteryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyInitialized
            | Self::NotInitialized
            | Self::InvalidCollectionIdentity
            | Self::ZeroTicketPrice
            | Self::ZeroStartTime
            | Self::EndBeforeStart
            | Self::LotteryFull
            | Self::WrongPrizeRecipient
            | Self::LayoutTooNew
            | Self::NoNewLogic => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::NotOpen
            | Self::NoParticipants
            | Self::SurpriseAlreadyAwarded
            | Self::NotFinished
            | Self::NoRunInProgress
            | Self::RunInProgress
            | Self::PayoutInProgress
            | Self::PrizeUnclaimed => ErrorKind::Phase,
            Self::InsufficientPayment | Self::Overflow | Self::NothingToClaim => ErrorKind::Fund,
        }
    }

    /// Stable custom error code surfaced through `ProgramError::Custom`.
    pub fn code(&self) -> u32 {
        match self {
            Self::AlreadyInitialized => 0,
            Self::NotInitialized => 1,
            Self::InvalidCollectionIdentity => 2,
            Self::ZeroTicketPrice => 3,
            Self::ZeroStartTime => 4,
            Self::EndBeforeStart => 5,
            Self::LotteryFull => 6,
            Self::WrongPrizeRecipient => 7,
            Self::LayoutTooNew => 8,
            Self::NoNewLogic => 9,
            Self::Unauthorized { .. } => 100,
            Self::NotOpen => 200,
            Self::NoParticipants => 201,
            Self::SurpriseAlreadyAwarded => 202,
            Self::NotFinished => 203,
            Self::NoRunInProgress => 204,
            Self::RunInProgress => 205,
            Self::PayoutInProgress => 206,
            Self::PrizeUnclaimed => 207,
            Self::InsufficientPayment => 300,
            Self::Overflow => 301,
            Self::NothingToClaim => 302,
        }
    }
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for LotteryError {
    fn type_of() -> &'static str {
        "Lottery Error"
    }
}

impl PrintProgramError for LotteryError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
