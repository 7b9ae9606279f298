use anchor_lang::prelude::*;

#[error_code]
pub enum MafiaError {
    #[msg("Role distribution does not match the roster")]
    InvalidDistribution,
    #[msg("Roles have already been assigned for this match")]
    AlreadyAssigned,
    #[msg("Request is tagged for a different phase")]
    PhaseMismatch,
    #[msg("Match has concluded")]
    GameConcluded,
    #[msg("Target is not a live player or not allowed for this action")]
    InvalidTarget,
    #[msg("Caller is not allowed to perform this action")]
    NotAuthorized,
    #[msg("Action id was already applied")]
    DuplicateAction,
    #[msg("Unknown player or match")]
    NotFound,
    #[msg("Match is full")]
    MatchFull,
    #[msg("Not enough players to start the match")]
    NotEnoughPlayers,
    #[msg("Seed does not match the committed hash")]
    InvalidCommitment,
    #[msg("Invalid match config")]
    InvalidConfig,
    #[msg("Program is paused")]
    ProgramPaused,
    #[msg("Nothing to claim")]
    NothingToClaim,
    #[msg("Accounting invariant violated")]
    AccountingBroken,
    #[msg("Phase deadline has not passed")]
    PhaseStillOpen,
}
