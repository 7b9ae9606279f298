use anchor_lang::prelude::*;

use crate::errors::MafiaError;
use crate::events::{EventLog, MatchTransition, TransitionKind};
use crate::roles::{Alignment, NightActionKind, Role};
use crate::{MAX_PHASE_SLOTS, MAX_PLAYERS, MIN_PHASE_SLOTS, MIN_PLAYERS};

// ── Registry PDA ── seeds: ["registry"]
#[account]
pub struct Registry {
    pub authority:     Pubkey, // 32
    pub paused:        bool,   // 1
    pub next_match_id: u64,    // 8
    pub bump:          u8,     // 1
}
impl Registry {
    pub const LEN: usize = 32 + 1 + 8 + 1;

    /// Pausing stops new matches and registrations; running matches carry on.
    pub fn ensure_open(&self) -> Result<()> {
        require!(!self.paused, MafiaError::ProgramPaused);
        Ok(())
    }

    /// Hands out the next match id and advances the counter.
    pub fn take_match_id(&mut self) -> Result<u64> {
        self.ensure_open()?;
        let id = self.next_match_id;
        self.next_match_id = id.checked_add(1).ok_or(MafiaError::AccountingBroken)?;
        Ok(id)
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Night,
    DayDiscussion,
    DayVote,
    Resolution,
    Ended,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    MafiaWin,
    VillageWin,
    /// Cancelled from the lobby, before any role existed.
    Aborted,
}

impl Outcome {
    pub fn winners(self) -> Option<Alignment> {
        match self {
            Outcome::MafiaWin => Some(Alignment::Mafia),
            Outcome::VillageWin => Some(Alignment::Village),
            Outcome::Pending | Outcome::Aborted => None,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteKind {
    NightKill,
    DayLynch,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchConfig {
    pub max_players:      u8,  // 1
    /// Lamports each player escrows on registration; 0 disables staking.
    pub stake_lamports:   u64, // 8
    pub night_slots:      u64, // 8
    pub discussion_slots: u64, // 8
    pub vote_slots:       u64, // 8
}

impl MatchConfig {
    pub const LEN: usize = 1 + 8 + 8 + 8 + 8;

    pub fn validate(&self) -> Result<()> {
        let players = self.max_players as usize;
        require!(players >= MIN_PLAYERS && players <= MAX_PLAYERS, MafiaError::InvalidConfig);
        for slots in [self.night_slots, self.discussion_slots, self.vote_slots] {
            require!(
                (MIN_PHASE_SLOTS..=MAX_PHASE_SLOTS).contains(&slots),
                MafiaError::InvalidConfig
            );
        }
        Ok(())
    }

    /// Timeout window for a timed phase; untimed phases get none.
    pub fn phase_slots(&self, phase: Phase) -> Option<u64> {
        match phase {
            Phase::Night => Some(self.night_slots),
            Phase::DayDiscussion => Some(self.discussion_slots),
            Phase::DayVote => Some(self.vote_slots),
            Phase::Lobby | Phase::Resolution | Phase::Ended => None,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerSlot {
    pub key:              Pubkey, // 32
    pub alive:            bool,   // 1
    pub acted:            bool,   // 1
    /// Round in which the player was eliminated, 0 while alive.
    pub eliminated_round: u16,    // 2
    pub last_action_id:   u64,    // 8
    pub stake_claimed:    bool,   // 1
}
impl PlayerSlot { pub const LEN: usize = 32 + 1 + 1 + 2 + 8 + 1; }

/// A vote in the current window. Indices point into `Match::players`.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub voter:  u8,       // 1
    pub target: u8,       // 1
    pub round:  u16,      // 2
    pub kind:   VoteKind, // 1
}
impl Ballot { pub const LEN: usize = 1 + 1 + 2 + 1; }

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct NightAction {
    pub actor:  u8,              // 1
    pub kind:   NightActionKind, // 1
    pub target: u8,              // 1
}
impl NightAction { pub const LEN: usize = 1 + 1 + 1; }

/// Latest detective finding per inspector; `finding` is sealed.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inspection {
    pub inspector: u8,  // 1
    pub target:    u8,  // 1
    pub round:     u16, // 2
    pub finding:   u8,  // 1
}
impl Inspection { pub const LEN: usize = 1 + 1 + 2 + 1; }

// ── Match PDA ── seeds: ["match", match_id (u64 LE)]
#[account]
pub struct Match {
    pub authority:         Pubkey,           // 32
    pub match_id:          u64,              // 8
    pub config:            MatchConfig,      // 33
    pub phase:             Phase,            // 1
    pub round:             u16,              // 2
    pub outcome:           Outcome,          // 1
    pub seed_commitment:   [u8; 32],         // 32
    /// Unmasks `sealed_roles` and `inspections`; not a secret once `start` ran.
    pub seal_key:          [u8; 32],         // 32
    pub roles_assigned:    bool,             // 1
    pub phase_deadline:    u64,              // 8
    /// Sequence number of the last emitted transition.
    pub version:           u64,              // 8
    pub host_action_id:    u64,              // 8
    pub pot:               u64,              // 8
    pub payout_per_winner: u64,              // 8
    pub bump:              u8,               // 1
    pub players:           Vec<PlayerSlot>,  // 4 + 45 * MAX_PLAYERS
    pub sealed_roles:      Vec<u8>,          // 4 + MAX_PLAYERS
    pub ballots:           Vec<Ballot>,      // 4 + 5 * MAX_PLAYERS
    pub night_actions:     Vec<NightAction>, // 4 + 3 * MAX_PLAYERS
    pub inspections:       Vec<Inspection>,  // 4 + 5 * MAX_PLAYERS
}

impl Match {
    pub const LEN: usize = 32 + 8 + MatchConfig::LEN + 1 + 2 + 1 + 32 + 32 + 1 + 8 + 8 + 8 + 8 + 8 + 1
        + (4 + PlayerSlot::LEN * MAX_PLAYERS)
        + (4 + MAX_PLAYERS)
        + (4 + Ballot::LEN * MAX_PLAYERS)
        + (4 + NightAction::LEN * MAX_PLAYERS)
        + (4 + Inspection::LEN * MAX_PLAYERS);

    pub fn new(
        authority: Pubkey,
        match_id: u64,
        config: MatchConfig,
        seed_commitment: [u8; 32],
        bump: u8,
    ) -> Self {
        Self {
            authority,
            match_id,
            config,
            phase: Phase::Lobby,
            round: 0,
            outcome: Outcome::Pending,
            seed_commitment,
            seal_key: [0u8; 32],
            roles_assigned: false,
            phase_deadline: 0,
            version: 0,
            host_action_id: 0,
            pot: 0,
            payout_per_winner: 0,
            bump,
            players: Vec::with_capacity(MAX_PLAYERS),
            sealed_roles: Vec::new(),
            ballots: Vec::new(),
            night_actions: Vec::new(),
            inspections: Vec::new(),
        }
    }

    pub fn index_of(&self, key: &Pubkey) -> Option<usize> {
        self.players.iter().position(|p| p.key == *key)
    }

    pub fn is_alive(&self, idx: usize) -> bool {
        self.players.get(idx).map_or(false, |p| p.alive)
    }

    /// Appends one audit event, bumping the version.
    pub(crate) fn record(&mut self, log: &mut EventLog, kind: TransitionKind) {
        self.version += 1;
        log.push(MatchTransition {
            match_id: self.match_id,
            seq: self.version,
            round: self.round,
            phase: self.phase,
            kind,
        });
    }

    /// Logs the phase and round with the rejection so clients can react to it.
    pub(crate) fn reject(&self, error: MafiaError) -> Error {
        msg!("rejected: {} (phase {:?}, round {})", error, self.phase, self.round);
        error.into()
    }

    pub(crate) fn ensure(&self, invariant: bool, error: MafiaError) -> Result<()> {
        if invariant {
            Ok(())
        } else {
            Err(self.reject(error))
        }
    }
}

/// What any observer may see of a match.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicState {
    pub match_id:       u64,
    pub phase:          Phase,
    pub round:          u16,
    pub outcome:        Outcome,
    pub version:        u64,
    pub phase_deadline: u64,
    pub roster:         Vec<RosterEntry>,
    /// Ballots cast in the open day vote; zero outside DayVote.
    pub ballots_cast:   u8,
    pub day_tally:      Vec<TallyEntry>,
    /// Every role in roster order, once the outcome is decided.
    pub revealed_roles: Vec<Role>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub player: Pubkey,
    pub alive:  bool,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TallyEntry {
    /// Roster index of the target.
    pub target: u8,
    pub votes:  u8,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InspectionView {
    pub target:   Pubkey,
    pub round:    u16,
    pub is_mafia: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MatchConfig {
        MatchConfig {
            max_players: 8,
            stake_lamports: 0,
            night_slots: 150,
            discussion_slots: 300,
            vote_slots: 150,
        }
    }

    #[test]
    fn test_full_match_fits_allocation() {
        let mut game = Match::new(Pubkey::new_unique(), 1, config(), [0u8; 32], 255);
        for i in 0..MAX_PLAYERS {
            game.players.push(PlayerSlot {
                key: Pubkey::new_unique(),
                alive: true,
                acted: true,
                eliminated_round: 0,
                last_action_id: u64::MAX,
                stake_claimed: false,
            });
            game.sealed_roles.push(0);
            game.ballots.push(Ballot { voter: i as u8, target: 0, round: 1, kind: VoteKind::DayLynch });
            game.night_actions.push(NightAction { actor: i as u8, kind: NightActionKind::Protect, target: 0 });
            game.inspections.push(Inspection { inspector: i as u8, target: 0, round: 1, finding: 0 });
        }
        let bytes = game.try_to_vec().unwrap();
        assert_eq!(bytes.len(), Match::LEN);
    }

    #[test]
    fn test_config_bounds() {
        assert!(config().validate().is_ok());
        assert!(MatchConfig { max_players: 2, ..config() }.validate().is_err());
        assert!(MatchConfig { max_players: MAX_PLAYERS as u8 + 1, ..config() }.validate().is_err());
        assert!(MatchConfig { vote_slots: 0, ..config() }.validate().is_err());
        assert!(MatchConfig { night_slots: MAX_PHASE_SLOTS + 1, ..config() }.validate().is_err());
    }

    fn registry() -> Registry {
        Registry { authority: Pubkey::new_unique(), paused: false, next_match_id: 0, bump: 255 }
    }

    #[test]
    fn test_match_ids_increase_by_one() {
        let mut registry = registry();
        assert_eq!(registry.take_match_id().unwrap(), 0);
        assert_eq!(registry.take_match_id().unwrap(), 1);
        assert_eq!(registry.take_match_id().unwrap(), 2);
        assert_eq!(registry.next_match_id, 3);
    }

    #[test]
    fn test_paused_registry_hands_out_nothing() {
        let mut registry = Registry { paused: true, next_match_id: 7, ..registry() };
        let err = |e: Error| match e {
            Error::AnchorError(e) => e.error_name.clone(),
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(err(registry.ensure_open().unwrap_err()), "ProgramPaused");
        assert_eq!(err(registry.take_match_id().unwrap_err()), "ProgramPaused");
        assert_eq!(registry.next_match_id, 7);

        registry.paused = false;
        assert_eq!(registry.take_match_id().unwrap(), 7);
    }

    #[test]
    fn test_exhausted_id_counter_is_rejected() {
        let mut registry = Registry { next_match_id: u64::MAX, ..registry() };
        assert!(registry.take_match_id().is_err());
        assert_eq!(registry.next_match_id, u64::MAX);
    }

    #[test]
    fn test_registry_len_matches_layout() {
        let registry = Registry { authority: Pubkey::new_unique(), paused: false, next_match_id: 3, bump: 1 };
        assert_eq!(registry.try_to_vec().unwrap().len(), Registry::LEN);
    }
}
