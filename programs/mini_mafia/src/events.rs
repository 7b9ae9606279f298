use anchor_lang::prelude::*;

use crate::state::{Outcome, Phase, VoteKind};

/// What a transition did. Night-time entries never name the actor or the target.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    PlayerRegistered { player: Pubkey, stake: u64 },
    RolesAssigned { players: u8 },
    PhaseChanged { from: Phase, to: Phase },
    VoteRecorded { voter: Pubkey, target: Option<Pubkey> },
    NightActionRecorded,
    Eliminated { player: Pubkey, by: VoteKind },
    NoElimination { by: VoteKind },
    MatchConcluded { outcome: Outcome },
    StakeClaimed { player: Pubkey, amount: u64 },
}

#[event]
#[derive(Clone, Debug)]
pub struct MatchTransition {
    pub match_id: u64,
    pub seq:      u64,
    pub round:    u16,
    pub phase:    Phase,
    pub kind:     TransitionKind,
}

/// Transitions produced by one request, emitted once the request succeeds.
#[derive(Default)]
pub struct EventLog {
    events: Vec<MatchTransition>,
}

impl EventLog {
    pub fn push(&mut self, event: MatchTransition) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[MatchTransition] {
        &self.events
    }

    pub fn emit_all(self) {
        for event in self.events {
            emit!(event);
        }
    }
}
