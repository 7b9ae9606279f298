use anchor_lang::prelude::*;

use crate::errors::MafiaError;
use crate::events::{EventLog, TransitionKind};
use crate::roles::{Alignment, NightActionKind};
use crate::seal;
use crate::state::{Inspection, Match, Outcome, Phase, VoteKind};
use crate::tally;

impl Match {
    /// Moves into `to`, clearing what the new window starts without and stamping its
    /// deadline. Timed phases end at `now_slot + window`; others carry no deadline.
    pub(crate) fn enter_phase(&mut self, to: Phase, now_slot: u64, log: &mut EventLog) {
        let from = self.phase;
        match to {
            Phase::Night => {
                self.ballots.clear();
                self.night_actions.clear();
                self.reset_acted();
            }
            Phase::DayVote => {
                self.ballots.clear();
                self.reset_acted();
            }
            Phase::Lobby | Phase::DayDiscussion | Phase::Resolution | Phase::Ended => {}
        }
        self.phase = to;
        self.phase_deadline = self
            .config
            .phase_slots(to)
            .map_or(0, |slots| now_slot.saturating_add(slots));
        self.record(log, TransitionKind::PhaseChanged { from, to });
    }

    fn reset_acted(&mut self) {
        for player in self.players.iter_mut() {
            player.acted = false;
        }
    }

    /// Every live player holding a night role has acted.
    pub(crate) fn night_complete(&self) -> Result<bool> {
        for (idx, player) in self.players.iter().enumerate() {
            if player.alive && !player.acted && self.role_at(idx)?.night_action().is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn day_vote_complete(&self) -> bool {
        self.players.iter().all(|p| !p.alive || p.acted)
    }

    /// Closes the open Night or DayVote window: applies its effects, runs the win
    /// check and opens the next phase. Only the day resolution advances the round.
    pub(crate) fn resolve_window(&mut self, now_slot: u64, log: &mut EventLog) -> Result<()> {
        let closing = self.phase;
        self.ensure(
            matches!(closing, Phase::Night | Phase::DayVote),
            MafiaError::PhaseMismatch,
        )?;
        let next_round = self
            .round
            .checked_add(1)
            .ok_or_else(|| self.reject(MafiaError::AccountingBroken))?;

        self.enter_phase(Phase::Resolution, now_slot, log);
        if closing == Phase::Night {
            self.resolve_night(log)?;
        } else {
            self.resolve_day(log)?;
        }

        if self.evaluate_outcome(log)? != Outcome::Pending {
            self.enter_phase(Phase::Ended, now_slot, log);
        } else if closing == Phase::Night {
            self.enter_phase(Phase::DayDiscussion, now_slot, log);
        } else {
            self.round = next_round;
            self.enter_phase(Phase::Night, now_slot, log);
        }
        Ok(())
    }

    fn live_voter(&self) -> impl Fn(u8) -> bool + '_ {
        move |voter| self.is_alive(voter as usize)
    }

    fn is_protected(&self, target: u8) -> bool {
        self.night_actions.iter().any(|a| {
            a.kind == NightActionKind::Protect && a.target == target && self.is_alive(a.actor as usize)
        })
    }

    // Findings are taken before the kill lands, so a detective killed tonight still
    // gets tonight's answer.
    fn resolve_night(&mut self, log: &mut EventLog) -> Result<()> {
        let round = self.round;

        let mut findings = Vec::new();
        for action in self.night_actions.iter().filter(|a| {
            a.kind == NightActionKind::Inspect && self.is_alive(a.actor as usize)
        }) {
            let inspector = self
                .players
                .get(action.actor as usize)
                .ok_or_else(|| self.reject(MafiaError::NotFound))?;
            let is_mafia = self.alignment_at(action.target as usize)? == Alignment::Mafia;
            findings.push(Inspection {
                inspector: action.actor,
                target: action.target,
                round,
                finding: seal::seal_finding(&self.seal_key, &inspector.key, round, is_mafia),
            });
        }
        for finding in findings {
            self.inspections.retain(|i| i.inspector != finding.inspector);
            self.inspections.push(finding);
        }

        let kill = tally::plurality(&self.ballots, round, VoteKind::NightKill, self.live_voter());
        match kill {
            Some(target) if !self.is_protected(target) => {
                self.eliminate(target as usize, VoteKind::NightKill, log)
            }
            _ => {
                self.record(log, TransitionKind::NoElimination { by: VoteKind::NightKill });
                Ok(())
            }
        }
    }

    fn resolve_day(&mut self, log: &mut EventLog) -> Result<()> {
        let lynch = tally::plurality(&self.ballots, self.round, VoteKind::DayLynch, self.live_voter());
        match lynch {
            Some(target) => self.eliminate(target as usize, VoteKind::DayLynch, log),
            None => {
                self.record(log, TransitionKind::NoElimination { by: VoteKind::DayLynch });
                Ok(())
            }
        }
    }

    fn eliminate(&mut self, idx: usize, by: VoteKind, log: &mut EventLog) -> Result<()> {
        let round = self.round;
        self.ensure(idx < self.players.len(), MafiaError::NotFound)?;
        let player = &mut self.players[idx];
        player.alive = false;
        player.eliminated_round = round;
        let key = player.key;
        msg!("eliminated {} in round {}", key, round);
        self.record(log, TransitionKind::Eliminated { player: key, by });
        Ok(())
    }
}
