//! Validated entry surface of a match.
//!
//! Every request is checked in full before anything is written, so a rejection leaves
//! the match exactly as it was. Player requests are checked in this order: concluded,
//! registered, alive, replayed action id, phase, role capability, target.

use anchor_lang::prelude::*;

use crate::errors::MafiaError;
use crate::events::{EventLog, TransitionKind};
use crate::roles::{self, Alignment, NightActionKind, Role, RoleSlot};
use crate::seal;
use crate::state::{
    Ballot, InspectionView, Match, NightAction, Outcome, Phase, PlayerSlot, PublicState,
    RosterEntry, TallyEntry, VoteKind,
};
use crate::tally;
use crate::MIN_PLAYERS;

impl Match {
    fn authorize_player(&self, caller: &Pubkey, action_id: u64) -> Result<usize> {
        self.ensure(self.phase != Phase::Ended, MafiaError::GameConcluded)?;
        let idx = self
            .index_of(caller)
            .ok_or_else(|| self.reject(MafiaError::NotFound))?;
        let player = &self.players[idx];
        self.ensure(player.alive, MafiaError::NotAuthorized)?;
        self.ensure(action_id > player.last_action_id, MafiaError::DuplicateAction)?;
        Ok(idx)
    }

    fn authorize_host(&self, caller: &Pubkey, action_id: u64) -> Result<()> {
        self.ensure(self.phase != Phase::Ended, MafiaError::GameConcluded)?;
        self.ensure(*caller == self.authority, MafiaError::NotAuthorized)?;
        self.ensure(action_id > self.host_action_id, MafiaError::DuplicateAction)
    }

    fn expect_phase(&self, expected: Phase, required: Phase) -> Result<()> {
        self.ensure(
            expected == self.phase && self.phase == required,
            MafiaError::PhaseMismatch,
        )
    }

    fn live_target(&self, target: &Pubkey) -> Result<usize> {
        match self.index_of(target) {
            Some(idx) if self.is_alive(idx) => Ok(idx),
            _ => Err(self.reject(MafiaError::InvalidTarget)),
        }
    }

    fn mark_acted(&mut self, idx: usize, action_id: u64) {
        let player = &mut self.players[idx];
        player.acted = true;
        player.last_action_id = action_id;
    }

    pub fn register(&mut self, player: Pubkey, log: &mut EventLog) -> Result<PublicState> {
        self.ensure(self.phase != Phase::Ended, MafiaError::GameConcluded)?;
        self.ensure(self.phase == Phase::Lobby, MafiaError::PhaseMismatch)?;
        // The host knows the seed and therefore every role.
        self.ensure(player != self.authority, MafiaError::NotAuthorized)?;
        self.ensure(self.index_of(&player).is_none(), MafiaError::DuplicateAction)?;
        self.ensure(
            self.players.len() < self.config.max_players as usize,
            MafiaError::MatchFull,
        )?;
        let stake = self.config.stake_lamports;
        let pot = self
            .pot
            .checked_add(stake)
            .ok_or_else(|| self.reject(MafiaError::AccountingBroken))?;

        self.pot = pot;
        self.players.push(PlayerSlot {
            key: player,
            alive: true,
            acted: false,
            eliminated_round: 0,
            last_action_id: 0,
            stake_claimed: false,
        });
        self.record(log, TransitionKind::PlayerRegistered { player, stake });
        Ok(self.public_state())
    }

    /// Opens the committed seed, deals the roles and starts the first night.
    pub fn start(
        &mut self,
        caller: Pubkey,
        action_id: u64,
        distribution: &[RoleSlot],
        seed: [u8; 32],
        now_slot: u64,
        log: &mut EventLog,
    ) -> Result<PublicState> {
        self.authorize_host(&caller, action_id)?;
        self.ensure(!self.roles_assigned, MafiaError::AlreadyAssigned)?;
        self.ensure(self.phase == Phase::Lobby, MafiaError::PhaseMismatch)?;
        self.ensure(self.players.len() >= MIN_PLAYERS, MafiaError::NotEnoughPlayers)?;
        seal::verify_seed(&seed, &self.seed_commitment)
            .map_err(|_| self.reject(MafiaError::InvalidCommitment))?;
        let roles = roles::assign_roles(self.players.len(), distribution, &seed, self.match_id)
            .map_err(|_| self.reject(MafiaError::InvalidDistribution))?;

        let key = seal::seal_key(&seed, self.match_id);
        self.sealed_roles = self
            .players
            .iter()
            .zip(roles.iter())
            .map(|(player, role)| seal::seal_role(&key, &player.key, *role))
            .collect();
        self.seal_key = key;
        self.roles_assigned = true;
        self.host_action_id = action_id;
        self.round = 1;
        self.record(log, TransitionKind::RolesAssigned { players: self.players.len() as u8 });
        self.enter_phase(Phase::Night, now_slot, log);
        Ok(self.public_state())
    }

    /// Records a night action. `target: None` skips the action for this night.
    pub fn submit_night_action(
        &mut self,
        caller: Pubkey,
        action_id: u64,
        expected: Phase,
        kind: NightActionKind,
        target: Option<Pubkey>,
        now_slot: u64,
        log: &mut EventLog,
    ) -> Result<PublicState> {
        let idx = self.authorize_player(&caller, action_id)?;
        self.expect_phase(expected, Phase::Night)?;
        self.ensure(
            self.role_at(idx)?.night_action() == Some(kind),
            MafiaError::NotAuthorized,
        )?;
        let target = match target {
            Some(key) => Some(self.live_target(&key)?),
            None => None,
        };
        if let Some(t) = target {
            match kind {
                NightActionKind::Kill => self.ensure(
                    self.alignment_at(t)? != Alignment::Mafia,
                    MafiaError::InvalidTarget,
                )?,
                NightActionKind::Inspect => self.ensure(t != idx, MafiaError::InvalidTarget)?,
                NightActionKind::Protect => {}
            }
        }

        let (actor, round) = (idx as u8, self.round);
        match (kind, target) {
            (NightActionKind::Kill, Some(t)) => tally::cast(
                &mut self.ballots,
                Ballot { voter: actor, target: t as u8, round, kind: VoteKind::NightKill },
            ),
            (NightActionKind::Kill, None) => {
                tally::withdraw(&mut self.ballots, actor, round, VoteKind::NightKill)
            }
            (_, target) => {
                self.night_actions.retain(|a| a.actor != actor);
                if let Some(t) = target {
                    self.night_actions.push(NightAction { actor, kind, target: t as u8 });
                }
            }
        }
        self.mark_acted(idx, action_id);
        self.record(log, TransitionKind::NightActionRecorded);

        if self.night_complete()? {
            self.resolve_window(now_slot, log)?;
        }
        Ok(self.public_state())
    }

    /// Casts, replaces or (with `target: None`) withdraws a lynch vote.
    pub fn submit_vote(
        &mut self,
        caller: Pubkey,
        action_id: u64,
        expected: Phase,
        target: Option<Pubkey>,
        now_slot: u64,
        log: &mut EventLog,
    ) -> Result<PublicState> {
        let idx = self.authorize_player(&caller, action_id)?;
        self.expect_phase(expected, Phase::DayVote)?;
        let target = match target {
            Some(key) => Some(self.live_target(&key)?),
            None => None,
        };

        let (voter, round) = (idx as u8, self.round);
        match target {
            Some(t) => tally::cast(
                &mut self.ballots,
                Ballot { voter, target: t as u8, round, kind: VoteKind::DayLynch },
            ),
            None => tally::withdraw(&mut self.ballots, voter, round, VoteKind::DayLynch),
        }
        self.mark_acted(idx, action_id);
        let target = target.map(|t| self.players[t].key);
        self.record(log, TransitionKind::VoteRecorded { voter: caller, target });

        if self.day_vote_complete() {
            self.resolve_window(now_slot, log)?;
        }
        Ok(self.public_state())
    }

    /// Timeout escape: the host may close the current window at any time, a live
    /// player only once its deadline has passed.
    pub fn force_resolve(
        &mut self,
        caller: Pubkey,
        action_id: u64,
        expected: Phase,
        now_slot: u64,
        log: &mut EventLog,
    ) -> Result<PublicState> {
        self.ensure(self.phase != Phase::Ended, MafiaError::GameConcluded)?;
        let host = caller == self.authority;
        let player = if host {
            self.authorize_host(&caller, action_id)?;
            None
        } else {
            Some(self.authorize_player(&caller, action_id)?)
        };
        self.ensure(expected == self.phase, MafiaError::PhaseMismatch)?;
        self.ensure(
            matches!(self.phase, Phase::Night | Phase::DayDiscussion | Phase::DayVote),
            MafiaError::PhaseMismatch,
        )?;
        if !host {
            self.ensure(now_slot >= self.phase_deadline, MafiaError::PhaseStillOpen)?;
        }

        match player {
            Some(idx) => self.players[idx].last_action_id = action_id,
            None => self.host_action_id = action_id,
        }
        if self.phase == Phase::DayDiscussion {
            self.enter_phase(Phase::DayVote, now_slot, log);
        } else {
            self.resolve_window(now_slot, log)?;
        }
        Ok(self.public_state())
    }

    /// Cancels a match that never left the lobby. No roles exist yet, so nothing hidden
    /// can leak.
    pub fn abort(
        &mut self,
        caller: Pubkey,
        action_id: u64,
        now_slot: u64,
        log: &mut EventLog,
    ) -> Result<PublicState> {
        self.authorize_host(&caller, action_id)?;
        self.ensure(
            self.phase == Phase::Lobby && !self.roles_assigned,
            MafiaError::PhaseMismatch,
        )?;

        self.host_action_id = action_id;
        self.outcome = Outcome::Aborted;
        self.record(log, TransitionKind::MatchConcluded { outcome: Outcome::Aborted });
        self.enter_phase(Phase::Ended, now_slot, log);
        Ok(self.public_state())
    }

    /// Settles a player's share of the escrow once the match has ended: the stake back
    /// after an abort, the fixed winner share after a decided match. Returns lamports owed.
    pub fn claim_stake(&mut self, caller: Pubkey, log: &mut EventLog) -> Result<u64> {
        self.ensure(self.phase == Phase::Ended, MafiaError::PhaseMismatch)?;
        let idx = self
            .index_of(&caller)
            .ok_or_else(|| self.reject(MafiaError::NotFound))?;
        self.ensure(!self.players[idx].stake_claimed, MafiaError::NothingToClaim)?;
        let amount = match self.outcome.winners() {
            Some(winners) => {
                if self.alignment_at(idx)? == winners { self.payout_per_winner } else { 0 }
            }
            None => self.config.stake_lamports,
        };
        self.ensure(amount > 0, MafiaError::NothingToClaim)?;
        let pot = self
            .pot
            .checked_sub(amount)
            .ok_or_else(|| self.reject(MafiaError::AccountingBroken))?;

        self.pot = pot;
        self.players[idx].stake_claimed = true;
        self.record(log, TransitionKind::StakeClaimed { player: caller, amount });
        Ok(amount)
    }

    pub fn public_state(&self) -> PublicState {
        let day_tally: Vec<TallyEntry> = if self.phase == Phase::DayVote {
            tally::counts(&self.ballots, self.round, VoteKind::DayLynch, |v| {
                self.is_alive(v as usize)
            })
            .into_iter()
            .map(|(target, votes)| TallyEntry { target, votes })
            .collect()
        } else {
            Vec::new()
        };
        let revealed_roles = if self.outcome.winners().is_some() {
            (0..self.players.len()).filter_map(|i| self.role_at(i).ok()).collect()
        } else {
            Vec::new()
        };
        PublicState {
            match_id: self.match_id,
            phase: self.phase,
            round: self.round,
            outcome: self.outcome,
            version: self.version,
            phase_deadline: self.phase_deadline,
            roster: self
                .players
                .iter()
                .map(|p| RosterEntry { player: p.key, alive: p.alive })
                .collect(),
            ballots_cast: day_tally.iter().map(|t| t.votes).sum(),
            day_tally,
            revealed_roles,
        }
    }

    /// A player's own role, a fellow mafioso's role, or anyone's once the match is decided.
    pub fn role_view(&self, viewer: &Pubkey, target: &Pubkey) -> Result<Role> {
        self.ensure(self.roles_assigned, MafiaError::PhaseMismatch)?;
        let t = self
            .index_of(target)
            .ok_or_else(|| self.reject(MafiaError::NotFound))?;
        let role = self.role_at(t)?;
        if self.outcome.winners().is_some() {
            return Ok(role);
        }
        let v = self
            .index_of(viewer)
            .ok_or_else(|| self.reject(MafiaError::NotFound))?;
        let allowed = v == t
            || (self.alignment_at(v)? == Alignment::Mafia && role.alignment() == Alignment::Mafia);
        self.ensure(allowed, MafiaError::NotAuthorized)?;
        Ok(role)
    }

    /// The viewer's own detective findings.
    pub fn inspections_for(&self, viewer: &Pubkey) -> Result<Vec<InspectionView>> {
        let v = self
            .index_of(viewer)
            .ok_or_else(|| self.reject(MafiaError::NotFound))?;
        self.inspections
            .iter()
            .filter(|i| i.inspector as usize == v)
            .map(|i| -> Result<InspectionView> {
                let target = self
                    .players
                    .get(i.target as usize)
                    .ok_or_else(|| self.reject(MafiaError::NotFound))?;
                let is_mafia = seal::unseal_finding(&self.seal_key, viewer, i.round, i.finding)
                    .map_err(|_| self.reject(MafiaError::AccountingBroken))?;
                Ok(InspectionView { target: target.key, round: i.round, is_mafia })
            })
            .collect()
    }
}
