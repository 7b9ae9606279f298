use anchor_lang::prelude::*;

use crate::errors::MafiaError;
use crate::events::{EventLog, TransitionKind};
use crate::roles::{Alignment, Role};
use crate::seal;
use crate::state::{Match, Outcome};

/// Win check over the roles still alive. Mafia elimination is checked first, so the
/// two wins can never be reported together.
pub fn evaluate(alive: impl IntoIterator<Item = Role>) -> Outcome {
    let (mut mafia, mut village) = (0usize, 0usize);
    for role in alive {
        match role.alignment() {
            Alignment::Mafia => mafia += 1,
            Alignment::Village => village += 1,
        }
    }
    if mafia == 0 {
        Outcome::VillageWin
    } else if village == 0 {
        Outcome::MafiaWin
    } else {
        Outcome::Pending
    }
}

impl Match {
    pub fn role_at(&self, idx: usize) -> Result<Role> {
        let (player, sealed) = self
            .players
            .get(idx)
            .zip(self.sealed_roles.get(idx))
            .ok_or_else(|| self.reject(MafiaError::NotFound))?;
        seal::unseal_role(&self.seal_key, &player.key, *sealed)
            .map_err(|_| self.reject(MafiaError::AccountingBroken))
    }

    pub fn alignment_at(&self, idx: usize) -> Result<Alignment> {
        Ok(self.role_at(idx)?.alignment())
    }

    /// Decides the match if a faction is wiped out. A decided or aborted match keeps
    /// its outcome and nothing is touched.
    pub fn evaluate_outcome(&mut self, log: &mut EventLog) -> Result<Outcome> {
        if self.outcome != Outcome::Pending {
            return Ok(self.outcome);
        }
        let mut alive = Vec::with_capacity(self.players.len());
        for idx in (0..self.players.len()).filter(|i| self.is_alive(*i)) {
            alive.push(self.role_at(idx)?);
        }
        let outcome = evaluate(alive);
        if let Some(winners) = outcome.winners() {
            let mut count = 0u64;
            for idx in 0..self.players.len() {
                if self.alignment_at(idx)? == winners {
                    count += 1;
                }
            }
            self.payout_per_winner = self
                .pot
                .checked_div(count)
                .ok_or_else(|| self.reject(MafiaError::AccountingBroken))?;
            self.outcome = outcome;
            self.record(log, TransitionKind::MatchConcluded { outcome });
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MatchConfig, PlayerSlot};

    fn dealt(roles: &[Role]) -> Match {
        let config = MatchConfig {
            max_players: 8,
            stake_lamports: 0,
            night_slots: 150,
            discussion_slots: 300,
            vote_slots: 150,
        };
        let mut game = Match::new(Pubkey::new_unique(), 3, config, [0u8; 32], 255);
        game.seal_key = seal::seal_key(&[9u8; 32], 3);
        for role in roles {
            let key = Pubkey::new_unique();
            game.players.push(PlayerSlot {
                key,
                alive: true,
                acted: false,
                eliminated_round: 0,
                last_action_id: 0,
                stake_claimed: false,
            });
            game.sealed_roles.push(seal::seal_role(&game.seal_key, &key, *role));
        }
        game.roles_assigned = true;
        game
    }

    fn error_name(err: Error) -> String {
        match err {
            Error::AnchorError(e) => e.error_name.clone(),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_role_lookup_failures_are_typed() {
        let mut game = dealt(&[Role::Mafia, Role::Villager, Role::Villager]);
        assert_eq!(game.role_at(0).unwrap(), Role::Mafia);
        assert_eq!(error_name(game.role_at(3).unwrap_err()), "NotFound");

        // A byte that unmasks to no role code.
        let mask = game.sealed_roles[1] ^ Role::Villager.code();
        game.sealed_roles[1] = mask ^ 0xff;
        assert_eq!(error_name(game.role_at(1).unwrap_err()), "AccountingBroken");
    }

    #[test]
    fn test_decision_fixes_the_payout() {
        let mut game = dealt(&[Role::Mafia, Role::Villager, Role::Doctor]);
        game.pot = 3_001;
        game.players[0].alive = false;
        let mut log = EventLog::default();
        assert_eq!(game.evaluate_outcome(&mut log).unwrap(), Outcome::VillageWin);
        assert_eq!(game.payout_per_winner, 1_500);
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_no_mafia_left_is_a_village_win() {
        assert_eq!(evaluate([Role::Villager, Role::Doctor]), Outcome::VillageWin);
    }

    #[test]
    fn test_no_village_left_is_a_mafia_win() {
        assert_eq!(evaluate([Role::Mafia, Role::Mafia]), Outcome::MafiaWin);
    }

    #[test]
    fn test_mixed_roster_is_pending() {
        assert_eq!(evaluate([Role::Mafia, Role::Detective]), Outcome::Pending);
    }

    #[test]
    fn test_wins_are_exclusive() {
        // An empty roster cannot happen in play, but must still yield a single answer.
        assert_eq!(evaluate(Vec::<Role>::new()), Outcome::VillageWin);
    }
}
