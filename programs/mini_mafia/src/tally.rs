//! Ballot ledger for one voting window.
//!
//! One ballot per (voter, round, kind): a newer ballot replaces the older one.
//! Resolution is a strict plurality; ties and empty ledgers eliminate nobody.

use crate::state::{Ballot, VoteKind};

pub fn cast(ledger: &mut Vec<Ballot>, ballot: Ballot) {
    match ledger
        .iter_mut()
        .find(|b| b.voter == ballot.voter && b.round == ballot.round && b.kind == ballot.kind)
    {
        Some(existing) => existing.target = ballot.target,
        None => ledger.push(ballot),
    }
}

pub fn withdraw(ledger: &mut Vec<Ballot>, voter: u8, round: u16, kind: VoteKind) {
    ledger.retain(|b| !(b.voter == voter && b.round == round && b.kind == kind));
}

/// Votes per target, ascending by target index. Ballots of dead voters are skipped.
pub fn counts(
    ledger: &[Ballot],
    round: u16,
    kind: VoteKind,
    live_voter: impl Fn(u8) -> bool,
) -> Vec<(u8, u8)> {
    let mut counts: Vec<(u8, u8)> = Vec::new();
    for ballot in ledger
        .iter()
        .filter(|b| b.round == round && b.kind == kind && live_voter(b.voter))
    {
        match counts.iter_mut().find(|(target, _)| *target == ballot.target) {
            Some((_, votes)) => *votes += 1,
            None => counts.push((ballot.target, 1)),
        }
    }
    counts.sort_by_key(|(target, _)| *target);
    counts
}

pub fn plurality(
    ledger: &[Ballot],
    round: u16,
    kind: VoteKind,
    live_voter: impl Fn(u8) -> bool,
) -> Option<u8> {
    let counts = counts(ledger, round, kind, live_voter);
    let top = counts.iter().map(|(_, votes)| *votes).max()?;
    let mut leaders = counts.iter().filter(|(_, votes)| *votes == top);
    let (winner, _) = leaders.next()?;
    match leaders.next() {
        Some(_) => None,
        None => Some(*winner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(voter: u8, target: u8) -> Ballot {
        Ballot { voter, target, round: 1, kind: VoteKind::DayLynch }
    }

    fn everyone(_: u8) -> bool {
        true
    }

    #[test]
    fn test_later_ballot_replaces_earlier() {
        let mut ledger = Vec::new();
        cast(&mut ledger, day(0, 2));
        cast(&mut ledger, day(0, 3));
        assert_eq!(ledger.len(), 1);
        assert_eq!(counts(&ledger, 1, VoteKind::DayLynch, everyone), vec![(3, 1)]);
    }

    #[test]
    fn test_windows_are_separate() {
        let mut ledger = Vec::new();
        cast(&mut ledger, day(0, 2));
        cast(&mut ledger, Ballot { voter: 0, target: 4, round: 1, kind: VoteKind::NightKill });
        cast(&mut ledger, Ballot { voter: 0, target: 5, round: 2, kind: VoteKind::DayLynch });
        assert_eq!(ledger.len(), 3);
        assert_eq!(plurality(&ledger, 1, VoteKind::DayLynch, everyone), Some(2));
        assert_eq!(plurality(&ledger, 1, VoteKind::NightKill, everyone), Some(4));
    }

    #[test]
    fn test_strict_plurality_wins() {
        let ledger = vec![day(0, 4), day(1, 4), day(2, 4), day(4, 1)];
        assert_eq!(plurality(&ledger, 1, VoteKind::DayLynch, everyone), Some(4));
    }

    #[test]
    fn test_tie_eliminates_nobody() {
        let ledger = vec![day(0, 1), day(1, 0), day(2, 3), day(3, 2)];
        assert_eq!(plurality(&ledger, 1, VoteKind::DayLynch, everyone), None);
    }

    #[test]
    fn test_empty_ledger_eliminates_nobody() {
        assert_eq!(plurality(&[], 1, VoteKind::DayLynch, everyone), None);
    }

    #[test]
    fn test_dead_voters_do_not_count() {
        let ledger = vec![day(0, 1), day(2, 3), day(4, 3)];
        assert_eq!(plurality(&ledger, 1, VoteKind::DayLynch, |v| v != 2 && v != 4), Some(1));
    }

    #[test]
    fn test_withdraw_is_an_abstention() {
        let mut ledger = vec![day(0, 1), day(1, 1)];
        withdraw(&mut ledger, 0, 1, VoteKind::DayLynch);
        assert_eq!(counts(&ledger, 1, VoteKind::DayLynch, everyone), vec![(1, 1)]);
    }
}
