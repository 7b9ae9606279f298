use anchor_lang::prelude::*;

use crate::errors::MafiaError;

/// Domain separation for the shuffle stream. Changing it changes every assignment.
const SHUFFLE_CONTEXT: &str = "mini-mafia 2024-06-01 role shuffle v1";

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Villager,
    Mafia,
    Detective,
    Doctor,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Village,
    Mafia,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NightActionKind {
    Kill,
    Inspect,
    Protect,
}

impl Role {
    pub const COUNT: usize = 4;

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Role::Villager),
            1 => Some(Role::Mafia),
            2 => Some(Role::Detective),
            3 => Some(Role::Doctor),
            _ => None,
        }
    }

    pub fn alignment(self) -> Alignment {
        match self {
            Role::Mafia => Alignment::Mafia,
            Role::Villager | Role::Detective | Role::Doctor => Alignment::Village,
        }
    }

    /// The one night action this role may take, if any.
    pub fn night_action(self) -> Option<NightActionKind> {
        match self {
            Role::Mafia => Some(NightActionKind::Kill),
            Role::Detective => Some(NightActionKind::Inspect),
            Role::Doctor => Some(NightActionKind::Protect),
            Role::Villager => None,
        }
    }
}

/// One entry of a declared distribution: `count` players get role `role` (a role code).
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleSlot {
    pub role: u8,
    pub count: u8,
}

/// Expands a distribution into its role multiset, sorted by role code so the listing
/// order of the entries never influences the shuffle.
pub fn expand_distribution(distribution: &[RoleSlot], players: usize) -> Result<Vec<Role>> {
    let mut seen = [false; Role::COUNT];
    let mut total: usize = 0;
    for slot in distribution {
        let role = Role::from_code(slot.role).ok_or(MafiaError::InvalidDistribution)?;
        require!(!seen[role as usize], MafiaError::InvalidDistribution);
        seen[role as usize] = true;
        total += slot.count as usize;
    }
    require!(total == players, MafiaError::InvalidDistribution);

    let mut roles = Vec::with_capacity(players);
    for slot in distribution {
        if let Some(role) = Role::from_code(slot.role) {
            roles.extend(std::iter::repeat(role).take(slot.count as usize));
        }
    }
    roles.sort();

    let mafia = roles.iter().filter(|r| r.alignment() == Alignment::Mafia).count();
    require!(mafia >= 1, MafiaError::InvalidDistribution);
    require!(mafia < players - mafia, MafiaError::InvalidDistribution);
    Ok(roles)
}

/// Deterministic index stream: BLAKE3 XOF in derive-key mode over (seed, match_id).
struct ShuffleStream(blake3::OutputReader);

impl ShuffleStream {
    fn new(seed: &[u8; 32], match_id: u64) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(SHUFFLE_CONTEXT);
        hasher.update(seed);
        hasher.update(&match_id.to_le_bytes());
        Self(hasher.finalize_xof())
    }

    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.fill(&mut buf);
        u32::from_le_bytes(buf)
    }

    /// Uniform draw in `0..bound`; rejects the biased tail.
    fn below(&mut self, bound: u32) -> u32 {
        let zone = (u32::MAX / bound) * bound;
        loop {
            let v = self.next_u32();
            if v < zone {
                return v % bound;
            }
        }
    }
}

/// Assigns one role per registered player, in registration order.
///
/// The result is a Fisher-Yates permutation of the declared multiset, fully determined
/// by `seed` and `match_id`.
pub fn assign_roles(
    players: usize,
    distribution: &[RoleSlot],
    seed: &[u8; 32],
    match_id: u64,
) -> Result<Vec<Role>> {
    let mut roles = expand_distribution(distribution, players)?;
    let mut stream = ShuffleStream::new(seed, match_id);
    for i in (1..roles.len()).rev() {
        let j = stream.below(i as u32 + 1) as usize;
        roles.swap(i, j);
    }
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(n: u64) -> [u8; 32] {
        let mut s = [0u8; 32];
        s[..8].copy_from_slice(&n.to_le_bytes());
        s
    }

    fn dist(entries: &[(Role, u8)]) -> Vec<RoleSlot> {
        entries
            .iter()
            .map(|(role, count)| RoleSlot { role: role.code(), count: *count })
            .collect()
    }

    fn count(roles: &[Role], role: Role) -> usize {
        roles.iter().filter(|r| **r == role).count()
    }

    #[test]
    fn test_assignment_matches_declared_counts() {
        let d = dist(&[
            (Role::Villager, 4),
            (Role::Mafia, 2),
            (Role::Detective, 1),
            (Role::Doctor, 1),
        ]);
        for n in 0..32 {
            let roles = assign_roles(8, &d, &seed(n), 7).unwrap();
            assert_eq!(roles.len(), 8);
            assert_eq!(count(&roles, Role::Villager), 4);
            assert_eq!(count(&roles, Role::Mafia), 2);
            assert_eq!(count(&roles, Role::Detective), 1);
            assert_eq!(count(&roles, Role::Doctor), 1);
        }
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let d = dist(&[(Role::Mafia, 1), (Role::Villager, 4)]);
        let a = assign_roles(5, &d, &seed(42), 1).unwrap();
        let b = assign_roles(5, &d, &seed(42), 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_entry_order_does_not_change_assignment() {
        let a = assign_roles(5, &dist(&[(Role::Mafia, 1), (Role::Villager, 4)]), &seed(9), 3).unwrap();
        let b = assign_roles(5, &dist(&[(Role::Villager, 4), (Role::Mafia, 1)]), &seed(9), 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mafia_reaches_every_seat() {
        let d = dist(&[(Role::Mafia, 1), (Role::Villager, 4)]);
        let mut seats = [false; 5];
        for n in 0..64 {
            let roles = assign_roles(5, &d, &seed(n), 1).unwrap();
            let seat = roles.iter().position(|r| *r == Role::Mafia).unwrap();
            seats[seat] = true;
        }
        assert!(seats.iter().all(|s| *s));
    }

    #[test]
    fn test_match_id_changes_the_stream() {
        let d = dist(&[(Role::Mafia, 2), (Role::Villager, 6)]);
        let distinct = (0..16)
            .map(|id| assign_roles(8, &d, &seed(42), id).unwrap())
            .collect::<Vec<_>>();
        assert!(distinct.iter().any(|r| *r != distinct[0]));
    }

    #[test]
    fn test_rejects_wrong_total() {
        let d = dist(&[(Role::Mafia, 1), (Role::Detective, 1), (Role::Villager, 4)]);
        assert!(assign_roles(5, &d, &seed(42), 1).is_err());
    }

    #[test]
    fn test_rejects_unknown_role_code() {
        let d = vec![RoleSlot { role: 1, count: 1 }, RoleSlot { role: 9, count: 4 }];
        assert!(expand_distribution(&d, 5).is_err());
    }

    #[test]
    fn test_rejects_duplicate_entries() {
        let d = dist(&[(Role::Mafia, 1), (Role::Villager, 2), (Role::Villager, 2)]);
        assert!(expand_distribution(&d, 5).is_err());
    }

    #[test]
    fn test_rejects_mafia_majority_or_none() {
        assert!(expand_distribution(&dist(&[(Role::Villager, 5)]), 5).is_err());
        assert!(expand_distribution(&dist(&[(Role::Mafia, 2), (Role::Villager, 2)]), 4).is_err());
        assert!(expand_distribution(&dist(&[(Role::Mafia, 2), (Role::Villager, 3)]), 5).is_ok());
    }

    #[test]
    fn test_capabilities() {
        assert_eq!(Role::Mafia.night_action(), Some(NightActionKind::Kill));
        assert_eq!(Role::Detective.night_action(), Some(NightActionKind::Inspect));
        assert_eq!(Role::Doctor.night_action(), Some(NightActionKind::Protect));
        assert_eq!(Role::Villager.night_action(), None);
        assert_eq!(Role::Doctor.alignment(), Alignment::Village);
        for code in 0..Role::COUNT as u8 {
            assert_eq!(Role::from_code(code).map(Role::code), Some(code));
        }
    }
}
