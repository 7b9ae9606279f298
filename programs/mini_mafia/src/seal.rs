//! Seed commitment and per-owner masking of roles and detective findings.
//!
//! Each stored byte is XORed with a mask derived from the seal key and the owning
//! player. The seal key lives in the same account and follows from the seed opened by
//! `start`, so anyone who reads the account or that transaction can unmask every role.
//! The masks only keep raw role codes out of the layout. What a player may see is
//! decided by the match queries (`role_view`, `inspections_for`, `public_state`).

use anchor_lang::prelude::*;

use crate::errors::MafiaError;
use crate::roles::Role;

const SEAL_CONTEXT: &str = "mini-mafia 2024-06-01 role seal v1";

const PURPOSE_ROLE: u8 = 0;
const PURPOSE_FINDING: u8 = 1;

/// BLAKE3 hash the host publishes at match creation and opens at start.
pub fn seed_commitment(seed: &[u8; 32]) -> [u8; 32] {
    *blake3::hash(seed).as_bytes()
}

pub fn verify_seed(seed: &[u8; 32], commitment: &[u8; 32]) -> Result<()> {
    require!(
        blake3::hash(seed) == blake3::Hash::from(*commitment),
        MafiaError::InvalidCommitment
    );
    Ok(())
}

pub fn seal_key(seed: &[u8; 32], match_id: u64) -> [u8; 32] {
    let mut material = [0u8; 40];
    material[..32].copy_from_slice(seed);
    material[32..].copy_from_slice(&match_id.to_le_bytes());
    blake3::derive_key(SEAL_CONTEXT, &material)
}

fn mask(key: &[u8; 32], owner: &Pubkey, purpose: u8, round: u16) -> u8 {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(owner.as_ref());
    hasher.update(&[purpose]);
    hasher.update(&round.to_le_bytes());
    hasher.finalize().as_bytes()[0]
}

pub fn seal_role(key: &[u8; 32], owner: &Pubkey, role: Role) -> u8 {
    role.code() ^ mask(key, owner, PURPOSE_ROLE, 0)
}

pub fn unseal_role(key: &[u8; 32], owner: &Pubkey, sealed: u8) -> Result<Role> {
    Role::from_code(sealed ^ mask(key, owner, PURPOSE_ROLE, 0))
        .ok_or_else(|| MafiaError::AccountingBroken.into())
}

/// Seals whether an inspected target is mafia-aligned, for the inspector only.
pub fn seal_finding(key: &[u8; 32], inspector: &Pubkey, round: u16, is_mafia: bool) -> u8 {
    (is_mafia as u8) ^ mask(key, inspector, PURPOSE_FINDING, round)
}

pub fn unseal_finding(key: &[u8; 32], inspector: &Pubkey, round: u16, sealed: u8) -> Result<bool> {
    match sealed ^ mask(key, inspector, PURPOSE_FINDING, round) {
        0 => Ok(false),
        1 => Ok(true),
        _ => err!(MafiaError::AccountingBroken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_opens_only_with_its_seed() {
        let seed = [7u8; 32];
        let commitment = seed_commitment(&seed);
        assert!(verify_seed(&seed, &commitment).is_ok());
        assert!(verify_seed(&[8u8; 32], &commitment).is_err());
    }

    #[test]
    fn test_roles_unseal_per_owner() {
        let key = seal_key(&[1u8; 32], 4);
        let alice = Pubkey::new_unique();
        for role in [Role::Villager, Role::Mafia, Role::Detective, Role::Doctor] {
            let sealed = seal_role(&key, &alice, role);
            assert_eq!(unseal_role(&key, &alice, sealed).unwrap(), role);
        }
        // Masks are per owner, so equal roles do not produce equal bytes across the roster.
        let masks: Vec<u8> = (0..16)
            .map(|_| seal_role(&key, &Pubkey::new_unique(), Role::Villager))
            .collect();
        assert!(masks.iter().any(|m| *m != masks[0]));
    }

    #[test]
    fn test_seal_key_depends_on_match() {
        assert_ne!(seal_key(&[1u8; 32], 1), seal_key(&[1u8; 32], 2));
    }

    #[test]
    fn test_findings_roundtrip_per_round() {
        let key = seal_key(&[3u8; 32], 9);
        let detective = Pubkey::new_unique();
        let sealed = seal_finding(&key, &detective, 2, true);
        assert!(unseal_finding(&key, &detective, 2, sealed).unwrap());
        let sealed = seal_finding(&key, &detective, 3, false);
        assert!(!unseal_finding(&key, &detective, 3, sealed).unwrap());
    }
}
