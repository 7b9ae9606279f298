use anchor_lang::prelude::*;
use anchor_lang::solana_program::program::invoke;
use anchor_lang::solana_program::system_instruction;

pub mod errors;
pub mod events;
pub mod gateway;
pub mod phase;
pub mod roles;
pub mod seal;
pub mod state;
pub mod tally;
pub mod win;

use errors::MafiaError;
use events::EventLog;
use roles::{NightActionKind, Role, RoleSlot};
use state::{InspectionView, Match, MatchConfig, Phase, PublicState, Registry};

declare_id!("6ELEMq8x5b7T9ztCEvwVXMVNnwoApZp4pPudt1XLLJHj");

// ── Roster limits ─────────────────────────────────────────────────────────
pub const MAX_PLAYERS: usize = 16; // bounds every Vec in the Match account
pub const MIN_PLAYERS: usize = 3;  // smallest table with a mafia minority

// ── Phase windows (slots, ~400ms each) ────────────────────────────────────
// A window only bounds how long a phase may stall: once it passes, any live
// player may force the phase to resolve. The host may do so at any time.
pub const MIN_PHASE_SLOTS: u64 = 10;      // ~4s
pub const MAX_PHASE_SLOTS: u64 = 216_000; // ~24h

// ── PDA seeds ─────────────────────────────────────────────────────────────
pub const REGISTRY_SEED: &[u8] = b"registry";
pub const MATCH_SEED:    &[u8] = b"match";

#[program]
pub mod mini_mafia {
    use super::*;

    // ── Initialize ────────────────────────────────────────────────
    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        ctx.accounts.registry.set_inner(Registry {
            authority:     ctx.accounts.authority.key(),
            paused:        false,
            next_match_id: 0,
            bump:          ctx.bumps.registry,
        });
        Ok(())
    }

    // ── Admin: Pause (blocks new matches and registrations) ───────
    pub fn set_paused(ctx: Context<AdminOnly>, paused: bool) -> Result<()> {
        ctx.accounts.registry.paused = paused;
        msg!("registry paused: {}", paused);
        Ok(())
    }

    // ── Create a match (host commits to the shuffle seed) ─────────
    pub fn create_match(
        ctx: Context<CreateMatch>,
        config:          MatchConfig,
        seed_commitment: [u8; 32], // blake3(seed), opened by `start`
    ) -> Result<()> {
        let match_id = ctx.accounts.registry.take_match_id()?;
        config.validate()?;
        ctx.accounts.game.set_inner(Match::new(
            ctx.accounts.host.key(),
            match_id,
            config,
            seed_commitment,
            ctx.bumps.game,
        ));
        msg!("match {} created by {}", match_id, ctx.accounts.host.key());
        Ok(())
    }

    // ── Register (escrows the stake into the match PDA) ───────────
    pub fn register(ctx: Context<Register>) -> Result<PublicState> {
        ctx.accounts.registry.ensure_open()?;
        let mut log = EventLog::default();
        let player = ctx.accounts.player.key();
        let state = ctx.accounts.game.register(player, &mut log)?;

        let stake = ctx.accounts.game.config.stake_lamports;
        if stake > 0 {
            let ix = system_instruction::transfer(&player, &ctx.accounts.game.key(), stake);
            invoke(&ix, &[
                ctx.accounts.player.to_account_info(),
                ctx.accounts.game.to_account_info(),
            ])?;
        }
        log.emit_all();
        Ok(state)
    }

    // ── Host: open the seed, deal roles, enter the first night ────
    pub fn start(
        ctx: Context<MatchAction>,
        action_id:    u64,
        distribution: Vec<RoleSlot>,
        seed:         [u8; 32],
    ) -> Result<PublicState> {
        let now = Clock::get()?.slot;
        let mut log = EventLog::default();
        let caller = ctx.accounts.caller.key();
        let state = ctx.accounts.game.start(caller, action_id, &distribution, seed, now, &mut log)?;
        log.emit_all();
        Ok(state)
    }

    pub fn submit_night_action(
        ctx: Context<MatchAction>,
        action_id:      u64,
        expected_phase: Phase,
        kind:           NightActionKind,
        target:         Option<Pubkey>, // None skips tonight's action
    ) -> Result<PublicState> {
        let now = Clock::get()?.slot;
        let mut log = EventLog::default();
        let caller = ctx.accounts.caller.key();
        let state = ctx.accounts.game.submit_night_action(
            caller, action_id, expected_phase, kind, target, now, &mut log,
        )?;
        log.emit_all();
        Ok(state)
    }

    pub fn submit_vote(
        ctx: Context<MatchAction>,
        action_id:      u64,
        expected_phase: Phase,
        target:         Option<Pubkey>, // None abstains
    ) -> Result<PublicState> {
        let now = Clock::get()?.slot;
        let mut log = EventLog::default();
        let caller = ctx.accounts.caller.key();
        let state = ctx.accounts.game.submit_vote(caller, action_id, expected_phase, target, now, &mut log)?;
        log.emit_all();
        Ok(state)
    }

    // ── Force resolve (host any time, live players after the deadline) ──
    pub fn force_resolve(
        ctx: Context<MatchAction>,
        action_id:      u64,
        expected_phase: Phase,
    ) -> Result<PublicState> {
        let now = Clock::get()?.slot;
        let mut log = EventLog::default();
        let caller = ctx.accounts.caller.key();
        let state = ctx.accounts.game.force_resolve(caller, action_id, expected_phase, now, &mut log)?;
        log.emit_all();
        Ok(state)
    }

    // ── Host: abort from the lobby (stakes become refundable) ─────
    pub fn abort_match(ctx: Context<MatchAction>, action_id: u64) -> Result<PublicState> {
        let now = Clock::get()?.slot;
        let mut log = EventLog::default();
        let caller = ctx.accounts.caller.key();
        let state = ctx.accounts.game.abort(caller, action_id, now, &mut log)?;
        log.emit_all();
        Ok(state)
    }

    // ── Claim stake (refund after abort, winner share after a decision) ──
    pub fn claim_stake(ctx: Context<ClaimStake>) -> Result<u64> {
        let mut log = EventLog::default();
        let player = ctx.accounts.player.key();
        let amount = ctx.accounts.game.claim_stake(player, &mut log)?;

        let game_ai = ctx.accounts.game.to_account_info();
        let rent = Rent::get()?.minimum_balance(game_ai.data_len());
        require!(
            game_ai.lamports().saturating_sub(rent) >= amount,
            MafiaError::AccountingBroken
        );
        **game_ai.try_borrow_mut_lamports()?             -= amount;
        **ctx.accounts.player.try_borrow_mut_lamports()? += amount;

        msg!("{} claimed {} lamports", player, amount);
        log.emit_all();
        Ok(amount)
    }

    // ── Queries (return data only) ────────────────────────────────
    pub fn get_public_state(ctx: Context<ViewMatch>) -> Result<PublicState> {
        Ok(ctx.accounts.game.public_state())
    }

    pub fn reveal_role(ctx: Context<ViewAsPlayer>, target: Pubkey) -> Result<Role> {
        ctx.accounts.game.role_view(&ctx.accounts.viewer.key(), &target)
    }

    pub fn reveal_inspections(ctx: Context<ViewAsPlayer>) -> Result<Vec<InspectionView>> {
        ctx.accounts.game.inspections_for(&ctx.accounts.viewer.key())
    }
}

// ══════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ══════════════════════════════════════════════════════════════════════════

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(init, payer = authority, space = 8 + Registry::LEN,
              seeds = [REGISTRY_SEED], bump)]
    pub registry: Account<'info, Registry>,
    #[account(mut)] pub authority: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct AdminOnly<'info> {
    #[account(mut, seeds = [REGISTRY_SEED], bump = registry.bump, has_one = authority)]
    pub registry: Account<'info, Registry>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct CreateMatch<'info> {
    #[account(mut, seeds = [REGISTRY_SEED], bump = registry.bump)]
    pub registry: Account<'info, Registry>,
    #[account(init, payer = host, space = 8 + Match::LEN,
              seeds = [MATCH_SEED, registry.next_match_id.to_le_bytes().as_ref()], bump)]
    pub game: Account<'info, Match>,
    #[account(mut)] pub host: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct Register<'info> {
    #[account(seeds = [REGISTRY_SEED], bump = registry.bump)]
    pub registry: Account<'info, Registry>,
    #[account(mut, seeds = [MATCH_SEED, game.match_id.to_le_bytes().as_ref()], bump = game.bump)]
    pub game: Account<'info, Match>,
    #[account(mut)] pub player: Signer<'info>,
    pub system_program: Program<'info, System>,
}

/// Host and player requests alike; the match itself decides who may do what.
#[derive(Accounts)]
pub struct MatchAction<'info> {
    #[account(mut, seeds = [MATCH_SEED, game.match_id.to_le_bytes().as_ref()], bump = game.bump)]
    pub game: Account<'info, Match>,
    pub caller: Signer<'info>,
}

#[derive(Accounts)]
pub struct ClaimStake<'info> {
    #[account(mut, seeds = [MATCH_SEED, game.match_id.to_le_bytes().as_ref()], bump = game.bump)]
    pub game: Account<'info, Match>,
    #[account(mut)] pub player: Signer<'info>,
}

#[derive(Accounts)]
pub struct ViewMatch<'info> {
    #[account(seeds = [MATCH_SEED, game.match_id.to_le_bytes().as_ref()], bump = game.bump)]
    pub game: Account<'info, Match>,
}

#[derive(Accounts)]
pub struct ViewAsPlayer<'info> {
    #[account(seeds = [MATCH_SEED, game.match_id.to_le_bytes().as_ref()], bump = game.bump)]
    pub game: Account<'info, Match>,
    pub viewer: Signer<'info>,
}
