//! The effect switch: catalog abilities and spells resolve here.
//!
//! Monsters and players route through the same switch, so both sides share
//! one effect vocabulary (direct damage, status inflict with resist, drains,
//! buffs, heals). Healing and buff effects never make a hit roll.

use crate::catalog::{Ability, SpecialEffect};
use crate::combatant::Combatant;
use crate::errors::CombatError;
use crate::output::ColorTag;
use crate::status::{StatusKind, TempBonusKind};

use super::attack::{AttackSummary, StrikeOpts, resolve_area_strike, strike_with_power};
use super::{Resolver, charge};

/// Mutable targets for one effect resolution. The caller picks the shape
/// that matches the ability's [`crate::catalog::TargetShape`].
pub enum EffectTargets<'a> {
    /// No target beyond the actor.
    None,
    /// One enemy.
    Enemy(&'a mut Combatant),
    /// The whole enemy roster (area effects skip the dead and the retreated).
    Enemies(&'a mut [Combatant]),
    /// A party member (healing/buffs); `None` means the actor itself.
    Ally(Option<&'a mut Combatant>),
}

/// What an effect did, for session bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOutcome {
    pub damage: i64,
    pub healed: i64,
    pub target_died: bool,
    pub attacker_died: bool,
    pub status_applied: Option<StatusKind>,
    pub resisted: bool,
}

/// Pay for and resolve one catalog ability. The cost is charged only after
/// validation has passed; a stale/dead target was already filtered by the
/// caller.
pub fn use_catalog_ability(
    actor: &mut Combatant,
    ability: &Ability,
    targets: EffectTargets<'_>,
    resolver: &mut Resolver,
) -> Result<EffectOutcome, CombatError> {
    charge(actor, ability)?;

    let line = format!(
        "{} {} {}!",
        resolver.subject(),
        resolver.verb("use", "uses"),
        ability.name
    );
    resolver.out.line(ColorTag::Status, &line);

    Ok(apply_effect(actor, ability.effect, targets, resolver))
}

fn apply_effect(
    actor: &mut Combatant,
    effect: SpecialEffect,
    targets: EffectTargets<'_>,
    resolver: &mut Resolver,
) -> EffectOutcome {
    let mut outcome = EffectOutcome::default();

    match (effect, targets) {
        (SpecialEffect::Strike { mult_pct }, EffectTargets::Enemy(target)) => {
            let profile = resolver.hooks.equipment.profile(actor);
            let power = super::attack::attack_power(actor, &profile, resolver);
            let r = strike_with_power(
                actor,
                target,
                power,
                StrikeOpts {
                    mult_pct,
                    ..StrikeOpts::default()
                },
                resolver,
            );
            fold_strike(&mut outcome, r);
        }
        (
            SpecialEffect::Execute {
                threshold_pct,
                bonus_pct,
            },
            EffectTargets::Enemy(target),
        ) => {
            let profile = resolver.hooks.equipment.profile(actor);
            let power = super::attack::attack_power(actor, &profile, resolver);
            let below = (target.hp_fraction() * 100.0) < threshold_pct as f64;
            let mult = if below { 100 + bonus_pct } else { 100 };
            let r = strike_with_power(
                actor,
                target,
                power,
                StrikeOpts {
                    mult_pct: mult,
                    ..StrikeOpts::default()
                },
                resolver,
            );
            fold_strike(&mut outcome, r);
        }
        (SpecialEffect::AreaStrike { mult_pct }, EffectTargets::Enemies(all)) => {
            let s = resolve_area_strike(actor, all, mult_pct, resolver);
            fold_summary(&mut outcome, s);
        }
        (SpecialEffect::MagicDamage { base, int_div }, EffectTargets::Enemy(target)) => {
            let power = base + actor.stats.intelligence / int_div.max(1);
            let r = strike_with_power(
                actor,
                target,
                power,
                StrikeOpts {
                    mult_pct: 100,
                    rolls_to_hit: true,
                    melee: false,
                },
                resolver,
            );
            fold_strike(&mut outcome, r);
        }
        (
            SpecialEffect::Inflict {
                kind,
                rounds,
                magnitude,
                resist_dc,
            },
            EffectTargets::Enemy(target),
        ) => {
            inflict(kind, rounds, magnitude, resist_dc, target, &mut outcome, resolver);
        }
        (
            SpecialEffect::Inflict {
                kind,
                rounds,
                magnitude,
                resist_dc: _,
            },
            EffectTargets::None | EffectTargets::Ally(None),
        ) => {
            // Self-directed statuses (Rage) never resist.
            if actor.ledger.add_status(kind, rounds, Some(magnitude)) {
                outcome.status_applied = Some(kind);
                let line = format!(
                    "{} {} with {}!",
                    resolver.subject(),
                    resolver.verb("surge", "surges"),
                    kind
                );
                resolver.out.line(ColorTag::Status, &line);
            }
        }
        (SpecialEffect::Heal { base, int_div }, EffectTargets::Ally(target)) => {
            let amount = base + actor.stats.intelligence / int_div.max(1);
            let (healed, name) = match target {
                Some(ally) => (ally.heal(amount), ally.name.clone()),
                None => (actor.heal(amount), actor.name.clone()),
            };
            outcome.healed = healed;
            let line = format!("{name} recovers {healed} HP.");
            resolver.out.line(ColorTag::Heal, &line);
        }
        (SpecialEffect::BuffAttack { amount, rounds }, EffectTargets::Ally(target)) => {
            let who = target.unwrap_or(actor);
            who.ledger.add_bonus(TempBonusKind::Attack, amount, rounds);
            let line = format!("{}'s attacks are empowered.", who.name);
            resolver.out.line(ColorTag::Status, &line);
        }
        (SpecialEffect::BuffAttack { amount, rounds }, EffectTargets::None) => {
            actor.ledger.add_bonus(TempBonusKind::Attack, amount, rounds);
            let line = format!("{}'s attacks are empowered.", actor.name);
            resolver.out.line(ColorTag::Status, &line);
        }
        (SpecialEffect::BuffDefense { amount, rounds }, EffectTargets::Ally(target)) => {
            let who = target.unwrap_or(actor);
            who.ledger.add_bonus(TempBonusKind::Defense, amount, rounds);
            let line = format!("{} braces behind raised guard.", who.name);
            resolver.out.line(ColorTag::Status, &line);
        }
        (SpecialEffect::BuffDefense { amount, rounds }, EffectTargets::None) => {
            actor.ledger.add_bonus(TempBonusKind::Defense, amount, rounds);
            let line = format!("{} braces behind raised guard.", actor.name);
            resolver.out.line(ColorTag::Status, &line);
        }
        (SpecialEffect::Ward { rounds }, EffectTargets::Ally(target)) => {
            let who = target.unwrap_or(actor);
            who.ledger.add_bonus(TempBonusKind::StatusImmunity, 1, rounds);
            let line = format!("A pale ward settles over {}.", who.name);
            resolver.out.line(ColorTag::Status, &line);
        }
        (
            SpecialEffect::LifeDrain {
                mult_pct,
                drain_pct,
            },
            EffectTargets::Enemy(target),
        ) => {
            let power = base_magic_power(actor);
            let r = strike_with_power(
                actor,
                target,
                power,
                StrikeOpts {
                    mult_pct,
                    rolls_to_hit: true,
                    melee: false,
                },
                resolver,
            );
            fold_strike(&mut outcome, r);
            if r.damage > 0 {
                let healed = actor.heal(r.damage * drain_pct / 100);
                outcome.healed = healed;
                if healed > 0 {
                    let line = format!(
                        "{} {} {} HP of stolen life.",
                        resolver.subject(),
                        resolver.verb("drink", "drinks"),
                        healed
                    );
                    resolver.out.line(ColorTag::Heal, &line);
                }
            }
        }
        // Shape mismatches are caller bugs; treat as a logged no-op rather
        // than corrupting state.
        (_, _) => {
            resolver
                .out
                .line(ColorTag::System, "Nothing happens.");
        }
    }

    outcome
}

/// Status inflict with a resist chance: the target shrugs it off on a d20
/// of `resist_dc` or higher. A dc of 0 means unresistable.
fn inflict(
    kind: StatusKind,
    rounds: u32,
    magnitude: i64,
    resist_dc: u32,
    target: &mut Combatant,
    outcome: &mut EffectOutcome,
    resolver: &mut Resolver,
) {
    if resist_dc > 0 && resolver.rng.d20() >= resist_dc {
        outcome.resisted = true;
        let line = format!("{} shrugs it off!", target.name);
        resolver.out.line(ColorTag::Status, &line);
        return;
    }
    let magnitude = (magnitude != 0).then_some(magnitude);
    if target.ledger.add_status(kind, rounds, magnitude) {
        outcome.status_applied = Some(kind);
        let line = format!("{} is {}!", target.name, status_verb(kind));
        resolver.out.line(ColorTag::Status, &line);
    } else {
        let line = format!("{} is unaffected.", target.name);
        resolver.out.line(ColorTag::Status, &line);
    }
}

fn status_verb(kind: StatusKind) -> &'static str {
    match kind {
        StatusKind::Stunned => "stunned",
        StatusKind::Sleeping => "lulled to sleep",
        StatusKind::Feared => "gripped by terror",
        StatusKind::Poisoned => "poisoned",
        StatusKind::Burning => "set ablaze",
        StatusKind::Slowed => "slowed",
        StatusKind::Confused => "confused",
        StatusKind::Frozen => "frozen solid",
        StatusKind::Marked => "marked for death",
        StatusKind::Raging => "enraged",
        StatusKind::Hidden => "hidden",
        StatusKind::Invulnerable => "untouchable",
        StatusKind::Blessed => "blessed",
        StatusKind::Cursed => "cursed",
        StatusKind::Weakened => "weakened",
        StatusKind::Shielded => "shielded",
    }
}

/// Power basis for non-weapon drains.
fn base_magic_power(actor: &Combatant) -> i64 {
    (actor.stats.intelligence + actor.level as i64 * crate::consts::LEVEL_TERM_FACTOR).max(1)
}

fn fold_strike(outcome: &mut EffectOutcome, r: super::attack::StrikeResult) {
    outcome.damage += r.damage;
    outcome.target_died |= r.target_died;
    outcome.attacker_died |= r.attacker_died;
}

fn fold_summary(outcome: &mut EffectOutcome, s: AttackSummary) {
    outcome.damage += s.total_damage;
    outcome.target_died |= s.target_died;
    outcome.attacker_died |= s.attacker_died;
}
