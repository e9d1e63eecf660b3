//! Offensive action math: power, soft caps, the d20 hit roll, mitigation,
//! and on-hit side effects.
//!
//! Two anti-stacking invariants live here and are load-bearing for balance:
//! weapon power above [`WEAPON_POWER_SOFT_CAP`] contributes at half rate,
//! and armor above [`ARMOR_SOFT_CAP`] contributes as the square root of the
//! excess. Without the latter, stacked armor drives every hit to the 1-point
//! floor and defenders become untouchable.

use crate::combatant::Combatant;
use crate::consts::*;
use crate::hooks::{CoatingKind, EnchantKind, EquipmentProfile, Grip};
use crate::output::ColorTag;
use crate::rng::CombatRng;
use crate::status::{StatusKind, TempBonusKind};

use super::Resolver;

/// Fixed magnitudes for poison coatings (the coating kinds themselves carry
/// no numbers).
const NUMBING_STUN_CHANCE: u32 = 30;
const VIRULENT_BONUS_DAMAGE: i64 = 6;
const LEECHING_DRAIN_PCT: i64 = 25;

/// Result of one swing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrikeResult {
    pub hit: bool,
    pub critical: bool,
    pub fumble: bool,
    /// Damage actually applied to the target.
    pub damage: i64,
    pub target_died: bool,
    /// Thorns damage reflected onto the attacker.
    pub reflected: i64,
    pub attacker_died: bool,
}

/// Result of a full attack action (main hand plus optional off-hand).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttackSummary {
    pub total_damage: i64,
    pub target_died: bool,
    pub attacker_died: bool,
    pub any_hit: bool,
}

/// Weapon power through the soft cap: linear up to the cap, then at
/// [`WEAPON_SOFT_CAP_RATE`]. Monotonically increasing, sub-linear above.
pub fn soft_capped_weapon(power: i64) -> i64 {
    if power <= WEAPON_POWER_SOFT_CAP {
        power.max(0)
    } else {
        let excess = (power - WEAPON_POWER_SOFT_CAP) as f64;
        WEAPON_POWER_SOFT_CAP + (excess * WEAPON_SOFT_CAP_RATE) as i64
    }
}

/// Armor through the square-root soft cap.
pub fn soft_capped_armor(armor: i64) -> i64 {
    if armor <= ARMOR_SOFT_CAP {
        armor.max(0)
    } else {
        ARMOR_SOFT_CAP + ((armor - ARMOR_SOFT_CAP) as f64).sqrt() as i64
    }
}

/// One d20 hit determination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRoll {
    pub roll: u32,
    pub hits: bool,
    pub critical: bool,
    pub fumble: bool,
}

/// Roll to hit: d20 + attack bonus against `10 + level/2 + defense/10`.
/// A natural 20 always hits (critical); a natural 1 always misses,
/// irrespective of modifiers.
pub fn roll_to_hit(
    attack_bonus: i64,
    target_level: i32,
    target_defense: i64,
    rng: &mut CombatRng,
) -> HitRoll {
    let roll = rng.d20();
    if roll == 20 {
        return HitRoll {
            roll,
            hits: true,
            critical: true,
            fumble: false,
        };
    }
    if roll == 1 {
        return HitRoll {
            roll,
            hits: false,
            critical: false,
            fumble: true,
        };
    }
    let difficulty = 10 + target_level as i64 / 2 + target_defense / 10;
    HitRoll {
        roll,
        hits: roll as i64 + attack_bonus >= difficulty,
        critical: false,
        fumble: false,
    }
}

/// Flat to-hit bonus from stats.
pub fn attack_bonus(actor: &Combatant) -> i64 {
    actor.stats.dexterity / 10 + actor.level as i64 / 5
}

/// Attack power from stats, statuses, gear and consumables.
///
/// Base power is the primary stat plus a level term; everything else stacks
/// on top, with weapon power soft-capped.
pub fn attack_power(actor: &Combatant, profile: &EquipmentProfile, resolver: &Resolver) -> i64 {
    let mut strength = actor.stats.strength;
    if actor.ledger.has(StatusKind::Weakened) {
        strength -= strength / 4;
    }
    if actor.ledger.has(StatusKind::Raging) {
        strength += strength * 3 / 10;
    }
    if actor.ledger.has(StatusKind::Slowed) {
        strength -= strength / 5;
    }

    let mut power = strength + actor.level as i64 * LEVEL_TERM_FACTOR;
    power += soft_capped_weapon(profile.weapon_power);
    if profile.grip == Grip::TwoHanded {
        power += TWO_HANDED_BONUS;
    }
    power += actor.ledger.bonus_amount(TempBonusKind::Attack);
    if actor.ledger.has(StatusKind::Blessed) {
        power += actor.ledger.magnitude(StatusKind::Blessed).unwrap_or(5);
    }
    if actor.ledger.has(StatusKind::Cursed) {
        power -= actor.ledger.magnitude(StatusKind::Cursed).unwrap_or(5);
    }
    power += resolver.hooks.drugs.power_bonus(actor);
    power += resolver.hooks.artifacts.power_bonus(actor);
    power.max(1)
}

/// Defender mitigation: defense stat plus a randomized, soft-capped armor
/// contribution.
pub fn mitigation(target: &Combatant, armor_power: i64, rng: &mut CombatRng) -> i64 {
    let mut defense = target.stats.defense + target.ledger.bonus_amount(TempBonusKind::Defense);
    if target.ledger.has(StatusKind::Raging) {
        // Raging lowers the guard.
        defense -= defense / 4;
    }
    let armor = soft_capped_armor(target.stats.armor + armor_power);
    defense / 3 + rng.rnd(armor.max(0) as u32) as i64
}

/// Options for a single swing.
#[derive(Debug, Clone, Copy)]
pub struct StrikeOpts {
    /// Percent multiplier on the computed power.
    pub mult_pct: i64,
    /// Whether this swing makes a hit roll at all (area strikes don't).
    pub rolls_to_hit: bool,
    /// Melee swings trigger thorns and weapon coatings; magic doesn't.
    pub melee: bool,
}

impl Default for StrikeOpts {
    fn default() -> Self {
        Self {
            mult_pct: 100,
            rolls_to_hit: true,
            melee: true,
        }
    }
}

/// One full swing with a precomputed power value. Shared by basic attacks,
/// catalog strike effects and offensive spells (which pass intelligence-based
/// power instead).
pub fn strike_with_power(
    actor: &mut Combatant,
    target: &mut Combatant,
    power: i64,
    opts: StrikeOpts,
    resolver: &mut Resolver,
) -> StrikeResult {
    let mut result = StrikeResult::default();

    let actor_profile = resolver.hooks.equipment.profile(actor);
    let target_profile = resolver.hooks.equipment.profile(target);

    if opts.rolls_to_hit {
        let hit = roll_to_hit(
            attack_bonus(actor),
            target.level,
            target.stats.defense,
            resolver.rng,
        );
        result.critical = hit.critical;
        result.fumble = hit.fumble;
        if !hit.hits {
            let line = if hit.fumble {
                format!(
                    "{} {} wildly and {} the opening!",
                    resolver.subject(),
                    resolver.verb("swing", "swings"),
                    resolver.verb("lose", "loses"),
                )
            } else {
                format!(
                    "{} {} {}.",
                    resolver.subject(),
                    resolver.verb("miss", "misses"),
                    target.name
                )
            };
            resolver.out.line(ColorTag::Normal, &line);
            return result;
        }
    }
    result.hit = true;

    // Raw damage: power, multiplier, variance, crit, external multipliers.
    let variance = resolver.rng.uniform(DAMAGE_VARIANCE_MIN, DAMAGE_VARIANCE_MAX);
    let mut raw = (power * opts.mult_pct / 100) as f64 * variance;
    if result.critical {
        raw *= CRIT_MULTIPLIER;
    }
    raw *= resolver.hooks.faction.attack_multiplier(actor, target);
    raw *= resolver.hooks.world.damage_multiplier();
    let mut damage = raw as i64;

    // Defender mitigation.
    damage -= mitigation(target, target_profile.armor_power, resolver.rng);

    // Marked targets take a flat bonus percentage from any source.
    if target.ledger.has(StatusKind::Marked) {
        let pct = target
            .ledger
            .magnitude(StatusKind::Marked)
            .unwrap_or(MARKED_BONUS_PCT);
        damage += damage.max(0) * pct / 100;
    }

    // Guard: defending and magical shielding each halve what remains.
    if target.defending {
        damage /= 2;
    }
    if target.ledger.has(StatusKind::Shielded) {
        damage /= 2;
    }

    // Damage floor on any successful hit.
    damage = damage.max(DAMAGE_FLOOR);

    if target.ledger.has(StatusKind::Invulnerable) {
        let line = format!("{} stands unharmed!", target.name);
        resolver.out.line(ColorTag::Status, &line);
        return result;
    }

    result.damage = target.apply_damage(damage);
    target.ledger.on_damage_taken();
    result.target_died = !target.is_alive();

    let tag = if actor.kind.is_party() {
        ColorTag::PlayerHit
    } else {
        ColorTag::EnemyHit
    };
    let line = if result.critical {
        format!(
            "{} {} {} for {} damage! A devastating blow!",
            resolver.subject(),
            resolver.verb("crush", "crushes"),
            target.name,
            result.damage
        )
    } else {
        format!(
            "{} {} {} for {} damage.",
            resolver.subject(),
            resolver.verb("hit", "hits"),
            target.name,
            result.damage
        )
    };
    resolver.out.line(tag, &line);
    if result.target_died {
        let line = format!("{} falls!", target.name);
        resolver.out.line(ColorTag::Status, &line);
    }

    on_hit_effects(actor, target, &actor_profile, &target_profile, opts, &mut result, resolver);
    result
}

/// Independent on-hit riders: enchant procs, coatings, siphons, thorns.
fn on_hit_effects(
    actor: &mut Combatant,
    target: &mut Combatant,
    actor_profile: &EquipmentProfile,
    target_profile: &EquipmentProfile,
    opts: StrikeOpts,
    result: &mut StrikeResult,
    resolver: &mut Resolver,
) {
    if result.damage == 0 {
        return;
    }

    // Each enchantment rolls its own probability.
    for proc in &actor_profile.procs {
        if !resolver.rng.percent(proc.chance_pct) {
            continue;
        }
        match proc.kind {
            EnchantKind::Flame => {
                let burn = target.apply_damage(proc.magnitude.max(1));
                result.damage += burn;
                target
                    .ledger
                    .add_status(StatusKind::Burning, 2, Some((proc.magnitude / 2).max(1)));
                let line = format!("Flames sear {}! ({} damage)", target.name, burn);
                resolver.out.line(ColorTag::Status, &line);
            }
            EnchantKind::Frost => {
                if target.ledger.add_status(StatusKind::Slowed, 2, None) {
                    let line = format!("Frost crawls over {}.", target.name);
                    resolver.out.line(ColorTag::Status, &line);
                }
            }
            EnchantKind::Shock => {
                let burned = proc.magnitude.min(target.mana).max(0);
                target.mana -= burned;
                if burned > 0 {
                    let line = format!("Sparks drain {} mana from {}.", burned, target.name);
                    resolver.out.line(ColorTag::Status, &line);
                }
            }
        }
    }

    // Poison coatings, melee only. Charges are consumed per combat by the
    // equipment provider, not here.
    if opts.melee {
        for coating in &actor_profile.coatings {
            match coating {
                CoatingKind::Numbing => {
                    if resolver.rng.percent(NUMBING_STUN_CHANCE)
                        && target.ledger.add_status(StatusKind::Stunned, 1, None)
                    {
                        let line = format!("{} reels, numbed by poison!", target.name);
                        resolver.out.line(ColorTag::Status, &line);
                    }
                }
                CoatingKind::Withering => {
                    if target.ledger.add_status(StatusKind::Weakened, 2, None) {
                        let line = format!("{} withers under the venom.", target.name);
                        resolver.out.line(ColorTag::Status, &line);
                    }
                }
                CoatingKind::Leeching => {
                    let healed = actor.heal(result.damage * LEECHING_DRAIN_PCT / 100);
                    if healed > 0 {
                        let line = format!(
                            "{} venom feeds {} {} HP.",
                            resolver.possessive(),
                            resolver.verb("you", resolver.actor_name),
                            healed
                        );
                        resolver.out.line(ColorTag::Heal, &line);
                    }
                }
                CoatingKind::Virulent => {
                    let extra = target.apply_damage(VIRULENT_BONUS_DAMAGE);
                    result.damage += extra;
                    if extra > 0 {
                        let line = format!("Poison bites deeper! ({extra} damage)");
                        resolver.out.line(ColorTag::Status, &line);
                    }
                }
            }
        }
    }

    // Siphons.
    let mut drain_pct = actor_profile.lifesteal_pct;
    drain_pct += resolver.hooks.faction.life_drain_pct(actor);
    if drain_pct > 0 {
        let healed = actor.heal(result.damage * drain_pct / 100);
        if healed > 0 {
            let line = format!(
                "{} {} {} HP from the wound.",
                resolver.subject(),
                resolver.verb("drain", "drains"),
                healed
            );
            resolver.out.line(ColorTag::Heal, &line);
        }
    }
    if actor_profile.manasteal_pct > 0 {
        let gained = (result.damage * actor_profile.manasteal_pct / 100)
            .min(actor.max_mana - actor.mana)
            .max(0);
        actor.mana += gained;
    }

    // Thorns, melee only.
    if opts.melee && target_profile.thorns_pct > 0 && target.is_alive() {
        let reflected = actor.apply_damage(result.damage * target_profile.thorns_pct / 100);
        if reflected > 0 {
            result.reflected = reflected;
            result.attacker_died = !actor.is_alive();
            let line = format!(
                "Thorns tear back at {} for {} damage!",
                resolver.verb("you", resolver.actor_name),
                reflected
            );
            resolver.out.line(ColorTag::Warning, &line);
        }
    }

    result.target_died = !target.is_alive();
}

/// A basic weapon attack: main-hand swing, plus a reduced-effectiveness
/// off-hand swing when dual wielding.
pub fn resolve_attack(
    actor: &mut Combatant,
    target: &mut Combatant,
    resolver: &mut Resolver,
) -> AttackSummary {
    let profile = resolver.hooks.equipment.profile(actor);
    let power = attack_power(actor, &profile, resolver);

    let mut summary = AttackSummary::default();
    let main = strike_with_power(actor, target, power, StrikeOpts::default(), resolver);
    fold(&mut summary, main);

    if summary.target_died || summary.attacker_died {
        return summary;
    }

    if profile.grip == Grip::DualWield && profile.offhand_power > 0 {
        // The off-hand swing replaces the main weapon's contribution and
        // lands at reduced effectiveness.
        let base = power - soft_capped_weapon(profile.weapon_power)
            + soft_capped_weapon(profile.offhand_power);
        let off_power = ((base as f64) * OFFHAND_EFFECTIVENESS) as i64;
        let off = strike_with_power(
            actor,
            target,
            off_power.max(1),
            StrikeOpts::default(),
            resolver,
        );
        fold(&mut summary, off);
    }
    summary
}

/// Area action: a computed total is split evenly across every target still
/// in the fight; mitigation and on-hit hooks run independently per target.
/// Area strikes don't make hit rolls. A combatant who retreated is out of
/// the encounter and takes no share.
pub fn resolve_area_strike(
    actor: &mut Combatant,
    targets: &mut [Combatant],
    total_mult_pct: i64,
    resolver: &mut Resolver,
) -> AttackSummary {
    let profile = resolver.hooks.equipment.profile(actor);
    let power = attack_power(actor, &profile, resolver);
    let total = power * total_mult_pct / 100;

    let living: Vec<usize> = targets
        .iter()
        .enumerate()
        .filter(|(_, t)| t.takes_turns())
        .map(|(i, _)| i)
        .collect();
    let mut summary = AttackSummary::default();
    if living.is_empty() {
        return summary;
    }
    let share = (total / living.len() as i64).max(1);

    for i in living {
        let opts = StrikeOpts {
            mult_pct: 100,
            rolls_to_hit: false,
            melee: true,
        };
        let r = strike_with_power(actor, &mut targets[i], share, opts, resolver);
        fold(&mut summary, r);
        if summary.attacker_died {
            break;
        }
    }
    summary
}

fn fold(summary: &mut AttackSummary, r: StrikeResult) {
    summary.total_damage += r.damage;
    summary.any_hit |= r.hit;
    summary.target_died |= r.target_died;
    summary.attacker_died |= r.attacker_died;
}
