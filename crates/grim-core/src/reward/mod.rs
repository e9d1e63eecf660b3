//! Post-combat rewards: XP, gold split and contested loot.
//!
//! Runs exactly once, after the session reaches a terminal state with at
//! least one defeated monster. XP is computed independently per earner
//! (each applies their own level-difference multiplier), gold is one pool
//! floor-split across the party, and item drops are settled by a roll-off
//! among the members who can actually use them.

use serde::{Deserialize, Serialize};

use crate::combatant::{Combatant, CombatantId, CombatantKind};
use crate::consts::{
    ELITE_DROP_CHANCE, REGULAR_DROP_CHANCE_CAP, TEAM_BALANCE_FLOOR, TEAM_BALANCE_TIERS,
    TEAM_BONUS_PCT, XP_LEVEL_MULT_MAX, XP_LEVEL_MULT_MIN, XP_LEVEL_MULT_STEP,
};
use crate::hooks::Hooks;
use crate::output::{ColorTag, CombatOutput};
use crate::rng::CombatRng;
use crate::session::Outcome;

/// Reward-relevant snapshot of a monster taken at the moment it died.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefeatedMonster {
    pub name: String,
    pub level: i32,
    pub xp_value: i64,
    pub gold_value: i64,
    pub elite: bool,
    pub boss: bool,
}

impl DefeatedMonster {
    pub fn of(m: &Combatant) -> Self {
        Self {
            name: m.name.clone(),
            level: m.level,
            xp_value: m.xp_value,
            gold_value: m.gold_value,
            elite: m.elite,
            boss: m.kind == CombatantKind::Boss,
        }
    }

    /// Drop chance in percent for this monster's tier.
    pub fn drop_chance(&self) -> u32 {
        if self.boss {
            100
        } else if self.elite {
            ELITE_DROP_CHANCE
        } else {
            (5 + self.level.max(0) as u32 / 2).min(REGULAR_DROP_CHANCE_CAP)
        }
    }
}

/// An item produced by the external loot collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub name: String,
    /// Unidentified items are never auto-equipped, upgrade or not.
    pub unidentified: bool,
}

/// Item-catalog collaborator. The engine never knows what an item *is*,
/// only who can use it and whether it beats what they have.
pub trait LootProvider {
    /// Generate a drop for a defeated monster, if its table has one. The
    /// tier chance roll has already passed when this is called.
    fn generate(&mut self, monster: &DefeatedMonster) -> Option<ItemDrop>;

    /// Whether this party member can legally use the item.
    fn usable_by(&self, _item: &ItemDrop, _member: &Combatant) -> bool {
        true
    }

    /// Whether the item is a strict upgrade over the member's current gear.
    fn is_upgrade(&self, _item: &ItemDrop, _member: &Combatant) -> bool {
        false
    }

    /// Auto-equip after a won roll on an identified strict upgrade.
    fn equip(&mut self, _item: &ItemDrop, _member_name: &str) {}

    /// Put the item in the member's inventory.
    fn stash(&mut self, _item: &ItemDrop, _member_name: &str) {}
}

/// No loot tables at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoot;

impl LootProvider for NoLoot {
    fn generate(&mut self, _monster: &DefeatedMonster) -> Option<ItemDrop> {
        None
    }
}

/// One candidate's entry in a contested roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootRollEntry {
    pub candidate: CombatantId,
    pub name: String,
    pub roll: f64,
    pub usable: bool,
}

/// One settled drop event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootRoll {
    pub item: ItemDrop,
    pub entries: Vec<LootRollEntry>,
    /// `None` when nobody present could use the item (left behind).
    pub winner: Option<CombatantId>,
    pub equipped: bool,
}

/// One earner's final reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnerReward {
    pub id: CombatantId,
    pub name: String,
    pub xp: i64,
    pub gold: i64,
}

/// Everything the resolver produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardSummary {
    pub earners: Vec<EarnerReward>,
    pub drops: Vec<LootRoll>,
}

/// Level-difference multiplier for one (monster, earner) pair. Each earner
/// computes their own; there is no shared party multiplier.
pub fn level_multiplier(monster_level: i32, earner_level: i32) -> f64 {
    (1.0 + (monster_level - earner_level) as f64 * XP_LEVEL_MULT_STEP)
        .clamp(XP_LEVEL_MULT_MIN, XP_LEVEL_MULT_MAX)
}

/// Carried-penalty multiplier from the gap to the highest-level earner.
pub fn balance_multiplier(gap_to_highest: i32) -> f64 {
    for (max_gap, mult) in TEAM_BALANCE_TIERS {
        if gap_to_highest <= max_gap {
            return mult;
        }
    }
    TEAM_BALANCE_FLOOR
}

/// Settle all rewards for a finished session. `party[0]` is the leader;
/// retreated members earn nothing.
pub fn resolve_rewards(
    party: &[Combatant],
    defeated: &[DefeatedMonster],
    outcome: Outcome,
    hooks: &mut Hooks,
    loot: &mut dyn LootProvider,
    rng: &mut CombatRng,
    out: &mut dyn CombatOutput,
) -> RewardSummary {
    let mut summary = RewardSummary::default();
    if defeated.is_empty() {
        return summary;
    }

    let earners: Vec<&Combatant> = party.iter().filter(|c| !c.retreated).collect();
    if earners.is_empty() {
        return summary;
    }
    let halved = outcome == Outcome::PartialVictory;
    let highest_level = earners.iter().map(|c| c.level).max().unwrap_or(1);
    let team = earners.len() > 1;

    // XP: independent per earner.
    for earner in &earners {
        let mut xp: f64 = defeated
            .iter()
            .map(|m| m.xp_value as f64 * level_multiplier(m.level, earner.level))
            .sum();
        xp *= hooks.world.xp_multiplier();
        xp *= hooks.world.accumulation_bonus(&earner.name);
        if team {
            xp *= 1.0 + TEAM_BONUS_PCT as f64 / 100.0;
        }
        xp *= balance_multiplier(highest_level - earner.level);
        if halved {
            xp *= 0.5;
        }
        summary.earners.push(EarnerReward {
            id: earner.id,
            name: earner.name.clone(),
            xp: xp.round() as i64,
            gold: 0,
        });
    }

    // Gold: one pool, floor-split, leader absorbs the remainder.
    let mut pool_f = defeated.iter().map(|m| m.gold_value).sum::<i64>() as f64;
    pool_f *= hooks.world.gold_multiplier();
    if team {
        pool_f *= 1.0 + TEAM_BONUS_PCT as f64 / 100.0;
    }
    if halved {
        pool_f *= 0.5;
    }
    let pool = pool_f.round() as i64;
    split_gold(pool, &earners, &mut summary);

    for reward in &summary.earners {
        let line = format!(
            "{} earns {} experience and {} gold.",
            reward.name, reward.xp, reward.gold
        );
        out.line(ColorTag::Reward, &line);
    }

    // Loot, one tier roll per corpse.
    for monster in defeated {
        if !rng.percent(monster.drop_chance()) {
            continue;
        }
        let Some(item) = loot.generate(monster) else {
            continue;
        };
        let roll = contest_drop(item, party, loot, rng, out);
        summary.drops.push(roll);
    }

    summary
}

fn split_gold(pool: i64, earners: &[&Combatant], summary: &mut RewardSummary) {
    let n = earners.len() as i64;
    let share = pool / n;
    let remainder = pool % n;
    // The leader absorbs the remainder; if the leader retreated, the first
    // remaining earner does.
    let absorber = earners
        .iter()
        .position(|c| c.kind == CombatantKind::Leader)
        .unwrap_or(0);
    for (i, reward) in summary.earners.iter_mut().enumerate() {
        reward.gold = share + if i == absorber { remainder } else { 0 };
    }
}

/// The contested roll: every living, eligible member draws a uniform value,
/// highest wins. Members who cannot use the item never win, whatever they
/// roll; if nobody can use it, it stays on the ground.
pub fn contest_drop(
    item: ItemDrop,
    party: &[Combatant],
    loot: &mut dyn LootProvider,
    rng: &mut CombatRng,
    out: &mut dyn CombatOutput,
) -> LootRoll {
    let mut entries = Vec::new();
    for member in party.iter().filter(|c| c.is_alive() && !c.retreated) {
        let usable = loot.usable_by(&item, member);
        entries.push(LootRollEntry {
            candidate: member.id,
            name: member.name.clone(),
            roll: rng.uniform(0.0, 100.0),
            usable,
        });
    }

    let winner = entries
        .iter()
        .filter(|e| e.usable)
        .max_by(|a, b| a.roll.total_cmp(&b.roll))
        .map(|e| (e.candidate, e.name.clone()));

    let mut equipped = false;
    match &winner {
        Some((id, name)) => {
            let line = format!("{name} wins the roll for the {}!", item.name);
            out.line(ColorTag::Reward, &line);
            let member = party.iter().find(|c| c.id == *id);
            let upgrade =
                member.is_some_and(|m| !item.unidentified && loot.is_upgrade(&item, m));
            if upgrade {
                loot.equip(&item, name);
                out.line(ColorTag::Reward, &format!("{name} equips the {}.", item.name));
                equipped = true;
            } else {
                loot.stash(&item, name);
            }
        }
        None => {
            let line = format!("Nobody can use the {}; it is left behind.", item.name);
            out.line(ColorTag::System, &line);
        }
    }

    LootRoll {
        item,
        entries,
        winner: winner.map(|(id, _)| id),
        equipped,
    }
}
