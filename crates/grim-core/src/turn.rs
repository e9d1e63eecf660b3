//! Turn order and AI action selection.
//!
//! The round order is fixed: leader, then allies in join order, then
//! monsters in roster order, with a final-phase boss holding extra slots.
//! Monsters pick their victim through a weighted lottery rather than
//! uniformly, so tanks actually tank and bloodied targets draw attention.

use crate::action::{CombatAction, TargetRef};
use crate::catalog::{AbilityCatalog, AbilityId, TargetShape};
use crate::combatant::{Archetype, Capabilities, Combatant, CombatantId};
use crate::consts::{
    BOSS_ABILITY_CHANCE, LOTTERY_BASE_WEIGHT, LOTTERY_BLOOD_WEIGHT, LOTTERY_DEFEND_WEIGHT,
    MONSTER_ABILITY_CHANCE,
};
use crate::rng::CombatRng;
use crate::status::StatusKind;

/// One slot in a round's turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorSlot {
    Leader,
    /// Index into the ally roster.
    Ally(usize),
    /// Index into the monster roster.
    Monster(usize),
}

/// Build the slot list for one round. Dead and retreated combatants are
/// skipped up front; the session re-checks liveness before each slot fires
/// since earlier turns may have changed it. A boss acting more than once
/// gets that many slots.
pub fn build_order(
    leader: &Combatant,
    allies: &[Combatant],
    monsters: &[Combatant],
    boss_slots: impl Fn(&Combatant) -> u32,
) -> Vec<ActorSlot> {
    let mut order = Vec::new();
    if leader.takes_turns() {
        order.push(ActorSlot::Leader);
    }
    for (i, ally) in allies.iter().enumerate() {
        if ally.takes_turns() {
            order.push(ActorSlot::Ally(i));
        }
    }
    for (i, monster) in monsters.iter().enumerate() {
        if monster.takes_turns() {
            for _ in 0..boss_slots(monster).max(1) {
                order.push(ActorSlot::Monster(i));
            }
        }
    }
    order
}

/// Lottery weight for one candidate. Bigger, tankier and bloodier targets
/// draw more attention; a defending combatant deliberately draws extra.
pub fn lottery_weight(c: &Combatant) -> i64 {
    let mut weight = LOTTERY_BASE_WEIGHT
        + c.archetype.lottery_weight()
        + c.stats.armor / 5
        + c.max_hp / 20
        + ((1.0 - c.hp_fraction()) * LOTTERY_BLOOD_WEIGHT) as i64;
    if c.defending {
        weight += LOTTERY_DEFEND_WEIGHT;
    }
    weight.max(1)
}

/// Draw a victim from the party. Hidden combatants never enter the lottery;
/// everyone out of the fight (dead, retreated) is excluded. Returns an index
/// into `party`, or None if nobody can be targeted.
pub fn pick_target(party: &[Combatant], rng: &mut CombatRng) -> Option<usize> {
    let weights: Vec<i64> = party
        .iter()
        .map(|c| {
            if c.takes_turns() && !c.ledger.has(StatusKind::Hidden) {
                lottery_weight(c)
            } else {
                0
            }
        })
        .collect();
    rng.weighted_index(&weights)
}

/// Abilities this monster can fire right now: known, off cooldown, level met.
fn ready_abilities<'a>(
    monster: &Combatant,
    pool: &[AbilityId],
    catalog: &'a dyn AbilityCatalog,
) -> Vec<&'a crate::catalog::Ability> {
    pool.iter()
        .filter_map(|id| catalog.lookup(*id))
        .filter(|a| monster.level >= a.min_level && monster.ledger.cooldown(a.id) == 0)
        .collect()
}

/// Pick a monster's action. A roll decides between the ability table and a
/// plain attack; a boss rolls with a higher chance and draws from whatever
/// pool its phase director has unlocked.
pub fn monster_choose_action(
    monster: &Combatant,
    ability_pool: &[AbilityId],
    party: &[Combatant],
    catalog: &dyn AbilityCatalog,
    rng: &mut CombatRng,
) -> CombatAction {
    let victim = match pick_target(party, rng) {
        Some(i) => party[i].id,
        None => return CombatAction::Pass,
    };

    let chance = if monster.kind == crate::combatant::CombatantKind::Boss {
        BOSS_ABILITY_CHANCE
    } else {
        MONSTER_ABILITY_CHANCE
    };
    if monster.caps.contains(Capabilities::USE_ABILITY) && rng.percent(chance) {
        let ready = ready_abilities(monster, ability_pool, catalog);
        if let Some(ability) = rng.choose(&ready) {
            let target = match ability.shape {
                TargetShape::SingleEnemy => TargetRef::PartyMember(victim),
                TargetShape::AllEnemies | TargetShape::SelfOnly | TargetShape::Ally => {
                    TargetRef::SelfTarget
                }
            };
            return CombatAction::UseAbility {
                ability: ability.id,
                target,
            };
        }
    }

    CombatAction::Attack { target: victim }
}

/// Living monster with the lowest HP, the standard AI focus target.
fn weakest(monsters: &[Combatant]) -> Option<CombatantId> {
    monsters
        .iter()
        .filter(|m| m.takes_turns())
        .min_by_key(|m| m.hp)
        .map(|m| m.id)
}

/// Most wounded living party member below half HP, if any.
fn most_wounded(party: &[Combatant]) -> Option<CombatantId> {
    party
        .iter()
        .filter(|c| c.takes_turns() && c.hp_fraction() < 0.5)
        .min_by(|a, b| a.hp_fraction().total_cmp(&b.hp_fraction()))
        .map(|c| c.id)
}

/// NPC companion policy. Healers patch up the most wounded party member
/// first; casters lead with spells; everyone else swings at the weakest
/// monster so kills actually land.
pub fn ally_choose_action(
    ally: &Combatant,
    party: &[Combatant],
    monsters: &[Combatant],
    catalog: &dyn AbilityCatalog,
) -> CombatAction {
    if ally.archetype == Archetype::Healer && ally.caps.contains(Capabilities::CAST) {
        if let (Some(wounded), Some(heal)) =
            (most_wounded(party), catalog.lookup(crate::catalog::MENDING))
        {
            if affordable(ally, heal) {
                return CombatAction::Cast {
                    spell: heal.id,
                    target: TargetRef::PartyMember(wounded),
                };
            }
        }
    }

    if ally.archetype == Archetype::Caster && ally.caps.contains(Capabilities::CAST) {
        if let (Some(target), Some(bolt)) =
            (weakest(monsters), catalog.lookup(crate::catalog::FIREBOLT))
        {
            if affordable(ally, bolt) {
                return CombatAction::Cast {
                    spell: bolt.id,
                    target: TargetRef::Monster(target),
                };
            }
        }
    }

    match weakest(monsters) {
        Some(target) => CombatAction::Attack { target },
        None => CombatAction::Pass,
    }
}

fn affordable(c: &Combatant, ability: &crate::catalog::Ability) -> bool {
    if c.level < ability.min_level || c.ledger.cooldown(ability.id) > 0 {
        return false;
    }
    match ability.cost {
        crate::catalog::Cost::Free => true,
        crate::catalog::Cost::Stamina(n) => c.stamina >= n,
        crate::catalog::Cost::Mana(n) => c.mana >= n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuiltinCatalog;

    fn party_of(archetypes: &[Archetype]) -> Vec<Combatant> {
        archetypes
            .iter()
            .enumerate()
            .map(|(i, a)| {
                Combatant::npc_ally(CombatantId(10 + i as u32), &format!("ally {i}"), 8, *a)
            })
            .collect()
    }

    #[test]
    fn test_order_leader_allies_then_monsters() {
        let leader = Combatant::leader(CombatantId(1), "Mara", 10);
        let allies = party_of(&[Archetype::Tank, Archetype::Healer]);
        let monsters = vec![
            Combatant::monster(CombatantId(100), "ghoul", 5),
            Combatant::monster(CombatantId(101), "ghast", 5),
        ];
        let order = build_order(&leader, &allies, &monsters, |_| 1);
        assert_eq!(
            order,
            vec![
                ActorSlot::Leader,
                ActorSlot::Ally(0),
                ActorSlot::Ally(1),
                ActorSlot::Monster(0),
                ActorSlot::Monster(1),
            ]
        );
    }

    #[test]
    fn test_order_skips_dead_and_retreated() {
        let mut leader = Combatant::leader(CombatantId(1), "Mara", 10);
        leader.hp = 0;
        let mut allies = party_of(&[Archetype::Tank]);
        allies[0].retreated = true;
        let monsters = vec![Combatant::monster(CombatantId(100), "ghoul", 5)];
        let order = build_order(&leader, &allies, &monsters, |_| 1);
        assert_eq!(order, vec![ActorSlot::Monster(0)]);
    }

    #[test]
    fn test_final_phase_boss_gets_two_slots() {
        let leader = Combatant::leader(CombatantId(1), "Mara", 10);
        let monsters = vec![Combatant::boss(CombatantId(100), "Gravemaw", 20)];
        let order = build_order(&leader, &[], &monsters, |_| 2);
        assert_eq!(
            order,
            vec![
                ActorSlot::Leader,
                ActorSlot::Monster(0),
                ActorSlot::Monster(0),
            ]
        );
    }

    #[test]
    fn test_lottery_favors_tank_over_caster() {
        let party = party_of(&[Archetype::Tank, Archetype::Caster]);
        let mut rng = CombatRng::new(7);
        let mut tank_hits = 0;
        for _ in 0..1000 {
            if pick_target(&party, &mut rng) == Some(0) {
                tank_hits += 1;
            }
        }
        // Tank weight is well over half the pool; uniform would be ~500.
        assert!(tank_hits > 550, "tank drew only {tank_hits}/1000");
    }

    #[test]
    fn test_lottery_skips_hidden_and_dead() {
        let mut party = party_of(&[Archetype::Tank, Archetype::Caster, Archetype::Healer]);
        party[0].ledger.add_status(StatusKind::Hidden, 3, None);
        party[1].hp = 0;
        let mut rng = CombatRng::new(7);
        for _ in 0..100 {
            assert_eq!(pick_target(&party, &mut rng), Some(2));
        }
    }

    #[test]
    fn test_lottery_empty_when_everyone_hidden() {
        let mut party = party_of(&[Archetype::Tank]);
        party[0].ledger.add_status(StatusKind::Hidden, 3, None);
        let mut rng = CombatRng::new(7);
        assert_eq!(pick_target(&party, &mut rng), None);
    }

    #[test]
    fn test_defending_draws_extra_weight() {
        let mut c = party_of(&[Archetype::Skirmisher]).pop().unwrap();
        let base = lottery_weight(&c);
        c.defending = true;
        assert_eq!(lottery_weight(&c), base + LOTTERY_DEFEND_WEIGHT);
    }

    #[test]
    fn test_monster_respects_cooldowns() {
        let catalog = BuiltinCatalog;
        let mut monster = Combatant::monster(CombatantId(100), "wyrm", 10);
        monster.abilities = vec![crate::catalog::REND];
        monster.ledger.start_cooldown(crate::catalog::REND, 3);
        let party = party_of(&[Archetype::Tank]);
        let mut rng = CombatRng::new(3);
        for _ in 0..200 {
            let action = monster_choose_action(
                &monster,
                &monster.abilities.clone(),
                &party,
                &catalog,
                &mut rng,
            );
            assert!(
                matches!(action, CombatAction::Attack { .. }),
                "on-cooldown ability selected: {action:?}"
            );
        }
    }

    #[test]
    fn test_monster_uses_abilities_sometimes() {
        let catalog = BuiltinCatalog;
        let mut monster = Combatant::monster(CombatantId(100), "wyrm", 10);
        monster.abilities = vec![crate::catalog::REND];
        let party = party_of(&[Archetype::Tank]);
        let mut rng = CombatRng::new(3);
        let mut used = 0;
        for _ in 0..200 {
            let action = monster_choose_action(
                &monster,
                &monster.abilities.clone(),
                &party,
                &catalog,
                &mut rng,
            );
            if matches!(action, CombatAction::UseAbility { .. }) {
                used += 1;
            }
        }
        // 20% chance over 200 draws.
        assert!((10..=80).contains(&used), "ability used {used}/200 times");
    }

    #[test]
    fn test_monster_passes_when_no_targets() {
        let catalog = BuiltinCatalog;
        let monster = Combatant::monster(CombatantId(100), "wyrm", 10);
        let mut party = party_of(&[Archetype::Tank]);
        party[0].hp = 0;
        let mut rng = CombatRng::new(3);
        let action = monster_choose_action(&monster, &[], &party, &catalog, &mut rng);
        assert_eq!(action, CombatAction::Pass);
    }

    #[test]
    fn test_healer_heals_the_most_wounded() {
        let catalog = BuiltinCatalog;
        let healer = Combatant::npc_ally(CombatantId(10), "Sister Aune", 8, Archetype::Healer);
        let mut party = party_of(&[Archetype::Tank, Archetype::Bruiser]);
        party[0].hp = party[0].max_hp * 2 / 5; // 40%
        party[1].hp = party[1].max_hp / 5; // 20%, more wounded
        let monsters = vec![Combatant::monster(CombatantId(100), "ghoul", 5)];
        let action = ally_choose_action(&healer, &party, &monsters, &catalog);
        assert_eq!(
            action,
            CombatAction::Cast {
                spell: crate::catalog::MENDING,
                target: TargetRef::PartyMember(party[1].id),
            }
        );
    }

    #[test]
    fn test_healer_attacks_when_party_healthy() {
        let catalog = BuiltinCatalog;
        let healer = Combatant::npc_ally(CombatantId(10), "Sister Aune", 8, Archetype::Healer);
        let party = party_of(&[Archetype::Tank]);
        let monsters = vec![Combatant::monster(CombatantId(100), "ghoul", 5)];
        let action = ally_choose_action(&healer, &party, &monsters, &catalog);
        assert_eq!(
            action,
            CombatAction::Attack {
                target: CombatantId(100)
            }
        );
    }

    #[test]
    fn test_caster_leads_with_spells_until_dry() {
        let catalog = BuiltinCatalog;
        let mut caster = Combatant::npc_ally(CombatantId(10), "Vex", 8, Archetype::Caster);
        let monsters = vec![Combatant::monster(CombatantId(100), "ghoul", 5)];
        assert!(matches!(
            ally_choose_action(&caster, &[], &monsters, &catalog),
            CombatAction::Cast { .. }
        ));
        caster.mana = 0;
        assert!(matches!(
            ally_choose_action(&caster, &[], &monsters, &catalog),
            CombatAction::Attack { .. }
        ));
    }
}
