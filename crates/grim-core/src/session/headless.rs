//! Quick no-output resolution for background fights.
//!
//! NPC-versus-NPC encounters elsewhere in the world don't deserve a full
//! session: two combatants trade blows through the same strike math until
//! one drops or the round ceiling calls it a draw. No statuses tick, no
//! abilities fire, no narration is produced.

use crate::combatant::{Combatant, CombatantId};
use crate::consts::HEADLESS_MAX_ROUNDS;
use crate::hooks::Hooks;
use crate::output::NullSink;
use crate::pipeline::{self, Resolver, StrikeOpts, Voice};
use crate::rng::CombatRng;

/// Result of a headless fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessOutcome {
    /// `None` on a draw (round ceiling reached).
    pub winner: Option<CombatantId>,
    pub rounds: u32,
}

/// Fight two combatants to a finish, mutating their HP in place. The caller
/// keeps ownership; a draw leaves both standing.
pub fn resolve(
    a: &mut Combatant,
    b: &mut Combatant,
    rng: &mut CombatRng,
) -> HeadlessOutcome {
    let mut out = NullSink::default();
    let mut hooks = Hooks::default();

    for round in 1..=HEADLESS_MAX_ROUNDS {
        swing(a, b, rng, &mut out, &mut hooks);
        if !b.is_alive() {
            return HeadlessOutcome {
                winner: Some(a.id),
                rounds: round,
            };
        }
        swing(b, a, rng, &mut out, &mut hooks);
        if !a.is_alive() {
            return HeadlessOutcome {
                winner: Some(b.id),
                rounds: round,
            };
        }
    }
    HeadlessOutcome {
        winner: None,
        rounds: HEADLESS_MAX_ROUNDS,
    }
}

fn swing(
    attacker: &mut Combatant,
    defender: &mut Combatant,
    rng: &mut CombatRng,
    out: &mut NullSink,
    hooks: &mut Hooks,
) {
    let name = attacker.name.clone();
    let mut resolver = Resolver {
        rng,
        out,
        hooks,
        voice: Voice::ThirdPerson,
        actor_name: &name,
    };
    let profile = resolver.hooks.equipment.profile(attacker);
    let power = pipeline::attack::attack_power(attacker, &profile, &resolver);
    pipeline::strike_with_power(attacker, defender, power, StrikeOpts::default(), &mut resolver);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_fighter_wins() {
        let mut champ = Combatant::monster(CombatantId(1), "arena champion", 15);
        let mut rat = Combatant::monster(CombatantId(2), "sewer rat", 1);
        let mut rng = CombatRng::new(5);
        let outcome = resolve(&mut champ, &mut rat, &mut rng);
        assert_eq!(outcome.winner, Some(CombatantId(1)));
        assert!(!rat.is_alive());
        assert!(champ.is_alive());
    }

    #[test]
    fn test_round_ceiling_gives_draw() {
        // Two combatants who can barely scratch each other.
        let mut a = Combatant::monster(CombatantId(1), "stone golem", 1);
        let mut b = Combatant::monster(CombatantId(2), "iron golem", 1);
        for c in [&mut a, &mut b] {
            c.max_hp = 1_000_000;
            c.hp = 1_000_000;
            c.stats.defense = 500;
        }
        let mut rng = CombatRng::new(5);
        let outcome = resolve(&mut a, &mut b, &mut rng);
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.rounds, HEADLESS_MAX_ROUNDS);
        assert!(a.is_alive() && b.is_alive());
    }

    #[test]
    fn test_deterministic_under_seed() {
        let run = |seed| {
            let mut a = Combatant::monster(CombatantId(1), "wolf", 6);
            let mut b = Combatant::monster(CombatantId(2), "boar", 6);
            let mut rng = CombatRng::new(seed);
            let o = resolve(&mut a, &mut b, &mut rng);
            (o.winner, o.rounds, a.hp, b.hp)
        };
        assert_eq!(run(99), run(99));
    }
}
