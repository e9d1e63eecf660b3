//! Escape attempts.
//!
//! One roll per attempt: base chance plus dexterity and level terms, capped
//! so escape is never a sure thing. A failed attempt costs the runner a bite
//! of chip damage, but chip damage never kills.

use crate::combatant::Combatant;
use crate::consts::{ESCAPE_BASE_CHANCE, ESCAPE_CHANCE_CAP};
use crate::output::ColorTag;

use super::Resolver;

/// Success chance in percent, capped at [`ESCAPE_CHANCE_CAP`].
pub fn escape_chance(actor: &Combatant, faction_bonus: i64) -> i64 {
    let chance = ESCAPE_BASE_CHANCE
        + actor.stats.dexterity / 2
        + actor.level as i64 / 3
        + faction_bonus;
    chance.clamp(0, ESCAPE_CHANCE_CAP)
}

/// Roll one escape attempt. On failure the runner takes chip damage of up to
/// a tenth of max HP, clamped so HP never drops below 1.
pub fn attempt_flee(actor: &mut Combatant, resolver: &mut Resolver) -> bool {
    let bonus = resolver.hooks.faction.escape_bonus(actor);
    let chance = escape_chance(actor, bonus);

    if resolver.rng.percent(chance.max(0) as u32) {
        let line = format!(
            "{} {} from the fight!",
            resolver.subject(),
            resolver.verb("escape", "escapes")
        );
        resolver.out.line(ColorTag::System, &line);
        return true;
    }

    let chip = resolver.rng.rnd((actor.max_hp / 10).max(0) as u32) as i64;
    let chip = chip.min(actor.hp - 1).max(0);
    if chip > 0 {
        actor.hp -= chip;
        let line = format!(
            "{} {} to flee and {} {chip} damage in the scramble!",
            resolver.subject(),
            resolver.verb("fail", "fails"),
            resolver.verb("take", "takes")
        );
        resolver.out.line(ColorTag::EnemyHit, &line);
    } else {
        let line = format!(
            "{} {} to get away!",
            resolver.subject(),
            resolver.verb("fail", "fails")
        );
        resolver.out.line(ColorTag::Warning, &line);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::CombatantId;
    use crate::hooks::Hooks;
    use crate::output::BufferSink;
    use crate::pipeline::Voice;
    use crate::rng::CombatRng;

    fn runner(dex: i64, level: i32) -> Combatant {
        let mut c = Combatant::leader(CombatantId(1), "Mara", level);
        c.stats.dexterity = dex;
        c
    }

    #[test]
    fn test_chance_formula() {
        let c = runner(20, 9);
        // 40 + 20/2 + 9/3 = 53
        assert_eq!(escape_chance(&c, 0), 53);
    }

    #[test]
    fn test_chance_caps_at_seventy_five() {
        let c = runner(200, 30);
        assert_eq!(escape_chance(&c, 0), 75);
        // Faction bonus cannot push past the cap either.
        assert_eq!(escape_chance(&c, 50), 75);
    }

    #[test]
    fn test_faction_bonus_applies_below_cap() {
        let c = runner(10, 3);
        // 40 + 5 + 1 = 46, +10 faction
        assert_eq!(escape_chance(&c, 10), 56);
    }

    #[test]
    fn test_failed_flee_never_kills() {
        for seed in 0..200 {
            let mut c = runner(0, 1);
            c.max_hp = 100;
            c.hp = 2;
            let mut rng = CombatRng::new(seed);
            let mut out = BufferSink::new();
            let mut hooks = Hooks::default();
            let mut resolver = Resolver {
                rng: &mut rng,
                out: &mut out,
                hooks: &mut hooks,
                voice: Voice::ThirdPerson,
                actor_name: "Mara",
            };
            attempt_flee(&mut c, &mut resolver);
            assert!(c.hp >= 1, "seed {seed} left runner at {} hp", c.hp);
        }
    }

    #[test]
    fn test_both_outcomes_reachable() {
        let mut escaped = 0;
        let mut failed = 0;
        for seed in 0..100 {
            let mut c = runner(20, 9);
            let mut rng = CombatRng::new(seed);
            let mut out = BufferSink::new();
            let mut hooks = Hooks::default();
            let mut resolver = Resolver {
                rng: &mut rng,
                out: &mut out,
                hooks: &mut hooks,
                voice: Voice::ThirdPerson,
                actor_name: "Mara",
            };
            if attempt_flee(&mut c, &mut resolver) {
                escaped += 1;
            } else {
                failed += 1;
            }
        }
        assert!(escaped > 0, "no escape in 100 seeds at 53%");
        assert!(failed > 0, "no failure in 100 seeds at 53%");
    }
}
