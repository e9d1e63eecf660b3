//! Boss phase director.
//!
//! A boss fight moves through up to three phases keyed to HP fractions.
//! Phase transitions are one-way: once entered, a phase is never left, even
//! if the boss heals back above the threshold. Each transition fires once,
//! with its dialogue and minion wave; later phases unlock extra abilities on
//! top of the earlier ones rather than replacing them.

use serde::{Deserialize, Serialize};

use crate::catalog::{self, AbilityId};
use crate::combatant::Combatant;
use crate::consts::{
    PHASE_2_THRESHOLD, PHASE_3_THRESHOLD, REDEMPTION_MIN_ALIGNMENT, SUMMON_CADENCE,
};

/// A wave of minions the director asks the session to spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinionSpec {
    pub name: String,
    pub level: i32,
    pub count: u32,
}

/// Everything that defines one boss encounter's dramatic arc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossScript {
    /// HP fraction below which phase 2 begins.
    pub phase2_threshold: f64,
    /// HP fraction below which phase 3 begins.
    pub phase3_threshold: f64,
    /// Abilities unlocked per phase; phase N has the union of entries 0..N.
    pub phase_abilities: [Vec<AbilityId>; 3],
    /// Spoken once on entering phases 2 and 3.
    pub phase_dialogue: [Option<String>; 2],
    /// Minions spawned on each summon beat once phase 2 is reached.
    pub summons: Option<MinionSpec>,
    /// Whether this boss can be talked down instead of killed.
    pub can_redeem: bool,
    pub redemption_dialogue: Option<String>,
}

impl BossScript {
    /// The stock arc: crushing blows, then drains and quakes, then the gaze.
    pub fn stock(boss_level: i32) -> Self {
        Self {
            phase2_threshold: PHASE_2_THRESHOLD,
            phase3_threshold: PHASE_3_THRESHOLD,
            phase_abilities: [
                vec![catalog::CRUSHING_BLOW],
                vec![catalog::DEVOURING_MAW, catalog::EARTHSHATTER],
                vec![catalog::DOOM_GAZE],
            ],
            phase_dialogue: [
                Some("You dare wound me? Now you face my true fury!".into()),
                Some("I will not fall to vermin like you!".into()),
            ],
            summons: Some(MinionSpec {
                name: "bound shade".into(),
                level: (boss_level / 2).max(1),
                count: 2,
            }),
            can_redeem: false,
            redemption_dialogue: None,
        }
    }
}

/// One fired phase transition, for the session to narrate and act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseShift {
    pub new_phase: u8,
    pub dialogue: Option<String>,
    pub summons: Option<MinionSpec>,
}

/// Tracks a single boss's phase across the fight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossDirector {
    script: BossScript,
    phase: u8,
    /// Rounds elapsed since phase 2 began, drives the summon cadence.
    rounds_since_escalation: u32,
}

impl BossDirector {
    pub fn new(script: BossScript) -> Self {
        Self {
            script,
            phase: 1,
            rounds_since_escalation: 0,
        }
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Abilities available in the current phase: the union of every phase
    /// reached so far.
    pub fn abilities(&self) -> Vec<AbilityId> {
        self.script.phase_abilities[..self.phase as usize]
            .iter()
            .flatten()
            .copied()
            .collect()
    }

    /// Attacks the boss takes per round; the final phase grants a second.
    pub fn attacks_per_round(&self) -> u32 {
        if self.phase >= 3 { 2 } else { 1 }
    }

    /// Re-read the boss's HP and advance the phase if a threshold was
    /// crossed. Transitions fire at most once and only forward; a single
    /// blow can skip straight to phase 3. Healing never reverts a phase.
    pub fn recompute_phase(&mut self, boss: &Combatant) -> Option<PhaseShift> {
        let frac = boss.hp_fraction();
        let target = if frac < self.script.phase3_threshold {
            3
        } else if frac < self.script.phase2_threshold {
            2
        } else {
            1
        };
        if target <= self.phase {
            return None;
        }
        let was_phase_1 = self.phase == 1;
        self.phase = target;
        Some(PhaseShift {
            new_phase: target,
            dialogue: self.script.phase_dialogue[target as usize - 2].clone(),
            // The first escalation brings the first wave immediately.
            summons: was_phase_1.then(|| self.script.summons.clone()).flatten(),
        })
    }

    /// Called once per round. Once escalated, every [`SUMMON_CADENCE`]th
    /// round brings another minion wave.
    pub fn round_tick(&mut self) -> Option<MinionSpec> {
        if self.phase < 2 {
            return None;
        }
        self.rounds_since_escalation += 1;
        if self.rounds_since_escalation % SUMMON_CADENCE == 0 {
            self.script.summons.clone()
        } else {
            None
        }
    }

    /// Whether the redemption path is open: a wounded, redeemable boss faced
    /// by a sufficiently virtuous relic-bearer.
    pub fn redemption_available(&self, boss: &Combatant, bearer_alignment: i64) -> bool {
        self.script.can_redeem
            && boss.hp_fraction() < self.script.phase2_threshold
            && bearer_alignment >= REDEMPTION_MIN_ALIGNMENT
    }

    pub fn redemption_dialogue(&self) -> Option<&str> {
        self.script.redemption_dialogue.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::CombatantId;

    fn boss_at(frac: f64) -> Combatant {
        let mut b = Combatant::boss(CombatantId(1), "Gravemaw", 20);
        b.max_hp = 1000;
        b.hp = (1000.0 * frac) as i64;
        b
    }

    #[test]
    fn test_threshold_crossing_fires_once() {
        let mut director = BossDirector::new(BossScript::stock(20));
        let boss = boss_at(0.60);
        assert_eq!(director.recompute_phase(&boss), None);

        let boss = boss_at(0.45);
        let shift = director.recompute_phase(&boss).expect("should escalate");
        assert_eq!(shift.new_phase, 2);
        assert!(shift.dialogue.is_some());
        assert!(shift.summons.is_some());

        // Same HP again: no re-trigger.
        assert_eq!(director.recompute_phase(&boss), None);
        assert_eq!(director.phase(), 2);
    }

    #[test]
    fn test_healing_never_reverts_phase() {
        let mut director = BossDirector::new(BossScript::stock(20));
        director.recompute_phase(&boss_at(0.45));
        assert_eq!(director.phase(), 2);
        assert_eq!(director.recompute_phase(&boss_at(0.90)), None);
        assert_eq!(director.phase(), 2);
    }

    #[test]
    fn test_single_blow_skips_to_final_phase() {
        let mut director = BossDirector::new(BossScript::stock(20));
        let shift = director.recompute_phase(&boss_at(0.10)).unwrap();
        assert_eq!(shift.new_phase, 3);
        assert_eq!(director.attacks_per_round(), 2);
    }

    #[test]
    fn test_abilities_accumulate_across_phases() {
        let mut director = BossDirector::new(BossScript::stock(20));
        assert_eq!(director.abilities(), vec![catalog::CRUSHING_BLOW]);

        director.recompute_phase(&boss_at(0.45));
        let abilities = director.abilities();
        assert!(abilities.contains(&catalog::CRUSHING_BLOW));
        assert!(abilities.contains(&catalog::EARTHSHATTER));
        assert!(!abilities.contains(&catalog::DOOM_GAZE));

        director.recompute_phase(&boss_at(0.05));
        assert!(director.abilities().contains(&catalog::DOOM_GAZE));
    }

    #[test]
    fn test_summon_cadence() {
        let mut director = BossDirector::new(BossScript::stock(20));
        // Phase 1: never summons.
        for _ in 0..10 {
            assert_eq!(director.round_tick(), None);
        }
        director.recompute_phase(&boss_at(0.45));
        let mut waves = 0;
        for _ in 0..SUMMON_CADENCE * 3 {
            if director.round_tick().is_some() {
                waves += 1;
            }
        }
        assert_eq!(waves, 3);
    }

    #[test]
    fn test_redemption_gate() {
        let mut script = BossScript::stock(20);
        script.can_redeem = true;
        let director = BossDirector::new(script);

        // Healthy boss: closed.
        assert!(!director.redemption_available(&boss_at(0.80), 50));
        // Wounded but bearer too wicked: closed.
        assert!(!director.redemption_available(&boss_at(0.40), REDEMPTION_MIN_ALIGNMENT - 1));
        // Wounded and virtuous: open.
        assert!(director.redemption_available(&boss_at(0.40), REDEMPTION_MIN_ALIGNMENT));

        // A boss whose script forbids it never opens.
        let stock = BossDirector::new(BossScript::stock(20));
        assert!(!stock.redemption_available(&boss_at(0.40), 100));
    }
}
