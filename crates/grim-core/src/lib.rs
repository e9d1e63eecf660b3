//! grim-core: turn-based party combat engine.
//!
//! This crate contains the whole combat model with no I/O dependencies:
//! combatants and their status ledgers, the action resolution pipeline, the
//! boss phase director, the round state machine and the reward resolver.
//! Rendering, item catalogs, the wider world and persistence sit behind the
//! seams in [`output`], [`hooks`] and [`gateway`]; the engine only emits
//! tagged text lines and queries its collaborators.
//!
//! All randomness flows through one seedable [`rng::CombatRng`], so a whole
//! fight replays deterministically from a seed.

pub mod action;
pub mod boss;
pub mod catalog;
pub mod combatant;
pub mod errors;
pub mod gateway;
pub mod hooks;
pub mod narrate;
pub mod output;
pub mod pipeline;
pub mod reward;
pub mod session;
pub mod status;
pub mod turn;

mod consts;
mod rng;

pub use consts::*;
pub use rng::CombatRng;

pub use action::{ActionProvider, CombatAction, Scripted, TargetRef, TurnView};
pub use boss::{BossDirector, BossScript, MinionSpec, PhaseShift};
pub use combatant::{Capabilities, Combatant, CombatantId, CombatantKind, Stats};
pub use errors::CombatError;
pub use gateway::{ChannelTransport, InputGateway, PartyTransport, RemoteEnd};
pub use hooks::{EquipmentProfile, Hooks};
pub use output::{BufferSink, ColorTag, CombatOutput, NullSink, OutputLine};
pub use reward::{DefeatedMonster, LootProvider, RewardSummary, resolve_rewards};
pub use session::{Ambush, CombatSession, Outcome, SessionState, TurnContext};
pub use status::{StatusKind, StatusLedger};
