// ═══════════════════════════════════════════════════════════════════════
// Agent Trait — interface every NPC decision maker implements
//
// KEY DESIGN PRINCIPLE:
//   Agents receive a `FactionView` (not the raw WorldState), which only
//   contains what the faction is allowed to see. Rivals' pools,
//   treasuries and generals stay hidden at the type level.
//
//   An agent proposes; the Turn Engine disposes. Every proposed action is
//   re-validated by `apply_action`, so an agent that misjudges its budget
//   only loses that action.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use kingdom_engine::engine::{Action, DevelopFocus, RuleSet};
use kingdom_engine::invasion::{ResponseKind, ResponseOption};
use kingdom_engine::types::*;
use kingdom_engine::visibility::FactionView;

/// One proposed action plus its public-facing annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcAction {
    pub action: Action,
    /// Castle or faction the action is aimed at, if any.
    pub target: Option<String>,
    pub details: Option<String>,
}

impl NpcAction {
    pub fn new(action: Action, details: impl Into<String>) -> Self {
        let target = match &action {
            Action::DevelopCity { city, .. } => Some(city.clone()),
            Action::Attack { target, .. } => Some(target.clone()),
            Action::Diplomacy { target, .. } => Some(target.to_string()),
            Action::UnlockSkill(id) => Some(id.clone()),
            Action::Recruit { .. } | Action::Train | Action::UpgradeFacility(_) => None,
        };
        NpcAction { action, target, details: Some(details.into()) }
    }
}

/// Everything one non-player faction wants to do this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcTurnResult {
    pub faction_id: FactionId,
    pub actions: Vec<NpcAction>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("view belongs to {found}, agent plays {expected}")]
    WrongFaction { expected: FactionId, found: FactionId },
    #[error("{0} holds no castles")]
    NoCastles(FactionId),
    #[error("{0} is not in the world")]
    MissingFaction(FactionId),
}

/// Trait that all NPC agents must implement.
pub trait Agent: Send + Sync {
    /// Human-readable name, used as the key in campaign standings.
    fn name(&self) -> &str;

    /// The faction this agent plays.
    fn faction(&self) -> FactionId;

    /// Plan this turn's actions from the faction's view.
    fn decide(&mut self, view: &FactionView) -> Result<NpcTurnResult, DecisionError>;

    /// Pick an answer to an invasion of our castle. Only meaningful for the
    /// player faction; the default takes the most likely success.
    fn respond_to_invasion(&mut self, options: &[ResponseOption]) -> ResponseKind {
        best_response(options)
    }
}

/// Shared precondition check for `decide` implementations.
pub fn check_view(agent: FactionId, view: &FactionView) -> Result<(), DecisionError> {
    if view.viewer != agent {
        return Err(DecisionError::WrongFaction { expected: agent, found: view.viewer });
    }
    if view.my_castles().next().is_none() {
        return Err(DecisionError::NoCastles(agent));
    }
    Ok(())
}

/// Available option with the highest success rate; ties keep list order.
/// Falls back to Battle, which the engine always accepts while the castle
/// stands.
pub fn best_response(options: &[ResponseOption]) -> ResponseKind {
    options
        .iter()
        .filter(|o| o.available)
        .fold(None::<&ResponseOption>, |best, o| match best {
            Some(b) if b.success_rate >= o.success_rate => Some(b),
            _ => Some(o),
        })
        .map_or(ResponseKind::Battle, |o| o.kind)
}

/// The deterministic safe default: develop the home city.
pub fn fallback_turn(world: &WorldState, faction: FactionId) -> NpcTurnResult {
    let home = world.faction(faction).and_then(|f| {
        f.cities.iter().find(|c| c.name == f.capital).or_else(|| f.cities.first())
    });
    match home {
        Some(city) => NpcTurnResult {
            faction_id: faction,
            actions: vec![NpcAction::new(
                Action::DevelopCity { city: city.name.clone(), focus: DevelopFocus::Commerce },
                "fallback",
            )],
            summary: format!("Tends to {}", city.name),
        },
        None => NpcTurnResult { faction_id: faction, actions: Vec::new(), summary: "Waits".into() },
    }
}

/// Evaluate one faction, falling back to `fallback_turn` on any failure.
/// Never skips the faction.
pub fn decide_or_fallback(agent: &mut dyn Agent, world: &WorldState, rules: &RuleSet) -> NpcTurnResult {
    let faction = agent.faction();
    let decided = FactionView::build(world, faction, rules)
        .ok_or(DecisionError::MissingFaction(faction))
        .and_then(|view| agent.decide(&view));
    match decided {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(%faction, agent = agent.name(), %err, "decision failed, using fallback");
            fallback_turn(world, faction)
        }
    }
}
