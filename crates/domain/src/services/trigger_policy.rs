//! Trigger policy engine.
//!
//! Pure decision logic: given a rule and a transition, decide whether the
//! rule fires, how long delivery is delayed and which post-trigger action
//! follows. No I/O happens here; the transition handler applies the outcome.
//!
//! Rules that do not fire never contribute a lifecycle action, so an inactive
//! rule cannot deactivate itself or delete its geofence as a side effect of a
//! transition it ignores.

use serde::Serialize;

use crate::models::geofication::{Geofication, PostTriggerAction};
use crate::models::transition::TransitionType;

/// Outcome of evaluating one rule against one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDecision {
    pub fires: bool,
    pub delay_minutes: i64,
    /// Present only when the rule fires.
    pub post_trigger_action: Option<PostTriggerAction>,
}

impl TriggerDecision {
    /// Decision for a rule that ignores the transition.
    pub fn ignored() -> Self {
        Self {
            fires: false,
            delay_minutes: 0,
            post_trigger_action: None,
        }
    }
}

/// Evaluates a single rule.
///
/// Fires iff the rule is active and its direction flags equal the
/// transition bit or are BOTH.
pub fn evaluate(geofication: &Geofication, transition: TransitionType) -> TriggerDecision {
    if !geofication.active || !geofication.flags.matches(transition) {
        return TriggerDecision::ignored();
    }

    TriggerDecision {
        fires: true,
        delay_minutes: geofication.delay_minutes,
        post_trigger_action: Some(geofication.on_trigger),
    }
}

/// A rule selected to fire, with its decision.
#[derive(Debug, Clone, PartialEq)]
pub struct FiringRule {
    pub geofication: Geofication,
    pub decision: TriggerDecision,
}

impl FiringRule {
    pub fn action(&self) -> PostTriggerAction {
        self.decision
            .post_trigger_action
            .unwrap_or(self.geofication.on_trigger)
    }
}

/// Aggregated outcome for every rule of one geofence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionPlan {
    pub firing: Vec<FiringRule>,
    /// Number of rules that ignored the transition.
    pub ignored: usize,
    /// At least one firing rule deletes the geofence.
    pub deletes_geofence: bool,
}

impl TransitionPlan {
    /// Whether nothing fires.
    pub fn is_empty(&self) -> bool {
        self.firing.is_empty()
    }

    /// Ids of firing rules that deactivate themselves.
    pub fn deactivations(&self) -> Vec<i64> {
        self.firing
            .iter()
            .filter(|f| f.action() == PostTriggerAction::Deactivate)
            .map(|f| f.geofication.id)
            .collect()
    }
}

/// Evaluates every rule of a geofence. There is no short-circuit: all rules
/// are considered, and the relative order of firing rules carries no meaning.
pub fn plan_transition(geofications: &[Geofication], transition: TransitionType) -> TransitionPlan {
    let mut plan = TransitionPlan::default();

    for geofication in geofications {
        let decision = evaluate(geofication, transition);
        if !decision.fires {
            plan.ignored += 1;
            continue;
        }

        if decision.post_trigger_action == Some(PostTriggerAction::DeleteGeofence) {
            plan.deletes_geofence = true;
        }

        plan.firing.push(FiringRule {
            geofication: geofication.clone(),
            decision,
        });
    }

    plan
}
