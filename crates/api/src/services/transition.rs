//! Transition handler.
//!
//! Entry point of the geofence-transition pipeline. Resolves the reported
//! region, applies trigger policy to every rule bound to it, persists the
//! resulting mutations and hands one payload per firing rule to the
//! dispatch service.
//!
//! Nothing here returns an error: failures end up in the diagnostic log.

use std::collections::HashSet;

use domain::models::dispatch::DispatchPayload;
use domain::models::geofence::Geofence;
use domain::models::geofication::{Geofication, PostTriggerAction};
use domain::models::transition::{
    parse_request_id, RawTransitionEvent, TransitionEvent, TransitionType,
};
use domain::services::{plan_transition, FiringRule};
use persistence::repositories::{GeofenceRepository, GeoficationRepository};
use shared::time::now_millis;
use tracing::Instrument;

use super::{DiagnosticLog, DispatchService, RegionRegistrar};

#[derive(Clone)]
pub struct TransitionHandler {
    geofences: GeofenceRepository,
    geofications: GeoficationRepository,
    dispatch: DispatchService,
    regions: RegionRegistrar,
    log: DiagnosticLog,
}

impl TransitionHandler {
    pub fn new(
        geofences: GeofenceRepository,
        geofications: GeoficationRepository,
        dispatch: DispatchService,
        regions: RegionRegistrar,
        log: DiagnosticLog,
    ) -> Self {
        Self {
            geofences,
            geofications,
            dispatch,
            regions,
            log,
        }
    }

    /// Handle an event as delivered by the platform bridge. Unsupported
    /// transition codes are logged and dropped.
    pub async fn on_platform_event(&self, raw: RawTransitionEvent) {
        let request_id = raw.request_id.clone();
        match raw.into_event() {
            Ok(event) => self.on_transition(&event).await,
            Err(reason) => {
                metrics::counter!("geofence_transitions_dropped_total").increment(1);
                self.log
                    .warning(format!(
                        "Dropped transition for request {}: {}",
                        request_id, reason
                    ))
                    .await;
            }
        }
    }

    /// Handle every region carried by the event, each independently.
    pub async fn on_transition(&self, event: &TransitionEvent) {
        for request_id in event.request_ids() {
            self.handle_transition(request_id, event.transition).await;
        }
    }

    /// Run the pipeline for one region crossing.
    pub async fn handle_transition(&self, request_id: &str, transition: TransitionType) {
        let span = tracing::info_span!(
            "geofence_transition",
            request_id = %request_id,
            transition = %transition
        );
        self.process(request_id, transition).instrument(span).await
    }

    async fn process(&self, request_id: &str, transition: TransitionType) {
        metrics::counter!("geofence_transitions_total", "transition" => transition.as_str())
            .increment(1);
        let triggered_at = now_millis();

        let geofence_id = match parse_request_id(request_id) {
            Ok(id) => id,
            Err(e) => {
                self.log
                    .warning(format!("Dropped {} transition: {}", transition, e))
                    .await;
                return;
            }
        };

        let geofence: Geofence = match self.geofences.find_by_id(geofence_id).await {
            Ok(Some(entity)) => entity.into(),
            Ok(None) => {
                self.log
                    .info(format!(
                        "Ignored {} transition for unknown geofence {}",
                        transition, geofence_id
                    ))
                    .await;
                return;
            }
            Err(e) => {
                self.log
                    .error(format!("Failed to load geofence {}: {}", geofence_id, e))
                    .await;
                return;
            }
        };

        if !geofence.active {
            self.log
                .info(format!(
                    "Ignored {} transition for inactive geofence {}",
                    transition, geofence_id
                ))
                .await;
            return;
        }

        match self.geofences.increment_trigger_count(geofence_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.log
                    .info(format!(
                        "Geofence {} disappeared while handling {} transition",
                        geofence_id, transition
                    ))
                    .await;
                return;
            }
            Err(e) => {
                self.log
                    .error(format!(
                        "Failed to count transition for geofence {}: {}",
                        geofence_id, e
                    ))
                    .await;
                return;
            }
        }

        let rules: Vec<Geofication> = match self.geofications.find_by_geofence_id(geofence_id).await
        {
            Ok(rows) => rows.into_iter().map(Into::into).collect(),
            Err(e) => {
                self.log
                    .error(format!(
                        "Failed to load geofications of geofence {}: {}",
                        geofence_id, e
                    ))
                    .await;
                return;
            }
        };

        let plan = plan_transition(&rules, transition);
        if plan.is_empty() {
            self.log
                .debug(format!(
                    "{} transition of geofence {}: no geofication fires ({} ignored)",
                    transition, geofence_id, plan.ignored
                ))
                .await;
            return;
        }

        let mut lost_claims = HashSet::new();
        for geofication_id in plan.deactivations() {
            if !self.claim_deactivation(geofication_id, triggered_at).await {
                lost_claims.insert(geofication_id);
            }
        }
        let firing: Vec<FiringRule> = plan
            .firing
            .into_iter()
            .filter(|rule| !lost_claims.contains(&rule.geofication.id))
            .collect();

        let deleted = plan.deletes_geofence;
        if deleted {
            match self.geofences.delete(geofence_id).await {
                Ok(0) => {
                    self.log
                        .info(format!(
                            "Geofence {} was already deleted by a concurrent transition",
                            geofence_id
                        ))
                        .await;
                    return;
                }
                Ok(_) => {
                    self.regions.unregister(geofence_id).await;
                    self.log
                        .info(format!(
                            "Deleted geofence {} ({}) after its geofication fired",
                            geofence_id, geofence.name
                        ))
                        .await;
                }
                Err(e) => {
                    self.log
                        .error(format!(
                            "Failed to delete geofence {}, {} transition not dispatched: {}",
                            geofence_id, transition, e
                        ))
                        .await;
                    return;
                }
            }
        }

        for rule in &firing {
            // The rows are gone once the geofence is deleted.
            if !deleted {
                if let Err(e) = self
                    .geofications
                    .increment_trigger_count(rule.geofication.id)
                    .await
                {
                    tracing::warn!(
                        geofication_id = rule.geofication.id,
                        error = %e,
                        "Failed to count trigger"
                    );
                }
            }

            // Every sibling went with the deleted geofence, so a queued
            // snapshot must pass the fire-time re-check on its own.
            let action = if deleted {
                PostTriggerAction::DeleteGeofence
            } else {
                rule.action()
            };
            let payload =
                DispatchPayload::capture(&geofence, &rule.geofication, transition, triggered_at);
            self.dispatch
                .schedule(&payload, rule.decision.delay_minutes, action)
                .await;
        }

        self.log
            .info(format!(
                "{} transition of geofence {}: {} fired, {} ignored",
                transition,
                geofence_id,
                firing.len(),
                plan.ignored
            ))
            .await;
    }

    /// Flip the rule to inactive. Only the caller that flipped it may fire it.
    async fn claim_deactivation(&self, geofication_id: i64, now: i64) -> bool {
        match self
            .geofications
            .deactivate_if_active(geofication_id, now)
            .await
        {
            Ok(true) => {
                self.log
                    .info(format!("Deactivated geofication {}", geofication_id))
                    .await;
                true
            }
            Ok(false) => {
                self.log
                    .debug(format!(
                        "Geofication {} was already deactivated by a concurrent transition",
                        geofication_id
                    ))
                    .await;
                false
            }
            Err(e) => {
                self.log
                    .error(format!(
                        "Failed to deactivate geofication {}: {}",
                        geofication_id, e
                    ))
                    .await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{DispatchSettings, Services};
    use domain::services::{InMemoryGeofencingClient, MockNotificationDispatcher};
    use persistence::db::create_memory_pool;
    use persistence::repositories::{GeofenceInput, GeoficationInput};
    use std::sync::Arc;

    async fn setup() -> (Services, MockNotificationDispatcher, GeofenceRepository) {
        let pool = create_memory_pool().await.unwrap();
        let mock = MockNotificationDispatcher::new();
        let services = Services::new(
            pool.clone(),
            Arc::new(mock.clone()),
            Arc::new(InMemoryGeofencingClient::new(100)),
            DispatchSettings {
                batch_size: 10,
                max_attempts: 4,
            },
        );
        (services, mock, GeofenceRepository::new(pool))
    }

    async fn fence_with_rule(repo: &GeofenceRepository, flags: i64, on_trigger: i64) -> (i64, i64) {
        let (fence, rule) = repo
            .create_with_geofication(
                &GeofenceInput {
                    name: "Station",
                    latitude: 51.5,
                    longitude: -0.12,
                    radius_meters: 200.0,
                    color: 5,
                    active: true,
                },
                &GeoficationInput {
                    message: "Top up travel card",
                    flags,
                    delay_minutes: 0,
                    repeat: false,
                    active: true,
                    on_trigger,
                    link: None,
                    is_alarm: false,
                },
                1,
            )
            .await
            .unwrap();
        (fence.id, rule.id)
    }

    #[tokio::test]
    async fn test_malformed_request_id_is_dropped() {
        let (services, mock, _) = setup().await;
        services
            .transitions
            .handle_transition("not-a-number", TransitionType::Enter)
            .await;
        assert_eq!(mock.count(), 0);
    }

    #[tokio::test]
    async fn test_inactive_geofence_is_not_counted() {
        let (services, mock, repo) = setup().await;
        let (fence_id, _) = fence_with_rule(&repo, 3, 0).await;
        repo.set_active(fence_id, false, 2).await.unwrap();

        services
            .transitions
            .handle_transition(&fence_id.to_string(), TransitionType::Enter)
            .await;

        let fence = repo.find_by_id(fence_id).await.unwrap().unwrap();
        assert_eq!(fence.trigger_count, 0);
        assert_eq!(mock.count(), 0);
    }

    #[tokio::test]
    async fn test_stay_active_rule_fires_and_counts() {
        let (services, mock, repo) = setup().await;
        let (fence_id, rule_id) = fence_with_rule(&repo, 1, 0).await;

        services
            .transitions
            .handle_transition(&fence_id.to_string(), TransitionType::Enter)
            .await;

        let fence = repo.find_by_id(fence_id).await.unwrap().unwrap();
        assert_eq!(fence.trigger_count, 1);
        assert_eq!(mock.count(), 1);
        assert_eq!(mock.dispatched()[0].geofication.id, rule_id);
    }

    #[tokio::test]
    async fn test_unsupported_platform_code_is_dropped() {
        let (services, mock, repo) = setup().await;
        let (fence_id, _) = fence_with_rule(&repo, 3, 0).await;

        let raw: RawTransitionEvent = serde_json::from_value(serde_json::json!({
            "requestId": fence_id.to_string(),
            "transition": 4
        }))
        .unwrap();
        services.transitions.on_platform_event(raw).await;

        let fence = repo.find_by_id(fence_id).await.unwrap().unwrap();
        assert_eq!(fence.trigger_count, 0);
        assert_eq!(mock.count(), 0);
    }

    #[tokio::test]
    async fn test_failed_geofence_delete_dispatches_nothing() {
        let pool = create_memory_pool().await.unwrap();
        let mock = MockNotificationDispatcher::new();
        let services = Services::new(
            pool.clone(),
            Arc::new(mock.clone()),
            Arc::new(InMemoryGeofencingClient::new(100)),
            DispatchSettings {
                batch_size: 10,
                max_attempts: 4,
            },
        );
        let repo = GeofenceRepository::new(pool.clone());
        let (fence_id, rule_id) = fence_with_rule(&repo, 1, 2).await;
        sqlx::query(
            "CREATE TRIGGER block_geofence_delete BEFORE DELETE ON geofences \
             BEGIN SELECT RAISE(ABORT, 'delete blocked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        services
            .transitions
            .handle_transition(&fence_id.to_string(), TransitionType::Enter)
            .await;

        assert_eq!(mock.count(), 0);
        assert!(repo.find_by_id(fence_id).await.unwrap().is_some());
        let rule = GeoficationRepository::new(pool.clone())
            .find_by_id(rule_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rule.trigger_count, 0);

        let messages: Vec<String> =
            sqlx::query_scalar("SELECT message FROM log_entries ORDER BY id DESC")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(messages
            .iter()
            .any(|m| m.starts_with(&format!("Failed to delete geofence {}", fence_id))));
    }

    #[tokio::test]
    async fn test_event_handles_each_request_id_once() {
        let (services, mock, repo) = setup().await;
        let (a, _) = fence_with_rule(&repo, 3, 0).await;
        let (b, _) = fence_with_rule(&repo, 3, 0).await;

        let event = TransitionEvent {
            request_id: a.to_string(),
            transition: TransitionType::Exit,
            triggered_request_ids: vec![a.to_string(), b.to_string()],
        };
        services.transitions.on_transition(&event).await;

        assert_eq!(repo.find_by_id(a).await.unwrap().unwrap().trigger_count, 1);
        assert_eq!(repo.find_by_id(b).await.unwrap().unwrap().trigger_count, 1);
        assert_eq!(mock.count(), 2);
    }
}
