//! Integration tests for the transition pipeline: trigger policy, persisted
//! mutations, immediate dispatch and the deferred queue.
//!
//! Run with: cargo test --test pipeline_integration

mod common;

use common::{rule, TestApp};
use domain::models::geofication::CreateGeoficationRequest;
use domain::models::transition::{RawTransitionEvent, TransitionEvent, TransitionType};
use persistence::entities::pending_dispatch::{
    STATUS_DELIVERED, STATUS_FAILED, STATUS_PENDING, STATUS_SKIPPED,
};
use persistence::repositories::PendingDispatchRepository;
use serde_json::json;
use shared::time::{minutes_to_millis, now_millis};

// ============================================================================
// Trigger policy scenarios
// ============================================================================

#[tokio::test]
async fn test_enter_rule_fires_immediately_and_stays_active() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 0, 0)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 1);
    let stored = app.rule(rule_id).await.unwrap();
    assert_eq!(stored.trigger_count, 1);
    assert!(stored.active);

    let dispatched = app.dispatcher.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].geofication.message, "Rule 1/0/0");
    assert_eq!(dispatched[0].geofence.id, fence_id);
    assert_eq!(dispatched[0].transition, TransitionType::Enter);
}

#[tokio::test]
async fn test_deactivating_rule_fires_once() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 1, 0)).await;
    let request_id = fence_id.to_string();

    app.services
        .transitions
        .handle_transition(&request_id, TransitionType::Enter)
        .await;
    let stored = app.rule(rule_id).await.unwrap();
    assert!(!stored.active);
    assert_eq!(stored.trigger_count, 1);
    assert_eq!(app.dispatcher.count(), 1);

    app.services
        .transitions
        .handle_transition(&request_id, TransitionType::Enter)
        .await;
    assert_eq!(app.dispatcher.count(), 1);
    assert_eq!(app.rule(rule_id).await.unwrap().trigger_count, 1);
    // The fence still counts every crossing.
    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 2);
}

#[tokio::test]
async fn test_deleting_rule_removes_fence_and_region() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 2, 0)).await;
    let request_id = fence_id.to_string();
    assert!(app.geofencing.region(&request_id).is_some());

    app.services
        .transitions
        .handle_transition(&request_id, TransitionType::Enter)
        .await;

    assert!(app.fence(fence_id).await.is_none());
    assert!(app.rule(rule_id).await.is_none());
    assert!(app.geofencing.region(&request_id).is_none());
    assert_eq!(app.dispatcher.count(), 1);

    app.services
        .transitions
        .handle_transition(&request_id, TransitionType::Enter)
        .await;
    assert_eq!(app.dispatcher.count(), 1);
    assert!(app
        .log_messages()
        .await
        .iter()
        .any(|m| m.contains(&format!("unknown geofence {}", fence_id))));
}

#[tokio::test]
async fn test_direction_mismatch_counts_fence_only() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(2, 0, 0)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    assert_eq!(app.dispatcher.count(), 0);
    assert_eq!(app.rule(rule_id).await.unwrap().trigger_count, 0);
    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 1);
}

#[tokio::test]
async fn test_delayed_rule_is_queued_and_skipped_when_deleted() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(3, 0, 5)).await;
    let queue = PendingDispatchRepository::new(app.pool.clone());

    let before = now_millis();
    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Exit)
        .await;
    assert_eq!(app.dispatcher.count(), 0);
    assert_eq!(queue.count_by_status(STATUS_PENDING).await.unwrap(), 1);

    // Nothing is due yet.
    let report = app.services.dispatch.deliver_due(before).await;
    assert_eq!(report.claimed, 0);

    app.services.fences.delete_geofication(rule_id).await.unwrap();

    let later = now_millis() + minutes_to_millis(6);
    let report = app.services.dispatch.deliver_due(later).await;
    assert_eq!(report.claimed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(app.dispatcher.count(), 0);
    assert_eq!(queue.count_by_status(STATUS_SKIPPED).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delayed_rule_delivers_when_due() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(3, 0, 5)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Exit)
        .await;
    // The trigger is counted when the transition is handled.
    assert_eq!(app.rule(rule_id).await.unwrap().trigger_count, 1);

    let report = app
        .services
        .dispatch
        .deliver_due(now_millis() + minutes_to_millis(5) + 1_000)
        .await;
    assert_eq!(report.delivered, 1);

    let dispatched = app.dispatcher.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].transition, TransitionType::Exit);
    let queue = PendingDispatchRepository::new(app.pool.clone());
    assert_eq!(queue.count_by_status(STATUS_DELIVERED).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delayed_stay_active_rule_skipped_when_disabled() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 0, 2)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;
    app.services
        .fences
        .disable_geofication(rule_id)
        .await
        .unwrap();

    let report = app
        .services
        .dispatch
        .deliver_due(now_millis() + minutes_to_millis(3))
        .await;
    assert_eq!(report.skipped, 1);
    assert_eq!(app.dispatcher.count(), 0);
}

#[tokio::test]
async fn test_delayed_delete_rule_delivers_snapshot() {
    let app = TestApp::new().await;
    let (fence_id, _) = app.seed_fence(rule(1, 2, 1)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;
    assert!(app.fence(fence_id).await.is_none());

    let report = app
        .services
        .dispatch
        .deliver_due(now_millis() + minutes_to_millis(2))
        .await;
    assert_eq!(report.delivered, 1);
    assert_eq!(app.dispatcher.dispatched()[0].geofence.id, fence_id);
}

#[tokio::test]
async fn test_deleting_rule_takes_every_sibling_with_it() {
    let app = TestApp::new().await;
    let (fence_id, delete_rule) = app.seed_fence(rule(1, 2, 0)).await;
    let mut siblings = Vec::new();
    // Exit only, deactivate after a delay, stay active immediately.
    for body in [rule(2, 0, 0), rule(1, 1, 1), rule(1, 0, 0)] {
        let request: CreateGeoficationRequest = serde_json::from_value(body).unwrap();
        let added = app
            .services
            .fences
            .add_geofication(fence_id, request)
            .await
            .unwrap();
        siblings.push(added.id);
    }
    let (exit_only, delayed, immediate) = (siblings[0], siblings[1], siblings[2]);
    let request_id = fence_id.to_string();

    app.services
        .transitions
        .handle_transition(&request_id, TransitionType::Enter)
        .await;

    assert!(app.fence(fence_id).await.is_none());
    for id in [delete_rule, exit_only, delayed, immediate] {
        assert!(app.rule(id).await.is_none());
    }
    assert!(app.geofencing.region(&request_id).is_none());

    let mut fired: Vec<i64> = app
        .dispatcher
        .dispatched()
        .iter()
        .map(|p| p.geofication.id)
        .collect();
    fired.sort_unstable();
    assert_eq!(fired, vec![delete_rule, immediate]);

    let queue = PendingDispatchRepository::new(app.pool.clone());
    assert_eq!(queue.count_by_status(STATUS_PENDING).await.unwrap(), 1);

    // The delayed sibling still reaches the user after its fence is gone.
    let report = app
        .services
        .dispatch
        .deliver_due(now_millis() + minutes_to_millis(2))
        .await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.skipped, 0);
    let dispatched = app.dispatcher.dispatched();
    assert_eq!(dispatched.len(), 3);
    assert_eq!(dispatched[2].geofication.id, delayed);
    assert_eq!(dispatched[2].geofence.id, fence_id);

    // A repeated crossing finds nothing left to fire.
    app.services
        .transitions
        .handle_transition(&request_id, TransitionType::Enter)
        .await;
    assert_eq!(app.dispatcher.count(), 3);
}

#[tokio::test]
async fn test_non_firing_rule_does_not_delete() {
    let app = TestApp::new().await;
    let (fence_id, delete_rule) = app.seed_fence(rule(2, 2, 0)).await;
    let stay: CreateGeoficationRequest = serde_json::from_value(rule(1, 0, 0)).unwrap();
    let stay_rule = app
        .services
        .fences
        .add_geofication(fence_id, stay)
        .await
        .unwrap();

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    assert!(app.fence(fence_id).await.is_some());
    assert!(app.rule(delete_rule).await.is_some());
    assert_eq!(app.rule(stay_rule.id).await.unwrap().trigger_count, 1);
    assert_eq!(app.dispatcher.count(), 1);
}

// ============================================================================
// Gates and event shapes
// ============================================================================

#[tokio::test]
async fn test_inactive_fence_is_ignored() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(3, 0, 0)).await;
    app.services
        .fences
        .set_geofence_active(fence_id, false)
        .await
        .unwrap();

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    assert_eq!(app.dispatcher.count(), 0);
    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 0);
    assert_eq!(app.rule(rule_id).await.unwrap().trigger_count, 0);
}

#[tokio::test]
async fn test_inactive_rule_does_not_fire() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(3, 0, 0)).await;
    app.services
        .fences
        .disable_geofication(rule_id)
        .await
        .unwrap();

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Exit)
        .await;

    assert_eq!(app.dispatcher.count(), 0);
    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 1);
}

#[tokio::test]
async fn test_malformed_request_id_is_logged() {
    let app = TestApp::new().await;
    app.seed_fence(rule(1, 0, 0)).await;

    for request_id in ["", "abc", "-3", "0"] {
        app.services
            .transitions
            .handle_transition(request_id, TransitionType::Enter)
            .await;
    }

    assert_eq!(app.dispatcher.count(), 0);
    let dropped = app
        .log_messages()
        .await
        .into_iter()
        .filter(|m| m.starts_with("Dropped enter transition"))
        .count();
    assert_eq!(dropped, 4);
}

#[tokio::test]
async fn test_each_rule_evaluated_independently() {
    let app = TestApp::new().await;
    let (fence_id, enter_rule) = app.seed_fence(rule(1, 0, 0)).await;
    let request: CreateGeoficationRequest = serde_json::from_value(json!({
        "message": "Leaving",
        "flags": 2,
    }))
    .unwrap();
    let exit_rule = app
        .services
        .fences
        .add_geofication(fence_id, request)
        .await
        .unwrap();
    let both: CreateGeoficationRequest =
        serde_json::from_value(json!({"message": "Either way", "flags": 3, "isAlarm": true}))
            .unwrap();
    let both_rule = app
        .services
        .fences
        .add_geofication(fence_id, both)
        .await
        .unwrap();

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Exit)
        .await;

    let mut fired: Vec<i64> = app
        .dispatcher
        .dispatched()
        .iter()
        .map(|p| p.geofication.id)
        .collect();
    fired.sort_unstable();
    assert_eq!(fired, vec![exit_rule.id, both_rule.id]);
    assert_eq!(app.rule(enter_rule).await.unwrap().trigger_count, 0);
    assert_eq!(app.rule(exit_rule.id).await.unwrap().trigger_count, 1);
}

#[tokio::test]
async fn test_event_with_several_regions() {
    let app = TestApp::new().await;
    let (first, _) = app.seed_fence(rule(1, 0, 0)).await;
    let (second, _) = app.seed_fence(rule(1, 0, 0)).await;

    let mut event = TransitionEvent::single(first.to_string(), TransitionType::Enter);
    event.triggered_request_ids = vec![second.to_string(), first.to_string(), "999".into()];
    app.services.transitions.on_transition(&event).await;

    assert_eq!(app.dispatcher.count(), 2);
    assert_eq!(app.fence(first).await.unwrap().trigger_count, 1);
    assert_eq!(app.fence(second).await.unwrap().trigger_count, 1);
}

#[tokio::test]
async fn test_equivalent_request_ids_name_one_region() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 0, 0)).await;

    let mut event = TransitionEvent::single(fence_id.to_string(), TransitionType::Enter);
    event.triggered_request_ids = vec![format!("0{}", fence_id), format!(" {}", fence_id)];
    app.services.transitions.on_transition(&event).await;

    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 1);
    assert_eq!(app.rule(rule_id).await.unwrap().trigger_count, 1);
    assert_eq!(app.dispatcher.count(), 1);
}

#[tokio::test]
async fn test_blank_request_id_in_event_is_logged() {
    let app = TestApp::new().await;

    app.services
        .transitions
        .on_transition(&TransitionEvent::single("   ", TransitionType::Enter))
        .await;

    let dropped: Vec<String> = app
        .log_messages()
        .await
        .into_iter()
        .filter(|m| m.starts_with("Dropped enter transition"))
        .collect();
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].contains("empty"));
}

#[tokio::test]
async fn test_unsupported_platform_code_is_dropped() {
    let app = TestApp::new().await;
    let (fence_id, _) = app.seed_fence(rule(3, 0, 0)).await;

    let raw: RawTransitionEvent = serde_json::from_value(json!({
        "requestId": fence_id.to_string(),
        "transition": 4,
    }))
    .unwrap();
    app.services.transitions.on_platform_event(raw).await;

    assert_eq!(app.dispatcher.count(), 0);
    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 0);

    let raw: RawTransitionEvent = serde_json::from_value(json!({
        "requestId": fence_id.to_string(),
        "transition": 2,
    }))
    .unwrap();
    app.services.transitions.on_platform_event(raw).await;
    assert_eq!(app.dispatcher.count(), 1);
}

// ============================================================================
// Concurrency
// ============================================================================

async fn run_parallel(app: &TestApp, request_id: String, times: usize) {
    let handles: Vec<_> = (0..times)
        .map(|_| {
            let handler = app.services.transitions.clone();
            let request_id = request_id.clone();
            tokio::spawn(async move {
                handler
                    .handle_transition(&request_id, TransitionType::Enter)
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_transitions_count_exactly() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 0, 0)).await;

    run_parallel(&app, fence_id.to_string(), 10).await;

    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 10);
    assert_eq!(app.rule(rule_id).await.unwrap().trigger_count, 10);
    assert_eq!(app.dispatcher.count(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_transitions_deactivate_once() {
    let app = TestApp::new().await;
    let (fence_id, rule_id) = app.seed_fence(rule(1, 1, 0)).await;

    run_parallel(&app, fence_id.to_string(), 8).await;

    assert_eq!(app.dispatcher.count(), 1);
    let stored = app.rule(rule_id).await.unwrap();
    assert!(!stored.active);
    assert_eq!(stored.trigger_count, 1);
    assert_eq!(app.fence(fence_id).await.unwrap().trigger_count, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_transitions_delete_once() {
    let app = TestApp::new().await;
    let (fence_id, _) = app.seed_fence(rule(1, 2, 0)).await;

    run_parallel(&app, fence_id.to_string(), 6).await;

    assert_eq!(app.dispatcher.count(), 1);
    assert!(app.fence(fence_id).await.is_none());
}

// ============================================================================
// Delivery failures and restart
// ============================================================================

#[tokio::test]
async fn test_failed_delivery_is_retried_then_given_up() {
    let app = TestApp::with_dispatcher(domain::services::MockNotificationDispatcher::failing()).await;
    let (fence_id, _) = app.seed_fence(rule(1, 0, 1)).await;
    let queue = PendingDispatchRepository::new(app.pool.clone());

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    let mut now = now_millis() + minutes_to_millis(2);
    let mut retried = 0;
    for _ in 0..10 {
        let report = app.services.dispatch.deliver_due(now).await;
        retried += report.retried;
        if report.failed == 1 {
            break;
        }
        now += minutes_to_millis(60);
    }

    // Default policy: four attempts.
    assert_eq!(retried, 3);
    assert_eq!(app.dispatcher.count(), 4);
    assert_eq!(queue.count_by_status(STATUS_FAILED).await.unwrap(), 1);
    assert_eq!(queue.count_by_status(STATUS_PENDING).await.unwrap(), 0);
}

#[tokio::test]
async fn test_immediate_failure_is_handed_to_queue() {
    let app = TestApp::with_dispatcher(domain::services::MockNotificationDispatcher::failing()).await;
    let (fence_id, _) = app.seed_fence(rule(1, 0, 0)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    assert_eq!(app.dispatcher.count(), 1);
    let queue = PendingDispatchRepository::new(app.pool.clone());
    assert_eq!(queue.count_by_status(STATUS_PENDING).await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_permission_is_not_retried() {
    let app =
        TestApp::with_dispatcher(domain::services::MockNotificationDispatcher::without_permission())
            .await;
    let (fence_id, _) = app.seed_fence(rule(1, 0, 1)).await;

    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;
    let report = app
        .services
        .dispatch
        .deliver_due(now_millis() + minutes_to_millis(2))
        .await;

    assert_eq!(report.failed, 1);
    let queue = PendingDispatchRepository::new(app.pool.clone());
    assert_eq!(queue.count_by_status(STATUS_FAILED).await.unwrap(), 1);
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let app = TestApp::new().await;
    let (fence_id, _) = app.seed_fence(rule(1, 0, 1)).await;
    app.services
        .transitions
        .handle_transition(&fence_id.to_string(), TransitionType::Enter)
        .await;

    // Simulate a crash mid-delivery: the row is claimed but never finished.
    let queue = PendingDispatchRepository::new(app.pool.clone());
    let due = now_millis() + minutes_to_millis(2);
    assert_eq!(queue.claim_due(due, 10).await.unwrap().len(), 1);

    let restarted = TestApp::over_pool(
        app.pool.clone(),
        domain::services::MockNotificationDispatcher::new(),
        app.geofencing.clone(),
    );
    assert_eq!(restarted.services.dispatch.recover(due).await, 1);

    let report = restarted.services.dispatch.deliver_due(due).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(restarted.dispatcher.count(), 1);
    assert_eq!(app.dispatcher.count(), 0);
}
