//! Lifecycle controller tests.
//!
//! Drives `MeetingController` against `MockFacade` and `MockProvisioning`:
//! - authenticate dedup, failure and recorder role
//! - join device selection, meter and failure rollback
//! - leave / end teardown, confirmation and re-entrancy
//! - facade stop classification (full reset vs soft recovery)
//! - in-meeting device switches under the fault monitor

#![allow(clippy::unwrap_used, clippy::expect_used)]

use meeting_client::audio_meter::MeterStatus;
use meeting_client::config::RECORDER_DISPLAY_NAME;
use meeting_client::devices::{AudioInputSelection, AudioOutputSelection};
use meeting_client::errors::ClientError;
use meeting_client::facade::{FacadeEvent, SessionStatusCode, StopDisposition};
use meeting_client::lifecycle::{
    ButtonStates, ControlButton, LifecycleState, TransitionOutcome, END_CONFIRMATION_PROMPT,
};
use meeting_client::session::SessionNotification;
use meeting_client::{ClientConfig, MeetingController};
use meeting_test_utils::{
    attendee, test_config, test_config_with, MockFacade, MockProvisioning, RecordingSink,
    ScriptedWaveform,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// Test Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    controller: MeetingController,
    facade: MockFacade,
    provisioning: MockProvisioning,
}

fn harness_with(config: ClientConfig, facade: MockFacade, provisioning: MockProvisioning) -> Harness {
    let controller = MeetingController::new(
        config,
        Arc::new(provisioning.clone()),
        Arc::new(facade.clone()),
        Arc::new(RecordingSink::new()),
    );
    Harness {
        controller,
        facade,
        provisioning,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), MockFacade::new(), MockProvisioning::new())
}

async fn settle<T>(rx: &mut watch::Receiver<T>, predicate: impl FnMut(&T) -> bool) {
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

async fn wait_for_state(controller: &MeetingController, state: LifecycleState) {
    let mut rx = controller.lifecycle().subscribe();
    settle(&mut rx, |current| *current == state).await;
}

async fn joined(h: &Harness) {
    h.controller.authenticate("standup", "Alice").await.unwrap();
    h.controller.join().await.unwrap();
    assert_eq!(h.controller.state(), LifecycleState::Active);
}

// ============================================================================
// Authenticate
// ============================================================================

#[tokio::test]
async fn test_concurrent_authenticate_issues_single_join() {
    let h = harness_with(
        test_config(),
        MockFacade::new(),
        MockProvisioning::new().with_delay(Duration::from_millis(50)),
    );

    let (first, second) = tokio::join!(
        h.controller.authenticate("standup", "Alice"),
        h.controller.authenticate("standup", "Alice"),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.provisioning.join_count(), 1);
    assert_eq!(h.facade.initialize_count(), 1);
    assert_eq!(h.controller.state(), LifecycleState::Authenticated);
}

#[tokio::test]
async fn test_authenticate_after_completion_reuses_session() {
    let h = harness();

    let first = h.controller.authenticate("standup", "Alice").await.unwrap();
    let second = h.controller.authenticate("standup", "Alice").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.provisioning.join_count(), 1);
    assert_eq!(h.facade.initialize_count(), 1);
    assert_eq!(h.controller.state(), LifecycleState::Authenticated);

    h.controller.join().await.unwrap();
    let third = h.controller.authenticate("standup", "Alice").await.unwrap();
    assert_eq!(third, first);
    assert_eq!(h.controller.state(), LifecycleState::Active);
    assert_eq!(h.provisioning.join_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_authenticate_without_delay_never_rejects() {
    for _ in 0..50 {
        let h = Arc::new(harness());

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let h = Arc::clone(&h);
                tokio::spawn(async move { h.controller.authenticate("standup", "Alice").await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        assert_eq!(ids.first(), ids.last());
        assert_eq!(h.provisioning.join_count(), 1);
        assert_eq!(h.controller.state(), LifecycleState::Authenticated);
    }
}

#[tokio::test]
async fn test_authenticate_other_title_replaces_unjoined_session() {
    let h = harness();

    let standup = h.controller.authenticate("standup", "Alice").await.unwrap();
    let retro = h.controller.authenticate("retro", "Alice").await.unwrap();

    assert_ne!(standup, retro);
    assert_eq!(h.provisioning.join_count(), 2);
    assert_eq!(h.facade.initialize_count(), 2);
    assert_eq!(h.controller.state(), LifecycleState::Authenticated);

    // The replaced title is no longer cached
    h.controller.authenticate("standup", "Alice").await.unwrap();
    assert_eq!(h.provisioning.join_count(), 3);
}

#[tokio::test]
async fn test_authenticate_other_title_while_joined_is_rejected() {
    let h = harness();
    joined(&h).await;

    let err = h.controller.authenticate("retro", "Alice").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::InvalidTransition {
            from: LifecycleState::Active,
            to: LifecycleState::Authenticating
        }
    ));
    assert_eq!(h.provisioning.join_count(), 1);
}

#[tokio::test]
async fn test_authenticate_passes_credentials_to_facade() {
    let h = harness();

    let meeting_id = h.controller.authenticate("standup", "Alice").await.unwrap();

    let configuration = h.facade.last_configuration().unwrap();
    assert_eq!(configuration.meeting_id, meeting_id);
    assert_eq!(configuration.external_user_id, "0a1b2c3d#Alice");
    assert_eq!(configuration.media_region, "us-east-1");
    assert_eq!(configuration.attendee_presence_timeout, Duration::from_millis(5000));

    let request = h.provisioning.requests().first().cloned().unwrap();
    assert_eq!(request.title, "standup");
    assert_eq!(request.region, "us-east-1");
}

#[tokio::test]
async fn test_authenticate_failure_returns_to_idle_and_is_not_cached() {
    let h = harness_with(
        test_config(),
        MockFacade::new(),
        MockProvisioning::new().failing_join("Need parameters: title, name, region"),
    );

    let err = h.controller.authenticate("standup", "Alice").await.unwrap_err();
    assert!(matches!(err, ClientError::Provisioning(_)));
    assert!(err.is_user_visible());
    assert_eq!(h.controller.state(), LifecycleState::Idle);
    assert_eq!(h.facade.initialize_count(), 0);

    // join cannot proceed without a session
    assert!(matches!(h.controller.join().await, Err(ClientError::NoSession)));

    h.provisioning.set_fail_join(None);
    h.controller.authenticate("standup", "Alice").await.unwrap();
    assert_eq!(h.provisioning.join_count(), 2);
    assert_eq!(h.controller.state(), LifecycleState::Authenticated);
}

#[tokio::test]
async fn test_nearest_region_is_preselected_for_join() {
    let h = harness_with(
        test_config(),
        MockFacade::new(),
        MockProvisioning::new().with_nearest_region("ap-south-1"),
    );

    assert_eq!(h.controller.resolve_media_region().await, "ap-south-1");
    let regions = h.controller.media_regions().borrow().clone();
    assert_eq!(regions.supported(), ["us-east-1", "ap-south-1"]);

    h.controller.authenticate("standup", "Alice").await.unwrap();
    let request = h.provisioning.requests().first().cloned().unwrap();
    assert_eq!(request.region, "ap-south-1");
}

#[tokio::test]
async fn test_pinned_region_skips_lookup() {
    let h = harness_with(
        test_config_with(&[("MEETING_REGION", "eu-west-1")]),
        MockFacade::new(),
        MockProvisioning::new().with_nearest_region("ap-south-1"),
    );

    assert_eq!(h.controller.resolve_media_region().await, "eu-west-1");
    assert_eq!(h.controller.media_regions().borrow().supported(), ["eu-west-1"]);
}

#[tokio::test]
async fn test_failed_region_lookup_keeps_default() {
    // No locator configured
    let h = harness();
    assert_eq!(h.controller.resolve_media_region().await, "us-east-1");

    let h = harness_with(
        test_config(),
        MockFacade::new(),
        MockProvisioning::new().with_nearest_region(""),
    );
    assert_eq!(h.controller.resolve_media_region().await, "us-east-1");
    assert_eq!(h.controller.media_regions().borrow().supported(), ["us-east-1"]);
}

#[tokio::test]
async fn test_select_media_region_requires_offered_region() {
    let h = harness_with(
        test_config_with(&[("MEETING_SUPPORTED_REGIONS", "us-east-1,eu-west-1")]),
        MockFacade::new(),
        MockProvisioning::new(),
    );

    h.controller.select_media_region("eu-west-1").unwrap();
    assert!(matches!(
        h.controller.select_media_region("mars-1"),
        Err(ClientError::Config(_))
    ));

    h.controller.authenticate("standup", "Alice").await.unwrap();
    let request = h.provisioning.requests().first().cloned().unwrap();
    assert_eq!(request.region, "eu-west-1");
}

#[tokio::test]
async fn test_recorder_joins_without_microphone() {
    let h = harness_with(
        test_config_with(&[("MEETING_ROLE", "recorder")]),
        MockFacade::new().with_waveform(ScriptedWaveform::full_scale(32)),
        MockProvisioning::new(),
    );

    h.controller.authenticate("standup", "Alice").await.unwrap();
    h.controller.join().await.unwrap();

    let request = h.provisioning.requests().first().cloned().unwrap();
    assert_eq!(request.name, RECORDER_DISPLAY_NAME);
    assert_eq!(h.facade.chosen_inputs(), vec![AudioInputSelection::None]);
    assert_eq!(h.facade.analysers_created(), 0);
    assert!(h.controller.audio_level().await.is_none());
}

#[tokio::test]
async fn test_speaker_scores_interval_follows_config() {
    let h = harness_with(
        test_config_with(&[("MEETING_SHOW_SPEAKER_SCORES", "true")]),
        MockFacade::new(),
        MockProvisioning::new(),
    );
    h.controller.authenticate("standup", "Alice").await.unwrap();
    assert_eq!(h.facade.score_interval(), Some(Duration::from_millis(100)));

    let h = harness();
    h.controller.authenticate("standup", "Alice").await.unwrap();
    assert_eq!(h.facade.score_interval(), Some(Duration::ZERO));
}

// ============================================================================
// Join
// ============================================================================

#[tokio::test]
async fn test_join_opens_devices_and_runs_meter() {
    let h = harness_with(
        test_config(),
        MockFacade::new().with_waveform(ScriptedWaveform::full_scale(32)),
        MockProvisioning::new(),
    );

    joined(&h).await;

    assert_eq!(h.facade.chosen_inputs(), vec![AudioInputSelection::Default]);
    assert_eq!(h.facade.chosen_outputs(), vec![AudioOutputSelection::Default]);
    assert_eq!(h.facade.start_count(), 1);
    assert_eq!(h.controller.meter_status().await, Some(MeterStatus::Running));

    let mut level = h.controller.audio_level().await.unwrap();
    settle(&mut level, |percent| *percent > 99.0).await;
}

#[tokio::test]
async fn test_meter_without_waveform_support_is_hidden() {
    let h = harness_with(
        test_config(),
        MockFacade::new().with_waveform(ScriptedWaveform::silent(32).without_time_domain()),
        MockProvisioning::new(),
    );

    joined(&h).await;

    assert_eq!(h.controller.meter_status().await, Some(MeterStatus::Hidden));
}

#[tokio::test]
async fn test_join_failure_reverts_to_authenticated() {
    let h = harness_with(test_config(), MockFacade::new().failing_start(), MockProvisioning::new());

    h.controller.authenticate("standup", "Alice").await.unwrap();
    let err = h.controller.join().await.unwrap_err();

    assert!(matches!(err, ClientError::Facade(_)));
    assert_eq!(h.controller.state(), LifecycleState::Authenticated);
    assert!(h.controller.meter_status().await.is_none());
    assert_eq!(h.controller.fault_count().await, 0);
}

#[tokio::test]
async fn test_join_before_authenticate_is_rejected() {
    let h = harness();
    assert!(matches!(h.controller.join().await, Err(ClientError::NoSession)));
    assert_eq!(h.controller.state(), LifecycleState::Idle);
}

// ============================================================================
// Leave / End
// ============================================================================

#[tokio::test]
async fn test_leave_clears_roster_and_stops_facade() {
    let h = harness();
    joined(&h).await;

    let a1 = attendee("a1");
    let mut roster = h.controller.roster();
    h.facade.emit_presence(&a1, true, "0a1b2c3d#Bob", false);
    settle(&mut roster, |snapshot| snapshot.row(&a1).is_some()).await;

    let outcome = h.controller.leave().await.unwrap();

    assert_eq!(outcome, TransitionOutcome::Completed);
    assert_eq!(h.controller.state(), LifecycleState::Terminated);
    assert!(h.controller.roster().borrow().rows.is_empty());
    assert_eq!(h.facade.stop_count(), 1);
    assert!(!h.facade.is_volume_subscribed(&a1));
    assert!(h.controller.controls().current().leave_enabled);
    assert!(matches!(h.controller.stats().await, Err(ClientError::NoSession)));
}

#[tokio::test]
async fn test_toggled_controls_reset_on_leave() {
    let h = harness();
    joined(&h).await;

    assert!(!h.controller.toggle_control(ControlButton::Microphone));
    assert!(h.controller.toggle_control(ControlButton::Camera));
    let buttons = h.controller.controls().current().buttons;
    assert!(!buttons.microphone);
    assert!(buttons.camera);

    h.controller.leave().await.unwrap();

    assert_eq!(h.controller.controls().current().buttons, ButtonStates::default());
}

#[tokio::test]
async fn test_leave_is_idempotent() {
    let h = harness();

    assert_eq!(h.controller.leave().await.unwrap(), TransitionOutcome::NotInMeeting);

    joined(&h).await;
    assert_eq!(h.controller.leave().await.unwrap(), TransitionOutcome::Completed);
    assert_eq!(h.controller.leave().await.unwrap(), TransitionOutcome::NotInMeeting);
    assert_eq!(h.facade.stop_count(), 1);
}

#[tokio::test]
async fn test_leave_while_transition_in_progress_is_noop() {
    let h = harness();
    joined(&h).await;

    let guard = h.controller.controls().begin_transition().unwrap();
    assert_eq!(h.controller.leave().await.unwrap(), TransitionOutcome::InProgress);
    assert_eq!(h.controller.end(|_| true).await.unwrap(), TransitionOutcome::InProgress);
    drop(guard);

    assert_eq!(h.controller.state(), LifecycleState::Active);
    assert_eq!(h.facade.stop_count(), 0);
}

#[tokio::test]
async fn test_leave_then_rejoin_sends_new_join() {
    let h = harness();
    joined(&h).await;
    h.controller.leave().await.unwrap();

    h.controller.authenticate("standup", "Alice").await.unwrap();
    h.controller.join().await.unwrap();

    assert_eq!(h.provisioning.join_count(), 2);
    assert_eq!(h.controller.state(), LifecycleState::Active);
}

#[tokio::test]
async fn test_end_confirmation_declined_makes_no_request() {
    let h = harness_with(
        test_config_with(&[("MEETING_CONFIRM_END", "true")]),
        MockFacade::new(),
        MockProvisioning::new(),
    );
    joined(&h).await;

    let outcome = h
        .controller
        .end(|prompt| {
            assert_eq!(prompt, END_CONFIRMATION_PROMPT);
            false
        })
        .await
        .unwrap();

    assert_eq!(outcome, TransitionOutcome::Cancelled);
    assert_eq!(h.provisioning.end_count(), 0);
    assert_eq!(h.controller.state(), LifecycleState::Active);
    assert!(h.controller.controls().current().end_enabled);

    let outcome = h.controller.end(|_| true).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::Completed);
    assert_eq!(h.provisioning.ended_titles(), vec!["standup".to_string()]);
    assert_eq!(h.controller.state(), LifecycleState::Terminated);
    assert_eq!(h.facade.stop_count(), 1);
}

#[tokio::test]
async fn test_end_without_confirmation_config_skips_prompt() {
    let h = harness();
    joined(&h).await;

    let mut asked = false;
    let outcome = h
        .controller
        .end(|_| {
            asked = true;
            true
        })
        .await
        .unwrap();

    assert!(!asked);
    assert_eq!(outcome, TransitionOutcome::Completed);
    assert_eq!(h.provisioning.end_count(), 1);
}

#[tokio::test]
async fn test_end_failure_keeps_session() {
    let h = harness_with(
        test_config(),
        MockFacade::new(),
        MockProvisioning::new().failing_end("service unavailable"),
    );
    joined(&h).await;

    let err = h.controller.end(|_| true).await.unwrap_err();

    assert!(matches!(err, ClientError::Provisioning(_)));
    assert_eq!(h.controller.state(), LifecycleState::Active);
    assert_eq!(h.facade.stop_count(), 0);
    assert!(h.controller.controls().current().leave_enabled);
}

// ============================================================================
// Stop classification
// ============================================================================

#[tokio::test]
async fn test_call_ended_stop_resets_to_start() {
    let h = harness();
    joined(&h).await;
    let mut notifications = h.controller.notifications();

    let a1 = attendee("a1");
    let mut roster = h.controller.roster();
    h.facade.emit_presence(&a1, true, "0a1b2c3d#Bob", false);
    settle(&mut roster, |snapshot| snapshot.row(&a1).is_some()).await;

    h.facade
        .emit_observer(FacadeEvent::Stopped(SessionStatusCode::AudioCallEnded));

    wait_for_state(&h.controller, LifecycleState::Terminated).await;
    settle(&mut roster, |snapshot| snapshot.rows.is_empty()).await;

    let stopped = tokio::time::timeout(WAIT, async {
        loop {
            if let SessionNotification::Stopped { code, disposition } = notifications.recv().await.unwrap() {
                return (code, disposition);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(
        stopped,
        (SessionStatusCode::AudioCallEnded, StopDisposition::FullReset)
    );

    // Back to the authenticate flow with a fresh join request
    h.controller.authenticate("standup", "Alice").await.unwrap();
    assert_eq!(h.provisioning.join_count(), 2);
    assert_eq!(h.controller.state(), LifecycleState::Authenticated);
}

#[tokio::test]
async fn test_call_ended_stop_releases_meter_without_reauthenticate() {
    let h = harness_with(
        test_config(),
        MockFacade::new().with_waveform(ScriptedWaveform::full_scale(32)),
        MockProvisioning::new(),
    );
    joined(&h).await;
    assert_eq!(h.controller.meter_status().await, Some(MeterStatus::Running));

    h.facade
        .emit_observer(FacadeEvent::Stopped(SessionStatusCode::AudioCallEnded));
    wait_for_state(&h.controller, LifecycleState::Terminated).await;

    tokio::time::timeout(WAIT, async {
        while h.controller.meter_status().await != Some(MeterStatus::Stopped) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("meter kept running after full reset");

    let mut level = h.controller.audio_level().await.unwrap();
    settle(&mut level, |percent| percent.abs() < f64::EPSILON).await;
}

#[tokio::test]
async fn test_other_stop_allows_rejoin() {
    let h = harness();
    joined(&h).await;

    h.facade.emit_observer(FacadeEvent::Stopped(
        SessionStatusCode::SignalingInternalServerError,
    ));
    wait_for_state(&h.controller, LifecycleState::Authenticated).await;

    h.controller.join().await.unwrap();
    assert_eq!(h.controller.state(), LifecycleState::Active);
    assert_eq!(h.facade.start_count(), 2);
    assert_eq!(h.provisioning.join_count(), 1);
}

#[tokio::test]
async fn test_voluntary_leave_stop_callback_ends_terminated() {
    let h = harness_with(
        test_config(),
        MockFacade::new().stop_reports(SessionStatusCode::Left),
        MockProvisioning::new(),
    );
    joined(&h).await;

    assert_eq!(h.controller.leave().await.unwrap(), TransitionOutcome::Completed);
    assert_eq!(h.controller.state(), LifecycleState::Terminated);
}

// ============================================================================
// Device switches
// ============================================================================

#[tokio::test]
async fn test_device_switch_failure_is_async_fault() {
    let h = harness();
    joined(&h).await;
    h.facade.set_fail_device_choice(true);

    let selection = h.controller.select_audio_input("mic-2").await.unwrap();
    assert_eq!(selection, AudioInputSelection::Named("mic-2".to_string()));

    tokio::time::timeout(WAIT, async {
        while h.controller.fault_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(h.controller.state(), LifecycleState::Active);
}

#[tokio::test]
async fn test_device_selection_before_join_applies_on_join() {
    let h = harness();
    h.controller.authenticate("standup", "Alice").await.unwrap();

    assert_eq!(
        h.controller.select_audio_input("440 Hz").await.unwrap(),
        AudioInputSelection::SynthesizedTone(440)
    );
    assert_eq!(
        h.controller.select_audio_output("speaker-1").await.unwrap(),
        AudioOutputSelection::Named("speaker-1".to_string())
    );
    assert!(h.facade.chosen_inputs().is_empty());

    h.controller.join().await.unwrap();
    assert_eq!(
        h.facade.chosen_inputs(),
        vec![AudioInputSelection::SynthesizedTone(440)]
    );
    assert_eq!(
        h.facade.chosen_outputs(),
        vec![AudioOutputSelection::Named("speaker-1".to_string())]
    );
}

#[tokio::test]
async fn test_select_device_without_session() {
    let h = harness();
    assert!(matches!(
        h.controller.select_audio_input("mic-1").await,
        Err(ClientError::NoSession)
    ));
}
