mod common;
use common::{BrokenGenerator, ConstantGenerator, FlakyStore, fast_controls, seed_run};

use std::sync::Arc;

use quarrel::event_bus::{EventBus, EventKind};
use quarrel::model::{Participant, Run};
use quarrel::runtime::{DebateRuntime, RuntimeError, StopReason, TemplateGenerator};
use quarrel::store::{InMemoryRunStore, RunStore, StoreError};
use quarrel::types::{DebateShape, Phase, RunControls, RunStatus};

fn in_memory_runtime() -> DebateRuntime {
    DebateRuntime::in_memory()
}

#[tokio::test(start_paused = true)]
async fn full_run_completes_with_ordered_events() {
    let runtime = in_memory_runtime();
    let (run, _) = seed_run(
        runtime.store().as_ref(),
        DebateShape::QuickSkirmish,
        fast_controls(),
    )
    .await;

    let outcome = runtime.orchestrator().run(&run.id).await.expect("run");
    assert_eq!(outcome.turn_count, 8);
    assert!(!outcome.stopped_early || outcome.reason == StopReason::NaturalStop);

    let stored = runtime
        .store()
        .fetch_run(&run.id)
        .await
        .expect("fetch")
        .expect("run row");
    assert_eq!(stored.status, RunStatus::Completed);
    assert!(stored.ended_at.is_some());
    assert_eq!(stored.turn_count, outcome.turn_count);

    let events = runtime.store().list_events(&run.id).await.expect("events");
    assert!(!events.is_empty());

    // Ids are assigned sequentially by the store.
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.id, i as i64 + 1);
    }

    // The log opens with the initial phase announcement and closes with the
    // completion marker.
    assert_eq!(events[0].kind, EventKind::PhaseChanged);
    assert_eq!(events[0].turn_index, None);
    assert_eq!(events.last().expect("last").kind, EventKind::RunCompleted);

    let finals: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::TurnFinal)
        .collect();
    assert_eq!(finals.len(), outcome.turn_count as usize);

    let completed = events.last().expect("last");
    assert_eq!(completed.payload["turn_count"], outcome.turn_count);
}

#[tokio::test(start_paused = true)]
async fn turns_are_never_empty_and_phases_are_monotone() {
    let runtime = in_memory_runtime();
    let (run, _) = seed_run(
        runtime.store().as_ref(),
        DebateShape::QuickSkirmish,
        fast_controls(),
    )
    .await;

    runtime.orchestrator().run(&run.id).await.expect("run");
    let turns = runtime.store().list_turns(&run.id).await.expect("turns");
    assert!(!turns.is_empty());

    let mut last_phase = Phase::Opening;
    for (i, turn) in turns.iter().enumerate() {
        assert!(!turn.content.trim().is_empty(), "turn {} is blank", turn.turn_index);
        assert_eq!(turn.turn_index, i as u32 + 1);
        assert!(turn.phase >= last_phase, "phase regressed at turn {}", turn.turn_index);
        last_phase = turn.phase;
    }
}

#[tokio::test(start_paused = true)]
async fn speakers_alternate_by_seat_order() {
    let runtime = in_memory_runtime();
    let (run, participants) = seed_run(
        runtime.store().as_ref(),
        DebateShape::QuickSkirmish,
        fast_controls(),
    )
    .await;

    runtime.orchestrator().run(&run.id).await.expect("run");
    let turns = runtime.store().list_turns(&run.id).await.expect("turns");
    for (i, turn) in turns.iter().enumerate() {
        let expected = &participants[i % participants.len()];
        assert_eq!(turn.speaker_participant_id, expected.id);
    }
}

#[tokio::test(start_paused = true)]
async fn repetition_triggers_an_early_natural_stop() {
    let store: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let runtime = DebateRuntime::new(
        Arc::clone(&store),
        Arc::new(EventBus::in_process()),
        Arc::new(ConstantGenerator("we keep making the same exact point over and over")),
    );
    let (run, _) = seed_run(store.as_ref(), DebateShape::ProperThrowdown, fast_controls()).await;

    let outcome = runtime.orchestrator().run(&run.id).await.expect("run");
    assert!(outcome.stopped_early);
    assert_eq!(outcome.reason, StopReason::NaturalStop);
    assert!(outcome.turn_count < run.max_turns);

    let events = store.list_events(&run.id).await.expect("events");
    let completed = events.last().expect("last");
    assert_eq!(completed.kind, EventKind::RunCompleted);
    assert_eq!(completed.payload["reason"], "natural_stop");
}

#[tokio::test(start_paused = true)]
async fn generator_failure_falls_back_to_template_turns() {
    let store: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let runtime = DebateRuntime::new(
        Arc::clone(&store),
        Arc::new(EventBus::in_process()),
        Arc::new(BrokenGenerator),
    );
    let (run, _) = seed_run(store.as_ref(), DebateShape::QuickSkirmish, fast_controls()).await;

    let outcome = runtime.orchestrator().run(&run.id).await.expect("run");
    assert!(outcome.turn_count > 0);

    let turns = store.list_turns(&run.id).await.expect("turns");
    for turn in &turns {
        assert!(!turn.content.trim().is_empty());
        assert_eq!(turn.model_metadata["provider"], "broken");
    }
    // First turn comes from the scripted template.
    assert!(turns[0].content.starts_with("[Opening salvo]"));
}

#[tokio::test]
async fn missing_run_is_a_typed_error() {
    let runtime = in_memory_runtime();
    let err = runtime.orchestrator().run("nope").await.expect_err("error");
    assert!(matches!(err, RuntimeError::RunNotFound { .. }));
}

#[tokio::test]
async fn unclaimed_run_fails_with_error_event() {
    let runtime = in_memory_runtime();
    let run = Run::new("topic", DebateShape::QuickSkirmish, RunControls::default());
    runtime.store().create_run(&run).await.expect("create");

    let err = runtime.orchestrator().run(&run.id).await.expect_err("error");
    assert!(matches!(err, RuntimeError::NotClaimed { status: RunStatus::Waiting, .. }));

    let stored = runtime
        .store()
        .fetch_run(&run.id)
        .await
        .expect("fetch")
        .expect("row");
    assert_eq!(stored.status, RunStatus::Failed);

    let events = runtime.store().list_events(&run.id).await.expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Error);
}

#[tokio::test]
async fn lone_participant_fails_preconditions() {
    let runtime = in_memory_runtime();
    let mut run = Run::new("topic", DebateShape::QuickSkirmish, RunControls::default());
    run.claim();
    runtime.store().create_run(&run).await.expect("create");
    runtime
        .store()
        .add_participant(&Participant::new(&run.id, "solo", 0).ready())
        .await
        .expect("add");

    let err = runtime.orchestrator().run(&run.id).await.expect_err("error");
    assert!(matches!(err, RuntimeError::NotEnoughParticipants { ready: 1, .. }));

    let stored = runtime
        .store()
        .fetch_run(&run.id)
        .await
        .expect("fetch")
        .expect("row");
    assert_eq!(stored.status, RunStatus::Failed);
}

#[tokio::test]
async fn unready_participants_do_not_count() {
    let runtime = in_memory_runtime();
    let mut run = Run::new("topic", DebateShape::QuickSkirmish, RunControls::default());
    run.claim();
    runtime.store().create_run(&run).await.expect("create");
    runtime
        .store()
        .add_participant(&Participant::new(&run.id, "ready", 0).ready())
        .await
        .expect("add");
    runtime
        .store()
        .add_participant(&Participant::new(&run.id, "lurker", 1))
        .await
        .expect("add");

    let err = runtime.orchestrator().run(&run.id).await.expect_err("error");
    assert!(matches!(err, RuntimeError::NotEnoughParticipants { ready: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_mid_run_is_fatal() {
    let store: Arc<dyn RunStore> = Arc::new(FlakyStore::new(InMemoryRunStore::new(), 3));
    let runtime = DebateRuntime::new(
        Arc::clone(&store),
        Arc::new(EventBus::in_process()),
        Arc::new(TemplateGenerator),
    );
    let (run, _) = seed_run(store.as_ref(), DebateShape::QuickSkirmish, fast_controls()).await;

    let err = runtime.orchestrator().run(&run.id).await.expect_err("error");
    assert!(matches!(err, RuntimeError::Store(StoreError::Backend { .. })));

    let stored = store.fetch_run(&run.id).await.expect("fetch").expect("row");
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.ended_at.is_some());

    let turns = store.list_turns(&run.id).await.expect("turns");
    assert_eq!(turns.len(), 3);

    let events = store.list_events(&run.id).await.expect("events");
    assert_eq!(events.last().expect("last").kind, EventKind::Error);
}

#[tokio::test(start_paused = true)]
async fn live_subscribers_see_the_whole_run() {
    let runtime = in_memory_runtime();
    let (run, _) = seed_run(
        runtime.store().as_ref(),
        DebateShape::QuickSkirmish,
        fast_controls(),
    )
    .await;

    let sub = runtime.bus().subscribe(&run.id).await;
    runtime.orchestrator().run(&run.id).await.expect("run");

    let mut live = Vec::new();
    while let Some(event) = sub.try_recv() {
        live.push(event);
    }
    let persisted = runtime.store().list_events(&run.id).await.expect("events");
    assert_eq!(live.len(), persisted.len());
    assert_eq!(live.last().expect("last").kind, EventKind::RunCompleted);
}

#[tokio::test(start_paused = true)]
async fn postprocess_builds_and_replaces_the_report() {
    let runtime = in_memory_runtime();
    let (run, _) = seed_run(
        runtime.store().as_ref(),
        DebateShape::QuickSkirmish,
        fast_controls(),
    )
    .await;

    let outcome = runtime.run_to_completion(&run.id).await.expect("run");

    let report = runtime
        .store()
        .fetch_report(&run.id)
        .await
        .expect("fetch")
        .expect("report row");
    assert!(report.summary.contains(&format!("{} turns exchanged", outcome.turn_count)));
    assert!(!report.wrapped.best_receipts.is_empty());

    // Recomputation replaces, never duplicates.
    let second = runtime
        .orchestrator()
        .postprocess(&run.id)
        .await
        .expect("postprocess");
    let stored = runtime
        .store()
        .fetch_report(&run.id)
        .await
        .expect("fetch")
        .expect("report row");
    assert_eq!(stored.id, second.id);
    assert_ne!(stored.id, report.id);

    let events = runtime.store().list_events(&run.id).await.expect("events");
    let report_ready: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::TurnMeta && e.payload["state"] == "report_ready")
        .collect();
    assert_eq!(report_ready.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn badges_are_persisted_and_announced_together() {
    let store: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let runtime = DebateRuntime::new(
        Arc::clone(&store),
        Arc::new(EventBus::in_process()),
        Arc::new(ConstantGenerator("the stat sheet backs me up, check the data yourself")),
    );
    let controls = RunControls {
        evidence_mode: quarrel::types::EvidenceMode::ReceiptsPreferred,
        ..fast_controls()
    };
    let (run, _) = seed_run(store.as_ref(), DebateShape::QuickSkirmish, controls).await;

    runtime.orchestrator().run(&run.id).await.expect("run");

    let badges = store.list_badges(&run.id).await.expect("badges");
    assert!(!badges.is_empty());
    assert!(badges.len() <= 4);
    assert!(badges.iter().all(|b| b.badge_key == "receipt_slinger"));

    let events = store.list_events(&run.id).await.expect("events");
    let announced = events
        .iter()
        .filter(|e| e.kind == EventKind::BadgeAwarded)
        .count();
    assert_eq!(announced, badges.len());

    // An award needs two quiet turns before the next one.
    let turns: Vec<u32> = badges.iter().map(|b| b.turn_index).collect();
    for pair in turns.windows(2) {
        assert!(pair[1] - pair[0] > 2);
    }
}

#[tokio::test(start_paused = true)]
async fn spawned_runs_execute_on_their_own_task() {
    let runtime = in_memory_runtime();
    let (run, _) = seed_run(
        runtime.store().as_ref(),
        DebateShape::QuickSkirmish,
        fast_controls(),
    )
    .await;

    let outcome = runtime
        .spawn_run(&run.id)
        .await
        .expect("join")
        .expect("run");
    assert_eq!(outcome.turn_count, 8);
}
