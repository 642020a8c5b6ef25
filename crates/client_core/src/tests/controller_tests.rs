use super::*;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex as StdMutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::domain::{RecipeId, RecipeRecord, StepId, StepRecord};

use crate::{
    error::SpeechError,
    ports::DiscardNarrationSink,
    session::{NarrationTicket, TimerPhase, VoicePlaybackState},
};

const FAKE_WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

enum SpeechBehavior {
    Immediate,
    Delayed(Duration),
    RateLimited,
}

struct FakeSpeech {
    behavior: SpeechBehavior,
    requests: StdMutex<Vec<String>>,
}

impl FakeSpeech {
    fn new(behavior: SpeechBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            requests: StdMutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        self.requests.lock().expect("requests").push(text.to_string());
        match self.behavior {
            SpeechBehavior::Immediate => Ok(FAKE_WAV.to_vec()),
            SpeechBehavior::Delayed(delay) => {
                sleep(delay).await;
                Ok(FAKE_WAV.to_vec())
            }
            SpeechBehavior::RateLimited => Err(SpeechError::RateLimited(
                "Rate limit reached for model playai-tts".into(),
            )),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    played: StdMutex<Vec<NarrationTicket>>,
    stops: AtomicUsize,
}

#[async_trait]
impl NarrationSink for RecordingSink {
    async fn play(&self, ticket: NarrationTicket, audio: Vec<u8>) -> anyhow::Result<()> {
        assert_eq!(audio, FAKE_WAV);
        self.played.lock().expect("played").push(ticket);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn recipe(durations: &[Option<u32>]) -> Recipe {
    let steps = durations
        .iter()
        .enumerate()
        .map(|(i, duration)| StepRecord {
            id: StepId::new_random(),
            step_number: i as i32 + 1,
            instruction: format!("Step {} instruction", i + 1),
            timer_duration: *duration,
        })
        .collect();
    Recipe::from_record(RecipeRecord {
        id: RecipeId::new_random(),
        title: "Test Stew".to_string(),
        steps,
        ingredients: Vec::new(),
    })
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[tokio::test(start_paused = true)]
async fn three_step_recipe_counts_down_and_auto_advances() {
    let speech = FakeSpeech::new(SpeechBehavior::Immediate);
    let sink = Arc::new(RecordingSink::default());
    let controller = CookingController::new(
        recipe(&[None, Some(30), None]),
        speech.clone(),
        sink.clone(),
    )
    .expect("controller");

    controller.start().await.expect("start");
    assert_eq!(controller.snapshot().await.timer_phase, TimerPhase::Idle);

    controller.go_to_next_step().await.expect("next");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.timer_phase, TimerPhase::GracePeriod);
    assert_eq!(snapshot.grace_seconds_left, Some(10));

    sleep(millis(10_500)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.timer_phase, TimerPhase::Running);
    assert_eq!(snapshot.remaining_seconds, Some(30));
    assert_eq!(speech.requests(), vec!["Step 2 instruction"]);
    assert_eq!(sink.played.lock().expect("played").len(), 1);
    assert_eq!(snapshot.voice_playback, VoicePlaybackState::Idle);

    sleep(millis(30_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.timer_phase, TimerPhase::Finished);
    assert_eq!(snapshot.step_index, 1);

    sleep(millis(3_000)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.step_index, 2);
    assert!(snapshot.can_finish);

    let summary = controller.finish().await.expect("finish");
    assert_eq!(summary.step_count, 3);
}

#[tokio::test(start_paused = true)]
async fn slow_narration_is_dropped_after_moving_two_steps_forward() {
    let speech = FakeSpeech::new(SpeechBehavior::Delayed(millis(5_000)));
    let sink = Arc::new(RecordingSink::default());
    let controller = CookingController::new(
        recipe(&[Some(20), None, None]),
        speech.clone(),
        sink.clone(),
    )
    .expect("controller");

    controller.start().await.expect("start");
    controller.skip_grace_period().await.expect("skip");
    sleep(millis(500)).await;
    assert_eq!(speech.requests().len(), 1);
    assert_eq!(
        controller.snapshot().await.voice_playback,
        VoicePlaybackState::Loading
    );

    controller.go_to_next_step().await.expect("next");
    controller.go_to_next_step().await.expect("next");
    sleep(millis(6_000)).await;

    assert!(sink.played.lock().expect("played").is_empty());
    assert!(sink.stops.load(Ordering::SeqCst) >= 1);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.step_index, 2);
    assert!(snapshot.voice_enabled);
    assert_eq!(snapshot.voice_playback, VoicePlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn narration_failure_disables_voice_without_stopping_the_timer() {
    let speech = FakeSpeech::new(SpeechBehavior::RateLimited);
    let controller = CookingController::new(
        recipe(&[Some(20)]),
        speech,
        Arc::new(DiscardNarrationSink),
    )
    .expect("controller");
    let mut events = controller.subscribe_events();

    controller.start().await.expect("start");
    controller.skip_grace_period().await.expect("skip");
    sleep(millis(3_500)).await;

    let snapshot = controller.snapshot().await;
    assert!(!snapshot.voice_enabled);
    assert_eq!(snapshot.voice_playback, VoicePlaybackState::Failed);
    assert_eq!(snapshot.timer_phase, TimerPhase::Running);
    assert_eq!(snapshot.remaining_seconds, Some(17));
    let failure = snapshot.narration_failure.expect("failure");
    assert!(failure.reason.contains("usage limit"));

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::NarrationFailed(_)) {
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test(start_paused = true)]
async fn enabling_voice_while_running_narrates_once() {
    let speech = FakeSpeech::new(SpeechBehavior::Immediate);
    let controller = CookingController::new(
        recipe(&[Some(20)]),
        speech.clone(),
        Arc::new(DiscardNarrationSink),
    )
    .expect("controller");

    controller.start().await.expect("start");
    controller.toggle_voice().await.expect("voice off");
    controller.skip_grace_period().await.expect("skip");
    sleep(millis(1_500)).await;
    assert!(speech.requests().is_empty());

    controller.toggle_voice().await.expect("voice on");
    sleep(millis(1_000)).await;
    assert_eq!(speech.requests(), vec!["Step 1 instruction"]);
}

#[tokio::test(start_paused = true)]
async fn rejected_operations_leave_state_unchanged() {
    let controller = CookingController::new(
        recipe(&[None, Some(30), None]),
        Arc::new(crate::ports::MissingSpeechService),
        Arc::new(DiscardNarrationSink),
    )
    .expect("controller");

    let err = controller.jump_to_step(5).await.expect_err("out of range");
    assert!(matches!(err, SessionError::InvalidStep { .. }));
    assert_eq!(controller.snapshot().await.step_index, 0);
    assert!(controller.finish().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn pause_stops_ticking() {
    let controller = CookingController::new(
        recipe(&[Some(60)]),
        Arc::new(crate::ports::MissingSpeechService),
        Arc::new(DiscardNarrationSink),
    )
    .expect("controller");

    controller.start().await.expect("start");
    controller.skip_grace_period().await.expect("skip");
    sleep(millis(5_500)).await;
    controller.pause_timer().await.expect("pause");
    sleep(millis(20_000)).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.timer_phase, TimerPhase::Idle);
    assert_eq!(snapshot.remaining_seconds, Some(55));
}

#[tokio::test(start_paused = true)]
async fn shutdown_prevents_phantom_auto_advance() {
    let controller = CookingController::new(
        recipe(&[Some(2), None]),
        Arc::new(crate::ports::MissingSpeechService),
        Arc::new(DiscardNarrationSink),
    )
    .expect("controller");

    controller.start().await.expect("start");
    controller.skip_grace_period().await.expect("skip");
    sleep(millis(2_500)).await;
    assert_eq!(
        controller.snapshot().await.timer_phase,
        TimerPhase::Finished
    );

    controller.shutdown().await;
    sleep(millis(10_000)).await;
    assert_eq!(controller.snapshot().await.step_index, 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_controller_cancels_its_tasks() {
    let speech = FakeSpeech::new(SpeechBehavior::Delayed(millis(2_000)));
    let sink = Arc::new(RecordingSink::default());
    let controller = CookingController::new(
        recipe(&[Some(30)]),
        speech.clone(),
        sink.clone(),
    )
    .expect("controller");

    controller.start().await.expect("start");
    controller.skip_grace_period().await.expect("skip");
    drop(controller);

    sleep(millis(10_000)).await;
    assert!(sink.played.lock().expect("played").is_empty());
}
