use std::sync::{Arc, Weak};

use shared::domain::Recipe;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    error::{friendly_narration_reason, SessionError},
    ports::{NarrationSink, SpeechService},
    session::{
        CookingSession, Effects, NarrationRequest, SessionEffect, SessionEvent, SessionSnapshot,
        SessionSummary, AUTO_ADVANCE_DELAY, TICK_INTERVAL,
    },
};

/// Drives a [`CookingSession`] on the tokio runtime.
///
/// Every operation runs under one lock, so mutations are totally ordered.
/// Timer and narration work runs in owned tasks that are aborted whenever the
/// session says so, on [`CookingController::shutdown`], and on drop.
pub struct CookingController {
    state: Mutex<ControllerState>,
    speech: Arc<dyn SpeechService>,
    sink: Arc<dyn NarrationSink>,
    events: broadcast::Sender<SessionEvent>,
    weak_self: Weak<CookingController>,
}

struct ControllerState {
    session: CookingSession,
    timer_task: Option<JoinHandle<()>>,
    narration_task: Option<JoinHandle<()>>,
}

impl ControllerState {
    fn abort_timer(&mut self) {
        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
    }

    fn abort_narration(&mut self) {
        if let Some(task) = self.narration_task.take() {
            task.abort();
        }
    }
}

impl CookingController {
    pub fn new(
        recipe: Recipe,
        speech: Arc<dyn SpeechService>,
        sink: Arc<dyn NarrationSink>,
    ) -> Result<Arc<Self>, SessionError> {
        let session = CookingSession::new(recipe)?;
        info!(
            recipe_id = %session.recipe().id,
            steps = session.step_count(),
            "cooking session created"
        );
        let (events, _) = broadcast::channel(256);
        Ok(Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(ControllerState {
                session,
                timer_task: None,
                narration_task: None,
            }),
            speech,
            sink,
            events,
            weak_self: weak_self.clone(),
        }))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.session.snapshot()
    }

    pub async fn start(&self) -> Result<(), SessionError> {
        self.dispatch("start", CookingSession::start).await
    }

    pub async fn go_to_next_step(&self) -> Result<(), SessionError> {
        self.dispatch("next_step", CookingSession::go_to_next_step)
            .await
    }

    pub async fn go_to_previous_step(&self) -> Result<(), SessionError> {
        self.dispatch("previous_step", CookingSession::go_to_previous_step)
            .await
    }

    pub async fn jump_to_step(&self, index: usize) -> Result<(), SessionError> {
        self.dispatch("jump_to_step", |session| session.jump_to_step(index))
            .await
    }

    pub async fn start_timer(&self) -> Result<(), SessionError> {
        self.dispatch("start_timer", CookingSession::start_timer)
            .await
    }

    pub async fn skip_grace_period(&self) -> Result<(), SessionError> {
        self.dispatch("skip_grace_period", CookingSession::skip_grace_period)
            .await
    }

    pub async fn pause_timer(&self) -> Result<(), SessionError> {
        self.dispatch("pause_timer", CookingSession::pause_timer)
            .await
    }

    pub async fn reset_timer(&self) -> Result<(), SessionError> {
        self.dispatch("reset_timer", CookingSession::reset_timer)
            .await
    }

    pub async fn toggle_voice(&self) -> Result<(), SessionError> {
        self.dispatch("toggle_voice", CookingSession::toggle_voice)
            .await
    }

    pub async fn finish(&self) -> Result<SessionSummary, SessionError> {
        let mut state = self.state.lock().await;
        let (summary, effects) = state.session.finish().inspect_err(|err| {
            warn!(operation = "finish", %err, "rejected session operation");
        })?;
        self.apply(&mut state, effects);
        info!(recipe_id = %summary.recipe_id, "cooking session completed");
        Ok(summary)
    }

    /// Cancels pending ticks, auto-advance and narration. Idempotent.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let effects = state.session.teardown();
        self.apply(&mut state, effects);
        debug!("cooking controller shut down");
    }

    async fn dispatch<F>(&self, operation: &'static str, op: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut CookingSession) -> Result<Effects, SessionError>,
    {
        let mut state = self.state.lock().await;
        let effects = op(&mut state.session).inspect_err(|err| {
            warn!(operation, %err, "rejected session operation");
        })?;
        debug!(
            operation,
            step = state.session.current_step_index(),
            phase = %state.session.timer_phase(),
            "session operation applied"
        );
        self.apply(&mut state, effects);
        Ok(())
    }

    fn apply(&self, state: &mut ControllerState, effects: Effects) {
        for effect in effects {
            match effect {
                SessionEffect::CancelTimers => state.abort_timer(),
                SessionEffect::StartTicker { generation } => {
                    state.abort_timer();
                    state.timer_task = Some(self.spawn_ticker(generation));
                }
                SessionEffect::ScheduleAutoAdvance { generation } => {
                    state.abort_timer();
                    state.timer_task = Some(self.spawn_auto_advance(generation));
                }
                SessionEffect::Narrate(request) => {
                    state.abort_narration();
                    state.narration_task = Some(self.spawn_narration(request));
                }
                SessionEffect::StopNarration => {
                    state.abort_narration();
                    self.sink.stop();
                }
                SessionEffect::Emit(event) => {
                    let _ = self.events.send(event);
                }
            }
        }
    }

    fn spawn_ticker(&self, generation: u64) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            loop {
                sleep(TICK_INTERVAL).await;
                let Some(this) = weak.upgrade() else {
                    break;
                };
                let mut state = this.state.lock().await;
                if !state.session.wants_tick(generation) {
                    break;
                }
                let effects = state.session.tick(generation);
                this.apply(&mut state, effects);
            }
        })
    }

    fn spawn_auto_advance(&self, generation: u64) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            sleep(AUTO_ADVANCE_DELAY).await;
            let Some(this) = weak.upgrade() else {
                return;
            };
            let mut state = this.state.lock().await;
            let effects = state.session.auto_advance(generation);
            if !effects.is_empty() {
                info!(
                    step = state.session.current_step_index(),
                    "advanced after countdown finished"
                );
            }
            this.apply(&mut state, effects);
        })
    }

    fn spawn_narration(&self, request: NarrationRequest) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        let speech = Arc::clone(&self.speech);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let NarrationRequest { ticket, text } = request;
            let synthesized = speech.synthesize(&text).await;

            let audio = {
                let Some(this) = weak.upgrade() else {
                    return;
                };
                let mut state = this.state.lock().await;
                match synthesized {
                    Ok(audio) => match state.session.begin_playback(ticket) {
                        Some(effects) => {
                            this.apply(&mut state, effects);
                            audio
                        }
                        None => {
                            debug!(step = ticket.step_index, "discarding stale narration");
                            return;
                        }
                    },
                    Err(err) => {
                        warn!(step = ticket.step_index, %err, "narration synthesis failed");
                        let effects = state.session.narration_failed(ticket, err.friendly_reason());
                        this.apply(&mut state, effects);
                        return;
                    }
                }
            };

            let played = sink.play(ticket, audio).await;

            let Some(this) = weak.upgrade() else {
                return;
            };
            let mut state = this.state.lock().await;
            let effects = match played {
                Ok(()) => state.session.playback_finished(ticket),
                Err(err) => {
                    warn!(step = ticket.step_index, error = %err, "narration playback failed");
                    state
                        .session
                        .narration_failed(ticket, friendly_narration_reason(&err.to_string()))
                }
            };
            this.apply(&mut state, effects);
        })
    }
}

impl Drop for CookingController {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.abort_timer();
        state.abort_narration();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
