//! Cooking session state machine.
//!
//! `CookingSession` is synchronous and owns no tasks. Every operation mutates
//! the session and returns the [`SessionEffect`]s the owner must carry out
//! (schedule or cancel timers, request or stop narration, publish events).
//! Scheduled timer work is tagged with the generation it was issued for and
//! narration with a [`NarrationTicket`]; results carrying an outdated tag are
//! ignored, so late callbacks can never act on a step the user has left.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::domain::{Recipe, RecipeId, Step};

use crate::error::{NarrationFailure, SessionError};

pub const GRACE_PERIOD_SECONDS: u32 = 10;
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    GracePeriod,
    Running,
    Finished,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerPhase::Idle => "idle",
            TimerPhase::GracePeriod => "grace_period",
            TimerPhase::Running => "running",
            TimerPhase::Finished => "finished",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePlaybackState {
    Idle,
    Loading,
    Playing,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NarrationTicket {
    pub step_index: usize,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationRequest {
    pub ticket: NarrationTicket,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub recipe_id: RecipeId,
    pub title: String,
    pub step_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    Started,
    StepChanged {
        index: usize,
        step_count: usize,
    },
    TimerPhaseChanged {
        step_index: usize,
        phase: TimerPhase,
    },
    GraceTick {
        seconds_left: u32,
    },
    CountdownTick {
        remaining_seconds: u32,
    },
    TimerReset {
        remaining_seconds: Option<u32>,
    },
    /// The step's countdown reached zero.
    TimerElapsed {
        step_index: usize,
    },
    VoiceToggled {
        enabled: bool,
    },
    NarrationStateChanged {
        state: VoicePlaybackState,
    },
    NarrationFailed(NarrationFailure),
    Completed(SessionSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Abort any pending tick or auto-advance.
    CancelTimers,
    /// Replace pending timer work with a 1s ticker for `generation`.
    StartTicker { generation: u64 },
    /// Replace pending timer work with a single auto-advance after
    /// [`AUTO_ADVANCE_DELAY`].
    ScheduleAutoAdvance { generation: u64 },
    Narrate(NarrationRequest),
    StopNarration,
    Emit(SessionEvent),
}

pub type Effects = Vec<SessionEffect>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOverviewItem {
    pub index: usize,
    pub instruction: String,
    pub has_timer: bool,
    pub status: StepStatus,
}

/// Everything a renderer needs to draw the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub recipe_title: String,
    pub step_index: usize,
    pub step_count: usize,
    pub instruction: String,
    pub has_started: bool,
    pub completed: bool,
    pub timer_phase: TimerPhase,
    pub remaining_seconds: Option<u32>,
    pub clock: String,
    pub grace_seconds_left: Option<u32>,
    pub voice_enabled: bool,
    pub voice_playback: VoicePlaybackState,
    pub narration_failure: Option<NarrationFailure>,
    pub progress_percent: f64,
    pub ingredients: Vec<String>,
    pub overview: Vec<StepOverviewItem>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub can_finish: bool,
}

/// `m:ss`, minutes unpadded.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug)]
pub struct CookingSession {
    recipe: Recipe,
    current_step_index: usize,
    has_started: bool,
    remaining_seconds: Option<u32>,
    timer_phase: TimerPhase,
    grace_seconds_left: u32,
    voice_enabled: bool,
    voice_playback: VoicePlaybackState,
    narration_failure: Option<NarrationFailure>,
    active_narration: Option<NarrationTicket>,
    narration_sequence: u64,
    timer_generation: u64,
    started_at: Option<DateTime<Utc>>,
    completed: bool,
}

impl CookingSession {
    pub fn new(recipe: Recipe) -> Result<Self, SessionError> {
        let Some(first) = recipe.steps.first() else {
            return Err(SessionError::EmptyRecipe);
        };
        let remaining_seconds = first.timer_duration_seconds;

        Ok(Self {
            recipe,
            current_step_index: 0,
            has_started: false,
            remaining_seconds,
            timer_phase: TimerPhase::Idle,
            grace_seconds_left: GRACE_PERIOD_SECONDS,
            voice_enabled: true,
            voice_playback: VoicePlaybackState::Idle,
            narration_failure: None,
            active_narration: None,
            narration_sequence: 0,
            timer_generation: 0,
            started_at: None,
            completed: false,
        })
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn step_count(&self) -> usize {
        self.recipe.step_count()
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn current_step(&self) -> &Step {
        &self.recipe.steps[self.current_step_index]
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }

    pub fn timer_phase(&self) -> TimerPhase {
        self.timer_phase
    }

    pub fn grace_seconds_left(&self) -> u32 {
        self.grace_seconds_left
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    pub fn voice_playback(&self) -> VoicePlaybackState {
        self.voice_playback
    }

    pub fn narration_failure(&self) -> Option<&NarrationFailure> {
        self.narration_failure.as_ref()
    }

    pub fn timer_generation(&self) -> u64 {
        self.timer_generation
    }

    pub fn is_first_step(&self) -> bool {
        self.current_step_index == 0
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step_index + 1 == self.step_count()
    }

    /// Dismisses the "ready to cook" prompt. Only the first call has effect.
    pub fn start(&mut self) -> Result<Effects, SessionError> {
        self.ensure_active("start")?;
        if self.has_started {
            return Ok(Vec::new());
        }

        self.has_started = true;
        self.started_at = Some(Utc::now());

        let mut effects = vec![SessionEffect::Emit(SessionEvent::Started)];
        if self.current_step_has_countdown() {
            self.enter_grace_period(&mut effects);
        }
        Ok(effects)
    }

    pub fn go_to_next_step(&mut self) -> Result<Effects, SessionError> {
        self.ensure_active("go to the next step")?;
        let target = self.current_step_index + 1;
        if target >= self.step_count() {
            return Err(self.invalid_step(target as isize));
        }
        Ok(self.change_step(target, true))
    }

    /// Never auto-starts a grace period, even once the session is underway.
    pub fn go_to_previous_step(&mut self) -> Result<Effects, SessionError> {
        self.ensure_active("go to the previous step")?;
        if self.current_step_index == 0 {
            return Err(self.invalid_step(-1));
        }
        Ok(self.change_step(self.current_step_index - 1, false))
    }

    pub fn jump_to_step(&mut self, index: usize) -> Result<Effects, SessionError> {
        self.ensure_active("jump to a step")?;
        if index >= self.step_count() {
            return Err(self.invalid_step(index as isize));
        }
        Ok(self.change_step(index, true))
    }

    pub fn start_timer(&mut self) -> Result<Effects, SessionError> {
        const OP: &str = "start the timer";
        self.ensure_active(OP)?;
        if !self.has_started {
            return Err(invalid_transition(OP, "the session has not started"));
        }
        if self.timer_phase != TimerPhase::Idle {
            return Err(invalid_transition(
                OP,
                format!("the timer is {}", self.timer_phase),
            ));
        }
        if !self.current_step_has_countdown() {
            return Err(invalid_transition(OP, "no time remains on this step"));
        }

        let mut effects = Vec::new();
        self.enter_grace_period(&mut effects);
        Ok(effects)
    }

    pub fn skip_grace_period(&mut self) -> Result<Effects, SessionError> {
        const OP: &str = "skip the grace period";
        self.ensure_active(OP)?;
        if self.timer_phase != TimerPhase::GracePeriod {
            return Err(invalid_transition(
                OP,
                format!("the timer is {}", self.timer_phase),
            ));
        }

        // Restart tick alignment so the first countdown second is a full second.
        let generation = self.bump_timer_generation();
        self.grace_seconds_left = 0;
        let mut effects = vec![SessionEffect::StartTicker { generation }];
        self.enter_running(&mut effects);
        Ok(effects)
    }

    /// Keeps `remaining_seconds`; a later `start_timer` runs a fresh grace period.
    pub fn pause_timer(&mut self) -> Result<Effects, SessionError> {
        const OP: &str = "pause the timer";
        self.ensure_active(OP)?;
        if self.timer_phase != TimerPhase::Running {
            return Err(invalid_transition(
                OP,
                format!("the timer is {}", self.timer_phase),
            ));
        }

        self.bump_timer_generation();
        let mut effects = vec![SessionEffect::CancelTimers];
        self.set_phase(TimerPhase::Idle, &mut effects);
        Ok(effects)
    }

    pub fn reset_timer(&mut self) -> Result<Effects, SessionError> {
        self.ensure_active("reset the timer")?;

        self.bump_timer_generation();
        let mut effects = vec![SessionEffect::CancelTimers];
        self.remaining_seconds = self.current_step().timer_duration_seconds;
        self.grace_seconds_left = GRACE_PERIOD_SECONDS;
        self.set_phase(TimerPhase::Idle, &mut effects);
        effects.push(SessionEffect::Emit(SessionEvent::TimerReset {
            remaining_seconds: self.remaining_seconds,
        }));
        Ok(effects)
    }

    pub fn toggle_voice(&mut self) -> Result<Effects, SessionError> {
        self.ensure_active("toggle voice narration")?;

        self.voice_enabled = !self.voice_enabled;
        let mut effects = vec![SessionEffect::Emit(SessionEvent::VoiceToggled {
            enabled: self.voice_enabled,
        })];

        if self.voice_enabled {
            self.narration_failure = None;
            if self.voice_playback == VoicePlaybackState::Failed {
                self.set_voice_playback(VoicePlaybackState::Idle, &mut effects);
            }
            if self.timer_phase == TimerPhase::Running {
                self.request_narration(&mut effects);
            }
        } else {
            self.stop_narration(&mut effects);
        }
        Ok(effects)
    }

    /// Ends the session from the last step and tears down pending work.
    pub fn finish(&mut self) -> Result<(SessionSummary, Effects), SessionError> {
        const OP: &str = "finish the session";
        self.ensure_active(OP)?;
        if !self.is_last_step() {
            return Err(invalid_transition(
                OP,
                format!(
                    "step {} of {} is not the last step",
                    self.current_step_index + 1,
                    self.step_count()
                ),
            ));
        }

        let mut effects = self.teardown();
        self.completed = true;

        let summary = SessionSummary {
            recipe_id: self.recipe.id,
            title: self.recipe.title.clone(),
            step_count: self.step_count(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        effects.push(SessionEffect::Emit(SessionEvent::Completed(summary.clone())));
        Ok((summary, effects))
    }

    /// Invalidates all scheduled timer work and in-flight narration.
    pub fn teardown(&mut self) -> Effects {
        self.bump_timer_generation();
        let mut effects = vec![SessionEffect::CancelTimers];
        self.stop_narration(&mut effects);
        effects
    }

    /// Whether a ticker scheduled for `generation` should keep running.
    pub fn wants_tick(&self, generation: u64) -> bool {
        !self.completed
            && generation == self.timer_generation
            && matches!(
                self.timer_phase,
                TimerPhase::GracePeriod | TimerPhase::Running
            )
    }

    /// One elapsed second. Ticks from an outdated generation are ignored.
    pub fn tick(&mut self, generation: u64) -> Effects {
        let mut effects = Vec::new();
        if !self.wants_tick(generation) {
            return effects;
        }

        match self.timer_phase {
            TimerPhase::GracePeriod => {
                self.grace_seconds_left = self.grace_seconds_left.saturating_sub(1);
                effects.push(SessionEffect::Emit(SessionEvent::GraceTick {
                    seconds_left: self.grace_seconds_left,
                }));
                if self.grace_seconds_left == 0 {
                    self.enter_running(&mut effects);
                }
            }
            TimerPhase::Running => {
                let remaining = self.remaining_seconds.unwrap_or(0).saturating_sub(1);
                self.remaining_seconds = Some(remaining);
                effects.push(SessionEffect::Emit(SessionEvent::CountdownTick {
                    remaining_seconds: remaining,
                }));
                if remaining == 0 {
                    self.set_phase(TimerPhase::Finished, &mut effects);
                    effects.push(SessionEffect::Emit(SessionEvent::TimerElapsed {
                        step_index: self.current_step_index,
                    }));
                    if !self.is_last_step() {
                        effects.push(SessionEffect::ScheduleAutoAdvance {
                            generation: self.timer_generation,
                        });
                    }
                }
            }
            TimerPhase::Idle | TimerPhase::Finished => {}
        }
        effects
    }

    /// Fires [`AUTO_ADVANCE_DELAY`] after a countdown finished.
    pub fn auto_advance(&mut self, generation: u64) -> Effects {
        if self.completed
            || generation != self.timer_generation
            || self.timer_phase != TimerPhase::Finished
            || self.is_last_step()
        {
            return Vec::new();
        }
        self.change_step(self.current_step_index + 1, true)
    }

    /// Synthesized audio arrived. `None` means the ticket is outdated and the
    /// audio must be dropped.
    pub fn begin_playback(&mut self, ticket: NarrationTicket) -> Option<Effects> {
        if !self.is_current_narration(ticket) {
            return None;
        }
        let mut effects = Vec::new();
        self.set_voice_playback(VoicePlaybackState::Playing, &mut effects);
        Some(effects)
    }

    pub fn playback_finished(&mut self, ticket: NarrationTicket) -> Effects {
        let mut effects = Vec::new();
        if self.is_current_narration(ticket) {
            self.active_narration = None;
            self.set_voice_playback(VoicePlaybackState::Idle, &mut effects);
        }
        effects
    }

    /// Disables voice until the user re-enables it. The countdown is untouched.
    pub fn narration_failed(&mut self, ticket: NarrationTicket, reason: impl Into<String>) -> Effects {
        let mut effects = Vec::new();
        if !self.is_current_narration(ticket) {
            return effects;
        }

        let failure = NarrationFailure {
            step_index: ticket.step_index,
            reason: reason.into(),
        };
        self.active_narration = None;
        self.narration_failure = Some(failure.clone());
        self.set_voice_playback(VoicePlaybackState::Failed, &mut effects);
        effects.push(SessionEffect::Emit(SessionEvent::NarrationFailed(failure)));
        if self.voice_enabled {
            self.voice_enabled = false;
            effects.push(SessionEffect::Emit(SessionEvent::VoiceToggled { enabled: false }));
        }
        effects
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let step = self.current_step();
        let step_count = self.step_count();

        let overview = self
            .recipe
            .steps
            .iter()
            .map(|item| StepOverviewItem {
                index: item.index,
                instruction: item.instruction.clone(),
                has_timer: item.has_timer(),
                status: match item.index.cmp(&self.current_step_index) {
                    std::cmp::Ordering::Less => StepStatus::Done,
                    std::cmp::Ordering::Equal => StepStatus::Current,
                    std::cmp::Ordering::Greater => StepStatus::Upcoming,
                },
            })
            .collect();

        SessionSnapshot {
            recipe_title: self.recipe.title.clone(),
            step_index: self.current_step_index,
            step_count,
            instruction: step.instruction.clone(),
            has_started: self.has_started,
            completed: self.completed,
            timer_phase: self.timer_phase,
            remaining_seconds: self.remaining_seconds,
            clock: format_clock(self.remaining_seconds.unwrap_or(0)),
            grace_seconds_left: (self.timer_phase == TimerPhase::GracePeriod)
                .then_some(self.grace_seconds_left),
            voice_enabled: self.voice_enabled,
            voice_playback: self.voice_playback,
            narration_failure: self.narration_failure.clone(),
            progress_percent: (self.current_step_index + 1) as f64 / step_count as f64 * 100.0,
            ingredients: self
                .recipe
                .ingredients
                .iter()
                .map(|ingredient| ingredient.text.clone())
                .collect(),
            overview,
            can_go_back: !self.completed && !self.is_first_step(),
            can_go_forward: !self.completed && !self.is_last_step(),
            can_finish: !self.completed && self.is_last_step(),
        }
    }

    fn change_step(&mut self, index: usize, auto_grace: bool) -> Effects {
        self.bump_timer_generation();
        let mut effects = vec![SessionEffect::CancelTimers];
        self.stop_narration(&mut effects);

        self.current_step_index = index;
        self.remaining_seconds = self.current_step().timer_duration_seconds;
        self.grace_seconds_left = GRACE_PERIOD_SECONDS;
        effects.push(SessionEffect::Emit(SessionEvent::StepChanged {
            index,
            step_count: self.step_count(),
        }));
        self.set_phase(TimerPhase::Idle, &mut effects);

        if auto_grace && self.has_started && self.current_step_has_countdown() {
            self.enter_grace_period(&mut effects);
        }
        effects
    }

    fn enter_grace_period(&mut self, effects: &mut Effects) {
        let generation = self.bump_timer_generation();
        self.grace_seconds_left = GRACE_PERIOD_SECONDS;
        effects.push(SessionEffect::StartTicker { generation });
        self.set_phase(TimerPhase::GracePeriod, effects);
        effects.push(SessionEffect::Emit(SessionEvent::GraceTick {
            seconds_left: self.grace_seconds_left,
        }));
    }

    fn enter_running(&mut self, effects: &mut Effects) {
        self.set_phase(TimerPhase::Running, effects);
        if self.voice_enabled {
            self.request_narration(effects);
        }
    }

    fn request_narration(&mut self, effects: &mut Effects) {
        let text = self.current_step().instruction.trim().to_string();
        if text.is_empty() || !self.current_step().has_timer() {
            return;
        }

        if self.active_narration.take().is_some() {
            effects.push(SessionEffect::StopNarration);
        }
        self.narration_sequence += 1;
        let ticket = NarrationTicket {
            step_index: self.current_step_index,
            sequence: self.narration_sequence,
        };
        self.active_narration = Some(ticket);
        self.set_voice_playback(VoicePlaybackState::Loading, effects);
        effects.push(SessionEffect::Narrate(NarrationRequest { ticket, text }));
    }

    fn stop_narration(&mut self, effects: &mut Effects) {
        if self.active_narration.take().is_none() {
            return;
        }
        effects.push(SessionEffect::StopNarration);
        if matches!(
            self.voice_playback,
            VoicePlaybackState::Loading | VoicePlaybackState::Playing
        ) {
            self.set_voice_playback(VoicePlaybackState::Idle, effects);
        }
    }

    fn is_current_narration(&self, ticket: NarrationTicket) -> bool {
        !self.completed
            && self.active_narration == Some(ticket)
            && ticket.step_index == self.current_step_index
    }

    fn current_step_has_countdown(&self) -> bool {
        self.remaining_seconds.is_some_and(|seconds| seconds > 0)
    }

    fn set_phase(&mut self, phase: TimerPhase, effects: &mut Effects) {
        if self.timer_phase == phase {
            return;
        }
        self.timer_phase = phase;
        effects.push(SessionEffect::Emit(SessionEvent::TimerPhaseChanged {
            step_index: self.current_step_index,
            phase,
        }));
    }

    fn set_voice_playback(&mut self, state: VoicePlaybackState, effects: &mut Effects) {
        if self.voice_playback == state {
            return;
        }
        self.voice_playback = state;
        effects.push(SessionEffect::Emit(SessionEvent::NarrationStateChanged {
            state,
        }));
    }

    fn bump_timer_generation(&mut self) -> u64 {
        self.timer_generation += 1;
        self.timer_generation
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.completed {
            return Err(invalid_transition(operation, "the session is already completed"));
        }
        Ok(())
    }

    fn invalid_step(&self, requested: isize) -> SessionError {
        SessionError::InvalidStep {
            requested,
            step_count: self.step_count(),
        }
    }
}

fn invalid_transition(operation: &'static str, reason: impl Into<String>) -> SessionError {
    SessionError::InvalidTransition {
        operation,
        reason: reason.into(),
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
