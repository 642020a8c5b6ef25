use std::fmt::Write as _;

use client_core::{
    format_clock, SessionEvent, SessionSnapshot, StepStatus, TimerPhase, VoicePlaybackState,
};

pub fn describe_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::Started => "Let's cook!".to_string(),
        SessionEvent::StepChanged { index, step_count } => {
            format!("-> step {} of {}", index + 1, step_count)
        }
        SessionEvent::GraceTick { seconds_left } if *seconds_left > 0 => {
            format!("timer starts in {seconds_left}s (type 'skip' to start now)")
        }
        SessionEvent::TimerPhaseChanged {
            phase: TimerPhase::Running,
            ..
        } => "timer running".to_string(),
        SessionEvent::CountdownTick { remaining_seconds }
            if *remaining_seconds % 10 == 0 || *remaining_seconds <= 5 =>
        {
            format!("  {}", format_clock(*remaining_seconds))
        }
        SessionEvent::TimerElapsed { step_index } => {
            format!("Step {} complete! Moving on shortly.", step_index + 1)
        }
        SessionEvent::TimerReset { remaining_seconds } => format!(
            "timer reset to {}",
            format_clock(remaining_seconds.unwrap_or(0))
        ),
        SessionEvent::VoiceToggled { enabled } => {
            format!("narration {}", if *enabled { "on" } else { "off" })
        }
        SessionEvent::NarrationFailed(failure) => format!("! {}", failure.reason),
        SessionEvent::Completed(summary) => format!("Finished {}. Enjoy!", summary.title),
        _ => return None,
    };
    Some(line)
}

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  [{:.0}%]  step {}/{}",
        snapshot.recipe_title,
        snapshot.progress_percent,
        snapshot.step_index + 1,
        snapshot.step_count
    );

    if !snapshot.has_started {
        let _ = writeln!(out, "Ready to cook? Type 'start'.");
        if !snapshot.ingredients.is_empty() {
            let _ = writeln!(out, "Ingredients:");
            for ingredient in &snapshot.ingredients {
                let _ = writeln!(out, "  - {ingredient}");
            }
        }
    }

    for item in &snapshot.overview {
        let marker = match item.status {
            StepStatus::Done => "x",
            StepStatus::Current => ">",
            StepStatus::Upcoming => " ",
        };
        let timer = if item.has_timer { " (timed)" } else { "" };
        let _ = writeln!(out, " [{marker}] {}. {}{timer}", item.index + 1, item.instruction);
    }

    let timer = match (snapshot.timer_phase, snapshot.grace_seconds_left) {
        (TimerPhase::GracePeriod, Some(seconds)) => format!("get ready: {seconds}s"),
        (TimerPhase::Running, _) => format!("{} remaining", snapshot.clock),
        (TimerPhase::Finished, _) => "done".to_string(),
        _ if snapshot.remaining_seconds.is_some() => format!("{} (paused)", snapshot.clock),
        _ => "no timer".to_string(),
    };
    let voice = match (snapshot.voice_enabled, snapshot.voice_playback) {
        (false, _) => "off",
        (true, VoicePlaybackState::Loading) => "loading",
        (true, VoicePlaybackState::Playing) => "playing",
        (true, _) => "on",
    };
    let _ = write!(out, "timer: {timer} | narration: {voice}");
    if let Some(failure) = &snapshot.narration_failure {
        let _ = write!(out, "\n! {}", failure.reason);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::CookingSession;
    use shared::domain::{Recipe, RecipeId, RecipeRecord, StepId, StepRecord};

    fn session() -> CookingSession {
        let record = RecipeRecord {
            id: RecipeId::new_random(),
            title: "Risotto".to_string(),
            steps: vec![
                StepRecord {
                    id: StepId::new_random(),
                    step_number: 1,
                    instruction: "Toast the rice".to_string(),
                    timer_duration: Some(90),
                },
                StepRecord {
                    id: StepId::new_random(),
                    step_number: 2,
                    instruction: "Add stock".to_string(),
                    timer_duration: None,
                },
            ],
            ingredients: Vec::new(),
        };
        CookingSession::new(Recipe::from_record(record)).expect("session")
    }

    #[test]
    fn snapshot_shows_ready_prompt_and_overview() {
        let text = render_snapshot(&session().snapshot());
        assert!(text.contains("Ready to cook?"));
        assert!(text.contains(" [>] 1. Toast the rice (timed)"));
        assert!(text.contains("1:30 (paused)"));
    }

    #[test]
    fn snapshot_shows_grace_countdown() {
        let mut session = session();
        session.start().expect("start");
        let text = render_snapshot(&session.snapshot());
        assert!(text.contains("get ready: 10s"));
        assert!(!text.contains("Ready to cook?"));
    }

    #[test]
    fn quiet_events_are_not_printed() {
        assert!(describe_event(&SessionEvent::CountdownTick {
            remaining_seconds: 37
        })
        .is_none());
        assert_eq!(
            describe_event(&SessionEvent::CountdownTick {
                remaining_seconds: 60
            })
            .as_deref(),
            Some("  1:00")
        );
    }
}
