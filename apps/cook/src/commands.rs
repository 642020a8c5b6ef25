/// One line typed at the `cook>` prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Next,
    Previous,
    /// 1-based step number as shown to the user.
    Jump(usize),
    TimerStart,
    TimerPause,
    TimerReset,
    SkipGrace,
    Voice,
    Show,
    Finish,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start                 dismiss the ready prompt and begin cooking
  next | prev           move between steps
  jump <n>              go to step n
  timer start|pause|reset
  skip                  skip the grace period
  voice                 toggle narration
  show                  print the current step
  finish                complete the recipe (last step only)
  quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(Command::Show);
    };
    let arg = words.next();

    let command = match (head.to_ascii_lowercase().as_str(), arg) {
        ("start", None) => Command::Start,
        ("next" | "n", None) => Command::Next,
        ("prev" | "previous" | "p", None) => Command::Previous,
        ("jump" | "j", Some(raw)) => {
            let number: usize = raw
                .parse()
                .map_err(|_| format!("'{raw}' is not a step number"))?;
            if number == 0 {
                return Err("steps are numbered from 1".to_string());
            }
            Command::Jump(number)
        }
        ("timer" | "t", Some(action)) => match action {
            "start" => Command::TimerStart,
            "pause" => Command::TimerPause,
            "reset" => Command::TimerReset,
            other => return Err(format!("unknown timer action '{other}'")),
        },
        ("skip", None) => Command::SkipGrace,
        ("voice" | "v", None) => Command::Voice,
        ("show" | "s", None) => Command::Show,
        ("finish" | "done", None) => Command::Finish,
        ("help" | "?", None) => Command::Help,
        ("quit" | "exit" | "q", None) => Command::Quit,
        _ => return Err(format!("unrecognized command '{}'", line.trim())),
    };

    if words.next().is_some() {
        return Err(format!("unexpected arguments in '{}'", line.trim()));
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_and_timer_commands() {
        assert_eq!(parse_command("next"), Ok(Command::Next));
        assert_eq!(parse_command("  PREV "), Ok(Command::Previous));
        assert_eq!(parse_command("jump 3"), Ok(Command::Jump(3)));
        assert_eq!(parse_command("timer pause"), Ok(Command::TimerPause));
        assert_eq!(parse_command(""), Ok(Command::Show));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("jump").is_err());
        assert!(parse_command("jump zero").is_err());
        assert!(parse_command("jump 0").is_err());
        assert!(parse_command("timer explode").is_err());
        assert!(parse_command("next please").is_err());
        assert!(parse_command("bake").is_err());
    }
}
