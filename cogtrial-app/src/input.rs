use cogtrial_core::{InputEvent, ResponseCode};
use cogtrial_experiment::{InputSource, Wait};
use cogtrial_timing::Timer;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One line of participant input typed on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Key(ResponseCode),
    Click(ResponseCode),
}

impl Command {
    /// Parses `key <code>` or `click <target>`. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let (Some(code), None) = (words.next(), words.next()) else {
            return Err(format!("expected `{verb} <code>`, got `{line}`"));
        };
        match verb {
            "key" => Ok(Some(Command::Key(ResponseCode::new(code)))),
            "click" => Ok(Some(Command::Click(ResponseCode::new(code)))),
            other => Err(format!("unknown command `{other}`")),
        }
    }

    fn event(self, at: Duration) -> InputEvent {
        match self {
            Command::Key(code) => InputEvent::key(code, at),
            Command::Click(target) => InputEvent::click(target, at),
        }
    }
}

/// Input read from a line source on a background thread and stamped on arrival.
pub struct ChannelInput {
    events: Receiver<InputEvent>,
    /// Input that arrived at or after a deadline, held back until the timers ran.
    held: Option<InputEvent>,
}

impl ChannelInput {
    pub fn spawn<T, L>(timer: T, lines: L) -> Self
    where
        T: Timer + Send + 'static,
        L: BufRead + Send + 'static,
    {
        let (tx, events) = mpsc::channel();
        thread::spawn(move || {
            for line in lines.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("input closed: {e}");
                        break;
                    }
                };
                let at = timer.now();
                match Command::parse(&line) {
                    Ok(Some(command)) => {
                        if tx.send(command.event(at)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                }
            }
            debug!("input thread finished");
        });
        Self { events, held: None }
    }

    pub fn stdin<T: Timer + Send + 'static>(timer: T) -> Self {
        Self::spawn(timer, std::io::BufReader::new(std::io::stdin()))
    }
}

impl InputSource for ChannelInput {
    fn begin_trial(&mut self, index: usize, _onset: Duration) {
        let stale = self.held.take().into_iter().count() + self.events.try_iter().count();
        if stale > 0 {
            debug!(trial = index, stale, "discarded input from before onset");
        }
        info!(trial = index, "ready for input");
    }

    fn wait<T: Timer>(&mut self, timer: &T, deadline: Option<Duration>) -> Wait {
        let next = match self.held.take() {
            Some(event) => Ok(event),
            None => match deadline {
                Some(deadline) => self
                    .events
                    .recv_timeout(deadline.saturating_sub(timer.now())),
                None => self.events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            },
        };

        match (next, deadline) {
            (Ok(event), Some(deadline)) if event.at() >= deadline => {
                self.held = Some(event);
                timer.sleep_until(deadline);
                Wait::Deadline
            }
            (Ok(event), _) => Wait::Input(event),
            (Err(_), Some(deadline)) => {
                timer.sleep_until(deadline);
                Wait::Deadline
            }
            (Err(_), None) => Wait::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogtrial_timing::ManualTimer;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case("key space", Some(Command::Key(ResponseCode::space())))]
    #[case("  click 2 ", Some(Command::Click(ResponseCode::button(2))))]
    #[case("click continue", Some(Command::Click(ResponseCode::new("continue"))))]
    #[case("", None)]
    #[case("# practice block", None)]
    fn parses_input_lines(#[case] line: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::parse(line).unwrap(), expected);
    }

    #[rstest]
    #[case("press 1")]
    #[case("key")]
    #[case("key 1 2")]
    fn rejects_malformed_lines(#[case] line: &str) {
        assert!(Command::parse(line).is_err());
    }

    #[test]
    fn closed_input_without_deadline_is_exhausted() {
        let timer = ManualTimer::new();
        let mut input = ChannelInput::spawn(timer.clone(), Cursor::new("key 1\n"));
        input.begin_trial(0, Duration::ZERO);
        let mut seen = Vec::new();
        loop {
            match input.wait(&timer, None) {
                Wait::Input(event) => seen.push(event),
                Wait::Exhausted => break,
                Wait::Deadline => unreachable!(),
            }
        }
        assert!(seen.len() <= 1);
    }

    #[test]
    fn input_at_deadline_waits_for_timers() {
        let timer = ManualTimer::new();
        timer.set(Duration::from_millis(500));
        let mut input = ChannelInput::spawn(timer.clone(), Cursor::new("key 1\n"));
        let first = input.wait(&timer, None);
        assert_eq!(
            first,
            Wait::Input(InputEvent::key("1", Duration::from_millis(500)))
        );

        let mut input = ChannelInput::spawn(timer.clone(), Cursor::new("key 1\n"));
        let deadline = Some(Duration::from_millis(500));
        assert_eq!(input.wait(&timer, deadline), Wait::Deadline);
        assert!(matches!(input.wait(&timer, None), Wait::Input(_)));
    }
}
