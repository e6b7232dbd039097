use crate::error::SessionError;
use crate::state::TrialController;
use crate::surface::Host;
use cogtrial_core::{InputEvent, ResponseCode};
use cogtrial_timing::{LatencyStats, LatencySummary, Timer};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{trace, warn};

/// Outcome of waiting on an [`InputSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    Input(InputEvent),
    /// The deadline passed before any input arrived.
    Deadline,
    /// No deadline was given and no input will ever arrive.
    Exhausted,
}

/// Participant input as seen by the event loop.
pub trait InputSource {
    /// Called once the trial with `index` has drawn its stimulus at `onset`.
    fn begin_trial(&mut self, index: usize, onset: Duration);

    /// Waits until the next input or until `deadline`, whichever comes first.
    /// An input stamped exactly at the deadline is delivered after the timers.
    fn wait<T: Timer>(&mut self, timer: &T, deadline: Option<Duration>) -> Wait;
}

/// One scripted input, relative to the onset of its trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub input: ScriptInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptInput {
    Key {
        key: ResponseCode,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        repeat: bool,
    },
    Click {
        click: ResponseCode,
    },
}

impl ScriptStep {
    pub fn key(at_ms: u64, key: &str) -> Self {
        Self {
            at_ms,
            input: ScriptInput::Key {
                key: ResponseCode::new(key),
                repeat: false,
            },
        }
    }

    pub fn click(at_ms: u64, target: &str) -> Self {
        Self {
            at_ms,
            input: ScriptInput::Click {
                click: ResponseCode::new(target),
            },
        }
    }

    fn event(&self, onset: Duration) -> InputEvent {
        let at = onset + Duration::from_millis(self.at_ms);
        match &self.input {
            ScriptInput::Key { key, repeat } => InputEvent::Key {
                code: key.clone(),
                repeat: *repeat,
                at,
            },
            ScriptInput::Click { click } => InputEvent::click(click.clone(), at),
        }
    }
}

/// Replays per-trial scripts against the timer, sleeping between inputs.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    scripts: Vec<Vec<ScriptStep>>,
    pending: VecDeque<InputEvent>,
}

impl ScriptedInput {
    pub fn new(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            scripts,
            pending: VecDeque::new(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn begin_trial(&mut self, index: usize, onset: Duration) {
        let mut steps = self.scripts.get(index).cloned().unwrap_or_default();
        steps.sort_by_key(|s| s.at_ms);
        self.pending = steps.iter().map(|s| s.event(onset)).collect();
    }

    fn wait<T: Timer>(&mut self, timer: &T, deadline: Option<Duration>) -> Wait {
        let next_input = self.pending.front().map(InputEvent::at);
        match (next_input, deadline) {
            (Some(at), deadline) if deadline.is_none_or(|d| at < d) => {
                timer.sleep_until(at);
                self.pending
                    .pop_front()
                    .map_or(Wait::Exhausted, Wait::Input)
            }
            (_, Some(deadline)) => {
                timer.sleep_until(deadline);
                Wait::Deadline
            }
            (_, None) => Wait::Exhausted,
        }
    }
}

/// Drives trials to completion against a timer and an input source.
pub struct TrialRunner<T: Timer> {
    timer: T,
    lateness: LatencyStats,
}

impl<T: Timer> TrialRunner<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            lateness: LatencyStats::default(),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Runs one trial until it has handed its result to the sink.
    pub fn run<R: Rng, I: InputSource>(
        &mut self,
        trial: &mut TrialController<T, R>,
        input: &mut I,
        host: &mut Host<'_>,
    ) -> Result<(), SessionError> {
        trial.start(host);
        input.begin_trial(trial.index(), trial.onset());

        while !trial.is_done() {
            let deadline = trial.next_deadline();
            match input.wait(&self.timer, deadline) {
                Wait::Input(event) => {
                    trace!(trial = trial.index(), code = %event.code(), "input");
                    trial.handle_input(&event, host);
                }
                Wait::Deadline => {
                    if let Some(deadline) = deadline {
                        self.lateness.record(self.timer.now().saturating_sub(deadline));
                    }
                    trial.fire_due(host);
                }
                Wait::Exhausted => {
                    warn!(trial = trial.index(), "no deadline and no further input");
                    return Err(SessionError::Stalled {
                        index: trial.index(),
                    });
                }
            }
        }
        Ok(())
    }

    /// How late timers were handled relative to their deadlines.
    pub fn lateness(&self) -> LatencySummary {
        self.lateness.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogtrial_timing::ManualTimer;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn script_steps_parse_keys_and_clicks() {
        let steps: Vec<ScriptStep> = serde_json::from_str(
            r#"[{"at_ms": 250, "click": "0"}, {"at_ms": 300, "key": "1", "repeat": true}]"#,
        )
        .unwrap();
        assert_eq!(steps[0], ScriptStep::click(250, "0"));
        assert_eq!(
            steps[1].input,
            ScriptInput::Key {
                key: ResponseCode::new("1"),
                repeat: true
            }
        );
    }

    #[test]
    fn input_before_deadline_is_delivered() {
        let timer = ManualTimer::new();
        let mut input = ScriptedInput::new(vec![vec![ScriptStep::key(250, "1")]]);
        input.begin_trial(0, ms(1000));
        assert_eq!(
            input.wait(&timer, Some(ms(2000))),
            Wait::Input(InputEvent::key("1", ms(1250)))
        );
        assert_eq!(timer.now(), ms(1250));
    }

    #[test]
    fn timer_wins_a_tie() {
        let timer = ManualTimer::new();
        let mut input = ScriptedInput::new(vec![vec![ScriptStep::key(500, "1")]]);
        input.begin_trial(0, Duration::ZERO);
        assert_eq!(input.wait(&timer, Some(ms(500))), Wait::Deadline);
        assert!(matches!(input.wait(&timer, None), Wait::Input(_)));
        assert_eq!(input.wait(&timer, None), Wait::Exhausted);
    }

    #[test]
    fn missing_script_means_no_input() {
        let timer = ManualTimer::new();
        let mut input = ScriptedInput::new(Vec::new());
        input.begin_trial(3, Duration::ZERO);
        assert_eq!(input.wait(&timer, Some(ms(10))), Wait::Deadline);
        assert_eq!(timer.now(), ms(10));
    }
}
