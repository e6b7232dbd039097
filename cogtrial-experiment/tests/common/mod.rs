//! Drives a single trial against a virtual clock and a recording surface.

#![allow(dead_code)]

use cogtrial_core::{InputEvent, TrialResult};
use cogtrial_experiment::{
    Host, RecordingSurface, TaskSettings, TrialConfig, TrialController, TrialParams,
};
use cogtrial_timing::{ManualTimer, Timer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

/// Virtual time at which every harness trial starts.
pub const ONSET: Duration = Duration::from_millis(1_000);

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

pub struct Harness {
    pub timer: ManualTimer,
    pub surface: RecordingSurface,
    pub results: Vec<TrialResult>,
    pub trial: TrialController<ManualTimer, StdRng>,
}

impl Harness {
    pub fn new(params: serde_json::Value) -> Self {
        Self::seeded(params, 0)
    }

    pub fn seeded(params: serde_json::Value, seed: u64) -> Self {
        Self::with_settings(params, TaskSettings::default(), seed)
    }

    pub fn with_settings(params: serde_json::Value, settings: TaskSettings, seed: u64) -> Self {
        let config = serde_json::from_value::<TrialParams>(params)
            .unwrap()
            .into_config()
            .unwrap();
        Self::from_config(config, settings, seed)
    }

    /// Builds a trial from an already resolved config, skipping parameter validation.
    pub fn from_config(config: TrialConfig, settings: TaskSettings, seed: u64) -> Self {
        let timer = ManualTimer::new();
        timer.set(ONSET);
        let trial = TrialController::new(
            0,
            config,
            Arc::new(settings),
            timer.clone(),
            StdRng::seed_from_u64(seed),
        );
        Self {
            timer,
            surface: RecordingSurface::new(),
            results: Vec::new(),
            trial,
        }
    }

    /// Builds and starts the trial at [`ONSET`].
    pub fn started(params: serde_json::Value) -> Self {
        let mut harness = Self::new(params);
        harness.start();
        harness
    }

    pub fn start(&mut self) {
        let mut host = Host::new(&mut self.surface, &mut self.results);
        self.trial.start(&mut host);
    }

    /// Moves the clock to `after_onset_ms`, firing every timer due on the way in order.
    pub fn advance_to(&mut self, after_onset_ms: u64) {
        let target = ONSET + ms(after_onset_ms);
        loop {
            match self.trial.next_deadline() {
                Some(deadline) if deadline <= target => {
                    self.timer.set(deadline);
                    let mut host = Host::new(&mut self.surface, &mut self.results);
                    self.trial.fire_due(&mut host);
                }
                _ => break,
            }
        }
        self.timer.set(target);
    }

    pub fn key(&mut self, code: &str, after_onset_ms: u64) {
        self.advance_to(after_onset_ms);
        self.input(InputEvent::key(code, self.timer.now()));
    }

    pub fn click(&mut self, target: &str, after_onset_ms: u64) {
        self.advance_to(after_onset_ms);
        self.input(InputEvent::click(target, self.timer.now()));
    }

    pub fn input(&mut self, event: InputEvent) {
        let mut host = Host::new(&mut self.surface, &mut self.results);
        self.trial.handle_input(&event, &mut host);
    }

    pub fn finalize(&mut self) {
        let mut host = Host::new(&mut self.surface, &mut self.results);
        self.trial.finalize(&mut host);
    }

    pub fn now(&self) -> Duration {
        self.timer.now()
    }

    /// The single result of the trial.
    pub fn result(&self) -> &TrialResult {
        assert_eq!(self.results.len(), 1, "expected exactly one result");
        &self.results[0]
    }

    /// Time the trial ended, relative to onset.
    pub fn ended_at_ms(&self) -> f64 {
        self.result().time_elapsed
    }
}
