use crate::config::TaskSettings;
use crate::error::SessionError;
use crate::params::{TrialConfig, TrialParams};
use crate::runner::{InputSource, ScriptStep, TrialRunner};
use crate::state::TrialController;
use crate::surface::Host;
use cogtrial_timing::Timer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A session definition: shared settings, the trial list and optional scripted input.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub settings: TaskSettings,
    pub trials: Vec<TrialParams>,
    /// Scripted inputs per trial, used by simulated runs.
    #[serde(default)]
    pub script: Vec<Vec<ScriptStep>>,
    pub seed: Option<u64>,
}

impl SessionFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validates every trial up front so a malformed definition stops the
    /// session before the first stimulus.
    pub fn configs(&self) -> Result<Vec<TrialConfig>, SessionError> {
        self.trials
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, params)| {
                params
                    .into_config()
                    .map_err(|source| SessionError::Config { index, source })
            })
            .collect()
    }
}

/// Runs `configs` in order, one trial after another with the inter-trial
/// interval between them. Trial `i` draws from `StdRng` seeded with `seed + i`.
pub fn run_session<T: Timer, I: InputSource>(
    settings: Arc<TaskSettings>,
    configs: Vec<TrialConfig>,
    seed: u64,
    runner: &mut TrialRunner<T>,
    input: &mut I,
    host: &mut Host<'_>,
) -> Result<(), SessionError> {
    let total = configs.len();
    info!(trials = total, seed, "session started");

    for (index, config) in configs.into_iter().enumerate() {
        if index > 0 {
            runner.timer().sleep(settings.timing.ititime());
        }
        let rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        let mut trial = TrialController::new(
            index,
            config,
            Arc::clone(&settings),
            runner.timer().clone(),
            rng,
        );
        runner.run(&mut trial, input, host)?;
    }

    let lateness = runner.lateness();
    info!(
        trials = total,
        timer_samples = lateness.samples,
        mean_lateness_us = lateness.mean_ns / 1_000.0,
        max_lateness_us = lateness.max_ns / 1_000.0,
        "session finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn invalid_trial_is_reported_with_its_index() {
        let session = SessionFile::from_json(
            r#"{
                "trials": [
                    {"type": "fixation", "trial_duration": 500},
                    {"type": "mars-trial", "choices": ["a"]}
                ]
            }"#,
        )
        .unwrap();
        let err = session.configs().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Config {
                index: 1,
                source: ConfigError::MissingField("stimulus")
            }
        ));
    }

    #[test]
    fn unknown_trial_type_is_a_parse_error() {
        let err = SessionFile::from_json(r#"{"trials": [{"type": "survey"}]}"#).unwrap_err();
        assert!(matches!(err, SessionError::Json(_)));
    }
}
