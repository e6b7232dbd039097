use crate::cli::{Cli, Command};
use crate::input::ChannelInput;
use crate::output::{JsonLines, LogSurface};
use anyhow::{Context, Result};
use cogtrial_experiment::{
    Host, InputSource, ScriptedInput, SessionFile, TaskSettings, TrialConfig, TrialRunner,
    run_session,
};
use cogtrial_timing::{HighPrecisionTimer, ManualTimer, Timer};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct App {
    command: Command,
    settings: Arc<TaskSettings>,
    configs: Vec<TrialConfig>,
    script: Vec<Vec<cogtrial_experiment::ScriptStep>>,
    seed: u64,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let args = cli.command.args();
        let session = SessionFile::load(&args.session)
            .with_context(|| format!("failed to load session {}", args.session.display()))?;
        let configs = session
            .configs()
            .with_context(|| format!("invalid session {}", args.session.display()))?;
        let seed = args.seed.or(session.seed).unwrap_or_else(rand::random);

        info!(
            session = %args.session.display(),
            trials = configs.len(),
            seed,
            "session loaded"
        );

        Ok(Self {
            settings: Arc::new(session.settings),
            configs,
            script: session.script,
            seed,
            command: cli.command,
        })
    }

    pub fn run(self) -> Result<()> {
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "starting"
        );
        let out = open_output(self.command.args().out.as_deref())?;

        let written = match self.command {
            Command::Simulate(_) => {
                let timer = ManualTimer::new();
                let mut input = ScriptedInput::new(self.script.clone());
                self.execute(timer, &mut input, out)?
            }
            Command::Run(_) => {
                let timer = HighPrecisionTimer::new();
                let mut input = ChannelInput::stdin(timer.clone());
                self.execute(timer, &mut input, out)?
            }
        };

        info!(results = written, "session complete");
        Ok(())
    }

    fn execute<T: Timer, I: InputSource>(
        &self,
        timer: T,
        input: &mut I,
        out: Box<dyn Write>,
    ) -> Result<usize> {
        let mut runner = TrialRunner::new(timer);
        let mut surface = LogSurface::new();
        let mut sink = JsonLines::new(out);
        {
            let mut host = Host::new(&mut surface, &mut sink);
            run_session(
                Arc::clone(&self.settings),
                self.configs.clone(),
                self.seed,
                &mut runner,
                input,
                &mut host,
            )?;
        }
        debug!(draws = surface.draws(), "display commands issued");
        sink.finish_all().context("failed to write results")
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    })
}

impl Drop for App {
    fn drop(&mut self) {
        debug!("application resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::ffi::OsStr;

    const SESSION: &str = r#"{
        "seed": 3,
        "trials": [
            {"type": "fixation", "text": "+", "trial_duration": 500},
            {"type": "mars-trial", "stimulus": "<p>?</p>", "choices": ["a", "b", "c"], "shuffle_buttons": true}
        ],
        "script": [[], [{"at_ms": 900, "click": "2"}]]
    }"#;

    fn session_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("cogtrial-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn simulate_writes_one_line_per_trial() {
        let session = session_file("session.json", SESSION);
        let out = session.with_extension("jsonl");
        let cli = Cli::try_parse_from([
            OsStr::new("cogtrial"),
            OsStr::new("simulate"),
            session.as_os_str(),
            OsStr::new("--out"),
            out.as_os_str(),
        ])
        .unwrap();

        let app = App::new(cli).unwrap();
        assert_eq!(app.seed, 3);
        app.run().unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["trial_type"], "fixation");
        assert_eq!(lines[1]["rt"], 900.0);
        assert_eq!(lines[1]["button_pressed"], 2);

        std::fs::remove_file(session).ok();
        std::fs::remove_file(out).ok();
    }

    #[test]
    fn invalid_trial_fails_at_load() {
        let session = session_file(
            "invalid.json",
            r#"{"trials": [{"type": "two-stage", "stimuli": ["only-one.png"]}]}"#,
        );
        let cli = Cli::try_parse_from([
            OsStr::new("cogtrial"),
            OsStr::new("simulate"),
            session.as_os_str(),
        ])
        .unwrap();
        let err = App::new(cli).err().unwrap();
        assert!(format!("{err:#}").contains("trial 0"));
        std::fs::remove_file(session).ok();
    }
}
