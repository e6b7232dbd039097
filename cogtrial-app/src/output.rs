use cogtrial_core::{AssetRef, TrialResult};
use cogtrial_experiment::{DrawCommand, ResultSink, Surface};
use std::io::{self, Write};
use tracing::{debug, error, trace};

/// Writes each trial result as one line of JSON.
pub struct JsonLines<W: Write> {
    out: W,
    written: usize,
    error: Option<io::Error>,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            error: None,
        }
    }

    fn write(&mut self, result: &TrialResult) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, result)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    /// Number of results written, or the first write error.
    pub fn finish_all(self) -> io::Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.written),
        }
    }
}

impl<W: Write> ResultSink for JsonLines<W> {
    fn finish(&mut self, result: TrialResult) {
        if self.error.is_some() {
            return;
        }
        match self.write(&result) {
            Ok(()) => self.written += 1,
            Err(e) => {
                error!(trial = result.trial_index, "failed to write result: {e}");
                self.error = Some(e);
            }
        }
    }
}

/// Surface that only traces what a trial draws.
#[derive(Debug, Default)]
pub struct LogSurface {
    draws: usize,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl Surface for LogSurface {
    fn draw(&mut self, command: DrawCommand) {
        self.draws += 1;
        trace!(slot = ?command.slot(), ?command, "draw");
    }

    fn clear(&mut self) {
        debug!("clear display");
    }

    fn start_audio(&mut self, asset: &AssetRef) {
        debug!(%asset, "audio started");
    }

    fn stop_audio(&mut self) {
        debug!("audio stopped");
    }
}
