use crate::config::{Point, Rect};
use cogtrial_core::{AssetRef, TrialResult};
use std::time::Duration;

/// Named element of a trial's display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Background,
    Stimulus,
    Left,
    Right,
    Center,
    Reward,
    Prompt,
    Query,
    Countdown,
    Feedback,
    Marker,
    Button(usize),
    Continue,
}

/// One presentation change requested by a trial.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Image {
        slot: Slot,
        asset: AssetRef,
        at: Rect,
    },
    /// Replaces the image of an element already on screen, keeping its position.
    Swap {
        slot: Slot,
        asset: AssetRef,
    },
    Html {
        slot: Slot,
        html: String,
    },
    Text {
        slot: Slot,
        lines: Vec<String>,
        at: Point,
        font_size: f32,
    },
    MoveTo {
        slot: Slot,
        to: Rect,
        over: Duration,
    },
    Circle {
        slot: Slot,
        center: Point,
        radius: f32,
        fill: &'static str,
    },
    Hide {
        slot: Slot,
    },
    Disable {
        slot: Slot,
    },
    MarkResponded {
        slot: Slot,
    },
}

impl DrawCommand {
    pub fn slot(&self) -> Slot {
        match self {
            DrawCommand::Image { slot, .. }
            | DrawCommand::Swap { slot, .. }
            | DrawCommand::Html { slot, .. }
            | DrawCommand::Text { slot, .. }
            | DrawCommand::MoveTo { slot, .. }
            | DrawCommand::Circle { slot, .. }
            | DrawCommand::Hide { slot }
            | DrawCommand::Disable { slot }
            | DrawCommand::MarkResponded { slot } => *slot,
        }
    }

    /// Image shown by this command, if it shows one.
    pub fn asset(&self) -> Option<&AssetRef> {
        match self {
            DrawCommand::Image { asset, .. } | DrawCommand::Swap { asset, .. } => Some(asset),
            _ => None,
        }
    }
}

/// Presentation layer the trial draws on. Rendering itself is the host's business.
pub trait Surface {
    fn draw(&mut self, command: DrawCommand);
    /// Removes everything the current trial drew.
    fn clear(&mut self);
    fn start_audio(&mut self, asset: &AssetRef);
    fn stop_audio(&mut self);
}

/// Receives the one result of each trial.
pub trait ResultSink {
    fn finish(&mut self, result: TrialResult);
}

impl ResultSink for Vec<TrialResult> {
    fn finish(&mut self, result: TrialResult) {
        self.push(result);
    }
}

/// Everything a trial may touch outside itself.
pub struct Host<'a> {
    pub surface: &'a mut dyn Surface,
    pub sink: &'a mut dyn ResultSink,
}

impl<'a> Host<'a> {
    pub fn new(surface: &'a mut dyn Surface, sink: &'a mut dyn ResultSink) -> Self {
        Self { surface, sink }
    }
}

/// Surface that keeps every command, for simulation and tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
    pub clears: usize,
    pub audio: Option<AssetRef>,
    pub audio_starts: usize,
    pub audio_stops: usize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images shown in `slot`, oldest first.
    pub fn images(&self, slot: Slot) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| c.slot() == slot)
            .filter_map(DrawCommand::asset)
            .map(AssetRef::as_str)
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| matches(c)).count()
    }
}

impl Surface for RecordingSurface {
    fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn start_audio(&mut self, asset: &AssetRef) {
        self.audio = Some(asset.clone());
        self.audio_starts += 1;
    }

    fn stop_audio(&mut self) {
        self.audio = None;
        self.audio_stops += 1;
    }
}
