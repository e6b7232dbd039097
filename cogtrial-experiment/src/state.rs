use crate::config::{Layout, Point, Rect, TaskSettings, TaskTiming};
use crate::listener::{Delivery, ListenerConfig, ResponseListener, ResponseSet};
use crate::params::{ChoiceTrial, InstructionsTrial, MarsTrial, Side, TrialConfig, TrialKind};
use crate::response::{ResponseState, TimedResponse};
use crate::reward::{Reward, draw_reward};
use crate::surface::{DrawCommand, Host, Slot};
use cogtrial_core::{
    AssetRef, ChoiceData, InputChannel, InputEvent, Phase, PhaseSequence, ResponseCode,
    SpriteFrame, TrialData, TrialResult, TrialState,
};
use cogtrial_timing::{Timer, TimerHandle, TimerSet};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Canvas of the robot image in the mark-on-press task.
const MARK_CANVAS: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 540.0,
    height: 720.0,
};
const MARK_CENTER: Point = Point { x: 269.0, y: 362.0 };
const MARK_RADIUS: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrialEvent {
    HideStimulus,
    TrialTimeout,
    Countdown,
    Animation,
    End,
}

/// Steps of the chosen sprite's animation after a valid choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChoicePhase {
    Moving,
    Arrived,
    Flash(u8),
    Settled,
}

impl Phase for ChoicePhase {
    fn label(&self) -> &'static str {
        match self {
            ChoicePhase::Moving => "moving",
            ChoicePhase::Arrived => "arrived",
            ChoicePhase::Flash(_) => "flash",
            ChoicePhase::Settled => "settled",
        }
    }
}

fn choice_animation(timing: &TaskTiming) -> PhaseSequence<ChoicePhase> {
    let flash = timing.isitime() / 5;
    let mut steps = vec![
        (ChoicePhase::Moving, timing.box_moving_time()),
        (ChoicePhase::Arrived, flash),
    ];
    steps.extend((1..=4).map(|n| (ChoicePhase::Flash(n), flash)));
    steps.push((ChoicePhase::Settled, timing.moneytime()));
    PhaseSequence::new(steps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownPhase {
    Waiting,
    Frame(usize),
}

impl Phase for CountdownPhase {
    fn label(&self) -> &'static str {
        match self {
            CountdownPhase::Waiting => "waiting",
            CountdownPhase::Frame(_) => "frame",
        }
    }
}

fn countdown(delay: Duration, frames: usize, frame: Duration) -> PhaseSequence<CountdownPhase> {
    let mut steps = vec![(CountdownPhase::Waiting, delay)];
    steps.extend((0..frames).map(|i| (CountdownPhase::Frame(i), frame)));
    PhaseSequence::new(steps)
}

fn timer_html(frame: &AssetRef) -> String {
    format!("<div id='timer'><img src='{frame}' height='100' width='100'></div>")
}

fn side_slot(side: Side) -> Slot {
    match side {
        Side::Left => Slot::Left,
        Side::Right => Slot::Right,
    }
}

/// Milliseconds, exact for whole-millisecond durations.
fn as_millis_f64(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

/// Kind-specific progress of a running trial.
#[derive(Debug)]
enum Runtime {
    Static,
    Stage {
        pressed: bool,
    },
    Choice {
        moves_possible: bool,
        chosen: Option<Side>,
        animation: Option<PhaseSequence<ChoicePhase>>,
    },
    Mars {
        /// Original choice index shown at each button position.
        order: Vec<usize>,
        countdown: Option<PhaseSequence<CountdownPhase>>,
        countdown_timer: Option<TimerHandle>,
        pressed: Option<usize>,
    },
    Instructions {
        armed: bool,
    },
}

impl Runtime {
    fn for_kind(kind: &TrialKind) -> Self {
        match kind {
            TrialKind::Fixation { .. } => Runtime::Static,
            TrialKind::TwoStage { .. } | TrialKind::Mark { .. } => Runtime::Stage { pressed: false },
            TrialKind::ExplicitChoice(_) => Runtime::Choice {
                moves_possible: true,
                chosen: None,
                animation: None,
            },
            TrialKind::Mars(mars) => Runtime::Mars {
                order: (0..mars.buttons.len()).collect(),
                countdown: None,
                countdown_timer: None,
                pressed: None,
            },
            TrialKind::Instructions(_) => Runtime::Instructions { armed: false },
        }
    }
}

/// Runs one trial from onset to its single result.
///
/// The controller never blocks. The host delivers input with
/// [`handle_input`](Self::handle_input) and calls [`fire_due`](Self::fire_due)
/// once [`next_deadline`](Self::next_deadline) has passed. Every transition
/// happens inside one of those two calls.
pub struct TrialController<T: Timer, R: Rng> {
    index: usize,
    config: Arc<TrialConfig>,
    settings: Arc<TaskSettings>,
    layout: Layout,
    timer: T,
    rng: R,
    timers: TimerSet<TrialEvent>,
    listeners: Vec<ResponseListener>,
    response: ResponseState,
    state: TrialState,
    onset: Duration,
    timeout: Option<TimerHandle>,
    hide: Option<TimerHandle>,
    audio_playing: bool,
    runtime: Runtime,
}

impl<T: Timer, R: Rng> TrialController<T, R> {
    pub fn new(
        index: usize,
        config: TrialConfig,
        settings: Arc<TaskSettings>,
        timer: T,
        rng: R,
    ) -> Self {
        let layout = settings.layout();
        let runtime = Runtime::for_kind(&config.kind);
        Self {
            index,
            config: Arc::new(config),
            settings,
            layout,
            timer,
            rng,
            timers: TimerSet::new(),
            listeners: Vec::new(),
            response: ResponseState::new(),
            state: TrialState::Init,
            onset: Duration::ZERO,
            timeout: None,
            hide: None,
            audio_playing: false,
            runtime,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &TrialKind {
        &self.config.kind
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Monotonic time the stimulus was first drawn.
    pub fn onset(&self) -> Duration {
        self.onset
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.iter().filter(|l| l.is_active()).count()
    }

    /// Draws the stimulus, records onset, registers listeners and schedules timers.
    pub fn start(&mut self, host: &mut Host<'_>) {
        if self.state != TrialState::Init {
            return;
        }
        let now = self.timer.now();
        self.onset = now;
        let config = Arc::clone(&self.config);

        if let Some(audio) = &config.audio {
            host.surface.start_audio(audio);
            self.audio_playing = true;
        }

        match &config.kind {
            TrialKind::Fixation { background, text } => {
                if let Some(background) = background {
                    self.draw_full(host, Slot::Background, background);
                }
                if let Some(text) = text {
                    host.surface.draw(DrawCommand::Text {
                        slot: Slot::Prompt,
                        lines: vec![text.clone()],
                        at: Point {
                            x: self.layout.center.x - 3.0,
                            y: self.layout.center.y,
                        },
                        font_size: self.layout.font_size,
                    });
                }
            }
            TrialKind::TwoStage {
                first, key, prompt, ..
            } => {
                self.draw_full(host, Slot::Stimulus, first);
                draw_prompt(host, prompt.as_deref());
                self.listen(
                    ListenerConfig::keyboard(ResponseSet::Only(vec![key.clone()])).millisecond(),
                );
            }
            TrialKind::Mark {
                image,
                choices,
                prompt,
            } => {
                host.surface.draw(DrawCommand::Image {
                    slot: Slot::Stimulus,
                    asset: image.clone(),
                    at: MARK_CANVAS,
                });
                draw_prompt(host, prompt.as_deref());
                self.listen(
                    ListenerConfig::keyboard(ResponseSet::Only(choices.clone()))
                        .millisecond()
                        .collect_all(),
                );
            }
            TrialKind::ExplicitChoice(choice) => self.start_choice(choice, host),
            TrialKind::Mars(mars) => self.start_mars(mars, now, host),
            TrialKind::Instructions(instructions) => self.start_instructions(instructions, host),
        }

        if let Some(delay) = config.stimulus_duration {
            self.hide = Some(self.timers.schedule(now, delay, TrialEvent::HideStimulus));
        }
        let timeout_enabled = !matches!(&config.kind, TrialKind::ExplicitChoice(c) if !c.timeout);
        if let Some(duration) = config.trial_duration.filter(|_| timeout_enabled) {
            self.timeout = Some(self.timers.schedule(now, duration, TrialEvent::TrialTimeout));
        }

        self.state = TrialState::Awaiting;
        info!(
            trial = self.index,
            kind = config.kind.name(),
            timeout_ms = ?config.trial_duration.map(|d| d.as_millis()),
            "trial started"
        );
    }

    fn start_choice(&mut self, choice: &ChoiceTrial, host: &mut Host<'_>) {
        self.draw_full(host, Slot::Background, &choice.planet);
        for (side, at) in [
            (Side::Right, self.layout.choice_right),
            (Side::Left, self.layout.choice_left),
        ] {
            if let Some(option) = choice.option(side) {
                host.surface.draw(DrawCommand::Image {
                    slot: side_slot(side),
                    asset: option.sprite.frame(SpriteFrame::Normal),
                    at,
                });
            }
        }
        if let Some(center) = &choice.center {
            host.surface.draw(DrawCommand::Image {
                slot: Slot::Center,
                asset: center.frame(SpriteFrame::Deactivated),
                at: self.layout.chosen,
            });
        }
        if let Some(query) = &choice.query {
            host.surface.draw(DrawCommand::Text {
                slot: Slot::Query,
                lines: vec![query.clone()],
                at: self.layout.text_start,
                font_size: self.layout.font_size,
            });
        }
        if !choice.prompt.is_empty() {
            host.surface.draw(DrawCommand::Text {
                slot: Slot::Prompt,
                lines: choice.prompt.clone(),
                at: self.layout.instructions_text_start,
                font_size: self.layout.font_size,
            });
        }
        self.listen(ListenerConfig::keyboard(ResponseSet::Only(choice.valid_keys())).collect_all());
    }

    fn start_mars(&mut self, mars: &MarsTrial, now: Duration, host: &mut Host<'_>) {
        if let Runtime::Mars { order, .. } = &mut self.runtime
            && mars.shuffle_buttons
        {
            order.shuffle(&mut self.rng);
        }

        host.surface.draw(DrawCommand::Html {
            slot: Slot::Stimulus,
            html: format!(
                r#"<div id="jspsych-mars-trial-stimulus">{}</div>"#,
                mars.stimulus
            ),
        });
        if let Runtime::Mars { order, .. } = &self.runtime {
            for (position, &original) in order.iter().enumerate() {
                host.surface.draw(DrawCommand::Html {
                    slot: Slot::Button(position),
                    html: format!(
                        r#"<div class="jspsych-mars-trial-button" style="display: inline-block; margin:{} {}" data-choice="{}">{}</div>"#,
                        mars.margin_vertical, mars.margin_horizontal, position, mars.buttons[original]
                    ),
                });
            }
        }
        draw_prompt(host, mars.prompt.as_deref());

        let buttons = (0..mars.buttons.len()).map(ResponseCode::button).collect();
        self.listen(ListenerConfig::pointer(ResponseSet::Only(buttons)));

        if let Some(delay) = mars.countdown_start {
            let countdown_assets = &self.settings.countdown;
            let mut sequence = countdown(
                delay,
                countdown_assets.frames.len(),
                Duration::from_millis(countdown_assets.frame_ms),
            );
            sequence.start(now);
            if let Runtime::Mars { countdown, .. } = &mut self.runtime {
                *countdown = Some(sequence);
            }
            self.advance_countdown(now, host);
        }
    }

    fn start_instructions(&mut self, instructions: &InstructionsTrial, host: &mut Host<'_>) {
        if let Some(background) = &instructions.background {
            self.draw_full(host, Slot::Background, background);
        }
        let images = [
            (Slot::Right, &instructions.right, self.layout.choice_right),
            (Slot::Reward, &instructions.reward, self.layout.instructions_reward),
            (Slot::Left, &instructions.left, self.layout.choice_left),
            (Slot::Center, &instructions.center, self.layout.instructions_center),
        ];
        for (slot, asset, at) in images {
            if let Some(asset) = asset {
                host.surface.draw(DrawCommand::Image {
                    slot,
                    asset: asset.clone(),
                    at,
                });
            }
        }
        self.draw_continue(host, "red");
        if !instructions.prompt.is_empty() {
            host.surface.draw(DrawCommand::Text {
                slot: Slot::Prompt,
                lines: instructions.prompt.clone(),
                at: self.layout.instructions_text_start,
                font_size: self.layout.font_size,
            });
        }
        let button = ResponseSet::Only(vec![ResponseCode::new(ResponseCode::CONTINUE)]);
        self.listen(ListenerConfig::pointer(button).gate());
        self.listen(ListenerConfig::keyboard(instructions.keys.clone()).gate());
    }

    fn listen(&mut self, config: ListenerConfig) {
        self.listeners.push(ResponseListener::start(config));
    }

    fn draw_full(&self, host: &mut Host<'_>, slot: Slot, asset: &AssetRef) {
        host.surface.draw(DrawCommand::Image {
            slot,
            asset: asset.clone(),
            at: self.layout.window,
        });
    }

    fn draw_continue(&self, host: &mut Host<'_>, fill: &'static str) {
        host.surface.draw(DrawCommand::Circle {
            slot: Slot::Continue,
            center: self.layout.continue_button,
            radius: self.layout.continue_radius,
            fill,
        });
    }

    fn reward_asset(&self, reward: Reward) -> AssetRef {
        match reward {
            Reward::Treasure => self.settings.reward.treasure.clone(),
            Reward::Nothing => self.settings.reward.nothing.clone(),
        }
    }

    /// Passes one input event to every listener of the trial.
    pub fn handle_input(&mut self, event: &InputEvent, host: &mut Host<'_>) {
        if !matches!(self.state, TrialState::Awaiting | TrialState::Responded) {
            return;
        }
        for listener in 0..self.listeners.len() {
            if self.is_done() {
                break;
            }
            if let Some(delivery) = self.listeners[listener].deliver(event) {
                self.on_delivery(listener, delivery, host);
            }
        }
    }

    fn on_delivery(&mut self, listener: usize, delivery: Delivery, host: &mut Host<'_>) {
        let config = Arc::clone(&self.config);
        let channel = self.listeners[listener].channel();
        let onset = self.listeners[listener].timestamp().resolve(self.onset);

        match (&config.kind, delivery) {
            (TrialKind::TwoStage { second, .. }, Delivery::Response(captured)) => {
                self.accept(TimedResponse::since(onset, captured));
                self.runtime = Runtime::Stage { pressed: true };
                host.surface.draw(DrawCommand::MarkResponded {
                    slot: Slot::Stimulus,
                });
                self.draw_full(host, Slot::Stimulus, second);
                self.listeners[listener].stop();
            }
            (TrialKind::Mark { .. }, Delivery::Response(captured)) => {
                let response = TimedResponse::since(onset, captured);
                self.response.log(response.clone());
                self.accept(response);
                self.runtime = Runtime::Stage { pressed: true };
                host.surface.draw(DrawCommand::MarkResponded {
                    slot: Slot::Stimulus,
                });
                host.surface.draw(DrawCommand::Circle {
                    slot: Slot::Marker,
                    center: MARK_CENTER,
                    radius: MARK_RADIUS,
                    fill: "black",
                });
            }
            (TrialKind::ExplicitChoice(choice), Delivery::Response(captured)) => {
                self.on_choice(choice, TimedResponse::since(onset, captured), host);
            }
            (TrialKind::Mars(mars), Delivery::Response(captured)) => {
                self.on_button(mars, TimedResponse::since(onset, captured), host);
            }
            (TrialKind::Instructions(_), Delivery::Response(captured)) => {
                let armed = matches!(self.runtime, Runtime::Instructions { armed: true });
                match channel {
                    InputChannel::Pointer if !armed => {
                        self.runtime = Runtime::Instructions { armed: true };
                        self.draw_continue(host, "green");
                        debug!(trial = self.index, "continue armed");
                    }
                    InputChannel::Pointer => {}
                    InputChannel::Keyboard if armed => {
                        self.accept(TimedResponse::since(onset, captured));
                        self.finalize(host);
                    }
                    InputChannel::Keyboard => {
                        debug!(trial = self.index, key = %captured.code, "key before continue ignored");
                    }
                }
            }
            (_, Delivery::Extra(captured)) => {
                self.response.log(TimedResponse::since(onset, captured));
            }
            (_, Delivery::Response(captured)) => {
                debug!(trial = self.index, code = %captured.code, "response without effect");
            }
        }
    }

    /// Records the first qualifying response.
    fn accept(&mut self, response: TimedResponse) -> bool {
        let code = response.code.clone();
        let rt_ms = as_millis_f64(response.rt);
        if !self.response.record(response) {
            return false;
        }
        self.state = TrialState::Responded;
        debug!(trial = self.index, %code, rt_ms, "response recorded");
        true
    }

    fn on_choice(&mut self, choice: &ChoiceTrial, response: TimedResponse, host: &mut Host<'_>) {
        if !matches!(self.runtime, Runtime::Choice { moves_possible: true, .. }) {
            self.response.log(response);
            return;
        }
        let side = choice.side_for(&response.code);
        let Some(chosen) = choice.option(side) else {
            debug!(trial = self.index, key = %response.code, "key has no sprite");
            self.response.log(response);
            return;
        };
        if !self.accept(response) {
            return;
        }
        // Cancelled rather than left running: the End timer scheduled below ends the trial.
        if let Some(timeout) = self.timeout.take() {
            self.timers.cancel(timeout);
        }
        if choice.query.is_some() {
            self.finalize(host);
            return;
        }

        if let (Some(row), Some(slot)) = (choice.trial_row, chosen.payoff) {
            let rng = &mut self.rng;
            let reward = self.response.derive_with(|| draw_reward(&row, slot, rng));
            debug!(trial = self.index, slot = slot.index(), ?reward, "reward drawn");
        }

        if choice.valid_keys().len() > 1
            && let Some(other) = choice.option(side.other())
        {
            host.surface.draw(DrawCommand::Swap {
                slot: side_slot(side.other()),
                asset: other.sprite.frame(SpriteFrame::Deactivated),
            });
        }
        if choice.center.is_some() {
            host.surface.draw(DrawCommand::Hide { slot: Slot::Center });
        }

        let now = self.timer.now();
        let timing = self.settings.timing;
        let mut animation = choice_animation(&timing);
        animation.start(now);
        self.runtime = Runtime::Choice {
            moves_possible: true,
            chosen: Some(side),
            animation: Some(animation),
        };
        self.advance_animation(now, host);
        self.timers
            .schedule(now, timing.isitime() + timing.moneytime(), TrialEvent::End);
    }

    fn advance_animation(&mut self, now: Duration, host: &mut Host<'_>) {
        let config = Arc::clone(&self.config);
        let TrialKind::ExplicitChoice(choice) = &config.kind else {
            return;
        };
        let Runtime::Choice {
            chosen: Some(side),
            animation: Some(animation),
            ..
        } = &mut self.runtime
        else {
            return;
        };
        let side = *side;
        let entered = animation.poll(now);
        let next = animation.next_boundary();
        let Some(sprite) = choice.option(side).map(|o| &o.sprite) else {
            return;
        };
        let slot = side_slot(side);

        for phase in entered {
            debug!(trial = self.index, phase = phase.label(), "choice animation");
            match phase {
                ChoicePhase::Moving => {
                    host.surface.draw(DrawCommand::Swap {
                        slot,
                        asset: sprite.frame(SpriteFrame::Active2),
                    });
                    host.surface.draw(DrawCommand::MoveTo {
                        slot,
                        to: self.layout.chosen,
                        over: self.settings.timing.box_moving_time(),
                    });
                }
                ChoicePhase::Arrived => {}
                ChoicePhase::Flash(n) => {
                    let frame = if n % 2 == 1 {
                        SpriteFrame::Active1
                    } else {
                        SpriteFrame::Active2
                    };
                    host.surface.draw(DrawCommand::Swap {
                        slot,
                        asset: sprite.frame(frame),
                    });
                }
                ChoicePhase::Settled => {
                    host.surface.draw(DrawCommand::Swap {
                        slot,
                        asset: sprite.frame(SpriteFrame::Deactivated),
                    });
                    if let Some(reward) = self.response.derived() {
                        host.surface.draw(DrawCommand::Image {
                            slot: Slot::Reward,
                            asset: self.reward_asset(reward),
                            at: self.layout.reward,
                        });
                    }
                }
            }
        }

        if let Some(at) = next {
            self.timers
                .schedule(now, at.saturating_sub(now), TrialEvent::Animation);
        }
    }

    fn choice_timeout(&mut self, choice: &ChoiceTrial, now: Duration, host: &mut Host<'_>) {
        if self.response.first().is_none() {
            if let Runtime::Choice { moves_possible, .. } = &mut self.runtime {
                *moves_possible = false;
            }
            for side in [Side::Right, Side::Left] {
                if let Some(option) = choice.option(side) {
                    host.surface.draw(DrawCommand::Swap {
                        slot: side_slot(side),
                        asset: option.sprite.frame(SpriteFrame::Spent),
                    });
                }
            }
            info!(trial = self.index, "choice window elapsed without a choice");
        }
        self.timers
            .schedule(now, self.settings.timing.isitime(), TrialEvent::End);
    }

    fn on_button(&mut self, mars: &MarsTrial, response: TimedResponse, host: &mut Host<'_>) {
        let Some(position) = response.code.position() else {
            return;
        };
        if !self.accept(response) {
            return;
        }
        let mut original = position;
        if let Runtime::Mars {
            order,
            countdown,
            countdown_timer,
            pressed,
        } = &mut self.runtime
        {
            original = order.get(position).copied().unwrap_or(position);
            *pressed = Some(position);
            *countdown = None;
            if let Some(handle) = countdown_timer.take() {
                self.timers.cancel(handle);
            }
        }
        if let Some(handle) = self.hide.take() {
            self.timers.cancel(handle);
        }

        host.surface.draw(DrawCommand::MarkResponded {
            slot: Slot::Stimulus,
        });
        for button in 0..mars.buttons.len() {
            host.surface.draw(DrawCommand::Disable {
                slot: Slot::Button(button),
            });
        }
        if mars.display_feedback {
            host.surface.draw(DrawCommand::Html {
                slot: Slot::Countdown,
                html: timer_html(&self.settings.countdown.blank),
            });
            let feedback = if original == 0 {
                &mars.pos_img
            } else {
                &mars.neg_img
            };
            if let Some(html) = feedback {
                host.surface.draw(DrawCommand::Html {
                    slot: Slot::Feedback,
                    html: html.clone(),
                });
            }
        }
        if mars.response_ends_trial {
            if let Some(timeout) = self.timeout.take() {
                self.timers.cancel(timeout);
            }
            self.timers
                .schedule(self.timer.now(), mars.feedback_duration, TrialEvent::End);
        }
    }

    fn advance_countdown(&mut self, now: Duration, host: &mut Host<'_>) {
        let Runtime::Mars {
            countdown: Some(sequence),
            countdown_timer,
            ..
        } = &mut self.runtime
        else {
            return;
        };
        for phase in sequence.poll(now) {
            if let CountdownPhase::Frame(i) = phase
                && let Some(frame) = self.settings.countdown.frames.get(i)
            {
                host.surface.draw(DrawCommand::Html {
                    slot: Slot::Countdown,
                    html: timer_html(frame),
                });
            }
        }
        *countdown_timer = sequence
            .next_boundary()
            .map(|at| self.timers.schedule(now, at.saturating_sub(now), TrialEvent::Countdown));
    }

    /// Handles every timer whose deadline has passed. Returns how many fired.
    pub fn fire_due(&mut self, host: &mut Host<'_>) -> usize {
        let mut fired = 0;
        while !self.is_done() {
            let now = self.timer.now();
            let Some((_, event)) = self.timers.pop_due(now) else {
                break;
            };
            fired += 1;
            self.on_timer(event, now, host);
        }
        fired
    }

    fn on_timer(&mut self, event: TrialEvent, now: Duration, host: &mut Host<'_>) {
        match event {
            TrialEvent::HideStimulus => {
                self.hide = None;
                host.surface.draw(DrawCommand::Hide {
                    slot: Slot::Stimulus,
                });
            }
            TrialEvent::TrialTimeout => {
                self.timeout = None;
                let config = Arc::clone(&self.config);
                match &config.kind {
                    TrialKind::ExplicitChoice(choice) => self.choice_timeout(choice, now, host),
                    _ => {
                        debug!(trial = self.index, "trial duration elapsed");
                        self.finalize(host);
                    }
                }
            }
            TrialEvent::Countdown => self.advance_countdown(now, host),
            TrialEvent::Animation => self.advance_animation(now, host),
            TrialEvent::End => self.finalize(host),
        }
    }

    /// Ends the trial and hands its result to the sink. Only the first call has an effect.
    pub fn finalize(&mut self, host: &mut Host<'_>) {
        if self.state == TrialState::Init || !self.response.finalize() {
            return;
        }
        self.state = TrialState::Finalizing;

        let cancelled = self.timers.cancel_all();
        for listener in &mut self.listeners {
            listener.stop();
        }
        if std::mem::take(&mut self.audio_playing) {
            host.surface.stop_audio();
        }

        let result = self.build_result(self.timer.now());
        host.surface.clear();
        self.state = TrialState::Done;

        info!(
            trial = self.index,
            kind = result.trial_type,
            rt_ms = ?result.rt,
            response = ?result.response.as_ref().map(ResponseCode::as_str),
            cancelled,
            "trial finished"
        );
        host.sink.finish(result);
    }

    fn build_result(&self, now: Duration) -> TrialResult {
        let first = self.response.first();
        let extra = self.response.extra();
        let duration = self.config.trial_duration.map(|d| d.as_millis() as u64);

        let data = match &self.config.kind {
            TrialKind::Fixation { background, .. } => TrialData::Fixation {
                stimulus: background.clone(),
                trial_stage: "fixation",
            },
            TrialKind::TwoStage { first: image, .. } | TrialKind::Mark { image, .. } => {
                TrialData::Stage {
                    stimulus: image.clone(),
                    duration,
                    choice_pressed: u8::from(matches!(
                        self.runtime,
                        Runtime::Stage { pressed: true }
                    )),
                }
            }
            TrialKind::ExplicitChoice(choice) => {
                let chosen = match &self.runtime {
                    Runtime::Choice { chosen, .. } => *chosen,
                    _ => None,
                };
                let derived = self.response.derived();
                TrialData::Choice(ChoiceData {
                    planet: choice.planet.clone(),
                    left: choice.left.as_ref().map(|o| o.sprite.clone()),
                    right: choice.right.as_ref().map(|o| o.sprite.clone()),
                    center: choice.center.clone(),
                    chosen: chosen
                        .and_then(|side| choice.option(side))
                        .map(|o| o.sprite.clone()),
                    duration,
                    valid_pressed: u8::from(first.is_some()),
                    reward: derived.map(|r| self.reward_asset(r)),
                    rewarded: derived.map(Reward::is_treasure),
                    trial_stage: choice.trial_stage.clone(),
                    practice_trial: choice.practice_trial.clone(),
                    transition_type: choice.transition_type,
                })
            }
            TrialKind::Mars(mars) => {
                let (button_pressed, unshuffled_button) = match &self.runtime {
                    Runtime::Mars { order, pressed, .. } => (
                        *pressed,
                        pressed.and_then(|p| order.get(p).copied()),
                    ),
                    _ => (None, None),
                };
                TrialData::Mars {
                    stimulus: mars.stimulus.clone(),
                    button_pressed,
                    unshuffled_button,
                }
            }
            TrialKind::Instructions(instructions) => TrialData::Instructions {
                stimulus: instructions.background.clone(),
            },
        };

        TrialResult {
            trial_index: self.index,
            trial_type: self.config.kind.name(),
            rt: first.map(|r| as_millis_f64(r.rt)),
            response: first.map(|r| r.code.clone()),
            valid_response: first.is_some(),
            time_elapsed: as_millis_f64(now.saturating_sub(self.onset)),
            rts: extra.iter().map(|r| as_millis_f64(r.rt)).collect(),
            keys: extra.iter().map(|r| r.code.clone()).collect(),
            data,
        }
    }
}

fn draw_prompt(host: &mut Host<'_>, prompt: Option<&str>) {
    if let Some(prompt) = prompt {
        host.surface.draw(DrawCommand::Html {
            slot: Slot::Prompt,
            html: prompt.to_string(),
        });
    }
}
