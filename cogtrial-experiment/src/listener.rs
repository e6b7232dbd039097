use cogtrial_core::{InputChannel, InputEvent, ResponseCode};
use cogtrial_timing::TimestampMethod;
use std::time::Duration;

/// Codes a listener accepts as qualifying responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSet {
    Any,
    Only(Vec<ResponseCode>),
}

impl ResponseSet {
    pub fn contains(&self, code: &ResponseCode) -> bool {
        match self {
            ResponseSet::Any => true,
            ResponseSet::Only(codes) => codes.contains(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// Only the first qualifying event is a response.
    Latch,
    /// Every qualifying event is a response until the listener is stopped.
    Gate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerConfig {
    pub channel: InputChannel,
    pub allowed: ResponseSet,
    pub allow_held_key: bool,
    pub timestamp: TimestampMethod,
    pub mode: ListenerMode,
    /// Report events that are not the response as [`Delivery::Extra`].
    pub collect_all: bool,
}

impl ListenerConfig {
    pub fn keyboard(allowed: ResponseSet) -> Self {
        Self {
            channel: InputChannel::Keyboard,
            allowed,
            allow_held_key: false,
            timestamp: TimestampMethod::Monotonic,
            mode: ListenerMode::Latch,
            collect_all: false,
        }
    }

    pub fn pointer(allowed: ResponseSet) -> Self {
        Self {
            channel: InputChannel::Pointer,
            ..Self::keyboard(allowed)
        }
    }

    pub fn gate(mut self) -> Self {
        self.mode = ListenerMode::Gate;
        self
    }

    pub fn collect_all(mut self) -> Self {
        self.collect_all = true;
        self
    }

    pub fn millisecond(mut self) -> Self {
        self.timestamp = TimestampMethod::Millisecond;
        self
    }
}

/// One event accepted by a listener, stamped in the listener's time base.
#[derive(Debug, Clone, PartialEq)]
pub struct Captured {
    pub code: ResponseCode,
    pub at: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Response(Captured),
    Extra(Captured),
}

/// Subscription to one input channel for the lifetime of a trial.
#[derive(Debug)]
pub struct ResponseListener {
    config: ListenerConfig,
    active: bool,
    latched: bool,
}

impl ResponseListener {
    pub fn start(config: ListenerConfig) -> Self {
        Self {
            config,
            active: true,
            latched: false,
        }
    }

    /// Classifies `event`. Stopped listeners and other channels yield nothing.
    pub fn deliver(&mut self, event: &InputEvent) -> Option<Delivery> {
        if !self.active || event.channel() != self.config.channel {
            return None;
        }
        if event.is_repeat() && !self.config.allow_held_key {
            return None;
        }

        let captured = Captured {
            code: event.code().clone(),
            at: self.config.timestamp.resolve(event.at()),
        };
        let qualifies = self.config.allowed.contains(&captured.code);

        match self.config.mode {
            ListenerMode::Latch if qualifies && !self.latched => {
                self.latched = true;
                Some(Delivery::Response(captured))
            }
            ListenerMode::Gate if qualifies => Some(Delivery::Response(captured)),
            _ if self.config.collect_all => Some(Delivery::Extra(captured)),
            _ => None,
        }
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn timestamp(&self) -> TimestampMethod {
        self.config.timestamp
    }

    pub fn channel(&self) -> InputChannel {
        self.config.channel
    }
}
