use crate::code::ResponseCode;
use std::time::Duration;

/// Source channel of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputChannel {
    Keyboard,
    Pointer,
}

/// One participant input as delivered by the host event loop.
///
/// `at` is the monotonic time the host observed the event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        code: ResponseCode,
        /// Auto-repeat from a key being held down.
        repeat: bool,
        at: Duration,
    },
    Click {
        target: ResponseCode,
        at: Duration,
    },
}

impl InputEvent {
    pub fn key(code: impl Into<ResponseCode>, at: Duration) -> Self {
        Self::Key {
            code: code.into(),
            repeat: false,
            at,
        }
    }

    pub fn click(target: impl Into<ResponseCode>, at: Duration) -> Self {
        Self::Click {
            target: target.into(),
            at,
        }
    }

    pub fn channel(&self) -> InputChannel {
        match self {
            Self::Key { .. } => InputChannel::Keyboard,
            Self::Click { .. } => InputChannel::Pointer,
        }
    }

    pub fn code(&self) -> &ResponseCode {
        match self {
            Self::Key { code, .. } => code,
            Self::Click { target, .. } => target,
        }
    }

    pub fn at(&self) -> Duration {
        match self {
            Self::Key { at, .. } | Self::Click { at, .. } => *at,
        }
    }

    pub fn is_repeat(&self) -> bool {
        matches!(self, Self::Key { repeat: true, .. })
    }
}
