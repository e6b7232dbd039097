use cogtrial_core::ResponseCode;
use thiserror::Error;

/// Malformed trial definition, reported before the trial starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required parameter `{0}`")]
    MissingField(&'static str),

    #[error("`{field}` has {found} entries but {expected} were expected")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("`{0}` must not be empty")]
    Empty(&'static str),

    #[error("probability {value} in `trial_row` is outside [0, 1]")]
    Probability { value: f64 },

    #[error("key `{0}` is bound to both sides")]
    DuplicateKey(ResponseCode),

    #[error("payoff slot {0} is outside the four-entry probability row")]
    PayoffSlot(usize),

    #[error("`{side}` sprite has no payoff slot but `trial_row` is set")]
    MissingPayoff { side: &'static str },

    #[error("alien {0} is not one of the four task aliens")]
    Alien(u8),

    #[error("key code {0} has no known key name")]
    Keycode(u32),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse session: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trial {index}: {source}")]
    Config {
        index: usize,
        #[source]
        source: ConfigError,
    },

    #[error("trial {index} is waiting for input that will never arrive")]
    Stalled { index: usize },
}
