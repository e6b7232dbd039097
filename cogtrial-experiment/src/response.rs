use crate::listener::Captured;
use crate::reward::Reward;
use cogtrial_core::ResponseCode;
use std::time::Duration;

/// A response with its latency from stimulus onset.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedResponse {
    pub code: ResponseCode,
    pub rt: Duration,
}

/// Mutable response data of one trial. Frozen once finalized.
#[derive(Debug, Default)]
pub struct ResponseState {
    first: Option<TimedResponse>,
    log: Vec<TimedResponse>,
    derived: Option<Reward>,
    finalized: bool,
}

impl ResponseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the qualifying response. Only the first call has an effect.
    pub fn record(&mut self, response: TimedResponse) -> bool {
        if self.finalized || self.first.is_some() {
            return false;
        }
        self.first = Some(response);
        true
    }

    /// Appends to the auxiliary log.
    pub fn log(&mut self, response: TimedResponse) {
        if !self.finalized {
            self.log.push(response);
        }
    }

    /// Computes the derived field on first use and returns the memoized value after.
    pub fn derive_with(&mut self, compute: impl FnOnce() -> Reward) -> Option<Reward> {
        if self.derived.is_none() && !self.finalized {
            self.derived = Some(compute());
        }
        self.derived
    }

    /// Marks the state final. Returns true only for the first call.
    pub fn finalize(&mut self) -> bool {
        !std::mem::replace(&mut self.finalized, true)
    }

    pub fn first(&self) -> Option<&TimedResponse> {
        self.first.as_ref()
    }

    pub fn extra(&self) -> &[TimedResponse] {
        &self.log
    }

    pub fn derived(&self) -> Option<Reward> {
        self.derived
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl TimedResponse {
    pub fn since(onset: Duration, captured: Captured) -> Self {
        Self {
            code: captured.code,
            rt: captured.at.saturating_sub(onset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(code: &str, ms: u64) -> TimedResponse {
        TimedResponse {
            code: ResponseCode::new(code),
            rt: Duration::from_millis(ms),
        }
    }

    #[test]
    fn first_response_wins() {
        let mut state = ResponseState::new();
        assert!(state.record(response("0", 250)));
        assert!(!state.record(response("1", 300)));
        assert_eq!(state.first(), Some(&response("0", 250)));
    }

    #[test]
    fn derived_value_is_memoized() {
        let mut state = ResponseState::new();
        assert_eq!(state.derive_with(|| Reward::Treasure), Some(Reward::Treasure));
        assert_eq!(state.derive_with(|| Reward::Nothing), Some(Reward::Treasure));
    }

    #[test]
    fn finalized_state_is_frozen() {
        let mut state = ResponseState::new();
        assert!(state.finalize());
        assert!(!state.finalize());
        assert!(!state.record(response("0", 10)));
        state.log(response("9", 20));
        assert!(state.extra().is_empty());
        assert_eq!(state.derive_with(|| Reward::Treasure), None);
        assert!(state.is_finalized());
    }

    #[test]
    fn rt_is_measured_from_onset() {
        let captured = Captured {
            code: ResponseCode::new("1"),
            at: Duration::from_millis(1250),
        };
        assert_eq!(
            TimedResponse::since(Duration::from_millis(1000), captured).rt,
            Duration::from_millis(250)
        );
    }
}
