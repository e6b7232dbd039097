use crate::code::ResponseCode;
use crate::stimulus::{AssetRef, Sprite};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Init,
    Awaiting,
    Responded,
    Finalizing,
    Done,
}

impl TrialState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrialState::Done)
    }
}

/// Whether the spaceship flew to its usual planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    Common,
    Rare,
}

/// Recorded result of one trial, handed to the timeline exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub trial_type: &'static str,
    /// Milliseconds from stimulus onset to the response.
    pub rt: Option<f64>,
    pub response: Option<ResponseCode>,
    pub valid_response: bool,
    /// Milliseconds from the trial's onset to its finalization.
    pub time_elapsed: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rts: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<ResponseCode>,
    #[serde(flatten)]
    pub data: TrialData,
}

/// Per-kind fields echoed from the configuration or derived from the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrialData {
    Fixation {
        stimulus: Option<AssetRef>,
        trial_stage: &'static str,
    },
    Stage {
        stimulus: AssetRef,
        duration: Option<u64>,
        choice_pressed: u8,
    },
    Choice(ChoiceData),
    Mars {
        stimulus: String,
        button_pressed: Option<usize>,
        unshuffled_button: Option<usize>,
    },
    Instructions {
        stimulus: Option<AssetRef>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceData {
    pub planet: AssetRef,
    pub left: Option<Sprite>,
    pub right: Option<Sprite>,
    pub center: Option<Sprite>,
    pub chosen: Option<Sprite>,
    pub duration: Option<u64>,
    pub valid_pressed: u8,
    /// Reward image shown, null when no reward was drawn.
    pub reward: Option<AssetRef>,
    pub rewarded: Option<bool>,
    pub trial_stage: String,
    pub practice_trial: String,
    pub transition_type: Option<TransitionType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_flattens_kind_fields() {
        let result = TrialResult {
            trial_index: 3,
            trial_type: "mars-trial",
            rt: Some(250.0),
            response: Some(ResponseCode::button(0)),
            valid_response: true,
            time_elapsed: 2250.0,
            rts: vec![],
            keys: vec![],
            data: TrialData::Mars {
                stimulus: "<img src='a.png'>".into(),
                button_pressed: Some(0),
                unshuffled_button: Some(2),
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["rt"], json!(250.0));
        assert_eq!(value["response"], json!("0"));
        assert_eq!(value["unshuffled_button"], json!(2));
        assert!(value.get("rts").is_none());
    }

    #[test]
    fn null_response_serializes_as_null() {
        let result = TrialResult {
            trial_index: 0,
            trial_type: "fixation",
            rt: None,
            response: None,
            valid_response: false,
            time_elapsed: 1000.0,
            rts: vec![],
            keys: vec![],
            data: TrialData::Fixation {
                stimulus: None,
                trial_stage: "fixation",
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["rt"].is_null());
        assert!(value["response"].is_null());
        assert_eq!(value["trial_stage"], json!("fixation"));
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(TrialState::Done.is_terminal());
        assert!(!TrialState::Finalizing.is_terminal());
    }
}
