use crate::error::ConfigError;
use crate::listener::ResponseSet;
use crate::reward::{PayoffSlot, ProbabilityRow};
use cogtrial_core::{AssetRef, ResponseCode, Sprite, TransitionType};
use serde::Deserialize;
use std::time::Duration;

/// A key given either by name (`"space"`, `"1"`) or by legacy key code (`32`, `49`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    Name(ResponseCode),
    Code(u32),
}

impl KeySpec {
    pub fn resolve(self) -> Result<ResponseCode, ConfigError> {
        match self {
            KeySpec::Name(code) => Ok(code),
            KeySpec::Code(code) => ResponseCode::from_keycode(code).ok_or(ConfigError::Keycode(code)),
        }
    }
}

impl From<&str> for KeySpec {
    fn from(name: &str) -> Self {
        KeySpec::Name(ResponseCode::new(name))
    }
}

fn resolve_keys(keys: Vec<KeySpec>) -> Result<Vec<ResponseCode>, ConfigError> {
    keys.into_iter().map(KeySpec::resolve).collect()
}

fn space_key() -> KeySpec {
    KeySpec::Name(ResponseCode::space())
}

fn space_keys() -> Vec<KeySpec> {
    vec![space_key()]
}

fn left_right_keys() -> Vec<KeySpec> {
    vec!["1".into(), "0".into()]
}

fn yes() -> bool {
    true
}

fn not_applicable() -> String {
    "NA".to_string()
}

fn practice() -> String {
    "practice".to_string()
}

fn button_template() -> ButtonHtml {
    ButtonHtml::One(MarsParams::DEFAULT_BUTTON.to_string())
}

fn zero_px() -> String {
    "0px".to_string()
}

fn eight_px() -> String {
    "8px".to_string()
}

fn two_seconds() -> u64 {
    2000
}

fn millis(ms: Option<u64>) -> Option<Duration> {
    ms.map(Duration::from_millis)
}

/// Author-facing trial definition, as it appears in a session file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TrialParams {
    Fixation(FixationParams),
    TwoStage(TwoStageParams),
    #[serde(rename = "d3-two-stage")]
    D3TwoStage(MarkParams),
    ExplicitChoice(ExplicitChoiceParams),
    MarsTrial(MarsParams),
    Instructions(InstructionsParams),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixationParams {
    pub stimulus: Option<AssetRef>,
    pub text: Option<String>,
    pub trial_duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TwoStageParams {
    pub stimuli: Option<Vec<AssetRef>>,
    #[serde(default = "space_key")]
    pub choices: KeySpec,
    pub prompt: Option<String>,
    pub stimulus_duration: Option<u64>,
    pub trial_duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkParams {
    #[serde(alias = "stimuli")]
    pub stimulus: Option<AssetRef>,
    #[serde(default = "space_keys")]
    pub choices: Vec<KeySpec>,
    pub prompt: Option<String>,
    pub stimulus_duration: Option<u64>,
    pub trial_duration: Option<u64>,
}

/// Choice sprite, optionally tagged with the probability-row column it pays from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChoiceSprite {
    Bare(Sprite),
    Tagged {
        sprite: Sprite,
        payoff_slot: Option<PayoffSlot>,
        alien: Option<u8>,
    },
}

impl ChoiceSprite {
    fn into_option(self) -> Result<ChoiceOption, ConfigError> {
        match self {
            ChoiceSprite::Bare(sprite) => Ok(ChoiceOption {
                sprite,
                payoff: None,
            }),
            ChoiceSprite::Tagged {
                sprite,
                payoff_slot,
                alien,
            } => {
                let payoff = match (payoff_slot, alien) {
                    (Some(slot), _) => Some(slot),
                    (None, Some(n)) => Some(PayoffSlot::for_alien(n).ok_or(ConfigError::Alien(n))?),
                    (None, None) => None,
                };
                Ok(ChoiceOption { sprite, payoff })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExplicitChoiceParams {
    #[serde(alias = "planet_text")]
    pub planet: Option<AssetRef>,
    #[serde(alias = "left_text")]
    pub left: Option<ChoiceSprite>,
    #[serde(alias = "right_text")]
    pub right: Option<ChoiceSprite>,
    #[serde(alias = "center_text")]
    pub center: Option<Sprite>,
    #[serde(default = "left_right_keys")]
    pub choices: Vec<KeySpec>,
    pub trial_duration: Option<u64>,
    #[serde(default = "yes")]
    pub timeout: bool,
    pub trial_row: Option<ProbabilityRow>,
    pub query_trial: Option<String>,
    #[serde(default)]
    pub prompt: Vec<String>,
    #[serde(default = "not_applicable")]
    pub trial_stage: String,
    #[serde(default = "practice")]
    pub practice_trial: String,
    pub transition_type: Option<TransitionType>,
    pub audio_stimulus: Option<AssetRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ButtonHtml {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarsParams {
    pub stimulus: Option<String>,
    pub choices: Option<Vec<String>>,
    #[serde(default = "button_template")]
    pub button_html: ButtonHtml,
    pub prompt: Option<String>,
    pub stimulus_duration: Option<u64>,
    pub trial_duration: Option<u64>,
    pub countdown_start: Option<u64>,
    #[serde(default = "zero_px")]
    pub margin_vertical: String,
    #[serde(default = "eight_px")]
    pub margin_horizontal: String,
    #[serde(default = "yes")]
    pub response_ends_trial: bool,
    #[serde(default)]
    pub shuffle_buttons: bool,
    #[serde(default)]
    pub display_feedback: bool,
    #[serde(default = "two_seconds")]
    pub feedback_duration: u64,
    pub pos_img: Option<String>,
    pub neg_img: Option<String>,
}

impl MarsParams {
    pub const DEFAULT_BUTTON: &'static str = r#"<button class="jspsych-btn">%choice%</button>"#;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructionsParams {
    pub stimulus: Option<AssetRef>,
    #[serde(alias = "left_text")]
    pub left: Option<AssetRef>,
    #[serde(alias = "right_text")]
    pub right: Option<AssetRef>,
    #[serde(alias = "center_text")]
    pub center: Option<AssetRef>,
    #[serde(alias = "reward_string")]
    pub reward: Option<AssetRef>,
    #[serde(default)]
    pub prompt: Vec<String>,
    /// Keys that end the trial once the continue button is armed; any key when absent.
    pub choices: Option<Vec<KeySpec>>,
    pub audio_stimulus: Option<AssetRef>,
}

/// Validated, immutable input to one trial run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialConfig {
    pub kind: TrialKind,
    /// Delay after onset before the stimulus is hidden.
    pub stimulus_duration: Option<Duration>,
    /// Trial timeout; `None` waits for a response indefinitely.
    pub trial_duration: Option<Duration>,
    pub audio: Option<AssetRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialKind {
    Fixation {
        background: Option<AssetRef>,
        text: Option<String>,
    },
    TwoStage {
        first: AssetRef,
        second: AssetRef,
        key: ResponseCode,
        prompt: Option<String>,
    },
    Mark {
        image: AssetRef,
        choices: Vec<ResponseCode>,
        prompt: Option<String>,
    },
    ExplicitChoice(ChoiceTrial),
    Mars(MarsTrial),
    Instructions(InstructionsTrial),
}

impl TrialKind {
    pub fn name(&self) -> &'static str {
        match self {
            TrialKind::Fixation { .. } => "fixation",
            TrialKind::TwoStage { .. } => "two-stage",
            TrialKind::Mark { .. } => "d3-two-stage",
            TrialKind::ExplicitChoice(_) => "explicit-choice",
            TrialKind::Mars(_) => "mars-trial",
            TrialKind::Instructions(_) => "instructions",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    pub sprite: Sprite,
    pub payoff: Option<PayoffSlot>,
}

/// Two-step choice between a left and a right sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceTrial {
    pub planet: AssetRef,
    pub left: Option<ChoiceOption>,
    pub right: Option<ChoiceOption>,
    pub center: Option<Sprite>,
    /// Keys for the left and the right sprite.
    pub keys: [ResponseCode; 2],
    pub timeout: bool,
    pub trial_row: Option<ProbabilityRow>,
    pub query: Option<String>,
    pub prompt: Vec<String>,
    pub trial_stage: String,
    pub practice_trial: String,
    pub transition_type: Option<TransitionType>,
}

/// Which sprite a choice key selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl ChoiceTrial {
    /// Keys that can make a choice: only sides with a sprite on screen count.
    pub fn valid_keys(&self) -> Vec<ResponseCode> {
        let [left, right] = &self.keys;
        match (&self.left, &self.right) {
            (Some(_), Some(_)) => vec![left.clone(), right.clone()],
            (Some(_), None) => vec![left.clone()],
            (None, Some(_)) => vec![right.clone()],
            (None, None) => Vec::new(),
        }
    }

    /// Side picked by `key`. The right key selects the right sprite, anything else the left.
    pub fn side_for(&self, key: &ResponseCode) -> Side {
        if *key == self.keys[1] {
            Side::Right
        } else {
            Side::Left
        }
    }

    pub fn option(&self, side: Side) -> Option<&ChoiceOption> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

/// MaRS button array. `buttons` holds the rendered HTML in original choice order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarsTrial {
    pub stimulus: String,
    pub buttons: Vec<String>,
    pub prompt: Option<String>,
    pub countdown_start: Option<Duration>,
    pub margin_vertical: String,
    pub margin_horizontal: String,
    pub response_ends_trial: bool,
    pub shuffle_buttons: bool,
    pub display_feedback: bool,
    pub feedback_duration: Duration,
    pub pos_img: Option<String>,
    pub neg_img: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstructionsTrial {
    pub background: Option<AssetRef>,
    pub left: Option<AssetRef>,
    pub right: Option<AssetRef>,
    pub center: Option<AssetRef>,
    pub reward: Option<AssetRef>,
    pub prompt: Vec<String>,
    pub keys: ResponseSet,
}

impl TrialParams {
    pub fn name(&self) -> &'static str {
        match self {
            TrialParams::Fixation(_) => "fixation",
            TrialParams::TwoStage(_) => "two-stage",
            TrialParams::D3TwoStage(_) => "d3-two-stage",
            TrialParams::ExplicitChoice(_) => "explicit-choice",
            TrialParams::MarsTrial(_) => "mars-trial",
            TrialParams::Instructions(_) => "instructions",
        }
    }

    /// Validates required fields and fills defaults.
    pub fn into_config(self) -> Result<TrialConfig, ConfigError> {
        match self {
            TrialParams::Fixation(p) => Ok(TrialConfig {
                kind: TrialKind::Fixation {
                    background: p.stimulus,
                    text: p.text,
                },
                stimulus_duration: None,
                trial_duration: millis(p.trial_duration),
                audio: None,
            }),
            TrialParams::TwoStage(p) => p.into_config(),
            TrialParams::D3TwoStage(p) => p.into_config(),
            TrialParams::ExplicitChoice(p) => p.into_config(),
            TrialParams::MarsTrial(p) => p.into_config(),
            TrialParams::Instructions(p) => p.into_config(),
        }
    }
}

impl TwoStageParams {
    fn into_config(self) -> Result<TrialConfig, ConfigError> {
        let stimuli = self.stimuli.ok_or(ConfigError::MissingField("stimuli"))?;
        let [first, second]: [AssetRef; 2] =
            stimuli
                .try_into()
                .map_err(|s: Vec<AssetRef>| ConfigError::LengthMismatch {
                    field: "stimuli",
                    expected: 2,
                    found: s.len(),
                })?;
        Ok(TrialConfig {
            kind: TrialKind::TwoStage {
                first,
                second,
                key: self.choices.resolve()?,
                prompt: self.prompt,
            },
            stimulus_duration: millis(self.stimulus_duration),
            trial_duration: millis(self.trial_duration),
            audio: None,
        })
    }
}

impl MarkParams {
    fn into_config(self) -> Result<TrialConfig, ConfigError> {
        Ok(TrialConfig {
            kind: TrialKind::Mark {
                image: self.stimulus.ok_or(ConfigError::MissingField("stimulus"))?,
                choices: resolve_keys(self.choices)?,
                prompt: self.prompt,
            },
            stimulus_duration: millis(self.stimulus_duration),
            trial_duration: millis(self.trial_duration),
            audio: None,
        })
    }
}

impl ExplicitChoiceParams {
    fn into_config(self) -> Result<TrialConfig, ConfigError> {
        let planet = self.planet.ok_or(ConfigError::MissingField("planet"))?;
        let keys = resolve_keys(self.choices)?;
        let keys: [ResponseCode; 2] =
            keys.try_into()
                .map_err(|k: Vec<ResponseCode>| ConfigError::LengthMismatch {
                    field: "choices",
                    expected: 2,
                    found: k.len(),
                })?;
        if keys[0] == keys[1] {
            return Err(ConfigError::DuplicateKey(keys[0].clone()));
        }
        let left = self.left.map(ChoiceSprite::into_option).transpose()?;
        let right = self.right.map(ChoiceSprite::into_option).transpose()?;

        if let Some(row) = &self.trial_row {
            row.validate()?;
            for (side, option) in [("left", &left), ("right", &right)] {
                if option.as_ref().is_some_and(|o| o.payoff.is_none()) {
                    return Err(ConfigError::MissingPayoff { side });
                }
            }
        }

        Ok(TrialConfig {
            kind: TrialKind::ExplicitChoice(ChoiceTrial {
                planet,
                left,
                right,
                center: self.center,
                keys,
                timeout: self.timeout,
                trial_row: self.trial_row,
                query: self.query_trial,
                prompt: self.prompt,
                trial_stage: self.trial_stage,
                practice_trial: self.practice_trial,
                transition_type: self.transition_type,
            }),
            stimulus_duration: None,
            trial_duration: millis(self.trial_duration),
            audio: self.audio_stimulus,
        })
    }
}

impl MarsParams {
    fn into_config(self) -> Result<TrialConfig, ConfigError> {
        let stimulus = self.stimulus.ok_or(ConfigError::MissingField("stimulus"))?;
        let choices = self.choices.ok_or(ConfigError::MissingField("choices"))?;
        if choices.is_empty() {
            return Err(ConfigError::Empty("choices"));
        }
        let templates = match self.button_html {
            ButtonHtml::One(template) => vec![template; choices.len()],
            ButtonHtml::Many(templates) if templates.len() == choices.len() => templates,
            ButtonHtml::Many(templates) => {
                return Err(ConfigError::LengthMismatch {
                    field: "button_html",
                    expected: choices.len(),
                    found: templates.len(),
                });
            }
        };
        let buttons = templates
            .iter()
            .zip(&choices)
            .map(|(template, choice)| template.replace("%choice%", choice))
            .collect();

        Ok(TrialConfig {
            kind: TrialKind::Mars(MarsTrial {
                stimulus,
                buttons,
                prompt: self.prompt,
                countdown_start: millis(self.countdown_start),
                margin_vertical: self.margin_vertical,
                margin_horizontal: self.margin_horizontal,
                response_ends_trial: self.response_ends_trial,
                shuffle_buttons: self.shuffle_buttons,
                display_feedback: self.display_feedback,
                feedback_duration: Duration::from_millis(self.feedback_duration),
                pos_img: self.pos_img,
                neg_img: self.neg_img,
            }),
            stimulus_duration: millis(self.stimulus_duration),
            trial_duration: millis(self.trial_duration),
            audio: None,
        })
    }
}

impl InstructionsParams {
    fn into_config(self) -> Result<TrialConfig, ConfigError> {
        let keys = match self.choices {
            Some(keys) => ResponseSet::Only(resolve_keys(keys)?),
            None => ResponseSet::Any,
        };
        Ok(TrialConfig {
            kind: TrialKind::Instructions(InstructionsTrial {
                background: self.stimulus,
                left: self.left,
                right: self.right,
                center: self.center,
                reward: self.reward,
                prompt: self.prompt,
                keys,
            }),
            stimulus_duration: None,
            trial_duration: None,
            audio: self.audio_stimulus,
        })
    }
}
