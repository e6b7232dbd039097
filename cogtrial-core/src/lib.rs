pub mod code;
pub mod input;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use code::ResponseCode;
pub use input::{InputChannel, InputEvent};
pub use phase::{Phase, PhaseSequence};
pub use stimulus::{AssetRef, Sprite, SpriteFrame};
pub use trial::{ChoiceData, TransitionType, TrialData, TrialResult, TrialState};
