pub mod config;
pub mod error;
pub mod listener;
pub mod params;
pub mod response;
pub mod reward;
pub mod runner;
pub mod session;
pub mod state;
pub mod surface;

pub use config::{CountdownAssets, Layout, Point, Rect, RewardAssets, TaskSettings, TaskTiming, WindowSize};
pub use error::{ConfigError, SessionError};
pub use listener::{Captured, Delivery, ListenerConfig, ListenerMode, ResponseListener, ResponseSet};
pub use params::{ChoiceTrial, KeySpec, MarsTrial, Side, TrialConfig, TrialKind, TrialParams};
pub use response::{ResponseState, TimedResponse};
pub use reward::{PayoffSlot, ProbabilityRow, Reward, draw_reward};
pub use runner::{InputSource, ScriptInput, ScriptStep, ScriptedInput, TrialRunner, Wait};
pub use session::{SessionFile, run_session};
pub use state::TrialController;
pub use surface::{DrawCommand, Host, RecordingSurface, ResultSink, Slot, Surface};
