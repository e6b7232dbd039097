use cogtrial_core::AssetRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Task-wide durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskTiming {
    /// How long the reward stays on screen.
    pub moneytime_ms: u64,
    /// Choice animation length, also the grace period after a timeout.
    pub isitime_ms: u64,
    /// Response window for timed choices.
    pub choicetime_ms: u64,
    /// Chosen sprite's slide to the center.
    pub box_moving_time_ms: u64,
    /// Gap between consecutive trials.
    pub ititime_ms: u64,
}

impl Default for TaskTiming {
    fn default() -> Self {
        Self {
            moneytime_ms: 1000,
            isitime_ms: 1000,
            choicetime_ms: 3000,
            box_moving_time_ms: 90,
            ititime_ms: 1000,
        }
    }
}

impl TaskTiming {
    pub fn moneytime(&self) -> Duration {
        Duration::from_millis(self.moneytime_ms)
    }

    pub fn isitime(&self) -> Duration {
        Duration::from_millis(self.isitime_ms)
    }

    pub fn choicetime(&self) -> Duration {
        Duration::from_millis(self.choicetime_ms)
    }

    pub fn box_moving_time(&self) -> Duration {
        Duration::from_millis(self.box_moving_time_ms)
    }

    pub fn ititime(&self) -> Duration {
        Duration::from_millis(self.ititime_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn square(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            width: size,
            height: size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: f32,
    pub height: f32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
        }
    }
}

/// Pixel positions for the two-step scenes, derived once from the window size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub window: Rect,
    pub picture_width: f32,
    pub picture_height: f32,
    pub monster_size: f32,
    pub reward_size: f32,
    pub choice_left: Rect,
    pub choice_right: Rect,
    pub chosen: Rect,
    pub reward: Rect,
    pub instructions_center: Rect,
    pub instructions_reward: Rect,
    pub continue_button: Point,
    pub continue_radius: f32,
    pub center: Point,
    pub text_start: Point,
    pub instructions_text_start: Point,
    pub font_size: f32,
}

impl Layout {
    /// Aspect ratio of the background artwork.
    const PICTURE_ASPECT: f32 = 1.34;
    /// Height of the artwork the sprite sizes were measured against.
    const REFERENCE_HEIGHT: f32 = 758.0;

    pub fn for_window(size: WindowSize) -> Self {
        let WindowSize { width, height } = size;
        let (picture_width, picture_height) = if width / height < Self::PICTURE_ASPECT {
            (width, width / Self::PICTURE_ASPECT)
        } else {
            (height * Self::PICTURE_ASPECT, height)
        };
        let scale = picture_height / Self::REFERENCE_HEIGHT;
        let monster_size = 300.0 * scale;
        let reward_size = 75.0 * scale;

        let x_center = width / 2.0;
        let y_center = height / 2.0;

        let choice_y = y_center + 0.22 * picture_height - monster_size / 2.0;
        let choice_x_right = x_center + 0.25 * picture_width - monster_size / 2.0;
        let choice_x_left = x_center - 0.25 * picture_width - monster_size / 2.0;
        let chosen_y = y_center - 0.06 * picture_height - monster_size / 2.0;
        let chosen_x = x_center - monster_size / 2.0;
        let reward_y = chosen_y - reward_size / 2.0;
        let reward_x = x_center - reward_size / 2.0;

        Self {
            window: Rect {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
            picture_width,
            picture_height,
            monster_size,
            reward_size,
            choice_left: Rect::square(choice_x_left, choice_y, monster_size),
            choice_right: Rect::square(choice_x_right, choice_y, monster_size),
            chosen: Rect::square(chosen_x, chosen_y, monster_size),
            reward: Rect::square(reward_x, reward_y, reward_size),
            instructions_center: Rect::square(chosen_x, choice_y, monster_size),
            instructions_reward: Rect::square(reward_x, choice_y, reward_size),
            continue_button: Point {
                x: choice_x_right + monster_size,
                y: choice_y + monster_size - 100.0,
            },
            continue_radius: 25.0,
            center: Point {
                x: x_center,
                y: y_center,
            },
            text_start: Point {
                x: x_center - 0.49 * picture_width,
                y: y_center - 0.2 * picture_height,
            },
            instructions_text_start: Point {
                x: x_center - 0.49 * picture_width,
                y: y_center - 0.4 * picture_height,
            },
            font_size: 25.0 * scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardAssets {
    pub treasure: AssetRef,
    pub nothing: AssetRef,
}

impl Default for RewardAssets {
    fn default() -> Self {
        Self {
            treasure: AssetRef::new("images/t.png"),
            nothing: AssetRef::new("images/nothing.png"),
        }
    }
}

/// Countdown clock images, shown from the first to the last entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownAssets {
    pub frames: Vec<AssetRef>,
    pub blank: AssetRef,
    pub frame_ms: u64,
}

impl Default for CountdownAssets {
    fn default() -> Self {
        Self {
            frames: (1..=5)
                .rev()
                .map(|n| AssetRef::new(&format!("img/timer{n}.png")))
                .collect(),
            blank: AssetRef::new("img/blanktimer.png"),
            frame_ms: 1000,
        }
    }
}

/// Immutable settings shared by every trial of a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub timing: TaskTiming,
    pub window: WindowSize,
    pub reward: RewardAssets,
    pub countdown: CountdownAssets,
}

impl TaskSettings {
    pub fn layout(&self) -> Layout {
        Layout::for_window(self.window)
    }
}
