use serde::{Deserialize, Serialize};
use std::fmt;
use string_cache::DefaultAtom as Atom;

/// Identifier of one response: a key name (`"0"`, `"space"`) or the
/// position of a clicked element (`"2"`, `"continue"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResponseCode(Atom);

impl ResponseCode {
    pub const SPACE: &'static str = "space";
    pub const CONTINUE: &'static str = "continue";

    pub fn new(code: &str) -> Self {
        Self(Atom::from(code))
    }

    /// Code for the button shown at `position`.
    pub fn button(position: usize) -> Self {
        Self::new(&position.to_string())
    }

    pub fn space() -> Self {
        Self::new(Self::SPACE)
    }

    /// Maps a legacy numeric key code (e.g. 48 for the `0` key) to its name.
    pub fn from_keycode(keycode: u32) -> Option<Self> {
        let name = match keycode {
            13 => "enter".to_string(),
            27 => "escape".to_string(),
            32 => Self::SPACE.to_string(),
            37 => "arrowleft".to_string(),
            38 => "arrowup".to_string(),
            39 => "arrowright".to_string(),
            40 => "arrowdown".to_string(),
            48..=57 | 65..=90 => char::from_u32(keycode)?.to_ascii_lowercase().to_string(),
            _ => return None,
        };
        Some(Self::new(&name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Position index for button codes.
    pub fn position(&self) -> Option<usize> {
        self.as_str().parse().ok()
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ResponseCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for ResponseCode {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<ResponseCode> for String {
    fn from(code: ResponseCode) -> Self {
        code.as_str().to_string()
    }
}
