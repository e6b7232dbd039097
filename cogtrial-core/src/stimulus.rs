use serde::{Deserialize, Serialize};
use std::fmt;
use string_cache::DefaultAtom as Atom;

/// Loadable media reference (image or audio path), resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AssetRef(Atom);

impl AssetRef {
    pub fn new(path: &str) -> Self {
        Self(Atom::from(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AssetRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for AssetRef {
    fn from(path: String) -> Self {
        Self::new(&path)
    }
}

impl From<AssetRef> for String {
    fn from(asset: AssetRef) -> Self {
        asset.as_str().to_string()
    }
}

/// Display state of a choice sprite (spaceship or alien).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteFrame {
    Normal,
    Deactivated,
    Active1,
    Active2,
    /// Shown when the choice window ran out.
    Spent,
}

impl SpriteFrame {
    fn suffix(self) -> &'static str {
        match self {
            SpriteFrame::Normal => "norm",
            SpriteFrame::Deactivated => "deact",
            SpriteFrame::Active1 => "a1",
            SpriteFrame::Active2 => "a2",
            SpriteFrame::Spent => "sp",
        }
    }
}

/// Family of images sharing a base path, e.g. `images/alien1` with
/// `images/alien1_norm.png`, `images/alien1_a1.png`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sprite {
    base: AssetRef,
}

impl Sprite {
    pub fn new(base: &str) -> Self {
        Self {
            base: AssetRef::new(base),
        }
    }

    pub fn base(&self) -> &AssetRef {
        &self.base
    }

    pub fn frame(&self, frame: SpriteFrame) -> AssetRef {
        AssetRef::new(&format!("{}_{}.png", self.base, frame.suffix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_frames_follow_naming_scheme() {
        let alien = Sprite::new("images/alien3");
        assert_eq!(alien.frame(SpriteFrame::Normal).as_str(), "images/alien3_norm.png");
        assert_eq!(alien.frame(SpriteFrame::Deactivated).as_str(), "images/alien3_deact.png");
        assert_eq!(alien.frame(SpriteFrame::Active1).as_str(), "images/alien3_a1.png");
        assert_eq!(alien.frame(SpriteFrame::Active2).as_str(), "images/alien3_a2.png");
        assert_eq!(alien.frame(SpriteFrame::Spent).as_str(), "images/alien3_sp.png");
    }

    #[test]
    fn sprite_deserializes_from_base_path() {
        let sprite: Sprite = serde_json::from_str("\"images/rocket1\"").unwrap();
        assert_eq!(sprite.base().as_str(), "images/rocket1");
    }
}
