use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reward probabilities for one trial, indexed by [`PayoffSlot`]
/// (`planet * 2 + alien`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRow(pub [f64; 4]);

impl ProbabilityRow {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.0.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            Some(&value) => Err(ConfigError::Probability { value }),
            None => Ok(()),
        }
    }

    pub fn probability(&self, slot: PayoffSlot) -> f64 {
        self.0[slot.index()]
    }
}

/// Column of the probability row that pays out for one alien.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct PayoffSlot(usize);

impl PayoffSlot {
    pub fn new(index: usize) -> Result<Self, ConfigError> {
        if index < 4 {
            Ok(Self(index))
        } else {
            Err(ConfigError::PayoffSlot(index))
        }
    }

    pub fn from_planet(planet: usize, alien: usize) -> Result<Self, ConfigError> {
        Self::new(planet * 2 + alien)
    }

    /// Slot used by the standard alien set numbered 1–4: aliens 1 and 2 live
    /// on the first planet, 3 and 4 on the second, and odd-numbered aliens
    /// take the second column of their planet.
    pub fn for_alien(number: u8) -> Option<Self> {
        if !(1..=4).contains(&number) {
            return None;
        }
        let alien = usize::from(number % 2);
        let planet = usize::from(number > 2);
        Self::from_planet(planet, alien).ok()
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for PayoffSlot {
    type Error = ConfigError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<PayoffSlot> for usize {
    fn from(slot: PayoffSlot) -> Self {
        slot.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reward {
    Treasure,
    Nothing,
}

impl Reward {
    pub fn is_treasure(self) -> bool {
        matches!(self, Reward::Treasure)
    }
}

/// Draws the outcome of asking the alien in `slot` for treasure.
pub fn draw_reward<R: Rng + ?Sized>(row: &ProbabilityRow, slot: PayoffSlot, rng: &mut R) -> Reward {
    if rng.random::<f64>() < row.probability(slot) {
        Reward::Treasure
    } else {
        Reward::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    #[rstest]
    #[case(1, 1)]
    #[case(2, 0)]
    #[case(3, 3)]
    #[case(4, 2)]
    fn alien_numbers_map_to_legacy_columns(#[case] alien: u8, #[case] slot: usize) {
        assert_eq!(PayoffSlot::for_alien(alien).map(PayoffSlot::index), Some(slot));
    }

    #[test]
    fn unknown_alien_has_no_slot() {
        assert_eq!(PayoffSlot::for_alien(0), None);
        assert_eq!(PayoffSlot::for_alien(5), None);
    }

    #[test]
    fn slot_out_of_range_is_rejected() {
        assert_eq!(PayoffSlot::new(4), Err(ConfigError::PayoffSlot(4)));
        assert_eq!(PayoffSlot::from_planet(1, 1).map(PayoffSlot::index), Ok(3));
    }

    #[test]
    fn row_rejects_out_of_range_probability() {
        let row = ProbabilityRow([0.2, 1.5, 0.3, 0.4]);
        assert_eq!(row.validate(), Err(ConfigError::Probability { value: 1.5 }));
    }

    #[test]
    fn certain_rows_are_deterministic() {
        let row = ProbabilityRow([1.0, 0.0, 1.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            assert_eq!(draw_reward(&row, PayoffSlot(0), &mut rng), Reward::Treasure);
            assert_eq!(draw_reward(&row, PayoffSlot(1), &mut rng), Reward::Nothing);
        }
    }

    #[test]
    fn same_seed_same_outcomes() {
        let row = ProbabilityRow([0.5, 0.5, 0.5, 0.5]);
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..32)
                .map(|i| draw_reward(&row, PayoffSlot(i % 4), &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }
}
