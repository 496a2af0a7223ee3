//! Prompt phrasing selection.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks one of several equivalent phrasings.
pub trait VariationStrategy: Send + Sync {
    /// An index in `0..options`. `options` is never zero.
    fn pick(&self, options: usize) -> usize;
}

/// Random choice from a seedable generator. The same seed gives the same
/// sequence of picks.
pub struct SeededVariation {
    rng: Mutex<StdRng>,
}

impl SeededVariation {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl VariationStrategy for SeededVariation {
    fn pick(&self, options: usize) -> usize {
        if options <= 1 {
            return 0;
        }
        self.rng.lock().gen_range(0..options)
    }
}

/// Always the same position, wrapped to the option count.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedVariation(pub usize);

impl VariationStrategy for FixedVariation {
    fn pick(&self, options: usize) -> usize {
        self.0 % options.max(1)
    }
}
