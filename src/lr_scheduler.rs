//! Learning-rate trackers.
//!
//! A tracker maps the optimizer's update count to a learning rate. Optimizers query it on
//! every update call, so the rate always matches the current count.
//!
//! ```
//! use ndoptim::lr_scheduler::{FactorTracker, LearningRateTracker};
//!
//! // Halve the rate every 10 updates.
//! let tracker = FactorTracker::new(1.0f64, 10, 0.5);
//! assert_eq!(tracker.learning_rate(10), 1.0);
//! assert_eq!(tracker.learning_rate(11), 0.5);
//! assert_eq!(tracker.learning_rate(21), 0.25);
//! ```
use crate::Float;
use serde::{Deserialize, Serialize};

/// Source of the learning rate for a given update count.
pub trait LearningRateTracker<F: Float> {
    fn learning_rate(&self, num_update: usize) -> F;
}

impl<F: Float, T: LearningRateTracker<F> + ?Sized> LearningRateTracker<F> for Box<T> {
    fn learning_rate(&self, num_update: usize) -> F {
        (**self).learning_rate(num_update)
    }
}

/// Constant learning rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedLearningRate<F: Float> {
    pub lr: F,
}

impl<F: Float> FixedLearningRate<F> {
    pub fn new(lr: F) -> Self {
        FixedLearningRate { lr }
    }
}

impl<F: Float> LearningRateTracker<F> for FixedLearningRate<F> {
    fn learning_rate(&self, _num_update: usize) -> F {
        self.lr
    }
}

/// How the rate moves during warmup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupMode {
    /// Linear ramp from `begin_lr` to the tracker's base rate.
    Linear,
    /// Stay at `begin_lr` until warmup ends.
    Constant,
}

/// Warmup phase covering update counts `0..steps`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Warmup<F: Float> {
    pub steps: usize,
    pub begin_lr: F,
    pub mode: WarmupMode,
}

impl<F: Float> Warmup<F> {
    /// No warmup at all.
    pub fn none() -> Self {
        Warmup {
            steps: 0,
            begin_lr: F::zero(),
            mode: WarmupMode::Linear,
        }
    }

    /// Rate during warmup, or `None` once `num_update` is past it.
    fn learning_rate(&self, num_update: usize, final_lr: F) -> Option<F> {
        if num_update >= self.steps {
            return None;
        }
        match self.mode {
            WarmupMode::Constant => Some(self.begin_lr),
            WarmupMode::Linear => {
                let progress = F::from(num_update).unwrap_or_else(F::zero)
                    / F::from(self.steps).unwrap_or_else(F::one);
                Some(self.begin_lr + (final_lr - self.begin_lr) * progress)
            }
        }
    }
}

/// Multiplies the rate by `factor` every `step` updates, never going below `stop_factor_lr`.
///
/// The first decay happens once the count exceeds `step`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FactorTracker<F: Float> {
    pub base_lr: F,
    pub step: usize,
    pub factor: F,
    pub stop_factor_lr: F,
    pub warmup: Warmup<F>,
}

impl<F: Float> FactorTracker<F> {
    pub fn new(base_lr: F, step: usize, factor: F) -> Self {
        FactorTracker {
            base_lr,
            step,
            factor,
            stop_factor_lr: F::from(1e-8).unwrap_or_else(F::zero),
            warmup: Warmup::none(),
        }
    }

    pub fn with_stop_factor_lr(mut self, stop_factor_lr: F) -> Self {
        self.stop_factor_lr = stop_factor_lr;
        self
    }

    pub fn with_warmup(mut self, warmup: Warmup<F>) -> Self {
        self.warmup = warmup;
        self
    }
}

impl<F: Float> LearningRateTracker<F> for FactorTracker<F> {
    fn learning_rate(&self, num_update: usize) -> F {
        if let Some(lr) = self.warmup.learning_rate(num_update, self.base_lr) {
            return lr;
        }
        if num_update == 0 || self.step == 0 {
            return self.base_lr;
        }
        let decays = (num_update - 1) / self.step;
        let lr = self.base_lr * self.factor.powi(decays.min(i32::MAX as usize) as i32);
        lr.max(self.stop_factor_lr)
    }
}

/// Multiplies the rate by `factor` each time the count passes one of `steps`.
///
/// `steps` must be strictly increasing.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiFactorTracker<F: Float> {
    pub base_lr: F,
    pub steps: Vec<usize>,
    pub factor: F,
    pub warmup: Warmup<F>,
}

impl<F: Float> MultiFactorTracker<F> {
    pub fn new(base_lr: F, steps: Vec<usize>, factor: F) -> Self {
        MultiFactorTracker {
            base_lr,
            steps,
            factor,
            warmup: Warmup::none(),
        }
    }

    pub fn with_warmup(mut self, warmup: Warmup<F>) -> Self {
        self.warmup = warmup;
        self
    }
}

impl<F: Float> LearningRateTracker<F> for MultiFactorTracker<F> {
    fn learning_rate(&self, num_update: usize) -> F {
        if let Some(lr) = self.warmup.learning_rate(num_update, self.base_lr) {
            return lr;
        }
        let passed = self.steps.iter().take_while(|&&s| num_update > s).count();
        self.base_lr * self.factor.powi(passed.min(i32::MAX as usize) as i32)
    }
}
