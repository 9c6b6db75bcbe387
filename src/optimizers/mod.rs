//! A collection of gradient descent optimizers.
//!
//! Every optimizer is an adapter over a [ComputeBackend](../backend/trait.ComputeBackend.html):
//! it resolves hyperparameters for the current call and issues a single kernel call.
use crate::lr_scheduler::LearningRateTracker;
use crate::ndarray_ext::{NdArray, NdArrayView, NdArrayViewMut};
use crate::smallvec::SmallVec;
use crate::{Float, FxHashMap, OptimizerError};
use log::info;
use serde::{Deserialize, Serialize};

pub mod adam;
pub mod sgd;

/// Auxiliary arrays an optimizer keeps for one parameter.
///
/// The caller owns these; optimizers create them in `create_state` and mutate their
/// contents in `update`.
pub type OptimizerState<F> = SmallVec<[NdArray<F>; 2]>;

/// Hyperparameters shared by all optimizers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizerConfig<F: Float> {
    /// Gradients are multiplied by this before anything else.
    pub rescale_grad: F,
    /// L2 weight decay coefficient.
    pub weight_decay: F,
    /// Rescaled gradients are clipped to `[-clip_gradient, clip_gradient]`.
    /// Negative means no clipping.
    pub clip_gradient: F,
    /// Count the update counter starts from.
    pub begin_num_update: usize,
    /// Keep an `f32` master copy of low-precision weights. Not supported yet.
    pub multi_precision: bool,
}

impl<F: Float> Default for OptimizerConfig<F> {
    fn default() -> Self {
        OptimizerConfig {
            rescale_grad: F::one(),
            weight_decay: F::zero(),
            clip_gradient: -F::one(),
            begin_num_update: 0,
            multi_precision: false,
        }
    }
}

/// Capability shared by every optimizer.
///
/// A training loop calls `create_state` once per parameter index and then `update` once
/// per parameter per step, handing back the state it got from `create_state`.
pub trait Optimizer<F: Float> {
    /// Creates the auxiliary state for the parameter at `index`, if this optimizer needs one.
    fn create_state(
        &self,
        index: usize,
        weight: &NdArrayView<F>,
    ) -> Result<Option<OptimizerState<F>>, OptimizerError>;

    /// Updates `weight` in place using `grad`.
    fn update(
        &mut self,
        index: usize,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        state: Option<&mut OptimizerState<F>>,
    ) -> Result<(), OptimizerError>;

    /// Shared hyperparameters.
    fn config(&self) -> &OptimizerConfig<F>;

    /// Largest update count seen so far.
    fn num_update(&self) -> usize;

    /// Learning rate at the current update count.
    fn learning_rate(&self) -> F;

    /// Per-index update counts.
    fn update_counter(&self) -> &UpdateCounter;

    /// Replaces the update counts, e.g. when resuming from a checkpoint.
    fn set_update_counter(&mut self, counter: UpdateCounter);
}

impl<F: Float, O: Optimizer<F> + ?Sized> Optimizer<F> for Box<O> {
    fn create_state(
        &self,
        index: usize,
        weight: &NdArrayView<F>,
    ) -> Result<Option<OptimizerState<F>>, OptimizerError> {
        (**self).create_state(index, weight)
    }

    fn update(
        &mut self,
        index: usize,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        state: Option<&mut OptimizerState<F>>,
    ) -> Result<(), OptimizerError> {
        (**self).update(index, weight, grad, state)
    }

    fn config(&self) -> &OptimizerConfig<F> {
        (**self).config()
    }

    fn num_update(&self) -> usize {
        (**self).num_update()
    }

    fn learning_rate(&self) -> F {
        (**self).learning_rate()
    }

    fn update_counter(&self) -> &UpdateCounter {
        (**self).update_counter()
    }

    fn set_update_counter(&mut self, counter: UpdateCounter) {
        (**self).set_update_counter(counter)
    }
}

/// Per-index update counts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateCounter {
    begin_num_update: usize,
    num_update: usize,
    counts: FxHashMap<usize, usize>,
}

impl UpdateCounter {
    pub fn new(begin_num_update: usize) -> Self {
        UpdateCounter {
            begin_num_update,
            num_update: begin_num_update,
            counts: FxHashMap::default(),
        }
    }

    /// Bumps the count of `index` and returns it.
    pub fn increment(&mut self, index: usize) -> usize {
        let begin = self.begin_num_update;
        let count = self.counts.entry(index).or_insert(begin);
        *count += 1;
        let count = *count;
        self.num_update = self.num_update.max(count);
        count
    }

    /// Times `index` has been updated, offset by `begin_num_update`.
    pub fn count(&self, index: usize) -> usize {
        self.counts
            .get(&index)
            .copied()
            .unwrap_or(self.begin_num_update)
    }

    pub fn num_update(&self) -> usize {
        self.num_update
    }
}

/// State every optimizer carries: the config, its learning-rate tracker and update counter.
pub struct OptimizerCore<F: Float> {
    pub(crate) config: OptimizerConfig<F>,
    lr_tracker: Box<dyn LearningRateTracker<F>>,
    counter: UpdateCounter,
    last_lr: Option<F>,
}

impl<F: Float> OptimizerCore<F> {
    pub fn new(config: OptimizerConfig<F>, lr_tracker: Box<dyn LearningRateTracker<F>>) -> Self {
        OptimizerCore {
            counter: UpdateCounter::new(config.begin_num_update),
            config,
            lr_tracker,
            last_lr: None,
        }
    }

    pub fn config(&self) -> &OptimizerConfig<F> {
        &self.config
    }

    pub fn counter(&self) -> &UpdateCounter {
        &self.counter
    }

    pub fn set_counter(&mut self, counter: UpdateCounter) {
        self.counter = counter;
        self.last_lr = None;
    }

    /// Fails fast on configurations no optimizer here implements.
    pub(crate) fn check_supported(&self) -> Result<(), OptimizerError> {
        if self.config.multi_precision {
            return Err(OptimizerError::Unsupported(
                "multi-precision optimizer state".to_string(),
            ));
        }
        Ok(())
    }

    /// Counts an update of `index` and returns the learning rate to use for it.
    pub(crate) fn begin_update(&mut self, index: usize) -> F {
        self.counter.increment(index);
        let num_update = self.counter.num_update();
        let lr = self.lr_tracker.learning_rate(num_update);
        if self.last_lr != Some(lr) {
            info!("update[{}]: learning rate set to {}", num_update, lr);
            self.last_lr = Some(lr);
        }
        lr
    }

    pub fn learning_rate(&self) -> F {
        self.lr_tracker.learning_rate(self.counter.num_update())
    }
}
