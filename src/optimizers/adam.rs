//! Adam optimizer
use crate::backend::{AdamParams, ComputeBackend, CpuBackend};
use crate::lr_scheduler::LearningRateTracker;
use crate::ndarray_ext::{self, NdArrayView, NdArrayViewMut};
use crate::optimizers::{
    Optimizer, OptimizerConfig, OptimizerCore, OptimizerState, UpdateCounter,
};
use crate::smallvec::smallvec;
use crate::{Float, OptimizerError};
use log::trace;

/// Adam optimizer
///
/// This implementation is based on <http://arxiv.org/abs/1412.6980v8>.
/// Every parameter gets two zero-initialized buffers (mean, variance). The bias correction
/// is folded into the learning rate handed to the backend's `adam_update` kernel.
///
/// ```
/// use ndoptim as opt;
/// use opt::optimizers::{adam::Adam, Optimizer, OptimizerConfig};
/// use opt::lr_scheduler::FixedLearningRate;
///
/// let mut adam = Adam::default(OptimizerConfig::default(), FixedLearningRate::new(0.001f32));
///
/// let mut w = opt::ndarray_ext::ones::<f32>(&[2, 2]);
/// let g = opt::ndarray_ext::ones::<f32>(&[2, 2]);
/// let mut state = adam.create_state(0, &w.view()).unwrap();
/// assert_eq!(state.as_ref().map(|s| s.len()), Some(2));
///
/// adam.update(0, w.view_mut(), g.view(), state.as_mut()).unwrap();
/// assert!(w[[0, 0]] < 1.);
/// ```
pub struct Adam<F: Float, B: ComputeBackend<F> = CpuBackend> {
    core: OptimizerCore<F>,
    static_params: StaticParams<F>,
    lazy_update: bool,
    backend: B,
}

/// Holds Adam's static parameters (`b1`, `b2`, `eps`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticParams<F: Float> {
    pub b1: F,
    pub b2: F,
    pub eps: F,
}

impl<F: Float> Default for StaticParams<F> {
    fn default() -> Self {
        StaticParams {
            b1: F::from(0.9).unwrap_or_else(F::zero),
            b2: F::from(0.999).unwrap_or_else(F::zero),
            eps: F::from(1e-08).unwrap_or_else(F::epsilon),
        }
    }
}

impl<F: Float> Adam<F, CpuBackend> {
    /// Instantiates `Adam` with the recommended parameters in the original paper.
    pub fn default(
        config: OptimizerConfig<F>,
        lr_tracker: impl LearningRateTracker<F> + 'static,
    ) -> Self {
        Adam::new(config, lr_tracker, StaticParams::default(), false)
    }

    /// Instantiates `Adam` with given params on the default `CpuBackend`.
    pub fn new(
        config: OptimizerConfig<F>,
        lr_tracker: impl LearningRateTracker<F> + 'static,
        static_params: StaticParams<F>,
        lazy_update: bool,
    ) -> Self {
        Adam::with_backend(
            config,
            lr_tracker,
            static_params,
            lazy_update,
            CpuBackend::default(),
        )
    }
}

impl<F: Float, B: ComputeBackend<F>> Adam<F, B> {
    /// Instantiates `Adam` issuing its kernels to `backend`.
    pub fn with_backend(
        config: OptimizerConfig<F>,
        lr_tracker: impl LearningRateTracker<F> + 'static,
        static_params: StaticParams<F>,
        lazy_update: bool,
        backend: B,
    ) -> Self {
        Adam {
            core: OptimizerCore::new(config, Box::new(lr_tracker)),
            static_params,
            lazy_update,
            backend,
        }
    }

    pub fn static_params(&self) -> &StaticParams<F> {
        &self.static_params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `lr * sqrt(1 - b2^t) / (1 - b1^t)`
    fn bias_corrected(&self, lr: F, t: usize) -> F {
        let StaticParams { b1, b2, .. } = self.static_params;
        let t = t.min(i32::MAX as usize) as i32;
        let one = F::one();
        lr * (one - b2.powi(t)).sqrt() / (one - b1.powi(t))
    }
}

impl<F: Float, B: ComputeBackend<F>> Optimizer<F> for Adam<F, B> {
    fn create_state(
        &self,
        _index: usize,
        weight: &NdArrayView<F>,
    ) -> Result<Option<OptimizerState<F>>, OptimizerError> {
        self.core.check_supported()?;
        Ok(Some(smallvec![
            ndarray_ext::zeros_like(weight),
            ndarray_ext::zeros_like(weight),
        ]))
    }

    fn update(
        &mut self,
        index: usize,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        state: Option<&mut OptimizerState<F>>,
    ) -> Result<(), OptimizerError> {
        self.core.check_supported()?;
        let (mean, var) = match state.map(|s| s.as_mut_slice()) {
            Some([mean, var, ..]) => (mean, var),
            _ => return Err(OptimizerError::MissingState { index }),
        };

        let lr = self.core.begin_update(index);
        let t = self.core.counter().count(index);
        let OptimizerConfig {
            rescale_grad,
            weight_decay: wd,
            clip_gradient,
            ..
        } = self.core.config;
        let params = AdamParams {
            lr: self.bias_corrected(lr, t),
            wd,
            beta1: self.static_params.b1,
            beta2: self.static_params.b2,
            epsilon: self.static_params.eps,
            rescale_grad,
            clip_gradient,
            lazy_update: self.lazy_update,
        };
        trace!("adam_update[{}] t={} on {}", index, t, self.backend.name());
        self.backend
            .adam_update(weight, grad, mean.view_mut(), var.view_mut(), &params)?;
        Ok(())
    }

    fn config(&self) -> &OptimizerConfig<F> {
        self.core.config()
    }

    fn num_update(&self) -> usize {
        self.core.counter().num_update()
    }

    fn learning_rate(&self) -> F {
        self.core.learning_rate()
    }

    fn update_counter(&self) -> &UpdateCounter {
        self.core.counter()
    }

    fn set_update_counter(&mut self, counter: UpdateCounter) {
        self.core.set_counter(counter);
    }
}
