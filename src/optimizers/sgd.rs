//! Stochastic gradient descent optimizer
use crate::backend::{ComputeBackend, CpuBackend, SgdMomParams, SgdParams};
use crate::lr_scheduler::LearningRateTracker;
use crate::ndarray_ext::{self, NdArrayView, NdArrayViewMut};
use crate::optimizers::{
    Optimizer, OptimizerConfig, OptimizerCore, OptimizerState, UpdateCounter,
};
use crate::smallvec::smallvec;
use crate::{Float, OptimizerError};
use log::{debug, trace};

/// SGD optimizer with optional momentum and lazy update.
///
/// With a non-zero `momentum`, every parameter gets one zero-initialized momentum buffer
/// from `create_state`, and `update` runs the backend's `sgd_mom_update` kernel.
/// Otherwise there is no state and `update` runs `sgd_update`. A state holding no buffer is
/// rejected with `OptimizerError::MissingState`.
///
/// ```
/// use ndoptim as opt;
/// use opt::optimizers::{sgd::Sgd, Optimizer, OptimizerConfig};
/// use opt::lr_scheduler::FixedLearningRate;
///
/// let config = OptimizerConfig {
///     weight_decay: 0.01,
///     ..OptimizerConfig::default()
/// };
/// let mut sgd = Sgd::new(config, FixedLearningRate::new(0.1f64), 0., false);
///
/// let mut w = opt::ndarray_ext::ones::<f64>(&[3]);
/// let g = opt::ndarray_ext::zeros::<f64>(&[3]);
///
/// assert!(sgd.create_state(0, &w.view()).unwrap().is_none());
/// sgd.update(0, w.view_mut(), g.view(), None).unwrap();
/// assert_eq!(w[[0]], 1. - 0.1 * 0.01);
/// ```
pub struct Sgd<F: Float, B: ComputeBackend<F> = CpuBackend> {
    core: OptimizerCore<F>,
    momentum: F,
    lazy_update: bool,
    backend: B,
}

impl<F: Float> Sgd<F, CpuBackend> {
    /// Instantiates `Sgd` running on the default `CpuBackend`.
    pub fn new(
        config: OptimizerConfig<F>,
        lr_tracker: impl LearningRateTracker<F> + 'static,
        momentum: F,
        lazy_update: bool,
    ) -> Self {
        Sgd::with_backend(config, lr_tracker, momentum, lazy_update, CpuBackend::default())
    }
}

impl<F: Float, B: ComputeBackend<F>> Sgd<F, B> {
    /// Instantiates `Sgd` issuing its kernels to `backend`.
    pub fn with_backend(
        config: OptimizerConfig<F>,
        lr_tracker: impl LearningRateTracker<F> + 'static,
        momentum: F,
        lazy_update: bool,
        backend: B,
    ) -> Self {
        Sgd {
            core: OptimizerCore::new(config, Box::new(lr_tracker)),
            momentum,
            lazy_update,
            backend,
        }
    }

    pub fn momentum(&self) -> F {
        self.momentum
    }

    pub fn lazy_update(&self) -> bool {
        self.lazy_update
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<F: Float, B: ComputeBackend<F>> Optimizer<F> for Sgd<F, B> {
    fn create_state(
        &self,
        index: usize,
        weight: &NdArrayView<F>,
    ) -> Result<Option<OptimizerState<F>>, OptimizerError> {
        self.core.check_supported()?;
        if self.momentum == F::zero() {
            return Ok(None);
        }
        debug!(
            "sgd: momentum buffer for parameter {} with shape {:?}",
            index,
            weight.shape()
        );
        Ok(Some(smallvec![ndarray_ext::zeros_like(weight)]))
    }

    fn update(
        &mut self,
        index: usize,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        state: Option<&mut OptimizerState<F>>,
    ) -> Result<(), OptimizerError> {
        self.core.check_supported()?;
        let mom = match state {
            Some(s) => Some(
                s.first_mut()
                    .ok_or(OptimizerError::MissingState { index })?,
            ),
            None => None,
        };
        let lr = self.core.begin_update(index);
        let OptimizerConfig {
            rescale_grad,
            weight_decay: wd,
            clip_gradient,
            ..
        } = self.core.config;

        match mom {
            Some(mom) => {
                trace!("sgd_mom_update[{}] on {}", index, self.backend.name());
                let params = SgdMomParams {
                    lr,
                    wd,
                    momentum: self.momentum,
                    rescale_grad,
                    clip_gradient,
                    lazy_update: self.lazy_update,
                };
                self.backend
                    .sgd_mom_update(weight, grad, mom.view_mut(), &params)?;
            }
            None => {
                trace!("sgd_update[{}] on {}", index, self.backend.name());
                let params = SgdParams {
                    lr,
                    wd,
                    rescale_grad,
                    clip_gradient,
                    lazy_update: self.lazy_update,
                };
                self.backend.sgd_update(weight, grad, &params)?;
            }
        }
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
