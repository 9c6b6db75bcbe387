//! Compute backends.
//!
//! Optimizers never touch parameter memory themselves; every update is a single call to one
//! of the kernel entry points of a [ComputeBackend]. The backend is injected when the
//! optimizer is constructed, so the same adapter logic runs against [CpuBackend] or any
//! other implementation (a device backend, a recording backend in tests, ...).
//!
//! # Kernel contract
//!
//! With `g' = clip(rescale_grad * grad, clip_gradient)` (no clipping if `clip_gradient < 0`):
//!
//! - `sgd_update`: `w = (1 - lr * wd) * w - lr * g'`
//! - `sgd_mom_update`: `mom = momentum * mom - lr * wd * w - lr * g'`, then `w = w + mom`
//! - `adam_update`: `g'' = clip(rescale_grad * grad + wd * w, clip_gradient)`,
//!   `mean = b1 * mean + (1 - b1) * g''`,
//!   `var = b2 * var + (1 - b2) * g''^2`, then `w = w - lr * mean / (sqrt(var) + eps)`
//!
//! With `lazy_update` set, rows (slices along axis 0) whose gradient is all zero are left
//! untouched: no weight decay, no state decay.
use crate::ndarray_ext::{NdArrayView, NdArrayViewMut};
use crate::ops::gradient_descent_ops::{adam, sgd};
use crate::Float;
use std::fmt;

/// Error raised by a kernel.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelError {
    /// Operand shapes don't agree.
    IncompatibleShape(String),
    /// The backend can't run this kernel for the given inputs.
    Unsupported(String),
}

impl std::error::Error for KernelError {}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::IncompatibleShape(s) => write!(f, "{}: incompatible shape error", s),
            KernelError::Unsupported(s) => write!(f, "{}: unsupported by backend", s),
        }
    }
}

/// Hyperparameters of a plain SGD step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SgdParams<F: Float> {
    pub lr: F,
    pub wd: F,
    pub rescale_grad: F,
    pub clip_gradient: F,
    pub lazy_update: bool,
}

/// Hyperparameters of an SGD step with momentum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SgdMomParams<F: Float> {
    pub lr: F,
    pub wd: F,
    pub momentum: F,
    pub rescale_grad: F,
    pub clip_gradient: F,
    pub lazy_update: bool,
}

/// Hyperparameters of an Adam step. `lr` is already bias-corrected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdamParams<F: Float> {
    pub lr: F,
    pub wd: F,
    pub beta1: F,
    pub beta2: F,
    pub epsilon: F,
    pub rescale_grad: F,
    pub clip_gradient: F,
    pub lazy_update: bool,
}

/// Kernel provider for optimizer updates.
///
/// Every entry point mutates `weight` (and state buffers) in place and must leave them
/// untouched when it returns an error.
pub trait ComputeBackend<F: Float> {
    /// Backend name, used in log records.
    fn name(&self) -> &'static str;

    fn sgd_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        params: &SgdParams<F>,
    ) -> Result<(), KernelError>;

    fn sgd_mom_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mom: NdArrayViewMut<F>,
        params: &SgdMomParams<F>,
    ) -> Result<(), KernelError>;

    fn adam_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mean: NdArrayViewMut<F>,
        var: NdArrayViewMut<F>,
        params: &AdamParams<F>,
    ) -> Result<(), KernelError>;
}

impl<'a, F: Float, B: ComputeBackend<F> + ?Sized> ComputeBackend<F> for &'a B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn sgd_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        params: &SgdParams<F>,
    ) -> Result<(), KernelError> {
        (**self).sgd_update(weight, grad, params)
    }

    fn sgd_mom_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mom: NdArrayViewMut<F>,
        params: &SgdMomParams<F>,
    ) -> Result<(), KernelError> {
        (**self).sgd_mom_update(weight, grad, mom, params)
    }

    fn adam_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mean: NdArrayViewMut<F>,
        var: NdArrayViewMut<F>,
        params: &AdamParams<F>,
    ) -> Result<(), KernelError> {
        (**self).adam_update(weight, grad, mean, var, params)
    }
}

/// Pure Rust backend running the kernels in `ops::gradient_descent_ops`.
///
/// Arrays with at least `par_threshold` elements are updated in parallel with rayon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuBackend {
    pub par_threshold: usize,
}

/// Default element count above which `CpuBackend` goes parallel.
pub const DEFAULT_PAR_THRESHOLD: usize = 1 << 16;

impl Default for CpuBackend {
    fn default() -> Self {
        CpuBackend {
            par_threshold: DEFAULT_PAR_THRESHOLD,
        }
    }
}

impl CpuBackend {
    /// Backend that never goes parallel.
    pub fn sequential() -> Self {
        CpuBackend {
            par_threshold: usize::MAX,
        }
    }
}

fn check_shape(op: &str, expected: &[usize], actual: &[usize]) -> Result<(), KernelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(KernelError::IncompatibleShape(format!(
            "{}: expected shape {:?}, got {:?}",
            op, expected, actual
        )))
    }
}

impl<F: Float> ComputeBackend<F> for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn sgd_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        params: &SgdParams<F>,
    ) -> Result<(), KernelError> {
        check_shape("sgd_update(grad)", weight.shape(), grad.shape())?;
        sgd::sgd_update(weight, grad, params, self.par_threshold);
        Ok(())
    }

    fn sgd_mom_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mom: NdArrayViewMut<F>,
        params: &SgdMomParams<F>,
    ) -> Result<(), KernelError> {
        check_shape("sgd_mom_update(grad)", weight.shape(), grad.shape())?;
        check_shape("sgd_mom_update(mom)", weight.shape(), mom.shape())?;
        sgd::sgd_mom_update(weight, grad, mom, params, self.par_threshold);
        Ok(())
    }

    fn adam_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mean: NdArrayViewMut<F>,
        var: NdArrayViewMut<F>,
        params: &AdamParams<F>,
    ) -> Result<(), KernelError> {
        check_shape("adam_update(grad)", weight.shape(), grad.shape())?;
        check_shape("adam_update(mean)", weight.shape(), mean.shape())?;
        check_shape("adam_update(var)", weight.shape(), var.shape())?;
        adam::adam_update(weight, grad, mean, var, params, self.par_threshold);
        Ok(())
    }
}
