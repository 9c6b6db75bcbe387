//! Element-wise update kernels for gradient descent optimizers.
//!
//! Callers check operand shapes before getting here.
use crate::ndarray_ext::NdArrayView;
use crate::Float;

pub mod adam;
pub mod sgd;

/// Clips `g` to `[-clip_gradient, clip_gradient]`; a negative `clip_gradient` disables clipping.
#[inline]
pub(crate) fn clip<F: Float>(g: F, clip_gradient: F) -> F {
    if clip_gradient >= F::zero() {
        g.max(-clip_gradient).min(clip_gradient)
    } else {
        g
    }
}

/// `clip(rescale_grad * g, clip_gradient)`
#[inline]
pub(crate) fn rescale_and_clip<F: Float>(g: F, rescale_grad: F, clip_gradient: F) -> F {
    clip(g * rescale_grad, clip_gradient)
}

/// Whether a gradient row carries no update for lazy mode.
#[inline]
pub(crate) fn is_zero_row<F: Float>(row: &NdArrayView<F>) -> bool {
    row.iter().all(|&x| x == F::zero())
}

/// Lazy mode needs at least one axis to split into rows.
#[inline]
pub(crate) fn use_lazy_rows(lazy_update: bool, ndim: usize) -> bool {
    lazy_update && ndim > 0
}
