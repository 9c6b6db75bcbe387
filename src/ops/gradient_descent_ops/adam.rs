use super::{clip, is_zero_row, use_lazy_rows};
use crate::backend::AdamParams;
use crate::ndarray_ext::{NdArrayView, NdArrayViewMut};
use crate::Float;
use ndarray::Zip;

pub(crate) fn adam_update<F: Float>(
    mut weight: NdArrayViewMut<F>,
    grad: NdArrayView<F>,
    mut mean: NdArrayViewMut<F>,
    mut var: NdArrayViewMut<F>,
    params: &AdamParams<F>,
    par_threshold: usize,
) {
    let AdamParams {
        lr,
        wd,
        beta1: b1,
        beta2: b2,
        epsilon: eps,
        rescale_grad,
        clip_gradient,
        lazy_update,
    } = *params;
    let one = F::one();
    let step = move |w: &mut F, &g: &F, m: &mut F, v: &mut F| {
        // weight decay joins the gradient before clipping
        let g = clip(rescale_grad * g + wd * *w, clip_gradient);
        *m = b1 * *m + (one - b1) * g;
        *v = b2 * *v + (one - b2) * g * g;
        *w -= lr * *m / (v.sqrt() + eps);
    };

    if use_lazy_rows(lazy_update, weight.ndim()) {
        let rows = weight
            .outer_iter_mut()
            .zip(grad.outer_iter())
            .zip(mean.outer_iter_mut())
            .zip(var.outer_iter_mut());
        for (((w_row, g_row), m_row), v_row) in rows {
            if is_zero_row(&g_row) {
                continue;
            }
            Zip::from(w_row)
                .and(&g_row)
                .and(m_row)
                .and(v_row)
                .for_each(step);
        }
    } else if weight.len() >= par_threshold {
        Zip::from(weight)
            .and(&grad)
            .and(mean)
            .and(var)
            .par_for_each(step);
    } else {
        Zip::from(weight).and(&grad).and(mean).and(var).for_each(step);
    }
}
