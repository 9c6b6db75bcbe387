use super::{is_zero_row, rescale_and_clip, use_lazy_rows};
use crate::backend::{SgdMomParams, SgdParams};
use crate::ndarray_ext::{NdArrayView, NdArrayViewMut};
use crate::Float;
use ndarray::Zip;

pub(crate) fn sgd_update<F: Float>(
    mut weight: NdArrayViewMut<F>,
    grad: NdArrayView<F>,
    params: &SgdParams<F>,
    par_threshold: usize,
) {
    let SgdParams {
        lr,
        wd,
        rescale_grad,
        clip_gradient,
        lazy_update,
    } = *params;
    let decay = F::one() - lr * wd;
    let step = move |w: &mut F, &g: &F| {
        let g = rescale_and_clip(g, rescale_grad, clip_gradient);
        *w = decay * *w - lr * g;
    };

    if use_lazy_rows(lazy_update, weight.ndim()) {
        for (w_row, g_row) in weight.outer_iter_mut().zip(grad.outer_iter()) {
            if is_zero_row(&g_row) {
                continue;
            }
            Zip::from(w_row).and(&g_row).for_each(step);
        }
    } else if weight.len() >= par_threshold {
        Zip::from(weight).and(&grad).par_for_each(step);
    } else {
        Zip::from(weight).and(&grad).for_each(step);
    }
}

pub(crate) fn sgd_mom_update<F: Float>(
    mut weight: NdArrayViewMut<F>,
    grad: NdArrayView<F>,
    mut mom: NdArrayViewMut<F>,
    params: &SgdMomParams<F>,
    par_threshold: usize,
) {
    let SgdMomParams {
        lr,
        wd,
        momentum,
        rescale_grad,
        clip_gradient,
        lazy_update,
    } = *params;
    let step = move |w: &mut F, &g: &F, m: &mut F| {
        let g = rescale_and_clip(g, rescale_grad, clip_gradient);
        *m = momentum * *m - lr * wd * *w - lr * g;
        *w += *m;
    };

    if use_lazy_rows(lazy_update, weight.ndim()) {
        let rows = weight
            .outer_iter_mut()
            .zip(grad.outer_iter())
            .zip(mom.outer_iter_mut());
        for ((w_row, g_row), m_row) in rows {
            if is_zero_row(&g_row) {
                continue;
            }
            Zip::from(w_row).and(&g_row).and(m_row).for_each(step);
        }
    } else if weight.len() >= par_threshold {
        Zip::from(weight).and(&grad).and(mom).par_for_each(step);
    } else {
        Zip::from(weight).and(&grad).and(mom).for_each(step);
    }
}
