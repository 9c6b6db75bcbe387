//! Provides helper functions for testing.
use crate::backend::{AdamParams, ComputeBackend, CpuBackend, KernelError, SgdMomParams, SgdParams};
use crate::ndarray_ext::{NdArray, NdArrayView, NdArrayViewMut};
use crate::Float;
use std::cell::{Cell, RefCell};

/// Which kernel entry point a call went to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kernel {
    Sgd,
    SgdMom,
    Adam,
}

/// Backend that forwards to `inner` and records every kernel call.
pub struct RecordingBackend<B = CpuBackend> {
    inner: B,
    calls: RefCell<Vec<Kernel>>,
    lrs: RefCell<Vec<f64>>,
    fail_next: Cell<bool>,
}

impl Default for RecordingBackend<CpuBackend> {
    fn default() -> Self {
        RecordingBackend::new(CpuBackend::sequential())
    }
}

impl<B> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        RecordingBackend {
            inner,
            calls: RefCell::new(Vec::new()),
            lrs: RefCell::new(Vec::new()),
            fail_next: Cell::new(false),
        }
    }

    /// Kernels called so far, in order.
    pub fn calls(&self) -> Vec<Kernel> {
        self.calls.borrow().clone()
    }

    /// Number of calls that went to `kernel`.
    pub fn count(&self, kernel: Kernel) -> usize {
        self.calls.borrow().iter().filter(|&&k| k == kernel).count()
    }

    /// Learning rates the kernels received, in call order.
    pub fn learning_rates(&self) -> Vec<f64> {
        self.lrs.borrow().clone()
    }

    /// Makes the next kernel call fail without touching its operands.
    pub fn fail_next_call(&self) {
        self.fail_next.set(true);
    }

    fn record<F: Float>(&self, kernel: Kernel, lr: F) -> Result<(), KernelError> {
        self.calls.borrow_mut().push(kernel);
        self.lrs.borrow_mut().push(lr.to_f64().unwrap_or(std::f64::NAN));
        if self.fail_next.replace(false) {
            return Err(KernelError::Unsupported(format!("{:?} (injected)", kernel)));
        }
        Ok(())
    }
}

impl<F: Float, B: ComputeBackend<F>> ComputeBackend<F> for RecordingBackend<B> {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn sgd_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        params: &SgdParams<F>,
    ) -> Result<(), KernelError> {
        self.record(Kernel::Sgd, params.lr)?;
        self.inner.sgd_update(weight, grad, params)
    }

    fn sgd_mom_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mom: NdArrayViewMut<F>,
        params: &SgdMomParams<F>,
    ) -> Result<(), KernelError> {
        self.record(Kernel::SgdMom, params.lr)?;
        self.inner.sgd_mom_update(weight, grad, mom, params)
    }

    fn adam_update(
        &self,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
        mean: NdArrayViewMut<F>,
        var: NdArrayViewMut<F>,
        params: &AdamParams<F>,
    ) -> Result<(), KernelError> {
        self.record(Kernel::Adam, params.lr)?;
        self.inner.adam_update(weight, grad, mean, var, params)
    }
}

/// Panics unless `actual` and `expected` have the same shape and all elements are within `tol`.
pub fn assert_all_close<F: Float>(actual: &NdArray<F>, expected: &NdArray<F>, tol: F) {
    assert_eq!(
        actual.shape(),
        expected.shape(),
        "shape mismatch: {:?} vs {:?}",
        actual.shape(),
        expected.shape()
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (*a - *e).abs();
        if !(diff <= tol) {
            panic!(
                "arrays differ at flat index {}: actual={}, expected={}, tol={}",
                i, a, e, tol
            );
        }
    }
}
