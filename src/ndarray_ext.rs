//! A small extension of [ndarray](https://github.com/rust-ndarray/ndarray)
//!
//! Mainly provides `array_gen`, which is a collection of array generator functions.
use crate::Float;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use std::cell::RefCell;

/// alias for `ndarray::Array<T, IxDyn>`
pub type NdArray<T> = ArrayD<T>;

/// alias for `ndarray::ArrayView<T, IxDyn>`
pub type NdArrayView<'a, T> = ArrayViewD<'a, T>;

/// alias for `ndarray::ArrayViewMut<T, IxDyn>`
pub type NdArrayViewMut<'a, T> = ArrayViewMutD<'a, T>;

/// Creates a zero array in the specified shape.
#[inline]
pub fn zeros<T: Float>(shape: &[usize]) -> NdArray<T> {
    NdArray::<T>::zeros(shape)
}

/// Creates a one array in the specified shape.
#[inline]
pub fn ones<T: Float>(shape: &[usize]) -> NdArray<T> {
    NdArray::<T>::ones(shape)
}

/// Creates a zero array with the same shape as `like`.
#[inline]
pub fn zeros_like<T: Float>(like: &NdArrayView<T>) -> NdArray<T> {
    NdArray::<T>::zeros(like.raw_dim())
}

/// Creates a 0-dimensional array holding `val`.
#[inline]
pub fn from_scalar<T: Float>(val: T) -> NdArray<T> {
    NdArray::<T>::from_elem(IxDyn(&[]), val)
}

/// Builds an array of the given shape from a flat vector in standard layout.
///
/// Returns `None` if `data.len()` doesn't match the product of `shape`.
#[inline]
pub fn from_shape_vec<T: Float>(shape: &[usize], data: Vec<T>) -> Option<NdArray<T>> {
    NdArray::<T>::from_shape_vec(IxDyn(shape), data).ok()
}

/// Random number generator for ndarray
pub struct ArrayRng<T: Float, R: Rng = StdRng> {
    rng: RefCell<R>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Float> Default for ArrayRng<T> {
    fn default() -> Self {
        ArrayRng::new(StdRng::seed_from_u64(42))
    }
}

impl<T: Float, R: Rng> ArrayRng<T, R> {
    /// Creates `ArrayRng` with pre-instantiated `Rng`.
    pub fn new(rng: R) -> Self {
        ArrayRng {
            rng: RefCell::new(rng),
            _marker: std::marker::PhantomData,
        }
    }

    fn gen_random_array<D>(&self, shape: &[usize], dist: D) -> NdArray<T>
    where
        D: Distribution<f64>,
    {
        let size: usize = shape.iter().product();
        let mut rng = self.rng.borrow_mut();
        let data = (0..size)
            .map(|_| T::from(dist.sample(&mut *rng)).unwrap_or_else(T::zero))
            .collect::<Vec<_>>();
        // `data` holds exactly `size` elements
        NdArray::from_shape_vec(IxDyn(shape), data).unwrap_or_else(|_| zeros(shape))
    }

    /// Creates an ndarray sampled from the normal distribution with given params.
    ///
    /// Gives zeros if `stddev` is negative or either param is not finite.
    pub fn normal(&self, shape: &[usize], mean: f64, stddev: f64) -> NdArray<T> {
        if !(stddev >= 0. && stddev.is_finite() && mean.is_finite()) {
            return zeros(shape);
        }
        match Normal::new(mean, stddev) {
            Ok(normal) => self.gen_random_array(shape, normal),
            Err(_) => zeros(shape),
        }
    }

    /// Creates an ndarray sampled from the uniform distribution with given params.
    ///
    /// Like `normal`, gives zeros for an empty or non-finite range.
    pub fn uniform(&self, shape: &[usize], min: f64, max: f64) -> NdArray<T> {
        if min < max && (max - min).is_finite() {
            self.gen_random_array(shape, Uniform::new(min, max))
        } else {
            zeros(shape)
        }
    }

    /// Creates an ndarray sampled from the standard normal distribution.
    pub fn standard_normal(&self, shape: &[usize]) -> NdArray<T> {
        self.normal(shape, 0., 1.)
    }

    /// Creates an ndarray sampled from the standard uniform distribution.
    pub fn standard_uniform(&self, shape: &[usize]) -> NdArray<T> {
        self.uniform(shape, 0., 1.)
    }

    /// Creates an ndarray where roughly `(1 - density)` of the rows are all zero.
    ///
    /// Useful to mimic row-sparse gradients such as embedding gradients.
    pub fn row_sparse(&self, shape: &[usize], density: f64) -> NdArray<T> {
        let mut ret = self.standard_normal(shape);
        if ret.ndim() == 0 {
            return ret;
        }
        let mut rng = self.rng.borrow_mut();
        for mut row in ret.outer_iter_mut() {
            if rng.gen::<f64>() >= density {
                row.fill(T::zero());
            }
        }
        ret
    }
}

/// Array generator functions.
pub mod array_gen {
    pub use super::{from_scalar, from_shape_vec, ones, zeros, zeros_like, ArrayRng};
}
