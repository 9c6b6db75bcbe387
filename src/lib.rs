//! Gradient descent optimizers backed by [ndarray](https://github.com/rust-ndarray/ndarray).
//!
//! ## Overview
//! An optimizer in this crate is a thin adapter. It holds hyperparameters, creates the
//! per-parameter auxiliary state its update rule needs, and forwards each update to a
//! [ComputeBackend](backend/trait.ComputeBackend.html) kernel. The crate ships a
//! [CpuBackend](backend/struct.CpuBackend.html); other backends plug in through the trait.
//!
//! ```rust
//! use ndoptim as opt;
//! use opt::optimizers::{sgd::Sgd, Optimizer, OptimizerConfig};
//! use opt::lr_scheduler::FixedLearningRate;
//!
//! let mut sgd = Sgd::new(
//!     OptimizerConfig::default(),
//!     FixedLearningRate::new(0.1f32),
//!     0.9,   // momentum
//!     false, // lazy_update
//! );
//!
//! let mut w = opt::ndarray_ext::ones::<f32>(&[2, 3]);
//! let g = opt::ndarray_ext::ones::<f32>(&[2, 3]);
//!
//! // The state table belongs to the caller.
//! let mut state = sgd.create_state(0, &w.view()).unwrap();
//! sgd.update(0, w.view_mut(), g.view(), state.as_mut()).unwrap();
//! assert!((w[[0, 0]] - 0.9).abs() < 1e-6);
//! ```
//!
//! ### Driving many parameters
//! [Updater](updater/struct.Updater.html) keeps the parameter-state table for you and can
//! checkpoint it as JSON.
//!
//! ```rust
//! use ndoptim as opt;
//! use opt::spec::OptimizerSpec;
//!
//! let spec = OptimizerSpec::from_json(
//!     r#"{"type": "sgd", "learning_rate": {"type": "fixed", "lr": 0.5}, "momentum": 0.0}"#,
//! ).unwrap();
//! let mut updater = opt::updater::Updater::new(spec.build::<f64>().unwrap());
//!
//! let mut w = opt::ndarray_ext::ones::<f64>(&[4]);
//! let g = opt::ndarray_ext::ones::<f64>(&[4]);
//! updater.update(0, w.view_mut(), g.view()).unwrap();
//! assert_eq!(w[[0]], 0.5);
//! ```

#[allow(unused_imports)]
/// re-exported for convenience and version-compatibility
pub extern crate ndarray;
/// re-exported for convenience and version-compatibility
pub extern crate rand;

extern crate log;
extern crate num_traits;
extern crate rand_distr;
extern crate rayon;
extern crate rustc_hash;
pub(crate) extern crate smallvec;

pub mod backend;
pub mod lr_scheduler;
pub mod ndarray_ext;
pub mod ops;
pub mod optimizers;
pub mod spec;
pub mod test_helper;
pub mod updater;

pub(crate) use rustc_hash::FxHashMap;
use std::fmt;

/// Primitive type in this crate, which is actually a decorated `num_traits::Float`.
pub trait Float:
    num_traits::Float
    + num_traits::NumAssignOps
    + Copy
    + Send
    + Sync
    + fmt::Display
    + fmt::Debug
    + Sized
    + 'static
{
}

impl<T> Float for T where
    T: num_traits::Float
        + num_traits::NumAssignOps
        + Copy
        + Send
        + Sync
        + fmt::Display
        + fmt::Debug
        + Sized
        + 'static
{
}

pub use crate::ndarray_ext::{NdArray, NdArrayView, NdArrayViewMut};

pub use crate::backend::{ComputeBackend, CpuBackend, KernelError};

pub use crate::optimizers::{Optimizer, OptimizerConfig, OptimizerState};

/// Error during an optimizer call.
#[derive(Debug, PartialEq)]
pub enum OptimizerError {
    /// Error raised by the compute backend, passed through unchanged.
    Kernel(KernelError),
    /// The configuration asks for something this optimizer can't do.
    Unsupported(String),
    /// An optimizer that needs auxiliary state was called without it.
    MissingState { index: usize },
    /// An optimizer spec failed to parse or validate.
    InvalidConfig(String),
    /// Saving or loading optimizer states failed.
    State(String),
}

impl std::error::Error for OptimizerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptimizerError::Kernel(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptimizerError::Kernel(e) => e.fmt(f),
            OptimizerError::Unsupported(what) => write!(f, "unsupported: {}", what),
            OptimizerError::MissingState { index } => {
                write!(f, "no optimizer state given for parameter {}", index)
            }
            OptimizerError::InvalidConfig(msg) => write!(f, "invalid optimizer config: {}", msg),
            OptimizerError::State(msg) => write!(f, "optimizer state error: {}", msg),
        }
    }
}

impl From<KernelError> for OptimizerError {
    fn from(e: KernelError) -> Self {
        OptimizerError::Kernel(e)
    }
}
