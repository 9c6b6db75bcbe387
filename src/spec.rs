//! Serializable optimizer descriptions.
//!
//! ```
//! use ndoptim::spec::OptimizerSpec;
//! use ndoptim::Optimizer;
//!
//! let spec = OptimizerSpec::from_json(r#"{
//!     "type": "sgd",
//!     "learning_rate": {"type": "factor", "base_lr": 0.1, "step": 100, "factor": 0.9},
//!     "momentum": 0.9,
//!     "weight_decay": 0.0001
//! }"#).unwrap();
//!
//! let sgd = spec.build::<f32>().unwrap();
//! assert_eq!(sgd.learning_rate(), 0.1);
//! ```
use crate::lr_scheduler::{
    FactorTracker, FixedLearningRate, LearningRateTracker, MultiFactorTracker, Warmup, WarmupMode,
};
use crate::optimizers::adam::{Adam, StaticParams};
use crate::optimizers::sgd::Sgd;
use crate::optimizers::{Optimizer, OptimizerConfig};
use crate::{Float, OptimizerError};
use serde::{Deserialize, Serialize};

fn default_rescale_grad() -> f64 {
    1.
}

fn default_clip_gradient() -> f64 {
    -1.
}

fn default_stop_factor_lr() -> f64 {
    1e-8
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

/// Warmup phase of a schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarmupSpec {
    pub steps: usize,
    #[serde(default)]
    pub begin_lr: f64,
    #[serde(default = "default_warmup_mode")]
    pub mode: WarmupMode,
}

fn default_warmup_mode() -> WarmupMode {
    WarmupMode::Linear
}

/// Learning-rate schedule description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LrSchedulerSpec {
    Fixed {
        lr: f64,
    },
    Factor {
        base_lr: f64,
        step: usize,
        factor: f64,
        #[serde(default = "default_stop_factor_lr")]
        stop_factor_lr: f64,
        #[serde(default)]
        warmup: Option<WarmupSpec>,
    },
    MultiFactor {
        base_lr: f64,
        steps: Vec<usize>,
        factor: f64,
        #[serde(default)]
        warmup: Option<WarmupSpec>,
    },
}

/// Optimizer description, buildable on any float type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd {
        learning_rate: LrSchedulerSpec,
        #[serde(default)]
        momentum: f64,
        #[serde(default)]
        lazy_update: bool,
        #[serde(flatten)]
        common: CommonSpec,
    },
    Adam {
        learning_rate: LrSchedulerSpec,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default)]
        lazy_update: bool,
        #[serde(flatten)]
        common: CommonSpec,
    },
}

/// Fields shared by every optimizer spec.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommonSpec {
    #[serde(default = "default_rescale_grad")]
    pub rescale_grad: f64,
    #[serde(default)]
    pub weight_decay: f64,
    #[serde(default = "default_clip_gradient")]
    pub clip_gradient: f64,
    #[serde(default)]
    pub begin_num_update: usize,
    #[serde(default)]
    pub multi_precision: bool,
}

impl Default for CommonSpec {
    fn default() -> Self {
        CommonSpec {
            rescale_grad: default_rescale_grad(),
            weight_decay: 0.,
            clip_gradient: default_clip_gradient(),
            begin_num_update: 0,
            multi_precision: false,
        }
    }
}

fn invalid(msg: impl Into<String>) -> OptimizerError {
    OptimizerError::InvalidConfig(msg.into())
}

fn cast<F: Float>(name: &str, x: f64) -> Result<F, OptimizerError> {
    if !x.is_finite() {
        return Err(invalid(format!("{} must be finite, got {}", name, x)));
    }
    F::from(x).ok_or_else(|| invalid(format!("{} = {} doesn't fit the float type", name, x)))
}

impl WarmupSpec {
    fn build<F: Float>(&self) -> Result<Warmup<F>, OptimizerError> {
        Ok(Warmup {
            steps: self.steps,
            begin_lr: cast("warmup.begin_lr", self.begin_lr)?,
            mode: self.mode,
        })
    }
}

fn build_warmup<F: Float>(
    warmup: &Option<WarmupSpec>,
    base_lr: f64,
) -> Result<Warmup<F>, OptimizerError> {
    match warmup {
        None => Ok(Warmup::none()),
        Some(w) if w.begin_lr > base_lr => Err(invalid(format!(
            "warmup.begin_lr ({}) exceeds base_lr ({})",
            w.begin_lr, base_lr
        ))),
        Some(w) => w.build(),
    }
}

fn check_factor(factor: f64) -> Result<(), OptimizerError> {
    if factor > 1. || factor <= 0. {
        return Err(invalid(format!(
            "factor must be in (0, 1] to decay the learning rate, got {}",
            factor
        )));
    }
    Ok(())
}

impl LrSchedulerSpec {
    /// Validates the schedule and builds the tracker.
    pub fn build<F: Float>(&self) -> Result<Box<dyn LearningRateTracker<F>>, OptimizerError> {
        match self {
            LrSchedulerSpec::Fixed { lr } => {
                Ok(Box::new(FixedLearningRate::new(cast("lr", *lr)?)))
            }
            LrSchedulerSpec::Factor {
                base_lr,
                step,
                factor,
                stop_factor_lr,
                warmup,
            } => {
                if *step < 1 {
                    return Err(invalid("schedule step must be at least 1"));
                }
                check_factor(*factor)?;
                let tracker = FactorTracker::new(
                    cast("base_lr", *base_lr)?,
                    *step,
                    cast("factor", *factor)?,
                )
                .with_stop_factor_lr(cast("stop_factor_lr", *stop_factor_lr)?)
                .with_warmup(build_warmup(warmup, *base_lr)?);
                Ok(Box::new(tracker))
            }
            LrSchedulerSpec::MultiFactor {
                base_lr,
                steps,
                factor,
                warmup,
            } => {
                if steps.is_empty() {
                    return Err(invalid("multi-factor schedule needs at least one step"));
                }
                if steps[0] < 1 {
                    return Err(invalid("schedule step must be at least 1"));
                }
                if steps.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(invalid(format!(
                        "schedule steps must be strictly increasing, got {:?}",
                        steps
                    )));
                }
                check_factor(*factor)?;
                let tracker = MultiFactorTracker::new(
                    cast("base_lr", *base_lr)?,
                    steps.clone(),
                    cast("factor", *factor)?,
                )
                .with_warmup(build_warmup(warmup, *base_lr)?);
                Ok(Box::new(tracker))
            }
        }
    }
}

impl CommonSpec {
    fn build<F: Float>(&self) -> Result<OptimizerConfig<F>, OptimizerError> {
        Ok(OptimizerConfig {
            rescale_grad: cast("rescale_grad", self.rescale_grad)?,
            weight_decay: cast("weight_decay", self.weight_decay)?,
            clip_gradient: cast("clip_gradient", self.clip_gradient)?,
            begin_num_update: self.begin_num_update,
            multi_precision: self.multi_precision,
        })
    }
}

impl OptimizerSpec {
    /// Parses a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self, OptimizerError> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, OptimizerError> {
        serde_json::to_string(self).map_err(|e| invalid(e.to_string()))
    }

    /// Validates the spec and builds the optimizer on the default `CpuBackend`.
    pub fn build<F: Float>(&self) -> Result<Box<dyn Optimizer<F>>, OptimizerError> {
        match self {
            OptimizerSpec::Sgd {
                learning_rate,
                momentum,
                lazy_update,
                common,
            } => {
                let tracker = learning_rate.build::<F>()?;
                Ok(Box::new(Sgd::new(
                    common.build()?,
                    tracker,
                    cast("momentum", *momentum)?,
                    *lazy_update,
                )))
            }
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                lazy_update,
                common,
            } => {
                let tracker = learning_rate.build::<F>()?;
                let static_params = StaticParams {
                    b1: cast("beta1", *beta1)?,
                    b2: cast("beta2", *beta2)?,
                    eps: cast("epsilon", *epsilon)?,
                };
                Ok(Box::new(Adam::new(
                    common.build()?,
                    tracker,
                    static_params,
                    *lazy_update,
                )))
            }
        }
    }
}
