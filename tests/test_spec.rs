extern crate ndoptim as opt;
use opt::lr_scheduler::WarmupMode;
use opt::spec::{CommonSpec, LrSchedulerSpec, OptimizerSpec, WarmupSpec};
use opt::{Optimizer, OptimizerError};

fn expect_invalid(json: &str) {
    let result = OptimizerSpec::from_json(json).and_then(|spec| spec.build::<f64>().map(|_| ()));
    match result {
        Err(OptimizerError::InvalidConfig(_)) => {}
        other => panic!("expected InvalidConfig for {}, got {:?}", json, other.err()),
    }
}

#[test]
fn sgd_spec_fills_defaults() {
    let spec = OptimizerSpec::from_json(
        r#"{"type": "sgd", "learning_rate": {"type": "fixed", "lr": 0.1}}"#,
    )
    .unwrap();
    assert_eq!(
        spec,
        OptimizerSpec::Sgd {
            learning_rate: LrSchedulerSpec::Fixed { lr: 0.1 },
            momentum: 0.,
            lazy_update: false,
            common: CommonSpec::default(),
        }
    );

    let sgd = spec.build::<f32>().unwrap();
    assert_eq!(sgd.config().rescale_grad, 1.);
    assert_eq!(sgd.config().clip_gradient, -1.);
    assert_eq!(sgd.learning_rate(), 0.1);
    let w = opt::ndarray_ext::ones::<f32>(&[2]);
    assert!(sgd.create_state(0, &w.view()).unwrap().is_none());
}

#[test]
fn adam_spec_builds_two_buffer_state() {
    let spec = OptimizerSpec::from_json(
        r#"{
            "type": "adam",
            "learning_rate": {"type": "multi_factor", "base_lr": 0.001, "steps": [10, 20], "factor": 0.5},
            "weight_decay": 0.01,
            "begin_num_update": 5
        }"#,
    )
    .unwrap();
    let adam = spec.build::<f64>().unwrap();
    assert_eq!(adam.config().weight_decay, 0.01);
    assert_eq!(adam.num_update(), 5);
    let w = opt::ndarray_ext::ones::<f64>(&[2, 2]);
    assert_eq!(adam.create_state(0, &w.view()).unwrap().unwrap().len(), 2);
}

#[test]
fn warmup_is_parsed() {
    let spec = OptimizerSpec::from_json(
        r#"{
            "type": "sgd",
            "momentum": 0.9,
            "learning_rate": {
                "type": "factor", "base_lr": 1.0, "step": 10, "factor": 0.5,
                "warmup": {"steps": 4, "mode": "constant", "begin_lr": 0.1}
            }
        }"#,
    )
    .unwrap();
    match &spec {
        OptimizerSpec::Sgd {
            learning_rate: LrSchedulerSpec::Factor { warmup, .. },
            ..
        } => assert_eq!(
            warmup,
            &Some(WarmupSpec {
                steps: 4,
                begin_lr: 0.1,
                mode: WarmupMode::Constant,
            })
        ),
        other => panic!("unexpected spec {:?}", other),
    }
    assert_eq!(spec.build::<f64>().unwrap().learning_rate(), 0.1);
}

#[test]
fn spec_survives_json() {
    let spec = OptimizerSpec::Adam {
        learning_rate: LrSchedulerSpec::Factor {
            base_lr: 0.01,
            step: 100,
            factor: 0.9,
            stop_factor_lr: 1e-6,
            warmup: None,
        },
        beta1: 0.8,
        beta2: 0.99,
        epsilon: 1e-7,
        lazy_update: true,
        common: CommonSpec {
            clip_gradient: 5.,
            ..CommonSpec::default()
        },
    };
    let json = spec.to_json().unwrap();
    assert_eq!(OptimizerSpec::from_json(&json).unwrap(), spec);
}

#[test]
fn invalid_specs_are_rejected() {
    expect_invalid(r#"{"type": "rmsprop", "learning_rate": {"type": "fixed", "lr": 0.1}}"#);
    expect_invalid(r#"{"type": "sgd"}"#);
    expect_invalid(
        r#"{"type": "sgd", "learning_rate": {"type": "factor", "base_lr": 0.1, "step": 0, "factor": 0.5}}"#,
    );
    expect_invalid(
        r#"{"type": "sgd", "learning_rate": {"type": "factor", "base_lr": 0.1, "step": 5, "factor": 1.5}}"#,
    );
    expect_invalid(
        r#"{"type": "sgd", "learning_rate": {"type": "multi_factor", "base_lr": 0.1, "steps": [5, 5], "factor": 0.5}}"#,
    );
    expect_invalid(
        r#"{"type": "sgd", "learning_rate": {"type": "multi_factor", "base_lr": 0.1, "steps": [], "factor": 0.5}}"#,
    );
    expect_invalid(
        r#"{"type": "adam", "learning_rate": {"type": "factor", "base_lr": 0.1, "step": 5, "factor": 0.5,
            "warmup": {"steps": 3, "begin_lr": 0.5}}}"#,
    );
}

#[test]
fn multi_precision_spec_builds_but_refuses_state() {
    let spec = OptimizerSpec::from_json(
        r#"{"type": "sgd", "momentum": 0.9, "multi_precision": true,
            "learning_rate": {"type": "fixed", "lr": 0.1}}"#,
    )
    .unwrap();
    let sgd = spec.build::<f32>().unwrap();
    let w = opt::ndarray_ext::ones::<f32>(&[2]);
    assert!(matches!(
        sgd.create_state(0, &w.view()),
        Err(OptimizerError::Unsupported(_))
    ));
}
