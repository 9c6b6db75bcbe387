extern crate ndarray;
extern crate ndoptim as opt;
use ndarray::array;
use opt::lr_scheduler::{FactorTracker, FixedLearningRate};
use opt::optimizers::adam::Adam;
use opt::optimizers::sgd::Sgd;
use opt::test_helper::{assert_all_close, Kernel, RecordingBackend};
use opt::updater::Updater;
use opt::{NdArray, Optimizer, OptimizerConfig, OptimizerError};

fn momentum_sgd() -> Sgd<f64> {
    Sgd::new(OptimizerConfig::default(), FixedLearningRate::new(0.1), 0.9, false)
}

#[test]
fn state_is_created_once_and_reused() {
    let sgd = Sgd::with_backend(
        OptimizerConfig::default(),
        FixedLearningRate::new(0.1f64),
        0.9,
        false,
        RecordingBackend::default(),
    );
    let mut updater = Updater::new(sgd);
    let mut w = opt::ndarray_ext::ones::<f64>(&[2]);
    let g = opt::ndarray_ext::ones::<f64>(&[2]);

    assert!(!updater.is_tracked(0));
    updater.update(0, w.view_mut(), g.view()).unwrap();
    updater.update(0, w.view_mut(), g.view()).unwrap();

    assert_eq!(updater.num_tracked(), 1);
    assert_eq!(
        updater.optimizer().backend().calls(),
        vec![Kernel::SgdMom, Kernel::SgdMom]
    );
    // the buffer carried over from the first step
    assert_all_close(&updater.state(0).unwrap()[0], &array![-0.19, -0.19].into_dyn(), 1e-12);
    assert_all_close(&w, &array![0.71, 0.71].into_dyn(), 1e-12);
}

#[test]
fn stateless_parameters_are_still_tracked() {
    let sgd = Sgd::new(OptimizerConfig::default(), FixedLearningRate::new(0.5f32), 0., false);
    let mut updater = Updater::new(sgd);
    let mut w = opt::ndarray_ext::ones::<f32>(&[3]);
    let g = opt::ndarray_ext::ones::<f32>(&[3]);

    updater.update(4, w.view_mut(), g.view()).unwrap();
    assert!(updater.is_tracked(4));
    assert!(updater.state(4).is_none());
    assert_eq!(w, array![0.5f32, 0.5, 0.5].into_dyn());
}

#[test]
fn parameters_keep_separate_states() {
    let mut updater = Updater::new(momentum_sgd());
    let mut a = opt::ndarray_ext::ones::<f64>(&[2]);
    let mut b = opt::ndarray_ext::ones::<f64>(&[3]);
    let ga = opt::ndarray_ext::ones::<f64>(&[2]);
    let gb = opt::ndarray_ext::zeros::<f64>(&[3]);

    updater.update(0, a.view_mut(), ga.view()).unwrap();
    updater.update(1, b.view_mut(), gb.view()).unwrap();

    assert_eq!(updater.state(0).unwrap()[0].shape(), &[2]);
    assert_eq!(updater.state(1).unwrap()[0].shape(), &[3]);
    assert!(updater.state(1).unwrap()[0].iter().all(|&x| x == 0.));
    assert_eq!(b, opt::ndarray_ext::ones::<f64>(&[3]));
}

#[test]
fn checkpointed_states_resume_training() {
    let g: NdArray<f64> = array![[0.5, -1.], [2., 0.25]].into_dyn();
    let mut w = opt::ndarray_ext::ones::<f64>(&[2, 2]);

    let mut first = Updater::new(momentum_sgd());
    for _ in 0..2 {
        first.update(0, w.view_mut(), g.view()).unwrap();
    }
    let json = first.states_to_json().unwrap();

    let mut resumed = Updater::new(momentum_sgd());
    assert_eq!(resumed.load_states_from_json(&json).unwrap(), 1);
    let mut w_resumed = w.clone();

    first.update(0, w.view_mut(), g.view()).unwrap();
    resumed.update(0, w_resumed.view_mut(), g.view()).unwrap();
    assert_eq!(w, w_resumed);
}

#[test]
fn adam_states_round_trip() {
    let mut updater = Updater::new(Adam::default(
        OptimizerConfig::default(),
        FixedLearningRate::new(0.01f32),
    ));
    let mut w = opt::ndarray_ext::ones::<f32>(&[3]);
    let g: NdArray<f32> = array![0.1f32, -0.2, 0.3].into_dyn();
    updater.update(2, w.view_mut(), g.view()).unwrap();

    let json = updater.states_to_json().unwrap();
    let mut other = Updater::new(Adam::default(
        OptimizerConfig::default(),
        FixedLearningRate::new(0.01f32),
    ));
    other.load_states_from_json(&json).unwrap();
    assert_eq!(other.state(2), updater.state(2));
}

#[test]
fn malformed_checkpoint_is_a_state_error() {
    let mut updater = Updater::new(momentum_sgd());
    match updater.load_states_from_json("{not json") {
        Err(OptimizerError::State(_)) => {}
        other => panic!("expected a state error, got {:?}", other),
    }
    assert_eq!(updater.num_tracked(), 0);
}

#[test]
fn boxed_optimizers_drive_an_updater() {
    let boxed: Box<dyn Optimizer<f64>> = Box::new(momentum_sgd());
    let mut updater = Updater::new(boxed);
    let mut w = opt::ndarray_ext::ones::<f64>(&[1]);
    let g = opt::ndarray_ext::ones::<f64>(&[1]);
    updater.update(0, w.view_mut(), g.view()).unwrap();
    assert_eq!(updater.optimizer().num_update(), 1);
}

fn fresh_adam() -> Adam<f32> {
    Adam::default(OptimizerConfig::default(), FixedLearningRate::new(0.01f32))
}

fn decaying_sgd() -> Sgd<f64> {
    Sgd::new(OptimizerConfig::default(), FactorTracker::new(1.0, 2, 0.5), 0.9, false)
}

#[test]
fn adam_resume_keeps_bias_correction_step() {
    let g: NdArray<f32> = array![0.1f32, -0.2, 0.3].into_dyn();
    let mut w = opt::ndarray_ext::ones::<f32>(&[3]);

    let mut first = Updater::new(fresh_adam());
    for _ in 0..5 {
        first.update(0, w.view_mut(), g.view()).unwrap();
    }
    let json = first.states_to_json().unwrap();

    let mut resumed = Updater::new(fresh_adam());
    resumed.load_states_from_json(&json).unwrap();
    assert_eq!(resumed.optimizer().num_update(), 5);
    assert_eq!(resumed.optimizer().update_counter().count(0), 5);

    let mut w_resumed = w.clone();
    first.update(0, w.view_mut(), g.view()).unwrap();
    resumed.update(0, w_resumed.view_mut(), g.view()).unwrap();
    assert_eq!(w, w_resumed);
    assert_eq!(resumed.optimizer().num_update(), 6);
}

#[test]
fn resume_continues_the_schedule() {
    let g: NdArray<f64> = array![0.5, -1.].into_dyn();
    let mut w = opt::ndarray_ext::ones::<f64>(&[2]);

    let mut first = Updater::new(decaying_sgd());
    for _ in 0..4 {
        first.update(0, w.view_mut(), g.view()).unwrap();
    }
    assert_eq!(first.optimizer().learning_rate(), 0.5);

    let mut resumed = Updater::new(decaying_sgd());
    resumed
        .load_states_from_json(&first.states_to_json().unwrap())
        .unwrap();
    assert_eq!(resumed.optimizer().learning_rate(), 0.5);

    let mut w_resumed = w.clone();
    for _ in 0..3 {
        first.update(0, w.view_mut(), g.view()).unwrap();
        resumed.update(0, w_resumed.view_mut(), g.view()).unwrap();
    }
    assert_eq!(w, w_resumed);
    assert_eq!(resumed.optimizer().learning_rate(), 0.125);
}

#[test]
fn momentum_checkpoint_is_refused_without_momentum() {
    let mut source = Updater::new(momentum_sgd());
    let mut w = opt::ndarray_ext::ones::<f64>(&[2]);
    let g = opt::ndarray_ext::ones::<f64>(&[2]);
    source.update(0, w.view_mut(), g.view()).unwrap();
    let json = source.states_to_json().unwrap();

    let plain = Sgd::with_backend(
        OptimizerConfig::default(),
        FixedLearningRate::new(0.1f64),
        0.,
        false,
        RecordingBackend::default(),
    );
    let mut target = Updater::new(plain);
    assert!(matches!(
        target.load_states_from_json(&json),
        Err(OptimizerError::State(_))
    ));
    assert_eq!(target.num_tracked(), 0);
    assert_eq!(target.optimizer().num_update(), 0);

    target.update(0, w.view_mut(), g.view()).unwrap();
    assert_eq!(target.optimizer().backend().calls(), vec![Kernel::Sgd]);
}

#[test]
fn stateless_checkpoint_is_refused_with_momentum() {
    let plain = Sgd::new(OptimizerConfig::default(), FixedLearningRate::new(0.1f64), 0., false);
    let mut source = Updater::new(plain);
    let mut w = opt::ndarray_ext::ones::<f64>(&[2]);
    let g = opt::ndarray_ext::ones::<f64>(&[2]);
    source.update(0, w.view_mut(), g.view()).unwrap();
    let json = source.states_to_json().unwrap();

    let mut target = Updater::new(momentum_sgd());
    assert!(matches!(
        target.load_states_from_json(&json),
        Err(OptimizerError::State(_))
    ));
    assert!(!target.is_tracked(0));
}

#[test]
fn checkpoint_with_missing_buffers_is_refused() {
    let counter = r#"{"begin_num_update": 0, "num_update": 1, "counts": {"0": 1}}"#;
    let empty = format!(r#"{{"counter": {}, "states": [{{"index": 0, "state": []}}]}}"#, counter);
    let mut sgd_updater = Updater::new(momentum_sgd());
    assert!(matches!(
        sgd_updater.load_states_from_json(&empty),
        Err(OptimizerError::State(_))
    ));

    // Adam needs both mean and variance
    let mut adam = Updater::new(fresh_adam());
    let mut w = opt::ndarray_ext::ones::<f32>(&[2]);
    let g = opt::ndarray_ext::ones::<f32>(&[2]);
    adam.update(0, w.view_mut(), g.view()).unwrap();
    let mut sgd_source = Updater::new(Sgd::new(
        OptimizerConfig::default(),
        FixedLearningRate::new(0.1f32),
        0.9,
        false,
    ));
    sgd_source.update(0, w.view_mut(), g.view()).unwrap();
    let one_buffer = sgd_source.states_to_json().unwrap();
    assert!(matches!(
        adam.load_states_from_json(&one_buffer),
        Err(OptimizerError::State(_))
    ));
    assert_eq!(adam.state(0).map(|s| s.len()), Some(2));
    assert_eq!(adam.optimizer().num_update(), 1);
}
