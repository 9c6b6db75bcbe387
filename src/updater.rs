//! Per-parameter state table driving an optimizer.
//!
//! `Updater` is the training-loop side of the [Optimizer](../optimizers/trait.Optimizer.html)
//! contract: it calls `create_state` the first time it sees a parameter index, keeps what it
//! gets back, and threads it through every later `update` for that index.
//!
//! A checkpoint holds the state table together with the optimizer's update counts, so a
//! resumed run continues the learning-rate schedule (and Adam's bias correction) where it
//! stopped.
use crate::ndarray_ext::{self, NdArrayView, NdArrayViewMut};
use crate::optimizers::{Optimizer, OptimizerState, UpdateCounter};
use crate::{Float, FxHashMap, OptimizerError};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

#[derive(Serialize, Deserialize)]
struct StateEntry<F> {
    index: usize,
    state: Option<OptimizerState<F>>,
}

#[derive(Serialize, Deserialize)]
struct Checkpoint<F> {
    counter: UpdateCounter,
    states: Vec<StateEntry<F>>,
}

/// Shapes of the arrays in a state, for comparison and error messages.
fn layout<F>(state: &Option<OptimizerState<F>>) -> Option<Vec<Vec<usize>>> {
    state
        .as_ref()
        .map(|s| s.iter().map(|a| a.shape().to_vec()).collect())
}

/// Owns an optimizer and the auxiliary states of every parameter it updates.
pub struct Updater<F: Float, O: Optimizer<F>> {
    optimizer: O,
    states: FxHashMap<usize, Option<OptimizerState<F>>>,
    _marker: PhantomData<F>,
}

impl<F: Float, O: Optimizer<F>> Updater<F, O> {
    pub fn new(optimizer: O) -> Self {
        Updater {
            optimizer,
            states: FxHashMap::default(),
            _marker: PhantomData,
        }
    }

    /// Updates the parameter at `index`, creating its state on first use.
    pub fn update(
        &mut self,
        index: usize,
        weight: NdArrayViewMut<F>,
        grad: NdArrayView<F>,
    ) -> Result<(), OptimizerError> {
        if !self.states.contains_key(&index) {
            let state = self.optimizer.create_state(index, &weight.view())?;
            debug!(
                "updater: created state for parameter {} ({} arrays)",
                index,
                state.as_ref().map_or(0, |s| s.len())
            );
            self.states.insert(index, state);
        }
        let state = self.states.get_mut(&index).and_then(|s| s.as_mut());
        self.optimizer.update(index, weight, grad, state)
    }

    /// State of the parameter at `index`, if it has one.
    pub fn state(&self, index: usize) -> Option<&OptimizerState<F>> {
        self.states.get(&index).and_then(|s| s.as_ref())
    }

    /// Whether `index` has been seen, regardless of whether it got a state.
    pub fn is_tracked(&self, index: usize) -> bool {
        self.states.contains_key(&index)
    }

    pub fn num_tracked(&self) -> usize {
        self.states.len()
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut O {
        &mut self.optimizer
    }

    pub fn into_optimizer(self) -> O {
        self.optimizer
    }
}

impl<F, O> Updater<F, O>
where
    F: Float + Serialize + DeserializeOwned,
    O: Optimizer<F>,
{
    /// Serializes the update counts and every tracked state as JSON, states ordered by
    /// parameter index.
    pub fn states_to_json(&self) -> Result<String, OptimizerError> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|(&index, state)| StateEntry {
                index,
                state: state.clone(),
            })
            .collect();
        states.sort_by_key(|e| e.index);
        let checkpoint = Checkpoint {
            counter: self.optimizer.update_counter().clone(),
            states,
        };
        serde_json::to_string(&checkpoint).map_err(|e| OptimizerError::State(e.to_string()))
    }

    /// Loads a checkpoint written by `states_to_json`.
    ///
    /// The optimizer's update counts are restored and loaded states replace the states of
    /// the same indices. Every state must have the layout the optimizer would create for it;
    /// otherwise nothing is loaded.
    ///
    /// Returns the number of states loaded.
    pub fn load_states_from_json(&mut self, json: &str) -> Result<usize, OptimizerError> {
        let Checkpoint { counter, states } =
            serde_json::from_str(json).map_err(|e| OptimizerError::State(e.to_string()))?;
        for entry in &states {
            self.check_layout(entry)?;
        }
        let loaded = states.len();
        for StateEntry { index, state } in states {
            self.states.insert(index, state);
        }
        self.optimizer.set_update_counter(counter);
        debug!(
            "updater: loaded {} states at update {}",
            loaded,
            self.optimizer.num_update()
        );
        Ok(loaded)
    }

    /// Compares a checkpointed state with what `create_state` gives for the same index and
    /// weight shape.
    fn check_layout(&self, entry: &StateEntry<F>) -> Result<(), OptimizerError> {
        let shape = entry
            .state
            .as_ref()
            .and_then(|s| s.first())
            .map_or(&[][..], |a| a.shape());
        let weight = ndarray_ext::zeros::<F>(shape);
        let expected = layout(&self.optimizer.create_state(entry.index, &weight.view())?);
        let actual = layout(&entry.state);
        if expected != actual {
            return Err(OptimizerError::State(format!(
                "checkpointed state of parameter {} doesn't fit the optimizer: expected {:?}, got {:?}",
                entry.index, expected, actual
            )));
        }
        Ok(())
    }
}
