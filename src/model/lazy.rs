//! Deferred model values.
//!
//! A [`LazyModelValue`] separates "this value will exist" from "this value
//! exists now". A feature configured early publishes the cell; features
//! configured later read it. The producer runs at most once, on first read,
//! no matter how many threads read concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::thread::{self, ThreadId};

use crate::model::phase::{ConfigurationPhase, PhaseWaiter};
use crate::model::ModelError;

type Producer<T> = Arc<dyn Fn() -> Result<T, ModelError> + Send + Sync>;

/// Which thread evaluates which cell, and which cell each blocked reader
/// waits for. Cells are keyed by address while they are evaluating.
#[derive(Default)]
struct Evaluations {
    owners: HashMap<usize, ThreadId>,
    waiting: HashMap<ThreadId, usize>,
}

impl Evaluations {
    /// Whether `reader` blocking on `cell` would close a wait cycle.
    fn would_cycle(&self, reader: ThreadId, mut cell: usize) -> bool {
        for _ in 0..=self.waiting.len() {
            match self.owners.get(&cell) {
                Some(&owner) if owner == reader => return true,
                Some(owner) => match self.waiting.get(owner) {
                    Some(&next) => cell = next,
                    None => return false,
                },
                None => return false,
            }
        }
        false
    }
}

static EVALUATIONS: LazyLock<Mutex<Evaluations>> =
    LazyLock::new(|| Mutex::new(Evaluations::default()));

fn evaluations() -> MutexGuard<'static, Evaluations> {
    EVALUATIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Slot<T> {
    bound: bool,
    producer: Option<Producer<T>>,
    evaluating: bool,
}

struct Cell<T> {
    description: String,
    value: OnceLock<T>,
    slot: Mutex<Slot<T>>,
    bound_signal: Condvar,
    phase: Option<ConfigurationPhase>,
}

impl<T> Cell<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase_complete(&self) -> bool {
        self.phase.as_ref().map_or(true, ConfigurationPhase::is_complete)
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }
}

impl<T: Send + Sync> PhaseWaiter for Cell<T> {
    fn wake(&self) {
        // Taking the lock orders the wake-up after any reader's phase check.
        let _guard = self.lock();
        self.bound_signal.notify_all();
    }
}

/// Clears a cell's evaluating mark when its producer returns or panics.
struct Evaluation<'a, T> {
    cell: &'a Cell<T>,
}

impl<T> Drop for Evaluation<'_, T> {
    fn drop(&mut self) {
        {
            let mut slot = self.cell.lock();
            slot.evaluating = false;
            evaluations().owners.remove(&self.cell.key());
        }
        self.cell.bound_signal.notify_all();
    }
}

/// A value that some binding will eventually produce.
pub struct LazyModelValue<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for LazyModelValue<T> {
    fn clone(&self) -> Self {
        LazyModelValue {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> LazyModelValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_parts(
        description: String,
        phase: Option<ConfigurationPhase>,
        producer: Option<Producer<T>>,
    ) -> Self {
        LazyModelValue {
            cell: Arc::new(Cell {
                description,
                value: OnceLock::new(),
                slot: Mutex::new(Slot {
                    bound: producer.is_some(),
                    producer,
                    evaluating: false,
                }),
                bound_signal: Condvar::new(),
                phase,
            }),
        }
    }

    /// Create an unbound value that is not tied to any configuration phase.
    pub fn new(description: impl Into<String>) -> Self {
        Self::from_parts(description.into(), None, None)
    }

    /// Create an unbound value owned by a project's configuration phase.
    pub fn in_phase(description: impl Into<String>, phase: &ConfigurationPhase) -> Self {
        let value = Self::from_parts(description.into(), Some(phase.clone()), None);
        let cell: Arc<dyn PhaseWaiter> = value.cell.clone();
        phase.register(Arc::downgrade(&cell) as Weak<dyn PhaseWaiter>);
        value
    }

    /// Create a value that is already resolved.
    pub fn resolved(description: impl Into<String>, value: T) -> Self {
        let lazy = Self::new(description);
        let _ = lazy.cell.value.set(value);
        lazy.cell.lock().bound = true;
        lazy
    }

    /// Create a value bound to a producer from the start.
    pub fn from_producer<F>(description: impl Into<String>, producer: F) -> Self
    where
        F: Fn() -> Result<T, ModelError> + Send + Sync + 'static,
    {
        Self::from_parts(description.into(), None, Some(Arc::new(producer)))
    }

    pub fn description(&self) -> &str {
        &self.cell.description
    }

    /// Attach the producer that computes this value on first read.
    pub fn set<F>(&self, producer: F) -> Result<(), ModelError>
    where
        F: Fn() -> Result<T, ModelError> + Send + Sync + 'static,
    {
        {
            let mut slot = self.cell.lock();
            if slot.bound {
                return Err(ModelError::AlreadyBound {
                    value: self.cell.description.clone(),
                });
            }
            slot.bound = true;
            slot.producer = Some(Arc::new(producer));
        }

        tracing::trace!("bound {}", self.cell.description);
        self.cell.bound_signal.notify_all();
        Ok(())
    }

    /// Bind an already computed value.
    pub fn set_value(&self, value: T) -> Result<(), ModelError> {
        {
            let mut slot = self.cell.lock();
            if slot.bound {
                return Err(ModelError::AlreadyBound {
                    value: self.cell.description.clone(),
                });
            }
            slot.bound = true;
            let _ = self.cell.value.set(value);
        }

        self.cell.bound_signal.notify_all();
        Ok(())
    }

    /// Bind this value to whatever `source` resolves to.
    pub fn set_from(&self, source: &LazyModelValue<T>) -> Result<(), ModelError> {
        let source = source.clone();
        self.set(move || source.get())
    }

    /// Whether a producer or value has been attached.
    pub fn is_bound(&self) -> bool {
        self.cell.value.get().is_some() || self.cell.lock().bound
    }

    /// Whether the value has been computed.
    pub fn is_resolved(&self) -> bool {
        self.cell.value.get().is_some()
    }

    /// Read the value, computing it on first access.
    ///
    /// Fails with [`ModelError::UnresolvedValue`] when nothing has been bound
    /// yet. A failing producer is kept so a later read can retry once its
    /// own inputs are available. The producer runs without the cell locked;
    /// concurrent first readers wait for it, and a read that would wait on
    /// itself fails with [`ModelError::CircularEvaluation`].
    pub fn get(&self) -> Result<T, ModelError> {
        if let Some(value) = self.cell.value.get() {
            return Ok(value.clone());
        }

        let me = thread::current().id();
        let key = self.cell.key();
        let mut slot = self.cell.lock();

        let producer = loop {
            if let Some(value) = self.cell.value.get() {
                return Ok(value.clone());
            }

            if !slot.evaluating {
                let Some(producer) = slot.producer.clone() else {
                    return Err(ModelError::unresolved(
                        self.cell.description.clone(),
                        self.cell.phase_complete(),
                    ));
                };
                slot.evaluating = true;
                evaluations().owners.insert(key, me);
                break producer;
            }

            {
                let mut table = evaluations();
                if table.would_cycle(me, key) {
                    return Err(ModelError::CircularEvaluation {
                        value: self.cell.description.clone(),
                    });
                }
                table.waiting.insert(me, key);
            }

            slot = self
                .cell
                .bound_signal
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
            evaluations().waiting.remove(&me);
        };
        drop(slot);

        let evaluation = Evaluation { cell: &*self.cell };
        let result = producer();

        if let Ok(value) = &result {
            let mut slot = self.cell.lock();
            slot.producer = None;
            let _ = self.cell.value.set(value.clone());
        }
        drop(evaluation);

        result
    }

    /// Read the value, blocking until it is bound or the owning project's
    /// configuration phase completes.
    ///
    /// Values with no configuration phase behave like [`get`](Self::get).
    pub fn wait(&self) -> Result<T, ModelError> {
        {
            let mut slot = self.cell.lock();
            while !slot.bound {
                if self.cell.phase_complete() {
                    return Err(ModelError::unresolved(self.cell.description.clone(), true));
                }
                slot = self
                    .cell
                    .bound_signal
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        self.get()
    }

    /// Derive a value by transforming this one.
    ///
    /// The transform runs once, on the first read of the derived value.
    pub fn map<U, F>(&self, transform: F) -> LazyModelValue<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        LazyModelValue::from_parts(
            format!("{}.map", self.cell.description),
            self.cell.phase.clone(),
            Some(Arc::new(move || source.get().map(&transform))),
        )
    }

    /// Derive a value with a transform that may fail.
    pub fn try_map<U, F>(&self, transform: F) -> LazyModelValue<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Result<U, ModelError> + Send + Sync + 'static,
    {
        let source = self.clone();
        LazyModelValue::from_parts(
            format!("{}.map", self.cell.description),
            self.cell.phase.clone(),
            Some(Arc::new(move || transform(source.get()?))),
        )
    }

    /// Combine two values into a pair.
    pub fn zip<U>(&self, other: &LazyModelValue<U>) -> LazyModelValue<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.clone();
        let right = other.clone();
        LazyModelValue::from_parts(
            format!("({}, {})", self.cell.description, other.cell.description),
            self.cell.phase.clone(),
            Some(Arc::new(move || Ok((left.get()?, right.get()?)))),
        )
    }
}

impl<T> fmt::Debug for LazyModelValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self.cell.lock().bound;
        f.debug_struct("LazyModelValue")
            .field("description", &self.cell.description)
            .field("bound", &bound)
            .field("resolved", &self.cell.value.get().is_some())
            .finish()
    }
}
