//! Concurrent, lazy, at-most-once per-generation construction.
//!
//! `GenerationIndex<V>` answers "give me the `V` for generation `g`,
//! constructing it if this is the first request", while guaranteeing
//! the constructor runs exactly once even when many writer threads
//! race for the same generation. The map-level race (does a cell exist
//! for `g`) is resolved by a `parking_lot::RwLock`; the
//! construction-level race (has the cell's value been computed yet) is
//! resolved by `once_cell::sync::OnceCell`, so a thread that loses the
//! map race still blocks on, and observes, the winning cell.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::Generation;

type Cell<V> = Arc<OnceCell<Arc<V>>>;
type Factory<V> = Box<dyn Fn() -> V + Send + Sync>;

/// A concurrent mapping from [`Generation`] to a lazily materialized,
/// at-most-once-constructed value of type `V`.
pub struct GenerationIndex<V> {
    cells: RwLock<HashMap<Generation, Cell<V>>>,
    factory: Factory<V>,
}

impl<V> GenerationIndex<V> {
    /// Creates an index whose generations are built on demand by
    /// `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            cells: RwLock::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Returns the value for `g`, invoking the factory if this is the
    /// first call for `g`. Concurrent callers for the same `g` all
    /// observe the single constructed instance.
    pub fn get_or_create(&self, g: Generation) -> Arc<V> {
        let cell = {
            if let Some(cell) = self.cells.read().get(&g) {
                cell.clone()
            } else {
                let mut cells = self.cells.write();
                cells.entry(g).or_insert_with(|| Arc::new(OnceCell::new())).clone()
            }
        };

        let value = cell.get_or_init(|| {
            debug!(generation = g, "materialized cache for generation");
            Arc::new((self.factory)())
        });
        value.clone()
    }

    /// Returns every materialized value, in unspecified order.
    pub fn iter(&self) -> Vec<Arc<V>> {
        self.cells.read().values().filter_map(|cell| cell.get().cloned()).collect()
    }

    /// Removes every generation for which `predicate` returns `true`.
    /// Returns the number of generations removed.
    pub fn retire<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(Generation) -> bool,
    {
        let mut cells = self.cells.write();
        let before = cells.len();
        cells.retain(|g, _| !predicate(*g));
        before - cells.len()
    }
}

impl<V> fmt::Debug for GenerationIndex<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationIndex")
            .field("generations", &self.cells.read().len())
            .finish()
    }
}
