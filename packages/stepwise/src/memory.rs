use std::cell::RefCell;
use std::rc::Rc;

use foldhash::{HashMap, HashMapExt};
use tracing::trace;

use crate::{
    KeyedReader, Metric, MetricKey, MetricMap, ParamMap, ReadMap, Reader, Reporter, Result, Step,
};

#[derive(Debug, Default)]
struct MemoryStore {
    values: HashMap<MetricKey, Vec<Metric>>,
    params: ParamMap,
}

/// A [`Reporter`] that keeps everything in memory.
///
/// Values are appended per key in the order they are reported. Steps are not stored; combine
/// with [`ReporterExt::stepped()`][crate::ReporterExt::stepped] to keep them alongside the
/// values.
///
/// Clones of a `MemoryReporter` share one store, as do all readers obtained from it. Readers
/// are live views and observe values reported after they were created.
///
/// # Example
///
/// ```
/// use stepwise::{Metric, MemoryReporter, Reader, Reporter, ReporterExt, metrics};
///
/// let store = MemoryReporter::new();
/// let stepped = store.clone().stepped();
///
/// stepped.report(7, "loss".into(), Metric::from(0.5)).unwrap();
///
/// let loss = store.memory_reader().read(&"loss".into()).unwrap();
/// assert_eq!(
///     loss[0].as_map().unwrap()["step"],
///     Metric::Int(7)
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryReporter {
    store: Rc<RefCell<MemoryStore>>,
}

impl MemoryReporter {
    /// Creates a reporter with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Rc::new(RefCell::new(MemoryStore {
                values: HashMap::new(),
                params: ParamMap::new(),
            })),
        }
    }

    /// Returns a reader over the same store.
    #[must_use]
    pub fn memory_reader(&self) -> MemoryReader {
        MemoryReader {
            store: Rc::clone(&self.store),
        }
    }

    /// Removes every stored value. Parameters are kept.
    pub fn clear(&self) {
        self.store.borrow_mut().values.clear();
    }

    /// Returns a copy of the stored parameters.
    #[must_use]
    pub fn params(&self) -> ParamMap {
        self.store.borrow().params.clone()
    }
}

impl Reporter for MemoryReporter {
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        trace!(step, count = metrics.len(), "storing metrics in memory");

        let mut store = self.store.borrow_mut();

        for (key, value) in metrics {
            store.values.entry(key).or_default().push(value);
        }

        Ok(())
    }

    fn report(&self, _step: Step, key: MetricKey, value: Metric) -> Result<()> {
        self.store
            .borrow_mut()
            .values
            .entry(key)
            .or_default()
            .push(value);

        Ok(())
    }

    fn report_params(&self, params: ParamMap) -> Result<()> {
        self.store.borrow_mut().params.extend(params);
        Ok(())
    }

    fn reader(&self) -> Option<Box<dyn Reader>> {
        Some(Box::new(self.memory_reader()))
    }
}

/// Reads the values stored by a [`MemoryReporter`].
#[derive(Clone, Debug)]
pub struct MemoryReader {
    store: Rc<RefCell<MemoryStore>>,
}

impl Reader for MemoryReader {
    fn read_all(&self, keys: &[MetricKey]) -> Result<ReadMap> {
        let store = self.store.borrow();

        Ok(keys
            .iter()
            .map(|key| {
                (
                    key.clone(),
                    store.values.get(key).cloned().unwrap_or_default(),
                )
            })
            .collect())
    }

    fn read(&self, key: &MetricKey) -> Result<Vec<Metric>> {
        Ok(self
            .store
            .borrow()
            .values
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}

impl KeyedReader for MemoryReader {
    /// Returns the stored keys in sorted order.
    fn keys(&self) -> Result<Vec<MetricKey>> {
        let mut keys: Vec<_> = self.store.borrow().values.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{metrics, params};

    assert_not_impl_any!(MemoryReporter: Send, Sync);
    assert_not_impl_any!(MemoryReader: Send, Sync);

    #[test]
    fn values_append_in_report_order() {
        let reporter = MemoryReporter::new();

        reporter.report_all(0, metrics! { "a" => 1, "b" => 2 }).unwrap();
        reporter.report(1, "a".into(), Metric::Int(3)).unwrap();

        let values = reporter
            .memory_reader()
            .read_all(&["a".into(), "b".into(), "c".into()])
            .unwrap();

        assert_eq!(values["a"], vec![Metric::Int(1), Metric::Int(3)]);
        assert_eq!(values["b"], vec![Metric::Int(2)]);
        assert!(values["c"].is_empty());
    }

    #[test]
    fn readers_are_live_views() {
        let reporter = MemoryReporter::new();
        let reader = reporter.reader().unwrap();

        reporter.report(0, "a".into(), Metric::Int(1)).unwrap();

        assert_eq!(reader.read(&"a".into()).unwrap(), vec![Metric::Int(1)]);
    }

    #[test]
    fn clones_share_the_store() {
        let reporter = MemoryReporter::new();
        let clone = reporter.clone();

        clone.report(0, "a".into(), Metric::Int(1)).unwrap();

        assert_eq!(reporter.memory_reader().keys().unwrap(), vec![MetricKey::from("a")]);
    }

    #[test]
    fn integer_and_string_keys_are_the_same_key() {
        let reporter = MemoryReporter::new();

        reporter.report(0, MetricKey::from(5), Metric::Int(1)).unwrap();
        reporter.report(1, "5".into(), Metric::Int(2)).unwrap();

        assert_eq!(
            reporter.memory_reader().read(&"5".into()).unwrap(),
            vec![Metric::Int(1), Metric::Int(2)]
        );
    }

    #[test]
    fn keys_are_sorted() {
        let reporter = MemoryReporter::new();
        reporter
            .report_all(0, metrics! { "zeta" => 1, "alpha" => 2, "mu" => 3 })
            .unwrap();

        assert_eq!(
            reporter.memory_reader().keys().unwrap(),
            vec![
                MetricKey::from("alpha"),
                MetricKey::from("mu"),
                MetricKey::from("zeta")
            ]
        );
    }

    #[test]
    fn clear_keeps_params() {
        let reporter = MemoryReporter::new();
        reporter.report(0, "a".into(), Metric::Int(1)).unwrap();
        reporter.report_params(params! { "seed" => 1 }).unwrap();

        reporter.clear();

        assert!(reporter.memory_reader().keys().unwrap().is_empty());
        assert_eq!(reporter.params(), params! { "seed" => 1 });
    }

    #[test]
    fn later_params_overwrite_earlier() {
        let reporter = MemoryReporter::new();

        reporter.report_param("lr", Metric::from(0.1)).unwrap();
        reporter.report_param("lr", Metric::from(0.2)).unwrap();

        assert_eq!(reporter.params(), params! { "lr" => 0.2 });
    }
}
