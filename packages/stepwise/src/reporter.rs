use std::rc::Rc;

use crate::{
    AttachedReporter, Attachment, FilterValuesReporter, MapValuesReporter, Metric, MetricKey,
    MetricMap, MultiReporter, ParamMap, Placement, Reader, Result, Step, ThunkReporter,
    report_each_n,
};

/// Persists step-indexed metrics into some store.
///
/// [`report_all()`][Self::report_all] is the one method an implementation must provide. The
/// single-metric [`report()`][Self::report] is defined in terms of it, though implementations
/// may override it with something more direct. Implementations whose natural primitive is the
/// single-metric form can use [`LambdaReporter`][crate::LambdaReporter], which derives the
/// batch form from it.
///
/// Reporters are combined by wrapping them; see [`ReporterExt`] for the available
/// combinators. Every combinator forwards [`close()`][Self::close] to what it wraps.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Metric, Reader, Reporter, ReporterExt, metrics};
///
/// let store = MemoryReporter::new();
/// let reader = store.memory_reader();
///
/// let train = store.clone().with_prefix("train");
///
/// for step in 0..3 {
///     train.report_all(step, metrics! { "loss" => 1.0 / (step as f64 + 1.0) }).unwrap();
/// }
///
/// assert_eq!(reader.read(&"train.loss".into()).unwrap().len(), 3);
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Reporter {
    /// Persists every metric in the batch at the given step.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is rejected or cannot be persisted. Metrics persisted
    /// before the failure are not rolled back.
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()>;

    /// Persists one metric at the given step.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is rejected or cannot be persisted.
    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        self.report_all(step, MetricMap::from([(key, value)]))
    }

    /// Persists run-level parameters, which are not associated with any step.
    ///
    /// Does nothing unless the implementation stores parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters cannot be persisted.
    fn report_params(&self, _params: ParamMap) -> Result<()> {
        Ok(())
    }

    /// Persists one run-level parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter cannot be persisted.
    fn report_param(&self, key: &str, value: Metric) -> Result<()> {
        self.report_params(ParamMap::from([(key.to_owned(), value)]))
    }

    /// Returns a reader over the data persisted by this reporter, if the store supports reading.
    fn reader(&self) -> Option<Box<dyn Reader>> {
        None
    }

    /// Releases any resources held by the reporter.
    ///
    /// Calling this more than once is up to the backend to tolerate or reject.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource could not be released cleanly.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Combinators available on every sized [`Reporter`].
///
/// Each combinator consumes the reporter and returns a new reporter that wraps it. To keep
/// using the original, wrap a clone (for shared stores such as
/// [`MemoryReporter`][crate::MemoryReporter]) or a reference.
pub trait ReporterExt: Reporter + Sized {
    /// Prefixes every key before passing metrics on.
    ///
    /// The reader of the returned reporter strips the prefix again, so reads use the keys
    /// the metrics were reported with.
    #[must_use]
    fn with_prefix(self, prefix: impl Into<Attachment>) -> AttachedReporter<Self> {
        AttachedReporter::new(self, prefix.into(), Placement::Prefix)
    }

    /// Suffixes every key before passing metrics on.
    #[must_use]
    fn with_suffix(self, suffix: impl Into<Attachment>) -> AttachedReporter<Self> {
        AttachedReporter::new(self, suffix.into(), Placement::Suffix)
    }

    /// Broadcasts every metric to this reporter and then to `other`.
    ///
    /// More reporters can be added with [`MultiReporter::plus()`].
    #[must_use]
    fn plus(self, other: impl Reporter + 'static) -> MultiReporter
    where
        Self: 'static,
    {
        MultiReporter::new(vec![Box::new(self), Box::new(other)])
    }

    /// Passes on only the metrics for which `predicate(step, &value)` returns `true`.
    ///
    /// The rest are dropped unless a sink for them is supplied via
    /// [`FilterValuesReporter::on_false()`].
    #[must_use]
    fn filter_values<P>(self, predicate: P) -> FilterValuesReporter<Self>
    where
        P: Fn(Step, &Metric) -> bool + 'static,
    {
        FilterValuesReporter::new(self, predicate)
    }

    /// Passes on only the metrics reported at steps for which `predicate(step)` returns `true`.
    #[must_use]
    fn filter_step<P>(self, predicate: P) -> FilterValuesReporter<Self>
    where
        P: Fn(Step) -> bool + 'static,
    {
        FilterValuesReporter::new(self, move |step, _: &Metric| predicate(step))
    }

    /// Passes on only the metrics reported at steps that are a multiple of `n`.
    ///
    /// For `n <= 1` every step qualifies and this reporter is returned unchanged.
    #[must_use]
    fn report_each_n(self, n: u64) -> Box<dyn Reporter>
    where
        Self: 'static,
    {
        report_each_n(self, n)
    }

    /// Transforms every value with `f` before passing it on.
    #[must_use]
    fn map_values<F>(self, f: F) -> MapValuesReporter<Self>
    where
        F: Fn(Metric) -> Metric + 'static,
    {
        MapValuesReporter::new(self, move |_, value| f(value))
    }

    /// Transforms every value with `f(step, value)` before passing it on.
    #[must_use]
    fn map_step_values<F>(self, f: F) -> MapValuesReporter<Self>
    where
        F: Fn(Step, Metric) -> Metric + 'static,
    {
        MapValuesReporter::new(self, f)
    }

    /// Replaces every value with `{"step": step, "value": value}` before passing it on.
    ///
    /// Useful for stores that do not record steps themselves, such as
    /// [`MemoryReporter`][crate::MemoryReporter].
    #[must_use]
    fn stepped(self) -> MapValuesReporter<Self> {
        MapValuesReporter::stepped(self, crate::DEFAULT_STEP_KEY)
    }

    /// Replaces every value with `{step_key: step, "value": value}` before passing it on.
    #[must_use]
    fn stepped_with_key(self, step_key: impl Into<String>) -> MapValuesReporter<Self> {
        MapValuesReporter::stepped(self, step_key)
    }

    /// Adds a [`poll()`][ThunkReporter::poll] operation that reports whatever `thunk` returns.
    #[must_use]
    #[allow(
        clippy::wrong_self_convention,
        reason = "the name describes where polled metrics come from, not a conversion"
    )]
    fn from_thunk<F>(self, thunk: F) -> ThunkReporter<Self>
    where
        F: Fn() -> MetricMap + 'static,
    {
        ThunkReporter::new(self, thunk)
    }
}

impl<R> ReporterExt for R where R: Reporter {}

macro_rules! forward_reporter {
    ($($pointer:ty),*) => {
        $(
            impl<R> Reporter for $pointer
            where
                R: Reporter + ?Sized,
            {
                fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
                    (**self).report_all(step, metrics)
                }

                fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
                    (**self).report(step, key, value)
                }

                fn report_params(&self, params: ParamMap) -> Result<()> {
                    (**self).report_params(params)
                }

                fn report_param(&self, key: &str, value: Metric) -> Result<()> {
                    (**self).report_param(key, value)
                }

                fn reader(&self) -> Option<Box<dyn Reader>> {
                    (**self).reader()
                }

                fn close(&self) -> Result<()> {
                    (**self).close()
                }
            }
        )*
    };
}

forward_reporter!(&R, Box<R>, Rc<R>);

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;

    use mockall::predicate::eq;

    use super::*;
    use crate::{MemoryReporter, metrics, params};

    /// Implements only the required method, relying on the defaults for everything else.
    #[derive(Debug, Default)]
    struct BatchOnly {
        batches: RefCell<Vec<(Step, MetricMap)>>,
    }

    impl Reporter for BatchOnly {
        fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
            self.batches.borrow_mut().push((step, metrics));
            Ok(())
        }
    }

    #[test]
    fn report_defaults_to_single_entry_batch() {
        let reporter = BatchOnly::default();

        reporter.report(4, "a".into(), Metric::Int(1)).unwrap();

        assert_eq!(*reporter.batches.borrow(), vec![(4, metrics! { "a" => 1 })]);
    }

    #[test]
    fn defaults_have_no_reader_and_close_cleanly() {
        let reporter = BatchOnly::default();

        assert!(reporter.reader().is_none());
        reporter.close().unwrap();
    }

    #[test]
    fn params_are_ignored_by_default() {
        let reporter = BatchOnly::default();

        reporter.report_param("seed", Metric::Int(1)).unwrap();

        assert!(reporter.batches.borrow().is_empty());
    }

    /// Forwards the batch methods to a mock so the defaults of the singular methods run.
    #[derive(Debug)]
    struct BatchForwarder(MockReporter);

    impl Reporter for BatchForwarder {
        fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
            self.0.report_all(step, metrics)
        }

        fn report_params(&self, params: ParamMap) -> Result<()> {
            self.0.report_params(params)
        }
    }

    #[test]
    fn report_param_defaults_to_single_entry_params() {
        let mut mock = MockReporter::new();
        mock.expect_report_params()
            .with(eq(params! { "seed" => 1 }))
            .times(1)
            .returning(|_| Ok(()));

        BatchForwarder(mock)
            .report_param("seed", Metric::Int(1))
            .unwrap();
    }

    #[test]
    fn smart_pointers_forward_every_method() {
        let mut mock = MockReporter::new();
        mock.expect_report()
            .with(eq(3), eq(MetricKey::from("k")), eq(Metric::Int(9)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));

        let shared = Rc::new(mock);
        let boxed: Box<dyn Reporter> = Box::new(Rc::clone(&shared));

        boxed.report(3, "k".into(), Metric::Int(9)).unwrap();
        boxed.close().unwrap();
    }

    #[test]
    fn references_are_reporters() {
        let store = MemoryReporter::new();

        (&store)
            .with_prefix("p")
            .report(0, "k".into(), Metric::Int(1))
            .unwrap();

        assert_eq!(
            store.memory_reader().read(&"p.k".into()).unwrap(),
            vec![Metric::Int(1)]
        );
    }
}
