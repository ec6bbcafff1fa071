use std::any::type_name;
use std::fmt::{self, Debug, Formatter};

use tracing::trace;

use crate::{Metric, MetricKey, MetricMap, ParamMap, Reader, Reporter, Result, Step};

/// A [`Reporter`] that can also pull metrics from a closure and report them.
///
/// Created by [`ReporterExt::from_thunk()`][crate::ReporterExt::from_thunk]. All
/// [`Reporter`] calls pass straight through; [`poll()`][Self::poll] is the only addition.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use stepwise::{MemoryReporter, Reader, ReporterExt, metrics};
///
/// let store = MemoryReporter::new();
/// let calls = Rc::new(Cell::new(0));
///
/// let counter = Rc::clone(&calls);
/// let reporter = store.clone().from_thunk(move || {
///     counter.set(counter.get() + 1);
///     metrics! { "calls" => counter.get() }
/// });
///
/// reporter.poll(0).unwrap();
/// reporter.poll(1).unwrap();
///
/// assert_eq!(store.memory_reader().read(&"calls".into()).unwrap().len(), 2);
/// ```
pub struct ThunkReporter<R> {
    base: R,
    thunk: Box<dyn Fn() -> MetricMap>,
}

impl<R> ThunkReporter<R>
where
    R: Reporter,
{
    /// Wraps `base`, reporting whatever `thunk` returns on every [`poll()`][Self::poll].
    #[must_use]
    pub fn new<F>(base: R, thunk: F) -> Self
    where
        F: Fn() -> MetricMap + 'static,
    {
        Self {
            base,
            thunk: Box::new(thunk),
        }
    }

    /// Calls the thunk and reports the metrics it returns at `step`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the wrapped reporter returns.
    pub fn poll(&self, step: Step) -> Result<()> {
        let metrics = (self.thunk)();

        trace!(step, count = metrics.len(), "polled thunk");

        self.base.report_all(step, metrics)
    }
}

impl<R> Reporter for ThunkReporter<R>
where
    R: Reporter,
{
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        self.base.report_all(step, metrics)
    }

    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        self.base.report(step, key, value)
    }

    fn report_params(&self, params: ParamMap) -> Result<()> {
        self.base.report_params(params)
    }

    fn report_param(&self, key: &str, value: Metric) -> Result<()> {
        self.base.report_param(key, value)
    }

    fn reader(&self) -> Option<Box<dyn Reader>> {
        self.base.reader()
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}

impl<R> Debug for ThunkReporter<R>
where
    R: Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::{MockReporter, ReporterExt, metrics};

    #[test]
    fn poll_reports_thunk_output_at_step() {
        let mut mock = MockReporter::new();
        mock.expect_report_all()
            .with(eq(9), eq(metrics! { "mem" => 128 }))
            .times(1)
            .returning(|_, _| Ok(()));

        mock.from_thunk(|| metrics! { "mem" => 128 }).poll(9).unwrap();
    }

    #[test]
    fn regular_reports_pass_through() {
        let mut mock = MockReporter::new();
        mock.expect_report()
            .with(eq(1), eq(MetricKey::from("a")), eq(Metric::Int(1)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));

        let reporter = mock.from_thunk(|| panic!("thunk must not be called"));

        reporter.report(1, "a".into(), Metric::Int(1)).unwrap();
        reporter.close().unwrap();
    }
}
