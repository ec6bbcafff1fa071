use std::any::type_name;
use std::fmt::{self, Debug, Formatter};

use tracing::trace;

use crate::{Metric, MetricKey, MetricMap, ParamMap, Reader, Reporter, ReporterExt, Result, Step};

type Predicate = dyn Fn(Step, &Metric) -> bool;

/// A [`Reporter`] that passes on only the metrics accepted by a predicate.
///
/// Each batch is split in two: entries for which `predicate(step, &value)` is `true` go to the
/// wrapped reporter and the rest go to the [`on_false()`][Self::on_false] sink, if one was
/// supplied, or are dropped. A side that receives no entries is not called at all.
///
/// Parameters and [`reader()`][Reporter::reader] go to the wrapped reporter only.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Metric, Reader, Reporter, ReporterExt, metrics};
///
/// let finite = MemoryReporter::new();
/// let rejected = MemoryReporter::new();
///
/// let reporter = finite
///     .clone()
///     .filter_values(|_, value| value.as_f64().is_some_and(f64::is_finite))
///     .on_false(rejected.clone());
///
/// reporter
///     .report_all(0, metrics! { "loss" => 0.5, "grad" => f64::NAN })
///     .unwrap();
///
/// assert_eq!(finite.memory_reader().read(&"loss".into()).unwrap().len(), 1);
/// assert_eq!(rejected.memory_reader().read(&"grad".into()).unwrap().len(), 1);
/// ```
pub struct FilterValuesReporter<R> {
    base: R,
    predicate: Box<Predicate>,
    on_false: Option<Box<dyn Reporter>>,
}

impl<R> FilterValuesReporter<R>
where
    R: Reporter,
{
    /// Wraps `base`, passing on only the entries accepted by `predicate`.
    #[must_use]
    pub fn new<P>(base: R, predicate: P) -> Self
    where
        P: Fn(Step, &Metric) -> bool + 'static,
    {
        Self {
            base,
            predicate: Box::new(predicate),
            on_false: None,
        }
    }

    /// Sends the entries rejected by the predicate to `sink` instead of dropping them.
    ///
    /// The sink is closed after the wrapped reporter.
    #[must_use]
    pub fn on_false(mut self, sink: impl Reporter + 'static) -> Self {
        self.on_false = Some(Box::new(sink));
        self
    }

    fn accepts(&self, step: Step, value: &Metric) -> bool {
        (self.predicate)(step, value)
    }
}

impl<R> Reporter for FilterValuesReporter<R>
where
    R: Reporter,
{
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        let (accepted, rejected): (MetricMap, MetricMap) = metrics
            .into_iter()
            .partition(|(_, value)| self.accepts(step, value));

        trace!(
            step,
            accepted = accepted.len(),
            rejected = rejected.len(),
            "filtered metrics"
        );

        if !accepted.is_empty() {
            self.base.report_all(step, accepted)?;
        }

        if let Some(sink) = &self.on_false {
            if !rejected.is_empty() {
                sink.report_all(step, rejected)?;
            }
        }

        Ok(())
    }

    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        if self.accepts(step, &value) {
            return self.base.report(step, key, value);
        }

        self.on_false
            .as_ref()
            .map_or(Ok(()), |sink| sink.report(step, key, value))
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

    /// Closes the wrapped reporter and then the `on_false` sink.
    ///
    /// Both are closed even if the first one fails. The first failure is returned.
    fn close(&self) -> Result<()> {
        let base = self.base.close();
        let sink = self.on_false.as_ref().map_or(Ok(()), |sink| sink.close());

        base.and(sink)
    }
}

impl<R> Debug for FilterValuesReporter<R>
where
    R: Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("base", &self.base)
            .field("on_false", &self.on_false.is_some())
            .finish_non_exhaustive()
    }
}

/// Passes on only the metrics reported at steps that are a multiple of `n`.
///
/// Negative steps are handled the same way: `-6` is a multiple of `3`. For `n <= 1` every step
/// qualifies, so `base` is returned as is, only boxed.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Metric, Reader, Reporter, report_each_n};
///
/// let store = MemoryReporter::new();
/// let sparse = report_each_n(store.clone(), 10);
///
/// for step in 0..100 {
///     sparse.report(step, "loss".into(), Metric::from(step)).unwrap();
/// }
///
/// assert_eq!(store.memory_reader().read(&"loss".into()).unwrap().len(), 10);
/// ```
#[must_use]
pub fn report_each_n<R>(base: R, n: u64) -> Box<dyn Reporter>
where
    R: Reporter + 'static,
{
    if n <= 1 {
        return Box::new(base);
    }

    // Steps are i64, so no step other than 0 is a multiple of anything larger.
    let n = i64::try_from(n).unwrap_or(i64::MAX);

    Box::new(base.filter_step(move |step| step.rem_euclid(n) == 0))
}
