use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

use crate::{Metric, MetricKey, MetricMap, ParamMap, Reader, Reporter, Result, Step};

/// The step key used by [`ReporterExt::stepped()`][crate::ReporterExt::stepped].
pub const DEFAULT_STEP_KEY: &str = "step";

/// The key under which a stepped reporter stores the original value.
pub const STEPPED_VALUE_KEY: &str = "value";

type Transform = dyn Fn(Step, Metric) -> Metric;

/// A [`Reporter`] that transforms every value before passing it on.
///
/// Created by [`ReporterExt::map_values()`][crate::ReporterExt::map_values],
/// [`ReporterExt::map_step_values()`][crate::ReporterExt::map_step_values] and the stepped
/// variants. Keys and parameters are passed on unchanged.
pub struct MapValuesReporter<R> {
    base: R,
    transform: Box<Transform>,
}

impl<R> MapValuesReporter<R>
where
    R: Reporter,
{
    /// Wraps `base`, replacing every value with `transform(step, value)`.
    #[must_use]
    pub fn new<F>(base: R, transform: F) -> Self
    where
        F: Fn(Step, Metric) -> Metric + 'static,
    {
        Self {
            base,
            transform: Box::new(transform),
        }
    }

    /// Wraps `base`, replacing every value with `{step_key: step, "value": value}`.
    #[must_use]
    pub fn stepped(base: R, step_key: impl Into<String>) -> Self {
        let step_key = step_key.into();

        Self::new(base, move |step, value| {
            Metric::Map(BTreeMap::from([
                (step_key.clone(), Metric::Int(step)),
                (STEPPED_VALUE_KEY.to_owned(), value),
            ]))
        })
    }
}

impl<R> Reporter for MapValuesReporter<R>
where
    R: Reporter,
{
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        let mapped = metrics
            .into_iter()
            .map(|(key, value)| (key, (self.transform)(step, value)))
            .collect();

        self.base.report_all(step, mapped)
    }

    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        self.base.report(step, key, (self.transform)(step, value))
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

impl<R> Debug for MapValuesReporter<R>
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
