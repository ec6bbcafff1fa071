use std::any::type_name;
use std::fmt::{self, Debug, Formatter};

use crate::{Measurement, Reporter, Result, Schedule, StateMap, Step};

/// Runs a [`Schedule`] of measurements and reports what they measure.
///
/// Each call to [`evaluate()`][Self::evaluate] runs the measurements due at the step and reports
/// all results as one batch. Steps at which nothing is due report nothing.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// use stepwise::{
///     KeyedReader, MeasurementManager, Measurement, MemoryReporter, Metric, ReporterExt,
/// };
///
/// let store = MemoryReporter::new();
/// let fixed = BTreeMap::<String, f64>::new();
/// let mut manager = MeasurementManager::new(fixed, store.clone().stepped());
///
/// manager
///     .add(Measurement::every("weight_norm", 25, |state| {
///         Ok(Metric::from(*state.require("norm")?))
///     }))
///     .unwrap();
///
/// for step in 0..100 {
///     let current = BTreeMap::from([("norm".to_string(), step as f64)]);
///     manager.evaluate(step, &current, None).unwrap();
/// }
///
/// let reader = store.memory_reader();
/// assert_eq!(reader.keys().unwrap(), ["weight_norm"]);
/// ```
pub struct MeasurementManager<V, R> {
    schedule: Schedule<V>,
    reporter: R,
}

impl<V, R> MeasurementManager<V, R>
where
    R: Reporter,
{
    /// Creates a manager without measurements that reports to `reporter`.
    #[must_use]
    pub fn new(fixed_state: StateMap<V>, reporter: R) -> Self {
        Self {
            schedule: Schedule::new(fixed_state),
            reporter,
        }
    }

    /// Adds a measurement. A measurement with the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`][crate::Error::InvalidInterval] if the measurement is
    /// due every `n` steps with `n <= 0`.
    pub fn add(&mut self, measurement: Measurement<V>) -> Result<()> {
        self.schedule.add(measurement)
    }

    /// Returns the names of the measurements due at `step`, in name order.
    #[must_use]
    pub fn due(&self, step: Step) -> Vec<String> {
        self.schedule.due(step)
    }

    /// Runs measurements at `step` and reports the results at `step`.
    ///
    /// Which measurements run is decided as in [`Schedule::evaluate()`]. If none run, nothing
    /// is reported.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Schedule::evaluate()`] or of the reporter. Nothing is reported if
    /// any measurement fails.
    pub fn evaluate(
        &self,
        step: Step,
        current_state: &StateMap<V>,
        names: Option<&[&str]>,
    ) -> Result<()> {
        self.schedule
            .evaluate(step, current_state, names)?
            .map_or(Ok(()), |measured| self.reporter.report_all(step, measured))
    }

    /// The measurements and the fixed state.
    #[must_use]
    pub fn schedule(&self) -> &Schedule<V> {
        &self.schedule
    }

    /// The reporter that receives the results.
    #[must_use]
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Closes the reporter.
    ///
    /// # Errors
    ///
    /// Returns whatever error the reporter returns.
    pub fn close(&self) -> Result<()> {
        self.reporter.close()
    }
}

impl<V, R> Debug for MeasurementManager<V, R>
where
    V: Debug,
    R: Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("schedule", &self.schedule)
            .field("reporter", &self.reporter)
            .finish()
    }
}
