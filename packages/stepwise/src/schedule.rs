//! Measurements that run on a schedule of steps.
//!
//! A [`Schedule`] holds named [`Measurement`]s, each with a trigger that decides at which steps
//! it is due. Evaluating the schedule at a step runs the due measurements against a view of the
//! training state and collects their results into a [`MetricMap`] keyed by measurement name.
//!
//! Part of the state is fixed for the lifetime of the schedule (a dataset, a model
//! configuration) and part of it changes from step to step (the current weights). The fixed part
//! is given to [`Schedule::new()`], the changing part to every [`Schedule::evaluate()`] call.
//! Measurements see both through a [`MergedState`], in which changing entries shadow fixed ones.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

use tracing::{debug, trace};

use crate::{Error, Metric, MetricKey, MetricMap, Result, Step};

/// Named entries of training state.
pub type StateMap<V> = BTreeMap<String, V>;

type MeasureFn<V> = dyn Fn(&MergedState<'_, V>) -> Result<Metric>;

/// Read-only view over the fixed and the per-step state of a [`Schedule`].
///
/// Per-step entries shadow fixed entries with the same name.
#[derive(Debug)]
pub struct MergedState<'a, V> {
    fixed: &'a StateMap<V>,
    current: &'a StateMap<V>,
}

impl<'a, V> MergedState<'a, V> {
    /// Creates a view in which `current` shadows `fixed`.
    #[must_use]
    pub fn new(fixed: &'a StateMap<V>, current: &'a StateMap<V>) -> Self {
        Self { fixed, current }
    }

    /// Returns the entry with the given name, if either state has it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a V> {
        self.current.get(key).or_else(|| self.fixed.get(key))
    }

    /// Returns the entry with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingState`] if neither state has the entry.
    pub fn require(&self, key: &str) -> Result<&'a V> {
        self.get(key).ok_or_else(|| Error::MissingState {
            key: key.to_owned(),
        })
    }

    /// Whether either state has an entry with the given name.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.current.contains_key(key) || self.fixed.contains_key(key)
    }
}

/// Decides at which steps a [`Measurement`] is due.
#[non_exhaustive]
pub enum Trigger {
    /// Due at every step that is a multiple of the interval, starting with step 0.
    Interval(i64),

    /// Due at every step for which the predicate returns `true`.
    Predicate(Box<dyn Fn(Step) -> bool>),
}

impl Trigger {
    /// Whether a measurement with this trigger is due at `step`.
    #[must_use]
    pub fn is_due(&self, step: Step) -> bool {
        match self {
            // Intervals are validated to be positive when a measurement is added to a schedule.
            Self::Interval(interval) => *interval > 0 && step.rem_euclid(*interval) == 0,
            Self::Predicate(predicate) => predicate(step),
        }
    }
}

impl Debug for Trigger {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval(interval) => f.debug_tuple("Interval").field(interval).finish(),
            Self::Predicate(_) => f.debug_tuple("Predicate").finish_non_exhaustive(),
        }
    }
}

/// A named function of the training state, together with the steps at which it is due.
pub struct Measurement<V> {
    name: String,
    trigger: Trigger,
    function: Box<MeasureFn<V>>,
}

impl<V> Measurement<V> {
    /// A measurement that is due every `interval` steps, starting with step 0.
    ///
    /// The interval is validated when the measurement is added to a [`Schedule`].
    #[must_use]
    pub fn every<F>(name: impl Into<String>, interval: i64, function: F) -> Self
    where
        F: Fn(&MergedState<'_, V>) -> Result<Metric> + 'static,
    {
        Self {
            name: name.into(),
            trigger: Trigger::Interval(interval),
            function: Box::new(function),
        }
    }

    /// A measurement that is due at every step for which `trigger` returns `true`.
    #[must_use]
    pub fn when<T, F>(name: impl Into<String>, trigger: T, function: F) -> Self
    where
        T: Fn(Step) -> bool + 'static,
        F: Fn(&MergedState<'_, V>) -> Result<Metric> + 'static,
    {
        Self {
            name: name.into(),
            trigger: Trigger::Predicate(Box::new(trigger)),
            function: Box::new(function),
        }
    }

    /// The name under which the result of the measurement is reported.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decides at which steps the measurement is due.
    #[must_use]
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Runs the measurement against `state`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the measurement function returns.
    pub fn measure(&self, state: &MergedState<'_, V>) -> Result<Metric> {
        (self.function)(state)
    }
}

impl<V> Debug for Measurement<V> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// A set of named [`Measurement`]s and the fixed state they are evaluated against.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// use stepwise::{Measurement, Metric, Schedule};
///
/// let mut schedule = Schedule::new(BTreeMap::from([("scale".to_string(), 2.0)]));
///
/// schedule
///     .add(Measurement::every("scaled_loss", 10, |state| {
///         Ok(Metric::from(state.require("scale")? * state.require("loss")?))
///     }))
///     .unwrap();
///
/// let current = BTreeMap::from([("loss".to_string(), 0.25)]);
///
/// let measured = schedule.evaluate(20, &current, None).unwrap().unwrap();
/// assert_eq!(measured["scaled_loss"], Metric::from(0.5));
///
/// assert!(schedule.evaluate(21, &current, None).unwrap().is_none());
/// ```
pub struct Schedule<V> {
    fixed: StateMap<V>,
    measurements: BTreeMap<String, Measurement<V>>,
}

impl<V> Schedule<V> {
    /// Creates a schedule without measurements that evaluates against `fixed_state` plus the
    /// per-step state given to each evaluation.
    #[must_use]
    pub fn new(fixed_state: StateMap<V>) -> Self {
        Self {
            fixed: fixed_state,
            measurements: BTreeMap::new(),
        }
    }

    /// Adds a measurement. A measurement with the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`] if the measurement is due every `n` steps with
    /// `n <= 0`.
    pub fn add(&mut self, measurement: Measurement<V>) -> Result<()> {
        if let Trigger::Interval(interval) = measurement.trigger {
            if interval <= 0 {
                return Err(Error::InvalidInterval {
                    name: measurement.name,
                    interval,
                });
            }
        }

        debug!(name = %measurement.name, trigger = ?measurement.trigger, "added measurement");

        self.measurements
            .insert(measurement.name.clone(), measurement);

        Ok(())
    }

    /// The fixed part of the state.
    #[must_use]
    pub fn fixed_state(&self) -> &StateMap<V> {
        &self.fixed
    }

    /// The registered measurements, in name order.
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement<V>> {
        self.measurements.values()
    }

    /// Returns the registered measurement with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Measurement<V>> {
        self.measurements.get(name)
    }

    /// The number of registered measurements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Whether no measurements are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Returns the names of the measurements due at `step`, in name order.
    #[must_use]
    pub fn due(&self, step: Step) -> Vec<String> {
        self.measurements
            .values()
            .filter(|measurement| measurement.trigger.is_due(step))
            .map(|measurement| measurement.name.clone())
            .collect()
    }

    /// Runs measurements at `step` against the fixed state merged with `current_state`.
    ///
    /// The measurements that run are the ones named in `names` if given, regardless of their
    /// triggers, and otherwise the ones [due][Self::due] at `step`.
    ///
    /// Returns `None` if no measurement ran, otherwise the results keyed by measurement name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMeasurement`] if `names` contains a name that is not registered,
    /// before any measurement runs. Otherwise returns the first error returned by a
    /// measurement function.
    pub fn evaluate(
        &self,
        step: Step,
        current_state: &StateMap<V>,
        names: Option<&[&str]>,
    ) -> Result<Option<MetricMap>> {
        let selected = match names {
            Some(names) => names
                .iter()
                .map(|name| {
                    self.measurements
                        .get(*name)
                        .ok_or_else(|| Error::UnknownMeasurement {
                            name: (*name).to_owned(),
                        })
                })
                .collect::<Result<Vec<_>>>()?,
            None => self
                .measurements
                .values()
                .filter(|measurement| measurement.trigger.is_due(step))
                .collect(),
        };

        if selected.is_empty() {
            return Ok(None);
        }

        trace!(step, count = selected.len(), "running measurements");

        let state = MergedState::new(&self.fixed, current_state);

        selected
            .into_iter()
            .map(|measurement| {
                Ok((
                    MetricKey::from(measurement.name.as_str()),
                    measurement.measure(&state)?,
                ))
            })
            .collect::<Result<MetricMap>>()
            .map(Some)
    }
}

impl<V> Debug for Schedule<V>
where
    V: Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("fixed", &self.fixed)
            .field("measurements", &self.measurements)
            .finish()
    }
}
