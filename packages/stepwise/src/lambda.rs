//! Reporters and readers backed by closures.
//!
//! A closure-backed component only needs one of its singular and batch closures. Whichever is
//! missing is derived from the other: a batch is reported as one call per metric and a single
//! metric is reported as a batch of one.

use std::any::type_name;
use std::fmt::{self, Debug, Formatter};
use std::slice;

use crate::{
    Error, Metric, MetricKey, MetricMap, ParamMap, ReadMap, Reader, Reporter, Result, Step,
};

type ReportFn = dyn Fn(Step, MetricKey, Metric) -> Result<()>;
type ReportAllFn = dyn Fn(Step, MetricMap) -> Result<()>;
type ReportParamFn = dyn Fn(&str, Metric) -> Result<()>;
type ReportParamsFn = dyn Fn(ParamMap) -> Result<()>;
type ReadFn = dyn Fn(&MetricKey) -> Result<Vec<Metric>>;
type ReadAllFn = dyn Fn(&[MetricKey]) -> Result<ReadMap>;
type CloseFn = dyn Fn() -> Result<()>;

enum Report {
    Single(Box<ReportFn>),
    Batch(Box<ReportAllFn>),
    Both(Box<ReportFn>, Box<ReportAllFn>),
}

enum Params {
    Ignored,
    Single(Box<ReportParamFn>),
    Batch(Box<ReportParamsFn>),
    Both(Box<ReportParamFn>, Box<ReportParamsFn>),
}

/// A [`Reporter`] whose operations are supplied as closures.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use stepwise::{LambdaReporter, Reporter, metrics};
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let sink = Rc::clone(&seen);
/// let reporter = LambdaReporter::builder()
///     .report(move |step, key, value| {
///         sink.borrow_mut().push(format!("{step}:{key}={value}"));
///         Ok(())
///     })
///     .build()
///     .unwrap();
///
/// // The batch form is derived from the single-metric closure.
/// reporter.report_all(2, metrics! { "a" => 1, "b" => 2 }).unwrap();
///
/// assert_eq!(*seen.borrow(), ["2:a=1", "2:b=2"]);
/// ```
pub struct LambdaReporter {
    report: Report,
    params: Params,
    close: Option<Box<CloseFn>>,
}

impl LambdaReporter {
    /// Starts building a closure-backed reporter.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn builder() -> LambdaReporterBuilder {
        LambdaReporterBuilder::new()
    }
}

impl Reporter for LambdaReporter {
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        match &self.report {
            Report::Batch(report_all) | Report::Both(_, report_all) => report_all(step, metrics),
            Report::Single(report) => {
                for (key, value) in metrics {
                    report(step, key, value)?;
                }

                Ok(())
            }
        }
    }

    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        match &self.report {
            Report::Single(report) | Report::Both(report, _) => report(step, key, value),
            Report::Batch(report_all) => report_all(step, MetricMap::from([(key, value)])),
        }
    }

    fn report_params(&self, params: ParamMap) -> Result<()> {
        match &self.params {
            Params::Ignored => Ok(()),
            Params::Batch(report_params) | Params::Both(_, report_params) => report_params(params),
            Params::Single(report_param) => {
                for (key, value) in params {
                    report_param(&key, value)?;
                }

                Ok(())
            }
        }
    }

    fn report_param(&self, key: &str, value: Metric) -> Result<()> {
        match &self.params {
            Params::Ignored => Ok(()),
            Params::Single(report_param) | Params::Both(report_param, _) => {
                report_param(key, value)
            }
            Params::Batch(report_params) => {
                report_params(ParamMap::from([(key.to_owned(), value)]))
            }
        }
    }

    fn close(&self) -> Result<()> {
        self.close.as_ref().map_or(Ok(()), |close| close())
    }
}

impl Debug for LambdaReporter {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("close", &self.close.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LambdaReporter`].
///
/// At least one of [`report()`][Self::report] and [`report_all()`][Self::report_all] must be
/// supplied. Parameter and close closures are optional.
#[must_use]
#[derive(Default)]
pub struct LambdaReporterBuilder {
    report: Option<Box<ReportFn>>,
    report_all: Option<Box<ReportAllFn>>,
    report_param: Option<Box<ReportParamFn>>,
    report_params: Option<Box<ReportParamsFn>>,
    close: Option<Box<CloseFn>>,
}

impl LambdaReporterBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reports a single metric.
    pub fn report<F>(mut self, f: F) -> Self
    where
        F: Fn(Step, MetricKey, Metric) -> Result<()> + 'static,
    {
        self.report = Some(Box::new(f));
        self
    }

    /// Reports a batch of metrics.
    pub fn report_all<F>(mut self, f: F) -> Self
    where
        F: Fn(Step, MetricMap) -> Result<()> + 'static,
    {
        self.report_all = Some(Box::new(f));
        self
    }

    /// Reports a single run parameter.
    pub fn report_param<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Metric) -> Result<()> + 'static,
    {
        self.report_param = Some(Box::new(f));
        self
    }

    /// Reports a map of run parameters.
    pub fn report_params<F>(mut self, f: F) -> Self
    where
        F: Fn(ParamMap) -> Result<()> + 'static,
    {
        self.report_params = Some(Box::new(f));
        self
    }

    /// Releases whatever the other closures hold on to.
    pub fn close<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        self.close = Some(Box::new(f));
        self
    }

    /// Builds the reporter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDelegate`] if neither a `report` nor a `report_all` closure
    /// was supplied.
    pub fn build(self) -> Result<LambdaReporter> {
        let report = match (self.report, self.report_all) {
            (Some(report), Some(report_all)) => Report::Both(report, report_all),
            (Some(report), None) => Report::Single(report),
            (None, Some(report_all)) => Report::Batch(report_all),
            (None, None) => {
                return Err(Error::MissingDelegate {
                    component: "LambdaReporter",
                    required: "report or report_all",
                });
            }
        };

        let params = match (self.report_param, self.report_params) {
            (Some(single), Some(batch)) => Params::Both(single, batch),
            (Some(single), None) => Params::Single(single),
            (None, Some(batch)) => Params::Batch(batch),
            (None, None) => Params::Ignored,
        };

        Ok(LambdaReporter {
            report,
            params,
            close: self.close,
        })
    }
}

impl Debug for LambdaReporterBuilder {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("report", &self.report.is_some())
            .field("report_all", &self.report_all.is_some())
            .field("report_param", &self.report_param.is_some())
            .field("report_params", &self.report_params.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

enum Read {
    Single(Box<ReadFn>),
    Batch(Box<ReadAllFn>),
    Both(Box<ReadFn>, Box<ReadAllFn>),
}

/// A [`Reader`] whose operations are supplied as closures.
///
/// # Example
///
/// ```
/// use stepwise::{LambdaReader, Metric, Reader};
///
/// let reader = LambdaReader::builder()
///     .read(|key| Ok(vec![Metric::from(key.as_str())]))
///     .build()
///     .unwrap();
///
/// // The batch form is derived from the single-key closure.
/// let values = reader.read_all(&["a".into(), "b".into()]).unwrap();
///
/// assert_eq!(values["b"], vec![Metric::from("b")]);
/// ```
pub struct LambdaReader {
    read: Read,
    close: Option<Box<CloseFn>>,
}

impl LambdaReader {
    /// Starts building a closure-backed reader.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn builder() -> LambdaReaderBuilder {
        LambdaReaderBuilder::new()
    }
}

impl Reader for LambdaReader {
    fn read_all(&self, keys: &[MetricKey]) -> Result<ReadMap> {
        match &self.read {
            Read::Batch(read_all) | Read::Both(_, read_all) => read_all(keys),
            Read::Single(read) => keys
                .iter()
                .map(|key| Ok((key.clone(), read(key)?)))
                .collect(),
        }
    }

    fn read(&self, key: &MetricKey) -> Result<Vec<Metric>> {
        match &self.read {
            Read::Single(read) | Read::Both(read, _) => read(key),
            Read::Batch(read_all) => {
                let mut values = read_all(slice::from_ref(key))?;
                Ok(values.remove(key).unwrap_or_default())
            }
        }
    }

    fn close(&self) -> Result<()> {
        self.close.as_ref().map_or(Ok(()), |close| close())
    }
}

impl Debug for LambdaReader {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("close", &self.close.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LambdaReader`].
///
/// At least one of [`read()`][Self::read] and [`read_all()`][Self::read_all] must be supplied.
#[must_use]
#[derive(Default)]
pub struct LambdaReaderBuilder {
    read: Option<Box<ReadFn>>,
    read_all: Option<Box<ReadAllFn>>,
    close: Option<Box<CloseFn>>,
}

impl LambdaReaderBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reads every value of a single key.
    pub fn read<F>(mut self, f: F) -> Self
    where
        F: Fn(&MetricKey) -> Result<Vec<Metric>> + 'static,
    {
        self.read = Some(Box::new(f));
        self
    }

    /// Reads every value of several keys.
    pub fn read_all<F>(mut self, f: F) -> Self
    where
        F: Fn(&[MetricKey]) -> Result<ReadMap> + 'static,
    {
        self.read_all = Some(Box::new(f));
        self
    }

    /// Releases whatever the other closures hold on to.
    pub fn close<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        self.close = Some(Box::new(f));
        self
    }

    /// Builds the reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDelegate`] if neither a `read` nor a `read_all` closure was
    /// supplied.
    pub fn build(self) -> Result<LambdaReader> {
        let read = match (self.read, self.read_all) {
            (Some(read), Some(read_all)) => Read::Both(read, read_all),
            (Some(read), None) => Read::Single(read),
            (None, Some(read_all)) => Read::Batch(read_all),
            (None, None) => {
                return Err(Error::MissingDelegate {
                    component: "LambdaReader",
                    required: "read or read_all",
                });
            }
        };

        Ok(LambdaReader {
            read,
            close: self.close,
        })
    }
}

impl Debug for LambdaReaderBuilder {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("read", &self.read.is_some())
            .field("read_all", &self.read_all.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::{metrics, params};

    type Calls = Rc<RefCell<Vec<String>>>;

    fn recorder() -> Calls {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn build_requires_a_report_closure() {
        let result = LambdaReporter::builder().close(|| Ok(())).build();

        assert!(matches!(
            result,
            Err(Error::MissingDelegate {
                component: "LambdaReporter",
                ..
            })
        ));
    }

    #[test]
    fn build_requires_a_read_closure() {
        let result = LambdaReader::builder().build();

        assert!(matches!(
            result,
            Err(Error::MissingDelegate {
                component: "LambdaReader",
                ..
            })
        ));
    }

    #[test]
    fn single_report_is_derived_from_batch() {
        let calls = recorder();
        let sink = Rc::clone(&calls);

        let reporter = LambdaReporter::builder()
            .report_all(move |step, metrics| {
                sink.borrow_mut().push(format!("{step}:{}", metrics.len()));
                Ok(())
            })
            .build()
            .unwrap();

        reporter.report(5, "a".into(), Metric::Int(1)).unwrap();

        assert_eq!(*calls.borrow(), ["5:1"]);
    }

    #[test]
    fn both_closures_are_used_directly() {
        let calls = recorder();
        let single = Rc::clone(&calls);
        let batch = Rc::clone(&calls);

        let reporter = LambdaReporter::builder()
            .report(move |_, key, _| {
                single.borrow_mut().push(format!("single {key}"));
                Ok(())
            })
            .report_all(move |_, metrics| {
                batch.borrow_mut().push(format!("batch {}", metrics.len()));
                Ok(())
            })
            .build()
            .unwrap();

        reporter.report(0, "a".into(), Metric::Int(1)).unwrap();
        reporter.report_all(0, metrics! { "b" => 1, "c" => 2 }).unwrap();

        assert_eq!(*calls.borrow(), ["single a", "batch 2"]);
    }

    #[test]
    fn derived_batch_stops_at_first_error() {
        let attempts = Rc::new(Cell::new(0));
        let counter = Rc::clone(&attempts);

        let reporter = LambdaReporter::builder()
            .report(move |_, _, _| {
                counter.set(counter.get() + 1);
                Err(Error::backend("rejected"))
            })
            .build()
            .unwrap();

        assert!(reporter.report_all(0, metrics! { "a" => 1, "b" => 2 }).is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn params_are_derived_in_both_directions() {
        let calls = recorder();
        let single = Rc::clone(&calls);

        let from_single = LambdaReporter::builder()
            .report_all(|_, _| Ok(()))
            .report_param(move |key, value| {
                single.borrow_mut().push(format!("{key}={value}"));
                Ok(())
            })
            .build()
            .unwrap();

        from_single
            .report_params(params! { "a" => 1, "b" => 2 })
            .unwrap();

        assert_eq!(*calls.borrow(), ["a=1", "b=2"]);

        let batch = Rc::clone(&calls);
        let from_batch = LambdaReporter::builder()
            .report_all(|_, _| Ok(()))
            .report_params(move |params| {
                batch.borrow_mut().push(format!("{} params", params.len()));
                Ok(())
            })
            .build()
            .unwrap();

        from_batch.report_param("c", Metric::Int(3)).unwrap();

        assert_eq!(calls.borrow().last().unwrap(), "1 params");
    }

    #[test]
    fn params_without_closures_are_ignored() {
        let reporter = LambdaReporter::builder()
            .report_all(|_, _| Ok(()))
            .build()
            .unwrap();

        reporter.report_param("a", Metric::Int(1)).unwrap();
        reporter.report_params(params! { "b" => 2 }).unwrap();
    }

    #[test]
    fn close_calls_the_closure() {
        let closed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&closed);

        let reporter = LambdaReporter::builder()
            .report_all(|_, _| Ok(()))
            .close(move || {
                flag.set(true);
                Ok(())
            })
            .build()
            .unwrap();

        reporter.close().unwrap();

        assert!(closed.get());
    }

    #[test]
    fn single_read_is_derived_from_batch() {
        let reader = LambdaReader::builder()
            .read_all(|keys| {
                Ok(keys
                    .iter()
                    .map(|key| (key.clone(), vec![Metric::from(key.as_str().len())]))
                    .collect())
            })
            .build()
            .unwrap();

        assert_eq!(reader.read(&"abc".into()).unwrap(), vec![Metric::Int(3)]);
    }

    #[test]
    fn derived_batch_read_propagates_errors() {
        let reader = LambdaReader::builder()
            .read(|key| {
                if key == "bad" {
                    Err(Error::backend("unreadable"))
                } else {
                    Ok(Vec::new())
                }
            })
            .build()
            .unwrap();

        assert!(reader.read_all(&["good".into(), "bad".into()]).is_err());
    }

    #[test]
    fn reader_close_defaults_to_success() {
        let reader = LambdaReader::builder()
            .read(|_| Ok(Vec::new()))
            .build()
            .unwrap();

        reader.close().unwrap();
    }
}
