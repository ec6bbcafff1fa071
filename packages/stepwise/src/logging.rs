use std::cell::RefCell;
use std::io::{self, Write};

use tracing::{Level, event};

use crate::{Metric, MetricMap, ParamMap, Reporter, Result, Step, to_scalar};

/// Decimal places used for numeric values unless configured otherwise.
pub const DEFAULT_DIGITS: usize = 3;

/// A [`Reporter`] that writes one human-readable line per batch.
///
/// Lines look like `Step 3: acc = 0.910, phase = train`. Any scalar with a numeric reading is
/// written with a fixed number of decimal places ([`DEFAULT_DIGITS`] unless set with
/// [`digits()`][Self::digits]). That covers integers, floats, booleans (`1.000`) and numeric
/// text (`"3"` becomes `3.000`). Lists, maps and other text use their
/// [`Display`][std::fmt::Display] form.
///
/// Parameters are not written. There is no reader.
///
/// # Example
///
/// ```
/// use stepwise::{LoggingReporter, Reporter, metrics};
///
/// let reporter = LoggingReporter::new(Vec::new()).digits(1);
/// reporter.report_all(3, metrics! { "acc" => 0.91, "phase" => "train" }).unwrap();
///
/// let output = String::from_utf8(reporter.into_inner()).unwrap();
/// assert_eq!(output, "Step 3: acc = 0.9, phase = train\n");
/// ```
#[derive(Debug)]
pub struct LoggingReporter<W> {
    writer: RefCell<W>,
    digits: usize,
}

impl<W> LoggingReporter<W>
where
    W: Write,
{
    /// Writes lines to `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
            digits: DEFAULT_DIGITS,
        }
    }

    /// Sets the number of decimal places used for numeric values.
    #[must_use]
    pub fn digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    /// Consumes the reporter, returning the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn format(&self, value: &Metric) -> String {
        let number = match value {
            Metric::List(_) | Metric::Map(_) => None,
            scalar => to_scalar(scalar).ok(),
        };

        number.map_or_else(
            || value.to_string(),
            |number| format!("{number:.digits$}", digits = self.digits),
        )
    }
}

impl LoggingReporter<io::Stdout> {
    /// Writes lines to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl LoggingReporter<io::Stderr> {
    /// Writes lines to standard error, which keeps them apart from progress output on
    /// standard output.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W> Reporter for LoggingReporter<W>
where
    W: Write,
{
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        let line = metrics
            .iter()
            .map(|(key, value)| format!("{key} = {}", self.format(value)))
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(self.writer.borrow_mut(), "Step {step}: {line}")?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.writer.borrow_mut().flush()?;
        Ok(())
    }
}

/// The level used by [`TracingReporter`] unless configured otherwise.
pub const DEFAULT_TRACING_LEVEL: Level = Level::INFO;

/// A [`Reporter`] that emits one `tracing` event per metric and per parameter.
///
/// Metric events carry `step`, `key` and `value` fields. Parameter events carry `param` and
/// `value` fields. Whether and where the events end up is up to the installed subscriber.
///
/// # Example
///
/// ```
/// use stepwise::{Metric, Reporter, TracingReporter};
/// use tracing::Level;
///
/// let reporter = TracingReporter::new().level(Level::DEBUG);
/// reporter.report(0, "loss".into(), Metric::from(0.25)).unwrap();
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TracingReporter {
    level: Level,
}

impl TracingReporter {
    /// Emits events at [`DEFAULT_TRACING_LEVEL`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: DEFAULT_TRACING_LEVEL,
        }
    }

    /// Sets the level of the emitted events.
    #[must_use]
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new()
    }
}

// event! needs the level as a constant.
macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            Level::ERROR => event!(Level::ERROR, $($rest)+),
            Level::WARN => event!(Level::WARN, $($rest)+),
            Level::INFO => event!(Level::INFO, $($rest)+),
            Level::DEBUG => event!(Level::DEBUG, $($rest)+),
            Level::TRACE => event!(Level::TRACE, $($rest)+),
        }
    };
}

impl Reporter for TracingReporter {
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        for (key, value) in &metrics {
            event_at!(self.level, step, %key, %value, "metric");
        }

        Ok(())
    }

    fn report_params(&self, params: ParamMap) -> Result<()> {
        for (param, value) in &params {
            event_at!(self.level, %param, %value, "parameter");
        }

        Ok(())
    }
}
