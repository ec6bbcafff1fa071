#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! # stepwise
//!
//! Report metrics of step-indexed processes, such as training loops, through small composable
//! reporters, and read them back through matching readers.
//!
//! A [`Reporter`] persists a batch of metrics at a step. Reporters are combined by wrapping:
//! every combinator in [`ReporterExt`] takes a reporter and returns a new one that rewrites keys,
//! filters or transforms values, or broadcasts to several backends before passing things on.
//! Closing the outermost reporter closes everything it wraps.
//!
//! ```
//! use stepwise::{MemoryReporter, Metric, Reader, Reporter, ReporterExt, metrics};
//!
//! let store = MemoryReporter::new();
//!
//! // Keys are prefixed with "train.", odd steps are dropped and
//! // every value is stored together with the step it was reported at.
//! let reporter = store
//!     .clone()
//!     .stepped()
//!     .with_prefix("train")
//!     .filter_step(|step| step % 2 == 0);
//!
//! for step in 0..4 {
//!     reporter.report_all(step, metrics! { "loss" => 0.5 }).unwrap();
//! }
//!
//! let reader = reporter.reader().unwrap();
//! let losses = reader.read(&"loss".into()).unwrap();
//!
//! assert_eq!(losses.len(), 2);
//! assert_eq!(losses[1].as_map().unwrap()["step"], Metric::Int(2));
//!
//! reporter.close().unwrap();
//! ```
//!
//! # Backends
//!
//! * [`MemoryReporter`] keeps everything in memory and reads it back with [`MemoryReader`].
//! * [`LoggingReporter`] writes one line per step to any [`std::io::Write`].
//! * [`TracingReporter`] emits one `tracing` event per metric.
//! * [`NullReporter`] discards everything.
//! * [`LambdaReporter`] and [`LambdaReader`] adapt plain closures.
//!
//! # The active reporter
//!
//! Code that cannot easily receive a reporter as a parameter reports through the free functions
//! [`report()`] and [`report_all()`], which go to the reporter activated for the current thread
//! by [`with_reporter()`] or [`enter_reporter()`].
//!
//! # Scheduled measurements
//!
//! A [`MeasurementManager`] runs named measurements over the current state of a process every
//! `n` steps, or whenever a predicate says so, and reports the results.

mod active;
mod attached;
mod attachment;
mod error;
mod filter;
mod flatten;
mod lambda;
mod logging;
mod manager;
mod map;
mod memory;
mod metric;
mod multi;
mod normalize;
mod null;
mod reader;
mod reporter;
mod schedule;
mod thunk;

pub use active::*;
pub use attached::*;
pub use attachment::*;
pub use error::*;
pub use filter::*;
pub use flatten::*;
pub use lambda::*;
pub use logging::*;
pub use manager::*;
pub use map::*;
pub use memory::*;
pub use metric::*;
pub use multi::*;
pub use normalize::*;
pub use null::*;
pub use reader::*;
pub use reporter::*;
pub use schedule::*;
pub use thunk::*;
