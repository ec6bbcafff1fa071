//! The active reporter of the current thread.
//!
//! Code deep inside a training loop often has no convenient way to receive a reporter as a
//! parameter. Instead, the caller activates a reporter for the current thread and the inner code
//! reports through the free functions in this module, which delegate to whatever reporter is
//! active at the time of the call.
//!
//! Activations nest. [`enter_reporter()`] and [`with_reporter()`] activate a reporter for a
//! scope and restore the previous one when the scope ends, including when it ends by panicking.
//! When nothing has been activated, reports go to a [`NullReporter`].
//!
//! Each thread has its own stack of activations.
//!
//! # Example
//!
//! ```
//! use stepwise::{MemoryReporter, Reader, report, with_reporter};
//!
//! fn train_step(step: i64) -> stepwise::Result<()> {
//!     report(step, "loss", 1.0 / (step as f64 + 1.0))
//! }
//!
//! let store = MemoryReporter::new();
//!
//! with_reporter(store.clone(), || {
//!     for step in 0..5 {
//!         train_step(step).unwrap();
//!     }
//! });
//!
//! // Outside the scope, reports are discarded again.
//! train_step(5).unwrap();
//!
//! assert_eq!(store.memory_reader().read(&"loss".into()).unwrap().len(), 5);
//! ```

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use tracing::debug;

use crate::{Metric, MetricKey, MetricMap, NullReporter, ParamMap, Reporter, Result, Step};

/// One entry of the per-thread stack.
///
/// The id ties the entry to the guard that pushed it. Replacing the reporter keeps the id.
struct Activation {
    id: u64,
    reporter: Rc<dyn Reporter>,
}

thread_local! {
    static ACTIVE: RefCell<Vec<Activation>> = const { RefCell::new(Vec::new()) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_id() -> u64 {
    NEXT_ID.with(|next| {
        let id = next.get();
        next.set(id.wrapping_add(1));
        id
    })
}

/// Returns the reporter that is active on the current thread.
///
/// Returns a [`NullReporter`] if no reporter has been activated.
#[must_use]
pub fn active_reporter() -> Rc<dyn Reporter> {
    ACTIVE
        .with_borrow(|stack| stack.last().map(|activation| Rc::clone(&activation.reporter)))
        .unwrap_or_else(|| Rc::new(NullReporter::new()))
}

/// Makes `reporter` the active reporter of the current thread.
///
/// Replaces the innermost activation. If a scope created by [`enter_reporter()`] is active,
/// the replacement lasts until that scope ends; otherwise it lasts until replaced again.
pub fn set_active_reporter(reporter: impl Reporter + 'static) {
    let reporter: Rc<dyn Reporter> = Rc::new(reporter);

    // Dropped outside the borrow in case its drop logic reports through the registry.
    let _previous = ACTIVE.with_borrow_mut(|stack| {
        if let Some(top) = stack.last_mut() {
            return Some(mem::replace(&mut top.reporter, reporter));
        }

        stack.push(Activation {
            id: next_id(),
            reporter,
        });
        None
    });

    debug!("replaced active reporter");
}

/// Makes `reporter` the active reporter of the current thread until the returned guard is
/// dropped.
///
/// Dropping the guard restores whatever was active before this call.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Reader, enter_reporter, report};
///
/// let store = MemoryReporter::new();
///
/// {
///     let _guard = enter_reporter(store.clone());
///     report(0, "loss", 0.5).unwrap();
/// }
///
/// report(1, "loss", 0.4).unwrap();
///
/// assert_eq!(store.memory_reader().read(&"loss".into()).unwrap().len(), 1);
/// ```
pub fn enter_reporter(reporter: impl Reporter + 'static) -> ActiveReporterGuard {
    let id = next_id();
    let reporter: Rc<dyn Reporter> = Rc::new(reporter);

    let depth = ACTIVE.with_borrow_mut(|stack| {
        stack.push(Activation { id, reporter });
        stack.len()
    });

    debug!(depth, id, "entered reporter scope");

    ActiveReporterGuard {
        depth,
        id,
        _single_threaded: PhantomData,
    }
}

/// Runs `f` with `reporter` active on the current thread and returns what `f` returns.
pub fn with_reporter<T>(reporter: impl Reporter + 'static, f: impl FnOnce() -> T) -> T {
    let _guard = enter_reporter(reporter);
    f()
}

/// Restores the previously active reporter when dropped.
///
/// Returned by [`enter_reporter()`]. The guard is bound to the thread that created it.
#[derive(Debug)]
#[must_use = "the reporter is only active until the guard is dropped"]
pub struct ActiveReporterGuard {
    depth: usize,
    id: u64,

    _single_threaded: PhantomData<*const ()>,
}

impl Drop for ActiveReporterGuard {
    fn drop(&mut self) {
        let _discarded = ACTIVE.with_borrow_mut(|stack| {
            let keep = self.depth.saturating_sub(1);

            // If an outer guard was dropped first, this activation is gone and the entry at
            // this depth, if any, belongs to a newer guard.
            let owned = stack
                .get(keep)
                .is_some_and(|activation| activation.id == self.id);

            if owned {
                // Also discards activations of inner guards that were leaked or dropped out
                // of order.
                stack.split_off(keep)
            } else {
                Vec::new()
            }
        });

        debug!(depth = self.depth, id = self.id, "left reporter scope");
    }
}

/// Reports one metric to the active reporter.
///
/// # Errors
///
/// Returns whatever error the active reporter returns.
pub fn report(step: Step, key: impl Into<MetricKey>, value: impl Into<Metric>) -> Result<()> {
    active_reporter().report(step, key.into(), value.into())
}

/// Reports a batch of metrics to the active reporter.
///
/// # Errors
///
/// Returns whatever error the active reporter returns.
pub fn report_all(step: Step, metrics: MetricMap) -> Result<()> {
    active_reporter().report_all(step, metrics)
}

/// Reports one run parameter to the active reporter.
///
/// # Errors
///
/// Returns whatever error the active reporter returns.
pub fn report_param(key: &str, value: impl Into<Metric>) -> Result<()> {
    active_reporter().report_param(key, value.into())
}

/// Reports run parameters to the active reporter.
///
/// # Errors
///
/// Returns whatever error the active reporter returns.
pub fn report_params(params: ParamMap) -> Result<()> {
    active_reporter().report_params(params)
}
