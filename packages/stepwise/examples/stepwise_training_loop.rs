//! A toy training loop that reports through a composed reporter stack.
//!
//! Every metric goes to standard output, the `tracing` subscriber and an in-memory store.
//! A scheduled measurement runs every 25 steps and the run parameters are flattened before
//! being reported.

use std::collections::BTreeMap;
use std::rc::Rc;

use stepwise::{
    KeyedReader, LoggingReporter, MeasurementManager, Measurement, MemoryReporter, MergedState,
    Metric, Reporter, ReporterExt, StateMap, TracingReporter, flatten, params, report,
    with_reporter,
};

const STEPS: i64 = 100;

fn main() -> stepwise::Result<()> {
    tracing_subscriber::fmt().init();

    let store = MemoryReporter::new();

    // Kept so the whole stack can be closed once the loop is done.
    let reporter = Rc::new(
        LoggingReporter::stdout()
            .report_each_n(10)
            .plus(TracingReporter::new().with_prefix("train"))
            .plus(store.clone().stepped()),
    );

    let run = params! {
        "optimizer" => BTreeMap::from([
            ("name".to_owned(), Metric::from("sgd")),
            ("lr".to_owned(), Metric::from(0.1)),
        ]),
        "steps" => STEPS,
    };
    reporter.report_params(flatten(&run, ".")?)?;

    let fixed = StateMap::<f64>::from([("target".to_owned(), 3.0)]);
    let mut manager = MeasurementManager::new(fixed, store.clone().stepped());
    manager.add(Measurement::every("distance", 25, |state: &MergedState<'_, f64>| {
        Ok(Metric::from(
            (state.require("weight")? - state.require("target")?).abs(),
        ))
    }))?;

    let mut weight = 0.0_f64;

    with_reporter(Rc::clone(&reporter), || -> stepwise::Result<()> {
        for step in 0..STEPS {
            let gradient = 2.0 * (weight - 3.0);
            weight -= 0.1 * gradient;

            report(step, "loss", (weight - 3.0).powi(2))?;

            let current = StateMap::from([("weight".to_owned(), weight)]);
            manager.evaluate(step, &current, None)?;
        }

        Ok(())
    })?;

    reporter.close()?;

    println!("stored keys: {:?}", store.memory_reader().keys()?);

    manager.close()
}
