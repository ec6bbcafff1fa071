//! The serialized form of metric values, used by backends that persist to JSON.

#![cfg(feature = "serde")]

use stepwise::{MemoryReporter, Metric, MetricMap, Reader, Reporter, ReporterExt, metrics};

#[test]
fn batches_serialize_as_plain_json_objects() {
    let batch = metrics! { "epoch" => 3, "loss" => 0.5, "phase" => "train", "ok" => true };

    let json = serde_json::to_string(&batch).unwrap();

    assert_eq!(json, r#"{"epoch":3,"loss":0.5,"ok":true,"phase":"train"}"#);
    assert_eq!(serde_json::from_str::<MetricMap>(&json).unwrap(), batch);
}

#[test]
fn stepped_values_serialize_as_records() {
    let store = MemoryReporter::new();
    store.clone().stepped().report_all(7, metrics! { "acc" => 0.75 }).unwrap();

    let stored = store.memory_reader().read(&"acc".into()).unwrap();

    assert_eq!(
        serde_json::to_value(&stored).unwrap(),
        serde_json::json!([{ "step": 7, "value": 0.75 }])
    );
}

#[test]
fn integers_stay_integers() {
    assert_eq!(serde_json::from_str::<Metric>("42").unwrap(), Metric::Int(42));
    assert_eq!(serde_json::from_str::<Metric>("42.0").unwrap(), Metric::Float(42.0));
}
