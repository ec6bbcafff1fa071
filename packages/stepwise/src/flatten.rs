use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::{Error, Metric, Result};

/// Flattens nested [`Metric::Map`] values into a single-level map whose keys are the nested
/// paths joined with `separator`.
///
/// Backends that only accept flat parameter maps use this before persisting run parameters.
/// Common separators are `.` and `:`.
///
/// Flattening is idempotent and an already-flat map is returned unchanged. Nested maps
/// without entries contribute nothing to the output.
///
/// # Errors
///
/// Returns [`Error::KeyCollision`] if two different paths produce the same flattened key,
/// e.g. `{"a": {"b": 1}, "a.b": 2}` with a `.` separator.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// use stepwise::{Metric, flatten, params};
///
/// let nested = params! {
///     "optimizer" => BTreeMap::from([
///         ("name".to_string(), Metric::from("adam")),
///         ("lr".to_string(), Metric::from(0.01)),
///     ]),
///     "seed" => 7,
/// };
///
/// let flat = flatten(&nested, ":").unwrap();
///
/// assert_eq!(flat["optimizer:name"], Metric::from("adam"));
/// assert_eq!(flat["optimizer:lr"], Metric::from(0.01));
/// assert_eq!(flat["seed"], Metric::from(7));
/// ```
pub fn flatten(
    map: &BTreeMap<String, Metric>,
    separator: &str,
) -> Result<BTreeMap<String, Metric>> {
    let mut flat = BTreeMap::new();
    flatten_into(&mut flat, None, map, separator)?;
    Ok(flat)
}

fn flatten_into(
    flat: &mut BTreeMap<String, Metric>,
    parent: Option<&str>,
    map: &BTreeMap<String, Metric>,
    separator: &str,
) -> Result<()> {
    for (key, value) in map {
        let path = match parent {
            Some(parent) => format!("{parent}{separator}{key}"),
            None => key.clone(),
        };

        if let Metric::Map(nested) = value {
            flatten_into(flat, Some(&path), nested, separator)?;
            continue;
        }

        match flat.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
            }
            Entry::Occupied(entry) => {
                return Err(Error::KeyCollision {
                    key: entry.key().clone(),
                });
            }
        }
    }

    Ok(())
}
