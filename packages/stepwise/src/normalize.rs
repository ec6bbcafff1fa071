use crate::{Error, Metric, Result};

/// Converts a value into a form that every serializing backend can persist.
///
/// The value kinds are checked in a fixed order:
///
/// 1. Numeric scalars are kept. Floats that are not finite are replaced by their string form
///    (`NaN`, `inf`, `-inf`) because common serialization formats cannot express them.
/// 2. A list with exactly one element is replaced by that element, normalized.
/// 3. Other lists and maps are normalized element by element.
/// 4. Anything else is kept as is.
///
/// # Example
///
/// ```
/// use stepwise::{Metric, normalize};
///
/// assert_eq!(normalize(Metric::from(vec![0.5])), Metric::Float(0.5));
/// assert_eq!(normalize(Metric::Float(f64::NAN)), Metric::from("NaN"));
/// ```
#[must_use]
pub fn normalize(value: Metric) -> Metric {
    match value {
        Metric::Float(number) if !number.is_finite() => Metric::Text(number.to_string()),
        Metric::List(values) => match <[Metric; 1]>::try_from(values) {
            Ok([single]) => normalize(single),
            Err(values) => Metric::List(values.into_iter().map(normalize).collect()),
        },
        Metric::Map(entries) => Metric::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Converts a value into a 64-bit float, for backends that can only store floats.
///
/// Integers and floats convert directly, booleans become `0.0` or `1.0`, single-element lists
/// are unwrapped and strings are parsed.
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] if the value has no scalar interpretation, such as a
/// multi-element list, a map or a string that is not a number.
pub fn to_scalar(value: &Metric) -> Result<f64> {
    match value {
        #[expect(
            clippy::cast_precision_loss,
            reason = "scalar consumers accept the nearest float for integers above 2^53"
        )]
        Metric::Int(number) => Ok(*number as f64),
        Metric::Float(number) => Ok(*number),
        Metric::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        Metric::List(values) => match values.as_slice() {
            [single] => to_scalar(single),
            _ => Err(Error::InvalidValue {
                value: value.to_string(),
                problem: format!("expected a scalar but got a list of {} values", values.len()),
            }),
        },
        Metric::Text(text) => text.trim().parse::<f64>().map_err(|e| Error::InvalidValue {
            value: text.clone(),
            problem: e.to_string(),
        }),
        Metric::Map(_) => Err(Error::InvalidValue {
            value: value.to_string(),
            problem: "expected a scalar but got a map".to_string(),
        }),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn scalars_are_kept() {
        assert_eq!(normalize(Metric::Int(3)), Metric::Int(3));
        assert_eq!(normalize(Metric::Float(0.25)), Metric::Float(0.25));
        assert_eq!(normalize(Metric::Bool(true)), Metric::Bool(true));
    }

    #[test]
    fn infinities_become_strings() {
        assert_eq!(normalize(Metric::Float(f64::INFINITY)), Metric::from("inf"));
        assert_eq!(normalize(Metric::Float(f64::NEG_INFINITY)), Metric::from("-inf"));
    }

    #[test]
    fn nested_single_element_lists_unwrap() {
        let value = Metric::from(vec![Metric::from(vec![7])]);

        assert_eq!(normalize(value), Metric::Int(7));
    }

    #[test]
    fn lists_and_maps_normalize_elementwise() {
        let value = Metric::from(vec![
            Metric::from(vec![1]),
            Metric::Float(f64::NAN),
            Metric::from(BTreeMap::from([("x".to_string(), vec![2])])),
        ]);

        let expected = Metric::from(vec![
            Metric::Int(1),
            Metric::from("NaN"),
            Metric::from(BTreeMap::from([("x".to_string(), 2)])),
        ]);

        assert_eq!(normalize(value), expected);
    }

    #[test]
    fn scalar_conversion() {
        assert_eq!(to_scalar(&Metric::Int(2)).unwrap(), 2.0);
        assert_eq!(to_scalar(&Metric::Bool(true)).unwrap(), 1.0);
        assert_eq!(to_scalar(&Metric::from(vec![1.5])).unwrap(), 1.5);
        assert_eq!(to_scalar(&Metric::from(" 4.25 ")).unwrap(), 4.25);
    }

    #[test]
    fn scalar_conversion_rejects_structures() {
        assert!(matches!(
            to_scalar(&Metric::from(vec![1, 2])),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            to_scalar(&Metric::from("fast")),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            to_scalar(&Metric::Map(BTreeMap::new())),
            Err(Error::InvalidValue { .. })
        ));
    }
}
