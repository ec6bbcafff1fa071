use std::borrow::{Borrow, Cow};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Position of a measurement on a timeline, such as a training iteration.
///
/// Steps are non-negative by convention but this is not enforced.
pub type Step = i64;

/// A batch of metrics, as accepted by [`Reporter::report_all()`][crate::Reporter::report_all].
pub type MetricMap = BTreeMap<MetricKey, Metric>;

/// The result of [`Reader::read_all()`][crate::Reader::read_all]: every requested key mapped to
/// the values recorded for it, in the order they were recorded.
pub type ReadMap = BTreeMap<MetricKey, Vec<Metric>>;

/// Run-level parameters, as accepted by
/// [`Reporter::report_params()`][crate::Reporter::report_params].
pub type ParamMap = BTreeMap<String, Metric>;

/// Identifies a measured quantity.
///
/// Keys are strings. Non-string keys such as integers are converted to their decimal string
/// form, so `MetricKey::from(7)` and `MetricKey::from("7")` identify the same metric. The same
/// conversion applies when writing and when reading, so a key can be queried using the value
/// it was reported with.
///
/// # Example
///
/// ```
/// use stepwise::MetricKey;
///
/// assert_eq!(MetricKey::from(7), MetricKey::from("7"));
/// assert_eq!(MetricKey::from("loss").as_str(), "loss");
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct MetricKey(Cow<'static, str>);

impl MetricKey {
    /// Creates a key from a static string without allocating.
    #[must_use]
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    /// The string form of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MetricKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for MetricKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for MetricKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MetricKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for MetricKey {
    fn from(value: &str) -> Self {
        Self(Cow::Owned(value.to_owned()))
    }
}

impl From<&String> for MetricKey {
    fn from(value: &String) -> Self {
        Self(Cow::Owned(value.clone()))
    }
}

impl From<String> for MetricKey {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for MetricKey {
    fn from(value: Cow<'static, str>) -> Self {
        Self(value)
    }
}

impl From<&MetricKey> for MetricKey {
    fn from(value: &MetricKey) -> Self {
        value.clone()
    }
}

macro_rules! key_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for MetricKey {
                fn from(value: $t) -> Self {
                    Self(Cow::Owned(value.to_string()))
                }
            }
        )*
    };
}

key_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// The value of a metric at one step.
///
/// No fixed numeric type is assumed. Backends that can only store some kinds of values
/// (e.g. 64-bit floats) convert via [`to_scalar()`][crate::to_scalar] and reject what does
/// not fit.
///
/// Narrow numeric types are widened on conversion: `f32` becomes `f64` and all integer types
/// that fit become `i64`. Unsigned values too large for `i64` are kept in their string form.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
#[allow(
    clippy::exhaustive_enums,
    reason = "the set of value kinds is part of the data model and callers match on it"
)]
pub enum Metric {
    /// A boolean flag.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// A 64-bit floating point number.
    Float(f64),

    /// A string.
    Text(String),

    /// An ordered sequence of values.
    List(Vec<Metric>),

    /// A string-keyed record of values, e.g. the output of
    /// [`stepped()`][crate::ReporterExt::stepped].
    Map(BTreeMap<String, Metric>),
}

impl Metric {
    /// Returns the numeric value as `f64`, if this is an integer or a float.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "integers above 2^53 losing precision is accepted for float-only consumers"
    )]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the record, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this is an integer or a float.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::List(values) => {
                f.write_str("[")?;

                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }

                    write!(f, "{value}")?;
                }

                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;

                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }

                    write!(f, "{key}: {value}")?;
                }

                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Metric {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! metric_from_lossless_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Metric {
                fn from(value: $t) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

metric_from_lossless_integer!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! metric_from_wide_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Metric {
                fn from(value: $t) -> Self {
                    i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Int)
                }
            }
        )*
    };
}

metric_from_wide_integer!(u64, usize, isize);

impl From<f32> for Metric {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Metric {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Metric {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Metric {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T> From<Vec<T>> for Metric
where
    T: Into<Self>,
{
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T> From<BTreeMap<String, T>> for Metric
where
    T: Into<Self>,
{
    fn from(value: BTreeMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Builds a [`MetricMap`] from `key => value` pairs.
///
/// Keys may be anything convertible into a [`MetricKey`] and values anything convertible
/// into a [`Metric`], so differently typed values can be mixed in one batch.
///
/// # Example
///
/// ```
/// use stepwise::{Metric, metrics};
///
/// let batch = metrics! { "loss" => 0.25, "epoch" => 3, "phase" => "train" };
///
/// assert_eq!(batch.len(), 3);
/// assert_eq!(batch["epoch"], Metric::Int(3));
/// ```
#[macro_export]
macro_rules! metrics {
    () => {
        $crate::MetricMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::MetricMap::from([
            $(($crate::MetricKey::from($key), $crate::Metric::from($value))),+
        ])
    };
}

/// Builds a [`ParamMap`] from `name => value` pairs.
///
/// # Example
///
/// ```
/// use stepwise::params;
///
/// let run = params! { "learning_rate" => 0.01, "optimizer" => "adam" };
///
/// assert_eq!(run.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::ParamMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::ParamMap::from([
            $((::std::string::String::from($key), $crate::Metric::from($value))),+
        ])
    };
}
