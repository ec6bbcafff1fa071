//! Joining prefixes and suffixes onto metric keys.

use std::collections::BTreeMap;

use crate::{MetricKey, MetricMap};

/// Joins attachment segments and keys.
pub const SEPARATOR: &str = ".";

/// Where an [`Attachment`] is joined onto a key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[allow(
    clippy::exhaustive_enums,
    reason = "a key only has two ends to attach to"
)]
pub enum Placement {
    /// Segments go before the key: `train.loss`.
    Prefix,

    /// Segments go after the key: `loss.train`.
    Suffix,
}

/// A namespace for metric keys, made of zero or more segments.
///
/// Attachments are joined onto keys with [`SEPARATOR`]. An attachment with no segments is
/// the identity transform, and so is one made only of empty strings, such as `""`. Otherwise
/// every segment is kept, so `["a", "", "b"]` joins as `a..b`.
///
/// The separator is not escaped. A key that already contains `.` cannot be told apart from
/// a key with an attachment after joining.
///
/// # Example
///
/// ```
/// use stepwise::{Attachment, MetricKey, Placement, attach};
///
/// let key = MetricKey::from("loss");
///
/// assert_eq!(attach(&key, &"train".into(), Placement::Prefix), "train.loss");
/// assert_eq!(attach(&key, &vec!["eval", "top1"].into(), Placement::Suffix), "loss.eval.top1");
/// assert_eq!(attach(&key, &Attachment::none(), Placement::Prefix), "loss");
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Attachment {
    segments: Vec<String>,
}

impl Attachment {
    /// An attachment without segments.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates an attachment from an ordered sequence of segments.
    ///
    /// If every segment is empty the result is [`Attachment::none()`].
    #[must_use]
    pub fn new<S>(segments: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        let mut segments = segments.into_iter().map(Into::into).collect::<Vec<String>>();

        if segments.iter().all(String::is_empty) {
            segments.clear();
        }

        Self { segments }
    }

    /// Whether this attachment leaves keys unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments of the attachment, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    fn joined(&self) -> String {
        self.segments.join(SEPARATOR)
    }
}

impl From<&str> for Attachment {
    fn from(value: &str) -> Self {
        Self::new([value])
    }
}

impl From<String> for Attachment {
    fn from(value: String) -> Self {
        Self::new([value])
    }
}

impl From<Vec<&str>> for Attachment {
    fn from(value: Vec<&str>) -> Self {
        Self::new(value)
    }
}

impl From<Vec<String>> for Attachment {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl<const N: usize> From<[&str; N]> for Attachment {
    fn from(value: [&str; N]) -> Self {
        Self::new(value)
    }
}

impl<T> From<Option<T>> for Attachment
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::none, Into::into)
    }
}

/// Joins the attachment onto the key.
#[must_use]
pub fn attach(key: &MetricKey, attachment: &Attachment, placement: Placement) -> MetricKey {
    if attachment.is_empty() {
        return key.clone();
    }

    let joined = attachment.joined();

    match placement {
        Placement::Prefix => format!("{joined}{SEPARATOR}{key}").into(),
        Placement::Suffix => format!("{key}{SEPARATOR}{joined}").into(),
    }
}

/// Removes the attachment from a key that carries it.
///
/// Returns `None` if the key does not carry the attachment at the indicated end.
#[must_use]
pub fn detach(key: &MetricKey, attachment: &Attachment, placement: Placement) -> Option<MetricKey> {
    if attachment.is_empty() {
        return Some(key.clone());
    }

    let joined = attachment.joined();

    let stripped = match placement {
        Placement::Prefix => key
            .as_str()
            .strip_prefix(joined.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR)),
        Placement::Suffix => key
            .as_str()
            .strip_suffix(joined.as_str())
            .and_then(|rest| rest.strip_suffix(SEPARATOR)),
    };

    stripped.map(MetricKey::from)
}

/// Joins the attachment onto every key in the slice.
#[must_use]
pub fn attach_keys(keys: &[MetricKey], attachment: &Attachment, placement: Placement) -> Vec<MetricKey> {
    keys.iter()
        .map(|key| attach(key, attachment, placement))
        .collect()
}

/// Joins the attachment onto every key of the map, keeping the values.
#[must_use]
pub fn attach_map<V>(
    map: BTreeMap<MetricKey, V>,
    attachment: &Attachment,
    placement: Placement,
) -> BTreeMap<MetricKey, V> {
    if attachment.is_empty() {
        return map;
    }

    map.into_iter()
        .map(|(key, value)| (attach(&key, attachment, placement), value))
        .collect()
}

/// Merges several labeled batches into one, attaching each label to the keys of its batch.
///
/// If two labeled batches produce the same key, the batch that comes later wins.
///
/// # Example
///
/// ```
/// use stepwise::{Metric, Placement, attach_many, metrics};
///
/// let merged = attach_many(
///     [("train", metrics! { "loss" => 0.5 }), ("test", metrics! { "loss" => 0.7 })],
///     Placement::Prefix,
/// );
///
/// assert_eq!(merged["train.loss"], Metric::Float(0.5));
/// assert_eq!(merged["test.loss"], Metric::Float(0.7));
/// ```
pub fn attach_many<A>(labeled: impl IntoIterator<Item = (A, MetricMap)>, placement: Placement) -> MetricMap
where
    A: Into<Attachment>,
{
    let mut merged = MetricMap::new();

    for (label, batch) in labeled {
        merged.extend(attach_map(batch, &label.into(), placement));
    }

    merged
}

/// [`attach_many()`] with the labels used as prefixes.
pub fn by_prefix<A>(labeled: impl IntoIterator<Item = (A, MetricMap)>) -> MetricMap
where
    A: Into<Attachment>,
{
    attach_many(labeled, Placement::Prefix)
}

/// [`attach_many()`] with the labels used as suffixes.
pub fn by_suffix<A>(labeled: impl IntoIterator<Item = (A, MetricMap)>) -> MetricMap
where
    A: Into<Attachment>,
{
    attach_many(labeled, Placement::Suffix)
}
