use std::rc::Rc;
use std::slice;

use crate::{AttachedReader, Attachment, Metric, MetricKey, Placement, ReadMap, Result};

/// Retrieves metrics previously persisted by a matching [`Reporter`][crate::Reporter].
///
/// [`read_all()`][Self::read_all] is the one method an implementation must provide. The
/// single-key [`read()`][Self::read] is defined in terms of it, though implementations may
/// override it with something more direct.
///
/// Every requested key is present in the result of `read_all()`. Keys the store knows nothing
/// about map to an empty list.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Metric, Reader, Reporter};
///
/// let reporter = MemoryReporter::new();
/// reporter.report(0, "loss".into(), Metric::from(0.9)).unwrap();
/// reporter.report(1, "loss".into(), Metric::from(0.7)).unwrap();
///
/// let reader = reporter.memory_reader();
///
/// assert_eq!(
///     reader.read(&"loss".into()).unwrap(),
///     vec![Metric::from(0.9), Metric::from(0.7)]
/// );
/// assert!(reader.read(&"accuracy".into()).unwrap().is_empty());
/// ```
pub trait Reader {
    /// Returns every value recorded for each of the keys.
    ///
    /// The returned map contains exactly the requested keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn read_all(&self, keys: &[MetricKey]) -> Result<ReadMap>;

    /// Returns every value recorded for the key, or an empty list if there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn read(&self, key: &MetricKey) -> Result<Vec<Metric>> {
        let mut values = self.read_all(slice::from_ref(key))?;
        Ok(values.remove(key).unwrap_or_default())
    }

    /// Releases any resources held by the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource could not be released cleanly.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A [`Reader`] that can enumerate the keys it has values for.
pub trait KeyedReader: Reader {
    /// Returns every key the store has values for.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    fn keys(&self) -> Result<Vec<MetricKey>>;
}

/// Combinators available on every sized [`Reader`].
pub trait ReaderExt: Reader + Sized {
    /// Returns a reader that prefixes every key before querying this reader.
    ///
    /// This is the reading side of [`ReporterExt::with_prefix()`][crate::ReporterExt::with_prefix].
    #[must_use]
    fn with_prefix(self, prefix: impl Into<Attachment>) -> AttachedReader<Self> {
        AttachedReader::new(self, prefix.into(), Placement::Prefix)
    }

    /// Returns a reader that suffixes every key before querying this reader.
    #[must_use]
    fn with_suffix(self, suffix: impl Into<Attachment>) -> AttachedReader<Self> {
        AttachedReader::new(self, suffix.into(), Placement::Suffix)
    }
}

impl<R> ReaderExt for R where R: Reader {}

macro_rules! forward_reader {
    ($($pointer:ty),*) => {
        $(
            impl<R> Reader for $pointer
            where
                R: Reader + ?Sized,
            {
                fn read_all(&self, keys: &[MetricKey]) -> Result<ReadMap> {
                    (**self).read_all(keys)
                }

                fn read(&self, key: &MetricKey) -> Result<Vec<Metric>> {
                    (**self).read(key)
                }

                fn close(&self) -> Result<()> {
                    (**self).close()
                }
            }

            impl<R> KeyedReader for $pointer
            where
                R: KeyedReader + ?Sized,
            {
                fn keys(&self) -> Result<Vec<MetricKey>> {
                    (**self).keys()
                }
            }
        )*
    };
}

forward_reader!(&R, Box<R>, Rc<R>);
