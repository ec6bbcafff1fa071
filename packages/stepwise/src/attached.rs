use crate::{
    Attachment, KeyedReader, Metric, MetricKey, MetricMap, ParamMap, Placement, ReadMap, Reader,
    Reporter, Result, Step, attach, attach_keys, attach_map, detach,
};

/// A [`Reporter`] that joins an [`Attachment`] onto every key before passing metrics on.
///
/// Created by [`ReporterExt::with_prefix()`][crate::ReporterExt::with_prefix] and
/// [`ReporterExt::with_suffix()`][crate::ReporterExt::with_suffix]. Parameters are passed on
/// unchanged.
#[derive(Debug)]
pub struct AttachedReporter<R> {
    base: R,
    attachment: Attachment,
    placement: Placement,
}

impl<R> AttachedReporter<R> {
    /// Wraps `base`, attaching `attachment` at `placement` to every reported key.
    #[must_use]
    pub fn new(base: R, attachment: Attachment, placement: Placement) -> Self {
        Self {
            base,
            attachment,
            placement,
        }
    }

    /// The reporter that receives the attached keys.
    #[must_use]
    pub fn base(&self) -> &R {
        &self.base
    }
}

impl<R> Reporter for AttachedReporter<R>
where
    R: Reporter,
{
    fn report_all(&self, step: Step, metrics: MetricMap) -> Result<()> {
        self.base
            .report_all(step, attach_map(metrics, &self.attachment, self.placement))
    }

    fn report(&self, step: Step, key: MetricKey, value: Metric) -> Result<()> {
        self.base
            .report(step, attach(&key, &self.attachment, self.placement), value)
    }

    fn report_params(&self, params: ParamMap) -> Result<()> {
        self.base.report_params(params)
    }

    fn report_param(&self, key: &str, value: Metric) -> Result<()> {
        self.base.report_param(key, value)
    }

    fn reader(&self) -> Option<Box<dyn Reader>> {
        let base = self.base.reader()?;

        Some(Box::new(AttachedReader::new(
            base,
            self.attachment.clone(),
            self.placement,
        )))
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}

/// A [`Reader`] that joins an [`Attachment`] onto every requested key before querying the
/// reader it wraps.
///
/// Results are keyed by the keys the caller asked for, not the attached ones.
///
/// # Example
///
/// ```
/// use stepwise::{MemoryReporter, Metric, Reader, ReaderExt, Reporter};
///
/// let store = MemoryReporter::new();
/// store.report(0, "eval.loss".into(), Metric::from(0.4)).unwrap();
///
/// let eval = store.memory_reader().with_prefix("eval");
/// let values = eval.read_all(&["loss".into()]).unwrap();
///
/// assert_eq!(values["loss"], vec![Metric::from(0.4)]);
/// ```
#[derive(Debug)]
pub struct AttachedReader<R> {
    base: R,
    attachment: Attachment,
    placement: Placement,
}

impl<R> AttachedReader<R> {
    /// Wraps `base`, attaching `attachment` at `placement` to every requested key.
    #[must_use]
    pub fn new(base: R, attachment: Attachment, placement: Placement) -> Self {
        Self {
            base,
            attachment,
            placement,
        }
    }
}

impl<R> Reader for AttachedReader<R>
where
    R: Reader,
{
    fn read_all(&self, keys: &[MetricKey]) -> Result<ReadMap> {
        let attached = attach_keys(keys, &self.attachment, self.placement);
        let values = self.base.read_all(&attached)?;

        // The same key may be requested twice, so values are cloned rather than moved out.
        Ok(keys
            .iter()
            .zip(&attached)
            .map(|(key, attached_key)| {
                (
                    key.clone(),
                    values.get(attached_key).cloned().unwrap_or_default(),
                )
            })
            .collect())
    }

    fn read(&self, key: &MetricKey) -> Result<Vec<Metric>> {
        self.base
            .read(&attach(key, &self.attachment, self.placement))
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}

impl<R> KeyedReader for AttachedReader<R>
where
    R: KeyedReader,
{
    /// Returns the keys of the wrapped reader that carry the attachment, with the attachment
    /// removed.
    fn keys(&self) -> Result<Vec<MetricKey>> {
        Ok(self
            .base
            .keys()?
            .iter()
            .filter_map(|key| detach(key, &self.attachment, self.placement))
            .collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use mockall::predicate::eq;

    use super::*;
    use crate::{
        Error, LambdaReader, MemoryReporter, MockReporter, ReaderExt, ReporterExt, metrics, params,
    };

    #[test]
    fn prefixes_batch_keys() {
        let mut mock = MockReporter::new();
        mock.expect_report_all()
            .with(eq(2), eq(metrics! { "train.loss" => 1, "train.acc" => 2 }))
            .times(1)
            .returning(|_, _| Ok(()));

        mock.with_prefix("train")
            .report_all(2, metrics! { "loss" => 1, "acc" => 2 })
            .unwrap();
    }

    #[test]
    fn suffixes_single_keys() {
        let mut mock = MockReporter::new();
        mock.expect_report()
            .with(eq(0), eq(MetricKey::from("loss.eval")), eq(Metric::Int(1)))
            .times(1)
            .returning(|_, _, _| Ok(()));

        mock.with_suffix("eval")
            .report(0, "loss".into(), Metric::Int(1))
            .unwrap();
    }

    #[test]
    fn params_are_not_attached() {
        let mut mock = MockReporter::new();
        mock.expect_report_params()
            .with(eq(params! { "seed" => 3 }))
            .times(1)
            .returning(|_| Ok(()));

        mock.with_prefix("train")
            .report_params(params! { "seed" => 3 })
            .unwrap();
    }

    #[test]
    fn close_is_forwarded() {
        let mut mock = MockReporter::new();
        mock.expect_close().times(1).returning(|| Ok(()));

        mock.with_prefix("x").close().unwrap();
    }

    #[test]
    fn reader_is_attached_the_same_way() {
        let store = MemoryReporter::new();
        let train = store.clone().with_prefix("train");

        train.report(0, "loss".into(), Metric::Int(5)).unwrap();

        let reader = train.reader().unwrap();
        assert_eq!(reader.read(&"loss".into()).unwrap(), vec![Metric::Int(5)]);
        assert!(store.memory_reader().read(&"loss".into()).unwrap().is_empty());
    }

    #[test]
    fn no_base_reader_means_no_reader() {
        let mut mock = MockReporter::new();
        mock.expect_reader().returning(|| None);

        assert!(mock.with_prefix("x").reader().is_none());
    }

    #[test]
    fn read_all_is_keyed_by_requested_keys() {
        let store = MemoryReporter::new();
        store
            .report_all(0, metrics! { "a.x" => 1, "b.x" => 2, "c" => 3 })
            .unwrap();

        let reader = store.memory_reader().with_suffix("x");
        let values = reader
            .read_all(&["a".into(), "b".into(), "a".into(), "c".into()])
            .unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values["a"], vec![Metric::Int(1)]);
        assert_eq!(values["b"], vec![Metric::Int(2)]);
        assert!(values["c"].is_empty());
    }

    #[test]
    fn keys_are_detached() {
        let store = MemoryReporter::new();
        store
            .report_all(0, metrics! { "eval.loss" => 1, "eval.acc" => 2, "train.loss" => 3 })
            .unwrap();

        let reader = store.memory_reader().with_prefix("eval");

        assert_eq!(
            reader.keys().unwrap(),
            vec![MetricKey::from("acc"), MetricKey::from("loss")]
        );
    }

    #[test]
    fn reader_close_is_forwarded() {
        let closes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&closes);

        let reader = LambdaReader::builder()
            .read_all(|_| Ok(ReadMap::new()))
            .close(move || {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .build()
            .unwrap()
            .with_prefix("train")
            .with_suffix("mean");

        reader.close().unwrap();

        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn reader_close_errors_are_returned() {
        let reader = LambdaReader::builder()
            .read_all(|_| Ok(ReadMap::new()))
            .close(|| Err(Error::backend("connection reset")))
            .build()
            .unwrap()
            .with_prefix("train")
            .with_suffix("mean");

        let error = reader.close().unwrap_err();

        assert!(matches!(error, Error::Backend(_)));
        assert_eq!(error.to_string(), "connection reset");
    }
}
