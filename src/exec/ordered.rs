//! Ordered error aggregation
//!
//! Concurrent workers may fail in any order. The aggregator keeps only the
//! failure with the lowest task index, so the error surfaced to the caller does
//! not depend on scheduling.

use parking_lot::Mutex;

/// The failure of the lowest task index observed so far
#[derive(Debug)]
pub struct OrderedError<E> {
    slot: Option<(usize, E)>,
}

impl<E> OrderedError<E> {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Record `err` for task `index`.
    ///
    /// The stored error is replaced only when nothing is stored yet or `index`
    /// is strictly lower than the stored index.
    pub fn set(&mut self, index: usize, err: E) {
        match &self.slot {
            Some((current, _)) if *current <= index => {}
            _ => self.slot = Some((index, err)),
        }
    }

    /// Index of the stored failure, if any
    pub fn index(&self) -> Option<usize> {
        self.slot.as_ref().map(|(index, _)| *index)
    }

    /// Whether a failure has been recorded
    pub fn is_set(&self) -> bool {
        self.slot.is_some()
    }

    /// Consume the aggregator, yielding `Err` with the lowest-index error
    pub fn into_result(self) -> Result<(), E> {
        match self.slot {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

impl<E> Default for OrderedError<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-guarded [`OrderedError`] shared by the workers of one executor call
#[derive(Debug)]
pub struct ErrorSlot<E> {
    inner: Mutex<OrderedError<E>>,
}

impl<E> ErrorSlot<E> {
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(OrderedError::new()),
        }
    }

    /// Report the outcome of task `index`. `Ok` outcomes are ignored.
    pub fn report(&self, index: usize, outcome: Result<(), E>) {
        if let Err(err) = outcome {
            self.inner.lock().set(index, err);
        }
    }

    /// Index of the lowest failure reported so far
    pub fn failed_index(&self) -> Option<usize> {
        self.inner.lock().index()
    }

    /// Move the aggregated outcome out, leaving the slot empty
    pub fn take(&self) -> Result<(), E> {
        std::mem::take(&mut *self.inner.lock()).into_result()
    }
}

impl<E> Default for ErrorSlot<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_ok() {
        let agg: OrderedError<&str> = OrderedError::new();
        assert!(!agg.is_set());
        assert_eq!(agg.index(), None);
        assert_eq!(agg.into_result(), Ok(()));
    }

    #[test]
    fn test_lowest_index_wins() {
        let mut agg = OrderedError::new();
        agg.set(7, "seven");
        agg.set(3, "three");
        agg.set(5, "five");
        assert_eq!(agg.index(), Some(3));
        assert_eq!(agg.into_result(), Err("three"));
    }

    #[test]
    fn test_equal_index_keeps_first() {
        let mut agg = OrderedError::new();
        agg.set(4, "first");
        agg.set(4, "second");
        assert_eq!(agg.into_result(), Err("first"));
    }

    #[test]
    fn test_slot_ignores_success() {
        let slot = ErrorSlot::new();
        slot.report(0, Ok(()));
        slot.report(9, Err("nine"));
        slot.report(1, Ok(()));
        assert_eq!(slot.failed_index(), Some(9));
        slot.report(2, Err("two"));
        assert_eq!(slot.take(), Err("two"));
        assert_eq!(slot.take(), Ok(()));
    }

    #[test]
    fn test_slot_concurrent_reports() {
        let slot = std::sync::Arc::new(ErrorSlot::new());
        let handles: Vec<_> = (0..16usize)
            .rev()
            .map(|i| {
                let slot = slot.clone();
                std::thread::spawn(move || slot.report(i + 10, Err(i + 10)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(slot.failed_index(), Some(10));
        assert_eq!(slot.take(), Err(10));
    }
}
