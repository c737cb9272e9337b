#![forbid(unsafe_code)]

use crate::error::Error;
use std::sync::Mutex;

/// A shared accumulator. Items can only be added one at a time or taken all
/// at once, so a reader never observes a partial batch.
#[derive(Debug)]
pub struct Batch<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Batch<T> {
    pub fn add(&self, item: T) {
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.push(item);
    }

    pub fn len(&self) -> usize {
        match self.items.lock() {
            Ok(items) => items.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything accumulated so far.
    pub fn take(&self) -> Vec<T> {
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *items)
    }
}

/// Errors collected during a run or against a result.
pub type Errs = Batch<Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn take_clears() {
        let batch = Batch::default();
        batch.add(1);
        batch.add(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.take(), vec![1, 2]);
        assert!(batch.take().is_empty());
        assert!(batch.is_empty());
    }

    #[test]
    fn concurrent_adds_are_all_taken() {
        let batch = Arc::new(Batch::default());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let batch = Arc::clone(&batch);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        batch.add(t * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let mut items = batch.take();
        items.sort();
        items.dedup();
        assert_eq!(items.len(), 1000);
    }
}
