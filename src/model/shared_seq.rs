// The one mutable collection both execution contexts touch: bars within a
// track, tracks within a song. A single mutex guards every structural
// operation; readers take a snapshot of the Arc pointers under the lock and
// release it before doing any real work, so the audio callback never waits
// behind a UI redraw for longer than a pointer copy.

use std::sync::{Arc, Mutex};

pub struct SharedSeq<T> {
    items: Mutex<Vec<Arc<T>>>,
}

impl<T> SharedSeq<T> {
    pub fn new() -> Self {
        SharedSeq {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Append and return the index the item landed at.
    pub fn push(&self, item: Arc<T>) -> usize {
        let mut items = self.items.lock().unwrap();
        items.push(item);
        items.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.lock().unwrap().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.lock().unwrap().clone()
    }

    pub fn remove(&self, index: usize) -> Option<Arc<T>> {
        let mut items = self.items.lock().unwrap();
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    /// Index of the first item matching the predicate.
    pub fn position(&self, mut pred: impl FnMut(&Arc<T>) -> bool) -> Option<usize> {
        self.items.lock().unwrap().iter().position(|x| pred(x))
    }

    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }
}

impl<T> Default for SharedSeq<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_reports_index() {
        let seq = SharedSeq::new();
        assert_eq!(seq.push(Arc::new(10)), 0);
        assert_eq!(seq.push(Arc::new(20)), 1);
        assert_eq!(*seq.get(1).unwrap(), 20);
        assert_eq!(seq.get(2), None);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let seq = SharedSeq::new();
        seq.push(Arc::new(1));
        let snap = seq.snapshot();
        seq.push(Arc::new(2));
        assert_eq!(snap.len(), 1);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn remove_shifts_later_items() {
        let seq = SharedSeq::new();
        seq.push(Arc::new(1));
        seq.push(Arc::new(2));
        seq.push(Arc::new(3));
        assert_eq!(*seq.remove(0).unwrap(), 1);
        assert_eq!(*seq.get(0).unwrap(), 2);
        assert!(seq.remove(5).is_none());
    }
}
