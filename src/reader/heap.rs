/// Binary min-heap of session positions under a fallible ordering.
///
/// `less(a, b)` must be a strict total order; callers break key ties by
/// position so that equal keys always pop in the same order.
#[derive(Debug, Default)]
pub(crate) struct IndexHeap {
    items: Vec<usize>,
}

impl IndexHeap {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn peek(&self) -> Option<usize> {
        self.items.first().copied()
    }

    pub(crate) fn push<E, F>(&mut self, item: usize, mut less: F) -> Result<(), E>
    where
        F: FnMut(usize, usize) -> Result<bool, E>,
    {
        self.items.push(item);
        let mut child = self.items.len() - 1;
        while child > 0 {
            let parent = (child - 1) / 2;
            if !less(self.items[child], self.items[parent])? {
                break;
            }
            self.items.swap(child, parent);
            child = parent;
        }
        Ok(())
    }

    pub(crate) fn pop<E, F>(&mut self, less: F) -> Result<Option<usize>, E>
    where
        F: FnMut(usize, usize) -> Result<bool, E>,
    {
        if self.items.is_empty() {
            return Ok(None);
        }
        let top = self.items.swap_remove(0);
        self.sift_down(less)?;
        Ok(Some(top))
    }

    /// Restore the heap after the top item's key grew.
    pub(crate) fn sift_down<E, F>(&mut self, mut less: F) -> Result<(), E>
    where
        F: FnMut(usize, usize) -> Result<bool, E>,
    {
        let len = self.items.len();
        let mut parent = 0;
        loop {
            let left = 2 * parent + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut least = left;
            if right < len && less(self.items[right], self.items[left])? {
                least = right;
            }
            if !less(self.items[least], self.items[parent])? {
                break;
            }
            self.items.swap(parent, least);
            parent = least;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::IndexHeap;

    #[test]
    fn pops_in_key_then_position_order() {
        let keys = [5, 1, 5, 3, 1, 9];
        let less = |a: usize, b: usize| Ok::<_, Infallible>((keys[a], a) < (keys[b], b));

        let mut heap = IndexHeap::with_capacity(keys.len());
        for position in 0..keys.len() {
            heap.push(position, less).unwrap();
        }
        assert_eq!(heap.len(), 6);

        let mut order = Vec::new();
        while let Some(position) = heap.pop(less).unwrap() {
            order.push(position);
        }
        assert_eq!(order, vec![1, 4, 3, 0, 2, 5]);
        assert!(heap.is_empty());
    }

    #[test]
    fn sift_down_after_top_advances() {
        let mut keys = vec![1, 2, 3];
        let mut heap = IndexHeap::default();
        for position in 0..3 {
            let keys = &keys;
            heap.push(position, |a: usize, b: usize| {
                Ok::<_, Infallible>((keys[a], a) < (keys[b], b))
            })
            .unwrap();
        }
        keys[0] = 10;
        let keys = &keys;
        heap.sift_down(|a: usize, b: usize| Ok::<_, Infallible>((keys[a], a) < (keys[b], b)))
            .unwrap();
        assert_eq!(heap.peek(), Some(1));
    }

    #[test]
    fn comparison_errors_propagate() {
        let mut heap = IndexHeap::default();
        heap.push(0, |_, _| Ok::<_, &str>(true)).unwrap();
        assert_eq!(heap.push(1, |_, _| Err("boom")), Err("boom"));
    }
}
