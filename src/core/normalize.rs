//! Input normalization: sequences, maps and iterators become one ordered
//! `Vec` plus a [`Shape`] that restores the caller's shape on output.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// A collection the engine can schedule over.
pub trait IntoIndexed {
    /// Per-item value handed to the worker.
    type Item;
    /// Reassembly state kept while the items are in flight.
    type Shape;

    /// Split into ordered items and the shape needed to put results back.
    fn into_indexed(self) -> (Vec<Self::Item>, Self::Shape);
}

/// Inverse of [`IntoIndexed::into_indexed`] for results of type `R`.
pub trait Shape<R> {
    /// The reassembled collection.
    type Output;

    /// Rebuild the collection from results ordered like the input items.
    fn reassemble(self, results: Vec<R>) -> Self::Output;
}

/// Shape of an ordered sequence. Results pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeqShape;

impl<R> Shape<R> for SeqShape {
    type Output = Vec<R>;

    fn reassemble(self, results: Vec<R>) -> Vec<R> {
        results
    }
}

/// Keys of a [`HashMap`] input, in the order their values were scheduled.
#[derive(Debug, Clone)]
pub struct HashMapShape<K, S> {
    keys: Vec<K>,
    hasher: S,
}

impl<K, R, S> Shape<R> for HashMapShape<K, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Output = HashMap<K, R, S>;

    fn reassemble(self, results: Vec<R>) -> Self::Output {
        let mut out = HashMap::with_capacity_and_hasher(self.keys.len(), self.hasher);
        out.extend(self.keys.into_iter().zip(results));
        out
    }
}

/// Keys of a [`BTreeMap`] input, in ascending order.
#[derive(Debug, Clone)]
pub struct BTreeMapShape<K> {
    keys: Vec<K>,
}

impl<K: Ord, R> Shape<R> for BTreeMapShape<K> {
    type Output = BTreeMap<K, R>;

    fn reassemble(self, results: Vec<R>) -> Self::Output {
        self.keys.into_iter().zip(results).collect()
    }
}

impl<T> IntoIndexed for Vec<T> {
    type Item = T;
    type Shape = SeqShape;

    fn into_indexed(self) -> (Vec<T>, SeqShape) {
        (self, SeqShape)
    }
}

impl<T, const N: usize> IntoIndexed for [T; N] {
    type Item = T;
    type Shape = SeqShape;

    fn into_indexed(self) -> (Vec<T>, SeqShape) {
        (Vec::from(self), SeqShape)
    }
}

impl<K, T, S> IntoIndexed for HashMap<K, T, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    type Item = T;
    type Shape = HashMapShape<K, S>;

    fn into_indexed(self) -> (Vec<T>, Self::Shape) {
        let (keys, items) = self.into_iter().unzip();
        (
            items,
            HashMapShape {
                keys,
                hasher: S::default(),
            },
        )
    }
}

impl<K: Ord, T> IntoIndexed for BTreeMap<K, T> {
    type Item = T;
    type Shape = BTreeMapShape<K>;

    fn into_indexed(self) -> (Vec<T>, Self::Shape) {
        let (keys, items) = self.into_iter().unzip();
        (items, BTreeMapShape { keys })
    }
}

/// Pull-based input, drained eagerly before scheduling.
///
/// The engine does not stream: an iterator that never ends is never fully
/// drained, and the operation never starts.
#[derive(Debug, Clone)]
pub struct Drain<I>(pub I);

impl<I: IntoIterator> IntoIndexed for Drain<I> {
    type Item = I::Item;
    type Shape = SeqShape;

    fn into_indexed(self) -> (Vec<I::Item>, SeqShape) {
        (self.0.into_iter().collect(), SeqShape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_round_trip_is_identity() {
        let (items, shape) = vec![1, 2, 3].into_indexed();
        assert_eq!(items, vec![1, 2, 3]);
        let out: Vec<String> = shape.reassemble(items.iter().map(ToString::to_string).collect());
        assert_eq!(out, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_hash_map_keys_follow_values() {
        let input: HashMap<&str, i32> = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        let (items, shape) = input.into_indexed();
        let doubled: Vec<i32> = items.iter().map(|v| v * 10).collect();
        let out = shape.reassemble(doubled);
        assert_eq!(out.len(), 3);
        assert_eq!(out["a"], 10);
        assert_eq!(out["b"], 20);
        assert_eq!(out["c"], 30);
    }

    #[test]
    fn test_btree_map_order() {
        let input: BTreeMap<u8, char> = [(3, 'c'), (1, 'a'), (2, 'b')].into_iter().collect();
        let (items, shape) = input.into_indexed();
        assert_eq!(items, vec!['a', 'b', 'c']);
        let out = shape.reassemble(items.into_iter().map(|c| c.to_ascii_uppercase()).collect());
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec![(1, 'A'), (2, 'B'), (3, 'C')]);
    }

    #[test]
    fn test_drain_iterator() {
        let (items, _) = Drain((0..4).map(|n| n * n)).into_indexed();
        assert_eq!(items, vec![0, 1, 4, 9]);
    }

    #[test]
    fn test_empty_map() {
        let (items, shape) = HashMap::<String, u8>::new().into_indexed();
        assert!(items.is_empty());
        let out: HashMap<String, u8> = shape.reassemble(Vec::new());
        assert!(out.is_empty());
    }
}
