mod chunks_iterator;
mod contiguous_indices_iterator;
mod contiguous_linearised_indices_iterator;
mod indices_iterator;

pub use chunks_iterator::ChunksIterator;
pub(crate) use contiguous_indices_iterator::ContiguousIndicesIterator;
pub use contiguous_linearised_indices_iterator::ContiguousLinearisedIndicesIterator;
pub use indices_iterator::IndicesIterator;

#[cfg(test)]
mod tests {
    use crate::array_subset::ArraySubset;

    #[test]
    fn array_subset_iter_indices() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        let mut iter = subset.iter_indices();
        assert_eq!(iter.size_hint(), (4, Some(4)));
        assert_eq!(iter.next(), Some(vec![1, 1]));
        assert_eq!(iter.next(), Some(vec![1, 2]));
        assert_eq!(iter.next(), Some(vec![2, 1]));
        assert_eq!(iter.next(), Some(vec![2, 2]));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn array_subset_iter_indices_empty_and_scalar() {
        let subset = ArraySubset::new_with_ranges(&[1..1, 1..3]);
        assert_eq!(subset.iter_indices().next(), None);
        let scalar = ArraySubset::new_with_shape(vec![]);
        let mut iter = scalar.iter_indices();
        assert_eq!(iter.next(), Some(vec![]));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn array_subset_iter_contiguous_indices() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        let mut iter = super::ContiguousIndicesIterator::new(&subset, &[4, 4]);
        assert_eq!(iter.size_hint(), (2, Some(2)));
        assert_eq!(iter.next(), Some((vec![1, 1], 2)));
        assert_eq!(iter.next(), Some((vec![2, 1], 2)));
        assert_eq!(iter.next(), None);

        let subset = ArraySubset::new_with_ranges(&[1..3, 0..4]);
        let mut iter = super::ContiguousLinearisedIndicesIterator::new(&subset, &[4, 4]);
        assert_eq!(iter.next(), Some((4, 8)));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn array_subset_iter_chunks() {
        let subset = ArraySubset::new_with_ranges(&[1..5, 1..5]);
        let mut iter = subset.iter_chunks(&[2, 2]).unwrap();
        assert_eq!(
            iter.next(),
            Some((vec![0, 0], ArraySubset::new_with_ranges(&[0..2, 0..2])))
        );
        assert_eq!(
            iter.next(),
            Some((vec![0, 1], ArraySubset::new_with_ranges(&[0..2, 2..4])))
        );
        assert_eq!(iter.size_hint(), (7, Some(7)));
        assert!(subset.iter_chunks(&[2]).is_err());
        assert!(subset.iter_chunks(&[2, 0]).is_err());
    }
}
