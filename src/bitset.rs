//! Compact set of variable indices.
//!
//! Returned by assignment queries such as
//! [`Bdd::min_assignment_bits`](crate::bdd::Bdd::min_assignment_bits).

use std::fmt;

/// A bit set backed by a vector of u64 words.
///
/// Each bit corresponds to a variable index. The set grows as needed when
/// inserting beyond the current capacity.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    /// Number of set bits.
    count: usize,
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty set with room for `capacity` bits.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(Self::BITS_PER_WORD)],
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (word, bit) = Self::word_and_bit(index);
        self.words.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    /// Sets the bit at `index`. Returns true if it was not set before.
    pub fn insert(&mut self, index: usize) -> bool {
        let (word, bit) = Self::word_and_bit(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let was_clear = self.words[word] & mask == 0;
        if was_clear {
            self.words[word] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Clears the bit at `index`. Returns true if it was set before.
    pub fn remove(&mut self, index: usize) -> bool {
        let (word, bit) = Self::word_and_bit(index);
        let Some(w) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << bit;
        let was_set = *w & mask != 0;
        if was_set {
            *w &= !mask;
            self.count -= 1;
        }
        was_set
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.count = 0;
    }

    /// Set indices in increasing order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::default();
        set.extend(iter);
        set
    }
}

impl Extend<usize> for BitSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.insert(index);
        }
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the set bits of a [`BitSet`].
pub struct BitSetIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit);
            }
            self.word_idx += 1;
            self.current_word = *self.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_empty() {
        let bs = BitSet::new(10);
        assert!(bs.is_empty());
        assert!(!bs.contains(0));
        assert!(!bs.contains(100));
    }

    #[test]
    fn test_insert_remove() {
        let mut bs = BitSet::new(100);
        assert!(bs.insert(42));
        assert!(!bs.insert(42));
        assert!(bs.contains(42));
        assert_eq!(bs.len(), 1);
        assert!(bs.remove(42));
        assert!(!bs.remove(42));
        assert!(!bs.remove(1000));
        assert!(bs.is_empty());
    }

    #[test]
    fn test_grows_on_insert() {
        let mut bs = BitSet::default();
        bs.insert(1000);
        assert!(bs.contains(1000));
        assert_eq!(bs.len(), 1);
    }

    #[test]
    fn test_iter_crosses_words() {
        let bs: BitSet = [65, 3, 64, 10].into_iter().collect();
        assert_eq!(bs.iter().collect::<Vec<_>>(), vec![3, 10, 64, 65]);
        assert_eq!(format!("{:?}", bs), "{3, 10, 64, 65}");
    }

    #[test]
    fn test_clear() {
        let mut bs: BitSet = [1, 50, 99].into_iter().collect();
        bs.clear();
        assert!(bs.is_empty());
        assert!(!bs.contains(50));
    }
}
