use rand::Rng;
use serde::{Deserialize, Serialize};

pub(crate) const WORD_BITS: usize = 64;

/// A fixed-length bit vector packed into 64-bit words
///
/// Bit `i` lives in word `i / 64` at position `i % 64`. Bits past the
/// logical length are kept zero so equality, ordering and hashing are
/// structural.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitVec {
    len: usize,
    words: Vec<u64>,
}

impl BitVec {
    /// All-zero vector of the given length
    pub fn zero(len: usize) -> Self {
        Self {
            len,
            words: vec![0u64; len.div_ceil(WORD_BITS)],
        }
    }

    /// Build a vector from packed words, masking any excess bits
    pub fn from_words(mut words: Vec<u64>, len: usize) -> Self {
        words.resize(len.div_ceil(WORD_BITS), 0);
        let mut v = Self { len, words };
        v.mask_tail();
        v
    }

    /// Sample a uniformly random vector
    pub fn random(len: usize, rng: &mut impl Rng) -> Self {
        let words = (0..len.div_ceil(WORD_BITS)).map(|_| rng.random()).collect();
        let mut v = Self { len, words };
        v.mask_tail();
        v
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    pub fn set(&mut self, i: usize, bit: bool) {
        debug_assert!(i < self.len);
        if bit {
            self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        } else {
            self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
        }
    }

    /// XOR another vector of equal length into this one
    pub fn xor_eq(&mut self, other: &BitVec) {
        debug_assert_eq!(self.len, other.len);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a ^= b;
        }
    }

    /// Bitwise AND of two vectors of equal length
    pub fn and(&self, other: &BitVec) -> BitVec {
        debug_assert_eq!(self.len, other.len);
        Self {
            len: self.len,
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a & b)
                .collect(),
        }
    }

    /// GF(2) inner product
    pub fn dot(&self, other: &BitVec) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a & b).count_ones())
            .sum::<u32>()
            & 1
            == 1
    }

    /// True when every set bit of `self` is also set in `other`
    pub fn subset_of(&self, other: &BitVec) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// This vector followed by `other`
    pub fn concat(&self, other: &BitVec) -> BitVec {
        let mut out = BitVec::zero(self.len + other.len);
        out.words[..self.words.len()].copy_from_slice(&self.words);
        for i in other.ones() {
            out.set(self.len + i, true);
        }
        out
    }

    /// The bits in `[start, end)` as a new vector
    pub fn slice(&self, start: usize, end: usize) -> BitVec {
        debug_assert!(start <= end && end <= self.len);
        let mut out = BitVec::zero(end - start);
        for i in start..end {
            if self.get(i) {
                out.set(i - start, true);
            }
        }
        out
    }

    /// Zero-extend to a longer length, preserving bit indices
    pub fn extend(&self, new_len: usize) -> BitVec {
        debug_assert!(new_len >= self.len);
        let mut words = self.words.clone();
        words.resize(new_len.div_ceil(WORD_BITS), 0);
        Self {
            len: new_len,
            words,
        }
    }

    /// Relabel every bit index upward by `offset`
    pub fn shift(&self, offset: usize) -> BitVec {
        let mut out = BitVec::zero(self.len + offset);
        for i in self.ones() {
            out.set(i + offset, true);
        }
        out
    }

    /// Iterate the indices of set bits in increasing order
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    None
                } else {
                    let bit = w.trailing_zeros() as usize;
                    w &= w - 1;
                    Some(i * WORD_BITS + bit)
                }
            })
        })
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    fn mask_tail(&mut self) {
        let rem = self.len % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_get_set() {
        let mut v = BitVec::zero(130);
        v.set(0, true);
        v.set(77, true);
        v.set(129, true);
        assert!(v.get(0) && v.get(77) && v.get(129));
        assert!(!v.get(1) && !v.get(128));
        assert_eq!(v.count_ones(), 3);
        v.set(77, false);
        assert!(!v.get(77));
    }

    #[test]
    fn test_ones() {
        let mut v = BitVec::zero(200);
        for i in [3, 64, 65, 199] {
            v.set(i, true);
        }
        assert_eq!(v.ones().collect::<Vec<_>>(), vec![3, 64, 65, 199]);
    }

    #[test]
    fn test_xor_and_dot() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = BitVec::random(100, &mut rng);
        let b = BitVec::random(100, &mut rng);
        let mut c = a.clone();
        c.xor_eq(&b);
        for i in 0..100 {
            assert_eq!(c.get(i), a.get(i) ^ b.get(i));
            assert_eq!(a.and(&b).get(i), a.get(i) & b.get(i));
        }
        let parity = (0..100).filter(|&i| a.get(i) & b.get(i)).count() % 2 == 1;
        assert_eq!(a.dot(&b), parity);
    }

    #[test]
    fn test_subset() {
        let mut a = BitVec::zero(70);
        let mut b = BitVec::zero(70);
        a.set(2, true);
        a.set(69, true);
        b.set(2, true);
        b.set(69, true);
        b.set(5, true);
        assert!(a.subset_of(&b));
        assert!(!b.subset_of(&a));
    }

    #[test]
    fn test_concat_slice() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = BitVec::random(37, &mut rng);
        let b = BitVec::random(90, &mut rng);
        let c = a.concat(&b);
        assert_eq!(c.len(), 127);
        assert_eq!(c.slice(0, 37), a);
        assert_eq!(c.slice(37, 127), b);
    }

    #[test]
    fn test_shift_extend() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = BitVec::random(50, &mut rng);
        let shifted = a.shift(30);
        let extended = a.extend(90);
        for i in 0..50 {
            assert_eq!(shifted.get(i + 30), a.get(i));
            assert_eq!(extended.get(i), a.get(i));
        }
        assert!(shifted.slice(0, 30).is_zero());
        assert!(extended.slice(50, 90).is_zero());
    }

    #[test]
    fn test_random_masks_tail() {
        let mut rng = StdRng::seed_from_u64(4);
        let v = BitVec::random(65, &mut rng);
        assert_eq!(v.words()[1] >> 1, 0);
    }
}
