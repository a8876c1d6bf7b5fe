use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bits::BitVec;
use crate::poly::PolyFn;
use crate::{Error, Result};

/// Retry budget for rejection-sampling invertible matrices; a uniformly
/// random square GF(2) matrix is invertible with probability > 1/4.
const MAX_SAMPLE_ATTEMPTS: usize = 64;

/// A rectangular matrix over GF(2), stored as packed bit rows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitMatrix {
    rows: usize,
    cols: usize,
    data: Vec<BitVec>,
}

impl BitMatrix {
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![BitVec::zero(cols); rows],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zero(n, n);
        for i in 0..n {
            m.data[i].set(i, true);
        }
        m
    }

    /// Sample a uniformly random matrix
    pub fn random(rows: usize, cols: usize, rng: &mut impl Rng) -> Self {
        Self {
            rows,
            cols,
            data: (0..rows).map(|_| BitVec::random(cols, rng)).collect(),
        }
    }

    /// Rejection-sample a random invertible matrix, checked via the
    /// inverse routine; fails after a bounded number of attempts
    pub fn random_invertible(n: usize, rng: &mut impl Rng) -> Result<Self> {
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let m = Self::random(n, n, rng);
            if m.inverse().is_ok() {
                return Ok(m);
            }
        }
        Err(Error::SingularMatrix)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data[row].get(col)
    }

    pub fn set(&mut self, row: usize, col: usize, bit: bool) {
        self.data[row].set(col, bit);
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(BitVec::is_zero)
    }

    pub fn transpose(&self) -> BitMatrix {
        let mut out = BitMatrix::zero(self.cols, self.rows);
        for (i, row) in self.data.iter().enumerate() {
            for j in row.ones() {
                out.data[j].set(i, true);
            }
        }
        out
    }

    /// Matrix product over GF(2)
    pub fn multiply(&self, other: &BitMatrix) -> Result<BitMatrix> {
        if self.cols != other.rows {
            return Err(Error::DimensionMismatch {
                expected: self.cols,
                got: other.rows,
            });
        }
        let mut data = Vec::with_capacity(self.rows);
        for row in &self.data {
            let mut out = BitVec::zero(other.cols);
            for k in row.ones() {
                out.xor_eq(&other.data[k]);
            }
            data.push(out);
        }
        Ok(BitMatrix {
            rows: self.rows,
            cols: other.cols,
            data,
        })
    }

    /// Matrix-vector product over GF(2)
    pub fn multiply_vec(&self, v: &BitVec) -> Result<BitVec> {
        if self.cols != v.len() {
            return Err(Error::DimensionMismatch {
                expected: self.cols,
                got: v.len(),
            });
        }
        let mut out = BitVec::zero(self.rows);
        for (i, row) in self.data.iter().enumerate() {
            if row.dot(v) {
                out.set(i, true);
            }
        }
        Ok(out)
    }

    /// Apply this linear map to a polynomial function's output: the
    /// monomial set is preserved and each contribution is recombined
    /// through the matrix, dropping entries that vanish
    pub fn multiply_fn(&self, f: &PolyFn) -> Result<PolyFn> {
        if self.cols != f.output_len() {
            return Err(Error::DimensionMismatch {
                expected: self.cols,
                got: f.output_len(),
            });
        }
        let mut terms = BTreeMap::new();
        for (monomial, contribution) in f.terms() {
            let mapped = self.multiply_vec(contribution)?;
            if !mapped.is_zero() {
                terms.insert(monomial.clone(), mapped);
            }
        }
        Ok(PolyFn::from_map(f.input_len(), self.rows, terms))
    }

    /// This matrix as a linear polynomial function
    pub fn as_function(&self) -> PolyFn {
        let transposed = self.transpose();
        let mut terms = BTreeMap::new();
        for (j, column) in transposed.data.iter().enumerate() {
            if !column.is_zero() {
                terms.insert(
                    crate::poly::Monomial::variable(self.cols, j),
                    column.clone(),
                );
            }
        }
        PolyFn::from_map(self.cols, self.rows, terms)
    }

    /// Gauss-Jordan inverse over GF(2)
    pub fn inverse(&self) -> Result<BitMatrix> {
        if self.rows != self.cols {
            return Err(Error::DimensionMismatch {
                expected: self.rows,
                got: self.cols,
            });
        }
        let n = self.rows;
        let mut a = self.data.clone();
        let mut inv: Vec<BitVec> = BitMatrix::identity(n).data;
        for col in 0..n {
            let Some(pivot) = (col..n).find(|&i| a[i].get(col)) else {
                return Err(Error::SingularMatrix);
            };
            a.swap(col, pivot);
            inv.swap(col, pivot);
            for i in 0..n {
                if i != col && a[i].get(col) {
                    let (ar, ir) = (a[col].clone(), inv[col].clone());
                    a[i].xor_eq(&ar);
                    inv[i].xor_eq(&ir);
                }
            }
        }
        Ok(BitMatrix {
            rows: n,
            cols: n,
            data: inv,
        })
    }

    /// A maximal-rank matrix L with L * self == 0, computed as a null
    /// space basis of the transpose from its reduced row-echelon form
    pub fn left_nullifying_matrix(&self) -> BitMatrix {
        let mut a = self.transpose();
        let (nrows, ncols) = (a.rows, a.cols);
        let mut pivots: Vec<(usize, usize)> = Vec::new();
        let mut rank = 0;
        for col in 0..ncols {
            if let Some(pivot) = (rank..nrows).find(|&i| a.data[i].get(col)) {
                a.data.swap(rank, pivot);
                for i in 0..nrows {
                    if i != rank && a.data[i].get(col) {
                        let row = a.data[rank].clone();
                        a.data[i].xor_eq(&row);
                    }
                }
                pivots.push((rank, col));
                rank += 1;
            }
        }
        let mut is_pivot = vec![false; ncols];
        for &(_, col) in &pivots {
            is_pivot[col] = true;
        }
        // One basis vector per free column.
        let mut data = Vec::with_capacity(ncols - rank);
        for j in (0..ncols).filter(|&j| !is_pivot[j]) {
            let mut x = BitVec::zero(ncols);
            x.set(j, true);
            for &(row, col) in &pivots {
                if a.data[row].get(j) {
                    x.set(col, true);
                }
            }
            data.push(x);
        }
        BitMatrix {
            rows: data.len(),
            cols: ncols,
            data,
        }
    }

    /// Column-wise concatenation [self | other]
    pub fn augment(&self, other: &BitMatrix) -> Result<BitMatrix> {
        if self.rows != other.rows {
            return Err(Error::DimensionMismatch {
                expected: self.rows,
                got: other.rows,
            });
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.concat(b))
            .collect();
        Ok(BitMatrix {
            rows: self.rows,
            cols: self.cols + other.cols,
            data,
        })
    }

    /// The submatrix formed by rows `[start, end)`
    pub fn row_slice(&self, start: usize, end: usize) -> BitMatrix {
        debug_assert!(start <= end && end <= self.rows);
        BitMatrix {
            rows: end - start,
            cols: self.cols,
            data: self.data[start..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_inverse_round_trip() {
        let mut rng = StdRng::seed_from_u64(20);
        let m = BitMatrix::random_invertible(32, &mut rng).unwrap();
        let inv = m.inverse().unwrap();
        assert_eq!(m.multiply(&inv).unwrap(), BitMatrix::identity(32));
        assert_eq!(inv.multiply(&m).unwrap(), BitMatrix::identity(32));
    }

    #[test]
    fn test_singular_inverse() {
        assert!(matches!(
            BitMatrix::zero(4, 4).inverse(),
            Err(Error::SingularMatrix)
        ));
        assert!(matches!(
            BitMatrix::zero(3, 4).inverse(),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_multiply_identity() {
        let mut rng = StdRng::seed_from_u64(21);
        let m = BitMatrix::random(7, 12, &mut rng);
        assert_eq!(BitMatrix::identity(7).multiply(&m).unwrap(), m);
        assert_eq!(m.multiply(&BitMatrix::identity(12)).unwrap(), m);
        assert!(matches!(
            m.multiply(&BitMatrix::identity(7)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_left_nullifying() {
        let mut rng = StdRng::seed_from_u64(22);
        let e = BitMatrix::random(24, 10, &mut rng);
        let l = e.left_nullifying_matrix();
        assert!(l.rows() >= 14);
        assert_eq!(l.cols(), 24);
        assert!(l.multiply(&e).unwrap().is_zero());
    }

    #[test]
    fn test_multiply_vec() {
        let mut rng = StdRng::seed_from_u64(23);
        let a = BitMatrix::random(6, 9, &mut rng);
        let b = BitMatrix::random(9, 4, &mut rng);
        let v = BitVec::random(4, &mut rng);
        // (A * B) * v == A * (B * v)
        let lhs = a.multiply(&b).unwrap().multiply_vec(&v).unwrap();
        let rhs = a.multiply_vec(&b.multiply_vec(&v).unwrap()).unwrap();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn test_multiply_fn() {
        let mut rng = StdRng::seed_from_u64(24);
        let f = PolyFn::random(6, 5, 2, &mut rng);
        let m = BitMatrix::random(4, 5, &mut rng);
        let g = m.multiply_fn(&f).unwrap();
        for x in 0..64u64 {
            let v = BitVec::from_words(vec![x], 6);
            let expected = m.multiply_vec(&f.apply(&v).unwrap()).unwrap();
            assert_eq!(g.apply(&v).unwrap(), expected);
        }
    }

    #[test]
    fn test_as_function() {
        let mut rng = StdRng::seed_from_u64(25);
        let m = BitMatrix::random(5, 8, &mut rng);
        let f = m.as_function();
        assert_eq!(f.degree(), 1);
        for x in 0..256u64 {
            let v = BitVec::from_words(vec![x], 8);
            assert_eq!(f.apply(&v).unwrap(), m.multiply_vec(&v).unwrap());
        }
    }

    #[test]
    fn test_transpose_involution() {
        let mut rng = StdRng::seed_from_u64(26);
        let m = BitMatrix::random(11, 7, &mut rng);
        assert_eq!(m.transpose().transpose(), m);
    }
}
