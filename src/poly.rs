use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bits::BitVec;
use crate::{Error, Result};

/// A product of input variables over GF(2)
///
/// Stored as a bit set of variable indices over a fixed universe. Two
/// monomials are equal iff their index sets (and universes) are equal; the
/// derived ordering is the canonical order used to deduplicate terms.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Monomial {
    vars: BitVec,
}

impl Monomial {
    /// The empty product, which evaluates to 1 on every input
    pub fn constant(universe: usize) -> Self {
        Self {
            vars: BitVec::zero(universe),
        }
    }

    /// The single variable `x_index`
    pub fn variable(universe: usize, index: usize) -> Self {
        let mut vars = BitVec::zero(universe);
        vars.set(index, true);
        Self { vars }
    }

    pub(crate) fn from_vars(vars: BitVec) -> Self {
        Self { vars }
    }

    /// Number of input variables this monomial is defined over
    pub fn universe(&self) -> usize {
        self.vars.len()
    }

    pub fn degree(&self) -> usize {
        self.vars.count_ones()
    }

    pub fn is_constant(&self) -> bool {
        self.vars.is_zero()
    }

    /// Product of two monomials over the same universe
    pub fn union(&self, other: &Monomial) -> Result<Monomial> {
        if self.universe() != other.universe() {
            return Err(Error::DimensionMismatch {
                expected: self.universe(),
                got: other.universe(),
            });
        }
        let mut vars = self.vars.clone();
        for i in other.vars.ones() {
            vars.set(i, true);
        }
        Ok(Monomial { vars })
    }

    /// Evaluates to true iff every variable in the product is set
    pub fn eval(&self, input: &BitVec) -> bool {
        self.vars.subset_of(input)
    }

    /// Iterate the variable indices in the product
    pub fn vars(&self) -> impl Iterator<Item = usize> + '_ {
        self.vars.ones()
    }

    /// Grow the universe, keeping the same variable indices
    pub fn extend(&self, universe: usize) -> Result<Monomial> {
        if universe < self.universe() {
            return Err(Error::DimensionMismatch {
                expected: self.universe(),
                got: universe,
            });
        }
        Ok(Monomial {
            vars: self.vars.extend(universe),
        })
    }

    /// Relabel every variable index upward by `offset`
    pub fn shift(&self, offset: usize) -> Monomial {
        Monomial {
            vars: self.vars.shift(offset),
        }
    }
}

/// A function {0,1}^n -> {0,1}^m in algebraic normal form
///
/// Represented as a set of unique monomials, each paired with the m output
/// bits it contributes when it evaluates to 1; applying the function XORs
/// the contributions of all active monomials. Coefficients are mod 2, so
/// identical monomials cancel in pairs and the all-zero contribution is
/// never stored. All operations are pure and fail fast on shape mismatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyFn {
    input_len: usize,
    output_len: usize,
    terms: BTreeMap<Monomial, BitVec>,
}

fn xor_insert(terms: &mut BTreeMap<Monomial, BitVec>, monomial: Monomial, contribution: BitVec) {
    use std::collections::btree_map::Entry;
    match terms.entry(monomial) {
        Entry::Vacant(e) => {
            if !contribution.is_zero() {
                e.insert(contribution);
            }
        }
        Entry::Occupied(mut e) => {
            e.get_mut().xor_eq(&contribution);
            if e.get().is_zero() {
                e.remove();
            }
        }
    }
}

impl PolyFn {
    /// The zero function
    pub fn zero(input_len: usize, output_len: usize) -> Self {
        Self {
            input_len,
            output_len,
            terms: BTreeMap::new(),
        }
    }

    /// Validated construction from explicit (monomial, contribution) entries
    pub fn from_terms(
        input_len: usize,
        output_len: usize,
        entries: impl IntoIterator<Item = (Monomial, BitVec)>,
    ) -> Result<Self> {
        let mut terms = BTreeMap::new();
        for (monomial, contribution) in entries {
            if monomial.universe() != input_len {
                return Err(Error::DimensionMismatch {
                    expected: input_len,
                    got: monomial.universe(),
                });
            }
            if contribution.len() != output_len {
                return Err(Error::DimensionMismatch {
                    expected: output_len,
                    got: contribution.len(),
                });
            }
            xor_insert(&mut terms, monomial, contribution);
        }
        Ok(Self {
            input_len,
            output_len,
            terms,
        })
    }

    pub(crate) fn from_map(
        input_len: usize,
        output_len: usize,
        terms: BTreeMap<Monomial, BitVec>,
    ) -> Self {
        Self {
            input_len,
            output_len,
            terms,
        }
    }

    /// The linear function selecting the first `output_len` input bits
    pub fn truncated_identity(input_len: usize, output_len: usize) -> Result<Self> {
        if output_len > input_len {
            return Err(Error::DimensionMismatch {
                expected: input_len,
                got: output_len,
            });
        }
        let mut terms = BTreeMap::new();
        for i in 0..output_len {
            let mut bit = BitVec::zero(output_len);
            bit.set(i, true);
            terms.insert(Monomial::variable(input_len, i), bit);
        }
        Ok(Self {
            input_len,
            output_len,
            terms,
        })
    }

    /// The linear function selecting the last `output_len` input bits
    pub fn upper_identity(input_len: usize, output_len: usize) -> Result<Self> {
        if output_len > input_len {
            return Err(Error::DimensionMismatch {
                expected: input_len,
                got: output_len,
            });
        }
        let offset = input_len - output_len;
        let mut terms = BTreeMap::new();
        for i in 0..output_len {
            let mut bit = BitVec::zero(output_len);
            bit.set(i, true);
            terms.insert(Monomial::variable(input_len, offset + i), bit);
        }
        Ok(Self {
            input_len,
            output_len,
            terms,
        })
    }

    /// Sample a sparse random function with monomials of degree at most
    /// `max_degree` and uniformly random nonzero contributions
    pub fn random(
        input_len: usize,
        output_len: usize,
        max_degree: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let count = input_len.max(output_len).max(1);
        let mut terms = BTreeMap::new();
        for _ in 0..count {
            let degree = rng.random_range(1..=max_degree);
            let mut vars = BitVec::zero(input_len);
            for _ in 0..degree {
                vars.set(rng.random_range(0..input_len), true);
            }
            let mut contribution = BitVec::random(output_len, rng);
            while contribution.is_zero() {
                contribution = BitVec::random(output_len, rng);
            }
            xor_insert(&mut terms, Monomial::from_vars(vars), contribution);
        }
        Self {
            input_len,
            output_len,
            terms,
        }
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Highest monomial degree present
    pub fn degree(&self) -> usize {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    /// Iterate the (monomial, contribution) entries in canonical order
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &BitVec)> {
        self.terms.iter()
    }

    /// Evaluate on an input of exactly `input_len` bits
    pub fn apply(&self, input: &BitVec) -> Result<BitVec> {
        if input.len() != self.input_len {
            return Err(Error::DimensionMismatch {
                expected: self.input_len,
                got: input.len(),
            });
        }
        let mut out = BitVec::zero(self.output_len);
        for (monomial, contribution) in &self.terms {
            if monomial.eval(input) {
                out.xor_eq(contribution);
            }
        }
        Ok(out)
    }

    /// Pointwise XOR of two functions of identical shape
    pub fn xor(&self, other: &PolyFn) -> Result<PolyFn> {
        if self.input_len != other.input_len {
            return Err(Error::DimensionMismatch {
                expected: self.input_len,
                got: other.input_len,
            });
        }
        if self.output_len != other.output_len {
            return Err(Error::DimensionMismatch {
                expected: self.output_len,
                got: other.output_len,
            });
        }
        let mut terms = self.terms.clone();
        for (monomial, contribution) in &other.terms {
            xor_insert(&mut terms, monomial.clone(), contribution.clone());
        }
        Ok(PolyFn {
            input_len: self.input_len,
            output_len: self.output_len,
            terms,
        })
    }

    /// Pointwise boolean product of two functions of identical shape
    ///
    /// Every pairwise monomial union is accumulated with XOR cancellation,
    /// so the result stays deduplicated. Degree grows at most additively.
    pub fn and(&self, other: &PolyFn) -> Result<PolyFn> {
        if self.input_len != other.input_len {
            return Err(Error::DimensionMismatch {
                expected: self.input_len,
                got: other.input_len,
            });
        }
        if self.output_len != other.output_len {
            return Err(Error::DimensionMismatch {
                expected: self.output_len,
                got: other.output_len,
            });
        }
        let mut terms = BTreeMap::new();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                let contribution = ca.and(cb);
                if contribution.is_zero() {
                    continue;
                }
                xor_insert(&mut terms, ma.union(mb)?, contribution);
            }
        }
        Ok(PolyFn {
            input_len: self.input_len,
            output_len: self.output_len,
            terms,
        })
    }

    /// Composition h(x) = self(inner(x))
    ///
    /// Each monomial of `self` is substituted by the product of the
    /// per-output-bit polynomials of `inner`, expanded back into monomials
    /// with pairwise cancellation. Degree grows at most multiplicatively.
    pub fn compose(&self, inner: &PolyFn) -> Result<PolyFn> {
        if self.input_len != inner.output_len {
            return Err(Error::DimensionMismatch {
                expected: self.input_len,
                got: inner.output_len,
            });
        }
        // The monomials of each output bit of `inner`.
        let mut bit_terms: Vec<Vec<&Monomial>> = vec![Vec::new(); inner.output_len];
        for (monomial, contribution) in &inner.terms {
            for i in contribution.ones() {
                bit_terms[i].push(monomial);
            }
        }
        let mut terms = BTreeMap::new();
        for (monomial, contribution) in &self.terms {
            let mut expansion: BTreeSet<Monomial> = BTreeSet::new();
            expansion.insert(Monomial::constant(inner.input_len));
            for v in monomial.vars() {
                let mut next = BTreeSet::new();
                for a in &expansion {
                    for b in &bit_terms[v] {
                        let product = a.union(b)?;
                        if !next.remove(&product) {
                            next.insert(product);
                        }
                    }
                }
                expansion = next;
                if expansion.is_empty() {
                    break;
                }
            }
            for m in expansion {
                xor_insert(&mut terms, m, contribution.clone());
            }
        }
        Ok(PolyFn {
            input_len: inner.input_len,
            output_len: self.output_len,
            terms,
        })
    }

    /// Stack the outputs of two functions over the same input space
    pub fn concatenate(&self, other: &PolyFn) -> Result<PolyFn> {
        if self.input_len != other.input_len {
            return Err(Error::DimensionMismatch {
                expected: self.input_len,
                got: other.input_len,
            });
        }
        let output_len = self.output_len + other.output_len;
        let mut terms = BTreeMap::new();
        for (monomial, contribution) in &self.terms {
            xor_insert(
                &mut terms,
                monomial.clone(),
                contribution.concat(&BitVec::zero(other.output_len)),
            );
        }
        for (monomial, contribution) in &other.terms {
            xor_insert(
                &mut terms,
                monomial.clone(),
                BitVec::zero(self.output_len).concat(contribution),
            );
        }
        Ok(PolyFn {
            input_len: self.input_len,
            output_len,
            terms,
        })
    }

    /// Pad the input arity to `new_len` without changing the semantics on
    /// the original variables; the added variables contribute nothing
    pub fn extend_inputs(&self, new_len: usize) -> Result<PolyFn> {
        if new_len < self.input_len {
            return Err(Error::DimensionMismatch {
                expected: self.input_len,
                got: new_len,
            });
        }
        let mut terms = BTreeMap::new();
        for (monomial, contribution) in &self.terms {
            terms.insert(monomial.extend(new_len)?, contribution.clone());
        }
        Ok(PolyFn {
            input_len: new_len,
            output_len: self.output_len,
            terms,
        })
    }

    /// Relabel every input variable upward by `offset`, growing the input
    /// arity by the same amount
    pub fn shift_inputs(&self, offset: usize) -> PolyFn {
        let terms = self
            .terms
            .iter()
            .map(|(m, c)| (m.shift(offset), c.clone()))
            .collect();
        PolyFn {
            input_len: self.input_len + offset,
            output_len: self.output_len,
            terms,
        }
    }
}
