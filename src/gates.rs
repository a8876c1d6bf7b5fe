use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bits::BitVec;
use crate::matrix::BitMatrix;
use crate::poly::{Monomial, PolyFn};
use crate::{Error, PrivateKey, Result};

/// A homomorphic gate: a flat polynomial function, or a three-way join
/// evaluated piecewise as mid(left(x) || right(x))
///
/// Joins are never flattened into a single polynomial; the branches are
/// applied separately and only their outputs flow through the middle
/// function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GateFn {
    Flat(PolyFn),
    Join {
        left: Box<GateFn>,
        mid: PolyFn,
        right: Box<GateFn>,
    },
}

impl GateFn {
    pub fn join(left: GateFn, mid: PolyFn, right: GateFn) -> GateFn {
        GateFn::Join {
            left: Box::new(left),
            mid,
            right: Box::new(right),
        }
    }

    pub fn input_len(&self) -> usize {
        match self {
            GateFn::Flat(f) => f.input_len(),
            GateFn::Join { left, .. } => left.input_len(),
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            GateFn::Flat(f) => f.output_len(),
            GateFn::Join { mid, .. } => mid.output_len(),
        }
    }

    pub fn apply(&self, input: &BitVec) -> Result<BitVec> {
        match self {
            GateFn::Flat(f) => f.apply(input),
            GateFn::Join { left, mid, right } => {
                let l = left.apply(input)?;
                let r = right.apply(input)?;
                mid.apply(&l.concat(&r))
            }
        }
    }
}

/// XOR of the low and high halves of one block, result in the low half
pub fn xor_halves(len: usize) -> Result<PolyFn> {
    let half = len / 2;
    let mut entries = Vec::with_capacity(2 * half);
    for i in 0..half {
        let mut bit = BitVec::zero(len);
        bit.set(i, true);
        entries.push((Monomial::variable(len, i), bit.clone()));
        entries.push((Monomial::variable(len, half + i), bit));
    }
    PolyFn::from_terms(len, len, entries)
}

/// AND of the low and high halves of one block, result in the low half
pub fn and_halves(len: usize) -> Result<PolyFn> {
    let half = len / 2;
    let mut entries = Vec::with_capacity(half);
    for i in 0..half {
        let mut bit = BitVec::zero(len);
        bit.set(i, true);
        let pair = Monomial::variable(len, i).union(&Monomial::variable(len, half + i))?;
        entries.push((pair, bit));
    }
    PolyFn::from_terms(len, len, entries)
}

/// Left shift by `shift` bits within a block
pub fn left_shift(len: usize, shift: usize) -> Result<PolyFn> {
    if shift > len {
        return Err(Error::DimensionMismatch {
            expected: len,
            got: shift,
        });
    }
    let mut entries = Vec::with_capacity(len - shift);
    for i in 0..len - shift {
        let mut bit = BitVec::zero(len);
        bit.set(i + shift, true);
        entries.push((Monomial::variable(len, i), bit));
    }
    PolyFn::from_terms(len, len, entries)
}

/// Bitwise XOR of two concatenated operand blocks
pub fn binary_xor(len: usize) -> Result<PolyFn> {
    let mut entries = Vec::with_capacity(2 * len);
    for i in 0..len {
        let mut bit = BitVec::zero(len);
        bit.set(i, true);
        entries.push((Monomial::variable(2 * len, i), bit.clone()));
        entries.push((Monomial::variable(2 * len, len + i), bit));
    }
    PolyFn::from_terms(2 * len, len, entries)
}

/// Bitwise AND of two concatenated operand blocks
pub fn binary_and(len: usize) -> Result<PolyFn> {
    let mut entries = Vec::with_capacity(len);
    for i in 0..len {
        let mut bit = BitVec::zero(len);
        bit.set(i, true);
        let pair = Monomial::variable(2 * len, i).union(&Monomial::variable(2 * len, len + i))?;
        entries.push((pair, bit));
    }
    PolyFn::from_terms(2 * len, len, entries)
}

/// Homomorphic XOR of the two plaintext halves packed in one ciphertext
pub fn homomorphic_xor(len: usize, key: &PrivateKey, rng: &mut impl Rng) -> Result<PolyFn> {
    key.homomorphic_function(&xor_halves(len)?, rng)
}

/// Homomorphic AND of the two plaintext halves packed in one ciphertext
pub fn homomorphic_and(len: usize, key: &PrivateKey, rng: &mut impl Rng) -> Result<PolyFn> {
    key.homomorphic_function(&and_halves(len)?, rng)
}

/// Homomorphic left shift by one
pub fn homomorphic_lsh(len: usize, key: &PrivateKey, rng: &mut impl Rng) -> Result<PolyFn> {
    key.homomorphic_function(&left_shift(len, 1)?, rng)
}

/// Homomorphic XOR of two separately encrypted operands
pub fn binary_homomorphic_xor(len: usize, key: &PrivateKey, rng: &mut impl Rng) -> Result<PolyFn> {
    key.binary_homomorphic_function(&binary_xor(len)?, rng)
}

/// Homomorphic AND of two separately encrypted operands
pub fn binary_homomorphic_and(len: usize, key: &PrivateKey, rng: &mut impl Rng) -> Result<PolyFn> {
    key.binary_homomorphic_function(&binary_and(len)?, rng)
}

/// Homomorphic carry of two separately encrypted operands: AND then
/// left shift by one
pub fn binary_homomorphic_carry(
    len: usize,
    key: &PrivateKey,
    rng: &mut impl Rng,
) -> Result<PolyFn> {
    key.binary_homomorphic_function(&left_shift(len, 1)?.compose(&binary_and(len)?)?, rng)
}

/// Homomorphic half adder: the sum (XOR) bits concatenated with the
/// carry (AND, shifted) bits, each a full ciphertext block
pub fn homomorphic_half_adder(
    len: usize,
    key: &PrivateKey,
    rng: &mut impl Rng,
) -> Result<PolyFn> {
    let sum = binary_homomorphic_xor(len, key, rng)?;
    let carry = binary_homomorphic_carry(len, key, rng)?;
    sum.concatenate(&carry)
}

/// AND gate built directly from the decryption function's monomial
/// structure: the decryptor is duplicated onto disjoint left and right
/// input halves, the two copies are multiplied pointwise, and the product
/// is re-encrypted
pub fn direct_homomorphic_and(key: &PrivateKey, rng: &mut impl Rng) -> Result<PolyFn> {
    let decryptor = key.decryptor();
    let doubled = 2 * decryptor.input_len();
    let lhs = decryptor.extend_inputs(doubled)?;
    let rhs = decryptor.shift_inputs(decryptor.input_len());
    key.encrypt_function(&lhs.and(&rhs)?, rng)
}

/// AND gate via the masked case-split protocol
///
/// The two operand ciphertexts are the halves X and Y of the doubled
/// input space. A fresh invertible mask R and fresh blinding functions
/// R1, R2 are sampled per invocation; four candidate ciphertext pairs and
/// four candidate products cover the four combinations of masked and
/// unmasked operands, and the binary homomorphic XOR selector cancels the
/// three incorrect branches under decryption. Requires the blinding width
/// to equal the plaintext width so the decoded forms conform.
pub fn efficient_and(key: &PrivateKey, rng: &mut impl Rng) -> Result<GateFn> {
    let plain_len = key.plaintext_len();
    let cipher_len = key.ciphertext_len();
    if key.blinding_len() != plain_len {
        return Err(Error::DimensionMismatch {
            expected: plain_len,
            got: key.blinding_len(),
        });
    }
    let (e1, e2, d, l) = (key.e1(), key.e2(), key.d(), key.nullifier());

    let x = PolyFn::truncated_identity(2 * cipher_len, cipher_len)?;
    let y = PolyFn::upper_identity(2 * cipher_len, cipher_len)?;

    let dxy = d.multiply_fn(&x.xor(&y)?)?;
    let f_dx = key.f().compose(&d.multiply_fn(&x)?)?;
    let f_dy = key.f().compose(&d.multiply_fn(&y)?)?;
    let f_dxy = key.f().compose(&dxy)?;

    let r = BitMatrix::random_invertible(plain_len, rng)?;
    let r_inv = r.inverse()?;
    let r1 = PolyFn::random(2 * cipher_len, plain_len, 2, rng);
    let r2 = PolyFn::random(2 * cipher_len, plain_len, 2, rng);

    let lx = l.multiply_fn(&x)?;
    let ly = l.multiply_fn(&y)?;

    // Candidate ciphertexts, one per masking of the two operands.
    let v1 = e1
        .multiply_fn(&lx.xor(&r1)?)?
        .xor(&e2.multiply_fn(&dxy.xor(&r1)?)?)?;
    let v2 = e1
        .multiply_fn(&ly.xor(&r2)?)?
        .xor(&e2.multiply_fn(&dxy.xor(&r2)?)?)?;
    let v3 = e1
        .multiply_fn(&r.multiply_fn(&f_dx.xor(&r1)?)?)?
        .xor(&e2.multiply_fn(&dxy.xor(&r1)?)?)?;
    let v4 = e1
        .multiply_fn(&r.multiply_fn(&f_dy.xor(&r2)?)?)?
        .xor(&e2.multiply_fn(&dxy.xor(&r2)?)?)?;

    // Candidate products for the same four cases.
    let blind = e2.multiply_fn(&dxy)?;
    let pll = e1
        .multiply_fn(&lx.and(&ly)?.xor(&f_dxy)?)?
        .xor(&blind)?;
    let prl = e1
        .multiply_fn(&r_inv.multiply_fn(&lx)?.and(&ly)?.xor(&f_dxy)?)?
        .xor(&blind)?;
    let plr = e1
        .multiply_fn(&lx.and(&r_inv.multiply_fn(&ly)?)?.xor(&f_dxy)?)?
        .xor(&blind)?;
    let prr = e1
        .multiply_fn(
            &r_inv
                .multiply_fn(&lx)?
                .and(&r_inv.multiply_fn(&ly)?)?
                .xor(&f_dxy)?,
        )?
        .xor(&blind)?;

    let selector = binary_homomorphic_xor(plain_len, key, rng)?;

    let top = GateFn::join(
        GateFn::join(GateFn::Flat(v1.clone()), pll, GateFn::Flat(v2.clone())),
        selector.clone(),
        GateFn::join(GateFn::Flat(v3.clone()), prl, GateFn::Flat(v2)),
    );
    let bottom = GateFn::join(
        GateFn::join(GateFn::Flat(v1), plr, GateFn::Flat(v4.clone())),
        selector.clone(),
        GateFn::join(GateFn::Flat(v3), prr, GateFn::Flat(v4)),
    );
    Ok(GateFn::join(top, selector, bottom))
}
