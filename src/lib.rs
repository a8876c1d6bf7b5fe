//! A multivariate homomorphic encryption library over GF(2)
//!
//! Plaintexts and ciphertexts are fixed-length bit blocks; encryption and
//! decryption are multivariate polynomial functions over GF(2), so
//! plaintext-space boolean functions can be lifted into functions that
//! operate directly on ciphertexts (see [`gates`]).
//!
//! # Example
//!```rust
//! use rand::prelude::*;
//! use gf2he::{PrivateKey, PublicKey};
//!
//! let mut rng = rand::rng();
//! let private = PrivateKey::generate(128, 64, &mut rng).unwrap();
//! let public = PublicKey::new(&private, &mut rng).unwrap();
//!
//! let envelope = public.encrypt_into_envelope(b"attack at dawn", &mut rng).unwrap();
//! let decrypted = private.decrypt_from_envelope(&envelope).unwrap();
//! assert_eq!(decrypted, b"attack at dawn");
//!```

pub mod bits;
pub mod gates;
pub mod matrix;
pub mod poly;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bits::{BitVec, WORD_BITS};
use crate::matrix::BitMatrix;
use crate::poly::PolyFn;

/// Retry budget for sampling the structural matrices at key generation.
const MAX_KEY_ATTEMPTS: usize = 64;

/// Degree of the sampled trapdoor and blinding functions. Quadratic keeps
/// the encrypter at degree 4 and the decryptor at degree 2.
const BLINDING_DEGREE: usize = 2;

/// Errors produced by the algebra and the key protocol
#[derive(Debug, Error)]
pub enum Error {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("matrix is singular")]
    SingularMatrix,

    #[error("invalid block length: expected {expected} bits, got {got} bits")]
    InvalidBlockLength { expected: usize, got: usize },

    #[error("block lengths must be a multiple of {0} bits for byte level encryption")]
    UnalignedBlock(usize),

    #[error("envelope length header exceeds payload length")]
    InvalidEnvelope,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Aligns plaintext bytes to a whole number of plaintext blocks
pub trait PaddingStrategy {
    /// Returns a byte sequence whose length is an exact multiple of the
    /// block plaintext capacity
    fn pad(&self, plaintext: &[u8]) -> Vec<u8>;
}

/// Appends zero bytes up to the next block boundary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZeroPadding {
    block_bytes: usize,
}

impl ZeroPadding {
    pub fn new(block_bytes: usize) -> Self {
        Self { block_bytes }
    }
}

impl PaddingStrategy for ZeroPadding {
    fn pad(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut padded = plaintext.to_vec();
        let rem = padded.len() % self.block_bytes;
        if rem != 0 {
            padded.resize(padded.len() + self.block_bytes - rem, 0);
        }
        padded
    }
}

/// Encrypted payload together with its encrypted length header
///
/// The header block's first word is the true plaintext byte length; the
/// remaining words are independent random filler so the header is not
/// correlated with its content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ciphertext {
    pub contents: Vec<u8>,
    pub length: Vec<u8>,
}

/// Holds the secret structural matrices and the trapdoor function
///
/// The ciphertext of a plaintext m is E1 * (m ^ F(r)) ^ E2 * r for a
/// blinding value r; the decoding matrices satisfy D * E1 = 0, D * E2 = I
/// and L * E1 = I, L * E2 = 0, so L * c ^ F(D * c) recovers m. The
/// decryption polynomial function is derived once and cached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrivateKey {
    plain_len: usize,
    cipher_len: usize,
    e1: BitMatrix,
    e2: BitMatrix,
    d: BitMatrix,
    l: BitMatrix,
    f: PolyFn,
    decryptor: PolyFn,
}

impl PrivateKey {
    /// Generate a fresh key pair for the given block lengths
    ///
    /// Samples E1 and E2 until the stacked matrix [E1 | E2] is invertible,
    /// retrying internally; a singular sample is never surfaced.
    pub fn generate(cipher_len: usize, plain_len: usize, rng: &mut impl Rng) -> Result<Self> {
        if cipher_len <= plain_len {
            return Err(Error::DimensionMismatch {
                expected: plain_len + 1,
                got: cipher_len,
            });
        }
        let blinding_len = cipher_len - plain_len;
        for _ in 0..MAX_KEY_ATTEMPTS {
            let e1 = BitMatrix::random(cipher_len, plain_len, rng);
            let e2 = BitMatrix::random(cipher_len, blinding_len, rng);
            let Ok(decoding) = e1.augment(&e2)?.inverse() else {
                continue;
            };
            let d = decoding.row_slice(plain_len, cipher_len);
            // Normalize the left nullifier of E2 so that L * E1 = I.
            let l0 = e2.left_nullifying_matrix();
            let l = l0.multiply(&e1)?.inverse()?.multiply(&l0)?;
            let f = PolyFn::random(blinding_len, plain_len, BLINDING_DEGREE, rng);
            let decryptor = l.as_function().xor(&f.compose(&d.as_function())?)?;
            return Ok(Self {
                plain_len,
                cipher_len,
                e1,
                e2,
                d,
                l,
                f,
                decryptor,
            });
        }
        Err(Error::SingularMatrix)
    }

    pub fn plaintext_len(&self) -> usize {
        self.plain_len
    }

    pub fn ciphertext_len(&self) -> usize {
        self.cipher_len
    }

    pub fn blinding_len(&self) -> usize {
        self.cipher_len - self.plain_len
    }

    pub fn e1(&self) -> &BitMatrix {
        &self.e1
    }

    pub fn e2(&self) -> &BitMatrix {
        &self.e2
    }

    pub fn d(&self) -> &BitMatrix {
        &self.d
    }

    /// The normalized left-nullifying matrix of E2
    pub fn nullifier(&self) -> &BitMatrix {
        &self.l
    }

    /// The secret nonlinear trapdoor function
    pub fn f(&self) -> &PolyFn {
        &self.f
    }

    /// The cached decryption polynomial function
    pub fn decryptor(&self) -> &PolyFn {
        &self.decryptor
    }

    /// E1 * (transform ^ F(blinding)) ^ E2 * blinding
    fn wrap(&self, transform: &PolyFn, blinding: &PolyFn) -> Result<PolyFn> {
        let masked = transform.xor(&self.f.compose(blinding)?)?;
        self.e1
            .multiply_fn(&masked)?
            .xor(&self.e2.multiply_fn(blinding)?)
    }

    /// Wrap a plaintext transform into its encrypted form with a fresh
    /// random blinding function over the transform's input space
    pub fn encrypt_function(&self, transform: &PolyFn, rng: &mut impl Rng) -> Result<PolyFn> {
        let blinding = PolyFn::random(
            transform.input_len(),
            self.blinding_len(),
            BLINDING_DEGREE,
            rng,
        );
        self.wrap(transform, &blinding)
    }

    /// The public-key encrypter: embeds the first `plain_len` bits of the
    /// input block and draws the blinding from the trailing slots
    fn build_encrypter(&self, rng: &mut impl Rng) -> Result<PolyFn> {
        let m = PolyFn::truncated_identity(self.cipher_len, self.plain_len)?;
        let slots = PolyFn::upper_identity(self.cipher_len, self.blinding_len())?;
        let blinding = slots.xor(&PolyFn::random(
            self.cipher_len,
            self.blinding_len(),
            BLINDING_DEGREE,
            rng,
        ))?;
        self.wrap(&m, &blinding)
    }

    /// Lift a plaintext-space function into ciphertext space: decrypt,
    /// apply, re-encrypt, composed symbolically
    pub fn homomorphic_function(&self, plain_fn: &PolyFn, rng: &mut impl Rng) -> Result<PolyFn> {
        self.encrypt_function(&plain_fn.compose(&self.decryptor)?, rng)
    }

    /// Two-operand lift: the input is two concatenated ciphertext blocks,
    /// each decrypted independently before `plain_fn` is applied
    pub fn binary_homomorphic_function(
        &self,
        plain_fn: &PolyFn,
        rng: &mut impl Rng,
    ) -> Result<PolyFn> {
        self.encrypt_function(&plain_fn.compose(&self.binary_decryptor()?)?, rng)
    }

    /// The decryptor duplicated over two concatenated ciphertext blocks
    pub fn binary_decryptor(&self) -> Result<PolyFn> {
        let left = self.decryptor.extend_inputs(2 * self.cipher_len)?;
        let right = self.decryptor.shift_inputs(self.cipher_len);
        left.concatenate(&right)
    }

    /// Decrypt a single ciphertext block of packed words
    pub fn decrypt_block(&self, block: &[u64]) -> Result<Vec<u64>> {
        if block.len() * WORD_BITS != self.cipher_len {
            return Err(Error::InvalidBlockLength {
                expected: self.cipher_len,
                got: block.len() * WORD_BITS,
            });
        }
        let out = self
            .decryptor
            .apply(&BitVec::from_words(block.to_vec(), self.cipher_len))?;
        Ok(out.words().to_vec())
    }

    /// Decrypt a ciphertext byte stream block by block
    ///
    /// Mirrors the encryption block layout; the output retains any pad
    /// bytes the padding strategy appended.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if self.cipher_len % WORD_BITS != 0 || self.plain_len % WORD_BITS != 0 {
            return Err(Error::UnalignedBlock(WORD_BITS));
        }
        let block_bytes = self.cipher_len >> 3;
        if ciphertext.len() % block_bytes != 0 {
            return Err(Error::InvalidBlockLength {
                expected: self.cipher_len,
                got: (ciphertext.len() % block_bytes) << 3,
            });
        }
        let mut out = Vec::with_capacity((ciphertext.len() / block_bytes) * (self.plain_len >> 3));
        for chunk in ciphertext.chunks(block_bytes) {
            let words: Vec<u64> = chunk.chunks(8).map(be_word).collect();
            for word in self.decrypt_block(&words)? {
                out.extend_from_slice(&word.to_be_bytes());
            }
        }
        Ok(out)
    }

    /// Decrypt an envelope, truncating the payload to the true length
    /// recovered from the header block
    pub fn decrypt_from_envelope(&self, envelope: &Ciphertext) -> Result<Vec<u8>> {
        let header = self.decrypt(&envelope.length)?;
        if header.len() < 8 {
            return Err(Error::InvalidEnvelope);
        }
        let true_len = be_word(&header[..8]) as usize;
        let mut payload = self.decrypt(&envelope.contents)?;
        if true_len > payload.len() {
            return Err(Error::InvalidEnvelope);
        }
        payload.truncate(true_len);
        Ok(payload)
    }
}

/// Public key wrapping the encryption function derived from a [`PrivateKey`]
///
/// Owns exactly one encryption polynomial function, computed once at
/// construction and reused for every block, plus the padding strategy for
/// byte-stream encryption. Immutable after construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicKey<P = ZeroPadding> {
    encrypter: PolyFn,
    padding: P,
    plain_len: usize,
    cipher_len: usize,
}

impl PublicKey<ZeroPadding> {
    /// Derive a public key with zero padding
    pub fn new(private: &PrivateKey, rng: &mut impl Rng) -> Result<Self> {
        Self::with_padding(private, ZeroPadding::new(private.plaintext_len() >> 3), rng)
    }
}

impl<P: PaddingStrategy> PublicKey<P> {
    /// Derive a public key with an injected padding strategy
    pub fn with_padding(private: &PrivateKey, padding: P, rng: &mut impl Rng) -> Result<Self> {
        if private.plaintext_len() % WORD_BITS != 0 || private.ciphertext_len() % WORD_BITS != 0 {
            return Err(Error::UnalignedBlock(WORD_BITS));
        }
        Ok(Self {
            encrypter: private.build_encrypter(rng)?,
            padding,
            plain_len: private.plaintext_len(),
            cipher_len: private.ciphertext_len(),
        })
    }

    /// The encryption polynomial function
    pub fn encrypter(&self) -> &PolyFn {
        &self.encrypter
    }

    /// Encrypt a single input block of packed words: the plaintext words
    /// followed by the blinding slot words
    pub fn encrypt_block(&self, block: &[u64]) -> Result<Vec<u64>> {
        if block.len() * WORD_BITS != self.encrypter.input_len() {
            return Err(Error::InvalidBlockLength {
                expected: self.encrypter.input_len(),
                got: block.len() * WORD_BITS,
            });
        }
        let out = self
            .encrypter
            .apply(&BitVec::from_words(block.to_vec(), self.encrypter.input_len()))?;
        Ok(out.words().to_vec())
    }

    /// Encrypt a byte stream: pad, chunk into blocks, encrypt each block,
    /// and concatenate the ciphertext blocks in input order
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let padded = self.padding.pad(plaintext);
        let plain_bytes = self.plain_len >> 3;
        if padded.len() % plain_bytes != 0 {
            return Err(Error::InvalidBlockLength {
                expected: self.plain_len,
                got: (padded.len() % plain_bytes) << 3,
            });
        }
        let block_words = self.cipher_len / WORD_BITS;
        let mut out = Vec::with_capacity((padded.len() / plain_bytes) * (self.cipher_len >> 3));
        for chunk in padded.chunks(plain_bytes) {
            let mut block = vec![0u64; block_words];
            for (i, bytes) in chunk.chunks(8).enumerate() {
                block[i] = be_word(bytes);
            }
            for word in self.encrypt_block(&block)? {
                out.extend_from_slice(&word.to_be_bytes());
            }
        }
        Ok(out)
    }

    /// Encrypt a byte stream together with a header block carrying the
    /// true plaintext byte length, padded with random filler words
    pub fn encrypt_into_envelope(
        &self,
        plaintext: &[u8],
        rng: &mut impl Rng,
    ) -> Result<Ciphertext> {
        let mut header = vec![0u64; self.cipher_len / WORD_BITS];
        header[0] = plaintext.len() as u64;
        for word in header.iter_mut().skip(1) {
            *word = rng.random();
        }
        let mut length = Vec::with_capacity(self.cipher_len >> 3);
        for word in self.encrypt_block(&header)? {
            length.extend_from_slice(&word.to_be_bytes());
        }
        Ok(Ciphertext {
            contents: self.encrypt(plaintext)?,
            length,
        })
    }
}

/// Big-endian word from up to 8 bytes
fn be_word(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |w, &b| (w << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::OnceLock;

    const CIPHER_BITS: usize = 128;
    const PLAIN_BITS: usize = 64;

    fn key_pair() -> &'static (PrivateKey, PublicKey) {
        static PAIR: OnceLock<(PrivateKey, PublicKey)> = OnceLock::new();
        PAIR.get_or_init(|| {
            let mut rng = StdRng::seed_from_u64(42);
            let private = PrivateKey::generate(CIPHER_BITS, PLAIN_BITS, &mut rng).unwrap();
            let public = PublicKey::new(&private, &mut rng).unwrap();
            (private, public)
        })
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (private, public) = key_pair();
        let plaintext = b"hey!1234hey!1234hey!1234hey!12";
        let ciphertext = public.encrypt(plaintext).unwrap();
        assert_ne!(&ciphertext[..plaintext.len()], &plaintext[..]);
        let decrypted = private.decrypt(&ciphertext).unwrap();
        assert!(decrypted.starts_with(plaintext));
    }

    #[test]
    fn test_encrypt_decrypt_with_envelope() {
        let (private, public) = key_pair();
        let mut rng = StdRng::seed_from_u64(43);
        for plaintext in [&b"hey!1234hey!1234hey!1234hey!1"[..], &b""[..], &[0u8; 64][..]] {
            let envelope = public.encrypt_into_envelope(plaintext, &mut rng).unwrap();
            let decrypted = private.decrypt_from_envelope(&envelope).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_block_round_trip() {
        let (private, public) = key_pair();
        let block = [0x0123456789abcdefu64, 0];
        let ciphertext = public.encrypt_block(&block).unwrap();
        assert_eq!(ciphertext.len(), CIPHER_BITS / 64);
        let decrypted = private.decrypt_block(&ciphertext).unwrap();
        assert_eq!(decrypted, vec![0x0123456789abcdefu64]);
    }

    #[test]
    fn test_invalid_block_length() {
        let (private, public) = key_pair();
        assert!(matches!(
            public.encrypt_block(&[0u64; 1]),
            Err(Error::InvalidBlockLength { .. })
        ));
        assert!(matches!(
            private.decrypt_block(&[0u64; 3]),
            Err(Error::InvalidBlockLength { .. })
        ));
        assert!(matches!(
            private.decrypt(&[0u8; 15]),
            Err(Error::InvalidBlockLength { .. })
        ));
    }

    #[test]
    fn test_encrypter_identity() {
        // L * E ^ F(D * E) must recover the plaintext embedding exactly,
        // with L recomputed from E2 rather than taken from the key.
        let mut rng = StdRng::seed_from_u64(44);
        let private = PrivateKey::generate(16, 8, &mut rng).unwrap();
        let embedding = PolyFn::truncated_identity(16, 8).unwrap();
        let encrypter = private.encrypt_function(&embedding, &mut rng).unwrap();

        let decoded = private.d().multiply_fn(&encrypter).unwrap();
        let trapdoor_part = private.f().compose(&decoded).unwrap();
        let l0 = private.e2().left_nullifying_matrix();
        let l = l0
            .multiply(private.e1())
            .unwrap()
            .inverse()
            .unwrap()
            .multiply(&l0)
            .unwrap();
        let recovered = l
            .multiply_fn(&encrypter)
            .unwrap()
            .xor(&trapdoor_part)
            .unwrap();
        assert_eq!(recovered, embedding);
    }

    #[test]
    fn test_key_matrix_relations() {
        let mut rng = StdRng::seed_from_u64(45);
        let private = PrivateKey::generate(24, 8, &mut rng).unwrap();
        assert_eq!(private.blinding_len(), 16);
        assert!(private.nullifier().multiply(private.e2()).unwrap().is_zero());
        assert_eq!(
            private.nullifier().multiply(private.e1()).unwrap(),
            BitMatrix::identity(8)
        );
        assert!(private.d().multiply(private.e1()).unwrap().is_zero());
        assert_eq!(
            private.d().multiply(private.e2()).unwrap(),
            BitMatrix::identity(16)
        );
    }

    #[test]
    fn test_generate_rejects_bad_lengths() {
        let mut rng = StdRng::seed_from_u64(46);
        assert!(matches!(
            PrivateKey::generate(8, 8, &mut rng),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_unaligned_byte_api() {
        let mut rng = StdRng::seed_from_u64(47);
        let private = PrivateKey::generate(16, 8, &mut rng).unwrap();
        assert!(matches!(
            PublicKey::new(&private, &mut rng),
            Err(Error::UnalignedBlock(_))
        ));
        assert!(matches!(
            private.decrypt(&[0u8; 2]),
            Err(Error::UnalignedBlock(_))
        ));
    }

    #[test]
    fn test_zero_padding() {
        let padding = ZeroPadding::new(8);
        assert_eq!(padding.pad(b"abc").len(), 8);
        assert_eq!(padding.pad(b"12345678").len(), 8);
        assert_eq!(padding.pad(b"").len(), 0);
        assert!(padding.pad(b"abc").starts_with(b"abc"));
    }
}
