use crate::constants::{BN254_BASE_MODULUS, FLAT_PROOF_LEN, WITHDRAW_PUBLIC_INPUTS};
use crate::errors::PrivacyPoolError;
use crate::field::{is_canonical, sub_be};
use crate::state::VerificationKeyAccount;
use anchor_lang::prelude::*;
use solana_bn254::prelude::{
    alt_bn128_addition, alt_bn128_multiplication, alt_bn128_pairing,
};

// ============================================================================
// ENCODING
// ============================================================================
//
// All coordinates and scalars are BIG-ENDIAN, as consumed by the alt_bn128
// syscalls. G2 coordinates use the EIP-197 order (x_im, x_re, y_im, y_re).
//
// A withdrawal carries its proof flattened to eight field elements:
//   [a.x, a.y, b.x_im, b.x_re, b.y_im, b.y_re, c.x, c.y]
//
// ============================================================================

/// Verifier oracle consulted by the withdrawal engine.
pub trait ProofVerifier {
    /// True iff `flat_proof` proves the statement fixed by `public_signals`.
    fn verify(&self, public_signals: &[[u8; 32]], flat_proof: &[[u8; 32]; FLAT_PROOF_LEN]) -> bool;
}

/// Groth16 proof structure (BN254 curve)
#[derive(Debug, Clone)]
pub struct Groth16Proof {
    pub a: G1Point,
    pub b: G2Point,
    pub c: G1Point,
}

impl Groth16Proof {
    pub fn from_flat(flat: &[[u8; 32]; FLAT_PROOF_LEN]) -> Self {
        Self {
            a: G1Point {
                x: flat[0],
                y: flat[1],
            },
            b: G2Point {
                x: [flat[2], flat[3]],
                y: [flat[4], flat[5]],
            },
            c: G1Point {
                x: flat[6],
                y: flat[7],
            },
        }
    }
}

/// G1 point (2 coordinates, each 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct G1Point {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl G1Point {
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.x);
        out[32..].copy_from_slice(&self.y);
        out
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[0..32]);
        y.copy_from_slice(&bytes[32..64]);
        Self { x, y }
    }

    fn is_zero(&self) -> bool {
        self.x == [0u8; 32] && self.y == [0u8; 32]
    }

    /// (x, y) -> (x, q - y); the point at infinity maps to itself.
    fn negate(&self) -> Option<Self> {
        if self.is_zero() {
            return Some(*self);
        }
        if self.y >= BN254_BASE_MODULUS {
            return None;
        }
        Some(Self {
            x: self.x,
            y: sub_be(&BN254_BASE_MODULUS, &self.y),
        })
    }
}

/// G2 point (4 coordinates, each 32 bytes - 2x2 Fp2 elements)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct G2Point {
    pub x: [[u8; 32]; 2],
    pub y: [[u8; 32]; 2],
}

impl G2Point {
    pub fn to_bytes(&self) -> [u8; 128] {
        let mut out = [0u8; 128];
        out[0..32].copy_from_slice(&self.x[0]);
        out[32..64].copy_from_slice(&self.x[1]);
        out[64..96].copy_from_slice(&self.y[0]);
        out[96..128].copy_from_slice(&self.y[1]);
        out
    }

    fn is_zero(&self) -> bool {
        self.x == [[0u8; 32]; 2] && self.y == [[0u8; 32]; 2]
    }
}

/// Parsed verification key
#[derive(Debug, Clone)]
pub struct VerificationKey {
    pub alpha_g1: G1Point,
    pub beta_g2: G2Point,
    pub gamma_g2: G2Point,
    pub delta_g2: G2Point,
    pub ic: Vec<G1Point>,
}

/// Parse verification key from stored bytes
/// Format: alpha_g1 (64) + beta_g2 (128) + gamma_g2 (128) + delta_g2 (128) + IC points
pub fn parse_verification_key(vk_bytes: &[u8], n_public: usize) -> Result<VerificationKey> {
    require!(
        vk_bytes.len() == VerificationKeyAccount::vk_data_len(n_public),
        PrivacyPoolError::InvalidVkData
    );

    let mut offset = 0;

    let alpha_g1 = parse_g1_point(&vk_bytes[offset..offset + 64])?;
    offset += 64;

    let beta_g2 = parse_g2_point(&vk_bytes[offset..offset + 128])?;
    offset += 128;

    let gamma_g2 = parse_g2_point(&vk_bytes[offset..offset + 128])?;
    offset += 128;

    let delta_g2 = parse_g2_point(&vk_bytes[offset..offset + 128])?;
    offset += 128;

    // IC points (n_public + 1 points)
    let mut ic = Vec::with_capacity(n_public + 1);
    for _ in 0..=n_public {
        ic.push(parse_g1_point(&vk_bytes[offset..offset + 64])?);
        offset += 64;
    }

    let vk = VerificationKey {
        alpha_g1,
        beta_g2,
        gamma_g2,
        delta_g2,
        ic,
    };
    validate_vk_structure(&vk)?;

    Ok(vk)
}

fn parse_g1_point(bytes: &[u8]) -> Result<G1Point> {
    require!(bytes.len() == 64, PrivacyPoolError::InvalidVkData);
    Ok(G1Point::from_bytes(bytes))
}

fn parse_g2_point(bytes: &[u8]) -> Result<G2Point> {
    require!(bytes.len() == 128, PrivacyPoolError::InvalidVkData);

    let mut x = [[0u8; 32]; 2];
    let mut y = [[0u8; 32]; 2];

    x[0].copy_from_slice(&bytes[0..32]);
    x[1].copy_from_slice(&bytes[32..64]);
    y[0].copy_from_slice(&bytes[64..96]);
    y[1].copy_from_slice(&bytes[96..128]);

    Ok(G2Point { x, y })
}

/// Reject keys with points at infinity where the pairing would degenerate
fn validate_vk_structure(vk: &VerificationKey) -> Result<()> {
    require!(!vk.alpha_g1.is_zero(), PrivacyPoolError::InvalidVkData);
    require!(!vk.beta_g2.is_zero(), PrivacyPoolError::InvalidVkData);
    require!(!vk.gamma_g2.is_zero(), PrivacyPoolError::InvalidVkData);
    require!(!vk.delta_g2.is_zero(), PrivacyPoolError::InvalidVkData);
    require!(!vk.ic.is_empty(), PrivacyPoolError::InvalidVkData);

    Ok(())
}

/// Groth16 verifier over the alt_bn128 syscalls
#[derive(Debug, Clone)]
pub struct Groth16Verifier {
    vk: VerificationKey,
}

impl Groth16Verifier {
    /// Build a verifier for the withdrawal circuit from raw key bytes.
    pub fn new(vk_data: &[u8]) -> Result<Self> {
        Ok(Self {
            vk: parse_verification_key(vk_data, WITHDRAW_PUBLIC_INPUTS)?,
        })
    }

    /// Build a verifier from the pool's key account, checking it is the key
    /// the pool config commits to.
    pub fn from_account(account: &VerificationKeyAccount, expected_hash: &[u8; 32]) -> Result<Self> {
        require!(account.is_set(), PrivacyPoolError::VkNotSet);
        require!(
            account.vk_hash == *expected_hash,
            PrivacyPoolError::VkHashMismatch
        );
        Self::new(&account.vk_data)
    }

    /// Groth16 verification equation:
    /// e(-A, B) * e(alpha, beta) * e(L, gamma) * e(C, delta) == 1
    /// where L = IC[0] + sum(public_inputs[i] * IC[i+1])
    fn check(
        &self,
        public_signals: &[[u8; 32]],
        proof: &Groth16Proof,
    ) -> Result<bool> {
        if public_signals.len() + 1 != self.vk.ic.len() {
            return Ok(false);
        }
        if !public_signals.iter().all(is_canonical) {
            return Ok(false);
        }
        if proof.a.is_zero() || proof.b.is_zero() || proof.c.is_zero() {
            return Ok(false);
        }

        let mut vk_x = self.vk.ic[0];
        for (signal, point) in public_signals.iter().zip(self.vk.ic.iter().skip(1)) {
            let product = scalar_mul_g1(point, signal)?;
            vk_x = point_add_g1(&vk_x, &product)?;
        }

        let neg_a = match proof.a.negate() {
            Some(point) => point,
            None => return Ok(false),
        };

        let pairs: [(G1Point, G2Point); 4] = [
            (neg_a, proof.b),
            (self.vk.alpha_g1, self.vk.beta_g2),
            (vk_x, self.vk.gamma_g2),
            (proof.c, self.vk.delta_g2),
        ];

        let mut pairing_input = Vec::with_capacity(pairs.len() * 192);
        for (g1, g2) in pairs.iter() {
            pairing_input.extend_from_slice(&g1.to_bytes());
            pairing_input.extend_from_slice(&g2.to_bytes());
        }

        let result = alt_bn128_pairing(&pairing_input)
            .map_err(|_| error!(PrivacyPoolError::InvalidZkProof))?;

        Ok(result.len() == 32 && result[..31].iter().all(|b| *b == 0) && result[31] == 1)
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify(&self, public_signals: &[[u8; 32]], flat_proof: &[[u8; 32]; FLAT_PROOF_LEN]) -> bool {
        match self.check(public_signals, &Groth16Proof::from_flat(flat_proof)) {
            Ok(valid) => valid,
            Err(err) => {
                msg!("Groth16 verification failed: {}", err);
                false
            }
        }
    }
}

/// Scalar multiplication on G1: point * scalar
fn scalar_mul_g1(point: &G1Point, scalar: &[u8; 32]) -> Result<G1Point> {
    let mut input = [0u8; 96];
    input[0..64].copy_from_slice(&point.to_bytes());
    input[64..96].copy_from_slice(scalar);

    let result = alt_bn128_multiplication(&input)
        .map_err(|_| error!(PrivacyPoolError::InvalidZkProof))?;
    require!(result.len() >= 64, PrivacyPoolError::InvalidZkProof);

    Ok(G1Point::from_bytes(&result[..64]))
}

/// Point addition on G1
fn point_add_g1(a: &G1Point, b: &G1Point) -> Result<G1Point> {
    let mut input = [0u8; 128];
    input[0..64].copy_from_slice(&a.to_bytes());
    input[64..128].copy_from_slice(&b.to_bytes());

    let result =
        alt_bn128_addition(&input).map_err(|_| error!(PrivacyPoolError::InvalidZkProof))?;
    require!(result.len() >= 64, PrivacyPoolError::InvalidZkProof);

    Ok(G1Point::from_bytes(&result[..64]))
}
