//! (k, n) Shamir secret sharing over the fixed prime field
//!
//! Secrets are embedded as the constant term of a degree `k - 1` polynomial
//! and reconstructed by Lagrange interpolation at zero. Shares are additively
//! homomorphic: subtracting two share sets at matching indices yields shares
//! of the difference of the underlying secrets, which is what the delta
//! algebra relies on.

use std::collections::HashSet;
use std::fmt::Display;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::fields::{
    add_mod, inv_mod, mul_mod, random_field_element, sub_mod, FIELD_MODULUS,
};

/// An error produced while sharing or reconstructing a secret
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SharingError {
    /// The (k, n) parameters are not a valid threshold scheme
    InvalidThreshold(String),
    /// Reconstruction was attempted with no shares
    NoShares,
    /// Two shares carried the same index
    DuplicateIndex(u64),
    /// A share carried the reserved index zero
    ZeroIndex,
}

impl Display for SharingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One of `n` shares of a field-element secret, held at a fixed evaluation
/// index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// The evaluation index of the share, in `[1..n]`
    pub index: u64,
    /// The share value, a field element
    pub value: BigUint,
}

impl Share {
    /// Subtract another share from this one
    ///
    /// Only meaningful for shares at the same index; the caller upholds the
    /// index invariant
    pub fn sub(&self, other: &Share) -> Share {
        Share { index: self.index, value: sub_mod(&self.value, &other.value) }
    }
}

/// Split a secret into `n` shares, any `k` of which reconstruct it
pub fn split<R: Rng>(
    secret: &BigUint,
    k: usize,
    n: usize,
    rng: &mut R,
) -> Result<Vec<Share>, SharingError> {
    if k == 0 || n == 0 || k > n {
        return Err(SharingError::InvalidThreshold(format!("k = {k}, n = {n}")));
    }

    // Coefficients of a degree k - 1 polynomial with the secret as the
    // constant term
    let mut coeffs = Vec::with_capacity(k);
    coeffs.push(secret % &*FIELD_MODULUS);
    for _ in 1..k {
        coeffs.push(random_field_element(rng));
    }

    let shares = (1..=n as u64)
        .map(|index| {
            let x = BigUint::from(index);
            // Horner evaluation of the polynomial at x
            let mut value = BigUint::zero();
            for coeff in coeffs.iter().rev() {
                value = add_mod(&mul_mod(&value, &x), coeff);
            }
            Share { index, value }
        })
        .collect();

    Ok(shares)
}

/// Reconstruct a secret by Lagrange interpolation at zero over the given
/// shares
///
/// All provided shares participate in the interpolation; the caller is
/// responsible for providing at least the threshold number of honest shares
pub fn reconstruct(shares: &[Share]) -> Result<BigUint, SharingError> {
    if shares.is_empty() {
        return Err(SharingError::NoShares);
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.index == 0 {
            return Err(SharingError::ZeroIndex);
        }
        if !seen.insert(share.index) {
            return Err(SharingError::DuplicateIndex(share.index));
        }
    }

    let mut secret = BigUint::zero();
    for share in shares {
        let xi = BigUint::from(share.index);

        // The Lagrange basis coefficient at zero for this share's index
        let mut numerator = BigUint::from(1u8);
        let mut denominator = BigUint::from(1u8);
        for other in shares {
            if other.index == share.index {
                continue;
            }
            let xj = BigUint::from(other.index);
            numerator = mul_mod(&numerator, &xj);
            denominator = mul_mod(&denominator, &sub_mod(&xj, &xi));
        }

        let basis = mul_mod(&numerator, &inv_mod(&denominator));
        secret = add_mod(&secret, &mul_mod(&share.value, &basis));
    }

    Ok(secret)
}
