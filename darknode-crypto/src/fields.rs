//! Helpers for manipulating values within the shared prime field and
//! translating between unsigned and signed representatives

use lazy_static::lazy_static;
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;

lazy_static! {
    /// The modulus `p` of the shared prime field; the largest 1024-bit prime,
    /// `2^1024 - 105`
    pub static ref FIELD_MODULUS: BigUint =
        (BigUint::one() << 1024u32) - BigUint::from(105u8);

    /// The midpoint `p / 2` of the field; values above it represent negative
    /// signed values
    pub static ref FIELD_MODULUS_HALF: BigUint = &*FIELD_MODULUS >> 1u32;
}

/// Return the field modulus as a `BigUint`
pub fn field_modulus() -> BigUint {
    FIELD_MODULUS.clone()
}

// --------------
// | Arithmetic |
// --------------

/// Add two field elements modulo `p`
pub fn add_mod(a: &BigUint, b: &BigUint) -> BigUint {
    (a + b) % &*FIELD_MODULUS
}

/// Subtract two field elements modulo `p`
pub fn sub_mod(a: &BigUint, b: &BigUint) -> BigUint {
    let a = a % &*FIELD_MODULUS;
    let b = b % &*FIELD_MODULUS;
    if a >= b {
        a - b
    } else {
        &*FIELD_MODULUS - b + a
    }
}

/// Multiply two field elements modulo `p`
pub fn mul_mod(a: &BigUint, b: &BigUint) -> BigUint {
    (a * b) % &*FIELD_MODULUS
}

/// Invert a non-zero field element; `p` is prime so Fermat's little theorem
/// gives `a^{-1} = a^{p-2}`
pub fn inv_mod(a: &BigUint) -> BigUint {
    let exp = &*FIELD_MODULUS - BigUint::from(2u8);
    a.modpow(&exp, &FIELD_MODULUS)
}

// --------------------------
// | Signed Representatives |
// --------------------------

/// Map a field element to its signed representative; elements above `p / 2`
/// represent the negative value `x - p`
pub fn to_signed(x: &BigUint) -> BigInt {
    if x > &*FIELD_MODULUS_HALF {
        BigInt::from(x.clone()) - BigInt::from(FIELD_MODULUS.clone())
    } else {
        BigInt::from(x.clone())
    }
}

/// Map a signed value back to its canonical field representative
pub fn from_signed(x: &BigInt) -> BigUint {
    let p = BigInt::from(FIELD_MODULUS.clone());
    let reduced = ((x % &p) + &p) % &p;
    reduced.to_biguint().unwrap_or_else(BigUint::zero)
}

// --------------
// | Randomness |
// --------------

/// Sample a uniformly random field element from the given source
pub fn random_field_element<R: Rng>(rng: &mut R) -> BigUint {
    rng.gen_biguint_below(&FIELD_MODULUS)
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use num_traits::{One, Zero};
    use rand::thread_rng;

    use super::*;

    /// The modulus is exactly `2^1024 - 105` and 1024 bits wide
    #[test]
    fn test_modulus_width() {
        assert_eq!(FIELD_MODULUS.bits(), 1024);
        let reconstructed = FIELD_MODULUS.clone() + BigUint::from(105u8);
        assert_eq!(reconstructed, BigUint::one() << 1024u32);
    }

    /// Subtraction wraps through the modulus
    #[test]
    fn test_sub_mod_wraps() {
        let a = BigUint::from(3u8);
        let b = BigUint::from(5u8);
        let diff = sub_mod(&a, &b);

        // 3 - 5 == -2 == p - 2
        assert_eq!(diff, &*FIELD_MODULUS - BigUint::from(2u8));
        assert_eq!(to_signed(&diff), BigInt::from(-2));
    }

    /// Inversion satisfies `a * a^{-1} == 1`
    #[test]
    fn test_inv_mod() {
        let mut rng = thread_rng();
        let a = random_field_element(&mut rng);
        let prod = mul_mod(&a, &inv_mod(&a));
        assert!(prod.is_one());
    }

    /// Signed representatives round-trip through the canonical form
    #[test]
    fn test_signed_round_trip() {
        let neg = BigInt::from(-42);
        let canonical = from_signed(&neg);
        assert_eq!(canonical, &*FIELD_MODULUS - BigUint::from(42u8));
        assert_eq!(to_signed(&canonical), neg);

        let pos = BigInt::from(42);
        assert_eq!(to_signed(&from_signed(&pos)), pos);
        assert!(from_signed(&BigInt::zero()).is_zero());
    }
}
