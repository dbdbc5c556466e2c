//! Compact "bits" encoding of difficulty targets.
//!
//! The bits format is: [size (1 byte)][mantissa (3 bytes)]
//! Target = mantissa * 256^(size - 3)
//!
//! Bit 23 of the mantissa is a sign flag. Difficulty targets are never
//! negative, so this module treats any value with the flag set as zero rather
//! than modelling negative targets. Valid protocol data never sets it.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

/// Sign flag inside the 3-byte mantissa.
pub const SIGN_BIT: u32 = 0x0080_0000;

const MANTISSA_MASK: u32 = 0x007F_FFFF;

/// Decode compact bits into a full target.
///
/// Total over all inputs: a zero size or a set sign flag decode to zero, and
/// oversized exponents simply produce a very large integer.
pub fn decode(bits: u32) -> BigUint {
    let size = bits >> 24;
    if size == 0 || bits & SIGN_BIT != 0 {
        return BigUint::zero();
    }

    let mantissa = BigUint::from(bits & MANTISSA_MASK);
    if size <= 3 {
        mantissa >> (8 * (3 - size)) as usize
    } else {
        mantissa << (8 * (size - 3)) as usize
    }
}

/// Encode a target into compact bits.
///
/// The size byte counts a leading zero byte whenever the top bit of the
/// magnitude would otherwise be set, so zero encodes as `0x01000000`. Only the
/// three most significant bytes survive.
pub fn encode(target: &BigUint) -> u32 {
    let mut size = (target.bits() / 8 + 1) as u32;
    let mut mantissa = if size <= 3 {
        target.to_u32().unwrap_or(0) << (8 * (3 - size))
    } else {
        (target >> (8 * (size - 3)) as usize).to_u32().unwrap_or(0)
    };

    // A mantissa with the sign flag set is moved down a byte.
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }

    ((size & 0xFF) << 24) | mantissa
}

/// Drop the precision of `target` below what `bits` can express.
///
/// Keeps the 24 bits positioned at the size implied by `bits`. Sizes under
/// three shift the mask right instead of left.
pub fn truncate_to_precision(target: BigUint, bits: u32) -> BigUint {
    let accuracy_bytes = (bits >> 24) as i64 - 3;
    let mask = BigUint::from(0x00FF_FFFFu32);
    let mask = if accuracy_bytes >= 0 {
        mask << (accuracy_bytes * 8) as usize
    } else {
        mask >> (-accuracy_bytes * 8) as usize
    };
    target & mask
}

/// Expected number of hashes to find a header at `bits`: 2^256 / (target + 1).
pub fn work(bits: u32) -> BigUint {
    let target = decode(bits);
    (BigUint::one() << 256usize) / (target + BigUint::one())
}
