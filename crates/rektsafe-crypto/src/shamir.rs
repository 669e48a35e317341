//! Shamir's Secret Sharing over GF(2^8) for 32-byte secrets
//!
//! Each secret byte is shared independently with its own random polynomial of
//! degree `threshold - 1`; share `x` holds the 32 evaluations at `x`.
//! Field arithmetic uses the AES reduction polynomial 0x11b. Any `threshold`
//! points reconstruct the secret by Lagrange interpolation at x = 0; fewer
//! reveal nothing about it.

use rand::RngCore;
use rektsafe_core::{RektsafeError, RektsafeResult};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// One evaluation point of the sharing polynomials. Zeroized on drop.
#[derive(Clone)]
pub struct ShamirPoint {
    pub x: u8,
    pub y: [u8; KEY_SIZE],
}

impl Drop for ShamirPoint {
    fn drop(&mut self) {
        self.y.zeroize();
    }
}

impl std::fmt::Debug for ShamirPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShamirPoint")
            .field("x", &self.x)
            .field("y", &"[REDACTED]")
            .finish()
    }
}

/// Multiply in GF(2^8) mod x^8 + x^4 + x^3 + x + 1.
///
/// Runs in constant time: operands are secret bytes, so the loop selects
/// with masks instead of branching on bits.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        p ^= a & 0u8.wrapping_sub(b & 1);
        a = (a << 1) ^ (0x1b & 0u8.wrapping_sub(a >> 7));
        b >>= 1;
    }
    p
}

fn gf_pow(mut a: u8, mut e: u8) -> u8 {
    let mut r = 1u8;
    while e > 0 {
        if e & 1 == 1 {
            r = gf_mul(r, a);
        }
        a = gf_mul(a, a);
        e >>= 1;
    }
    r
}

/// Multiplicative inverse; `a^254` since the group has order 255.
fn gf_inv(a: u8) -> u8 {
    gf_pow(a, 254)
}

/// Split `secret` into `total` points, any `threshold` of which reconstruct it.
///
/// Points are issued at `x = 1..=total`.
pub fn split(
    secret: &[u8; KEY_SIZE],
    threshold: u8,
    total: u8,
) -> RektsafeResult<Vec<ShamirPoint>> {
    if threshold == 0 || threshold > total {
        return Err(RektsafeError::Configuration(format!(
            "cannot split into {total} shares with threshold {threshold}"
        )));
    }

    let degree = threshold as usize - 1;
    let mut rng = rand::thread_rng();
    // coeffs[b] = [secret[b], a1, .., a_{t-1}]
    let mut coeffs = vec![[0u8; u8::MAX as usize]; KEY_SIZE];
    for (b, poly) in coeffs.iter_mut().enumerate() {
        poly[0] = secret[b];
        rng.fill_bytes(&mut poly[1..=degree]);
    }

    let points = (1..=total)
        .map(|x| {
            let mut y = [0u8; KEY_SIZE];
            for (b, poly) in coeffs.iter().enumerate() {
                // Horner evaluation from the highest coefficient down
                y[b] = poly[..=degree]
                    .iter()
                    .rev()
                    .fold(0u8, |acc, &c| gf_mul(acc, x) ^ c);
            }
            ShamirPoint { x, y }
        })
        .collect();

    for poly in coeffs.iter_mut() {
        poly.zeroize();
    }
    Ok(points)
}

/// Reconstruct the secret from distinct points by interpolating at x = 0.
///
/// The result is only the original secret if at least `threshold` points from
/// the same split are supplied; callers verify it against a known public value.
pub fn combine(points: &[ShamirPoint]) -> RektsafeResult<[u8; KEY_SIZE]> {
    if points.is_empty() {
        return Err(RektsafeError::Configuration("no shares to combine".into()));
    }
    for (i, p) in points.iter().enumerate() {
        if p.x == 0 {
            return Err(RektsafeError::Decoding("share index 0 is invalid".into()));
        }
        if points[..i].iter().any(|q| q.x == p.x) {
            return Err(RektsafeError::Decoding(format!(
                "duplicate share index {}",
                p.x
            )));
        }
    }

    let mut secret = [0u8; KEY_SIZE];
    for (i, pi) in points.iter().enumerate() {
        // λ_i(0) = Π_{j≠i} x_j / (x_j - x_i); subtraction is XOR
        let mut num = 1u8;
        let mut den = 1u8;
        for (j, pj) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            num = gf_mul(num, pj.x);
            den = gf_mul(den, pj.x ^ pi.x);
        }
        let lambda = gf_mul(num, gf_inv(den));
        for (s, &y) in secret.iter_mut().zip(pi.y.iter()) {
            *s ^= gf_mul(y, lambda);
        }
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gf_inverse_property() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse failed for {a}");
        }
    }

    #[test]
    fn gf_mul_known_value() {
        // FIPS-197 example: {57} • {83} = {c1}
        assert_eq!(gf_mul(0x57, 0x83), 0xc1);
    }

    /// Carry-less product reduced by the AES polynomial 0x11b.
    fn reference_mul(a: u8, b: u8) -> u8 {
        let mut product = 0u16;
        for bit in 0..8 {
            if b >> bit & 1 == 1 {
                product ^= (a as u16) << bit;
            }
        }
        for bit in (8..16).rev() {
            if product >> bit & 1 == 1 {
                product ^= 0x11b << (bit - 8);
            }
        }
        product as u8
    }

    #[test]
    fn gf_mul_agrees_with_polynomial_reduction() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                assert_eq!(gf_mul(a, b), reference_mul(a, b), "{a:#04x} * {b:#04x}");
            }
        }
    }

    #[test]
    fn split_issues_one_based_points() {
        let points = split(&[7u8; KEY_SIZE], 3, 5).unwrap();
        let xs: Vec<u8> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn threshold_points_reconstruct() {
        let secret = [0x42u8; KEY_SIZE];
        let points = split(&secret, 3, 5).unwrap();
        assert_eq!(combine(&points[..3]).unwrap(), secret);
        assert_eq!(combine(&points[2..]).unwrap(), secret);
        assert_eq!(combine(&points).unwrap(), secret);
    }

    #[test]
    fn fewer_points_do_not_reconstruct() {
        let mut secret = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut secret);
        let points = split(&secret, 4, 6).unwrap();
        assert_ne!(combine(&points[..3]).unwrap(), secret);
    }

    #[test]
    fn shares_are_not_the_secret() {
        let secret = [0x99u8; KEY_SIZE];
        let points = split(&secret, 2, 3).unwrap();
        assert!(points.iter().all(|p| p.y != secret));
    }

    #[test]
    fn rejects_duplicate_points() {
        let points = split(&[1u8; KEY_SIZE], 2, 3).unwrap();
        let dup = vec![points[0].clone(), points[0].clone()];
        assert!(matches!(combine(&dup), Err(RektsafeError::Decoding(_))));
    }

    #[test]
    fn rejects_empty_and_bad_threshold() {
        assert!(combine(&[]).is_err());
        assert!(split(&[0u8; KEY_SIZE], 4, 3).is_err());
        assert!(split(&[0u8; KEY_SIZE], 0, 3).is_err());
    }

    proptest! {
        #[test]
        fn any_threshold_subset_reconstructs(
            secret in any::<[u8; 32]>(),
            total in 2u8..=10,
            threshold_seed in any::<u8>(),
            offset_seed in any::<u8>(),
        ) {
            let threshold = 2 + threshold_seed % (total - 1);
            let points = split(&secret, threshold, total).unwrap();
            let offset = (offset_seed % (total - threshold + 1)) as usize;
            let subset = &points[offset..offset + threshold as usize];
            prop_assert_eq!(combine(subset).unwrap(), secret);
        }
    }
}
