//! k-of-n Shamir secret sharing with an integrity digest.
//!
//! Each share is `x ‖ y[0..m]` where `x ∈ 1..=n` and `y[p]` is byte `p` of the
//! shared payload evaluated on its own random polynomial. The payload is
//! `secret ‖ SHA-256(secret)`, so interpolating with too few shares yields a
//! digest mismatch instead of a plausible-but-wrong secret.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::auth::constant_time_eq;
use crate::types::{Result, VigilError};

use super::gf256::{evaluate, Gf256};

/// Trailing digest length inside the shared payload.
pub const DIGEST_LEN: usize = 32;

/// Largest share count representable with one-byte x coordinates.
pub const MAX_SHARES: usize = 255;

/// Split `secret` into `n` shares, any `k` of which reconstruct it.
///
/// # Errors
///
/// `Validation` if `k < 2`, `n < k`, `n > 255` or `secret` is empty.
pub fn split(secret: &[u8], k: usize, n: usize) -> Result<Vec<Vec<u8>>> {
    if k < 2 {
        return Err(VigilError::Validation(format!("threshold must be at least 2, got {k}")));
    }
    if n < k {
        return Err(VigilError::Validation(format!(
            "share count {n} is below threshold {k}"
        )));
    }
    if n > MAX_SHARES {
        return Err(VigilError::Validation(format!(
            "share count {n} exceeds maximum {MAX_SHARES}"
        )));
    }
    if secret.is_empty() {
        return Err(VigilError::Validation("secret must not be empty".into()));
    }

    let mut payload = Zeroizing::new(Vec::with_capacity(secret.len() + DIGEST_LEN));
    payload.extend_from_slice(secret);
    payload.extend_from_slice(&Sha256::digest(secret));

    let mut shares: Vec<Vec<u8>> = (1..=n)
        .map(|x| {
            let mut share = Vec::with_capacity(1 + payload.len());
            share.push(x as u8);
            share
        })
        .collect();

    let mut coeffs = Zeroizing::new(vec![Gf256::ZERO; k]);
    let mut random = Zeroizing::new(vec![0u8; k - 1]);
    for &byte in payload.iter() {
        OsRng.fill_bytes(&mut random);
        coeffs[0] = Gf256(byte);
        for (c, r) in coeffs[1..].iter_mut().zip(random.iter()) {
            *c = Gf256(*r);
        }

        for share in shares.iter_mut() {
            let x = Gf256(share[0]);
            share.push(evaluate(&coeffs, x).0);
        }
    }

    Ok(shares)
}

/// Reconstruct a secret from shares produced by [`split`].
///
/// Interpolation runs over whichever x coordinates are supplied.
///
/// # Errors
///
/// - `Validation` with fewer than two shares
/// - `Format` for zero or duplicate indices and mismatched lengths
/// - `Crypto` when the embedded digest does not match (too few or corrupt shares)
pub fn combine<S: AsRef<[u8]>>(shares: &[S]) -> Result<Zeroizing<Vec<u8>>> {
    if shares.len() < 2 {
        return Err(VigilError::Validation(format!(
            "need at least 2 shares, got {}",
            shares.len()
        )));
    }

    let share_len = shares[0].as_ref().len();
    if share_len < 2 + DIGEST_LEN {
        return Err(VigilError::Format(format!("share too short: {share_len} bytes")));
    }

    let mut xs = Vec::with_capacity(shares.len());
    for share in shares {
        let share = share.as_ref();
        if share.len() != share_len {
            return Err(VigilError::Format("share length mismatch".into()));
        }
        let x = share[0];
        if x == 0 {
            return Err(VigilError::Format("share index must be non-zero".into()));
        }
        if xs.contains(&Gf256(x)) {
            return Err(VigilError::Format(format!("duplicate share index {x}")));
        }
        xs.push(Gf256(x));
    }

    // Lagrange basis at x = 0: l_j = prod_{m != j} x_m / (x_m - x_j); subtraction is XOR.
    let lambdas: Vec<Gf256> = xs
        .iter()
        .enumerate()
        .map(|(j, &xj)| {
            let (num, den) = xs
                .iter()
                .enumerate()
                .filter(|(m, _)| *m != j)
                .fold((Gf256::ONE, Gf256::ONE), |(num, den), (_, &xm)| {
                    (num * xm, den * (xm + xj))
                });
            num * den.inv()
        })
        .collect();

    let mut payload = Zeroizing::new(Vec::with_capacity(share_len - 1));
    for p in 1..share_len {
        let byte = shares
            .iter()
            .zip(lambdas.iter())
            .fold(Gf256::ZERO, |acc, (share, &l)| acc + Gf256(share.as_ref()[p]) * l);
        payload.push(byte.0);
    }

    let body_len = payload.len() - DIGEST_LEN;
    let (body, digest) = payload.split_at(body_len);
    if !constant_time_eq(&Sha256::digest(body), digest) {
        return Err(VigilError::Crypto);
    }

    Ok(Zeroizing::new(body.to_vec()))
}
