/// [Cantor pairing function][cantor-pairing].
///
/// ```text
/// (a, b) -> (a + b) * (a + b + 1) / 2 + b
/// ```
///
/// Arithmetic wraps: the result is only used as a hash, never inverted.
///
/// [cantor-pairing]: https://en.wikipedia.org/wiki/Pairing_function#Cantor_pairing_function
pub fn pairing_cantor(a: u64, b: u64) -> u64 {
    let s = a.wrapping_add(b);
    (s.wrapping_mul(s.wrapping_add(1)) / 2).wrapping_add(b)
}

/// [Pairing function][pairing] for two `u64` values.
///
/// [pairing]: https://en.wikipedia.org/wiki/Pairing_function
pub fn pairing2(a: u64, b: u64) -> u64 {
    pairing_cantor(a, b)
}

/// Pairing function for three `u64` values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(c, pairing2(a, b))
}

/// Folds a whole slice through [pairing2], seeded with `seed`.
pub fn pairing_slice(seed: u64, values: &[u32]) -> u64 {
    values
        .iter()
        .fold(seed, |acc, &v| pairing2(acc, v as u64))
}

pub trait MyHash {
    /// Hash used for bucket selection in the unique table and the caches.
    fn hash(&self) -> u64;
}

impl MyHash for (u64, u64) {
    fn hash(&self) -> u64 {
        pairing2(self.0, self.1)
    }
}

impl MyHash for (u64, u64, u64) {
    fn hash(&self) -> u64 {
        pairing3(self.0, self.1, self.2)
    }
}

// ─── Primes ──────────────────────────────────────────────────────────────────

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller–Rabin test, exact for every `u64`.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Smallest prime `>= n`.
pub fn prime_gte(n: usize) -> usize {
    let mut candidate = n.max(2);
    if candidate > 2 && candidate % 2 == 0 {
        candidate += 1;
    }
    while !is_prime(candidate as u64) {
        candidate += if candidate == 2 { 1 } else { 2 };
    }
    candidate
}

/// Largest prime `<= n`, or 2 if there is none.
pub fn prime_lte(n: usize) -> usize {
    if n <= 2 {
        return 2;
    }
    let mut candidate = if n % 2 == 0 { n - 1 } else { n };
    while !is_prime(candidate as u64) {
        candidate -= 2;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cantor() {
        // a\b  0  1  2  3  4
        // ------------------
        // 0    0  2  5  9 14
        // 1    1  4  8 13
        // 2    3  7 12
        // 3    6 11
        // 4   10          40
        assert_eq!(pairing_cantor(0, 0), 0);
        assert_eq!(pairing_cantor(1, 0), 1);
        assert_eq!(pairing_cantor(0, 1), 2);
        assert_eq!(pairing_cantor(2, 0), 3);
        assert_eq!(pairing_cantor(1, 1), 4);
        assert_eq!(pairing_cantor(0, 2), 5);
        assert_eq!(pairing_cantor(4, 0), 10);
        assert_eq!(pairing_cantor(0, 4), 14);
        assert_eq!(pairing_cantor(4, 4), 40);
    }

    #[test]
    fn test_pairing_does_not_overflow() {
        let h = pairing3(u64::MAX, u64::MAX - 1, 12345);
        assert_eq!(h, pairing3(u64::MAX, u64::MAX - 1, 12345));
        assert_ne!(pairing_slice(7, &[1, 2, 3]), pairing_slice(7, &[3, 2, 1]));
    }

    #[test]
    fn test_is_prime() {
        let primes: Vec<u64> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(is_prime(1_000_003));
        assert!(!is_prime(1_000_001)); // 101 * 9901
        assert!(!is_prime(3_215_031_751)); // strong pseudoprime to bases 2, 3, 5, 7
    }

    #[test]
    fn test_prime_bounds() {
        assert_eq!(prime_gte(0), 2);
        assert_eq!(prime_gte(2), 2);
        assert_eq!(prime_gte(8), 11);
        assert_eq!(prime_gte(1000), 1009);
        assert_eq!(prime_lte(1000), 997);
        assert_eq!(prime_lte(13), 13);
        assert_eq!(prime_lte(1), 2);
    }
}
