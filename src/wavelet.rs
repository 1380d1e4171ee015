//! Dyadic wavelet transform (CDF 9/7 lifting).
//!
//! The 1-D transform lifts in place and then packs even-indexed samples into
//! the first half of the slice and odd-indexed ones into the second half, so
//! after `k` levels the LL subband occupies the top-left rectangle of the
//! matrix. Edges use symmetric mirroring. The inverse reverses the lifting
//! steps with opposite signs and is exact up to f32 rounding.

/// Per-axis active sizes across `steps` decomposition levels:
/// `v[0] = n`, `v[i] = ceil(v[i-1] / 2)`. The blocker uses the same
/// sequence to locate subband boundaries.
pub fn step_sizes(n: usize, steps: usize) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(steps + 1);
    sizes.push(n);
    for i in 0..steps {
        sizes.push(sizes[i].div_ceil(2));
    }
    sizes
}

// CDF 9/7 lifting coefficients
const ALPHA: f32 = -1.586_134_3;
const BETA: f32 = -0.052_980_12;
const GAMMA: f32 = 0.882_911_1;
const DELTA: f32 = 0.443_506_87;
const K: f32 = 1.230_174_1;
const INV_K: f32 = 1.0 / K;

/// Pack evens into the first half and odds into the second.
pub fn pack(s: &mut [f32]) {
    let n = s.len();
    let mut bank = vec![0f32; n];
    for (i, &v) in s.iter().enumerate() {
        if i % 2 == 0 {
            bank[i / 2] = v;
        } else {
            bank[n / 2 + i / 2 + (n % 2)] = v;
        }
    }
    s.copy_from_slice(&bank);
}

/// Undo [`pack`], interleaving the halves back in place.
pub fn unpack(s: &mut [f32]) {
    let n = s.len();
    let mut bank = vec![0f32; n];
    for (i, slot) in bank.iter_mut().enumerate() {
        if i % 2 == 0 {
            *slot = s[i / 2];
        } else {
            *slot = s[n / 2 + i / 2 + (n % 2)];
        }
    }
    s.copy_from_slice(&bank);
}

/// Lift odd samples against their even neighbours, mirroring at the edges.
fn lift_odd(s: &mut [f32], coeff: f32) {
    let n = s.len();
    for i in (1..n).step_by(2) {
        let left = s[i - 1];
        let right = if i + 1 < n { s[i + 1] } else { s[i - 1] };
        s[i] += coeff * (left + right);
    }
}

/// Lift even samples against their odd neighbours, mirroring at the edges.
fn lift_even(s: &mut [f32], coeff: f32) {
    let n = s.len();
    for i in (0..n).step_by(2) {
        let left = if i > 0 { s[i - 1] } else { s[i + 1] };
        let right = if i + 1 < n { s[i + 1] } else { s[i - 1] };
        s[i] += coeff * (left + right);
    }
}

/// Forward 1-D transform of the whole slice; low-pass half first afterwards.
pub fn forward_1d(s: &mut [f32]) {
    let n = s.len();
    if n < 2 {
        return;
    }
    lift_odd(s, ALPHA);
    lift_even(s, BETA);
    lift_odd(s, GAMMA);
    lift_even(s, DELTA);
    for (i, v) in s.iter_mut().enumerate() {
        *v *= if i % 2 == 0 { INV_K } else { K };
    }
    pack(s);
}

/// Inverse 1-D transform.
pub fn inverse_1d(s: &mut [f32]) {
    let n = s.len();
    if n < 2 {
        return;
    }
    unpack(s);
    for (i, v) in s.iter_mut().enumerate() {
        *v *= if i % 2 == 0 { K } else { INV_K };
    }
    lift_even(s, -DELTA);
    lift_odd(s, -GAMMA);
    lift_even(s, -BETA);
    lift_odd(s, -ALPHA);
}

/// Multi-level 2-D transform over a row-major `lines x samples` matrix.
///
/// Level `i` transforms the top-left `(ceil(lines/2^i) x ceil(samples/2^i))`
/// rectangle, rows first then columns.
pub fn forward_2d(s: &mut [f32], lines: usize, samples: usize, levels: usize) {
    debug_assert_eq!(s.len(), lines * samples);
    let row_sizes = step_sizes(lines, levels);
    let col_sizes = step_sizes(samples, levels);
    let mut column = vec![0f32; lines];

    for level in 0..levels {
        let h = row_sizes[level];
        let w = col_sizes[level];
        for r in 0..h {
            forward_1d(&mut s[r * samples..r * samples + w]);
        }
        for c in 0..w {
            for r in 0..h {
                column[r] = s[r * samples + c];
            }
            forward_1d(&mut column[..h]);
            for r in 0..h {
                s[r * samples + c] = column[r];
            }
        }
    }
}

/// Undo [`forward_2d`]: levels in reverse, columns first then rows.
pub fn inverse_2d(s: &mut [f32], lines: usize, samples: usize, levels: usize) {
    debug_assert_eq!(s.len(), lines * samples);
    let row_sizes = step_sizes(lines, levels);
    let col_sizes = step_sizes(samples, levels);
    let mut column = vec![0f32; lines];

    for level in (0..levels).rev() {
        let h = row_sizes[level];
        let w = col_sizes[level];
        for c in 0..w {
            for r in 0..h {
                column[r] = s[r * samples + c];
            }
            inverse_1d(&mut column[..h]);
            for r in 0..h {
                s[r * samples + c] = column[r];
            }
        }
        for r in 0..h {
            inverse_1d(&mut s[r * samples..r * samples + w]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sizes() {
        assert_eq!(step_sizes(512, 3), vec![512, 256, 128, 64]);
        assert_eq!(step_sizes(5, 3), vec![5, 3, 2, 1]);
        assert_eq!(step_sizes(16, 0), vec![16]);
    }

    #[test]
    fn test_pack_unpack() {
        let mut s = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        pack(&mut s);
        assert_eq!(s, vec![1.0, 3.0, 5.0, 2.0, 4.0]);
        unpack(&mut s);
        assert_eq!(s, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_forward_inverse_1d_even_length() {
        let input = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
        let mut s = input;
        forward_1d(&mut s);
        inverse_1d(&mut s);
        for (a, b) in input.iter().zip(s.iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_forward_inverse_1d_odd_length() {
        let input = [3.0, -1.0, 4.0, -1.5, 9.25, 2.0, 6.5];
        let mut s = input;
        forward_1d(&mut s);
        inverse_1d(&mut s);
        for (a, b) in input.iter().zip(s.iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_tiny_slices_untouched() {
        let mut one = [42.0];
        forward_1d(&mut one);
        assert_eq!(one, [42.0]);
        inverse_1d(&mut one);
        assert_eq!(one, [42.0]);
    }

    #[test]
    fn test_forward_inverse_2d_multilevel() {
        let lines = 9;
        let samples = 13;
        let input: Vec<f32> = (0..lines * samples)
            .map(|i| ((i * 37 % 101) as f32) - 50.0)
            .collect();
        for levels in 1..=3 {
            let mut s = input.clone();
            forward_2d(&mut s, lines, samples, levels);
            inverse_2d(&mut s, lines, samples, levels);
            for (a, b) in input.iter().zip(s.iter()) {
                assert!((a - b).abs() < 1e-2, "levels {}: {} vs {}", levels, a, b);
            }
        }
    }

    #[test]
    fn test_forward_concentrates_energy_in_ll() {
        // A smooth ramp should leave almost everything in the low-pass band.
        let samples = 16;
        let mut s: Vec<f32> = (0..samples).map(|i| i as f32).collect();
        forward_1d(&mut s);
        let low: f32 = s[..8].iter().map(|v| v.abs()).sum();
        let high: f32 = s[8..].iter().map(|v| v.abs()).sum();
        assert!(high < low / 10.0, "high {} low {}", high, low);
    }
}
