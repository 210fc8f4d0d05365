use super::{galois::G, Block};
use crate::common::error::{DecodeError, DecodeResult};

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Corrects the block in place and returns the number of corrected codewords. Fails with
    /// `UncorrectableBlock` when more than ec_len / 2 codewords are wrong and the error
    /// locator doesn't resolve to a consistent set of positions.
    pub fn rectify(&mut self) -> DecodeResult<usize> {
        let ec_len = self.ec_len();

        // Compute syndromes
        let synd = match self.syndromes() {
            Some(s) => s,
            None => return Ok(0),
        };

        // Error locator polynomial
        let sig = berlekamp_massey(&synd)?;
        let deg = sig.len() - 1;
        if deg * 2 > ec_len {
            return Err(DecodeError::UncorrectableBlock);
        }

        // Error evaluator
        let omg = omega(&synd, &sig);

        // Sigma derivative, odd powers only
        let dsig: Vec<G> =
            (1..sig.len()).map(|i| if i & 1 == 1 { sig[i] } else { G::ZERO }).collect();

        // Chien search & Forney
        let len = self.len();
        let mut count = 0;
        for i in 0..len {
            let pos = len - 1 - i;
            let xinv = G::gen_pow(255 - pos % 255);
            if eval_poly(&sig, xinv) != G::ZERO {
                continue;
            }
            let den = eval_poly(&dsig, xinv);
            let mag = G::gen_pow(pos) * eval_poly(&omg, xinv).checked_div(den)?;
            self.data[i] = (G(self.data[i]) + mag).into();
            count += 1;
        }

        if count != deg || self.syndromes().is_some() {
            return Err(DecodeError::UncorrectableBlock);
        }

        Ok(count)
    }

    // Returns None if all syndromes are zero
    fn syndromes(&self) -> Option<Vec<G>> {
        let synd: Vec<G> = (0..self.ec_len())
            .map(|i| {
                let x = G::gen_pow(i);
                self.data.iter().fold(G::ZERO, |acc, &b| acc * x + G(b))
            })
            .collect();

        if synd.iter().all(|&s| s == G::ZERO) {
            None
        } else {
            Some(synd)
        }
    }
}

// Sigma polynomial, lowest degree first and trimmed to its degree
fn berlekamp_massey(synd: &[G]) -> DecodeResult<Vec<G>> {
    let n = synd.len();
    let mut l = 0usize;
    let mut m = 1usize;
    let mut b = G::ONE;
    let mut cx = vec![G::ZERO; n + 1];
    let mut bx = vec![G::ZERO; n + 1];
    cx[0] = G::ONE;
    bx[0] = G::ONE;

    for k in 0..n {
        // Discrepancy
        let mut d = synd[k];
        for i in 1..=l {
            d += cx[i] * synd[k - i];
        }

        if d == G::ZERO {
            m += 1;
            continue;
        }

        let scale = d.checked_div(b)?;
        let tx = cx.clone();
        for i in 0..=n - m {
            cx[i + m] += scale * bx[i];
        }

        if 2 * l <= k {
            bx = tx;
            l = k + 1 - l;
            b = d;
            m = 1;
        } else {
            m += 1;
        }
    }

    cx.truncate(l + 1);
    Ok(cx)
}

// Error evaluator: S(x) * sigma(x) mod x^n
fn omega(synd: &[G], sig: &[G]) -> Vec<G> {
    let n = synd.len();
    let mut omg = vec![G::ZERO; n];
    for (i, &s) in synd.iter().enumerate() {
        for (j, &c) in sig.iter().take(n - i).enumerate() {
            omg[i + j] += s * c;
        }
    }
    omg
}

fn eval_poly(poly: &[G], x: G) -> G {
    let mut res = G::ZERO;
    let mut xpow = G::ONE;
    for &coeff in poly {
        res += coeff * xpow;
        xpow *= x;
    }
    res
}


// Rectifier for format and version infos
//------------------------------------------------------------------------------

/// Returns the valid number nearest to `info` by hamming distance, if within `err_capacity`
pub fn rectify_info(info: u32, valid_numbers: &[u32], err_capacity: u32) -> Option<u32> {
    let res = *valid_numbers.iter().min_by_key(|&n| (info ^ n).count_ones())?;

    if (info ^ res).count_ones() <= err_capacity {
        Some(res)
    } else {
        None
    }
}

#[cfg(test)]
mod rectify_info_tests {
    use super::rectify_info;
    use crate::common::metadata::{valid_format_infos, valid_version_infos};

    #[test]
    fn test_rectify_format_info() {
        let infos = valid_format_infos();
        let info = infos[5];
        assert_eq!(rectify_info(info, &infos, 3), Some(info));
        assert_eq!(rectify_info(info ^ 0b100_0000_0100_0001, &infos, 3), Some(info));
        assert_eq!(rectify_info(info ^ 0b111_1111_0000_0000, &infos, 3), None);
    }

    #[test]
    fn test_rectify_version_info() {
        let infos = valid_version_infos();
        let info = infos[10];
        assert_eq!(rectify_info(info ^ 0b10_0000_0000_0000_0101, &infos, 3), Some(info));
    }
}
