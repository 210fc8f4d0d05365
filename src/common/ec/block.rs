use super::galois::G;

// Reed-Solomon block holding data codewords followed by ecc codewords
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Block {
    pub(crate) data: Vec<u8>,
    // Data length
    pub(crate) dlen: usize,
}

impl Block {
    /// Builds a block of `len` codewords with `len - raw.len()` ecc codewords computed from `raw`
    pub fn new(raw: &[u8], len: usize) -> Self {
        debug_assert!(len > raw.len(), "Block length {len} must exceed data length {}", raw.len());

        let dlen = raw.len();
        let mut data = Vec::with_capacity(len);
        data.extend_from_slice(raw);
        let ecc = compute_ecc(raw, len - dlen);
        data.extend_from_slice(&ecc);
        Self { data, dlen }
    }

    pub fn with_encoded(encoded: &[u8], dlen: usize) -> Self {
        debug_assert!(dlen <= encoded.len(), "Data length exceeds block length");

        Self { data: encoded.to_vec(), dlen }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn ec_len(&self) -> usize {
        self.data.len() - self.dlen
    }

    #[cfg(test)]
    pub fn full_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlen]
    }

    pub fn ecc(&self) -> &[u8] {
        &self.data[self.dlen..]
    }
}

// Ecc computation
//------------------------------------------------------------------------------

// Generator polynomial (x - a^0)(x - a^1)...(x - a^(n-1)), highest degree first with implicit
// leading 1 dropped
pub fn generator_poly(n: usize) -> Vec<G> {
    let mut res = vec![G::ZERO; n];
    res[n - 1] = G::ONE;

    let mut root = G::ONE;
    for _ in 0..n {
        for j in 0..n {
            res[j] *= root;
            if j + 1 < n {
                let next = res[j + 1];
                res[j] += next;
            }
        }
        root *= G(2);
    }
    res
}

// Remainder of data(x) * x^n divided by the generator polynomial
pub fn compute_ecc(data: &[u8], n: usize) -> Vec<u8> {
    let gen = generator_poly(n);
    let mut rem = vec![G::ZERO; n];
    for &b in data {
        let factor = G(b) + rem[0];
        rem.rotate_left(1);
        rem[n - 1] = G::ZERO;
        for (r, &g) in rem.iter_mut().zip(gen.iter()) {
            *r += g * factor;
        }
    }
    rem.into_iter().map(u8::from).collect()
}
