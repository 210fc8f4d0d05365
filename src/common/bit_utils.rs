use std::{fmt::Display, mem};

use num_traits::PrimInt;

use super::error::StreamError;

// Bit stream
//------------------------------------------------------------------------------

/// MSB-first bit buffer. Appended to while encoding, read through a cursor while decoding.
#[derive(Debug, Clone)]
pub struct BitStream {
    data: Vec<u8>,
    len: usize,      // Bits written
    capacity: usize, // Bits allowed
    cursor: usize,   // Next bit to read
}

impl BitStream {
    pub fn new(capacity: usize) -> Self {
        Self { data: vec![0; capacity.div_ceil(8)], len: 0, capacity, cursor: 0 }
    }

    /// Full stream over `bytes`, ready to be read from the start
    pub fn from(bytes: &[u8]) -> Self {
        let len = bytes.len() * 8;
        Self { data: bytes.to_vec(), len, capacity: len, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.len - self.cursor
    }

    /// Written bytes, the last one zero padded
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len.div_ceil(8)]
    }

    fn bit(&self, idx: usize) -> bool {
        (self.data[idx / 8] >> (7 - idx % 8)) & 1 == 1
    }
}

// Writing
//------------------------------------------------------------------------------

impl BitStream {
    /// Appends the low `size` bits of `bits`, most significant first
    pub fn push_bits<T>(&mut self, bits: T, size: usize)
    where
        T: PrimInt + Display,
    {
        let width = mem::size_of::<T>() * 8 - bits.leading_zeros() as usize;
        debug_assert!(size <= 16, "At most 16 bits per push, got {size}");
        debug_assert!(width <= size, "{bits} needs {width} bits, only {size} given");
        debug_assert!(self.len + size <= self.capacity, "Pushing {size} bits overflows {}", self.capacity);

        let value = bits.to_u32().unwrap_or(0);
        (0..size).rev().for_each(|i| self.push((value >> i) & 1 == 1));
    }

    pub fn push(&mut self, bit: bool) {
        debug_assert!(self.len < self.capacity, "Bit stream full at {} bits", self.capacity);

        self.data[self.len / 8] |= (bit as u8) << (7 - self.len % 8);
        self.len += 1;
    }

    /// Appends whole bytes. The stream must be byte aligned.
    pub fn extend(&mut self, bytes: &[u8]) {
        debug_assert!(self.len % 8 == 0, "Unaligned extend at bit {}", self.len);
        debug_assert!(
            self.len + bytes.len() * 8 <= self.capacity,
            "Extending by {} bytes overflows {} bits",
            bytes.len(),
            self.capacity
        );

        let start = self.len / 8;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len() * 8;
    }
}


// Reading
//------------------------------------------------------------------------------

impl BitStream {
    /// Reads the next `n` bits as a big endian number
    pub fn take_bits(&mut self, n: usize) -> Result<u16, StreamError> {
        debug_assert!(n <= 16, "At most 16 bits per take, got {n}");

        if self.remaining() < n {
            return Err(StreamError::OutOfData);
        }

        let mut res = 0u16;
        for _ in 0..n {
            res = (res << 1) | self.bit(self.cursor) as u16;
            self.cursor += 1;
        }
        Ok(res)
    }

    pub fn take(&mut self) -> Option<bool> {
        if self.cursor == self.len {
            return None;
        }
        let bit = self.bit(self.cursor);
        self.cursor += 1;
        Some(bit)
    }
}

impl Iterator for BitStream {
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        self.take()
    }
}
