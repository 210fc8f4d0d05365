use std::fmt::{Display, Error, Formatter};

use crate::common::error::{DecodeError, DecodeResult};

// Mode
//------------------------------------------------------------------------------

/// Segment kind, discriminant is the 4-bit mode indicator
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Mode {
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    Byte = 0b0100,
    Kanji = 0b1000,
    Eci = 0b0111,
    Terminator = 0b0000,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let s = match self {
            Self::Numeric => "Numeric",
            Self::Alphanumeric => "Alphanumeric",
            Self::Byte => "Byte",
            Self::Kanji => "Kanji",
            Self::Eci => "ECI",
            Self::Terminator => "Terminator",
        };
        f.write_str(s)
    }
}

impl Mode {
    pub fn from_bits(bits: u16) -> Option<Self> {
        [Self::Numeric, Self::Alphanumeric, Self::Byte, Self::Kanji, Self::Eci, Self::Terminator]
            .into_iter()
            .find(|&m| m as u16 == bits)
    }

    // Digits per chunk and the radix each digit is written in
    fn radix(self) -> Option<(usize, u16)> {
        match self {
            Self::Numeric => Some((3, 10)),
            Self::Alphanumeric => Some((2, 45)),
            _ => None,
        }
    }

    fn value_of(self, ch: u8) -> u16 {
        debug_assert!(self.contains(ch), "{} can't hold {ch}", self);
        ALPHANUMERIC_CHARSET.iter().position(|&c| c == ch).unwrap_or(0) as u16
    }

    /// Packs up to 3 digits, 2 alphanumeric chars or 1 byte into a number
    pub fn encode_chunk(&self, data: &[u8]) -> u16 {
        match self.radix() {
            Some((max, radix)) => {
                debug_assert!(data.len() <= max, "{self} chunk of {} chars", data.len());
                data.iter().fold(0, |acc, &b| acc * radix + self.value_of(b))
            }
            None => {
                debug_assert!(*self == Self::Byte && data.len() == 1, "{self} can't encode a chunk");
                data.first().map_or(0, |&b| b as u16)
            }
        }
    }

    /// Unpacks a chunk read off the stream. Values outside the mode's range are malformed.
    pub fn decode_chunk(&self, data: u16, bit_len: usize) -> DecodeResult<Vec<u8>> {
        let (chars, radix) = match self {
            Self::Byte => return Ok(vec![data as u8]),
            // 10, 7 or 4 bits for numeric, 11 or 6 for alphanumeric
            Self::Numeric => (bit_len / 3, 10u16),
            Self::Alphanumeric => (bit_len / 5, 45u16),
            _ => return Err(DecodeError::MalformedSegment),
        };
        debug_assert_eq!(self.encoded_len(chars), bit_len, "Bad {self} chunk length");

        if data >= radix.pow(chars as u32) {
            return Err(DecodeError::MalformedSegment);
        }
        let mut res = vec![0; chars];
        let mut rest = data;
        for slot in res.iter_mut().rev() {
            *slot = ALPHANUMERIC_CHARSET[(rest % radix) as usize];
            rest /= radix;
        }
        Ok(res)
    }

    pub fn contains(&self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => ALPHANUMERIC_CHARSET.contains(&byte),
            Self::Byte => true,
            Self::Kanji | Self::Eci | Self::Terminator => false,
        }
    }

    /// Bits taken by `len` chars
    pub fn encoded_len(&self, len: usize) -> usize {
        match *self {
            Self::Numeric => (len * 10).div_ceil(3),
            Self::Alphanumeric => (len * 11).div_ceil(2),
            Self::Byte => len * 8,
            Self::Kanji => len * 13,
            Self::Eci | Self::Terminator => 0,
        }
    }
}

#[cfg(test)]
mod mode_tests {
    use test_case::test_case;

    use super::Mode::{self, *};
    use crate::common::error::DecodeError;

    #[test_case(0b0001, Some(Numeric))]
    #[test_case(0b0010, Some(Alphanumeric))]
    #[test_case(0b0100, Some(Byte))]
    #[test_case(0b0111, Some(Eci))]
    #[test_case(0b0000, Some(Terminator))]
    #[test_case(0b0011, None)]
    #[test_case(0b1111, None)]
    fn test_from_bits(bits: u16, exp: Option<Mode>) {
        assert_eq!(Mode::from_bits(bits), exp);
    }

    #[test_case(Numeric, b"012", 12)]
    #[test_case(Numeric, b"901", 901)]
    #[test_case(Numeric, b"67", 67)]
    #[test_case(Numeric, b"8", 8)]
    #[test_case(Alphanumeric, b"AC", 462)]
    #[test_case(Alphanumeric, b"-4", 1849)]
    #[test_case(Alphanumeric, b"2", 2)]
    #[test_case(Alphanumeric, b"::", 2024)]
    #[test_case(Byte, b"\xe9", 0xe9)]
    fn test_chunks(mode: Mode, chars: &[u8], value: u16) {
        assert_eq!(mode.encode_chunk(chars), value);
        let bit_len = mode.encoded_len(chars.len());
        assert_eq!(mode.decode_chunk(value, bit_len), Ok(chars.to_vec()));
    }

    #[test]
    #[should_panic]
    fn test_numeric_chunk_too_long() {
        Numeric.encode_chunk(b"1234");
    }

    #[test_case(Numeric, 1000, 10)]
    #[test_case(Numeric, 100, 7)]
    #[test_case(Numeric, 10, 4)]
    #[test_case(Alphanumeric, 2025, 11)]
    #[test_case(Alphanumeric, 45, 6)]
    #[test_case(Kanji, 0, 13)]
    fn test_decode_out_of_range(mode: Mode, value: u16, bit_len: usize) {
        assert_eq!(mode.decode_chunk(value, bit_len), Err(DecodeError::MalformedSegment));
    }

    #[test]
    fn test_contains() {
        assert!(Numeric.contains(b'0'));
        assert!(!Numeric.contains(b'A'));
        assert!(Alphanumeric.contains(b'Z'));
        assert!(Alphanumeric.contains(b'$'));
        assert!(!Alphanumeric.contains(b'a'));
        assert!(!Alphanumeric.contains(b'@'));
        assert!(Byte.contains(0xff));
        assert!(!Kanji.contains(b'0'));
    }

    #[test]
    fn test_encoded_len() {
        let lens = [(Numeric, 3, 10), (Numeric, 2, 7), (Numeric, 1, 4), (Alphanumeric, 2, 11)];
        for (mode, chars, bits) in lens {
            assert_eq!(mode.encoded_len(chars), bits);
        }
        assert_eq!(Alphanumeric.encoded_len(1), 6);
        assert_eq!(Byte.encoded_len(3), 24);
    }
}

// Segment
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub mode: Mode,
    pub mode_bits: usize, // Bit len of mode
    pub len_bits: usize,  // Bit len of char count
    pub data: &'a [u8],   // Reference to raw data
}

impl<'a> Segment<'a> {
    pub fn new(mode: Mode, mode_bits: usize, len_bits: usize, data: &'a [u8]) -> Self {
        Self { mode, mode_bits, len_bits, data }
    }

    pub fn bit_len(&self) -> usize {
        let encoded_bits = self.mode.encoded_len(self.data.len());
        self.mode_bits + self.len_bits + encoded_bits
    }
}

#[cfg(test)]
mod segment_tests {
    use test_case::test_case;

    use super::{Mode, Segment};
    use crate::common::metadata::Version;

    #[test_case(1, Mode::Numeric, "123", 24)]
    #[test_case(1, Mode::Numeric, "45", 21)]
    #[test_case(1, Mode::Numeric, "6", 18)]
    #[test_case(10, Mode::Numeric, "123", 26)]
    #[test_case(27, Mode::Numeric, "6", 22)]
    #[test_case(1, Mode::Alphanumeric, "AZ", 24)]
    #[test_case(10, Mode::Alphanumeric, "-", 21)]
    #[test_case(27, Mode::Alphanumeric, "AZ", 28)]
    #[test_case(1, Mode::Byte, "a", 20)]
    #[test_case(10, Mode::Byte, "ab", 36)]
    #[test_case(27, Mode::Byte, "abc", 44)]
    fn test_bit_len(v: usize, mode: Mode, data: &str, exp: usize) {
        let ver = Version::new(v).unwrap();
        let seg = Segment::new(mode, ver.mode_bits(), ver.char_cnt_bits(mode), data.as_bytes());
        assert_eq!(seg.bit_len(), exp);
    }
}

// Global constants
//------------------------------------------------------------------------------

pub static PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];

pub static MODES: [Mode; 3] = [Mode::Numeric, Mode::Alphanumeric, Mode::Byte];

// Alphanumeric chars in value order
static ALPHANUMERIC_CHARSET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";
