use std::fmt::{Display, Error, Formatter};
use std::ops::{Deref, Not};

use super::codec::Mode;
use super::mask::MaskPattern;

// Color
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Color {
    Dark,
    Light,
}

impl Color {
    pub fn select<T>(&self, dark: T, light: T) -> T {
        match self {
            Self::Dark => dark,
            Self::Light => light,
        }
    }
}

impl Not for Color {
    type Output = Self;
    fn not(self) -> Self::Output {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl From<bool> for Color {
    fn from(dark: bool) -> Self {
        if dark {
            Self::Dark
        } else {
            Self::Light
        }
    }
}

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, PartialOrd, Ord)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    pub const ALL: [ECLevel; 4] = [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H];

    // Two bit indicator stored in format info
    pub fn format_bits(self) -> u32 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub fn from_format_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Self::L,
            0b00 => Self::M,
            0b11 => Self::Q,
            _ => Self::H,
        }
    }
}

impl Display for ECLevel {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, PartialOrd, Ord)]
pub struct Version(usize);

impl Deref for Version {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub const MIN: Version = Version(1);
    pub const MAX: Version = Version(40);

    pub fn new(v: usize) -> Option<Self> {
        if (1..=40).contains(&v) {
            Some(Self(v))
        } else {
            None
        }
    }

    pub fn from_grid_size(size: usize) -> Option<Self> {
        if size < 21 || (size - 17) % 4 != 0 {
            return None;
        }
        Self::new((size - 17) / 4)
    }

    pub const fn width(self) -> usize {
        self.0 * 4 + 17
    }

    pub fn alignment_pattern(self) -> Vec<i16> {
        let v = self.0;
        if v == 1 {
            return Vec::new();
        }
        let count = v / 7 + 2;
        let step = if v == 32 { 26 } else { (v * 4 + count * 2 + 1) / (count * 2 - 2) * 2 };
        let w = self.width();
        let mut res: Vec<i16> = (0..count - 1).map(|i| (w - 7 - i * step) as i16).collect();
        res.push(6);
        res.reverse();
        res
    }

    // Number of modules available for data and ecc, including remainder bits
    pub fn raw_data_modules(self) -> usize {
        let v = self.0;
        let mut res = (16 * v + 128) * v + 64;
        if v >= 2 {
            let align = v / 7 + 2;
            res -= (25 * align - 10) * align - 55;
            if v >= 7 {
                res -= 36;
            }
        }
        res
    }

    pub fn total_codewords(self) -> usize {
        self.raw_data_modules() >> 3
    }

    pub fn remainder_bits(self) -> usize {
        self.raw_data_modules() & 7
    }

    pub fn ecc_per_block(self, ecl: ECLevel) -> usize {
        ECC_PER_BLOCK[ecl as usize][self.0 - 1]
    }

    pub fn block_count(self, ecl: ECLevel) -> usize {
        BLOCK_COUNT[ecl as usize][self.0 - 1]
    }

    /// Returns (short block data size, short block count, long block data size, long block count).
    /// Long blocks carry one more data codeword and always come after the short ones.
    pub fn data_codewords_per_block(self, ecl: ECLevel) -> (usize, usize, usize, usize) {
        let total = self.total_codewords();
        let blocks = self.block_count(ecl);
        let ecc = self.ecc_per_block(ecl);
        let long_count = total % blocks;
        let short_count = blocks - long_count;
        let short_size = total / blocks - ecc;
        let long_size = if long_count > 0 { short_size + 1 } else { 0 };
        (short_size, short_count, long_size, long_count)
    }

    pub fn data_capacity(self, ecl: ECLevel) -> usize {
        self.total_codewords() - self.ecc_per_block(ecl) * self.block_count(ecl)
    }

    pub fn data_bit_capacity(self, ecl: ECLevel) -> usize {
        self.data_capacity(ecl) << 3
    }

    // Number of codewords which can be corrected across the whole symbol
    pub fn ec_capacity(self, ecl: ECLevel) -> usize {
        let p = match (self.0, ecl) {
            (1, ECLevel::L) => 3,
            (2, ECLevel::L) | (1, ECLevel::M) => 2,
            (1, _) | (3, ECLevel::L) => 1,
            _ => 0,
        };
        (self.ecc_per_block(ecl) * self.block_count(ecl) - p) / 2
    }

    pub fn mode_bits(self) -> usize {
        4
    }

    pub fn char_cnt_bits(self, mode: Mode) -> usize {
        let tier = match self.0 {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match mode {
            Mode::Numeric => [10, 12, 14][tier],
            Mode::Alphanumeric => [9, 11, 13][tier],
            Mode::Byte => [8, 16, 16][tier],
            Mode::Kanji => [8, 10, 12][tier],
            Mode::Eci | Mode::Terminator => 0,
        }
    }

    /// 18 bit version info: 6 bit version followed by 12 bit BCH remainder
    pub fn info(self) -> u32 {
        debug_assert!(self.0 >= 7, "Version info only exists for version 7 and above");
        let data = self.0 as u32;
        let mut rem = data;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * VERSION_INFO_GENERATOR);
        }
        data << 12 | rem
    }
}

#[cfg(test)]
mod version_tests {
    use test_case::test_case;

    use super::{ECLevel, Version};

    #[test_case(1, 26, 19, 16, 13, 9)]
    #[test_case(2, 44, 34, 28, 22, 16)]
    #[test_case(5, 134, 108, 86, 62, 46)]
    #[test_case(7, 196, 156, 124, 88, 66)]
    #[test_case(10, 346, 274, 216, 154, 122)]
    #[test_case(27, 1828, 1468, 1128, 808, 628)]
    #[test_case(40, 3706, 2956, 2334, 1666, 1276)]
    fn test_capacity(v: usize, total: usize, l: usize, m: usize, q: usize, h: usize) {
        let ver = Version::new(v).unwrap();
        assert_eq!(ver.total_codewords(), total);
        assert_eq!(ver.data_capacity(ECLevel::L), l);
        assert_eq!(ver.data_capacity(ECLevel::M), m);
        assert_eq!(ver.data_capacity(ECLevel::Q), q);
        assert_eq!(ver.data_capacity(ECLevel::H), h);
    }

    #[test]
    fn test_block_layout() {
        let ver = Version::new(5).unwrap();
        assert_eq!(ver.data_codewords_per_block(ECLevel::Q), (15, 2, 16, 2));
        let ver = Version::new(1).unwrap();
        assert_eq!(ver.data_codewords_per_block(ECLevel::M), (16, 1, 0, 0));
        for v in 1..=40 {
            let ver = Version::new(v).unwrap();
            for ecl in ECLevel::ALL {
                let (s, sc, l, lc) = ver.data_codewords_per_block(ecl);
                let ecc = ver.ecc_per_block(ecl) * (sc + lc);
                assert_eq!(s * sc + l * lc + ecc, ver.total_codewords());
            }
        }
    }

    #[test_case(1, vec![])]
    #[test_case(2, vec![6, 18])]
    #[test_case(7, vec![6, 22, 38])]
    #[test_case(32, vec![6, 34, 60, 86, 112, 138])]
    #[test_case(40, vec![6, 30, 58, 86, 114, 142, 170])]
    fn test_alignment_pattern(v: usize, exp: Vec<i16>) {
        assert_eq!(Version::new(v).unwrap().alignment_pattern(), exp);
    }

    #[test_case(1, 0)]
    #[test_case(2, 7)]
    #[test_case(7, 0)]
    #[test_case(14, 3)]
    #[test_case(21, 4)]
    #[test_case(28, 3)]
    #[test_case(35, 0)]
    fn test_remainder_bits(v: usize, exp: usize) {
        assert_eq!(Version::new(v).unwrap().remainder_bits(), exp);
    }

    #[test_case(7, 0x07C94)]
    #[test_case(8, 0x085BC)]
    #[test_case(21, 0x15683)]
    #[test_case(40, 0x28C69)]
    fn test_version_info(v: usize, exp: u32) {
        assert_eq!(Version::new(v).unwrap().info(), exp);
    }

    #[test]
    fn test_grid_size() {
        assert_eq!(Version::from_grid_size(21), Version::new(1));
        assert_eq!(Version::from_grid_size(177), Version::new(40));
        assert_eq!(Version::from_grid_size(22), None);
        assert_eq!(Version::from_grid_size(181), None);
        assert_eq!(Version::new(0), None);
    }
}

// Format info
//------------------------------------------------------------------------------

/// 15 bit format info: 2 bit ec level, 3 bit mask, 10 bit BCH remainder, masked with 0x5412
pub fn format_info(ecl: ECLevel, mask: MaskPattern) -> u32 {
    let data = ecl.format_bits() << 3 | *mask as u32;
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * FORMAT_INFO_GENERATOR);
    }
    (data << 10 | rem) ^ FORMAT_MASK
}

pub fn parse_format_info(info: u32) -> (ECLevel, MaskPattern) {
    let data = info >> 10;
    let ecl = ECLevel::from_format_bits(data >> 3);
    let mask = MaskPattern::new((data & 0b111) as u8);
    (ecl, mask)
}

pub fn valid_format_infos() -> Vec<u32> {
    ECLevel::ALL
        .iter()
        .flat_map(|&ecl| (0..8).map(move |m| format_info(ecl, MaskPattern::new(m))))
        .collect()
}

pub fn valid_version_infos() -> Vec<u32> {
    (7..=40).filter_map(Version::new).map(Version::info).collect()
}


// Global constants
//------------------------------------------------------------------------------

pub const FORMAT_INFO_BIT_LEN: usize = 15;

pub const FORMAT_MASK: u32 = 0b101010000010010;

pub const FORMAT_INFO_GENERATOR: u32 = 0b10100110111;

pub const FORMAT_ERROR_CAPACITY: u32 = 3;

pub const VERSION_INFO_GENERATOR: u32 = 0b1111100100101;

pub const VERSION_ERROR_BIT_LEN: usize = 12;

pub const VERSION_ERROR_CAPACITY: u32 = 3;

// Format info module positions, least significant bit first. Negative indices wrap from the far edge
pub static FORMAT_INFO_COORDS_MAIN: [(i16, i16); 15] = [
    (0, 8), (1, 8), (2, 8), (3, 8), (4, 8), (5, 8), (7, 8), (8, 8),
    (8, 7), (8, 5), (8, 4), (8, 3), (8, 2), (8, 1), (8, 0),
];

pub static FORMAT_INFO_COORDS_SIDE: [(i16, i16); 15] = [
    (8, -1), (8, -2), (8, -3), (8, -4), (8, -5), (8, -6), (8, -7), (8, -8),
    (-7, 8), (-6, 8), (-5, 8), (-4, 8), (-3, 8), (-2, 8), (-1, 8),
];

// Always dark, sits just above the side copy of format info
pub const DARK_MODULE: (i16, i16) = (-8, 8);

// Version info module positions, least significant bit first
pub static VERSION_INFO_COORDS_TR: [(i16, i16); 18] = version_info_coords(false);

pub static VERSION_INFO_COORDS_BL: [(i16, i16); 18] = version_info_coords(true);

const fn version_info_coords(transpose: bool) -> [(i16, i16); 18] {
    let mut res = [(0, 0); 18];
    let mut i = 0;
    while i < 18 {
        let (a, b) = ((i / 3) as i16, (i % 3) as i16 - 11);
        res[i] = if transpose { (b, a) } else { (a, b) };
        i += 1;
    }
    res
}

// Indexed by ec level L, M, Q, H and then version - 1
static ECC_PER_BLOCK: [[usize; 40]; 4] = [
    [
        7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

static BLOCK_COUNT: [[usize; 40]; 4] = [
    [
        1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13, 14,
        15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21, 23, 25,
        26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29, 34,
        34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35, 37,
        40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];
