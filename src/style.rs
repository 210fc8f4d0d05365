use std::ops::RangeInclusive;

use image::{Rgb, RgbImage};

use crate::builder::{QRBuilder, QR};
use crate::common::error::{EncodeResult, StyleError};
use crate::common::metadata::ECLevel;

pub const MODULE_SIZE_RANGE: RangeInclusive<u32> = 1..=64;

pub const MARGIN_RANGE: RangeInclusive<u32> = 0..=8;

pub const TARGET_SIZE_RANGE: RangeInclusive<u32> = 200..=800;

// Symbols below this contrast ratio don't scan reliably
pub const MIN_CONTRAST_RATIO: f64 = 1.5;

// Presets
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Classic,
    Red,
    DarkRed,
    Crimson,
    Dark,
}

impl Preset {
    pub const ALL: [Preset; 5] =
        [Preset::Classic, Preset::Red, Preset::DarkRed, Preset::Crimson, Preset::Dark];

    /// (foreground, background)
    pub fn colors(self) -> (Rgb<u8>, Rgb<u8>) {
        const WHITE: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);
        match self {
            Self::Classic => (Rgb([0x00, 0x00, 0x00]), WHITE),
            Self::Red => (Rgb([0xdc, 0x26, 0x26]), WHITE),
            Self::DarkRed => (Rgb([0x99, 0x1b, 0x1b]), WHITE),
            Self::Crimson => (Rgb([0xdc, 0x14, 0x3c]), WHITE),
            Self::Dark => (WHITE, Rgb([0x1f, 0x29, 0x37])),
        }
    }
}

// Style
//------------------------------------------------------------------------------

/// Presentation settings for a rendered symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub fg: Rgb<u8>,
    pub bg: Rgb<u8>,
    pub module_size_px: u32,
    pub margin_modules: u32,
    pub ec_level: ECLevel,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fg: Rgb([0x1f, 0x29, 0x37]),
            bg: Rgb([0xff, 0xff, 0xff]),
            module_size_px: 8,
            margin_modules: 2,
            ec_level: ECLevel::M,
        }
    }
}

impl Style {
    pub fn from_preset(preset: Preset) -> Self {
        let (fg, bg) = preset.colors();
        Self { fg, bg, ..Self::default() }
    }

    /// Parses `#rrggbb`, `rrggbb` or the short `#rgb` form
    pub fn parse_color(s: &str) -> Result<Rgb<u8>, StyleError> {
        let hex = s.trim();
        let (short, hex) = match hex.strip_prefix('#') {
            Some(h) if h.len() == 3 => (true, h),
            Some(h) => (false, h),
            None => (false, hex),
        };
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StyleError::InvalidColor);
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16);
        let channels = match (short, hex.len()) {
            (true, 3) => [0, 1, 2].map(|i| nibble(i).map(|n| n << 4 | n)),
            (false, 6) => [0, 2, 4].map(|i| u8::from_str_radix(&hex[i..i + 2], 16)),
            _ => return Err(StyleError::InvalidColor),
        };

        let mut rgb = [0u8; 3];
        for (dst, c) in rgb.iter_mut().zip(channels) {
            *dst = c.map_err(|_| StyleError::InvalidColor)?;
        }
        Ok(Rgb(rgb))
    }

    pub fn validate(&self) -> Result<(), StyleError> {
        if !MODULE_SIZE_RANGE.contains(&self.module_size_px) {
            return Err(StyleError::ModuleSizeOutOfRange);
        }
        if !MARGIN_RANGE.contains(&self.margin_modules) {
            return Err(StyleError::MarginOutOfRange);
        }
        if contrast_ratio(self.fg, self.bg) < MIN_CONTRAST_RATIO {
            return Err(StyleError::LowContrast);
        }
        Ok(())
    }

    /// Largest module size whose full render, margin included, fits in `target_px`. The target
    /// is clamped to 200..=800 px and the result is at least 1.
    pub fn fit_module_size(&self, target_px: u32, qr: &QR) -> u32 {
        let target = target_px.clamp(*TARGET_SIZE_RANGE.start(), *TARGET_SIZE_RANGE.end());
        let modules = qr.width() as u32 + 2 * self.margin_modules;
        (target / modules).max(1)
    }

    pub fn render(&self, qr: &QR) -> RgbImage {
        qr.render(self.fg, self.bg, self.module_size_px, self.margin_modules)
    }

    pub fn encode(&self, data: &str) -> EncodeResult<QR> {
        QRBuilder::new(data.as_bytes()).ec_level(self.ec_level).build()
    }
}

// Contrast
//------------------------------------------------------------------------------

fn relative_luminance(c: Rgb<u8>) -> f64 {
    let lin = |v: u8| {
        let v = v as f64 / 255.0;
        if v <= 0.03928 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * lin(c[0]) + 0.7152 * lin(c[1]) + 0.0722 * lin(c[2])
}

/// Ratio of the lighter to the darker relative luminance, from 1 to 21
pub fn contrast_ratio(a: Rgb<u8>, b: Rgb<u8>) -> f64 {
    let (la, lb) = (relative_luminance(a), relative_luminance(b));
    let (hi, lo) = if la > lb { (la, lb) } else { (lb, la) };
    (hi + 0.05) / (lo + 0.05)
}
