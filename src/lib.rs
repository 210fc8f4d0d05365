//! # qrcodec
//!
//! Encoder and reader for Model 2 QR symbols, versions 1 to 40 at all four error correction
//! levels.
//!
//! ## Features
//!
//! - **Encoding**: Text is split into Numeric, Alphanumeric and Byte segments by a cost minimizing
//!   planner, placed in the smallest version that fits, and masked with the lowest penalty pattern
//! - **Rendering**: Any foreground and background color, module size and quiet zone
//! - **Reading**: Symbols are located in photos or screenshots, rectified through a perspective
//!   transform and repaired with Reed-Solomon error correction
//! - **History and styles**: A bounded history of recent results and validated color presets
//!
//! ## Quick Start
//!
//! ```rust
//! use qrcodec::ECLevel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = qrcodec::encode("Hello, World!", ECLevel::M, None)?;
//! let img = qr.to_image(4);
//!
//! let decoded = qrcodec::decode(&img)?;
//! assert_eq!(decoded.text(), "Hello, World!");
//! assert_eq!(decoded.version, qr.version());
//! # Ok(())
//! # }
//! ```
//!
//! ### Full Configuration
//!
//! ```rust
//! use qrcodec::{ECLevel, MaskPattern, QRBuilder, Version};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = QRBuilder::new(b"Hello, World!")
//!     .version(Version::new(3).ok_or("bad version")?) // Smallest fitting version if unset
//!     .ec_level(ECLevel::Q)                            // Defaults to ECLevel::M
//!     .mask(MaskPattern::new(3))                       // Lowest penalty mask if unset
//!     .build()?;
//!
//! let img = qr.render(image::Rgb([0x99, 0x1b, 0x1b]), image::Rgb([255, 255, 255]), 6, 2);
//! img.save("configured_qr.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a QR Code
//!
//! ```rust,no_run
//! use qrcodec::QRReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("qr_code.png")?.to_luma8();
//! let decoded = QRReader::new().try_inverted(false).read(&img)?;
//! println!("{} ({} {})", decoded.text(), decoded.version, decoded.ec_level);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Correction Levels
//! - **L (Low)**: ~7% of codewords recoverable
//! - **M (Medium)**: ~15%
//! - **Q (Quartile)**: ~25%
//! - **H (High)**: ~30%

#![allow(clippy::items_after_test_module, clippy::suspicious_arithmetic_impl)]

pub mod builder;
pub(crate) mod common;
pub mod history;
pub mod reader;
pub mod style;

use image::{GenericImageView, Pixel, Rgb, RgbImage};

pub use builder::{Charset, QRBuilder, QR};
pub use common::codec::Mode;
pub use common::error::{
    DecodeError, DecodeResult, EncodeError, EncodeResult, StyleError,
};
pub use common::mask::MaskPattern;
pub use common::metadata::{Color, ECLevel, Version};
pub use history::{Entry, History};
pub use reader::{Decoded, QRReader};
pub use style::{Preset, Style};

/// Encodes UTF-8 text in the smallest version, no smaller than `min_version`, that holds it at
/// `ec_level`.
pub fn encode(text: &str, ec_level: ECLevel, min_version: Option<usize>) -> EncodeResult<QR> {
    let mut builder = QRBuilder::new(text.as_bytes());
    builder.ec_level(ec_level);
    if let Some(v) = min_version {
        builder.min_version(Version::new(v).ok_or(EncodeError::InvalidVersion)?);
    }
    builder.build()
}

/// Renders the matrix with `margin` modules of quiet zone, each module `module_size` pixels wide
pub fn render(qr: &QR, fg: Rgb<u8>, bg: Rgb<u8>, module_size: u32, margin: u32) -> RgbImage {
    qr.render(fg, bg, module_size, margin)
}

/// Reads the first decodable symbol with the default reader settings
pub fn decode<I>(img: &I) -> DecodeResult<Decoded>
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    QRReader::new().read(img)
}
