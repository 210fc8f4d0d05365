mod binarize;
mod finder;
mod symbol;
mod utils;

use std::borrow::Cow;

use encoding_rs::WINDOWS_1252;
use image::{GenericImageView, Pixel};
use log::{debug, trace};

use crate::common::{
    bit_utils::BitStream,
    codec::{decode::decode, Mode},
    ec::Block,
    error::{DecodeError, DecodeResult},
    mask::MaskPattern,
    metadata::{ECLevel, Version},
};
use binarize::BinaryImage;
use finder::{group_finders, locate_finders, FinderGroup};
use symbol::{finder_homography, locate_symbol, Symbol};

// ECI assignment number for UTF-8
const UTF8_ECI: u32 = 26;

// Groups tried before giving up on an image
const MAX_GROUPS: usize = 16;

// Decoded symbol
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub bytes: Vec<u8>,
    pub ec_level: ECLevel,
    pub version: Version,
    pub mask: MaskPattern,
    pub modes: Vec<Mode>,
    pub eci: Option<u32>,
    /// Codewords fixed by error correction across all blocks
    pub corrected: usize,
}

impl Decoded {
    /// Mode of every parsed segment, in stream order
    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    /// UTF-8 when the bytes are valid UTF-8 or declared so through ECI, windows-1252 otherwise.
    ///
    /// windows-1252 agrees with ISO-8859-1 except for 0x80..=0x9F, which map to printable
    /// characters such as '€' instead of C1 controls.
    pub fn text(&self) -> Cow<'_, str> {
        if self.eci == Some(UTF8_ECI) {
            return String::from_utf8_lossy(&self.bytes);
        }
        match std::str::from_utf8(&self.bytes) {
            Ok(s) => Cow::Borrowed(s),
            Err(_) => WINDOWS_1252.decode_without_bom_handling(&self.bytes).0,
        }
    }
}

// Reader
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct QRReader {
    try_inverted: bool,
}

impl Default for QRReader {
    fn default() -> Self {
        Self { try_inverted: true }
    }
}

impl QRReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to retry on the inverted image for light-on-dark symbols. On by default.
    pub fn try_inverted(&mut self, try_inverted: bool) -> &mut Self {
        self.try_inverted = try_inverted;
        self
    }

    /// Finds and decodes the first readable symbol in the image.
    pub fn read<I>(&self, img: &I) -> DecodeResult<Decoded>
    where
        I: GenericImageView,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let (w, h) = img.dimensions();
        debug!("Binarizing {w}x{h} image");
        let mut img = BinaryImage::prepare(img)?;

        let err = match decode_image(&mut img) {
            Ok(res) => return Ok(res),
            Err(e) => e,
        };

        if !self.try_inverted {
            return Err(err);
        }

        debug!("Retrying on inverted image after: {err}");
        img.invert();
        decode_image(&mut img).map_err(|e| {
            // A symbol located in the normal image outranks whatever the inversion turns up
            if stage(err) >= stage(DecodeError::FormatInfoCorrupt) {
                err
            } else {
                furthest(err, e)
            }
        })
    }
}

// How far into the pipeline an error got. The furthest failure is the one worth reporting.
fn stage(err: DecodeError) -> u8 {
    match err {
        DecodeError::LowQualityImage => 0,
        DecodeError::FinderPatternNotFound => 1,
        DecodeError::FormatInfoCorrupt => 2,
        DecodeError::UncorrectableBlock => 3,
        DecodeError::MalformedSegment => 4,
    }
}

fn furthest(a: DecodeError, b: DecodeError) -> DecodeError {
    if stage(b) > stage(a) {
        b
    } else {
        a
    }
}

fn decode_image(img: &mut BinaryImage) -> DecodeResult<Decoded> {
    let finders = locate_finders(img);
    debug!("Found {} finder candidate(s)", finders.len());

    let groups = group_finders(&finders);
    debug!("Formed {} finder group(s)", groups.len());

    let mut err = DecodeError::FinderPatternNotFound;
    for (i, group) in groups.iter().take(MAX_GROUPS).enumerate() {
        match decode_group(img, group) {
            Ok(res) => return Ok(res),
            Err(e) => {
                trace!("Group {i} with score {:.3} failed: {e}", group.score);
                err = furthest(err, e);
            }
        }
    }
    Err(err)
}

// Tries the versions a finder group could plausibly hold, the read or estimated version first.
// Neighbouring versions sample the wrong grid, so their failures are noise. Only a full decode
// from one of them counts, otherwise the error is the one from the first located version.
fn decode_group(img: &mut BinaryImage, group: &FinderGroup) -> DecodeResult<Decoded> {
    let est = group.estimate_version();
    let mut candidates = Vec::with_capacity(6);

    if *est >= 6 {
        let read = finder_homography(group, est)
            .and_then(|h| Symbol::new(img, h, est).read_version_info());
        debug!("Version info read as {read:?}, estimated {est}");
        candidates.extend(read);
    }
    for d in [0isize, -1, 1, -2, 2] {
        let v = Version::new((*est as isize + d).max(0) as usize);
        if let Some(v) = v.filter(|v| !candidates.contains(v)) {
            candidates.push(v);
        }
    }

    let mut err = None;
    for ver in candidates {
        let Some(h) = locate_symbol(img, group, ver) else {
            continue;
        };
        debug!("Symbol located as version {ver}");
        match decode_symbol(&Symbol::new(img, h, ver)) {
            Ok(res) => return Ok(res),
            Err(e) => {
                trace!("Version {ver} failed: {e}");
                err.get_or_insert(e);
            }
        }
    }
    Err(err.unwrap_or(DecodeError::FinderPatternNotFound))
}

fn decode_symbol(sym: &Symbol) -> DecodeResult<Decoded> {
    let ver = sym.ver;
    let (ecl, mask) = sym.read_format_info()?;
    debug!("Format info: ec level {ecl}, mask {}", *mask);

    let payload = sym.extract_payload(mask);
    let mut blocks = deinterleave(payload.data(), ver, ecl);

    let mut corrected = 0;
    for (i, b) in blocks.iter_mut().enumerate() {
        let errs = b.rectify()?;
        debug!("Block {i}: corrected {errs} codeword(s)");
        corrected += errs;
    }

    let data = blocks.iter().flat_map(|b| b.data().iter().copied()).collect::<Vec<_>>();
    let mut encoded = BitStream::from(&data);
    let payload = decode(&mut encoded, ver)?;

    Ok(Decoded {
        bytes: payload.bytes,
        ec_level: ecl,
        version: ver,
        mask,
        modes: payload.modes,
        eci: payload.eci,
        corrected,
    })
}

// Splits interleaved codewords back into blocks. Short blocks come first and the long blocks
// carry one extra data codeword.
fn deinterleave(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<Block> {
    let (b1s, b1c, b2s, b2c) = ver.data_codewords_per_block(ecl);
    let ec_len = ver.ecc_per_block(ecl);
    let total_blks = b1c + b2c;
    let dlen = |i: usize| if i < b1c { b1s } else { b2s };

    let mut dilvd = (0..total_blks)
        .map(|i| Vec::with_capacity(dlen(i) + ec_len))
        .collect::<Vec<Vec<u8>>>();
    let mut it = data.iter().copied();

    // Deinterleaving data
    for j in 0..b1s.max(b2s) {
        for (i, blk) in dilvd.iter_mut().enumerate() {
            if j < dlen(i) {
                blk.push(it.next().unwrap_or(0));
            }
        }
    }

    // Deinterleaving ecc
    for _ in 0..ec_len {
        for blk in dilvd.iter_mut() {
            blk.push(it.next().unwrap_or(0));
        }
    }

    dilvd.iter().enumerate().map(|(i, b)| Block::with_encoded(b, dlen(i))).collect()
}

#[cfg(test)]
mod reader_tests {
    use image::{GrayImage, Luma, Rgb};
    use test_case::test_case;

    use super::{deinterleave, Decoded, QRReader};
    use crate::builder::{Module, QRBuilder};
    use crate::common::{
        codec::{encode_with_version, Mode},
        error::DecodeError,
        mask::MaskPattern,
        metadata::{Color, ECLevel, Version, FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE},
    };

    fn decoded(bytes: &[u8], eci: Option<u32>) -> Decoded {
        Decoded {
            bytes: bytes.to_vec(),
            ec_level: ECLevel::M,
            version: Version::MIN,
            mask: MaskPattern::new(0),
            modes: vec![Mode::Byte],
            eci,
            corrected: 0,
        }
    }

    #[test_case(1, ECLevel::L)]
    #[test_case(5, ECLevel::Q)]
    #[test_case(7, ECLevel::H)]
    #[test_case(15, ECLevel::M)]
    fn test_deinterleave(ver: usize, ecl: ECLevel) {
        let ver = Version::new(ver).unwrap();
        let encoded = encode_with_version(b"Hello, world!!!", ver, ecl).unwrap();
        let exp_blks = QRBuilder::blockify(encoded.data(), ver, ecl);

        let data = exp_blks.iter().map(|b| b.data()).collect::<Vec<_>>();
        let ecc = exp_blks.iter().map(|b| b.ecc()).collect::<Vec<_>>();
        let mut interleaved = QRBuilder::interleave(&data);
        interleaved.extend(QRBuilder::interleave(&ecc));

        assert_eq!(deinterleave(&interleaved, ver, ecl), exp_blks);
    }

    #[test]
    fn test_reader() {
        let data = "Hello, world!🌎";
        let qr = QRBuilder::new(data.as_bytes())
            .version(Version::new(2).unwrap())
            .ec_level(ECLevel::L)
            .mask(MaskPattern::new(1))
            .build()
            .unwrap();
        let img = qr.to_image(10);

        let res = QRReader::new().read(&img).expect("Couldn't read data");
        assert_eq!(res.text(), data);
        assert_eq!(res.version, Version::new(2).unwrap());
        assert_eq!(res.ec_level, ECLevel::L);
        assert_eq!(res.mask, MaskPattern::new(1));
        assert_eq!(res.corrected, 0);
    }

    #[test]
    fn test_reader_gray_image() {
        let qr = QRBuilder::new(b"GRAY 123").build().unwrap();
        let rgb = qr.to_image(4);
        let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            Luma([rgb.get_pixel(x, y)[0]])
        });
        let res = QRReader::new().read(&gray).unwrap();
        assert_eq!(res.bytes, b"GRAY 123");
    }

    #[test]
    fn test_reader_corrects_damage() {
        let data = "Damaged but readable";
        let mut qr = QRBuilder::new(data.as_bytes())
            .version(Version::new(3).unwrap())
            .ec_level(ECLevel::H)
            .build()
            .unwrap();

        // Flip a 4x4 patch of data modules in the bottom right
        let w = qr.width() as i16;
        for r in w - 5..w - 1 {
            for c in w - 5..w - 1 {
                if let Module::Data(color) = qr.get(r, c) {
                    qr.set(r, c, Module::Data(!color));
                }
            }
        }

        let res = QRReader::new().read(&qr.to_image(4)).unwrap();
        assert_eq!(res.text(), data);
        assert!(res.corrected > 0);
    }

    #[test]
    fn test_reader_inverted() {
        let qr = QRBuilder::new(b"light on dark").build().unwrap();
        let img = qr.render(Rgb([255, 255, 255]), Rgb([31, 41, 55]), 5, 4);

        let res = QRReader::new().read(&img).unwrap();
        assert_eq!(res.bytes, b"light on dark");

        assert!(QRReader::new().try_inverted(false).read(&img).is_err());
    }

    #[test]
    fn test_reader_no_symbol() {
        let img = GrayImage::from_fn(100, 100, |x, y| {
            Luma([if (x / 10 + y / 10) % 2 == 0 { 0 } else { 255 }])
        });
        assert_eq!(QRReader::new().read(&img).unwrap_err(), DecodeError::FinderPatternNotFound);
    }

    #[test]
    fn test_reader_blank_image() {
        let img = GrayImage::from_pixel(100, 100, Luma([255]));
        assert_eq!(QRReader::new().read(&img).unwrap_err(), DecodeError::LowQualityImage);
    }

    #[test_case(1, false)]
    #[test_case(2, false)]
    #[test_case(3, false)]
    #[test_case(5, false)]
    #[test_case(5, true)]
    #[test_case(8, false)]
    #[test_case(8, true)]
    fn test_reader_format_info_corrupt(ver: usize, try_inverted: bool) {
        let mut qr = QRBuilder::new(b"format").version(Version::new(ver).unwrap()).build().unwrap();
        for &(r, c) in FORMAT_INFO_COORDS_MAIN.iter().chain(FORMAT_INFO_COORDS_SIDE.iter()) {
            qr.set(r, c, Module::Format(Color::Light));
        }
        let res = QRReader::new().try_inverted(try_inverted).read(&qr.to_image(4));
        assert_eq!(res.unwrap_err(), DecodeError::FormatInfoCorrupt, "version {ver}");
    }

    #[test]
    fn test_text() {
        assert_eq!(decoded("héllo".as_bytes(), None).text(), "héllo");
        assert_eq!(decoded(&[0x68, 0xE9], None).text(), "hé");
        assert_eq!(decoded(&[0x80], None).text(), "€");
        assert_eq!(decoded(&[0x9F], None).text(), "Ÿ");
        assert_eq!(decoded(&[0x68, 0xFF], Some(26)).text(), "h\u{FFFD}");
    }
}
