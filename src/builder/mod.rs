mod qr;

pub use qr::{Module, QR};

use std::borrow::Cow;
use std::ops::Deref;

use log::debug;

use crate::common::{
    bit_utils::BitStream,
    codec::{encode, encode_with_version},
    ec::Block,
    error::{EncodeError, EncodeResult},
    mask::{apply_best_mask, MaskPattern},
    metadata::{ECLevel, Version},
};

/// How text is turned into bytes before segmenting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Iso8859_1,
}

impl Charset {
    pub fn encode(self, text: &str) -> EncodeResult<Cow<'_, [u8]>> {
        match self {
            Self::Utf8 => Ok(Cow::Borrowed(text.as_bytes())),
            Self::Iso8859_1 => {
                if text.is_ascii() {
                    return Ok(Cow::Borrowed(text.as_bytes()));
                }
                text.chars()
                    .map(|ch| u8::try_from(ch).map_err(|_| EncodeError::UnsupportedCharacter))
                    .collect::<EncodeResult<Vec<_>>>()
                    .map(Cow::Owned)
            }
        }
    }
}

pub struct QRBuilder<'a> {
    data: Cow<'a, [u8]>,
    version: Option<Version>,
    min_version: Version,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            version: None,
            min_version: Version::MIN,
            ec_level: ECLevel::M,
            mask: None,
        }
    }

    pub fn with_text(text: &'a str, charset: Charset) -> EncodeResult<Self> {
        let mut builder = Self::new(&[]);
        builder.data = charset.encode(text)?;
        Ok(builder)
    }

    pub fn data(&mut self, data: &'a [u8]) -> &mut Self {
        self.data = Cow::Borrowed(data);
        self
    }

    /// Fixes the version. Building fails if the data doesn't fit.
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn unset_version(&mut self) -> &mut Self {
        self.version = None;
        self
    }

    /// Smallest version considered when the version is picked automatically
    pub fn min_version(&mut self, version: Version) -> &mut Self {
        self.min_version = version;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    /// Forces a mask and skips penalty evaluation
    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn metadata(&self) -> String {
        match self.version {
            Some(v) => format!("{{ Version: {v}, Ec level: {} }}", self.ec_level),
            None => format!(
                "{{ Version: None, Min version: {}, Ec level: {} }}",
                self.min_version, self.ec_level
            ),
        }
    }
}


impl QRBuilder<'_> {
    pub fn build(&self) -> EncodeResult<QR> {
        debug!("Generating QR {}", self.metadata());

        let (encoded_data, version) = match self.version {
            Some(v) => (encode_with_version(&self.data, v, self.ec_level)?, v),
            None => encode(&self.data, self.ec_level, self.min_version)?,
        };

        debug!("Constructing payload with ecc & interleaving");
        let payload = Self::construct_payload(encoded_data.data(), version, self.ec_level);

        let mut qr = QR::new(version, self.ec_level);
        debug!("Drawing function patterns");
        qr.draw_all_function_patterns();
        debug!("Drawing encoding region");
        qr.draw_encoding_region(payload);

        let mask = match self.mask {
            Some(m) => {
                qr.apply_mask(m);
                m
            }
            None => apply_best_mask(&mut qr),
        };

        let total_modules = version.width() * version.width();
        debug!(
            "Generated QR: version {version}, ec level {}, mask {}, data {}/{} codewords, \
             dark modules {}%",
            self.ec_level,
            *mask,
            self.data.len(),
            version.data_capacity(self.ec_level),
            qr.count_dark_modules() * 100 / total_modules
        );

        Ok(qr)
    }

    fn construct_payload(data: &[u8], version: Version, ec_level: ECLevel) -> BitStream {
        let blocks = Self::blockify(data, version, ec_level);
        let data_blocks = blocks.iter().map(Block::data).collect::<Vec<_>>();
        let ecc_blocks = blocks.iter().map(Block::ecc).collect::<Vec<_>>();

        let mut payload = BitStream::new(version.total_codewords() << 3);
        payload.extend(&Self::interleave(&data_blocks));
        payload.extend(&Self::interleave(&ecc_blocks));
        payload
    }

    // Short blocks come first, then the long ones. All carry the same number of ecc codewords.
    pub(crate) fn blockify(data: &[u8], version: Version, ec_level: ECLevel) -> Vec<Block> {
        let (short_len, short_cnt, long_len, long_cnt) = version.data_codewords_per_block(ec_level);
        let split = short_len * short_cnt;
        debug_assert_eq!(
            split + long_len * long_cnt,
            data.len(),
            "Data doesn't fill the blocks of {version}-{ec_level}"
        );

        let ecc_len = version.ecc_per_block(ec_level);
        let (short, long) = data.split_at(split);
        short
            .chunks(short_len)
            .chain(long.chunks(long_len.max(1)))
            .map(|b| Block::new(b, b.len() + ecc_len))
            .collect()
    }

    /// Takes the i-th codeword of every block in turn. Shorter blocks drop out once exhausted.
    pub fn interleave<T: Copy, V: Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
        let longest = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
        (0..longest).flat_map(|i| blocks.iter().filter_map(move |b| b.get(i).copied())).collect()
    }
}
