// Reader for encoded data
//------------------------------------------------------------------------------

mod reader {
    use std::cmp::min;

    use crate::common::bit_utils::BitStream;
    use crate::common::codec::Mode;
    use crate::common::error::{DecodeError, DecodeResult};
    use crate::common::metadata::Version;

    pub fn take_header(inp: &mut BitStream, ver: Version) -> DecodeResult<(Mode, usize)> {
        let mode_bits = inp.take_bits(4)?;
        let mode = Mode::from_bits(mode_bits).ok_or(DecodeError::MalformedSegment)?;

        let char_cnt = match mode {
            Mode::Numeric | Mode::Alphanumeric | Mode::Byte => {
                inp.take_bits(ver.char_cnt_bits(mode))? as usize
            }
            Mode::Eci | Mode::Terminator => 0,
            Mode::Kanji => return Err(DecodeError::MalformedSegment),
        };

        Ok((mode, char_cnt))
    }

    // Assignment number in 1, 2 or 3 byte form, flagged by its leading bits
    pub fn take_eci(inp: &mut BitStream) -> DecodeResult<u32> {
        let first = inp.take_bits(8)? as u32;
        if first & 0b1000_0000 == 0 {
            Ok(first)
        } else if first & 0b1100_0000 == 0b1000_0000 {
            let rest = inp.take_bits(8)? as u32;
            Ok((first & 0b0011_1111) << 8 | rest)
        } else if first & 0b1110_0000 == 0b1100_0000 {
            let rest = inp.take_bits(16)? as u32;
            Ok((first & 0b0001_1111) << 16 | rest)
        } else {
            Err(DecodeError::MalformedSegment)
        }
    }

    pub fn take_numeric(inp: &mut BitStream, mut char_cnt: usize, out: &mut Vec<u8>) -> DecodeResult<()> {
        while char_cnt > 0 {
            let bit_len = Mode::Numeric.encoded_len(min(3, char_cnt));
            let chunk = inp.take_bits(bit_len)?;
            out.extend(Mode::Numeric.decode_chunk(chunk, bit_len)?);
            char_cnt -= min(3, char_cnt);
        }

        Ok(())
    }

    pub fn take_alphanumeric(
        inp: &mut BitStream,
        mut char_cnt: usize,
        out: &mut Vec<u8>,
    ) -> DecodeResult<()> {
        while char_cnt > 0 {
            let bit_len = Mode::Alphanumeric.encoded_len(min(2, char_cnt));
            let chunk = inp.take_bits(bit_len)?;
            out.extend(Mode::Alphanumeric.decode_chunk(chunk, bit_len)?);
            char_cnt -= min(2, char_cnt);
        }

        Ok(())
    }

    pub fn take_byte(inp: &mut BitStream, char_cnt: usize, out: &mut Vec<u8>) -> DecodeResult<()> {
        if char_cnt * 8 > inp.remaining() {
            return Err(DecodeError::MalformedSegment);
        }
        for _ in 0..char_cnt {
            let chunk = inp.take_bits(8)?;
            out.extend(Mode::Byte.decode_chunk(chunk, 8)?);
        }

        Ok(())
    }

}

// Decoder
//------------------------------------------------------------------------------

pub mod decode {
    use log::trace;

    use super::reader::{take_alphanumeric, take_byte, take_eci, take_header, take_numeric};
    use crate::common::bit_utils::BitStream;
    use crate::common::codec::Mode;
    use crate::common::error::DecodeResult;
    use crate::common::metadata::Version;

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct Payload {
        pub bytes: Vec<u8>,
        pub modes: Vec<Mode>,
        pub eci: Option<u32>,
    }

    /// Parses segments until the terminator, or until fewer than 4 bits remain
    pub fn decode(encoded: &mut BitStream, ver: Version) -> DecodeResult<Payload> {
        let mut res = Payload { bytes: Vec::with_capacity(encoded.len() >> 3), ..Default::default() };
        while encoded.remaining() >= 4 {
            let (mode, char_cnt) = take_header(encoded, ver)?;
            trace!("Segment {mode} with {char_cnt} char(s)");
            match mode {
                Mode::Terminator => break,
                Mode::Eci => res.eci = Some(take_eci(encoded)?),
                Mode::Numeric => take_numeric(encoded, char_cnt, &mut res.bytes)?,
                Mode::Alphanumeric => take_alphanumeric(encoded, char_cnt, &mut res.bytes)?,
                _ => take_byte(encoded, char_cnt, &mut res.bytes)?,
            }
            res.modes.push(mode);
        }
        Ok(res)
    }

}
