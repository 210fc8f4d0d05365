pub use encode::*;

// Encoder
//------------------------------------------------------------------------------

pub mod encode {
    use log::debug;

    use super::writer::{finish, write_segment};
    use crate::common::bit_utils::BitStream;
    use crate::common::codec::{Mode, Segment, MODES};
    use crate::common::error::{EncodeError, EncodeResult};
    use crate::common::metadata::{ECLevel, Version};

    /// Picks the smallest version at or above `min_ver` which fits the data, and returns the
    /// padded data codewords along with it
    pub fn encode(data: &[u8], ecl: ECLevel, min_ver: Version) -> EncodeResult<(BitStream, Version)> {
        let (ver, segs) = plan_version(data, ecl, min_ver)?;
        debug!("Planned {} segment(s) for {} byte(s) in version {ver}", segs.len(), data.len());
        Ok((assemble(&segs, ver.data_bit_capacity(ecl)), ver))
    }

    pub fn encode_with_version(data: &[u8], ver: Version, ecl: ECLevel) -> EncodeResult<BitStream> {
        let segs = plan_segments(data, ver);
        let bcap = ver.data_bit_capacity(ecl);
        if bit_len(&segs) > bcap {
            return Err(EncodeError::CapacityExceeded);
        }
        Ok(assemble(&segs, bcap))
    }

    fn assemble(segs: &[Segment], bcap: usize) -> BitStream {
        let mut bs = BitStream::new(bcap);
        segs.iter().for_each(|s| write_segment(s, &mut bs));
        finish(&mut bs);
        bs
    }

    fn bit_len(segs: &[Segment]) -> usize {
        segs.iter().map(Segment::bit_len).sum()
    }

    // The plan only depends on the count field widths, which change at versions 10 and 27
    pub(crate) fn plan_version(
        data: &[u8],
        ecl: ECLevel,
        min_ver: Version,
    ) -> EncodeResult<(Version, Vec<Segment>)> {
        let mut plan: Option<(Vec<Segment>, usize)> = None;
        for v in *min_ver..=*Version::MAX {
            let ver = Version::new(v).ok_or(EncodeError::InvalidVersion)?;
            let (segs, sz) = match plan.take() {
                Some(p) if v != 10 && v != 27 => p,
                _ => {
                    let segs = plan_segments(data, ver);
                    let sz = bit_len(&segs);
                    (segs, sz)
                }
            };
            if sz <= ver.data_bit_capacity(ecl) {
                return Ok((ver, segs));
            }
            plan = Some((segs, sz));
        }
        Err(EncodeError::CapacityExceeded)
    }

    // Sixths of a bit per char, so numeric (10/3 bits) and alphanumeric (11/2 bits) stay integral
    const CHAR_COST: [usize; 3] = [20, 33, 48];

    const UNREACHABLE: usize = usize::MAX;

    /// Splits data into the mode runs with the fewest total bits. Each char is given the mode that
    /// minimizes the cost of the prefix ending at it, where a mode switch rounds the prefix up to
    /// a whole bit and pays the new segment's header.
    pub(crate) fn plan_segments(data: &[u8], ver: Version) -> Vec<Segment> {
        let Some(&first) = data.first() else {
            return Vec::new();
        };

        let header = MODES.map(|m| (4 + ver.char_cnt_bits(m)) * 6);

        // back[i][m] is the mode of char i - 1 on the cheapest prefix with char i in mode m
        let mut back = vec![[UNREACHABLE; 3]; data.len()];
        let mut cost = [UNREACHABLE; 3];
        for m in (0..3).filter(|&m| MODES[m].contains(first)) {
            cost[m] = header[m] + CHAR_COST[m];
            back[0][m] = m;
        }

        for (i, &b) in data.iter().enumerate().skip(1) {
            let mut next = [UNREACHABLE; 3];
            for to in (0..3).filter(|&m| MODES[m].contains(b)) {
                for from in (0..3).filter(|&m| cost[m] != UNREACHABLE) {
                    let base = if from == to {
                        cost[from]
                    } else {
                        cost[from].div_ceil(6) * 6 + header[to]
                    };
                    if base + CHAR_COST[to] < next[to] {
                        next[to] = base + CHAR_COST[to];
                        back[i][to] = from;
                    }
                }
            }
            cost = next;
        }

        let mut m = (0..3).min_by_key(|&m| cost[m]).unwrap_or(2);
        let mut modes = vec![Mode::Byte; data.len()];
        for i in (0..data.len()).rev() {
            modes[i] = MODES[m];
            m = back[i][m];
        }

        split_runs(ver, &modes, data)
    }

    fn split_runs<'a>(ver: Version, modes: &[Mode], data: &'a [u8]) -> Vec<Segment<'a>> {
        let mut start = 0;
        modes
            .chunk_by(|a, b| a == b)
            .map(|run| {
                let (mode, end) = (run[0], start + run.len());
                let seg = Segment::new(mode, ver.mode_bits(), ver.char_cnt_bits(mode), &data[start..end]);
                start = end;
                seg
            })
            .collect()
    }

    #[cfg(test)]
    mod encode_tests {
        use test_case::test_case;

        use super::{
            encode, encode_with_version, plan_segments, plan_version, split_runs, ECLevel,
            EncodeError, Mode, Version,
        };

        fn ver(v: usize) -> Version {
            Version::new(v).unwrap()
        }

        fn runs(data: &[u8], ver: Version) -> Vec<(Mode, String)> {
            plan_segments(data, ver)
                .iter()
                .map(|s| (s.mode, String::from_utf8_lossy(s.data).into_owned()))
                .collect()
        }

        #[test]
        fn test_split_runs() {
            let data = b"aaaaa11111AAA";
            let mut modes = vec![Mode::Alphanumeric; 5];
            modes.extend([Mode::Numeric; 5]);
            modes.extend([Mode::Byte; 3]);
            let segs = split_runs(ver(1), &modes, data);

            assert_eq!(segs.len(), 3);
            assert_eq!((segs[0].mode, segs[0].data), (Mode::Alphanumeric, &data[..5]));
            assert_eq!((segs[1].mode, segs[1].data), (Mode::Numeric, &data[5..10]));
            assert_eq!((segs[2].mode, segs[2].data), (Mode::Byte, &data[10..]));
            assert_eq!(segs[1].len_bits, ver(1).char_cnt_bits(Mode::Numeric));
        }

        #[test_case("1111111", &[(Mode::Numeric, 7)])]
        #[test_case("0123456789", &[(Mode::Numeric, 10)])]
        #[test_case("AAAAA", &[(Mode::Alphanumeric, 5)])]
        #[test_case("aaaaa", &[(Mode::Byte, 5)])]
        #[test_case("1111111AAAA", &[(Mode::Numeric, 7), (Mode::Alphanumeric, 4)])]
        #[test_case("111111AAAA", &[(Mode::Alphanumeric, 10)])]
        #[test_case("aaa11111a", &[(Mode::Byte, 9)])]
        #[test_case("aaa111111a", &[(Mode::Byte, 3), (Mode::Numeric, 6), (Mode::Byte, 1)])]
        #[test_case("aaa1111A", &[(Mode::Byte, 8)])]
        #[test_case("aaa1111AA", &[(Mode::Byte, 3), (Mode::Alphanumeric, 6)])]
        #[test_case("aaa1111111AA", &[(Mode::Byte, 3), (Mode::Numeric, 7), (Mode::Alphanumeric, 2)])]
        fn test_plan_segments(data: &str, exp: &[(Mode, usize)]) {
            let got = runs(data.as_bytes(), ver(1));
            let got = got.iter().map(|(m, s)| (*m, s.len())).collect::<Vec<_>>();
            assert_eq!(got, exp);
        }

        #[test]
        fn test_plan_segments_long_runs() {
            let phi = "Golden ratio phi = 1.6180339887498948482045868343656381177203091798057628621354486227052604628189024497072072041893911374......";
            let got = runs(phi.as_bytes(), ver(9));
            assert_eq!(
                got.iter().map(|(m, s)| (*m, s.len())).collect::<Vec<_>>(),
                [(Mode::Byte, 21), (Mode::Numeric, 100), (Mode::Alphanumeric, 6)]
            );

            // Longer count fields make the switches too costly
            let data = "A11111111111111".repeat(23) + "A";
            assert_eq!(runs(data.as_bytes(), ver(10)), [(Mode::Alphanumeric, data)]);
        }

        #[test]
        fn test_plan_segments_alternating() {
            let data = "A11111111111111".repeat(23);
            let got = runs(data.as_bytes(), ver(9));
            assert_eq!(got.len(), 46);
            for pair in got.chunks(2) {
                assert_eq!(pair[0], (Mode::Alphanumeric, "A".to_string()));
                assert_eq!(pair[1], (Mode::Numeric, "1".repeat(14)));
            }
        }

        #[test]
        fn test_plan_segments_empty() {
            assert!(plan_segments(b"", ver(1)).is_empty());
        }

        #[test_case("aaaaa11111AAA".to_string(), 1, ECLevel::L)]
        #[test_case("A11111111111111".repeat(2), 2, ECLevel::L)]
        #[test_case("A11111111111111".repeat(4), 3, ECLevel::L)]
        #[test_case("aAAAAAAAAAAA".repeat(5), 4, ECLevel::L)]
        #[test_case("aAAAAAAAAAAA".repeat(21), 10, ECLevel::L)]
        #[test_case("Hello, world!".to_string(), 2, ECLevel::H)]
        #[test_case("1".repeat(7089), 40, ECLevel::L)]
        #[test_case("A".repeat(4296), 40, ECLevel::L)]
        #[test_case("a".repeat(2953), 40, ECLevel::L)]
        #[test_case("a".repeat(1273), 40, ECLevel::H)]
        fn test_plan_version(data: String, exp_ver: usize, ecl: ECLevel) {
            let (v, _) = plan_version(data.as_bytes(), ecl, ver(1)).unwrap();
            assert_eq!(v, ver(exp_ver));
        }

        #[test_case("1".repeat(7090), ECLevel::L)]
        #[test_case("A".repeat(4297), ECLevel::L)]
        #[test_case("a".repeat(2954), ECLevel::L)]
        #[test_case("a".repeat(1274), ECLevel::H)]
        fn test_plan_version_overflow(data: String, ecl: ECLevel) {
            let res = plan_version(data.as_bytes(), ecl, ver(1));
            assert_eq!(res.err(), Some(EncodeError::CapacityExceeded));
        }

        #[test]
        fn test_min_version() {
            let (v, segs) = plan_version(b"HELLO", ECLevel::L, ver(12)).unwrap();
            assert_eq!(v, ver(12));
            assert_eq!(segs[0].len_bits, 11);
        }

        #[test]
        fn test_encode() {
            let (bs, v) = encode(b"01234567", ECLevel::M, ver(1)).unwrap();
            assert_eq!(v, ver(1));
            assert_eq!(
                bs.data(),
                [
                    0b00010000, 0b00100000, 0b00001100, 0b01010110, 0b01100001, 0b10000000,
                    0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11
                ]
            );
        }

        #[test]
        fn test_encode_with_version() {
            // 256 bytes need the 16 bit count of v10+, and 2068 bits of the 2192 v10-L holds
            let data = "!".repeat(256);
            let bs = encode_with_version(data.as_bytes(), ver(10), ECLevel::L).unwrap();
            assert_eq!(bs.len(), ver(10).data_bit_capacity(ECLevel::L));
            let res = encode_with_version(data.as_bytes(), ver(9), ECLevel::L);
            assert_eq!(res.err(), Some(EncodeError::CapacityExceeded));
        }
    }
}

// Bit writer
//------------------------------------------------------------------------------

pub(super) mod writer {
    use crate::common::bit_utils::BitStream;
    use crate::common::codec::{Mode, Segment, PADDING_CODEWORDS};

    /// Mode indicator, char count, then the data packed in groups of 3 digits, 2 alphanumeric
    /// chars or 1 byte
    pub fn write_segment(seg: &Segment, out: &mut BitStream) {
        let count = seg.data.len();
        debug_assert!(count < 1 << seg.len_bits, "{count} chars overflow a {}-bit count", seg.len_bits);

        out.push_bits(seg.mode as u8, seg.mode_bits);
        out.push_bits(count as u16, seg.len_bits);

        let group = match seg.mode {
            Mode::Numeric => 3,
            Mode::Alphanumeric => 2,
            _ => 1,
        };
        for chunk in seg.data.chunks(group) {
            out.push_bits(seg.mode.encode_chunk(chunk), seg.mode.encoded_len(chunk.len()));
        }
    }

    /// Up to 4 terminator bits, zeros to the byte boundary, then pad codewords until full
    pub fn finish(out: &mut BitStream) {
        let room = out.capacity() - out.len();
        out.push_bits(0u8, room.min(4));

        let partial = out.len() & 7;
        if partial > 0 {
            out.push_bits(0u8, 8 - partial);
        }

        let pads = (out.capacity() - out.len()) >> 3;
        for pc in PADDING_CODEWORDS.iter().copied().cycle().take(pads) {
            out.push_bits(pc, 8);
        }
    }

}
