use super::metadata::Version;

// Iterator over the encoding region
//------------------------------------------------------------------------------

/// Walks every module in data placement order: column pairs from the right edge, alternating
/// upward and downward, skipping the vertical timing column. Function modules are not filtered
/// out, callers skip them.
pub struct EncRegionIter {
    right: i16,
    vert: i16,
    j: i16,
    width: i16,
}

impl EncRegionIter {
    pub const fn new(ver: Version) -> Self {
        let w = ver.width() as i16;
        Self { right: w - 1, vert: 0, j: 0, width: w }
    }
}

impl Iterator for EncRegionIter {
    type Item = (i16, i16);

    fn next(&mut self) -> Option<Self::Item> {
        if self.right < 1 {
            return None;
        }

        let c = self.right - self.j;
        let upward = (self.right + 1) & 2 == 0;
        let r = if upward { self.width - 1 - self.vert } else { self.vert };

        self.j += 1;
        if self.j == 2 {
            self.j = 0;
            self.vert += 1;
            if self.vert == self.width {
                self.vert = 0;
                self.right -= 2;
                if self.right == 6 {
                    self.right = 5;
                }
            }
        }

        Some((r, c))
    }
}
