//! Fixed-width bit packing.
//!
//! Values are laid out sequentially with no padding between them. Inside a
//! byte the first value occupies the lowest bits, and a value that crosses a
//! byte boundary continues in the low bits of the next byte. Widths from 1 to
//! 32 bits are supported.

/// Largest supported field width.
pub const MAX_WIDTH: u32 = 32;

#[inline]
fn mask(width: u32) -> u64 {
    (1u64 << width) - 1
}

/// Number of bytes needed to hold `count` fields of `width` bits.
#[inline]
pub const fn packed_len(count: usize, width: u32) -> usize {
    (count * width as usize).div_ceil(8)
}

/// Sequential reader over a packed byte buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, byte: 0, bit: 0 }
    }

    /// Start reading at an absolute bit offset.
    pub fn at_bit(data: &'a [u8], bit_offset: usize) -> Self {
        Self {
            data,
            byte: bit_offset / 8,
            bit: (bit_offset % 8) as u32,
        }
    }

    /// Current absolute bit offset.
    #[inline]
    pub fn bit_position(&self) -> usize {
        self.byte * 8 + self.bit as usize
    }

    /// Bits left in the buffer.
    #[inline]
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_position())
    }

    /// Read one field. Returns `None` when the buffer runs out or the
    /// width is outside `1..=32`.
    pub fn read(&mut self, width: u32) -> Option<u32> {
        if width == 0 || width > MAX_WIDTH || self.remaining_bits() < width as usize {
            return None;
        }
        let mut value: u64 = 0;
        let mut filled = 0u32;
        while filled < width {
            let byte = self.data[self.byte] as u64;
            value |= (byte >> self.bit) << filled;
            let taken = (width - filled).min(8 - self.bit);
            self.bit += taken;
            filled += taken;
            if self.bit == 8 {
                self.byte += 1;
                self.bit = 0;
            }
        }
        Some((value & mask(width)) as u32)
    }

    /// Skip `count` fields of `width` bits.
    pub fn skip(&mut self, count: usize, width: u32) {
        let target = self.bit_position() + count * width as usize;
        self.byte = target / 8;
        self.bit = (target % 8) as u32;
    }
}

/// Sequential writer producing a packed byte buffer.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    bit: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value`.
    ///
    /// # Panics
    /// If `width` is outside `1..=32`.
    pub fn write(&mut self, value: u32, width: u32) {
        assert!((1..=MAX_WIDTH).contains(&width), "bit width {width} out of range");
        let mut value = value as u64 & mask(width);
        let mut left = width;
        while left > 0 {
            if self.bit == 0 {
                self.data.push(0);
            }
            let room = 8 - self.bit;
            let take = left.min(room);
            let last = self.data.len() - 1;
            self.data[last] |= ((value & mask(take)) << self.bit) as u8;
            value >>= take;
            left -= take;
            self.bit = (self.bit + take) % 8;
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

/// Pack every value into `width`-bit fields.
pub fn pack_bits(values: &[u32], width: u32) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for &v in values {
        writer.write(v, width);
    }
    writer.finish()
}

/// Unpack `count` fields of `width` bits. Stops early if the buffer is short.
pub fn unpack_bits(data: &[u8], width: u32, count: usize) -> Vec<u32> {
    let mut reader = BitReader::new(data);
    let mut out = Vec::with_capacity(count.min(data.len() * 8));
    for _ in 0..count {
        match reader.read(width) {
            Some(v) => out.push(v),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_first_layout() {
        // 3-bit fields 5, 3, 7 -> 101 | 011 << 3 | 111 << 6
        let packed = pack_bits(&[5, 3, 7], 3);
        assert_eq!(packed, vec![0b1101_1101, 0b0000_0001]);
        assert_eq!(unpack_bits(&packed, 3, 3), vec![5, 3, 7]);
    }

    #[test]
    fn test_roundtrip_all_widths() {
        for width in 1..=MAX_WIDTH {
            let max = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            let values: Vec<u32> = (0..37u32)
                .map(|i| i.wrapping_mul(2_654_435_761) & max)
                .chain([0, max])
                .collect();
            let packed = pack_bits(&values, width);
            assert_eq!(packed.len(), packed_len(values.len(), width));
            assert_eq!(unpack_bits(&packed, width, values.len()), values, "width {width}");
        }
    }

    #[test]
    fn test_reader_at_bit_offset() {
        let packed = pack_bits(&[1, 2, 3, 4, 5], 7);
        let mut reader = BitReader::at_bit(&packed, 7 * 3);
        assert_eq!(reader.read(7), Some(4));
        assert_eq!(reader.read(7), Some(5));
        assert_eq!(reader.read(7), None);
    }

    #[test]
    fn test_short_buffer() {
        assert_eq!(unpack_bits(&[0xFF], 5, 4), vec![31]);
        assert_eq!(BitReader::new(&[]).read(1), None);
    }

    #[test]
    fn test_skip() {
        let packed = pack_bits(&[9, 8, 7, 6], 10);
        let mut reader = BitReader::new(&packed);
        reader.skip(2, 10);
        assert_eq!(reader.read(10), Some(7));
    }
}
