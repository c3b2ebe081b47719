use mimic_common::err::SqlResult;

use crate::codec::PacketReader;

/// NULL bitmap as used by the binary protocol. Row packets use offset 2,
/// parameter blocks use offset 0.
///
/// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_binary_resultset.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullBitmap {
    offset: usize,
    bitmap: Vec<u8>,
}

impl NullBitmap {
    pub fn new(num_bits: usize, offset: usize) -> Self {
        NullBitmap {
            offset,
            bitmap: vec![0; Self::num_bytes(num_bits, offset)],
        }
    }

    pub fn from_reader(
        reader: &mut PacketReader<'_>,
        num_bits: usize,
        offset: usize,
    ) -> SqlResult<Self> {
        let bytes = reader.read_str_fixed(Self::num_bytes(num_bits, offset))?;
        Ok(NullBitmap {
            offset,
            bitmap: bytes.to_vec(),
        })
    }

    fn num_bytes(num_bits: usize, offset: usize) -> usize {
        (num_bits + 7 + offset) / 8
    }

    fn pos(&self, i: usize) -> (usize, usize) {
        ((i + self.offset) / 8, (i + self.offset) % 8)
    }

    pub fn flip(&mut self, i: usize) {
        let (byte, bit) = self.pos(i);
        self.bitmap[byte] |= 1 << bit;
    }

    pub fn is_flipped(&self, i: usize) -> bool {
        let (byte, bit) = self.pos(i);
        self.bitmap[byte] & (1 << bit) != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bitmap
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flip_and_read_back() {
        for offset in [0usize, 2] {
            for n in [1usize, 7, 8, 9, 63, 64, 65, 1024] {
                let mut bitmap = NullBitmap::new(n, offset);
                let set: Vec<usize> = (0..n).filter(|i| i % 3 == 0).collect();
                for &i in &set {
                    bitmap.flip(i);
                }
                for i in 0..n {
                    assert_eq!(set.contains(&i), bitmap.is_flipped(i), "bit {}", i);
                }
            }
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        let mut bitmap = NullBitmap::new(10, 2);
        bitmap.flip(0);
        bitmap.flip(9);
        let bytes = bitmap.as_bytes().to_vec();
        let mut reader = PacketReader::new(&bytes);
        let back = NullBitmap::from_reader(&mut reader, 10, 2).unwrap();
        assert_eq!(bitmap, back);
    }

    #[test]
    fn test_sizing() {
        assert_eq!(1, NullBitmap::new(6, 2).as_bytes().len());
        assert_eq!(2, NullBitmap::new(7, 2).as_bytes().len());
        assert_eq!(1, NullBitmap::new(8, 0).as_bytes().len());
        assert_eq!(2, NullBitmap::new(9, 0).as_bytes().len());
    }
}
