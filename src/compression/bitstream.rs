/// Packs bits most-significant-bit first within each output byte
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bit(&mut self, bit: bool) {
        let shift = 7 - (self.bit_len % 8) as u8;
        if shift == 7 {
            self.bytes.push(0);
        }
        if bit {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << shift;
            }
        }
        self.bit_len += 1;
    }

    pub fn push_bits(&mut self, bits: &[bool]) {
        for &bit in bits {
            self.push_bit(bit);
        }
    }

    /// Number of bits written so far
    pub fn bit_len(&self) -> u64 {
        self.bit_len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Packed bytes; the final byte is zero-padded
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bit at `offset` (MSB-first), `None` past the end of `buf`
#[inline]
pub fn bit_at(buf: &[u8], offset: u64) -> Option<bool> {
    let byte = *buf.get((offset / 8) as usize)?;
    Some(byte & (0x80 >> (offset % 8)) != 0)
}
