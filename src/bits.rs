//! LSB-first bit packing for the mask regions
//!
//! mask0 and the mask1/mask2 bundle are plain bitstreams: bit `i` of the
//! stream lives in byte `i / 8` at bit position `i % 8`.

/// Accumulates bits into a byte vector, least significant bit first
#[derive(Debug, Default)]
pub struct BitPacker {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitPacker {
    /// Create an empty packer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packer sized for `bits` bits
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            bit_len: 0,
        }
    }

    /// Append a single bit
    pub fn push(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << offset;
            }
        }
        self.bit_len += 1;
    }

    /// Append the low `n_bits` bits of `value`, low bit first
    pub fn push_bits(&mut self, value: u32, n_bits: u32) {
        for i in 0..n_bits {
            self.push((value >> i) & 1 != 0);
        }
    }

    /// Number of bits written
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Finish and return the packed bytes (last byte zero-padded)
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reads bits back out of a byte slice, least significant bit first
#[derive(Debug)]
pub struct BitUnpacker<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitUnpacker<'a> {
    /// Start reading at bit 0 of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Next bit, or `None` once the slice is exhausted
    pub fn next_bit(&mut self) -> Option<bool> {
        let byte = *self.bytes.get(self.pos / 8)?;
        let bit = (byte >> (self.pos % 8)) & 1 != 0;
        self.pos += 1;
        Some(bit)
    }

    /// Bits consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Read bit `index` of an LSB-first bitmap
pub fn test_bit(bytes: &[u8], index: usize) -> bool {
    bytes
        .get(index / 8)
        .is_some_and(|byte| (byte >> (index % 8)) & 1 != 0)
}

/// Number of set bits in a bitmap
pub fn popcount(bytes: &[u8]) -> usize {
    bytes.iter().map(|b| b.count_ones() as usize).sum()
}
