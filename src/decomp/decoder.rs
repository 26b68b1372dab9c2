//! Synchronous flit decoder
//!
//! This is the one implementation of the decode algorithm. The clocked
//! [`Decompressor`](super::Decompressor) calls it in its DECOMPRESS state, and
//! callers without a clock use it directly.

use super::header::{decode_length_byte, FrameHeader};
use crate::bits::{popcount, test_bit, BitUnpacker};
use crate::common::{
    check_lut_num, DecoderSettings, FrameFormat, SymbolCount, SymbolType, HEADER_LEN,
};
use crate::tables::{LookupTables, Lut16};
use crate::{MaskPackError, Result};

/// Outcome of checking a header length byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedLength {
    /// Length encoded by the byte (byte + 1)
    pub length: usize,
    /// Whether the length lies within the flit bounds
    pub in_bounds: bool,
}

/// Stateless flit decoder owning its tables and runtime settings
#[derive(Debug, Clone)]
pub struct FlitDecoder {
    num_sym: SymbolCount,
    tables: LookupTables,
    settings: DecoderSettings,
}

impl FlitDecoder {
    /// Create a decoder with default tables
    pub fn new(num_sym: SymbolCount) -> Self {
        Self::with_tables(num_sym, LookupTables::default())
    }

    /// Create a decoder with explicit tables
    pub fn with_tables(num_sym: SymbolCount, tables: LookupTables) -> Self {
        Self {
            num_sym,
            tables,
            settings: DecoderSettings::default(),
        }
    }

    /// Symbols per flit
    pub fn num_sym(&self) -> SymbolCount {
        self.num_sym
    }

    /// Tables used for decoding
    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Mutable access for LUT loads
    pub fn tables_mut(&mut self) -> &mut LookupTables {
        &mut self.tables
    }

    /// Current runtime settings
    pub fn settings(&self) -> DecoderSettings {
        self.settings
    }

    /// Replace the runtime settings
    pub fn set_settings(&mut self, settings: DecoderSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Toggle raw PRI0 output
    pub fn set_filt_uncomp(&mut self, enabled: bool) {
        self.settings.filt_uncomp = enabled;
    }

    /// Select (or clear) the direct 4b-to-8b LUT
    pub fn set_direct_lut(&mut self, lut_num: Option<u8>) -> Result<()> {
        if let Some(lut) = lut_num {
            check_lut_num(lut)?;
        }
        self.settings.direct_lut = lut_num;
        Ok(())
    }

    /// Decode a length byte and check it against the flit bounds
    pub fn decode_length(&self, length_byte: u8) -> DecodedLength {
        let length = decode_length_byte(length_byte);
        DecodedLength {
            length,
            in_bounds: length >= self.num_sym.min_flit_len()
                && length <= self.num_sym.max_flit_len(),
        }
    }

    /// Decode one flit whose length is already known
    ///
    /// `input` starts at the header and must hold at least `packet_len` bytes.
    /// Returns exactly `num_total_sym` symbols.
    pub fn decompress_packet(&self, input: &[u8], packet_len: usize) -> Result<Vec<u8>> {
        if input.len() < HEADER_LEN || input.len() < packet_len {
            return Err(MaskPackError::MalformedFrame(format!(
                "{} bytes supplied for a {packet_len}-byte flit",
                input.len()
            )));
        }

        let header = FrameHeader::parse(input[0], input[1], self.num_sym);
        if header.packet_len != packet_len {
            return Err(MaskPackError::MalformedFrame(format!(
                "header declares {} bytes, caller expects {packet_len}",
                header.packet_len
            )));
        }
        header.check_format()?;
        header.check_len(self.num_sym)?;

        self.decode_body(&header, &input[HEADER_LEN..packet_len])
    }

    /// Decode one flit, taking its length from the header
    pub fn decompress_frame(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let length = frame
            .first()
            .map(|&byte0| decode_length_byte(byte0))
            .ok_or_else(|| MaskPackError::MalformedFrame("empty input".to_string()))?;
        self.decompress_packet(frame, length)
    }

    /// Decode a stream of back-to-back flits
    pub fn decompress_stream(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let length = decode_length_byte(data[pos]);
            let symbols = self.decompress_packet(&data[pos..], length)?;
            output.extend_from_slice(&symbols);
            pos += length;
        }

        Ok(output)
    }

    /// Decode the body of a flit whose header has been validated
    pub(crate) fn decode_body(&self, header: &FrameHeader, body: &[u8]) -> Result<Vec<u8>> {
        let n = self.num_sym.count();

        match header.format {
            FrameFormat::Uncompressed => Ok(body[..n].to_vec()),
            FrameFormat::AllPri0 => Ok(vec![self.pri0_value(header.lut_num); n]),
            FrameFormat::Compressed => self.decode_compressed(header, body),
            FrameFormat::UnknownFormat => {
                let [byte0, byte1] = header.to_bytes();
                Err(MaskPackError::UnknownFormat { byte0, byte1 })
            }
        }
    }

    fn pri0_value(&self, lut_num: u8) -> u8 {
        if self.settings.filt_uncomp {
            0
        } else {
            self.tables.pri0(lut_num)
        }
    }

    fn pri1_table(&self, lut_num: u8) -> &Lut16 {
        self.tables.pri1(self.settings.direct_lut.unwrap_or(lut_num))
    }

    fn pri2_table(&self, lut_num: u8) -> &Lut16 {
        match self.settings.direct_lut {
            Some(direct) => self.tables.pri1(direct),
            None => self.tables.pri2(lut_num),
        }
    }

    fn decode_compressed(&self, header: &FrameHeader, body: &[u8]) -> Result<Vec<u8>> {
        let n = self.num_sym.count();
        let mask0_len = self.num_sym.mask0_bytes();
        let mask0 = &body[..mask0_len];

        let present = popcount(mask0);
        if present == 0 {
            return Err(MaskPackError::MalformedFrame(
                "compressed flit with an empty mask0".to_string(),
            ));
        }

        let bundle_len = present.div_ceil(4);
        if header.payload_start_ptr as usize + 1 != bundle_len {
            return Err(MaskPackError::MalformedFrame(format!(
                "payload pointer {} does not match a {bundle_len}-byte mask bundle",
                header.payload_start_ptr
            )));
        }
        if body.len() < mask0_len + bundle_len {
            return Err(MaskPackError::MalformedFrame(
                "flit ends inside the mask bundle".to_string(),
            ));
        }

        // First pass: resolve every slot's class and tally the payload sizes
        let mut bundle = BitUnpacker::new(&body[mask0_len..mask0_len + bundle_len]);
        let mut classes = vec![SymbolType::Pri0; n];
        let mut nibble_count: usize = 0;
        let mut uncoded_count: usize = 0;

        for (slot, class) in classes.iter_mut().enumerate() {
            if !test_bit(mask0, slot) {
                continue;
            }
            let mask1 = bundle.next_bit().unwrap_or(false);
            let mask2 = bundle.next_bit().unwrap_or(false);
            *class = match (mask1, mask2) {
                (false, false) => {
                    uncoded_count += 1;
                    SymbolType::Uncoded
                }
                (true, false) => {
                    nibble_count += 1;
                    SymbolType::Pri1
                }
                (false, true) => {
                    nibble_count += 1;
                    SymbolType::Pri2
                }
                (true, true) => {
                    return Err(MaskPackError::MalformedFrame(format!(
                        "slot {slot} marked both PRI1 and PRI2"
                    )));
                }
            };
        }

        let nibble_start = mask0_len + bundle_len;
        let byte_start = nibble_start + nibble_count.div_ceil(2);
        let expected = byte_start + uncoded_count;
        if body.len() != expected {
            return Err(MaskPackError::MalformedFrame(format!(
                "body is {} bytes, masks imply {expected}",
                body.len()
            )));
        }

        // Second pass: substitute symbols from the payload regions
        let pri0 = self.pri0_value(header.lut_num);
        let pri1 = self.pri1_table(header.lut_num);
        let pri2 = self.pri2_table(header.lut_num);
        let mut nibble_index = 0;
        let mut byte_index = byte_start;
        let mut output = Vec::with_capacity(n);

        for class in classes {
            let symbol = match class {
                SymbolType::Pri1 | SymbolType::Pri2 => {
                    let packed = body[nibble_start + nibble_index / 2];
                    let code = if nibble_index % 2 == 0 {
                        packed & 0x0F
                    } else {
                        packed >> 4
                    };
                    nibble_index += 1;

                    let table = if class == SymbolType::Pri1 { pri1 } else { pri2 };
                    table[code as usize]
                }
                SymbolType::Uncoded => {
                    let byte = body[byte_index];
                    byte_index += 1;
                    byte
                }
                _ => pri0,
            };
            output.push(symbol);
        }

        Ok(output)
    }
}
