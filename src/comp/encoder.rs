//! Synchronous flit encoder
//!
//! Compression runs in three passes over a block of `num_total_sym` symbols:
//! classify and match every symbol against the LUTs, size the COMPRESSED
//! framing, then emit whichever framing is cheapest.

use crate::bits::BitPacker;
use crate::common::{
    check_layer, check_lut_num, BusWidth, EncoderSettings, FrameFormat, SymbolCount, SymbolType,
    HEADER_LEN,
};
use crate::decomp::FrameHeader;
use crate::tables::{LookupTables, Lut16, SymbolClassifier, SymbolTypeTable};
use crate::{MaskPackError, Result};

/// Per-symbol classes and LUT codes of one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolScan {
    /// Final class of every slot
    pub classes: Vec<SymbolType>,
    /// 4-bit LUT index of every PRI1/PRI2 slot (zero elsewhere)
    pub codes: Vec<u8>,
    /// Slots carried by mask0 alone
    pub pri0_count: usize,
    /// Slots coded through pri1
    pub pri1_count: usize,
    /// Slots coded through pri2
    pub pri2_count: usize,
    /// Slots carried verbatim
    pub uncoded_count: usize,
}

impl SymbolScan {
    /// Slots that are not PRI0
    pub fn present_count(&self) -> usize {
        self.classes.len() - self.pri0_count
    }

    /// Slots carried in the 4-bit payload region
    pub fn nibble_count(&self) -> usize {
        self.pri1_count + self.pri2_count
    }
}

/// Exact and bus-rounded COMPRESSED length of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedLength {
    /// Exact byte length
    pub length: usize,
    /// Length rounded up to the output bus width
    pub rounded: usize,
}

/// A finished flit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedData {
    /// Flit bytes, header included
    pub data: Vec<u8>,
    /// Exact length of `data`
    pub encoded_len: usize,
    /// Length rounded up to the output bus width
    pub rounded_len: usize,
    /// Framing that was chosen
    pub format: FrameFormat,
}

/// Flit encoder owning its tables, classification and runtime settings
#[derive(Debug, Clone)]
pub struct FlitEncoder {
    num_sym: SymbolCount,
    out_width: BusWidth,
    tables: LookupTables,
    settings: EncoderSettings,
    symbol_types: SymbolTypeTable,
}

impl FlitEncoder {
    /// Create an encoder with default tables and layer 0
    pub fn new(num_sym: SymbolCount, out_width: BusWidth) -> Result<Self> {
        Self::with_tables(num_sym, out_width, LookupTables::default())
    }

    /// Create an encoder with explicit tables and layer 0
    pub fn with_tables(
        num_sym: SymbolCount,
        out_width: BusWidth,
        tables: LookupTables,
    ) -> Result<Self> {
        let settings = EncoderSettings::default();
        Ok(Self {
            num_sym,
            out_width,
            tables,
            symbol_types: SymbolClassifier::build_table(settings.layer)?,
            settings,
        })
    }

    /// Symbols per block
    pub fn num_sym(&self) -> SymbolCount {
        self.num_sym
    }

    /// Tables used for matching
    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Mutable access for LUT loads
    pub fn tables_mut(&mut self) -> &mut LookupTables {
        &mut self.tables
    }

    /// Current runtime settings
    pub fn settings(&self) -> EncoderSettings {
        self.settings
    }

    /// Active classification table
    pub fn symbol_types(&self) -> &SymbolTypeTable {
        &self.symbol_types
    }

    /// Replace the runtime settings and rebuild the classification table
    pub fn set_settings(&mut self, settings: EncoderSettings) -> Result<()> {
        settings.validate()?;
        self.symbol_types = SymbolClassifier::build_table(settings.layer)?;
        self.settings = settings;
        Ok(())
    }

    /// Select the LUT set written into flit headers
    pub fn set_lut_num(&mut self, lut_num: u8) -> Result<()> {
        check_lut_num(lut_num)?;
        self.settings.lut_num = lut_num;
        Ok(())
    }

    /// Select a predefined layer and rebuild the classification table
    pub fn set_layer(&mut self, layer: u8) -> Result<()> {
        check_layer(layer)?;
        self.symbol_types = SymbolClassifier::build_table(layer)?;
        self.settings.layer = layer;
        Ok(())
    }

    /// Install caller-supplied classification data
    pub fn set_symbol_types(&mut self, table: SymbolTypeTable) {
        self.symbol_types = table;
    }

    /// Select (or clear) the direct 4b-to-8b LUT
    pub fn set_direct_lut(&mut self, lut_num: Option<u8>) -> Result<()> {
        if let Some(lut) = lut_num {
            check_lut_num(lut)?;
        }
        self.settings.direct_lut = lut_num;
        Ok(())
    }

    fn pri1_table(&self) -> &Lut16 {
        self.tables
            .pri1(self.settings.direct_lut.unwrap_or(self.settings.lut_num))
    }

    fn pri2_table(&self) -> &Lut16 {
        match self.settings.direct_lut {
            Some(direct) => self.tables.pri1(direct),
            None => self.tables.pri2(self.settings.lut_num),
        }
    }

    /// Classify every symbol and find its LUT code
    ///
    /// A symbol equal to the PRI0 value is always PRI0. Other symbols are
    /// tried as the class their high nibble selects; a PRI1/PRI2 candidate
    /// missing from its table falls back to UNCODED.
    pub fn scan_and_match(&self, block: &[u8]) -> Result<SymbolScan> {
        let n = self.num_sym.count();
        if block.len() != n {
            return Err(MaskPackError::InvalidBlockSize {
                expected: n,
                actual: block.len(),
            });
        }

        let pri0 = self.tables.pri0(self.settings.lut_num);
        let pri1 = self.pri1_table();
        let pri2 = self.pri2_table();

        let mut scan = SymbolScan {
            classes: Vec::with_capacity(n),
            codes: Vec::with_capacity(n),
            pri0_count: 0,
            pri1_count: 0,
            pri2_count: 0,
            uncoded_count: 0,
        };

        for &symbol in block {
            let (class, code) = if symbol == pri0 {
                (SymbolType::Pri0, 0)
            } else {
                match self.symbol_types.classify(symbol) {
                    SymbolType::Pri1 => match LookupTables::find(pri1, symbol) {
                        Some(code) => (SymbolType::Pri1, code),
                        None => (SymbolType::Uncoded, 0),
                    },
                    SymbolType::Pri2 => match LookupTables::find(pri2, symbol) {
                        Some(code) => (SymbolType::Pri2, code),
                        None => (SymbolType::Uncoded, 0),
                    },
                    SymbolType::Pri0 | SymbolType::Uncoded => (SymbolType::Uncoded, 0),
                    SymbolType::Unknown => {
                        return Err(MaskPackError::UnknownSymbolClass { symbol });
                    }
                }
            };

            match class {
                SymbolType::Pri0 => scan.pri0_count += 1,
                SymbolType::Pri1 => scan.pri1_count += 1,
                SymbolType::Pri2 => scan.pri2_count += 1,
                _ => scan.uncoded_count += 1,
            }
            scan.classes.push(class);
            scan.codes.push(code);
        }

        Ok(scan)
    }

    /// Size of the COMPRESSED framing of a scanned block
    pub fn get_enc_length(&self, scan: &SymbolScan) -> EncodedLength {
        let length = HEADER_LEN
            + self.num_sym.mask0_bytes()
            + scan.present_count().div_ceil(4)
            + scan.nibble_count().div_ceil(2)
            + scan.uncoded_count;

        EncodedLength {
            length,
            rounded: self.out_width.round_up(length),
        }
    }

    /// Emit the cheapest framing for a scanned block
    pub fn compress(&self, block: &[u8], scan: &SymbolScan) -> EncodedData {
        let lut_num = self.settings.lut_num;
        let uncompressed_len = self.num_sym.uncompressed_len();

        let (data, format) = if scan.pri0_count == block.len() {
            let header = FrameHeader::new(HEADER_LEN, lut_num, 0, FrameFormat::AllPri0);
            (header.to_bytes().to_vec(), FrameFormat::AllPri0)
        } else if self.get_enc_length(scan).length >= uncompressed_len {
            let header = FrameHeader::new(uncompressed_len, 0, 0, FrameFormat::Uncompressed);
            let mut data = Vec::with_capacity(uncompressed_len);
            data.extend_from_slice(&header.to_bytes());
            data.extend_from_slice(block);
            (data, FrameFormat::Uncompressed)
        } else {
            (self.build_compressed(block, scan), FrameFormat::Compressed)
        };

        EncodedData {
            encoded_len: data.len(),
            rounded_len: self.out_width.round_up(data.len()),
            data,
            format,
        }
    }

    fn build_compressed(&self, block: &[u8], scan: &SymbolScan) -> Vec<u8> {
        let expected = self.get_enc_length(scan).length;

        let mut mask0 = BitPacker::with_capacity(block.len());
        let mut bundle = BitPacker::with_capacity(2 * scan.present_count());
        let mut nibbles = vec![0u8; scan.nibble_count().div_ceil(2)];
        let mut uncoded = Vec::with_capacity(scan.uncoded_count);
        let mut nibble_index = 0;

        for ((&symbol, &class), &code) in block.iter().zip(&scan.classes).zip(&scan.codes) {
            mask0.push(class != SymbolType::Pri0);
            match class {
                SymbolType::Pri0 => {}
                SymbolType::Pri1 | SymbolType::Pri2 => {
                    bundle.push(class == SymbolType::Pri1);
                    bundle.push(class == SymbolType::Pri2);
                    let shift = if nibble_index % 2 == 0 { 0 } else { 4 };
                    nibbles[nibble_index / 2] |= (code & 0x0F) << shift;
                    nibble_index += 1;
                }
                _ => {
                    bundle.push(false);
                    bundle.push(false);
                    uncoded.push(symbol);
                }
            }
        }

        let mask0 = mask0.into_bytes();
        let bundle = bundle.into_bytes();
        let header = FrameHeader::new(
            expected,
            self.settings.lut_num,
            (bundle.len() - 1) as u8,
            FrameFormat::Compressed,
        );

        let mut data = Vec::with_capacity(expected);
        data.extend_from_slice(&header.to_bytes());
        data.extend_from_slice(&mask0);
        data.extend_from_slice(&bundle);
        data.extend_from_slice(&nibbles);
        data.extend_from_slice(&uncoded);
        debug_assert_eq!(data.len(), expected);
        data
    }

    /// Compress one block of exactly `num_total_sym` symbols
    pub fn compress_packet(&self, block: &[u8]) -> Result<EncodedData> {
        let scan = self.scan_and_match(block)?;
        Ok(self.compress(block, &scan))
    }

    /// Compress a stream made of whole blocks into back-to-back flits
    pub fn compress_stream(&self, data: &[u8]) -> Result<Vec<u8>> {
        let n = self.num_sym.count();
        if data.len() % n != 0 {
            return Err(MaskPackError::InvalidBlockSize {
                expected: n,
                actual: data.len() % n,
            });
        }

        let mut output = Vec::with_capacity(data.len());
        for block in data.chunks(n) {
            output.extend_from_slice(&self.compress_packet(block)?.data);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> FlitEncoder {
        FlitEncoder::new(SymbolCount::Sym64, BusWidth::W32).unwrap()
    }

    #[test]
    fn test_all_pri0_is_two_bytes() {
        let mut encoder = encoder();
        encoder.tables_mut().set_pri0(0, 0x42).unwrap();

        let encoded = encoder.compress_packet(&[0x42; 64]).unwrap();
        assert_eq!(encoded.format, FrameFormat::AllPri0);
        assert_eq!(encoded.data, vec![0x01, 0x00]);
        assert_eq!(encoded.encoded_len, 2);
        assert_eq!(encoded.rounded_len, 32);
    }

    #[test]
    fn test_scan_counts() {
        let mut block = vec![0u8; 64];
        block[0] = 3; // pri1[2]
        block[1] = 0xFD; // pri2[2]
        block[2] = 0x42; // uncoded by class
        block[3] = 0x0F; // pri1 candidate, in table as index 14
        block[4] = 0x1F; // pri1 candidate missing from the table

        let scan = encoder().scan_and_match(&block).unwrap();
        assert_eq!(scan.pri0_count, 59);
        assert_eq!(scan.pri1_count, 2);
        assert_eq!(scan.pri2_count, 1);
        assert_eq!(scan.uncoded_count, 2);
        assert_eq!(scan.codes[0], 2);
        assert_eq!(scan.codes[1], 2);
        assert_eq!(scan.codes[3], 14);
        assert_eq!(scan.classes[4], SymbolType::Uncoded);
    }

    #[test]
    fn test_enc_length() {
        let mut block = vec![0u8; 64];
        block[0] = 3;
        block[1] = 0x77;
        block[2] = 0xFE;

        let encoder = encoder();
        let scan = encoder.scan_and_match(&block).unwrap();
        let length = encoder.get_enc_length(&scan);
        // header + mask0 + 1 bundle byte + 1 nibble byte + 1 uncoded byte
        assert_eq!(length.length, 2 + 8 + 1 + 1 + 1);
        assert_eq!(length.rounded, 32);

        let encoded = encoder.compress(&block, &scan);
        assert_eq!(encoded.format, FrameFormat::Compressed);
        assert_eq!(
            encoded.data,
            vec![12, 0x00, 0b111, 0, 0, 0, 0, 0, 0, 0, 0b0010_0001, 0x12, 0x77]
        );
    }

    #[test]
    fn test_falls_back_to_uncompressed() {
        let block: Vec<u8> = (0..64).map(|i| 0x40 + i as u8).collect();
        let encoder = encoder();
        let scan = encoder.scan_and_match(&block).unwrap();
        assert!(encoder.get_enc_length(&scan).length >= 66);

        let encoded = encoder.compress(&block, &scan);
        assert_eq!(encoded.format, FrameFormat::Uncompressed);
        assert_eq!(&encoded.data[..2], &[65, 0]);
        assert_eq!(&encoded.data[2..], &block[..]);
    }

    #[test]
    fn test_block_size_checked() {
        assert!(matches!(
            encoder().compress_packet(&[0; 63]),
            Err(MaskPackError::InvalidBlockSize {
                expected: 64,
                actual: 63
            })
        ));
        assert!(encoder().compress_stream(&[0; 65]).is_err());
    }

    #[test]
    fn test_unknown_class_is_config_error() {
        let mut encoder = encoder();
        encoder.set_symbol_types(SymbolTypeTable::default());

        // PRI0 symbols never consult the class table
        assert!(encoder.compress_packet(&[0; 64]).is_ok());

        let mut block = [0u8; 64];
        block[7] = 0x31;
        assert!(matches!(
            encoder.compress_packet(&block),
            Err(MaskPackError::UnknownSymbolClass { symbol: 0x31 })
        ));
    }

    #[test]
    fn test_layer_and_lut_selection() {
        let mut encoder = encoder();
        encoder.set_layer(6).unwrap();

        // Layer 6 never LUT-codes
        let mut block = [0u8; 64];
        block[0] = 1;
        let scan = encoder.scan_and_match(&block).unwrap();
        assert_eq!(scan.uncoded_count, 1);

        encoder.set_lut_num(5).unwrap();
        let encoded = encoder.compress_packet(&[0; 64]).unwrap();
        assert_eq!(encoded.data, vec![0x01, 5 << 5]);

        assert!(encoder.set_layer(8).is_err());
        assert!(encoder.set_lut_num(8).is_err());
    }
}
