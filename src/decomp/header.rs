//! Flit header parsing and classification
//!
//! byte0 carries `length - 1`; byte1 packs `[lut_num:3][payload_start_ptr:5]`.
//! The framing is derived from those two bytes and the configured symbol count.

use crate::common::{FrameFormat, SymbolCount, HEADER_LEN};
use crate::{MaskPackError, Result};

/// Decoded flit header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total flit length in bytes, header included (1..=256)
    pub packet_len: usize,
    /// LUT set the flit was coded against
    pub lut_num: u8,
    /// Bundle length in bytes minus one (COMPRESSED only)
    pub payload_start_ptr: u8,
    /// Framing derived from the header
    pub format: FrameFormat,
}

impl FrameHeader {
    /// Parse and classify a header
    pub fn parse(byte0: u8, byte1: u8, num_sym: SymbolCount) -> Self {
        let packet_len = decode_length_byte(byte0);
        let lut_num = byte1 >> 5;
        let payload_start_ptr = byte1 & 0x1F;

        let format = if packet_len == HEADER_LEN {
            if payload_start_ptr == 0 {
                FrameFormat::AllPri0
            } else {
                FrameFormat::UnknownFormat
            }
        } else if packet_len == num_sym.uncompressed_len() {
            if byte1 == 0 {
                FrameFormat::Uncompressed
            } else {
                FrameFormat::UnknownFormat
            }
        } else {
            FrameFormat::Compressed
        };

        Self {
            packet_len,
            lut_num,
            payload_start_ptr,
            format,
        }
    }

    /// Build a header for an outgoing flit
    pub fn new(packet_len: usize, lut_num: u8, payload_start_ptr: u8, format: FrameFormat) -> Self {
        Self {
            packet_len,
            lut_num: lut_num & 0x07,
            payload_start_ptr: payload_start_ptr & 0x1F,
            format,
        }
    }

    /// Serialize to the two wire bytes
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        [
            (self.packet_len - 1) as u8,
            (self.lut_num << 5) | self.payload_start_ptr,
        ]
    }

    /// Reject an unknown format
    pub fn check_format(&self) -> Result<()> {
        if self.format == FrameFormat::UnknownFormat {
            let [byte0, byte1] = self.to_bytes();
            return Err(MaskPackError::UnknownFormat { byte0, byte1 });
        }
        Ok(())
    }

    /// Validate the length against the flit bounds of `num_sym`
    pub fn check_len(&self, num_sym: SymbolCount) -> Result<()> {
        let min = match self.format {
            FrameFormat::Compressed => num_sym.min_compressed_len(),
            _ => num_sym.min_flit_len(),
        };
        let max = num_sym.max_flit_len();

        if self.packet_len < min || self.packet_len > max {
            return Err(MaskPackError::LengthOutOfBounds {
                length: self.packet_len,
                min,
                max,
            });
        }
        Ok(())
    }
}

/// Length encoded by a header length byte
pub fn decode_length_byte(byte0: u8) -> usize {
    byte0 as usize + 1
}

/// Walk a stream of back-to-back flits and return their headers
pub fn frame_headers(data: &[u8], num_sym: SymbolCount) -> Result<Vec<FrameHeader>> {
    let mut headers = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if data.len() - pos < HEADER_LEN {
            return Err(MaskPackError::MalformedFrame(format!(
                "truncated header at offset {pos}"
            )));
        }

        let header = FrameHeader::parse(data[pos], data[pos + 1], num_sym);
        header.check_format()?;
        header.check_len(num_sym)?;

        if data.len() - pos < header.packet_len {
            return Err(MaskPackError::MalformedFrame(format!(
                "flit at offset {pos} declares {} bytes, {} remain",
                header.packet_len,
                data.len() - pos
            )));
        }

        pos += header.packet_len;
        headers.push(header);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let n = SymbolCount::Sym64;

        assert_eq!(FrameHeader::parse(1, 0x00, n).format, FrameFormat::AllPri0);
        assert_eq!(FrameHeader::parse(1, 0xA0, n).format, FrameFormat::AllPri0);
        assert_eq!(
            FrameHeader::parse(1, 0x05, n).format,
            FrameFormat::UnknownFormat
        );

        assert_eq!(
            FrameHeader::parse(65, 0x00, n).format,
            FrameFormat::Uncompressed
        );
        assert_eq!(
            FrameHeader::parse(65, 0x20, n).format,
            FrameFormat::UnknownFormat
        );

        assert_eq!(
            FrameHeader::parse(20, 0x43, n).format,
            FrameFormat::Compressed
        );
        // 66 bytes is UNCOMPRESSED for 64 symbols but COMPRESSED-shaped for 128
        assert_eq!(
            FrameHeader::parse(65, 0x00, SymbolCount::Sym128).format,
            FrameFormat::Compressed
        );
    }

    #[test]
    fn test_fields() {
        let header = FrameHeader::parse(0x13, 0b101_00110, SymbolCount::Sym128);
        assert_eq!(header.packet_len, 20);
        assert_eq!(header.lut_num, 5);
        assert_eq!(header.payload_start_ptr, 6);
        assert_eq!(header.to_bytes(), [0x13, 0b101_00110]);
    }

    #[test]
    fn test_length_bounds() {
        let n = SymbolCount::Sym64;
        assert!(FrameHeader::parse(1, 0, n).check_len(n).is_ok());
        assert!(FrameHeader::parse(65, 0, n).check_len(n).is_ok());
        assert!(FrameHeader::parse(66, 0, n).check_len(n).is_err());
        assert!(FrameHeader::parse(255, 0, n).check_len(n).is_err());

        // COMPRESSED needs at least header + mask0 + bundle byte + payload byte
        assert!(FrameHeader::parse(10, 0, n).check_len(n).is_err());
        assert!(FrameHeader::parse(11, 0, n).check_len(n).is_ok());
        assert!(matches!(
            FrameHeader::parse(0, 0, n).check_len(n),
            Err(MaskPackError::LengthOutOfBounds { length: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_format_error() {
        let header = FrameHeader::parse(1, 0x05, SymbolCount::Sym64);
        assert!(matches!(
            header.check_format(),
            Err(MaskPackError::UnknownFormat {
                byte0: 1,
                byte1: 0x05
            })
        ));
    }

    #[test]
    fn test_frame_headers_walk() {
        let n = SymbolCount::Sym64;
        let mut stream = vec![1, 0x00, 1, 0x20];
        stream.push(65);
        stream.push(0);
        stream.extend_from_slice(&[0x42; 64]);

        let headers = frame_headers(&stream, n).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[1].lut_num, 1);
        assert_eq!(headers[2].format, FrameFormat::Uncompressed);

        assert!(frame_headers(&stream[..stream.len() - 1], n).is_err());
        assert!(frame_headers(&[1], n).is_err());
    }
}
