//! Clocked decompressor pipeline
//!
//! Models the hardware decompressor: the head stage walks a header state
//! machine over the input FIFO, decodes a whole flit once all of its bytes have
//! arrived, and hands the symbols to the holding stages that meter them into
//! the output FIFO.

use super::decoder::{DecodedLength, FlitDecoder};
use super::header::FrameHeader;
use crate::common::{
    BusWidth, ClockConfig, DecoderSettings, PipelineStats, SymbolCount, DEFAULT_FIFO_DEPTH,
    HEADER_LEN, PIPELINE_DEPTH,
};
use crate::fifo::ByteFifo;
use crate::stage::{FlitBuffer, HoldingStages, TickReport};
use crate::tables::{LookupTables, Lut16};
use crate::{MaskPackError, Result};
use log::{debug, info, warn};
use std::time::Duration;

/// Head-stage state of the decompressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompState {
    /// Waiting for the first byte
    Init,
    /// Waiting for both header bytes
    ReadLen,
    /// Validating the declared length
    CheckLen,
    /// Waiting for the rest of the flit
    WaitForAllBytes,
    /// Decoding the flit into `hs0`
    Decompress,
    /// Malformed input seen; only a reset leaves this state
    HasError,
}

/// Construction-time configuration of a decompressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressorConfig {
    /// Input bus width
    pub in_width: BusWidth,
    /// Output bus width
    pub out_width: BusWidth,
    /// Symbols per flit
    pub num_total_sym: SymbolCount,
    /// Clock driving the pipeline
    pub clock: ClockConfig,
    /// FIFO depth in bus entries
    pub fifo_depth: usize,
}

impl DecompressorConfig {
    /// Build and validate a configuration from raw values
    pub fn new(in_width8: u32, out_width8: u32, num_total_sym: u32) -> Result<Self> {
        let config = Self {
            in_width: BusWidth::from_bytes(in_width8)?,
            out_width: BusWidth::from_bytes(out_width8)?,
            num_total_sym: SymbolCount::from_count(num_total_sym)?,
            clock: ClockConfig::default(),
            fifo_depth: DEFAULT_FIFO_DEPTH,
        };
        config.validate()?;
        Ok(config)
    }

    /// Drive the pipeline from a different clock
    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    /// Use FIFOs of `depth` bus entries
    pub fn with_fifo_depth(mut self, depth: usize) -> Result<Self> {
        self.fifo_depth = depth;
        self.validate()?;
        Ok(self)
    }

    /// Check that the FIFOs can hold a maximum-length flit and a decoded block
    pub fn validate(&self) -> Result<()> {
        let in_depth = self.fifo_depth * self.in_width.bytes();
        let required = self.num_total_sym.max_flit_len();
        if in_depth < required {
            return Err(MaskPackError::FifoTooShallow {
                depth: in_depth,
                required,
            });
        }

        let out_depth = self.fifo_depth * self.out_width.bytes();
        if out_depth < self.out_width.bytes() {
            return Err(MaskPackError::FifoTooShallow {
                depth: out_depth,
                required: self.out_width.bytes(),
            });
        }
        Ok(())
    }
}

impl Default for DecompressorConfig {
    fn default() -> Self {
        Self {
            in_width: BusWidth::W32,
            out_width: BusWidth::W32,
            num_total_sym: SymbolCount::Sym64,
            clock: ClockConfig::default(),
            fifo_depth: DEFAULT_FIFO_DEPTH,
        }
    }
}

/// Cycle-level decompressor
#[derive(Debug)]
pub struct Decompressor {
    config: DecompressorConfig,
    decoder: FlitDecoder,
    input: ByteFifo,
    output: ByteFifo,
    state: DecompState,
    header: Option<FrameHeader>,
    stages: HoldingStages,
    cycle: u64,
    stats: PipelineStats,
    fault: Option<String>,
}

impl Decompressor {
    /// Create a decompressor with default tables
    pub fn new(config: DecompressorConfig) -> Result<Self> {
        Self::with_tables(config, LookupTables::default())
    }

    /// Create a decompressor with explicit tables
    pub fn with_tables(config: DecompressorConfig, tables: LookupTables) -> Result<Self> {
        config.validate()?;
        let input = ByteFifo::new(
            config.fifo_depth * config.in_width.bytes(),
            config.in_width.bytes(),
        )?;
        let output = ByteFifo::new(
            config.fifo_depth * config.out_width.bytes(),
            config.out_width.bytes(),
        )?;

        Ok(Self {
            config,
            decoder: FlitDecoder::with_tables(config.num_total_sym, tables),
            input,
            output,
            state: DecompState::Init,
            header: None,
            stages: HoldingStages::new(config.out_width),
            cycle: 0,
            stats: PipelineStats::default(),
            fault: None,
        })
    }

    /// Configuration the pipeline was built with
    pub fn config(&self) -> &DecompressorConfig {
        &self.config
    }

    /// Current head-stage state
    pub fn state(&self) -> DecompState {
        self.state
    }

    /// Whether the pipeline sits in its error sink
    pub fn is_faulted(&self) -> bool {
        self.state == DecompState::HasError
    }

    /// `Err(Faulted)` while the pipeline sits in its error sink
    pub fn status(&self) -> Result<()> {
        if self.is_faulted() {
            return Err(MaskPackError::Faulted);
        }
        Ok(())
    }

    /// Description of the condition that faulted the pipeline
    pub fn fault_reason(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Valid flag of each holding stage, `hs0` first
    pub fn stage_valid(&self) -> [bool; PIPELINE_DEPTH] {
        self.stages.valid_flags()
    }

    /// Clock edges seen since construction
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Simulated time since construction
    pub fn elapsed(&self) -> Duration {
        self.config.clock.time_at(self.cycle)
    }

    /// Running counters
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Input FIFO (written by the upstream transport)
    pub fn input(&self) -> &ByteFifo {
        &self.input
    }

    /// Output FIFO (drained by the downstream transport)
    pub fn output(&self) -> &ByteFifo {
        &self.output
    }

    /// Push compressed bytes into the input FIFO
    pub fn write_input(&mut self, data: &[u8]) -> Result<()> {
        self.input.write(data)
    }

    /// Pop exactly `len` decoded bytes from the output FIFO
    pub fn read_output(&mut self, len: usize) -> Result<Vec<u8>> {
        self.output.read_vec(len)
    }

    /// Pop every decoded byte currently in the output FIFO
    pub fn drain_output(&mut self) -> Vec<u8> {
        self.output.drain_all()
    }

    /// Load the pri0 value of one LUT set
    pub fn set_pri0(&mut self, lut_num: u8, value: u8) -> Result<()> {
        self.decoder.tables_mut().set_pri0(lut_num, value)
    }

    /// Load the pri1 table of one LUT set
    pub fn set_pri1(&mut self, lut_num: u8, entries: &Lut16) -> Result<()> {
        self.decoder.tables_mut().set_pri1(lut_num, entries)
    }

    /// Load the pri2 table of one LUT set
    pub fn set_pri2(&mut self, lut_num: u8, entries: &Lut16) -> Result<()> {
        self.decoder.tables_mut().set_pri2(lut_num, entries)
    }

    /// Replace the runtime settings
    pub fn set_settings(&mut self, settings: DecoderSettings) -> Result<()> {
        self.decoder.set_settings(settings)
    }

    /// Toggle raw PRI0 output
    pub fn set_filt_uncomp(&mut self, enabled: bool) {
        self.decoder.set_filt_uncomp(enabled);
    }

    /// Select (or clear) the direct 4b-to-8b LUT
    pub fn set_direct_lut(&mut self, lut_num: Option<u8>) -> Result<()> {
        self.decoder.set_direct_lut(lut_num)
    }

    /// Backdoor decode of one flit, bypassing the FIFOs and the state machine
    pub fn bd_decompress_packet(&self, input: &[u8], packet_len: usize) -> Result<Vec<u8>> {
        self.decoder.decompress_packet(input, packet_len)
    }

    /// Backdoor length-byte check
    pub fn decode_length(&self, length_byte: u8) -> DecodedLength {
        self.decoder.decode_length(length_byte)
    }

    /// Abort any in-flight flit and return to `Init` with empty FIFOs
    pub fn reset(&mut self) {
        info!("decompressor reset at cycle {}", self.cycle);
        self.input.reset();
        self.output.reset();
        self.stages.clear();
        self.header = None;
        self.fault = None;
        self.state = DecompState::Init;
    }

    /// Advance the pipeline by one clock edge
    pub fn tick(&mut self) -> TickReport {
        self.cycle += 1;

        let report = match self.stages.advance(&mut self.output) {
            Ok(report) => report,
            Err(e) => {
                self.enter_error(e);
                return TickReport::default();
            }
        };

        if report.stalled {
            self.stats.stall_cycles += 1;
            return report;
        }

        self.stats.bytes_out += report.bytes_written as u64;
        if report.completed.is_some() {
            self.stats.frames_out += 1;
        }

        if let Err(e) = self.step() {
            self.enter_error(e);
        }
        report
    }

    /// Tick until the input is consumed and every stage has drained, or
    /// `max_cycles` edges have passed; returns the edges used
    pub fn run_until_idle(&mut self, max_cycles: u64) -> u64 {
        let start = self.cycle;
        while self.cycle - start < max_cycles {
            let idle = self.stages.is_empty()
                && (self.is_faulted() || self.input.available_bytes() < self.pending_need());
            if idle {
                break;
            }
            self.tick();
        }
        self.cycle - start
    }

    /// Bytes the head stage is waiting for before it can make progress
    fn pending_need(&self) -> usize {
        match (self.state, self.header) {
            (DecompState::Init, _) => 1,
            (DecompState::ReadLen, _) => HEADER_LEN,
            (DecompState::CheckLen | DecompState::Decompress, _) => 0,
            (_, Some(header)) => header.packet_len,
            (_, None) => HEADER_LEN,
        }
    }

    fn step(&mut self) -> Result<()> {
        match self.state {
            DecompState::Init => {
                if self.input.available_bytes() >= 1 {
                    self.transition(DecompState::ReadLen);
                }
            }
            DecompState::ReadLen => {
                if self.input.available_bytes() >= HEADER_LEN {
                    let mut bytes = [0u8; HEADER_LEN];
                    self.input.peek(&mut bytes)?;
                    let header = FrameHeader::parse(bytes[0], bytes[1], self.config.num_total_sym);
                    debug!(
                        "flit header {:02X} {:02X}: {:?}, {} bytes, lut {}",
                        bytes[0], bytes[1], header.format, header.packet_len, header.lut_num
                    );
                    self.header = Some(header);
                    header.check_format()?;
                    self.transition(DecompState::CheckLen);
                }
            }
            DecompState::CheckLen => {
                self.current_header()?.check_len(self.config.num_total_sym)?;
                self.transition(DecompState::WaitForAllBytes);
            }
            DecompState::WaitForAllBytes => {
                if self.input.available_bytes() >= self.current_header()?.packet_len {
                    self.transition(DecompState::Decompress);
                }
            }
            DecompState::Decompress => {
                if self.stages.can_accept() {
                    let header = self.current_header()?;
                    let flit = self.input.read_vec(header.packet_len)?;
                    let symbols = self.decoder.decode_body(&header, &flit[HEADER_LEN..])?;

                    self.stats.frames_in += 1;
                    self.stats.bytes_in += header.packet_len as u64;
                    self.stats.count_format(header.format);

                    self.stages
                        .load(FlitBuffer::new(symbols, header.format))
                        .map_err(|_| MaskPackError::StageOccupied)?;
                    self.header = None;
                    self.transition(DecompState::ReadLen);
                }
            }
            DecompState::HasError => {}
        }
        Ok(())
    }

    fn current_header(&self) -> Result<FrameHeader> {
        self.header
            .ok_or_else(|| MaskPackError::MalformedFrame("no header latched".to_string()))
    }

    fn transition(&mut self, next: DecompState) {
        debug!("decompressor {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn enter_error(&mut self, error: MaskPackError) {
        warn!("decompressor fault at cycle {}: {}", self.cycle, error);
        self.fault = Some(error.to_string());
        self.state = DecompState::HasError;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Decompressor {
        Decompressor::new(DecompressorConfig::default()).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(DecompressorConfig::new(32, 32, 64).is_ok());
        assert!(DecompressorConfig::new(24, 32, 64).is_err());
        assert!(DecompressorConfig::new(32, 32, 100).is_err());

        let shallow = DecompressorConfig {
            in_width: BusWidth::W16,
            fifo_depth: 4,
            ..Default::default()
        };
        assert!(matches!(
            Decompressor::new(shallow),
            Err(MaskPackError::FifoTooShallow { .. })
        ));
    }

    #[test]
    fn test_header_walk() {
        let mut dec = pipeline();
        assert_eq!(dec.state(), DecompState::Init);

        dec.write_input(&[1, 0]).unwrap();
        dec.tick();
        assert_eq!(dec.state(), DecompState::ReadLen);
        dec.tick();
        assert_eq!(dec.state(), DecompState::CheckLen);
        dec.tick();
        assert_eq!(dec.state(), DecompState::WaitForAllBytes);
        dec.tick();
        assert_eq!(dec.state(), DecompState::Decompress);
        dec.tick();
        assert_eq!(dec.state(), DecompState::ReadLen);
        assert_eq!(dec.stage_valid(), [true, false, false, false, false]);
    }

    #[test]
    fn test_waits_for_whole_flit() {
        let mut dec = pipeline();
        let mut flit = vec![65, 0];
        flit.extend([0x33; 64]);

        dec.write_input(&flit[..40]).unwrap();
        for _ in 0..10 {
            dec.tick();
        }
        assert_eq!(dec.state(), DecompState::WaitForAllBytes);
        assert!(dec.stage_valid().iter().all(|v| !v));

        dec.write_input(&flit[40..]).unwrap();
        dec.run_until_idle(100);
        assert_eq!(dec.drain_output(), vec![0x33; 64]);
        assert_eq!(dec.stats().uncompressed_frames, 1);
    }

    #[test]
    fn test_unknown_format_faults() {
        let mut dec = pipeline();
        dec.write_input(&[1, 0x05]).unwrap();
        dec.run_until_idle(20);

        assert!(dec.is_faulted());
        assert!(dec.fault_reason().unwrap().contains("Unknown frame format"));

        // The sink state ignores further input
        dec.write_input(&[1, 0]).unwrap();
        dec.run_until_idle(20);
        assert!(dec.is_faulted());
        assert!(dec.output().is_empty());
    }

    #[test]
    fn test_length_out_of_bounds_faults() {
        let mut dec = pipeline();
        dec.write_input(&[100, 0]).unwrap();
        for _ in 0..3 {
            dec.tick();
        }
        assert_eq!(dec.state(), DecompState::HasError);
    }

    #[test]
    fn test_oversized_length_faults_when_run() {
        let mut dec = pipeline();
        dec.write_input(&[100, 0]).unwrap();
        dec.run_until_idle(1000);

        assert!(dec.is_faulted());
        assert!(matches!(dec.status(), Err(MaskPackError::Faulted)));
        assert!(dec.fault_reason().unwrap().contains("outside"));
    }

    #[test]
    fn test_backdoor_leaves_state_alone() {
        let dec = pipeline();
        assert!(dec.bd_decompress_packet(&[1, 0x05], 2).is_err());
        assert_eq!(dec.state(), DecompState::Init);
        assert_eq!(dec.decode_length(1).length, 2);
    }
}
