//! Clocked compressor pipeline
//!
//! The head stage waits for a full block of symbols, compresses it in one edge
//! and hands the flit to the holding stages. The end-of-stream marker
//! written alongside the input travels with the flit built from the final block.

use super::encoder::{EncodedData, FlitEncoder};
use crate::common::{
    BusWidth, ClockConfig, EncoderSettings, PipelineStats, SymbolCount, DEFAULT_FIFO_DEPTH,
    PIPELINE_DEPTH,
};
use crate::fifo::ByteFifo;
use crate::stage::{FlitBuffer, HoldingStages, TickReport};
use crate::tables::{LookupTables, Lut16, SymbolTypeTable};
use crate::{MaskPackError, Result};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::Duration;

/// Head-stage state of the compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompState {
    /// Waiting for the first byte
    Init,
    /// Waiting for a full block
    WaitForAllBytes,
    /// Compressing the block into `hs0`
    Compress,
    /// Invalid configuration met; only a reset leaves this state
    HasError,
}

/// Construction-time configuration of a compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressorConfig {
    /// Input bus width (32 bytes)
    pub in_width: BusWidth,
    /// Output bus width (32 bytes)
    pub out_width: BusWidth,
    /// Symbols per block
    pub num_total_sym: SymbolCount,
    /// Clock driving the pipeline
    pub clock: ClockConfig,
    /// FIFO depth in bus entries
    pub fifo_depth: usize,
}

impl CompressorConfig {
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

    /// Check the widths and that the FIFOs hold a block and a flit
    pub fn validate(&self) -> Result<()> {
        for width in [self.in_width, self.out_width] {
            if width != BusWidth::W32 {
                return Err(MaskPackError::UnsupportedBusWidth {
                    direction: "compressor",
                    width: width.bytes() as u32,
                });
            }
        }

        let in_depth = self.fifo_depth * self.in_width.bytes();
        if in_depth < self.num_total_sym.count() {
            return Err(MaskPackError::FifoTooShallow {
                depth: in_depth,
                required: self.num_total_sym.count(),
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

impl Default for CompressorConfig {
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

/// Cycle-level compressor
#[derive(Debug)]
pub struct Compressor {
    config: CompressorConfig,
    encoder: FlitEncoder,
    input: ByteFifo,
    output: ByteFifo,
    state: CompState,
    stages: HoldingStages,
    // Input byte offsets at which a `wr_last` was signalled
    last_marks: VecDeque<u64>,
    bytes_written_in: u64,
    bytes_consumed: u64,
    end_of_stream: bool,
    cycle: u64,
    stats: PipelineStats,
    fault: Option<String>,
}

impl Compressor {
    /// Create a compressor with default tables and layer 0
    pub fn new(config: CompressorConfig) -> Result<Self> {
        Self::with_tables(config, LookupTables::default())
    }

    /// Create a compressor with explicit tables
    pub fn with_tables(config: CompressorConfig, tables: LookupTables) -> Result<Self> {
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
            encoder: FlitEncoder::with_tables(config.num_total_sym, config.out_width, tables)?,
            input,
            output,
            state: CompState::Init,
            stages: HoldingStages::new(config.out_width),
            last_marks: VecDeque::new(),
            bytes_written_in: 0,
            bytes_consumed: 0,
            end_of_stream: false,
            cycle: 0,
            stats: PipelineStats::default(),
            fault: None,
        })
    }

    /// Configuration the pipeline was built with
    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Current head-stage state
    pub fn state(&self) -> CompState {
        self.state
    }

    /// Whether the pipeline sits in its error sink
    pub fn is_faulted(&self) -> bool {
        self.state == CompState::HasError
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

    /// Whether the flit carrying the end-of-stream marker has left the pipeline
    pub fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Input FIFO (written by the upstream transport)
    pub fn input(&self) -> &ByteFifo {
        &self.input
    }

    /// Output FIFO (drained by the downstream transport)
    pub fn output(&self) -> &ByteFifo {
        &self.output
    }

    /// Encoder holding the active tables and settings
    pub fn encoder(&self) -> &FlitEncoder {
        &self.encoder
    }

    /// Push symbols into the input FIFO; `last` marks the end of the stream
    ///
    /// The stream may only end on a block boundary. A `last` write that would
    /// leave a partial block is refused and the FIFO is left untouched.
    pub fn write_input(&mut self, data: &[u8], last: bool) -> Result<()> {
        if last {
            let block_len = self.config.num_total_sym.count() as u64;
            let tail = (self.bytes_written_in + data.len() as u64) % block_len;
            if tail != 0 {
                return Err(MaskPackError::InvalidBlockSize {
                    expected: block_len as usize,
                    actual: tail as usize,
                });
            }
        }
        self.input.write(data)?;
        self.bytes_written_in += data.len() as u64;
        if last {
            self.last_marks.push_back(self.bytes_written_in);
        }
        Ok(())
    }

    /// Pop exactly `len` flit bytes from the output FIFO
    pub fn read_output(&mut self, len: usize) -> Result<Vec<u8>> {
        self.output.read_vec(len)
    }

    /// Pop every flit byte currently in the output FIFO
    pub fn drain_output(&mut self) -> Vec<u8> {
        self.output.drain_all()
    }

    /// Load the pri0 value of one LUT set
    pub fn set_pri0(&mut self, lut_num: u8, value: u8) -> Result<()> {
        self.encoder.tables_mut().set_pri0(lut_num, value)
    }

    /// Load the pri1 table of one LUT set
    pub fn set_pri1(&mut self, lut_num: u8, entries: &Lut16) -> Result<()> {
        self.encoder.tables_mut().set_pri1(lut_num, entries)
    }

    /// Load the pri2 table of one LUT set
    pub fn set_pri2(&mut self, lut_num: u8, entries: &Lut16) -> Result<()> {
        self.encoder.tables_mut().set_pri2(lut_num, entries)
    }

    /// Replace the runtime settings
    pub fn set_settings(&mut self, settings: EncoderSettings) -> Result<()> {
        self.encoder.set_settings(settings)
    }

    /// Select the LUT set used for new flits
    pub fn set_lut_num(&mut self, lut_num: u8) -> Result<()> {
        self.encoder.set_lut_num(lut_num)
    }

    /// Select a predefined classification layer
    pub fn set_layer(&mut self, layer: u8) -> Result<()> {
        self.encoder.set_layer(layer)
    }

    /// Install caller-supplied classification data
    pub fn set_symbol_types(&mut self, table: SymbolTypeTable) {
        self.encoder.set_symbol_types(table);
    }

    /// Select (or clear) the direct 4b-to-8b LUT
    pub fn set_direct_lut(&mut self, lut_num: Option<u8>) -> Result<()> {
        self.encoder.set_direct_lut(lut_num)
    }

    /// Backdoor compression of one block, bypassing the FIFOs and the state machine
    pub fn bd_compress_packet(&self, block: &[u8]) -> Result<EncodedData> {
        self.encoder.compress_packet(block)
    }

    /// Abort any in-flight block and return to `Init` with empty FIFOs
    pub fn reset(&mut self) {
        info!("compressor reset at cycle {}", self.cycle);
        self.input.reset();
        self.output.reset();
        self.stages.clear();
        self.last_marks.clear();
        self.bytes_written_in = 0;
        self.bytes_consumed = 0;
        self.end_of_stream = false;
        self.fault = None;
        self.state = CompState::Init;
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
        if let Some(done) = &report.completed {
            self.stats.frames_out += 1;
            if done.last_packet {
                debug!("end of stream delivered at cycle {}", self.cycle);
                self.end_of_stream = true;
            }
        }

        if let Err(e) = self.step() {
            self.enter_error(e);
        }
        report
    }

    /// Tick until no full block is waiting and every stage has drained, or
    /// `max_cycles` edges have passed; returns the edges used
    pub fn run_until_idle(&mut self, max_cycles: u64) -> u64 {
        let start = self.cycle;
        let block = self.config.num_total_sym.count();
        while self.cycle - start < max_cycles {
            let idle = self.stages.is_empty()
                && (self.is_faulted()
                    || (self.state != CompState::Compress
                        && self.input.available_bytes() < block));
            if idle {
                break;
            }
            self.tick();
        }
        self.cycle - start
    }

    fn step(&mut self) -> Result<()> {
        let block_len = self.config.num_total_sym.count();

        match self.state {
            CompState::Init => {
                if !self.input.is_empty() {
                    self.transition(CompState::WaitForAllBytes);
                }
            }
            CompState::WaitForAllBytes => {
                if self.input.available_bytes() >= block_len {
                    self.transition(CompState::Compress);
                }
            }
            CompState::Compress => {
                if self.stages.can_accept() {
                    let block = self.input.read_vec(block_len)?;
                    self.bytes_consumed += block_len as u64;

                    let mut last_packet = false;
                    while self
                        .last_marks
                        .front()
                        .is_some_and(|&mark| mark <= self.bytes_consumed)
                    {
                        self.last_marks.pop_front();
                        last_packet = true;
                    }

                    let encoded = self.encoder.compress_packet(&block)?;
                    debug!(
                        "block compressed to {:?}, {} bytes{}",
                        encoded.format,
                        encoded.encoded_len,
                        if last_packet { " (last)" } else { "" }
                    );

                    self.stats.frames_in += 1;
                    self.stats.bytes_in += block_len as u64;
                    self.stats.count_format(encoded.format);

                    let mut buffer = FlitBuffer::new(encoded.data, encoded.format);
                    buffer.last_packet = last_packet;
                    self.stages
                        .load(buffer)
                        .map_err(|_| MaskPackError::StageOccupied)?;
                    self.transition(CompState::WaitForAllBytes);
                }
            }
            CompState::HasError => {}
        }
        Ok(())
    }

    fn transition(&mut self, next: CompState) {
        debug!("compressor {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn enter_error(&mut self, error: MaskPackError) {
        warn!("compressor fault at cycle {}: {}", self.cycle, error);
        self.fault = Some(error.to_string());
        self.state = CompState::HasError;
    }
}
