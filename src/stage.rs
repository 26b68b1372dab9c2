//! Five-stage holding registers shared by both pipelines
//!
//! A finished flit (or decoded block) enters `hs0` and moves one stage per
//! clock edge. `hs4` meters the buffer out to the output FIFO one bus beat per
//! edge. When the output FIFO cannot take the next beat, the whole pipeline
//! stalls and no register changes.

use crate::common::{BusWidth, FrameFormat, PIPELINE_DEPTH};
use crate::fifo::ByteFifo;
use crate::Result;
use log::trace;

/// Buffer held by one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlitBuffer {
    /// Bytes to deliver to the output FIFO
    pub data: Vec<u8>,
    /// Bytes already delivered
    pub bytes_written: usize,
    /// Framing of the flit this buffer came from
    pub format: FrameFormat,
    /// Set on the buffer that ends the stream
    pub last_packet: bool,
}

impl FlitBuffer {
    /// Wrap a finished buffer
    pub fn new(data: Vec<u8>, format: FrameFormat) -> Self {
        Self {
            data,
            bytes_written: 0,
            format,
            last_packet: false,
        }
    }

    /// Total bytes to write
    pub fn bytes_to_write(&self) -> usize {
        self.data.len()
    }

    /// Length rounded up to whole bus beats
    pub fn rounded_len(&self, width: BusWidth) -> usize {
        width.round_up(self.data.len())
    }

    fn next_beat(&self, width: BusWidth) -> usize {
        (self.bytes_to_write() - self.bytes_written).min(width.bytes())
    }

    fn is_done(&self) -> bool {
        self.bytes_written >= self.bytes_to_write()
    }
}

/// Result of one clock edge of the holding stages
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The output FIFO blocked the pipeline this edge
    pub stalled: bool,
    /// Bytes written to the output FIFO this edge
    pub bytes_written: usize,
    /// Buffer that left `hs4` this edge
    pub completed: Option<FlitBuffer>,
}

/// The `hs0`..`hs4` registers
#[derive(Debug, Clone)]
pub struct HoldingStages {
    stages: [Option<FlitBuffer>; PIPELINE_DEPTH],
    width: BusWidth,
}

impl HoldingStages {
    /// Empty registers metering `width`-byte beats
    pub fn new(width: BusWidth) -> Self {
        Self {
            stages: Default::default(),
            width,
        }
    }

    /// Valid flag of every stage, `hs0` first
    pub fn valid_flags(&self) -> [bool; PIPELINE_DEPTH] {
        std::array::from_fn(|i| self.stages[i].is_some())
    }

    /// Contents of stage `index`
    pub fn stage(&self, index: usize) -> Option<&FlitBuffer> {
        self.stages.get(index).and_then(Option::as_ref)
    }

    /// Check whether `hs0` can take a new buffer
    pub fn can_accept(&self) -> bool {
        self.stages[0].is_none()
    }

    /// Check whether every stage is empty
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Option::is_none)
    }

    /// Place a buffer in `hs0`; returns it back if `hs0` is occupied
    pub fn load(&mut self, buffer: FlitBuffer) -> std::result::Result<(), FlitBuffer> {
        if self.stages[0].is_some() {
            return Err(buffer);
        }
        self.stages[0] = Some(buffer);
        Ok(())
    }

    /// Drop every buffer
    pub fn clear(&mut self) {
        self.stages = Default::default();
    }

    /// Check whether `hs4` holds a beat the output FIFO cannot accept
    pub fn is_stalled(&self, output: &ByteFifo) -> bool {
        match &self.stages[PIPELINE_DEPTH - 1] {
            Some(buffer) => output.free_bytes() < buffer.next_beat(self.width),
            None => false,
        }
    }

    /// One clock edge: write a beat from `hs4`, then shift the stages
    /// from the tail forward so no stage overwrites an unconsumed buffer
    pub fn advance(&mut self, output: &mut ByteFifo) -> Result<TickReport> {
        if self.is_stalled(output) {
            return Ok(TickReport {
                stalled: true,
                ..Default::default()
            });
        }

        let mut report = TickReport::default();
        let tail = PIPELINE_DEPTH - 1;

        if let Some(buffer) = self.stages[tail].as_mut() {
            let beat = buffer.next_beat(self.width);
            let start = buffer.bytes_written;
            output.write(&buffer.data[start..start + beat])?;
            buffer.bytes_written += beat;
            report.bytes_written = beat;
            trace!(
                "hs4 wrote {} bytes ({}/{})",
                beat,
                buffer.bytes_written,
                buffer.bytes_to_write()
            );

            if buffer.is_done() {
                report.completed = self.stages[tail].take();
            }
        }

        for i in (0..tail).rev() {
            if self.stages[i].is_some() && self.stages[i + 1].is_none() {
                self.stages[i + 1] = self.stages[i].take();
            }
        }

        Ok(report)
    }
}
