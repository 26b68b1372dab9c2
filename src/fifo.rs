//! Fixed-size byte FIFO
//!
//! A circular byte buffer that models the bus-side FIFOs of the codec. Every
//! operation either succeeds completely or fails leaving the FIFO untouched.

use crate::{MaskPackError, Result};

/// Circular byte buffer with a fixed capacity and entry size
#[derive(Debug, Clone)]
pub struct ByteFifo {
    buffer: Box<[u8]>,
    entry_size: usize,
    read_pos: usize,
    write_pos: usize,
    available: usize,
}

impl ByteFifo {
    /// Create a FIFO holding `capacity` bytes made of `entry_size`-byte entries
    pub fn new(capacity: usize, entry_size: usize) -> Result<Self> {
        if capacity == 0 || entry_size == 0 || capacity % entry_size != 0 {
            return Err(MaskPackError::InvalidFifoGeometry {
                capacity,
                entry_size,
            });
        }

        Ok(Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            entry_size,
            read_pos: 0,
            write_pos: 0,
            available: 0,
        })
    }

    /// Empty the FIFO and rewind both pointers
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.available = 0;
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Entry (bus beat) size in bytes
    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Bytes ready to be read
    pub fn available_bytes(&self) -> usize {
        self.available
    }

    /// Bytes that can still be written
    pub fn free_bytes(&self) -> usize {
        self.capacity() - self.available
    }

    /// Whole entries ready to be read
    pub fn available_entries(&self) -> usize {
        self.available / self.entry_size
    }

    /// Whole entries that can still be written
    pub fn free_entries(&self) -> usize {
        self.free_bytes() / self.entry_size
    }

    /// Check whether the FIFO holds no data
    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Append all of `data`, or nothing if it does not fit
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.free_bytes() {
            return Err(MaskPackError::FifoOverflow {
                requested: data.len(),
                free: self.free_bytes(),
            });
        }

        let capacity = self.capacity();
        let first = data.len().min(capacity - self.write_pos);
        self.buffer[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        self.buffer[..data.len() - first].copy_from_slice(&data[first..]);

        self.write_pos = (self.write_pos + data.len()) % capacity;
        self.available += data.len();
        Ok(())
    }

    /// Copy the oldest `out.len()` bytes without consuming them
    pub fn peek(&self, out: &mut [u8]) -> Result<()> {
        if out.len() > self.available {
            return Err(MaskPackError::FifoUnderflow {
                requested: out.len(),
                available: self.available,
            });
        }

        let capacity = self.capacity();
        let first = out.len().min(capacity - self.read_pos);
        out[..first].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&self.buffer[..rest]);
        Ok(())
    }

    /// Remove the oldest `out.len()` bytes into `out`
    pub fn read(&mut self, out: &mut [u8]) -> Result<()> {
        self.peek(out)?;
        self.read_pos = (self.read_pos + out.len()) % self.capacity();
        self.available -= out.len();
        Ok(())
    }

    /// Remove and return the oldest `len` bytes
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0; len];
        self.read(&mut out)?;
        Ok(out)
    }

    /// Drain everything currently stored
    pub fn drain_all(&mut self) -> Vec<u8> {
        let mut out = vec![0; self.available];
        // Cannot underflow: the request equals the available byte count
        let _ = self.read(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        assert!(ByteFifo::new(0, 4).is_err());
        assert!(ByteFifo::new(10, 4).is_err());
        assert!(ByteFifo::new(16, 0).is_err());

        let fifo = ByteFifo::new(64, 16).unwrap();
        assert_eq!(fifo.capacity(), 64);
        assert_eq!(fifo.entry_size(), 16);
        assert_eq!(fifo.free_entries(), 4);
        assert_eq!(fifo.available_entries(), 0);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_write_read_wraps() {
        let mut fifo = ByteFifo::new(8, 4).unwrap();
        fifo.write(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(fifo.read_vec(4).unwrap(), vec![1, 2, 3, 4]);

        // Write across the end of the ring
        fifo.write(&[7, 8, 9, 10, 11, 12]).unwrap();
        assert_eq!(fifo.available_bytes(), 8);
        assert_eq!(fifo.free_bytes(), 0);
        assert_eq!(fifo.drain_all(), vec![5, 6, 7, 8, 9, 10, 11, 12]);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_all_or_nothing() {
        let mut fifo = ByteFifo::new(8, 4).unwrap();
        fifo.write(&[1, 2, 3, 4, 5]).unwrap();

        let err = fifo.write(&[0; 4]).unwrap_err();
        assert!(matches!(
            err,
            MaskPackError::FifoOverflow {
                requested: 4,
                free: 3
            }
        ));
        assert_eq!(fifo.available_bytes(), 5);

        let mut out = [0u8; 6];
        assert!(matches!(
            fifo.read(&mut out),
            Err(MaskPackError::FifoUnderflow {
                requested: 6,
                available: 5
            })
        ));
        assert_eq!(fifo.available_bytes(), 5);
        assert_eq!(fifo.available_bytes() + fifo.free_bytes(), fifo.capacity());
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let mut fifo = ByteFifo::new(16, 16).unwrap();
        fifo.write(&[9, 8, 7]).unwrap();

        let mut head = [0u8; 2];
        fifo.peek(&mut head).unwrap();
        assert_eq!(head, [9, 8]);
        fifo.peek(&mut head).unwrap();
        assert_eq!(head, [9, 8]);
        assert_eq!(fifo.available_bytes(), 3);
    }

    #[test]
    fn test_reset() {
        let mut fifo = ByteFifo::new(16, 4).unwrap();
        fifo.write(&[1; 10]).unwrap();
        fifo.reset();
        assert!(fifo.is_empty());
        assert_eq!(fifo.free_bytes(), 16);
    }
}
