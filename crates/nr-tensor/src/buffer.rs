use crate::error::{Result, TensorError};

/// An owned byte buffer with a fixed capacity and a movable data window.
///
/// The window (`offset`, `size`) marks the live bytes within the buffer;
/// `offset + size` must not exceed the capacity. Feature-map staging works
/// on whole-capacity windows, but a window can be narrowed to address a
/// sub-range without reallocating.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    data: Vec<u8>,
    offset: usize,
    size: usize,
}

impl HostBuffer {
    /// Create a zero-filled buffer whose window spans the full capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        HostBuffer {
            data: vec![0u8; capacity],
            offset: 0,
            size: capacity,
        }
    }

    /// Create a buffer holding a copy of `bytes`, window spanning all of it.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        HostBuffer {
            data: bytes.to_vec(),
            offset: 0,
            size: bytes.len(),
        }
    }

    /// Total capacity in bytes. Fixed for the lifetime of the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Offset of the data window.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the data window.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Move the data window.
    pub fn set_window(&mut self, offset: usize, size: usize) -> Result<()> {
        let end = offset
            .checked_add(size)
            .ok_or(TensorError::WindowOutOfRange {
                offset,
                size,
                capacity: self.capacity(),
            })?;
        if end > self.capacity() {
            return Err(TensorError::WindowOutOfRange {
                offset,
                size,
                capacity: self.capacity(),
            });
        }
        self.offset = offset;
        self.size = size;
        Ok(())
    }

    /// Collapse the window to zero bytes at offset zero.
    pub fn clear(&mut self) {
        self.offset = 0;
        self.size = 0;
    }

    /// The live bytes within the window.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.size]
    }

    /// Mutable access to the live bytes within the window.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.offset..self.offset + self.size]
    }

    /// Copy `bytes` to the start of the buffer and set the window over them.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.capacity() {
            return Err(TensorError::WindowOutOfRange {
                offset: 0,
                size: bytes.len(),
                capacity: self.capacity(),
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.offset = 0;
        self.size = bytes.len();
        Ok(())
    }
}
