//! Reads typed values out of a packed kernarg image
//!
//! The image is the byte layout a dispatch hands to the device: every
//! parameter sits at its declared offset in little-endian order. Offsets come
//! from the kernel's parameter descriptors and carry no alignment guarantee,
//! so reads never round the position up.

/// Errors raised while decoding a kernarg image
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernargError {
    #[error("kernarg read out of bounds: offset {offset} + size {size} > image size {len}")]
    OutOfBounds { offset: usize, size: usize, len: usize },
}

pub struct KernargReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> KernargReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Jump to an absolute byte offset, e.g. a parameter descriptor's offset
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Read `len` raw bytes at the current position
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], KernargError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.buffer.len());
        match end {
            Some(end) => {
                let bytes = &self.buffer[self.offset..end];
                self.offset = end;
                Ok(bytes)
            }
            None => Err(KernargError::OutOfBounds {
                offset: self.offset,
                size: len,
                len: self.buffer.len(),
            }),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], KernargError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Device pointers are 64-bit addresses
    pub fn read_device_ptr(&mut self) -> Result<u64, KernargError> {
        self.take::<8>().map(u64::from_le_bytes)
    }
}
