//! Byte-level transport abstraction under the range-sensor driver.

use crate::error::Result;

mod serial;
pub use serial::SerialLink;

/// Raw byte link to a sensor.
pub trait ByteLink: Send {
    /// Read into `buffer`, returning the number of bytes read. A timeout
    /// with nothing available returns `Ok(0)`.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Number of bytes ready to read without blocking.
    fn available(&mut self) -> Result<usize>;

    /// Drop any unread input (used to resynchronize after framing errors).
    fn clear_input(&mut self) -> Result<()>;
}

/// In-memory link for tests.
#[derive(Default)]
pub struct MemoryLink {
    read_buffer: std::collections::VecDeque<u8>,
    written: Vec<u8>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, data: &[u8]) {
        self.read_buffer.extend(data);
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl ByteLink for MemoryLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let n = self.read_buffer.len().min(buffer.len());
        for slot in buffer.iter_mut().take(n) {
            *slot = self.read_buffer.pop_front().expect("length checked");
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.read_buffer.len())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.read_buffer.clear();
        Ok(())
    }
}
