//! Serial binding of the 360° range sensor.
//!
//! Frame format (big-endian):
//! - Sync (2 bytes): 0xA5 0x5A
//! - Sample count (1 byte)
//! - Samples (5 bytes each):
//!   - Signal quality (1 byte)
//!   - Angle (2 bytes, centi-degrees)
//!   - Distance (2 bytes, millimeters)
//! - Checksum (1 byte): wrapping sum of count and sample bytes

use super::{RangePacket, RangeTransport};
use crate::error::{Error, Result};
use crate::transport::{ByteLink, SerialLink};

const SYNC0: u8 = 0xA5;
const SYNC1: u8 = 0x5A;
const SAMPLE_LEN: usize = 5;
const MAX_SAMPLES: u8 = 120;

const CMD_START: [u8; 2] = [0xA5, 0x60];
const CMD_STOP: [u8; 2] = [0xA5, 0x65];

/// Range sensor speaking the framed serial protocol over a UART.
pub struct SerialRangeSensor {
    path: String,
    baud: u32,
    link: Option<SerialLink>,
    started: bool,
}

impl SerialRangeSensor {
    pub fn new(path: &str, baud: u32) -> Self {
        Self {
            path: path.to_string(),
            baud,
            link: None,
            started: false,
        }
    }

    fn link_mut(&mut self) -> Result<&mut SerialLink> {
        self.link.as_mut().ok_or(Error::NotConnected)
    }
}

impl RangeTransport for SerialRangeSensor {
    fn connect(&mut self) -> Result<()> {
        if self.link.is_none() {
            self.link = Some(SerialLink::open(&self.path, self.baud)?);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.link_mut()?.write(&CMD_START)?;
        self.started = true;
        log::info!("RangeSensor: measurement stream started");
        Ok(())
    }

    fn read_batch(&mut self) -> Result<Vec<RangePacket>> {
        let link = self.link_mut()?;
        Ok(read_frame(link)?.unwrap_or_default())
    }

    fn reset_input(&mut self) -> Result<()> {
        self.link_mut()?.clear_input()?;
        log::debug!("RangeSensor: input buffer reset");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Idempotent: repeated stops and stops while disconnected are no-ops.
        if self.started {
            if let Some(link) = self.link.as_mut() {
                link.write(&CMD_STOP)?;
            }
            self.started = false;
            log::info!("RangeSensor: measurement stream stopped");
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.link.take().is_some() {
            log::info!("RangeSensor: disconnected from {}", self.path);
        }
        Ok(())
    }
}

/// Read one frame if a complete one is buffered.
///
/// Returns `Ok(None)` when not enough bytes have arrived yet; framing and
/// checksum violations are `InvalidPacket` errors so the acquisition loop
/// can run its reset/reconnect ladder.
pub(crate) fn read_frame<L: ByteLink>(link: &mut L) -> Result<Option<Vec<RangePacket>>> {
    // Resynchronize on the two-byte sync marker.
    loop {
        if link.available()? < 3 {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        if link.read(&mut byte)? == 0 {
            return Ok(None);
        }
        if byte[0] != SYNC0 {
            continue;
        }
        if link.read(&mut byte)? == 0 {
            return Ok(None);
        }
        if byte[0] == SYNC1 {
            break;
        }
    }

    let mut count_buf = [0u8; 1];
    read_exact(link, &mut count_buf)?;
    let count = count_buf[0];
    if count == 0 || count > MAX_SAMPLES {
        return Err(Error::InvalidPacket(format!(
            "implausible sample count: {count}"
        )));
    }

    let mut body = vec![0u8; count as usize * SAMPLE_LEN + 1];
    read_exact(link, &mut body)?;

    let (samples, checksum) = body.split_at(body.len() - 1);
    let expected = samples
        .iter()
        .fold(count, |acc, &b| acc.wrapping_add(b));
    if expected != checksum[0] {
        return Err(Error::InvalidPacket(format!(
            "checksum mismatch: expected {expected:#04x}, got {:#04x}",
            checksum[0]
        )));
    }

    let packets = samples
        .chunks_exact(SAMPLE_LEN)
        .map(|chunk| RangePacket {
            quality: chunk[0],
            angle_deg: u16::from_be_bytes([chunk[1], chunk[2]]) as f32 * 0.01,
            distance_mm: u16::from_be_bytes([chunk[3], chunk[4]]) as f32,
        })
        .collect();

    Ok(Some(packets))
}

fn read_exact<L: ByteLink>(link: &mut L, buf: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    let mut idle_reads = 0;
    while offset < buf.len() {
        let n = link.read(&mut buf[offset..])?;
        if n == 0 {
            idle_reads += 1;
            if idle_reads > 50 {
                return Err(Error::Timeout);
            }
            continue;
        }
        idle_reads = 0;
        offset += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryLink;

    fn frame(samples: &[(u8, u16, u16)]) -> Vec<u8> {
        let mut out = vec![SYNC0, SYNC1, samples.len() as u8];
        let body_start = out.len();
        for &(quality, angle, distance) in samples {
            out.push(quality);
            out.extend_from_slice(&angle.to_be_bytes());
            out.extend_from_slice(&distance.to_be_bytes());
        }
        let checksum = out[body_start..]
            .iter()
            .fold(samples.len() as u8, |acc, &b| acc.wrapping_add(b));
        out.push(checksum);
        out
    }

    #[test]
    fn test_parse_single_sample() {
        let mut link = MemoryLink::new();
        link.inject(&frame(&[(200, 4500, 1500)]));

        let packets = read_frame(&mut link).unwrap().expect("complete frame");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].quality, 200);
        assert!((packets[0].angle_deg - 45.0).abs() < 1e-3);
        assert!((packets[0].distance_mm - 1500.0).abs() < 1e-3);
    }

    #[test]
    fn test_resync_skips_garbage() {
        let mut link = MemoryLink::new();
        link.inject(&[0x00, 0xFF, SYNC0, 0x11]);
        link.inject(&frame(&[(10, 0, 500)]));

        let packets = read_frame(&mut link).unwrap().expect("complete frame");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].distance_mm, 500.0);
    }

    #[test]
    fn test_checksum_mismatch_is_invalid_packet() {
        let mut link = MemoryLink::new();
        let mut bad = frame(&[(10, 100, 800)]);
        let last = bad.len() - 1;
        bad[last] = bad[last].wrapping_add(1);
        link.inject(&bad);

        match read_frame(&mut link) {
            Err(Error::InvalidPacket(_)) => {}
            other => panic!("expected InvalidPacket, got {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_frame_yields_none() {
        let mut link = MemoryLink::new();
        link.inject(&[SYNC0]);
        assert!(read_frame(&mut link).unwrap().is_none());
    }
}
