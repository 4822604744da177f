//! Chassis controller over a serial line.
//!
//! Packet format: [0xFA 0xFB] [LEN] [CMD] [PAYLOAD] [CHECKSUM]
//!
//! Checksum: 16-bit big-endian word sum over CMD + PAYLOAD; if the byte
//! count is odd, the last byte is XORed in. LEN counts payload bytes only.
//!
//! One bus serves four concerns: drive speed, steering, and a polled status
//! frame carrying measured speed, battery voltage and the rear range. The
//! actuator and sensor handles are thin clones over the shared bus so the
//! control loop can own them as separate trait objects.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::drivers::{BatterySensor, DriveActuator, RearRangeSensor, SpeedSensor, SteeringActuator};
use crate::error::{Error, Result};
use crate::transport::{ByteLink, SerialLink};

const SYNC1: u8 = 0xFA;
const SYNC2: u8 = 0xFB;

/// Command IDs understood by the chassis firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum CommandId {
    /// Stop both motors, payload empty
    Stop = 0x60,
    /// Drive speed, payload i16 big-endian mm/s (negative = reverse)
    DriveSpeed = 0x61,
    /// Steering setpoint, payload i16 big-endian deci-units
    Steering = 0x62,
    /// Status request, payload empty
    StatusQuery = 0x10,
}

/// Status response CMD byte.
const CMD_STATUS_DATA: u8 = 0x15;
/// Status payload length: speed i16, battery u16 mV, rear u16 mm, flags u16.
const STATUS_PAYLOAD_LEN: usize = 8;
/// Rear range value meaning "sensor unavailable".
const REAR_UNAVAILABLE: u16 = 0xFFFF;

/// Cached status readings stay valid this long before a fresh poll.
const STATUS_MAX_AGE: Duration = Duration::from_millis(20);

fn checksum(cmd: u8, payload: &[u8]) -> [u8; 2] {
    let mut sum: u16 = 0;
    let mut bytes = std::iter::once(cmd).chain(payload.iter().copied());
    loop {
        match (bytes.next(), bytes.next()) {
            (Some(hi), Some(lo)) => {
                sum = sum.wrapping_add(((hi as u16) << 8) | lo as u16);
            }
            (Some(odd), None) => {
                sum ^= odd as u16;
                break;
            }
            _ => break,
        }
    }
    [(sum >> 8) as u8, sum as u8]
}

fn encode(cmd: CommandId, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + payload.len());
    packet.push(SYNC1);
    packet.push(SYNC2);
    packet.push(payload.len() as u8);
    packet.push(cmd as u8);
    packet.extend_from_slice(payload);
    packet.extend_from_slice(&checksum(cmd as u8, payload));
    packet
}

/// Decoded status frame.
#[derive(Debug, Clone, Copy)]
struct ChassisStatus {
    speed_mps: f32,
    battery_v: f32,
    rear_m: Option<f32>,
}

/// Read one status frame, resyncing past garbage. `Ok(None)` when the
/// response has not fully arrived yet.
pub(crate) fn read_status_frame<L: ByteLink>(link: &mut L) -> Result<Option<(f32, f32, Option<f32>)>> {
    // Need sync + len + cmd before anything else.
    if link.available()? < 4 {
        return Ok(None);
    }

    let mut byte = [0u8; 1];
    loop {
        if link.read(&mut byte)? == 0 {
            return Ok(None);
        }
        if byte[0] != SYNC1 {
            continue;
        }
        if link.read(&mut byte)? == 0 {
            return Ok(None);
        }
        if byte[0] == SYNC2 {
            break;
        }
    }

    let mut header = [0u8; 2];
    read_exact(link, &mut header)?;
    let (len, cmd) = (header[0] as usize, header[1]);
    if cmd != CMD_STATUS_DATA || len != STATUS_PAYLOAD_LEN {
        return Err(Error::InvalidPacket(format!(
            "unexpected chassis frame cmd=0x{cmd:02X} len={len}"
        )));
    }

    let mut payload = [0u8; STATUS_PAYLOAD_LEN];
    read_exact(link, &mut payload)?;
    let mut check = [0u8; 2];
    read_exact(link, &mut check)?;
    if check != checksum(cmd, &payload) {
        return Err(Error::InvalidPacket("chassis status checksum mismatch".to_string()));
    }

    let speed_mms = i16::from_be_bytes([payload[0], payload[1]]);
    let battery_mv = u16::from_be_bytes([payload[2], payload[3]]);
    let rear_mm = u16::from_be_bytes([payload[4], payload[5]]);

    let rear_m = if rear_mm == REAR_UNAVAILABLE {
        None
    } else {
        Some(rear_mm as f32 / 1000.0)
    };
    Ok(Some((
        speed_mms as f32 / 1000.0,
        battery_mv as f32 / 1000.0,
        rear_m,
    )))
}

fn read_exact<L: ByteLink>(link: &mut L, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    let mut idle_reads = 0;
    while filled < buf.len() {
        let n = link.read(&mut buf[filled..])?;
        if n == 0 {
            idle_reads += 1;
            if idle_reads > 50 {
                return Err(Error::Timeout);
            }
            continue;
        }
        idle_reads = 0;
        filled += n;
    }
    Ok(())
}

struct BusInner<L: ByteLink> {
    link: L,
    cached: Option<(Instant, ChassisStatus)>,
}

impl<L: ByteLink> BusInner<L> {
    fn send(&mut self, cmd: CommandId, payload: &[u8]) -> Result<()> {
        self.link.write(&encode(cmd, payload))
    }

    fn status(&mut self) -> Result<ChassisStatus> {
        if let Some((at, status)) = self.cached {
            if at.elapsed() < STATUS_MAX_AGE {
                return Ok(status);
            }
        }

        self.send(CommandId::StatusQuery, &[])?;

        let deadline = Instant::now() + Duration::from_millis(100);
        loop {
            if let Some((speed_mps, battery_v, rear_m)) = read_status_frame(&mut self.link)? {
                let status = ChassisStatus {
                    speed_mps,
                    battery_v,
                    rear_m,
                };
                self.cached = Some((Instant::now(), status));
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Shared handle on the chassis serial bus.
pub struct ChassisBus<L: ByteLink> {
    inner: Arc<Mutex<BusInner<L>>>,
}

impl<L: ByteLink> Clone for ChassisBus<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ChassisBus<SerialLink> {
    /// Open the chassis controller port.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        log::info!("Chassis: opening {path} at {baud} baud");
        Ok(Self::over(SerialLink::open(path, baud)?))
    }
}

impl<L: ByteLink> ChassisBus<L> {
    pub fn over(link: L) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner { link, cached: None })),
        }
    }

    pub fn steering(&self) -> ChassisSteering<L> {
        ChassisSteering { bus: self.clone() }
    }

    pub fn drive(&self) -> ChassisDrive<L> {
        ChassisDrive { bus: self.clone() }
    }

    pub fn speed_sensor(&self) -> ChassisSpeedSensor<L> {
        ChassisSpeedSensor { bus: self.clone() }
    }

    pub fn battery(&self) -> ChassisBattery<L> {
        ChassisBattery { bus: self.clone() }
    }

    pub fn rear_range(&self) -> ChassisRearRange<L> {
        ChassisRearRange { bus: self.clone() }
    }
}

pub struct ChassisSteering<L: ByteLink> {
    bus: ChassisBus<L>,
}

impl<L: ByteLink> SteeringActuator for ChassisSteering<L> {
    fn set_steering(&mut self, value: f32) -> Result<()> {
        let deci = (value * 10.0).round() as i16;
        self.bus
            .inner
            .lock()
            .send(CommandId::Steering, &deci.to_be_bytes())
    }

    fn stop(&mut self) -> Result<()> {
        self.bus
            .inner
            .lock()
            .send(CommandId::Steering, &0i16.to_be_bytes())
    }
}

pub struct ChassisDrive<L: ByteLink> {
    bus: ChassisBus<L>,
}

impl<L: ByteLink> DriveActuator for ChassisDrive<L> {
    fn set_speed(&mut self, mps: f32) -> Result<()> {
        let mms = (mps * 1000.0).round() as i16;
        self.bus
            .inner
            .lock()
            .send(CommandId::DriveSpeed, &mms.to_be_bytes())
    }

    fn stop(&mut self) -> Result<()> {
        self.bus.inner.lock().send(CommandId::Stop, &[])
    }
}

pub struct ChassisSpeedSensor<L: ByteLink> {
    bus: ChassisBus<L>,
}

impl<L: ByteLink> SpeedSensor for ChassisSpeedSensor<L> {
    fn speed_mps(&mut self) -> Result<f32> {
        Ok(self.bus.inner.lock().status()?.speed_mps)
    }
}

pub struct ChassisBattery<L: ByteLink> {
    bus: ChassisBus<L>,
}

impl<L: ByteLink> BatterySensor for ChassisBattery<L> {
    fn voltage(&mut self) -> Result<f32> {
        Ok(self.bus.inner.lock().status()?.battery_v)
    }
}

pub struct ChassisRearRange<L: ByteLink> {
    bus: ChassisBus<L>,
}

impl<L: ByteLink> RearRangeSensor for ChassisRearRange<L> {
    fn distance_m(&mut self) -> Result<Option<f32>> {
        Ok(self.bus.inner.lock().status()?.rear_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryLink;

    fn status_frame(speed_mms: i16, battery_mv: u16, rear_mm: u16) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&speed_mms.to_be_bytes());
        payload.extend_from_slice(&battery_mv.to_be_bytes());
        payload.extend_from_slice(&rear_mm.to_be_bytes());
        payload.extend_from_slice(&[0, 0]); // flags
        let mut frame = vec![SYNC1, SYNC2, payload.len() as u8, CMD_STATUS_DATA];
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&checksum(CMD_STATUS_DATA, &payload));
        frame
    }

    #[test]
    fn test_checksum_word_sum_with_odd_xor() {
        // Even byte count: plain word sum.
        assert_eq!(checksum(0x10, &[0x01]), [0x10, 0x01]);
        // Odd byte count: last byte XORed in.
        let [hi, lo] = checksum(0x61, &[0x01, 0x02]);
        let expected = (((0x61u16) << 8) | 0x01) ^ 0x02;
        assert_eq!(((hi as u16) << 8) | lo as u16, expected);
    }

    #[test]
    fn test_drive_command_encoding() {
        let packet = encode(CommandId::DriveSpeed, &1500i16.to_be_bytes());
        assert_eq!(&packet[..4], &[SYNC1, SYNC2, 2, 0x61]);
        assert_eq!(&packet[4..6], &1500i16.to_be_bytes());
    }

    #[test]
    fn test_actuators_write_frames() {
        let bus = ChassisBus::over(MemoryLink::new());
        let mut drive = bus.drive();
        let mut steering = bus.steering();
        drive.set_speed(-0.5).unwrap();
        steering.set_steering(12.5).unwrap();

        let guard = bus.inner.lock();
        let written = guard.link.written();
        // Two frames back to back; second starts after the first's 8 bytes.
        assert_eq!(written[3], CommandId::DriveSpeed as u8);
        assert_eq!(&written[4..6], &(-500i16).to_be_bytes());
        assert_eq!(written[11], CommandId::Steering as u8);
        assert_eq!(&written[12..14], &125i16.to_be_bytes());
    }

    #[test]
    fn test_status_poll_parses_and_caches() {
        let bus = ChassisBus::over(MemoryLink::new());
        bus.inner.lock().link.inject(&status_frame(750, 7400, 350));

        let mut speed = bus.speed_sensor();
        let mut battery = bus.battery();
        let mut rear = bus.rear_range();
        assert!((speed.speed_mps().unwrap() - 0.75).abs() < 1e-6);
        // Served from the cache, no second frame was injected.
        assert!((battery.voltage().unwrap() - 7.4).abs() < 1e-6);
        assert_eq!(rear.distance_m().unwrap(), Some(0.35));
    }

    #[test]
    fn test_rear_unavailable_is_none() {
        let bus = ChassisBus::over(MemoryLink::new());
        bus.inner
            .lock()
            .link
            .inject(&status_frame(0, 7400, REAR_UNAVAILABLE));
        let mut rear = bus.rear_range();
        assert_eq!(rear.distance_m().unwrap(), None);
    }

    #[test]
    fn test_status_checksum_mismatch_rejected() {
        let mut frame = status_frame(100, 7000, 500);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let mut link = MemoryLink::new();
        link.inject(&frame);
        assert!(read_status_frame(&mut link).is_err());
    }
}
