//! System Event Log retrieval (Section 31, record formats in Section 32).

use crate::client::Client;
use crate::commands::{GetSelEntry, GetSelInfo, ReserveSel};
use crate::error::{Error, Result};
use crate::types::{EventType, SensorType, Timestamp};

/// First record id in the log.
pub const SEL_FIRST_ID: u16 = 0x0000;
/// The id the BMC reports after the last record.
pub const SEL_LAST_ID: u16 = 0xFFFF;

const SEL_RECORD_SIZE: usize = 16;

/// SEL record type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelType(pub u8);

impl SelType {
    /// Timestamped OEM record types (0xC0 through 0xDF).
    pub fn is_timestamped_oem(self) -> bool {
        (0xC0..=0xDF).contains(&self.0)
    }

    /// Non-timestamped OEM record types (0xE0 through 0xFF).
    pub fn is_non_timestamped_oem(self) -> bool {
        self.0 >= 0xE0
    }
}

/// SEL Event Record (Section 32.1).
#[derive(Debug, Clone)]
pub struct SelEventRecord {
    /// Raw record bytes.
    pub data: Vec<u8>,

    /// Record id.
    pub record_id: u16,
    /// Record type byte.
    pub record_type: SelType,
    /// Event timestamp.
    pub timestamp: Timestamp,
    /// Generator id (slave address or software id).
    pub generator_id: u16,
    /// Event message format revision.
    pub evm_rev: u8,
    /// Sensor type of the generating sensor.
    pub sensor_type: SensorType,
    /// Sensor number of the generating sensor.
    pub sensor_number: u8,
    /// Event/reading type code.
    pub event_type: EventType,
    /// Event direction: 0 assertion, 1 deassertion.
    pub event_dir: u8,
    /// Event data byte 1 (Table 29-6).
    pub event_data1: u8,
    /// Event data byte 2.
    pub event_data2: u8,
    /// Event data byte 3.
    pub event_data3: u8,
}

impl SelEventRecord {
    fn parse(buf: &[u8]) -> Result<Self> {
        require_record_len("SEL event record", buf)?;
        Ok(Self {
            data: buf[..SEL_RECORD_SIZE].to_vec(),
            record_id: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            record_type: SelType(buf[2]),
            timestamp: Timestamp(u32::from_le_bytes(buf[3..7].try_into().unwrap())),
            generator_id: u16::from_le_bytes(buf[7..9].try_into().unwrap()),
            evm_rev: buf[9],
            sensor_type: SensorType(buf[10]),
            sensor_number: buf[11],
            event_type: EventType(buf[12] & 0x7F),
            event_dir: (buf[12] & 0x80) >> 7,
            event_data1: buf[13],
            event_data2: buf[14],
            event_data3: buf[15],
        })
    }

    /// `true` when the event is an assertion.
    pub fn is_assertion_event(&self) -> bool {
        self.event_dir == 0
    }

    /// The trigger reading of a threshold event, when event data byte 2
    /// carries one.
    pub fn event_trigger_reading(&self) -> Option<u8> {
        if self.event_type.is_threshold()
            && self.event_data1 & 0xC0 == 0x40
            && self.event_data2 != 0xFF
        {
            Some(self.event_data2)
        } else {
            None
        }
    }

    /// The threshold value that triggered a threshold event, when event
    /// data byte 3 carries one.
    pub fn event_trigger_threshold(&self) -> Option<u8> {
        if self.event_type.is_threshold()
            && self.event_data1 & 0x30 == 0x10
            && self.event_data3 != 0xFF
        {
            Some(self.event_data3)
        } else {
            None
        }
    }
}

/// Timestamped OEM SEL record (Section 32.2).
#[derive(Debug, Clone)]
pub struct SelTimestampedOemRecord {
    /// Raw record bytes.
    pub data: Vec<u8>,

    /// Record id.
    pub record_id: u16,
    /// Record type byte (0xC0 through 0xDF).
    pub record_type: SelType,
    /// Record timestamp.
    pub timestamp: Timestamp,
    /// Manufacturer IANA id (24 bits).
    pub manufacturer_id: u32,
    /// OEM-defined bytes.
    pub oem_defined: [u8; 6],
}

impl SelTimestampedOemRecord {
    fn parse(buf: &[u8]) -> Result<Self> {
        require_record_len("timestamped OEM SEL record", buf)?;
        let mut oem_defined = [0u8; 6];
        oem_defined.copy_from_slice(&buf[10..16]);
        Ok(Self {
            data: buf[..SEL_RECORD_SIZE].to_vec(),
            record_id: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            record_type: SelType(buf[2]),
            timestamp: Timestamp(u32::from_le_bytes(buf[3..7].try_into().unwrap())),
            manufacturer_id: u32::from(buf[7]) | u32::from(buf[8]) << 8 | u32::from(buf[9]) << 16,
            oem_defined,
        })
    }
}

/// Non-timestamped OEM SEL record (Section 32.3).
#[derive(Debug, Clone)]
pub struct SelNonTimestampedOemRecord {
    /// Raw record bytes.
    pub data: Vec<u8>,

    /// Record id.
    pub record_id: u16,
    /// Record type byte (0xE0 through 0xFF).
    pub record_type: SelType,
    /// OEM bytes.
    pub oem: [u8; 13],
}

impl SelNonTimestampedOemRecord {
    fn parse(buf: &[u8]) -> Result<Self> {
        require_record_len("non-timestamped OEM SEL record", buf)?;
        let mut oem = [0u8; 13];
        oem.copy_from_slice(&buf[3..16]);
        Ok(Self {
            data: buf[..SEL_RECORD_SIZE].to_vec(),
            record_id: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            record_type: SelType(buf[2]),
            oem,
        })
    }
}

fn require_record_len(name: &str, buf: &[u8]) -> Result<()> {
    if buf.len() < SEL_RECORD_SIZE {
        return Err(Error::message_owned(format!(
            "short {name}: {}/{SEL_RECORD_SIZE} bytes",
            buf.len()
        )));
    }
    Ok(())
}

/// An entry from the System Event Log.
#[derive(Debug, Clone)]
pub enum SelRecord {
    /// Standard event record.
    Event(SelEventRecord),
    /// Timestamped OEM record (types 0xC0 through 0xDF).
    TimestampedOem(SelTimestampedOemRecord),
    /// Non-timestamped OEM record (types 0xE0 through 0xFF).
    NonTimestampedOem(SelNonTimestampedOemRecord),
}

impl SelRecord {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 3 {
            return Err(Error::message_owned(format!(
                "short SEL record: {} bytes",
                buf.len()
            )));
        }

        let record_type = SelType(buf[2]);
        let record = if record_type.is_timestamped_oem() {
            Self::TimestampedOem(SelTimestampedOemRecord::parse(buf)?)
        } else if record_type.is_non_timestamped_oem() {
            Self::NonTimestampedOem(SelNonTimestampedOemRecord::parse(buf)?)
        } else {
            Self::Event(SelEventRecord::parse(buf)?)
        };
        Ok(record)
    }

    /// Record id.
    pub fn id(&self) -> u16 {
        match self {
            Self::Event(r) => r.record_id,
            Self::TimestampedOem(r) => r.record_id,
            Self::NonTimestampedOem(r) => r.record_id,
        }
    }

    /// Record type byte.
    pub fn record_type(&self) -> SelType {
        match self {
            Self::Event(r) => r.record_type,
            Self::TimestampedOem(r) => r.record_type,
            Self::NonTimestampedOem(r) => r.record_type,
        }
    }

    /// Raw record bytes.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Event(r) => &r.data,
            Self::TimestampedOem(r) => &r.data,
            Self::NonTimestampedOem(r) => &r.data,
        }
    }
}

fn get_record(client: &mut Client, reservation: u16, id: u16) -> Result<(SelRecord, u16)> {
    let mut cmd = GetSelEntry {
        reservation_id: reservation,
        record_id: id,
        record_offset: 0x00,
        read_bytes: 0xFF,
        ..GetSelEntry::default()
    };
    client.execute(&mut cmd)?;

    let record = SelRecord::parse(&cmd.record_data)?;
    Ok((record, cmd.next_record_id))
}

/// Retrieve up to `num` log entries beginning near `offset`, together with
/// the total entry count.
pub fn get_entries(
    client: &mut Client,
    offset: usize,
    num: usize,
) -> Result<(Vec<SelRecord>, usize)> {
    let mut info = GetSelInfo::default();
    client.execute(&mut info)?;

    if !matches!(info.sel_version, 0x51 | 0x02) {
        return Err(Error::message_owned(format!(
            "unknown SEL version: {:#04x}",
            info.sel_version
        )));
    }
    let total = usize::from(info.entries);

    if total == 0 || num == 0 || offset >= total {
        return Ok((Vec::new(), total));
    }
    let num = num.min(total - offset);

    let mut start_id = SEL_FIRST_ID;
    if offset > 0 {
        // Probe the first record (no reservation needed for whole-record
        // reads) to learn the id stride. Ids are assumed to be linearly
        // spaced; a log that violates that shifts the window by whole
        // records.
        let (first, next) = get_record(client, 0x0000, SEL_FIRST_ID)?;
        let stride = next.wrapping_sub(first.id());
        start_id = stride.wrapping_mul(offset as u16).wrapping_add(first.id());
    }

    let mut reserve = ReserveSel::default();
    client.execute(&mut reserve)?;

    let mut records = Vec::with_capacity(num);
    let mut id = start_id;
    while records.len() < num && id != SEL_LAST_ID {
        let (record, next) = get_record(client, reserve.reservation_id, id)?;
        records.push(record);
        id = next;
    }

    Ok((records, total))
}
