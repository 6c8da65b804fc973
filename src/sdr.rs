//! Sensor Data Record repository retrieval (Section 33, record formats in
//! Section 43).
//!
//! Records are fetched with reservation-scoped partial reads: a 5-byte
//! header first, then the body in chunks sized to what the BMC tolerates.
//! Two record types are fully decoded; everything else is kept raw.

use crate::client::Client;
use crate::commands::{GetSdr, GetSdrRepositoryInfo, ReserveSdrRepository};
use crate::error::{Error, Result};
use crate::types::{CompletionCode, EventType, SensorType, UnitType};

/// First record id in a repository walk.
pub const SDR_FIRST_ID: u16 = 0x0000;
/// The id the BMC reports after the last record.
pub const SDR_LAST_ID: u16 = 0xFFFF;

const SDR_HEADER_SIZE: u8 = 5;
const SDR_COMMON_SENSOR_SIZE: usize = 18;
const SDR_FULL_SENSOR_SIZE: usize = 25 + SDR_COMMON_SENSOR_SIZE;
const SDR_FRU_DEVICE_LOCATOR_SIZE: usize = 11;

/// Sensor Data Record type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdrType(pub u8);

impl SdrType {
    /// Full Sensor Record.
    pub const FULL_SENSOR: Self = Self(0x01);
    /// Compact Sensor Record.
    pub const COMPACT_SENSOR: Self = Self(0x02);
    /// Event-Only Record.
    pub const EVENT_ONLY: Self = Self(0x03);
    /// Entity Association Record.
    pub const ENTITY_ASSOCIATION: Self = Self(0x08);
    /// Device-relative Entity Association Record.
    pub const DEVICE_ENTITY_ASSOCIATION: Self = Self(0x09);
    /// Generic Device Locator Record.
    pub const GENERIC_DEVICE_LOCATOR: Self = Self(0x10);
    /// FRU Device Locator Record.
    pub const FRU_DEVICE_LOCATOR: Self = Self(0x11);
    /// Management Controller Device Locator Record.
    pub const MC_DEVICE_LOCATOR: Self = Self(0x12);
    /// Management Controller Confirmation Record.
    pub const MC_CONFIRMATION: Self = Self(0x13);
    /// BMC Message Channel Info Record.
    pub const BMC_MESSAGE_CHANNEL_INFO: Self = Self(0x14);
    /// OEM Record.
    pub const OEM: Self = Self(0xC0);
}

/// Common record header (Section 43).
#[derive(Debug, Clone, Copy)]
pub struct SdrHeader {
    /// Record id.
    pub record_id: u16,
    /// SDR version of the record.
    pub sdr_version: u8,
    /// Record type byte.
    pub record_type: SdrType,
    /// Record key and body length following the header.
    pub remaining_bytes: u8,
}

impl SdrHeader {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < SDR_HEADER_SIZE as usize {
            return Err(Error::message_owned(format!(
                "short SDR header: {} bytes",
                buf.len()
            )));
        }
        Ok(Self {
            record_id: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            sdr_version: buf[2],
            record_type: SdrType(buf[3]),
            remaining_bytes: buf[4],
        })
    }
}

/// Entity the sensor or device is associated with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorEntity {
    /// Entity id (Table 43-13).
    pub id: u8,
    /// Entity instance.
    pub instance: u8,
    /// Instance is logical rather than physical.
    pub logical: bool,
}

/// Sensor initialization byte. The raw byte is kept alongside booleans for
/// the documented single-bit fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorInitialization {
    /// The byte as received.
    pub raw: u8,
    /// Sensor scanning enabled at init.
    pub scanning: bool,
    /// Event generation enabled at init.
    pub event_generation: bool,
    /// Init sensor type and event/reading type.
    pub init_sensor_type: bool,
    /// Init hysteresis.
    pub init_hysteresis: bool,
    /// Init thresholds.
    pub init_thresholds: bool,
    /// Init events.
    pub init_events: bool,
    /// Init scanning.
    pub init_scanning: bool,
}

impl SensorInitialization {
    fn from_raw(raw: u8) -> Self {
        Self {
            raw,
            scanning: raw & 0x01 != 0,
            event_generation: raw & 0x02 != 0,
            init_sensor_type: raw & 0x04 != 0,
            init_hysteresis: raw & 0x08 != 0,
            init_thresholds: raw & 0x10 != 0,
            init_events: raw & 0x20 != 0,
            init_scanning: raw & 0x40 != 0,
        }
    }
}

/// Sensor capability flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorCapabilities {
    /// Event message control support (2 bits).
    pub event_message: u8,
    /// Threshold access support (2 bits).
    pub threshold: u8,
    /// Hysteresis support (2 bits).
    pub hysteresis: u8,
    /// Sensor auto re-arms after an event.
    pub auto_rearm: bool,
    /// Ignore the sensor when its entity is absent.
    pub ignore: bool,
}

/// Assertion/deassertion/discrete masks (bytes 15 through 20 of the common
/// sensor format).
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorMask {
    /// Assertion event mask or lower threshold reading mask.
    pub assertion_or_lower_threshold: u16,
    /// Deassertion event mask or upper threshold reading mask.
    pub deassertion_or_upper_threshold: u16,
    /// Discrete reading mask or settable/readable threshold mask.
    pub discrete_or_readable_threshold: u16,
}

/// Sensor unit description.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorUnits {
    /// Reading is a percentage.
    pub percentage: bool,
    /// Modifier unit combination (0 none, 1 divide, 2 multiply).
    pub modifier: u8,
    /// Rate unit (3 bits).
    pub rate_unit: u8,
    /// Analog data format: 0 unsigned, 1 1's complement, 2 2's complement,
    /// 3 not analog.
    pub analog: u8,
    /// Base unit.
    pub base_type: UnitType,
    /// Modifier unit.
    pub modifier_type: UnitType,
}

/// Fields shared by Full and Compact sensor records (the first 18 body
/// bytes).
#[derive(Debug, Clone)]
pub struct SdrCommonSensor {
    /// Record header.
    pub header: SdrHeader,
    /// Raw record key and body bytes.
    pub data: Vec<u8>,

    /// Sensor owner id.
    pub owner_id: u8,
    /// Sensor owner LUN.
    pub owner_lun: u8,
    /// Channel number.
    pub channel_number: u8,
    /// Sensor number.
    pub sensor_number: u8,
    /// Associated entity.
    pub entity: SensorEntity,
    /// Initialization byte.
    pub initialization: SensorInitialization,
    /// Capability flags.
    pub capabilities: SensorCapabilities,
    /// Sensor type.
    pub sensor_type: SensorType,
    /// Event/reading type code.
    pub event_reading_type: EventType,
    /// Event and threshold masks.
    pub mask: SensorMask,
    /// Unit description.
    pub units: SensorUnits,
}

impl SdrCommonSensor {
    fn parse(header: SdrHeader, buf: &[u8]) -> Result<Self> {
        if buf.len() < SDR_COMMON_SENSOR_SIZE {
            return Err(Error::message_owned(format!(
                "short common sensor record: {}/{} bytes",
                buf.len(),
                SDR_COMMON_SENSOR_SIZE
            )));
        }

        Ok(Self {
            header,
            data: buf.to_vec(),
            owner_id: buf[0],
            owner_lun: buf[1] & 0x03,
            channel_number: (buf[1] & 0xF0) >> 4,
            sensor_number: buf[2],
            entity: SensorEntity {
                id: buf[3],
                instance: buf[4] & 0x7F,
                logical: buf[4] & 0x80 != 0,
            },
            initialization: SensorInitialization::from_raw(buf[5]),
            capabilities: SensorCapabilities {
                event_message: buf[6] & 0x03,
                threshold: (buf[6] & 0x0C) >> 2,
                hysteresis: (buf[6] & 0x30) >> 4,
                auto_rearm: buf[6] & 0x40 != 0,
                ignore: buf[6] & 0x80 != 0,
            },
            sensor_type: SensorType(buf[7]),
            event_reading_type: EventType(buf[8]),
            mask: SensorMask {
                assertion_or_lower_threshold: u16::from(buf[9]) | u16::from(buf[10]) << 8,
                deassertion_or_upper_threshold: u16::from(buf[11]) | u16::from(buf[12]) << 8,
                discrete_or_readable_threshold: u16::from(buf[13]) | u16::from(buf[14]) << 8,
            },
            units: SensorUnits {
                percentage: buf[15] & 0x01 != 0,
                modifier: (buf[15] & 0x06) >> 1,
                rate_unit: (buf[15] & 0x38) >> 3,
                analog: (buf[15] & 0xC0) >> 6,
                base_type: UnitType(buf[16]),
                modifier_type: UnitType(buf[17]),
            },
        })
    }
}

/// Analog reading availability flags of a Full Sensor record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalogFlags {
    /// Nominal reading is specified.
    pub nominal_read: bool,
    /// Normal maximum is specified.
    pub normal_max: bool,
    /// Normal minimum is specified.
    pub normal_min: bool,
}

/// Threshold bytes of a Full Sensor record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorThresholds {
    /// Upper non-recoverable threshold.
    pub upper_non_recoverable: u8,
    /// Upper critical threshold.
    pub upper_critical: u8,
    /// Upper non-critical threshold.
    pub upper_non_critical: u8,
    /// Lower non-recoverable threshold.
    pub lower_non_recoverable: u8,
    /// Lower critical threshold.
    pub lower_critical: u8,
    /// Lower non-critical threshold.
    pub lower_non_critical: u8,
    /// Positive-going hysteresis.
    pub positive_hysteresis: u8,
    /// Negative-going hysteresis.
    pub negative_hysteresis: u8,
}

/// Full Sensor Record (Section 43.1).
#[derive(Debug, Clone)]
pub struct SdrFullSensor {
    /// Fields shared with the compact format.
    pub common: SdrCommonSensor,

    /// Linearization formula (low 7 bits).
    pub linearization: u8,
    /// Conversion coefficient M (10-bit 2's complement).
    pub m: i16,
    /// Tolerance (6 bits).
    pub tolerance: u8,
    /// Conversion offset B (10-bit 2's complement).
    pub b: i16,
    /// Accuracy (10 bits).
    pub accuracy: u16,
    /// Accuracy exponent bits.
    pub accuracy_exp: u8,
    /// Result exponent (4-bit 2's complement).
    pub r_exp: i8,
    /// Offset exponent (4-bit 2's complement).
    pub b_exp: i8,
    /// Analog reading availability.
    pub analog_flags: AnalogFlags,
    /// Nominal reading.
    pub nominal_read: u8,
    /// Normal maximum reading.
    pub normal_max: u8,
    /// Normal minimum reading.
    pub normal_min: u8,
    /// Sensor maximum reading.
    pub sensor_max: u8,
    /// Sensor minimum reading.
    pub sensor_min: u8,
    /// Factory threshold values.
    pub thresholds: SensorThresholds,
    /// OEM byte.
    pub oem: u8,
    /// Id string type/length code (2 bits).
    pub id_type: u8,
    /// Id string length in bytes.
    pub id_length: u8,
    /// Raw id string bytes.
    pub id_string: Vec<u8>,
}

impl SdrFullSensor {
    fn parse(header: SdrHeader, buf: &[u8]) -> Result<Self> {
        if buf.len() < SDR_FULL_SENSOR_SIZE {
            return Err(Error::message_owned(format!(
                "short full sensor record: {}/{} bytes",
                buf.len(),
                SDR_FULL_SENSOR_SIZE
            )));
        }

        let common = SdrCommonSensor::parse(header, buf)?;
        let buf = &buf[SDR_COMMON_SENSOR_SIZE..];

        let id_type = (buf[24] & 0xC0) >> 6;
        let id_length = buf[24] & 0x1F;
        let mut id_string = Vec::new();
        if id_length > 0 {
            let start = 25;
            let end = (start + id_length as usize).min(buf.len());
            id_string = buf[start..end].to_vec();
        }

        Ok(Self {
            common,
            linearization: buf[0] & 0x7F,
            m: to_i16(u16::from(buf[1]) | u16::from(buf[2] & 0xC0) << 2, 10),
            tolerance: buf[2] & 0x3F,
            b: to_i16(u16::from(buf[3]) | u16::from(buf[4] & 0xC0) << 2, 10),
            accuracy: u16::from(buf[4] & 0x3F) | u16::from(buf[5] & 0xF0) << 2,
            accuracy_exp: buf[5] & 0x0C,
            r_exp: to_i16(u16::from(buf[6] & 0xF0) >> 4, 4) as i8,
            b_exp: to_i16(u16::from(buf[6] & 0x0F), 4) as i8,
            analog_flags: AnalogFlags {
                nominal_read: buf[7] & 0x01 != 0,
                normal_max: buf[7] & 0x02 != 0,
                normal_min: buf[7] & 0x04 != 0,
            },
            nominal_read: buf[8],
            normal_max: buf[9],
            normal_min: buf[10],
            sensor_max: buf[11],
            sensor_min: buf[12],
            thresholds: SensorThresholds {
                upper_non_recoverable: buf[13],
                upper_critical: buf[14],
                upper_non_critical: buf[15],
                lower_non_recoverable: buf[16],
                lower_critical: buf[17],
                lower_non_critical: buf[18],
                positive_hysteresis: buf[19],
                negative_hysteresis: buf[20],
            },
            oem: buf[23],
            id_type,
            id_length,
            id_string,
        })
    }

    /// Decoded sensor id string.
    pub fn sensor_id(&self) -> String {
        decode_id_string(self.id_type, &self.id_string)
    }

    /// `true` when the sensor is threshold-based.
    pub fn is_threshold_base(&self) -> bool {
        self.common.event_reading_type.is_threshold()
    }

    /// `true` when the sensor produces an analog reading.
    pub fn is_analog_reading(&self) -> bool {
        self.common.units.analog < 0x03 && self.is_threshold_base()
    }

    /// Convert a raw reading byte with the record's linearization formula
    /// (Section 36.3).
    pub fn convert_sensor_reading(&self, value: u8) -> f64 {
        let m = f64::from(self.m);
        let b = f64::from(self.b) * 10f64.powi(i32::from(self.b_exp));
        let r = 10f64.powi(i32::from(self.r_exp));

        let result = match self.common.units.analog {
            // unsigned
            0 => (m * f64::from(value) + b) * r,
            // 1's complement reads as 2's complement after the carry
            1 => {
                let mut value = value;
                if value & 0x80 != 0 {
                    value = value.wrapping_add(1);
                }
                (m * f64::from(value as i8) + b) * r
            }
            // 2's complement
            2 => (m * f64::from(value as i8) + b) * r,
            // not an analog sensor
            _ => return 0.0,
        };

        match self.linearization {
            0x01 => result.ln(),
            0x02 => result.log10(),
            0x03 => result.log2(),
            0x04 => result.exp(),
            0x05 => 10f64.powi(result as i32),
            0x06 => result.exp2(),
            0x07 => result.recip(),
            0x08 => result * result,
            0x09 => result * result * result,
            0x0A => result.sqrt(),
            0x0B => result.cbrt(),
            _ => result,
        }
    }

    /// Human-readable unit string, composing base and modifier units.
    pub fn unit_string(&self) -> String {
        let u = &self.common.units;
        let s = match u.modifier {
            0x01 => format!("{}/{}", u.base_type, u.modifier_type),
            0x02 => format!("{} * {}", u.base_type, u.modifier_type),
            _ => {
                if u.base_type.is_unspecified() && u.percentage {
                    return "percent".to_string();
                }
                u.base_type.to_string()
            }
        };

        if u.percentage {
            format!("% {s}")
        } else {
            s
        }
    }
}

/// FRU Device Locator Record (Section 43.8).
#[derive(Debug, Clone)]
pub struct SdrFruDeviceLocator {
    /// Record header.
    pub header: SdrHeader,
    /// Raw record key and body bytes.
    pub data: Vec<u8>,

    /// Device slave address.
    pub slave_address: u8,
    /// FRU device id or slave address of the device.
    pub device_id: u8,
    /// Private bus id.
    pub bus_id: u8,
    /// LUN for FRU access commands.
    pub access_lun: u8,
    /// Logical FRU device.
    pub logical: bool,
    /// Channel number.
    pub channel_number: u8,
    /// Device type (Table 43-12).
    pub device_type: u8,
    /// Device type modifier.
    pub device_type_modifier: u8,
    /// Associated entity.
    pub entity: SensorEntity,
    /// OEM byte.
    pub oem: u8,
    /// Id string type/length code (2 bits).
    pub id_type: u8,
    /// Id string length in bytes.
    pub id_length: u8,
    /// Raw id string bytes.
    pub id_string: Vec<u8>,
}

impl SdrFruDeviceLocator {
    fn parse(header: SdrHeader, buf: &[u8]) -> Result<Self> {
        if buf.len() < SDR_FRU_DEVICE_LOCATOR_SIZE {
            return Err(Error::message_owned(format!(
                "short FRU device locator record: {}/{} bytes",
                buf.len(),
                SDR_FRU_DEVICE_LOCATOR_SIZE
            )));
        }

        let id_type = (buf[10] & 0xC0) >> 6;
        let id_length = buf[10] & 0x1F;
        let mut id_string = Vec::new();
        if id_length > 0 {
            let end = (11 + id_length as usize).min(buf.len());
            id_string = buf[11..end].to_vec();
        }

        Ok(Self {
            header,
            data: buf.to_vec(),
            slave_address: (buf[0] & 0xFE) >> 1,
            device_id: buf[1],
            bus_id: buf[2] & 0x07,
            // access LUN lives in bits 4:3 (mask 0x18)
            access_lun: (buf[2] & 0x18) >> 3,
            logical: buf[2] & 0x80 != 0,
            channel_number: (buf[3] & 0xF0) >> 4,
            device_type: buf[5],
            device_type_modifier: buf[6],
            entity: SensorEntity {
                id: buf[7],
                instance: buf[8],
                logical: false,
            },
            oem: buf[9],
            id_type,
            id_length,
            id_string,
        })
    }

    /// Decoded device id string.
    pub fn sensor_id(&self) -> String {
        decode_id_string(self.id_type, &self.id_string)
    }
}

/// A record whose type has no dedicated decoder.
#[derive(Debug, Clone)]
pub struct SdrRaw {
    /// Record header.
    pub header: SdrHeader,
    /// Raw record key and body bytes.
    pub data: Vec<u8>,
}

/// A record from the SDR repository.
#[derive(Debug, Clone)]
pub enum Sdr {
    /// Full Sensor Record (type 0x01).
    FullSensor(SdrFullSensor),
    /// FRU Device Locator Record (type 0x11).
    FruDeviceLocator(SdrFruDeviceLocator),
    /// Any other record type, body kept as raw bytes.
    Raw(SdrRaw),
}

impl Sdr {
    /// Record id.
    pub fn id(&self) -> u16 {
        self.header().record_id
    }

    /// Record type byte.
    pub fn record_type(&self) -> SdrType {
        self.header().record_type
    }

    /// The record header.
    pub fn header(&self) -> &SdrHeader {
        match self {
            Self::FullSensor(r) => &r.common.header,
            Self::FruDeviceLocator(r) => &r.header,
            Self::Raw(r) => &r.header,
        }
    }

    /// Raw record key and body bytes.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::FullSensor(r) => &r.common.data,
            Self::FruDeviceLocator(r) => &r.data,
            Self::Raw(r) => &r.data,
        }
    }
}

/// 2's complement of the low `bits` of `n`.
fn to_i16(n: u16, bits: u32) -> i16 {
    let shift = 16 - bits;
    ((n << shift) as i16) >> shift
}

/// Decode an id string. Only the 8-bit ASCII encoding (type 0x03) is
/// decoded; other encodings render as hex.
fn decode_id_string(id_type: u8, bytes: &[u8]) -> String {
    if id_type == 0x03 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn is_completion(err: &Error, code: CompletionCode) -> bool {
    matches!(err, Error::Command { completion, .. } if *completion == code)
}

/// Fetch a record header and the id of the record after it. The BMC's idea
/// of the record id is trusted only for the first record; elsewhere the
/// requested id wins.
fn get_record_header(
    client: &mut Client,
    reservation: u16,
    record_id: u16,
) -> Result<(SdrHeader, u16)> {
    let mut cmd = GetSdr {
        reservation_id: reservation,
        record_id,
        record_offset: 0,
        read_bytes: SDR_HEADER_SIZE,
        ..GetSdr::default()
    };
    client.execute(&mut cmd)?;

    let mut header = SdrHeader::parse(&cmd.record_data)?;
    if record_id != SDR_FIRST_ID && header.record_id != record_id {
        header.record_id = record_id;
    }
    Ok((header, cmd.next_record_id))
}

/// Fetch a record body in chunks and decode it. A "cannot return requested
/// bytes" completion shrinks the chunk size for this client and retries the
/// same chunk.
fn get_record(client: &mut Client, reservation: u16, header: &SdrHeader) -> Result<Sdr> {
    let total = header.remaining_bytes;
    let mut buf = vec![0u8; total as usize];
    let mut n: u8 = 0;

    while n < total {
        let read = (total - n).min(client.sdr_reading_bytes);
        let mut cmd = GetSdr {
            reservation_id: reservation,
            record_id: header.record_id,
            record_offset: n + SDR_HEADER_SIZE,
            read_bytes: read,
            ..GetSdr::default()
        };
        if let Err(err) = client.execute(&mut cmd) {
            if is_completion(&err, CompletionCode::CANNOT_RETURN_REQUESTED_BYTES)
                && client.sdr_reading_bytes > SDR_HEADER_SIZE
            {
                // Adapt to the read limit this BMC enforces and retry the
                // same chunk.
                client.sdr_reading_bytes =
                    client.sdr_reading_bytes.saturating_sub(8).max(SDR_HEADER_SIZE);
                continue;
            }
            return Err(err);
        }

        if cmd.record_data.is_empty() {
            return Err(Error::Message("empty SDR chunk"));
        }
        let got = cmd.record_data.len().min((total - n) as usize);
        buf[n as usize..n as usize + got].copy_from_slice(&cmd.record_data[..got]);
        n += got as u8;
    }

    let record = match header.record_type {
        SdrType::FULL_SENSOR => Sdr::FullSensor(SdrFullSensor::parse(*header, &buf)?),
        SdrType::FRU_DEVICE_LOCATOR => {
            Sdr::FruDeviceLocator(SdrFruDeviceLocator::parse(*header, &buf)?)
        }
        _ => Sdr::Raw(SdrRaw {
            header: *header,
            data: buf,
        }),
    };
    Ok(record)
}

/// Return every record in the SDR repository.
pub fn get_all_records(client: &mut Client) -> Result<Vec<Sdr>> {
    get_records(client, |_, _| true)
}

/// Return the repository records accepted by `filter`, in repository order.
/// Rejected records skip the body retrieval entirely.
///
/// A cancelled reservation restarts the walk with a fresh reservation and
/// discards anything collected so far, so the result is complete and free
/// of duplicates.
pub fn get_records<F>(client: &mut Client, mut filter: F) -> Result<Vec<Sdr>>
where
    F: FnMut(u16, SdrType) -> bool,
{
    let mut info = GetSdrRepositoryInfo::default();
    client.execute(&mut info)?;

    if !matches!(info.sdr_version, 0x01 | 0x51 | 0x02) {
        return Err(Error::message_owned(format!(
            "unknown SDR repository version: {:#04x}",
            info.sdr_version
        )));
    }
    if info.record_count == 0 {
        return Err(Error::Message("SDR repository has no records"));
    }

    'restart: loop {
        let mut reserve = ReserveSdrRepository::default();
        client.execute(&mut reserve)?;
        let reservation = reserve.reservation_id;

        let mut records = Vec::with_capacity(info.record_count as usize);
        let mut record_id = SDR_FIRST_ID;

        while record_id != SDR_LAST_ID {
            let (header, next_id) = match get_record_header(client, reservation, record_id) {
                Ok(v) => v,
                Err(err) if is_completion(&err, CompletionCode::RESERVATION_CANCELLED) => {
                    continue 'restart;
                }
                Err(err) => return Err(err),
            };

            if filter(header.record_id, header.record_type) {
                match get_record(client, reservation, &header) {
                    Ok(record) => records.push(record),
                    Err(err) if is_completion(&err, CompletionCode::RESERVATION_CANCELLED) => {
                        continue 'restart;
                    }
                    Err(err) => return Err(err),
                }
            }

            record_id = next_id;
        }

        return Ok(records);
    }
}
