//! Typed IPMI commands.
//!
//! A command object carries its request parameters and, after a successful
//! [`crate::Client::execute`], its decoded response fields. The transport
//! only needs the byte-level contract plus a display name for errors.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{NetFn, NetFnRsLun, PrivilegeLevel, ThresholdStatus, Version};

/// A typed IPMI command: request template and in-place response destination.
pub trait Command {
    /// Display name used in error messages.
    fn name(&self) -> &str;

    /// Command number.
    fn code(&self) -> u8;

    /// Network function and responder LUN for the request.
    fn net_fn_rs_lun(&self) -> NetFnRsLun;

    /// Encode the request data bytes (excluding the LAN message framing).
    fn marshal(&self) -> Vec<u8>;

    /// Decode the response data bytes into this command's response fields.
    fn unmarshal(&mut self, data: &[u8]) -> Result<()>;
}

fn require_len(name: &str, data: &[u8], min: usize) -> Result<()> {
    if data.len() < min {
        return Err(Error::message_owned(format!(
            "short {name} response: {} bytes, need {min}",
            data.len()
        )));
    }
    Ok(())
}

/// `Get Device ID` (App, 0x01). Section 20.1.
#[derive(Debug, Clone, Default)]
pub struct GetDeviceId {
    /// Device ID (BMC-defined).
    pub device_id: u8,
    /// Device revision (low nibble).
    pub device_revision: u8,
    /// The device provides device SDRs.
    pub provides_sdrs: bool,
    /// Device is available (not in a firmware transfer state).
    pub device_available: bool,
    /// Firmware major revision.
    pub firmware_major: u8,
    /// Firmware minor revision.
    pub firmware_minor: u8,
    /// IPMI version as BCD (0x02 for 2.0).
    pub ipmi_version: u8,
    /// Sensor device support.
    pub supports_sensor_device: bool,
    /// SDR repository device support.
    pub supports_sdr_repository: bool,
    /// SEL device support.
    pub supports_sel_device: bool,
    /// FRU inventory device support.
    pub supports_fru_inventory: bool,
    /// Chassis device support.
    pub supports_chassis_device: bool,
}

impl Command for GetDeviceId {
    fn name(&self) -> &str {
        "Get Device ID"
    }

    fn code(&self) -> u8 {
        0x01
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::AppReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 11)?;
        self.device_id = data[0];
        self.device_revision = data[1] & 0x0F;
        self.provides_sdrs = data[1] & 0x80 != 0;
        self.device_available = data[2] & 0x80 == 0;
        self.firmware_major = data[2] & 0x7F;
        self.firmware_minor = data[3];
        self.ipmi_version = data[4];
        self.supports_sensor_device = data[5] & 0x01 != 0;
        self.supports_sdr_repository = data[5] & 0x02 != 0;
        self.supports_sel_device = data[5] & 0x04 != 0;
        self.supports_fru_inventory = data[5] & 0x08 != 0;
        self.supports_chassis_device = data[5] & 0x80 != 0;
        Ok(())
    }
}

/// `Get Chassis Status` (Chassis, 0x01). Section 28.2.
#[derive(Debug, Clone, Default)]
pub struct GetChassisStatus {
    /// System power is on.
    pub power_is_on: bool,
    /// Power overload.
    pub power_overload: bool,
    /// Power interlock active.
    pub power_interlock: bool,
    /// Main power fault.
    pub power_fault: bool,
    /// Power control fault.
    pub power_control_fault: bool,
    /// Power restore policy (Table 28-3).
    pub power_restore_policy: u8,
    /// Last power event: AC failed.
    pub last_power_event_ac_failed: bool,
    /// Last power event: overload.
    pub last_power_event_overload: bool,
    /// Last power event: interlock.
    pub last_power_event_interlock: bool,
    /// Last power event: fault.
    pub last_power_event_fault: bool,
    /// Last power event: power-on via command.
    pub last_power_event_command: bool,
    /// Chassis intrusion active.
    pub chassis_intrusion_active: bool,
    /// Front panel lockout active.
    pub front_panel_lockout_active: bool,
    /// Drive fault.
    pub drive_fault: bool,
    /// Cooling or fan fault.
    pub cooling_fan_fault: bool,
}

impl Command for GetChassisStatus {
    fn name(&self) -> &str {
        "Get Chassis Status"
    }

    fn code(&self) -> u8 {
        0x01
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::ChassisReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 3)?;
        self.power_is_on = data[0] & 0x01 != 0;
        self.power_overload = data[0] & 0x02 != 0;
        self.power_interlock = data[0] & 0x04 != 0;
        self.power_fault = data[0] & 0x08 != 0;
        self.power_control_fault = data[0] & 0x10 != 0;
        self.power_restore_policy = (data[0] & 0x60) >> 5;

        self.last_power_event_ac_failed = data[1] & 0x01 != 0;
        self.last_power_event_overload = data[1] & 0x02 != 0;
        self.last_power_event_interlock = data[1] & 0x04 != 0;
        self.last_power_event_fault = data[1] & 0x08 != 0;
        self.last_power_event_command = data[1] & 0x10 != 0;

        self.chassis_intrusion_active = data[2] & 0x01 != 0;
        self.front_panel_lockout_active = data[2] & 0x02 != 0;
        self.drive_fault = data[2] & 0x04 != 0;
        self.cooling_fan_fault = data[2] & 0x08 != 0;
        Ok(())
    }
}

/// `Get System Restart Cause` (Chassis, 0x07). Section 28.11.
#[derive(Debug, Clone, Default)]
pub struct GetSystemRestartCause {
    /// Restart cause (Table 28-11).
    pub restart_cause: u8,
}

impl Command for GetSystemRestartCause {
    fn name(&self) -> &str {
        "Get System Restart Cause"
    }

    fn code(&self) -> u8 {
        0x07
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::ChassisReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 1)?;
        self.restart_cause = data[0];
        Ok(())
    }
}

/// `Get POH Counter` (Chassis, 0x0F). Section 28.14.
#[derive(Debug, Clone, Default)]
pub struct GetPohCounter {
    /// Minutes represented by one counter tick.
    pub minutes_per_count: u8,
    /// Counter ticks.
    pub counter: u32,
}

impl GetPohCounter {
    /// Power-on time represented by the counter.
    pub fn power_on_hours(&self) -> Duration {
        Duration::from_secs(u64::from(self.minutes_per_count) * u64::from(self.counter) * 60)
    }
}

impl Command for GetPohCounter {
    fn name(&self) -> &str {
        "Get POH Counter"
    }

    fn code(&self) -> u8 {
        0x0F
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::ChassisReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 5)?;
        self.minutes_per_count = data[0];
        self.counter = u32::from_le_bytes(data[1..5].try_into().unwrap());
        Ok(())
    }
}

/// `Get Sensor Reading` (Sensor/Event, 0x2D). Section 35.14.
#[derive(Debug, Clone, Default)]
pub struct GetSensorReading {
    /// Responder LUN the sensor lives behind.
    pub rs_lun: u8,
    /// Sensor number to read.
    pub sensor_number: u8,

    /// Raw sensor reading byte.
    pub sensor_reading: u8,
    /// Reading byte is not valid.
    pub reading_unavailable: bool,
    /// Sensor scanning is disabled.
    pub scanning_disabled: bool,
    /// Event messages are disabled.
    pub event_disabled: bool,
    /// Discrete state or threshold comparison bits.
    pub sensor_data2: u8,
    /// Optional third data byte.
    pub sensor_data3: u8,
}

impl GetSensorReading {
    /// Read a sensor behind LUN 0.
    pub fn new(sensor_number: u8) -> Self {
        Self {
            sensor_number,
            ..Self::default()
        }
    }

    /// `true` when `sensor_reading` may be trusted.
    pub fn is_valid(&self) -> bool {
        !(self.reading_unavailable || self.scanning_disabled)
    }

    /// Threshold status for threshold-based sensors.
    pub fn threshold_status(&self) -> ThresholdStatus {
        ThresholdStatus::from_reading_flags(self.sensor_data2)
    }
}

impl Command for GetSensorReading {
    fn name(&self) -> &str {
        "Get Sensor Reading"
    }

    fn code(&self) -> u8 {
        0x2D
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::SensorReq, self.rs_lun)
    }

    fn marshal(&self) -> Vec<u8> {
        vec![self.sensor_number]
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 2)?;
        self.sensor_reading = data[0];
        self.reading_unavailable = data[1] & 0x20 != 0;
        self.scanning_disabled = data[1] & 0x40 == 0;
        self.event_disabled = data[1] & 0x80 == 0;

        if data.len() >= 3 {
            self.sensor_data2 = data[2];
        }
        if data.len() >= 4 {
            self.sensor_data3 = data[3];
        }
        Ok(())
    }
}

/// `Get Channel Authentication Capabilities` (App, 0x38). Section 22.13.
#[derive(Debug, Clone, Default)]
pub struct GetChannelAuthCapabilities {
    /// Requested channel byte (0x0E = current channel; bit 7 requests
    /// v2.0 data).
    pub req_channel_number: u8,
    /// Privilege level the capabilities are queried for.
    pub privilege: u8,

    /// Channel number in the response.
    pub res_channel_number: u8,
    /// Supported authentication type bits; bit 7 advertises RMCP+.
    pub auth_type_support: u8,
    /// Authentication status flags.
    pub auth_status: u8,
}

impl GetChannelAuthCapabilities {
    /// Query the current channel (0x0E), optionally requesting v2.0 data.
    pub fn new(version: Version, privilege: PrivilegeLevel) -> Self {
        let mut channel = 0x0E;
        if version == Version::V2_0 {
            channel |= 0x80;
        }
        Self {
            req_channel_number: channel,
            privilege: privilege.as_u8(),
            ..Self::default()
        }
    }

    /// RMCP+ (IPMI v2.0) support advertised by the channel.
    pub fn supports_rmcp_plus(&self) -> bool {
        self.auth_type_support & 0x80 != 0
    }
}

impl Command for GetChannelAuthCapabilities {
    fn name(&self) -> &str {
        "Get Channel Authentication Capabilities"
    }

    fn code(&self) -> u8 {
        0x38
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::AppReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        vec![self.req_channel_number, self.privilege]
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 8)?;
        self.res_channel_number = data[0];
        self.auth_type_support = data[1];
        self.auth_status = data[2];
        Ok(())
    }
}

/// `Set Session Privilege Level` (App, 0x3B). Section 22.18.
#[derive(Debug, Clone, Default)]
pub struct SetSessionPrivilegeLevel {
    /// Requested privilege level byte.
    pub requested_level: u8,
    /// Privilege level granted by the BMC.
    pub new_level: u8,
}

impl SetSessionPrivilegeLevel {
    /// Request the given privilege level for the active session.
    pub fn new(level: PrivilegeLevel) -> Self {
        Self {
            requested_level: level.as_u8(),
            new_level: 0,
        }
    }
}

impl Command for SetSessionPrivilegeLevel {
    fn name(&self) -> &str {
        "Set Session Privilege Level"
    }

    fn code(&self) -> u8 {
        0x3B
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::AppReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        vec![self.requested_level]
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 1)?;
        self.new_level = data[0];
        Ok(())
    }
}

/// `Close Session` (App, 0x3C). Section 22.19.
#[derive(Debug, Clone, Default)]
pub struct CloseSession {
    /// Session id to close.
    pub session_id: u32,
}

impl CloseSession {
    /// Close the session with the given id.
    pub fn new(session_id: u32) -> Self {
        Self { session_id }
    }
}

impl Command for CloseSession {
    fn name(&self) -> &str {
        "Close Session"
    }

    fn code(&self) -> u8 {
        0x3C
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::AppReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        self.session_id.to_le_bytes().to_vec()
    }

    fn unmarshal(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Console address block of a LAN-channel session (802.3 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLanAddress {
    /// Console IP address.
    pub console_ip: Ipv4Addr,
    /// Console MAC address.
    pub console_mac: [u8; 6],
    /// Console UDP port.
    pub console_port: u16,
}

/// `Get Session Info` (App, 0x3D). Section 22.20.
#[derive(Debug, Clone, Default)]
pub struct GetSessionInfo {
    /// Request selector: 0x00 current session, 1..=0x3F the Nth active
    /// session, 0xFE by handle, 0xFF by session id.
    pub session_index: u8,
    /// Session id (for 0xFF) or handle (for 0xFE).
    pub session_id: u32,

    /// Session handle.
    pub session_handle: u8,
    /// Number of session slots on the channel.
    pub session_slot_count: u8,
    /// Number of currently active sessions.
    pub active_session_count: u8,
    /// User id of the session, when active.
    pub user_id: u8,
    /// Operating privilege level of the session, when active.
    pub privilege_level: u8,
    /// Channel type (0x00 IPMI v1.5, 0x01 IPMI v2.0).
    pub channel_type: u8,
    /// Channel number.
    pub channel_number: u8,
    /// Console address block when the session is on a LAN channel.
    pub lan_address: Option<SessionLanAddress>,
}

impl Command for GetSessionInfo {
    fn name(&self) -> &str {
        "Get Session Info"
    }

    fn code(&self) -> u8 {
        0x3D
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::AppReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        match self.session_index {
            0xFF => {
                let mut buf = vec![0xFF];
                buf.extend_from_slice(&self.session_id.to_le_bytes());
                buf
            }
            0xFE => vec![0xFE, self.session_id as u8],
            index => vec![index],
        }
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != 3 && data.len() < 18 {
            return Err(Error::message_owned(format!(
                "short {} response: {} bytes",
                self.name(),
                data.len()
            )));
        }
        self.session_handle = data[0];
        self.session_slot_count = data[1] & 0x3F;
        self.active_session_count = data[2] & 0x3F;

        if data.len() == 3 {
            // No active session matches the request selector.
            return Ok(());
        }

        self.user_id = data[3] & 0x3F;
        self.privilege_level = data[4] & 0x0F;
        self.channel_type = (data[5] & 0xF0) >> 4;
        self.channel_number = data[5] & 0x0F;

        let mut mac = [0u8; 6];
        mac.copy_from_slice(&data[10..16]);
        self.lan_address = Some(SessionLanAddress {
            console_ip: Ipv4Addr::new(data[6], data[7], data[8], data[9]),
            console_mac: mac,
            console_port: u16::from_be_bytes(data[16..18].try_into().unwrap()),
        });
        Ok(())
    }
}

/// `Get SDR Repository Info` (Storage, 0x20). Section 33.9.
#[derive(Debug, Clone, Default)]
pub struct GetSdrRepositoryInfo {
    /// Repository version (0x01 v1.0, 0x51 v1.5, 0x02 v2.0).
    pub sdr_version: u8,
    /// Number of records in the repository.
    pub record_count: u16,
}

impl Command for GetSdrRepositoryInfo {
    fn name(&self) -> &str {
        "Get SDR Repository Info"
    }

    fn code(&self) -> u8 {
        0x20
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::StorageReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 14)?;
        self.sdr_version = data[0];
        self.record_count = u16::from_le_bytes(data[1..3].try_into().unwrap());
        Ok(())
    }
}

/// `Reserve SDR Repository` (Storage, 0x22). Section 33.11.
#[derive(Debug, Clone, Default)]
pub struct ReserveSdrRepository {
    /// Reservation id for subsequent partial reads.
    pub reservation_id: u16,
}

impl Command for ReserveSdrRepository {
    fn name(&self) -> &str {
        "Reserve SDR Repository"
    }

    fn code(&self) -> u8 {
        0x22
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::StorageReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 2)?;
        self.reservation_id = u16::from_le_bytes(data[0..2].try_into().unwrap());
        Ok(())
    }
}

/// `Get SDR` (Storage, 0x23). Section 33.12.
#[derive(Debug, Clone, Default)]
pub struct GetSdr {
    /// Reservation id (required for partial reads).
    pub reservation_id: u16,
    /// Record id to read.
    pub record_id: u16,
    /// Byte offset into the record.
    pub record_offset: u8,
    /// Number of bytes to read (0xFF = whole record).
    pub read_bytes: u8,

    /// Record id of the next record in the repository.
    pub next_record_id: u16,
    /// Returned record bytes.
    pub record_data: Vec<u8>,
}

impl Command for GetSdr {
    fn name(&self) -> &str {
        "Get SDR"
    }

    fn code(&self) -> u8 {
        0x23
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::StorageReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        buf.extend_from_slice(&self.reservation_id.to_le_bytes());
        buf.extend_from_slice(&self.record_id.to_le_bytes());
        buf.push(self.record_offset);
        buf.push(self.read_bytes);
        buf
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 2)?;
        self.next_record_id = u16::from_le_bytes(data[0..2].try_into().unwrap());
        let body = &data[2..];
        let take = body.len().min(self.read_bytes as usize);
        self.record_data = body[..take].to_vec();
        Ok(())
    }
}

/// `Get SEL Info` (Storage, 0x40). Section 31.2.
#[derive(Debug, Clone, Default)]
pub struct GetSelInfo {
    /// SEL version (0x51 v1.5, 0x02 v2.0).
    pub sel_version: u8,
    /// Number of log entries.
    pub entries: u16,
    /// Free space in bytes.
    pub free_space: u16,
    /// Most recent addition timestamp.
    pub last_add_time: u32,
    /// Most recent erase timestamp.
    pub last_del_time: u32,
    /// `Get SEL Allocation Info` supported.
    pub support_alloc_info: bool,
    /// `Reserve SEL` supported.
    pub support_reserve: bool,
    /// `Partial Add SEL Entry` supported.
    pub support_partial_add: bool,
    /// `Delete SEL` supported.
    pub support_delete: bool,
    /// Events were dropped due to lack of space.
    pub overflow: bool,
}

impl Command for GetSelInfo {
    fn name(&self) -> &str {
        "Get SEL Info"
    }

    fn code(&self) -> u8 {
        0x40
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::StorageReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 14)?;
        self.sel_version = data[0];
        self.entries = u16::from_le_bytes(data[1..3].try_into().unwrap());
        self.free_space = u16::from_le_bytes(data[3..5].try_into().unwrap());
        self.last_add_time = u32::from_le_bytes(data[5..9].try_into().unwrap());
        self.last_del_time = u32::from_le_bytes(data[9..13].try_into().unwrap());
        self.support_alloc_info = data[13] & 0x01 != 0;
        self.support_reserve = data[13] & 0x02 != 0;
        self.support_partial_add = data[13] & 0x04 != 0;
        self.support_delete = data[13] & 0x08 != 0;
        self.overflow = data[13] & 0x80 != 0;
        Ok(())
    }
}

/// `Reserve SEL` (Storage, 0x42). Section 31.4.
#[derive(Debug, Clone, Default)]
pub struct ReserveSel {
    /// Reservation id for subsequent reads.
    pub reservation_id: u16,
}

impl Command for ReserveSel {
    fn name(&self) -> &str {
        "Reserve SEL"
    }

    fn code(&self) -> u8 {
        0x42
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::StorageReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 2)?;
        self.reservation_id = u16::from_le_bytes(data[0..2].try_into().unwrap());
        Ok(())
    }
}

/// `Get SEL Entry` (Storage, 0x43). Section 31.5.
#[derive(Debug, Clone, Default)]
pub struct GetSelEntry {
    /// Reservation id (0x0000 for whole-record reads).
    pub reservation_id: u16,
    /// Record id to read.
    pub record_id: u16,
    /// Byte offset into the record.
    pub record_offset: u8,
    /// Number of bytes to read (0xFF = whole record).
    pub read_bytes: u8,

    /// Record id of the next entry in the log.
    pub next_record_id: u16,
    /// Returned record bytes.
    pub record_data: Vec<u8>,
}

impl Command for GetSelEntry {
    fn name(&self) -> &str {
        "Get SEL Entry"
    }

    fn code(&self) -> u8 {
        0x43
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        NetFnRsLun::new(NetFn::StorageReq, 0)
    }

    fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        buf.extend_from_slice(&self.reservation_id.to_le_bytes());
        buf.extend_from_slice(&self.record_id.to_le_bytes());
        buf.push(self.record_offset);
        buf.push(self.read_bytes);
        buf
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        require_len(self.name(), data, 2)?;
        self.next_record_id = u16::from_le_bytes(data[0..2].try_into().unwrap());
        let body = &data[2..];
        let take = body.len().min(self.read_bytes as usize);
        self.record_data = body[..take].to_vec();
        Ok(())
    }
}

/// An escape hatch carrying an arbitrary request body.
#[derive(Debug, Clone)]
pub struct RawCommand {
    name: String,
    code: u8,
    net_fn_rs_lun: NetFnRsLun,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl RawCommand {
    /// Create a raw command from its wire identifiers and request data.
    pub fn new(
        name: impl Into<String>,
        code: u8,
        net_fn_rs_lun: NetFnRsLun,
        input: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            code,
            net_fn_rs_lun,
            input,
            output: Vec::new(),
        }
    }

    /// Request data bytes.
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Response data bytes after a successful execute.
    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

impl Command for RawCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> u8 {
        self.code
    }

    fn net_fn_rs_lun(&self) -> NetFnRsLun {
        self.net_fn_rs_lun
    }

    fn marshal(&self) -> Vec<u8> {
        self.input.clone()
    }

    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        self.output = data.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_device_id_parses_response() {
        let data = [
            0x20, 0x81, 0x02, 0x43, 0x02, 0x8F, 0xA2, 0x02, 0x00, 0x00, 0x01,
        ];
        let mut cmd = GetDeviceId::default();
        cmd.unmarshal(&data).expect("unmarshal");

        assert_eq!(cmd.device_id, 0x20);
        assert_eq!(cmd.device_revision, 0x01);
        assert!(cmd.provides_sdrs);
        assert!(cmd.device_available);
        assert_eq!(cmd.firmware_major, 0x02);
        assert_eq!(cmd.firmware_minor, 0x43);
        assert_eq!(cmd.ipmi_version, 0x02);
        assert!(cmd.supports_sensor_device);
        assert!(cmd.supports_sdr_repository);
        assert!(cmd.supports_sel_device);
        assert!(cmd.supports_fru_inventory);
        assert!(cmd.supports_chassis_device);
    }

    #[test]
    fn get_chassis_status_parses_response() {
        let mut cmd = GetChassisStatus::default();
        cmd.unmarshal(&[0x5F, 0x19, 0x0F]).expect("unmarshal");

        assert!(cmd.power_is_on);
        assert!(cmd.power_overload);
        assert!(cmd.power_interlock);
        assert!(cmd.power_fault);
        assert!(cmd.power_control_fault);
        assert_eq!(cmd.power_restore_policy, 0x02);
        assert!(cmd.last_power_event_ac_failed);
        assert!(!cmd.last_power_event_overload);
        assert!(cmd.last_power_event_fault);
        assert!(cmd.last_power_event_command);
        assert!(cmd.chassis_intrusion_active);
        assert!(cmd.front_panel_lockout_active);
        assert!(cmd.drive_fault);
        assert!(cmd.cooling_fan_fault);
    }

    #[test]
    fn get_poh_counter_converts_hours() {
        let mut cmd = GetPohCounter::default();
        cmd.unmarshal(&[60, 10, 0, 0, 0]).expect("unmarshal");
        assert_eq!(cmd.minutes_per_count, 60);
        assert_eq!(cmd.counter, 10);
        assert_eq!(cmd.power_on_hours(), Duration::from_secs(10 * 3600));
    }

    #[test]
    fn get_sensor_reading_flags_and_validity() {
        let mut cmd = GetSensorReading::new(0x30);
        assert_eq!(cmd.marshal(), vec![0x30]);

        // scanning enabled (0x40 set), events enabled (0x80 set), reading ok
        cmd.unmarshal(&[0x2A, 0xC0, 0x08]).expect("unmarshal");
        assert_eq!(cmd.sensor_reading, 0x2A);
        assert!(cmd.is_valid());
        assert!(!cmd.event_disabled);
        assert_eq!(cmd.threshold_status(), ThresholdStatus::UpperNonCritical);

        // reading unavailable
        cmd.unmarshal(&[0x00, 0x60]).expect("unmarshal");
        assert!(!cmd.is_valid());
    }

    #[test]
    fn channel_auth_capabilities_request_forms() {
        let v2 = GetChannelAuthCapabilities::new(Version::V2_0, PrivilegeLevel::Administrator);
        assert_eq!(v2.marshal(), vec![0x8E, 0x04]);

        let v1 = GetChannelAuthCapabilities::new(Version::V1_5, PrivilegeLevel::Operator);
        assert_eq!(v1.marshal(), vec![0x0E, 0x03]);

        let mut cmd = v2;
        cmd.unmarshal(&[0x01, 0x80, 0x14, 0x02, 0, 0, 0, 0])
            .expect("unmarshal");
        assert!(cmd.supports_rmcp_plus());
    }

    #[test]
    fn session_info_request_forms() {
        let by_id = GetSessionInfo {
            session_index: 0xFF,
            session_id: 0x0102_0304,
            ..GetSessionInfo::default()
        };
        assert_eq!(by_id.marshal(), vec![0xFF, 0x04, 0x03, 0x02, 0x01]);

        let by_handle = GetSessionInfo {
            session_index: 0xFE,
            session_id: 0x21,
            ..GetSessionInfo::default()
        };
        assert_eq!(by_handle.marshal(), vec![0xFE, 0x21]);

        let current = GetSessionInfo::default();
        assert_eq!(current.marshal(), vec![0x00]);
    }

    #[test]
    fn session_info_parses_lan_address() {
        let data = [
            0x01, 0x24, 0x02, // handle, slots, active
            0x03, 0x04, 0x14, // user, privilege, type/number
            192, 0, 2, 1, // console ip
            0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, // console mac
            0x02, 0x6F, // console port (big endian)
        ];
        let mut cmd = GetSessionInfo::default();
        cmd.unmarshal(&data).expect("unmarshal");

        assert_eq!(cmd.session_handle, 0x01);
        assert_eq!(cmd.session_slot_count, 0x24);
        assert_eq!(cmd.active_session_count, 0x02);
        assert_eq!(cmd.user_id, 0x03);
        assert_eq!(cmd.privilege_level, 0x04);
        assert_eq!(cmd.channel_type, 0x01);
        assert_eq!(cmd.channel_number, 0x04);

        let lan = cmd.lan_address.expect("lan address");
        assert_eq!(lan.console_ip, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(lan.console_mac, [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);
        assert_eq!(lan.console_port, 623);

        // Three-byte form: no matching active session.
        let mut cmd = GetSessionInfo::default();
        cmd.unmarshal(&[0x05, 0x10, 0x00]).expect("unmarshal");
        assert_eq!(cmd.session_handle, 0x05);
        assert!(cmd.lan_address.is_none());
    }

    #[test]
    fn sdr_and_sel_partial_read_requests() {
        let cmd = GetSdr {
            reservation_id: 0x1234,
            record_id: 0xABCD,
            record_offset: 5,
            read_bytes: 32,
            ..GetSdr::default()
        };
        assert_eq!(cmd.marshal(), vec![0x34, 0x12, 0xCD, 0xAB, 5, 32]);

        let cmd = GetSelEntry {
            reservation_id: 0x0000,
            record_id: 0x0001,
            record_offset: 0,
            read_bytes: 0xFF,
            ..GetSelEntry::default()
        };
        assert_eq!(cmd.marshal(), vec![0x00, 0x00, 0x01, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn get_sdr_truncates_to_requested_bytes() {
        let mut cmd = GetSdr {
            read_bytes: 4,
            ..GetSdr::default()
        };
        cmd.unmarshal(&[0x02, 0x00, 1, 2, 3, 4, 5, 6]).expect("unmarshal");
        assert_eq!(cmd.next_record_id, 0x0002);
        assert_eq!(cmd.record_data, vec![1, 2, 3, 4]);

        // Fewer bytes than requested: keep what arrived.
        cmd.unmarshal(&[0xFF, 0xFF, 9, 8]).expect("unmarshal");
        assert_eq!(cmd.next_record_id, 0xFFFF);
        assert_eq!(cmd.record_data, vec![9, 8]);
    }

    #[test]
    fn get_sel_entry_reports_corrected_name() {
        let cmd = GetSelEntry::default();
        assert_eq!(cmd.name(), "Get SEL Entry");
        assert_eq!(cmd.code(), 0x43);
    }

    #[test]
    fn sel_info_bits() {
        let data = [
            0x51, 0x64, 0x00, 0x00, 0x20, 0, 0, 0, 0, 0, 0, 0, 0, 0x8F,
        ];
        let mut cmd = GetSelInfo::default();
        cmd.unmarshal(&data).expect("unmarshal");
        assert_eq!(cmd.sel_version, 0x51);
        assert_eq!(cmd.entries, 100);
        assert_eq!(cmd.free_space, 0x2000);
        assert!(cmd.support_alloc_info);
        assert!(cmd.support_reserve);
        assert!(cmd.support_partial_add);
        assert!(cmd.support_delete);
        assert!(cmd.overflow);
    }

    #[test]
    fn chassis_singletons_decode_one_byte_payloads() {
        let mut cmd = GetSystemRestartCause::default();
        cmd.unmarshal(&[0x06, 0x00]).expect("unmarshal");
        assert_eq!(cmd.restart_cause, 0x06);

        let mut cmd = SetSessionPrivilegeLevel::new(PrivilegeLevel::Operator);
        assert_eq!(cmd.marshal(), vec![0x03]);
        cmd.unmarshal(&[0x03]).expect("unmarshal");
        assert_eq!(cmd.new_level, 0x03);

        let cmd = CloseSession::new(0xDEAD_BEEF);
        assert_eq!(cmd.marshal(), vec![0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn raw_command_round_trip() {
        let mut cmd = RawCommand::new(
            "Get Device GUID",
            0x08,
            NetFnRsLun::new(NetFn::AppReq, 0),
            vec![],
        );
        assert_eq!(cmd.name(), "Get Device GUID");
        assert_eq!(cmd.marshal(), Vec::<u8>::new());

        cmd.unmarshal(&[1, 2, 3]).expect("unmarshal");
        assert_eq!(cmd.output(), &[1, 2, 3]);
    }
}
