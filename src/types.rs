use core::fmt;

/// IPMI protocol version selected for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// IPMI v1.5 (session activation is not implemented).
    V1_5,
    /// IPMI v2.0 / RMCP+.
    V2_0,
}

/// The privilege level requested for the IPMI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Callback privilege.
    Callback = 0x01,
    /// User privilege.
    User = 0x02,
    /// Operator privilege.
    Operator = 0x03,
    /// Administrator privilege.
    Administrator = 0x04,
}

impl PrivilegeLevel {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode from the low nibble of a response byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Callback),
            0x02 => Some(Self::User),
            0x03 => Some(Self::Operator),
            0x04 => Some(Self::Administrator),
            _ => None,
        }
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Callback => "CALLBACK",
            Self::User => "USER",
            Self::Operator => "OPERATOR",
            Self::Administrator => "ADMINISTRATOR",
        };
        f.write_str(s)
    }
}

/// IPMI completion code (one byte, 0x00 = success).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionCode(pub u8);

impl CompletionCode {
    /// Command completed normally.
    pub const OK: Self = Self(0x00);
    /// Node busy.
    pub const NODE_BUSY: Self = Self(0xC0);
    /// Invalid command.
    pub const INVALID_COMMAND: Self = Self(0xC1);
    /// Command invalid for the given LUN.
    pub const INVALID_COMMAND_FOR_LUN: Self = Self(0xC2);
    /// Timeout while processing the command.
    pub const TIMEOUT: Self = Self(0xC3);
    /// Out of space.
    pub const OUT_OF_SPACE: Self = Self(0xC4);
    /// Reservation cancelled or invalid reservation ID.
    pub const RESERVATION_CANCELLED: Self = Self(0xC5);
    /// Request data truncated.
    pub const REQUEST_DATA_TRUNCATED: Self = Self(0xC6);
    /// Request data length invalid.
    pub const REQUEST_DATA_INVALID_LENGTH: Self = Self(0xC7);
    /// Request data field length limit exceeded.
    pub const REQUEST_DATA_FIELD_EXCEEDED: Self = Self(0xC8);
    /// Parameter out of range.
    pub const PARAMETER_OUT_OF_RANGE: Self = Self(0xC9);
    /// Cannot return the number of requested data bytes.
    pub const CANNOT_RETURN_REQUESTED_BYTES: Self = Self(0xCA);
    /// Requested sensor, data, or record not present.
    pub const REQUESTED_DATA_NOT_PRESENT: Self = Self(0xCB);
    /// Invalid data field in request.
    pub const INVALID_DATA_FIELD: Self = Self(0xCC);
    /// Command illegal for the specified sensor or record type.
    pub const ILLEGAL_FOR_SENSOR_OR_RECORD: Self = Self(0xCD);
    /// Command response could not be provided.
    pub const RESPONSE_UNAVAILABLE: Self = Self(0xCE);
    /// Cannot execute duplicated request.
    pub const DUPLICATED_REQUEST: Self = Self(0xCF);
    /// SDR repository in update mode.
    pub const SDR_IN_UPDATE_MODE: Self = Self(0xD0);
    /// Device in firmware update mode.
    pub const FIRMWARE_UPDATE_MODE: Self = Self(0xD1);
    /// BMC initialization or initialization agent in progress.
    pub const BMC_INITIALIZATION: Self = Self(0xD2);
    /// Destination unavailable.
    pub const DESTINATION_UNAVAILABLE: Self = Self(0xD3);
    /// Insufficient privilege level.
    pub const INSUFFICIENT_PRIVILEGE: Self = Self(0xD4);
    /// Command not supported in present state.
    pub const NOT_SUPPORTED_IN_PRESENT_STATE: Self = Self(0xD5);
    /// Command sub-function has been disabled or is unavailable.
    pub const SUB_FUNCTION_DISABLED: Self = Self(0xD6);
    /// Unspecified error.
    pub const UNSPECIFIED: Self = Self(0xFF);

    /// `true` when the command completed normally.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    fn description(self) -> Option<&'static str> {
        let s = match self {
            Self::OK => "Command Completed Normally",
            Self::NODE_BUSY => "Node Busy",
            Self::INVALID_COMMAND => "Invalid Command",
            Self::INVALID_COMMAND_FOR_LUN => "Command invalid for given LUN",
            Self::TIMEOUT => "Timeout",
            Self::OUT_OF_SPACE => "Out of space",
            Self::RESERVATION_CANCELLED => "Reservation Canceled or Invalid Reservation ID",
            Self::REQUEST_DATA_TRUNCATED => "Request data truncated",
            Self::REQUEST_DATA_INVALID_LENGTH => "Request data length invalid",
            Self::REQUEST_DATA_FIELD_EXCEEDED => "Request data field length limit exceeded",
            Self::PARAMETER_OUT_OF_RANGE => "Parameter out of range",
            Self::CANNOT_RETURN_REQUESTED_BYTES => "Cannot return number of requested data bytes",
            Self::REQUESTED_DATA_NOT_PRESENT => "Requested sensor, data, or record not present",
            Self::INVALID_DATA_FIELD => "Invalid data field in Request",
            Self::ILLEGAL_FOR_SENSOR_OR_RECORD => {
                "Command illegal for specified sensor or record type"
            }
            Self::RESPONSE_UNAVAILABLE => "Command response could not be provided",
            Self::DUPLICATED_REQUEST => "Cannot execute duplicated request",
            Self::SDR_IN_UPDATE_MODE => "SDR Repository in update mode",
            Self::FIRMWARE_UPDATE_MODE => "Device in firmware update mode",
            Self::BMC_INITIALIZATION => "BMC initialization or initialization agent in progress",
            Self::DESTINATION_UNAVAILABLE => "Destination unavailable",
            Self::INSUFFICIENT_PRIVILEGE => {
                "Cannot execute command due to insufficient privilege level"
            }
            Self::NOT_SUPPORTED_IN_PRESENT_STATE => "Command not supported in present state",
            Self::SUB_FUNCTION_DISABLED => {
                "Command sub-function has been disabled or is unavailable"
            }
            Self::UNSPECIFIED => "Unspecified error",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(s) => f.write_str(s),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}

impl fmt::Debug for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompletionCode({:#04x})", self.0)
    }
}

/// Network Function codes (Section 5.1). The low bit of the code pair
/// distinguishes request from response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetFn {
    /// Chassis request.
    ChassisReq = 0x00,
    /// Chassis response.
    ChassisRes = 0x01,
    /// Bridge request.
    BridgeReq = 0x02,
    /// Bridge response.
    BridgeRes = 0x03,
    /// Sensor/Event request.
    SensorReq = 0x04,
    /// Sensor/Event response.
    SensorRes = 0x05,
    /// Application request.
    AppReq = 0x06,
    /// Application response.
    AppRes = 0x07,
    /// Firmware request.
    FirmwareReq = 0x08,
    /// Firmware response.
    FirmwareRes = 0x09,
    /// Storage request.
    StorageReq = 0x0A,
    /// Storage response.
    StorageRes = 0x0B,
    /// Transport request.
    TransportReq = 0x0C,
    /// Transport response.
    TransportRes = 0x0D,
}

/// Network function and responder LUN packed into one byte
/// (`netFn << 2 | rsLUN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetFnRsLun(pub u8);

impl NetFnRsLun {
    /// Pack a network function with a responder LUN.
    pub fn new(net_fn: NetFn, rs_lun: u8) -> Self {
        Self((net_fn as u8) << 2 | (rs_lun & 0x03))
    }

    /// Raw network function code (the upper six bits).
    pub fn net_fn_code(self) -> u8 {
        self.0 >> 2
    }

    /// Responder LUN (the lower two bits).
    pub fn rs_lun(self) -> u8 {
        self.0 & 0x03
    }
}

/// SEL/SDR timestamp (Section 37), seconds since the Unix epoch with two
/// reserved ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp(pub u32);

impl Timestamp {
    const UNSPECIFIED: u32 = 0xFFFF_FFFF;
    const POST_INIT_MAX: u32 = 0x2000_0000;

    /// `true` when the timestamp is the reserved "unspecified" value.
    pub fn is_unspecified(self) -> bool {
        self.0 == Self::UNSPECIFIED
    }

    /// `true` when the value is relative to system initialization rather
    /// than the epoch.
    pub fn is_post_init(self) -> bool {
        self.0 <= Self::POST_INIT_MAX
    }

    /// Seconds since the Unix epoch, when the value is absolute.
    pub fn as_unix_secs(self) -> Option<u32> {
        if self.is_unspecified() || self.is_post_init() {
            None
        } else {
            Some(self.0)
        }
    }
}

/// Threshold status of a threshold-based sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStatus {
    /// Within normal operating range.
    Ok,
    /// At or below lower non-recoverable.
    LowerNonRecoverable,
    /// At or below lower critical.
    LowerCritical,
    /// At or below lower non-critical.
    LowerNonCritical,
    /// At or above upper non-recoverable.
    UpperNonRecoverable,
    /// At or above upper critical.
    UpperCritical,
    /// At or above upper non-critical.
    UpperNonCritical,
}

impl ThresholdStatus {
    /// Derive from the threshold comparison bits of a sensor reading
    /// (data byte 2 of `Get Sensor Reading`).
    pub fn from_reading_flags(status: u8) -> Self {
        if status & 0x04 != 0 {
            Self::LowerNonRecoverable
        } else if status & 0x20 != 0 {
            Self::UpperNonRecoverable
        } else if status & 0x02 != 0 {
            Self::LowerCritical
        } else if status & 0x10 != 0 {
            Self::UpperCritical
        } else if status & 0x01 != 0 {
            Self::LowerNonCritical
        } else if status & 0x08 != 0 {
            Self::UpperNonCritical
        } else {
            Self::Ok
        }
    }

    /// Short conventional form ("ok", "lnr", "ucr", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::LowerNonRecoverable => "lnr",
            Self::LowerCritical => "lcr",
            Self::LowerNonCritical => "lnc",
            Self::UpperNonRecoverable => "unr",
            Self::UpperCritical => "ucr",
            Self::UpperNonCritical => "unc",
        }
    }
}

impl fmt::Display for ThresholdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event/Reading type (Table 42-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventType(pub u8);

impl EventType {
    /// Unspecified event type.
    pub fn is_unspecified(self) -> bool {
        self.0 == 0x00
    }

    /// Threshold-based event type.
    pub fn is_threshold(self) -> bool {
        self.0 == 0x01
    }

    /// Generic discrete event type.
    pub fn is_generic(self) -> bool {
        (0x02..=0x0C).contains(&self.0)
    }

    /// Sensor-specific discrete event type.
    pub fn is_sensor_specific(self) -> bool {
        self.0 == 0x6F
    }

    /// OEM event type.
    pub fn is_oem(self) -> bool {
        (0x70..=0x7F).contains(&self.0)
    }
}

/// Sensor type (Table 42-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorType(pub u8);

static SENSOR_TYPE_NAMES: &[&str] = &[
    "reserved",
    "Temperature",
    "Voltage",
    "Current",
    "Fan",
    "Physical Security",
    "Platform Security",
    "Processor",
    "Power Supply",
    "Power Unit",
    "Cooling Device",
    "Other Units-based Sensor",
    "Memory",
    "Drive Slot",
    "POST Memory Resize",
    "System Firmware",
    "Event Logging Disabled",
    "Watchdog 1",
    "System Event",
    "Critical Interrupt",
    "Button / Switch",
    "Module / Board",
    "Microcontroller",
    "Add-in Card",
    "Chassis",
    "Chip Set",
    "Other FRU",
    "Cable / Interconnect",
    "Terminator",
    "System Boot Initiated",
    "Boot Error",
    "OS Boot",
    "OS Stop",
    "Slot / Connector",
    "System ACPI Power State",
    "Watchdog 2",
    "Platform Alert",
    "Entity Presence",
    "Monitor ASIC",
    "LAN",
    "Management Subsystem Health",
    "Battery",
    "Session Audit",
    "Version Change",
    "FRU State",
];

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = self.0 as usize;
        if let Some(name) = SENSOR_TYPE_NAMES.get(i) {
            f.write_str(name)
        } else if self.0 < 0xC0 {
            write!(f, "Reserved({})", self.0)
        } else {
            write!(f, "OEM Reserved({})", self.0)
        }
    }
}

/// Sensor unit type (Section 43.17).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitType(pub u8);

static UNIT_NAMES: &[&str] = &[
    "unspecified",
    "degrees C",
    "degrees F",
    "degrees K",
    "Volts",
    "Amps",
    "Watts",
    "Joules",
    "Coulombs",
    "VA",
    "Nits",
    "lumen",
    "lux",
    "Candela",
    "kPa",
    "PSI",
    "Newton",
    "CFM",
    "RPM",
    "Hz",
    "microsecond",
    "millisecond",
    "second",
    "minute",
    "hour",
    "day",
    "week",
    "mil",
    "inches",
    "feet",
    "cu in",
    "cu feet",
    "mm",
    "cm",
    "m",
    "cu cm",
    "cu m",
    "liters",
    "fluid ounce",
    "radians",
    "steradians",
    "revolutions",
    "cycles",
    "gravities",
    "ounce",
    "pound",
    "ft-lb",
    "oz-in",
    "gauss",
    "gilberts",
    "henry",
    "millihenry",
    "farad",
    "microfarad",
    "ohms",
    "siemens",
    "mole",
    "becquerel",
    "PPM",
    "reserved",
    "Decibels",
    "DbA",
    "DbC",
    "gray",
    "sievert",
    "color temp deg K",
    "bit",
    "kilobit",
    "megabit",
    "gigabit",
    "byte",
    "kilobyte",
    "megabyte",
    "gigabyte",
    "word",
    "dword",
    "qword",
    "line",
    "hit",
    "miss",
    "retry",
    "reset",
    "overflow",
    "underrun",
    "collision",
    "packets",
    "messages",
    "characters",
    "error",
    "correctable error",
    "uncorrectable error",
];

impl UnitType {
    /// `true` for the "unspecified" unit.
    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match UNIT_NAMES.get(self.0 as usize) {
            Some(name) => f.write_str(name),
            None => write!(f, "unknown({})", self.0),
        }
    }
}
