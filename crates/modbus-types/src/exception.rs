//! # Exception Responses
//!
//! A Modbus server signals failure by echoing the request's function code
//! with the high bit set, followed by a one-byte exception code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit set on the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Exception codes defined by the Modbus application protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetDeviceFailedToRespond,
    /// Code outside the published table.
    Unknown(u8),
}

impl ExceptionCode {
    /// Short human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => "illegal function",
            Self::IllegalDataAddress => "illegal data address",
            Self::IllegalDataValue => "illegal data value",
            Self::ServerDeviceFailure => "server device failure",
            Self::Acknowledge => "acknowledge",
            Self::ServerDeviceBusy => "server device busy",
            Self::MemoryParityError => "memory parity error",
            Self::GatewayPathUnavailable => "gateway path unavailable",
            Self::GatewayTargetDeviceFailedToRespond => "gateway target device failed to respond",
            Self::Unknown(_) => "unknown exception",
        }
    }
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetDeviceFailedToRespond,
            other => Self::Unknown(other),
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(code: ExceptionCode) -> Self {
        match code {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetDeviceFailedToRespond => 0x0B,
            ExceptionCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), u8::from(*self))
    }
}

/// Decoded exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExceptionResponse {
    /// Function code of the failed request, exception flag cleared.
    pub function_code: u8,
    /// Reason reported by the server.
    pub exception_code: ExceptionCode,
}

impl ExceptionResponse {
    pub fn new(function_code: u8, exception_code: ExceptionCode) -> Self {
        Self {
            function_code: function_code & !EXCEPTION_FLAG,
            exception_code,
        }
    }

    /// Build from the raw bytes of an exception PDU.
    pub fn from_wire(function_code: u8, exception_code: u8) -> Self {
        Self::new(function_code, ExceptionCode::from(exception_code))
    }

    /// Function code as it appears on the wire, exception flag set.
    pub fn wire_function_code(&self) -> u8 {
        self.function_code | EXCEPTION_FLAG
    }

    /// Whether a raw function code marks an exception response.
    pub fn is_exception_function(function_code: u8) -> bool {
        function_code & EXCEPTION_FLAG != 0
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function 0x{:02X} failed: {}",
            self.function_code, self.exception_code
        )
    }
}
