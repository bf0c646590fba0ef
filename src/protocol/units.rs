//! Physical value conversions
//!
//! The controller uses two fixed-point conventions that must not be mixed:
//!
//! | Scale | Used by | Length | Angle |
//! |---|---|---|---|
//! | [`ControlScale`] | 0x40 seat control, 0x60..0x63 profiles | cm × 100 | deg × 100 |
//! | [`TelemetryScale`] | 0x20..0x22 targets, 0x30..0x32 current | cm × 10 (mm) | milliradians |
//!
//! Conversions round to the nearest raw unit and fail with `InvalidValue`
//! when the result does not fit the wire type.

use crate::constants::{SEAT_HEIGHT_RANGE_CM, SEAT_INCLINE_RANGE_DEG, SEAT_SLIDE_RANGE_CM};
use crate::error::{Result, SeatLinkError};
use serde::{Deserialize, Serialize};
use std::fmt;

fn to_raw<T: TryFrom<i64>>(field: &'static str, value: f64, factor: f64) -> Result<T> {
    let scaled = (value * factor).round();
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
        return Err(SeatLinkError::InvalidValue {
            field,
            reason: format!("{} is not representable", value),
        });
    }
    T::try_from(scaled as i64).map_err(|_| SeatLinkError::InvalidValue {
        field,
        reason: format!("{} does not fit the wire field", value),
    })
}

/// Control-request scale: cm × 100, degrees × 100, unsigned 16-bit
pub struct ControlScale;

impl ControlScale {
    pub fn length_to_raw(field: &'static str, cm: f64) -> Result<u16> {
        to_raw(field, cm, 100.0)
    }

    pub fn length_from_raw(raw: u16) -> f64 {
        raw as f64 / 100.0
    }

    pub fn angle_to_raw(field: &'static str, deg: f64) -> Result<u16> {
        to_raw(field, deg, 100.0)
    }

    pub fn angle_from_raw(raw: u16) -> f64 {
        raw as f64 / 100.0
    }
}

/// Telemetry scale: cm × 10 (millimetres) unsigned, milliradians signed
pub struct TelemetryScale;

impl TelemetryScale {
    pub fn length_to_raw(field: &'static str, cm: f64) -> Result<u16> {
        to_raw(field, cm, 10.0)
    }

    pub fn length_from_raw(raw: u16) -> f64 {
        raw as f64 / 10.0
    }

    pub fn angle_to_raw(field: &'static str, deg: f64) -> Result<i16> {
        to_raw(field, deg.to_radians(), 1000.0)
    }

    pub fn angle_from_raw(raw: i16) -> f64 {
        (raw as f64 / 1000.0).to_degrees()
    }
}

/// Seat axis addressed by the per-axis telemetry commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatAxis {
    Height,
    Slide,
    Incline,
}

impl SeatAxis {
    pub const ALL: [SeatAxis; 3] = [Self::Height, Self::Slide, Self::Incline];

    pub fn name(self) -> &'static str {
        match self {
            Self::Height => "height",
            Self::Slide => "slide",
            Self::Incline => "incline",
        }
    }

    /// Physical unit of the value passed in and out of this module
    pub fn unit(self) -> &'static str {
        match self {
            Self::Height | Self::Slide => "cm",
            Self::Incline => "deg",
        }
    }

    /// Encode a physical value as a 2-byte telemetry field
    pub fn telemetry_bytes(self, value: f64) -> Result<[u8; 2]> {
        match self {
            Self::Height | Self::Slide => {
                Ok(TelemetryScale::length_to_raw(self.name(), value)?.to_le_bytes())
            }
            Self::Incline => Ok(TelemetryScale::angle_to_raw(self.name(), value)?.to_le_bytes()),
        }
    }

    /// Decode a 2-byte telemetry field into a physical value
    pub fn telemetry_value(self, bytes: [u8; 2]) -> f64 {
        match self {
            Self::Height | Self::Slide => TelemetryScale::length_from_raw(u16::from_le_bytes(bytes)),
            Self::Incline => TelemetryScale::angle_from_raw(i16::from_le_bytes(bytes)),
        }
    }
}

impl std::str::FromStr for SeatAxis {
    type Err = SeatLinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "height" | "h" => Ok(Self::Height),
            "slide" | "s" => Ok(Self::Slide),
            "incline" | "i" => Ok(Self::Incline),
            _ => Err(SeatLinkError::InvalidValue {
                field: "axis",
                reason: format!("unknown axis '{}'", s),
            }),
        }
    }
}

/// Seat position in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeatPosition {
    pub height_cm: f64,
    pub slide_cm: f64,
    pub incline_deg: f64,
}

impl SeatPosition {
    pub fn new(height_cm: f64, slide_cm: f64, incline_deg: f64) -> Self {
        Self {
            height_cm,
            slide_cm,
            incline_deg,
        }
    }

    /// Check every axis against the calibrated bounds
    pub fn validate(&self) -> Result<()> {
        check_range("height", self.height_cm, SEAT_HEIGHT_RANGE_CM)?;
        check_range("slide", self.slide_cm, SEAT_SLIDE_RANGE_CM)?;
        check_range("incline", self.incline_deg, SEAT_INCLINE_RANGE_DEG)
    }

    /// Control-scale raw values `[height, slide, incline]`
    pub fn to_control_raw(&self) -> Result<[u16; 3]> {
        Ok([
            ControlScale::length_to_raw("height", self.height_cm)?,
            ControlScale::length_to_raw("slide", self.slide_cm)?,
            ControlScale::angle_to_raw("incline", self.incline_deg)?,
        ])
    }

    pub fn from_control_raw(raw: [u16; 3]) -> Self {
        Self::new(
            ControlScale::length_from_raw(raw[0]),
            ControlScale::length_from_raw(raw[1]),
            ControlScale::angle_from_raw(raw[2]),
        )
    }

    /// Append the three control-scale fields little-endian
    pub fn write_control(&self, out: &mut Vec<u8>) -> Result<()> {
        for raw in self.to_control_raw()? {
            out.extend_from_slice(&raw.to_le_bytes());
        }
        Ok(())
    }
}

impl fmt::Display for SeatPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "H={}cm S={}cm I={}°",
            self.height_cm, self.slide_cm, self.incline_deg
        )
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SeatLinkError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
