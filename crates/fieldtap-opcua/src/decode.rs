// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Variant decoding.
//!
//! Turns a server-reported [`Variant`] into a [`NormalizedValue`] that the
//! ingestion sink understands, or drops it.
//!
//! # Rules
//!
//! ```text
//! Variant                               NormalizedValue
//! ────────────────────────────────────  ──────────────────────────────
//! Empty                                 dropped
//! Array of (S)Byte/(U)IntNN/Float/Double FloatArray (element-wise f64)
//! Array of anything else                dropped
//! SByte / Byte                          String (non-printables as \uNNNN)
//! DateTime                              String "YYYY-MM-DD HH:MM:SS.ffffff+00:00"
//! Int16..UInt64                         Integer (i64)
//! Float / Double                        Float (f64)
//! anything else                         String (generic rendering)
//! ```
//!
//! The decoder holds no state; identical input always decodes identically.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::timestamp::to_utc;
use crate::types::{NodeId, QualifiedName};

// =============================================================================
// VariantType
// =============================================================================

/// Type tag of a [`Variant`] or of an array's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    /// No value.
    Empty,
    /// Boolean.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// String.
    String,
    /// Protocol timestamp.
    DateTime,
    /// GUID.
    Guid,
    /// Byte string.
    ByteString,
    /// Localized text.
    LocalizedText,
    /// Qualified name.
    QualifiedName,
    /// Node identity.
    NodeId,
    /// Status code.
    StatusCode,
    /// Heterogeneous element type (an array of variants).
    Variant,
}

impl VariantType {
    /// Returns `true` for the integer and floating point element types that
    /// arrays may decode from.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
        )
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A value reported by the server, tagged with its protocol type.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// Null value.
    Empty,
    /// Boolean.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// Signed 16-bit.
    Int16(i16),
    /// Unsigned 16-bit.
    UInt16(u16),
    /// Signed 32-bit.
    Int32(i32),
    /// Unsigned 32-bit.
    UInt32(u32),
    /// Signed 64-bit.
    Int64(i64),
    /// Unsigned 64-bit.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// String.
    String(String),
    /// Timestamp as 100ns ticks since 1601-01-01.
    DateTime(i64),
    /// GUID.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Localized text (text part only).
    LocalizedText(String),
    /// Qualified name.
    QualifiedName(QualifiedName),
    /// Node identity.
    NodeId(NodeId),
    /// Status code.
    StatusCode(u32),
    /// Array value.
    Array(VariantArray),
}

/// An array value with its declared element type.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantArray {
    /// Declared element type.
    pub element_type: VariantType,
    /// Elements.
    pub values: Vec<Variant>,
}

impl VariantArray {
    /// Creates an array with an explicit element type.
    pub fn new(element_type: VariantType, values: Vec<Variant>) -> Self {
        Self {
            element_type,
            values,
        }
    }
}

impl Variant {
    /// Returns the type tag. Arrays report their element type.
    pub fn variant_type(&self) -> VariantType {
        match self {
            Self::Empty => VariantType::Empty,
            Self::Boolean(_) => VariantType::Boolean,
            Self::SByte(_) => VariantType::SByte,
            Self::Byte(_) => VariantType::Byte,
            Self::Int16(_) => VariantType::Int16,
            Self::UInt16(_) => VariantType::UInt16,
            Self::Int32(_) => VariantType::Int32,
            Self::UInt32(_) => VariantType::UInt32,
            Self::Int64(_) => VariantType::Int64,
            Self::UInt64(_) => VariantType::UInt64,
            Self::Float(_) => VariantType::Float,
            Self::Double(_) => VariantType::Double,
            Self::String(_) => VariantType::String,
            Self::DateTime(_) => VariantType::DateTime,
            Self::Guid(_) => VariantType::Guid,
            Self::ByteString(_) => VariantType::ByteString,
            Self::LocalizedText(_) => VariantType::LocalizedText,
            Self::QualifiedName(_) => VariantType::QualifiedName,
            Self::NodeId(_) => VariantType::NodeId,
            Self::StatusCode(_) => VariantType::StatusCode,
            Self::Array(array) => array.element_type,
        }
    }

    /// Returns `true` for array values.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Builds a `Double` array.
    pub fn double_array(values: impl IntoIterator<Item = f64>) -> Self {
        Self::Array(VariantArray::new(
            VariantType::Double,
            values.into_iter().map(Self::Double).collect(),
        ))
    }
}

/// Generic string rendering, used for every type without a dedicated rule.
impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) | Self::LocalizedText(v) => f.write_str(v),
            Self::DateTime(ticks) => write!(f, "{}", to_utc(*ticks)),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => f.write_str(&BASE64.encode(v)),
            Self::QualifiedName(v) => write!(f, "{}", v),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::StatusCode(v) => write!(f, "0x{:08X}", v),
            Self::Array(array) => {
                f.write_str("[")?;
                for (i, value) in array.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")
            }
        }
    }
}

// =============================================================================
// NormalizedValue
// =============================================================================

/// A decoded value ready for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    /// 64-bit signed integer.
    Integer(i64),
    /// Double precision float.
    Float(f64),
    /// Sequence of doubles.
    FloatArray(Vec<f64>),
    /// Text.
    String(String),
}

impl NormalizedValue {
    /// Returns the kind name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::FloatArray(_) => "float_array",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::FloatArray(v) => write!(f, "{:?}", v),
            Self::String(v) => f.write_str(v),
        }
    }
}

// =============================================================================
// Decode Outcome
// =============================================================================

/// Why a value produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The value was null.
    Null,
    /// The array's element type cannot be decoded.
    UnsupportedArray(VariantType),
    /// An element did not match the array's numeric element type.
    ElementMismatch(VariantType),
    /// An unsigned 64-bit value exceeded `i64::MAX` under [`IntegerOverflow::Drop`].
    IntegerOverflow(u64),
    /// A timestamp outside the representable calendar range.
    InvalidTimestamp(i64),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null value"),
            Self::UnsupportedArray(t) => write!(f, "unsupported array element type {}", t),
            Self::ElementMismatch(t) => write!(f, "array element of type {} is not numeric", t),
            Self::IntegerOverflow(v) => write!(f, "unsigned value {} exceeds i64", v),
            Self::InvalidTimestamp(t) => write!(f, "timestamp {} out of range", t),
        }
    }
}

/// Result of decoding one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A value to emit.
    Value(NormalizedValue),
    /// Nothing to emit.
    Dropped(DropReason),
}

impl Decoded {
    /// Returns the value, if any.
    pub fn into_value(self) -> Option<NormalizedValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Dropped(_) => None,
        }
    }

    /// Returns `true` if the value was dropped.
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

// =============================================================================
// IntegerOverflow
// =============================================================================

/// Handling of unsigned 64-bit values above `i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerOverflow {
    /// Reinterpret the bits (`u64 as i64`).
    #[default]
    Wrap,
    /// Clamp to `i64::MAX`.
    Saturate,
    /// Drop the event.
    Drop,
}

impl fmt::Display for IntegerOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wrap => "wrap",
            Self::Saturate => "saturate",
            Self::Drop => "drop",
        };
        f.write_str(s)
    }
}

impl FromStr for IntegerOverflow {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wrap" => Ok(Self::Wrap),
            "saturate" => Ok(Self::Saturate),
            "drop" => Ok(Self::Drop),
            _ => Err(ConfigurationError::invalid_value("integerOverflow", s)),
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecoderOptions {
    /// Handling of `UInt64` values above `i64::MAX`.
    #[serde(default)]
    pub integer_overflow: IntegerOverflow,
}

// =============================================================================
// VariantDecoder
// =============================================================================

/// Stateless [`Variant`] to [`NormalizedValue`] decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantDecoder {
    options: DecoderOptions,
}

impl VariantDecoder {
    /// Creates a decoder with the given options.
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }

    /// Returns the decoder options.
    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Decodes a value.
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldtap_opcua::decode::{Decoded, NormalizedValue, Variant, VariantDecoder};
    ///
    /// let decoder = VariantDecoder::default();
    /// assert_eq!(
    ///     decoder.decode(&Variant::SByte(7)),
    ///     Decoded::Value(NormalizedValue::String("\\u0007".into()))
    /// );
    /// assert!(decoder.decode(&Variant::Empty).is_dropped());
    /// ```
    pub fn decode(&self, value: &Variant) -> Decoded {
        match value {
            Variant::Empty => Decoded::Dropped(DropReason::Null),
            Variant::Array(array) => self.decode_array(array),
            scalar => self.decode_scalar(scalar),
        }
    }

    fn decode_array(&self, array: &VariantArray) -> Decoded {
        if !array.element_type.is_numeric() {
            return Decoded::Dropped(DropReason::UnsupportedArray(array.element_type));
        }

        let mut out = Vec::with_capacity(array.values.len());
        for element in &array.values {
            match numeric_as_f64(element) {
                Some(v) => out.push(v),
                None => return Decoded::Dropped(DropReason::ElementMismatch(element.variant_type())),
            }
        }
        Decoded::Value(NormalizedValue::FloatArray(out))
    }

    fn decode_scalar(&self, value: &Variant) -> Decoded {
        let normalized = match value {
            Variant::SByte(v) => NormalizedValue::String(render_byte(i32::from(*v))),
            Variant::Byte(v) => NormalizedValue::String(render_byte(i32::from(*v))),
            Variant::DateTime(ticks) => match to_utc(*ticks).format() {
                Some(s) => NormalizedValue::String(s),
                None => return Decoded::Dropped(DropReason::InvalidTimestamp(*ticks)),
            },
            Variant::Int16(v) => NormalizedValue::Integer(i64::from(*v)),
            Variant::UInt16(v) => NormalizedValue::Integer(i64::from(*v)),
            Variant::Int32(v) => NormalizedValue::Integer(i64::from(*v)),
            Variant::UInt32(v) => NormalizedValue::Integer(i64::from(*v)),
            Variant::Int64(v) => NormalizedValue::Integer(*v),
            Variant::UInt64(v) => match self.widen_u64(*v) {
                Some(i) => NormalizedValue::Integer(i),
                None => return Decoded::Dropped(DropReason::IntegerOverflow(*v)),
            },
            Variant::Float(v) => NormalizedValue::Float(f64::from(*v)),
            Variant::Double(v) => NormalizedValue::Float(*v),
            other => NormalizedValue::String(other.to_string()),
        };
        Decoded::Value(normalized)
    }

    fn widen_u64(&self, value: u64) -> Option<i64> {
        match i64::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => match self.options.integer_overflow {
                IntegerOverflow::Wrap => Some(value as i64),
                IntegerOverflow::Saturate => Some(i64::MAX),
                IntegerOverflow::Drop => None,
            },
        }
    }
}

/// Decodes with default options.
pub fn decode(value: &Variant) -> Decoded {
    VariantDecoder::default().decode(value)
}

/// Widens one numeric array element.
fn numeric_as_f64(value: &Variant) -> Option<f64> {
    match value {
        Variant::SByte(v) => Some(f64::from(*v)),
        Variant::Byte(v) => Some(f64::from(*v)),
        Variant::Int16(v) => Some(f64::from(*v)),
        Variant::UInt16(v) => Some(f64::from(*v)),
        Variant::Int32(v) => Some(f64::from(*v)),
        Variant::UInt32(v) => Some(f64::from(*v)),
        Variant::Int64(v) => Some(*v as f64),
        Variant::UInt64(v) => Some(*v as f64),
        Variant::Float(v) => Some(f64::from(*v)),
        Variant::Double(v) => Some(*v),
        _ => None,
    }
}

/// Renders a byte as its character, escaping non-printables as `\u` plus the
/// four-digit decimal ordinal.
fn render_byte(ordinal: i32) -> String {
    match u8::try_from(ordinal) {
        Ok(b) if is_printable(b) => char::from(b).to_string(),
        _ => format!("\\u{:04}", ordinal),
    }
}

#[inline]
fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: &Variant) -> NormalizedValue {
        decode(v).into_value().expect("value should decode")
    }

    #[test]
    fn test_null_is_dropped() {
        assert_eq!(decode(&Variant::Empty), Decoded::Dropped(DropReason::Null));
    }

    #[test]
    fn test_bell_sbyte_is_escaped() {
        assert_eq!(value(&Variant::SByte(7)), NormalizedValue::String("\\u0007".into()));
    }

    #[test]
    fn test_printable_byte_unchanged() {
        assert_eq!(value(&Variant::Byte(b'A')), NormalizedValue::String("A".into()));
        assert_eq!(value(&Variant::SByte(b'z' as i8)), NormalizedValue::String("z".into()));
    }

    #[test]
    fn test_high_and_negative_bytes() {
        assert_eq!(value(&Variant::Byte(200)), NormalizedValue::String("\\u0200".into()));
        assert_eq!(value(&Variant::SByte(-1)), NormalizedValue::String("\\u-001".into()));
        assert_eq!(value(&Variant::Byte(127)), NormalizedValue::String("\\u0127".into()));
    }

    #[test]
    fn test_integers_widen() {
        assert_eq!(value(&Variant::Int16(-5)), NormalizedValue::Integer(-5));
        assert_eq!(value(&Variant::UInt16(65535)), NormalizedValue::Integer(65535));
        assert_eq!(value(&Variant::Int32(i32::MIN)), NormalizedValue::Integer(i32::MIN as i64));
        assert_eq!(value(&Variant::UInt32(u32::MAX)), NormalizedValue::Integer(u32::MAX as i64));
        assert_eq!(value(&Variant::Int64(i64::MAX)), NormalizedValue::Integer(i64::MAX));
        assert_eq!(value(&Variant::UInt64(42)), NormalizedValue::Integer(42));
    }

    #[test]
    fn test_u64_overflow_policies() {
        let big = Variant::UInt64(u64::MAX);
        assert_eq!(value(&big), NormalizedValue::Integer(-1));

        let saturate = VariantDecoder::new(DecoderOptions {
            integer_overflow: IntegerOverflow::Saturate,
        });
        assert_eq!(
            saturate.decode(&big),
            Decoded::Value(NormalizedValue::Integer(i64::MAX))
        );

        let drop = VariantDecoder::new(DecoderOptions {
            integer_overflow: IntegerOverflow::Drop,
        });
        assert_eq!(
            drop.decode(&big),
            Decoded::Dropped(DropReason::IntegerOverflow(u64::MAX))
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(value(&Variant::Float(1.5)), NormalizedValue::Float(1.5));
        assert_eq!(value(&Variant::Double(-2.25)), NormalizedValue::Float(-2.25));
    }

    #[test]
    fn test_datetime_formatting() {
        let ticks = crate::timestamp::from_utc(crate::timestamp::UtcTimestamp::new(1_704_164_645, 678_901));
        assert_eq!(
            value(&Variant::DateTime(ticks)),
            NormalizedValue::String("2024-01-02 03:04:05.678901+00:00".into())
        );
    }

    #[test]
    fn test_numeric_arrays() {
        let ints = Variant::Array(VariantArray::new(
            VariantType::Int32,
            vec![Variant::Int32(1), Variant::Int32(-2)],
        ));
        assert_eq!(value(&ints), NormalizedValue::FloatArray(vec![1.0, -2.0]));

        let bytes = Variant::Array(VariantArray::new(
            VariantType::Byte,
            vec![Variant::Byte(7), Variant::Byte(255)],
        ));
        assert_eq!(value(&bytes), NormalizedValue::FloatArray(vec![7.0, 255.0]));

        assert_eq!(
            value(&Variant::double_array(Vec::new())),
            NormalizedValue::FloatArray(Vec::new())
        );
    }

    #[test]
    fn test_unsupported_arrays_dropped() {
        let strings = Variant::Array(VariantArray::new(
            VariantType::String,
            vec![Variant::String("a".into())],
        ));
        assert_eq!(
            decode(&strings),
            Decoded::Dropped(DropReason::UnsupportedArray(VariantType::String))
        );

        let mixed = Variant::Array(VariantArray::new(
            VariantType::Double,
            vec![Variant::Double(1.0), Variant::Boolean(true)],
        ));
        assert!(decode(&mixed).is_dropped());
    }

    #[test]
    fn test_generic_rendering() {
        assert_eq!(value(&Variant::Boolean(true)), NormalizedValue::String("true".into()));
        assert_eq!(
            value(&Variant::String("hello".into())),
            NormalizedValue::String("hello".into())
        );
        assert_eq!(
            value(&Variant::NodeId(NodeId::numeric(2, 7))),
            NormalizedValue::String("ns=2;i=7".into())
        );
        assert_eq!(
            value(&Variant::StatusCode(0x8034_0000)),
            NormalizedValue::String("0x80340000".into())
        );
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let v = Variant::Array(VariantArray::new(
            VariantType::Float,
            vec![Variant::Float(0.5), Variant::Float(2.0)],
        ));
        assert_eq!(decode(&v), decode(&v));
    }

    #[test]
    fn test_overflow_from_str() {
        assert_eq!("Saturate".parse::<IntegerOverflow>().unwrap(), IntegerOverflow::Saturate);
        assert!("clamp".parse::<IntegerOverflow>().is_err());
    }
}
