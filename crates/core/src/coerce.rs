use std::fmt;
use std::sync::Arc;

use crate::error::CoreError;
use crate::timestamp::{self, Timestamp};
use crate::value::NativeValue;

/// The typed getter a caller reads a column through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Byte,
    Short,
    Int,
    Long,
    Boolean,
    Float,
    Double,
    String,
    Bytes,
    Object,
    Timestamp,
}

impl AccessorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Object => "object",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for AccessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boxed value as handed out by the generic accessor, or accepted by the
/// generic setter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlObject {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Boolean(bool),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Arc<[u8]>),
    Timestamp(Timestamp),
}

impl SqlObject {
    /// Storage form of a boxed value. Booleans store as 1/0, floats widen.
    pub fn to_native(&self) -> NativeValue {
        match self {
            Self::Byte(v) => NativeValue::Integer(i64::from(*v)),
            Self::Short(v) => NativeValue::Integer(i64::from(*v)),
            Self::Int(v) => NativeValue::Integer(i64::from(*v)),
            Self::Long(v) => NativeValue::Integer(*v),
            Self::Boolean(v) => NativeValue::Integer(i64::from(*v)),
            Self::Float(v) => NativeValue::Real(f64::from(*v)),
            Self::Double(v) => NativeValue::Real(*v),
            Self::String(v) => NativeValue::Text(v.clone()),
            Self::Bytes(v) => NativeValue::Blob(Arc::clone(v)),
            Self::Timestamp(v) => timestamp::encode(v),
        }
    }
}

/// Result of a coercion, one variant per accessor type.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Boolean(bool),
    Float(f32),
    Double(f64),
    String(Option<String>),
    Bytes(Option<Vec<u8>>),
    Object(Option<SqlObject>),
    Timestamp(Option<Timestamp>),
}

/// A Rust type readable from a stored cell.
///
/// Numeric and boolean targets read NULL as their zero value; the
/// `Option` targets read it as `None`. NULL-ness itself is reported
/// out of band by [`coerce`] and by the result reader.
pub trait FromNative: Sized {
    const ACCESSOR: AccessorType;

    fn from_native(value: &NativeValue) -> Result<Self, CoreError>;
}

/// Convert `value` to `target`, reporting whether the stored cell was NULL.
pub fn coerce(value: &NativeValue, target: AccessorType) -> Result<(CoercedValue, bool), CoreError> {
    let coerced = match target {
        AccessorType::Byte => CoercedValue::Byte(i8::from_native(value)?),
        AccessorType::Short => CoercedValue::Short(i16::from_native(value)?),
        AccessorType::Int => CoercedValue::Int(i32::from_native(value)?),
        AccessorType::Long => CoercedValue::Long(i64::from_native(value)?),
        AccessorType::Boolean => CoercedValue::Boolean(bool::from_native(value)?),
        AccessorType::Float => CoercedValue::Float(f32::from_native(value)?),
        AccessorType::Double => CoercedValue::Double(f64::from_native(value)?),
        AccessorType::String => CoercedValue::String(FromNative::from_native(value)?),
        AccessorType::Bytes => CoercedValue::Bytes(FromNative::from_native(value)?),
        AccessorType::Object => CoercedValue::Object(FromNative::from_native(value)?),
        AccessorType::Timestamp => CoercedValue::Timestamp(FromNative::from_native(value)?),
    };
    Ok((coerced, value.is_null()))
}

fn mismatch(value: &NativeValue, target: AccessorType, detail: impl Into<String>) -> CoreError {
    CoreError::Coercion {
        stored: value.type_name(),
        target,
        detail: detail.into(),
    }
}

/// Integral reading shared by every integer accessor; narrower targets
/// truncate the result with `as`.
fn to_long(value: &NativeValue, target: AccessorType) -> Result<i64, CoreError> {
    match value {
        NativeValue::Null => Ok(0),
        NativeValue::Integer(n) => Ok(*n),
        NativeValue::Real(r) => Ok(*r as i64),
        NativeValue::Text(s) => parse_long(s).ok_or_else(|| mismatch(value, target, format!("'{s}' is not numeric"))),
        NativeValue::Blob(_) => Err(mismatch(value, target, "blob is not numeric")),
    }
}

fn parse_long(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    s.parse::<f64>().ok().filter(|r| r.is_finite()).map(|r| r as i64)
}

fn to_double(value: &NativeValue, target: AccessorType) -> Result<f64, CoreError> {
    match value {
        NativeValue::Null => Ok(0.0),
        NativeValue::Integer(n) => Ok(*n as f64),
        NativeValue::Real(r) => Ok(*r),
        NativeValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(value, target, format!("'{s}' is not numeric"))),
        NativeValue::Blob(_) => Err(mismatch(value, target, "blob is not numeric")),
    }
}

/// Text form of a real, keeping a trailing `.0` on integral values.
fn format_real(r: f64) -> String {
    if r.is_finite() && r.fract() == 0.0 && r.abs() < 1e15 {
        format!("{r:.1}")
    } else {
        format!("{r}")
    }
}

macro_rules! narrow_from_long {
    ($ty:ty, $accessor:ident) => {
        impl FromNative for $ty {
            const ACCESSOR: AccessorType = AccessorType::$accessor;

            fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
                Ok(to_long(value, Self::ACCESSOR)? as $ty)
            }
        }
    };
}

narrow_from_long!(i8, Byte);
narrow_from_long!(i16, Short);
narrow_from_long!(i32, Int);
narrow_from_long!(i64, Long);

impl FromNative for bool {
    const ACCESSOR: AccessorType = AccessorType::Boolean;

    // True only for a stored value of exactly 1.
    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        match value {
            NativeValue::Null => Ok(false),
            NativeValue::Integer(n) => Ok(*n == 1),
            NativeValue::Real(r) => Ok(*r == 1.0),
            NativeValue::Text(s) => {
                let t = s.trim();
                if t.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if t.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    parse_long(t)
                        .map(|n| n == 1)
                        .ok_or_else(|| mismatch(value, Self::ACCESSOR, format!("'{s}' is not a boolean")))
                }
            }
            NativeValue::Blob(_) => Err(mismatch(value, Self::ACCESSOR, "blob is not a boolean")),
        }
    }
}

impl FromNative for f32 {
    const ACCESSOR: AccessorType = AccessorType::Float;

    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        match value {
            NativeValue::Text(s) => s
                .trim()
                .parse::<f32>()
                .map_err(|_| mismatch(value, Self::ACCESSOR, format!("'{s}' is not numeric"))),
            _ => Ok(to_double(value, Self::ACCESSOR)? as f32),
        }
    }
}

impl FromNative for f64 {
    const ACCESSOR: AccessorType = AccessorType::Double;

    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        to_double(value, Self::ACCESSOR)
    }
}

impl FromNative for Option<String> {
    const ACCESSOR: AccessorType = AccessorType::String;

    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        match value {
            NativeValue::Null => Ok(None),
            NativeValue::Integer(n) => Ok(Some(n.to_string())),
            NativeValue::Real(r) => Ok(Some(format_real(*r))),
            NativeValue::Text(s) => Ok(Some(s.clone())),
            NativeValue::Blob(b) => String::from_utf8(b.to_vec())
                .map(Some)
                .map_err(|e| mismatch(value, Self::ACCESSOR, e.to_string())),
        }
    }
}

impl FromNative for Option<Vec<u8>> {
    const ACCESSOR: AccessorType = AccessorType::Bytes;

    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        match value {
            NativeValue::Null => Ok(None),
            NativeValue::Blob(b) => Ok(Some(b.to_vec())),
            NativeValue::Text(s) => Ok(Some(s.as_bytes().to_vec())),
            NativeValue::Integer(n) => Ok(Some(n.to_string().into_bytes())),
            NativeValue::Real(r) => Ok(Some(format_real(*r).into_bytes())),
        }
    }
}

impl FromNative for Option<SqlObject> {
    const ACCESSOR: AccessorType = AccessorType::Object;

    // Integers box as Int when they fit in 32 bits. Reals box as Float:
    // the generic accessor hands back the width a float column was bound
    // with, even though the engine widened it to 64 bits.
    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        Ok(match value {
            NativeValue::Null => None,
            NativeValue::Integer(n) => Some(match i32::try_from(*n) {
                Ok(v) => SqlObject::Int(v),
                Err(_) => SqlObject::Long(*n),
            }),
            NativeValue::Real(r) => Some(SqlObject::Float(*r as f32)),
            NativeValue::Text(s) => Some(SqlObject::String(s.clone())),
            NativeValue::Blob(b) => Some(SqlObject::Bytes(Arc::clone(b))),
        })
    }
}

impl FromNative for Option<Timestamp> {
    const ACCESSOR: AccessorType = AccessorType::Timestamp;

    fn from_native(value: &NativeValue) -> Result<Self, CoreError> {
        match value {
            NativeValue::Null => Ok(None),
            NativeValue::Real(_) | NativeValue::Blob(_) => {
                Err(mismatch(value, Self::ACCESSOR, "not a timestamp representation"))
            }
            _ => timestamp::decode(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn null_reads_as_zero_and_reports_null() {
        let null = NativeValue::Null;
        let cases = [
            (AccessorType::Byte, CoercedValue::Byte(0)),
            (AccessorType::Short, CoercedValue::Short(0)),
            (AccessorType::Int, CoercedValue::Int(0)),
            (AccessorType::Long, CoercedValue::Long(0)),
            (AccessorType::Boolean, CoercedValue::Boolean(false)),
            (AccessorType::Float, CoercedValue::Float(0.0)),
            (AccessorType::Double, CoercedValue::Double(0.0)),
            (AccessorType::String, CoercedValue::String(None)),
            (AccessorType::Bytes, CoercedValue::Bytes(None)),
            (AccessorType::Object, CoercedValue::Object(None)),
            (AccessorType::Timestamp, CoercedValue::Timestamp(None)),
        ];
        for (target, expected) in cases {
            let (got, was_null) = coerce(&null, target).unwrap();
            assert_eq!(got, expected, "target {target}");
            assert!(was_null, "target {target}");
        }
    }

    #[test]
    fn integer_narrowing_truncates() {
        let stored = NativeValue::Integer(23_423_525_322);
        assert_eq!(i32::from_native(&stored).unwrap(), 23_423_525_322_i64 as i32);
        assert_eq!(i16::from_native(&stored).unwrap(), 23_423_525_322_i64 as i16);
        assert_eq!(i8::from_native(&stored).unwrap(), 23_423_525_322_i64 as i8);

        let (coerced, was_null) = coerce(&NativeValue::Integer(421), AccessorType::Short).unwrap();
        assert_eq!(coerced, CoercedValue::Short(421));
        assert!(!was_null);
    }

    #[test]
    fn randomized_narrowing_matches_casts() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let n: i64 = rng.r#gen();
            let stored = NativeValue::Integer(n);
            assert_eq!(i8::from_native(&stored).unwrap(), n as i8);
            assert_eq!(i16::from_native(&stored).unwrap(), n as i16);
            assert_eq!(i32::from_native(&stored).unwrap(), n as i32);
            assert_eq!(i64::from_native(&stored).unwrap(), n);
        }
    }

    #[test]
    fn boolean_requires_exactly_one() {
        assert!(bool::from_native(&NativeValue::Integer(1)).unwrap());
        assert!(!bool::from_native(&NativeValue::Integer(0)).unwrap());
        assert!(!bool::from_native(&NativeValue::Integer(2)).unwrap());
        assert!(!bool::from_native(&NativeValue::Integer(-1)).unwrap());
        assert!(bool::from_native(&NativeValue::Text("TRUE".into())).unwrap());
        assert!(bool::from_native(&NativeValue::Text("1".into())).unwrap());
    }

    #[test]
    fn real_truncates_toward_zero() {
        assert_eq!(i32::from_native(&NativeValue::Real(-7.9)).unwrap(), -7);
        assert_eq!(i64::from_native(&NativeValue::Real(7.9)).unwrap(), 7);
    }

    #[test]
    fn real_object_is_boxed_as_float() {
        let stored = NativeValue::Real(f64::from(324_235.0_f32));
        let object = Option::<SqlObject>::from_native(&stored).unwrap();
        assert_eq!(object, Some(SqlObject::Float(324_235.0)));
        assert_eq!(f64::from_native(&stored).unwrap(), 324_235.0);
    }

    #[test]
    fn integer_object_boxes_by_width() {
        let small = Option::<SqlObject>::from_native(&NativeValue::Integer(12551)).unwrap();
        assert_eq!(small, Some(SqlObject::Int(12551)));
        let large = Option::<SqlObject>::from_native(&NativeValue::Integer(23_423_525_322)).unwrap();
        assert_eq!(large, Some(SqlObject::Long(23_423_525_322)));
    }

    #[test]
    fn numeric_text_parses() {
        assert_eq!(i32::from_native(&NativeValue::Text(" 42 ".into())).unwrap(), 42);
        assert_eq!(i32::from_native(&NativeValue::Text("12.75".into())).unwrap(), 12);
        assert_eq!(f64::from_native(&NativeValue::Text("1.5".into())).unwrap(), 1.5);
    }

    #[test]
    fn non_numeric_text_is_a_coercion_error() {
        let stored = NativeValue::Text("test".into());
        match i32::from_native(&stored) {
            Err(CoreError::Coercion { stored, target, .. }) => {
                assert_eq!(stored, "text");
                assert_eq!(target, AccessorType::Int);
            }
            other => panic!("expected Coercion, got {other:?}"),
        }
        assert!(f64::from_native(&stored).is_err());
        assert!(bool::from_native(&stored).is_err());
    }

    #[test]
    fn blob_is_not_numeric() {
        let stored = NativeValue::from(vec![1u8, 2, 3]);
        assert!(i64::from_native(&stored).is_err());
        assert_eq!(Option::<Vec<u8>>::from_native(&stored).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn numbers_read_as_text() {
        assert_eq!(Option::<String>::from_native(&NativeValue::Integer(7)).unwrap().as_deref(), Some("7"));
        assert_eq!(Option::<String>::from_native(&NativeValue::Real(2.0)).unwrap().as_deref(), Some("2.0"));
        assert_eq!(Option::<String>::from_native(&NativeValue::Real(0.5)).unwrap().as_deref(), Some("0.5"));
    }

    #[test]
    fn boxed_values_store_as_native() {
        assert_eq!(SqlObject::Boolean(true).to_native(), NativeValue::Integer(1));
        assert_eq!(SqlObject::Boolean(false).to_native(), NativeValue::Integer(0));
        assert_eq!(SqlObject::Byte(-3).to_native(), NativeValue::Integer(-3));
        assert_eq!(SqlObject::Float(1.5).to_native(), NativeValue::Real(1.5));
    }
}
