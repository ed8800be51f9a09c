//! Typed contiguous array leaves for the attribute tree.
//!
//! Array payloads are reference-counted slices so that "external" views and
//! chunk wrappers share one allocation instead of copying; cloning an
//! [`Array`] is a cheap `Arc` bump.

use std::sync::Arc;

use crate::error::MeshRepartError;

/// Element type of an [`Array`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub const fn as_str(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Size of one element in bytes.
    pub const fn elem_bytes(self) -> usize {
        match self {
            DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => DType::Int8,
            1 => DType::Int16,
            2 => DType::Int32,
            3 => DType::Int64,
            4 => DType::UInt8,
            5 => DType::UInt16,
            6 => DType::UInt32,
            7 => DType::UInt64,
            8 => DType::Float32,
            9 => DType::Float64,
            _ => return None,
        })
    }

    pub const fn code(self) -> u8 {
        match self {
            DType::Int8 => 0,
            DType::Int16 => 1,
            DType::Int32 => 2,
            DType::Int64 => 3,
            DType::UInt8 => 4,
            DType::UInt16 => 5,
            DType::UInt32 => 6,
            DType::UInt64 => 7,
            DType::Float32 => 8,
            DType::Float64 => 9,
        }
    }
}

/// A typed contiguous array leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    Int8(Arc<[i8]>),
    Int16(Arc<[i16]>),
    Int32(Arc<[i32]>),
    Int64(Arc<[i64]>),
    UInt8(Arc<[u8]>),
    UInt16(Arc<[u16]>),
    UInt32(Arc<[u32]>),
    UInt64(Arc<[u64]>),
    Float32(Arc<[f32]>),
    Float64(Arc<[f64]>),
}

/// Expand `$body` once per dtype variant, binding the payload slice to `$s`.
macro_rules! with_slice {
    ($arr:expr, $s:ident => $body:expr) => {
        match $arr {
            Array::Int8($s) => $body,
            Array::Int16($s) => $body,
            Array::Int32($s) => $body,
            Array::Int64($s) => $body,
            Array::UInt8($s) => $body,
            Array::UInt16($s) => $body,
            Array::UInt32($s) => $body,
            Array::UInt64($s) => $body,
            Array::Float32($s) => $body,
            Array::Float64($s) => $body,
        }
    };
}

impl Array {
    pub fn dtype(&self) -> DType {
        match self {
            Array::Int8(_) => DType::Int8,
            Array::Int16(_) => DType::Int16,
            Array::Int32(_) => DType::Int32,
            Array::Int64(_) => DType::Int64,
            Array::UInt8(_) => DType::UInt8,
            Array::UInt16(_) => DType::UInt16,
            Array::UInt32(_) => DType::UInt32,
            Array::UInt64(_) => DType::UInt64,
            Array::Float32(_) => DType::Float32,
            Array::Float64(_) => DType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        with_slice!(self, s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `i` converted to `f64`.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    pub fn f64_at(&self, i: usize) -> f64 {
        with_slice!(self, s => s[i] as f64)
    }

    /// Value at `i` converted to `i64` (lossy for large `u64`).
    pub fn i64_at(&self, i: usize) -> i64 {
        with_slice!(self, s => s[i] as i64)
    }

    /// Value at `i` converted to `u64` (lossy for negatives).
    pub fn u64_at(&self, i: usize) -> u64 {
        with_slice!(self, s => s[i] as u64)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_slice!(self, s => s.iter().map(|&v| v as f64).collect())
    }

    pub fn to_i64_vec(&self) -> Vec<i64> {
        with_slice!(self, s => s.iter().map(|&v| v as i64).collect())
    }

    pub fn to_u64_vec(&self) -> Vec<u64> {
        with_slice!(self, s => s.iter().map(|&v| v as u64).collect())
    }

    /// Gather `self[ids[..]]` into a new array of the same dtype.
    ///
    /// # Panics
    /// Panics if any id is out of bounds; callers validate ids first.
    pub fn gather(&self, ids: &[u64]) -> Array {
        match self {
            Array::Int8(s) => gather_typed(s, ids).into(),
            Array::Int16(s) => gather_typed(s, ids).into(),
            Array::Int32(s) => gather_typed(s, ids).into(),
            Array::Int64(s) => gather_typed(s, ids).into(),
            Array::UInt8(s) => gather_typed(s, ids).into(),
            Array::UInt16(s) => gather_typed(s, ids).into(),
            Array::UInt32(s) => gather_typed(s, ids).into(),
            Array::UInt64(s) => gather_typed(s, ids).into(),
            Array::Float32(s) => gather_typed(s, ids).into(),
            Array::Float64(s) => gather_typed(s, ids).into(),
        }
    }

    /// Concatenate arrays of one dtype in order.
    pub fn concat(parts: &[&Array]) -> Result<Array, MeshRepartError> {
        let first = parts
            .first()
            .expect("Array::concat requires at least one part");
        let dt = first.dtype();
        for p in parts.iter().skip(1) {
            if p.dtype() != dt {
                return Err(MeshRepartError::DtypeMismatch {
                    expected: dt.as_str(),
                    found: p.dtype().as_str(),
                });
            }
        }
        macro_rules! cat {
            ($variant:ident, $t:ty) => {{
                let mut out: Vec<$t> = Vec::new();
                for p in parts {
                    if let Array::$variant(s) = p {
                        out.extend_from_slice(s);
                    }
                }
                Ok(out.into())
            }};
        }
        match dt {
            DType::Int8 => cat!(Int8, i8),
            DType::Int16 => cat!(Int16, i16),
            DType::Int32 => cat!(Int32, i32),
            DType::Int64 => cat!(Int64, i64),
            DType::UInt8 => cat!(UInt8, u8),
            DType::UInt16 => cat!(UInt16, u16),
            DType::UInt32 => cat!(UInt32, u32),
            DType::UInt64 => cat!(UInt64, u64),
            DType::Float32 => cat!(Float32, f32),
            DType::Float64 => cat!(Float64, f64),
        }
    }

    /// Merge values from several same-dtype arrays into one array whose
    /// entry `g` comes from `parts[placement[g].0][placement[g].1]`.
    pub fn merge_ordered(
        parts: &[&Array],
        placement: &[(u32, u64)],
    ) -> Result<Array, MeshRepartError> {
        let first = parts
            .first()
            .expect("Array::merge_ordered requires at least one part");
        let dt = first.dtype();
        for p in parts.iter().skip(1) {
            if p.dtype() != dt {
                return Err(MeshRepartError::DtypeMismatch {
                    expected: dt.as_str(),
                    found: p.dtype().as_str(),
                });
            }
        }
        macro_rules! merge {
            ($variant:ident, $t:ty) => {{
                let slices: Vec<&[$t]> = parts
                    .iter()
                    .map(|p| match p {
                        Array::$variant(s) => &s[..],
                        _ => unreachable!("dtype checked above"),
                    })
                    .collect();
                let out: Vec<$t> = placement
                    .iter()
                    .map(|&(p, i)| slices[p as usize][i as usize])
                    .collect();
                Ok(out.into())
            }};
        }
        match dt {
            DType::Int8 => merge!(Int8, i8),
            DType::Int16 => merge!(Int16, i16),
            DType::Int32 => merge!(Int32, i32),
            DType::Int64 => merge!(Int64, i64),
            DType::UInt8 => merge!(UInt8, u8),
            DType::UInt16 => merge!(UInt16, u16),
            DType::UInt32 => merge!(UInt32, u32),
            DType::UInt64 => merge!(UInt64, u64),
            DType::Float32 => merge!(Float32, f32),
            DType::Float64 => merge!(Float64, f64),
        }
    }

    /// Raw payload bytes (host order; all supported hosts are little-endian).
    pub fn payload_bytes(&self) -> &[u8] {
        match self {
            Array::Int8(s) => bytemuck::cast_slice(s),
            Array::Int16(s) => bytemuck::cast_slice(s),
            Array::Int32(s) => bytemuck::cast_slice(s),
            Array::Int64(s) => bytemuck::cast_slice(s),
            Array::UInt8(s) => s,
            Array::UInt16(s) => bytemuck::cast_slice(s),
            Array::UInt32(s) => bytemuck::cast_slice(s),
            Array::UInt64(s) => bytemuck::cast_slice(s),
            Array::Float32(s) => bytemuck::cast_slice(s),
            Array::Float64(s) => bytemuck::cast_slice(s),
        }
    }

    /// Rebuild an array of `dtype` from raw payload bytes.
    pub fn from_payload_bytes(dtype: DType, bytes: &[u8]) -> Result<Array, MeshRepartError> {
        let esz = dtype.elem_bytes();
        if bytes.len() % esz != 0 {
            return Err(MeshRepartError::WireDecode(format!(
                "array payload of {} bytes is not a multiple of {} ({})",
                bytes.len(),
                esz,
                dtype.as_str()
            )));
        }
        macro_rules! decode {
            ($t:ty) => {{
                let v: Vec<$t> = bytes
                    .chunks_exact(esz)
                    .map(|c| <$t>::from_le_bytes(c.try_into().expect("chunk size")))
                    .collect();
                Ok(v.into())
            }};
        }
        match dtype {
            DType::Int8 => decode!(i8),
            DType::Int16 => decode!(i16),
            DType::Int32 => decode!(i32),
            DType::Int64 => decode!(i64),
            DType::UInt8 => decode!(u8),
            DType::UInt16 => decode!(u16),
            DType::UInt32 => decode!(u32),
            DType::UInt64 => decode!(u64),
            DType::Float32 => decode!(f32),
            DType::Float64 => decode!(f64),
        }
    }
}

fn gather_typed<T: Copy>(s: &[T], ids: &[u64]) -> Vec<T> {
    ids.iter().map(|&i| s[i as usize]).collect()
}

macro_rules! impl_from_vec {
    ($t:ty, $variant:ident) => {
        impl From<Vec<$t>> for Array {
            fn from(v: Vec<$t>) -> Self {
                Array::$variant(v.into())
            }
        }
    };
}

impl_from_vec!(i8, Int8);
impl_from_vec!(i16, Int16);
impl_from_vec!(i32, Int32);
impl_from_vec!(i64, Int64);
impl_from_vec!(u8, UInt8);
impl_from_vec!(u16, UInt16);
impl_from_vec!(u32, UInt32);
impl_from_vec!(u64, UInt64);
impl_from_vec!(f32, Float32);
impl_from_vec!(f64, Float64);
