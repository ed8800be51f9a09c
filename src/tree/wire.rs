//! Fixed, versioned, little-endian wire format for attribute subtrees.
//!
//! Chunk transport serializes whole subtrees with this codec. The stream is
//! a Pod header followed by a recursive node encoding; all multi-byte
//! integers are little-endian, array payloads are raw element bytes.

use bytemuck::{Pod, Zeroable};

use crate::error::MeshRepartError;
use crate::tree::array::{Array, DType};
use crate::tree::node::{Node, Value};

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

const KIND_TREE: u16 = 1;

const TAG_EMPTY: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_UINT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_ARRAY: u8 = 5;
const TAG_OBJECT: u8 = 6;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // future use; keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
}

const _: () = {
    assert!(std::mem::size_of::<WireHdr>() == 8);
};

/// Serialize a subtree into a self-describing byte stream.
pub fn encode_tree(node: &Node) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_TREE)));
    encode_node(node, &mut out);
    out
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn encode_node(node: &Node, out: &mut Vec<u8>) {
    match node.value() {
        Value::Empty => out.push(TAG_EMPTY),
        Value::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::UInt(v) => {
            out.push(TAG_UINT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STR);
            put_u32(out, s.len() as u32);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(a) => {
            out.push(TAG_ARRAY);
            out.push(a.dtype().code());
            put_u64(out, a.len() as u64);
            out.extend_from_slice(a.payload_bytes());
        }
        Value::Object(_) => {
            out.push(TAG_OBJECT);
            put_u32(out, node.num_children() as u32);
            for (name, child) in node.children() {
                put_u32(out, name.len() as u32);
                out.extend_from_slice(name.as_bytes());
                encode_node(child, out);
            }
        }
    }
}

/// Decode a stream produced by [`encode_tree`].
pub fn decode_tree(bytes: &[u8]) -> Result<Node, MeshRepartError> {
    let mut r = Reader { buf: bytes, pos: 0 };
    let hdr: WireHdr = bytemuck::pod_read_unaligned(r.take(std::mem::size_of::<WireHdr>())?);
    if hdr.version() != WIRE_VERSION {
        return Err(MeshRepartError::WireDecode(format!(
            "wire version {} does not match {}",
            hdr.version(),
            WIRE_VERSION
        )));
    }
    if hdr.kind() != KIND_TREE {
        return Err(MeshRepartError::WireDecode(format!(
            "unexpected stream kind {}",
            hdr.kind()
        )));
    }
    let node = decode_node(&mut r)?;
    if r.pos != bytes.len() {
        return Err(MeshRepartError::WireDecode(format!(
            "{} trailing bytes",
            bytes.len() - r.pos
        )));
    }
    Ok(node)
}

struct Reader<'b> {
    buf: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    fn take(&mut self, n: usize) -> Result<&'b [u8], MeshRepartError> {
        if self.pos + n > self.buf.len() {
            return Err(MeshRepartError::WireDecode(format!(
                "truncated stream: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn take_u8(&mut self) -> Result<u8, MeshRepartError> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, MeshRepartError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("len 4")))
    }

    fn take_u64(&mut self) -> Result<u64, MeshRepartError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    fn take_str(&mut self) -> Result<String, MeshRepartError> {
        let n = self.take_u32()? as usize;
        let raw = self.take(n)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| MeshRepartError::WireDecode("invalid utf-8 in name".into()))
    }
}

fn decode_node(r: &mut Reader<'_>) -> Result<Node, MeshRepartError> {
    let mut node = Node::new();
    match r.take_u8()? {
        TAG_EMPTY => {}
        TAG_INT => node.set_i64(i64::from_le_bytes(r.take(8)?.try_into().expect("len 8"))),
        TAG_UINT => node.set_u64(r.take_u64()?),
        TAG_FLOAT => node.set_f64(f64::from_le_bytes(r.take(8)?.try_into().expect("len 8"))),
        TAG_STR => {
            let s = r.take_str()?;
            node.set_str(&s);
        }
        TAG_ARRAY => {
            let code = r.take_u8()?;
            let dtype = DType::from_code(code).ok_or_else(|| {
                MeshRepartError::WireDecode(format!("unknown dtype code {code}"))
            })?;
            let n = r.take_u64()? as usize;
            let payload = r.take(n * dtype.elem_bytes())?;
            node.set_value(Value::Array(Array::from_payload_bytes(dtype, payload)?));
        }
        TAG_OBJECT => {
            let n = r.take_u32()? as usize;
            for _ in 0..n {
                let name = r.take_str()?;
                let child = decode_node(r)?;
                node.insert_child(&name, child);
            }
        }
        other => {
            return Err(MeshRepartError::WireDecode(format!(
                "unknown node tag {other}"
            )))
        }
    }
    Ok(node)
}
