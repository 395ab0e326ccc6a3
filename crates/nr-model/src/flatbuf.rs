//! Minimal FlatBuffers access layer.
//!
//! Only the structures the model container uses are supported: tables with
//! vtables, strings, and vectors of scalars or table offsets. All reads are
//! bounds-checked; malformed input surfaces as `ModelError::Malformed`
//! rather than a panic.
//!
//! Wire layout recap (all little-endian):
//! - position 0 holds a u32 uoffset to the root table; bytes 4..8 hold the
//!   four-byte file identifier
//! - a table starts with an i32 soffset; `table_pos - soffset` is the vtable
//! - a vtable is `u16 vtable_len, u16 table_len`, then one u16 per field id
//!   giving the field's offset from the table start (0 = field absent)
//! - strings and vectors are reached through u32 uoffsets relative to the
//!   position of the uoffset itself, and start with a u32 element count

use crate::error::{ModelError, Result};

/// A FlatBuffers file held as raw bytes.
pub struct FlatBuffer<'a> {
    bytes: &'a [u8],
}

/// A resolved table: its position and its vtable bounds.
#[derive(Debug, Clone, Copy)]
pub struct Table {
    pos: usize,
    vtable: usize,
    vtable_len: usize,
}

/// A resolved vector: position of the first element and the element count.
#[derive(Debug, Clone, Copy)]
pub struct Vector {
    pos: usize,
    len: usize,
}

impl Vector {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn oob(what: &str, pos: usize) -> ModelError {
    ModelError::Malformed(format!("{} out of bounds at position {}", what, pos))
}

impl<'a> FlatBuffer<'a> {
    pub fn new(bytes: &'a [u8]) -> FlatBuffer<'a> {
        FlatBuffer { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn scalar<const N: usize>(&self, pos: usize, what: &str) -> Result<[u8; N]> {
        let end = pos.checked_add(N).ok_or_else(|| oob(what, pos))?;
        if end > self.bytes.len() {
            return Err(oob(what, pos));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[pos..end]);
        Ok(out)
    }

    pub fn u8_at(&self, pos: usize) -> Result<u8> {
        Ok(self.scalar::<1>(pos, "u8")?[0])
    }

    pub fn i8_at(&self, pos: usize) -> Result<i8> {
        Ok(self.scalar::<1>(pos, "i8")?[0] as i8)
    }

    pub fn u16_at(&self, pos: usize) -> Result<u16> {
        Ok(u16::from_le_bytes(self.scalar(pos, "u16")?))
    }

    pub fn u32_at(&self, pos: usize) -> Result<u32> {
        Ok(u32::from_le_bytes(self.scalar(pos, "u32")?))
    }

    pub fn i32_at(&self, pos: usize) -> Result<i32> {
        Ok(i32::from_le_bytes(self.scalar(pos, "i32")?))
    }

    pub fn i64_at(&self, pos: usize) -> Result<i64> {
        Ok(i64::from_le_bytes(self.scalar(pos, "i64")?))
    }

    pub fn f32_at(&self, pos: usize) -> Result<f32> {
        Ok(f32::from_le_bytes(self.scalar(pos, "f32")?))
    }

    /// The four-byte file identifier, if the buffer is large enough to
    /// carry one.
    pub fn identifier(&self) -> Option<[u8; 4]> {
        self.scalar::<4>(4, "identifier").ok()
    }

    /// Resolve the root table from the uoffset at position 0.
    pub fn root_table(&self) -> Result<Table> {
        let root = self.u32_at(0)? as usize;
        self.table_at(root)
    }

    /// Resolve a table at `pos`, validating its vtable.
    pub fn table_at(&self, pos: usize) -> Result<Table> {
        let soffset = self.i32_at(pos)?;
        let vtable = (pos as i64) - (soffset as i64);
        if vtable < 0 || vtable as usize >= self.bytes.len() {
            return Err(oob("vtable", pos));
        }
        let vtable = vtable as usize;
        let vtable_len = self.u16_at(vtable)? as usize;
        let vtable_end = vtable.checked_add(vtable_len).ok_or_else(|| oob("vtable", vtable))?;
        if vtable_len < 4 || vtable_end > self.bytes.len() {
            return Err(oob("vtable", vtable));
        }
        Ok(Table {
            pos,
            vtable,
            vtable_len,
        })
    }

    /// Absolute position of field `id` within `table`, or `None` when the
    /// field is absent (left at its schema default).
    fn field_pos(&self, table: Table, id: u16) -> Result<Option<usize>> {
        let slot = 4 + 2 * id as usize;
        if slot + 2 > table.vtable_len {
            return Ok(None);
        }
        let voffset = self.u16_at(table.vtable + slot)? as usize;
        if voffset == 0 {
            return Ok(None);
        }
        let pos = table
            .pos
            .checked_add(voffset)
            .ok_or_else(|| oob("field", table.pos))?;
        Ok(Some(pos))
    }

    pub fn table_u32(&self, table: Table, id: u16, default: u32) -> Result<u32> {
        match self.field_pos(table, id)? {
            Some(pos) => self.u32_at(pos),
            None => Ok(default),
        }
    }

    pub fn table_i32(&self, table: Table, id: u16, default: i32) -> Result<i32> {
        match self.field_pos(table, id)? {
            Some(pos) => self.i32_at(pos),
            None => Ok(default),
        }
    }

    pub fn table_i8(&self, table: Table, id: u16, default: i8) -> Result<i8> {
        match self.field_pos(table, id)? {
            Some(pos) => self.i8_at(pos),
            None => Ok(default),
        }
    }

    /// Follow a uoffset stored at `pos`.
    fn indirect(&self, pos: usize) -> Result<usize> {
        let uoffset = self.u32_at(pos)? as usize;
        pos.checked_add(uoffset).ok_or_else(|| oob("uoffset", pos))
    }

    /// A sub-table referenced by field `id`, or `None` when absent.
    pub fn table_table(&self, table: Table, id: u16) -> Result<Option<Table>> {
        match self.field_pos(table, id)? {
            Some(pos) => Ok(Some(self.table_at(self.indirect(pos)?)?)),
            None => Ok(None),
        }
    }

    /// A string referenced by field `id`, or `None` when absent.
    pub fn table_string(&self, table: Table, id: u16) -> Result<Option<&'a str>> {
        let pos = match self.field_pos(table, id)? {
            Some(pos) => pos,
            None => return Ok(None),
        };
        let target = self.indirect(pos)?;
        let len = self.u32_at(target)? as usize;
        let start = target + 4;
        let end = start.checked_add(len).ok_or_else(|| oob("string", target))?;
        if end > self.bytes.len() {
            return Err(oob("string", target));
        }
        let s = std::str::from_utf8(&self.bytes[start..end])
            .map_err(|_| ModelError::Malformed(format!("invalid utf-8 string at {}", target)))?;
        Ok(Some(s))
    }

    /// A vector referenced by field `id`, or `None` when absent. The full
    /// extent (`len * elem_size` bytes) is validated up front.
    pub fn table_vector(&self, table: Table, id: u16, elem_size: usize) -> Result<Option<Vector>> {
        let pos = match self.field_pos(table, id)? {
            Some(pos) => pos,
            None => return Ok(None),
        };
        let target = self.indirect(pos)?;
        let len = self.u32_at(target)? as usize;
        let start = target + 4;
        let extent = len
            .checked_mul(elem_size)
            .and_then(|n| start.checked_add(n))
            .ok_or_else(|| oob("vector", target))?;
        if extent > self.bytes.len() {
            return Err(oob("vector", target));
        }
        Ok(Some(Vector { pos: start, len }))
    }

    pub fn vector_u32(&self, vector: Vector, index: usize) -> Result<u32> {
        self.u32_at(vector.pos + 4 * index)
    }

    pub fn vector_i32(&self, vector: Vector, index: usize) -> Result<i32> {
        self.i32_at(vector.pos + 4 * index)
    }

    pub fn vector_f32(&self, vector: Vector, index: usize) -> Result<f32> {
        self.f32_at(vector.pos + 4 * index)
    }

    pub fn vector_i64(&self, vector: Vector, index: usize) -> Result<i64> {
        self.i64_at(vector.pos + 8 * index)
    }

    /// Resolve element `index` of a vector of table offsets.
    pub fn vector_table(&self, vector: Vector, index: usize) -> Result<Table> {
        if index >= vector.len {
            return Err(oob("vector element", vector.pos));
        }
        let pos = vector.pos + 4 * index;
        self.table_at(self.indirect(pos)?)
    }

    /// The byte range a u8 vector occupies within the file.
    pub fn vector_byte_range(&self, vector: Vector) -> Result<std::ops::Range<usize>> {
        let end = vector
            .pos
            .checked_add(vector.len)
            .ok_or_else(|| oob("vector", vector.pos))?;
        if end > self.bytes.len() {
            return Err(oob("vector", vector.pos));
        }
        Ok(vector.pos..end)
    }

    /// The contents of a u8 vector.
    pub fn vector_bytes(&self, vector: Vector) -> Result<&'a [u8]> {
        let range = self.vector_byte_range(vector)?;
        Ok(&self.bytes[range])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_root_offset() {
        let fb = FlatBuffer::new(&[0x10, 0x00]);
        assert!(fb.root_table().is_err());
    }

    #[test]
    fn test_root_offset_past_end() {
        let bytes = [0xff, 0xff, 0x00, 0x00, b'T', b'F', b'L', b'3'];
        let fb = FlatBuffer::new(&bytes);
        assert!(fb.root_table().is_err());
    }

    #[test]
    fn test_vtable_behind_file_start() {
        // Root table at position 8 whose soffset points before the file.
        let mut bytes = vec![8, 0, 0, 0, b'T', b'F', b'L', b'3'];
        bytes.extend_from_slice(&100i32.to_le_bytes());
        let fb = FlatBuffer::new(&bytes);
        assert!(fb.root_table().is_err());
    }

    #[test]
    fn test_identifier() {
        let bytes = [8, 0, 0, 0, b'T', b'F', b'L', b'3'];
        let fb = FlatBuffer::new(&bytes);
        assert_eq!(fb.identifier(), Some(*b"TFL3"));
        assert_eq!(FlatBuffer::new(&bytes[..6]).identifier(), None);
    }
}
