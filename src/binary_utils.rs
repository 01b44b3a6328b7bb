use std::io::Cursor;

use crate::error::DecodeError;

/// Borrows the next `count` bytes and advances past them. A short read
/// leaves the cursor where it was.
fn take<'a>(cursor: &mut Cursor<&'a [u8]>, count: usize) -> Result<&'a [u8], DecodeError> {
    let data: &'a [u8] = *cursor.get_ref();
    let len = data.len();
    let position = usize::try_from(cursor.position()).unwrap_or(usize::MAX);
    let end = position
        .checked_add(count)
        .filter(|&end| end <= len)
        .ok_or(DecodeError::BoundsViolation {
            what: "cursor read",
            offset: position,
            len,
        })?;
    cursor.set_position(end as u64);
    Ok(&data[position..end])
}

pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, DecodeError> {
    Ok(take(cursor, 1)?[0])
}

pub fn read_u16_le(cursor: &mut Cursor<&[u8]>) -> Result<u16, DecodeError> {
    let b = take(cursor, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

/// Reads the 3-byte little-endian lengths used by VOC block headers.
pub fn read_u24_le(cursor: &mut Cursor<&[u8]>) -> Result<u32, DecodeError> {
    let b = take(cursor, 3)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

pub fn read_u32_le(cursor: &mut Cursor<&[u8]>) -> Result<u32, DecodeError> {
    let b = take(cursor, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn read_bytes(cursor: &mut Cursor<&[u8]>, length: usize) -> Result<Vec<u8>, DecodeError> {
    Ok(take(cursor, length)?.to_vec())
}

// Offset-based helpers for fixed-layout headers

pub fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn i16_at(data: &[u8], offset: usize) -> Option<i16> {
    u16_at(data, offset).map(|v| v as i16)
}

pub fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads a NUL-padded ASCII name from a fixed-width field.
pub fn fixed_string_at(data: &[u8], offset: usize, width: usize) -> Option<String> {
    let field = data.get(offset..offset.checked_add(width)?)?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    Some(field[..end].iter().map(|&b| b as char).collect())
}
