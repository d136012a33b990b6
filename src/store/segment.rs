//! store/segment: record framing inside segment files.
//!
//! Record: [magic u32][key_len u32][val_len u32][crc32 u32] + key + value
//! (little-endian; CRC32 over header[0..12] + key + value).
//!
//! Reading is sequential. A record whose header or body does not fit into the file is a
//! partial tail (`Ok(None)`); a CRC or magic mismatch is corruption (`Err`).

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;
use std::io::{Read, Write};

pub const REC_MAGIC: u32 = 0x3152_4453; // "SDR1"
pub const REC_HDR_SIZE: usize = 16;

const OFF_MAGIC: usize = 0;
const OFF_KEY_LEN: usize = 4;
const OFF_VAL_LEN: usize = 8;
const OFF_CRC: usize = 12;

/// Upper bound for a single key/value; anything larger is treated as corruption.
pub const MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

fn crc_of(hdr: &[u8], key: &[u8], val: &[u8]) -> u32 {
    let mut h = Crc32::new();
    h.update(&hdr[..OFF_CRC]);
    h.update(key);
    h.update(val);
    h.finalize()
}

pub fn build_hdr(key: &[u8], val: &[u8]) -> [u8; REC_HDR_SIZE] {
    let mut hdr = [0u8; REC_HDR_SIZE];
    LittleEndian::write_u32(&mut hdr[OFF_MAGIC..OFF_MAGIC + 4], REC_MAGIC);
    LittleEndian::write_u32(&mut hdr[OFF_KEY_LEN..OFF_KEY_LEN + 4], key.len() as u32);
    LittleEndian::write_u32(&mut hdr[OFF_VAL_LEN..OFF_VAL_LEN + 4], val.len() as u32);
    let crc = crc_of(&hdr, key, val);
    LittleEndian::write_u32(&mut hdr[OFF_CRC..OFF_CRC + 4], crc);
    hdr
}

/// Write one record; returns the number of bytes written.
pub fn write_record<W: Write>(w: &mut W, key: &[u8], val: &[u8]) -> Result<u64> {
    if key.len() > MAX_FIELD_LEN || val.len() > MAX_FIELD_LEN {
        return Err(anyhow!(
            "record too large: key={} val={} (max {})",
            key.len(),
            val.len(),
            MAX_FIELD_LEN
        ));
    }
    let hdr = build_hdr(key, val);
    w.write_all(&hdr)?;
    w.write_all(key)?;
    w.write_all(val)?;
    Ok((REC_HDR_SIZE + key.len() + val.len()) as u64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub val: Vec<u8>,
}

/// Read the record starting at `pos`. `remaining` is file_len - pos.
///
/// Returns Ok(Some((record, total_len))), Ok(None) on a partial tail, Err on corruption.
pub fn read_record<R: Read>(r: &mut R, pos: u64, remaining: u64) -> Result<Option<(Record, u64)>> {
    if remaining < REC_HDR_SIZE as u64 {
        return Ok(None);
    }
    let mut hdr = [0u8; REC_HDR_SIZE];
    r.read_exact(&mut hdr)?;

    let magic = LittleEndian::read_u32(&hdr[OFF_MAGIC..OFF_MAGIC + 4]);
    if magic != REC_MAGIC {
        return Err(anyhow!("bad record magic 0x{:08x} at off {}", magic, pos));
    }
    let key_len = LittleEndian::read_u32(&hdr[OFF_KEY_LEN..OFF_KEY_LEN + 4]) as usize;
    let val_len = LittleEndian::read_u32(&hdr[OFF_VAL_LEN..OFF_VAL_LEN + 4]) as usize;
    if key_len > MAX_FIELD_LEN || val_len > MAX_FIELD_LEN {
        return Err(anyhow!(
            "record lengths out of range at off {}: key={} val={}",
            pos,
            key_len,
            val_len
        ));
    }

    let total = (REC_HDR_SIZE + key_len + val_len) as u64;
    if total > remaining {
        return Ok(None);
    }

    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)?;
    let mut val = vec![0u8; val_len];
    r.read_exact(&mut val)?;

    let crc_expected = LittleEndian::read_u32(&hdr[OFF_CRC..OFF_CRC + 4]);
    if crc_of(&hdr, &key, &val) != crc_expected {
        return Err(anyhow!("record CRC mismatch at off {}", pos));
    }

    Ok(Some((Record { key, val }, total)))
}

pub fn segment_name(no: u32) -> String {
    format!("seg-{:06}.log", no)
}

/// "seg-000042.log" -> Some(42)
pub fn parse_segment_name(name: &str) -> Option<u32> {
    name.strip_prefix("seg-")?.strip_suffix(".log")?.parse().ok()
}
