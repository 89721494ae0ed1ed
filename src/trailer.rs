//! Trailer codec: the ptar offset index appended after the two
//! mandatory end-of-archive zero blocks.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::PtarError;

pub const MAGIC: &[u8; 8] = b"!!PTAR!!";

/// `8*n + 16` bytes: `offsets... ‖ count ‖ magic`.
pub fn encode(offsets: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(offsets.len() * 8 + 16);
    for &offset in offsets {
        buf.extend_from_slice(&offset.to_be_bytes());
    }
    buf.extend_from_slice(&(offsets.len() as u64).to_be_bytes());
    buf.extend_from_slice(MAGIC);
    buf
}

pub fn write_trailer(w: &mut impl Write, offsets: &[u64]) -> std::io::Result<()> {
    w.write_all(&encode(offsets))
}

/// Reads the trailer from the end of an archive. Returns
/// [`PtarError::NotAPtarArchive`] when the magic cookie is absent — callers
/// use this to decide whether to fall back to the host `tar`.
pub fn read_trailer(r: &mut (impl Read + Seek)) -> Result<Vec<u64>, PtarError> {
    r.seek(SeekFrom::End(-8)).map_err(|_| PtarError::NotAPtarArchive)?;
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic).map_err(|_| PtarError::NotAPtarArchive)?;
    if &magic != MAGIC {
        return Err(PtarError::NotAPtarArchive);
    }

    r.seek(SeekFrom::End(-16)).map_err(|_| PtarError::NotAPtarArchive)?;
    let mut count_buf = [0u8; 8];
    r.read_exact(&mut count_buf).map_err(|_| PtarError::NotAPtarArchive)?;
    let count = u64::from_be_bytes(count_buf) as usize;

    let offsets_len = count as i64 * 8;
    r.seek(SeekFrom::End(-16 - offsets_len))
        .map_err(|_| PtarError::NotAPtarArchive)?;
    let mut offsets = Vec::with_capacity(count);
    let mut buf8 = [0u8; 8];
    for _ in 0..count {
        r.read_exact(&mut buf8).map_err(|_| PtarError::NotAPtarArchive)?;
        offsets.push(u64::from_be_bytes(buf8));
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_offset_index() {
        let offsets = vec![0u64, 512, 1536];
        let mut buf = vec![0u8; 100]; // stand-in for preceding archive bytes
        write_trailer(&mut buf, &offsets).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = read_trailer(&mut cursor).unwrap();
        assert_eq!(decoded, offsets);
    }

    #[test]
    fn missing_magic_is_not_a_ptar_archive() {
        let buf = vec![0u8; 64];
        let mut cursor = Cursor::new(buf);
        assert!(matches!(read_trailer(&mut cursor), Err(PtarError::NotAPtarArchive)));
    }

    #[test]
    fn too_small_file_is_not_a_ptar_archive() {
        let buf = vec![0u8; 4];
        let mut cursor = Cursor::new(buf);
        assert!(matches!(read_trailer(&mut cursor), Err(PtarError::NotAPtarArchive)));
    }

    #[test]
    fn empty_offset_index_round_trips() {
        let mut buf = Vec::new();
        write_trailer(&mut buf, &[]).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = read_trailer(&mut cursor).unwrap();
        assert!(decoded.is_empty());
    }
}
