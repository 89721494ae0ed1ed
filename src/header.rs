//! Header codec: one 512-byte v7 tar header, encode/decode/checksum.

use std::path::PathBuf;

use crate::error::PtarError;
use crate::model::{Entry, Kind};

pub const HEADER_SIZE: usize = 512;

const NAME: std::ops::Range<usize> = 0..100;
const MODE: std::ops::Range<usize> = 100..107;
const UID: std::ops::Range<usize> = 108..115;
const GID: std::ops::Range<usize> = 116..123;
const SIZE: std::ops::Range<usize> = 124..135;
const MTIME: std::ops::Range<usize> = 136..147;
const CHKSUM: std::ops::Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const LINKNAME: std::ops::Range<usize> = 157..257;

/// Writes `value` as zero-padded octal digits filling `range`, NUL-terminated.
fn write_octal(buf: &mut [u8; HEADER_SIZE], range: std::ops::Range<usize>, value: u64) {
    let width = range.len() - 1;
    let digits = format!("{:0width$o}", value, width = width);
    let bytes = digits.as_bytes();
    buf[range.start..range.start + width].copy_from_slice(&bytes[bytes.len() - width..]);
    buf[range.start + width] = 0;
}

/// Writes `value` as zero-padded octal digits filling the *entire* `range`,
/// with no terminator byte. Used for `size`/`mtime`, whose 11-byte fields
/// need all 11 octal digits to reach the spec's `2^33` bound (`8^11 ==
/// 2^33`), leaving no room for a NUL.
fn write_octal_full(buf: &mut [u8; HEADER_SIZE], range: std::ops::Range<usize>, value: u64) {
    let width = range.len();
    let digits = format!("{:0width$o}", value, width = width);
    let bytes = digits.as_bytes();
    buf[range].copy_from_slice(&bytes[bytes.len() - width..]);
}

/// Inverse of [`write_octal`]: parses octal digits up to the first NUL or space.
fn read_octal(buf: &[u8; HEADER_SIZE], range: std::ops::Range<usize>) -> u64 {
    let field = &buf[range];
    let end = field
        .iter()
        .position(|&b| b == 0 || b == b' ')
        .unwrap_or(field.len());
    let s = std::str::from_utf8(&field[..end]).unwrap_or("");
    u64::from_str_radix(s.trim(), 8).unwrap_or(0)
}

/// Sum of all 512 bytes treating the checksum field as eight ASCII spaces.
fn compute_checksum(buf: &[u8; HEADER_SIZE]) -> u32 {
    let mut sum: u32 = 0;
    for (i, &b) in buf.iter().enumerate() {
        if CHKSUM.contains(&i) {
            sum += b' ' as u32;
        } else {
            sum += b as u32;
        }
    }
    sum
}

fn write_checksum(buf: &mut [u8; HEADER_SIZE]) {
    let sum = compute_checksum(buf);
    let digits = format!("{:06o}", sum);
    buf[CHKSUM.start..CHKSUM.start + 6].copy_from_slice(digits.as_bytes());
    buf[CHKSUM.start + 6] = 0;
    buf[CHKSUM.start + 7] = b' ';
}

/// Encodes one entry's 512-byte header. Fails with [`PtarError::NameTooLong`]
/// or [`PtarError::LinkTooLong`] when the stored name or link target exceeds
/// 100 bytes.
pub fn encode(entry: &Entry) -> Result<[u8; HEADER_SIZE], PtarError> {
    let name_bytes = entry.path.as_bytes();
    if name_bytes.len() > NAME.len() {
        return Err(PtarError::NameTooLong(PathBuf::from(&entry.path)));
    }

    let mut buf = [0u8; HEADER_SIZE];
    buf[NAME.start..NAME.start + name_bytes.len()].copy_from_slice(name_bytes);

    write_octal(&mut buf, MODE, entry.mode as u64);
    write_octal(&mut buf, UID, entry.uid as u64);
    write_octal(&mut buf, GID, entry.gid as u64);
    write_octal_full(&mut buf, SIZE, entry.size);
    write_octal_full(&mut buf, MTIME, entry.mtime);
    buf[TYPEFLAG] = entry.kind.type_digit();

    if let Some(target) = &entry.link_target {
        let target_bytes = target.as_bytes();
        if target_bytes.len() > LINKNAME.len() {
            return Err(PtarError::LinkTooLong(PathBuf::from(target)));
        }
        buf[LINKNAME.start..LINKNAME.start + target_bytes.len()].copy_from_slice(target_bytes);
    }

    write_checksum(&mut buf);
    Ok(buf)
}

/// Decodes one 512-byte header at the given archive `offset` (used only for
/// the error message on checksum mismatch).
pub fn decode(buf: &[u8; HEADER_SIZE], offset: u64) -> Result<Entry, PtarError> {
    let stored = read_octal_raw_checksum(buf);
    let mut recomputed_buf = *buf;
    recomputed_buf[CHKSUM.start..CHKSUM.end].fill(b' ');
    let computed = compute_checksum(&recomputed_buf);
    if stored != computed {
        return Err(PtarError::CorruptHeader(offset));
    }

    let name_end = buf[NAME]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(NAME.len());
    let path = String::from_utf8_lossy(&buf[NAME.start..NAME.start + name_end]).to_string();

    let mode = read_octal(buf, MODE) as u32;
    let uid = read_octal(buf, UID) as u32;
    let gid = read_octal(buf, GID) as u32;
    let size = read_octal(buf, SIZE);
    let mtime = read_octal(buf, MTIME);
    let type_digit = buf[TYPEFLAG];
    let kind = Kind::from_type_digit(type_digit, path.ends_with('/'));

    let link_target = match kind {
        Kind::HardLink | Kind::SymbolicLink => {
            let link_end = buf[LINKNAME.clone()]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(LINKNAME.len());
            Some(
                String::from_utf8_lossy(&buf[LINKNAME.start..LINKNAME.start + link_end])
                    .to_string(),
            )
        }
        _ => None,
    };

    Ok(Entry {
        path,
        mode,
        uid,
        gid,
        mtime,
        size: if matches!(kind, Kind::Regular) { size } else { 0 },
        kind,
        link_target,
        offset,
    })
}

fn read_octal_raw_checksum(buf: &[u8; HEADER_SIZE]) -> u32 {
    read_octal(buf, CHKSUM) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> Entry {
        Entry {
            path: "a.txt".into(),
            mode: 0o644,
            uid: 1000,
            gid: 1000,
            mtime: 1_700_000_000,
            size: 3,
            kind: Kind::Regular,
            link_target: None,
            offset: 0,
        }
    }

    #[test]
    fn round_trips_regular() {
        let entry = sample_entry();
        let buf = encode(&entry).unwrap();
        let decoded = decode(&buf, 0).unwrap();
        assert_eq!(decoded.path, "a.txt");
        assert_eq!(decoded.mode, 0o644);
        assert_eq!(decoded.mtime, 1_700_000_000);
        assert_eq!(decoded.size, 3);
        assert_eq!(decoded.kind, Kind::Regular);
    }

    #[test]
    fn directory_has_zero_size_and_kind_five() {
        let mut entry = sample_entry();
        entry.path = "d/".into();
        entry.kind = Kind::Directory;
        entry.size = 0;
        let buf = encode(&entry).unwrap();
        assert_eq!(buf[TYPEFLAG], b'5');
        let decoded = decode(&buf, 0).unwrap();
        assert_eq!(decoded.kind, Kind::Directory);
        assert_eq!(decoded.size, 0);
    }

    #[test]
    fn hardlink_round_trips_target() {
        let mut entry = sample_entry();
        entry.kind = Kind::HardLink;
        entry.link_target = Some("a.txt".into());
        entry.size = 0;
        let buf = encode(&entry).unwrap();
        let decoded = decode(&buf, 0).unwrap();
        assert_eq!(decoded.kind, Kind::HardLink);
        assert_eq!(decoded.link_target.as_deref(), Some("a.txt"));
    }

    #[test]
    fn name_too_long_is_rejected() {
        let mut entry = sample_entry();
        entry.path = "x".repeat(101);
        assert!(matches!(encode(&entry), Err(PtarError::NameTooLong(_))));
    }

    #[test]
    fn link_too_long_is_rejected() {
        let mut entry = sample_entry();
        entry.kind = Kind::SymbolicLink;
        entry.link_target = Some("y".repeat(101));
        assert!(matches!(encode(&entry), Err(PtarError::LinkTooLong(_))));
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let entry = sample_entry();
        let mut buf = encode(&entry).unwrap();
        buf[0] ^= 0xff;
        assert!(matches!(decode(&buf, 512), Err(PtarError::CorruptHeader(512))));
    }
}
