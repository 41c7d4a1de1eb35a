//! RDAR archive header and table-of-contents decoding
//!
//! Layout (all little-endian):
//!
//! ```text
//! header (40 bytes)      magic "RDAR" | version u32 | table_offset u64
//!                        | archive_id u64 | reserved u64 | file_size u64
//! preamble (28 bytes)    u32 | u32 | entry_count u32 | u32 | u32 | u64
//! hash record (56 bytes) hash u64 | timestamp u64 | chunk_count u32
//!                        | reserved (bytes 20..36) | sha1 [u8; 20]
//! ```
//!
//! Only the header, the preamble and the hash records are read. Payload
//! data is never touched, and nothing past the declared hash table is read.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use modwarden_core::config::DEFAULT_MAX_HASH_TABLE_MB;
use modwarden_core::domain::{ResourceHash, Sha1Digest};
use serde::Serialize;

use crate::ArchiveError;

pub const MAGIC: &[u8; 4] = b"RDAR";
pub const HEADER_SIZE: usize = 40;
pub const PREAMBLE_SIZE: usize = 28;
pub const HASH_ENTRY_SIZE: usize = 56;
pub const MAX_HASH_TABLE_BYTES: u64 = DEFAULT_MAX_HASH_TABLE_MB * 1024 * 1024;

const DIGEST_OFFSET: usize = 36;

/// Decoded archive header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub table_offset: u64,
    pub archive_id: u64,
    pub reserved: u64,
    /// Size the archive claims to have; used to sanity-check `table_offset`
    pub file_size: u64,
}

/// One resource record from the hash table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HashEntry {
    pub hash: u64,
    pub timestamp: u64,
    pub chunk_count: u32,
    pub digest: [u8; 20],
}

impl HashEntry {
    pub fn resource_hash(&self) -> ResourceHash {
        ResourceHash::new(self.hash)
    }

    pub fn digest_hex(&self) -> String {
        Sha1Digest::new(self.digest).to_hex()
    }
}

/// Header plus every hash record, in on-disk order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOfContents {
    pub header: ArchiveHeader,
    /// Count declared by the preamble
    pub entry_count: u32,
    pub hash_entries: Vec<HashEntry>,
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Reads at most `len` bytes; a short result means EOF was reached
fn read_up_to<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, ArchiveError> {
    let mut buf = Vec::new();
    reader.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Decodes the 40-byte header at the start of `bytes`
pub fn parse_header(bytes: &[u8]) -> Result<ArchiveHeader, ArchiveError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ArchiveError::Format(format!(
            "header needs {HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if &magic != MAGIC {
        return Err(ArchiveError::Format(format!(
            "bad magic {:02x?}, expected {:02x?}",
            magic, MAGIC
        )));
    }

    Ok(ArchiveHeader {
        magic,
        version: u32_at(bytes, 4),
        table_offset: u64_at(bytes, 8),
        archive_id: u64_at(bytes, 16),
        reserved: u64_at(bytes, 24),
        file_size: u64_at(bytes, 32),
    })
}

fn parse_hash_entry(record: &[u8]) -> HashEntry {
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&record[DIGEST_OFFSET..HASH_ENTRY_SIZE]);
    HashEntry {
        hash: u64_at(record, 0),
        timestamp: u64_at(record, 8),
        chunk_count: u32_at(record, 16),
        digest,
    }
}

/// Decodes the TOC from any seekable source
///
/// `max_table_bytes` bounds the hash table allocation; it is checked before
/// the table is read.
pub fn parse_toc_from<R: Read + Seek>(
    reader: &mut R,
    max_table_bytes: u64,
) -> Result<TableOfContents, ArchiveError> {
    reader.seek(SeekFrom::Start(0))?;
    let header_bytes = read_up_to(reader, HEADER_SIZE as u64)?;
    let header = parse_header(&header_bytes)?;

    if header.table_offset > header.file_size {
        return Err(ArchiveError::Format(format!(
            "table offset {} lies beyond declared file size {}",
            header.table_offset, header.file_size
        )));
    }

    reader.seek(SeekFrom::Start(header.table_offset))?;
    let preamble = read_up_to(reader, PREAMBLE_SIZE as u64)?;
    if preamble.len() < PREAMBLE_SIZE {
        return Err(ArchiveError::Truncated(format!(
            "TOC preamble at offset {} has {} of {PREAMBLE_SIZE} bytes",
            header.table_offset,
            preamble.len()
        )));
    }
    let entry_count = u32_at(&preamble, 8);

    let table_size = u64::from(entry_count) * HASH_ENTRY_SIZE as u64;
    if table_size > max_table_bytes {
        return Err(ArchiveError::SizeLimit {
            declared: table_size,
            limit: max_table_bytes,
        });
    }

    let table = read_up_to(reader, table_size)?;
    if (table.len() as u64) < table_size {
        return Err(ArchiveError::Truncated(format!(
            "hash table declares {entry_count} entries ({table_size} bytes), only {} available",
            table.len()
        )));
    }

    let hash_entries = table
        .chunks_exact(HASH_ENTRY_SIZE)
        .map(parse_hash_entry)
        .collect();

    Ok(TableOfContents {
        header,
        entry_count,
        hash_entries,
    })
}

/// Decodes the TOC of the archive at `path` with an explicit table ceiling
pub fn parse_toc_with_limit(
    path: &Path,
    max_table_bytes: u64,
) -> Result<TableOfContents, ArchiveError> {
    let mut reader = BufReader::new(File::open(path)?);
    parse_toc_from(&mut reader, max_table_bytes)
}

/// Decodes the TOC of the archive at `path` using [`MAX_HASH_TABLE_BYTES`]
pub fn parse_toc(path: &Path) -> Result<TableOfContents, ArchiveError> {
    parse_toc_with_limit(path, MAX_HASH_TABLE_BYTES)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    fn header_bytes(version: u32, table_offset: u64, file_size: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&version.to_le_bytes());
        buf.extend_from_slice(&table_offset.to_le_bytes());
        buf.extend_from_slice(&0xA1u64.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf
    }

    fn preamble_bytes(entry_count: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PREAMBLE_SIZE);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&entry_count.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf
    }

    fn record_bytes(entry: &HashEntry) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HASH_ENTRY_SIZE);
        buf.extend_from_slice(&entry.hash.to_le_bytes());
        buf.extend_from_slice(&entry.timestamp.to_le_bytes());
        buf.extend_from_slice(&entry.chunk_count.to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf.extend_from_slice(&entry.digest);
        buf
    }

    /// Header immediately followed by the TOC
    fn build_archive(entries: &[HashEntry]) -> Vec<u8> {
        let total = HEADER_SIZE + PREAMBLE_SIZE + entries.len() * HASH_ENTRY_SIZE;
        let mut data = header_bytes(12, HEADER_SIZE as u64, total as u64);
        data.extend(preamble_bytes(entries.len() as u32));
        for entry in entries {
            data.extend(record_bytes(entry));
        }
        data
    }

    fn sample_entries(n: usize) -> Vec<HashEntry> {
        (0..n)
            .map(|i| HashEntry {
                hash: 0x1000 + i as u64 * 7,
                timestamp: 1_700_000_000 + i as u64,
                chunk_count: i as u32 + 1,
                digest: [i as u8 + 1; 20],
            })
            .collect()
    }

    fn parse_bytes(data: Vec<u8>) -> Result<TableOfContents, ArchiveError> {
        parse_toc_from(&mut Cursor::new(data), MAX_HASH_TABLE_BYTES)
    }

    #[test]
    fn test_parse_header_fields() {
        let header = parse_header(&header_bytes(12, 4096, 8192)).unwrap();
        assert_eq!(&header.magic, MAGIC);
        assert_eq!(header.version, 12);
        assert_eq!(header.table_offset, 4096);
        assert_eq!(header.archive_id, 0xA1);
        assert_eq!(header.file_size, 8192);
    }

    #[test]
    fn test_parse_header_too_short() {
        let bytes = header_bytes(12, 40, 40);
        let err = parse_header(&bytes[..39]).unwrap_err();
        assert!(matches!(err, ArchiveError::Format(_)));
    }

    #[test]
    fn test_parse_header_bad_magic() {
        let mut bytes = header_bytes(12, 40, 40);
        bytes[..4].copy_from_slice(b"ZZZZ");
        assert!(matches!(parse_header(&bytes), Err(ArchiveError::Format(_))));
    }

    #[test]
    fn test_entry_counts_zero_one_five() {
        for n in [0usize, 1, 5] {
            let entries = sample_entries(n);
            let toc = parse_bytes(build_archive(&entries)).unwrap();
            assert_eq!(toc.entry_count as usize, n);
            assert_eq!(toc.hash_entries, entries, "mismatch for n={n}");
        }
    }

    #[test]
    fn test_deadbeef_scenario() {
        let digest: [u8; 20] = *b"0123456789abcdefghij";
        let entry = HashEntry {
            hash: 0xDEAD_BEEF,
            timestamp: 0,
            chunk_count: 1,
            digest,
        };
        let toc = parse_bytes(build_archive(&[entry])).unwrap();
        assert_eq!(toc.header.version, 12);
        assert_eq!(toc.header.table_offset, 40);
        assert_eq!(toc.hash_entries.len(), 1);
        assert_eq!(toc.hash_entries[0].hash, 0xDEAD_BEEF);
        assert_eq!(toc.hash_entries[0].digest, digest);
        assert_eq!(
            toc.hash_entries[0].resource_hash().to_string(),
            "0x00000000deadbeef"
        );
        assert_eq!(toc.hash_entries[0].digest_hex(), hex_of(&digest));
    }

    fn hex_of(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_bad_magic_in_file() {
        let mut data = build_archive(&sample_entries(1));
        data[0] = b'X';
        assert!(matches!(parse_bytes(data), Err(ArchiveError::Format(_))));
    }

    #[test]
    fn test_empty_source_is_format_error() {
        assert!(matches!(parse_bytes(Vec::new()), Err(ArchiveError::Format(_))));
    }

    #[test]
    fn test_table_offset_beyond_declared_size() {
        let mut data = header_bytes(12, 500, 100);
        data.extend(preamble_bytes(0));
        assert!(matches!(parse_bytes(data), Err(ArchiveError::Format(_))));
    }

    #[test]
    fn test_truncated_preamble() {
        let mut data = header_bytes(12, 40, 68);
        data.extend(&preamble_bytes(1)[..20]);
        assert!(matches!(parse_bytes(data), Err(ArchiveError::Truncated(_))));
    }

    #[test]
    fn test_truncated_hash_table() {
        let mut data = build_archive(&sample_entries(3));
        data.truncate(data.len() - 10);
        assert!(matches!(parse_bytes(data), Err(ArchiveError::Truncated(_))));
    }

    #[test]
    fn test_size_limit_checked_before_reading() {
        // Declares u32::MAX entries but carries none
        let mut data = header_bytes(12, 40, 68);
        data.extend(preamble_bytes(u32::MAX));
        match parse_bytes(data) {
            Err(ArchiveError::SizeLimit { declared, limit }) => {
                assert_eq!(declared, u64::from(u32::MAX) * HASH_ENTRY_SIZE as u64);
                assert_eq!(limit, MAX_HASH_TABLE_BYTES);
            }
            other => panic!("expected SizeLimit, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_limit() {
        let data = build_archive(&sample_entries(2));
        let err = parse_toc_from(&mut Cursor::new(data), HASH_ENTRY_SIZE as u64).unwrap_err();
        assert!(matches!(err, ArchiveError::SizeLimit { .. }));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let entries = sample_entries(2);
        let mut data = build_archive(&entries);
        data.extend_from_slice(&[0xFF; 64]);
        let toc = parse_bytes(data).unwrap();
        assert_eq!(toc.hash_entries, entries);
    }

    #[test]
    fn test_toc_after_payload_region() {
        let entries = sample_entries(1);
        let payload = vec![0xAB; 100];
        let table_offset = (HEADER_SIZE + payload.len()) as u64;
        let total = table_offset as usize + PREAMBLE_SIZE + HASH_ENTRY_SIZE;
        let mut data = header_bytes(12, table_offset, total as u64);
        data.extend(&payload);
        data.extend(preamble_bytes(1));
        data.extend(record_bytes(&entries[0]));
        assert_eq!(parse_bytes(data).unwrap().hash_entries, entries);
    }

    #[test]
    fn test_parse_toc_from_disk_is_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&build_archive(&sample_entries(5))).unwrap();
        file.flush().unwrap();

        let first = parse_toc(file.path()).unwrap();
        let second = parse_toc(file.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash_entries.len(), 5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_toc(Path::new("/nonexistent/x.archive")).unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }
}
