//! Raw ZIP structure decoding: End-of-Central-Directory, Central Directory
//! File Header, and Local File Header. All three are little-endian, unlike
//! the class file format, so every read here goes through a
//! `LittleEndianReader`.

use crate::error::{CoreError, CoreResult};
use crate::reader::{ByteCursor, LittleEndianReader};

pub const EOCD_MAGIC: u32 = 0x0605_4B50;
pub const CENTRAL_DIRECTORY_MAGIC: u32 = 0x0201_4B50;
pub const LOCAL_HEADER_MAGIC: u32 = 0x0403_4B50;

/// Fixed EOCD size sans the trailing comment.
pub const EOCD_FIXED_LEN: usize = 22;
/// `u16::MAX` comment length plus the fixed record.
pub const EOCD_MAX_LEN: usize = EOCD_FIXED_LEN + u16::MAX as usize;

#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub total_records: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
}

impl EndOfCentralDirectory {
    /// Scans `data` backward for the EOCD magic, bounded by the maximum
    /// possible comment length, and decodes the fixed-size fields.
    pub fn locate(data: &[u8]) -> CoreResult<Self> {
        if data.len() < EOCD_FIXED_LEN {
            return Err(CoreError::JarUnderflow { len: data.len() });
        }

        let scan_from = data.len().saturating_sub(EOCD_MAX_LEN);
        let window = &data[scan_from..];

        let magic_pos = window
            .windows(4)
            .rposition(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == EOCD_MAGIC)
            .ok_or(CoreError::JarBadMagic { found: 0 })?;

        let record = &window[magic_pos..];
        if record.len() < EOCD_FIXED_LEN {
            return Err(CoreError::JarBadMagic { found: 0 });
        }

        let mut reader = LittleEndianReader::new(record);
        let magic = reader.read_u32()?;
        if magic != EOCD_MAGIC {
            return Err(CoreError::JarBadMagic { found: magic });
        }

        let _disk_number = reader.read_u16()?;
        let _cd_start_disk = reader.read_u16()?;
        let _entries_this_disk = reader.read_u16()?;
        let total_records = reader.read_u16()?;
        let central_directory_size = reader.read_u32()?;
        let central_directory_offset = reader.read_u32()?;

        Ok(EndOfCentralDirectory {
            total_records,
            central_directory_size,
            central_directory_offset,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CentralDirectoryRecord {
    pub compression: u16,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    pub file_name: String,
}

impl CentralDirectoryRecord {
    /// Reads one record starting at the reader's current head, leaving it
    /// positioned at the start of the next record.
    pub fn read(reader: &mut LittleEndianReader) -> CoreResult<Self> {
        let magic = reader.read_u32()?;
        if magic != CENTRAL_DIRECTORY_MAGIC {
            return Err(CoreError::JarBadMagic { found: magic });
        }

        let _version_made_by = reader.read_u16()?;
        let _version_needed = reader.read_u16()?;
        let _flags = reader.read_u16()?;
        let compression = reader.read_u16()?;
        let _mod_time = reader.read_u16()?;
        let _mod_date = reader.read_u16()?;
        let _crc32 = reader.read_u32()?;
        let compressed_size = reader.read_u32()?;
        let uncompressed_size = reader.read_u32()?;
        let name_len = reader.read_u16()?;
        let extra_len = reader.read_u16()?;
        let comment_len = reader.read_u16()?;
        let _disk_number_start = reader.read_u16()?;
        let _internal_attrs = reader.read_u16()?;
        let _external_attrs = reader.read_u32()?;
        let local_header_offset = reader.read_u32()?;

        let file_name = String::from_utf8_lossy(reader.read_bytes(name_len as usize)?).into_owned();
        reader.read_bytes(extra_len as usize)?;
        reader.read_bytes(comment_len as usize)?;

        Ok(CentralDirectoryRecord {
            compression,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            file_name,
        })
    }
}

/// Just enough of the local header to find where the payload starts: the
/// variable-length name/extra fields after the fixed header push the
/// payload offset forward by an amount only this record can tell us.
pub struct LocalFileHeader {
    pub header_len: usize,
}

impl LocalFileHeader {
    pub fn read_at(data: &[u8], offset: usize) -> CoreResult<Self> {
        if offset + 30 > data.len() {
            return Err(CoreError::JarUnderflow { len: data.len() });
        }

        let mut reader = LittleEndianReader::new(&data[offset..]);
        let magic = reader.read_u32()?;
        if magic != LOCAL_HEADER_MAGIC {
            return Err(CoreError::JarBadMagic { found: magic });
        }

        reader.read_u16()?; // version needed
        reader.read_u16()?; // flags
        reader.read_u16()?; // compression (ignored; CD record is authoritative)
        reader.read_u16()?; // mod time
        reader.read_u16()?; // mod date
        reader.read_u32()?; // crc32
        reader.read_u32()?; // compressed size
        reader.read_u32()?; // uncompressed size
        let name_len = reader.read_u16()?;
        let extra_len = reader.read_u16()?;

        Ok(LocalFileHeader {
            header_len: 30 + name_len as usize + extra_len as usize,
        })
    }
}
