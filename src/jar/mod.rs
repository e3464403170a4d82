//! The JAR container reader: walks a ZIP Central Directory, inflates each
//! `.class` member, and hands the payload to the class-file parser.
//! Best-effort by design — a single malformed record stops the walk rather
//! than aborting every class already parsed.

pub mod format;

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::class::Class;
use crate::error::CoreResult;
use crate::jar::format::{CentralDirectoryRecord, EndOfCentralDirectory, LocalFileHeader};
use crate::reader::LittleEndianReader;

const COMPRESSION_STORED: u16 = 0;
const COMPRESSION_DEFLATE: u16 = 8;

/// Loads every `.class` member of a JAR (or a bare `.class` file, which a
/// caller should route to `Class::parse` directly instead of here).
pub fn load_jar(data: &[u8]) -> CoreResult<Vec<Class>> {
    let eocd = EndOfCentralDirectory::locate(data)?;
    debug!(
        "EOCD found: {} record(s), central directory at offset {}",
        eocd.total_records, eocd.central_directory_offset
    );

    let mut classes = Vec::new();
    let mut reader = LittleEndianReader::new(&data[eocd.central_directory_offset as usize..]);

    for i in 0..eocd.total_records {
        let record = match CentralDirectoryRecord::read(&mut reader) {
            Ok(r) => r,
            Err(e) => {
                warn!("central directory record {} malformed, stopping walk: {}", i, e);
                break;
            }
        };

        // Every record's local header is verified before any name/size
        // filtering, per the spec's unconditional per-record check: a
        // truncated archive must stop the walk even for an entry that
        // would otherwise have been skipped.
        let local = match LocalFileHeader::read_at(data, record.local_header_offset as usize) {
            Ok(h) => h,
            Err(e) => {
                warn!("local header for {:?} malformed, stopping walk: {}", record.file_name, e);
                break;
            }
        };

        if !record.file_name.ends_with(".class") {
            trace!("skipping non-class entry {:?}", record.file_name);
            continue;
        }
        if record.compressed_size == 0 || record.uncompressed_size == 0 {
            trace!("skipping empty entry {:?}", record.file_name);
            continue;
        }

        let payload_start = record.local_header_offset as usize + local.header_len;
        let payload_end = payload_start + record.compressed_size as usize;
        if payload_end > data.len() {
            warn!("entry {:?} payload runs past end of file, stopping walk", record.file_name);
            break;
        }
        let compressed = &data[payload_start..payload_end];

        let bytes = match record.compression {
            COMPRESSION_STORED => compressed.to_vec(),
            COMPRESSION_DEFLATE => {
                let mut decoder = DeflateDecoder::new(compressed);
                let mut out = Vec::with_capacity(record.uncompressed_size as usize);
                if let Err(e) = decoder.read_to_end(&mut out) {
                    warn!("failed to inflate {:?}: {}", record.file_name, e);
                    continue;
                }
                if out.len() != record.uncompressed_size as usize {
                    warn!(
                        "inflated {:?} to {} bytes, expected {}",
                        record.file_name,
                        out.len(),
                        record.uncompressed_size
                    );
                    continue;
                }
                out
            }
            other => {
                warn!("entry {:?} uses unsupported compression method {}, skipping", record.file_name, other);
                continue;
            }
        };

        match Class::parse(&bytes) {
            Ok(class) => classes.push(class),
            Err(e) => warn!("failed to parse {:?}: {}", record.file_name, e),
        }
    }

    Ok(classes)
}
