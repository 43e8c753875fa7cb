use flate2::read::GzDecoder;
use std::io::{self, Read};

// Upper bound on a decompressed event log, overridable with ELECTION_MAX_EVENTS_MB.
// Guards against gzip bombs exhausting memory.
pub const DEFAULT_MAX_DECOMPRESSED_EVENTS_BYTES: usize = 256 * 1024 * 1024; // 256 MiB

pub fn max_events_bytes() -> usize {
    std::env::var("ELECTION_MAX_EVENTS_MB")
        .ok()
        .and_then(|mb| mb.parse::<usize>().ok())
        .map_or(DEFAULT_MAX_DECOMPRESSED_EVENTS_BYTES, |mb| {
            mb.saturating_mul(1024 * 1024)
        })
}

pub fn read_all_with_limit<R: Read>(mut reader: R, max_size: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(std::cmp::min(max_size, 64 * 1024));
    let mut chunk = [0u8; 8192];
    let mut total = 0usize;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        total += n;
        if total > max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("event log exceeds {} bytes", max_size),
            ));
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

pub fn decompress_gzip_with_limit<R: Read>(reader: R, max_size: usize) -> io::Result<Vec<u8>> {
    read_all_with_limit(GzDecoder::new(reader), max_size)
}
