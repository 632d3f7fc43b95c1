use crate::android::error::{ManifestError, ManifestResult};
use log::{debug, trace};
use std::io::{self, Read, Seek};
use zip::read::ZipArchive;
use zip::result::ZipError;

/// Member name of the compiled manifest inside an APK.
pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// Chunk size used by [`read_to_vec`] when the caller has no preference.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Read `reader` to exhaustion, `chunk_size` bytes at a time, into one buffer.
///
/// Interrupted reads are retried. Any other error is returned as is; a partially
/// filled buffer is never handed back.
pub fn read_to_vec(mut reader: impl Read, chunk_size: usize) -> io::Result<Vec<u8>> {
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut data = Vec::new();
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(data)
}

/// Locate `entry_name` inside a ZIP/APK container and read its full contents.
pub fn read_manifest_entry<R: Read + Seek>(
    container: R,
    entry_name: &str,
    chunk_size: usize,
) -> ManifestResult<Vec<u8>> {
    let mut archive = ZipArchive::new(container)?;
    let entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ManifestError::NotFound(entry_name.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    if entry.is_dir() {
        return Err(ManifestError::NotFound(entry_name.to_string()));
    }
    let expected = entry.size();
    trace!(
        "reading {entry_name}: {expected} bytes ({} compressed)",
        entry.compressed_size()
    );
    let data = read_to_vec(entry, chunk_size)?;
    if data.len() as u64 != expected {
        return Err(ManifestError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{entry_name}: read {} of {expected} bytes",
                data.len()
            ),
        )));
    }
    debug!("read {} bytes from {entry_name}", data.len());
    Ok(data)
}
