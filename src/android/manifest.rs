use crate::android::binary_xml::BinaryXmlEvents;
use crate::android::demand::DemandSet;
use crate::android::error::ManifestResult;
use crate::android::visitor::{collect_properties, ManifestProperties};
use crate::android::zip::{read_manifest_entry, ANDROID_MANIFEST, DEFAULT_CHUNK_SIZE};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Pull the demanded `<application>` attributes out of binary manifest bytes.
///
/// Demanded names that are absent from the document are absent from the result.
pub fn extract<S: AsRef<str>>(document: &[u8], demands: &[S]) -> ManifestResult<ManifestProperties> {
    let demands = DemandSet::new(demands);
    debug!(
        "extracting {} demanded attributes from {} bytes",
        demands.len(),
        document.len()
    );
    let events = BinaryXmlEvents::new(document)?;
    let properties = collect_properties(events, demands)?;
    debug!("extracted {} properties", properties.len());
    Ok(properties)
}

/// Read `AndroidManifest.xml` from an APK and extract the demanded `<application>` attributes.
///
/// # Examples
///
/// ```no_run
/// use apk_manifest_props::get_manifest_properties;
/// use std::fs::File;
///
/// let apk = File::open("app.apk").unwrap();
/// let props = get_manifest_properties(apk, &["name", "appComponentFactory"]).unwrap();
/// if let Some(name) = props.get("name") {
///     println!("application class: {name}");
/// }
/// ```
pub fn get_manifest_properties<R, S>(container: R, demands: &[S]) -> ManifestResult<ManifestProperties>
where
    R: Read + Seek,
    S: AsRef<str>,
{
    ManifestReader::new().read_properties(container, demands)
}

/// [`get_manifest_properties`] for an APK on disk.
pub fn get_manifest_properties_from_path<S: AsRef<str>>(
    apk_path: impl AsRef<Path>,
    demands: &[S],
) -> ManifestResult<ManifestProperties> {
    ManifestReader::new().read_properties_from_path(apk_path, demands)
}

/// Configurable manifest reader.
///
/// Defaults to the `AndroidManifest.xml` member and 1 KiB read chunks.
#[derive(Clone, Debug)]
pub struct ManifestReader {
    entry_name: String,
    chunk_size: usize,
}

impl Default for ManifestReader {
    fn default() -> Self {
        ManifestReader {
            entry_name: ANDROID_MANIFEST.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ManifestReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a different archive member, e.g. a split APK's manifest copied elsewhere.
    pub fn with_entry_name(mut self, entry_name: impl Into<String>) -> Self {
        self.entry_name = entry_name.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn read_manifest_bytes<R: Read + Seek>(&self, container: R) -> ManifestResult<Vec<u8>> {
        read_manifest_entry(container, &self.entry_name, self.chunk_size)
    }

    pub fn read_properties<R, S>(&self, container: R, demands: &[S]) -> ManifestResult<ManifestProperties>
    where
        R: Read + Seek,
        S: AsRef<str>,
    {
        let bytes = self.read_manifest_bytes(container)?;
        extract(&bytes, demands)
    }

    pub fn read_properties_from_path<S: AsRef<str>>(
        &self,
        apk_path: impl AsRef<Path>,
        demands: &[S],
    ) -> ManifestResult<ManifestProperties> {
        let apk_path = apk_path.as_ref();
        debug!("opening {}", apk_path.display());
        let file = File::open(apk_path)?;
        self.read_properties(BufReader::new(file), demands)
    }
}
