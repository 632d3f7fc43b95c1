mod extract_cases;

#[cfg(test)]
mod tests {
    use crate::tests::fixtures::{apk_with, sample_manifest};
    use crate::{get_manifest_properties, ManifestReader, ManifestValue};
    use std::io::Cursor;

    #[test]
    fn sample_apk_name_and_label() {
        let apk = apk_with(&[("AndroidManifest.xml", sample_manifest())]);
        let props = get_manifest_properties(Cursor::new(apk), &["label"]).unwrap();
        assert_eq!(props.get("label"), Some(&ManifestValue::Reference(0x7f0e_0001)));
    }

    #[test]
    fn reader_defaults() {
        let reader = ManifestReader::new();
        assert_eq!(reader.entry_name(), "AndroidManifest.xml");
        assert_eq!(reader.chunk_size(), 1024);
        assert_eq!(ManifestReader::new().with_chunk_size(0).chunk_size(), 1);
    }
}
