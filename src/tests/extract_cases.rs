#[cfg(test)]
mod tests {
    use crate::tests::fixtures::{apk_with, sample_manifest, AttrValue, DocumentBuilder};
    use crate::{
        extract, get_manifest_properties, get_manifest_properties_from_path, ManifestError,
        ManifestProperties, ManifestReader, ManifestValue,
    };
    use std::io::Cursor;

    fn props(entries: &[(&str, ManifestValue)]) -> ManifestProperties {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn no_application_element_yields_empty_map() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .attr("package", AttrValue::string("com.example"))
            .start("uses-permission")
            .android_attr("name", AttrValue::string("android.permission.CAMERA"))
            .end()
            .end()
            .build();
        let result = extract(&bytes, &["name", "package"]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn name_present_icon_absent() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("name", AttrValue::string("com.example.App"))
            .android_attr("allowBackup", AttrValue::Boolean(true))
            .end()
            .end()
            .build();
        let result = extract(&bytes, &["name", "icon"]).unwrap();
        assert_eq!(result, props(&[("name", ManifestValue::from("com.example.App"))]));
        assert!(!result.contains_key("icon"));
    }

    #[test]
    fn nested_children_do_not_leak_into_application() {
        let result = extract(&sample_manifest(), &["name"]).unwrap();
        assert_eq!(result, props(&[("name", ManifestValue::from("com.example.App"))]));

        // `icon` only appears on the activity.
        let result = extract(&sample_manifest(), &["icon"]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn repeated_attribute_last_occurrence_wins() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("name", AttrValue::string("com.example.First"))
            .android_attr("name", AttrValue::string("com.example.Second"))
            .end()
            .end()
            .build();
        let result = extract(&bytes, &["name"]).unwrap();
        assert_eq!(result["name"], ManifestValue::from("com.example.Second"));
    }

    #[test]
    fn second_application_element_wins() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("name", AttrValue::string("com.example.First"))
            .end()
            .start("application")
            .android_attr("name", AttrValue::string("com.example.Second"))
            .end()
            .end()
            .build();
        let result = extract(&bytes, &["name"]).unwrap();
        assert_eq!(result, props(&[("name", ManifestValue::from("com.example.Second"))]));
    }

    #[test]
    fn each_application_commits_its_own_capture() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("label", AttrValue::Reference(0x7f0e_0001))
            .end()
            .start("application")
            .android_attr("debuggable", AttrValue::Boolean(true))
            .end()
            .end()
            .build();
        let result = extract(&bytes, &["label", "debuggable"]).unwrap();
        assert_eq!(
            result,
            props(&[
                ("label", ManifestValue::Reference(0x7f0e_0001)),
                ("debuggable", ManifestValue::Boolean(true)),
            ])
        );
    }

    #[test]
    fn absent_demands_produce_no_entries() {
        let result = extract(&sample_manifest(), &["appComponentFactory", "", "NAME"]).unwrap();
        assert!(result.is_empty());

        let none: [&str; 0] = [];
        assert!(extract(&sample_manifest(), &none).unwrap().is_empty());
    }

    #[test]
    fn typed_values_pass_through_unresolved() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("theme", AttrValue::Reference(0x7f13_0005))
            .end()
            .end()
            .build();
        let demands = vec!["theme".to_string()];
        let result = extract(&bytes, &demands).unwrap();
        assert_eq!(result["theme"].as_reference_id(), Some(0x7f13_0005));
        assert_eq!(result["theme"].to_string(), "@0x7f130005");
    }

    #[test]
    fn corrupted_buffer_is_malformed() {
        let bytes = sample_manifest();
        // Drop the tail so the document ends inside its closing chunks.
        let truncated = &bytes[..bytes.len() - 70];
        let err = extract(truncated, &["name"]).expect_err("truncated document");
        assert!(err.is_malformed(), "unexpected error: {err}");

        let broken = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("name", AttrValue::string("com.example.App"))
            .end()
            .end()
            .with_attribute_count_override("application", 3)
            .build();
        let err = extract(&broken, &["name"]).expect_err("attribute past chunk end");
        assert!(matches!(err, ManifestError::MalformedDocument(_)));

        assert!(extract(&[], &["name"]).unwrap_err().is_malformed());
        assert!(extract(b"PK\x03\x04 not binary xml", &["name"]).unwrap_err().is_malformed());
    }

    #[test]
    fn end_to_end_from_apk() {
        let apk = apk_with(&[
            ("classes.dex", b"dex\n035\0".to_vec()),
            ("AndroidManifest.xml", sample_manifest()),
        ]);
        let result = get_manifest_properties(Cursor::new(apk.clone()), &["name", "icon"]).unwrap();
        assert_eq!(result, props(&[("name", ManifestValue::from("com.example.App"))]));

        let result = ManifestReader::new()
            .with_chunk_size(5)
            .read_properties(Cursor::new(apk), &["label"])
            .unwrap();
        assert_eq!(result, props(&[("label", ManifestValue::Reference(0x7f0e_0001))]));
    }

    #[test]
    fn custom_entry_name() {
        let apk = apk_with(&[("manifest/AndroidManifest.xml", sample_manifest())]);
        let reader = ManifestReader::new().with_entry_name("manifest/AndroidManifest.xml");
        let result = reader.read_properties(Cursor::new(apk.clone()), &["name"]).unwrap();
        assert_eq!(result["name"], ManifestValue::from("com.example.App"));

        let err = get_manifest_properties(Cursor::new(apk), &["name"]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn malformed_manifest_inside_apk() {
        let apk = apk_with(&[("AndroidManifest.xml", b"<manifest/>".to_vec())]);
        let err = get_manifest_properties(Cursor::new(apk), &["name"]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn missing_apk_file_is_io_failure() {
        let path = std::env::temp_dir().join("apk-manifest-props-does-not-exist.apk");
        let err = get_manifest_properties_from_path(&path, &["name"]).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }

    #[test]
    fn reads_apk_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "apk-manifest-props-{}.apk",
            std::process::id()
        ));
        std::fs::write(&path, apk_with(&[("AndroidManifest.xml", sample_manifest())])).unwrap();
        let result = get_manifest_properties_from_path(&path, &["name"]);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            result.unwrap(),
            props(&[("name", ManifestValue::from("com.example.App"))])
        );
    }

    #[test]
    fn properties_serialize_as_plain_values() {
        let bytes = DocumentBuilder::new()
            .start("manifest")
            .start("application")
            .android_attr("debuggable", AttrValue::Boolean(true))
            .end()
            .start("application")
            .android_attr("name", AttrValue::string("com.example.App"))
            .end()
            .start("application")
            .android_attr("label", AttrValue::Reference(16))
            .end()
            .end()
            .build();
        let result = extract(&bytes, &["name", "debuggable", "label"]).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"debuggable":true,"label":16,"name":"com.example.App"}"#
        );
    }
}
