//! # APK manifest properties
//!
//! Pulls selected `<application>` attributes out of the binary `AndroidManifest.xml`
//! stored inside an APK, without building a document tree.
//!
//! ```no_run
//!  use apk_manifest_props::get_manifest_properties_from_path;
//!
//!  let props = get_manifest_properties_from_path("app.apk", &["name", "icon"]).unwrap();
//!  for (name, value) in &props {
//!      println!("{name} = {value}");
//!  }
//! ```
pub mod android;
#[cfg(test)]
mod tests;

pub use crate::android::binary_xml::ManifestValue;
pub use crate::android::error::{ManifestError, ManifestResult};
pub use crate::android::manifest::{
    extract, get_manifest_properties, get_manifest_properties_from_path, ManifestReader,
};
pub use crate::android::visitor::ManifestProperties;
