//! APK and binary `AndroidManifest.xml` access.

pub mod binary_xml;
pub mod demand;
pub mod error;
pub mod manifest;
pub mod visitor;
pub mod zip;
