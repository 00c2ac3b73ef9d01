//! Package manifest (`.nuspec`) parsing.
//!
//! The element names are a contract with the packaging tool; only the
//! handful of fields the bootstrapper consumes are pulled out. Absent
//! elements mean "no constraint", so every field is optional.

use thiserror::Error;

/// Error raised for XML the parser cannot make sense of.
#[derive(Error, Debug)]
#[error("XML parse error: {0}")]
pub struct ManifestError(String);

/// Compatibility metadata extracted from the bundle's manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Package identifier, used in diagnostics.
    pub id: Option<String>,
    /// Human-readable package title, used in diagnostics.
    pub title: Option<String>,
    /// Minimum OS version the package supports.
    pub minimum_os_version: Option<String>,
    /// CPU architecture the package was built for.
    pub machine_architecture: Option<String>,
}

impl Manifest {
    /// Parse a manifest document, capturing the known elements wherever
    /// they sit in the tree.
    pub fn parse(xml: &str) -> Result<Self, ManifestError> {
        use quick_xml::Reader;
        use quick_xml::events::Event;

        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<String> = Vec::new();
        let mut manifest = Self::default();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Text(ref e)) => {
                    let Some(element) = stack.last() else { continue };
                    let text = e.unescape().unwrap_or_default();
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    match element.as_str() {
                        "id" => manifest.id = Some(text.to_string()),
                        "title" => manifest.title = Some(text.to_string()),
                        "minimumWindowsVersion" => {
                            manifest.minimum_os_version = Some(text.to_string());
                        }
                        "machineArchitecture" => {
                            manifest.machine_architecture = Some(text.to_string());
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(ManifestError(e.to_string())),
            }
        }

        Ok(manifest)
    }

    /// Name to show the user for this package: title, id, or nothing.
    pub fn display_name(&self) -> Option<&str> {
        self.title.as_deref().or(self.id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2010/07/nuspec.xsd">
  <metadata>
    <id>demo-app</id>
    <version>1.2.3</version>
    <title>Demo App</title>
    <machineArchitecture>arm64</machineArchitecture>
    <minimumWindowsVersion>10.0.17763</minimumWindowsVersion>
  </metadata>
</package>"#;

        let manifest = Manifest::parse(xml).unwrap();
        assert_eq!(manifest.id.as_deref(), Some("demo-app"));
        assert_eq!(manifest.title.as_deref(), Some("Demo App"));
        assert_eq!(manifest.machine_architecture.as_deref(), Some("arm64"));
        assert_eq!(manifest.minimum_os_version.as_deref(), Some("10.0.17763"));
        assert_eq!(manifest.display_name(), Some("Demo App"));
    }

    #[test]
    fn test_absent_elements_are_none() {
        let manifest = Manifest::parse("<package><metadata><id>x</id></metadata></package>").unwrap();
        assert_eq!(manifest.id.as_deref(), Some("x"));
        assert!(manifest.minimum_os_version.is_none());
        assert!(manifest.machine_architecture.is_none());
        assert_eq!(manifest.display_name(), Some("x"));
    }

    #[test]
    fn test_namespaced_elements_match_by_local_name() {
        let xml = r#"<ns:package xmlns:ns="urn:x"><ns:machineArchitecture>x64</ns:machineArchitecture></ns:package>"#;
        let manifest = Manifest::parse(xml).unwrap();
        assert_eq!(manifest.machine_architecture.as_deref(), Some("x64"));
    }

    #[test]
    fn test_malformed_xml_errors() {
        assert!(Manifest::parse("<a></b>").is_err());
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = "<package><title>A &amp; B</title></package>";
        let manifest = Manifest::parse(xml).unwrap();
        assert_eq!(manifest.title.as_deref(), Some("A & B"));
    }
}
