use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Prefix that distinguishes test files from component files on disk.
pub const TEST_PREFIX: &str = "test_";
/// Extension of every persisted artifact file.
pub const ARTIFACT_EXTENSION: &str = "py";

/// The component source has no `def <name>(` to derive a file name from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("component source has no `def <name>(` definition to derive a name from")]
pub struct MalformedComponentSource;

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bdef\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"))
}

/// Name of a generated component, taken from its first function definition.
///
/// Doubles as the artifact file stem and as the import name used by the
/// generated test, so it is always a plain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentName(String);

impl ComponentName {
    /// Derives the name from the first `def <identifier>(` in `source`.
    pub fn from_source(source: &str) -> Result<Self, MalformedComponentSource> {
        def_re()
            .captures(source)
            .and_then(|captures| captures.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or(MalformedComponentSource)
    }

    /// Validates a name given directly, e.g. on the command line.
    pub fn parse(name: &str) -> Result<Self, MalformedComponentSource> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(name.to_string()))
        } else {
            Err(MalformedComponentSource)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn component_file_name(&self) -> String {
        format!("{}.{}", self.0, ARTIFACT_EXTENSION)
    }

    pub fn test_file_name(&self) -> String {
        format!("{}{}.{}", TEST_PREFIX, self.0, ARTIFACT_EXTENSION)
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ComponentName {
    type Error = MalformedComponentSource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentName> for String {
    fn from(value: ComponentName) -> Self {
        value.0
    }
}

/// Which half of a persisted artifact pair to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Component,
    Test,
}

/// A persisted component source and its optional test source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: ComponentName,
    pub component_code: String,
    pub test_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_first_def() {
        let source = "from kfp.v2.dsl import component\n\n@component()\ndef ingest_csv(path: str) -> None:\n    def helper(x):\n        pass\n";
        let name = ComponentName::from_source(source).unwrap();
        assert_eq!(name.as_str(), "ingest_csv");
        assert_eq!(name.component_file_name(), "ingest_csv.py");
        assert_eq!(name.test_file_name(), "test_ingest_csv.py");
    }

    #[test]
    fn test_name_allows_space_before_paren() {
        let name = ComponentName::from_source("def foo (x):\n    return x\n").unwrap();
        assert_eq!(name.as_str(), "foo");
    }

    #[test]
    fn test_missing_def_is_malformed() {
        assert_eq!(
            ComponentName::from_source("print('hello')"),
            Err(MalformedComponentSource)
        );
        assert_eq!(
            ComponentName::from_source("No input description..."),
            Err(MalformedComponentSource)
        );
    }

    #[test]
    fn test_def_inside_identifier_is_ignored() {
        assert_eq!(
            ComponentName::from_source("undef foo(x)"),
            Err(MalformedComponentSource)
        );
    }

    #[test]
    fn test_parse_rejects_paths() {
        assert!(ComponentName::parse("ingest_csv").is_ok());
        assert!(ComponentName::parse("../etc/passwd").is_err());
        assert!(ComponentName::parse("").is_err());
        assert!(ComponentName::parse("9lives").is_err());
    }
}
