//! Engine configuration.
//!
//! An optional TOML file supplies defaults; command-line flags are merged on
//! top. The result is built once at startup and never changes afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::SourceSpec;
use crate::error::{Error, Result};
use crate::parse::SourceKind;

pub const DEFAULT_CONFIG_FILE: &str = ".linkscout.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Documents to index, in declaration order.
    pub sources: Vec<SourceSpec>,
    /// Reject `linkSet` requests.
    pub disable_link_set: bool,
    /// Schemes recognized in outline links besides the built-in ones.
    pub extra_schemes: Vec<String>,
}

impl EngineConfig {
    /// Load `path`, or return the default configuration if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            path: display.clone(),
            message: e.to_string(),
        })?;
        Self::from_toml(&display, &content)
    }

    pub fn from_toml(origin: &str, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Append sources given on the command line.
    pub fn add_sources<I, S>(&mut self, kind: Option<SourceKind>, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.extend(paths.into_iter().map(|path| match kind {
            Some(kind) => SourceSpec::new(path, kind),
            None => SourceSpec::infer(path),
        }));
    }

    pub fn add_schemes<I, S>(&mut self, schemes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_schemes.extend(schemes.into_iter().map(Into::into));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(!config.disable_link_set);
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
disable_link_set = true
extra_schemes = ["news"]

[[sources]]
path = "inbox.org"

[[sources]]
path = "-"
kind = "txt"
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(config.disable_link_set);
        assert_eq!(config.extra_schemes, vec!["news"]);
        assert_eq!(
            config.sources,
            vec![
                SourceSpec::new("inbox.org", SourceKind::Outline),
                SourceSpec::new("-", SourceKind::PlainText),
            ]
        );
    }

    #[test]
    fn test_malformed_file() {
        let err = EngineConfig::from_toml("bad.toml", "sources = 3").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        let err = EngineConfig::from_toml("bad.toml", "sourcez = []").unwrap_err();
        assert!(err.to_string().starts_with("invalid config bad.toml"));
    }

    #[test]
    fn test_merge_command_line() {
        let mut config = EngineConfig::from_toml("cfg", "[[sources]]\npath = \"a.txt\"\n").unwrap();
        config.add_sources(Some(SourceKind::Outline), ["b.txt"]);
        config.add_sources(None, vec!["c.org".to_string(), "d.md".to_string()]);
        config.add_schemes(["news"]);

        let kinds: Vec<(&str, SourceKind)> = config
            .sources
            .iter()
            .map(|s| (s.path.as_str(), s.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a.txt", SourceKind::PlainText),
                ("b.txt", SourceKind::Outline),
                ("c.org", SourceKind::Outline),
                ("d.md", SourceKind::PlainText),
            ]
        );
        assert_eq!(config.extra_schemes, vec!["news"]);
    }
}
