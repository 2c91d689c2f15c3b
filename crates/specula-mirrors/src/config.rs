//! Configuration (specula.toml)
//!
//! ```toml
//! [resolver]
//! roots = [{ path = "/srv/app/lib", package = "app" }]
//! namespaces = { Net = "net-stack" }
//!
//! [output]
//! color = "auto"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "SPECULA_CONFIG";

/// Default configuration file name
pub const CONFIG_FILE: &str = "specula.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpeculaConfig {
    /// Package attribution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Terminal output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Package attribution settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolverConfig {
    /// Directories whose files belong to a named package
    #[serde(default)]
    pub roots: Vec<PackageRoot>,

    /// Top-level namespace to package name
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
}

/// A directory mapped to a package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageRoot {
    /// Directory prefix
    pub path: PathBuf,
    /// Package name
    pub package: String,
}

/// Terminal output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Colour policy
    #[serde(default)]
    pub color: ColorMode,
}

/// When to colour output
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Colour when writing to a terminal
    #[default]
    Auto,
    /// Always colour
    Always,
    /// Never colour
    Never,
}

impl SpeculaConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: SpeculaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `$SPECULA_CONFIG`, else `./specula.toml`, else defaults
    pub fn discover() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for root in &self.resolver.roots {
            if root.path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Package root for '{}' has an empty path",
                    root.package
                )));
            }
            if root.package.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Package root {} has an empty package name",
                    root.path.display()
                )));
            }
        }

        for (namespace, package) in &self.resolver.namespaces {
            if !specula_runtime::runtime::is_constant_name(namespace) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid namespace: {}. Must be a constant name",
                    namespace
                )));
            }
            if package.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Namespace '{}' maps to an empty package name",
                    namespace
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[resolver]
roots = [{ path = "/srv/app/lib", package = "app" }]
namespaces = { Net = "net-stack" }

[output]
color = "never"
"#;
        let config = SpeculaConfig::from_str(toml).unwrap();
        assert_eq!(config.resolver.roots.len(), 1);
        assert_eq!(config.resolver.roots[0].package, "app");
        assert_eq!(config.resolver.namespaces.get("Net").map(String::as_str), Some("net-stack"));
        assert_eq!(config.output.color, ColorMode::Never);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SpeculaConfig::from_str("").unwrap();
        assert_eq!(config, SpeculaConfig::default());
        assert_eq!(config.output.color, ColorMode::Auto);
    }

    #[test]
    fn test_invalid_namespace() {
        let src = "[resolver]\nnamespaces = { net = \"x\" }\n";
        let err = SpeculaConfig::from_str(src).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_empty_package_name() {
        let src = "[resolver]\nroots = [{ path = \"lib\", package = \"\" }]\n";
        let err = SpeculaConfig::from_str(src).unwrap_err();
        assert!(err.to_string().contains("empty package name"));
    }

    #[test]
    fn test_bad_color() {
        let err = SpeculaConfig::from_str("[output]\ncolor = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\ncolor = \"always\"").unwrap();
        let config = SpeculaConfig::from_file(file.path()).unwrap();
        assert_eq!(config.output.color, ColorMode::Always);
    }

    #[test]
    fn test_missing_file() {
        let err = SpeculaConfig::from_file(Path::new("/nonexistent/specula.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
