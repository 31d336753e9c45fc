//! Command line configuration for `hsc`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HSC_PROPERTIES` | | Property file to load |
//! | `HSC_ROOT` | helios | Namespace root |
//! | `HSC_LOG_LEVEL` | info | Log level |
//! | `HSC_FORMAT` | text | Report format (`text` or `json`) |
//!
//! `RUST_LOG`, when set, takes precedence over `HSC_LOG_LEVEL`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use helios_slice::Properties;

/// Output format of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON document.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parses a `KEY=VALUE` override.
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{}\"", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in \"{}\"", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Helios slice configuration checker.
#[derive(Debug, Clone, Parser)]
#[command(name = "hsc")]
#[command(about = "Verify and report a Helios slice configuration")]
pub struct CliConfig {
    /// Property file holding the slice configuration.
    #[arg(short, long, env = "HSC_PROPERTIES")]
    pub properties: Option<PathBuf>,

    /// Namespace root of the property keys.
    #[arg(long, env = "HSC_ROOT", default_value = "helios")]
    pub root: String,

    /// Property override, applied after the file (repeatable).
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub overrides: Vec<(String, String)>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HSC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Report format (text, json).
    #[arg(long, env = "HSC_FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Report the configuration without connecting to any slice.
    #[arg(long)]
    pub no_verify: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            properties: None,
            root: "helios".to_string(),
            overrides: Vec::new(),
            log_level: "info".to_string(),
            format: OutputFormat::Text,
            no_verify: false,
        }
    }
}

impl CliConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.properties.is_none() && self.overrides.is_empty() {
            errors.push("No properties given: pass --properties or --set".to_string());
        }

        if self.root.trim().is_empty() || self.root.contains('.') {
            errors.push(format!("Invalid namespace root \"{}\"", self.root));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Loads the property file, then applies the overrides in order.
    pub fn load_properties(&self) -> anyhow::Result<Properties> {
        let mut props = match &self.properties {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Properties::parse(&text)
            }
            None => Properties::new(),
        };
        for (key, value) in &self.overrides {
            props.insert(key.as_str(), value.as_str());
        }
        Ok(props)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("helios.slice.Names = a,b").unwrap(),
            ("helios.slice.Names".to_string(), "a,b".to_string())
        );
        assert_eq!(
            parse_assignment("k=v=w").unwrap(),
            ("k".to_string(), "v=w".to_string())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=v").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let config = CliConfig::try_parse_from([
            "hsc",
            "--set",
            "helios.slice.Names=east",
            "--set",
            "helios.slice.Lenient=true",
            "--format",
            "json",
            "--no-verify",
        ])
        .unwrap();

        assert_eq!(config.overrides.len(), 2);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.no_verify);
        assert_eq!(config.root, "helios");
    }

    #[test]
    fn test_validate_requires_properties() {
        let result = CliConfig::default().validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().iter().any(|e| e.contains("No properties")));
    }

    #[test]
    fn test_validate_rejects_dotted_root() {
        let config = CliConfig {
            root: "a.b".to_string(),
            overrides: vec![("k".to_string(), "v".to_string())],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "helios.slice.Names=east,west").unwrap();
        writeln!(file, "helios.slice.Lenient=false").unwrap();

        let config = CliConfig {
            properties: Some(file.path().to_path_buf()),
            overrides: vec![("helios.slice.Lenient".to_string(), "true".to_string())],
            ..Default::default()
        };
        let props = config.load_properties().unwrap();
        assert_eq!(props.get("helios.slice.Names"), Some("east,west"));
        assert_eq!(props.get("helios.slice.Lenient"), Some("true"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let config = CliConfig {
            properties: Some(PathBuf::from("/nonexistent/slices.properties")),
            ..Default::default()
        };
        assert!(config.load_properties().is_err());
    }
}
