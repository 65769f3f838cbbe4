use std::path::Path;

use serde::{Deserialize, Serialize};

use super::DateFormat;

/// Settings for a blood bank directory.
///
/// The shelf life is deliberately absent: it is fixed at
/// [`SHELF_LIFE_DAYS`](super::SHELF_LIFE_DAYS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The number of digits in displayed unit and request ids.
    ///
    /// Digits are padded to this width with leading zeros, so with 3 digits
    /// the first request is shown as `REQ-001`.
    digits: usize,

    /// How dates are written on the command line.
    pub date_format: DateFormat,

    /// Whether expired stock is purged before a fulfilment run.
    pub purge_before_fulfil: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            digits: default_digits(),
            date_format: DateFormat::default(),
            purge_before_fulfil: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Renders the configuration as the TOML document [`Config::load`] reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))
    }

    /// Returns the number of digits ids are padded to.
    #[must_use]
    pub const fn digits(&self) -> usize {
        self.digits
    }

    /// Sets the id padding width.
    ///
    /// # Errors
    ///
    /// Returns an error if `digits` is zero.
    pub fn set_digits(&mut self, digits: usize) -> Result<(), String> {
        if digits == 0 {
            return Err("digits must be at least 1".to_string());
        }
        self.digits = digits;
        Ok(())
    }
}

const fn default_digits() -> usize {
    3
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_digits")]
        digits: usize,

        #[serde(default)]
        date_format: DateFormat,

        #[serde(default)]
        purge_before_fulfil: bool,
    },
}

impl From<Versions> for super::Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                digits,
                date_format,
                purge_before_fulfil,
            } => Self {
                // a zero width would render ids as bare prefixes
                digits: digits.max(1),
                date_format,
                purge_before_fulfil,
            },
        }
    }
}

impl From<super::Config> for Versions {
    fn from(config: super::Config) -> Self {
        Self::V1 {
            digits: config.digits,
            date_format: config.date_format,
            purge_before_fulfil: config.purge_before_fulfil,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\ndigits = 4\ndate_format = \"dmy\"\npurge_before_fulfil = true\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.digits(), 4);
        assert_eq!(config.date_format, DateFormat::Dmy);
        assert!(config.purge_before_fulfil);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\ndate_format = \"julian\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.set_digits(5).unwrap();
        config.date_format = DateFormat::Dmy;

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("_version = \"1\""));
    }

    #[test]
    fn zero_digits_is_rejected() {
        let mut config = Config::default();
        assert!(config.set_digits(0).is_err());
        assert_eq!(config.digits(), 3);
    }
}
