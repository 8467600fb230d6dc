//! TOML-backed defaults for the CLI flags, so a repeated run over the same
//! problem set doesn't need to repeat them on every invocation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::graph::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatName {
    Adc2015,
    Adc2016,
    Adc2017,
}

impl From<FormatName> for Format {
    fn from(value: FormatName) -> Self {
        match value {
            FormatName::Adc2015 => Format::Adc2015,
            FormatName::Adc2016 => Format::Adc2016,
            FormatName::Adc2017 => Format::Adc2017,
        }
    }
}

/// Defaults for flags the CLI would otherwise require on every invocation.
/// Every field is optional; an absent field leaves the corresponding CLI
/// default (or lets an explicit flag win) untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub var_limit: Option<u32>,
    pub binary_encoding: Option<bool>,
    pub format: Option<FormatName>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses_to_all_defaults() {
        let config: Config = toml::from_str("").expect("empty toml is a valid config");
        assert_eq!(config.var_limit, None);
        assert_eq!(config.binary_encoding, None);
        assert_eq!(config.format, None);
    }

    #[test]
    fn fields_round_trip_through_toml() {
        let config = Config { var_limit: Some(500_000), binary_encoding: Some(true), format: Some(FormatName::Adc2017) };
        let text = toml::to_string(&config).expect("config serializes");
        let parsed: Config = toml::from_str(&text).expect("config round-trips");
        assert_eq!(parsed.var_limit, Some(500_000));
        assert_eq!(parsed.binary_encoding, Some(true));
        assert_eq!(parsed.format, Some(FormatName::Adc2017));
    }
}
