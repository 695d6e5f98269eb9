//! INI configuration adapter.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| TraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[strategy]
ema_short = 12
ema_long = 26
atr_multiplier = 2.5
stop_policy = recomputed

[backtest]
initial_capital = 25000.0
circuit_breaker = yes

[optimizer]
ema_short = 10, 15 ,20
"#;

    #[test]
    fn reads_values() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("strategy", "ema_short"), Some("12".to_string()));
        assert_eq!(
            adapter.get_string("strategy", "atr_multiplier"),
            Some("2.5".to_string())
        );
        assert!(adapter.get_bool("backtest", "circuit_breaker", false));
        assert_eq!(
            adapter.get_string("strategy", "stop_policy"),
            Some("recomputed".to_string())
        );
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("strategy", "missing"), None);
        assert_eq!(adapter.get_string("nowhere", "ema_short"), None);
        assert!(!adapter.get_bool("backtest", "missing", false));
    }

    #[test]
    fn unparsable_bool_uses_default() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ncircuit_breaker = maybe\n").unwrap();
        assert!(adapter.get_bool("backtest", "circuit_breaker", true));
        assert!(!adapter.get_bool("backtest", "circuit_breaker", false));
    }

    #[test]
    fn list_values_are_trimmed() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.get_list("optimizer", "ema_short"),
            vec!["10", "15", "20"]
        );
        assert!(adapter.get_list("optimizer", "ema_long").is_empty());
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool("On"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[risk]\nsizing = kelly\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("risk", "sizing"), Some("kelly".to_string()));
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(TraderError::ConfigParse { .. })));
    }
}
