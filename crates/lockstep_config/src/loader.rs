//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::resolve_schemas;
use crate::types::LockstepConfig;
use lockstep_common::Frequency;
use std::path::Path;

/// File name looked up in a project directory.
pub const CONFIG_FILE: &str = "lockstep.toml";

/// Loads and validates `lockstep.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<LockstepConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE))?;
    load_config_from_str(&content)
}

/// Parses and validates a `lockstep.toml` from a string.
pub fn load_config_from_str(content: &str) -> Result<LockstepConfig, ConfigError> {
    let config: LockstepConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks values that deserialization alone cannot.
fn validate_config(config: &LockstepConfig) -> Result<(), ConfigError> {
    if config.simulation.max_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.max_cycles must be positive".to_string(),
        ));
    }
    config
        .simulation
        .clock
        .parse::<Frequency>()
        .map_err(|e| ConfigError::ValidationError(format!("simulation.clock: {e}")))?;
    if config.trace.enabled && config.trace.path.is_none() {
        return Err(ConfigError::ValidationError(
            "trace.path is required when trace.enabled is set".to_string(),
        ));
    }
    if config.log.level.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "log.level must not be empty".to_string(),
        ));
    }
    resolve_schemas(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraceFormat;
    use lockstep_ir::SchemaError;
    use lockstep_sim::TieBreak;

    #[test]
    fn empty_file_gives_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.simulation.max_cycles, 1000);
        assert!(!config.simulation.parallel);
        assert_eq!(config.simulation.tie_break, TieBreak::Declaration);
        assert_eq!(config.simulation.clock, "100MHz");
        assert!(!config.trace.enabled);
        assert_eq!(config.trace.format, TraceFormat::Vcd);
        assert_eq!(config.log.level, "info");
        assert!(config.buses.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[simulation]
max_cycles = 250
parallel = true
tie_break = { seed = 7 }
clock = "50MHz"

[trace]
enabled = true
format = "json"
path = "out/run.json"

[log]
level = "lockstep_sim=debug"

[buses.Input]
signals = [
    { name = "Valid", type = "bool", init = false },
    { name = "NextValue", type = "i32" },
]

[buses.Output]
signals = [
    { name = "Valid", type = "bool", init = false },
    { name = "Value", type = "i32", init = 0 },
]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.simulation.max_cycles, 250);
        assert!(config.simulation.parallel);
        assert_eq!(config.simulation.tie_break, TieBreak::Seeded(7));
        assert!(config.trace.enabled);
        assert_eq!(config.trace.format, TraceFormat::Json);
        assert_eq!(config.log.level, "lockstep_sim=debug");
        assert_eq!(config.buses.len(), 2);
    }

    #[test]
    fn zero_cycles_rejected() {
        let err = load_config_from_str("[simulation]\nmax_cycles = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn bad_clock_rejected() {
        let err = load_config_from_str("[simulation]\nclock = \"fast\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn enabled_trace_needs_path() {
        let err = load_config_from_str("[trace]\nenabled = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_schema_rejected() {
        let toml = r#"
[buses.Pair]
signals = [
    { name = "A", type = "bool" },
    { name = "A", type = "u8" },
]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Schema(SchemaError::DuplicateSignal { .. })
        ));
    }

    #[test]
    fn init_outside_type_rejected() {
        let toml = r#"
[buses.Nibble]
signals = [{ name = "N", type = "u4", init = 99 }]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(SchemaError::BadInit { .. })));
    }

    #[test]
    fn bad_type_name_is_parse_error() {
        let toml = r#"
[buses.Wide]
signals = [{ name = "W", type = "u65" }]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[simulation]\nmax_cycles = 12\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.simulation.max_cycles, 12);
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
