//! Configuration types deserialized from `lockstep.toml`.

use lockstep_ir::SignalSpec;
use lockstep_sim::TieBreak;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The top-level configuration parsed from `lockstep.toml`.
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct LockstepConfig {
    /// Cycle budget, scheduling, and clock settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Trace recording and export.
    #[serde(default)]
    pub trace: TraceConfig,
    /// Log filtering.
    #[serde(default)]
    pub log: LogConfig,
    /// Bus kinds by name; each overrides a built-in schema of the same kind.
    #[serde(default)]
    pub buses: BTreeMap<String, BusTable>,
}

/// The `[simulation]` section.
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    /// Cycle budget. Must be positive.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,
    /// Evaluate schedule levels in parallel.
    #[serde(default)]
    pub parallel: bool,
    /// `"declaration"`, `"reverse"`, or `{ seed = N }`.
    #[serde(default, deserialize_with = "deserialize_tie_break")]
    pub tie_break: TieBreak,
    /// Clock frequency as a string (e.g. `"100MHz"`), parsed to
    /// [`Frequency`](lockstep_common::Frequency).
    #[serde(default = "default_clock")]
    pub clock: String,
}

fn default_max_cycles() -> u64 {
    1000
}

fn default_clock() -> String {
    "100MHz".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            parallel: false,
            tie_break: TieBreak::Declaration,
            clock: default_clock(),
        }
    }
}

/// Deserializes a tie-break that is either a keyword or a `{ seed = N }`
/// table.
fn deserialize_tie_break<'de, D>(deserializer: D) -> Result<TieBreak, D::Error>
where
    D: Deserializer<'de>,
{
    struct TieBreakVisitor;

    impl<'de> Visitor<'de> for TieBreakVisitor {
        type Value = TieBreak;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("\"declaration\", \"reverse\", or { seed = N }")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            match v {
                "declaration" => Ok(TieBreak::Declaration),
                "reverse" => Ok(TieBreak::Reverse),
                other => Err(E::unknown_variant(other, &["declaration", "reverse"])),
            }
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut seed = None;
            while let Some(key) = map.next_key::<String>()? {
                if key != "seed" {
                    return Err(de::Error::unknown_field(&key, &["seed"]));
                }
                seed = Some(map.next_value::<u64>()?);
            }
            seed.map(TieBreak::Seeded)
                .ok_or_else(|| de::Error::missing_field("seed"))
        }
    }

    deserializer.deserialize_any(TieBreakVisitor)
}

/// The `[trace]` section.
#[derive(Debug, Default, Deserialize)]
pub struct TraceConfig {
    /// Record committed values and write them to `path`.
    #[serde(default)]
    pub enabled: bool,
    /// Output format.
    #[serde(default)]
    pub format: TraceFormat,
    /// Output file. Required when `enabled` is set.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Trace output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    /// Value Change Dump (IEEE 1364), the default.
    #[default]
    Vcd,
    /// The serialized trace as JSON.
    Json,
}

/// The `[log]` section.
#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, e.g. `"info"` or `"lockstep_sim=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One `[buses.<kind>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct BusTable {
    /// Signals in declaration order.
    pub signals: Vec<SignalSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn tie_break_keywords() {
        for (input, expected) in [
            ("declaration", TieBreak::Declaration),
            ("reverse", TieBreak::Reverse),
        ] {
            let toml = format!("[simulation]\ntie_break = \"{input}\"\n");
            let config = load_config_from_str(&toml).unwrap();
            assert_eq!(config.simulation.tie_break, expected);
        }
    }

    #[test]
    fn tie_break_seed_table() {
        let config = load_config_from_str("[simulation]\ntie_break = { seed = 42 }\n").unwrap();
        assert_eq!(config.simulation.tie_break, TieBreak::Seeded(42));
    }

    #[test]
    fn tie_break_rejects_unknown() {
        assert!(load_config_from_str("[simulation]\ntie_break = \"random\"\n").is_err());
        assert!(load_config_from_str("[simulation]\ntie_break = { salt = 1 }\n").is_err());
        assert!(load_config_from_str("[simulation]\ntie_break = {}\n").is_err());
    }

    #[test]
    fn trace_format_variants() {
        for (input, expected) in [("vcd", TraceFormat::Vcd), ("json", TraceFormat::Json)] {
            let toml = format!("[trace]\nformat = \"{input}\"\n");
            let config = load_config_from_str(&toml).unwrap();
            assert_eq!(config.trace.format, expected);
        }
    }

    #[test]
    fn bus_table_signals() {
        let toml = r#"
[buses.Input]
signals = [
    { name = "Valid", type = "bool", init = false },
    { name = "NextValue", type = "i32" },
]
"#;
        let config = load_config_from_str(toml).unwrap();
        let table = &config.buses["Input"];
        assert_eq!(table.signals.len(), 2);
        assert_eq!(table.signals[0].name, "Valid");
        assert_eq!(table.signals[1].init, None);
    }
}
