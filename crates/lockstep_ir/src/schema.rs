//! Bus schemas: named, typed signal lists with optional initial values.
//!
//! A schema is plain data. It can be built in code with
//! [`BusSchema::signal`] or deserialized from configuration, and it is
//! validated before any bus is instantiated from it.

use crate::error::SchemaError;
use lockstep_common::{SignalType, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One signal of a bus kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Signal name, unique within the bus.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: SignalType,
    /// Committed value before cycle 0. `None` leaves the signal
    /// uninitialized until its first commit.
    #[serde(default)]
    pub init: Option<Value>,
}

/// Ordered signal list for one bus kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSchema {
    /// Kind name, e.g. `"Input"`.
    pub kind: String,
    /// Signals in declaration order.
    pub signals: Vec<SignalSpec>,
}

impl BusSchema {
    /// Starts an empty schema for `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            signals: Vec::new(),
        }
    }

    /// Appends a signal and returns the schema, for chained construction.
    pub fn signal(mut self, name: impl Into<String>, ty: SignalType, init: Option<Value>) -> Self {
        self.signals.push(SignalSpec {
            name: name.into(),
            ty,
            init,
        });
        self
    }

    /// Looks up a signal spec by name.
    pub fn find(&self, name: &str) -> Option<&SignalSpec> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Checks that the schema is non-empty, names are unique and well
    /// formed, widths are in 1..=64, and every initial value is admitted
    /// by its type.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.signals.is_empty() {
            return Err(SchemaError::Empty {
                kind: self.kind.clone(),
            });
        }
        let mut seen = HashSet::new();
        for spec in &self.signals {
            if spec.name.is_empty() || spec.name.contains('.') {
                return Err(SchemaError::InvalidName {
                    kind: self.kind.clone(),
                    signal: spec.name.clone(),
                });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemaError::DuplicateSignal {
                    kind: self.kind.clone(),
                    signal: spec.name.clone(),
                });
            }
            spec.ty.check().map_err(|source| SchemaError::InvalidWidth {
                kind: self.kind.clone(),
                signal: spec.name.clone(),
                source,
            })?;
            if let Some(init) = spec.init {
                spec.ty
                    .coerce(init)
                    .map_err(|source| SchemaError::BadInit {
                        kind: self.kind.clone(),
                        signal: spec.name.clone(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

/// Bus kinds by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSet {
    schemas: BTreeMap<String, BusSchema>,
}

impl SchemaSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the schema for its kind.
    pub fn insert(&mut self, schema: BusSchema) {
        self.schemas.insert(schema.kind.clone(), schema);
    }

    /// Returns the schema for `kind`.
    pub fn get(&self, kind: &str) -> Result<&BusSchema, SchemaError> {
        self.schemas
            .get(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))
    }

    /// Replaces entries with those from `overlay`, keeping kinds it does
    /// not mention.
    pub fn overlay(&mut self, overlay: &SchemaSet) {
        for schema in overlay.schemas.values() {
            self.insert(schema.clone());
        }
    }

    /// Validates every schema in the set.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.schemas.values().try_for_each(BusSchema::validate)
    }

    /// Iterates over schemas in kind-name order.
    pub fn iter(&self) -> impl Iterator<Item = &BusSchema> {
        self.schemas.values()
    }

    /// Number of kinds.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if no kinds are defined.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromIterator<BusSchema> for SchemaSet {
    fn from_iter<T: IntoIterator<Item = BusSchema>>(iter: T) -> Self {
        let mut set = SchemaSet::new();
        for schema in iter {
            set.insert(schema);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_common::ValueError;

    fn input_schema() -> BusSchema {
        BusSchema::new("Input")
            .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
            .signal("NextValue", SignalType::Signed { width: 32 }, None)
    }

    #[test]
    fn valid_schema_passes() {
        assert!(input_schema().validate().is_ok());
        assert_eq!(input_schema().find("NextValue").unwrap().init, None);
    }

    #[test]
    fn width_outside_range_rejected() {
        let zero = BusSchema::new("Bad").signal("V", SignalType::Signed { width: 0 }, Some(Value::Signed(0)));
        assert!(matches!(
            zero.validate(),
            Err(SchemaError::InvalidWidth { ref signal, source: ValueError::InvalidWidth(0), .. }) if signal == "V"
        ));

        let wide = BusSchema::new("Bad").signal("V", SignalType::Unsigned { width: 65 }, None);
        assert_eq!(
            wide.validate().unwrap_err().to_string(),
            "bus kind 'Bad', signal 'V': invalid integer width 65 (expected 1..=64)"
        );
    }

    #[test]
    fn empty_schema_rejected() {
        let err = BusSchema::new("Nothing").validate().unwrap_err();
        assert!(matches!(err, SchemaError::Empty { .. }));
    }

    #[test]
    fn duplicate_signal_rejected() {
        let schema = input_schema().signal("Valid", SignalType::Bool, None);
        let err = schema.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "bus kind 'Input' declares signal 'Valid' twice"
        );
    }

    #[test]
    fn dotted_name_rejected() {
        let schema = BusSchema::new("X").signal("a.b", SignalType::Bool, None);
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidName { .. })
        ));
    }

    #[test]
    fn init_must_fit_type() {
        let schema = BusSchema::new("Narrow").signal(
            "Nibble",
            SignalType::Unsigned { width: 4 },
            Some(Value::Unsigned(16)),
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::BadInit { .. })
        ));
    }

    #[test]
    fn set_overlay_replaces_by_kind() {
        let mut base: SchemaSet = [input_schema(), BusSchema::new("Output")].into_iter().collect();
        let overlay: SchemaSet = [BusSchema::new("Input").signal("Only", SignalType::Bool, None)]
            .into_iter()
            .collect();
        base.overlay(&overlay);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("Input").unwrap().signals.len(), 1);
        assert!(matches!(
            base.get("Missing"),
            Err(SchemaError::UnknownKind(_))
        ));
    }

    #[test]
    fn signal_spec_deserializes_type_key() {
        let spec: SignalSpec =
            serde_json::from_str(r#"{"name":"Count","type":"u8","init":3}"#).unwrap();
        assert_eq!(spec.ty, SignalType::Unsigned { width: 8 });
        assert_eq!(spec.init, Some(Value::Signed(3)));
    }
}
