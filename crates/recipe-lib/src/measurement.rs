//! Measurement model
//!
//! A measurement is a typed, named collection of scalar readings
//! describing one aspect of a target system (Kubernetes images, GPU
//! state, OS tunables, ...). The type set is closed; unknown types are
//! rejected when recipe data is loaded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of measurement types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    K8s,
    #[serde(rename = "GPU")]
    Gpu,
    #[serde(rename = "OS")]
    Os,
    SystemD,
    Grub,
    Image,
    KMod,
    Sysctl,
    #[serde(rename = "SMI")]
    Smi,
}

impl MeasurementType {
    /// All supported measurement types.
    pub fn all() -> &'static [MeasurementType] {
        &[
            MeasurementType::K8s,
            MeasurementType::Gpu,
            MeasurementType::Os,
            MeasurementType::SystemD,
            MeasurementType::Grub,
            MeasurementType::Image,
            MeasurementType::KMod,
            MeasurementType::Sysctl,
            MeasurementType::Smi,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::K8s => "K8s",
            MeasurementType::Gpu => "GPU",
            MeasurementType::Os => "OS",
            MeasurementType::SystemD => "SystemD",
            MeasurementType::Grub => "Grub",
            MeasurementType::Image => "Image",
            MeasurementType::KMod => "KMod",
            MeasurementType::Sysctl => "Sysctl",
            MeasurementType::Smi => "SMI",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar reading, carrying its original dynamic type so values
/// round-trip losslessly through serialization.
///
/// Cross-type reads are explicit coercions at the call site; there is no
/// silent conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Reading {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reading::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reading::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reading::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Reading::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Bool(b) => write!(f, "{b}"),
            Reading::Int(n) => write!(f, "{n}"),
            Reading::Float(x) => write!(f, "{x}"),
            Reading::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Reading {
    fn from(s: &str) -> Self {
        Reading::String(s.to_string())
    }
}

impl From<bool> for Reading {
    fn from(b: bool) -> Self {
        Reading::Bool(b)
    }
}

impl From<i64> for Reading {
    fn from(n: i64) -> Self {
        Reading::Int(n)
    }
}

/// A named group of readings within a measurement. Names are unique per
/// parent measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtype {
    pub name: String,

    #[serde(default)]
    pub data: BTreeMap<String, Reading>,

    /// Free-form provenance strings, stripped from results unless the
    /// caller asks for them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Subtype {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
            context: None,
        }
    }
}

/// A typed collection of subtypes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "type")]
    pub measurement_type: MeasurementType,

    #[serde(default)]
    pub subtypes: Vec<Subtype>,
}

impl Measurement {
    pub fn new(measurement_type: MeasurementType) -> Self {
        Self {
            measurement_type,
            subtypes: Vec::new(),
        }
    }

    /// Look up a subtype by name.
    pub fn subtype(&self, name: &str) -> Option<&Subtype> {
        self.subtypes.iter().find(|s| s.name == name)
    }
}
