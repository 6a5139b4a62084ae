//! Semantic memory layers.
//!
//! The set of layers is closed and known at build time. Each layer maps 1:1
//! to an independent storage collection with an identical schema; layers
//! never share records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six fixed semantic categories partitioning memory by kind of fact.
///
/// Adding a layer means extending this enum, [`Layer::ALL`] and the
/// name tables below together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Identities,
    Preferences,
    Experiences,
    Activities,
    Contexts,
    Personas,
}

impl Layer {
    /// Every layer, in registry order.
    pub const ALL: [Layer; 6] = [
        Layer::Identities,
        Layer::Preferences,
        Layer::Experiences,
        Layer::Activities,
        Layer::Contexts,
        Layer::Personas,
    ];

    /// Number of layers.
    pub const COUNT: usize = Self::ALL.len();

    /// Stable lowercase name, as used on the wire and in fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Identities => "identities",
            Layer::Preferences => "preferences",
            Layer::Experiences => "experiences",
            Layer::Activities => "activities",
            Layer::Contexts => "contexts",
            Layer::Personas => "personas",
        }
    }

    /// Name of the storage collection backing this layer.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Layer::Identities => "memory_identities",
            Layer::Preferences => "memory_preferences",
            Layer::Experiences => "memory_experiences",
            Layer::Activities => "memory_activities",
            Layer::Contexts => "memory_contexts",
            Layer::Personas => "memory_personas",
        }
    }

    /// Position of this layer in [`Layer::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Layer::Identities => 0,
            Layer::Preferences => 1,
            Layer::Experiences => 2,
            Layer::Activities => 3,
            Layer::Contexts => 4,
            Layer::Personas => 5,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    /// Parses a layer name from user input (CLI, config). Surrounding
    /// whitespace and case are tolerated; extraction routing uses the exact
    /// names instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identities" => Ok(Layer::Identities),
            "preferences" => Ok(Layer::Preferences),
            "experiences" => Ok(Layer::Experiences),
            "activities" => Ok(Layer::Activities),
            "contexts" => Ok(Layer::Contexts),
            "personas" => Ok(Layer::Personas),
            other => Err(format!("unknown memory layer: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_roundtrip() {
        for layer in Layer::ALL {
            let parsed: Layer = layer.to_string().parse().unwrap();
            assert_eq!(layer, parsed);
        }
    }

    #[test]
    fn test_layer_index_matches_all_order() {
        for (i, layer) in Layer::ALL.iter().enumerate() {
            assert_eq!(layer.index(), i);
        }
    }

    #[test]
    fn test_layer_parse_tolerates_case_and_whitespace() {
        assert_eq!(" Preferences ".parse::<Layer>().unwrap(), Layer::Preferences);
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let err = "bogus".parse::<Layer>().unwrap_err();
        assert!(err.contains("bogus"));
    }

    #[test]
    fn test_layer_serde() {
        let json = serde_json::to_string(&Layer::Personas).unwrap();
        assert_eq!(json, "\"personas\"");
        let parsed: Layer = serde_json::from_str("\"contexts\"").unwrap();
        assert_eq!(parsed, Layer::Contexts);
    }

    #[test]
    fn test_collection_names_are_distinct() {
        let mut names: Vec<&str> = Layer::ALL.iter().map(|l| l.collection_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Layer::COUNT);
    }
}
