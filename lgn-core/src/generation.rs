//! Hardware generation tag and DMI classifier
//!
//! The generation is assigned once at attach and drives every table lookup
//! afterwards. Classification itself is simple string matching over the
//! firmware's static product identification; `Unknown` is an expected
//! outcome on unrecognized boards and must flow through the resolver
//! without crashing anything.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{acpi, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Unknown,
    Gen6,
    Gen7,
    Gen8,
    Gen9,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Generation::Unknown => "unknown",
            Generation::Gen6 => "gen6",
            Generation::Gen7 => "gen7",
            Generation::Gen8 => "gen8",
            Generation::Gen9 => "gen9",
        };
        f.write_str(s)
    }
}

impl Generation {
    /// ACPI namespace node of the EC device for this board layout.
    pub fn acpi_ec_node(self) -> &'static str {
        match self {
            Generation::Gen8 | Generation::Gen9 => acpi::EC_NODE_MODERN,
            _ => acpi::EC_NODE_LEGACY,
        }
    }
}

/// Machine-type prefixes and marketing names per generation. Product name
/// carries the machine type (e.g. "82K6"), product version the marketing
/// name (e.g. "Legion 7i Gen 7").
const GEN9_MARKERS: &[&str] = &["16IRX9", "15IRX9", "Legion 9i", "Gen 9"];
const GEN8_MARKERS: &[&str] = &["16IRX8", "15IRX8", "Gen 8"];
const GEN7_MARKERS: &[&str] = &["82TD", "82RD", "82UH", "16IRX7", "15IRX7", "Gen 7"];
const GEN6_MARKERS: &[&str] = &["82B1", "82JU", "82JQ", "82K6", "16IRX6", "15IRX6", "Gen 6"];

/// Classify a machine from its DMI product strings.
pub fn classify(product_name: &str, product_version: &str) -> Generation {
    let matches = |markers: &[&str]| {
        markers
            .iter()
            .any(|m| product_name.contains(m) || product_version.contains(m))
    };
    if matches(GEN9_MARKERS) {
        Generation::Gen9
    } else if matches(GEN8_MARKERS) {
        Generation::Gen8
    } else if matches(GEN7_MARKERS) {
        Generation::Gen7
    } else if matches(GEN6_MARKERS) {
        Generation::Gen6
    } else {
        Generation::Unknown
    }
}

fn read_dmi(path: &str) -> String {
    fs::read_to_string(Path::new(path))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Detect the generation of the running machine from DMI sysfs.
pub fn detect() -> Generation {
    classify(
        &read_dmi(paths::DMI_PRODUCT_NAME),
        &read_dmi(paths::DMI_PRODUCT_VERSION),
    )
}
