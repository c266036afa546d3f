use crate::error::RecordError;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Round a float to N decimal places.
pub fn round_f64(v: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (v * factor).round() / factor
}

/// Wrapper that rounds f64 to 6 decimal places on serialization.
fn serialize_f64_rounded<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round_f64(*v, 6))
}

// ─── Board ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub version: String,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub origin_x: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub origin_y: f64,
    pub footprints: Vec<Footprint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl Board {
    /// Find a footprint by its uuid.
    pub fn footprint(&self, uuid: &str) -> Option<&Footprint> {
        self.footprints.iter().find(|f| f.uuid == uuid)
    }
}

/// A footprint form that could not be turned into a [`Footprint`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Position among the board's footprint forms.
    pub index: usize,
    pub uuid: String,
    pub error: RecordError,
}

// ─── Location ────────────────────────────────────────────────────────

/// Position and rotation in document units, unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Location {
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub x: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub y: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
}

// ─── Footprint ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Footprint {
    pub uuid: String,
    /// Library identifier, e.g. "Resistor_SMD:R_0402_1005Metric".
    pub id: String,
    pub package_id: String,
    pub part_id: String,
    pub description: String,
    pub location: Location,
    pub layers: Vec<String>,
    pub attributes: Vec<String>,
    /// Keyed by lower-cased property name.
    pub properties: BTreeMap<String, String>,
    pub pads: Vec<Pad>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_pads: Vec<SkippedPad>,
}

impl Footprint {
    /// Case-insensitive property lookup, empty when absent.
    pub fn string_property(&self, name: &str) -> &str {
        self.properties
            .get(&name.to_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Case-insensitive numeric property lookup. Absent, blank or unparsable
    /// values read as 0.0.
    pub fn double_property(&self, name: &str) -> f64 {
        let text = self.string_property(name).trim();
        if text.is_empty() {
            return 0.0;
        }
        match text.parse::<f64>() {
            Ok(v) => v,
            Err(e) => {
                log::warn!(
                    "footprint {}: property {name:?} = {text:?} is not a number ({e}), using 0",
                    self.uuid
                );
                0.0
            }
        }
    }

    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes.iter().any(|a| a == attr)
    }

    pub fn is_on_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|l| l == layer)
    }

    /// Rotation of `pad` relative to this footprint.
    ///
    /// Pad rotations in the document include the footprint rotation; this
    /// takes it back out. The remainder keeps the sign of the difference.
    pub fn pad_rotation(&self, pad: &Pad) -> f64 {
        (pad.location.rotation - self.location.rotation) % 360.0
    }
}

// ─── Pad ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pad {
    pub name: String,
    /// Relative to the owning footprint. The rotation is not corrected for
    /// the footprint rotation, see [`Footprint::pad_rotation`].
    pub location: Location,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub width: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub height: f64,
    /// 0 for square corners up to 100 for fully rounded.
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub roundness: f64,
}

/// A pad form left out because its shape has no roundness mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPad {
    pub name: String,
    pub shape: String,
}

// ─── Import summary ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ImportData {
    pub placements: Vec<Placement>,
    pub parts: Vec<Part>,
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    pub uuid: String,
    pub reference: String,
    pub part_id: String,
    pub side: Side,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub x: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub y: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub rotation: f64,
    pub comment: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    /// Footprint the part was first seen on.
    pub uuid: String,
    pub part_id: String,
    pub description: String,
    pub package_id: String,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub height: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Package {
    /// Footprint the package was first seen on.
    pub uuid: String,
    pub package_id: String,
    pub description: String,
    pub tape_specification: String,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub body_width: f64,
    #[serde(serialize_with = "serialize_f64_rounded")]
    pub body_length: f64,
    pub pads: Vec<Pad>,
}
