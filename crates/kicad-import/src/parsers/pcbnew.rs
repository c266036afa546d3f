//! Typed board model built from a parsed `.kicad_pcb` document, and single
//! footprints read from `.kicad_mod` library files.
//!
//! Text fields (uuid, library id, names, descriptions, property values)
//! default to empty when their form is missing. Geometry is required: a
//! footprint or pad without its `at` form, or a pad without `size`, is a
//! [`RecordError`] for that footprint only.

use super::query::{find_nodes_by_path, get_value_by_path, get_values_by_path};
use super::sexpr::{self, Node};
use crate::error::RecordError;
use crate::types::*;
use std::collections::BTreeMap;

impl Board {
    /// Parse a whole board document.
    ///
    /// Never fails: footprints that cannot be built are listed in
    /// [`Board::issues`] and the rest are kept in document order.
    pub fn parse(text: &str) -> Board {
        let roots = sexpr::parse(text);

        let version = get_value_by_path(&roots, "kicad_pcb/version").to_string();
        let (origin_x, origin_y) = parse_origin(&roots);

        let mut footprints = Vec::new();
        let mut issues = Vec::new();
        for (index, node) in find_nodes_by_path(&roots, "kicad_pcb/footprint")
            .into_iter()
            .enumerate()
        {
            match Footprint::from_node(node) {
                Ok(footprint) => footprints.push(footprint),
                Err(error) => {
                    let uuid = get_value_by_path(node.children(), "uuid").to_string();
                    log::warn!("skipping footprint #{index} ({uuid}): {error}");
                    issues.push(Issue { index, uuid, error });
                }
            }
        }

        log::debug!(
            "board version {version:?}: {} footprints, {} rejected",
            footprints.len(),
            issues.len()
        );

        Board {
            version,
            origin_x,
            origin_y,
            footprints,
            issues,
        }
    }
}

/// Drill/place origin, (0, 0) unless the form has exactly two numbers.
fn parse_origin(roots: &[Node]) -> (f64, f64) {
    let Some(node) = find_nodes_by_path(roots, "kicad_pcb/setup/aux_axis_origin")
        .into_iter()
        .next()
    else {
        return (0.0, 0.0);
    };
    match node.values() {
        [x, y] => match (x.trim().parse(), y.trim().parse()) {
            (Ok(x), Ok(y)) => (x, y),
            _ => {
                log::debug!("ignoring non-numeric origin {node}");
                (0.0, 0.0)
            }
        },
        _ => (0.0, 0.0),
    }
}

impl Footprint {
    /// Build a footprint from a `(footprint ...)` form.
    pub fn from_node(node: &Node) -> Result<Footprint, RecordError> {
        let location = Location::from_node(required_child(node, "at")?)?;
        build_footprint(node, location, |_| true)
    }

    /// Build a footprint from a standalone library document (`.kicad_mod`).
    ///
    /// The root form may be `footprint` or the older `module`. Library
    /// footprints usually have no `at` and sit at the origin. Only SMD pads
    /// on the top copper layer are kept.
    pub fn parse_library(text: &str) -> Result<Footprint, RecordError> {
        let roots = sexpr::parse(text);
        let node = roots
            .iter()
            .find(|n| matches!(n.token(), "footprint" | "module"))
            .ok_or_else(|| RecordError::MissingForm {
                form: "footprint".to_string(),
            })?;
        let location = match find_nodes_by_path(node.children(), "at").first() {
            Some(at) => Location::from_node(at)?,
            None => Location::default(),
        };
        let footprint = build_footprint(node, location, is_top_smd)?;
        log::debug!(
            "library footprint {:?}: {} pads kept",
            footprint.id,
            footprint.pads.len()
        );
        Ok(footprint)
    }
}

/// Pad forms of type `smd` whose layers include `F.Cu` or `*.Cu`.
fn is_top_smd(pad: &Node) -> bool {
    pad.value_at(1) == Some("smd")
        && get_values_by_path(pad.children(), "layers")
            .iter()
            .any(|layer| layer == "F.Cu" || layer == "*.Cu")
}

fn build_footprint(
    node: &Node,
    location: Location,
    keep_pad: fn(&Node) -> bool,
) -> Result<Footprint, RecordError> {
    let children = node.children();

    let uuid = get_value_by_path(children, "uuid").to_string();
    let id = node.value_at(0).unwrap_or("").to_string();
    let package_id = match id.split_once(':') {
        Some((_, name)) => name.to_string(),
        None => id.clone(),
    };

    let mut properties = BTreeMap::new();
    for prop in find_nodes_by_path(children, "property") {
        let Some(name) = prop.value_at(0) else {
            continue;
        };
        let value = prop.value_at(1).unwrap_or("");
        properties.insert(name.to_lowercase(), value.to_string());
    }

    let mut description = get_value_by_path(children, "descr").to_string();
    if description.trim().is_empty() {
        description = properties.get("description").cloned().unwrap_or_default();
    }

    let value = properties.get("value").map(String::as_str).unwrap_or("");
    let part_id = format!("{package_id}-{value}");

    let mut pads = Vec::new();
    let mut skipped_pads = Vec::new();
    for pad_node in find_nodes_by_path(children, "pad")
        .into_iter()
        .filter(|n| keep_pad(n))
    {
        let name = pad_node.value_at(0).unwrap_or("");
        match Pad::from_node(pad_node) {
            Ok(Some(pad)) => pads.push(pad),
            Ok(None) => {
                let shape = pad_node.value_at(2).unwrap_or("");
                log::warn!("footprint {uuid}: pad {name:?} has unsupported shape {shape:?}");
                skipped_pads.push(SkippedPad {
                    name: name.to_string(),
                    shape: shape.to_string(),
                });
            }
            Err(e) => {
                return Err(RecordError::Pad {
                    name: name.to_string(),
                    source: Box::new(e),
                });
            }
        }
    }

    Ok(Footprint {
        uuid,
        id,
        package_id,
        part_id,
        description,
        location,
        layers: get_values_by_path(children, "layer").to_vec(),
        attributes: get_values_by_path(children, "attr").to_vec(),
        properties,
        pads,
        skipped_pads,
    })
}

impl Pad {
    /// Build a pad from a `(pad name type shape ...)` form.
    ///
    /// Returns `Ok(None)` for shapes without a roundness mapping.
    pub fn from_node(node: &Node) -> Result<Option<Pad>, RecordError> {
        let roundness = match node.value_at(2).unwrap_or("") {
            "rect" => 0.0,
            "circle" | "oval" => 100.0,
            "roundrect" => match find_nodes_by_path(node.children(), "roundrect_rratio").first() {
                Some(ratio) => 100.0 * number_at(ratio, 0)?,
                None => 0.0,
            },
            _ => return Ok(None),
        };

        let location = Location::from_node(required_child(node, "at")?)?;
        let size = required_child(node, "size")?;

        Ok(Some(Pad {
            name: node.value_at(0).unwrap_or("").to_string(),
            location,
            width: number_at(size, 0)?,
            height: number_at(size, 1)?,
            roundness,
        }))
    }
}

impl Location {
    /// Build a location from an `(at x y [rotation])` form.
    pub fn from_node(node: &Node) -> Result<Location, RecordError> {
        Ok(Location {
            x: number_at(node, 0)?,
            y: number_at(node, 1)?,
            rotation: optional_number_at(node, 2)?.unwrap_or(0.0),
        })
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn required_child<'a>(node: &'a Node, token: &str) -> Result<&'a Node, RecordError> {
    find_nodes_by_path(node.children(), token)
        .into_iter()
        .next()
        .ok_or_else(|| RecordError::MissingForm {
            form: token.to_string(),
        })
}

fn number_at(node: &Node, index: usize) -> Result<f64, RecordError> {
    optional_number_at(node, index)?.ok_or_else(|| RecordError::MissingValue {
        form: node.token().to_string(),
        index,
    })
}

fn optional_number_at(node: &Node, index: usize) -> Result<Option<f64>, RecordError> {
    let Some(text) = node.value_at(index) else {
        return Ok(None);
    };
    text.trim()
        .parse()
        .map(Some)
        .map_err(|_| RecordError::InvalidNumber {
            form: node.token().to_string(),
            value: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const R0402: &str = r#"(footprint "Lib:R_0402" (uuid "u1") (layer "F.Cu") (attr smd) (at 10 20 90) (property "Reference" "R1") (property "Value" "10k") (pad "1" smd rect (at -0.5 0 0) (size 0.6 0.6) (layers "F.Cu")))"#;

    const BOARD: &str = r#"(kicad_pcb
  (version 20240108)
  (generator "pcbnew")
  (setup
    (pad_to_mask_clearance 0)
    (aux_axis_origin 100.5 80)
  )
  (footprint "Resistor_SMD:R_0402_1005Metric"
    (layer "F.Cu")
    (uuid "3f1c0c4e-0001")
    (at 120 90 180)
    (descr "Resistor SMD 0402 (1005 Metric)")
    (property "Reference" "R1" (at 0 -1.17 0) (layer "F.SilkS"))
    (property "Value" "10k" (at 0 1.17 0) (layer "F.Fab"))
    (property "Height" "0.35")
    (attr smd)
    (pad "1" smd roundrect (at -0.51 0 180) (size 0.54 0.64) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
    (pad "2" smd roundrect (at 0.51 0 180) (size 0.54 0.64) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
  )
  (footprint "Connector:TestPoint"
    (layer "B.Cu")
    (uuid "3f1c0c4e-0002")
    (at 130.2 95.4)
    (property "Reference" "TP1")
    (property "Value" "TP")
    (property "Description" "test point")
    (attr exclude_from_pos_files)
    (pad "1" thru_hole circle (at 0 0) (size 1.5 1.5) (drill 0.8) (layers "*.Cu" "*.Mask"))
    (pad "" np_thru_hole custom (at 0 0) (size 1 1) (layers "*.Cu"))
  )
  (gr_line (start 0 0) (end 10 0) (layer "Edge.Cuts"))
)
"#;

    fn footprint(text: &str) -> Footprint {
        let roots = sexpr::parse(text);
        Footprint::from_node(&roots[0]).unwrap()
    }

    fn pad(text: &str) -> Option<Pad> {
        let roots = sexpr::parse(text);
        Pad::from_node(&roots[0]).unwrap()
    }

    #[test]
    fn test_footprint_fields() {
        let fp = footprint(R0402);
        assert_eq!(fp.uuid, "u1");
        assert_eq!(fp.id, "Lib:R_0402");
        assert_eq!(fp.package_id, "R_0402");
        assert_eq!(fp.part_id, "R_0402-10k");
        assert_eq!(
            fp.location,
            Location {
                x: 10.0,
                y: 20.0,
                rotation: 90.0
            }
        );
        assert!(fp.has_attribute("smd"));
        assert!(fp.is_on_layer("F.Cu"));
        assert_eq!(fp.string_property("Reference"), "R1");
        assert_eq!(fp.properties.get("value").map(String::as_str), Some("10k"));

        assert_eq!(fp.pads.len(), 1);
        let pad = &fp.pads[0];
        assert_eq!(pad.name, "1");
        assert_eq!(pad.width, 0.6);
        assert_eq!(pad.height, 0.6);
        assert_eq!(pad.roundness, 0.0);
        assert_eq!(pad.location.x, -0.5);
    }

    #[test]
    fn test_package_id_without_library() {
        let fp = footprint("(footprint R_0603 (at 0 0))");
        assert_eq!(fp.package_id, "R_0603");
        // Absent value property still yields a part id.
        assert_eq!(fp.part_id, "R_0603-");
    }

    #[test]
    fn test_package_id_splits_on_first_colon() {
        let fp = footprint(r#"(footprint "Lib:Sub:Name" (at 0 0))"#);
        assert_eq!(fp.package_id, "Sub:Name");
    }

    #[test]
    fn test_description_fallback() {
        let fp = footprint(
            r#"(footprint "L:X" (descr "  ") (at 0 0) (property "Description" "from property"))"#,
        );
        assert_eq!(fp.description, "from property");

        let fp = footprint(r#"(footprint "L:X" (descr "direct") (at 0 0) (property "Description" "p"))"#);
        assert_eq!(fp.description, "direct");

        let fp = footprint(r#"(footprint "L:X" (at 0 0))"#);
        assert_eq!(fp.description, "");
    }

    #[test]
    fn test_properties_lowercased_last_wins() {
        let fp = footprint(
            r#"(footprint "L:X" (at 0 0) (property "MPN" "a") (property "mpn" "b") (property))"#,
        );
        assert_eq!(fp.properties.len(), 1);
        assert_eq!(fp.string_property("MPN"), "b");
    }

    #[test]
    fn test_first_attr_and_layer_only() {
        let fp = footprint(r#"(footprint "L:X" (at 0 0) (attr smd dnp) (attr through_hole))"#);
        assert_eq!(fp.attributes, ["smd", "dnp"]);
        assert!(fp.layers.is_empty());
    }

    #[test]
    fn test_location_default_rotation() {
        let loc = Location::from_node(&sexpr::parse("(at 1.5 -2)")[0]).unwrap();
        assert_eq!(
            loc,
            Location {
                x: 1.5,
                y: -2.0,
                rotation: 0.0
            }
        );
    }

    #[test]
    fn test_location_errors() {
        let err = Location::from_node(&sexpr::parse("(at 1)")[0]).unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingValue {
                form: "at".to_string(),
                index: 1
            }
        );
        let err = Location::from_node(&sexpr::parse("(at 1 2 north)")[0]).unwrap_err();
        assert_eq!(
            err,
            RecordError::InvalidNumber {
                form: "at".to_string(),
                value: "north".to_string()
            }
        );
    }

    #[test]
    fn test_roundrect_pad() {
        let p = pad("(pad 1 smd roundrect (at 0 0) (size 1 0.5) (roundrect_rratio 0.25))").unwrap();
        assert_relative_eq!(p.roundness, 25.0);
        assert_eq!(p.width, 1.0);
        assert_eq!(p.height, 0.5);

        let p = pad("(pad 1 smd roundrect (at 0 0) (size 1 0.5))").unwrap();
        assert_eq!(p.roundness, 0.0);
    }

    #[test]
    fn test_circle_and_oval_collapse() {
        let circle = pad("(pad 1 thru_hole circle (at 0 0) (size 1 1))").unwrap();
        let oval = pad("(pad 2 thru_hole oval (at 0 0) (size 1 2))").unwrap();
        assert_eq!(circle.roundness, 100.0);
        assert_eq!(oval.roundness, 100.0);
    }

    #[test]
    fn test_pad_rotation_is_kept() {
        let p = pad("(pad A1 smd rect (at 1 2 270) (size 1 1))").unwrap();
        assert_eq!(p.name, "A1");
        assert_eq!(p.location.rotation, 270.0);
    }

    #[test]
    fn test_unsupported_shape() {
        assert!(pad("(pad 1 smd trapezoid (at 0 0) (size 1 1))").is_none());
        assert!(pad("(pad 1 smd)").is_none());

        let fp = footprint(
            r#"(footprint "L:X" (at 0 0) (pad 1 smd trapezoid (at 0 0) (size 1 1)) (pad 2 smd rect (at 1 0) (size 1 1)))"#,
        );
        assert_eq!(fp.pads.len(), 1);
        assert_eq!(fp.pads[0].name, "2");
        assert_eq!(
            fp.skipped_pads,
            [SkippedPad {
                name: "1".to_string(),
                shape: "trapezoid".to_string()
            }]
        );
    }

    #[test]
    fn test_pad_missing_size() {
        let roots = sexpr::parse("(pad 1 smd rect (at 0 0))");
        assert_eq!(
            Pad::from_node(&roots[0]).unwrap_err(),
            RecordError::MissingForm {
                form: "size".to_string()
            }
        );
    }

    #[test]
    fn test_pad_error_names_the_pad() {
        let roots = sexpr::parse(r#"(footprint "L:X" (at 0 0) (pad "7" smd rect (size 1 1)))"#);
        let err = Footprint::from_node(&roots[0]).unwrap_err();
        assert_eq!(
            err,
            RecordError::Pad {
                name: "7".to_string(),
                source: Box::new(RecordError::MissingForm {
                    form: "at".to_string()
                }),
            }
        );
        assert_eq!(err.to_string(), "pad \"7\": missing (at) form");
    }

    #[test]
    fn test_board() {
        let board = Board::parse(BOARD);
        assert_eq!(board.version, "20240108");
        assert_eq!(board.origin_x, 100.5);
        assert_eq!(board.origin_y, 80.0);
        assert!(board.issues.is_empty());
        assert_eq!(board.footprints.len(), 2);

        let r1 = &board.footprints[0];
        assert_eq!(r1.package_id, "R_0402_1005Metric");
        assert_eq!(r1.part_id, "R_0402_1005Metric-10k");
        assert_eq!(r1.description, "Resistor SMD 0402 (1005 Metric)");
        assert_eq!(r1.pads.len(), 2);
        assert_relative_eq!(r1.pads[1].roundness, 25.0);
        assert_eq!(r1.pad_rotation(&r1.pads[0]), 0.0);
        assert_eq!(r1.double_property("height"), 0.35);

        let tp = board.footprint("3f1c0c4e-0002").unwrap();
        assert_eq!(tp.location.rotation, 0.0);
        assert_eq!(tp.description, "test point");
        assert_eq!(tp.layers, ["B.Cu"]);
        assert!(tp.has_attribute("exclude_from_pos_files"));
        assert_eq!(tp.pads.len(), 1);
        assert_eq!(tp.skipped_pads.len(), 1);

        assert!(board.footprint("nope").is_none());
    }

    #[test]
    fn test_board_origin_default() {
        let board = Board::parse("(kicad_pcb (version 1) (setup (grid_origin 5 5)))");
        assert_eq!((board.origin_x, board.origin_y), (0.0, 0.0));

        let board = Board::parse("(kicad_pcb (setup (aux_axis_origin 5)))");
        assert_eq!((board.origin_x, board.origin_y), (0.0, 0.0));

        let board = Board::parse("(kicad_pcb (setup (aux_axis_origin 5 x)))");
        assert_eq!((board.origin_x, board.origin_y), (0.0, 0.0));
    }

    #[test]
    fn test_board_keeps_good_footprints() {
        let text = r#"(kicad_pcb
            (footprint "L:A" (uuid a) (at 1 1))
            (footprint "L:B" (uuid b) (at 1 wide))
            (footprint "L:C" (uuid c))
            (footprint "L:D" (uuid d) (at 2 2))
        )"#;
        let board = Board::parse(text);
        let uuids: Vec<&str> = board.footprints.iter().map(|f| f.uuid.as_str()).collect();
        assert_eq!(uuids, ["a", "d"]);

        assert_eq!(board.issues.len(), 2);
        assert_eq!(board.issues[0].index, 1);
        assert_eq!(board.issues[0].uuid, "b");
        assert!(matches!(
            board.issues[0].error,
            RecordError::InvalidNumber { .. }
        ));
        assert_eq!(board.issues[1].index, 2);
        assert_eq!(
            board.issues[1].error,
            RecordError::MissingForm {
                form: "at".to_string()
            }
        );
    }

    #[test]
    fn test_board_without_wrapper() {
        let board = Board::parse(R0402);
        assert!(board.footprints.is_empty());
        assert_eq!(board.version, "");

        let board = Board::parse("");
        assert!(board.footprints.is_empty());
        assert!(board.issues.is_empty());
    }

    const LIBRARY: &str = r#"(footprint "SOT-23"
  (version 20221018)
  (generator pcbnew)
  (layer "F.Cu")
  (descr "SOT, 3 Pin")
  (property "Tape" "8mm")
  (attr smd)
  (fp_line (start -0.7 -1.5) (end 0.7 -1.5) (layer "F.SilkS") (width 0.12))
  (pad "1" smd roundrect (at -1.1 -0.95) (size 1.3 0.6) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
  (pad "2" smd rect (at -1.1 0.95 90) (size 1.3 0.6) (layers "F.Cu" "F.Paste" "F.Mask"))
  (pad "3" smd oval (at 1.1 0) (size 1.3 0.6) (layers "*.Cu" "*.Mask"))
  (pad "4" smd rect (at 0 2) (size 1 1) (layers "B.Cu" "B.Paste"))
  (pad "5" thru_hole circle (at 0 -2) (size 1 1) (drill 0.5) (layers "*.Cu" "*.Mask"))
  (pad "6" smd trapezoid (at 0 3) (size 1 1) (layers "F.Cu"))
  (model "${KICAD6_3DMODEL_DIR}/Package_TO_SOT_SMD.3dshapes/SOT-23.wrl" (offset (xyz 0 0 0)))
)
"#;

    #[test]
    fn test_library_keeps_top_smd_pads() {
        let fp = Footprint::parse_library(LIBRARY).unwrap();
        assert_eq!(fp.id, "SOT-23");
        assert_eq!(fp.package_id, "SOT-23");
        assert_eq!(fp.description, "SOT, 3 Pin");
        assert_eq!(fp.location, Location::default());

        let names: Vec<&str> = fp.pads.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["1", "2", "3"]);
        assert_relative_eq!(fp.pads[0].roundness, 25.0);
        assert_eq!(fp.pads[1].roundness, 0.0);
        assert_eq!(fp.pads[1].location.rotation, 90.0);
        assert_eq!(fp.pads[2].roundness, 100.0);

        assert_eq!(fp.skipped_pads.len(), 1);
        assert_eq!(fp.skipped_pads[0].shape, "trapezoid");
    }

    #[test]
    fn test_library_legacy_module() {
        let fp = Footprint::parse_library(
            "(module R_0603 (layer F.Cu) (at 5 5) (pad 1 smd rect (at -0.8 0) (size 0.8 0.9) (layers F.Cu F.Paste)))",
        )
        .unwrap();
        assert_eq!(fp.package_id, "R_0603");
        assert_eq!(fp.location.x, 5.0);
        assert_eq!(fp.pads.len(), 1);
    }

    #[test]
    fn test_library_errors() {
        assert_eq!(
            Footprint::parse_library(BOARD).unwrap_err(),
            RecordError::MissingForm {
                form: "footprint".to_string()
            }
        );
        assert!(Footprint::parse_library("").is_err());

        let err = Footprint::parse_library(
            r#"(footprint "X" (pad "1" smd rect (at 0 0) (layers "F.Cu")))"#,
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::Pad { ref name, .. } if name == "1"));

        // Pads that are filtered out are never built.
        let fp = Footprint::parse_library(
            r#"(footprint "X" (pad "1" thru_hole rect (at 0 0) (layers "*.Cu")))"#,
        )
        .unwrap();
        assert!(fp.pads.is_empty());
    }

    #[test]
    fn test_board_serializes() {
        let board = Board::parse(BOARD);
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json["footprints"][0]["part_id"], "R_0402_1005Metric-10k");
        assert_eq!(json["footprints"][1]["skipped_pads"][0]["shape"], "custom");
        assert!(json.get("issues").is_none());
    }
}
