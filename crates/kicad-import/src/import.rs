use crate::types::*;
use std::collections::HashSet;

/// Which footprints to select and how to place them.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Measure placements from the board's aux axis origin.
    pub use_aux_origin: bool,
    /// Keep footprints flagged "dnp" or "exclude_from_pos_files".
    pub include_dnp: bool,
    pub include_smd: bool,
    pub include_through_hole: bool,
    /// Select footprints on F.Cu.
    pub include_top: bool,
    /// Select footprints on B.Cu.
    pub include_bottom: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            use_aux_origin: false,
            include_dnp: false,
            include_smd: true,
            include_through_hole: true,
            include_top: true,
            include_bottom: true,
        }
    }
}

/// Derive placements, distinct parts and distinct packages from a board.
pub fn generate_import(board: &Board, config: &ImportConfig) -> ImportData {
    let placements: Vec<Placement> = board
        .footprints
        .iter()
        .map(|fp| placement(board, fp, config))
        .collect();

    let (parts, packages) = collect_parts_and_packages(board, &placements);

    log::debug!(
        "{} placements ({} selected), {} parts, {} packages",
        placements.len(),
        placements.iter().filter(|p| p.selected).count(),
        parts.len(),
        packages.len()
    );

    ImportData {
        placements,
        parts,
        packages,
    }
}

fn is_selected(fp: &Footprint, config: &ImportConfig) -> bool {
    if !config.include_dnp
        && (fp.has_attribute("dnp") || fp.has_attribute("exclude_from_pos_files"))
    {
        return false;
    }
    if !config.include_through_hole && fp.has_attribute("through_hole") {
        return false;
    }
    if !config.include_smd && fp.has_attribute("smd") {
        return false;
    }
    (config.include_top && fp.is_on_layer("F.Cu"))
        || (config.include_bottom && fp.is_on_layer("B.Cu"))
}

/// Placement in machine orientation: y grows upward, bottom-side parts are
/// mirrored in x and their rotation flipped.
fn placement(board: &Board, fp: &Footprint, config: &ImportConfig) -> Placement {
    let mut x = fp.location.x;
    let mut y = fp.location.y;
    if config.use_aux_origin {
        x -= board.origin_x;
        y -= board.origin_y;
    }
    y = -y;

    let mut rotation = fp.location.rotation;
    let mut side = Side::Top;
    if fp.is_on_layer("B.Cu") {
        side = Side::Bottom;
        if x != 0.0 {
            x = -x;
        }
        rotation = 180.0 - rotation;
        if rotation == 0.0 {
            rotation = 0.0; // no negative zero
        }
    }

    Placement {
        uuid: fp.uuid.clone(),
        reference: fp.string_property("Reference").to_string(),
        part_id: fp.part_id.clone(),
        side,
        x,
        y,
        rotation,
        comment: fp.string_property("#").to_string(),
        selected: is_selected(fp, config),
    }
}

/// Distinct parts, then distinct packages among those parts, each taken from
/// the first selected footprint that has it.
fn collect_parts_and_packages(
    board: &Board,
    placements: &[Placement],
) -> (Vec<Part>, Vec<Package>) {
    let mut part_ids = HashSet::new();
    let mut package_ids = HashSet::new();
    let mut parts = Vec::new();
    let mut packages = Vec::new();

    // Placements are built one per footprint, in board order.
    for (fp, _) in board
        .footprints
        .iter()
        .zip(placements)
        .filter(|(_, placement)| placement.selected)
    {
        if !part_ids.insert(fp.part_id.as_str()) {
            continue;
        }
        parts.push(Part {
            uuid: fp.uuid.clone(),
            part_id: fp.part_id.clone(),
            description: fp.description.clone(),
            package_id: fp.package_id.clone(),
            height: fp.double_property("Height"),
        });
        if package_ids.insert(fp.package_id.as_str()) {
            packages.push(Package::from_footprint(fp));
        }
    }
    (parts, packages)
}

impl Package {
    /// Package record for a footprint: tape and body size come from its
    /// properties, pads are in the package frame.
    pub fn from_footprint(fp: &Footprint) -> Package {
        Package {
            uuid: fp.uuid.clone(),
            package_id: fp.package_id.clone(),
            description: fp.description.clone(),
            tape_specification: fp.string_property("Tape").to_string(),
            body_width: fp.double_property("Width"),
            body_length: fp.double_property("Length"),
            pads: package_pads(fp),
        }
    }
}

/// Pads in the package frame: y grows upward and rotation is relative to the
/// footprint.
fn package_pads(fp: &Footprint) -> Vec<Pad> {
    fp.pads
        .iter()
        .map(|pad| Pad {
            name: pad.name.clone(),
            location: Location {
                x: pad.location.x,
                y: -pad.location.y,
                rotation: fp.pad_rotation(pad),
            },
            width: pad.width,
            height: pad.height,
            roundness: pad.roundness,
        })
        .collect()
}
