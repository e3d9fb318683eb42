use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Column groups – suggested feature spaces from column names
// ---------------------------------------------------------------------------

pub const POSITION: &str = "Position";
pub const VELOCITY: &str = "Velocity";

/// Group column names into "Position" and "Velocity" suggestions.
///
/// * velocity: starts with `v` and ends with one of `x|y|z` (`vx`, `v_kpc_z`)
/// * position: exactly `x`, `y` or `z`, or mentions `kpc` and an axis letter
///
/// A column lands in at most one group (velocity wins). Order is preserved.
pub fn suggest_groups(columns: &[String]) -> BTreeMap<String, Vec<String>> {
    const AXES: [char; 3] = ['x', 'y', 'z'];

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for col in columns {
        let is_velocity = col.len() > 1 && col.starts_with('v') && col.ends_with(AXES);
        let is_position = matches!(col.as_str(), "x" | "y" | "z") || (col.contains("kpc") && col.contains(AXES));
        if is_velocity {
            groups.entry(VELOCITY.to_string()).or_default().push(col.clone());
        } else if is_position {
            groups.entry(POSITION.to_string()).or_default().push(col.clone());
        }
    }
    groups
}
