//! Classifier label helpers.
//!
//! Labels follow the `genus_species` convention (`echeveria_elegans`,
//! `haworthia_zebra_plant`). The genus is always the first underscore
//! segment; the "species" carried through the system is the full label.

const SEPARATOR: char = '_';

/// Split a label into `(genus, species)`.
///
/// `species` is the entire original label when the label has at least two
/// segments, otherwise empty. Never fails: an empty label yields two empty
/// strings.
pub fn parse_label(label: &str) -> (String, String) {
    let mut parts = label.split(SEPARATOR);
    let genus = parts.next().unwrap_or_default().to_string();
    let species = if parts.next().is_some() {
        label.to_string()
    } else {
        String::new()
    };
    (genus, species)
}

/// Capitalize the first character of a genus for display.
pub fn format_genus(genus: &str) -> String {
    let mut chars = genus.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Display form of a label: `"haworthia_zebra_plant"` becomes
/// `"Haworthia zebra plant"`. Single-segment labels yield an empty string.
pub fn format_species(label: &str) -> String {
    let parts: Vec<&str> = label.split(SEPARATOR).collect();
    if parts.len() < 2 {
        return String::new();
    }
    format!("{} {}", format_genus(parts[0]), parts[1..].join(" "))
}
