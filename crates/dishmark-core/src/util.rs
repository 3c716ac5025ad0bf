use crate::models::Place;

const MAX_FILENAME_PART: usize = 50;

/// Make `text` safe to embed in a file name.
///
/// Drops everything except letters, digits, `_`, `-` and whitespace,
/// turns each whitespace run into a single `_`, and keeps at most 50 chars.
/// Example: `"Le Café de l'Église"` → `"Le_Café_de_lÉglise"`
pub fn sanitize_filename(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
        } else if c.is_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            in_space = false;
        }
    }
    out.chars().take(MAX_FILENAME_PART).collect()
}

/// City-ish part of a formatted address: the second-to-last comma
/// separated component, or the only one.
fn city_from_address(address: &str) -> String {
    if address.is_empty() {
        return "unknown".to_string();
    }
    let parts: Vec<&str> = address.split(',').collect();
    let part = if parts.len() >= 2 {
        parts[parts.len() - 2]
    } else {
        parts[0]
    };
    sanitize_filename(part.trim())
}

fn format_coordinate(value: f64) -> String {
    format!("{value:.4}").replace('.', "_")
}

/// Listing file name for a search around (`lat`, `lng`) whose first result
/// is `first`.
///
/// Example: `restaurants_photos_48_8628_2_3224_75007_Paris_Le_Basilic.json`
pub fn listing_file_name(lat: f64, lng: f64, first: &Place) -> String {
    format!(
        "restaurants_photos_{}_{}_{}_{}.json",
        format_coordinate(lat),
        format_coordinate(lng),
        city_from_address(&first.vicinity),
        sanitize_filename(&first.name)
    )
}

/// Text summary file name paired with a listing file name.
pub fn summary_file_name(listing_file_name: &str) -> String {
    match listing_file_name.strip_suffix(".json") {
        Some(stem) => format!("{stem}_summary.txt"),
        None => format!("{listing_file_name}_summary.txt"),
    }
}
