//! Free-text dimension strings to decimal magnitudes.
//!
//! Unit letters are treated as noise and dropped, never converted: "45cm"
//! and "45mm" both become 45. Multi-number strings such as "190 x 90 mm"
//! collapse to a single run of digits (19090). Existing reports depend on
//! these values, so any unit-aware parsing has to come in as a new
//! derived column rather than a change here.

use crate::database::repo::ArtworkRecord;

/// Keeps only ASCII digits and `.` in their original order, then parses.
/// Anything that does not leave a parseable number yields `None`.
pub fn extract_decimal(raw: &str) -> Option<f64> {
    let kept: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if kept.is_empty() {
        return None;
    }

    kept.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fills `derived` from `raw` if it is still empty. Returns true when a value was written.
fn fill(derived: &mut Option<f64>, raw: Option<&str>) -> bool {
    if derived.is_some() {
        return false;
    }
    *derived = raw.and_then(extract_decimal);
    derived.is_some()
}

/// Cleans width, height and depth of one artwork, touching only empty derived fields.
/// Returns how many derived fields were populated.
pub fn clean_dimensions(record: &mut ArtworkRecord) -> usize {
    [
        fill(&mut record.cleaned_width, record.width.as_deref()),
        fill(&mut record.cleaned_height, record.height.as_deref()),
        fill(&mut record.cleaned_depth, record.depth.as_deref()),
    ]
    .into_iter()
    .filter(|filled| *filled)
    .count()
}
