//! Class labels as typed by representatives: `<Program> - L<n> S<n> G<n>`.

use crate::error::AppError;
use crate::models::ClassCoordinates;

const MARKERS: [char; 3] = ['L', 'S', 'G'];

/// Parses a class label into its coordinates.
///
/// The separator is the last dash of the label, so program names may
/// contain dashes themselves. Nothing is guessed: any deviation from the
/// grammar is a [`AppError::Parse`] carrying the raw input.
pub fn parse(label: &str) -> Result<ClassCoordinates, AppError> {
    let fail = |reason: &'static str| AppError::Parse {
        input: label.to_string(),
        reason,
    };

    let (head, tail) = label.rsplit_once('-').ok_or_else(|| fail("missing dash"))?;

    let name = collapse_whitespace(head);
    if name.is_empty() {
        return Err(fail("empty program name"));
    }

    let tokens: Vec<&str> = tail.split_whitespace().collect();
    if tokens.len() != MARKERS.len() {
        return Err(fail("expected level, semester and group markers"));
    }

    let mut values = [0u32; 3];
    for ((token, marker), value) in tokens.iter().zip(MARKERS).zip(values.iter_mut()) {
        let digits = token
            .strip_prefix(marker)
            .ok_or_else(|| fail("markers must read L<n> S<n> G<n>"))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("non-numeric marker value"));
        }
        *value = digits
            .parse::<u32>()
            .map_err(|_| fail("marker value out of range"))?;
    }

    let [licence, semester, group] = values;
    Ok(ClassCoordinates {
        name,
        licence,
        semester,
        group,
    })
}

/// Canonical rendering of coordinates.
pub fn format(coords: &ClassCoordinates) -> String {
    format!(
        "{} - L{} S{} G{}",
        coords.name, coords.licence, coords.semester, coords.group
    )
}

/// Canonical spelling of a label: single spaces, `" - "` separator and
/// marker numbers without leading zeros. For any label accepted by
/// [`parse`], `format(&parse(l)?) == normalize(l)`.
pub fn normalize(label: &str) -> String {
    let Some((head, tail)) = label.rsplit_once('-') else {
        return collapse_whitespace(label);
    };

    let tail = tail
        .split_whitespace()
        .map(strip_marker_zeros)
        .collect::<Vec<_>>()
        .join(" ");

    format!("{} - {}", collapse_whitespace(head), tail)
}

fn strip_marker_zeros(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(marker) if MARKERS.contains(&marker) => {
            let digits = chars.as_str();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return token.to_string();
            }
            let trimmed = digits.trim_start_matches('0');
            let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
            format!("{marker}{trimmed}")
        }
        _ => token.to_string(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
