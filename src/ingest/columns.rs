// Column header processing
// Turns the CSV header and its first data row into column definitions

use std::collections::HashSet;

use crate::state::{ColumnDef, ParamType};

/// Characters removed from header names
const STRIPPED_CHARS: [char; 5] = [' ', ',', '/', '-', '*'];

/// Row key of every flight table
const RESERVED_NAME: &str = "id";

/// Storage name for a header, e.g. `"Vel Indicated-kts"` -> `"VelIndicatedkts"`
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect()
}

/// Type of a column judged from one sample field
pub fn infer_param_type(sample: &str) -> ParamType {
    if sample.trim().parse::<f64>().is_ok() {
        ParamType::Numeric
    } else {
        ParamType::Text
    }
}

/// Build column definitions from the header and the type sample row
///
/// Empty names, the reserved `ID` and duplicates are flagged `good = false`.
/// Names compare case-insensitively like SQLite identifiers; the first wins.
pub fn build_columns<'a, H, S>(header: H, sample: S) -> Vec<ColumnDef>
where
    H: IntoIterator<Item = &'a str>,
    S: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut sample = sample.into_iter();

    header
        .into_iter()
        .enumerate()
        .map(|(ordinal, raw)| {
            let name = normalize_column_name(raw);
            let param_type = sample
                .next()
                .map(infer_param_type)
                .unwrap_or(ParamType::Text);

            let key = name.to_ascii_lowercase();
            let good = !name.is_empty() && key != RESERVED_NAME && seen.insert(key);
            if !good {
                log::warn!(
                    "Skipping column {} ({:?}): empty, reserved or duplicate name",
                    ordinal,
                    raw
                );
            }

            ColumnDef {
                ordinal,
                raw_name: raw.to_string(),
                name,
                param_type,
                good,
            }
        })
        .collect()
}
