use std::collections::HashMap;
use tracing::debug;

/// Header spellings used by older daily-report vintages.
const RENAMES: &[(&str, &str)] = &[
    ("latitude", "lat"),
    ("longitude", "long_"),
    ("incidence_rate", "incident_rate"),
];

/// `"Province/State"` -> `"province_state"`, `"Latitude"` -> `"lat"`.
pub fn normalize_header(raw: &str) -> String {
    let name: String = raw
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '/' => '_',
            other => other,
        })
        .collect();

    RENAMES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| to.to_string())
        .unwrap_or(name)
}

/// Normalized source columns, in file order, with their field index.
#[derive(Debug, Default)]
pub struct ColumnMap {
    order: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    /// First occurrence wins when two headers normalize to the same name.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = ColumnMap::default();
        for (i, raw) in headers.into_iter().enumerate() {
            let name = normalize_header(raw);
            if map.index.contains_key(&name) {
                debug!(column = %name, position = i, "duplicate column ignored");
                continue;
            }
            map.index.insert(name.clone(), i);
            map.order.push(name);
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// The recovered-only file variant: nothing but a `recovered` column.
    pub fn is_recovered_only(&self) -> bool {
        self.order.len() == 1 && self.order[0] == "recovered"
    }
}
