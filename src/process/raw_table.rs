use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};

#[derive(Debug)]
pub struct RawTable {
    /// Column names exactly as the file spells them.
    pub headers: Vec<String>,
    /// Each data row; may be shorter than `headers` (missing trailing fields).
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    /// Parse delimited text with a header row.
    ///
    /// A record with more fields than the header is a parse error; shorter
    /// records are accepted and their missing fields read as empty.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .context("reading CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            bail!("CSV header row is empty");
        }

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
            if record.len() > headers.len() {
                bail!(
                    "record {} has {} fields, header has {}",
                    idx,
                    record.len(),
                    headers.len()
                );
            }
            rows.push(record);
        }

        Ok(RawTable { headers, rows })
    }

    pub fn cell(&self, row: usize, field: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_are_padded_by_lookup() {
        let raw = RawTable::parse("A,B,C\n1,2\n4,5,6\n").unwrap();
        assert_eq!(raw.headers, vec!["A", "B", "C"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.cell(0, 2), None);
        assert_eq!(raw.cell(1, 2), Some("6"));
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = RawTable::parse("A,B\n1,2,3\n").unwrap_err();
        assert!(err.to_string().contains("record 0"));
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let raw = RawTable::parse("Province/State,Country/Region\n\"Hubei, China\",China\n").unwrap();
        assert_eq!(raw.cell(0, 0), Some("Hubei, China"));
    }

    #[test]
    fn header_only_is_zero_rows() {
        let raw = RawTable::parse("Confirmed,Deaths\n").unwrap();
        assert!(raw.rows.is_empty());
    }
}
