use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Returned for labels the table does not cover. A lookup miss never
/// fails the request.
pub const NO_RECOMMENDATION: &str = "No pesticide found";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read pesticide table: {0}")]
    Io(#[from] std::io::Error),
    #[error("pesticide table has no data rows")]
    Empty,
    #[error("pesticide table row {line} has fewer than 2 columns")]
    MalformedRow { line: usize },
}

/// Static pest-to-remedy mapping, built once at startup from a CSV
/// with a header row and (pest, remedy) columns. Immutable afterwards.
#[derive(Debug)]
pub struct RecommendationTable {
    map: HashMap<String, String>,
}

impl RecommendationTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        Self::from_csv(&std::fs::read_to_string(path)?)
    }

    pub fn from_csv(contents: &str) -> Result<Self, TableError> {
        let mut map = HashMap::new();
        // first line is the header
        for (idx, line) in contents.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_csv_row(line);
            if fields.len() < 2 {
                return Err(TableError::MalformedRow { line: idx + 1 });
            }
            map.insert(fields[0].clone(), fields[1].clone());
        }

        if map.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(RecommendationTable { map })
    }

    pub fn lookup(&self, label: &str) -> &str {
        self.map
            .get(label)
            .map(String::as_str)
            .unwrap_or(NO_RECOMMENDATION)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// Minimal quoted-field CSV splitting, enough for the two-column table:
// commas inside double quotes are literal, "" inside quotes escapes one.
fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
Pest,Pesticide (Natural/Non-Harmful)
ant,Diatomaceous earth
caterpillar,\"Neem oil, Bacillus thuringiensis\"
slug,Iron phosphate bait
";

    #[test]
    fn lookup_returns_stored_value_exactly() {
        let table = RecommendationTable::from_csv(TABLE).unwrap();
        assert_eq!(table.lookup("ant"), "Diatomaceous earth");
        assert_eq!(table.lookup("slug"), "Iron phosphate bait");
    }

    #[test]
    fn quoted_remedy_keeps_its_commas() {
        let table = RecommendationTable::from_csv(TABLE).unwrap();
        assert_eq!(
            table.lookup("caterpillar"),
            "Neem oil, Bacillus thuringiensis"
        );
    }

    #[test]
    fn missing_label_falls_back_to_sentinel() {
        let table = RecommendationTable::from_csv(TABLE).unwrap();
        assert_eq!(table.lookup("wasp"), NO_RECOMMENDATION);
    }

    #[test]
    fn header_row_is_not_a_lookup_key() {
        let table = RecommendationTable::from_csv(TABLE).unwrap();
        assert_eq!(table.lookup("Pest"), NO_RECOMMENDATION);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn escaped_quotes_are_preserved() {
        let table =
            RecommendationTable::from_csv("Pest,Remedy\nmoth,\"\"\"light\"\" traps\"\n").unwrap();
        assert_eq!(table.lookup("moth"), "\"light\" traps");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let table = RecommendationTable::from_csv("Pest,Remedy\n\nant,Vinegar spray\n\n").unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
    }

    #[test]
    fn shipped_table_parses_fully() {
        let table =
            RecommendationTable::from_csv(include_str!("../data/natural_pesticides.csv")).unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(
            table.lookup("bee"),
            "Do not spray, relocate the hive with a local beekeeper"
        );
        assert_eq!(table.lookup("slug"), "Iron phosphate bait");
    }

    #[test]
    fn short_row_is_rejected() {
        let err = RecommendationTable::from_csv("Pest,Remedy\nant\n").unwrap_err();
        assert!(matches!(err, TableError::MalformedRow { line: 2 }));
    }

    #[test]
    fn header_only_table_is_rejected() {
        let err = RecommendationTable::from_csv("Pest,Remedy\n").unwrap_err();
        assert!(matches!(err, TableError::Empty));
    }
}
