//! Row type - named values fetched from storage

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single value in a row
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
#[serde(untagged)]
pub enum Datum {
    /// NULL value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl Datum {
    /// Check if this datum is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Convert to i64, returns None if NULL or not convertible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(i) => Some(*i),
            Datum::Float(f) => Some(*f as i64),
            Datum::Bool(b) => Some(if *b { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Convert to f64, returns None if NULL or not convertible
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(f) => Some(*f),
            Datum::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to string reference, returns None if not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text representation used by the string matchers
    pub fn text(&self) -> Option<String> {
        match self {
            Datum::String(s) => Some(s.clone()),
            Datum::Int(i) => Some(i.to_string()),
            Datum::Float(f) => Some(f.to_string()),
            Datum::Null | Datum::Bool(_) => None,
        }
    }
}

/// A row of named datums
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Datum>,
}

impl Row {
    /// Create a new row; columns and values must align
    pub fn new(columns: Vec<String>, values: Vec<Datum>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Row { columns, values }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a datum by column name
    pub fn get(&self, column: &str) -> Option<&Datum> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order
    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Keep only the named columns, in the given order
    ///
    /// Columns the row does not carry are skipped.
    pub fn project(&self, columns: &[String]) -> Row {
        let mut kept_columns = Vec::new();
        let mut kept_values = Vec::new();
        for name in columns {
            if let Some(datum) = self.get(name) {
                kept_columns.push(name.clone());
                kept_values.push(datum.clone());
            }
        }
        Row {
            columns: kept_columns,
            values: kept_values,
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["sku".to_string(), "price".to_string()],
            vec![Datum::String("D-100".to_string()), Datum::Float(99.5)],
        )
    }

    #[test]
    fn test_row_get_by_name() {
        let row = sample();
        assert_eq!(row.get("sku"), Some(&Datum::String("D-100".to_string())));
        assert_eq!(row.get("price").and_then(|d| d.as_float()), Some(99.5));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_row_project() {
        let row = sample();
        let projected = row.project(&["price".to_string(), "missing".to_string()]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.columns(), &["price".to_string()]);
    }

    #[test]
    fn test_datum_text() {
        assert_eq!(Datum::String("x".to_string()).text(), Some("x".to_string()));
        assert_eq!(Datum::Int(5).text(), Some("5".to_string()));
        assert_eq!(Datum::Null.text(), None);
    }

    #[test]
    fn test_row_serializes_as_object() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sku"], "D-100");
        assert_eq!(json["price"], 99.5);
    }
}
