//! Field mapping - logical field names to storage descriptors
//!
//! The mapping is supplied by the surrounding domain layer, built once per
//! request and passed by shared reference into the validator and compiler.
//! The engine never mutates it. Fields absent from the mapping are not
//! rejected; the compiler falls back to an EAV lookup keyed by the field
//! name as a technical attribute code.

use std::collections::HashMap;

/// Declared data type of a logical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Int,
    Decimal,
    Varchar,
    Text,
    Datetime,
}

impl FieldType {
    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Decimal)
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::Varchar | FieldType::Text)
    }
}

/// How a logical field is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// A column on the base entity table
    BaseColumn,
    /// A row in an attribute-value table
    EavAttribute,
}

/// Storage descriptor for one logical field
///
/// `column` and `attribute_id` are populated per storage kind; the compiler
/// raises `CompilationError` when the metadata required by the declared kind
/// is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Storage kind
    pub storage: StorageKind,
    /// Base table (BaseColumn) or attribute-value table (EavAttribute)
    pub table: String,
    /// Physical column name, required for BaseColumn
    pub column: Option<String>,
    /// Attribute identifier, required for EavAttribute
    pub attribute_id: Option<u32>,
    /// Declared data type
    pub data_type: FieldType,
    /// Whether the column carries a full-text index
    pub fulltext: bool,
    /// Precomputed phonetic-code column, when one exists
    pub phonetic_column: Option<String>,
}

impl FieldDescriptor {
    /// Descriptor for a base-table column
    pub fn base_column(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: FieldType,
    ) -> Self {
        FieldDescriptor {
            storage: StorageKind::BaseColumn,
            table: table.into(),
            column: Some(column.into()),
            attribute_id: None,
            data_type,
            fulltext: false,
            phonetic_column: None,
        }
    }

    /// Descriptor for an EAV attribute
    pub fn eav_attribute(
        table: impl Into<String>,
        attribute_id: u32,
        data_type: FieldType,
    ) -> Self {
        FieldDescriptor {
            storage: StorageKind::EavAttribute,
            table: table.into(),
            column: None,
            attribute_id: Some(attribute_id),
            data_type,
            fulltext: false,
            phonetic_column: None,
        }
    }

    /// Mark the field as full-text indexed
    #[must_use]
    pub fn fulltext(mut self) -> Self {
        self.fulltext = true;
        self
    }

    /// Attach a precomputed phonetic-code column
    #[must_use]
    pub fn phonetic_column(mut self, column: impl Into<String>) -> Self {
        self.phonetic_column = Some(column.into());
        self
    }
}

/// Read-only map of logical field names to storage descriptors
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    /// Base entity table queried when a field has no descriptor
    entity_table: String,
    /// Fallback attribute-value table for fields absent from the mapping
    default_eav_table: String,
    fields: HashMap<String, FieldDescriptor>,
}

impl FieldMapping {
    /// Create an empty mapping over the given entity table
    pub fn new(entity_table: impl Into<String>, default_eav_table: impl Into<String>) -> Self {
        FieldMapping {
            entity_table: entity_table.into(),
            default_eav_table: default_eav_table.into(),
            fields: HashMap::new(),
        }
    }

    /// Register a field descriptor
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    /// Base entity table name
    pub fn entity_table(&self) -> &str {
        &self.entity_table
    }

    /// Attribute-value table used for fields without a descriptor
    pub fn default_eav_table(&self) -> &str {
        &self.default_eav_table
    }

    /// Look up a field descriptor
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Check whether a field has a descriptor
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_predicates() {
        assert!(FieldType::Int.is_numeric());
        assert!(FieldType::Decimal.is_numeric());
        assert!(!FieldType::Varchar.is_numeric());
        assert!(FieldType::Text.is_string());
        assert!(!FieldType::Datetime.is_string());
    }

    #[test]
    fn test_mapping_lookup() {
        let mapping = FieldMapping::new("catalog_product", "catalog_product_value")
            .field(
                "sku",
                FieldDescriptor::base_column("catalog_product", "sku", FieldType::Varchar),
            )
            .field(
                "color",
                FieldDescriptor::eav_attribute("catalog_product_value", 12, FieldType::Varchar),
            );

        assert!(mapping.contains("sku"));
        assert_eq!(
            mapping.get("sku").unwrap().storage,
            StorageKind::BaseColumn
        );
        assert_eq!(mapping.get("color").unwrap().attribute_id, Some(12));
        assert!(mapping.get("unknown").is_none());
    }

    #[test]
    fn test_descriptor_builders() {
        let desc = FieldDescriptor::base_column("t", "name", FieldType::Varchar)
            .fulltext()
            .phonetic_column("name_phonetic");
        assert!(desc.fulltext);
        assert_eq!(desc.phonetic_column.as_deref(), Some("name_phonetic"));
    }
}
