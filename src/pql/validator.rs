//! Semantic validation of parsed queries
//!
//! The validator checks an AST against a field mapping and the operator
//! constraints. It is a pure function: no storage access, and it collects
//! every problem in one pass instead of failing fast, so callers can surface
//! a complete error list.
//!
//! Unknown fields are not errors. They resolve to an EAV lookup by attribute
//! code at compile time and simply match no rows when the attribute does not
//! exist.

use crate::mapping::FieldMapping;
use crate::pql::ast::*;

/// Result of validating a query
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Semantic validator
pub struct Validator;

impl Validator {
    /// Validate a statement against a field mapping
    pub fn validate(stmt: &SelectStatement, mapping: &FieldMapping) -> ValidationReport {
        let mut errors = Vec::new();

        if let Some(where_clause) = &stmt.where_clause {
            Self::check_expr(&where_clause.root, mapping, &mut errors);
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn check_expr(expr: &Expr, mapping: &FieldMapping, errors: &mut Vec<String>) {
        match expr {
            Expr::Comparison {
                field, op, value, ..
            } => Self::check_comparison(field, *op, value, mapping, errors),

            Expr::Logical { left, right, .. } => {
                Self::check_expr(left, mapping, errors);
                Self::check_expr(right, mapping, errors);
            }

            Expr::Fuzzy {
                field, threshold, ..
            } => {
                Self::check_threshold(field, *threshold, errors);
            }

            Expr::SoundsLike { .. } => {}

            Expr::SearchFields { fields, inner } => {
                if fields.is_empty() {
                    errors.push("SEARCH_FIELDS requires at least one field".to_string());
                }
                for wf in fields {
                    if wf.weight <= 0.0 {
                        errors.push(format!(
                            "SEARCH_FIELDS weight for '{}' must be positive, got {}",
                            wf.name, wf.weight
                        ));
                    }
                }
                // The inner condition supplies match semantics only; its field
                // name is empty and the weighted list provides the targets.
                match inner.as_ref() {
                    Expr::Fuzzy { threshold, .. } => {
                        Self::check_threshold("SEARCH_FIELDS", *threshold, errors);
                    }
                    Expr::Comparison { op, value, .. } => {
                        Self::check_operand_shape("SEARCH_FIELDS", *op, value, errors);
                    }
                    _ => {
                        errors.push(
                            "SEARCH_FIELDS inner condition must be FUZZY or a comparison"
                                .to_string(),
                        );
                    }
                }
            }
        }
    }

    fn check_comparison(
        field: &str,
        op: ComparisonOp,
        value: &Operand,
        mapping: &FieldMapping,
        errors: &mut Vec<String>,
    ) {
        Self::check_operand_shape(field, op, value, errors);

        // Ordering operators need a numeric field. Unknown fields resolve by
        // attribute code and carry no declared type, so they are exempt.
        if op.is_ordering() {
            if let Some(descriptor) = mapping.get(field) {
                if !descriptor.data_type.is_numeric() {
                    errors.push(format!(
                        "Operator '{}' requires a numeric field, but '{}' is {:?}",
                        op.as_str(),
                        field,
                        descriptor.data_type
                    ));
                }
            }
        }
    }

    /// Check operand arity and type for an operator
    fn check_operand_shape(
        context: &str,
        op: ComparisonOp,
        value: &Operand,
        errors: &mut Vec<String>,
    ) {
        match op {
            ComparisonOp::Between | ComparisonOp::NotBetween => match value {
                Operand::List(values) if values.len() == 2 => {
                    if values.iter().any(|v| !v.is_numeric()) {
                        errors.push(format!(
                            "BETWEEN bounds for '{}' must be numeric",
                            context
                        ));
                    }
                }
                Operand::List(values) => {
                    errors.push(format!(
                        "BETWEEN on '{}' requires exactly 2 values, got {}",
                        context,
                        values.len()
                    ));
                }
                _ => {
                    errors.push(format!(
                        "BETWEEN on '{}' requires a two-element value list",
                        context
                    ));
                }
            },

            ComparisonOp::In | ComparisonOp::NotIn => match value {
                Operand::List(values) if values.is_empty() => {
                    errors.push(format!("IN list for '{}' must not be empty", context));
                }
                Operand::List(_) => {}
                _ => {
                    errors.push(format!("IN on '{}' requires a value list", context));
                }
            },

            ComparisonOp::Exists | ComparisonOp::NotExists => {
                if !matches!(value, Operand::None) {
                    errors.push(format!("EXISTS on '{}' takes no operand", context));
                }
            }

            ComparisonOp::Like | ComparisonOp::NotLike => match value {
                Operand::Scalar(v) if v.is_string() => {}
                _ => {
                    errors.push(format!(
                        "LIKE on '{}' requires a string pattern",
                        context
                    ));
                }
            },

            _ => {
                if !matches!(value, Operand::Scalar(_)) {
                    errors.push(format!(
                        "Operator '{}' on '{}' requires a single value",
                        op.as_str(),
                        context
                    ));
                }
            }
        }
    }

    fn check_threshold(context: &str, threshold: f64, errors: &mut Vec<String>) {
        if !(0.0..=1.0).contains(&threshold) {
            errors.push(format!(
                "Fuzzy threshold for '{}' must be within [0, 1], got {}",
                context, threshold
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldDescriptor, FieldType};
    use crate::pql::parser::Parser;

    fn test_mapping() -> FieldMapping {
        FieldMapping::new("catalog_product", "catalog_product_value")
            .field(
                "sku",
                FieldDescriptor::base_column("catalog_product", "sku", FieldType::Varchar),
            )
            .field(
                "status",
                FieldDescriptor::base_column("catalog_product", "status", FieldType::Varchar),
            )
            .field(
                "price",
                FieldDescriptor::base_column("catalog_product", "price", FieldType::Decimal),
            )
            .field(
                "name",
                FieldDescriptor::eav_attribute("catalog_product_value", 1, FieldType::Varchar),
            )
    }

    fn validate(query: &str) -> ValidationReport {
        let stmt = Parser::parse(query).unwrap();
        Validator::validate(&stmt, &test_mapping())
    }

    #[test]
    fn test_validate_no_where_is_valid() {
        let report = validate("SELECT *");
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_validate_simple_comparison() {
        assert!(validate("WHERE status = 'active'").valid);
    }

    #[test]
    fn test_validate_unknown_field_is_valid() {
        // Unknown fields fall back to EAV-by-name and resolve at runtime
        assert!(validate("WHERE some_custom_attribute = 'x'").valid);
    }

    #[test]
    fn test_validate_ordering_on_string_field() {
        let report = validate("WHERE status > 5");
        assert!(!report.valid);
        assert!(report.errors[0].contains("numeric"));
    }

    #[test]
    fn test_validate_ordering_on_numeric_field() {
        assert!(validate("WHERE price > 10").valid);
        assert!(validate("WHERE price BETWEEN 1 AND 2").valid);
    }

    #[test]
    fn test_validate_between_arity() {
        let stmt = SelectStatement {
            where_clause: Some(WhereClause {
                root: Expr::Comparison {
                    field: "price".to_string(),
                    op: ComparisonOp::Between,
                    value: Operand::List(vec![Value::Integer(1)]),
                    negated: false,
                },
            }),
            ..Default::default()
        };
        let report = Validator::validate(&stmt, &test_mapping());
        assert!(!report.valid);
        assert!(report.errors[0].contains("exactly 2"));
    }

    #[test]
    fn test_validate_between_non_numeric_bounds() {
        let report = validate("WHERE price BETWEEN 'a' AND 'b'");
        assert!(!report.valid);
    }

    #[test]
    fn test_validate_empty_in_list() {
        let report = validate("WHERE status IN ()");
        assert!(!report.valid);
        assert!(report.errors[0].contains("must not be empty"));
    }

    #[test]
    fn test_validate_fuzzy_threshold_range() {
        assert!(validate("WHERE name FUZZY 'drill' 0.8").valid);
        assert!(validate("WHERE name FUZZY 'drill' 0").valid);
        assert!(validate("WHERE name FUZZY 'drill' 1").valid);

        let report = validate("WHERE name FUZZY 'drill' 1.5");
        assert!(!report.valid);
        assert!(report.errors[0].contains("[0, 1]"));
    }

    #[test]
    fn test_validate_search_fields_weights() {
        assert!(validate("WHERE SEARCH_FIELDS(name^2.0, sku) FUZZY 'drill'").valid);

        let report = validate("WHERE SEARCH_FIELDS(name^-1.0) FUZZY 'drill'");
        assert!(!report.valid);
        assert!(report.errors[0].contains("positive"));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let report = validate("WHERE status > 1 AND name FUZZY 'x' 2.0 OR status IN ()");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3);
    }
}
