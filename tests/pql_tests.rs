//! Language layer integration tests

use pql_engine::mapping::{FieldDescriptor, FieldMapping, FieldType};
use pql_engine::pql::{
    ComparisonOp, Expr, LogicalOp, Operand, Parser, ScoreDirection, Validator, Value,
};

/// Create a test mapping with a typical catalog shape
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
            "stock",
            FieldDescriptor::base_column("catalog_product", "stock", FieldType::Int),
        )
        .field(
            "name",
            FieldDescriptor::eav_attribute("catalog_product_value", 1, FieldType::Varchar),
        )
}

// ============ Parser Tests ============

#[test]
fn test_parse_full_query() {
    let stmt = Parser::parse(
        "SELECT sku, name FROM products WHERE price > 10 AND status = 'active' \
         ORDER BY SCORE DESC",
    )
    .unwrap();
    assert_eq!(stmt.fields, vec!["sku", "name"]);
    assert_eq!(stmt.source.as_deref(), Some("products"));
    assert!(stmt.where_clause.is_some());
    assert_eq!(stmt.order_by_score, Some(ScoreDirection::Desc));
}

#[test]
fn test_parse_omitted_select_defaults_to_star() {
    let stmt = Parser::parse("WHERE status = 'active'").unwrap();
    assert_eq!(stmt.fields, vec!["*"]);
}

#[test]
fn test_parse_omitted_where_is_valid() {
    let stmt = Parser::parse("SELECT * FROM products").unwrap();
    assert!(stmt.where_clause.is_none());
}

#[test]
fn test_parse_or_and_precedence() {
    // a OR b AND c parses as OR(a, AND(b, c))
    let stmt = Parser::parse("WHERE sku = 'a' OR sku = 'b' AND sku = 'c'").unwrap();
    match stmt.where_clause.unwrap().root {
        Expr::Logical { op, right, .. } => {
            assert_eq!(op, LogicalOp::Or);
            assert!(matches!(
                *right,
                Expr::Logical {
                    op: LogicalOp::And,
                    ..
                }
            ));
        }
        other => panic!("Expected OR at the root, got {:?}", other),
    }
}

#[test]
fn test_parse_operator_shapes() {
    let stmt = Parser::parse(
        "WHERE price BETWEEN 1 AND 9 \
         OR status IN ('a', 'b') \
         OR name LIKE '%x%' \
         OR sku EXISTS",
    )
    .unwrap();

    let mut ops = Vec::new();
    stmt.where_clause.unwrap().root.visit(&mut |node| {
        if let Expr::Comparison { op, .. } = node {
            ops.push(*op);
        }
    });
    assert_eq!(
        ops,
        vec![
            ComparisonOp::Between,
            ComparisonOp::In,
            ComparisonOp::Like,
            ComparisonOp::Exists,
        ]
    );
}

#[test]
fn test_parse_not_variants() {
    for (query, expected) in [
        ("WHERE name NOT LIKE '%x%'", ComparisonOp::NotLike),
        ("WHERE status NOT IN ('a')", ComparisonOp::NotIn),
        ("WHERE sku NOT EXISTS", ComparisonOp::NotExists),
        ("WHERE price NOT BETWEEN 1 AND 2", ComparisonOp::NotBetween),
    ] {
        let stmt = Parser::parse(query).unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { op, negated, .. } => {
                assert_eq!(op, expected, "for {}", query);
                assert!(negated, "for {}", query);
            }
            other => panic!("Expected comparison for {}, got {:?}", query, other),
        }
    }
}

#[test]
fn test_parse_ne_spellings_agree() {
    let bang = Parser::parse("WHERE stock != 0").unwrap();
    let angle = Parser::parse("WHERE stock <> 0").unwrap();
    assert_eq!(bang, angle);
}

#[test]
fn test_parse_error_reports_position() {
    let err = Parser::parse("WHERE price >> 5").unwrap_err();
    assert!(err.position > 0);
    assert!(err.to_string().contains("position"));
}

#[test]
fn test_parse_unterminated_string() {
    let err = Parser::parse("WHERE name = 'unfinished").unwrap_err();
    assert!(err.message.contains("Unterminated"));
}

#[test]
fn test_parse_no_error_recovery() {
    // The first bad token aborts; nothing is silently skipped
    assert!(Parser::parse("WHERE AND = 5").is_err());
    assert!(Parser::parse("SELECT , FROM x").is_err());
    assert!(Parser::parse("WHERE a = 1 )").is_err());
}

// ============ Validator Tests ============

#[test]
fn test_validate_clean_query() {
    let stmt = Parser::parse("WHERE price BETWEEN 5 AND 10 AND status = 'ok'").unwrap();
    let report = Validator::validate(&stmt, &test_mapping());
    assert!(report.valid);
}

#[test]
fn test_validate_no_where_always_valid() {
    for query in ["", "SELECT *", "SELECT sku FROM products"] {
        let stmt = Parser::parse(query).unwrap();
        let report = Validator::validate(&stmt, &test_mapping());
        assert!(report.valid, "for {:?}", query);
    }
}

#[test]
fn test_validate_numeric_operator_on_string_field() {
    let stmt = Parser::parse("WHERE sku > 5").unwrap();
    let report = Validator::validate(&stmt, &test_mapping());
    assert!(!report.valid);
    assert!(report.errors[0].contains("sku"));
}

#[test]
fn test_validate_unknown_field_passes() {
    let stmt = Parser::parse("WHERE custom_spec = 'IP67'").unwrap();
    let report = Validator::validate(&stmt, &test_mapping());
    assert!(report.valid);
}

#[test]
fn test_validate_threshold_out_of_range() {
    let stmt = Parser::parse("WHERE name FUZZY 'drill' 1.2").unwrap();
    let report = Validator::validate(&stmt, &test_mapping());
    assert!(!report.valid);
}

#[test]
fn test_validate_reports_every_error_at_once() {
    let stmt =
        Parser::parse("WHERE sku > 1 AND name FUZZY 'x' 5.0 AND status IN ()").unwrap();
    let report = Validator::validate(&stmt, &test_mapping());
    assert_eq!(report.errors.len(), 3);
}

// ============ AST Shape Tests ============

#[test]
fn test_ast_scenario_status_comparison() {
    let stmt = Parser::parse("SELECT * WHERE status = 'active'").unwrap();
    assert_eq!(
        stmt.where_clause.unwrap().root,
        Expr::Comparison {
            field: "status".to_string(),
            op: ComparisonOp::Eq,
            value: Operand::Scalar(Value::String("active".to_string())),
            negated: false,
        }
    );
}

#[test]
fn test_ast_serializes_with_node_tags() {
    let stmt = Parser::parse("WHERE name FUZZY 'drill' 0.8").unwrap();
    let json = serde_json::to_value(&stmt).unwrap();
    assert_eq!(json["fields"][0], "*");
    assert_eq!(json["where_clause"]["root"]["node"], "Fuzzy");
    assert_eq!(json["where_clause"]["root"]["threshold"], 0.8);
}
