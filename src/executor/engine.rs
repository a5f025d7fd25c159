//! Query engine - validate/explain/query/count orchestration
//!
//! Syntax and validation failures are always converted into structured
//! outcomes inside these entry points. Compilation and storage errors
//! propagate to the caller unmodified; retry policy belongs to the caller.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::compiler::{CostEstimator, ScoreExpression, ScoreKind, SqlCompiler};
use crate::executor::error::EngineResult;
use crate::executor::row::{Datum, Row};
use crate::executor::{StorageBackend, OVER_FETCH_FACTOR};
use crate::mapping::FieldMapping;
use crate::matching::{FuzzyMatcher, PhoneticMatcher};
use crate::pql::ast::*;
use crate::pql::{Parser, Validator};

/// Execution options supplied per call
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Requested page size, clamped to 1..=500
    pub limit: u64,
    /// Row offset
    pub offset: u64,
    /// Locale bound into EAV value joins
    pub locale: String,
    /// Upper bound on candidate materialization for approximate `count()`
    pub fuzzy_safety_cap: u64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            limit: 50,
            offset: 0,
            locale: "en".to_string(),
            fuzzy_safety_cap: 10_000,
        }
    }
}

/// Result of `validate()`
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Serializable AST, present when the query parsed
    pub ast: Option<SelectStatement>,
}

/// Result of `explain()`
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub ast: Option<SelectStatement>,
    pub sql: Option<String>,
    pub bindings: Option<Vec<Value>>,
    pub estimated_cost: String,
}

/// Pagination and refinement metadata returned with query rows
#[derive(Debug, Clone, Serialize)]
pub struct QueryMeta {
    pub limit: u64,
    pub offset: u64,
    /// Rows fetched from storage before refinement
    pub fetched: usize,
    /// Rows returned after refinement and pagination
    pub returned: usize,
    pub over_fetched: bool,
    pub refined: bool,
    pub scored: bool,
}

/// Result of `query()`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The query text failed parsing or validation
    Invalid { errors: Vec<String> },
    /// Rows and pagination metadata
    Rows { rows: Vec<Row>, meta: QueryMeta },
}

/// Result of `count()`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CountOutcome {
    /// The query text failed parsing or validation
    Invalid { errors: Vec<String> },
    /// Match count; `approximate` is set under fuzzy/phonetic predicates,
    /// where the count is bounded by the safety cap and may undercount
    Count { value: u64, approximate: bool },
}

/// PQL query engine
///
/// Stateless per call: the field mapping and options arrive as arguments,
/// and the only suspending operation is the storage round-trip.
pub struct QueryEngine {
    storage: Arc<dyn StorageBackend>,
}

impl QueryEngine {
    /// Create an engine over the given storage backend
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        QueryEngine { storage }
    }

    /// Parse and validate a query without executing it
    pub fn validate(&self, text: &str, mapping: &FieldMapping) -> ValidationOutcome {
        match Parser::parse(text) {
            Err(e) => ValidationOutcome {
                valid: false,
                errors: vec![e.to_string()],
                ast: None,
            },
            Ok(stmt) => {
                let report = Validator::validate(&stmt, mapping);
                ValidationOutcome {
                    valid: report.valid,
                    errors: report.errors,
                    ast: Some(stmt),
                }
            }
        }
    }

    /// Parse and compile a query without executing it
    pub fn explain(
        &self,
        text: &str,
        mapping: &FieldMapping,
        locale: &str,
    ) -> EngineResult<Explanation> {
        let stmt = match Parser::parse(text) {
            Err(_) => {
                return Ok(Explanation {
                    ast: None,
                    sql: None,
                    bindings: None,
                    estimated_cost: "N/A".to_string(),
                });
            }
            Ok(stmt) => stmt,
        };

        let compiled = SqlCompiler::compile(&stmt, mapping, locale)?;
        let estimated_cost = CostEstimator::annotate(&compiled);
        Ok(Explanation {
            ast: Some(stmt),
            sql: Some(compiled.sql),
            bindings: Some(compiled.bindings),
            estimated_cost,
        })
    }

    /// Execute a query and return rows plus pagination metadata
    pub async fn query(
        &self,
        text: &str,
        mapping: &FieldMapping,
        options: &QueryOptions,
    ) -> EngineResult<QueryOutcome> {
        let stmt = match Parser::parse(text) {
            Err(e) => {
                return Ok(QueryOutcome::Invalid {
                    errors: vec![e.to_string()],
                });
            }
            Ok(stmt) => stmt,
        };

        // Fail fast on validation errors; no compilation is attempted
        let report = Validator::validate(&stmt, mapping);
        if !report.valid {
            return Ok(QueryOutcome::Invalid {
                errors: report.errors,
            });
        }

        let compiled = SqlCompiler::compile(&stmt, mapping, &options.locale)?;

        let limit = options.limit.clamp(1, 500);
        let offset = options.offset;
        let scored = compiled.needs_scoring && stmt.order_by_score.is_some();
        let over_fetched = compiled.needs_refinement() || scored;

        let sql = if over_fetched {
            // Refinement and scoring both need the whole window re-ranked,
            // so the offset moves in process
            format!(
                "{} LIMIT {}",
                compiled.sql,
                (offset + limit) * OVER_FETCH_FACTOR
            )
        } else if offset > 0 {
            format!("{} LIMIT {} OFFSET {}", compiled.sql, limit, offset)
        } else {
            format!("{} LIMIT {}", compiled.sql, limit)
        };

        debug!(over_fetched, has_fuzzy = compiled.has_fuzzy, "executing PQL query");
        let mut rows = self.storage.fetch(&sql, &compiled.bindings).await?;
        let fetched = rows.len();

        let refined = compiled.needs_refinement();
        if refined {
            if let Some(where_clause) = &stmt.where_clause {
                rows.retain(|row| row_satisfies(&where_clause.root, row));
            }
        }

        if let Some(direction) = stmt.order_by_score {
            if compiled.needs_scoring {
                sort_by_score(&mut rows, &compiled.score_expressions, direction);
            }
        }

        if over_fetched {
            rows = rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
        }

        if !(stmt.fields.len() == 1 && stmt.fields[0] == "*") {
            rows = rows.iter().map(|row| row.project(&stmt.fields)).collect();
        }

        let returned = rows.len();
        Ok(QueryOutcome::Rows {
            rows,
            meta: QueryMeta {
                limit,
                offset,
                fetched,
                returned,
                over_fetched,
                refined,
                scored,
            },
        })
    }

    /// Count matching rows
    ///
    /// Exact via SQL when no approximate predicate is present; otherwise a
    /// capped candidate set is fetched and counted post-filter, which can
    /// undercount very large approximate result sets.
    pub async fn count(
        &self,
        text: &str,
        mapping: &FieldMapping,
        options: &QueryOptions,
    ) -> EngineResult<CountOutcome> {
        let stmt = match Parser::parse(text) {
            Err(e) => {
                return Ok(CountOutcome::Invalid {
                    errors: vec![e.to_string()],
                });
            }
            Ok(stmt) => stmt,
        };

        let report = Validator::validate(&stmt, mapping);
        if !report.valid {
            return Ok(CountOutcome::Invalid {
                errors: report.errors,
            });
        }

        let compiled = SqlCompiler::compile(&stmt, mapping, &options.locale)?;

        if !compiled.needs_refinement() {
            let counting = SqlCompiler::compile_count(&stmt, mapping, &options.locale)?;
            let rows = self.storage.fetch(&counting.sql, &counting.bindings).await?;
            let value = rows
                .first()
                .and_then(|row| row.values().first())
                .and_then(|datum| datum.as_int())
                .unwrap_or(0) as u64;
            return Ok(CountOutcome::Count {
                value,
                approximate: false,
            });
        }

        // Approximate path: materialize candidates up to the safety cap and
        // count what survives refinement
        let cap = options.fuzzy_safety_cap.max(1);
        let sql = format!("{} LIMIT {}", compiled.sql, cap);
        debug!(cap, "counting under approximate predicates");
        let mut rows = self.storage.fetch(&sql, &compiled.bindings).await?;
        if let Some(where_clause) = &stmt.where_clause {
            rows.retain(|row| row_satisfies(&where_clause.root, row));
        }

        Ok(CountOutcome::Count {
            value: rows.len() as u64,
            approximate: true,
        })
    }
}

/// Re-evaluate the filter tree against a fetched row
///
/// Exact predicates were already enforced by the SQL pre-filter, so they
/// evaluate to true; approximate leaves consult the matchers. A leaf whose
/// field value the row does not carry cannot be refuted and passes.
fn row_satisfies(expr: &Expr, row: &Row) -> bool {
    match expr {
        Expr::Comparison { .. } => true,

        Expr::Logical { op, left, right } => match op {
            LogicalOp::And => row_satisfies(left, row) && row_satisfies(right, row),
            LogicalOp::Or => row_satisfies(left, row) || row_satisfies(right, row),
        },

        Expr::Fuzzy {
            field,
            term,
            threshold,
            negated,
        } => {
            let Some(text) = row.get(field).and_then(|d| d.text()) else {
                return true;
            };
            let pass = FuzzyMatcher::similarity(term, &text) >= threshold.clamp(0.0, 1.0);
            pass != *negated
        }

        Expr::SoundsLike {
            field,
            term,
            negated,
        } => {
            let Some(text) = row.get(field).and_then(|d| d.text()) else {
                return true;
            };
            PhoneticMatcher::sounds_like(term, &text) != *negated
        }

        Expr::SearchFields { fields, inner } => match inner.as_ref() {
            Expr::Fuzzy {
                term,
                threshold,
                negated,
                ..
            } => {
                let threshold = threshold.clamp(0.0, 1.0);
                let mut any_value = false;
                let mut any_pass = false;
                for weighted in fields {
                    if let Some(text) = row.get(&weighted.name).and_then(|d| d.text()) {
                        any_value = true;
                        if FuzzyMatcher::similarity(term, &text) >= threshold {
                            any_pass = true;
                        }
                    }
                }
                if !any_value {
                    return true;
                }
                any_pass != *negated
            }
            _ => true,
        },
    }
}

/// Compute the weighted relevance score for one row
fn score_row(expressions: &[ScoreExpression], row: &Row) -> f64 {
    expressions
        .iter()
        .map(|se| {
            let Some(datum) = row.get(&se.field) else {
                return 0.0;
            };
            match &se.kind {
                ScoreKind::Fuzzy { term, threshold } => match datum.text() {
                    Some(text) => {
                        let similarity = FuzzyMatcher::similarity(term, &text);
                        if similarity >= *threshold {
                            se.weight * similarity
                        } else {
                            0.0
                        }
                    }
                    None => 0.0,
                },
                ScoreKind::Predicate { op, value } => {
                    if predicate_matches(*op, value, datum) {
                        se.weight
                    } else {
                        0.0
                    }
                }
            }
        })
        .sum()
}

fn sort_by_score(rows: &mut Vec<Row>, expressions: &[ScoreExpression], direction: ScoreDirection) {
    let mut keyed: Vec<(f64, Row)> = std::mem::take(rows)
        .into_iter()
        .map(|row| (score_row(expressions, &row), row))
        .collect();
    keyed.sort_by(|a, b| {
        let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
        match direction {
            ScoreDirection::Asc => ord,
            ScoreDirection::Desc => ord.reverse(),
        }
    });
    *rows = keyed.into_iter().map(|(_, row)| row).collect();
}

/// Evaluate a scoring predicate against one datum
fn predicate_matches(op: ComparisonOp, value: &Value, datum: &Datum) -> bool {
    match op {
        ComparisonOp::Eq => datum_eq(datum, value),
        ComparisonOp::NotEq => !datum_eq(datum, value),
        ComparisonOp::Like => match (datum.text(), value) {
            (Some(text), Value::String(pattern)) => like_match(pattern, &text),
            _ => false,
        },
        ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::GtEq | ComparisonOp::LtEq => {
            match (datum.as_float(), value_as_f64(value)) {
                (Some(a), Some(b)) => match op {
                    ComparisonOp::Gt => a > b,
                    ComparisonOp::Lt => a < b,
                    ComparisonOp::GtEq => a >= b,
                    ComparisonOp::LtEq => a <= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
        _ => false,
    }
}

fn datum_eq(datum: &Datum, value: &Value) -> bool {
    match (datum, value) {
        (Datum::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (Datum::Bool(a), Value::Boolean(b)) => a == b,
        _ => match (datum.as_float(), value_as_f64(value)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// SQL LIKE pattern match: `%` any run, `_` one character, case-insensitive
fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();

    let mut dp = vec![vec![false; t.len() + 1]; p.len() + 1];
    dp[0][0] = true;
    for i in 1..=p.len() {
        if p[i - 1] == '%' {
            dp[i][0] = dp[i - 1][0];
        }
    }
    for i in 1..=p.len() {
        for j in 1..=t.len() {
            dp[i][j] = match p[i - 1] {
                '%' => dp[i - 1][j] || dp[i][j - 1],
                '_' => dp[i - 1][j - 1],
                c => dp[i - 1][j - 1] && t[j - 1] == c,
            };
        }
    }
    dp[p.len()][t.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Datum)]) -> Row {
        Row::new(
            pairs.iter().map(|(c, _)| c.to_string()).collect(),
            pairs.iter().map(|(_, d)| d.clone()).collect(),
        )
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("%drill%", "Cordless Drill 18V"));
        assert!(like_match("BOSCH-%", "bosch-123"));
        assert!(like_match("dr_ll", "drill"));
        assert!(!like_match("%saw%", "drill"));
    }

    #[test]
    fn test_row_satisfies_fuzzy() {
        let expr = Expr::Fuzzy {
            field: "name".to_string(),
            term: "Bohrmaschine".to_string(),
            threshold: 0.8,
            negated: false,
        };
        let close = row(&[("name", Datum::String("Bohrmaschiene".to_string()))]);
        let far = row(&[("name", Datum::String("Akkuschrauber".to_string()))]);
        assert!(row_satisfies(&expr, &close));
        assert!(!row_satisfies(&expr, &far));
    }

    #[test]
    fn test_row_satisfies_negated_fuzzy() {
        let expr = Expr::Fuzzy {
            field: "name".to_string(),
            term: "drill".to_string(),
            threshold: 0.8,
            negated: true,
        };
        let matching = row(&[("name", Datum::String("drill".to_string()))]);
        let other = row(&[("name", Datum::String("saw".to_string()))]);
        assert!(!row_satisfies(&expr, &matching));
        assert!(row_satisfies(&expr, &other));
    }

    #[test]
    fn test_row_satisfies_or_with_exact_branch() {
        // A row that matched only the exact branch of an OR must survive
        let expr = Expr::Logical {
            op: LogicalOp::Or,
            left: Box::new(Expr::Comparison {
                field: "status".to_string(),
                op: ComparisonOp::Eq,
                value: Operand::Scalar(Value::String("active".to_string())),
                negated: false,
            }),
            right: Box::new(Expr::Fuzzy {
                field: "name".to_string(),
                term: "drill".to_string(),
                threshold: 0.9,
                negated: false,
            }),
        };
        let exact_only = row(&[
            ("status", Datum::String("active".to_string())),
            ("name", Datum::String("unrelated".to_string())),
        ]);
        assert!(row_satisfies(&expr, &exact_only));
    }

    #[test]
    fn test_row_satisfies_missing_field_passes() {
        let expr = Expr::Fuzzy {
            field: "name".to_string(),
            term: "drill".to_string(),
            threshold: 0.8,
            negated: false,
        };
        let no_name = row(&[("sku", Datum::String("X".to_string()))]);
        assert!(row_satisfies(&expr, &no_name));
    }

    #[test]
    fn test_row_satisfies_sounds_like() {
        let expr = Expr::SoundsLike {
            field: "manufacturer".to_string(),
            term: "Maier".to_string(),
            negated: false,
        };
        let collide = row(&[("manufacturer", Datum::String("Meyer".to_string()))]);
        let differ = row(&[("manufacturer", Datum::String("Schmidt".to_string()))]);
        assert!(row_satisfies(&expr, &collide));
        assert!(!row_satisfies(&expr, &differ));
    }

    #[test]
    fn test_score_row_weights() {
        let expressions = vec![
            ScoreExpression {
                field: "name".to_string(),
                weight: 2.0,
                kind: ScoreKind::Fuzzy {
                    term: "drill".to_string(),
                    threshold: 0.5,
                },
            },
            ScoreExpression {
                field: "sku".to_string(),
                weight: 1.0,
                kind: ScoreKind::Fuzzy {
                    term: "drill".to_string(),
                    threshold: 0.5,
                },
            },
        ];
        let exact = row(&[
            ("name", Datum::String("drill".to_string())),
            ("sku", Datum::String("zzzzz".to_string())),
        ]);
        // Exact match on the weight-2 field scores 2.0; the sku contributes 0
        assert!((score_row(&expressions, &exact) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_predicate_matches_ordering() {
        assert!(predicate_matches(
            ComparisonOp::Gt,
            &Value::Integer(10),
            &Datum::Float(10.5)
        ));
        assert!(!predicate_matches(
            ComparisonOp::LtEq,
            &Value::Integer(10),
            &Datum::Int(11)
        ));
    }
}
