//! SQL compilation
//!
//! Turns a parsed statement and a field mapping into a parameterized query.
//! Every user-supplied literal becomes a positional `?` binding; no value is
//! ever concatenated into the SQL text. Base-column fields compile to direct
//! predicates on the entity table alias `e`; EAV fields compile to a LEFT
//! JOIN against their attribute-value table with a per-field-unique alias so
//! multiple EAV fields never collide.

use std::collections::HashMap;

use crate::compiler::error::{CompilationError, CompilationResult};
use crate::mapping::{FieldDescriptor, FieldMapping, StorageKind};
use crate::matching::PhoneticMatcher;
use crate::pql::ast::*;

/// Fuzzy predicate recorded for post-fetch refinement
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyNode {
    pub field: String,
    pub term: String,
    pub threshold: f64,
    pub negated: bool,
}

/// Phonetic predicate that could not use a precomputed code column
#[derive(Debug, Clone, PartialEq)]
pub struct PhoneticNode {
    pub field: String,
    pub term: String,
    pub negated: bool,
}

/// How one field contributes to the combined relevance score
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreKind {
    /// Weighted similarity of the field value to the term
    Fuzzy { term: String, threshold: f64 },
    /// Full weight when the predicate matches, zero otherwise
    Predicate { op: ComparisonOp, value: Value },
}

/// One per-field weighted score contribution
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreExpression {
    pub field: String,
    pub weight: f64,
    pub kind: ScoreKind,
}

/// A compiled, parameterized query
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text with `?` placeholders
    pub sql: String,
    /// Binding values in placeholder order
    pub bindings: Vec<Value>,
    /// At least one fuzzy predicate needs in-process refinement
    pub has_fuzzy: bool,
    pub fuzzy_nodes: Vec<FuzzyNode>,
    /// At least one phonetic predicate lacks a precomputed code column
    pub needs_phonetic: bool,
    pub phonetic_nodes: Vec<PhoneticNode>,
    /// SEARCH_FIELDS is present and rows carry a relevance score
    pub needs_scoring: bool,
    pub score_expressions: Vec<ScoreExpression>,
}

impl CompiledQuery {
    /// Whether the executor must over-fetch and refine in-process
    pub fn needs_refinement(&self) -> bool {
        self.has_fuzzy || self.needs_phonetic
    }
}

/// Resolved target of a field reference
enum ResolvedField {
    /// Direct column on the entity table
    Column { expr: String, fulltext: bool },
    /// Value column of an EAV join
    EavValue { expr: String },
}

impl ResolvedField {
    fn expr(&self) -> &str {
        match self {
            ResolvedField::Column { expr, .. } => expr,
            ResolvedField::EavValue { expr } => expr,
        }
    }

    fn fulltext(&self) -> bool {
        matches!(self, ResolvedField::Column { fulltext: true, .. })
    }
}

/// One LEFT JOIN against an attribute-value table
struct EavJoin {
    alias: String,
    table: String,
    /// Attribute id binding, or attribute code for unmapped fields
    attribute: Value,
    by_code: bool,
}

/// SQL compiler
///
/// One instance compiles one statement; identical inputs always produce
/// identical output.
pub struct SqlCompiler<'a> {
    mapping: &'a FieldMapping,
    locale: &'a str,
    joins: Vec<EavJoin>,
    join_by_field: HashMap<String, usize>,
    where_bindings: Vec<Value>,
    fuzzy_nodes: Vec<FuzzyNode>,
    phonetic_nodes: Vec<PhoneticNode>,
    score_expressions: Vec<ScoreExpression>,
}

impl<'a> SqlCompiler<'a> {
    /// Compile a row-returning query
    pub fn compile(
        stmt: &SelectStatement,
        mapping: &'a FieldMapping,
        locale: &'a str,
    ) -> CompilationResult<CompiledQuery> {
        let mut compiler = SqlCompiler::new(mapping, locale);
        // The WHERE clause is compiled first so the SELECT list can carry
        // the values the in-process refinement will need
        let predicate = compiler.compile_where(stmt)?;
        let select_list = compiler.compile_select_list(&stmt.fields)?;
        compiler.finish(select_list, predicate)
    }

    /// Compile the count-oriented variant of a query
    ///
    /// Only usable directly when no approximate predicate is present; the
    /// executor falls back to capped candidate counting otherwise.
    pub fn compile_count(
        stmt: &SelectStatement,
        mapping: &'a FieldMapping,
        locale: &'a str,
    ) -> CompilationResult<CompiledQuery> {
        let mut compiler = SqlCompiler::new(mapping, locale);
        let predicate = compiler.compile_where(stmt)?;
        compiler.finish("COUNT(DISTINCT e.entity_id)".to_string(), predicate)
    }

    fn new(mapping: &'a FieldMapping, locale: &'a str) -> Self {
        SqlCompiler {
            mapping,
            locale,
            joins: Vec::new(),
            join_by_field: HashMap::new(),
            where_bindings: Vec::new(),
            fuzzy_nodes: Vec::new(),
            phonetic_nodes: Vec::new(),
            score_expressions: Vec::new(),
        }
    }

    fn compile_where(&mut self, stmt: &SelectStatement) -> CompilationResult<Option<String>> {
        match &stmt.where_clause {
            Some(where_clause) => Ok(Some(self.compile_expr(&where_clause.root)?)),
            None => Ok(None),
        }
    }

    fn finish(
        self,
        select_list: String,
        predicate: Option<String>,
    ) -> CompilationResult<CompiledQuery> {
        let mut sql = format!(
            "SELECT {} FROM {} AS e",
            select_list,
            self.mapping.entity_table()
        );
        for join in &self.joins {
            let attr_column = if join.by_code {
                "attribute_code"
            } else {
                "attribute_id"
            };
            sql.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}.entity_id = e.entity_id AND {}.{} = ? AND {}.locale = ?",
                join.table, join.alias, join.alias, join.alias, attr_column, join.alias
            ));
        }
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        // Join bindings appear in the SQL text before WHERE bindings
        let mut bindings = Vec::new();
        for join in &self.joins {
            bindings.push(join.attribute.clone());
            bindings.push(Value::String(self.locale.to_string()));
        }
        bindings.extend(self.where_bindings);

        Ok(CompiledQuery {
            sql,
            bindings,
            has_fuzzy: !self.fuzzy_nodes.is_empty(),
            fuzzy_nodes: self.fuzzy_nodes,
            needs_phonetic: !self.phonetic_nodes.is_empty(),
            phonetic_nodes: self.phonetic_nodes,
            needs_scoring: !self.score_expressions.is_empty(),
            score_expressions: self.score_expressions,
        })
    }

    /// Build the SELECT list, resolving named fields to their storage
    ///
    /// Fields referenced by fuzzy/phonetic/scoring predicates are appended
    /// so the fetched rows carry the values the matchers compare against.
    fn compile_select_list(&mut self, fields: &[String]) -> CompilationResult<String> {
        let star = fields.len() == 1 && fields[0] == "*";

        let mut parts = Vec::with_capacity(fields.len());
        if star {
            parts.push("e.*".to_string());
        } else {
            for field in fields {
                let resolved = self.resolve_field(field)?;
                parts.push(format!("{} AS `{}`", resolved.expr(), field));
            }
        }

        let mut refinement_fields: Vec<String> = Vec::new();
        for field in self
            .fuzzy_nodes
            .iter()
            .map(|n| n.field.clone())
            .chain(self.phonetic_nodes.iter().map(|n| n.field.clone()))
            .chain(self.score_expressions.iter().map(|s| s.field.clone()))
            .collect::<Vec<_>>()
        {
            if field.is_empty()
                || fields.contains(&field)
                || refinement_fields.contains(&field)
            {
                continue;
            }
            refinement_fields.push(field);
        }
        for field in refinement_fields {
            let resolved = self.resolve_field(&field)?;
            // `e.*` already covers base columns
            if star && matches!(resolved, ResolvedField::Column { .. }) {
                continue;
            }
            parts.push(format!("{} AS `{}`", resolved.expr(), field));
        }

        Ok(parts.join(", "))
    }

    /// Resolve a field to a SQL expression, adding an EAV join when needed
    fn resolve_field(&mut self, field: &str) -> CompilationResult<ResolvedField> {
        match self.mapping.get(field) {
            Some(descriptor) => match descriptor.storage {
                StorageKind::BaseColumn => {
                    let column = descriptor
                        .column
                        .as_deref()
                        .ok_or_else(|| CompilationError::MissingColumn(field.to_string()))?;
                    Ok(ResolvedField::Column {
                        expr: format!("e.{}", column),
                        fulltext: descriptor.fulltext,
                    })
                }
                StorageKind::EavAttribute => {
                    let attribute_id = descriptor
                        .attribute_id
                        .ok_or_else(|| CompilationError::MissingAttributeId(field.to_string()))?;
                    let alias = self.eav_join(
                        field,
                        descriptor.table.clone(),
                        Value::Integer(attribute_id as i64),
                        false,
                    );
                    Ok(ResolvedField::EavValue {
                        expr: format!("{}.value", alias),
                    })
                }
            },
            // Unmapped fields fall back to an EAV lookup by attribute code;
            // a nonexistent attribute just matches no rows at runtime.
            None => {
                let alias = self.eav_join(
                    field,
                    self.mapping.default_eav_table().to_string(),
                    Value::String(field.to_string()),
                    true,
                );
                Ok(ResolvedField::EavValue {
                    expr: format!("{}.value", alias),
                })
            }
        }
    }

    /// Register (or reuse) the EAV join for a field and return its alias
    fn eav_join(&mut self, field: &str, table: String, attribute: Value, by_code: bool) -> String {
        if let Some(&idx) = self.join_by_field.get(field) {
            return self.joins[idx].alias.clone();
        }
        let alias = format!("av{}", self.joins.len());
        self.joins.push(EavJoin {
            alias: alias.clone(),
            table,
            attribute,
            by_code,
        });
        self.join_by_field
            .insert(field.to_string(), self.joins.len() - 1);
        alias
    }

    fn compile_expr(&mut self, expr: &Expr) -> CompilationResult<String> {
        match expr {
            Expr::Comparison {
                field, op, value, ..
            } => self.compile_comparison(field, *op, value),

            Expr::Logical { op, left, right } => {
                let left_sql = self.compile_expr(left)?;
                let right_sql = self.compile_expr(right)?;
                let connective = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                Ok(format!("({} {} {})", left_sql, connective, right_sql))
            }

            Expr::Fuzzy {
                field,
                term,
                threshold,
                negated,
            } => self.compile_fuzzy(field, term, *threshold, *negated),

            Expr::SoundsLike {
                field,
                term,
                negated,
            } => self.compile_sounds_like(field, term, *negated),

            Expr::SearchFields { fields, inner } => self.compile_search_fields(fields, inner),
        }
    }

    fn compile_comparison(
        &mut self,
        field: &str,
        op: ComparisonOp,
        value: &Operand,
    ) -> CompilationResult<String> {
        let resolved = self.resolve_field(field)?;
        let expr = resolved.expr().to_string();

        let sql = match op {
            ComparisonOp::Eq
            | ComparisonOp::NotEq
            | ComparisonOp::Gt
            | ComparisonOp::Lt
            | ComparisonOp::GtEq
            | ComparisonOp::LtEq => {
                let scalar = expect_scalar(value);
                self.where_bindings.push(scalar);
                format!("{} {} ?", expr, binary_op_sql(op))
            }

            ComparisonOp::Like | ComparisonOp::NotLike => {
                let scalar = expect_scalar(value);
                if resolved.fulltext() {
                    // Use the full-text index instead of a table-scanning LIKE
                    let column = expr;
                    let term = match &scalar {
                        Value::String(s) => fulltext_term(s),
                        _ => String::new(),
                    };
                    self.where_bindings.push(Value::String(term));
                    let prefix = if op == ComparisonOp::NotLike { "NOT " } else { "" };
                    format!("{}MATCH({}) AGAINST (? IN BOOLEAN MODE)", prefix, column)
                } else {
                    self.where_bindings.push(scalar);
                    let keyword = if op == ComparisonOp::NotLike {
                        "NOT LIKE"
                    } else {
                        "LIKE"
                    };
                    format!("{} {} ?", expr, keyword)
                }
            }

            ComparisonOp::In | ComparisonOp::NotIn => {
                let values = expect_list(value);
                let placeholders = vec!["?"; values.len()].join(", ");
                for v in values {
                    self.where_bindings.push(v);
                }
                let keyword = if op == ComparisonOp::NotIn { "NOT IN" } else { "IN" };
                format!("{} {} ({})", expr, keyword, placeholders)
            }

            ComparisonOp::Exists => format!("{} IS NOT NULL", expr),
            ComparisonOp::NotExists => format!("{} IS NULL", expr),

            ComparisonOp::Between | ComparisonOp::NotBetween => {
                let values = expect_list(value);
                for v in values {
                    self.where_bindings.push(v);
                }
                let keyword = if op == ComparisonOp::NotBetween {
                    "NOT BETWEEN"
                } else {
                    "BETWEEN"
                };
                format!("{} {} ? AND ?", expr, keyword)
            }
        };

        Ok(sql)
    }

    /// Coarse SQL pre-filter for a fuzzy predicate
    ///
    /// Similarity cannot be computed in SQL, so the predicate only shrinks
    /// the candidate set; the executor over-fetches and the matcher decides.
    fn compile_fuzzy(
        &mut self,
        field: &str,
        term: &str,
        threshold: f64,
        negated: bool,
    ) -> CompilationResult<String> {
        self.fuzzy_nodes.push(FuzzyNode {
            field: field.to_string(),
            term: term.to_string(),
            threshold: threshold.clamp(0.0, 1.0),
            negated,
        });

        if negated || term.is_empty() {
            // A SQL pre-filter for the complement would discard rows the
            // refinement step must keep
            return Ok("1 = 1".to_string());
        }

        let resolved = self.resolve_field(field)?;
        if resolved.fulltext() {
            let column = resolved.expr().to_string();
            self.where_bindings
                .push(Value::String(fulltext_term(&prefix_of(term))));
            Ok(format!("MATCH({}) AGAINST (? IN BOOLEAN MODE)", column))
        } else {
            let expr = resolved.expr().to_string();
            self.where_bindings
                .push(Value::String(format!("%{}%", prefix_of(term))));
            Ok(format!("{} LIKE ?", expr))
        }
    }

    fn compile_sounds_like(
        &mut self,
        field: &str,
        term: &str,
        negated: bool,
    ) -> CompilationResult<String> {
        // A precomputed phonetic column makes the predicate exact in SQL
        if let Some(descriptor) = self.mapping.get(field) {
            if let Some(phonetic_column) = phonetic_column_of(descriptor) {
                let code = PhoneticMatcher::koelner_phonetik(term);
                self.where_bindings.push(Value::String(code));
                let op = if negated { "!=" } else { "=" };
                return Ok(format!("e.{} {} ?", phonetic_column, op));
            }
        }

        self.phonetic_nodes.push(PhoneticNode {
            field: field.to_string(),
            term: term.to_string(),
            negated,
        });

        if negated || term.is_empty() {
            return Ok("1 = 1".to_string());
        }

        // First-letter pre-filter: phonetic collisions rarely change the
        // initial consonant
        let resolved = self.resolve_field(field)?;
        let expr = resolved.expr().to_string();
        let first = term.chars().next().map(String::from).unwrap_or_default();
        self.where_bindings.push(Value::String(format!("{}%", first)));
        Ok(format!("{} LIKE ?", expr))
    }

    fn compile_search_fields(
        &mut self,
        fields: &[WeightedField],
        inner: &Expr,
    ) -> CompilationResult<String> {
        let mut predicates = Vec::with_capacity(fields.len());

        for weighted in fields {
            let predicate = match inner {
                Expr::Fuzzy {
                    term, threshold, negated, ..
                } => {
                    self.score_expressions.push(ScoreExpression {
                        field: weighted.name.clone(),
                        weight: weighted.weight,
                        kind: ScoreKind::Fuzzy {
                            term: term.clone(),
                            threshold: threshold.clamp(0.0, 1.0),
                        },
                    });
                    self.compile_fuzzy(&weighted.name, term, *threshold, *negated)?
                }
                Expr::Comparison { op, value, .. } => {
                    if let Operand::Scalar(scalar) = value {
                        self.score_expressions.push(ScoreExpression {
                            field: weighted.name.clone(),
                            weight: weighted.weight,
                            kind: ScoreKind::Predicate {
                                op: *op,
                                value: scalar.clone(),
                            },
                        });
                    }
                    self.compile_comparison(&weighted.name, *op, value)?
                }
                // The validator rejects other inner kinds; compile the
                // weighted fields as a no-op rather than guessing
                _ => "1 = 1".to_string(),
            };
            predicates.push(predicate);
        }

        Ok(format!("({})", predicates.join(" OR ")))
    }
}

/// SQL spelling of a binary comparison operator
fn binary_op_sql(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::NotEq => "!=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Lt => "<",
        ComparisonOp::GtEq => ">=",
        ComparisonOp::LtEq => "<=",
        _ => unreachable!("not a binary comparison operator"),
    }
}

/// Leading characters of a term used for the broad fuzzy pre-filter
fn prefix_of(term: &str) -> String {
    term.chars().take(3).collect()
}

/// Convert a LIKE pattern or term to a boolean-mode full-text term
fn fulltext_term(pattern: &str) -> String {
    let stripped: String = pattern.chars().filter(|c| *c != '%' && *c != '*').collect();
    format!("{}*", stripped)
}

fn expect_scalar(value: &Operand) -> Value {
    match value {
        Operand::Scalar(v) => v.clone(),
        // Validated upstream; an empty string binds more safely than a panic
        _ => Value::String(String::new()),
    }
}

fn expect_list(value: &Operand) -> Vec<Value> {
    match value {
        Operand::List(values) => values.clone(),
        _ => Vec::new(),
    }
}

fn phonetic_column_of(descriptor: &FieldDescriptor) -> Option<&str> {
    if descriptor.storage == StorageKind::BaseColumn {
        descriptor.phonetic_column.as_deref()
    } else {
        None
    }
}
