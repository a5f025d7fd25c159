//! PQL parser
//!
//! Recursive descent over the token stream. `AND` binds tighter than `OR`,
//! so `a OR b AND c` parses as `OR(a, AND(b, c))`. There is no error
//! recovery: the first unexpected token aborts the parse with a
//! `SyntaxError` naming the token and its position.

use crate::pql::ast::*;
use crate::pql::error::{SyntaxError, SyntaxResult};
use crate::pql::lexer::{Lexer, SpannedToken, Token};

/// PQL parser
pub struct Parser {
    tokens: Vec<SpannedToken>,
    position: usize,
}

impl Parser {
    /// Parse a complete PQL query
    pub fn parse(input: &str) -> SyntaxResult<SelectStatement> {
        let tokens = Lexer::tokenize(input)?;
        let mut parser = Parser {
            tokens,
            position: 0,
        };
        parser.parse_query()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)].token
    }

    fn peek_pos(&self) -> usize {
        self.tokens[self.position.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> &Token {
        let idx = self.position.min(self.tokens.len() - 1);
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        &self.tokens[idx].token
    }

    fn expect(&mut self, expected: Token) -> SyntaxResult<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!("Expected '{}', found '{}'", expected, self.peek()),
                self.peek_pos(),
            ))
        }
    }

    fn unexpected<T>(&self) -> SyntaxResult<T> {
        Err(SyntaxError::unexpected(self.peek(), self.peek_pos()))
    }

    /// query := [SELECT fieldList] [FROM ident] [WHERE expr] [ORDER BY SCORE dir]
    fn parse_query(&mut self) -> SyntaxResult<SelectStatement> {
        let mut stmt = SelectStatement::default();

        if *self.peek() == Token::Select {
            self.advance();
            stmt.fields = self.parse_field_list()?;
        }

        if *self.peek() == Token::From {
            self.advance();
            match self.advance().clone() {
                Token::Identifier(name) => stmt.source = Some(name),
                other => {
                    return Err(SyntaxError::new(
                        format!("Expected source name after FROM, found '{}'", other),
                        self.tokens[self.position - 1].position,
                    ));
                }
            }
        }

        if *self.peek() == Token::Where {
            self.advance();
            let root = self.parse_expr()?;
            stmt.where_clause = Some(WhereClause { root });
        }

        if *self.peek() == Token::Order {
            self.advance();
            self.expect(Token::By)?;
            self.expect(Token::Score)?;
            stmt.order_by_score = Some(match self.peek() {
                Token::Asc => {
                    self.advance();
                    ScoreDirection::Asc
                }
                Token::Desc => {
                    self.advance();
                    ScoreDirection::Desc
                }
                _ => return self.unexpected(),
            });
        }

        if *self.peek() != Token::Eof {
            return self.unexpected();
        }
        Ok(stmt)
    }

    /// fieldList := '*' | field (',' field)*
    fn parse_field_list(&mut self) -> SyntaxResult<Vec<String>> {
        if *self.peek() == Token::Star {
            self.advance();
            return Ok(vec!["*".to_string()]);
        }

        let mut fields = Vec::new();
        loop {
            match self.advance().clone() {
                Token::Identifier(name) => fields.push(name),
                other => {
                    return Err(SyntaxError::new(
                        format!("Expected field name, found '{}'", other),
                        self.tokens[self.position - 1].position,
                    ));
                }
            }
            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(fields)
    }

    /// expr := andExpr ('OR' andExpr)*
    fn parse_expr(&mut self) -> SyntaxResult<Expr> {
        let mut left = self.parse_and_expr()?;
        while *self.peek() == Token::Or {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// andExpr := primary ('AND' primary)*
    fn parse_and_expr(&mut self) -> SyntaxResult<Expr> {
        let mut left = self.parse_primary()?;
        while *self.peek() == Token::And {
            self.advance();
            let right = self.parse_primary()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// primary := comparison | fuzzy | soundsLike | searchFields | '(' expr ')'
    fn parse_primary(&mut self) -> SyntaxResult<Expr> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::SearchFields => self.parse_search_fields(),
            Token::Identifier(field) => {
                self.advance();
                self.parse_condition(field)
            }
            _ => self.unexpected(),
        }
    }

    /// Parse the operator and operand that follow a field name
    fn parse_condition(&mut self, field: String) -> SyntaxResult<Expr> {
        match self.peek().clone() {
            Token::Eq => self.parse_comparison(field, ComparisonOp::Eq, false),
            Token::NotEq => self.parse_comparison(field, ComparisonOp::NotEq, false),
            Token::Gt => self.parse_comparison(field, ComparisonOp::Gt, false),
            Token::Lt => self.parse_comparison(field, ComparisonOp::Lt, false),
            Token::GtEq => self.parse_comparison(field, ComparisonOp::GtEq, false),
            Token::LtEq => self.parse_comparison(field, ComparisonOp::LtEq, false),
            Token::Like => self.parse_comparison(field, ComparisonOp::Like, false),
            Token::In => self.parse_comparison(field, ComparisonOp::In, false),
            Token::Exists => self.parse_comparison(field, ComparisonOp::Exists, false),
            Token::Between => self.parse_comparison(field, ComparisonOp::Between, false),
            Token::Fuzzy => self.parse_fuzzy(field, false),
            Token::SoundsLike => self.parse_sounds_like(field, false),
            Token::Not => {
                self.advance();
                // NOT normalizes the operator that follows it
                match self.peek().clone() {
                    Token::Like => self.parse_comparison(field, ComparisonOp::NotLike, true),
                    Token::In => self.parse_comparison(field, ComparisonOp::NotIn, true),
                    Token::Exists => self.parse_comparison(field, ComparisonOp::NotExists, true),
                    Token::Between => self.parse_comparison(field, ComparisonOp::NotBetween, true),
                    Token::Fuzzy => self.parse_fuzzy(field, true),
                    Token::SoundsLike => self.parse_sounds_like(field, true),
                    _ => self.unexpected(),
                }
            }
            _ => self.unexpected(),
        }
    }

    /// Parse the operand shape required by a comparison operator
    fn parse_comparison(
        &mut self,
        field: String,
        op: ComparisonOp,
        negated: bool,
    ) -> SyntaxResult<Expr> {
        self.advance(); // operator token

        let value = match op {
            ComparisonOp::Exists | ComparisonOp::NotExists => Operand::None,
            ComparisonOp::In | ComparisonOp::NotIn => {
                self.expect(Token::LParen)?;
                let mut values = Vec::new();
                while *self.peek() != Token::RParen {
                    values.push(self.parse_scalar()?);
                    if *self.peek() == Token::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                Operand::List(values)
            }
            ComparisonOp::Between | ComparisonOp::NotBetween => {
                let low = self.parse_scalar()?;
                self.expect(Token::And)?;
                let high = self.parse_scalar()?;
                Operand::List(vec![low, high])
            }
            ComparisonOp::Like | ComparisonOp::NotLike => match self.advance().clone() {
                Token::StringLit(s) => Operand::Scalar(Value::String(s)),
                other => {
                    return Err(SyntaxError::new(
                        format!("Expected string pattern after LIKE, found '{}'", other),
                        self.tokens[self.position - 1].position,
                    ));
                }
            },
            _ => Operand::Scalar(self.parse_scalar()?),
        };

        Ok(Expr::Comparison {
            field,
            op,
            value,
            negated,
        })
    }

    /// FUZZY 'term' [threshold]
    fn parse_fuzzy(&mut self, field: String, negated: bool) -> SyntaxResult<Expr> {
        self.advance(); // FUZZY
        let term = self.parse_string()?;
        let threshold = match self.peek() {
            Token::FloatLit(t) => {
                let t = *t;
                self.advance();
                t
            }
            Token::IntLit(t) => {
                let t = *t as f64;
                self.advance();
                t
            }
            _ => 0.7,
        };
        Ok(Expr::Fuzzy {
            field,
            term,
            threshold,
            negated,
        })
    }

    /// SOUNDS_LIKE 'term'
    fn parse_sounds_like(&mut self, field: String, negated: bool) -> SyntaxResult<Expr> {
        self.advance(); // SOUNDS_LIKE
        let term = self.parse_string()?;
        Ok(Expr::SoundsLike {
            field,
            term,
            negated,
        })
    }

    /// SEARCH_FIELDS(field[^weight], ...) innerCondition
    ///
    /// The inner condition carries no field of its own; the weighted list
    /// supplies the match targets, so the parsed inner node has an empty
    /// field name.
    fn parse_search_fields(&mut self) -> SyntaxResult<Expr> {
        self.advance(); // SEARCH_FIELDS
        self.expect(Token::LParen)?;

        let mut fields = Vec::new();
        loop {
            let name = match self.advance().clone() {
                Token::Identifier(name) => name,
                other => {
                    return Err(SyntaxError::new(
                        format!("Expected field name in SEARCH_FIELDS, found '{}'", other),
                        self.tokens[self.position - 1].position,
                    ));
                }
            };
            let weight = if *self.peek() == Token::Caret {
                self.advance();
                match self.advance().clone() {
                    Token::FloatLit(w) => w,
                    Token::IntLit(w) => w as f64,
                    other => {
                        return Err(SyntaxError::new(
                            format!("Expected weight after '^', found '{}'", other),
                            self.tokens[self.position - 1].position,
                        ));
                    }
                }
            } else {
                1.0
            };
            fields.push(WeightedField { name, weight });

            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;

        let inner = match self.peek().clone() {
            Token::Fuzzy => self.parse_fuzzy(String::new(), false)?,
            Token::Not => {
                self.advance();
                match self.peek() {
                    Token::Fuzzy => self.parse_fuzzy(String::new(), true)?,
                    _ => return self.unexpected(),
                }
            }
            Token::Eq
            | Token::NotEq
            | Token::Gt
            | Token::Lt
            | Token::GtEq
            | Token::LtEq
            | Token::Like => {
                let op = match self.peek() {
                    Token::Eq => ComparisonOp::Eq,
                    Token::NotEq => ComparisonOp::NotEq,
                    Token::Gt => ComparisonOp::Gt,
                    Token::Lt => ComparisonOp::Lt,
                    Token::GtEq => ComparisonOp::GtEq,
                    Token::LtEq => ComparisonOp::LtEq,
                    Token::Like => ComparisonOp::Like,
                    _ => unreachable!(),
                };
                self.parse_comparison(String::new(), op, false)?
            }
            _ => return self.unexpected(),
        };

        Ok(Expr::SearchFields {
            fields,
            inner: Box::new(inner),
        })
    }

    /// Parse a scalar literal
    fn parse_scalar(&mut self) -> SyntaxResult<Value> {
        let pos = self.peek_pos();
        match self.advance().clone() {
            Token::StringLit(s) => Ok(Value::String(s)),
            Token::IntLit(n) => Ok(Value::Integer(n)),
            Token::FloatLit(n) => Ok(Value::Float(n)),
            Token::BoolLit(b) => Ok(Value::Boolean(b)),
            other => Err(SyntaxError::new(
                format!("Expected a literal value, found '{}'", other),
                pos,
            )),
        }
    }

    /// Parse a string literal
    fn parse_string(&mut self) -> SyntaxResult<String> {
        let pos = self.peek_pos();
        match self.advance().clone() {
            Token::StringLit(s) => Ok(s),
            other => Err(SyntaxError::new(
                format!("Expected a quoted string, found '{}'", other),
                pos,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_query_defaults() {
        let stmt = Parser::parse("").unwrap();
        assert_eq!(stmt.fields, vec!["*"]);
        assert!(stmt.source.is_none());
        assert!(stmt.where_clause.is_none());
    }

    #[test]
    fn test_parse_select_fields() {
        let stmt = Parser::parse("SELECT sku, name FROM products").unwrap();
        assert_eq!(stmt.fields, vec!["sku", "name"]);
        assert_eq!(stmt.source.as_deref(), Some("products"));
    }

    #[test]
    fn test_parse_simple_comparison() {
        let stmt = Parser::parse("SELECT * WHERE status = 'active'").unwrap();
        let root = stmt.where_clause.unwrap().root;
        assert_eq!(
            root,
            Expr::Comparison {
                field: "status".to_string(),
                op: ComparisonOp::Eq,
                value: Operand::Scalar(Value::String("active".to_string())),
                negated: false,
            }
        );
    }

    #[test]
    fn test_parse_and_binds_tighter_than_or() {
        let stmt = Parser::parse("WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Logical { op, left, right } => {
                assert_eq!(op, LogicalOp::Or);
                assert!(matches!(*left, Expr::Comparison { .. }));
                match *right {
                    Expr::Logical { op, .. } => assert_eq!(op, LogicalOp::And),
                    other => panic!("Expected AND node, got {:?}", other),
                }
            }
            other => panic!("Expected OR node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parentheses_override_precedence() {
        let stmt = Parser::parse("WHERE (a = 1 OR b = 2) AND c = 3").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Logical { op, left, .. } => {
                assert_eq!(op, LogicalOp::And);
                assert!(matches!(
                    *left,
                    Expr::Logical {
                        op: LogicalOp::Or,
                        ..
                    }
                ));
            }
            other => panic!("Expected AND node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_between() {
        let stmt = Parser::parse("WHERE price BETWEEN 50 AND 500").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { op, value, .. } => {
                assert_eq!(op, ComparisonOp::Between);
                assert_eq!(
                    value,
                    Operand::List(vec![Value::Integer(50), Value::Integer(500)])
                );
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_in_list() {
        let stmt = Parser::parse("WHERE status IN ('new', 'active')").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { op, value, .. } => {
                assert_eq!(op, ComparisonOp::In);
                assert_eq!(
                    value,
                    Operand::List(vec![
                        Value::String("new".to_string()),
                        Value::String("active".to_string()),
                    ])
                );
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_exists() {
        let stmt = Parser::parse("WHERE image EXISTS").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { op, value, .. } => {
                assert_eq!(op, ComparisonOp::Exists);
                assert_eq!(value, Operand::None);
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_normalizes_operator() {
        let stmt = Parser::parse("WHERE name NOT LIKE '%tool%'").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { op, negated, .. } => {
                assert_eq!(op, ComparisonOp::NotLike);
                assert!(negated);
            }
            other => panic!("Expected comparison, got {:?}", other),
        }

        let stmt = Parser::parse("WHERE image NOT EXISTS").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { op, negated, .. } => {
                assert_eq!(op, ComparisonOp::NotExists);
                assert!(negated);
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fuzzy_with_threshold() {
        let stmt = Parser::parse("WHERE name FUZZY 'Bohrmaschine' 0.8").unwrap();
        assert_eq!(
            stmt.where_clause.unwrap().root,
            Expr::Fuzzy {
                field: "name".to_string(),
                term: "Bohrmaschine".to_string(),
                threshold: 0.8,
                negated: false,
            }
        );
    }

    #[test]
    fn test_parse_fuzzy_default_threshold() {
        let stmt = Parser::parse("WHERE name FUZZY 'drill'").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Fuzzy { threshold, .. } => assert_eq!(threshold, 0.7),
            other => panic!("Expected fuzzy, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_fuzzy() {
        let stmt = Parser::parse("WHERE name NOT FUZZY 'drill' 0.9").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Fuzzy { negated, .. } => assert!(negated),
            other => panic!("Expected fuzzy, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sounds_like() {
        let stmt = Parser::parse("WHERE manufacturer SOUNDS_LIKE 'Maier'").unwrap();
        assert_eq!(
            stmt.where_clause.unwrap().root,
            Expr::SoundsLike {
                field: "manufacturer".to_string(),
                term: "Maier".to_string(),
                negated: false,
            }
        );
    }

    #[test]
    fn test_parse_search_fields() {
        let stmt =
            Parser::parse("WHERE SEARCH_FIELDS(name^2.0, description) FUZZY 'drill' 0.6").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::SearchFields { fields, inner } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name, "name");
                assert_eq!(fields[0].weight, 2.0);
                assert_eq!(fields[1].weight, 1.0);
                match *inner {
                    Expr::Fuzzy { threshold, .. } => assert_eq!(threshold, 0.6),
                    other => panic!("Expected fuzzy inner, got {:?}", other),
                }
            }
            other => panic!("Expected search fields, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_by_score() {
        let stmt = Parser::parse("WHERE name FUZZY 'x' ORDER BY SCORE DESC").unwrap();
        assert_eq!(stmt.order_by_score, Some(ScoreDirection::Desc));
    }

    #[test]
    fn test_parse_dotted_field() {
        let stmt = Parser::parse("WHERE attributes.color = 'red'").unwrap();
        match stmt.where_clause.unwrap().root {
            Expr::Comparison { field, .. } => assert_eq!(field, "attributes.color"),
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unexpected_token() {
        let err = Parser::parse("WHERE = 5").unwrap_err();
        assert!(err.message.contains("Unexpected"));
        assert_eq!(err.position, 6);
    }

    #[test]
    fn test_parse_truncated_input() {
        let err = Parser::parse("WHERE price >").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_parse_trailing_garbage() {
        assert!(Parser::parse("WHERE a = 1 banana").is_err());
    }
}
