//! Recursive-descent parser for CCL token streams.
//!
//! Grammar sketch:
//! ```text
//! document   := statement (NEWLINE+ statement)* NEWLINE* EOF
//! statement  := permit | deny | require | limit
//! permit     := "permit" pattern "on" STRING when? sev?
//! deny       := "deny"   pattern "on" STRING when? sev?
//! require    := "require" pattern "on" STRING when? sev?
//! limit      := "limit"  pattern INT "per" INT time_unit sev?
//! when       := "when" condition
//! condition  := or
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | atom
//! atom       := "(" condition ")" | comparison
//! ```
//!
//! `severity` is a reserved word and cannot be used as a condition field.

use super::lexer::{Token, TokenType};
use super::{CompareOp, CondValue, Condition, LimitRule, Rule, Severity, Statement};
use crate::PactumError;

pub(super) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(super) fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        if self.pos < self.tokens.len() {
            &self.tokens[self.pos]
        } else {
            self.tokens.last().unwrap() // EOF token
        }
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tt: &TokenType) -> bool {
        self.current().token_type == *tt
    }

    fn error(&self, message: String) -> PactumError {
        PactumError::CclSyntax {
            line: self.current().line,
            col: self.current().column,
            message,
        }
    }

    fn expect(&mut self, tt: &TokenType, msg: &str) -> Result<Token, PactumError> {
        if self.current().token_type == *tt {
            Ok(self.advance())
        } else {
            Err(self.error(format!("{}, got '{}'", msg, self.current().value)))
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().token_type == TokenType::Eof
    }

    fn skip_newlines_and_comments(&mut self) {
        while self.pos < self.tokens.len()
            && (self.current().token_type == TokenType::Newline
                || self.current().token_type == TokenType::Comment)
        {
            self.pos += 1;
        }
    }

    pub(super) fn parse(&mut self) -> Result<Vec<Statement>, PactumError> {
        let mut statements = Vec::new();

        self.skip_newlines_and_comments();

        while !self.is_at_end() {
            let stmt = self.parse_statement()?;
            statements.push(stmt);
            self.skip_newlines_and_comments();
        }

        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, PactumError> {
        match self.current().token_type {
            TokenType::Permit => {
                self.advance();
                Ok(Statement::Permit(self.parse_rule()?))
            }
            TokenType::Deny => {
                self.advance();
                Ok(Statement::Deny(self.parse_rule()?))
            }
            TokenType::Require => {
                self.advance();
                Ok(Statement::Require(self.parse_rule()?))
            }
            TokenType::Limit => {
                self.advance();
                Ok(Statement::Limit(self.parse_limit()?))
            }
            _ => Err(self.error(format!(
                "Expected statement keyword (permit, deny, require, or limit), got '{}'",
                self.current().value
            ))),
        }
    }

    fn parse_rule(&mut self) -> Result<Rule, PactumError> {
        let action = self.parse_action()?;
        self.expect(&TokenType::On, "Expected 'on' after action")?;
        let resource = self.parse_resource()?;

        let condition = if self.check(&TokenType::When) {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        let severity = self.parse_severity_suffix()?;

        Ok(Rule {
            action,
            resource,
            condition,
            severity,
        })
    }

    fn parse_limit(&mut self) -> Result<LimitRule, PactumError> {
        let action = self.parse_action()?;

        let count_tok = self.expect(
            &TokenType::Number,
            "Expected count number after action in limit statement",
        )?;
        let count: u32 = count_tok
            .value
            .parse()
            .map_err(|_| self.error(format!("Invalid limit count: {}", count_tok.value)))?;

        self.expect(&TokenType::Per, "Expected 'per' in limit statement")?;

        let period_tok = self.expect(
            &TokenType::Number,
            "Expected period number after 'per' in limit statement",
        )?;
        let raw_period: u64 = period_tok
            .value
            .parse()
            .map_err(|_| self.error(format!("Invalid limit period: {}", period_tok.value)))?;

        let unit_tok = self.expect(
            &TokenType::TimeUnit,
            "Expected time unit (seconds, minutes, hours, days)",
        )?;
        let multiplier = time_unit_multiplier(&unit_tok.value.to_lowercase());
        let period_seconds = raw_period.checked_mul(multiplier).ok_or_else(|| {
            PactumError::CclValidation(format!(
                "Limit period {} {} overflows",
                raw_period, unit_tok.value
            ))
        })?;
        if period_seconds == 0 {
            return Err(PactumError::CclValidation(
                "Limit period must be greater than zero".to_string(),
            ));
        }
        let period_seconds: u32 = period_seconds.try_into().map_err(|_| {
            PactumError::CclValidation(format!(
                "Limit period of {} seconds exceeds the supported maximum",
                period_seconds
            ))
        })?;

        let severity = self.parse_severity_suffix()?;

        Ok(LimitRule {
            action,
            count,
            period_seconds,
            severity,
        })
    }

    fn parse_severity_suffix(&mut self) -> Result<Severity, PactumError> {
        if !self.check(&TokenType::Severity) {
            return Ok(Severity::default());
        }
        self.advance();
        let tok = self.expect(
            &TokenType::Identifier,
            "Expected severity level (critical, high, medium, low)",
        )?;
        Severity::from_str(&tok.value).ok_or_else(|| {
            self.error(format!(
                "Unknown severity level '{}' (expected critical, high, medium, or low)",
                tok.value
            ))
        })
    }

    fn parse_action(&mut self) -> Result<String, PactumError> {
        let mut parts = Vec::new();

        if self.check(&TokenType::DoubleWildcard) {
            self.advance();
            return Ok("**".to_string());
        }

        if self.check(&TokenType::Wildcard) {
            parts.push("*".to_string());
            self.advance();
        } else if self.check(&TokenType::Identifier) {
            parts.push(self.advance().value);
        } else {
            return Err(self.error(format!(
                "Expected action identifier, got '{}'",
                self.current().value
            )));
        }

        while self.check(&TokenType::Dot) {
            self.advance(); // consume dot
            if self.check(&TokenType::Identifier) {
                parts.push(self.advance().value);
            } else if self.check(&TokenType::Wildcard) {
                parts.push("*".to_string());
                self.advance();
            } else if self.check(&TokenType::DoubleWildcard) {
                parts.push("**".to_string());
                self.advance();
            } else {
                return Err(self.error(format!(
                    "Expected identifier or wildcard after dot, got '{}'",
                    self.current().value
                )));
            }
        }

        Ok(parts.join("."))
    }

    fn parse_resource(&mut self) -> Result<String, PactumError> {
        match self.current().token_type {
            TokenType::StringLit => Ok(self.advance().value),
            TokenType::Wildcard => {
                self.advance();
                Ok("*".to_string())
            }
            TokenType::DoubleWildcard => {
                self.advance();
                Ok("**".to_string())
            }
            TokenType::Identifier => Ok(self.advance().value),
            _ => Err(self.error(format!(
                "Expected resource (string or pattern), got '{}'",
                self.current().value
            ))),
        }
    }

    // condition := or
    fn parse_condition(&mut self) -> Result<Condition, PactumError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Condition, PactumError> {
        let first = self.parse_and()?;
        if !self.check(&TokenType::Or) {
            return Ok(first);
        }
        let mut children = vec![first];
        while self.check(&TokenType::Or) {
            self.advance();
            children.push(self.parse_and()?);
        }
        Ok(Condition::Or(children))
    }

    fn parse_and(&mut self) -> Result<Condition, PactumError> {
        let first = self.parse_not()?;
        if !self.check(&TokenType::And) {
            return Ok(first);
        }
        let mut children = vec![first];
        while self.check(&TokenType::And) {
            self.advance();
            children.push(self.parse_not()?);
        }
        Ok(Condition::And(children))
    }

    fn parse_not(&mut self) -> Result<Condition, PactumError> {
        if self.check(&TokenType::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Condition, PactumError> {
        if self.check(&TokenType::LParen) {
            self.advance();
            let inner = self.parse_condition()?;
            self.expect(&TokenType::RParen, "Expected ')' to close condition group")?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Condition, PactumError> {
        let field = self.parse_field()?;

        if self.current().token_type != TokenType::Operator {
            return Err(self.error(format!(
                "Expected operator after field '{}', got '{}'",
                field,
                self.current().value
            )));
        }
        let op_tok = self.advance();
        let op = CompareOp::from_str(&op_tok.value)
            .ok_or_else(|| self.error(format!("Unknown operator '{}'", op_tok.value)))?;

        let value = self.parse_value()?;

        Ok(Condition::Compare { field, op, value })
    }

    fn parse_field(&mut self) -> Result<String, PactumError> {
        if self.check(&TokenType::Severity) {
            return Err(self.error(
                "'severity' is a reserved word and cannot be used as a condition field"
                    .to_string(),
            ));
        }
        if self.current().token_type != TokenType::Identifier {
            return Err(self.error(format!(
                "Expected field identifier, got '{}'",
                self.current().value
            )));
        }

        let mut field = self.advance().value;

        while self.check(&TokenType::Dot) {
            self.advance();
            if self.current().token_type != TokenType::Identifier {
                return Err(self.error(format!(
                    "Expected identifier after dot in field, got '{}'",
                    self.current().value
                )));
            }
            field.push('.');
            field.push_str(&self.advance().value);
        }

        Ok(field)
    }

    fn parse_value(&mut self) -> Result<CondValue, PactumError> {
        match self.current().token_type {
            TokenType::StringLit => Ok(CondValue::Str(self.advance().value)),
            TokenType::Number => {
                let tok = self.advance();
                let n: f64 = tok
                    .value
                    .parse()
                    .map_err(|_| self.error(format!("Invalid number: {}", tok.value)))?;
                Ok(CondValue::Num(n))
            }
            TokenType::Identifier => {
                let tok = self.advance();
                match tok.value.as_str() {
                    "true" => Ok(CondValue::Bool(true)),
                    "false" => Ok(CondValue::Bool(false)),
                    _ => Ok(CondValue::Str(tok.value)),
                }
            }
            TokenType::LBracket => {
                self.advance();
                let mut items = Vec::new();
                let first =
                    self.expect(&TokenType::StringLit, "Expected string in list value")?;
                items.push(first.value);
                while self.check(&TokenType::Comma) {
                    self.advance();
                    let item =
                        self.expect(&TokenType::StringLit, "Expected string after ',' in list")?;
                    items.push(item.value);
                }
                self.expect(&TokenType::RBracket, "Expected ']' to close list value")?;
                Ok(CondValue::List(items))
            }
            _ => Err(self.error(format!(
                "Expected value, got '{}'",
                self.current().value
            ))),
        }
    }
}

fn time_unit_multiplier(unit: &str) -> u64 {
    match unit {
        "second" | "seconds" => 1,
        "minute" | "minutes" => 60,
        "hour" | "hours" => 3600,
        "day" | "days" => 86400,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse, CompareOp, CondValue, Condition, Severity, Statement};
    use crate::PactumError;

    #[test]
    fn test_parse_permit() {
        let doc = parse("permit read on '/data/**'").unwrap();
        assert_eq!(doc.permits.len(), 1);
        assert_eq!(doc.permits[0].action, "read");
        assert_eq!(doc.permits[0].resource, "/data/**");
        assert_eq!(doc.permits[0].severity, Severity::High);
    }

    #[test]
    fn test_parse_deny_with_severity() {
        let doc = parse("deny write on '/secret' severity critical").unwrap();
        assert_eq!(doc.denies.len(), 1);
        assert_eq!(doc.denies[0].severity, Severity::Critical);
    }

    #[test]
    fn test_parse_require() {
        let doc = parse("require audit.log on '/payments/**'").unwrap();
        assert_eq!(doc.obligations.len(), 1);
        assert_eq!(doc.obligations[0].action, "audit.log");
    }

    #[test]
    fn test_parse_limit() {
        let doc = parse("limit api.call 100 per 1 hours").unwrap();
        assert_eq!(doc.limits.len(), 1);
        assert_eq!(doc.limits[0].count, 100);
        assert_eq!(doc.limits[0].period_seconds, 3600);
    }

    #[test]
    fn test_parse_limit_zero_period_is_validation_error() {
        let err = parse("limit api.call 5 per 0 seconds").unwrap_err();
        assert!(matches!(err, PactumError::CclValidation(_)));
    }

    #[test]
    fn test_parse_limit_zero_count_allowed() {
        let doc = parse("limit exec 0 per 1 days").unwrap();
        assert_eq!(doc.limits[0].count, 0);
    }

    #[test]
    fn test_parse_simple_condition() {
        let doc = parse("permit read on '/data' when user.role = 'admin'").unwrap();
        match doc.permits[0].condition.as_ref().unwrap() {
            Condition::Compare { field, op, value } => {
                assert_eq!(field, "user.role");
                assert_eq!(*op, CompareOp::Eq);
                assert_eq!(*value, CondValue::Str("admin".to_string()));
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_condition_tree() {
        let doc = parse(
            "permit read on '/x' when (env = 'prod' or env = 'staging') and not user.banned = true",
        )
        .unwrap();
        match doc.permits[0].condition.as_ref().unwrap() {
            Condition::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Condition::Or(_)));
                assert!(matches!(children[1], Condition::Not(_)));
            }
            other => panic!("expected and-node, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_value() {
        let doc = parse("permit read on '/x' when region in ['eu', 'us']").unwrap();
        match doc.permits[0].condition.as_ref().unwrap() {
            Condition::Compare { op, value, .. } => {
                assert_eq!(*op, CompareOp::In);
                assert_eq!(
                    *value,
                    CondValue::List(vec!["eu".to_string(), "us".to_string()])
                );
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_numeric_and_bool_values() {
        let doc = parse("permit read on '/x' when amount <= 100.5 and dry_run = false").unwrap();
        match doc.permits[0].condition.as_ref().unwrap() {
            Condition::And(children) => {
                assert!(matches!(
                    children[0],
                    Condition::Compare {
                        value: CondValue::Num(_),
                        ..
                    }
                ));
                assert!(matches!(
                    children[1],
                    Condition::Compare {
                        value: CondValue::Bool(false),
                        ..
                    }
                ));
            }
            other => panic!("expected and-node, got {other:?}"),
        }
    }

    #[test]
    fn test_severity_reserved_as_condition_field() {
        let err = parse("permit read on '/x' when severity = 'high'").unwrap_err();
        match err {
            PactumError::CclSyntax { message, .. } => {
                assert!(message.contains("reserved"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_wildcard_actions() {
        let doc = parse("permit file.* on '/x'\npermit ** on '/y'").unwrap();
        assert_eq!(doc.permits[0].action, "file.*");
        assert_eq!(doc.permits[1].action, "**");
    }

    #[test]
    fn test_parse_error_has_position() {
        let err = parse("permit read\npermit").unwrap_err();
        match err {
            PactumError::CclSyntax { line, .. } => assert!(line >= 1),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_statements_and_comments() {
        let doc = parse(
            "# policy header\n\
             permit read on '/a'  # trailing note\n\
             \n\
             deny write on '/b'\n",
        )
        .unwrap();
        assert_eq!(doc.statements.len(), 2);
        assert!(matches!(doc.statements[1], Statement::Deny(_)));
    }

    #[test]
    fn test_unknown_severity_level_is_error() {
        assert!(parse("permit read on '/x' severity extreme").is_err());
    }
}
