//! Recursive-descent parser for the rule language
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr ( 'or' and_expr )*
//! and_expr := unary ( 'and'? unary )*
//! unary    := 'not' unary | primary
//! primary  := '(' expr ')' | CHECK_STRING
//! ```
//!
//! Adjacent terms with no keyword between them are joined by AND.

use super::check::Check;
use super::lexer::{tokenize, Token};
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Deepest nesting of parentheses and `not` accepted in one expression
pub const MAX_NESTING_DEPTH: usize = 256;

/// How malformed rules are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Malformed rules and unknown rule references are errors
    #[default]
    Strict,
    /// Malformed rules and unknown rule references deny
    Permissive,
}

/// Parses a raw rule expression
///
/// In [`ParseMode::Permissive`] a malformed expression becomes
/// [`Check::False`] instead of an error.
///
/// # Examples
///
/// ```
/// use authz_policy::rule::{parse_rule, Check, ParseMode};
///
/// let check = parse_rule("role:admin or role:user and id:%(owner)s", ParseMode::Strict).unwrap();
/// assert_eq!(check.to_string(), "(role:admin or (role:user and id:%(owner)s))");
///
/// assert_eq!(parse_rule("", ParseMode::Strict).unwrap(), Check::True);
/// assert!(parse_rule("(role:admin", ParseMode::Strict).is_err());
/// assert_eq!(parse_rule("(role:admin", ParseMode::Permissive).unwrap(), Check::False);
/// ```
pub fn parse_rule(raw: &str, mode: ParseMode) -> Result<Check, ParseError> {
    let tokens = tokenize(raw);
    match parse(&tokens) {
        Ok(check) => Ok(check),
        Err(err) => {
            let err = ParseError::new(raw, err.reason);
            match mode {
                ParseMode::Strict => Err(err),
                ParseMode::Permissive => {
                    warn!(rule = %raw, error = %err, "failed to parse rule, denying");
                    Ok(Check::False)
                }
            }
        }
    }
}

/// Builds a check tree from a token sequence
///
/// An empty sequence yields [`Check::True`].
pub fn parse(tokens: &[Token]) -> Result<Check, ParseError> {
    if tokens.is_empty() {
        return Ok(Check::True);
    }

    let mut parser = Parser::new(tokens);
    let check = parser.parse_or().map_err(|reason| parser.error(reason))?;

    if let Some(token) = parser.peek() {
        let reason = match token {
            Token::RParen => "unbalanced parentheses: unexpected ')'".to_string(),
            other => format!("unexpected token '{}'", other),
        };
        return Err(parser.error(reason));
    }

    Ok(check)
}

/// Classifies one check string
///
/// `!` is never satisfied and `@` (or the empty string) always is. `role:`
/// and `rule:` prefixes select role and rule-reference checks; any other
/// `key:value` is a generic match. A string with no `:` separator denies.
pub fn parse_check(text: &str) -> Check {
    match text {
        "" | "@" => return Check::True,
        "!" => return Check::False,
        _ => {}
    }

    match text.split_once(':') {
        Some(("role", role)) => Check::Role(role.to_string()),
        Some(("rule", name)) => Check::Rule(name.to_string()),
        Some((key, value)) => Check::Generic {
            key: key.to_string(),
            value: value.to_string(),
        },
        None => {
            warn!(check = %text, "check has no kind separator, denying");
            Check::False
        }
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn error(&self, reason: String) -> ParseError {
        let rule = self
            .tokens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        ParseError::new(rule, reason)
    }

    fn descend(&mut self) -> Result<(), String> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Fails unless the next token can start an operand of `op`
    fn require_operand(&self, op: &str) -> Result<(), String> {
        match self.peek() {
            None | Some(Token::And) | Some(Token::Or) | Some(Token::RParen) => {
                Err(format!("operator '{}' has no right operand", op))
            }
            _ => Ok(()),
        }
    }

    fn parse_or(&mut self) -> Result<Check, String> {
        let mut operands = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.advance();
            self.require_operand("or")?;
            operands.push(self.parse_and()?);
        }
        Ok(combine(operands, Check::Or))
    }

    fn parse_and(&mut self) -> Result<Check, String> {
        let mut operands = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    self.require_operand("and")?;
                    operands.push(self.parse_unary()?);
                }
                Some(Token::Check(_)) | Some(Token::LParen) | Some(Token::Not) => {
                    operands.push(self.parse_unary()?);
                }
                _ => break,
            }
        }
        Ok(combine(operands, Check::And))
    }

    fn parse_unary(&mut self) -> Result<Check, String> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.require_operand("not")?;
            self.descend()?;
            let operand = self.parse_unary();
            self.ascend();
            return Ok(Check::Not(Box::new(operand?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Check, String> {
        match self.advance() {
            Some(Token::Check(text)) => Ok(parse_check(text)),
            Some(Token::LParen) => {
                if self.peek() == Some(&Token::RParen) {
                    return Err("empty parentheses".to_string());
                }
                self.descend()?;
                let inner = self.parse_or();
                self.ascend();
                let inner = inner?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("unbalanced parentheses: missing ')'".to_string()),
                }
            }
            Some(Token::RParen) => Err("unbalanced parentheses: unexpected ')'".to_string()),
            Some(op @ (Token::And | Token::Or)) => {
                Err(format!("operator '{}' has no left operand", op))
            }
            Some(Token::Not) => Err("operator 'not' has no operand".to_string()),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn combine(mut operands: Vec<Check>, join: fn(Vec<Check>) -> Check) -> Check {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        join(operands)
    }
}
