//! Tokenizer for the rule language

use std::fmt;

/// A lexical unit of a rule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    /// Raw text of one atomic check, e.g. `role:admin` or `id:%(user_id)s`
    Check(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Check(text) => write!(f, "{}", text),
        }
    }
}

/// Splits a rule expression into tokens
///
/// Words are separated by whitespace. Opening parentheses at the start of a
/// word and closing parentheses at its end become separate tokens, so
/// placeholders such as `%(user_id)s` stay inside their check string.
/// Keywords are matched case-insensitively. Never fails: malformed input is
/// reported by the parser.
///
/// # Examples
///
/// ```
/// use authz_policy::rule::{tokenize, Token};
///
/// let tokens = tokenize("(role:admin OR id:%(owner)s)");
/// assert_eq!(tokens, vec![
///     Token::LParen,
///     Token::Check("role:admin".to_string()),
///     Token::Or,
///     Token::Check("id:%(owner)s".to_string()),
///     Token::RParen,
/// ]);
/// ```
pub fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    for word in raw.split_whitespace() {
        let body = word.trim_start_matches('(');
        let leading = word.len() - body.len();
        tokens.extend(std::iter::repeat(Token::LParen).take(leading));

        let core = body.trim_end_matches(')');
        let trailing = body.len() - core.len();

        if !core.is_empty() {
            tokens.push(classify_word(core));
        }

        tokens.extend(std::iter::repeat(Token::RParen).take(trailing));
    }

    tokens
}

fn classify_word(word: &str) -> Token {
    if word.eq_ignore_ascii_case("and") {
        Token::And
    } else if word.eq_ignore_ascii_case("or") {
        Token::Or
    } else if word.eq_ignore_ascii_case("not") {
        Token::Not
    } else {
        Token::Check(word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> Token {
        Token::Check(text.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            tokenize("a:1 AND b:2 Or NOT c:3"),
            vec![check("a:1"), Token::And, check("b:2"), Token::Or, Token::Not, check("c:3")]
        );
    }

    #[test]
    fn test_nested_parentheses() {
        assert_eq!(
            tokenize("((role:a) or role:b))"),
            vec![
                Token::LParen,
                Token::LParen,
                check("role:a"),
                Token::RParen,
                Token::Or,
                check("role:b"),
                Token::RParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_placeholder_parentheses_kept() {
        assert_eq!(
            tokenize("(id:%(user_id)s)"),
            vec![Token::LParen, check("id:%(user_id)s"), Token::RParen]
        );
    }

    #[test]
    fn test_bare_parentheses() {
        assert_eq!(tokenize("( )"), vec![Token::LParen, Token::RParen]);
    }

    #[test]
    fn test_keyword_inside_check_is_not_split() {
        assert_eq!(tokenize("role:and"), vec![check("role:and")]);
    }
}
