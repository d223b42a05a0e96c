//! Rule language: tokenizer, parser, check trees and evaluation
//!
//! A rule is a small boolean expression over atomic checks:
//!
//! - `role:<name>` holds when the credentials carry the role
//! - `rule:<name>` holds when the named registered rule holds
//! - `<key>:<value>` holds when `credentials[key]` equals `value`, after
//!   `%(field)s` placeholders in `value` are filled from the target
//! - `@` always holds, `!` never does, and the empty rule always holds
//!
//! Checks combine with `and`, `or`, `not` and parentheses. AND binds tighter
//! than OR, and juxtaposed checks are ANDed.

mod check;
mod lexer;
mod parser;
mod template;


pub use check::{Check, Evaluator};
pub use lexer::{tokenize, Token};
pub use parser::{parse, parse_check, parse_rule, ParseMode, MAX_NESTING_DEPTH};
pub use template::substitute;
