//! # Policy Rule Engine (authz-policy)
//!
//! Rule-based authorization evaluator with support for:
//! - A small boolean policy language (`and`, `or`, `not`, parentheses)
//! - Role checks and credential/target field matching
//! - References between named rules with cycle detection
//! - Strict or fail-closed permissive handling of malformed rules
//! - Thread-safe concurrent evaluation
//!
//! ## Example
//!
//! ```rust
//! use authz_policy::{Attributes, Enforcer, EnforcerConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let enforcer = Enforcer::load_file("policy.json", EnforcerConfig::default())?;
//!
//! let target = Attributes::new().with("user_id", "U1");
//! let creds = Attributes::new().with("id", "U1").with("roles", vec!["user"]);
//!
//! if enforcer.enforce("article:delete", &target, &creds, false)? {
//!     // perform the action
//! }
//! # Ok(())
//! # }
//! ```

pub mod enforcer;
pub mod error;
pub mod registry;
pub mod rule;
pub mod types;

pub use enforcer::{CacheStats, Decision, Denial, Enforcer, EnforcerConfig};
pub use error::{ParseError, PolicyError, Result};
pub use registry::{RuleEntry, Rules};
pub use rule::{Check, ParseMode};
pub use types::{Attributes, Credentials, Target};
