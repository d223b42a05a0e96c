//! `%(field)s` substitution of target fields into match values

use crate::error::{PolicyError, Result};
use crate::types::{render_value, Target};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// `%(name)s` placeholder or a `%%` escape
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?:\((?P<field>[^)]*)\)s|%)").expect("placeholder pattern is valid")
});

/// Replaces every `%(field)s` placeholder in `template` with the rendered
/// value of `target[field]`
///
/// `%%` produces a literal `%`. Any other `%` is copied unchanged. A field
/// missing from the target is an error; the placeholder is never compared
/// as literal text.
///
/// # Examples
///
/// ```
/// use authz_policy::{rule::substitute, Attributes};
///
/// let target = Attributes::new().with("user_id", "U1");
/// assert_eq!(substitute("%(user_id)s", &target).unwrap(), "U1");
/// assert!(substitute("%(owner)s", &target).is_err());
/// ```
pub fn substitute<'a>(template: &'a str, target: &Target) -> Result<Cow<'a, str>> {
    if !template.contains('%') {
        return Ok(Cow::Borrowed(template));
    }

    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        output.push_str(&template[last..whole.start()]);

        match caps.name("field") {
            Some(field) => {
                let value = target.lookup(field.as_str()).ok_or_else(|| {
                    PolicyError::Substitution {
                        field: field.as_str().to_string(),
                        template: template.to_string(),
                    }
                })?;
                output.push_str(&render_value(value));
            }
            None => output.push('%'),
        }

        last = whole.end();
    }

    output.push_str(&template[last..]);
    Ok(Cow::Owned(output))
}
