//! `${name}` placeholder substitution
//!
//! A `$` that is not followed by `{` is literal text (signal paths may legitimately
//! contain it). Values are inserted verbatim and not rescanned.

use crate::layout::is_identifier;
use crate::types::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;

/// `${...}` with anything but a closing brace inside; the name is validated separately
static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("Valid regex pattern"));

/// Replace every `${name}` in `text` using `resolve`
///
/// `resolve` returns `Ok(None)` for an unknown name, which is reported as an
/// unresolved placeholder at `location`.
pub fn substitute<F>(text: &str, location: &str, resolve: &mut F) -> Result<String, ConfigError>
where
    F: FnMut(&str) -> Result<Option<String>, ConfigError>,
{
    let malformed = |reason: String| ConfigError::MalformedPlaceholder {
        text: text.to_string(),
        location: location.to_string(),
        reason,
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in PLACEHOLDER_REGEX.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if !is_identifier(name) {
            return Err(malformed(format!("'{}' is not a valid placeholder name", name)));
        }

        out.push_str(&text[last..whole.start()]);
        match resolve(name)? {
            Some(value) => out.push_str(&value),
            None => {
                return Err(ConfigError::UnresolvedPlaceholder {
                    name: name.to_string(),
                    text: text.to_string(),
                    location: location.to_string(),
                })
            }
        }
        last = whole.end();
    }

    // Any `${` left after the last match has no closing brace
    let rest = &text[last..];
    if rest.contains("${") {
        return Err(malformed("missing closing '}'".to_string()));
    }
    out.push_str(rest);
    Ok(out)
}
