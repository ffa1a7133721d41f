// `${VAR}` and `${VAR:-fallback}` expansion from the process environment.

use super::error::ConfigError;

/// Expand `${NAME}` references in `input` from the environment.
///
/// `${NAME:-fallback}` uses `fallback` when `NAME` is unset. Anything that is
/// not a well-formed reference (`${`, `${}`, `${1X}`, `$NAME`) is kept as is.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(len) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let reference = &after[..len];
        let (name, fallback) = match reference.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (reference, None),
        };

        if !is_variable_name(name) {
            out.push_str(&rest[start..start + 2 + len + 1]);
        } else {
            match (std::env::var(name), fallback) {
                (Ok(value), _) => out.push_str(&value),
                (Err(_), Some(fallback)) => out.push_str(fallback),
                (Err(_), None) => {
                    return Err(ConfigError::UndefinedVariable {
                        name: name.to_string(),
                    })
                }
            }
        }
        rest = &after[len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Like [`resolve_variables`], for optional fields.
pub fn resolve_optional(input: Option<String>) -> Result<Option<String>, ConfigError> {
    input.map(|s| resolve_variables(&s)).transpose()
}
