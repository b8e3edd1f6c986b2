//! Resolution of abbreviated subcommand names.

use crate::error::ResolveError;

/// Resolves `prefix` to exactly one registered name.
///
/// An exact match wins. Otherwise every name starting with `prefix` is a
/// candidate; more than one candidate is an error carrying the sorted list,
/// never a guess.
///
/// # Examples
///
/// ```
/// use netdispatch::resolver::resolve;
///
/// let names = ["commit", "compare", "health"];
/// assert_eq!(resolve("hea", names).unwrap(), "health");
/// assert!(resolve("com", names).is_err());
/// ```
pub fn resolve<'a, I>(prefix: &str, registered: I) -> Result<String, ResolveError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates = Vec::new();
    for name in registered {
        if name == prefix {
            return Ok(name.to_string());
        }
        if name.starts_with(prefix) {
            candidates.push(name.to_string());
        }
    }

    candidates.sort();
    candidates.dedup();

    match candidates.len() {
        0 => Err(ResolveError::NotFound(prefix.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(ResolveError::Ambiguous {
            prefix: prefix.to_string(),
            candidates,
        }),
    }
}
