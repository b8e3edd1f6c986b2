//! Pre-dispatch validation of user-supplied parameters.
//!
//! Every check here runs before any device is contacted; a failure ends the
//! invocation with a [`ParameterError`].

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParameterError;
use crate::router::{FileMode, OutputDestination};

static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-2]\d(:[0-5]\d){1,2}$").expect("static regex"));

static DATE_AND_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-[01]\d-[0-3]\d [0-2]\d:[0-5]\d(:[0-5]\d)?$").expect("static regex")
});

/// Checks commit-at time windows.
///
/// Accepts `hh:mm[:ss]` or `yyyy-mm-dd hh:mm[:ss]`. The whole string must
/// match; a valid time embedded in other text is rejected.
pub struct TimeWindowValidator;

impl TimeWindowValidator {
    pub fn new() -> Self {
        Self {}
    }

    pub fn is_valid(&self, value: &str) -> bool {
        TIME_OF_DAY.is_match(value) || DATE_AND_TIME.is_match(value)
    }
}

impl Default for TimeWindowValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates an optional commit-at time. `None` means commit immediately.
pub fn validate_at_time(value: Option<&str>) -> Result<Option<String>, ParameterError> {
    match value {
        None => Ok(None),
        Some(value) if TimeWindowValidator::new().is_valid(value) => Ok(Some(value.to_string())),
        Some(value) => Err(ParameterError::InvalidAtTime(value.to_string())),
    }
}

/// Turns the `-w/--write` values into an output destination.
///
/// Omitting the option selects the console. The mode is matched
/// case-insensitively against `s`/`single` and `m`/`multiple`.
pub fn parse_output_mode(values: Option<&[String]>) -> Result<OutputDestination, ParameterError> {
    let values = match values {
        None => return Ok(OutputDestination::Console),
        Some(values) => values,
    };

    let [mode, path] = values else {
        return Err(ParameterError::OutputModeArity(values.len()));
    };

    let mode = match mode.to_lowercase().as_str() {
        "s" | "single" => FileMode::Single,
        "m" | "multiple" => FileMode::Multiple,
        _ => return Err(ParameterError::InvalidOutputMode(mode.clone())),
    };

    Ok(OutputDestination::File {
        mode,
        path: path.into(),
    })
}

/// A push needs its local source to exist before any device is contacted.
pub fn validate_push_source(source: &Path) -> Result<(), ParameterError> {
    if source.exists() {
        Ok(())
    } else {
        Err(ParameterError::PushSourceMissing(source.to_path_buf()))
    }
}
