use crate::{StoreError, StoreResult};

pub const TEMPLATE_EXTENSION: &str = ".json";

/// Checks that `name` is a bare `*.json` file name that cannot escape the data directory.
pub fn validate_filename(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if !name.ends_with(TEMPLATE_EXTENSION) {
        Some("must end in .json")
    } else if name.len() == TEMPLATE_EXTENSION.len() {
        Some("must have a name before .json")
    } else if name.contains("..") {
        Some("must not contain `..`")
    } else if name.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidFilename {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn generated_filename(millis: i64) -> String {
    format!("template_{}{}", millis, TEMPLATE_EXTENSION)
}

/// Picks `template_<now-millis>.json`, moving forward one millisecond until `taken` says no.
pub fn unique_generated_filename(taken: impl Fn(&str) -> bool) -> String {
    let mut millis = chrono::Utc::now().timestamp_millis();
    loop {
        let name = generated_filename(millis);
        if !taken(&name) {
            return name;
        }
        millis += 1;
    }
}
