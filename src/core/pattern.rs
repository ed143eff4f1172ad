use std::sync::OnceLock;

use regex::Regex;

use crate::core::error::LauncherResult;

/// Compile `pattern` once and keep it in `cell`.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Regex>,
    pattern: &str,
) -> LauncherResult<&'static Regex> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let compiled = Regex::new(pattern)?;
    Ok(cell.get_or_init(|| compiled))
}
