use std::path::PathBuf;

use crate::config::PathSubstitution;

/// Map a path from the export onto the filesystem this run can see.
///
/// Every occurrence of `from` is replaced, not only a leading one.
pub fn resolve_source_path(raw: &str, substitution: &PathSubstitution) -> PathBuf {
    let raw = raw.trim();
    if !substitution.enabled || substitution.from.is_empty() {
        return PathBuf::from(raw);
    }
    PathBuf::from(raw.replace(&substitution.from, &substitution.to))
}
