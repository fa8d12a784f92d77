use std::collections::HashMap;

use crate::registry::PackageInfo;
use crate::report::DependencyRecord;

/// Strip leading caret/tilde range markers: `^1.2.3` and `~1.2.3` both
/// normalize to `1.2.3`; a bare version is unchanged.
pub fn strip_range_markers(version: &str) -> &str {
    version.trim_start_matches(['^', '~'])
}

/// Compare each declared dependency against the registry snapshot.
///
/// The comparison is a plain string inequality between the normalized
/// declared version and the registry's latest; no semver range
/// satisfaction is applied. Dependencies without registry data are
/// skipped. Output order follows the manifest mapping.
pub fn diff_manifest(
    manifest: &[(String, String)],
    registry: &HashMap<String, PackageInfo>,
) -> Vec<DependencyRecord> {
    manifest
        .iter()
        .filter_map(|(name, declared)| {
            let info = registry.get(name)?;
            let current = strip_range_markers(declared);
            (info.latest != current).then(|| DependencyRecord {
                name: name.clone(),
                current: current.to_string(),
                latest: info.latest.clone(),
                description: info.description.clone(),
            })
        })
        .collect()
}
