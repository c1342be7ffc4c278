use std::path::{Path, PathBuf};

use crate::error::FetchError;

/// Local destination for `url`: everything after the first `marker` in the
/// URL, joined onto `root`.
///
/// `https://host/ross/sub/dir/file.svs` with marker `/ross/` and root `/out`
/// maps to `/out/sub/dir/file.svs`.
pub fn asset_path(url: &str, marker: &str, root: &Path) -> Result<PathBuf, FetchError> {
    let (_, rest) = url
        .split_once(marker)
        .ok_or_else(|| FetchError::MissingMarker {
            url: url.to_string(),
            marker: marker.to_string(),
        })?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    if rest.starts_with('/') {
        return Err(FetchError::UnsafePath(rest.to_string()));
    }

    let mut path = root.to_path_buf();
    let mut pushed = 0;
    for segment in rest.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains('\\') {
            return Err(FetchError::UnsafePath(rest.to_string()));
        }
        path.push(segment);
        pushed += 1;
    }
    if pushed == 0 {
        return Err(FetchError::UnsafePath(rest.to_string()));
    }
    Ok(path)
}
