//! Identifier-to-path addressing for feature records.
//!
//! Records live under a tree derived from their id: the digits split into
//! groups of three form the directories, e.g.
//! `101736545 -> 101/736/545/101736545.geojson`.

use crate::error::FetchError;

/// Relative directory for an id.
pub fn id_to_rel_dir(id: i64) -> Result<String, FetchError> {
    if id < 0 {
        return Err(FetchError::InvalidId(id));
    }

    let digits = id.to_string();
    let groups: Vec<&str> = digits
        .as_bytes()
        .chunks(3)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect();

    Ok(groups.join("/"))
}

/// Relative path of a record's primary document.
pub fn id_to_rel_path(id: i64) -> Result<String, FetchError> {
    Ok(format!("{}/{id}.geojson", id_to_rel_dir(id)?))
}
