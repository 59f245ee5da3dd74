use std::fs;
use std::io::Write;

use camino::Utf8Path;
use serde::Serialize;

use crate::error::LoaderError;

/// Writes `value` as pretty JSON, replacing `dest` only once the content is fully on disk.
pub fn write_json_atomic<T: Serialize>(dest: &Utf8Path, value: &T) -> Result<(), LoaderError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(|err| LoaderError::Filesystem(err.to_string()))?;

    let json = serde_json::to_string_pretty(value).map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kb-loader-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    temp.write_all(json.as_bytes())
        .and_then(|_| temp.write_all(b"\n"))
        .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| LoaderError::Filesystem(format!("write {dest}: {err}")))?;
    Ok(())
}
