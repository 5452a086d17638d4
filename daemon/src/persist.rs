use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Writes `value` as pretty JSON next to `path` and renames it into place, so
/// readers see either the old record or the new one.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(std::io::Error::other)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let result = (|| {
        let mut file = std::fs::File::create(tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        std::fs::rename(tmp_path, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(tmp_path);
    }
    result
}
