use std::fs;
use std::io::{Result, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Create `dir` (and parents) if it is missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Create the directory that will hold `file`.
pub fn ensure_parent_dir(file: &Path) -> Result<()> {
    match file.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Write `sql` to a uniquely named temporary `.sql` file. The file is removed
/// when the returned handle is dropped.
pub fn temp_script(sql: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("dbpipeline-")
        .suffix(".sql")
        .tempfile()?;
    file.write_all(sql.as_bytes())?;
    file.flush()?;
    Ok(file)
}
