//! # On-Disk Stores
//!
//! One JSON document per character, named by numeric character code:
//!
//! ```text
//! <root>/features/{train,eval}/<code>.sset
//! <root>/hmms/{init,train}/<code>.hmm
//! ```

pub mod model_store;
pub mod sequence_store;

pub use model_store::ModelStore;
pub use sequence_store::SequenceStore;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::Result;
use crate::types::CharCode;

fn code_path(dir: &Path, code: CharCode, extension: &str) -> PathBuf {
    dir.join(format!("{code}.{extension}"))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serializes `value` to `path`, replacing any previous file atomically.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a JSON document, returning `None` if the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Sorted character codes of all `<code>.<extension>` files in `dir`.
fn list_codes(dir: &Path, extension: &str) -> Result<Vec<CharCode>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut codes = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match path.file_stem().and_then(|s| s.to_str()).map(str::parse::<CharCode>) {
            Some(Ok(code)) => codes.push(code),
            _ => warn!(path = %path.display(), "ignoring file without a numeric character code"),
        }
    }
    codes.sort_unstable();
    Ok(codes)
}
