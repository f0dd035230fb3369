use crate::common::errors::AppError;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FsUtil;

impl FsUtil {
    // Normalizes relative paths and enforces the .xlsx extension contract.
    pub fn resolve_xlsx_path(path: &str) -> Result<PathBuf, AppError> {
        if path.trim().is_empty() {
            return Err(AppError::InvalidPath("path is empty".to_string()));
        }
        let input = Path::new(path);
        let abs = if input.is_absolute() {
            input.to_path_buf()
        } else {
            std::env::current_dir()?.join(input)
        };
        let ext = abs
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext != "xlsx" {
            return Err(AppError::InvalidPath(format!(
                "expected .xlsx extension: {}",
                abs.display()
            )));
        }
        Ok(abs)
    }

    pub fn write_output(path: &Path, bytes: &[u8], overwrite: bool) -> Result<(), AppError> {
        if path.exists() && !overwrite {
            return Err(AppError::AlreadyExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write next to the target first so a failed write never leaves a truncated document.
        let tmp = path.with_extension("xlsx.partial");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
