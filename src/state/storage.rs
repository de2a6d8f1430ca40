// File system locations and hashing for imported flight logs
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
}

pub type StorageResult<T> = Result<T, StorageError>;

const APP_DIR_NAME: &str = "com.glidepath.app";

/// Get the app data directory for glidepath
pub fn get_app_data_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
    let app_dir = data_dir.join(APP_DIR_NAME);
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Default location of the flight database
pub fn default_db_path() -> StorageResult<PathBuf> {
    Ok(get_app_data_dir()?.join("glidepath.db"))
}

/// Default location of the configuration file
pub fn default_config_path() -> StorageResult<PathBuf> {
    Ok(get_app_data_dir()?.join("config.json"))
}

/// Directory for pipeline trace files
pub fn get_trace_dir() -> StorageResult<PathBuf> {
    let trace_dir = get_app_data_dir()?.join("traces");
    fs::create_dir_all(&trace_dir)?;
    Ok(trace_dir)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Calculate SHA256 hash of a file without loading it whole
pub fn hash_file(path: &Path) -> StorageResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_calculate_sha256() {
        let data = b"hello world";
        let hash = calculate_sha256(data);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash_file_matches_in_memory_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("flight.csv");
        fs::write(&path, b"hello world").unwrap();

        assert_eq!(hash_file(&path).unwrap(), calculate_sha256(b"hello world"));
    }
}
