use std::fs;
use std::path::PathBuf;

use super::{decode_countries, CountrySource, FetchFailure, LoadOutcome};

/// Country list read from a local JSON file with the same shape as the
/// REST response.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CountrySource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_all(&self) -> LoadOutcome {
        let body = fs::read(&self.path).map_err(|source| FetchFailure::Io {
            path: self.path.clone(),
            source,
        })?;
        decode_countries(&self.describe(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::tests::SAMPLE;

    #[test]
    fn test_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.json");
        fs::write(&path, SAMPLE).unwrap();

        let countries = FileSource::new(&path).load_all().unwrap();
        let names: Vec<&str> = countries.iter().map(|c| c.common_name()).collect();
        assert_eq!(names, vec!["Uzbekistan", "France", "Brazil"]);
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::new(dir.path().join("absent.json"))
            .load_all()
            .unwrap_err();
        assert!(matches!(err, FetchFailure::Io { .. }));
    }

    #[test]
    fn test_malformed_file_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{\"name\": 42}]").unwrap();

        let err = FileSource::new(&path).load_all().unwrap_err();
        assert!(matches!(err, FetchFailure::Decode { .. }));
    }
}
