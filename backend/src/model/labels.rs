use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::StartupError;

#[derive(Deserialize)]
struct LabelFile {
    classes: Vec<String>,
}

/// Disease keys in the classifier's output order: index `i` names output `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    classes: Vec<String>,
}

impl ClassLabels {
    pub fn new(classes: Vec<String>) -> Result<Self, StartupError> {
        if classes.is_empty() {
            return Err(StartupError::Config("class label list is empty".into()));
        }
        let mut seen = HashSet::new();
        for class in &classes {
            if !seen.insert(class.as_str()) {
                return Err(StartupError::Config(format!("duplicate class label '{}'", class)));
            }
        }
        Ok(Self { classes })
    }

    /// Reads the `{"classes": [...]}` file written alongside the trained weights.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let raw = std::fs::read_to_string(path).map_err(|source| StartupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LabelFile = serde_json::from_str(&raw).map_err(|source| StartupError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(file.classes)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_training_label_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"classes": ["Potato___healthy", "Tomato_Leaf_Mold"]}}"#).unwrap();

        let labels = ClassLabels::load(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(1), Some("Tomato_Leaf_Mold"));
        assert_eq!(labels.get(2), None);
    }

    #[test]
    fn rejects_empty_and_duplicate_lists() {
        assert!(matches!(ClassLabels::new(vec![]), Err(StartupError::Config(_))));
        let dup = vec!["Tomato_healthy".to_string(), "Tomato_healthy".to_string()];
        assert!(matches!(ClassLabels::new(dup), Err(StartupError::Config(_))));
    }

    #[test]
    fn malformed_file_is_a_startup_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2").unwrap();
        assert!(matches!(ClassLabels::load(file.path()), Err(StartupError::Json { .. })));

        let missing = Path::new("/nonexistent/class_labels.json");
        assert!(matches!(ClassLabels::load(missing), Err(StartupError::Io { .. })));
    }
}
