use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FudeError, Result};
use crate::store::{code_path, list_codes, read_json, write_json};
use crate::types::feature::FEATURE_DIMENSIONS;
use crate::types::{CharCode, FeatureSequence, Partition, SequenceCollection};

/// File extension of sequence-set documents.
pub const SEQUENCE_SET_EXTENSION: &str = "sset";

/// Sequence-set document: sequences are flattened `[dx1, dy1, dx2, dy2, ...]`.
#[derive(Debug, Serialize, Deserialize)]
struct SequenceSetFile {
    code: CharCode,
    dimensions: usize,
    reference_strokes: Option<usize>,
    sequences: Vec<Vec<f64>>,
}

/// Per-character feature sequences for the train and eval partitions.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    root: PathBuf,
}

impl SequenceStore {
    /// Store rooted at `<root>/features`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().join("features"),
        }
    }

    pub fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.as_str())
    }

    pub fn path(&self, partition: Partition, code: CharCode) -> PathBuf {
        code_path(&self.partition_dir(partition), code, SEQUENCE_SET_EXTENSION)
    }

    /// Writes a collection, replacing any previous one for the same character.
    pub fn write(&self, partition: Partition, collection: &SequenceCollection) -> Result<()> {
        let file = SequenceSetFile {
            code: collection.code,
            dimensions: FEATURE_DIMENSIONS,
            reference_strokes: collection.reference_strokes,
            sequences: collection.sequences.iter().map(FeatureSequence::flatten).collect(),
        };
        write_json(&self.path(partition, collection.code), &file)
    }

    /// Loads a collection, or `None` if it was never written.
    pub fn load(&self, partition: Partition, code: CharCode) -> Result<Option<SequenceCollection>> {
        let Some(file) = read_json::<SequenceSetFile>(&self.path(partition, code))? else {
            return Ok(None);
        };

        if file.code != code {
            return Err(FudeError::MalformedSequence {
                reason: format!("file for character {code} declares character {}", file.code),
            });
        }
        if file.dimensions != FEATURE_DIMENSIONS {
            return Err(FudeError::MalformedSequence {
                reason: format!(
                    "expected {FEATURE_DIMENSIONS}-dimensional features, found {}",
                    file.dimensions
                ),
            });
        }

        let sequences = file
            .sequences
            .iter()
            .map(|flat| FeatureSequence::from_flat(flat))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(SequenceCollection::new(code, file.reference_strokes, sequences)))
    }

    /// Sorted codes of all collections stored for `partition`.
    pub fn codes(&self, partition: Partition) -> Result<Vec<CharCode>> {
        list_codes(&self.partition_dir(partition), SEQUENCE_SET_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureVector;

    fn collection(code: CharCode) -> SequenceCollection {
        SequenceCollection::new(
            code,
            Some(2),
            vec![
                FeatureSequence::new(vec![FeatureVector::new(1.0, 2.0), FeatureVector::new(3.0, 0.5)]),
                FeatureSequence::default(),
                FeatureSequence::new(vec![FeatureVector::new(7.0, 7.0)]),
            ],
        )
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::new(dir.path());
        let original = collection(97);

        store.write(Partition::Train, &original).unwrap();
        let loaded = store.load(Partition::Train, 97).unwrap().unwrap();

        assert_eq!(loaded, original);
        assert!(store.path(Partition::Train, 97).ends_with("features/train/97.sset"));
        assert_eq!(store.load(Partition::Eval, 97).unwrap(), None);
    }

    #[test]
    fn test_write_replaces_previous_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::new(dir.path());
        store.write(Partition::Eval, &collection(98)).unwrap();

        let replacement = SequenceCollection::new(98, Some(1), vec![FeatureSequence::default()]);
        store.write(Partition::Eval, &replacement).unwrap();

        assert_eq!(store.load(Partition::Eval, 98).unwrap().unwrap(), replacement);
        assert_eq!(store.codes(Partition::Eval).unwrap(), vec![98]);
    }

    #[test]
    fn test_file_layout_is_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::new(dir.path());
        store.write(Partition::Train, &collection(97)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path(Partition::Train, 97)).unwrap()).unwrap();
        assert_eq!(raw["dimensions"], 2);
        assert_eq!(raw["sequences"][0], serde_json::json!([1.0, 2.0, 3.0, 0.5]));
    }

    #[test]
    fn test_malformed_sequence_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SequenceStore::new(dir.path());
        let path = store.path(Partition::Train, 99);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"code":99,"dimensions":2,"reference_strokes":1,"sequences":[[1.0,2.0,3.0]]}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load(Partition::Train, 99),
            Err(FudeError::MalformedSequence { .. })
        ));
    }
}
