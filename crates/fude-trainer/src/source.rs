//! Labeled stroke input for feature extraction.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fude_core::{CharCode, Partition, Stroke, Writing};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One written character with its true label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledWriting {
    pub code: CharCode,
    pub strokes: Vec<Stroke>,
}

/// Writings grouped by character, in the order they were supplied.
pub type WritingSet = BTreeMap<CharCode, Vec<Writing>>;

/// Supplies labeled writings for a dataset partition.
pub trait StrokeSource {
    fn writings(&self, partition: Partition) -> anyhow::Result<WritingSet>;
}

/// Reads one JSON object per line: `{"code": 97, "strokes": [[[x, y], ...], ...]}`.
///
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct JsonlStrokeSource {
    train: PathBuf,
    eval: PathBuf,
}

impl JsonlStrokeSource {
    pub fn new(train: impl Into<PathBuf>, eval: impl Into<PathBuf>) -> Self {
        Self {
            train: train.into(),
            eval: eval.into(),
        }
    }
}

impl StrokeSource for JsonlStrokeSource {
    fn writings(&self, partition: Partition) -> anyhow::Result<WritingSet> {
        let path = match partition {
            Partition::Train => &self.train,
            Partition::Eval => &self.eval,
        };
        load_jsonl(path)
    }
}

/// Parses a JSONL stroke file and groups writings by character code.
pub fn load_jsonl<P: AsRef<Path>>(path: P) -> anyhow::Result<WritingSet> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let set = read_jsonl(BufReader::new(file))
        .with_context(|| format!("failed to read strokes from {}", path.display()))?;
    debug!(path = %path.display(), characters = set.len(), "loaded stroke file");
    Ok(set)
}

/// Groups labeled writings from any line reader.
pub fn read_jsonl<R: BufRead>(reader: R) -> anyhow::Result<WritingSet> {
    let mut set = WritingSet::new();
    for labeled in parse_lines::<LabeledWriting, _>(reader) {
        let labeled = labeled?;
        set.entry(labeled.code)
            .or_default()
            .push(Writing::new(labeled.strokes));
    }
    Ok(set)
}

/// Lazily parses JSON lines, skipping blanks and `#` comments.
pub fn parse_lines<T, R>(reader: R) -> impl Iterator<Item = anyhow::Result<T>>
where
    T: serde::de::DeserializeOwned,
    R: BufRead,
{
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Err(e) => Some(Err(e.into())),
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    return None;
                }
                Some(
                    serde_json::from_str(line)
                        .with_context(|| format!("line {}: invalid stroke record", idx + 1)),
                )
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_jsonl_groups_by_code() {
        let input = r#"
# two samples of "a" and one of "b"
{"code": 97, "strokes": [[[0, 0], [1, 1]]]}
{"code": 98, "strokes": [[[5, 5]], [[6, 6], [7, 7]]]}

{"code": 97, "strokes": [[[2, 2], [3, 3], [4, 4]]]}
"#;
        let set = read_jsonl(Cursor::new(input)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[&97].len(), 2);
        assert_eq!(set[&97][1].n_points(), 3);
        assert_eq!(set[&98][0].n_strokes(), 2);
    }

    #[test]
    fn test_read_jsonl_reports_line_number() {
        let input = "{\"code\": 97, \"strokes\": []}\nnot json\n";
        let err = read_jsonl(Cursor::new(input)).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_missing_file() {
        let source = JsonlStrokeSource::new("/nonexistent/train.jsonl", "/nonexistent/eval.jsonl");
        assert!(source.writings(Partition::Train).is_err());
    }
}
