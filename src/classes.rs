//! Bidirectional class-name table.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

const COCO_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorbike", "aeroplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "sofa",
    "pottedplant", "bed", "diningtable", "toilet", "tvmonitor", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Class names indexed by the detector's class id, with reverse lookup.
///
/// Built once at startup and shared read-only by the detection pipeline, the
/// lifecycle view and the renderer.
#[derive(Debug, Clone)]
pub struct ClassTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ClassTable {
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::Config(format!("duplicate class name `{name}`")));
            }
        }
        Ok(Self { names, index })
    }

    /// Load a darknet-style `.names` file: one class per line, in id order.
    pub fn from_names_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_names(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned),
        )
    }

    /// The 80 COCO classes in darknet order.
    pub fn coco() -> Self {
        let names: Vec<String> = COCO_NAMES.iter().map(|s| s.to_string()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_ways() {
        let table = ClassTable::from_names(["person", "car", "bus"]).unwrap();
        assert_eq!(table.index_of("car"), Some(1));
        assert_eq!(table.name_of(2), Some("bus"));
        assert_eq!(table.index_of("zebra"), None);
        assert_eq!(table.name_of(3), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(ClassTable::from_names(["car", "car"]).is_err());
    }

    #[test]
    fn test_coco_table() {
        let table = ClassTable::coco();
        assert_eq!(table.len(), 80);
        assert_eq!(table.index_of("person"), Some(0));
        assert_eq!(table.index_of("truck"), Some(7));
        assert_eq!(table.name_of(79), Some("toothbrush"));
    }

    #[test]
    fn test_names_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.names");
        std::fs::write(&path, "person\n\ncar \nbus\n").unwrap();
        let table = ClassTable::from_names_file(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of("car"), Some(1));
    }
}
