//! Part identifiers and per-face labels.

use std::fmt;

use indexmap::IndexMap;

/// The logical parts a mesh is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PartId {
    Body,
    LensBarrel,
}

impl PartId {
    /// Every part, in packaging order.
    pub const ALL: [PartId; 2] = [PartId::Body, PartId::LensBarrel];

    /// Stable name used for scene nodes and geometries.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartId::Body => "body",
            PartId::LensBarrel => "lens_barrel",
        }
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part label per face of a mesh.
///
/// Labels form a partition: face `i` belongs to exactly the part at
/// position `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceLabels {
    labels: Vec<PartId>,
}

impl FaceLabels {
    /// Wrap a label sequence.
    pub fn new(labels: Vec<PartId>) -> Self {
        Self { labels }
    }

    /// Number of labelled faces.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of a face.
    pub fn get(&self, face: usize) -> Option<PartId> {
        self.labels.get(face).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = PartId> + '_ {
        self.labels.iter().copied()
    }

    pub fn as_slice(&self) -> &[PartId] {
        &self.labels
    }

    /// Number of faces carrying `part`.
    pub fn count(&self, part: PartId) -> usize {
        self.labels.iter().filter(|&&p| p == part).count()
    }

    /// Face count per part, in first-seen order.
    pub fn counts(&self) -> IndexMap<PartId, usize> {
        let mut counts = IndexMap::new();
        for &part in &self.labels {
            *counts.entry(part).or_insert(0) += 1;
        }
        counts
    }

    /// Indices of the faces carrying `part`, ascending.
    pub fn faces_with(&self, part: PartId) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, &p)| p == part)
            .map(|(i, _)| i)
    }
}

impl FromIterator<PartId> for FaceLabels {
    fn from_iter<I: IntoIterator<Item = PartId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_names() {
        assert_eq!(PartId::Body.as_str(), "body");
        assert_eq!(PartId::LensBarrel.to_string(), "lens_barrel");
    }

    #[test]
    fn test_label_queries() {
        let labels: FaceLabels = [
            PartId::LensBarrel,
            PartId::Body,
            PartId::LensBarrel,
            PartId::Body,
            PartId::Body,
        ]
        .into_iter()
        .collect();

        assert_eq!(labels.len(), 5);
        assert_eq!(labels.get(1), Some(PartId::Body));
        assert_eq!(labels.get(5), None);
        assert_eq!(labels.count(PartId::Body), 3);
        assert_eq!(labels.faces_with(PartId::LensBarrel).collect::<Vec<_>>(), vec![0, 2]);

        let counts = labels.counts();
        assert_eq!(counts.keys().copied().collect::<Vec<_>>(), vec![PartId::LensBarrel, PartId::Body]);
        assert_eq!(counts[&PartId::Body], 3);
    }
}
