//! Standard 10-20 electrode positions.
//!
//! Coordinates are head-centred, in metres, on a sphere of radius 0.095:
//! +x toward the right ear, +y toward the nasion, +z toward the vertex.
//! Declaration order is the tie-break order for fuzzy label matching.

/// Head radius used for every catalog coordinate (m)
pub const HEAD_RADIUS: f64 = 0.095;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Electrode {
    pub name: &'static str,
    pub position: [f64; 3],
}

const fn e(name: &'static str, x: f64, y: f64, z: f64) -> Electrode {
    Electrode {
        name,
        position: [x, y, z],
    }
}

const STANDARD_1020: &[Electrode] = &[
    // Frontal pole
    e("FP1", -0.0294, 0.0904, 0.0),
    e("FPZ", 0.0, 0.095, 0.0),
    e("FP2", 0.0294, 0.0904, 0.0),
    // Frontal
    e("F7", -0.0769, 0.0558, 0.0),
    e("F3", -0.0537, 0.0664, 0.0416),
    e("FZ", 0.0, 0.0672, 0.0672),
    e("F4", 0.0537, 0.0664, 0.0416),
    e("F8", 0.0769, 0.0558, 0.0),
    // Central / temporal
    e("T3", -0.095, 0.0, 0.0),
    e("C3", -0.0672, 0.0, 0.0672),
    e("CZ", 0.0, 0.0, 0.095),
    e("C4", 0.0672, 0.0, 0.0672),
    e("T4", 0.095, 0.0, 0.0),
    // Parietal / posterior temporal
    e("T5", -0.0769, -0.0558, 0.0),
    e("P3", -0.0537, -0.0664, 0.0416),
    e("PZ", 0.0, -0.0672, 0.0672),
    e("P4", 0.0537, -0.0664, 0.0416),
    e("T6", 0.0769, -0.0558, 0.0),
    // Occipital
    e("O1", -0.0294, -0.0904, 0.0),
    e("OZ", 0.0, -0.095, 0.0),
    e("O2", 0.0294, -0.0904, 0.0),
    // 10-10 names for the temporal sites above
    e("T7", -0.095, 0.0, 0.0),
    e("T8", 0.095, 0.0, 0.0),
    e("P7", -0.0769, -0.0558, 0.0),
    e("P8", 0.0769, -0.0558, 0.0),
];

/// Immutable canonical name → position table.
#[derive(Debug, Clone, Copy)]
pub struct ElectrodeCatalog {
    electrodes: &'static [Electrode],
}

impl ElectrodeCatalog {
    pub const fn standard_1020() -> Self {
        Self {
            electrodes: STANDARD_1020,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Electrode> {
        self.electrodes.iter()
    }

    pub fn len(&self) -> usize {
        self.electrodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.electrodes.is_empty()
    }

    /// Index of an exact canonical name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.electrodes.iter().position(|e| e.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&'static Electrode> {
        self.electrodes.get(index)
    }

    pub fn position(&self, name: &str) -> Option<[f64; 3]> {
        self.index_of(name).map(|i| self.electrodes[i].position)
    }
}

impl Default for ElectrodeCatalog {
    fn default() -> Self {
        Self::standard_1020()
    }
}
