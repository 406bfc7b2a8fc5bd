use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of territory layer a detection is joined against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    City,           // Municipality, carries its state
    Biome,
    ProtectedArea,  // Conservation unit; polygons may overlap
    IndigenousLand,
    Grid,           // Fixed square tiles, built rather than loaded
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::City,
        LayerKind::Biome,
        LayerKind::ProtectedArea,
        LayerKind::IndigenousLand,
        LayerKind::Grid,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            LayerKind::City => "city",
            LayerKind::Biome => "biome",
            LayerKind::ProtectedArea => "protected_area",
            LayerKind::IndigenousLand => "indigenous_land",
            LayerKind::Grid => "grid",
        }
    }

    /// Column holding the territory code in enriched and aggregated tables.
    pub fn code_column(&self) -> &'static str {
        match self {
            LayerKind::City => "city_code",
            LayerKind::Biome => "biome_code",
            LayerKind::ProtectedArea => "protected_area_code",
            LayerKind::IndigenousLand => "indigenous_land_code",
            LayerKind::Grid => "cell_code",
        }
    }

    /// Column holding the territory display name in enriched and aggregated tables.
    pub fn name_column(&self) -> &'static str {
        match self {
            LayerKind::City => "city",
            LayerKind::Biome => "biome",
            LayerKind::ProtectedArea => "protected_area",
            LayerKind::IndigenousLand => "indigenous_land",
            LayerKind::Grid => "cell",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}
