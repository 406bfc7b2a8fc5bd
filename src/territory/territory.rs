use std::{collections::BTreeMap, fmt, sync::Arc};

use geo::MultiPolygon;

/// Stable key of a territory within its layer.
/// Keep the source text (leading zeros included) but avoid repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerritoryCode(Arc<str>);

impl TerritoryCode {
    pub fn new(code: &str) -> Self { Self(Arc::from(code)) }

    /// A fresh random code for territories whose source has none.
    pub fn synthesize() -> Self { Self(Arc::from(uuid::Uuid::new_v4().simple().to_string())) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }

    #[inline] pub(crate) fn as_arc(&self) -> &Arc<str> { &self.0 }
}

impl fmt::Display for TerritoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TerritoryCode {
    fn from(code: &str) -> Self { Self::new(code) }
}

/// One administrative or ecological unit of a layer (geometry lives in the layer's index).
#[derive(Debug, Clone, PartialEq)]
pub struct Territory {
    pub code: TerritoryCode,
    pub name: Option<Arc<str>>,
    pub attributes: BTreeMap<String, Arc<str>>, // e.g. state of a city, creation year of a protected area
}

impl Territory {
    /// Value of one field, if present.
    pub fn field(&self, field: &TerritoryField) -> Option<&Arc<str>> {
        match field {
            TerritoryField::Code => Some(self.code.as_arc()),
            TerritoryField::Name => self.name.as_ref(),
            TerritoryField::Attribute(key) => self.attributes.get(key),
        }
    }
}

/// Selects a value of a territory: its code, its name or one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerritoryField {
    Code,
    Name,
    Attribute(String),
}

/// A territory as delivered by a loader, before it is indexed into a layer.
#[derive(Debug, Clone)]
pub struct TerritoryFeature {
    pub code: Option<String>,
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub geometry: MultiPolygon<f64>,
}

impl TerritoryFeature {
    pub fn new(code: Option<&str>, name: Option<&str>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            code: code.map(str::to_string),
            name: name.map(str::to_string),
            attributes: BTreeMap::new(),
            geometry,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}
