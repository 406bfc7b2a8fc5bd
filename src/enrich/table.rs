use std::{collections::BTreeMap, sync::Arc};

use polars::{frame::DataFrame, prelude::Column};

use crate::{
    config::DetectionColumns,
    detection::{detection_columns, DetectionTable, FireDetection},
    errors::{FireError, Result},
    geom::Crs,
    territory::{LayerKind, TerritoryCode, TerritoryField},
};

/// One territory column appended by the enricher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedColumn {
    pub name: String,
    pub layer: LayerKind,
    pub field: TerritoryField,
}

/// Layout of the territory columns of an enriched table, in join order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichedSchema {
    columns: Vec<EnrichedColumn>,
    codes: BTreeMap<LayerKind, usize>, // layer -> index of its code column
}

impl EnrichedSchema {
    /// Append a column unless its name is taken; the earlier column stays canonical.
    /// Returns the index of the appended column.
    pub(crate) fn push(&mut self, column: EnrichedColumn) -> Result<Option<usize>> {
        if self.columns.iter().any(|existing| existing.name == column.name) {
            if column.field == TerritoryField::Code {
                return Err(FireError::Config(format!(
                    "code column {} of layer {} is already used by an earlier layer",
                    column.name, column.layer,
                )));
            }
            return Ok(None);
        }
        let idx = self.columns.len();
        if column.field == TerritoryField::Code {
            self.codes.insert(column.layer, idx);
        }
        self.columns.push(column);
        Ok(Some(idx))
    }

    #[inline] pub fn columns(&self) -> &[EnrichedColumn] { &self.columns }

    #[inline] pub fn len(&self) -> usize { self.columns.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.columns.is_empty() }

    /// Index of the code column of `layer`, if the layer was joined.
    #[inline] pub fn code_index(&self, layer: LayerKind) -> Option<usize> { self.codes.get(&layer).copied() }

    /// Index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Layers joined, in join order.
    pub fn layers(&self) -> Vec<LayerKind> {
        let mut layers = self.codes.iter().map(|(&kind, &idx)| (idx, kind)).collect::<Vec<_>>();
        layers.sort_unstable();
        layers.into_iter().map(|(_, kind)| kind).collect()
    }
}

/// A detection with the territory values it was matched to (one slot per schema column).
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub detection: Arc<FireDetection>,
    pub(crate) values: Vec<Option<Arc<str>>>,
}

impl EnrichedRow {
    #[inline] pub fn value(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }
}

/// Output of the enricher: detection rows with their territory columns. A detection may
/// occupy several rows when it falls inside overlapping territories of one layer.
#[derive(Debug, Clone)]
pub struct EnrichedTable {
    crs: Crs,
    schema: Arc<EnrichedSchema>,
    rows: Vec<EnrichedRow>,
}

impl EnrichedTable {
    pub(crate) fn new(crs: Crs, schema: Arc<EnrichedSchema>, rows: Vec<EnrichedRow>) -> Self {
        Self { crs, schema, rows }
    }

    /// A table with the same layout holding `rows`.
    pub(crate) fn with_rows(&self, rows: Vec<EnrichedRow>) -> Self {
        Self { crs: self.crs, schema: self.schema.clone(), rows }
    }

    /// A table with the same layout and no rows.
    pub fn empty_like(&self) -> Self {
        Self { crs: self.crs, schema: self.schema.clone(), rows: Vec::new() }
    }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn schema(&self) -> &EnrichedSchema { &self.schema }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    #[inline] pub fn rows(&self) -> &[EnrichedRow] { &self.rows }

    /// Territory code of `row` in `layer`, if any.
    pub fn code(&self, row: &EnrichedRow, layer: LayerKind) -> Option<TerritoryCode> {
        let idx = self.schema.code_index(layer)?;
        row.value(idx).map(TerritoryCode::from)
    }

    /// Value of the named column for `row`.
    pub fn value<'a>(&self, row: &'a EnrichedRow, column: &str) -> Option<&'a str> {
        row.value(self.schema.index_of(column)?)
    }

    /// A new table with the rows matching `keep`, in order.
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(&EnrichedRow) -> bool,
    {
        Self {
            crs: self.crs,
            schema: self.schema.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Rows falling inside any territory of `layer`.
    pub fn inside(&self, layer: LayerKind) -> Self {
        match self.schema.code_index(layer) {
            Some(idx) => self.filter(|row| row.value(idx).is_some()),
            None => self.empty_like(),
        }
    }

    /// Rows falling inside the territory `code` of `layer`.
    pub fn in_territory(&self, layer: LayerKind, code: &TerritoryCode) -> Self {
        match self.schema.code_index(layer) {
            Some(idx) => self.filter(|row| row.value(idx) == Some(code.as_str())),
            None => self.empty_like(),
        }
    }

    /// Rows of `self` followed by rows of `other`. Both must share CRS and layout.
    pub fn concat(&self, other: &EnrichedTable) -> Result<Self> {
        if self.crs != other.crs {
            return Err(FireError::CoordinateMismatch {
                layer: "enriched detections".into(),
                expected: self.crs.epsg(),
                found: other.crs.epsg(),
            });
        }
        if self.schema != other.schema {
            return Err(FireError::Config("cannot concatenate tables enriched with different layers".into()));
        }
        let mut rows = Vec::with_capacity(self.len() + other.len());
        rows.extend(self.rows.iter().cloned());
        rows.extend(other.rows.iter().cloned());
        Ok(Self { crs: self.crs, schema: self.schema.clone(), rows })
    }

    /// The detections of this table, one row per enriched row.
    pub fn detections(&self) -> DetectionTable {
        DetectionTable::from_rows(self.crs, self.rows.iter().map(|row| row.detection.clone()).collect())
    }

    /// Export: detection columns (named as in `columns`), then the territory columns in join order.
    pub fn to_frame(&self, columns: &DetectionColumns) -> Result<DataFrame> {
        let detections = self.rows.iter().map(|row| row.detection.as_ref()).collect::<Vec<_>>();
        let mut out = detection_columns(&detections, columns);
        // Keep geometry last.
        let geometry = out.pop();
        for (idx, column) in self.schema.columns().iter().enumerate() {
            out.push(Column::new(
                column.name.as_str().into(),
                self.rows.iter().map(|row| row.value(idx)).collect::<Vec<_>>(),
            ));
        }
        out.extend(geometry);
        Ok(DataFrame::new(out)?)
    }
}
