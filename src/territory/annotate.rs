use std::sync::Arc;

use tracing::info;

use crate::{
    errors::Result,
    territory::{LayerKind, TerritoryField, TerritoryLayer},
};

/// One summarized attribute: the values of `field` over every territory of the source layer
/// intersecting a target territory, comma-joined into the target's `output` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectionSummary {
    pub field: TerritoryField,
    pub output: String,
    /// List each value once (e.g. the states of the intersecting cities).
    pub distinct: bool,
}

impl IntersectionSummary {
    pub fn new(field: TerritoryField, output: &str) -> Self {
        Self { field, output: output.to_string(), distinct: false }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Attach to each territory of `target` the summaries of the `source` territories it intersects.
/// Values follow the source layer's own order. Territories with no intersecting value get no
/// attribute (absent, never an empty string). `target` is left untouched.
pub fn annotate_intersections(
    target: &TerritoryLayer,
    source: &TerritoryLayer,
    summaries: &[IntersectionSummary],
) -> Result<TerritoryLayer> {
    source.ensure_crs(target.crs())?;

    let mut territories = target.territories().to_vec();
    let mut annotated = 0;
    for (territory, shape) in territories.iter_mut().zip(target.shapes()) {
        let hits = source.intersecting(shape);
        if !hits.is_empty() {
            annotated += 1;
        }
        for summary in summaries {
            let mut values: Vec<&str> = Vec::with_capacity(hits.len());
            for &i in &hits {
                let Some(value) = source.territories()[i].field(&summary.field) else { continue };
                if summary.distinct && values.contains(&value.as_ref()) {
                    continue;
                }
                values.push(value.as_ref());
            }
            if !values.is_empty() {
                territory.attributes.insert(summary.output.clone(), Arc::from(values.join(", ")));
            }
        }
    }

    info!(target = %target.kind(), source = %source.kind(), annotated, "annotated intersecting territories");
    Ok(TerritoryLayer::from_parts(target.kind(), target.crs(), territories, target.shapes().to_vec()))
}

/// The summaries attached to a grid cell from one source layer: names and codes, with the
/// states of intersecting cities listed once.
pub(crate) fn grid_summaries(source: LayerKind) -> Vec<IntersectionSummary> {
    let mut summaries = vec![
        IntersectionSummary::new(TerritoryField::Name, source.name_column()),
        IntersectionSummary::new(TerritoryField::Code, source.code_column()),
    ];
    if source == LayerKind::City {
        summaries.push(IntersectionSummary::new(TerritoryField::Attribute("state".into()), "state").distinct());
    }
    summaries
}

/// The summaries attached to a protected area or indigenous land: intersecting biome names,
/// city names and (once each) their states.
pub(crate) fn land_summaries(source: LayerKind) -> Vec<IntersectionSummary> {
    match source {
        LayerKind::Biome => vec![IntersectionSummary::new(TerritoryField::Name, "biomes")],
        LayerKind::City => vec![
            IntersectionSummary::new(TerritoryField::Name, "cities"),
            IntersectionSummary::new(TerritoryField::Attribute("state".into()), "states").distinct(),
        ],
        _ => Vec::new(),
    }
}
