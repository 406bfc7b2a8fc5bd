use crate::{
    aggregate::count_by_territory,
    enrich::EnrichedTable,
    errors::Result,
    territory::{LayerKind, TerritoryCode},
};

/// Territories of `layer` ordered by detection count in `table`, most fires first,
/// ties by code. Detections outside the layer are skipped.
pub fn rank_territories(table: &EnrichedTable, layer: LayerKind) -> Result<Vec<(TerritoryCode, u32)>> {
    let mut ranked = count_by_territory(table, layer)?.into_iter().collect::<Vec<_>>();
    // Counts come out ordered by code, so a stable sort keeps ties by code.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(ranked)
}

/// The territory at rank `position` (1 is the most affected), if there are that many.
pub fn top_territory(table: &EnrichedTable, layer: LayerKind, position: usize) -> Result<Option<(TerritoryCode, u32)>> {
    let Some(i) = position.checked_sub(1) else { return Ok(None) };
    Ok(rank_territories(table, layer)?.into_iter().nth(i))
}
