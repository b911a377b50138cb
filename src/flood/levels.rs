use super::{FloodContext, FloodedCellSet, ReachabilityStrategy};
use crate::Result;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

/// Считает затопление для нескольких уровней воды.
///
/// Расчёты разных уровней независимы, поэтому при включённой фиче `parallel`
/// они выполняются параллельно. Порядок результатов совпадает с порядком `levels`.
pub fn flood_levels(
    ctx: &FloodContext,
    levels: &[f32],
    strategy: ReachabilityStrategy,
) -> Result<Vec<FloodedCellSet>> {
    #[cfg(feature = "parallel")]
    let results: Result<Vec<FloodedCellSet>> = levels
        .par_iter()
        .map(|&level| ctx.flood(level, strategy))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results: Result<Vec<FloodedCellSet>> = levels
        .iter()
        .map(|&level| ctx.flood(level, strategy))
        .collect();

    let results = results?;
    for flooded in &results {
        info!(
            water_level = flooded.water_level(),
            cells = flooded.len(),
            "flood level computed"
        );
    }
    Ok(results)
}
