//! Overlap merging: collapse mutually-overlapping boxes from the same
//! object into a single box.
//!
//! This stage is confidence-agnostic. Confidence filtering has already
//! happened inside the detector, so selection here is purely geometric.

use crate::geometry::BoundingBox;

/// Greedy overlap elimination.
///
/// Repeatedly picks the bottom-most remaining box (largest `y2`) as a
/// keeper, then discards every remaining candidate whose intersection with
/// the keeper, divided by the candidate's own area, exceeds
/// `overlap_threshold`. The ratio is deliberately asymmetric (a
/// contained-within test, not IoU): a small box mostly covered by the
/// keeper is dropped no matter how large the keeper is.
///
/// The output preserves input order and is a subset of the input boxes;
/// ties on `y2` resolve deterministically by input order. `merge` is
/// idempotent for a fixed threshold.
pub fn merge(boxes: &[BoundingBox], overlap_threshold: f32) -> Vec<BoundingBox> {
    if boxes.len() <= 1 {
        return boxes.to_vec();
    }

    let corners: Vec<_> = boxes.iter().map(BoundingBox::corners).collect();

    // Indices sorted by bottom edge, ascending. The sort is stable, so among
    // equal `y2` the latest input index is picked first.
    let mut remaining: Vec<usize> = (0..corners.len()).collect();
    remaining.sort_by_key(|&i| corners[i].y2);

    let mut kept = Vec::new();
    while let Some(keeper_idx) = remaining.pop() {
        kept.push(keeper_idx);
        let keeper = corners[keeper_idx];
        remaining.retain(|&i| {
            let candidate = corners[i];
            let own_area = candidate.area();
            if own_area == 0 {
                // Degenerate boxes never overlap anything; keep them.
                return true;
            }
            let overlap =
                keeper.intersection_area(&candidate) as f32 / own_area as f32;
            overlap <= overlap_threshold
        });
    }

    kept.sort_unstable();
    kept.into_iter().map(|i| boxes[i]).collect()
}
