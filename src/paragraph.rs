//! Paragraph grouping of recognized regions
//!
//! Regions are clustered by proximity: a group absorbs any region whose
//! horizontal edge falls inside the group's horizontal extent widened by
//! `width_threshold * mean_height`, and whose vertical edge falls inside the
//! vertical extent widened by `height_threshold * mean_height`. Each group is
//! then read top-to-bottom, left-to-right.

use crate::engine::TextRegion;

/// Regions whose centres lie within this fraction of the mean height below
/// the highest remaining centre are read as one row
const ROW_TOLERANCE: f32 = 0.4;

/// Merge regions into paragraph texts, in group creation order
pub fn group_paragraphs(
    regions: &[TextRegion],
    width_threshold: f32,
    height_threshold: f32,
) -> Vec<String> {
    let mut group_of: Vec<Option<usize>> = vec![None; regions.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    while let Some(seed) = group_of.iter().position(Option::is_none) {
        let group_id = groups.len();
        group_of[seed] = Some(group_id);
        let mut members = vec![seed];

        loop {
            let extent = Extent::of(regions, &members);
            let dx = width_threshold * extent.mean_height;
            let dy = height_threshold * extent.mean_height;
            let (min_x, max_x) = (extent.left - dx, extent.right + dx);
            let (min_y, max_y) = (extent.top - dy, extent.bottom + dy);

            let candidate = (0..regions.len()).find(|&i| {
                if group_of[i].is_some() {
                    return false;
                }
                let b = &regions[i].bounds;
                let horizontal = (min_x..=max_x).contains(&b.left)
                    || (min_x..=max_x).contains(&b.right);
                let vertical =
                    (min_y..=max_y).contains(&b.top) || (min_y..=max_y).contains(&b.bottom);
                horizontal && vertical
            });

            match candidate {
                Some(i) => {
                    group_of[i] = Some(group_id);
                    members.push(i);
                }
                None => break,
            }
        }

        groups.push(members);
    }

    groups
        .into_iter()
        .map(|members| read_group(regions, members))
        .collect()
}

/// Order a group's regions into reading order and join them with spaces
fn read_group(regions: &[TextRegion], mut remaining: Vec<usize>) -> String {
    let mean_height = Extent::of(regions, &remaining).mean_height;
    let mut words = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let highest = remaining
            .iter()
            .map(|&i| regions[i].bounds.center_y())
            .fold(f32::INFINITY, f32::min);

        let row_limit = highest + ROW_TOLERANCE * mean_height;
        let next = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &i)| regions[i].bounds.center_y() <= row_limit)
            .min_by(|&(_, &a), &(_, &b)| {
                regions[a]
                    .bounds
                    .left
                    .total_cmp(&regions[b].bounds.left)
            })
            .map(|(pos, _)| pos);

        // The highest region always qualifies, even for zero-height text
        let Some(pos) = next else { break };
        let index = remaining.remove(pos);
        words.push(regions[index].text.as_str());
    }

    words.join(" ")
}

struct Extent {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    mean_height: f32,
}

impl Extent {
    fn of(regions: &[TextRegion], members: &[usize]) -> Self {
        let mut extent = Extent {
            left: f32::INFINITY,
            right: f32::NEG_INFINITY,
            top: f32::INFINITY,
            bottom: f32::NEG_INFINITY,
            mean_height: 0.0,
        };

        for &i in members {
            let b = &regions[i].bounds;
            extent.left = extent.left.min(b.left);
            extent.right = extent.right.max(b.right);
            extent.top = extent.top.min(b.top);
            extent.bottom = extent.bottom.max(b.bottom);
            extent.mean_height += b.height();
        }
        if !members.is_empty() {
            extent.mean_height /= members.len() as f32;
        }

        extent
    }
}
