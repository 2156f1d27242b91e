//! Curriculum plan: which pass order runs for how many passes.

use crate::error::{ConfigError, Result};
use crate::source::PassOrder;

/// Consecutive passes sharing one order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanSegment {
    pub order: PassOrder,
    pub passes: usize,
}

/// Ordered list of segments covering the whole run.
///
/// At most one [`PassOrder::DurationSorted`] segment exists; when present it
/// comes first and lasts one pass. No segment has zero passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurriculumPlan {
    segments: Vec<PlanSegment>,
}

impl CurriculumPlan {
    /// Build the plan for `num_passes` passes.
    ///
    /// With SortaGrad the first pass is duration-sorted and the rest are
    /// shuffled; without it every pass is shuffled.
    pub fn new(use_sortagrad: bool, num_passes: usize) -> Result<Self> {
        if num_passes == 0 {
            return Err(ConfigError::InvalidPassCount(num_passes).into());
        }

        let segments = if use_sortagrad {
            let sorted = PlanSegment {
                order: PassOrder::DurationSorted,
                passes: 1,
            };
            let shuffled = PlanSegment {
                order: PassOrder::Shuffled,
                passes: num_passes - 1,
            };
            [sorted, shuffled]
                .into_iter()
                .filter(|segment| segment.passes > 0)
                .collect()
        } else {
            vec![PlanSegment {
                order: PassOrder::Shuffled,
                passes: num_passes,
            }]
        };

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PlanSegment] {
        &self.segments
    }

    /// Total passes across all segments.
    pub fn total_passes(&self) -> usize {
        self.segments.iter().map(|s| s.passes).sum()
    }

    /// Order of every pass in run order.
    pub fn pass_orders(&self) -> impl Iterator<Item = PassOrder> + '_ {
        self.segments
            .iter()
            .flat_map(|s| std::iter::repeat_n(s.order, s.passes))
    }
}
