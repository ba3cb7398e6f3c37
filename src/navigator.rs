use crate::{
    catalog::{BranchTag, Dimension, Hierarchy, Level},
    state::Selection,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards a coarser level (roll-up).
    Up,
    /// Towards a finer level (drill-down).
    Down,
}

/// Outcome of a single navigation step. Nothing is applied; the caller
/// decides what to do with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Moved(Level),
    /// The step does not apply: already at a boundary, or the current level
    /// lies outside every navigable path.
    Unchanged(Level),
    /// Several branches start at the current level. The user has to pick one.
    AmbiguousBranch(Vec<BranchTag>),
}

impl Navigation {
    /// The level to show after this step, if it is decided.
    #[must_use]
    pub fn level(&self) -> Option<Level> {
        match self {
            Navigation::Moved(level) | Navigation::Unchanged(level) => Some(*level),
            Navigation::AmbiguousBranch(_) => None,
        }
    }
}

/// Computes one roll-up or drill-down step for `dimension`.
///
/// Descending from the shared entry of a branching hierarchy never picks a
/// branch on the caller's behalf; it yields [`Navigation::AmbiguousBranch`].
#[must_use]
pub fn navigate(dimension: Dimension, selection: &Selection, direction: Direction) -> Navigation {
    let current = selection.level(dimension);
    let hierarchy = dimension.hierarchy();

    if let Hierarchy::Branching { entry, branches } = hierarchy {
        if current == entry && direction == Direction::Down {
            return Navigation::AmbiguousBranch(branches.iter().map(|(tag, _)| *tag).collect());
        }
    }

    let Some(levels) = hierarchy.levels_for(current) else {
        return Navigation::Unchanged(current);
    };
    let Some(idx) = levels.iter().position(|level| *level == current) else {
        return Navigation::Unchanged(current);
    };

    match direction {
        Direction::Down if idx + 1 < levels.len() => Navigation::Moved(levels[idx + 1]),
        Direction::Up if idx > 0 => Navigation::Moved(levels[idx - 1]),
        _ => Navigation::Unchanged(current),
    }
}

/// Resolves an ambiguous descent by following `branch` one step down from
/// its entry level.
#[must_use]
pub fn descend_branch(branch: BranchTag) -> Level {
    branch.entry_level()
}

/// Which navigation buttons make sense for `dimension` right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Affordances {
    pub can_roll_up: bool,
    pub can_drill_down: bool,
    /// Drilling down needs an explicit branch choice first.
    pub needs_branch: bool,
}

#[must_use]
pub fn affordances(dimension: Dimension, selection: &Selection) -> Affordances {
    let up = navigate(dimension, selection, Direction::Up);
    let down = navigate(dimension, selection, Direction::Down);
    Affordances {
        can_roll_up: matches!(up, Navigation::Moved(_)),
        can_drill_down: !matches!(down, Navigation::Unchanged(_)),
        needs_branch: matches!(down, Navigation::AmbiguousBranch(_)),
    }
}
