use super::*;

/// Outcome of merging a new window into a key's active windows.
///
/// `merged_away` lists active windows whose state must move into `surviving`.
/// It never contains `surviving` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub surviving: TimeWindow,
    pub merged_away: Vec<TimeWindow>,
}

impl MergeResult {
    /// Nothing merges: the new window stands on its own.
    pub fn identity(window: TimeWindow) -> Self {
        Self {
            surviving: window,
            merged_away: Vec::new(),
        }
    }

    /// Return true if no existing window was superseded.
    pub fn is_identity(&self) -> bool {
        self.merged_away.is_empty()
    }
}

/// Grow `new_window` by every existing window that overlaps or abuts it,
/// repeating until no further window joins.
///
/// The surviving window is the union of all merged intervals. When that union
/// is itself an existing window, the existing window survives unchanged.
pub fn merge_overlapping(existing: &BTreeSet<TimeWindow>, new_window: &TimeWindow) -> MergeResult {
    let mut surviving = new_window.clone();
    let mut merged: BTreeSet<TimeWindow> = BTreeSet::new();

    loop {
        let joining: Vec<&TimeWindow> = existing
            .iter()
            .filter(|w| !merged.contains(*w) && w.overlaps_or_abuts(&surviving))
            .collect();
        if joining.is_empty() {
            break;
        }
        for window in joining {
            surviving = surviving.span(window);
            merged.insert(window.clone());
        }
    }

    merged.remove(&surviving);
    MergeResult {
        surviving,
        merged_away: merged.into_iter().collect(),
    }
}
