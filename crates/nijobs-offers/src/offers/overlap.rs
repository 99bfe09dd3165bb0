//! Maximum simultaneous overlap of closed intervals.

use super::domain::PublishWindow;

/// Returns the largest number of closed `[start, end]` intervals open at one instant.
///
/// Starts and ends are sorted independently and swept with two cursors. A start equal
/// to the next end is consumed first, so an interval ending exactly when another begins
/// counts as overlapping it.
pub fn peak_overlap<T, I>(intervals: I) -> usize
where
    T: Ord + Copy,
    I: IntoIterator<Item = (T, T)>,
{
    let (mut starts, mut ends): (Vec<T>, Vec<T>) = intervals.into_iter().unzip();
    starts.sort_unstable();
    ends.sort_unstable();

    let (mut next_start, mut next_end) = (0, 0);
    let mut open = 0usize;
    let mut peak = 0usize;

    while next_start < starts.len() || next_end < ends.len() {
        let enters = match (starts.get(next_start), ends.get(next_end)) {
            (Some(start), Some(end)) => start <= end,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if enters {
            next_start += 1;
            open += 1;
            peak = peak.max(open);
        } else {
            next_end += 1;
            open = open.saturating_sub(1);
        }
    }

    peak
}

/// [`peak_overlap`] over offer publication windows.
pub fn peak_concurrency<'a, I>(windows: I) -> usize
where
    I: IntoIterator<Item = &'a PublishWindow>,
{
    peak_overlap(windows.into_iter().map(|window| (window.start(), window.end())))
}
