use std::collections::HashMap;

/// Majority vote over a window of finger counts.
///
/// Ties go to the most recent sample: the window is scanned from the end and
/// the first value whose running count climbs above the current maximum wins.
/// Returns `None` for an empty window.
pub fn most_frequent(votes: &[u32]) -> Option<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::with_capacity(votes.len());
    let mut leader: Option<(u32, usize)> = None;

    for &vote in votes.iter().rev() {
        let count = counts.entry(vote).or_insert(0);
        *count += 1;
        match leader {
            Some((_, max)) if *count <= max => {}
            _ => leader = Some((vote, *count)),
        }
    }

    leader.map(|(vote, _)| vote)
}
