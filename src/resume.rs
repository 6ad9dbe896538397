/// Smallest ID in `[begin, end)` not yet done, or `end` if all are.
///
/// Binary search: O(log n) probes, valid only when earlier runs covered a
/// contiguous prefix of the range. With gaps the answer is whichever boundary
/// the probes happen to land on, and IDs below it may be skipped.
pub fn find_resume_point<E>(
    begin: i64,
    end: i64,
    mut is_done: impl FnMut(i64) -> Result<bool, E>,
) -> Result<i64, E> {
    let (mut lo, mut hi) = (begin, end.max(begin));
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if is_done(mid)? {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}
