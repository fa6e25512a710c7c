//! Time interval algebra.
//!
//! Availabilities, tours, arrival windows and boarding-point time slots are
//! all closed ranges on the UTC time axis. This module provides the value
//! type plus the two set operations the dispatcher builds on:
//! [`Interval::merge_all`] and [`Interval::subtract`].

use std::cmp::{max, min};
use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Error returned when an interval would end before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid interval: end {end} is before start {start}")]
pub struct InvalidInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// How interval `a` lies relative to interval `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    AContainsB,
    BContainsA,
    /// Both overlap, `a` starts first.
    OverlappingAEarlier,
    /// Both overlap, `b` starts first.
    OverlappingBEarlier,
    ABeforeB,
    BBeforeA,
    /// `a` ends exactly where `b` starts.
    TouchingABeforeB,
    /// `b` ends exactly where `a` starts.
    TouchingBBeforeA,
}

/// A time range from `start` to `end` with `start <= end`.
///
/// Both bounds belong to the range for [`covers`](Self::covers),
/// [`contains`](Self::contains) and [`intersect`](Self::intersect).
/// [`overlaps`](Self::overlaps) asks for shared time of positive length,
/// so ranges that only share an endpoint [`touch`](Self::touches) instead.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use dispatch_server::domain::Interval;
///
/// let nine = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
/// let morning = Interval::new(nine, nine + Duration::hours(3));
///
/// let inner = morning.shrink(Duration::minutes(30), Duration::minutes(30)).unwrap();
/// assert_eq!(inner.duration(), Duration::hours(2));
///
/// // Shrinking by more than the length leaves nothing
/// assert!(morning.shrink(Duration::hours(2), Duration::hours(2)).is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    /// Create an interval.
    ///
    /// # Panics
    ///
    /// Panics if `end < start`. Use [`Interval::try_new`] for untrusted input.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "interval end {end} is before start {start}");
        Self { start, end }
    }

    /// Create an interval from untrusted bounds.
    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidInterval> {
        if end < start {
            return Err(InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// A zero-length interval at `t`.
    pub fn point(t: DateTime<Utc>) -> Self {
        Self { start: t, end: t }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if both share more than a boundary point.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True if one ends exactly where the other starts.
    pub fn touches(&self, other: &Interval) -> bool {
        self.start == other.end || self.end == other.start
    }

    /// True if `other` lies entirely within `self`.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True if `t` lies within the closed range.
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    fn is_mergeable(&self, other: &Interval) -> bool {
        self.overlaps(other) || self.touches(other)
    }

    /// The common part of two intervals, if they share at least one point.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        if self.start <= other.end && self.end >= other.start {
            Some(Interval {
                start: max(self.start, other.start),
                end: min(self.end, other.end),
            })
        } else {
            None
        }
    }

    /// Smallest interval covering both.
    ///
    /// Only meaningful for overlapping or touching intervals; for disjoint
    /// ones the gap between them is covered too.
    pub fn merge(&self, other: &Interval) -> Interval {
        debug_assert!(self.is_mergeable(other), "merging disjoint intervals");
        Interval {
            start: min(self.start, other.start),
            end: max(self.end, other.end),
        }
    }

    /// Move the start later by `front` and the end earlier by `back`.
    ///
    /// Returns `None` if less than nothing would remain.
    pub fn shrink(&self, front: Duration, back: Duration) -> Option<Interval> {
        if self.duration() < front + back {
            return None;
        }
        Some(Interval {
            start: self.start + front,
            end: self.end - back,
        })
    }

    /// Move the start earlier by `front` and the end later by `back`.
    pub fn expand(&self, front: Duration, back: Duration) -> Interval {
        Interval::new(self.start - front, self.end + back)
    }

    pub fn shift(&self, by: Duration) -> Interval {
        Interval {
            start: self.start + by,
            end: self.end + by,
        }
    }

    /// Remove the part covered by an overlapping `cutter`, keeping the side
    /// of `self` that sticks out.
    fn cut(&self, cutter: &Interval) -> Interval {
        if self.start < cutter.start {
            Interval::new(self.start, cutter.start)
        } else {
            Interval::new(cutter.end, self.end)
        }
    }

    /// The pieces of `self` left and right of a contained `splitter`.
    fn split(&self, splitter: &Interval) -> (Interval, Interval) {
        (
            Interval::new(self.start, splitter.start),
            Interval::new(splitter.end, self.end),
        )
    }

    /// Classify `self` (as `a`) against `other` (as `b`).
    pub fn relation(&self, other: &Interval) -> Relation {
        if self == other {
            return Relation::Equal;
        }
        if other.contains(self) {
            return Relation::BContainsA;
        }
        if self.contains(other) {
            return Relation::AContainsB;
        }
        if self.overlaps(other) {
            return if self.start > other.start {
                Relation::OverlappingBEarlier
            } else {
                Relation::OverlappingAEarlier
            };
        }
        if self.touches(other) {
            return if self.start > other.start {
                Relation::TouchingBBeforeA
            } else {
                Relation::TouchingABeforeB
            };
        }
        if self.start > other.start {
            Relation::BBeforeA
        } else {
            Relation::ABeforeB
        }
    }

    /// Coalesce a list into its minimal sorted cover.
    ///
    /// Overlapping and touching intervals become one; the result is sorted
    /// by start and pairwise disjoint with gaps between neighbours.
    pub fn merge_all(intervals: &[Interval]) -> Vec<Interval> {
        let mut sorted = intervals.to_vec();
        sorted.sort_by_key(|i| (i.start, i.end));

        let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
        for interval in sorted {
            match merged.last_mut() {
                Some(last) if last.is_mergeable(&interval) => *last = last.merge(&interval),
                _ => merged.push(interval),
            }
        }
        merged
    }

    /// Set difference `minuend − subtrahend`.
    ///
    /// Both inputs are merged first. Subtrahends that merely touch a
    /// minuend leave it untouched.
    ///
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use dispatch_server::domain::Interval;
    ///
    /// let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    /// let h = |n: i64| t0 + Duration::hours(n);
    ///
    /// let free = Interval::subtract(
    ///     &[Interval::new(h(4), h(20))],
    ///     &[Interval::new(h(8), h(10)), Interval::new(h(20), h(22))],
    /// );
    /// assert_eq!(free, vec![Interval::new(h(4), h(8)), Interval::new(h(10), h(20))]);
    /// ```
    pub fn subtract(minuend: &[Interval], subtrahend: &[Interval]) -> Vec<Interval> {
        let minuend = Interval::merge_all(minuend);
        let subtrahend = Interval::merge_all(subtrahend);

        let mut result = Vec::new();
        let mut m = 0;
        let mut s = 0;
        let mut current = minuend.first().copied();

        while let Some(a) = current {
            let Some(b) = subtrahend.get(s) else {
                break;
            };
            match a.relation(b) {
                Relation::BBeforeA | Relation::TouchingBBeforeA => s += 1,
                Relation::ABeforeB | Relation::TouchingABeforeB => {
                    result.push(a);
                    m += 1;
                    current = minuend.get(m).copied();
                }
                Relation::Equal | Relation::BContainsA => {
                    m += 1;
                    current = minuend.get(m).copied();
                }
                Relation::AContainsB if b.is_empty() && b.start > a.start && b.end < a.end => {
                    // Removing a single instant changes nothing.
                    s += 1;
                }
                Relation::AContainsB => {
                    let (left, right) = a.split(b);
                    if !left.is_empty() {
                        result.push(left);
                    }
                    if right.is_empty() {
                        m += 1;
                        current = minuend.get(m).copied();
                    } else {
                        current = Some(right);
                    }
                    s += 1;
                }
                Relation::OverlappingBEarlier => {
                    current = Some(a.cut(b));
                    s += 1;
                }
                Relation::OverlappingAEarlier => {
                    result.push(a.cut(b));
                    m += 1;
                    current = minuend.get(m).copied();
                }
            }
        }

        if let Some(a) = current {
            result.push(a);
            result.extend_from_slice(&minuend[(m + 1).min(minuend.len())..]);
        }
        result
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
