//! Insertion case taxonomy.
//!
//! An insertion case says how a leg is spliced into a vehicle's schedule
//! (`how`), which point is inserted (`what`), where in the event list the
//! slot lies (`position`) and which way the passenger travels relative to
//! the boarding point (`direction`). Only valid combinations can be built.

use std::fmt;

use crate::domain::Vehicle;

/// How a leg is spliced into a vehicle's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertHow {
    /// Join two adjacent tours into one.
    Connect,
    /// Extend a tour at its end.
    Append,
    /// Extend a tour at its start.
    Prepend,
    /// Between two events of the same tour.
    Insert,
    /// A fresh tour bounded only by availability.
    NewTour,
}

impl InsertHow {
    /// Modes tried at every existing slot.
    pub const SLOT_OPTIONS: [InsertHow; 4] = [
        InsertHow::Connect,
        InsertHow::Append,
        InsertHow::Prepend,
        InsertHow::Insert,
    ];

    pub fn comes_from_company(self) -> bool {
        matches!(self, InsertHow::Prepend | InsertHow::NewTour)
    }

    pub fn returns_to_company(self) -> bool {
        matches!(self, InsertHow::Append | InsertHow::NewTour)
    }
}

/// Which point a leg inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertWhat {
    /// The exact coordinate the user asked for.
    UserChosen,
    /// One of the boarding-point candidates.
    BusStop,
    /// Pickup and dropoff back to back in the same slot.
    Both,
}

/// Where in a vehicle's event list a slot lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertWhere {
    BeforeFirstEvent,
    AfterLastEvent,
    BetweenEvents,
    BetweenTours,
}

impl InsertWhere {
    /// Classify slot `slot` of `vehicle`.
    pub fn of_slot(vehicle: &Vehicle, slot: usize) -> InsertWhere {
        if slot == 0 {
            return InsertWhere::BeforeFirstEvent;
        }
        if slot == vehicle.events.len() {
            return InsertWhere::AfterLastEvent;
        }
        match (vehicle.events.get(slot - 1), vehicle.events.get(slot)) {
            (Some(prev), Some(next)) if prev.tour != next.tour => InsertWhere::BetweenTours,
            _ => InsertWhere::BetweenEvents,
        }
    }
}

/// Whether the passenger rides towards or away from the boarding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertDirection {
    /// User-chosen point first, boarding point second.
    ToBusStop,
    /// Boarding point first (its time is fixed), user-chosen point second.
    FromBusStop,
}

impl InsertDirection {
    pub fn from_start_fixed(start_fixed: bool) -> Self {
        if start_fixed {
            InsertDirection::FromBusStop
        } else {
            InsertDirection::ToBusStop
        }
    }
}

/// Whether the slot position admits the insertion mode at all.
pub fn can_case_be_valid(how: InsertHow, position: InsertWhere) -> bool {
    match position {
        InsertWhere::BeforeFirstEvent => how == InsertHow::Prepend,
        InsertWhere::AfterLastEvent => how == InsertHow::Append,
        InsertWhere::BetweenEvents => how == InsertHow::Insert,
        InsertWhere::BetweenTours => how != InsertHow::Insert,
    }
}

/// Whether a leg of kind `what` may use mode `how` given the direction.
///
/// A pickup cannot end a tour and a dropoff cannot start one.
pub fn is_case_valid(how: InsertHow, what: InsertWhat, direction: InsertDirection) -> bool {
    match (what, direction) {
        (InsertWhat::Both, _) => true,
        (InsertWhat::UserChosen, InsertDirection::ToBusStop)
        | (InsertWhat::BusStop, InsertDirection::FromBusStop) => how != InsertHow::Append,
        (InsertWhat::UserChosen, InsertDirection::FromBusStop)
        | (InsertWhat::BusStop, InsertDirection::ToBusStop) => how != InsertHow::Prepend,
    }
}

/// A valid insertion case.
///
/// ```
/// use dispatch_server::dispatch::{InsertDirection, InsertHow, InsertWhat, InsertWhere, InsertionCase};
///
/// let append = InsertionCase::new(
///     InsertHow::Append,
///     InsertWhat::BusStop,
///     InsertWhere::AfterLastEvent,
///     InsertDirection::ToBusStop,
/// );
/// assert!(append.is_some());
///
/// // A dropoff cannot open a tour
/// let prepend = InsertionCase::new(
///     InsertHow::Prepend,
///     InsertWhat::BusStop,
///     InsertWhere::BeforeFirstEvent,
///     InsertDirection::ToBusStop,
/// );
/// assert!(prepend.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InsertionCase {
    how: InsertHow,
    what: InsertWhat,
    position: InsertWhere,
    direction: InsertDirection,
}

impl InsertionCase {
    /// Build a case at an existing slot. `NewTour` is not a slot mode; use
    /// [`InsertionCase::new_tour`].
    pub fn new(
        how: InsertHow,
        what: InsertWhat,
        position: InsertWhere,
        direction: InsertDirection,
    ) -> Option<Self> {
        if how == InsertHow::NewTour
            || !can_case_be_valid(how, position)
            || !is_case_valid(how, what, direction)
        {
            return None;
        }
        Some(Self {
            how,
            what,
            position,
            direction,
        })
    }

    /// Both legs on a vehicle with no tour around them.
    pub fn new_tour(direction: InsertDirection) -> Self {
        Self {
            how: InsertHow::NewTour,
            what: InsertWhat::Both,
            position: InsertWhere::BeforeFirstEvent,
            direction,
        }
    }

    /// The same slot and mode for a different point, if still valid.
    pub fn with_what(self, what: InsertWhat) -> Option<Self> {
        if self.how == InsertHow::NewTour {
            return (what == InsertWhat::Both).then_some(self);
        }
        InsertionCase::new(self.how, what, self.position, self.direction)
    }

    pub fn how(&self) -> InsertHow {
        self.how
    }

    pub fn what(&self) -> InsertWhat {
        self.what
    }

    pub fn position(&self) -> InsertWhere {
        self.position
    }

    pub fn direction(&self) -> InsertDirection {
        self.direction
    }

    pub fn comes_from_company(&self) -> bool {
        self.how.comes_from_company()
    }

    pub fn returns_to_company(&self) -> bool {
        self.how.returns_to_company()
    }

    /// Whether the leg should happen as early as its window allows.
    ///
    /// True for the boarding point when it comes first, and for the
    /// user-chosen point when the boarding point comes second.
    pub fn is_earlier_better(&self) -> bool {
        (self.direction == InsertDirection::FromBusStop) == (self.what == InsertWhat::BusStop)
    }
}

impl fmt::Display for InsertionCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}/{:?}",
            self.how, self.what, self.position, self.direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::*;
    use crate::domain::{Capacities, VehicleId};

    const HOWS: [InsertHow; 5] = [
        InsertHow::Connect,
        InsertHow::Append,
        InsertHow::Prepend,
        InsertHow::Insert,
        InsertHow::NewTour,
    ];
    const WHATS: [InsertWhat; 3] = [InsertWhat::UserChosen, InsertWhat::BusStop, InsertWhat::Both];
    const WHERES: [InsertWhere; 4] = [
        InsertWhere::BeforeFirstEvent,
        InsertWhere::AfterLastEvent,
        InsertWhere::BetweenEvents,
        InsertWhere::BetweenTours,
    ];
    const DIRECTIONS: [InsertDirection; 2] = [InsertDirection::ToBusStop, InsertDirection::FromBusStop];

    /// Modes admitted per position.
    fn allowed_at(position: InsertWhere) -> &'static [InsertHow] {
        match position {
            InsertWhere::BeforeFirstEvent => &[InsertHow::Prepend],
            InsertWhere::AfterLastEvent => &[InsertHow::Append],
            InsertWhere::BetweenEvents => &[InsertHow::Insert],
            InsertWhere::BetweenTours => &[
                InsertHow::Connect,
                InsertHow::Append,
                InsertHow::Prepend,
                InsertHow::NewTour,
            ],
        }
    }

    /// The one mode ruled out per (what, direction), if any.
    fn forbidden(what: InsertWhat, direction: InsertDirection) -> Option<InsertHow> {
        match (what, direction) {
            (InsertWhat::UserChosen, InsertDirection::ToBusStop) => Some(InsertHow::Append),
            (InsertWhat::UserChosen, InsertDirection::FromBusStop) => Some(InsertHow::Prepend),
            (InsertWhat::BusStop, InsertDirection::ToBusStop) => Some(InsertHow::Prepend),
            (InsertWhat::BusStop, InsertDirection::FromBusStop) => Some(InsertHow::Append),
            (InsertWhat::Both, _) => None,
        }
    }

    #[test]
    fn exhaustive_truth_table() {
        let mut constructible = 0;
        for how in HOWS {
            for what in WHATS {
                for position in WHERES {
                    for direction in DIRECTIONS {
                        let positional = allowed_at(position).contains(&how);
                        let directional = forbidden(what, direction) != Some(how);
                        assert_eq!(can_case_be_valid(how, position), positional, "{how:?} at {position:?}");
                        assert_eq!(is_case_valid(how, what, direction), directional, "{how:?} {what:?} {direction:?}");

                        let built = InsertionCase::new(how, what, position, direction);
                        let expected = how != InsertHow::NewTour && positional && directional;
                        assert_eq!(built.is_some(), expected);
                        constructible += usize::from(expected);
                    }
                }
            }
        }
        // Prepend and Append admit 4 of 6 (what, direction) pairs, Insert
        // and Connect all 6: first 4, last 4, between events 6, between
        // tours 6 + 4 + 4.
        assert_eq!(constructible, 28);
    }

    #[test]
    fn company_attachment() {
        assert!(InsertHow::Prepend.comes_from_company());
        assert!(InsertHow::NewTour.comes_from_company());
        assert!(!InsertHow::Connect.comes_from_company());
        assert!(InsertHow::Append.returns_to_company());
        assert!(InsertHow::NewTour.returns_to_company());
        assert!(!InsertHow::Connect.returns_to_company());
        assert!(!InsertHow::Insert.returns_to_company());
    }

    #[test]
    fn earlier_is_better_for_first_leg_of_fixed_side() {
        let case = |what, direction| {
            InsertionCase::new(InsertHow::Insert, what, InsertWhere::BetweenEvents, direction).unwrap()
        };
        assert!(case(InsertWhat::BusStop, InsertDirection::FromBusStop).is_earlier_better());
        assert!(case(InsertWhat::UserChosen, InsertDirection::ToBusStop).is_earlier_better());
        assert!(!case(InsertWhat::BusStop, InsertDirection::ToBusStop).is_earlier_better());
        assert!(!case(InsertWhat::UserChosen, InsertDirection::FromBusStop).is_earlier_better());
    }

    #[test]
    fn slot_positions() {
        let mut vehicle = Vehicle::new(VehicleId(1), Capacities::new(3, 0, 0, 0), &[]);
        assert_eq!(InsertWhere::of_slot(&vehicle, 0), InsertWhere::BeforeFirstEvent);

        vehicle.events = vec![
            event(1, 1, true, at(9, 0)),
            event(2, 1, false, at(9, 30)),
            event(3, 2, true, at(11, 0)),
        ];
        assert_eq!(InsertWhere::of_slot(&vehicle, 0), InsertWhere::BeforeFirstEvent);
        assert_eq!(InsertWhere::of_slot(&vehicle, 1), InsertWhere::BetweenEvents);
        assert_eq!(InsertWhere::of_slot(&vehicle, 2), InsertWhere::BetweenTours);
        assert_eq!(InsertWhere::of_slot(&vehicle, 3), InsertWhere::AfterLastEvent);
    }

    #[test]
    fn with_what_keeps_slot() {
        let both = InsertionCase::new(
            InsertHow::Prepend,
            InsertWhat::Both,
            InsertWhere::BetweenTours,
            InsertDirection::ToBusStop,
        )
        .unwrap();
        assert!(both.with_what(InsertWhat::UserChosen).is_some());
        assert!(both.with_what(InsertWhat::BusStop).is_none());

        let fresh = InsertionCase::new_tour(InsertDirection::FromBusStop);
        assert_eq!(fresh.with_what(InsertWhat::Both), Some(fresh));
        assert!(fresh.with_what(InsertWhat::BusStop).is_none());
    }
}
