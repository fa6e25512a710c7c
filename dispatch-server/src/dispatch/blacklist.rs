//! Cheap viability check that runs before the whitelist.
//!
//! No routing is involved: a boarding point is viable when a company
//! serves it with a vehicle that fits the request and is available at
//! some point of the window. A `false` rules the point out; a `true` only
//! means the whitelist is worth asking.

use crate::domain::{Capacities, Company, Interval};

use super::capacity::is_valid;

/// Viability of each of `count` boarding points, by index.
pub fn viable_boarding_points(
    companies: &[Company],
    count: usize,
    required: &Capacities,
    window: &Interval,
) -> Vec<bool> {
    (0..count)
        .map(|b| {
            companies.iter().any(|company| {
                company.serves(b)
                    && company.vehicles.iter().any(|vehicle| {
                        is_valid(&vehicle.capacities, required)
                            && vehicle.availabilities.iter().any(|a| a.overlaps(window))
                    })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::fixtures::*;
    use crate::domain::{CompanyId, Vehicle, VehicleId};

    fn company(serves: Vec<bool>, capacity: i32, available: Interval) -> Company {
        Company {
            id: CompanyId(1),
            coordinates: coords(51.05, 13.74),
            vehicles: vec![Vehicle::new(
                VehicleId(1),
                Capacities::new(capacity, 0, 0, 0),
                &[available],
            )],
            serves_boarding_points: serves,
        }
    }

    #[test]
    fn zone_capacity_and_availability_all_count() {
        let morning = Interval::new(at(8, 0), at(12, 0));
        let one = Capacities::new(1, 0, 0, 0);
        let companies = vec![company(vec![true, false], 3, morning)];

        assert_eq!(
            viable_boarding_points(&companies, 2, &one, &Interval::new(at(9, 0), at(10, 0))),
            vec![true, false]
        );

        // ends as the window starts
        assert_eq!(
            viable_boarding_points(&companies, 2, &one, &Interval::new(at(12, 0), at(13, 0))),
            vec![false, false]
        );

        let four = Capacities::new(4, 0, 0, 0);
        assert_eq!(
            viable_boarding_points(&companies, 2, &four, &Interval::new(at(9, 0), at(10, 0))),
            vec![false, false]
        );
    }

    #[test]
    fn any_company_will_do() {
        let window = Interval::new(at(9, 0), at(10, 0));
        let companies = vec![
            company(vec![true, false], 3, Interval::new(at(14, 0), at(18, 0))),
            company(vec![false, true], 3, Interval::new(at(8, 0), at(12, 0))),
        ];
        assert_eq!(
            viable_boarding_points(&companies, 2, &Capacities::new(1, 0, 0, 0), &window),
            vec![false, true]
        );
        assert!(viable_boarding_points(&[], 0, &Capacities::new(1, 0, 0, 0), &window).is_empty());
    }
}
