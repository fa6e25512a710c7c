//! The dispatcher as the server uses it: snapshot, evaluate, commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::{Capacities, Company, Coordinates, Interval};
use crate::routing::RoutingProvider;
use crate::store::{BookingReceipt, BookingWriter, SnapshotQuery, SnapshotReader};

use super::DispatchError;
use super::blacklist::viable_boarding_points;
use super::booking::{BookedStops, BookingPlan, plan_booking};
use super::config::DispatchConfig;
use super::request::{
    BoardingPoint, DispatchRequest, PromisedTimes, evaluate_request, evaluation_interval,
    single_time,
};
use super::select::{CandidateGrid, Insertion};

/// Availability of a trip with a connection at either end.
#[derive(Debug, Clone, PartialEq)]
pub struct WhitelistRequest {
    pub start: Coordinates,
    pub target: Coordinates,
    /// Where the passenger could be dropped off to continue from `start`.
    pub start_bus_stops: Vec<BoardingPoint>,
    /// Where the passenger could be picked up to continue to `target`.
    pub target_bus_stops: Vec<BoardingPoint>,
    /// Candidate times for a taxi all the way from `start` to `target`.
    pub direct_times: Vec<DateTime<Utc>>,
    /// The direct times are departure times rather than arrival times.
    pub start_fixed: bool,
    pub required: Capacities,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhitelistResponse {
    pub start: Vec<Vec<Option<Insertion>>>,
    pub target: Vec<Vec<Option<Insertion>>>,
    pub direct: Vec<Option<Insertion>>,
}

/// A ride confirmed from an earlier whitelist answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingRequest {
    pub start: Coordinates,
    pub target: Coordinates,
    pub start_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
    /// `start` is a bus stop the passenger leaves at `start_time`, as on
    /// the last mile of a trip. Otherwise `target` is the fixed end.
    pub start_fixed: bool,
    pub required: Capacities,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingOutcome {
    pub receipt: BookingReceipt,
    pub insertion: Insertion,
}

/// Which boarding points are worth a whitelist request at all.
#[derive(Debug, Clone, PartialEq)]
pub struct BlacklistRequest {
    pub start: Coordinates,
    pub target: Coordinates,
    pub start_bus_stops: Vec<Coordinates>,
    pub target_bus_stops: Vec<Coordinates>,
    /// The direct ride is checked on the target side instead of the start
    /// side.
    pub start_fixed: bool,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub required: Capacities,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistResponse {
    pub start: Vec<bool>,
    pub target: Vec<bool>,
    pub direct: bool,
}

/// Evaluates requests against a store and commits the chosen ones.
pub struct DispatchService<S, R> {
    store: Arc<S>,
    router: Arc<R>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

impl<S, R> DispatchService<S, R>
where
    S: SnapshotReader + BookingWriter,
    R: RoutingProvider,
{
    pub fn new(store: Arc<S>, router: Arc<R>, clock: Arc<dyn Clock>, config: DispatchConfig) -> Self {
        Self {
            store,
            router,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the companies for `request`, as if `pending` were committed.
    /// The id is where the next commit continues when `pending` is not
    /// empty.
    async fn snapshot(
        &self,
        request: &DispatchRequest,
        search: Interval,
        pending: &[BookingPlan],
    ) -> Result<(Vec<Company>, Option<u64>), DispatchError> {
        let query = SnapshotQuery {
            user_chosen: request.user_chosen,
            bus_stops: request.boarding_points.iter().map(|b| b.coordinates).collect(),
            required: request.required,
            availability: search.expand(
                self.config.availability_horizon(),
                self.config.availability_horizon(),
            ),
            tours: evaluation_interval(search, &self.config),
        };
        if pending.is_empty() {
            return Ok((self.store.companies(&query).await?, None));
        }
        let staged = self.store.companies_after(&query, pending).await?;
        Ok((staged.companies, Some(staged.next_id)))
    }

    /// Validate, read a snapshot and evaluate one request.
    async fn evaluate(
        &self,
        request: &DispatchRequest,
        pending: &[BookingPlan],
    ) -> Result<(Vec<Company>, CandidateGrid, Option<u64>), DispatchError> {
        request.validate()?;
        let Some(search) = request.search_interval() else {
            return Ok((Vec::new(), CandidateGrid::new(&request.shape()), None));
        };
        let (companies, next_id) = self.snapshot(request, search, pending).await?;
        let grid = evaluate_request(
            &companies,
            evaluation_interval(search, &self.config),
            request,
            self.router.as_ref(),
            &self.config,
            self.clock.now(),
        )
        .await?;
        Ok((companies, grid, next_id))
    }

    /// Evaluate both ends of a trip, and the direct ride if asked for.
    pub async fn whitelist(&self, request: WhitelistRequest) -> Result<WhitelistResponse, DispatchError> {
        let mut start = DispatchRequest {
            user_chosen: request.start,
            boarding_points: request.start_bus_stops,
            required: request.required,
            start_fixed: false,
            promised: None,
        };
        let mut target = DispatchRequest {
            user_chosen: request.target,
            boarding_points: request.target_bus_stops,
            required: request.required,
            start_fixed: true,
            promised: None,
        };

        let with_direct = !request.direct_times.is_empty();
        if with_direct {
            if request.start_fixed {
                target.boarding_points.push(BoardingPoint {
                    coordinates: request.start,
                    times: request.direct_times,
                });
            } else {
                start.boarding_points.push(BoardingPoint {
                    coordinates: request.target,
                    times: request.direct_times,
                });
            }
        }

        let ((_, start_grid, _), (_, target_grid, _)) =
            try_join(self.evaluate(&start, &[]), self.evaluate(&target, &[])).await?;
        let mut start_cells = start_grid.into_cells();
        let mut target_cells = target_grid.into_cells();

        let direct = match (with_direct, request.start_fixed) {
            (false, _) => Vec::new(),
            (true, true) => target_cells.pop().unwrap_or_default(),
            (true, false) => start_cells.pop().unwrap_or_default(),
        };
        debug!(
            start = start_cells.iter().flatten().flatten().count(),
            target = target_cells.iter().flatten().flatten().count(),
            direct = direct.iter().flatten().count(),
            "whitelist answered"
        );

        Ok(WhitelistResponse {
            start: start_cells,
            target: target_cells,
            direct,
        })
    }

    /// Rule out boarding points nobody could serve, without routing.
    ///
    /// A point is viable if a company covering it and the user's own
    /// place has a vehicle that fits and is available somewhere between
    /// `earliest` (or the end of the preparation time) and `latest`.
    pub async fn blacklist(&self, request: BlacklistRequest) -> Result<BlacklistResponse, DispatchError> {
        if request.latest < request.earliest {
            return Err(DispatchError::invalid("latest", "latest is before earliest"));
        }
        let mut start_stops = request.start_bus_stops;
        let mut target_stops = request.target_bus_stops;
        if request.start_fixed {
            target_stops.push(request.start);
        } else {
            start_stops.push(request.target);
        }

        let searched = Interval::new(request.earliest, request.latest);
        let query = |user_chosen, bus_stops: &[Coordinates]| SnapshotQuery {
            user_chosen,
            bus_stops: bus_stops.to_vec(),
            required: request.required,
            availability: searched,
            tours: searched,
        };
        let start_query = query(request.start, &start_stops);
        let target_query = query(request.target, &target_stops);
        let (start_companies, target_companies) = try_join(
            self.store.companies(&start_query),
            self.store.companies(&target_query),
        )
        .await?;

        let earliest = request.earliest.max(self.clock.now() + self.config.min_prep());
        let viable = |companies: &[Company], count| match Interval::try_new(earliest, request.latest) {
            Ok(window) => viable_boarding_points(companies, count, &request.required, &window),
            Err(_) => vec![false; count],
        };
        let mut start = viable(&start_companies, start_stops.len());
        let mut target = viable(&target_companies, target_stops.len());
        let direct = if request.start_fixed {
            target.pop()
        } else {
            start.pop()
        };
        let direct = direct.unwrap_or(false);

        debug!(
            start = start.iter().filter(|v| **v).count(),
            target = target.iter().filter(|v| **v).count(),
            direct,
            "blacklist answered"
        );
        Ok(BlacklistResponse {
            start,
            target,
            direct,
        })
    }

    /// Evaluate one leg against the store with `pending` already applied
    /// and plan its best insertion.
    async fn plan_leg(
        &self,
        leg: &BookingRequest,
        pending: &[BookingPlan],
    ) -> Result<Option<(BookingPlan, Insertion)>, DispatchError> {
        if leg.target_time < leg.start_time {
            return Err(DispatchError::invalid("targetTime", "target time is before start time"));
        }
        let (user_chosen, boarding_point) = if leg.start_fixed {
            (leg.target, single_time(leg.start, leg.start_time))
        } else {
            (leg.start, single_time(leg.target, leg.target_time))
        };
        let dispatch = DispatchRequest {
            user_chosen,
            boarding_points: vec![boarding_point],
            required: leg.required,
            start_fixed: leg.start_fixed,
            promised: Some(PromisedTimes {
                pickup: leg.start_time,
                dropoff: leg.target_time,
            }),
        };
        let (companies, grid, next_id) = self.evaluate(&dispatch, pending).await?;
        let Some(best) = grid.get(0, 0).cloned() else {
            return Ok(None);
        };

        let vehicle = companies
            .get(best.company_idx)
            .and_then(|c| c.vehicles.iter().find(|v| v.id == best.vehicle));
        let Some(vehicle) = vehicle else {
            return Err(DispatchError::invalid("vehicle", "chosen vehicle missing from snapshot"));
        };
        let stops = BookedStops {
            pickup: leg.start,
            dropoff: leg.target,
        };
        let mut plan = plan_booking(&best, vehicle, stops, leg.required, self.router.as_ref()).await?;
        plan.ids_from = next_id;
        Ok(Some((plan, best)))
    }

    /// Evaluate a confirmed ride again and commit the best insertion.
    /// `Ok(None)` means nobody can serve it any more.
    pub async fn book(&self, request: BookingRequest) -> Result<Option<BookingOutcome>, DispatchError> {
        let outcomes = self.book_trip(std::slice::from_ref(&request)).await?;
        Ok(outcomes.and_then(|mut o| o.pop()))
    }

    /// Book the legs of one trip in order, each planned as if the earlier
    /// ones were already committed. Either every leg is booked or none;
    /// `Ok(None)` means some leg can no longer be served.
    pub async fn book_trip(
        &self,
        legs: &[BookingRequest],
    ) -> Result<Option<Vec<BookingOutcome>>, DispatchError> {
        let mut plans = Vec::with_capacity(legs.len());
        let mut insertions = Vec::with_capacity(legs.len());
        for (i, leg) in legs.iter().enumerate() {
            let Some((plan, insertion)) = self.plan_leg(leg, &plans).await? else {
                info!(leg = i, legs = legs.len(), "no vehicle can serve the booking");
                return Ok(None);
            };
            plans.push(plan);
            insertions.push(insertion);
        }

        match self.store.commit(plans).await {
            Ok(receipts) => {
                let outcomes = receipts
                    .into_iter()
                    .zip(insertions)
                    .map(|(receipt, insertion)| {
                        info!(
                            request = %receipt.request,
                            tour = %receipt.tour,
                            vehicle = %insertion.vehicle,
                            cost = insertion.cost.total,
                            "booked"
                        );
                        BookingOutcome { receipt, insertion }
                    })
                    .collect();
                Ok(Some(outcomes))
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(legs = legs.len(), error = %e, "booking lost a race, evaluate again");
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::dispatch::InsertHow;
    use crate::dispatch::matrix::mock::{TableRouting, uniform};
    use crate::domain::event::fixtures::*;
    use crate::domain::{RequestId, TourId, VehicleId};
    use crate::routing::Direction;
    use crate::store::{Bucket, BucketState, MemoryStore, Records};
    use crate::store::memory::fixtures::{booked, dresden};

    fn service<R: RoutingProvider>(records: Records, router: R) -> DispatchService<MemoryStore, R> {
        DispatchService::new(
            Arc::new(MemoryStore::new(records)),
            Arc::new(router),
            Arc::new(FixedClock::new(at(6, 0))),
            DispatchConfig::default(),
        )
    }

    fn a() -> Coordinates {
        coords(51.06, 13.75)
    }

    fn b() -> Coordinates {
        coords(51.07, 13.76)
    }

    fn c() -> Coordinates {
        coords(51.08, 13.77)
    }

    #[tokio::test]
    async fn booking_on_an_empty_fleet_opens_a_tour() {
        let service = service(dresden(), uniform(10));
        let outcome = service
            .book(BookingRequest {
                start: a(),
                target: b(),
                start_time: at(9, 44),
                target_time: at(10, 0),
                start_fixed: false,
                required: Capacities::new(1, 0, 0, 0),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.insertion.pickup_case.how(), InsertHow::NewTour);
        assert_eq!(outcome.insertion.dropoff_time, at(10, 0));
        let records = service.store().records().await;
        assert_eq!(records.tours.len(), 1);
        assert_eq!(records.events.len(), 2);
    }

    #[tokio::test]
    async fn booking_rejects_broken_promises() {
        let service = service(dresden(), uniform(10));
        let err = service
            .book(BookingRequest {
                start: a(),
                target: b(),
                start_time: at(10, 0),
                target_time: at(9, 0),
                start_fixed: false,
                required: Capacities::new(1, 0, 0, 0),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest { .. }));

        // a promised pickup the ride cannot keep
        let outcome = service
            .book(BookingRequest {
                start: a(),
                target: b(),
                start_time: at(9, 0),
                target_time: at(10, 0),
                start_fixed: false,
                required: Capacities::new(1, 0, 0, 0),
            })
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn appending_from_the_previous_destination_continues_the_tour() {
        let mut records = dresden();
        booked(&mut records, 1, 1, (a(), at(9, 0)), (b(), at(9, 16)));
        let router = TableRouting::new(|x: Coordinates, y: Coordinates, _| {
            Some(if x.same_place(&y) { 0 } else { 10 })
        });
        let service = service(records, router);

        let outcome = service
            .book(BookingRequest {
                start: b(),
                target: c(),
                start_time: at(9, 30),
                target_time: at(9, 46),
                start_fixed: false,
                required: Capacities::new(1, 0, 0, 0),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.insertion.pickup_case.how(), InsertHow::Append);
        assert_eq!(outcome.receipt.tour, TourId(1));

        let records = service.store().records().await;
        assert_eq!(records.tours.len(), 1);
        assert_eq!(records.tours[0].departure, at(8, 50));
        assert!(records.tours[0].arrival > at(9, 46));
        let mut groups: Vec<&str> = records.events.iter().map(|e| e.event_group.as_str()).collect();
        groups.sort_unstable();
        groups.dedup();
        assert_eq!(groups.len(), 3);
    }

    #[tokio::test]
    async fn booking_between_two_tours_connects_them() {
        let mut records = dresden();
        booked(&mut records, 1, 1, (a(), at(9, 0)), (b(), at(9, 16)));
        booked(&mut records, 2, 2, (c(), at(10, 30)), (a(), at(10, 46)));
        let router = TableRouting::new(|x: Coordinates, y: Coordinates, _| {
            Some(if x.same_place(&y) { 0 } else { 10 })
        });
        let service = service(records, router);

        let outcome = service
            .book(BookingRequest {
                start: b(),
                target: c(),
                start_time: at(9, 44),
                target_time: at(10, 0),
                start_fixed: false,
                required: Capacities::new(1, 0, 0, 0),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.insertion.pickup_case.how(), InsertHow::Connect);
        assert_eq!(outcome.insertion.pickup_time, at(9, 44));

        let records = service.store().records().await;
        let active: Vec<_> = records.tours.iter().filter(|t| !t.cancelled).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, outcome.receipt.tour);
        assert_eq!(active[0].departure, at(8, 50));
        assert_eq!(active[0].arrival, at(10, 56));
        assert!(records.requests.iter().all(|r| r.tour == outcome.receipt.tour));
    }

    #[tokio::test]
    async fn whitelist_splits_off_the_direct_ride() {
        let service = service(dresden(), uniform(10));
        let response = service
            .whitelist(WhitelistRequest {
                start: a(),
                target: c(),
                start_bus_stops: vec![single_time(b(), at(10, 0))],
                target_bus_stops: vec![single_time(b(), at(11, 0)), single_time(b(), at(12, 0))],
                direct_times: vec![at(10, 0), at(10, 30)],
                start_fixed: false,
                required: Capacities::new(1, 0, 0, 0),
            })
            .await
            .unwrap();

        assert_eq!(response.start.len(), 1);
        assert_eq!(response.target.len(), 2);
        assert_eq!(response.direct.len(), 2);
        assert!(response.direct.iter().all(Option::is_some));
        assert!(response.start[0][0].is_some());
        // the target side departs from the boarding point at its time
        let from_stop = response.target[0][0].as_ref().unwrap();
        assert_eq!(from_stop.pickup_time, at(11, 0));
    }

    #[tokio::test]
    async fn cancelled_request_frees_the_vehicle() {
        let mut records = dresden();
        booked(&mut records, 1, 1, (a(), at(9, 0)), (b(), at(9, 30)));
        let service = service(records, uniform(10));
        service.store().cancel_request(RequestId(1)).await.unwrap();

        let response = service
            .whitelist(WhitelistRequest {
                start: a(),
                target: b(),
                start_bus_stops: vec![],
                target_bus_stops: vec![],
                direct_times: vec![at(9, 30)],
                start_fixed: false,
                required: Capacities::new(3, 0, 0, 0),
            })
            .await
            .unwrap();
        let direct = response.direct[0].as_ref().unwrap();
        assert_eq!(direct.pickup_case.how(), InsertHow::NewTour);
    }

    fn leg(
        (start, start_time): (Coordinates, DateTime<Utc>),
        (target, target_time): (Coordinates, DateTime<Utc>),
        start_fixed: bool,
    ) -> BookingRequest {
        BookingRequest {
            start,
            target,
            start_time,
            target_time,
            start_fixed,
            required: Capacities::new(1, 0, 0, 0),
        }
    }

    #[tokio::test]
    async fn last_mile_leaves_the_bus_stop_on_time() {
        let service = service(dresden(), uniform(10));
        let outcome = service
            .book(leg((b(), at(10, 0)), (a(), at(10, 16)), true))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.insertion.pickup_case.how(), InsertHow::NewTour);
        assert_eq!(outcome.insertion.pickup_time, at(10, 0));
        assert_eq!(outcome.insertion.dropoff_time, at(10, 16));

        let records = service.store().records().await;
        let pickup = records.events.iter().find(|e| e.is_pickup).unwrap();
        assert!(pickup.coordinates.same_place(&b()));
        assert_eq!(pickup.communicated, at(10, 0));
    }

    #[tokio::test]
    async fn both_legs_of_a_trip_share_the_vehicle() {
        let router = TableRouting::new(|x: Coordinates, y: Coordinates, _| {
            Some(if x.same_place(&y) { 0 } else { 10 })
        });
        let service = service(dresden(), router);
        let legs = [
            leg((a(), at(9, 44)), (b(), at(10, 0)), false),
            leg((b(), at(11, 0)), (c(), at(11, 16)), true),
        ];

        let outcomes = service.book_trip(&legs).await.unwrap().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].insertion.pickup_case.how(), InsertHow::NewTour);
        // the second leg sees the first one and continues its tour from b
        assert_eq!(outcomes[1].insertion.pickup_case.how(), InsertHow::Append);
        assert_eq!(outcomes[1].insertion.pickup_time, at(11, 0));
        assert!((outcomes[1].insertion.cost.total - 2640.0).abs() < 1e-6);
        assert_eq!(outcomes[0].receipt.tour, outcomes[1].receipt.tour);

        let records = service.store().records().await;
        assert_eq!(records.tours.len(), 1);
        assert_eq!(records.requests.len(), 2);
        assert_eq!(records.events.len(), 4);
        assert_eq!(records.tours[0].departure, at(9, 30));
        assert_eq!(records.tours[0].arrival, at(11, 32));
        assert_eq!(records.vehicles[0].revision, 2);
    }

    #[tokio::test]
    async fn trip_with_an_unservable_leg_books_nothing() {
        let service = service(dresden(), uniform(10));
        let legs = [
            leg((a(), at(9, 44)), (b(), at(10, 0)), false),
            // after the vehicle's shift
            leg((b(), at(21, 0)), (c(), at(21, 16)), true),
        ];

        assert!(service.book_trip(&legs).await.unwrap().is_none());
        let records = service.store().records().await;
        assert!(records.tours.is_empty());
        assert!(records.events.is_empty());
        assert_eq!(records.vehicles[0].revision, 0);
    }

    #[tokio::test]
    async fn booking_shows_up_in_the_timeline() {
        let mut records = dresden();
        records.vehicles[0].availabilities = vec![Interval::new(at(4, 0), at(19, 45))];
        let depot = coords(51.05, 13.74);
        // 14 minutes out of the depot, 15 back, 30 between a and c
        let router = TableRouting::new(move |one: Coordinates, other: Coordinates, direction| {
            let (from, to) = match direction {
                Direction::Forward => (one, other),
                Direction::Backward => (other, one),
            };
            Some(if from.same_place(&to) {
                0
            } else if from.same_place(&depot) {
                14
            } else if to.same_place(&depot) {
                15
            } else {
                30
            })
        });
        let service = service(records, router);

        // a 36-minute ride; the tour leaves at 08:48 and is back at 10:03
        let outcome = service
            .book(leg((a(), at(9, 6)), (c(), at(9, 42)), false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.insertion.pickup_case.how(), InsertHow::NewTour);
        assert_eq!(outcome.insertion.pickup_time, at(9, 6));
        assert_eq!(outcome.insertion.dropoff_time, at(9, 42));
        assert_eq!(outcome.insertion.scheduled_pickup, Interval::new(at(8, 56), at(9, 6)));
        assert_eq!(outcome.insertion.scheduled_dropoff, Interval::point(at(9, 42)));

        let records = service.store().records().await;
        assert_eq!(records.tours[0].departure, at(8, 48));
        assert_eq!(records.tours[0].arrival, at(10, 3));

        let range = Interval::new(at(8, 30), at(10, 30));
        let quarter = chrono::Duration::minutes(15);
        let states = |buckets: Vec<Bucket>| buckets.iter().map(|b| b.state).collect::<Vec<_>>();
        use BucketState::{Busy, Free, Reserved};
        assert_eq!(
            states(service.store().timeline(VehicleId(1), range, quarter).await),
            vec![
                Free,     // 08:30
                Busy,     // 08:45, picked up from 08:56
                Busy,     // 09:00
                Busy,     // 09:15
                Busy,     // 09:30, dropped off at 09:42
                Reserved, // 09:45
                Reserved, // 10:00, back at the depot at 10:03
                Free,     // 10:15
            ]
        );

        service.store().cancel_request(outcome.receipt.request).await.unwrap();
        let after = states(service.store().timeline(VehicleId(1), range, quarter).await);
        assert!(after.iter().all(|s| *s == Free));
    }

    fn blacklist_request(passengers: i32) -> BlacklistRequest {
        BlacklistRequest {
            start: a(),
            target: c(),
            start_bus_stops: vec![b(), coords(52.52, 13.40)],
            target_bus_stops: vec![b()],
            start_fixed: false,
            earliest: at(8, 0),
            latest: at(12, 0),
            required: Capacities::new(passengers, 0, 0, 0),
        }
    }

    #[tokio::test]
    async fn blacklist_checks_zone_and_capacity_without_routing() {
        // every routing call fails the test
        let router = TableRouting::new(|_: Coordinates, _: Coordinates, _| -> Option<i64> {
            panic!("blacklist must not route")
        });
        let service = service(dresden(), router);

        let response = service.blacklist(blacklist_request(1)).await.unwrap();
        assert_eq!(
            response,
            BlacklistResponse {
                start: vec![true, false],
                target: vec![true],
                direct: true,
            }
        );

        let response = service.blacklist(blacklist_request(4)).await.unwrap();
        assert_eq!(
            response,
            BlacklistResponse {
                start: vec![false, false],
                target: vec![false],
                direct: false,
            }
        );

        let mut late = blacklist_request(1);
        late.earliest = at(21, 0);
        late.latest = at(22, 0);
        let response = service.blacklist(late).await.unwrap();
        assert!(!response.direct);
        assert_eq!(response.target, vec![false]);

        let mut reversed = blacklist_request(1);
        reversed.latest = at(7, 0);
        let err = service.blacklist(reversed).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest { ref field, .. } if field == "latest"));
    }
}
