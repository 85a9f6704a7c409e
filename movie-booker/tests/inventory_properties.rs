//! Property-based tests for the seat inventory

use std::collections::BTreeSet;

use movie_booker::inventory::{Inventory, MovieBooker, SEATS_PER_SHOWING};
use proptest::prelude::*;

fn theater_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Z][a-z]{0,6}", 1..5)
}

fn seat_set() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(1..=SEATS_PER_SHOWING, 1..=SEATS_PER_SHOWING as usize)
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

/// Property: theaters for a movie are the union of every add, however often repeated
#[test]
fn prop_theaters_are_union_of_adds() {
    proptest!(|(batches in prop::collection::vec(theater_names(), 1..5))| {
        let inventory = Inventory::new();
        let mut expected = BTreeSet::new();

        for batch in &batches {
            inventory.add_movie("Feature", &as_strs(batch))?;
            expected.extend(batch.iter().cloned());
        }

        let theaters: BTreeSet<String> =
            inventory.theaters_for_movie("Feature").into_iter().collect();
        prop_assert_eq!(theaters, expected);
    });
}

/// Property: booking free seats removes exactly those seats
#[test]
fn prop_booking_removes_exactly_requested_seats() {
    proptest!(|(seats in seat_set())| {
        let inventory = Inventory::new();
        inventory.add_movie("M", &["T"])?;
        let request: Vec<u32> = seats.iter().copied().collect();

        inventory.book_seats("T", "M", &request)?;

        let free = inventory.free_seats("T", "M");
        prop_assert_eq!(free.len(), SEATS_PER_SHOWING as usize - request.len());
        prop_assert!(free.iter().all(|seat| !seats.contains(seat)));
        prop_assert!(free.windows(2).all(|pair| pair[0] < pair[1]));
    });
}

/// Property: any request touching a booked seat fails and changes nothing
#[test]
fn prop_rebooking_is_all_or_nothing() {
    proptest!(|(first in seat_set(), extra in seat_set(), pick in any::<prop::sample::Index>())| {
        let inventory = Inventory::new();
        inventory.add_movie("M", &["T"])?;
        let first: Vec<u32> = first.into_iter().collect();
        inventory.book_seats("T", "M", &first)?;
        let before = inventory.free_seats("T", "M");

        let mut second = extra;
        second.insert(*pick.get(&first));
        let result = inventory.book_seats("T", "M", &second.into_iter().collect::<Vec<_>>());

        prop_assert!(result.is_err());
        prop_assert_eq!(inventory.free_seats("T", "M"), before);
    });
}

/// Property: seat ids 0 and 21 are rejected whatever else is booked
#[test]
fn prop_out_of_range_seats_always_rejected() {
    proptest!(|(
        booked in prop::collection::btree_set(1..=SEATS_PER_SHOWING, 0..10),
        bad in prop::sample::select(vec![0u32, SEATS_PER_SHOWING + 1])
    )| {
        let inventory = Inventory::new();
        inventory.add_movie("M", &["T"])?;
        if !booked.is_empty() {
            inventory.book_seats("T", "M", &booked.iter().copied().collect::<Vec<_>>())?;
        }
        let before = inventory.free_seats("T", "M");

        prop_assert!(inventory.book_seats("T", "M", &[bad]).is_err());
        prop_assert_eq!(inventory.free_seats("T", "M"), before);
    });
}

/// Property: bookings in one showing never show up in another
#[test]
fn prop_showings_are_isolated() {
    proptest!(|(seats in seat_set())| {
        let inventory = Inventory::new();
        inventory.add_movie("A", &["Shared", "Other"])?;
        inventory.add_movie("B", &["Shared"])?;

        inventory.book_seats("Shared", "A", &seats.iter().copied().collect::<Vec<_>>())?;

        let untouched: Vec<u32> = (1..=SEATS_PER_SHOWING).collect();
        prop_assert_eq!(inventory.free_seats("Shared", "B"), untouched.clone());
        prop_assert_eq!(inventory.free_seats("Other", "A"), untouched);
    });
}
