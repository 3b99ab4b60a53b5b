//! Contract Test: Listing
//!
//! Constraints verified:
//! - A listing is finite and restartable; each call sees the current store
//! - The child-is-null filter returns exactly the details without a candidate
//! - Sorted listings order by sortable properties and reject others
//!
//! If this test fails, clients see stale, partial or misordered collections.

mod common;

use common::*;
use roster_core::error::ErrorKey;
use roster_core::model::{EmployeeDetails, Entity};
use roster_core::model::employee_details::CHILD_IS_NULL;
use roster_core::{Candidate, Sort};
use tokio_stream::StreamExt;
use tokio_test::{assert_err, assert_ok};

async fn all_candidates(roster: &roster_core::Roster) -> Vec<Candidate> {
    let stream = assert_ok!(roster.candidates().list(None).await);
    stream.map(Result::unwrap).collect().await
}

#[tokio::test]
async fn listing_is_restartable() {
    let (roster, _rx) = memory_roster();
    create_candidate(&roster, "Ann").await;
    create_candidate(&roster, "Bob").await;

    assert_eq!(all_candidates(&roster).await.len(), 2);
    create_candidate(&roster, "Cid").await;
    assert_eq!(all_candidates(&roster).await.len(), 3);
}

#[tokio::test]
async fn child_is_null_filter_excludes_owners() {
    let (roster, _rx) = memory_roster();
    let owner = create_details(&roster).await;
    let free = create_details(&roster).await;
    let candidate = create_candidate(&roster, "Ann").await;
    link(&roster, &owner, &candidate).await;

    let filter = EmployeeDetails::named_filter(CHILD_IS_NULL).expect("known filter");
    let stream = assert_ok!(roster.employee_details().list(Some(filter)).await);
    let found: Vec<EmployeeDetails> = stream.map(Result::unwrap).collect().await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), free.id());
}

#[tokio::test]
async fn empty_collection_lists_nothing() {
    let (roster, _rx) = memory_roster();
    assert!(all_candidates(&roster).await.is_empty());
    assert_eq!(assert_ok!(roster.employee_details().count().await), 0);
}

#[tokio::test]
async fn sorted_listing_orders_by_property() {
    let (roster, _rx) = memory_roster();
    for login in ["carol", "alice", "bob"] {
        assert_ok!(
            roster
                .candidates()
                .create(Candidate::new(login.to_uppercase()).with_login(login))
                .await
        );
    }

    let sort = assert_ok!(Sort::parse::<Candidate>("login,desc"));
    let sorted = assert_ok!(roster.candidates().list_sorted(None, &sort).await);
    let logins: Vec<_> = sorted.iter().filter_map(|c| c.login.as_deref()).collect();
    assert_eq!(logins, vec!["carol", "bob", "alice"]);
}

#[tokio::test]
async fn sorting_by_unknown_property_is_sortinvalid() {
    let (roster, _rx) = memory_roster();

    let err = assert_err!(
        roster
            .employee_details()
            .list_sorted(None, &Sort::asc("salary"))
            .await
    );
    assert_eq!(err.key(), Some(ErrorKey::SortInvalid));
}
