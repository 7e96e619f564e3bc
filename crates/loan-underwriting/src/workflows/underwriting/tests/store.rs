use super::common::form;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::workflows::underwriting::domain::{
    ApplicationId, ApplicationStatus, CompanyId, ConnectionId, DataRequirement,
};
use crate::workflows::underwriting::store::{
    ApplicationStore, InMemoryApplicationStore, StoreError,
};

fn seeded() -> (InMemoryApplicationStore, ApplicationId, CompanyId) {
    let store = InMemoryApplicationStore::new();
    let id = ApplicationId::generate();
    let company = CompanyId(Uuid::new_v4());
    store.create(id, company).expect("created");
    (store, id, company)
}

#[test]
fn duplicate_ids_fail_without_touching_existing_record() {
    let (store, id, company) = seeded();
    store.set_form(id, form()).expect("form stored");
    let before = store.get(id).expect("present");

    assert_eq!(
        store.create(id, CompanyId(Uuid::new_v4())),
        Err(StoreError::Conflict(id))
    );
    assert_eq!(
        store.create(ApplicationId::generate(), company),
        Err(StoreError::CompanyConflict(company))
    );
    assert_eq!(store.get(id).expect("present"), before);
    assert_eq!(store.len(), 1);
}

#[test]
fn lookups_report_missing_records() {
    let store = InMemoryApplicationStore::new();
    let id = ApplicationId::generate();
    let company = CompanyId(Uuid::new_v4());

    assert_eq!(store.get(id), Err(StoreError::NotFound(id)));
    assert_eq!(
        store.get_by_company_id(company),
        Err(StoreError::CompanyNotFound(company))
    );
    assert!(store
        .update_status(id, ApplicationStatus::Accepted)
        .expect_err("missing")
        .is_not_found());
}

#[test]
fn create_dated_keeps_given_date() {
    let store = InMemoryApplicationStore::new();
    let date = NaiveDate::from_ymd_opt(2024, 11, 30).expect("valid date");
    let created = store
        .create_dated(ApplicationId::generate(), CompanyId(Uuid::new_v4()), date)
        .expect("created");

    assert_eq!(created.date_created, date);
    assert_eq!(created.status, ApplicationStatus::Started);
}

#[test]
fn requirements_are_idempotent_and_never_shrink() {
    let (store, id, company) = seeded();

    store
        .add_fulfilled_requirement(id, DataRequirement::BalanceSheet)
        .expect("added");
    store
        .add_fulfilled_requirement_for_company(company, DataRequirement::BalanceSheet)
        .expect("added again");
    store
        .add_fulfilled_requirement_for_company(company, DataRequirement::ChartOfAccounts)
        .expect("added");

    let stored = store.get(id).expect("present");
    assert_eq!(stored.requirements.len(), 2);
    assert!(stored.has_fulfilled(DataRequirement::BalanceSheet));
    assert!(stored.has_fulfilled(DataRequirement::ChartOfAccounts));
}

#[test]
fn concurrent_requirement_additions_are_not_lost() {
    let (store, id, _) = seeded();
    let store = Arc::new(store);

    std::thread::scope(|scope| {
        for requirement in DataRequirement::ALL {
            let store = store.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    store
                        .add_fulfilled_requirement(id, requirement)
                        .expect("added");
                    store.set_form(id, form()).expect("form stored");
                }
            });
        }
    });

    let stored = store.get(id).expect("present");
    assert!(stored.requirements_met());
    assert_eq!(stored.requirements.len(), DataRequirement::ALL.len());
}

#[test]
fn compare_and_set_only_applies_from_expected_status() {
    let (store, id, _) = seeded();

    assert!(!store
        .compare_and_set_status(
            id,
            ApplicationStatus::DataCollectionComplete,
            ApplicationStatus::Underwriting
        )
        .expect("checked"));
    assert_eq!(store.get(id).expect("present").status, ApplicationStatus::Started);

    assert!(store
        .compare_and_set_status(id, ApplicationStatus::Started, ApplicationStatus::CollectingData)
        .expect("checked"));
    assert_eq!(
        store.get(id).expect("present").status,
        ApplicationStatus::CollectingData
    );
}

#[test]
fn only_one_concurrent_claim_wins() {
    let (store, id, _) = seeded();
    store
        .update_status(id, ApplicationStatus::DataCollectionComplete)
        .expect("updated");
    let store = Arc::new(store);

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                scope.spawn(move || {
                    store
                        .compare_and_set_status(
                            id,
                            ApplicationStatus::DataCollectionComplete,
                            ApplicationStatus::Underwriting,
                        )
                        .expect("checked")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| usize::from(handle.join().expect("thread finished")))
            .sum()
    });

    assert_eq!(winners, 1);
}

#[test]
fn accounting_connection_is_set_once() {
    let (store, id, company) = seeded();
    let first = ConnectionId(Uuid::new_v4());

    store
        .set_accounting_connection(company, first)
        .expect("set");
    store
        .set_accounting_connection(company, first)
        .expect("same connection again");
    assert_eq!(
        store.set_accounting_connection(company, ConnectionId(Uuid::new_v4())),
        Err(StoreError::ConnectionConflict {
            company_id: company,
            existing: first
        })
    );
    assert_eq!(
        store.get(id).expect("present").accounting_connection,
        Some(first)
    );
}

#[test]
fn update_status_overwrites_without_validation() {
    let (store, id, _) = seeded();

    store
        .update_status(id, ApplicationStatus::Rejected)
        .expect("updated");
    store
        .update_status(id, ApplicationStatus::Started)
        .expect("updated");

    assert_eq!(store.get(id).expect("present").status, ApplicationStatus::Started);
}
