use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{NaiveDate, Utc};

use super::domain::{
    Application, ApplicationForm, ApplicationId, ApplicationStatus, CompanyId, ConnectionId,
    DataRequirement,
};

/// Storage abstraction so the orchestrator can be exercised in isolation.
///
/// Every mutation is atomic per application id: implementations must not lose a concurrent
/// change made to the same record. No transition rules are enforced here.
pub trait ApplicationStore: Send + Sync {
    fn create(
        &self,
        id: ApplicationId,
        company_id: CompanyId,
    ) -> Result<Application, StoreError>;
    fn get(&self, id: ApplicationId) -> Result<Application, StoreError>;
    fn get_by_company_id(&self, company_id: CompanyId) -> Result<Application, StoreError>;
    fn set_form(&self, id: ApplicationId, form: ApplicationForm) -> Result<(), StoreError>;
    fn set_accounting_connection(
        &self,
        company_id: CompanyId,
        connection_id: ConnectionId,
    ) -> Result<(), StoreError>;
    fn update_status(&self, id: ApplicationId, status: ApplicationStatus)
        -> Result<(), StoreError>;
    /// Writes `status` only while the record still holds `expected`; reports whether it did.
    fn compare_and_set_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        status: ApplicationStatus,
    ) -> Result<bool, StoreError>;
    fn add_fulfilled_requirement(
        &self,
        id: ApplicationId,
        requirement: DataRequirement,
    ) -> Result<(), StoreError>;
    fn add_fulfilled_requirement_for_company(
        &self,
        company_id: CompanyId,
        requirement: DataRequirement,
    ) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("an application already exists with id {0}")]
    Conflict(ApplicationId),
    #[error("codat company {0} is already linked to an application")]
    CompanyConflict(CompanyId),
    #[error("no application exists with id {0}")]
    NotFound(ApplicationId),
    #[error("no application exists for codat company id {0}")]
    CompanyNotFound(CompanyId),
    #[error("codat company {company_id} already uses accounting connection {existing}")]
    ConnectionConflict {
        company_id: CompanyId,
        existing: ConnectionId,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::CompanyNotFound(_))
    }
}

type Slot = Arc<Mutex<Application>>;

#[derive(Default)]
struct Index {
    records: HashMap<ApplicationId, Slot>,
    companies: HashMap<CompanyId, ApplicationId>,
}

/// Process-local store with one lock per application.
///
/// The index lock is only held to find or insert a slot; record mutation happens under the
/// slot's own mutex, so unrelated applications never wait on each other.
#[derive(Default)]
pub struct InMemoryApplicationStore {
    index: RwLock<Index>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record dated `date_created` instead of today.
    pub fn create_dated(
        &self,
        id: ApplicationId,
        company_id: CompanyId,
        date_created: NaiveDate,
    ) -> Result<Application, StoreError> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if index.records.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        if index.companies.contains_key(&company_id) {
            return Err(StoreError::CompanyConflict(company_id));
        }

        let application = Application::new(id, company_id, date_created);
        index
            .records
            .insert(id, Arc::new(Mutex::new(application.clone())));
        index.companies.insert(company_id, id);
        Ok(application)
    }

    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: ApplicationId) -> Result<Slot, StoreError> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn application_id_for(&self, company_id: CompanyId) -> Result<ApplicationId, StoreError> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index
            .companies
            .get(&company_id)
            .copied()
            .ok_or(StoreError::CompanyNotFound(company_id))
    }

    /// Read the full record, apply one change, replace the record.
    fn modify<T>(
        &self,
        id: ApplicationId,
        change: impl FnOnce(&mut Application) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let slot = self.slot(id)?;
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        let result = change(&mut next)?;
        *current = next;
        Ok(result)
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn create(
        &self,
        id: ApplicationId,
        company_id: CompanyId,
    ) -> Result<Application, StoreError> {
        self.create_dated(id, company_id, Utc::now().date_naive())
    }

    fn get(&self, id: ApplicationId) -> Result<Application, StoreError> {
        let slot = self.slot(id)?;
        let record = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(record.clone())
    }

    fn get_by_company_id(&self, company_id: CompanyId) -> Result<Application, StoreError> {
        let id = self.application_id_for(company_id)?;
        self.get(id)
    }

    fn set_form(&self, id: ApplicationId, form: ApplicationForm) -> Result<(), StoreError> {
        self.modify(id, |application| {
            application.form = Some(form);
            Ok(())
        })
    }

    fn set_accounting_connection(
        &self,
        company_id: CompanyId,
        connection_id: ConnectionId,
    ) -> Result<(), StoreError> {
        let id = self.application_id_for(company_id)?;
        self.modify(id, |application| match application.accounting_connection {
            Some(existing) if existing != connection_id => Err(StoreError::ConnectionConflict {
                company_id,
                existing,
            }),
            _ => {
                application.accounting_connection = Some(connection_id);
                Ok(())
            }
        })
    }

    fn update_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), StoreError> {
        self.modify(id, |application| {
            application.status = status;
            Ok(())
        })
    }

    fn compare_and_set_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        status: ApplicationStatus,
    ) -> Result<bool, StoreError> {
        self.modify(id, |application| {
            if application.status != expected {
                return Ok(false);
            }
            application.status = status;
            Ok(true)
        })
    }

    fn add_fulfilled_requirement(
        &self,
        id: ApplicationId,
        requirement: DataRequirement,
    ) -> Result<(), StoreError> {
        self.modify(id, |application| {
            application.requirements.insert(requirement);
            Ok(())
        })
    }

    fn add_fulfilled_requirement_for_company(
        &self,
        company_id: CompanyId,
        requirement: DataRequirement,
    ) -> Result<(), StoreError> {
        let id = self.application_id_for(company_id)?;
        self.add_fulfilled_requirement(id, requirement)
    }
}
