//! The register of blood requests and their lifecycle.

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::NaiveDate;
use non_empty_string::NonEmptyString;
use tracing::instrument;

use crate::domain::{
    ids::Sequence, BloodRequest, BloodType, Error, Quantity, RequestId, RequestStatus, Result,
};

/// Holds every request ever raised, keyed by id.
///
/// The ledger enforces the status state machine but knows nothing about
/// stock.
#[derive(Debug)]
pub struct RequestLedger {
    requests: RwLock<BTreeMap<RequestId, BloodRequest>>,
    sequence: Sequence,
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self {
            requests: RwLock::default(),
            sequence: Sequence::new(),
        }
    }
}

impl RequestLedger {
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<RequestId, BloodRequest>> {
        self.requests.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<RequestId, BloodRequest>> {
        self.requests.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raises a new pending request and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyField`] if `requestor` is blank.
    #[instrument(level = "debug", skip(self))]
    pub fn create_request(
        &self,
        requestor: &str,
        blood_type: BloodType,
        quantity: Quantity,
        request_date: NaiveDate,
    ) -> Result<RequestId> {
        let requestor = NonEmptyString::new(requestor.trim().to_string())
            .map_err(|_| Error::EmptyField("requestor"))?;
        let id = RequestId::new(self.sequence.next());
        self.write().insert(
            id,
            BloodRequest {
                id,
                requestor,
                blood_type,
                quantity,
                request_date,
                status: RequestStatus::Pending,
            },
        );
        tracing::info!("Created request {id}: {quantity} of {blood_type} on {request_date}");
        Ok(id)
    }

    /// Inserts a request read back from persistence, keeping its id and
    /// status.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyField`] if `requestor` is blank.
    /// - [`Error::DuplicateRequest`] if the id is already in the ledger.
    pub fn load_request(
        &self,
        id: RequestId,
        requestor: &str,
        blood_type: BloodType,
        quantity: Quantity,
        request_date: NaiveDate,
        status: RequestStatus,
    ) -> Result<()> {
        let requestor = NonEmptyString::new(requestor.trim().to_string())
            .map_err(|_| Error::EmptyField("requestor"))?;
        let mut requests = self.write();
        if requests.contains_key(&id) {
            return Err(Error::DuplicateRequest(id));
        }
        self.sequence
            .observe(NonZeroUsize::new(id.get()).unwrap_or(NonZeroUsize::MIN));
        requests.insert(
            id,
            BloodRequest {
                id,
                requestor,
                blood_type,
                quantity,
                request_date,
                status,
            },
        );
        Ok(())
    }

    /// Moves a request to `status`.
    ///
    /// Only `Pending → Fulfilled` and `Pending → Cancelled` are allowed. The
    /// ledger does not check stock; fulfilment goes through the
    /// reconciliation engine.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestNotFound`] if no such request exists.
    /// - [`Error::IllegalStateTransition`] for any other transition,
    ///   including `Pending → Pending`.
    pub fn set_status(&self, id: RequestId, status: RequestStatus) -> Result<()> {
        let mut requests = self.write();
        let request = requests.get_mut(&id).ok_or(Error::RequestNotFound(id))?;
        if !request.status.can_transition_to(status) {
            return Err(Error::IllegalStateTransition {
                id,
                from: request.status,
                to: status,
            });
        }
        tracing::debug!("Request {id}: {} -> {status}", request.status);
        request.status = status;
        Ok(())
    }

    /// Looks up a request by id.
    #[must_use]
    pub fn find(&self, id: RequestId) -> Option<BloodRequest> {
        self.read().get(&id).cloned()
    }

    /// Requests in `status`, ordered by id.
    #[must_use]
    pub fn list_by_status(&self, status: RequestStatus) -> Vec<BloodRequest> {
        self.read()
            .values()
            .filter(|request| request.status == status)
            .cloned()
            .collect()
    }

    /// Requests raised by `requestor` (exact match after trimming), ordered
    /// by id.
    #[must_use]
    pub fn list_by_requestor(&self, requestor: &str) -> Vec<BloodRequest> {
        let requestor = requestor.trim();
        self.read()
            .values()
            .filter(|request| request.requestor.as_str() == requestor)
            .cloned()
            .collect()
    }

    /// Every request, ordered by id.
    #[must_use]
    pub fn list_all_requests(&self) -> Vec<BloodRequest> {
        self.read().values().cloned().collect()
    }

    /// Changes the blood type, quantity, or date of a pending request.
    ///
    /// Fields passed as `None` keep their current value.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestNotFound`] if no such request exists.
    /// - [`Error::RequestNotPending`] if the request is fulfilled or
    ///   cancelled.
    pub fn update_request(
        &self,
        id: RequestId,
        blood_type: Option<BloodType>,
        quantity: Option<Quantity>,
        request_date: Option<NaiveDate>,
    ) -> Result<BloodRequest> {
        let mut requests = self.write();
        let request = requests.get_mut(&id).ok_or(Error::RequestNotFound(id))?;
        if !request.is_pending() {
            return Err(Error::RequestNotPending {
                id,
                status: request.status,
            });
        }

        if let Some(blood_type) = blood_type {
            request.blood_type = blood_type;
        }
        if let Some(quantity) = quantity {
            request.quantity = quantity;
        }
        if let Some(request_date) = request_date {
            request.request_date = request_date;
        }
        tracing::info!("Updated request {id}");
        Ok(request.clone())
    }

    /// Removes a request from the ledger entirely, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestNotFound`] if no such request exists.
    pub fn delete_request(&self, id: RequestId) -> Result<BloodRequest> {
        let removed = self.write().remove(&id).ok_or(Error::RequestNotFound(id))?;
        tracing::info!("Deleted request {id}");
        Ok(removed)
    }

    /// Number of requests in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the ledger holds no requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The id the next created request will receive.
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        RequestId::new(self.sequence.peek())
    }

    /// Moves the id sequence forward so the next request receives at least
    /// `next`.
    pub fn restore_next_id(&self, next: RequestId) {
        self.sequence
            .advance_to(NonZeroUsize::new(next.get()).unwrap_or(NonZeroUsize::MIN));
    }
}
