//! Couples stock and requests.
//!
//! [`ReconciliationEngine`] is the only place where an inventory mutation and
//! a ledger mutation happen as one step. It borrows both stores, so any
//! number of engines (one per thread, say) can work on the same stores.
//!
//! Every operation on an existing request locks the shelf of that request's
//! blood type before checking the request's state, and keeps it locked until
//! all changes are applied. Fulfilment, cancellation, editing, and purging of
//! one blood type therefore never interleave.

use chrono::NaiveDate;
use tracing::instrument;

use crate::domain::{
    inventory::{Allocation, Draw, PurgeReport, Shelf},
    BloodRequest, BloodType, Error, InventoryStore, Quantity, RequestId, RequestLedger,
    RequestStatus, Result, UnitId,
};

/// A successful fulfilment: which request was served and from which units.
///
/// The receipt is handed back to the caller and is not retained anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfilment {
    request: RequestId,
    allocation: Allocation,
}

impl Fulfilment {
    /// The fulfilled request.
    #[must_use]
    pub const fn request(&self) -> RequestId {
        self.request
    }

    /// The blood type supplied.
    #[must_use]
    pub const fn blood_type(&self) -> BloodType {
        self.allocation.blood_type()
    }

    /// The amount supplied.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.allocation.requested()
    }

    /// Units drawn from, oldest donation first.
    #[must_use]
    pub fn draws(&self) -> &[Draw] {
        self.allocation.draws()
    }
}

/// Orchestrates an [`InventoryStore`] and a [`RequestLedger`].
///
/// Inputs arriving as raw text or signed integers are validated here before
/// any state is touched.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine<'a> {
    inventory: &'a InventoryStore,
    ledger: &'a RequestLedger,
}

impl<'a> ReconciliationEngine<'a> {
    /// Creates an engine over the given stores.
    #[must_use]
    pub const fn new(inventory: &'a InventoryStore, ledger: &'a RequestLedger) -> Self {
        Self { inventory, ledger }
    }

    /// The stock this engine draws from.
    #[must_use]
    pub const fn inventory(&self) -> &'a InventoryStore {
        self.inventory
    }

    /// The requests this engine serves.
    #[must_use]
    pub const fn ledger(&self) -> &'a RequestLedger {
        self.ledger
    }

    /// Records a donation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBloodType`] if `blood_type` is not a known code.
    /// - [`Error::InvalidQuantity`] if `quantity` is not positive.
    pub fn add_unit(
        &self,
        blood_type: &str,
        quantity: i64,
        donation_date: NaiveDate,
        donor: Option<&str>,
    ) -> Result<UnitId> {
        let blood_type = BloodType::normalize(blood_type)?;
        let quantity = Quantity::new(quantity)?;
        Ok(self
            .inventory
            .add_unit(blood_type, quantity, donation_date, donor))
    }

    /// Raises a new pending request.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBloodType`] if `blood_type` is not a known code.
    /// - [`Error::InvalidQuantity`] if `quantity` is not positive.
    /// - [`Error::EmptyField`] if `requestor` is blank.
    pub fn add_request(
        &self,
        requestor: &str,
        blood_type: &str,
        quantity: i64,
        request_date: NaiveDate,
    ) -> Result<RequestId> {
        let blood_type = BloodType::normalize(blood_type)?;
        let quantity = Quantity::new(quantity)?;
        self.ledger
            .create_request(requestor, blood_type, quantity, request_date)
    }

    /// Usable stock of `blood_type` on `as_of`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBloodType`] if `blood_type` is not a known
    /// code.
    pub fn total_available(&self, blood_type: &str, as_of: NaiveDate) -> Result<u64> {
        let blood_type = BloodType::normalize(blood_type)?;
        Ok(self.inventory.total_available(blood_type, as_of))
    }

    /// Serves a pending request in full from stock usable on `as_of`, or not
    /// at all.
    ///
    /// On success the request is `Fulfilled` and the units drawn are reported
    /// in the receipt.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestNotFound`] if no such request exists.
    /// - [`Error::RequestNotPending`] if it is already fulfilled or
    ///   cancelled.
    /// - [`Error::InsufficientStock`] if usable stock is short.
    ///
    /// Nothing is changed when an error is returned.
    #[instrument(level = "debug", skip(self))]
    pub fn fulfill_request(&self, id: RequestId, as_of: NaiveDate) -> Result<Fulfilment> {
        self.with_request_shelf(id, |shelf, request| {
            ensure_pending(&request)?;

            let allocation = shelf
                .plan(
                    request.blood_type(),
                    request.quantity(),
                    self.inventory.policy(),
                    as_of,
                )
                .inspect_err(|e| tracing::warn!("Cannot fulfil {id}: {e}"))?;

            shelf.commit(&allocation)?;
            if let Err(e) = self.ledger.set_status(id, RequestStatus::Fulfilled) {
                shelf.refund(&allocation);
                return Err(e);
            }

            tracing::info!(
                "Fulfilled {id}: {} of {} from {} unit(s)",
                request.quantity(),
                request.blood_type(),
                allocation.units_touched()
            );

            Ok(Fulfilment {
                request: id,
                allocation,
            })
        })
    }

    /// Attempts every pending request, oldest request date first (ties by
    /// id).
    ///
    /// Each attempt is independent, so a large request that cannot be met
    /// does not stop smaller later ones from being served.
    #[instrument(level = "debug", skip(self))]
    pub fn fulfill_all_pending(&self, as_of: NaiveDate) -> Vec<(RequestId, Result<Fulfilment>)> {
        let mut pending = self.ledger.list_by_status(RequestStatus::Pending);
        pending.sort_by_key(|request| (request.request_date(), request.id()));

        pending
            .into_iter()
            .map(|request| {
                let id = request.id();
                (id, self.fulfill_request(id, as_of))
            })
            .collect()
    }

    /// Removes all stock expired on `as_of`.
    ///
    /// Requests are left alone; pending requests simply see less stock.
    #[instrument(level = "debug", skip(self))]
    pub fn purge_expired_stock(&self, as_of: NaiveDate) -> PurgeReport {
        self.inventory.purge_expired(as_of)
    }

    /// Withdraws a pending request. Stock is unaffected.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestNotFound`] if no such request exists.
    /// - [`Error::RequestNotPending`] if it is already fulfilled or
    ///   cancelled.
    #[instrument(level = "debug", skip(self))]
    pub fn cancel_request(&self, id: RequestId) -> Result<()> {
        self.with_request_shelf(id, |_, request| {
            ensure_pending(&request)?;
            self.ledger.set_status(id, RequestStatus::Cancelled)?;
            tracing::info!("Cancelled {id}");
            Ok(())
        })
    }

    /// Edits a pending request. `None` leaves a field as it is.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBloodType`] or [`Error::InvalidQuantity`] for bad
    ///   input, checked before the request is looked up.
    /// - [`Error::RequestNotFound`] if no such request exists.
    /// - [`Error::RequestNotPending`] if it is already fulfilled or
    ///   cancelled.
    pub fn update_request(
        &self,
        id: RequestId,
        blood_type: Option<&str>,
        quantity: Option<i64>,
        request_date: Option<NaiveDate>,
    ) -> Result<BloodRequest> {
        let blood_type = blood_type.map(BloodType::normalize).transpose()?;
        let quantity = quantity.map(Quantity::new).transpose()?;

        self.with_request_shelf(id, |_, _| {
            self.ledger
                .update_request(id, blood_type, quantity, request_date)
        })
    }

    /// Deletes a request record in any state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestNotFound`] if no such request exists.
    pub fn delete_request(&self, id: RequestId) -> Result<BloodRequest> {
        self.with_request_shelf(id, |_, _| self.ledger.delete_request(id))
    }

    /// Runs `f` with the shelf of the request's blood type locked and a
    /// snapshot of the request taken under that lock.
    ///
    /// The request's blood type can change while we wait for the lock, in
    /// which case we start over with the new type.
    fn with_request_shelf<T>(
        &self,
        id: RequestId,
        f: impl FnOnce(&mut Shelf, BloodRequest) -> Result<T>,
    ) -> Result<T> {
        loop {
            let blood_type = self
                .ledger
                .find(id)
                .ok_or(Error::RequestNotFound(id))?
                .blood_type();

            let mut shelf = self.inventory.shelf(blood_type);
            let request = self.ledger.find(id).ok_or(Error::RequestNotFound(id))?;
            if request.blood_type() != blood_type {
                tracing::trace!("{id} changed blood type while waiting, retrying");
                continue;
            }

            return f(&mut *shelf, request);
        }
    }
}

fn ensure_pending(request: &BloodRequest) -> Result<()> {
    if request.is_pending() {
        Ok(())
    } else {
        Err(Error::RequestNotPending {
            id: request.id(),
            status: request.status(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    struct Bank {
        inventory: InventoryStore,
        ledger: RequestLedger,
    }

    impl Bank {
        fn new() -> Self {
            Self {
                inventory: InventoryStore::default(),
                ledger: RequestLedger::default(),
            }
        }

        fn engine(&self) -> ReconciliationEngine<'_> {
            ReconciliationEngine::new(&self.inventory, &self.ledger)
        }
    }

    #[test]
    fn fulfil_decrements_stock_and_closes_request() {
        let bank = Bank::new();
        let engine = bank.engine();
        let unit = engine
            .add_unit("A+", 10, date("2024-01-15"), None)
            .unwrap();
        let request = engine
            .add_request("H1", "a+", 2, date("2024-02-01"))
            .unwrap();

        let receipt = engine.fulfill_request(request, date("2024-02-01")).unwrap();

        assert_eq!(receipt.draws(), &[Draw { unit, amount: 2 }]);
        assert_eq!(bank.inventory.find_unit(unit).unwrap().quantity(), 8);
        assert_eq!(
            bank.ledger.find(request).unwrap().status(),
            RequestStatus::Fulfilled
        );
    }

    #[test]
    fn shortfall_changes_nothing() {
        let bank = Bank::new();
        let engine = bank.engine();
        let unit = engine.add_unit("O-", 5, date("2024-01-20"), None).unwrap();
        let request = engine
            .add_request("H1", "O-", 10, date("2024-02-01"))
            .unwrap();

        let err = engine
            .fulfill_request(request, date("2024-02-01"))
            .unwrap_err();

        assert!(matches!(err, Error::InsufficientStock { available: 5, .. }));
        assert_eq!(bank.inventory.find_unit(unit).unwrap().quantity(), 5);
        assert!(bank.ledger.find(request).unwrap().is_pending());
    }

    #[test]
    fn terminal_requests_cannot_be_fulfilled_or_cancelled() {
        let bank = Bank::new();
        let engine = bank.engine();
        engine.add_unit("B-", 5, date("2024-01-20"), None).unwrap();
        let request = engine.add_request("H1", "B-", 1, date("2024-02-01")).unwrap();
        engine.cancel_request(request).unwrap();

        let expected = || Error::RequestNotPending {
            id: request,
            status: RequestStatus::Cancelled,
        };
        assert_eq!(
            engine.fulfill_request(request, date("2024-02-01")),
            Err(expected())
        );
        assert_eq!(engine.cancel_request(request), Err(expected()));
        assert_eq!(engine.total_available("B-", date("2024-02-01")), Ok(5));
    }

    #[test]
    fn unknown_request_is_not_found() {
        let bank = Bank::new();
        let id = RequestId::try_from(3).unwrap();
        assert_eq!(
            bank.engine().fulfill_request(id, date("2024-02-01")),
            Err(Error::RequestNotFound(id))
        );
    }

    #[test]
    fn invalid_input_is_rejected_before_mutation() {
        let bank = Bank::new();
        let engine = bank.engine();

        assert!(matches!(
            engine.add_unit("C+", 1, date("2024-01-01"), None),
            Err(Error::InvalidBloodType(_))
        ));
        assert!(matches!(
            engine.add_unit("A+", -3, date("2024-01-01"), None),
            Err(Error::InvalidQuantity(_))
        ));
        assert!(matches!(
            engine.add_request("H1", "A+", 0, date("2024-01-01")),
            Err(Error::InvalidQuantity(_))
        ));
        assert!(bank.inventory.list_all_units().is_empty());
        assert!(bank.ledger.is_empty());
    }

    #[test]
    fn fulfil_all_serves_oldest_first_and_skips_what_cannot_be_met() {
        let bank = Bank::new();
        let engine = bank.engine();
        engine.add_unit("A+", 5, date("2024-01-20"), None).unwrap();
        let late = engine.add_request("H1", "A+", 3, date("2024-02-03")).unwrap();
        let big = engine.add_request("H2", "A+", 9, date("2024-02-01")).unwrap();
        let early = engine.add_request("H3", "A+", 3, date("2024-02-02")).unwrap();

        let outcomes = engine.fulfill_all_pending(date("2024-02-05"));

        let order: Vec<_> = outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, [big, early, late]);
        assert!(matches!(outcomes[0].1, Err(Error::InsufficientStock { .. })));
        assert!(outcomes[1].1.is_ok());
        assert!(matches!(outcomes[2].1, Err(Error::InsufficientStock { .. })));
        assert_eq!(engine.total_available("A+", date("2024-02-05")), Ok(2));
    }

    #[test]
    fn purge_leaves_requests_alone() {
        let bank = Bank::new();
        let engine = bank.engine();
        engine.add_unit("B+", 3, date("2023-10-01"), None).unwrap();
        let request = engine.add_request("H1", "B+", 1, date("2023-12-01")).unwrap();

        let report = engine.purge_expired_stock(date("2024-01-01"));

        assert_eq!(report.count(), 1);
        assert_eq!(engine.total_available("B+", date("2024-01-01")), Ok(0));
        assert!(bank.ledger.find(request).unwrap().is_pending());
    }

    #[test]
    fn updated_blood_type_is_used_for_fulfilment() {
        let bank = Bank::new();
        let engine = bank.engine();
        engine.add_unit("AB-", 4, date("2024-01-20"), None).unwrap();
        let request = engine.add_request("H1", "A-", 4, date("2024-02-01")).unwrap();

        engine
            .update_request(request, Some("ab-"), None, None)
            .unwrap();
        engine.fulfill_request(request, date("2024-02-01")).unwrap();

        assert_eq!(engine.total_available("AB-", date("2024-02-01")), Ok(0));
        assert!(matches!(
            engine.update_request(request, None, Some(1), None),
            Err(Error::RequestNotPending { .. })
        ));
    }

    #[test]
    fn delete_removes_request_in_any_state() {
        let bank = Bank::new();
        let engine = bank.engine();
        let request = engine.add_request("H1", "O+", 1, date("2024-02-01")).unwrap();
        engine.cancel_request(request).unwrap();

        let removed = engine.delete_request(request).unwrap();
        assert_eq!(removed.status(), RequestStatus::Cancelled);
        assert_eq!(
            engine.delete_request(request),
            Err(Error::RequestNotFound(request))
        );
    }
}
