//! In-memory stock of blood units.
//!
//! The [`InventoryStore`] knows nothing about requests or the filesystem. It
//! keeps one shelf per blood type, each behind its own lock, so that work on
//! one type never waits for another. Within the crate, callers that need a
//! check and a mutation to happen without interleaving hold the shelf guard
//! across both.

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::NaiveDate;
use non_empty_string::NonEmptyString;
use tracing::instrument;

use crate::domain::{
    ids::Sequence, BloodType, BloodUnit, Error, ExpiryPolicy, Quantity, Result, UnitId,
};

/// The units of a single blood type.
#[derive(Debug, Default)]
pub(crate) struct Shelf {
    units: Vec<BloodUnit>,
}

impl Shelf {
    /// Sum of the quantities of all units not expired on `as_of`.
    pub(crate) fn total_available(&self, policy: &ExpiryPolicy, as_of: NaiveDate) -> u64 {
        self.units
            .iter()
            .map(|unit| u64::from(unit.usable(policy, as_of)))
            .sum()
    }

    /// Works out which units would satisfy `amount`, without touching them.
    ///
    /// Units are drawn oldest donation first (ties broken by id), skipping
    /// expired and empty units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientStock`] if the usable total is below
    /// `amount`.
    pub(crate) fn plan(
        &self,
        blood_type: BloodType,
        amount: Quantity,
        policy: &ExpiryPolicy,
        as_of: NaiveDate,
    ) -> Result<Allocation> {
        let requested = u64::from(amount.get());
        let available = self.total_available(policy, as_of);
        if available < requested {
            return Err(Error::InsufficientStock {
                blood_type,
                requested,
                available,
            });
        }

        let mut candidates: Vec<&BloodUnit> = self
            .units
            .iter()
            .filter(|unit| unit.usable(policy, as_of) > 0)
            .collect();
        candidates.sort_by_key(|unit| (unit.donation_date, unit.id));

        let mut remaining = amount.get();
        let mut draws = Vec::new();
        for unit in candidates {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(unit.quantity);
            draws.push(Draw {
                unit: unit.id,
                amount: take,
            });
            remaining -= take;
        }

        Ok(Allocation {
            blood_type,
            requested: amount,
            draws,
        })
    }

    /// Applies an allocation produced by [`Shelf::plan`] on this shelf.
    ///
    /// Every draw is checked against the unit's current quantity before any
    /// unit is touched, so a plan that no longer fits changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleAllocation`] naming the first unit that is gone
    /// or holds less than its draw.
    pub(crate) fn commit(&mut self, allocation: &Allocation) -> Result<()> {
        for draw in &allocation.draws {
            let fits = self
                .units
                .iter()
                .any(|unit| unit.id == draw.unit && unit.quantity >= draw.amount);
            if !fits {
                tracing::error!(
                    "Allocation of {} no longer fits unit {}",
                    allocation.requested,
                    draw.unit
                );
                return Err(Error::StaleAllocation(draw.unit));
            }
        }

        for draw in &allocation.draws {
            if let Some(unit) = self.find_mut(draw.unit) {
                unit.quantity -= draw.amount;
                tracing::debug!(
                    "Drew {} from {} ({} left)",
                    draw.amount,
                    unit.id,
                    unit.quantity
                );
            }
        }
        Ok(())
    }

    /// Puts back what a committed allocation took.
    pub(crate) fn refund(&mut self, allocation: &Allocation) {
        for draw in &allocation.draws {
            if let Some(unit) = self.find_mut(draw.unit) {
                unit.quantity += draw.amount;
            }
        }
    }

    /// Removes every unit expired on `as_of`, whatever its remaining quantity.
    pub(crate) fn purge_expired(
        &mut self,
        policy: &ExpiryPolicy,
        as_of: NaiveDate,
    ) -> Vec<BloodUnit> {
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .units
            .drain(..)
            .partition(|unit| unit.is_expired(policy, as_of));
        self.units = kept;
        expired
    }

    fn find_mut(&mut self, id: UnitId) -> Option<&mut BloodUnit> {
        self.units.iter_mut().find(|unit| unit.id == id)
    }

    fn remove(&mut self, id: UnitId) -> Option<BloodUnit> {
        let position = self.units.iter().position(|unit| unit.id == id)?;
        Some(self.units.remove(position))
    }
}

/// One unit's contribution to an [`Allocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    /// The unit drawn from.
    pub unit: UnitId,
    /// How much was taken from it.
    pub amount: u32,
}

/// The result of allocating stock: which units gave how much, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    blood_type: BloodType,
    requested: Quantity,
    draws: Vec<Draw>,
}

impl Allocation {
    /// The blood type allocated.
    #[must_use]
    pub const fn blood_type(&self) -> BloodType {
        self.blood_type
    }

    /// The amount that was asked for.
    #[must_use]
    pub const fn requested(&self) -> Quantity {
        self.requested
    }

    /// The amount actually allocated. Equal to [`Allocation::requested`], as
    /// allocation never commits a shortfall.
    #[must_use]
    pub fn fulfilled(&self) -> u64 {
        self.draws.iter().map(|draw| u64::from(draw.amount)).sum()
    }

    /// Per-unit draws in the order they were taken.
    #[must_use]
    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    /// Number of distinct units that were decremented.
    #[must_use]
    pub fn units_touched(&self) -> usize {
        self.draws.len()
    }
}

/// Units removed by a purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    removed: Vec<BloodUnit>,
}

impl PurgeReport {
    /// Number of units removed.
    #[must_use]
    pub fn count(&self) -> usize {
        self.removed.len()
    }

    /// The removed units, ordered by id.
    #[must_use]
    pub fn removed(&self) -> &[BloodUnit] {
        &self.removed
    }

    /// Removed unit ids grouped by blood type.
    #[must_use]
    pub fn by_blood_type(&self) -> BTreeMap<BloodType, Vec<UnitId>> {
        let mut grouped: BTreeMap<BloodType, Vec<UnitId>> = BTreeMap::new();
        for unit in &self.removed {
            grouped.entry(unit.blood_type).or_default().push(unit.id);
        }
        grouped
    }
}

/// The blood bank's stock, held per blood type.
#[derive(Debug)]
pub struct InventoryStore {
    shelves: [Mutex<Shelf>; BloodType::ALL.len()],
    sequence: Sequence,
    policy: ExpiryPolicy,
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::with_policy(ExpiryPolicy::default())
    }
}

impl InventoryStore {
    /// Creates an empty store that judges expiry with `policy`.
    #[must_use]
    pub fn with_policy(policy: ExpiryPolicy) -> Self {
        Self {
            shelves: std::array::from_fn(|_| Mutex::default()),
            sequence: Sequence::new(),
            policy,
        }
    }

    /// The expiry policy this store applies.
    #[must_use]
    pub const fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Locks and returns the shelf for `blood_type`.
    ///
    /// While the guard is held no other allocation, purge, or insertion can
    /// touch units of that type.
    pub(crate) fn shelf(&self, blood_type: BloodType) -> MutexGuard<'_, Shelf> {
        self.shelves[blood_type.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new donation and returns its id.
    ///
    /// Units are never merged, even with an existing unit of the same type
    /// and date. A blank donor reference is treated as absent.
    #[instrument(level = "debug", skip(self))]
    pub fn add_unit(
        &self,
        blood_type: BloodType,
        quantity: Quantity,
        donation_date: NaiveDate,
        donor: Option<&str>,
    ) -> UnitId {
        let id = UnitId::new(self.sequence.next());
        let unit = BloodUnit {
            id,
            blood_type,
            quantity: quantity.get(),
            donation_date,
            donor: donor.and_then(|d| NonEmptyString::new(d.trim().to_string()).ok()),
        };
        self.shelf(blood_type).units.push(unit);
        tracing::info!("Added unit {id}: {quantity} of {blood_type} donated {donation_date}");
        id
    }

    /// Inserts a unit read back from persistence, keeping its id.
    ///
    /// The id sequence is advanced past `id` so it is never handed out again.
    /// A loaded unit may have zero quantity.
    ///
    /// Every shelf is locked, in blood type order, for the duplicate check and
    /// the insertion, so concurrent loads of one id cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateUnit`] if a unit with this id is already
    /// present.
    pub fn load_unit(
        &self,
        id: UnitId,
        blood_type: BloodType,
        quantity: u32,
        donation_date: NaiveDate,
        donor: Option<&str>,
    ) -> Result<()> {
        let mut shelves = BloodType::ALL.map(|blood_type| self.shelf(blood_type));
        if shelves
            .iter()
            .any(|shelf| shelf.units.iter().any(|unit| unit.id == id))
        {
            return Err(Error::DuplicateUnit(id));
        }
        self.sequence.observe(NonZeroUsize::new(id.get()).unwrap_or(NonZeroUsize::MIN));
        shelves[blood_type.index()].units.push(BloodUnit {
            id,
            blood_type,
            quantity,
            donation_date,
            donor: donor.and_then(|d| NonEmptyString::new(d.trim().to_string()).ok()),
        });
        Ok(())
    }

    /// Usable stock of `blood_type` on `as_of`.
    #[must_use]
    pub fn total_available(&self, blood_type: BloodType, as_of: NaiveDate) -> u64 {
        self.shelf(blood_type).total_available(&self.policy, as_of)
    }

    /// Usable stock of every blood type on `as_of`.
    #[must_use]
    pub fn availability(&self, as_of: NaiveDate) -> BTreeMap<BloodType, u64> {
        BloodType::ALL
            .into_iter()
            .map(|blood_type| (blood_type, self.total_available(blood_type, as_of)))
            .collect()
    }

    /// Takes `amount` of `blood_type` from stock, oldest units first.
    ///
    /// Either the whole amount is taken or nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientStock`] if usable stock is short; no unit
    /// is modified in that case.
    #[instrument(level = "debug", skip(self))]
    pub fn allocate(
        &self,
        blood_type: BloodType,
        amount: Quantity,
        as_of: NaiveDate,
    ) -> Result<Allocation> {
        let mut shelf = self.shelf(blood_type);
        let allocation = shelf.plan(blood_type, amount, &self.policy, as_of)?;
        shelf.commit(&allocation)?;
        Ok(allocation)
    }

    /// Removes every unit that is expired on `as_of`.
    ///
    /// Shelves are purged one at a time; each is locked for the duration of
    /// its own purge.
    #[instrument(level = "debug", skip(self))]
    pub fn purge_expired(&self, as_of: NaiveDate) -> PurgeReport {
        let mut removed: Vec<BloodUnit> = BloodType::ALL
            .into_iter()
            .flat_map(|blood_type| self.shelf(blood_type).purge_expired(&self.policy, as_of))
            .collect();
        removed.sort_by_key(|unit| unit.id);

        for unit in &removed {
            tracing::info!(
                "Purged expired unit {} ({} of {}, donated {})",
                unit.id,
                unit.quantity,
                unit.blood_type,
                unit.donation_date
            );
        }

        PurgeReport { removed }
    }

    /// Looks up a unit by id.
    #[must_use]
    pub fn find_unit(&self, id: UnitId) -> Option<BloodUnit> {
        BloodType::ALL.into_iter().find_map(|blood_type| {
            self.shelf(blood_type)
                .units
                .iter()
                .find(|unit| unit.id == id)
                .cloned()
        })
    }

    /// Deletes a unit regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnitNotFound`] if no such unit exists.
    pub fn remove_unit(&self, id: UnitId) -> Result<BloodUnit> {
        let removed = BloodType::ALL
            .into_iter()
            .find_map(|blood_type| self.shelf(blood_type).remove(id))
            .ok_or(Error::UnitNotFound(id))?;
        tracing::info!("Removed unit {id}");
        Ok(removed)
    }

    /// Corrects the stock held by a single unit by `delta`, returning the new
    /// quantity.
    ///
    /// # Errors
    ///
    /// - [`Error::UnitNotFound`] if no such unit exists.
    /// - [`Error::InsufficientStock`] if the correction would take the unit
    ///   below zero; the unit is left unchanged.
    pub fn adjust_quantity(&self, id: UnitId, delta: i64) -> Result<u32> {
        for blood_type in BloodType::ALL {
            let mut shelf = self.shelf(blood_type);
            let Some(unit) = shelf.find_mut(id) else {
                continue;
            };

            let current = i64::from(unit.quantity);
            let adjusted = current
                .checked_add(delta)
                .and_then(|value| u32::try_from(value).ok())
                .ok_or(Error::InsufficientStock {
                    blood_type,
                    requested: delta.unsigned_abs(),
                    available: u64::from(unit.quantity),
                })?;

            unit.quantity = adjusted;
            tracing::info!("Adjusted unit {id} by {delta} to {adjusted}");
            return Ok(adjusted);
        }
        Err(Error::UnitNotFound(id))
    }

    /// Every unit of `blood_type`, ordered by id.
    #[must_use]
    pub fn list_units(&self, blood_type: BloodType) -> Vec<BloodUnit> {
        let mut units = self.shelf(blood_type).units.clone();
        units.sort_by_key(|unit| unit.id);
        units
    }

    /// Every unit in stock, ordered by id.
    #[must_use]
    pub fn list_all_units(&self) -> Vec<BloodUnit> {
        let mut units: Vec<BloodUnit> = BloodType::ALL
            .into_iter()
            .flat_map(|blood_type| self.shelf(blood_type).units.clone())
            .collect();
        units.sort_by_key(|unit| unit.id);
        units
    }

    /// The id the next added unit will receive.
    #[must_use]
    pub fn next_id(&self) -> UnitId {
        UnitId::new(self.sequence.peek())
    }

    /// Moves the id sequence forward so the next unit receives at least
    /// `next`. Never moves it backwards.
    pub fn restore_next_id(&self, next: UnitId) {
        self.sequence
            .advance_to(NonZeroUsize::new(next.get()).unwrap_or(NonZeroUsize::MIN));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn fifo_draws_only_from_oldest_when_it_suffices() {
        let store = InventoryStore::default();
        // inserted out of date order on purpose
        let middle = store.add_unit(BloodType::APositive, qty(5), date("2024-01-10"), None);
        let oldest = store.add_unit(BloodType::APositive, qty(5), date("2024-01-05"), None);
        let newest = store.add_unit(BloodType::APositive, qty(5), date("2024-01-15"), None);

        let allocation = store
            .allocate(BloodType::APositive, qty(3), date("2024-01-20"))
            .unwrap();

        assert_eq!(
            allocation.draws(),
            &[Draw {
                unit: oldest,
                amount: 3
            }]
        );
        assert_eq!(store.find_unit(oldest).unwrap().quantity(), 2);
        assert_eq!(store.find_unit(middle).unwrap().quantity(), 5);
        assert_eq!(store.find_unit(newest).unwrap().quantity(), 5);
    }

    #[test]
    fn allocation_spills_over_in_date_order() {
        let store = InventoryStore::default();
        let newer = store.add_unit(BloodType::BNegative, qty(4), date("2024-01-12"), None);
        let older = store.add_unit(BloodType::BNegative, qty(2), date("2024-01-02"), None);

        let allocation = store
            .allocate(BloodType::BNegative, qty(5), date("2024-01-20"))
            .unwrap();

        assert_eq!(allocation.fulfilled(), 5);
        assert_eq!(allocation.units_touched(), 2);
        assert_eq!(allocation.draws()[0].unit, older);
        assert_eq!(store.find_unit(older).unwrap().quantity(), 0);
        assert_eq!(store.find_unit(newer).unwrap().quantity(), 1);
    }

    #[test]
    fn same_day_units_are_drawn_by_id() {
        let store = InventoryStore::default();
        let first = store.add_unit(BloodType::OPositive, qty(1), date("2024-01-02"), None);
        let second = store.add_unit(BloodType::OPositive, qty(1), date("2024-01-02"), None);

        let allocation = store
            .allocate(BloodType::OPositive, qty(1), date("2024-01-03"))
            .unwrap();
        assert_eq!(allocation.draws()[0].unit, first);
        assert_eq!(store.find_unit(second).unwrap().quantity(), 1);
    }

    #[test]
    fn shortfall_leaves_stock_untouched() {
        let store = InventoryStore::default();
        store.add_unit(BloodType::ONegative, qty(5), date("2024-01-20"), None);
        let before = store.list_all_units();

        let err = store
            .allocate(BloodType::ONegative, qty(10), date("2024-02-01"))
            .unwrap_err();

        assert_eq!(
            err,
            Error::InsufficientStock {
                blood_type: BloodType::ONegative,
                requested: 10,
                available: 5,
            }
        );
        assert_eq!(store.list_all_units(), before);
    }

    #[test]
    fn expired_units_are_neither_counted_nor_allocated() {
        let store = InventoryStore::default();
        let expired = store.add_unit(BloodType::AbPositive, qty(10), date("2024-01-01"), None);
        let fresh = store.add_unit(BloodType::AbPositive, qty(3), date("2024-02-10"), None);
        let as_of = date("2024-02-12");

        assert_eq!(store.total_available(BloodType::AbPositive, as_of), 3);
        assert!(store.allocate(BloodType::AbPositive, qty(4), as_of).is_err());

        store.allocate(BloodType::AbPositive, qty(3), as_of).unwrap();
        assert_eq!(store.find_unit(expired).unwrap().quantity(), 10);
        assert_eq!(store.find_unit(fresh).unwrap().quantity(), 0);
    }

    #[test]
    fn units_donated_after_the_reference_date_are_not_yet_usable() {
        let store = InventoryStore::default();
        let id = store.add_unit(BloodType::APositive, qty(5), date("2024-03-01"), None);
        let before = date("2024-02-01");

        assert_eq!(store.total_available(BloodType::APositive, before), 0);
        assert!(store.allocate(BloodType::APositive, qty(1), before).is_err());
        assert_eq!(store.purge_expired(before).count(), 0);

        assert_eq!(store.total_available(BloodType::APositive, date("2024-03-01")), 5);
        assert_eq!(store.find_unit(id).unwrap().quantity(), 5);
    }

    #[test]
    fn purge_removes_expired_units_whatever_their_quantity() {
        let store = InventoryStore::default();
        let old = store.add_unit(BloodType::BPositive, qty(3), date("2023-10-01"), None);
        let emptied = store.add_unit(BloodType::ANegative, qty(1), date("2023-10-02"), None);
        store
            .allocate(BloodType::ANegative, qty(1), date("2023-10-03"))
            .unwrap();
        let fresh = store.add_unit(BloodType::BPositive, qty(2), date("2023-12-30"), None);

        let report = store.purge_expired(date("2024-01-01"));

        assert_eq!(report.count(), 2);
        assert_eq!(
            report.removed().iter().map(BloodUnit::id).collect::<Vec<_>>(),
            [old, emptied]
        );
        assert_eq!(report.by_blood_type()[&BloodType::BPositive], [old]);
        assert_eq!(store.list_all_units().len(), 1);
        assert!(store.find_unit(fresh).is_some());
        assert_eq!(store.total_available(BloodType::BPositive, date("2024-01-01")), 2);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let store = InventoryStore::default();
        let first = store.add_unit(BloodType::OPositive, qty(1), date("2024-01-01"), None);
        store.remove_unit(first).unwrap();
        let second = store.add_unit(BloodType::OPositive, qty(1), date("2024-01-01"), None);
        assert_ne!(first, second);
        assert_eq!(store.remove_unit(first), Err(Error::UnitNotFound(first)));
    }

    #[test]
    fn adjust_quantity_never_goes_negative() {
        let store = InventoryStore::default();
        let id = store.add_unit(BloodType::APositive, qty(4), date("2024-01-01"), Some("D1"));

        assert_eq!(store.adjust_quantity(id, 3), Ok(7));
        assert_eq!(store.adjust_quantity(id, -7), Ok(0));
        assert!(matches!(
            store.adjust_quantity(id, -1),
            Err(Error::InsufficientStock { .. })
        ));
        assert_eq!(store.find_unit(id).unwrap().quantity(), 0);
        assert_eq!(store.find_unit(id).unwrap().donor(), Some("D1"));
    }

    #[test]
    fn load_unit_advances_sequence_and_rejects_duplicates() {
        let store = InventoryStore::default();
        let id = UnitId::try_from(7).unwrap();
        store
            .load_unit(id, BloodType::OPositive, 0, date("2024-01-01"), None)
            .unwrap();

        assert_eq!(
            store.load_unit(id, BloodType::ONegative, 1, date("2024-01-01"), None),
            Err(Error::DuplicateUnit(id))
        );
        assert_eq!(store.next_id().get(), 8);

        store.restore_next_id(UnitId::try_from(20).unwrap());
        store.restore_next_id(UnitId::try_from(3).unwrap());
        assert_eq!(store.next_id().get(), 20);
    }

    #[test]
    fn commit_rejects_an_allocation_the_shelf_no_longer_covers() {
        let store = InventoryStore::default();
        let id = store.add_unit(BloodType::APositive, qty(5), date("2024-01-01"), None);
        let as_of = date("2024-01-10");

        let allocation = store
            .shelf(BloodType::APositive)
            .plan(BloodType::APositive, qty(5), store.policy(), as_of)
            .unwrap();
        store.adjust_quantity(id, -4).unwrap();

        assert_eq!(
            store.shelf(BloodType::APositive).commit(&allocation),
            Err(Error::StaleAllocation(id))
        );
        assert_eq!(store.find_unit(id).unwrap().quantity(), 1);
    }

    #[test]
    fn commit_rejects_an_allocation_whose_unit_is_gone() {
        let store = InventoryStore::default();
        let kept = store.add_unit(BloodType::ONegative, qty(2), date("2024-01-01"), None);
        let gone = store.add_unit(BloodType::ONegative, qty(2), date("2024-01-02"), None);

        let allocation = store
            .shelf(BloodType::ONegative)
            .plan(BloodType::ONegative, qty(4), store.policy(), date("2024-01-10"))
            .unwrap();
        store.remove_unit(gone).unwrap();

        assert_eq!(
            store.shelf(BloodType::ONegative).commit(&allocation),
            Err(Error::StaleAllocation(gone))
        );
        // the first draw was valid but must not have been applied
        assert_eq!(store.find_unit(kept).unwrap().quantity(), 2);
    }

    #[test]
    fn concurrent_loads_of_one_id_admit_a_single_unit() {
        let store = InventoryStore::default();
        let id = UnitId::try_from(3).unwrap();
        let barrier = std::sync::Barrier::new(BloodType::ALL.len());

        let loaded = std::thread::scope(|scope| {
            let handles: Vec<_> = BloodType::ALL
                .into_iter()
                .map(|blood_type| {
                    let (store, barrier) = (&store, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        store
                            .load_unit(id, blood_type, 1, date("2024-01-01"), None)
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(loaded, 1);
        assert_eq!(store.list_all_units().len(), 1);
    }

    #[test]
    fn blank_donor_is_dropped() {
        let store = InventoryStore::default();
        let id = store.add_unit(BloodType::APositive, qty(1), date("2024-01-01"), Some("  "));
        assert_eq!(store.find_unit(id).unwrap().donor(), None);
    }
}
