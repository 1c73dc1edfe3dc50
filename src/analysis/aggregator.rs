//! The in-memory aggregation index.
//!
//! The index has two phases. During the load phase an [`IndexLoader`] takes
//! unit registrations (single-threaded, `&mut self`) followed by person
//! registrations (callable concurrently, `&self`). [`IndexLoader::finish`]
//! consumes the loader and yields the read-only [`AggregationIndex`], which
//! is the only type exposing queries.
//!
//! Units are kept sorted and unique by name. Persons reference a unit by its
//! 1-based position in that sorted list, so no unit may be registered once
//! the first person has been seen.

use crate::error::IndexError;
use crate::models::{AgeBucket, Person, PersonId, Unit};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Members of one group, keyed by the identity assigned at registration.
pub type MemberSet = BTreeMap<PersonId, Arc<Person>>;

static NO_MEMBERS: MemberSet = BTreeMap::new();

/// Outcome of a person registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(PersonId),
    /// The unit position did not resolve; the person was dropped.
    Rejected,
}

/// A grouping dimension of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group<'a> {
    Unit(&'a Unit),
    Bucket(AgeBucket),
}

impl fmt::Display for Group<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Unit(unit) => write!(f, "{}", unit),
            Group::Bucket(bucket) => write!(f, "{}", bucket),
        }
    }
}

/// Load-phase side of the index.
pub struct IndexLoader {
    units: Vec<Unit>,
    members: RwLock<BTreeMap<Unit, Mutex<MemberSet>>>,
    /// One set per bucket, in `AgeBucket::ALL` order, created up front.
    buckets: Vec<Mutex<MemberSet>>,
    persons_started: AtomicBool,
    next_id: AtomicU64,
}

impl Default for IndexLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexLoader {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            members: RwLock::new(BTreeMap::new()),
            buckets: AgeBucket::ALL
                .iter()
                .map(|_| Mutex::new(MemberSet::new()))
                .collect(),
            persons_started: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a unit at its sorted position.
    ///
    /// Returns `Ok(false)` when a unit with the exact same name is already
    /// present. Fails once person registration has begun.
    pub fn register_unit(&mut self, unit: Unit) -> Result<bool, IndexError> {
        if *self.persons_started.get_mut() {
            return Err(IndexError::LoadPhaseClosed(format!(
                "unit \"{}\" registered after person registration began",
                unit
            )));
        }
        if unit.name().contains(['\n', '\r']) {
            return Err(IndexError::InvalidArgument(format!(
                "unit name {:?} contains a line terminator",
                unit.name()
            )));
        }

        match self.units.binary_search(&unit) {
            Ok(_) => {
                debug!("Unit \"{}\" already registered", unit);
                Ok(false)
            }
            Err(pos) => {
                self.members
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(unit.clone())
                    .or_default();
                self.units.insert(pos, unit);
                Ok(true)
            }
        }
    }

    /// Register a person against the unit at `person.unit_position`.
    ///
    /// An out-of-range position is a data problem, not an error: the person
    /// is logged and rejected. Safe to call from several threads at once.
    pub fn register_person(&self, person: Person) -> Result<Admission, IndexError> {
        self.persons_started.store(true, Ordering::Release);

        if !person.income.is_finite() {
            return Err(IndexError::InvalidArgument(format!(
                "person \"{}\" has non-finite income {}",
                person.name, person.income
            )));
        }

        let Some(unit) = self.resolve_position(person.unit_position) else {
            warn!(
                "Skipping person {}. Invalid unit position: {}. Units size is {}",
                person.name,
                person.unit_position,
                self.units.len()
            );
            return Ok(Admission::Rejected);
        };

        let id = PersonId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let bucket = person.age.years().map(AgeBucket::for_age);
        let member = Arc::new(person);

        self.upsert_member(unit, id, Arc::clone(&member));
        if let Some(bucket) = bucket {
            lock(&self.buckets[bucket.index()]).insert(id, member);
        }

        Ok(Admission::Accepted(id))
    }

    /// Add a member to a unit's set, creating the set if it is missing.
    ///
    /// Get-or-create and insert happen as one step: concurrent callers on the
    /// same unit end up in a single set and none of their inserts is lost.
    fn upsert_member(&self, unit: &Unit, id: PersonId, member: Arc<Person>) -> bool {
        if let Some(set) = read_groups(&self.members).get(unit) {
            return lock(set).insert(id, member).is_none();
        }

        let mut groups = write_groups(&self.members);
        let set = groups.entry(unit.clone()).or_default();
        set.get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, member)
            .is_none()
    }

    fn resolve_position(&self, position: i64) -> Option<&Unit> {
        let index = usize::try_from(position).ok()?.checked_sub(1)?;
        self.units.get(index)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Close the load phase.
    pub fn finish(self) -> AggregationIndex {
        let members = self
            .members
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .map(|(unit, set)| (unit, set.into_inner().unwrap_or_else(PoisonError::into_inner)))
            .collect();
        let buckets = self
            .buckets
            .into_iter()
            .map(|set| set.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect();

        AggregationIndex {
            units: self.units,
            members,
            buckets,
        }
    }
}

/// Query-phase side of the index. Read-only.
#[derive(Debug)]
pub struct AggregationIndex {
    units: Vec<Unit>,
    members: BTreeMap<Unit, MemberSet>,
    buckets: Vec<MemberSet>,
}

impl AggregationIndex {
    /// Sorted, unique units.
    pub fn units_in_order(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Members of a unit; empty for a unit the index has never seen.
    pub fn members_of(&self, unit: &Unit) -> &MemberSet {
        self.members.get(unit).unwrap_or(&NO_MEMBERS)
    }

    /// Members of an age bucket. Persons of unknown age are in no bucket.
    pub fn bucket_members(&self, bucket: AgeBucket) -> &MemberSet {
        self.buckets.get(bucket.index()).unwrap_or(&NO_MEMBERS)
    }

    pub fn group_members(&self, group: Group<'_>) -> &MemberSet {
        match group {
            Group::Unit(unit) => self.members_of(unit),
            Group::Bucket(bucket) => self.bucket_members(bucket),
        }
    }

    /// Union of every unit's members.
    pub fn all_members(&self) -> MemberSet {
        self.members
            .values()
            .flat_map(|set| set.iter().map(|(id, person)| (*id, Arc::clone(person))))
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.values().map(BTreeMap::len).sum()
    }

    pub fn projected_incomes(&self, group: Group<'_>) -> Vec<f64> {
        self.group_members(group)
            .values()
            .map(|person| person.income)
            .collect()
    }

    /// Known ages of a group's members; unknown ages are left out.
    pub fn projected_ages(&self, group: Group<'_>) -> Vec<f64> {
        self.group_members(group)
            .values()
            .filter_map(|person| person.age.years())
            .map(f64::from)
            .collect()
    }
}

fn read_groups<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_groups<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::statistics::Summary;
    use crate::models::{Age, Genre};
    use proptest::prelude::*;

    fn loader_with_units(names: &[&str]) -> IndexLoader {
        let mut loader = IndexLoader::new();
        for name in names {
            loader.register_unit(Unit::from(*name)).unwrap();
        }
        loader
    }

    fn person(position: i64, name: &str, income: f64, age: Option<u32>) -> Person {
        Person::new(position, name, Genre::Unknown, income, Age::from(age))
    }

    fn names(units: &[Unit]) -> Vec<&str> {
        units.iter().map(Unit::name).collect()
    }

    #[test]
    fn test_register_units() {
        let loader = loader_with_units(&["Accounting", "Human Resources"]);
        assert_eq!(loader.unit_count(), 2);
    }

    #[test]
    fn test_units_sorted_regardless_of_insertion_order() {
        let loader = loader_with_units(&["J", "I", "H", "G", "F", "F", "E", "D", "C", "B", "A"]);
        let index = loader.finish();
        assert_eq!(index.unit_count(), 10);
        assert_eq!(
            names(index.units_in_order()),
            vec!["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"]
        );
    }

    #[test]
    fn test_duplicate_units_are_ignored() {
        let mut loader = IndexLoader::new();
        assert_eq!(loader.register_unit(Unit::from("A")), Ok(true));
        assert_eq!(loader.register_unit(Unit::from("A")), Ok(false));
        assert_eq!(loader.register_unit(Unit::from("A")), Ok(false));
        assert_eq!(loader.unit_count(), 1);
    }

    #[test]
    fn test_empty_unit_name_is_a_unit() {
        let loader = loader_with_units(&["", "A", "Z", ""]);
        assert_eq!(names(loader.units()), vec!["", "A", "Z"]);
    }

    #[test]
    fn test_units_are_case_sensitive() {
        let loader = loader_with_units(&["Z", "z", "e", "E", "D", "d", "c", "C", "B", "b", "a", "A"]);
        assert_eq!(
            names(loader.units()),
            vec!["A", "B", "C", "D", "E", "Z", "a", "b", "c", "d", "e", "z"]
        );
    }

    #[test]
    fn test_unit_name_with_line_terminator_is_invalid() {
        let mut loader = IndexLoader::new();
        let err = loader.register_unit(Unit::from("Sales\nMarketing")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
        assert_eq!(loader.unit_count(), 0);
    }

    #[test]
    fn test_unit_after_person_is_rejected() {
        let mut loader = loader_with_units(&["A"]);
        loader.register_person(person(1, "Opal Ballard", 4350.0, Some(23))).unwrap();

        let err = loader.register_unit(Unit::from("B")).unwrap_err();
        assert!(matches!(err, IndexError::LoadPhaseClosed(_)));
        assert_eq!(names(loader.units()), vec!["A"]);
    }

    #[test]
    fn test_non_finite_income_is_invalid() {
        let loader = loader_with_units(&["A"]);
        let err = loader
            .register_person(person(1, "Nobody", f64::NAN, None))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
        assert_eq!(loader.finish().member_count(), 0);
    }

    #[test]
    fn test_out_of_range_positions_are_rejected() {
        let loader = loader_with_units(&["A", "B"]);
        loader.register_person(person(1, "Kept", 1000.0, Some(30))).unwrap();

        for position in [0, -1, -100, 3, i64::MAX, i64::MIN] {
            let admission = loader
                .register_person(person(position, "Lost", 1.0, Some(30)))
                .unwrap();
            assert_eq!(admission, Admission::Rejected);
        }

        let index = loader.finish();
        assert_eq!(index.all_members().len(), 1);
        assert_eq!(index.bucket_members(AgeBucket::Years30To40).len(), 1);
    }

    #[test]
    fn test_load_persons_into_units_and_buckets() {
        let loader = loader_with_units(&["J", "I", "H", "G", "F", "E", "D", "C", "B", "A"]);
        loader.register_person(person(6, "Opal Ballard", 4350.00, Some(23))).unwrap();
        loader.register_person(person(7, "Otis Bell", 2650.50, Some(35))).unwrap();
        loader.register_person(person(7, "Lynne Ortiz", 2880.00, Some(28))).unwrap();
        loader.register_person(person(7, "Maria Kalas", 5880.00, Some(29))).unwrap();
        let index = loader.finish();

        let f = Unit::from("F");
        let g = Unit::from("G");
        assert_eq!(index.members_of(&f).len(), 1);
        assert_eq!(index.members_of(&g).len(), 3);

        let incomes_g = Summary::compute(index.projected_incomes(Group::Unit(&g)));
        assert_eq!(incomes_g.median, 2880.00);
        assert_eq!(incomes_g.min, 2650.50);
        assert_eq!(incomes_g.max, 5880.00);

        let incomes_f = Summary::compute(index.projected_incomes(Group::Unit(&f)));
        assert_eq!(incomes_f.median, 4350.00);

        let ages_g = Summary::compute(index.projected_ages(Group::Unit(&g)));
        assert_eq!(ages_g.median, 29.0);

        assert_eq!(index.bucket_members(AgeBucket::Years20To30).len(), 3);
        assert_eq!(index.bucket_members(AgeBucket::Years30To40).len(), 1);
        assert!(index.bucket_members(AgeBucket::Years0To10).is_empty());
    }

    #[test]
    fn test_unknown_age_is_not_bucketed() {
        let loader = loader_with_units(&["A"]);
        loader.register_person(person(1, "Known", 100.0, Some(40))).unwrap();
        loader.register_person(person(1, "Unknown", 300.0, None)).unwrap();
        let index = loader.finish();

        let a = Unit::from("A");
        assert_eq!(index.members_of(&a).len(), 2);
        assert_eq!(index.projected_incomes(Group::Unit(&a)).len(), 2);
        assert_eq!(index.projected_ages(Group::Unit(&a)), vec![40.0]);

        let bucketed: usize = AgeBucket::ALL
            .iter()
            .map(|bucket| index.bucket_members(*bucket).len())
            .sum();
        assert_eq!(bucketed, 1);
    }

    #[test]
    fn test_very_old_person_lands_in_fallback_bucket() {
        let loader = loader_with_units(&["A"]);
        loader.register_person(person(1, "Old", 10.0, Some(142))).unwrap();
        let index = loader.finish();
        assert_eq!(index.bucket_members(AgeBucket::FALLBACK).len(), 1);
        assert_eq!(
            index.projected_incomes(Group::Bucket(AgeBucket::FALLBACK)),
            vec![10.0]
        );
    }

    #[test]
    fn test_unknown_unit_has_no_members() {
        let index = loader_with_units(&["A"]).finish();
        let missing = Unit::from("Missing");
        assert!(index.members_of(&missing).is_empty());
        assert!(index.projected_incomes(Group::Unit(&missing)).is_empty());
        assert!(index.members_of(&Unit::from("A")).is_empty());
    }

    #[test]
    fn test_same_person_registered_twice_counts_twice() {
        let loader = loader_with_units(&["A"]);
        let first = loader.register_person(person(1, "Twin", 1.0, Some(1))).unwrap();
        let second = loader.register_person(person(1, "Twin", 1.0, Some(1))).unwrap();
        assert_ne!(first, second);
        assert_eq!(loader.finish().member_count(), 2);
    }

    #[test]
    fn test_concurrent_person_registration_loses_nothing() {
        let loader = loader_with_units(&["A", "B"]);

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let loader = &loader;
                scope.spawn(move || {
                    for i in 0..250 {
                        let position = 1 + (i % 2) as i64;
                        let name = format!("worker-{}-{}", worker, i);
                        loader
                            .register_person(person(position, &name, i as f64, Some(i % 100)))
                            .unwrap();
                    }
                });
            }
        });

        let index = loader.finish();
        assert_eq!(index.member_count(), 2000);
        assert_eq!(index.all_members().len(), 2000);
        assert_eq!(index.members_of(&Unit::from("A")).len(), 1000);
        assert_eq!(index.members_of(&Unit::from("B")).len(), 1000);
        let bucketed: usize = AgeBucket::ALL
            .iter()
            .map(|bucket| index.bucket_members(*bucket).len())
            .sum();
        assert_eq!(bucketed, 2000);
    }

    #[test]
    fn test_upsert_creates_missing_set_once() {
        let loader = IndexLoader::new();
        let unit = Unit::from("Detached");

        std::thread::scope(|scope| {
            for worker in 0..4u64 {
                let loader = &loader;
                let unit = &unit;
                scope.spawn(move || {
                    for i in 0..100u64 {
                        let id = PersonId(worker * 1000 + i);
                        let member = Arc::new(person(1, "x", 0.0, None));
                        assert!(loader.upsert_member(unit, id, member));
                    }
                });
            }
        });

        assert_eq!(read_groups(&loader.members).len(), 1);
        assert_eq!(lock(&read_groups(&loader.members)[&unit]).len(), 400);
    }

    fn summaries(index: &AggregationIndex) -> Vec<(String, Summary, Summary)> {
        index
            .units_in_order()
            .iter()
            .map(|unit| {
                (
                    unit.name().to_string(),
                    Summary::compute(index.projected_incomes(Group::Unit(unit))),
                    Summary::compute(index.projected_ages(Group::Unit(unit))),
                )
            })
            .chain(AgeBucket::ALL.iter().map(|bucket| {
                (
                    bucket.to_string(),
                    Summary::compute(index.projected_incomes(Group::Bucket(*bucket))),
                    Summary::EMPTY,
                )
            }))
            .collect()
    }

    fn build(units: &[String], persons: &[(i64, u32, u32)]) -> AggregationIndex {
        let mut loader = IndexLoader::new();
        for name in units {
            loader.register_unit(Unit::new(name.clone())).unwrap();
        }
        for (position, cents, age) in persons {
            let income = f64::from(*cents) / 100.0;
            loader
                .register_person(person(*position, "p", income, Some(*age)))
                .unwrap();
        }
        loader.finish()
    }

    fn scenario() -> impl Strategy<
        Value = (
            (Vec<String>, Vec<String>),
            (Vec<(i64, u32, u32)>, Vec<(i64, u32, u32)>),
        ),
    > {
        let units = prop::collection::vec("[A-Za-z]{0,3}", 0..12)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()));
        let persons = prop::collection::vec((-2i64..15, 0u32..1_000_000, 0u32..150), 0..60)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()));
        (units, persons)
    }

    proptest! {
        #[test]
        fn units_always_sorted_and_unique(names in prop::collection::vec("[A-Za-z]{0,4}", 0..40)) {
            let mut loader = IndexLoader::new();
            for name in &names {
                loader.register_unit(Unit::new(name.clone())).unwrap();
            }
            let units = loader.units();
            prop_assert!(units.windows(2).all(|w| w[0] < w[1]));
            for name in &names {
                prop_assert!(units.iter().any(|u| u.name() == name));
            }
        }

        #[test]
        fn registration_order_does_not_change_results(
            ((units, shuffled_units), (persons, shuffled_persons)) in scenario()
        ) {
            let original = build(&units, &persons);
            let permuted = build(&shuffled_units, &shuffled_persons);

            prop_assert_eq!(original.units_in_order(), permuted.units_in_order());
            prop_assert_eq!(original.member_count(), permuted.member_count());
            prop_assert_eq!(summaries(&original), summaries(&permuted));
        }
    }
}
