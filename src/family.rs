//! The family graph.
//!
//! A [`Family`] is a directed multigraph with [`Person`]s as nodes and
//! [`Relation`]-labelled edges between them. Nodes are stored in a map keyed
//! by [`PersonId`] and edges as per-source adjacency lists, so no person ever
//! holds a reference to another.
//!
//! Parent edges come in two tiers:
//!
//! - [`Family::add_child`] is the low-level edge add. It derives the label
//!   from the parent's gender but does not check whether the child already
//!   has a parent of that kind. Bulk import goes through this path.
//! - [`Family::add_father`] / [`Family::add_mother`] are the checked
//!   operations that enforce the one-father/one-mother rule.
//!
//! Spouse edges are one-directional. A marriage recorded in only one
//! direction still counts as a couple in [`Family::couples`].

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FamilyError, FamilyResult};
use crate::person::{Gender, Person, PersonId, PersonName};

/// Label of an edge, read as "source is the *relation* of target".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Father,
    Mother,
    Spouse,
}

impl Relation {
    pub fn is_parent(self) -> bool {
        matches!(self, Relation::Father | Relation::Mother)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Father => write!(f, "father"),
            Relation::Mother => write!(f, "mother"),
            Relation::Spouse => write!(f, "spouse"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    target: PersonId,
    relation: Relation,
}

/// A pair of persons ordered by id.
pub type Couple<'a> = (&'a Person, &'a Person);

/// Persons and the father/mother/spouse edges between them.
#[derive(Debug, Clone, Default)]
pub struct Family {
    persons: BTreeMap<PersonId, Person>,
    outgoing: BTreeMap<PersonId, Vec<Edge>>,
}

impl Family {
    /// Create an empty family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a family of unrelated persons.
    pub fn from_persons(iter: impl IntoIterator<Item = Person>) -> Self {
        let mut family = Self::new();
        for person in iter {
            family.add_person(person);
        }
        family
    }

    // --- mutation ------------------------------------------------------------

    /// Register a person. Returns `false` and keeps the existing record if
    /// somebody with the same id is already registered.
    pub fn add_person(&mut self, person: Person) -> bool {
        if self.persons.contains_key(&person.id()) {
            return false;
        }
        self.persons.insert(person.id(), person);
        true
    }

    /// Add `child` as a child of `parent`, as father or mother depending on
    /// the parent's gender. Both are registered if absent.
    ///
    /// This does not check whether `child` already has a parent of that
    /// kind; use [`add_father`](Self::add_father) or
    /// [`add_mother`](Self::add_mother) for that.
    pub fn add_child(&mut self, parent: &Person, child: &Person) -> FamilyResult<Relation> {
        let resolved = self.resolve(parent);
        let relation = resolved
            .gender()
            .parent_relation()
            .ok_or_else(|| FamilyError::UnknownParentGender(resolved.label()))?;
        if parent == child {
            return Err(FamilyError::SelfRelation(resolved.label(), relation));
        }

        self.ensure(parent);
        self.ensure(child);
        if !self.has_edge(parent.id(), child.id(), relation) {
            self.push_edge(parent.id(), child.id(), relation);
        }
        Ok(relation)
    }

    pub fn add_children<'p>(
        &mut self,
        parent: &Person,
        children: impl IntoIterator<Item = &'p Person>,
    ) -> FamilyResult<()> {
        for child in children {
            self.add_child(parent, child)?;
        }
        Ok(())
    }

    /// Make `father` the father of `child`.
    ///
    /// Fails if `child` already has a father, if the two are the same person,
    /// or if `father` isn't male. Nothing changes on failure.
    pub fn add_father(&mut self, child: &Person, father: &Person) -> FamilyResult<()> {
        self.add_parent(child, father, Relation::Father)
    }

    /// Make `mother` the mother of `child`. See [`add_father`](Self::add_father).
    pub fn add_mother(&mut self, child: &Person, mother: &Person) -> FamilyResult<()> {
        self.add_parent(child, mother, Relation::Mother)
    }

    fn add_parent(&mut self, child: &Person, parent: &Person, relation: Relation) -> FamilyResult<()> {
        if let Some(existing) = self.parent_of(child.id(), relation) {
            return Err(FamilyError::ParentExists {
                child: self.resolve(child).label(),
                relation,
                existing: existing.label(),
            });
        }
        if child == parent {
            return Err(FamilyError::SelfRelation(self.resolve(child).label(), relation));
        }
        let resolved = self.resolve(parent);
        if resolved.gender().parent_relation() != Some(relation) {
            return Err(FamilyError::Gender {
                person: resolved.label(),
                gender: resolved.gender(),
                relation,
            });
        }

        // A parent already registered under this id is reused as is.
        self.ensure(parent);
        self.ensure(child);
        self.push_edge(parent.id(), child.id(), relation);
        Ok(())
    }

    /// Record `spouse` as a spouse of `person`, in that direction only.
    pub fn add_spouse(&mut self, person: &Person, spouse: &Person) -> FamilyResult<()> {
        if person == spouse {
            return Err(FamilyError::SelfRelation(
                self.resolve(person).label(),
                Relation::Spouse,
            ));
        }
        self.ensure(person);
        self.ensure(spouse);
        self.push_edge(person.id(), spouse.id(), Relation::Spouse);
        Ok(())
    }

    pub fn add_spouses<'p>(
        &mut self,
        person: &Person,
        spouses: impl IntoIterator<Item = &'p Person>,
    ) -> FamilyResult<()> {
        for spouse in spouses {
            self.add_spouse(person, spouse)?;
        }
        Ok(())
    }

    /// Give `sibling` the same father and mother as `person`.
    ///
    /// A parent `person` doesn't have yet is created as an anonymous
    /// placeholder (see [`new_anonymous_name`](Self::new_anonymous_name)), so
    /// repeated calls for children of the same parents share one father and
    /// one mother.
    pub fn add_full_sibling(&mut self, person: &Person, sibling: &Person) -> FamilyResult<()> {
        let person = self
            .persons
            .get(&person.id())
            .ok_or_else(|| FamilyError::NotInFamily { person: person.label() })?
            .clone();

        let father = self.father(&person).cloned();
        let mother = self.mother(&person).cloned();
        self.check_sibling_parent(sibling, father.as_ref(), Relation::Father)?;
        self.check_sibling_parent(sibling, mother.as_ref(), Relation::Mother)?;

        // Placeholder ids come after every id in use, the sibling's included.
        let placeholders = [&father, &mother].iter().filter(|p| p.is_none()).count();
        let mut last = self.last_id().map_or(sibling.id(), |id| id.max(sibling.id()));
        for _ in 0..placeholders {
            last = last.checked_next().ok_or(FamilyError::NoFreeId(last))?;
        }

        // Registered before any placeholder so a fresh id can't collide with it.
        self.ensure(sibling);

        let father = match father {
            Some(father) => father,
            None => {
                let anonymous = self.anonymous_person(Gender::Male)?;
                debug!(person = %person.id(), placeholder = %anonymous.id(), "creating placeholder father");
                self.add_father(&person, &anonymous)?;
                anonymous
            }
        };
        let mother = match mother {
            Some(mother) => mother,
            None => {
                let anonymous = self.anonymous_person(Gender::Female)?;
                debug!(person = %person.id(), placeholder = %anonymous.id(), "creating placeholder mother");
                self.add_mother(&person, &anonymous)?;
                anonymous
            }
        };

        for (parent, relation) in [(&father, Relation::Father), (&mother, Relation::Mother)] {
            if !self.has_edge(parent.id(), sibling.id(), relation) {
                self.push_edge(parent.id(), sibling.id(), relation);
            }
        }
        Ok(())
    }

    // `sibling` must be able to take `parent` (or a new placeholder when
    // `parent` is None) as its father/mother.
    fn check_sibling_parent(
        &self,
        sibling: &Person,
        parent: Option<&Person>,
        relation: Relation,
    ) -> FamilyResult<()> {
        if parent == Some(sibling) {
            return Err(FamilyError::SelfRelation(self.resolve(sibling).label(), relation));
        }
        match self.parent_of(sibling.id(), relation) {
            Some(existing) if Some(existing) != parent => Err(FamilyError::ParentExists {
                child: self.resolve(sibling).label(),
                relation,
                existing: existing.label(),
            }),
            _ => Ok(()),
        }
    }

    fn anonymous_person(&self, gender: Gender) -> FamilyResult<Person> {
        Person::new(
            self.next_id()?,
            PersonName::new([self.new_anonymous_name()], ""),
            gender,
        )
    }

    /// Replace the name of a registered person.
    pub fn rename(&mut self, id: PersonId, name: PersonName) -> FamilyResult<()> {
        self.person_mut(id)?.set_name(name)
    }

    pub fn add_note(&mut self, id: PersonId, note: impl Into<String>) -> FamilyResult<()> {
        self.person_mut(id)?.push_note(note.into());
        Ok(())
    }

    /// Remove the first note equal to `note`. Returns whether one was found;
    /// a missing note is not an error.
    pub fn delete_note(&mut self, id: PersonId, note: &str) -> FamilyResult<bool> {
        Ok(self.person_mut(id)?.remove_note(note))
    }

    // --- queries -------------------------------------------------------------

    /// A string of `?`s one longer than the longest all-`?` name in the
    /// family, or `"?"` if there is none.
    ///
    /// The result only changes once a person with that name is added.
    pub fn new_anonymous_name(&self) -> String {
        let longest = self
            .persons
            .values()
            .map(Person::full_name)
            .filter(|name| !name.is_empty() && name.chars().all(|c| c == '?'))
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0);
        "?".repeat(longest + 1)
    }

    /// One more than the largest id in use, or 1 for an empty family.
    ///
    /// Fails once the largest id is [`PersonId::MAX`].
    pub fn next_id(&self) -> FamilyResult<PersonId> {
        match self.last_id() {
            None => Ok(PersonId(1)),
            Some(last) => last.checked_next().ok_or(FamilyError::NoFreeId(last)),
        }
    }

    fn last_id(&self) -> Option<PersonId> {
        self.persons.keys().next_back().copied()
    }

    pub fn children(&self, parent: &Person) -> FamilyResult<BTreeSet<&Person>> {
        self.require(parent)?;
        Ok(self.targets(parent.id(), Relation::is_parent).collect())
    }

    /// Everyone who is somebody's father.
    pub fn fathers(&self) -> BTreeSet<&Person> {
        self.sources(Relation::Father)
    }

    /// Everyone who is somebody's mother.
    pub fn mothers(&self) -> BTreeSet<&Person> {
        self.sources(Relation::Mother)
    }

    /// Everyone with at least one outgoing spouse edge.
    pub fn spouses(&self) -> BTreeSet<&Person> {
        self.sources(Relation::Spouse)
    }

    pub fn father(&self, person: &Person) -> Option<&Person> {
        self.parent_of(person.id(), Relation::Father)
    }

    pub fn mother(&self, person: &Person) -> Option<&Person> {
        self.parent_of(person.id(), Relation::Mother)
    }

    /// Spouses recorded from `person`'s side, in the order they were added.
    pub fn all_spouses(&self, person: &Person) -> Vec<&Person> {
        self.targets(person.id(), |r| r == Relation::Spouse).collect()
    }

    /// Pairs who share a child or are joined by a spouse edge in either
    /// direction, each pair ordered by id.
    pub fn couples(&self) -> BTreeSet<Couple<'_>> {
        let mut couples = BTreeSet::new();
        for father in self.fathers() {
            for child in self.targets(father.id(), |r| r == Relation::Father) {
                if let Some(mother) = self.mother(child) {
                    couples.insert(ordered(father, mother));
                }
            }
        }
        for (source, target, relation) in self.edges() {
            if relation == Relation::Spouse {
                couples.insert(ordered(source, target));
            }
        }
        couples
    }

    /// Parents, grandparents and so on, nearest first.
    pub fn ancestors(&self, person: &Person) -> FamilyResult<Vec<&Person>> {
        self.require(person)?;
        Ok(self.bfs(person.id(), Direction::Up))
    }

    /// Children, grandchildren and so on, nearest first.
    pub fn descendants(&self, person: &Person) -> FamilyResult<Vec<&Person>> {
        self.require(person)?;
        Ok(self.bfs(person.id(), Direction::Down))
    }

    /// All persons in id order.
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn contains(&self, person: &Person) -> bool {
        self.persons.contains_key(&person.id())
    }

    pub fn ids(&self) -> Vec<PersonId> {
        self.persons.keys().copied().collect()
    }

    /// Full names of everyone, in id order.
    pub fn names(&self) -> Vec<String> {
        self.persons.values().map(Person::full_name).collect()
    }

    /// The registered person with `id`.
    pub fn person(&self, id: PersonId) -> FamilyResult<&Person> {
        self.persons.get(&id).ok_or(FamilyError::UnknownId(id))
    }

    /// First person (by id) whose full name is exactly `name`.
    pub fn find_by_name(&self, name: &str) -> FamilyResult<&Person> {
        self.persons
            .values()
            .find(|p| p.full_name() == name)
            .ok_or_else(|| FamilyError::UnknownName(name.to_string()))
    }

    /// Resolve `"Larry Fine and Bill Fine"` to the two persons.
    pub fn couple_from_str(&self, s: &str) -> FamilyResult<(&Person, &Person)> {
        let (first, second) = s
            .split_once(" and ")
            .ok_or_else(|| FamilyError::UnknownName(s.to_string()))?;
        Ok((self.find_by_name(first.trim())?, self.find_by_name(second.trim())?))
    }

    pub fn people_with_notes(&self) -> Vec<&Person> {
        self.persons.values().filter(|p| !p.notes().is_empty()).collect()
    }

    /// Every edge as `(source, target, relation)`, grouped by source in id
    /// order and in insertion order per source.
    pub fn edges(&self) -> impl Iterator<Item = (&Person, &Person, Relation)> {
        self.outgoing.iter().flat_map(move |(source, edges)| {
            edges.iter().filter_map(move |edge| {
                Some((
                    self.persons.get(source)?,
                    self.persons.get(&edge.target)?,
                    edge.relation,
                ))
            })
        })
    }

    // --- helpers -------------------------------------------------------------

    fn ensure(&mut self, person: &Person) {
        self.persons
            .entry(person.id())
            .or_insert_with(|| person.clone());
    }

    // The registered record for `person`, falling back to the argument.
    fn resolve<'a>(&'a self, person: &'a Person) -> &'a Person {
        self.persons.get(&person.id()).unwrap_or(person)
    }

    fn require(&self, person: &Person) -> FamilyResult<()> {
        if self.contains(person) {
            Ok(())
        } else {
            Err(FamilyError::NotInFamily { person: person.label() })
        }
    }

    fn person_mut(&mut self, id: PersonId) -> FamilyResult<&mut Person> {
        self.persons.get_mut(&id).ok_or(FamilyError::UnknownId(id))
    }

    fn push_edge(&mut self, source: PersonId, target: PersonId, relation: Relation) {
        self.outgoing
            .entry(source)
            .or_default()
            .push(Edge { target, relation });
    }

    fn has_edge(&self, source: PersonId, target: PersonId, relation: Relation) -> bool {
        self.outgoing
            .get(&source)
            .is_some_and(|edges| edges.contains(&Edge { target, relation }))
    }

    fn parent_of(&self, child: PersonId, relation: Relation) -> Option<&Person> {
        self.outgoing
            .iter()
            .find(|(_, edges)| {
                edges
                    .iter()
                    .any(|e| e.target == child && e.relation == relation)
            })
            .and_then(|(source, _)| self.persons.get(source))
    }

    fn sources(&self, relation: Relation) -> BTreeSet<&Person> {
        self.outgoing
            .iter()
            .filter(|(_, edges)| edges.iter().any(|e| e.relation == relation))
            .filter_map(|(source, _)| self.persons.get(source))
            .collect()
    }

    fn targets(
        &self,
        source: PersonId,
        keep: impl Fn(Relation) -> bool,
    ) -> impl Iterator<Item = &Person> {
        self.outgoing
            .get(&source)
            .into_iter()
            .flatten()
            .filter(move |edge| keep(edge.relation))
            .filter_map(move |edge| self.persons.get(&edge.target))
    }

    // Breadth-first walk excluding the start node.
    fn bfs(&self, start: PersonId, direction: Direction) -> Vec<&Person> {
        let mut visited: HashSet<PersonId> = HashSet::new();
        let mut queue: VecDeque<PersonId> = VecDeque::new();
        let mut result: Vec<&Person> = Vec::new();

        visited.insert(start);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            for neighbour in self.neighbours(current, direction) {
                if visited.insert(neighbour.id()) {
                    queue.push_back(neighbour.id());
                    result.push(neighbour);
                }
            }
        }
        result
    }

    fn neighbours(&self, id: PersonId, direction: Direction) -> Vec<&Person> {
        match direction {
            Direction::Up => [Relation::Father, Relation::Mother]
                .into_iter()
                .filter_map(|relation| self.parent_of(id, relation))
                .collect(),
            Direction::Down => self.targets(id, Relation::is_parent).collect(),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

fn ordered<'a>(a: &'a Person, b: &'a Person) -> Couple<'a> {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Two families are equal when they hold the same persons and the same
/// father, mother and spouse relations, regardless of insertion order.
impl PartialEq for Family {
    fn eq(&self, other: &Self) -> bool {
        if !self.persons.keys().eq(other.persons.keys()) {
            return false;
        }
        for relation in [Relation::Father, Relation::Mother, Relation::Spouse] {
            let ours = self.sources(relation);
            if ours != other.sources(relation) {
                return false;
            }
            let wanted = |r: Relation| r == relation;
            for source in ours {
                let our_targets: BTreeSet<&Person> = self.targets(source.id(), wanted).collect();
                let their_targets: BTreeSet<&Person> = other.targets(source.id(), wanted).collect();
                if our_targets != their_targets {
                    return false;
                }
            }
        }
        true
    }
}

impl Eq for Family {}

// --- tests -------------------------------------------------------------------
