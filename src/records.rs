use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FamilyError, FamilyResult};
use crate::family::{Family, Relation};
use crate::person::{Gender, Person, PersonId, PersonName, UNKNOWN_GIVEN_NAME};

/// One person as written in a relations file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonRecord {
    /// Unique integer id (required; records without one are skipped on import)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<PersonId>,

    #[serde(default)]
    pub surname: String,

    /// At least one entry
    #[serde(default = "default_given_names")]
    pub given_names: Vec<String>,

    #[serde(default)]
    pub gender: Gender,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

fn default_given_names() -> Vec<String> {
    vec![UNKNOWN_GIVEN_NAME.to_string()]
}

impl Default for PersonRecord {
    fn default() -> Self {
        Self {
            uid: None,
            surname: String::new(),
            given_names: default_given_names(),
            gender: Gender::Unknown,
            nickname: None,
            notes: Vec::new(),
        }
    }
}

impl From<&Person> for PersonRecord {
    fn from(person: &Person) -> Self {
        let name = person.name();
        Self {
            uid: Some(person.id()),
            surname: name.surname.clone(),
            given_names: name.given_names.clone(),
            gender: person.gender(),
            nickname: name.nickname.clone(),
            notes: person.notes().to_vec(),
        }
    }
}

impl TryFrom<PersonRecord> for Person {
    type Error = FamilyError;

    fn try_from(record: PersonRecord) -> FamilyResult<Self> {
        let id = record.uid.ok_or(FamilyError::MissingId)?;
        let name = PersonName {
            surname: record.surname,
            given_names: record.given_names,
            nickname: record.nickname,
        };
        Ok(Person::new(id, name, record.gender)?.with_notes(record.notes))
    }
}

/// Complete contents of a relations file.
///
/// Relations are `(source uid, target uid)` pairs: `father = [[2, 7]]` reads
/// "2 is the father of 7". The pair lists come before `people` so the TOML
/// form keeps its plain arrays ahead of the `[[people]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FamilyRecords {
    #[serde(default)]
    pub father: Vec<(PersonId, PersonId)>,

    #[serde(default)]
    pub mother: Vec<(PersonId, PersonId)>,

    #[serde(default)]
    pub spouse: Vec<(PersonId, PersonId)>,

    #[serde(default)]
    pub people: Vec<PersonRecord>,
}

impl FamilyRecords {
    /// Export a family: every person with all fields, then its edges grouped
    /// by source.
    pub fn from_family(family: &Family) -> Self {
        let mut records = Self {
            people: family.persons().map(PersonRecord::from).collect(),
            ..Self::default()
        };
        for (source, target, relation) in family.edges() {
            records
                .pairs_mut(relation)
                .push((source.id(), target.id()));
        }
        records
    }

    /// Build a family from the records.
    ///
    /// People come first: records without a uid or repeating an earlier uid
    /// are skipped with a warning. Father and mother pairs are then replayed
    /// through [`Family::add_child`], and spouse pairs added one direction at
    /// a time. Pairs naming an unknown uid are skipped with a warning.
    pub fn into_family(self) -> FamilyResult<Family> {
        let FamilyRecords {
            father,
            mother,
            spouse,
            people,
        } = self;
        let mut family = Family::new();

        for record in people {
            let Some(uid) = record.uid else {
                warn!(record = ?record, "person with no uid will not be included");
                continue;
            };
            if family.person(uid).is_ok() {
                warn!(%uid, "uids should be unique; later person with this uid will not be included");
                continue;
            }
            family.add_person(Person::try_from(record)?);
        }

        for (relation, pairs) in [(Relation::Father, father), (Relation::Mother, mother)] {
            for (parent_id, child_id) in pairs {
                let Some((parent, child)) = resolve_pair(&family, parent_id, child_id, relation) else {
                    continue;
                };
                // A pair is not relabelled by the parent's gender: a `father`
                // pair whose source isn't male fails the whole import.
                if parent.gender().parent_relation() != Some(relation) {
                    return Err(FamilyError::Gender {
                        person: parent.label(),
                        gender: parent.gender(),
                        relation,
                    });
                }
                family.add_child(&parent, &child)?;
            }
        }

        for (person_id, spouse_id) in spouse {
            let Some((person, spouse)) =
                resolve_pair(&family, person_id, spouse_id, Relation::Spouse)
            else {
                continue;
            };
            family.add_spouse(&person, &spouse)?;
        }

        Ok(family)
    }

    /// The pair list for `relation` as `source → [targets]`.
    pub fn adjacency(&self, relation: Relation) -> BTreeMap<PersonId, Vec<PersonId>> {
        let mut adjacency: BTreeMap<PersonId, Vec<PersonId>> = BTreeMap::new();
        for &(source, target) in self.pairs(relation) {
            adjacency.entry(source).or_default().push(target);
        }
        adjacency
    }

    pub fn pairs(&self, relation: Relation) -> &[(PersonId, PersonId)] {
        match relation {
            Relation::Father => &self.father,
            Relation::Mother => &self.mother,
            Relation::Spouse => &self.spouse,
        }
    }

    fn pairs_mut(&mut self, relation: Relation) -> &mut Vec<(PersonId, PersonId)> {
        match relation {
            Relation::Father => &mut self.father,
            Relation::Mother => &mut self.mother,
            Relation::Spouse => &mut self.spouse,
        }
    }
}

impl TryFrom<FamilyRecords> for Family {
    type Error = FamilyError;

    fn try_from(records: FamilyRecords) -> FamilyResult<Self> {
        records.into_family()
    }
}

fn resolve_pair(
    family: &Family,
    source: PersonId,
    target: PersonId,
    relation: Relation,
) -> Option<(Person, Person)> {
    match (family.person(source), family.person(target)) {
        (Ok(source), Ok(target)) => Some((source.clone(), target.clone())),
        (Err(_), _) => {
            warn!(uid = %source, %relation, "nobody has this uid, so they can't be anyone's relative; skipping");
            None
        }
        (_, Err(_)) => {
            warn!(uid = %target, %relation, "nobody has this uid; skipping link");
            None
        }
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(uid: u64, given: &str, gender: Gender) -> PersonRecord {
        PersonRecord {
            uid: Some(PersonId(uid)),
            given_names: vec![given.to_string()],
            gender,
            ..PersonRecord::default()
        }
    }

    fn pair(a: u64, b: u64) -> (PersonId, PersonId) {
        (PersonId(a), PersonId(b))
    }

    #[test]
    fn record_defaults() {
        let r: PersonRecord = serde_json::from_str(r#"{"uid": 4}"#).unwrap();
        assert_eq!(r.given_names, vec!["???"]);
        assert_eq!(r.gender, Gender::Unknown);
        assert_eq!(r.surname, "");
    }

    #[test]
    fn person_from_record_needs_uid_and_given_name() {
        let err = Person::try_from(PersonRecord::default()).unwrap_err();
        assert_eq!(err, FamilyError::MissingId);

        let r = PersonRecord {
            uid: Some(PersonId(1)),
            given_names: vec![],
            ..PersonRecord::default()
        };
        assert_eq!(Person::try_from(r).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn import_skips_missing_and_duplicate_uids() {
        let records = FamilyRecords {
            people: vec![
                record(1, "first", Gender::Male),
                PersonRecord::default(),
                record(1, "second", Gender::Female),
            ],
            ..FamilyRecords::default()
        };
        let family = records.into_family().unwrap();
        assert_eq!(family.len(), 1);
        assert_eq!(family.person(PersonId(1)).unwrap().full_name(), "first");
    }

    #[test]
    fn import_skips_pairs_with_unknown_ids() {
        let records = FamilyRecords {
            father: vec![pair(1, 2), pair(1, 99), pair(98, 2)],
            people: vec![record(1, "dad", Gender::Male), record(2, "kid", Gender::Female)],
            ..FamilyRecords::default()
        };
        let family = records.into_family().unwrap();
        assert_eq!(family.len(), 2);
        let kid = family.person(PersonId(2)).unwrap();
        assert_eq!(family.father(kid).map(Person::id), Some(PersonId(1)));
    }

    #[test]
    fn import_rejects_mother_listed_as_father() {
        let records = FamilyRecords {
            father: vec![pair(1, 2)],
            people: vec![record(1, "mom", Gender::Female), record(2, "kid", Gender::Male)],
            ..FamilyRecords::default()
        };
        assert_eq!(records.into_family().unwrap_err().kind(), ErrorKind::Gender);
    }

    #[test]
    fn export_groups_pairs_by_source() {
        let records = FamilyRecords {
            father: vec![pair(1, 3), pair(2, 5), pair(1, 4)],
            spouse: vec![pair(1, 6), pair(6, 1)],
            people: vec![
                record(1, "a", Gender::Male),
                record(2, "b", Gender::Male),
                record(3, "c", Gender::Female),
                record(4, "d", Gender::Female),
                record(5, "e", Gender::Female),
                record(6, "f", Gender::Female),
            ],
            ..FamilyRecords::default()
        };
        let exported = FamilyRecords::from_family(&records.clone().into_family().unwrap());
        assert_eq!(exported.father, vec![pair(1, 3), pair(1, 4), pair(2, 5)]);
        assert_eq!(exported.spouse, vec![pair(1, 6), pair(6, 1)]);
        assert!(exported.mother.is_empty());

        let adjacency = exported.adjacency(Relation::Father);
        assert_eq!(adjacency[&PersonId(1)], vec![PersonId(3), PersonId(4)]);
        assert_eq!(adjacency[&PersonId(2)], vec![PersonId(5)]);
    }

    #[test]
    fn export_keeps_every_field() {
        let mut family = Family::new();
        let person = Person::new(
            7,
            PersonName::new(["Frederick", "Joseph"], "Flintstone").with_nickname("Fred"),
            Gender::Male,
        )
        .unwrap()
        .with_notes(["Yabba dabba doo"]);
        family.add_person(person);

        let exported = FamilyRecords::from_family(&family);
        assert_eq!(
            exported.people,
            vec![PersonRecord {
                uid: Some(PersonId(7)),
                surname: "Flintstone".into(),
                given_names: vec!["Frederick".into(), "Joseph".into()],
                gender: Gender::Male,
                nickname: Some("Fred".into()),
                notes: vec!["Yabba dabba doo".into()],
            }]
        );
    }
}
