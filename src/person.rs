//! Individuals in a family tree.
//!
//! A [`Person`] is identified solely by its [`PersonId`]: two values with the
//! same id are the same individual no matter what their names, genders or
//! notes say. That makes persons safe to use as set members and map keys
//! while their names are edited.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FamilyError, FamilyResult};
use crate::family::Relation;

/// Given name used when a record doesn't provide any.
pub const UNKNOWN_GIVEN_NAME: &str = "???";

/// Unique identifier of a person, assigned by whoever creates the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub u64);

impl PersonId {
    /// Largest usable id. Relations files may be TOML, whose integers are
    /// signed 64-bit.
    pub const MAX: PersonId = PersonId(i64::MAX as u64);

    /// The id after this one, if it is still in range.
    pub fn checked_next(self) -> Option<PersonId> {
        (self < Self::MAX).then(|| PersonId(self.0 + 1))
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PersonId {
    fn from(value: u64) -> Self {
        PersonId(value)
    }
}

impl FromStr for PersonId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PersonId)
    }
}

/// Gender as recorded in a relations file.
///
/// Serialises as `"m"`, `"f"` or `"?"`; the long forms `"male"`, `"female"`
/// and `"unknown"` are accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "m", alias = "male", alias = "M")]
    Male,
    #[serde(rename = "f", alias = "female", alias = "F")]
    Female,
    #[default]
    #[serde(rename = "?", alias = "unknown", alias = "")]
    Unknown,
}

impl Gender {
    /// The parent relation a person of this gender stands in to a child.
    pub fn parent_relation(self) -> Option<Relation> {
        match self {
            Gender::Male => Some(Relation::Father),
            Gender::Female => Some(Relation::Mother),
            Gender::Unknown => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
            Gender::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Gender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            "?" | "u" | "unknown" => Ok(Gender::Unknown),
            _ => Err(format!(
                "unknown gender {:?}; expected one of: m, f, ?",
                s
            )),
        }
    }
}

/// How much of a name to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameStyle {
    /// All given names and the surname.
    #[default]
    FullName,
    /// All given names and the first letter of the surname.
    LastInitial,
    /// First given name and the first letter of the surname.
    LastInitialNoMiddleNames,
    /// First given name and the surname.
    NoMiddleNames,
}

impl fmt::Display for NameStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameStyle::FullName => write!(f, "full name"),
            NameStyle::LastInitial => write!(f, "last initial"),
            NameStyle::LastInitialNoMiddleNames => write!(f, "last initial, no middle names"),
            NameStyle::NoMiddleNames => write!(f, "no middle names"),
        }
    }
}

/// Parses the human spelling (`"last initial, no middle names"`) or its
/// kebab-case form (`"last-initial-no-middle-names"`).
impl FromStr for NameStyle {
    type Err = FamilyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace(',', "")
            .replace(['-', '_'], " ");
        match normalized.as_str() {
            "full name" => Ok(NameStyle::FullName),
            "last initial" => Ok(NameStyle::LastInitial),
            "last initial no middle names" => Ok(NameStyle::LastInitialNoMiddleNames),
            "no middle names" => Ok(NameStyle::NoMiddleNames),
            _ => Err(FamilyError::UnknownStyle(s.to_string())),
        }
    }
}

/// Structured name of a person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub surname: String,
    pub given_names: Vec<String>,
    pub nickname: Option<String>,
}

impl PersonName {
    pub fn new<I, S>(given_names: I, surname: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            surname: surname.into(),
            given_names: given_names.into_iter().map(Into::into).collect(),
            nickname: None,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Name of somebody nobody knows anything about.
    pub fn unknown() -> Self {
        Self::new([UNKNOWN_GIVEN_NAME], "")
    }
}

impl Default for PersonName {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One individual.
///
/// Only the name and the notes can change after construction, and only
/// through the [`Family`](crate::Family) that owns the person.
#[derive(Debug, Clone)]
pub struct Person {
    id: PersonId,
    name: PersonName,
    gender: Gender,
    notes: Vec<String>,
}

impl Person {
    /// Fails when `name` has no given names.
    pub fn new(id: impl Into<PersonId>, name: PersonName, gender: Gender) -> FamilyResult<Self> {
        let id = id.into();
        if id > PersonId::MAX {
            return Err(FamilyError::IdOutOfRange(id.0));
        }
        validate_name(id, &name)?;
        Ok(Self {
            id,
            name,
            gender,
            notes: Vec::new(),
        })
    }

    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes = notes.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> PersonId {
        self.id
    }

    pub fn name(&self) -> &PersonName {
        &self.name
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn first_name(&self) -> &str {
        self.name
            .given_names
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_GIVEN_NAME)
    }

    /// All given names followed by the surname.
    pub fn full_name(&self) -> String {
        join_name(self.name.given_names.join(" "), &self.name.surname)
    }

    /// Formats the name according to `style`, optionally followed by ` (<id>)`.
    ///
    /// An empty surname contributes nothing, not even an initial.
    pub fn display_string(&self, style: NameStyle, with_id: bool) -> String {
        let all_given = || self.name.given_names.join(" ");
        let initial = || {
            self.name
                .surname
                .chars()
                .next()
                .map(|c| format!("{}.", c))
                .unwrap_or_default()
        };
        let mut out = match style {
            NameStyle::FullName => join_name(all_given(), &self.name.surname),
            NameStyle::LastInitial => join_name(all_given(), &initial()),
            NameStyle::LastInitialNoMiddleNames => {
                join_name(self.first_name().to_string(), &initial())
            }
            NameStyle::NoMiddleNames => join_name(self.first_name().to_string(), &self.name.surname),
        };
        if with_id {
            out.push_str(&format!(" ({})", self.id));
        }
        out
    }

    /// Full name with id, used in error messages and logs.
    pub(crate) fn label(&self) -> String {
        self.display_string(NameStyle::FullName, true)
    }

    pub(crate) fn set_name(&mut self, name: PersonName) -> FamilyResult<()> {
        validate_name(self.id, &name)?;
        self.name = name;
        Ok(())
    }

    pub(crate) fn push_note(&mut self, note: String) {
        self.notes.push(note);
    }

    pub(crate) fn remove_note(&mut self, note: &str) -> bool {
        match self.notes.iter().position(|n| n == note) {
            Some(index) => {
                self.notes.remove(index);
                true
            }
            None => false,
        }
    }
}

fn validate_name(id: PersonId, name: &PersonName) -> FamilyResult<()> {
    if name.given_names.is_empty() {
        return Err(FamilyError::EmptyGivenNames(id));
    }
    Ok(())
}

fn join_name(given: String, last: &str) -> String {
    let mut out = given;
    if !last.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(last);
    }
    out
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Person {}

impl Hash for Person {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Person {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Person {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn fred() -> Person {
        Person::new(
            9,
            PersonName::new(["Frederick", "Joseph"], "Flintstone").with_nickname("Fred"),
            Gender::Male,
        )
        .unwrap()
    }

    fn hash_of(p: &Person) -> u64 {
        let mut h = DefaultHasher::new();
        p.hash(&mut h);
        h.finish()
    }

    #[test]
    fn identity_is_the_id_alone() {
        let a = fred();
        let b = Person::new(9, PersonName::new(["Barney"], "Rubble"), Gender::Female)
            .unwrap()
            .with_notes(["different"]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let set: HashSet<Person> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn ids_stay_within_signed_range() {
        let name = PersonName::new(["Zeke"], "Flintstone");
        assert!(Person::new(PersonId::MAX, name.clone(), Gender::Male).is_ok());
        let err = Person::new(u64::MAX, name, Gender::Male).unwrap_err();
        assert_eq!(err, FamilyError::IdOutOfRange(u64::MAX));
        assert_eq!(PersonId(41).checked_next(), Some(PersonId(42)));
        assert_eq!(PersonId::MAX.checked_next(), None);
    }

    #[test]
    fn different_ids_are_different_people() {
        let a = fred();
        let b = Person::new(10, fred().name().clone(), Gender::Male).unwrap();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn empty_given_names_rejected() {
        let err = Person::new(1, PersonName::new(Vec::<String>::new(), "X"), Gender::Male)
            .unwrap_err();
        assert_eq!(err, FamilyError::EmptyGivenNames(PersonId(1)));
    }

    #[test]
    fn default_name_is_placeholder() {
        let p = Person::new(3, PersonName::default(), Gender::default()).unwrap();
        assert_eq!(p.full_name(), "???");
        assert_eq!(p.gender(), Gender::Unknown);
    }

    #[test]
    fn display_styles() {
        let p = fred();
        assert_eq!(p.display_string(NameStyle::FullName, false), "Frederick Joseph Flintstone");
        assert_eq!(p.display_string(NameStyle::LastInitial, false), "Frederick Joseph F.");
        assert_eq!(
            p.display_string(NameStyle::LastInitialNoMiddleNames, false),
            "Frederick F."
        );
        assert_eq!(p.display_string(NameStyle::NoMiddleNames, true), "Frederick Flintstone (9)");
    }

    #[test]
    fn empty_surname_leaves_no_trailing_space() {
        let p = Person::new(4, PersonName::new(["??"], ""), Gender::Male).unwrap();
        assert_eq!(p.full_name(), "??");
        assert_eq!(p.display_string(NameStyle::LastInitial, true), "?? (4)");
    }

    #[test]
    fn style_parsing() {
        assert_eq!("full name".parse::<NameStyle>().unwrap(), NameStyle::FullName);
        assert_eq!(
            "last initial, no middle names".parse::<NameStyle>().unwrap(),
            NameStyle::LastInitialNoMiddleNames
        );
        assert_eq!(
            "last-initial-no-middle-names".parse::<NameStyle>().unwrap(),
            NameStyle::LastInitialNoMiddleNames
        );
        let err = "surname first".parse::<NameStyle>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn style_display_parses_back() {
        for style in [
            NameStyle::FullName,
            NameStyle::LastInitial,
            NameStyle::LastInitialNoMiddleNames,
            NameStyle::NoMiddleNames,
        ] {
            assert_eq!(style.to_string().parse::<NameStyle>().unwrap(), style);
        }
    }

    #[test]
    fn gender_maps_to_parent_relation() {
        assert_eq!(Gender::Male.parent_relation(), Some(Relation::Father));
        assert_eq!(Gender::Female.parent_relation(), Some(Relation::Mother));
        assert_eq!(Gender::Unknown.parent_relation(), None);
    }

    #[test]
    fn notes_remove_first_match_only() {
        let mut p = fred().with_notes(["a", "b", "a"]);
        assert!(p.remove_note("a"));
        assert_eq!(p.notes(), ["b", "a"]);
        assert!(!p.remove_note("zzz"));
    }
}
