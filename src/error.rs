use thiserror::Error;

use crate::person::{Gender, PersonId};
use crate::family::Relation;

/// Errors raised by [`Person`](crate::Person) construction and
/// [`Family`](crate::Family) mutations and queries.
///
/// Person descriptions are rendered into the variants when the error is
/// created so that the error outlives the family it came from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FamilyError {
    #[error("person {0} needs at least one given name")]
    EmptyGivenNames(PersonId),

    #[error("every person needs a unique integer uid")]
    MissingId,

    #[error("uid {0} is out of range (the largest is {max})", max = PersonId::MAX)]
    IdOutOfRange(u64),

    #[error("no unused uid left after {0}")]
    NoFreeId(PersonId),

    #[error(
        "unknown name style {0:?}; expected one of: full name | last initial | \
         last initial, no middle names | no middle names"
    )]
    UnknownStyle(String),

    #[error("{person} has gender {gender}, so can't be a {relation}")]
    Gender {
        person: String,
        gender: Gender,
        relation: Relation,
    },

    #[error("without a gender on {0}, can't tell whether to add a mother or a father")]
    UnknownParentGender(String),

    #[error("{child} already has a {relation} ({existing})")]
    ParentExists {
        child: String,
        relation: Relation,
        existing: String,
    },

    #[error("{0} can't be their own {1}")]
    SelfRelation(String, Relation),

    #[error("{person} isn't in the family yet")]
    NotInFamily { person: String },

    #[error("nobody has id {0}")]
    UnknownId(PersonId),

    #[error("nobody is named {0:?}")]
    UnknownName(String),
}

/// Coarse classification of a [`FamilyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed person or display request.
    Validation,
    /// Gender does not permit the requested relation.
    Gender,
    /// Violates the one-father/one-mother rule or links a person to themselves.
    Genealogical,
    /// Person or identifier not registered in the family.
    Lookup,
}

impl FamilyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FamilyError::EmptyGivenNames(_)
            | FamilyError::MissingId
            | FamilyError::IdOutOfRange(_)
            | FamilyError::NoFreeId(_)
            | FamilyError::UnknownStyle(_) => ErrorKind::Validation,
            FamilyError::Gender { .. } | FamilyError::UnknownParentGender(_) => ErrorKind::Gender,
            FamilyError::ParentExists { .. } | FamilyError::SelfRelation(..) => {
                ErrorKind::Genealogical
            }
            FamilyError::NotInFamily { .. }
            | FamilyError::UnknownId(_)
            | FamilyError::UnknownName(_) => ErrorKind::Lookup,
        }
    }
}

pub type FamilyResult<T> = Result<T, FamilyError>;
