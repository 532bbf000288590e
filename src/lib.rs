//! Family trees kept in plain-text relations files.
//!
//! A family is a directed multigraph: persons are nodes, and each edge says
//! that its source is the father, mother or spouse of its target. Families
//! are read from and written to TOML, YAML or JSON, drawn as a D3 force layout in
//! the browser or as a Graphviz chart, and edited one command at a time.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`person`] | [`Person`], [`PersonId`], [`PersonName`], [`Gender`], [`NameStyle`] |
//! | [`family`] | The [`Family`] graph and its [`Relation`] edge labels |
//! | [`error`] | [`FamilyError`] and its [`ErrorKind`] |
//! | [`records`] | Serde shape of a relations file ([`FamilyRecords`]) |
//! | [`storage`] | Loading and saving relations files |
//! | [`render`] | HTML and Graphviz charts |
//! | [`session`] | Interactive editing ([`EditSession`], [`EditCommand`]) |
//! | [`config`] | Defaults and well-known paths |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use pedigree::{Family, Gender, Person, PersonName};
//!
//! let fred = Person::new(9, PersonName::new(["Fred"], "Flintstone"), Gender::Male)?;
//! let ed = Person::new(7, PersonName::new(["Ed"], "Flintstone"), Gender::Male)?;
//!
//! let mut family = Family::new();
//! family.add_father(&fred, &ed)?;
//! assert_eq!(family.father(&fred), Some(&ed));
//! ```

pub mod config;
pub mod error;
pub mod family;
pub mod logging;
pub mod person;
pub mod records;
pub mod render;
pub mod session;
pub mod storage;

pub use error::{ErrorKind, FamilyError, FamilyResult};
pub use family::{Couple, Family, Relation};
pub use person::{Gender, NameStyle, Person, PersonId, PersonName};
pub use records::{FamilyRecords, PersonRecord};
pub use session::{EditCommand, EditSession, Outcome};
