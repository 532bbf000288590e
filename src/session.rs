//! Line-oriented editing of a relations file.
//!
//! Each input line parses into an [`EditCommand`]; [`EditSession::apply`]
//! runs it against the in-memory family. Commands that change the family
//! work on a copy that replaces the original only when every step succeeds,
//! so a failed `spouses` or `child-of` leaves nothing half done.
//!
//! Persons are referred to by id (`9`) or by exact full name
//! (`"Frederick Joseph Flintstone"`). Wherever a relative is expected,
//! `new <gender> <name>` creates one instead, with the gender omitted for
//! fathers and mothers. Names are written GEDCOM style, the surname between
//! slashes: `"Frederick Joseph /Flintstone/"`.

use std::io::{BufRead, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::config;
use crate::error::{FamilyError, FamilyResult};
use crate::family::{Family, Relation};
use crate::person::{Gender, NameStyle, Person, PersonId, PersonName};
use crate::render;
use crate::storage;

pub const PROMPT: &str = "pedigree> ";

pub const HELP: &str = "\
Persons are an id or a quoted full name. RELATIVE is a person or
`new GENDER NAME` (`new NAME` for fathers and mothers). NAME is
\"Given Names /Surname/\"; GENDER is m, f or ?.

  add GENDER NAME              add an unrelated person
  father PERSON RELATIVE       give PERSON a father
  mother PERSON RELATIVE       give PERSON a mother
  child PERSON RELATIVE        give PERSON a child
  sibling PERSON RELATIVE      give PERSON a full sibling
  spouses RELATIVE RELATIVE    marry two persons
  child-of PERSON PERSON RELATIVE
                               add a child of a couple
  rename PERSON NAME           change a name
  note PERSON TEXT             add a note
  unnote PERSON TEXT           delete a note
  show PERSON                  everything about a person
  people                       list everybody
  couples                      list couples
  notes [PERSON]               who has notes, or a person's notes
  ancestors PERSON             parents, grandparents, ...
  descendants PERSON           children, grandchildren, ...
  preview [floating|rigid] [first-names]
                               write a chart to the preview directory
  save                         write the relations file
  quit                         leave (asks to save unsaved changes)
  help                         this text";

/// A person already in the family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonRef {
    Id(PersonId),
    /// Exact full name
    Name(String),
}

impl From<&str> for PersonRef {
    fn from(token: &str) -> Self {
        match token.parse::<u64>() {
            Ok(id) => PersonRef::Id(PersonId(id)),
            Err(_) => PersonRef::Name(token.to_string()),
        }
    }
}

/// A person already in the family, or one to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relative {
    Existing(PersonRef),
    New { gender: Gender, name: PersonName },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    Floating,
    Rigid { first_names_only: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    AddPerson { gender: Gender, name: PersonName },
    AddFather { child: PersonRef, father: Relative },
    AddMother { child: PersonRef, mother: Relative },
    AddChild { parent: PersonRef, child: Relative },
    AddFullSibling { person: PersonRef, sibling: Relative },
    /// Spouse edges in both directions
    AddSpouses { first: Relative, second: Relative },
    AddChildOfCouple { first: PersonRef, second: PersonRef, child: Relative },
    Rename { person: PersonRef, name: PersonName },
    AddNote { person: PersonRef, note: String },
    DeleteNote { person: PersonRef, note: String },
    Show { person: PersonRef },
    People,
    Couples,
    Notes { person: Option<PersonRef> },
    Ancestors { person: PersonRef },
    Descendants { person: PersonRef },
    Preview { chart: Chart },
    Save,
    Quit,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("nothing to do")]
    Empty,

    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),

    #[error("`{command}` needs {what}")]
    MissingArgument { command: String, what: &'static str },

    #[error("`{command}` got an unexpected {extra:?}")]
    UnexpectedArgument { command: String, extra: String },

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("{0}")]
    Gender(String),

    #[error("unknown chart {0:?}; expected floating or rigid")]
    Chart(String),
}

impl FromStr for EditCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = tokenize(line)?.into_iter();
        let word = tokens.next().ok_or(CommandError::Empty)?;
        let keyword = word.to_ascii_lowercase();
        let mut args = Args {
            command: keyword.clone(),
            tokens,
        };

        let command = match keyword.as_str() {
            "add" => EditCommand::AddPerson {
                gender: args.gender()?,
                name: args.name()?,
            },
            "father" => EditCommand::AddFather {
                child: args.person("a child")?,
                father: args.relative("a father", Some(Gender::Male))?,
            },
            "mother" => EditCommand::AddMother {
                child: args.person("a child")?,
                mother: args.relative("a mother", Some(Gender::Female))?,
            },
            "child" => EditCommand::AddChild {
                parent: args.person("a parent")?,
                child: args.relative("a child", None)?,
            },
            "sibling" => EditCommand::AddFullSibling {
                person: args.person("a person")?,
                sibling: args.relative("a sibling", None)?,
            },
            "spouses" => EditCommand::AddSpouses {
                first: args.relative("two spouses", None)?,
                second: args.relative("two spouses", None)?,
            },
            "child-of" => EditCommand::AddChildOfCouple {
                first: args.person("two parents")?,
                second: args.person("two parents")?,
                child: args.relative("a child", None)?,
            },
            "rename" => EditCommand::Rename {
                person: args.person("a person")?,
                name: args.name()?,
            },
            "note" => EditCommand::AddNote {
                person: args.person("a person")?,
                note: args.text()?,
            },
            "unnote" => EditCommand::DeleteNote {
                person: args.person("a person")?,
                note: args.text()?,
            },
            "show" => EditCommand::Show {
                person: args.person("a person")?,
            },
            "people" => EditCommand::People,
            "couples" => EditCommand::Couples,
            "notes" => EditCommand::Notes {
                person: args.tokens.next().as_deref().map(PersonRef::from),
            },
            "ancestors" => EditCommand::Ancestors {
                person: args.person("a person")?,
            },
            "descendants" => EditCommand::Descendants {
                person: args.person("a person")?,
            },
            "preview" => EditCommand::Preview {
                chart: args.chart()?,
            },
            "save" => EditCommand::Save,
            "quit" | "exit" | "q" => EditCommand::Quit,
            "help" | "?" => EditCommand::Help,
            _ => return Err(CommandError::Unknown(word)),
        };
        args.finish()?;
        Ok(command)
    }
}

/// Split a line on whitespace, keeping double-quoted runs together.
/// Inside quotes a backslash escapes the next character.
fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            '\\' if quoted => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if quoted {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// `"Frederick Joseph /Flintstone/"`: words outside the slashes are given
/// names, the text between them the surname.
fn parse_name(token: &str) -> PersonName {
    match token.split_once('/') {
        Some((before, rest)) => {
            let (surname, after) = rest.split_once('/').unwrap_or((rest, ""));
            let given = before.split_whitespace().chain(after.split_whitespace());
            PersonName::new(given, surname.trim())
        }
        None => PersonName::new(token.split_whitespace(), ""),
    }
}

struct Args {
    command: String,
    tokens: std::vec::IntoIter<String>,
}

impl Args {
    fn required(&mut self, what: &'static str) -> Result<String, CommandError> {
        self.tokens.next().ok_or_else(|| CommandError::MissingArgument {
            command: self.command.clone(),
            what,
        })
    }

    fn person(&mut self, what: &'static str) -> Result<PersonRef, CommandError> {
        Ok(PersonRef::from(self.required(what)?.as_str()))
    }

    fn gender(&mut self) -> Result<Gender, CommandError> {
        self.required("a gender (m, f or ?)")?
            .parse()
            .map_err(CommandError::Gender)
    }

    fn name(&mut self) -> Result<PersonName, CommandError> {
        Ok(parse_name(&self.required("a name")?))
    }

    fn relative(
        &mut self,
        what: &'static str,
        implied: Option<Gender>,
    ) -> Result<Relative, CommandError> {
        let token = self.required(what)?;
        if token != "new" {
            return Ok(Relative::Existing(PersonRef::from(token.as_str())));
        }
        let gender = match implied {
            Some(gender) => gender,
            None => self.gender()?,
        };
        Ok(Relative::New {
            gender,
            name: self.name()?,
        })
    }

    /// Everything left, joined by single spaces
    fn text(&mut self) -> Result<String, CommandError> {
        let words: Vec<String> = self.tokens.by_ref().collect();
        if words.is_empty() {
            return Err(CommandError::MissingArgument {
                command: self.command.clone(),
                what: "some text",
            });
        }
        Ok(words.join(" "))
    }

    fn chart(&mut self) -> Result<Chart, CommandError> {
        let Some(kind) = self.tokens.next() else {
            return Ok(Chart::Floating);
        };
        match kind.to_ascii_lowercase().as_str() {
            "floating" => Ok(Chart::Floating),
            "rigid" => {
                let first_names_only = match self.tokens.next() {
                    None => false,
                    Some(flag) if flag == "first-names" => true,
                    Some(extra) => {
                        return Err(CommandError::UnexpectedArgument {
                            command: self.command.clone(),
                            extra,
                        })
                    }
                };
                Ok(Chart::Rigid { first_names_only })
            }
            _ => Err(CommandError::Chart(kind)),
        }
    }

    fn finish(mut self) -> Result<(), CommandError> {
        match self.tokens.next() {
            Some(extra) => Err(CommandError::UnexpectedArgument {
                command: self.command,
                extra,
            }),
            None => Ok(()),
        }
    }
}

/// What applying a command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The family changed and has unsaved edits
    Changed(String),
    /// Nothing changed; here is what was asked for
    Report(String),
    Saved(PathBuf),
    Quit,
}

/// An open relations file and its unsaved edits.
pub struct EditSession {
    family: Family,
    path: PathBuf,
    style: NameStyle,
    preview_dir: PathBuf,
    dirty: bool,
}

impl EditSession {
    pub fn new(family: Family, path: impl Into<PathBuf>) -> Self {
        Self {
            family,
            path: path.into(),
            style: NameStyle::default(),
            preview_dir: config::preview_dir(),
            dirty: false,
        }
    }

    /// Open `path`, starting an empty family if it doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(storage::load_family_or_empty(path)?, path))
    }

    pub fn with_style(mut self, style: NameStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = dir.into();
        self
    }

    pub fn family(&self) -> &Family {
        &self.family
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are changes not yet written to the file.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn apply(&mut self, command: EditCommand) -> Result<Outcome> {
        debug!(?command, "applying");
        match command {
            EditCommand::Show { person } => self.report(|s| s.show(&person)),
            EditCommand::People => Ok(Outcome::Report(self.people())),
            EditCommand::Couples => Ok(Outcome::Report(self.couples())),
            EditCommand::Notes { person } => self.report(|s| s.notes(person.as_ref())),
            EditCommand::Ancestors { person } => self.report(|s| {
                let who = lookup(&s.family, &person)?;
                Ok(s.list(s.family.ancestors(&who)?, "no known ancestors"))
            }),
            EditCommand::Descendants { person } => self.report(|s| {
                let who = lookup(&s.family, &person)?;
                Ok(s.list(s.family.descendants(&who)?, "no known descendants"))
            }),
            EditCommand::Preview { chart } => self.preview(chart),
            EditCommand::Save => {
                self.save()?;
                Ok(Outcome::Saved(self.path.clone()))
            }
            EditCommand::Quit => Ok(Outcome::Quit),
            EditCommand::Help => Ok(Outcome::Report(HELP.to_string())),
            EditCommand::AddPerson { gender, name } => self.edit(|family, style| {
                let person = Person::new(family.next_id()?, name, gender)?;
                family.add_person(person.clone());
                Ok(Outcome::Changed(format!("added {}", label(&person, style))))
            }),
            EditCommand::AddFather { child, father } => self.edit(|family, style| {
                let child = lookup(family, &child)?;
                let father = materialize(family, &father)?;
                family.add_father(&child, &father)?;
                Ok(Outcome::Changed(format!(
                    "{} is the father of {}",
                    label(&father, style),
                    label(&child, style)
                )))
            }),
            EditCommand::AddMother { child, mother } => self.edit(|family, style| {
                let child = lookup(family, &child)?;
                let mother = materialize(family, &mother)?;
                family.add_mother(&child, &mother)?;
                Ok(Outcome::Changed(format!(
                    "{} is the mother of {}",
                    label(&mother, style),
                    label(&child, style)
                )))
            }),
            EditCommand::AddChild { parent, child } => self.edit(|family, style| {
                let parent = lookup(family, &parent)?;
                let child = materialize(family, &child)?;
                add_parent(family, &child, &parent)?;
                Ok(Outcome::Changed(format!(
                    "{} is a child of {}",
                    label(&child, style),
                    label(&parent, style)
                )))
            }),
            EditCommand::AddFullSibling { person, sibling } => self.edit(|family, style| {
                let person = lookup(family, &person)?;
                let sibling = materialize(family, &sibling)?;
                family.add_full_sibling(&person, &sibling)?;
                Ok(Outcome::Changed(format!(
                    "{} is a full sibling of {}",
                    label(&sibling, style),
                    label(&person, style)
                )))
            }),
            EditCommand::AddSpouses { first, second } => self.edit(|family, style| {
                let first = materialize(family, &first)?;
                let second = materialize(family, &second)?;
                family.add_spouse(&first, &second)?;
                family.add_spouse(&second, &first)?;
                Ok(Outcome::Changed(format!(
                    "{} and {} are spouses",
                    label(&first, style),
                    label(&second, style)
                )))
            }),
            EditCommand::AddChildOfCouple {
                first,
                second,
                child,
            } => self.edit(|family, style| {
                let first = lookup(family, &first)?;
                let second = lookup(family, &second)?;
                let child = materialize(family, &child)?;
                add_parent(family, &child, &first)?;
                add_parent(family, &child, &second)?;
                Ok(Outcome::Changed(format!(
                    "{} is a child of {} and {}",
                    label(&child, style),
                    label(&first, style),
                    label(&second, style)
                )))
            }),
            EditCommand::Rename {
                person,
                name: mut new_name,
            } => self.edit(|family, style| {
                let person = lookup(family, &person)?;
                if new_name.nickname.is_none() {
                    new_name.nickname = person.name().nickname.clone();
                }
                family.rename(person.id(), new_name)?;
                Ok(Outcome::Changed(format!(
                    "{} is now {}",
                    label(&person, style),
                    label(family.person(person.id())?, style)
                )))
            }),
            EditCommand::AddNote { person, note } => self.edit(|family, style| {
                let person = lookup(family, &person)?;
                family.add_note(person.id(), note)?;
                Ok(Outcome::Changed(format!("noted about {}", label(&person, style))))
            }),
            EditCommand::DeleteNote { person, note } => self.edit(|family, style| {
                let person = lookup(family, &person)?;
                if !family.delete_note(person.id(), &note)? {
                    return Ok(Outcome::Report(format!(
                        "{} has no such note",
                        label(&person, style)
                    )));
                }
                Ok(Outcome::Changed(format!("deleted a note about {}", label(&person, style))))
            }),
        }
    }

    /// Write the family to its file.
    pub fn save(&mut self) -> Result<()> {
        storage::save_family(&self.path, &self.family)?;
        self.dirty = false;
        Ok(())
    }

    /// Read commands from `input` until `quit` or end of input, then offer
    /// to save unsaved changes.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<()> {
        writeln!(
            output,
            "Editing {} ({} people). Type `help` for commands.",
            self.path.display(),
            self.family.len()
        )?;

        let mut line = String::new();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                break;
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let command = match line.parse::<EditCommand>() {
                Ok(command) => command,
                Err(e) => {
                    writeln!(output, "error: {e}")?;
                    continue;
                }
            };
            match self.apply(command) {
                Ok(Outcome::Quit) => break,
                Ok(Outcome::Changed(message)) | Ok(Outcome::Report(message)) => {
                    writeln!(output, "{message}")?
                }
                Ok(Outcome::Saved(path)) => writeln!(output, "saved {}", path.display())?,
                Err(e) => writeln!(output, "error: {e:#}")?,
            }
        }

        if self.dirty && confirm(&mut input, &mut output, "Save changes? [y/N] ")? {
            self.save()?;
            writeln!(output, "saved {}", self.path.display())?;
        }
        Ok(())
    }

    // `change` runs on a copy of the family, which replaces the original
    // only when `change` succeeds with `Outcome::Changed`.
    fn edit<F>(&mut self, change: F) -> Result<Outcome>
    where
        F: FnOnce(&mut Family, NameStyle) -> FamilyResult<Outcome>,
    {
        let mut draft = self.family.clone();
        let outcome = change(&mut draft, self.style)?;
        if matches!(outcome, Outcome::Changed(_)) {
            self.family = draft;
            self.dirty = true;
        }
        Ok(outcome)
    }

    fn report(&self, query: impl FnOnce(&Self) -> FamilyResult<String>) -> Result<Outcome> {
        Ok(Outcome::Report(query(self)?))
    }

    fn name_of(&self, person: &Person) -> String {
        label(person, self.style)
    }

    fn list(&self, persons: Vec<&Person>, when_empty: &str) -> String {
        if persons.is_empty() {
            return when_empty.to_string();
        }
        persons
            .into_iter()
            .map(|p| self.name_of(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn show(&self, person: &PersonRef) -> FamilyResult<String> {
        let person = lookup(&self.family, person)?;
        let family = &self.family;
        let mut lines = vec![format!("{}, {}", self.name_of(&person), person.gender())];
        if let Some(nickname) = &person.name().nickname {
            lines.push(format!("  nickname: {nickname}"));
        }
        if let Some(father) = family.father(&person) {
            lines.push(format!("  father: {}", self.name_of(father)));
        }
        if let Some(mother) = family.mother(&person) {
            lines.push(format!("  mother: {}", self.name_of(mother)));
        }
        for spouse in family.all_spouses(&person) {
            lines.push(format!("  spouse: {}", self.name_of(spouse)));
        }
        for child in family.children(&person)? {
            lines.push(format!("  child: {}", self.name_of(child)));
        }
        for note in person.notes() {
            lines.push(format!("  note: {note}"));
        }
        Ok(lines.join("\n"))
    }

    fn people(&self) -> String {
        self.list(self.family.persons().collect(), "nobody yet")
    }

    fn couples(&self) -> String {
        let couples = self.family.couples();
        if couples.is_empty() {
            return "no couples yet".to_string();
        }
        couples
            .into_iter()
            .map(|(a, b)| format!("{} and {}", self.name_of(a), self.name_of(b)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn notes(&self, person: Option<&PersonRef>) -> FamilyResult<String> {
        let Some(person) = person else {
            return Ok(self.list(self.family.people_with_notes(), "nobody has any notes yet"));
        };
        let person = lookup(&self.family, person)?;
        if person.notes().is_empty() {
            return Ok(format!("no notes about {}", self.name_of(&person)));
        }
        Ok(person
            .notes()
            .iter()
            .enumerate()
            .map(|(i, note)| format!("{}. {}", i + 1, note))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn preview(&self, chart: Chart) -> Result<Outcome> {
        let base = self.preview_dir.join(config::DEFAULT_BASE);
        let first_names_only = matches!(chart, Chart::Rigid { first_names_only: true });
        let (paths, svg) = render::write_charts(&self.family, &base, self.style, first_names_only)
            .context("Failed to write preview")?;
        let shown = match chart {
            Chart::Floating => &paths.html,
            Chart::Rigid { .. } if svg == render::SvgOutcome::Written => &paths.svg,
            Chart::Rigid { .. } => &paths.dot,
        };
        Ok(Outcome::Report(format!("chart written to {}", shown.display())))
    }
}

fn label(person: &Person, style: NameStyle) -> String {
    person.display_string(style, true)
}

fn lookup(family: &Family, person: &PersonRef) -> FamilyResult<Person> {
    match person {
        PersonRef::Id(id) => family.person(*id).cloned(),
        PersonRef::Name(name) => family.find_by_name(name).cloned(),
    }
}

// New relatives are registered right away so a second `new` in the same
// command gets the next id.
fn materialize(family: &mut Family, relative: &Relative) -> FamilyResult<Person> {
    match relative {
        Relative::Existing(person) => lookup(family, person),
        Relative::New { gender, name } => {
            let person = Person::new(family.next_id()?, name.clone(), *gender)?;
            family.add_person(person.clone());
            Ok(person)
        }
    }
}

// Father or mother by the parent's gender, with the one-of-each check.
fn add_parent(family: &mut Family, child: &Person, parent: &Person) -> FamilyResult<()> {
    match parent.gender().parent_relation() {
        Some(Relation::Father) => family.add_father(child, parent),
        Some(Relation::Mother) => family.add_mother(child, parent),
        _ => Err(FamilyError::UnknownParentGender(
            parent.display_string(NameStyle::FullName, true),
        )),
    }
}

fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
