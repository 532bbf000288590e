use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::family::Family;
use crate::records::FamilyRecords;

/// On-disk encoding of a relations file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

impl Format {
    /// Validate the relations file path and pick its format
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Format::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Ok(Format::Yaml)
            }
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
            Some(ext) => bail!(
                "Unsupported relations file extension '.{}' (must be .toml, .yaml or .json)",
                ext
            ),
            None => bail!("Relations file must have a .toml, .yaml or .json extension"),
        }
    }
}

/// Decode a relations file's text
pub fn parse_records(text: &str, format: Format) -> Result<FamilyRecords> {
    let records = match format {
        Format::Toml => toml::from_str(text).context("Not a well-formed TOML relations file")?,
        Format::Yaml => {
            serde_yaml::from_str(text).context("Not a well-formed YAML relations file")?
        }
        Format::Json => {
            serde_json::from_str(text).context("Not a well-formed JSON relations file")?
        }
    };
    Ok(records)
}

/// Encode records in the given format
pub fn records_to_string(records: &FamilyRecords, format: Format) -> Result<String> {
    let text = match format {
        Format::Toml => toml::to_string(records).context("Failed to encode relations as TOML")?,
        Format::Yaml => {
            serde_yaml::to_string(records).context("Failed to encode relations as YAML")?
        }
        Format::Json => serde_json::to_string_pretty(records)
            .context("Failed to encode relations as JSON")?,
    };
    Ok(text)
}

/// Read a relations file and build the family it describes
pub fn load_family(path: &Path) -> Result<Family> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Couldn't open {}", path.display()))?;
    family_from_text(&text, format, path)
}

/// Like [`load_family`], but a missing or blank file is an empty family
pub fn load_family_or_empty(path: &Path) -> Result<Family> {
    let format = Format::from_path(path)?;
    if !path.exists() {
        warn!(path = %path.display(), "relations file doesn't exist yet; starting an empty family");
        return Ok(Family::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Couldn't open {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Family::new());
    }
    family_from_text(&text, format, path)
}

fn family_from_text(text: &str, format: Format, path: &Path) -> Result<Family> {
    let records = parse_records(text, format)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let family = records
        .into_family()
        .with_context(|| format!("Inconsistent relations in {}", path.display()))?;
    info!(path = %path.display(), persons = family.len(), "loaded family");
    Ok(family)
}

/// Write the family to `path`, replacing any previous content
///
/// The text goes to a sibling `.tmp` file that is then renamed over `path`.
pub fn save_family(path: &Path, family: &Family) -> Result<()> {
    let format = Format::from_path(path)?;
    let text = records_to_string(&FamilyRecords::from_family(family), format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    info!(path = %path.display(), persons = family.len(), "saved family");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the sample family to `path` in the format its extension names
pub fn write_example(path: &Path) -> Result<()> {
    let format = Format::from_path(path)?;
    let text = match format {
        Format::Toml => EXAMPLE_TOML.to_string(),
        Format::Yaml | Format::Json => {
            records_to_string(&parse_records(EXAMPLE_TOML, Format::Toml)?, format)?
        }
    };
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote example relations file");
    Ok(())
}

/// The Flintstones and the Rubbles.
pub const EXAMPLE_TOML: &str = r#"father = [[2, 7], [2, 16], [7, 9], [9, 11], [12, 15], [4, 3], [3, 13], [3, 6]]

mother = [[5, 3], [10, 15], [1, 7], [1, 16], [15, 11], [11, 6], [11, 13], [8, 9]]

spouse = [[9, 14]]

[[people]]
surname = ""
given_names = ["???"]
gender = "f"
uid = 1

[[people]]
surname = ""
given_names = ["???"]
gender = "m"
uid = 2

[[people]]
surname = "Rubble"
given_names = ["Bamm-Bamm"]
gender = "m"
uid = 3

[[people]]
given_names = ["Barney"]
surname = "Rubble"
gender = "m"
uid = 4

[[people]]
given_names = ["Betty", "Jean"]
surname = "McBricker"
gender = "f"
uid = 5

[[people]]
given_names = ["Chip"]
surname = "Rubble"
gender = "m"
uid = 6

[[people]]
given_names = ["Ed"]
surname = "Flintstone"
gender = "m"
uid = 7

[[people]]
given_names = ["Edna", "Hardrock"]
surname = "Flintstone"
gender = "f"
uid = 8

[[people]]
given_names = ["Frederick", "Joseph"]
nickname = "Fred"
surname = "Flintstone"
gender = "m"
uid = 9

[[people]]
given_names = ["Pearl", "Pebble"]
surname = "Slaghoople"
gender = "f"
uid = 10

[[people]]
given_names = ["Pebbles"]
surname = "Flintstone"
gender = "f"
uid = 11

[[people]]
given_names = ["Ricky"]
surname = "Slaghoople"
gender = "m"
uid = 12

[[people]]
given_names = ["Roxy"]
surname = "Rubble"
gender = "f"
uid = 13

[[people]]
given_names = ["Secret"]
surname = "Ex-Wife"
gender = "f"
uid = 14
notes = ["Gossip", "More gossip"]

[[people]]
given_names = ["Wilma", "Pebbles"]
surname = "Slaghoople"
gender = "f"
uid = 15

[[people]]
given_names = ["Zeke"]
surname = "Flintstone"
gender = "m"
uid = 16
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::PersonId;
    use tempfile::TempDir;

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/relations.toml")).unwrap(), Format::Toml);
        assert_eq!(Format::from_path(Path::new("x.JSON")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("relations.yml")).unwrap(), Format::Yaml);
        assert!(Format::from_path(Path::new("relations.txt")).is_err());
        assert!(Format::from_path(Path::new("relations")).is_err());
    }

    #[test]
    fn example_parses() {
        let family = parse_records(EXAMPLE_TOML, Format::Toml)
            .unwrap()
            .into_family()
            .unwrap();
        assert_eq!(family.len(), 16);
        let fred = family.person(PersonId(9)).unwrap();
        assert_eq!(fred.name().nickname.as_deref(), Some("Fred"));
        assert_eq!(family.father(fred).map(|p| p.id()), Some(PersonId(7)));
        assert_eq!(family.mother(fred).map(|p| p.id()), Some(PersonId(8)));
        // Both unknown grandparents are named "???".
        assert_eq!(family.new_anonymous_name(), "????");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = parse_records("father = [[1, 2]", Format::Toml).unwrap_err();
        assert!(format!("{:#}", err).contains("TOML"));
    }

    #[test]
    fn save_then_load_in_every_format() {
        let dir = TempDir::new().unwrap();
        let original = parse_records(EXAMPLE_TOML, Format::Toml)
            .unwrap()
            .into_family()
            .unwrap();
        for name in ["out.toml", "out.yaml", "nested/out.json"] {
            let path = dir.path().join(name);
            save_family(&path, &original).unwrap();
            assert_eq!(load_family(&path).unwrap(), original);
        }
    }

    #[test]
    fn uids_must_fit_in_toml() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("big.json");
        let toml = dir.path().join("big.toml");
        let file =
            |uid: u64| format!(r#"{{"people": [{{"given_names": ["Zeke"], "uid": {uid}}}]}}"#);

        fs::write(&json, file(u64::MAX)).unwrap();
        let err = load_family(&json).unwrap_err();
        assert!(format!("{err:#}").contains("out of range"));

        fs::write(&json, file(PersonId::MAX.0)).unwrap();
        let family = load_family(&json).unwrap();
        save_family(&toml, &family).unwrap();
        assert_eq!(load_family(&toml).unwrap(), family);
    }

    #[test]
    fn missing_or_blank_file_is_empty_family() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.toml");
        assert!(load_family_or_empty(&path).unwrap().is_empty());
        assert!(load_family(&path).is_err());

        fs::write(&path, "  \n").unwrap();
        assert!(load_family_or_empty(&path).unwrap().is_empty());
    }

    #[test]
    fn example_written_in_every_format_matches() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("example.toml");
        write_example(&toml_path).unwrap();
        let expected = load_family(&toml_path).unwrap();
        for name in ["example.yaml", "example.json"] {
            let path = dir.path().join(name);
            write_example(&path).unwrap();
            assert_eq!(load_family(&path).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn yaml_relations_file() {
        let text = "\
father:
- [1, 2]
people:
- uid: 1
  given_names: [Ed]
  surname: Flintstone
  gender: m
- uid: 2
  given_names: [Fred]
  surname: Flintstone
  gender: m
";
        let family = parse_records(text, Format::Yaml).unwrap().into_family().unwrap();
        let fred = family.person(PersonId(2)).unwrap();
        assert_eq!(family.father(fred).map(|p| p.id()), Some(PersonId(1)));
        assert!(parse_records("father: [[1, 2]", Format::Yaml).is_err());
    }
}
