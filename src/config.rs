//! Defaults shared by the command line and the edit session.
//!
//! Every default can be overridden per run with a flag or its environment
//! variable (see `pedigree --help`).

use std::path::PathBuf;

/// Relations file read when `--input` / `PEDIGREE_INPUT` is not given
pub const DEFAULT_INPUT: &str = "relations.toml";

/// Base path of generated charts (`family_tree.html`, `.dot`, `.svg`)
pub const DEFAULT_BASE: &str = "family_tree";

/// Name style of the floating chart
pub const DEFAULT_STYLE: &str = "full name";

pub const ENV_INPUT: &str = "PEDIGREE_INPUT";
pub const ENV_BASE: &str = "PEDIGREE_BASE";
pub const ENV_STYLE: &str = "PEDIGREE_STYLE";

/// Where the edit session writes preview charts.
///
/// `<cache dir>/pedigree`, or `<temp dir>/pedigree` on platforms without a
/// cache directory.
pub fn preview_dir() -> PathBuf {
    let mut path = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    path.push("pedigree");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_dir_is_namespaced() {
        assert!(preview_dir().ends_with("pedigree"));
    }
}
