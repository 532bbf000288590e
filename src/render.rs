//! Charts of a family.
//!
//! Two renderings are produced:
//!
//! - a floating chart: a self-contained HTML page running a D3 force layout
//!   over the family's persons and edges, and
//! - a rigid chart: a Graphviz `digraph` that `dot` lays out as SVG.
//!
//! Mother links are red on the floating chart and orange on the rigid one,
//! father links blue on both, and spouse links dashed/dotted.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::family::{Family, Relation};
use crate::person::{NameStyle, PersonId};

#[derive(Debug, Serialize)]
struct Node {
    id: PersonId,
    name: String,
}

#[derive(Debug, Serialize)]
struct Link {
    source: PersonId,
    target: PersonId,
    #[serde(rename = "type")]
    relation: Relation,
}

/// Data embedded in the floating chart.
#[derive(Debug, Serialize)]
pub struct GraphData {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

pub fn graph_data(family: &Family, style: NameStyle) -> GraphData {
    GraphData {
        nodes: family
            .persons()
            .map(|p| Node {
                id: p.id(),
                name: p.display_string(style, true),
            })
            .collect(),
        links: family
            .edges()
            .map(|(source, target, relation)| Link {
                source: source.id(),
                target: target.id(),
                relation,
            })
            .collect(),
    }
}

/// The floating chart as a complete HTML page.
pub fn html_page(family: &Family, style: NameStyle) -> serde_json::Result<String> {
    let json = serde_json::to_string(&graph_data(family, style))?;
    // Keep a name like "</script>" from closing the script element.
    let json = json.replace("</", "<\\/");
    Ok(format!("{HTML_HEAD}var graph = {json};\n{HTML_TAIL}"))
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<meta charset="utf-8">
<style>
.link {
  fill: none;
  stroke: #666;
  stroke-width: 1.5px;
}
#mother { fill: red; }
.link.mother { stroke: red; }
#father { fill: blue; }
.link.father { stroke: blue; }
.link.spouse { stroke-dasharray: 0,7 1; }
circle {
  fill: #ccc;
  stroke: #333;
  stroke-width: 1.5px;
}
text {
  font: 10px sans-serif;
  pointer-events: none;
  text-shadow: 0 1px 0 #fff, 1px 0 0 #fff, 0 -1px 0 #fff, -1px 0 0 #fff;
}
</style>
<body>
<script src="https://d3js.org/d3.v3.min.js"></script>
<script>
"#;

const HTML_TAIL: &str = r#"
var index = {};
graph.nodes.forEach(function(node, i) { index[node.id] = i; });
var links = graph.links.map(function(link) {
  return {source: index[link.source], target: index[link.target], type: link.type};
});

var width = 2 * 1260,
    height = 2 * 800;

var force = d3.layout.force()
    .nodes(graph.nodes)
    .links(links)
    .size([width, height])
    .chargeDistance(400)
    .linkDistance(60)
    .gravity(0.01)
    .charge(-300)
    .on("tick", tick)
    .start();

var svg = d3.select("body").append("svg")
    .attr("width", width)
    .attr("height", height);

svg.append("defs").selectAll("marker")
    .data(["father", "mother", "spouse"])
  .enter().append("marker")
    .attr("id", function(d) { return d; })
    .attr("viewBox", "0 -5 10 10")
    .attr("refX", 15)
    .attr("refY", -1.5)
    .attr("markerWidth", 6)
    .attr("markerHeight", 6)
    .attr("orient", "auto")
  .append("path")
    .attr("d", "M0,-5L10,0L0,5");

var path = svg.append("g").selectAll("path")
    .data(force.links())
  .enter().append("path")
    .attr("class", function(d) { return "link " + d.type; })
    .attr("marker-end", function(d) { return "url(#" + d.type + ")"; });

var circle = svg.append("g").selectAll("circle")
    .data(force.nodes())
  .enter().append("circle")
    .attr("r", 6)
    .call(force.drag);

var text = svg.append("g").selectAll("text")
    .data(force.nodes())
  .enter().append("text")
    .attr("x", 8)
    .attr("y", ".31em")
    .text(function(d) { return d.name; });

function tick() {
  path.attr("d", linkArc);
  circle.attr("transform", transform);
  text.attr("transform", transform);
}

function linkArc(d) {
  var dx = d.target.x - d.source.x,
      dy = d.target.y - d.source.y,
      dr = Math.sqrt(dx * dx + dy * dy);
  return "M" + d.source.x + "," + d.source.y + "A" + dr + "," + dr + " 0 0,1 " + d.target.x + "," + d.target.y;
}

function transform(d) {
  return "translate(" + d.x + "," + d.y + ")";
}
</script>
</body>
</html>
"#;

/// The rigid chart in Graphviz dot syntax.
pub fn dot_graph(family: &Family, first_names_only: bool) -> String {
    let mut out = String::from("digraph family_tree {\n");

    for person in family.persons() {
        let label = if first_names_only {
            person.first_name().to_string()
        } else {
            person.full_name()
        };
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\", shape=\"box\"];\n",
            person.id(),
            escape_dot(&label)
        ));
    }

    for relation in [Relation::Father, Relation::Mother, Relation::Spouse] {
        let attrs = match relation {
            Relation::Father => "color=blue",
            Relation::Mother => "color=orange",
            Relation::Spouse => "style=\"dotted\", dir=none",
        };
        for (source, target, _) in family.edges().filter(|(_, _, r)| *r == relation) {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [{}];\n",
                source.id(),
                target.id(),
                attrs
            ));
        }
    }

    out.push_str("}\n");
    out
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn run_dot(dot_path: &Path, svg_path: &Path) -> io::Result<ExitStatus> {
    Command::new("dot")
        .arg("-Tsvg")
        .arg("-o")
        .arg(svg_path)
        .arg(dot_path)
        .status()
}

/// Whether [`render_svg`] produced a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgOutcome {
    Written,
    /// No `dot` executable on the `PATH`
    DotMissing,
}

/// Lay out `dot_path` as SVG with Graphviz.
///
/// A missing `dot` is not an error; `dot` failing on the input is.
pub fn render_svg(dot_path: &Path, svg_path: &Path) -> Result<SvgOutcome> {
    let status = match run_dot(dot_path, svg_path) {
        Ok(status) => status,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("graphviz `dot` not found; skipping svg output");
            return Ok(SvgOutcome::DotMissing);
        }
        Err(e) => return Err(e).context("Failed to run `dot`"),
    };
    if !status.success() {
        bail!("`dot` failed on {} ({})", dot_path.display(), status);
    }
    info!(path = %svg_path.display(), "wrote rigid chart");
    Ok(SvgOutcome::Written)
}

/// Output files derived from one base path: `<base>.html`, `<base>.dot`,
/// `<base>.svg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPaths {
    pub html: PathBuf,
    pub dot: PathBuf,
    pub svg: PathBuf,
}

impl ChartPaths {
    pub fn new(base: &Path) -> Self {
        let with = |ext: &str| {
            let mut name = OsString::from(base.as_os_str());
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        };
        Self {
            html: with("html"),
            dot: with("dot"),
            svg: with("svg"),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.html, &self.dot, &self.svg]
    }
}

/// Write both charts next to `base`.
///
/// Returns the paths and whether the SVG was produced. A missing `dot`
/// executable only skips the SVG; any other failure is an error.
pub fn write_charts(
    family: &Family,
    base: &Path,
    style: NameStyle,
    first_names_only: bool,
) -> Result<(ChartPaths, SvgOutcome)> {
    let paths = ChartPaths::new(base);
    if let Some(parent) = paths.html.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let html = html_page(family, style).context("Failed to encode chart data")?;
    fs::write(&paths.html, html)
        .with_context(|| format!("Failed to write {}", paths.html.display()))?;
    info!(path = %paths.html.display(), "wrote floating chart");

    fs::write(&paths.dot, dot_graph(family, first_names_only))
        .with_context(|| format!("Failed to write {}", paths.dot.display()))?;
    info!(path = %paths.dot.display(), "wrote rigid chart source");

    let svg = render_svg(&paths.dot, &paths.svg)?;
    Ok((paths, svg))
}

/// Delete the chart files for `base`. Missing files are ignored; returns
/// the files actually removed.
pub fn remove_charts(base: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in ChartPaths::new(base).all() {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "removed");
                removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()))
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::{Gender, Person, PersonName};
    use tempfile::TempDir;

    fn sample() -> Family {
        let dad = Person::new(1, PersonName::new(["Ed"], "Flintstone"), Gender::Male).unwrap();
        let mom = Person::new(2, PersonName::new(["Edna"], "Hardrock"), Gender::Female).unwrap();
        let fred = Person::new(
            3,
            PersonName::new(["Frederick", "Joseph"], "Flintstone"),
            Gender::Male,
        )
        .unwrap();
        let ex = Person::new(4, PersonName::new(["Secret"], "Ex-Wife"), Gender::Female).unwrap();
        let mut family = Family::new();
        family.add_father(&fred, &dad).unwrap();
        family.add_mother(&fred, &mom).unwrap();
        family.add_spouse(&fred, &ex).unwrap();
        family
    }

    #[test]
    fn graph_data_lists_every_person_and_edge() {
        let data = graph_data(&sample(), NameStyle::LastInitial);
        assert_eq!(data.nodes.len(), 4);
        assert_eq!(data.links.len(), 3);
        assert_eq!(data.nodes[2].name, "Frederick Joseph F. (3)");

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["links"][0]["type"], "father");
        assert_eq!(json["links"][0]["source"], 1);
        assert_eq!(json["links"][0]["target"], 3);
    }

    #[test]
    fn html_page_escapes_closing_tags() {
        let mut family = sample();
        family
            .rename(PersonId(4), PersonName::new(["</script>"], ""))
            .unwrap();
        let page = html_page(&family, NameStyle::FullName).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<\\/script> (4)"));
        assert_eq!(page.matches("</script>").count(), 2);
    }

    #[test]
    fn dot_graph_colours_edges() {
        let dot = dot_graph(&sample(), false);
        assert!(dot.starts_with("digraph family_tree {\n"));
        assert!(dot.contains("  \"3\" [label=\"Frederick Joseph Flintstone\", shape=\"box\"];\n"));
        assert!(dot.contains("  \"1\" -> \"3\" [color=blue];\n"));
        assert!(dot.contains("  \"2\" -> \"3\" [color=orange];\n"));
        assert!(dot.contains("  \"3\" -> \"4\" [style=\"dotted\", dir=none];\n"));
        assert!(dot.ends_with("}\n"));

        let father_line = dot.find("color=blue").unwrap();
        let spouse_line = dot.find("dotted").unwrap();
        assert!(father_line < spouse_line);
    }

    #[test]
    fn dot_graph_first_names_and_quotes() {
        let mut family = sample();
        family
            .rename(PersonId(4), PersonName::new(["\"Secret\""], "Ex-Wife"))
            .unwrap();
        let dot = dot_graph(&family, true);
        assert!(dot.contains("[label=\"Frederick\", shape=\"box\"]"));
        assert!(dot.contains("[label=\"\\\"Secret\\\"\", shape=\"box\"]"));
    }

    #[test]
    fn render_svg_reports_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.dot");
        let out = dir.path().join("out.svg");
        // Either `dot` is missing or it fails on the missing input.
        match render_svg(&missing, &out) {
            Ok(outcome) => assert_eq!(outcome, SvgOutcome::DotMissing),
            Err(e) => assert!(format!("{e:#}").contains("missing.dot")),
        }
        assert!(!out.exists());
    }

    #[test]
    fn chart_paths_append_extensions() {
        let paths = ChartPaths::new(Path::new("out/family.tree"));
        assert_eq!(paths.html, PathBuf::from("out/family.tree.html"));
        assert_eq!(paths.dot, PathBuf::from("out/family.tree.dot"));
        assert_eq!(paths.svg, PathBuf::from("out/family.tree.svg"));
    }

    #[test]
    fn write_then_remove_charts() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("charts").join("family_tree");
        let (paths, svg) = write_charts(&sample(), &base, NameStyle::FullName, false).unwrap();
        assert!(paths.html.exists());
        assert!(paths.dot.exists());
        assert_eq!(paths.svg.exists(), svg == SvgOutcome::Written);

        let removed = remove_charts(&base).unwrap();
        assert_eq!(removed.len(), if svg == SvgOutcome::Written { 3 } else { 2 });
        assert!(!paths.html.exists());
        assert!(remove_charts(&base).unwrap().is_empty());
    }
}
