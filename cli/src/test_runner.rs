use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use renderer::render_template;

use crate::manifest::Manifest;

const FIXTURE_SUFFIX: &str = ".test.stencil";

/// Front matter of a `.test.stencil` fixture.
#[derive(Debug, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Expected rendered output (trailing whitespace ignored).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Substring the render error's message must contain.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// The analyzer must reject the template.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Pack, properties and slot contributions, as in a render manifest.
    #[serde(flatten)]
    pub manifest: Manifest,
}

enum Expectation<'c> {
    ParseError,
    Error(&'c str),
    Output(&'c str),
    Renders,
}

impl TestConfig {
    fn expectation(&self) -> Expectation<'_> {
        if self.expect_parse_error {
            Expectation::ParseError
        } else if let Some(error) = &self.expect_error {
            Expectation::Error(error)
        } else if let Some(output) = &self.expect_output {
            Expectation::Output(output)
        } else {
            Expectation::Renders
        }
    }
}

/// Separate `---` delimited TOML front matter from the template body.
fn split_front_matter(content: &str) -> Result<(&str, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let Some(rest) = content.strip_prefix("---") else {
        return Err("fixture must start with a --- line".into());
    };
    let rest = rest.trim_start_matches('\r').strip_prefix('\n').unwrap_or(rest);

    let Some(end) = rest.find("\n---") else {
        return Err("front matter is not closed by a --- line".into());
    };
    let front = rest[..end].trim_end_matches('\r');
    let body = rest[end + "\n---".len()..].trim_start_matches('\r');
    Ok((front, body.strip_prefix('\n').unwrap_or(body)))
}

struct Fixture {
    config: TestConfig,
    source: String,
}

impl Fixture {
    fn load(path: &Path) -> Result<Fixture, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("cannot read file: {}", e))?;
        let (front, source) = split_front_matter(&content)?;
        let config = toml::from_str(front).map_err(|e| format!("bad front matter: {}", e))?;
        Ok(Fixture {
            config,
            source: source.to_string(),
        })
    }

    fn label(&self, path: &Path) -> String {
        match &self.config.description {
            Some(description) => description.clone(),
            None => fixture_name(path),
        }
    }

    /// Analyze and render, then compare with the expectation.
    fn check(&self) -> Result<(), String> {
        let manifest = &self.config.manifest;
        let analyzed = manifest.parser(self.source.clone(), 0).parse();

        let template = match (self.config.expectation(), analyzed) {
            (Expectation::ParseError, Err(_)) => return Ok(()),
            (Expectation::ParseError, Ok(_)) => {
                return Err("the analyzer accepted a template it should reject".into());
            }
            (_, Err(errors)) => {
                let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                return Err(format!("analysis failed: {}", messages.join("; ")));
            }
            (_, Ok(template)) => template,
        };

        let slots = manifest.slot_registry().map_err(|e| format!("bad manifest: {}", e))?;
        let rendered = render_template(
            &template,
            manifest.scope(&[]),
            &slots,
            &manifest.render_options(),
        );

        match (self.config.expectation(), rendered) {
            (Expectation::Error(wanted), Err(error)) => {
                let message = error.to_string();
                if message.contains(wanted) {
                    Ok(())
                } else {
                    Err(format!("error {:?} does not mention {:?}", message, wanted))
                }
            }
            (Expectation::Error(wanted), Ok(_)) => {
                Err(format!("rendered without the expected error {:?}", wanted))
            }
            (_, Err(error)) => Err(format!("render failed: {}", error)),
            (Expectation::Output(wanted), Ok(actual)) => {
                let (wanted, actual) = (wanted.trim_end(), actual.trim_end());
                if wanted == actual {
                    Ok(())
                } else {
                    Err(format!(
                        "output differs\n  expected: {:?}\n  actual:   {:?}",
                        wanted, actual
                    ))
                }
            }
            (_, Ok(_)) => Ok(()),
        }
    }
}

fn fixture_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.trim_end_matches(FIXTURE_SUFFIX).to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load and check one fixture, returning its label and verdict.
fn run_fixture(path: &Path) -> (String, Result<(), String>) {
    match Fixture::load(path) {
        Ok(fixture) => (fixture.label(path), fixture.check()),
        Err(reason) => (fixture_name(path), Err(reason)),
    }
}

/// Fixture files grouped by category: the folder path relative to the root,
/// `""` for files directly inside it.
struct Suite {
    categories: BTreeMap<String, Vec<PathBuf>>,
}

impl Suite {
    fn discover(root: &Path) -> Suite {
        let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for path in entries.flatten().map(|entry| entry.path()) {
                if path.is_dir() {
                    pending.push(path);
                } else if path.to_string_lossy().ends_with(FIXTURE_SUFFIX) {
                    let category = dir
                        .strip_prefix(root)
                        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                        .unwrap_or_default();
                    categories.entry(category).or_default().push(path);
                }
            }
        }
        for files in categories.values_mut() {
            files.sort();
        }
        Suite { categories }
    }

    fn single(path: &Path) -> Suite {
        Suite {
            categories: BTreeMap::from([(String::new(), vec![path.to_path_buf()])]),
        }
    }

    fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Keep the requested categories and their subcategories. Unknown names
    /// are reported and ignored.
    fn select(self, requested: &[String]) -> Suite {
        if requested.is_empty() {
            return self;
        }
        let wanted: Vec<&str> = requested.iter().map(|r| r.trim_matches('/')).collect();
        for name in &wanted {
            if !self.categories.keys().any(|cat| in_category(cat, name)) {
                eprintln!(
                    "warning: no category '{}' (have: {})",
                    name,
                    self.names().join(", ")
                );
            }
        }
        let categories = self
            .categories
            .into_iter()
            .filter(|(cat, _)| wanted.iter().any(|name| in_category(cat, name)))
            .collect();
        Suite { categories }
    }

    fn names(&self) -> Vec<&str> {
        self.categories.keys().map(|cat| display_category(cat)).collect()
    }
}

fn in_category(category: &str, name: &str) -> bool {
    category
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn display_category(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// ANSI styling, disabled by `--no-color`.
#[derive(Clone, Copy)]
struct Style {
    color: bool,
}

impl Style {
    fn paint(self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(self) -> String {
        self.paint("31", "FAIL")
    }

    fn heading(self, text: &str) -> String {
        self.paint("1", text)
    }
}

#[derive(Default)]
struct Report {
    passed: usize,
    failures: Vec<(PathBuf, String)>,
}

impl Report {
    fn print(&self, style: Style) {
        if !self.failures.is_empty() {
            eprintln!();
            eprintln!("failures:");
            for (path, reason) in &self.failures {
                eprintln!();
                eprintln!("  --- {} ---", path.display());
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }

        eprintln!();
        let failed = self.failures.len();
        if failed == 0 {
            eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), self.passed);
        } else {
            eprintln!(
                "test result: {}. {} passed, {} failed (of {})",
                style.paint("31", "FAILED"),
                self.passed,
                failed,
                self.passed + failed
            );
        }
    }
}

/// Print the categories found under `path` with their fixture counts.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let suite = Suite::discover(path);
    if suite.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &suite.categories {
        eprintln!("  {} ({} tests)", display_category(category), files.len());
    }
}

/// Run every fixture under `path` (or the single fixture `path`), limited to
/// `categories` when non-empty. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };
    let single = path.is_file();
    let suite = if single {
        Suite::single(path)
    } else {
        let all = Suite::discover(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        all.select(categories)
    };
    if suite.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut report = Report::default();
    for (category, files) in &suite.categories {
        if !single {
            eprintln!();
            eprintln!("{}", style.heading(display_category(category)));
        }
        for file in files {
            let (label, verdict) = run_fixture(file);
            match verdict {
                Ok(()) => {
                    report.passed += 1;
                    eprintln!("  {}  {}", style.pass(), label);
                }
                Err(reason) => {
                    eprintln!("  {}  {}", style.fail(), label);
                    report.failures.push((file.clone(), reason));
                }
            }
        }
    }

    report.print(style);
    if report.failures.is_empty() { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PASSING: &str = r#"---
description = "greets"
expect_output = "Hello, World!"

[properties]
name = "World"
---
Hello, {{ name }}!
"#;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn front_matter_is_split_from_the_template() {
        let (front, source) = split_front_matter(PASSING).unwrap();
        assert!(front.starts_with("description = \"greets\""));
        assert!(front.ends_with("name = \"World\""));
        assert_eq!(source, "Hello, {{ name }}!\n");

        let (front, source) = split_front_matter("---\r\nx = 1\r\n---\r\nbody").unwrap();
        assert_eq!((front, source), ("x = 1", "body"));

        assert!(split_front_matter("no front matter").is_err());
        assert!(split_front_matter("---\nx = 1\n").is_err());
    }

    #[test]
    fn single_fixture_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let pass = write(dir.path(), "pass.test.stencil", PASSING);
        assert_eq!(run_fixture(&pass), ("greets".to_string(), Ok(())));

        let wrong = write(
            dir.path(),
            "wrong.test.stencil",
            "---\nexpect_output = \"nope\"\n---\nyes\n",
        );
        let (label, verdict) = run_fixture(&wrong);
        assert_eq!(label, "wrong");
        assert!(verdict.unwrap_err().contains("output differs"));

        let error = write(
            dir.path(),
            "error.test.stencil",
            "---\nexpect_error = \"by zero\"\n---\n{{ 1 / 0 }}\n",
        );
        assert_eq!(run_fixture(&error).1, Ok(()));

        let parse = write(
            dir.path(),
            "parse.test.stencil",
            "---\nexpect_parse_error = true\n---\n{% if a %}\n",
        );
        assert_eq!(run_fixture(&parse).1, Ok(()));

        let broken = write(dir.path(), "broken.test.stencil", "---\n= nope\n---\n");
        assert!(run_fixture(&broken).1.unwrap_err().contains("bad front matter"));
    }

    #[test]
    fn categories_filter_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "basics/greet.test.stencil", PASSING);
        write(dir.path(), "basics/nested/greet.test.stencil", PASSING);
        write(
            dir.path(),
            "broken/bad.test.stencil",
            "---\nexpect_output = \"x\"\n---\ny\n",
        );

        let suite = Suite::discover(dir.path());
        assert_eq!(suite.names(), vec!["basics", "basics/nested", "broken"]);
        let selected = Suite::discover(dir.path()).select(&["basics".to_string()]);
        assert_eq!(selected.names(), vec!["basics", "basics/nested"]);

        assert_eq!(run_tests(dir.path(), true, &["basics".to_string()]), 0);
        assert_eq!(run_tests(dir.path(), true, &[]), 1);
        assert_eq!(run_tests(dir.path(), true, &["missing".to_string()]), 1);
    }

    #[test]
    fn repository_fixtures_pass() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures");
        assert_eq!(run_tests(&fixtures, true, &[]), 0);
    }
}
