use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use renderer::{ContributedSource, RenderOptions, Scope, ScopeBuilder, SlotRegistry, Value};
use stencil::SlotId;
use stencil::parser::Parser;

/// Everything a render needs besides the template: properties, synthetic
/// namespaces and slot contributions.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    /// Pack id used for slot lookups and bare slot names.
    #[serde(default)]
    pub pack: Option<String>,

    /// Group used when expanding bare slot names.
    #[serde(default)]
    pub slot_group: Option<String>,

    /// Columns stripped per indentation level.
    #[serde(default)]
    pub indent_width: Option<usize>,

    /// Properties; nested tables become dotted names.
    #[serde(default)]
    pub properties: toml::Table,

    /// Reserved namespaces such as `_project`, bound as-is.
    #[serde(default)]
    pub synthetic: toml::Table,

    #[serde(default)]
    pub slots: Vec<SlotContribution>,
}

#[derive(Debug, Deserialize)]
pub struct SlotContribution {
    /// Full `slot://` address or a bare slot name.
    pub target: String,
    /// The contributing pack.
    pub pack: String,
    pub text: String,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("TOML parse error: {}", e))
    }

    pub fn pack(&self) -> &str {
        self.pack.as_deref().unwrap_or("default")
    }

    pub fn slot_group(&self) -> &str {
        self.slot_group.as_deref().unwrap_or("source")
    }

    pub fn parser(&self, source: String, file_id: usize) -> Parser {
        Parser::new(source, file_id)
            .with_pack(self.pack())
            .with_slot_group(self.slot_group())
    }

    pub fn render_options(&self) -> RenderOptions {
        let defaults = RenderOptions::default();
        RenderOptions {
            pack_id: self.pack().to_string(),
            indent_width: self.indent_width.unwrap_or(defaults.indent_width),
        }
    }

    /// Build the root scope. `overrides` win over manifest properties.
    pub fn scope(&self, overrides: &[(String, Value)]) -> Scope {
        let mut properties = Vec::new();
        flatten_properties("", &self.properties, &mut properties);
        let mut builder = ScopeBuilder::new()
            .properties(properties)
            .properties(overrides.iter().map(|(k, v)| (k.as_str(), v.clone())));
        for (namespace, value) in &self.synthetic {
            builder = builder.synthetic(namespace, to_value(value));
        }
        builder.build()
    }

    pub fn slot_registry(&self) -> Result<SlotRegistry, String> {
        let mut registry = SlotRegistry::new();
        for contribution in &self.slots {
            let target = if SlotId::is_uri(&contribution.target) {
                SlotId::parse(&contribution.target)
                    .ok_or_else(|| format!("malformed slot address '{}'", contribution.target))?
            } else {
                SlotId::new(self.slot_group(), self.pack(), contribution.target.as_str())
            };
            registry.contribute(
                target,
                ContributedSource::new(contribution.pack.as_str(), contribution.text.as_str()),
            );
        }
        Ok(registry)
    }
}

fn flatten_properties(prefix: &str, table: &toml::Table, out: &mut Vec<(String, Value)>) {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(nested) => flatten_properties(&name, nested, out),
            other => out.push((name, to_value(other))),
        }
    }
}

/// Convert a TOML value. Integers that fit 32 bits become `Int`.
pub fn to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => match i32::try_from(*n) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Long(*n),
        },
        toml::Value::Float(f) => Value::Double(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(to_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), to_value(v)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

/// Parse a `--var key=value` flag.
pub fn parse_var(arg: &str) -> Result<(String, Value), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing property name in '{}'", arg));
    }
    Ok((key.to_string(), parse_scalar(value)))
}

/// Numbers become Int, Long or Double, "true"/"false" become Boolean,
/// everything else is a String.
fn parse_scalar(s: &str) -> Value {
    let numeric = s.starts_with(|c: char| c.is_ascii_digit() || c == '-');
    if numeric {
        if let Ok(n) = s.parse::<i32>() {
            return Value::Int(n);
        }
        if let Ok(n) = s.parse::<i64>() {
            return Value::Long(n);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Double(f);
        }
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stencil::{Requirement, Slot};
    use renderer::SlotLookup;

    const MANIFEST: &str = r#"
pack = "core"
indent_width = 2

[properties]
name = "demo"
modules = ["api", "web"]

[properties.db]
url = "jdbc:h2"
pool = 4

[synthetic._project]
group = "com.example"

[[slots]]
target = "routes"
pack = "auth"
text = "get(\"/login\")"

[[slots]]
target = "slot://build/gradle/plugins"
pack = "kotlin"
text = "kotlin(\"jvm\")"
"#;

    #[test]
    fn manifest_builds_scope_and_slots() {
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.render_options().indent_width, 2);
        assert_eq!(manifest.render_options().pack_id, "core");

        let scope = manifest.scope(&[("db.pool".to_string(), Value::Int(8))]);
        assert_eq!(scope.get("name"), Value::from("demo"));
        assert_eq!(scope.get("db.url"), Value::from("jdbc:h2"));
        assert_eq!(scope.get("db.pool"), Value::Int(8));
        assert_eq!(scope.get("modules.size"), Value::Int(2));
        assert_eq!(scope.get("_project.group"), Value::from("com.example"));

        let registry = manifest.slot_registry().unwrap();
        let routes = Slot {
            target: SlotId::new("source", "core", "routes"),
            requirement: Requirement::Optional,
        };
        let found = registry.lookup("core", &routes);
        assert_eq!(found, vec![ContributedSource::new("auth", "get(\"/login\")")]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn malformed_slot_targets_are_rejected() {
        let manifest: Manifest =
            toml::from_str("[[slots]]\ntarget = \"slot://x\"\npack = \"a\"\ntext = \"\"\n").unwrap();
        assert!(manifest.slot_registry().is_err());
    }

    #[test]
    fn vars_are_typed() {
        assert_eq!(parse_var("n=42").unwrap(), ("n".to_string(), Value::Int(42)));
        assert_eq!(parse_var("big=5000000000").unwrap().1, Value::Long(5_000_000_000));
        assert_eq!(parse_var("ratio=0.5").unwrap().1, Value::Double(0.5));
        assert_eq!(parse_var("on=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_var("name=a=b").unwrap().1, Value::from("a=b"));
        assert_eq!(parse_var("v=1.2.3").unwrap().1, Value::from("1.2.3"));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }
}
