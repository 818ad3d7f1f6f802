use pretty_assertions::assert_eq;
use renderer::{
    ContributedSource, RenderError, RenderOptions, RuntimeError, Scope, ScopeBuilder, SlotRegistry,
    Value, no_slots, render, render_template,
};
use stencil::parser::Parser;
use stencil::{Block, BlockKind, Expression, Position, SlotId};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn try_render_with(source: &str, scope: Scope, slots: &SlotRegistry) -> Result<String, RenderError> {
    let template = Parser::new(source.to_string(), 0)
        .parse()
        .expect("template should analyze");
    render_template(&template, scope, slots, &RenderOptions::default())
}

fn render_with(source: &str, scope: Scope) -> String {
    try_render_with(source, scope, &SlotRegistry::new()).expect("render failed")
}

fn routes() -> SlotId {
    SlotId::new("source", "default", "routes")
}

#[test]
fn text_without_blocks_is_unchanged() {
    let text = "fun main() {\n    println(\"{{ not parsed }}\")\n}\n";
    assert_eq!(render(text, &[], Scope::new(), &no_slots).unwrap(), text);
}

#[test]
fn hand_built_inline_value() {
    let text = "Hello, {name}!";
    let blocks = vec![Block::new(
        BlockKind::InlineValue {
            expression: Expression::VariableRef("name".to_string()),
            embedded: true,
        },
        Position::leaf(7..13),
    )];
    let scope = ScopeBuilder::new().property("name", "World").build();
    assert_eq!(render(text, &blocks, scope, &no_slots).unwrap(), "Hello, World!");
}

#[test]
fn quoted_and_embedded_values() {
    let scope = ScopeBuilder::new()
        .property("name", "demo")
        .property("port", 8080)
        .build();
    let out = render_with(
        "val name = {{= name }} // {{ name }}\nval port = {{= port }}\n",
        scope,
    );
    assert_eq!(out, "val name = \"demo\" // demo\nval port = 8080\n");
}

#[test]
fn if_else_follows_truthiness() {
    let cases = [
        (Value::Null, "Y"),
        (Value::Bool(true), "X"),
        (Value::Bool(false), "Y"),
        (Value::Int(0), "Y"),
        (Value::Int(3), "X"),
        (Value::Long(0), "X"),
        (Value::Float(0.0), "X"),
        (Value::Double(0.0), "X"),
        (Value::from(""), "Y"),
        (Value::from("a"), "X"),
        (Value::List(vec![]), "Y"),
        (Value::from(vec![1]), "X"),
        (Value::map(Vec::<(String, Value)>::new()), "Y"),
        (Value::map([("a".to_string(), Value::Int(1))]), "X"),
    ];
    for (value, expected) in cases {
        let scope = ScopeBuilder::new().property("cond", value.clone()).build();
        let out = render_with("{% if cond %}X{% else %}Y{% end %}", scope);
        assert_eq!(out, expected, "cond = {:?}", value);
    }
}

#[test]
fn lambdas_are_truthy() {
    let out = render_with("{% if { x -> x } %}L{% else %}N{% end %}", Scope::new());
    assert_eq!(out, "L");
}

#[test]
fn multiline_if_else() {
    let source = "{% if c %}\nX\n{% else %}\nY\n{% end %}\n";
    let on = ScopeBuilder::new().property("c", true).build();
    let off = ScopeBuilder::new().property("c", false).build();
    assert_eq!(render_with(source, on), "X\n");
    assert_eq!(render_with(source, off), "Y\n");
}

#[test]
fn elif_takes_the_first_true_branch() {
    let source = "{% if n == 1 %}one{% elif n == 2 %}two{% elif n > 0 %}many{% else %}none{% end %}";
    let expected = [(1, "one"), (2, "two"), (7, "many"), (0, "none")];
    for (n, word) in expected {
        let scope = ScopeBuilder::new().property("n", n).build();
        assert_eq!(render_with(source, scope), word);
    }
}

#[test]
fn loop_renders_each_item_once_in_order() {
    init_tracing();
    let scope = ScopeBuilder::new().property("xs", vec![1, 2, 3]).build();
    let out = render_with("{% for x in xs %}\n- {{ x }}\n{% end %}\n", scope);
    assert_eq!(out, "- 1\n- 2\n- 3\n");
}

#[test]
fn loop_over_map_entries() {
    let scope = ScopeBuilder::new()
        .property("deps.ktor", "2.3")
        .property("deps.kotlin", "1.9")
        .build();
    let out = render_with(
        "{% for dep in deps %}\n{{ dep.key }}:{{ dep.value }}\n{% end %}\n",
        scope,
    );
    assert_eq!(out, "ktor:2.3\nkotlin:1.9\n");
}

#[test]
fn loop_without_variable_destructures_items() {
    let modules = Value::List(vec![
        Value::map([("name".to_string(), Value::from("api"))]),
        Value::map([("name".to_string(), Value::from("core"))]),
    ]);
    let scope = ScopeBuilder::new()
        .synthetic("_project", Value::map([("modules".to_string(), modules)]))
        .build();
    let out = render_with(
        "{% for _project.modules %}include(\"{{ name }}\")\n{% end %}",
        scope,
    );
    assert_eq!(out, "include(\"api\")\ninclude(\"core\")\n");
}

#[test]
fn empty_loop_on_its_own_line_leaves_nothing() {
    let scope = ScopeBuilder::new().property("xs", Value::List(vec![])).build();
    let out = render_with("a\n{% for x in xs %}\n- {{ x }}\n{% end %}\nb\n", scope);
    assert_eq!(out, "a\nb\n");
}

#[test]
fn indentation_is_stripped_per_level() {
    let source = "\
{% for a in xs %}
    {% if a %}
        - {{ a }}
    {% end %}
{% end %}
";
    let scope = ScopeBuilder::new().property("xs", vec![1, 0, 3]).build();
    assert_eq!(render_with(source, scope), "- 1\n- 3\n");
}

#[test]
fn skipped_last_iteration_leaves_no_blank_line() {
    let source = "{% for x in xs %}\n{% if x > 1 %}\n{{ x }}\n{% end %}\n{% end %}\ndone\n";
    let scope = ScopeBuilder::new().property("xs", vec![2, 1]).build();
    assert_eq!(render_with(source, scope), "2\ndone\n");
}

#[test]
fn skipped_block_on_its_own_line_collapses() {
    let out = render_with("a\n{% if false %}\nX\n{% end %}\nb\n", Scope::new());
    assert_eq!(out, "a\nb\n");

    let out = render_with("a\n    {% if false %}X{% end %}\nb\n", Scope::new());
    assert_eq!(out, "a\nb\n");
}

#[test]
fn skipped_block_sharing_a_line_keeps_the_content() {
    let out = render_with("a {% if false %}X{% end %} b\n", Scope::new());
    assert_eq!(out, "a  b\n");
}

#[test]
fn when_dispatches_on_the_subject() {
    let source = "{% when kind %}\n{% is \"jar\", \"war\" %}\narchive\n{% is \"app\" %}\nbinary\n{% else %}\nother\n{% end %}\n";
    let expected = [("war", "archive\n"), ("app", "binary\n"), ("lib", "other\n")];
    for (kind, out) in expected {
        let scope = ScopeBuilder::new().property("kind", kind).build();
        assert_eq!(render_with(source, scope), out);
    }
}

#[test]
fn unsafe_body_is_copied_verbatim() {
    let out = render_with("{% unsafe %}\n${{ raw }} {% if x %}\n{% end %}\nafter\n", Scope::new());
    assert_eq!(out, "${{ raw }} {% if x %}\nafter\n");
}

#[test]
fn skip_erases_its_region() {
    let out = render_with("keep\n{% skip %}\n{{ boom!! }}\n{% end %}\nkeep\n", Scope::new());
    assert_eq!(out, "keep\nkeep\n");
}

#[test]
fn named_slot_with_two_contributors_fails() {
    let mut slots = SlotRegistry::new();
    slots.contribute(routes(), ContributedSource::new("auth", "a()"));
    slots.contribute(routes(), ContributedSource::new("users", "b()"));
    let err = try_render_with("{% slot routes %}", Scope::new(), &slots).unwrap_err();
    assert_eq!(
        err.error,
        RuntimeError::TooManySlotTargets {
            slot: "slot://source/default/routes".to_string(),
            packs: vec!["auth".to_string(), "users".to_string()],
        }
    );
    assert_eq!(err.span, Some(0..17));
}

#[test]
fn required_slot_without_contributors_fails() {
    let err = try_render_with("{% slot routes required %}", Scope::new(), &SlotRegistry::new())
        .unwrap_err();
    assert!(matches!(err.error, RuntimeError::MissingSlot { .. }));
}

#[test]
fn omitted_slot_without_contributors_renders_nothing() {
    let out = try_render_with("{% slot routes omitted %}", Scope::new(), &SlotRegistry::new());
    assert_eq!(out.unwrap(), "");

    let out = try_render_with(
        "a\n    {% slots routes %}\nb\n",
        Scope::new(),
        &SlotRegistry::new(),
    );
    assert_eq!(out.unwrap(), "a\nb\n");
}

#[test]
fn repeating_slot_splices_at_its_column() {
    let mut slots = SlotRegistry::new();
    slots.contribute(routes(), ContributedSource::new("a", "get(\"/\")\n"));
    slots.contribute(
        routes(),
        ContributedSource::new("b", "\n    post(\"/x\") {\n        ok()\n    }\n"),
    );
    let out = try_render_with("fun main() {\n    {% slots routes %}\n}\n", Scope::new(), &slots);
    assert_eq!(
        out.unwrap(),
        "fun main() {\n    get(\"/\")\n\n    post(\"/x\") {\n        ok()\n    }\n}\n"
    );
}

#[test]
fn rendering_is_idempotent() {
    let source = "{% for x in xs %}{{ x * 2 }},{% end %}{% if flag %}!{% end %}";
    let template = Parser::new(source.to_string(), 0).parse().unwrap();
    let scope = ScopeBuilder::new()
        .property("xs", vec![1, 2, 3])
        .property("flag", true)
        .build();
    let options = RenderOptions::default();
    let first = render_template(&template, scope.clone(), &no_slots, &options).unwrap();
    let second = render_template(&template, scope, &no_slots, &options).unwrap();
    assert_eq!(first, "2,4,6,!");
    assert_eq!(first, second);
}

#[test]
fn division_by_zero() {
    for source in ["{{ 1 / 0 }}", "{{ 1 % 0 }}", "{{ 10L / 0 }}"] {
        let err = try_render_with(source, Scope::new(), &SlotRegistry::new()).unwrap_err();
        assert!(
            matches!(err.error, RuntimeError::ArithmeticError { .. }),
            "{}",
            source
        );
    }
    assert_eq!(render_with("{{ 1.0 / 0 }}", Scope::new()), "Infinity");
}

#[test]
fn unresolved_variables_are_null() {
    assert_eq!(render_with("[{{ missing }}]", Scope::new()), "[null]");
    assert_eq!(render_with("[{{ missing ?: \"fallback\" }}]", Scope::new()), "[fallback]");
}

#[test]
fn null_assertion_fails() {
    let err = try_render_with("{{ missing!! }}", Scope::new(), &SlotRegistry::new()).unwrap_err();
    assert_eq!(
        err.error,
        RuntimeError::NullAssertion {
            expression: "missing".to_string()
        }
    );
}

#[test]
fn methods_and_lambdas_in_templates() {
    let scope = ScopeBuilder::new()
        .property("modules", vec!["core", "api", "web"])
        .build();
    let out = render_with(
        "{{ modules.filter { it != \"web\" }.sorted().joinToString(\", \") { m -> m.uppercase() } }}",
        scope,
    );
    assert_eq!(out, "API, CORE");
}
