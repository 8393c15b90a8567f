/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for evtemplate using template fixtures.
 */

use evtemplate::{
    Evaluated, Expression, ExpressionTemplate, FormatProvider, StaticNameResolver, TemplateError,
    TemplateOptions, TemplateTheme, ThemeStyle,
};
use evtemplate_events::{Level, LogEvent, Property, Structure, Value};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> std::path::PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

/// Helper to load a template from fixtures
fn load_template(name: &str) -> ExpressionTemplate {
    let path = fixture_path(name);
    let source = std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to read template: {}", name));
    ExpressionTemplate::new(&source).unwrap_or_else(|e| panic!("Failed to compile {}: {}", name, e))
}

fn clef(line: &str) -> LogEvent {
    LogEvent::from_clef(line).unwrap()
}

fn render(template: &str, event: &LogEvent) -> String {
    ExpressionTemplate::new(template).unwrap().render_to_string(event)
}

fn hello_world() -> LogEvent {
    clef(r#"{"@t":"2024-01-02T03:04:05.678Z","@mt":"Hello, {Name}!","Name":"World"}"#)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_level_and_message() {
    assert_eq!(render("{@l:u3}: {@m}", &hello_world()), "INF: Hello, World!");
}

#[test]
fn test_json_object_keeps_member_order() {
    let event = clef(r#"{"@t":"2024-01-02T03:04:05.678Z","@mt":"Count is {Count}","Count":3}"#);
    let output = load_template("json.template").render_to_string(&event);
    insta::assert_snapshot!(output.trim_end(), @r#"{"@t":"2024-01-02T03:04:05.6780000+00:00","@mt":"Count is {Count}","@l":"Information","Count":3}"#);
}

#[test]
fn test_empty_each_renders_no_delimiter() {
    let template = load_template("properties.template");
    let empty = LogEvent::now(Level::Information, "nothing");
    assert_eq!(template.render_to_string(&empty), "(none)");

    let event = LogEvent::now(Level::Information, "")
        .with_property("A", 1)
        .with_property("B", "two");
    assert_eq!(template.render_to_string(&event), "A=1, B=two");
}

#[test]
fn test_console_layout_with_exception() {
    let template = load_template("console.template");
    let event = clef(
        r#"{"@t":"2024-01-02T03:04:05.678Z","@mt":"Failed","@l":"Error","@x":"System.Exception: boom\n   at Program.Main()"}"#,
    );
    assert_eq!(
        template.render_to_string(&event),
        "[03:04:05 ERR] Failed\nSystem.Exception: boom\n   at Program.Main()\n"
    );
    assert_eq!(
        template.render_to_string(&hello_world()),
        "[03:04:05 INF] Hello, World!\n"
    );
}

// ============================================================================
// Undefined, null and determinism
// ============================================================================

#[test]
fn test_undefined_and_null_differ_in_json() {
    let event = hello_world().with_property("Nothing", Value::null());
    assert_eq!(render("[{Missing}|{Nothing}]", &event), "[|]");
    assert_eq!(
        render("{ {a: Missing, b: Nothing, c: Name} }", &event),
        r#"{"b":null,"c":"World"}"#
    );
}

#[test]
fn test_rendering_is_deterministic() {
    let template = ExpressionTemplate::new("{@t} {@l} {@m} {@p} {@i}").unwrap();
    let event = hello_world();
    assert_eq!(template.render_to_string(&event), template.render_to_string(&event));
}

#[test]
fn test_concurrent_rendering_shares_one_template() {
    let template = Arc::new(ExpressionTemplate::new("{@l:u3} {@m}").unwrap());
    std::thread::scope(|scope| {
        for level in Level::ALL {
            let template = Arc::clone(&template);
            scope.spawn(move || {
                let event = LogEvent::now(level, "n={N}").with_property("N", level.ordinal() as i64);
                let expected = format!(
                    "{} n={}",
                    evtemplate::level::level_moniker(level, Some("u3")),
                    level.ordinal()
                );
                for _ in 0..100 {
                    assert_eq!(template.render_to_string(&event), expected);
                }
            });
        }
    });
}

// ============================================================================
// Alignment and styling
// ============================================================================

#[test]
fn test_alignment() {
    let event = hello_world().with_property("N", 42);
    assert_eq!(render("[{@l,-6:u3}]", &event), "[INF   ]");
    assert_eq!(render("[{N,5}]", &event), "[   42]");
    assert_eq!(render("[{N,-5}]", &event), "[42   ]");
    assert_eq!(render("[{Name,3}]", &event), "[World]");
    assert_eq!(render("[{@m,-15}]", &event), "[Hello, World!  ]");
}

#[test]
fn test_ansi_styles_do_not_count_toward_width() {
    let theme = TemplateTheme::none()
        .with_overrides([(ThemeStyle::LevelInformation, "\x1b[32m"), (ThemeStyle::Number, "\x1b[35m")]);
    let options = TemplateOptions::new().with_theme(theme);
    let template = ExpressionTemplate::with_options("{@l,-5:u3}|{@m,-8}|", &options).unwrap();
    let event = LogEvent::now(Level::Information, "n={N}").with_property("N", 7);
    assert_eq!(
        template.render_to_string(&event),
        "\x1b[32mINF  \x1b[0m|n=\x1b[35m7\x1b[0m     |"
    );
}

#[test]
fn test_grouping_formats_and_trailing_alignment() {
    let event = LogEvent::now(Level::Information, "").with_property("N", 1234.0);
    assert_eq!(render("{N:0,000}", &event), "1,234");
    assert_eq!(render("{N:#,0}", &event), "1,234");
    assert_eq!(render("{N:#,##0}", &event), "1,234");
    assert_eq!(render("[{N:0,000,10}]", &event), "[     1,234]");
    assert_eq!(render("[{N:0,000,-8}]", &event), "[1,234   ]");
}

#[test]
fn test_numeric_halves_round_away_from_zero() {
    let event = LogEvent::now(Level::Information, "")
        .with_property("A", 2.5)
        .with_property("H", 1.25)
        .with_property("E", 0.125);
    assert_eq!(render("{A:F0} {H:0.0} {E:0.00}", &event), "3 1.3 0.13");
    assert_eq!(render("{2.5:F0}", &event), "3");
}

#[test]
fn test_format_provider_applies_to_numbers() {
    let options = TemplateOptions::new().with_format_provider(FormatProvider::new(",", "."));
    let template = ExpressionTemplate::with_options("{Amount:N2}", &options).unwrap();
    let event = LogEvent::now(Level::Information, "").with_property("Amount", 1234.5);
    assert_eq!(template.render_to_string(&event), "1.234,50");
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_conditionals_and_wildcards() {
    let template = ExpressionTemplate::new(
        "{#if Tags[?] = 'DB' ci}database{#else if Length(Tags) = 0}untagged{#else}other{#end}",
    )
    .unwrap();
    let tagged = |tags: Vec<&str>| {
        LogEvent::now(Level::Information, "")
            .with_property("Tags", Value::Sequence(tags.into_iter().map(Value::from).collect()))
    };
    assert_eq!(template.render_to_string(&tagged(vec!["web", "db"])), "database");
    assert_eq!(template.render_to_string(&tagged(vec![])), "untagged");
    assert_eq!(template.render_to_string(&tagged(vec!["web"])), "other");
}

#[test]
fn test_rest_omits_message_and_template_properties() {
    let event = LogEvent::now(Level::Information, "User {Name} signed in")
        .with_property("Name", "Ada")
        .with_property("Elapsed", 12)
        .with_property("Host", "web1");
    assert_eq!(
        render("{@m} {rest()}", &event),
        r#"User Ada signed in {"Elapsed":12,"Host":"web1"}"#
    );
    assert_eq!(
        render("{Elapsed}ms {rest()}", &event),
        r#"12ms {"Host":"web1"}"#
    );
}

#[test]
fn test_each_over_nested_structure() {
    let event = LogEvent::now(Level::Information, "").with_property(
        "Order",
        Value::Structure(Structure::new(vec![
            Property::new("Id", Value::from(7)),
            Property::new(
                "Lines",
                Value::Sequence(vec![Value::from("apple"), Value::from("pear")]),
            ),
        ])),
    );
    assert_eq!(
        render("#{Order.Id}: {#each line, i in Order.Lines}{i}.{line}{#delimit} {#end}", &event),
        "#7: 0.apple 1.pear"
    );
}

#[test]
fn test_directives_followed_by_punctuation() {
    let event = LogEvent::now(Level::Information, "")
        .with_property("X", "x")
        .with_property(
            "Xs",
            Value::Sequence(vec![Value::from("a"), Value::from("b")]),
        );
    assert_eq!(render("{#each x in Xs}{x}{#delimit}; {#end}", &event), "a; b");
    assert_eq!(render("{#if IsDefined(X)}\"{X}\"{#end}", &event), "\"x\"");
    assert_eq!(render("{#if true}'s{#end}", &event), "'s");
    assert_eq!(render("{#if true}ok{#end}!", &event), "ok!");
    assert_eq!(render("{#if false}{#else}$\\{#end}", &event), "$\\");
}

#[test]
fn test_builtin_functions_in_templates() {
    let event = hello_world().with_property("Path", "/api/orders/17");
    assert_eq!(render("{Substring(Path, 0, 4)}", &event), "/api");
    assert_eq!(render("{StartsWith(Path, '/API') ci}", &event), "true");
    assert_eq!(render("{Coalesce(Missing, 'fallback')}", &event), "fallback");
    assert_eq!(render("{if IsDefined(Missing) then 'yes' else 'no'}", &event), "no");
    assert_eq!(render("{ToString(Length(Path))}", &event), "14");
}

fn shout<'a>(args: Vec<Evaluated<'a>>) -> Evaluated<'a> {
    args.first()
        .and_then(Evaluated::as_str)
        .map_or(Evaluated::Undefined, |s| Evaluated::string(s.to_uppercase()))
}

#[test]
fn test_caller_supplied_functions() {
    let mut resolver = StaticNameResolver::new();
    resolver.add_with_arity("Shout", 1, shout);
    let options = TemplateOptions::new().with_name_resolver(Arc::new(resolver));
    let template = ExpressionTemplate::with_options("{Shout(Name)}!", &options).unwrap();
    assert_eq!(template.render_to_string(&hello_world()), "WORLD!");

    let err = ExpressionTemplate::new("{Shout(Name)}").unwrap_err();
    assert!(matches!(err, TemplateError::ResolutionError { .. }));
}

#[test]
fn test_standalone_expression() {
    let expression = Expression::compile("@l = 'Information' and Name like 'W%'").unwrap();
    assert!(expression.evaluate(&hello_world()).is_true());
    assert_eq!(expression.source(), "@l = 'Information' and Name like 'W%'");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_construction_errors() {
    let err = ExpressionTemplate::new("ok {#end}").unwrap_err();
    assert!(matches!(err, TemplateError::BindError { .. }));
    assert_eq!(err.position(), 3);

    let err = ExpressionTemplate::new("{Name + }").unwrap_err();
    assert!(matches!(err, TemplateError::ParseError { .. }));

    let err = ExpressionTemplate::new("x {Nope(1)}").unwrap_err();
    assert_eq!(err.position(), 3);
    let report = err.to_report("x {Nope(1)}", "template");
    assert!(report.contains("unknown function `Nope`"));
}
