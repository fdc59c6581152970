// SPDX-License-Identifier: Apache-2.0 OR MIT
use lithos_finalize_engine::{literal_value, render_once};
use lithos_finalize_helpers::{finalizer_helpers, format_default, DEFAULT_INDENT};
use serde_json::{json, Value};

fn scalar_defaults() -> Vec<Value> {
    vec![
        json!(true),
        json!(false),
        json!(0),
        json!(-7),
        json!(i64::MAX),
        json!(i64::MIN),
        json!(0.1),
        json!(-2.5),
        json!(3.0),
        json!(1e21),
        json!(6.02e-23),
        json!(""),
        json!("plain"),
        json!("quote \" and backslash \\"),
        json!("line\nbreak\ttab\rreturn"),
        json!("bell\u{7}nul\u{0}del\u{7f}"),
        json!("unicode ✓ 日本"),
        json!("bom \u{feff} inside"),
        json!("{{ not an action }}"),
    ]
}

#[test]
fn formatted_defaults_parse_back_to_the_same_value() {
    for value in scalar_defaults() {
        let text = format_default(&value).unwrap();
        let parsed = literal_value(&text)
            .unwrap_or_else(|err| panic!("{text} did not parse: {err}"));
        assert_eq!(parsed, value, "round trip of {text}");
    }
}

#[test]
fn float_literals_stay_floats() {
    for value in [json!(3.0), json!(1e21), json!(-0.0)] {
        let text = format_default(&value).unwrap();
        assert!(
            text.contains('.') || text.contains('e'),
            "{text} would type as an integer"
        );
    }
}

#[test]
fn helpers_compose_inside_templates() {
    let source = concat!(
        "{{- $elem := print \"e\" (add .depth 1) -}}",
        "{{ tabs .depth }}for _, {{ $elem }} := range {{ .target }} {\n",
        "{{ if not .empty }}{{ tabs (add .depth 1) }}use({{ $elem }})\n{{ end }}",
        "{{ tabs .depth }}}",
    );
    let data = json!({"depth": 1, "target": "v.Items", "empty": false});
    let rendered = render_once("loop", source, &data, finalizer_helpers(DEFAULT_INDENT)).unwrap();
    assert_eq!(
        rendered,
        "\tfor _, e2 := range v.Items {\n\t\tuse(e2)\n\t}"
    );
}

#[test]
fn eq_drives_branches() {
    let source = "{{ if eq .kind \"object\" \"alias\" }}nested{{ else }}flat{{ end }}";
    let registry = finalizer_helpers(DEFAULT_INDENT);
    let nested = render_once("eq", source, &json!({"kind": "alias"}), registry.clone()).unwrap();
    let flat = render_once("eq", source, &json!({"kind": "string"}), registry).unwrap();
    assert_eq!(nested, "nested");
    assert_eq!(flat, "flat");
}
