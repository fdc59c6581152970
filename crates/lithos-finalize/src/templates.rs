// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Built-in templates producing Go code.
//!
//! Each template renders one construct. Contexts:
//! - assignment: `depth`, `indent`, `target`, `field`, `default`, `default_prefix`
//! - object guard: `depth`, `indent`, `target`, `field`, `body`
//! - array loop: `depth`, `indent`, `target`, `elem`, `element_prefix`; the
//!   body comes from the `finalize` helper.
//!
//! `indent` is the indentation level of the emitted lines. `depth` is the
//! nesting level and names loop variables; it runs one ahead of `indent`
//! for arrays reached through a field, which sit beside their siblings.

/// Declares a holder for the default and points an unset field at it.
pub const ASSIGNMENT: &str = concat!(
    "{{- $holder := print .default_prefix (goify .field) -}}\n",
    "{{ tabs .indent }}var {{ $holder }} = {{ literal .default }}\n",
    "{{ tabs .indent }}if {{ .target }}.{{ goify .field }} == nil {\n",
    "{{ tabs (add .indent 1) }}{{ .target }}.{{ goify .field }} = &{{ $holder }}\n",
    "{{ tabs .indent }}}",
);

/// Runs the nested finalizer only when the object field is set.
pub const OBJECT_GUARD: &str = concat!(
    "{{ tabs .indent }}if {{ .target }}.{{ goify .field }} != nil {\n",
    "{{ .body }}\n",
    "{{ tabs .indent }}}",
);

/// Finalizes every element; renders nothing when elements need no work.
pub const ARRAY_LOOP: &str = concat!(
    "{{- $elem := print .element_prefix (add .depth 1) -}}\n",
    "{{- $body := finalize .elem $elem (add .depth 1) (add .indent 1) -}}\n",
    "{{- if $body -}}\n",
    "{{ tabs .indent }}for _, {{ $elem }} := range {{ .target }} {\n",
    "{{ $body }}\n",
    "{{ tabs .indent }}}\n",
    "{{- end -}}",
);

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_finalize_engine::Template;

    #[test]
    fn built_in_templates_parse() {
        for (name, source) in [
            ("assignment", ASSIGNMENT),
            ("object_guard", OBJECT_GUARD),
            ("array_loop", ARRAY_LOOP),
        ] {
            Template::parse_str(name, source)
                .unwrap_or_else(|err| panic!("{name} failed to parse: {err}"));
        }
    }
}
