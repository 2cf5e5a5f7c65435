/// Condition evaluation tests
/// Visibility, enablement and incremental propagation through the field graph
use crate::*;
use serde_json::json;

#[cfg(test)]
mod condition_tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn formset(schema: &str) -> Formset {
        Formset::from_json(schema).expect("Failed to build formset")
    }

    #[test]
    fn test_only_subscribers_are_reevaluated() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "a"},
                {"kind": "field", "name": "b"},
                {"kind": "field", "name": "x", "showIf": "a == 'y'"},
                {"kind": "field", "name": "z", "showIf": "b == 'y'"}
            ]}"#,
        );
        assert_eq!(fs.evaluation_count(), 2);
        assert!(!fs.is_visible(&path("x")));

        let touched = fs.set_value(&path("a"), json!("y")).unwrap();

        assert_eq!(fs.evaluation_count(), 3);
        assert_eq!(touched.into_iter().collect::<Vec<_>>(), vec![path("x")]);
        assert!(fs.is_visible(&path("x")));
        assert!(!fs.is_visible(&path("z")));
    }

    #[test]
    fn test_unrelated_edit_evaluates_nothing() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "a"},
                {"kind": "field", "name": "free"},
                {"kind": "field", "name": "x", "showIf": "a"}
            ]}"#,
        );
        let before = fs.evaluation_count();
        let touched = fs.set_value(&path("free"), json!("text")).unwrap();
        assert!(touched.is_empty());
        assert_eq!(fs.evaluation_count(), before);
    }

    #[test]
    fn test_hidden_value_survives_and_returns() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "kind", "input": "select", "initial": "phone"},
                {"kind": "field", "name": "phone", "showIf": "kind == 'phone'"}
            ]}"#,
        );
        fs.set_value(&path("phone"), json!("555")).unwrap();

        fs.set_value(&path("kind"), json!("email")).unwrap();
        assert!(!fs.is_visible(&path("phone")));
        assert_eq!(fs.field(&path("phone")).unwrap().value(), &json!("555"));
        assert_eq!(fs.submission_payload(), json!({"kind": "email"}));

        fs.set_value(&path("kind"), json!("phone")).unwrap();
        assert!(fs.is_visible(&path("phone")));
        assert_eq!(
            fs.submission_payload(),
            json!({"kind": "phone", "phone": "555"})
        );
    }

    #[test]
    fn test_hide_if_wins_over_show_if() {
        let fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "a", "input": "checkbox", "initial": true},
                {"kind": "field", "name": "b", "input": "checkbox", "initial": true},
                {"kind": "field", "name": "target", "showIf": "a", "hideIf": "b"}
            ]}"#,
        );
        assert!(!fs.is_visible(&path("target")));
    }

    #[test]
    fn test_disabled_field_still_readable() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "locked", "input": "checkbox"},
                {"kind": "field", "name": "name", "initial": "Ada", "disableIf": "locked"},
                {"kind": "field", "name": "greeting", "showIf": "name == 'Ada'"}
            ]}"#,
        );
        fs.set_value(&path("locked"), json!(true)).unwrap();

        assert!(!fs.is_enabled(&path("name")));
        assert!(fs.is_visible(&path("name")));
        assert!(fs.is_visible(&path("greeting")));
        assert_eq!(
            fs.submission_payload(),
            json!({"locked": true, "greeting": ""})
        );
    }

    #[test]
    fn test_hidden_field_reads_as_absent() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "toggle", "input": "checkbox"},
                {"kind": "field", "name": "a", "initial": "x", "hideIf": "toggle"},
                {"kind": "field", "name": "b", "showIf": "a == 'x'"}
            ]}"#,
        );
        assert!(fs.is_visible(&path("b")));

        let touched = fs.set_value(&path("toggle"), json!(true)).unwrap();
        assert!(touched.contains(&path("a")));
        assert!(touched.contains(&path("b")));
        assert!(!fs.is_visible(&path("b")));
    }

    #[test]
    fn test_collection_condition_hides_descendants() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "collection", "name": "customer", "children": [
                    {"kind": "field", "name": "vip", "input": "checkbox"}
                ]},
                {"kind": "collection", "name": "perks", "showIf": "customer.vip", "children": [
                    {"kind": "field", "name": "lounge"}
                ]}
            ]}"#,
        );
        assert!(!fs.is_visible(&path("perks.lounge")));
        assert_eq!(fs.submission_payload(), json!({"customer": {"vip": false}}));

        fs.set_value(&path("customer.vip"), json!(true)).unwrap();
        assert!(fs.is_visible(&path("perks.lounge")));
        assert_eq!(
            fs.submission_payload(),
            json!({"customer": {"vip": true}, "perks": {"lounge": ""}})
        );
    }

    #[test]
    fn test_hiding_clears_displayed_errors() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "toggle", "input": "checkbox"},
                {"kind": "field", "name": "name", "required": true, "hideIf": "toggle"}
            ]}"#,
        );
        let report = fs.validate();
        assert!(!report.valid);
        assert!(fs.field(&path("name")).unwrap().validity().is_invalid());

        fs.set_value(&path("toggle"), json!(true)).unwrap();
        assert_eq!(fs.field(&path("name")).unwrap().validity(), &Validity::Unvalidated);
        assert!(fs.validate().valid);
    }

    #[test]
    fn test_circular_conditions_become_diagnostics() {
        let fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "a", "showIf": "b"},
                {"kind": "field", "name": "b", "showIf": "a"},
                {"kind": "field", "name": "c", "showIf": "a"}
            ]}"#,
        );
        assert_eq!(fs.diagnostics().len(), 1);
        assert!(matches!(fs.diagnostics()[0].problem, Problem::Circular(_)));
        // whichever owner lost its condition is unconditionally visible
        assert!(fs.is_visible(&path("a")) || fs.is_visible(&path("b")));
    }

    #[test]
    fn test_unparseable_condition_is_ignored() {
        let fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "a", "showIf": "b =="},
                {"kind": "field", "name": "b"}
            ]}"#,
        );
        assert_eq!(fs.diagnostics().len(), 1);
        assert_eq!(fs.diagnostics()[0].attribute, "show-if");
        assert!(matches!(fs.diagnostics()[0].problem, Problem::Parse(_)));
        assert!(fs.is_visible(&path("a")));
        assert_eq!(fs.condition_count(), 0);
    }

    #[test]
    fn test_membership_and_numeric_comparison() {
        let mut fs = formset(
            r#"{"nodes": [
                {"kind": "field", "name": "age", "input": "number"},
                {"kind": "field", "name": "plan", "initial": "gold"},
                {"kind": "field", "name": "wine", "showIf": "age >= 18 && plan in ['gold', 'platinum']"}
            ]}"#,
        );
        assert!(!fs.is_visible(&path("wine")));
        fs.set_value(&path("age"), json!(21)).unwrap();
        assert!(fs.is_visible(&path("wine")));
        fs.set_value(&path("plan"), json!("basic")).unwrap();
        assert!(!fs.is_visible(&path("wine")));
    }
}
