/// Repeatable collection tests
/// Cardinality, stable instance keys and per-instance conditions
use crate::*;
use serde_json::json;

#[cfg(test)]
mod collection_tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    const CONTACTS: &str = r#"{
        "nodes": [
            {"kind": "field", "name": "vip", "input": "checkbox"},
            {"kind": "collection", "name": "contacts",
             "cardinality": {"policy": "repeatable", "min": 1, "max": 3},
             "children": [
                {"kind": "field", "name": "kind", "input": "select"},
                {"kind": "field", "name": "number", "required": true, "showIf": "kind == 'phone'"},
                {"kind": "field", "name": "note", "showIf": "vip"}
             ]}
        ],
        "controls": [
            {"name": "more", "actions": "addInstance(\"contacts\")"},
            {"name": "less", "actions": "removeInstance(\"contacts\", 0)"}
        ]
    }"#;

    fn contacts() -> Formset {
        Formset::from_json(CONTACTS).expect("Failed to build formset")
    }

    fn keys(fs: &Formset) -> Vec<InstanceKey> {
        fs.collection(&path("contacts")).unwrap().instances().to_vec()
    }

    #[test]
    fn test_minimum_is_instantiated() {
        let fs = contacts();
        assert_eq!(keys(&fs).len(), 1);
        assert!(fs.field(&path("contacts[0].kind")).is_some());
    }

    #[test]
    fn test_capacity_bounds_leave_count_unchanged() {
        let mut fs = contacts();
        let contacts = path("contacts");

        fs.add_instance(&contacts).unwrap();
        fs.add_instance(&contacts).unwrap();
        assert_eq!(keys(&fs).len(), 3);

        let err = fs.add_instance(&contacts).unwrap_err();
        assert!(matches!(
            err,
            FormsetError::Capacity(CapacityError::AtMaximum { max: 3, .. })
        ));
        assert_eq!(keys(&fs).len(), 3);

        fs.remove_instance(&contacts, 0).unwrap();
        fs.remove_instance(&contacts, 0).unwrap();
        let err = fs.remove_instance(&contacts, 0).unwrap_err();
        assert!(matches!(
            err,
            FormsetError::Capacity(CapacityError::AtMinimum { min: 1, .. })
        ));
        assert_eq!(keys(&fs).len(), 1);
    }

    #[test]
    fn test_keys_stay_stable_across_removal() {
        let mut fs = contacts();
        let contacts = path("contacts");
        let second = fs.add_instance(&contacts).unwrap();
        fs.set_value(&second.child("kind"), json!("phone")).unwrap();

        let before = keys(&fs);
        fs.remove_instance(&contacts, 0).unwrap();

        assert_eq!(keys(&fs), vec![before[1]]);
        assert_eq!(fs.field(&second.child("kind")).unwrap().value(), &json!("phone"));
        assert!(fs.field(&contacts.instance(before[0]).child("kind")).is_none());

        let third = fs.add_instance(&contacts).unwrap();
        assert!(!before.contains(&third.last_instance().unwrap()));
    }

    #[test]
    fn test_sibling_conditions_are_per_instance() {
        let mut fs = contacts();
        let first = fs.collection(&path("contacts")).unwrap().instance_path(keys(&fs)[0]);
        let second = fs.add_instance(&path("contacts")).unwrap();

        fs.set_value(&second.child("kind"), json!("phone")).unwrap();

        assert!(fs.is_visible(&second.child("number")));
        assert!(!fs.is_visible(&first.child("number")));
    }

    #[test]
    fn test_outer_reference_reaches_every_instance() {
        let mut fs = contacts();
        let second = fs.add_instance(&path("contacts")).unwrap();
        let first = path("contacts[0]");

        let touched = fs.set_value(&path("vip"), json!(true)).unwrap();

        assert!(touched.contains(&first.child("note")));
        assert!(touched.contains(&second.child("note")));
        assert!(fs.is_visible(&second.child("note")));
    }

    #[test]
    fn test_removal_drops_instance_conditions() {
        let mut fs = contacts();
        let base = fs.condition_count();
        fs.add_instance(&path("contacts")).unwrap();
        assert_eq!(fs.condition_count(), base * 2);

        fs.remove_instance(&path("contacts"), 1).unwrap();
        assert_eq!(fs.condition_count(), base);
    }

    #[test]
    fn test_initial_data_and_fresh_instances() {
        let mut fs = Formset::from_json(
            r#"{"nodes": [
                {"kind": "collection", "name": "rows",
                 "cardinality": {"policy": "repeatable"},
                 "initial": [{"label": "one"}, {"label": "two"}],
                 "children": [{"kind": "field", "name": "label", "initial": "default"}]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            fs.submission_payload(),
            json!({"rows": [{"label": "one"}, {"label": "two"}]})
        );

        let added = fs.add_instance(&path("rows")).unwrap();
        assert_eq!(fs.field(&added.child("label")).unwrap().value(), &json!(""));
    }

    #[test]
    fn test_validation_skips_hidden_instance_fields() {
        let mut fs = contacts();
        let second = fs.add_instance(&path("contacts")).unwrap();
        fs.set_value(&second.child("kind"), json!("phone")).unwrap();

        let report = fs.validate();
        assert!(!report.valid);
        assert_eq!(report.invalid_fields, vec![second.child("number")]);

        let verdict = &report.collections[&path("contacts")];
        assert!(!verdict.valid);
        assert!(!verdict.below_minimum);
        assert_eq!(
            verdict.instances,
            vec![(keys(&fs)[0], true), (second.last_instance().unwrap(), false)]
        );
    }

    #[test]
    fn test_unknown_collection() {
        let mut fs = contacts();
        assert!(matches!(
            fs.add_instance(&path("vip")),
            Err(FormsetError::UnknownCollection(_))
        ));
        assert!(matches!(
            fs.remove_instance(&path("contacts"), 7),
            Err(FormsetError::NoSuchInstance { index: 7, .. })
        ));
    }

    #[test]
    fn test_chain_reports_capacity_on_control() {
        let mut fs = contacts();
        assert_eq!(fs.activate("more").unwrap(), Progress::Completed(Outcome::Success));
        assert_eq!(fs.activate("more").unwrap(), Progress::Completed(Outcome::Success));

        assert_eq!(fs.activate("more").unwrap(), Progress::Completed(Outcome::Failure));
        let status = fs.control_status("more").unwrap();
        assert!(status.error.as_deref().unwrap().contains("maximum of 3"));
        assert_eq!(keys(&fs).len(), 3);

        assert_eq!(fs.activate("less").unwrap(), Progress::Completed(Outcome::Success));
        assert_eq!(fs.control_status("less").unwrap().error, None);
    }
}
