/// End-to-end lifecycle of a formset driven through the public API
///
/// Walks a customer form from initialization through conditional
/// collections, a rejected submission, corrections and a final accepted
/// submission, the way a driver would.
use formset_runtime::{
    ChainState, EffectKind, FieldPath, Formset, FormsetSchema, Outcome, Progress, Resolution,
    SubmitResponse, Suspension, Validity,
};
use serde_json::json;

const SCHEMA: &str = r#"{
  "nodes": [
    { "kind": "collection", "name": "customer", "children": [
      { "kind": "field", "name": "name", "required": true, "maxLength": 20 },
      { "kind": "field", "name": "vip", "input": "checkbox" }
    ]},
    { "kind": "collection", "name": "contacts",
      "cardinality": { "policy": "repeatable", "min": 1, "max": 3 },
      "showIf": "customer.vip",
      "children": [
        { "kind": "field", "name": "kind", "input": "select", "initial": "email" },
        { "kind": "field", "name": "phone", "showIf": "kind == 'phone'" }
      ] }
  ],
  "controls": [
    { "name": "save" },
    { "name": "add", "actions": "addInstance(\"contacts\") -> okay !~ bummer" }
  ]
}"#;

fn path(s: &str) -> FieldPath {
    s.parse().expect("Invalid path")
}

fn submit(formset: &mut Formset) -> Suspension {
    match formset.activate("save").expect("Failed to activate") {
        Progress::Suspended(suspension) => suspension,
        other => panic!("Expected suspension, got {:?}", other),
    }
}

#[test]
fn test_customer_form_lifecycle() {
    let schema = FormsetSchema::from_json(SCHEMA).expect("Failed to parse schema");
    let mut formset = Formset::new(&schema).expect("Failed to build formset");
    assert!(formset.diagnostics().is_empty());

    // contacts stay out of the payload until the customer is a VIP
    assert_eq!(
        formset.submission_payload(),
        json!({"customer": {"name": "", "vip": false}})
    );

    formset
        .set_value(&path("customer.vip"), json!(true))
        .expect("Failed to set vip");
    assert!(formset.is_visible(&path("contacts[0].kind")));
    assert!(!formset.is_visible(&path("contacts[0].phone")));

    assert_eq!(
        formset.activate("add").expect("Failed to add"),
        Progress::Completed(Outcome::Success)
    );
    formset
        .set_value(&path("contacts[1].kind"), json!("phone"))
        .expect("Failed to set kind");
    formset
        .set_value(&path("contacts[1].phone"), json!("+41 44 000 00 00"))
        .expect("Failed to set phone");

    // first attempt: the server rejects the name
    let Suspension::Submit(request) = submit(&mut formset) else {
        panic!("Expected submit suspension");
    };
    assert_eq!(
        request.body()["formset_data"]["contacts"],
        json!([{"kind": "email"}, {"kind": "phone", "phone": "+41 44 000 00 00"}])
    );

    let progress = formset
        .resume(
            "save",
            Resolution::Submitted(Ok(SubmitResponse::Rejected {
                errors: json!({"customer": {"name": ["This field is required."]}}),
            })),
        )
        .expect("Failed to resume");
    assert_eq!(progress, Progress::Completed(Outcome::Failure));
    assert!(!formset.control_status("save").unwrap().disabled);

    // correcting the field drops the server verdict
    formset
        .set_value(&path("customer.name"), json!("Ada Lovelace"))
        .expect("Failed to set name");
    assert_eq!(
        formset.field(&path("customer.name")).unwrap().validity(),
        &Validity::Unvalidated
    );
    assert!(formset.validate().valid);

    // second attempt goes through
    submit(&mut formset);
    let progress = formset
        .resume(
            "save",
            Resolution::Submitted(Ok(SubmitResponse::Accepted {
                success_url: Some("/customers/42".to_string()),
            })),
        )
        .expect("Failed to resume");
    assert_eq!(progress, Progress::Completed(Outcome::Success));
    assert_eq!(
        formset.chain_state("save"),
        Some(&ChainState::Completed {
            outcome: Outcome::Success
        })
    );

    let effects = formset.take_effects();
    assert_eq!(
        effects.last().map(|e| &e.kind),
        Some(&EffectKind::Navigate("/customers/42".to_string()))
    );
}

#[test]
fn test_add_control_reports_full_collection() {
    let mut formset = Formset::from_json(SCHEMA).expect("Failed to build formset");
    formset.activate("add").unwrap();
    formset.activate("add").unwrap();

    assert_eq!(
        formset.activate("add").unwrap(),
        Progress::Completed(Outcome::Failure)
    );
    assert!(formset.control_status("add").unwrap().error.is_some());
    assert_eq!(
        formset.take_effects().last().map(|e| &e.kind),
        Some(&EffectKind::Bummer)
    );
}

#[test]
fn test_view_serializes_for_hosts() {
    let formset = Formset::from_json(SCHEMA).expect("Failed to build formset");
    let view = serde_json::to_value(formset.view()).expect("Failed to serialize view");

    assert_eq!(view["fields"][0]["path"], "customer.name");
    assert_eq!(view["fields"][0]["validity"]["state"], "unvalidated");
    assert_eq!(view["collections"]["contacts"], json!([0]));
    assert_eq!(view["controls"]["save"]["disabled"], false);
}
