/// Submission tests
/// Payload shape, action chains around `submit` and server error mapping
use crate::*;
use serde_json::json;

#[cfg(test)]
mod submission_tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn schema(actions: &str) -> String {
        format!(
            r#"{{
                "nodes": [
                    {{"kind": "collection", "name": "customer", "children": [
                        {{"kind": "field", "name": "name", "required": true}},
                        {{"kind": "field", "name": "vip", "input": "checkbox"}}
                    ]}},
                    {{"kind": "collection", "name": "contacts",
                      "cardinality": {{"policy": "repeatable", "max": 5}},
                      "initial": [{{"phone": "1"}}, {{"phone": "2"}}, {{"phone": "3"}}],
                      "children": [{{"kind": "field", "name": "phone"}}]}},
                    {{"kind": "field", "name": "secret", "hideIf": "customer.vip"}}
                ],
                "controls": [{{"name": "save", "actions": {}}}]
            }}"#,
            serde_json::to_string(actions).unwrap()
        )
    }

    fn formset(actions: &str) -> Formset {
        Formset::from_json(&schema(actions)).expect("Failed to build formset")
    }

    fn submit_request(progress: Progress) -> SubmitRequest {
        match progress {
            Progress::Suspended(Suspension::Submit(request)) => request,
            other => panic!("Expected submit suspension, got {:?}", other),
        }
    }

    fn rejected(errors: serde_json::Value) -> Resolution {
        Resolution::Submitted(Ok(SubmitResponse::Rejected { errors }))
    }

    #[test]
    fn test_payload_shape() {
        let mut fs = formset("submit");
        fs.set_value(&path("customer.name"), json!("Ada")).unwrap();
        fs.set_value(&path("customer.vip"), json!(true)).unwrap();

        let request = submit_request(fs.activate("save").unwrap());
        assert_eq!(
            request.body(),
            &json!({"formset_data": {
                "customer": {"name": "Ada", "vip": true},
                "contacts": [{"phone": "1"}, {"phone": "2"}, {"phone": "3"}]
            }})
        );
        assert_eq!(request.control.as_deref(), Some("save"));
    }

    #[test]
    fn test_default_chain_success_navigates() {
        let mut fs = formset(DEFAULT_ACTIONS);
        submit_request(fs.activate("save").unwrap());
        assert!(fs.control_status("save").unwrap().disabled);

        let progress = fs
            .resume(
                "save",
                Resolution::Submitted(Ok(SubmitResponse::Accepted {
                    success_url: Some("/done".to_string()),
                })),
            )
            .unwrap();

        assert_eq!(progress, Progress::Completed(Outcome::Success));
        assert_eq!(fs.success_url(), Some("/done"));
        let effects = fs.take_effects();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].kind, EffectKind::Navigate("/done".to_string()));
        assert!(fs.take_effects().is_empty());
    }

    #[test]
    fn test_failed_submission_forgets_earlier_success_url() {
        let mut fs = formset("submit -> proceed");
        submit_request(fs.activate("save").unwrap());
        fs.resume(
            "save",
            Resolution::Submitted(Ok(SubmitResponse::Accepted {
                success_url: Some("/old".to_string()),
            })),
        )
        .unwrap();
        assert_eq!(fs.success_url(), Some("/old"));
        fs.take_effects();

        submit_request(fs.activate("save").unwrap());
        let progress = fs.resume("save", rejected(json!({"__all__": ["bad"]}))).unwrap();

        assert_eq!(progress, Progress::Completed(Outcome::Failure));
        assert_eq!(fs.success_url(), None);
        assert!(!fs
            .take_effects()
            .iter()
            .any(|e| matches!(e.kind, EffectKind::Navigate(_))));
    }

    #[test]
    fn test_default_chain_failure_reenables() {
        let mut fs = formset(DEFAULT_ACTIONS);
        submit_request(fs.activate("save").unwrap());

        let progress = fs
            .resume("save", rejected(json!({"customer": {"name": ["This field is required."]}})))
            .unwrap();

        assert_eq!(progress, Progress::Completed(Outcome::Failure));
        assert!(!fs.control_status("save").unwrap().disabled);
        let name = fs.field(&path("customer.name")).unwrap();
        assert_eq!(name.validity().reasons(), &["This field is required.".to_string()]);
        assert_eq!(name.error_source(), Some(ErrorSource::Server));
        assert!(fs.take_effects().is_empty());
    }

    #[test]
    fn test_failure_scrolls_to_first_error() {
        let mut fs = formset("disable -> submit -> proceed !~ scrollToError");
        submit_request(fs.activate("save").unwrap());

        fs.resume(
            "save",
            rejected(json!({"contacts": [{}, {"phone": ["Bad number."]}, {}]})),
        )
        .unwrap();

        let effects = fs.take_effects();
        assert_eq!(
            effects[0].kind,
            EffectKind::ScrollToError(Some(path("contacts[1].phone")))
        );
    }

    #[test]
    fn test_reactivation_submits_once() {
        let mut fs = formset(DEFAULT_ACTIONS);
        submit_request(fs.activate("save").unwrap());
        assert_eq!(fs.activate("save").unwrap(), Progress::Ignored);
        assert!(matches!(
            fs.chain_state("save"),
            Some(ChainState::Suspended {
                waiting: Waiting::Submission,
                ..
            })
        ));
    }

    #[test]
    fn test_edit_clears_server_verdict() {
        let mut fs = formset("submit");
        submit_request(fs.activate("save").unwrap());
        fs.resume("save", rejected(json!({"customer": {"name": ["Taken."]}})))
            .unwrap();
        assert!(fs.field(&path("customer.name")).unwrap().validity().is_invalid());

        fs.set_value(&path("customer.name"), json!("Grace")).unwrap();
        assert_eq!(
            fs.field(&path("customer.name")).unwrap().validity(),
            &Validity::Unvalidated
        );
    }

    #[test]
    fn test_errors_follow_instance_keys_across_removal() {
        let mut fs = formset("submit");
        submit_request(fs.activate("save").unwrap());

        // the first instance goes away while the request is in flight
        fs.remove_instance(&path("contacts"), 0).unwrap();

        fs.resume(
            "save",
            rejected(json!({"contacts": [{"phone": ["Gone."]}, {"phone": ["Bad."]}, {}]})),
        )
        .unwrap();

        let phone = fs.field(&path("contacts[1].phone")).unwrap();
        assert_eq!(phone.validity().reasons(), &["Bad.".to_string()]);
        assert!(!fs.field(&path("contacts[2].phone")).unwrap().validity().is_invalid());
        assert_eq!(fs.non_field_errors(), &["contacts: Gone.".to_string()]);
    }

    #[test]
    fn test_non_field_and_unknown_errors() {
        let mut fs = formset("submit");
        submit_request(fs.activate("save").unwrap());
        fs.resume(
            "save",
            rejected(json!({"__all__": ["Try again later."], "coupon": ["Expired."]})),
        )
        .unwrap();

        assert_eq!(
            fs.non_field_errors(),
            &["Try again later.".to_string(), "coupon: Expired.".to_string()]
        );
    }

    #[test]
    fn test_transport_failure() {
        let mut fs = formset(DEFAULT_ACTIONS);
        submit_request(fs.activate("save").unwrap());
        let progress = fs
            .resume("save", Resolution::Submitted(Err(TransportError::Timeout)))
            .unwrap();

        assert_eq!(progress, Progress::Completed(Outcome::Failure));
        assert_eq!(fs.non_field_errors(), &["Request timed out".to_string()]);
    }

    #[test]
    fn test_mismatched_resolution_keeps_chain_suspended() {
        let mut fs = formset("submit -> okay");
        submit_request(fs.activate("save").unwrap());

        let err = fs.resume("save", Resolution::Elapsed).unwrap_err();
        assert!(matches!(err, FormsetError::UnexpectedResolution { .. }));
        assert!(matches!(fs.chain_state("save"), Some(ChainState::Suspended { .. })));

        let progress = fs
            .resume(
                "save",
                Resolution::Submitted(Ok(SubmitResponse::Accepted { success_url: None })),
            )
            .unwrap();
        assert_eq!(progress, Progress::Completed(Outcome::Success));
    }

    #[test]
    fn test_validation_gates_submission() {
        let mut fs = formset("validate -> submit !~ scrollToError -> proceed");
        let progress = fs.activate("save").unwrap();

        assert_eq!(progress, Progress::Completed(Outcome::Failure));
        let effects = fs.take_effects();
        assert_eq!(
            effects[0].kind,
            EffectKind::ScrollToError(Some(path("customer.name")))
        );

        fs.set_value(&path("customer.name"), json!("Ada")).unwrap();
        submit_request(fs.activate("save").unwrap());
    }

    #[test]
    fn test_hidden_fields_excluded_from_submission() {
        let mut fs = formset("submit");
        fs.set_value(&path("secret"), json!("s3cret")).unwrap();
        assert_eq!(fs.submission_payload()["secret"], json!("s3cret"));

        fs.set_value(&path("customer.vip"), json!(true)).unwrap();
        let request = submit_request(fs.activate("save").unwrap());
        assert!(request.body()["formset_data"].get("secret").is_none());
    }

    #[test]
    fn test_broken_chain_makes_control_unavailable() {
        let mut fs = formset("submit ->");
        assert_eq!(fs.diagnostics().len(), 1);
        assert_eq!(fs.diagnostics()[0].attribute, "actions");
        assert!(matches!(
            fs.activate("save"),
            Err(FormsetError::ControlUnavailable { .. })
        ));
        assert!(matches!(
            fs.activate("missing"),
            Err(FormsetError::UnknownControl(_))
        ));
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut fs = formset("submit");
        fs.set_value(&path("customer.name"), json!("Ada")).unwrap();
        fs.remove_instance(&path("contacts"), 0).unwrap();
        submit_request(fs.activate("save").unwrap());
        fs.resume("save", rejected(json!({"__all__": ["No."]}))).unwrap();

        fs.reset();

        assert!(fs.non_field_errors().is_empty());
        assert_eq!(fs.field(&path("customer.name")).unwrap().value(), &json!(""));
        assert_eq!(fs.collection(&path("contacts")).unwrap().len(), 3);
    }
}
