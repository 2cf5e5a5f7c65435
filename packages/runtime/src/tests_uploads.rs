/// Upload tests
/// File fields, handle lifecycle and chains waiting on transfers
use crate::*;
use serde_json::json;

#[cfg(test)]
mod upload_tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    const SCHEMA: &str = r#"{
        "nodes": [
            {"kind": "field", "name": "title"},
            {"kind": "field", "name": "avatar", "input": "file", "required": true},
            {"kind": "collection", "name": "documents",
             "cardinality": {"policy": "repeatable", "min": 0},
             "children": [{"kind": "field", "name": "scan", "input": "file"}]}
        ],
        "controls": [
            {"name": "save", "actions": "awaitUpload(\"avatar\") -> okay"}
        ]
    }"#;

    fn formset() -> Formset {
        Formset::from_json(SCHEMA).expect("Failed to build formset")
    }

    fn selection() -> FileSelection {
        FileSelection {
            name: "me.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    fn stored(token: &str) -> FileHandle {
        FileHandle {
            upload_temp_name: token.to_string(),
            content_type: "image/png".to_string(),
            content_type_extra: json!({}),
            name: "me.png".to_string(),
            download_url: None,
            thumbnail_url: Some(format!("/media/thumb/{}", token)),
            size: 4,
        }
    }

    #[test]
    fn test_successful_upload_sets_handle_value() {
        let mut fs = formset();
        let avatar = path("avatar");
        let request = fs.select_file(&avatar, selection()).unwrap();
        assert_eq!(request.field, avatar);
        assert_eq!(fs.field(&avatar).unwrap().value()[0]["status"], "pending");

        let status = fs.complete_upload(request.handle, Ok(stored("abc"))).unwrap();
        assert!(matches!(status, Some(UploadStatus::Uploaded { .. })));

        let payload = fs.submission_payload();
        assert_eq!(payload["avatar"][0]["upload_temp_name"], "abc");
        assert_eq!(
            fs.upload_for_field(&avatar).unwrap().thumbnail(),
            Some("/media/thumb/abc")
        );
        assert!(fs.validate().valid);
    }

    #[test]
    fn test_failed_upload_marks_field() {
        let mut fs = formset();
        let avatar = path("avatar");
        let request = fs.select_file(&avatar, selection()).unwrap();

        fs.complete_upload(request.handle, Err(UploadError::Refused(413)))
            .unwrap();

        let node = fs.field(&avatar).unwrap();
        assert_eq!(node.value(), &json!([]));
        assert_eq!(node.error_source(), Some(ErrorSource::Upload));
        assert_eq!(
            node.validity().reasons(),
            &["File upload refused by the server (status 413)".to_string()]
        );

        // the upload verdict is kept over the generic required message
        let report = fs.validate();
        assert_eq!(report.invalid_fields, vec![avatar.clone()]);
        assert_eq!(
            fs.field(&avatar).unwrap().error_source(),
            Some(ErrorSource::Upload)
        );
    }

    #[test]
    fn test_completion_after_instance_removal_is_ignored() {
        let mut fs = formset();
        let documents = path("documents");
        let instance = fs.add_instance(&documents).unwrap();
        let request = fs.select_file(&instance.child("scan"), selection()).unwrap();

        fs.remove_instance(&documents, 0).unwrap();

        assert_eq!(
            fs.complete_upload(request.handle, Ok(stored("late"))).unwrap(),
            None
        );
        assert!(fs.upload(request.handle).is_none());
        assert!(fs.field(&instance.child("scan")).is_none());
    }

    #[test]
    fn test_reselect_abandons_previous_transfer() {
        let mut fs = formset();
        let avatar = path("avatar");
        let first = fs.select_file(&avatar, selection()).unwrap();
        let second = fs.select_file(&avatar, selection()).unwrap();

        assert_eq!(fs.complete_upload(first.handle, Ok(stored("old"))).unwrap(), None);
        fs.complete_upload(second.handle, Ok(stored("new"))).unwrap();
        assert_eq!(
            fs.field(&avatar).unwrap().value()[0]["upload_temp_name"],
            "new"
        );
    }

    #[test]
    fn test_clear_file_empties_value() {
        let mut fs = formset();
        let avatar = path("avatar");
        let request = fs.select_file(&avatar, selection()).unwrap();
        fs.complete_upload(request.handle, Ok(stored("abc"))).unwrap();

        fs.clear_file(&avatar).unwrap();
        assert_eq!(fs.field(&avatar).unwrap().value(), &json!([]));
        assert!(fs.upload(request.handle).is_none());
        assert!(fs.upload_for_field(&avatar).is_none());
    }

    #[test]
    fn test_waiting_chain_sees_abandoned_transfer_as_failure() {
        let mut fs = formset();
        let avatar = path("avatar");
        let first = fs.select_file(&avatar, selection()).unwrap();
        assert_eq!(
            fs.activate("save").unwrap(),
            Progress::Suspended(Suspension::AwaitUpload(first.handle))
        );

        fs.select_file(&avatar, selection()).unwrap();
        assert_eq!(
            fs.upload(first.handle).unwrap().status,
            UploadStatus::Abandoned
        );

        let progress = fs.resume("save", Resolution::UploadSettled).unwrap();
        assert_eq!(progress, Progress::Completed(Outcome::Failure));
        assert!(fs.upload(first.handle).is_none());
    }

    #[test]
    fn test_reset_forgets_handles() {
        let mut fs = formset();
        let avatar = path("avatar");
        let request = fs.select_file(&avatar, selection()).unwrap();
        fs.complete_upload(request.handle, Ok(stored("abc"))).unwrap();

        fs.reset();
        assert!(fs.upload(request.handle).is_none());
        assert!(fs.upload_for_field(&avatar).is_none());
    }

    #[test]
    fn test_select_on_plain_field_rejected() {
        let mut fs = formset();
        assert!(matches!(
            fs.select_file(&path("title"), selection()),
            Err(FormsetError::NotAFileField(_))
        ));
    }

    #[test]
    fn test_chain_waits_for_pending_upload() {
        let mut fs = formset();
        let request = fs.select_file(&path("avatar"), selection()).unwrap();

        let progress = fs.activate("save").unwrap();
        assert_eq!(
            progress,
            Progress::Suspended(Suspension::AwaitUpload(request.handle))
        );

        // resuming early is refused and leaves the chain waiting
        assert!(matches!(
            fs.resume("save", Resolution::UploadSettled),
            Err(FormsetError::UploadPending(_))
        ));

        fs.complete_upload(request.handle, Ok(stored("abc"))).unwrap();
        let progress = fs.resume("save", Resolution::UploadSettled).unwrap();
        assert_eq!(progress, Progress::Completed(Outcome::Success));
        assert_eq!(fs.take_effects()[0].kind, EffectKind::Okay);
    }

    #[test]
    fn test_chain_without_upload_continues() {
        let mut fs = formset();
        assert_eq!(
            fs.activate("save").unwrap(),
            Progress::Completed(Outcome::Success)
        );
    }
}
