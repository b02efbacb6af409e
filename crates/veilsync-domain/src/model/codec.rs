//! JSON wire codec for the policy service.
//!
//! The field-name table lives on the serde attributes of the model types;
//! this module is the only place bytes are produced or consumed.
//!
//! # Request
//!
//! ```json
//! {"user_id":42,"user_phone":"+15550100","user_name":"alice",
//!  "groups":[{"id":-100,"title":"Chat","user_name":""}],
//!  "channels":[],"bots":[],"stickers":[],
//!  "client_os_type":"iOS","client_session_id":"…",
//!  "client_version_code":"100","client_version_name":"1.0.0"}
//! ```
//!
//! # Response
//!
//! ```json
//! {"secret_chat":true,"secret_chat_minimum_length":"10",
//!  "access":{"groups":{"-100":true},"bots":[{"5":false}]},
//!  "organization":{"id":7,"name":"Acme","need_change":false},
//!  "profile_photo_limit":"-1","remove_account_url":null}
//! ```

use super::request::PendingRequest;
use super::snapshot::PolicySnapshot;
use crate::error::DomainResult;

/// Decodes a policy service response (or a persisted snapshot).
pub fn decode_snapshot(bytes: &[u8]) -> DomainResult<PolicySnapshot> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encodes a snapshot for persistence.
pub fn encode_snapshot(snapshot: &PolicySnapshot) -> DomainResult<Vec<u8>> {
    Ok(serde_json::to_vec(snapshot)?)
}

/// Encodes a sync request body.
pub fn encode_request(request: &PendingRequest) -> DomainResult<Vec<u8>> {
    Ok(serde_json::to_vec(request)?)
}

/// Decodes a sync request body.
pub fn decode_request(bytes: &[u8]) -> DomainResult<PendingRequest> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::model::{
        ClientInfo, EntityKind, RequesterIdentity, TrackedEntities, TrackedEntity,
    };
    use serde_json::{json, Value};

    #[test]
    fn test_request_uses_snake_case_wire_names() {
        let request = PendingRequest::new(
            RequesterIdentity::new(42, "+15550100", "alice"),
            TrackedEntities::new()
                .with(
                    EntityKind::Group,
                    TrackedEntity::new(-100).with_title("Chat").with_megagroup(true),
                )
                .with(EntityKind::Bot, TrackedEntity::new(5).with_user_name("helper_bot")),
            ClientInfo {
                client_os_type: "iOS".to_string(),
                client_session_id: "ABC".to_string(),
                client_version_code: "100".to_string(),
                client_version_name: "1.0.0".to_string(),
            },
        );

        let value: Value = serde_json::from_slice(&encode_request(&request).unwrap()).unwrap();

        assert_eq!(value["user_id"], json!(42));
        assert_eq!(value["user_phone"], json!("+15550100"));
        assert_eq!(value["user_name"], json!("alice"));
        assert_eq!(value["client_os_type"], json!("iOS"));
        assert_eq!(value["client_session_id"], json!("ABC"));
        assert_eq!(value["client_version_code"], json!("100"));
        assert_eq!(value["client_version_name"], json!("1.0.0"));
        assert_eq!(value["channels"], json!([]));
        assert_eq!(value["stickers"], json!([]));
        assert_eq!(
            value["groups"],
            json!([{"id": -100, "title": "Chat", "user_name": "", "is_megagroup": true}])
        );
        assert_eq!(value["bots"][0]["user_name"], json!("helper_bot"));
    }

    #[test]
    fn test_request_decodes_what_it_encodes() {
        let request = PendingRequest::new(
            RequesterIdentity::new(1, "", ""),
            TrackedEntities::new().with(EntityKind::Sticker, TrackedEntity::new(77)),
            ClientInfo::default(),
        );
        let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();
        assert_eq!(decoded, request);
        assert!(decoded.entities.contains(EntityKind::Sticker, 77));
    }

    #[test]
    fn test_response_decodes_full_document() {
        let body = json!({
            "secret_chat": true,
            "secret_chat_minimum_length": "10",
            "disable_bio": true,
            "disable_profile_video_change": false,
            "disable_stickers_image": "https://example.org/blocked.png",
            "profile_photo_limit": "3",
            "remove_account_url": "https://example.org/remove/abc",
            "update_required": false,
            "access": {
                "groups": {"-100": true},
                "channels": {"-200": false},
                "bots": {"5": false},
                "stickers": {"9": true},
                "users": {}
            },
            "organization": {"id": 7, "name": "Acme", "need_change": true}
        });

        let snapshot = decode_snapshot(body.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.secret_chat, Some(true));
        assert_eq!(snapshot.effective_secret_chat_minimum_length(), 10);
        assert_eq!(snapshot.disable_bio, Some(true));
        assert_eq!(snapshot.disable_profile_video_change, Some(false));
        assert_eq!(
            snapshot.blocked_image_url.as_deref(),
            Some("https://example.org/blocked.png")
        );
        assert_eq!(snapshot.effective_profile_photo_limit(), 3);
        assert_eq!(snapshot.organization_id(), Some(7));
        assert_eq!(
            snapshot.organization.as_ref().unwrap().needs_reauthorization,
            Some(true)
        );
        assert_eq!(snapshot.access.decision(EntityKind::Group, -100), Some(true));
        assert_eq!(snapshot.access.decision(EntityKind::Channel, -200), Some(false));
        assert_eq!(snapshot.access.decision(EntityKind::Bot, 5), Some(false));
        assert_eq!(snapshot.access.decision(EntityKind::Sticker, 9), Some(true));
    }

    #[test]
    fn test_response_access_arrays_fold_first_wins() {
        let body = json!({
            "access": {
                "bots": [{"5": false, "6": true}, {"5": true, "7": true}]
            }
        });
        let snapshot = decode_snapshot(body.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.access.decision(EntityKind::Bot, 5), Some(false));
        assert_eq!(snapshot.access.decision(EntityKind::Bot, 6), Some(true));
        assert_eq!(snapshot.access.decision(EntityKind::Bot, 7), Some(true));
    }

    #[test]
    fn test_response_numeric_fields_accept_numbers_and_null() {
        let body = json!({
            "profile_photo_limit": 0,
            "secret_chat_minimum_length": null,
            "access": {"groups": null}
        });
        let snapshot = decode_snapshot(body.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.profile_photo_limit.as_deref(), Some("0"));
        assert_eq!(snapshot.effective_profile_photo_limit(), 1);
        assert_eq!(snapshot.effective_secret_chat_minimum_length(), -1);
        assert!(snapshot.access.groups.is_empty());
    }

    #[test]
    fn test_empty_object_decodes_to_default_snapshot() {
        let snapshot = decode_snapshot(b"{}").unwrap();
        assert_eq!(snapshot, PolicySnapshot::default());
    }

    #[test]
    fn test_malformed_body_is_codec_error() {
        let err = decode_snapshot(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, DomainError::Codec { .. }));

        let err = decode_snapshot(br#"{"access": "everything"}"#).unwrap_err();
        assert!(matches!(err, DomainError::Codec { .. }));
    }

    #[test]
    fn test_null_access_keeps_the_rest_of_the_response() {
        let body = br#"{"secret_chat":true,"access":null,"organization":{"id":7}}"#;
        let snapshot = decode_snapshot(body).unwrap();

        assert_eq!(snapshot.secret_chat, Some(true));
        assert_eq!(snapshot.organization_id(), Some(7));
        assert_eq!(snapshot.access, Default::default());
    }

    #[test]
    fn test_non_boolean_access_entries_are_dropped() {
        let body = json!({
            "access": {
                "groups": {"1": true, "2": null, "3": "yes"},
                "bots": [{"5": 1, "6": false}, "junk", {"5": true}]
            }
        });
        let snapshot = decode_snapshot(body.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.access.decision(EntityKind::Group, 1), Some(true));
        assert!(!snapshot.access.has_decision(EntityKind::Group, 2));
        assert!(!snapshot.access.has_decision(EntityKind::Group, 3));
        assert_eq!(snapshot.access.decision(EntityKind::Bot, 6), Some(false));
        assert_eq!(snapshot.access.decision(EntityKind::Bot, 5), Some(true));
    }

    #[test]
    fn test_persisted_snapshot_round_trips() {
        let body = json!({
            "access": {"groups": {"1": true}},
            "organization": {"id": 3},
            "profile_photo_limit": "5"
        });
        let snapshot = decode_snapshot(body.to_string().as_bytes()).unwrap();
        let restored = decode_snapshot(&encode_snapshot(&snapshot).unwrap()).unwrap();
        assert_eq!(restored, snapshot);
    }
}
