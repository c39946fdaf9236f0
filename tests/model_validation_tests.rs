use chrono::Utc;
use clinical_roots::models::{
    AdminStats, CreateNoteRequest, Identity, LoginResponse, Role, UpdateNoteRequest,
};

#[test]
fn test_role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
}

#[test]
fn test_role_from_stored_string() {
    assert_eq!(Role::try_from("admin".to_string()).unwrap(), Role::Admin);
    assert_eq!(Role::try_from("user".to_string()).unwrap(), Role::User);
    // Roles are stored lowercase; anything else is corrupt data.
    assert!(Role::try_from("Admin".to_string()).is_err());
    assert!(Role::try_from("superuser".to_string()).is_err());
}

#[test]
fn test_create_note_request_missing_fields_default_to_empty() {
    // A missing field must reach the handler so it can answer 400 with a message.
    let req: CreateNoteRequest = serde_json::from_str(r#"{"title": "Only a title"}"#).unwrap();
    assert_eq!(req.title, "Only a title");
    assert!(req.category.is_empty());
    assert!(req.content.is_empty());
    assert!(req.is_published.is_none());
}

#[test]
fn test_update_note_request_optionality() {
    let partial_update = UpdateNoteRequest {
        title: Some("New Title Only".to_string()),
        ..Default::default()
    };

    let json_output = serde_json::to_string(&partial_update).unwrap();
    assert!(json_output.contains(r#""title":"New Title Only""#));
    assert!(!json_output.contains("content")); // None fields are omitted
}

#[test]
fn test_empty_stats_serialize_null_last_update() {
    let stats = AdminStats {
        total_users: 1,
        ..Default::default()
    };
    let value = serde_json::to_value(&stats).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "total_notes": 0,
            "total_users": 1,
            "total_views": 0,
            "last_update": null
        })
    );

    let stats = AdminStats {
        last_update: Some(Utc::now()),
        ..Default::default()
    };
    let value = serde_json::to_value(&stats).unwrap();
    assert!(value["last_update"].is_string());
}

#[test]
fn test_login_response_never_carries_password_hash() {
    let response = LoginResponse {
        message: "Login successful!".to_string(),
        token: "abc.def.ghi".to_string(),
        user: Identity {
            id: 1,
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        },
    };

    let json_output = serde_json::to_string(&response).unwrap();
    assert!(json_output.contains(r#""role":"admin""#));
    assert!(!json_output.contains("password"));
}
