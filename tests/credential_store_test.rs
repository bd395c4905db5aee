//! Registry behaviour through the service facade: creation, lookup,
//! uniqueness, update and deletion across registry files.

mod common;

use std::fs;

use pce_credentials::domain::models::{CredentialPatch, SecretAccess};
use pce_credentials::services::{StorageLocation, UpdateCredentialRequest};
use pce_credentials::CredentialError;

#[test]
fn test_create_plaintext_and_reveal() {
    common::setup_test_logging();
    let dir = common::temp_dir();
    let service = common::service(&dir);

    let summary = service
        .create_credential(common::create_request("pce1", "secret"))
        .unwrap();
    assert!(!summary.api_key_encrypted);
    assert_eq!(
        summary.originating_file,
        common::home_file(&dir).display().to_string()
    );

    let detail = service.get_credential("pce1", true).unwrap();
    assert!(!detail.summary.api_key_encrypted);
    assert_eq!(detail.api_key.as_deref(), Some("secret"));
    assert_eq!(detail.summary.port, 8443);
    assert_eq!(detail.summary.org_id, 1);
    assert!(detail.summary.verify_ssl);
}

#[test]
fn test_create_encrypted_and_reveal() {
    let dir = common::temp_dir();
    let service = common::service(&dir);

    let mut request = common::create_request("pce1", "secret");
    request.encrypt = true;
    request.ssh_key_index = Some(0);
    let summary = service.create_credential(request).unwrap();
    assert!(summary.api_key_encrypted);

    let on_disk = fs::read_to_string(common::home_file(&dir)).unwrap();
    assert!(!on_disk.contains("\"secret\""));
    assert!(on_disk.contains("ssh-agent-chacha20poly1305"));

    let detail = service.get_credential("pce1", true).unwrap();
    assert!(detail.summary.api_key_encrypted);
    assert_eq!(detail.api_key.as_deref(), Some("secret"));
}

#[test]
fn test_duplicate_name_is_rejected() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    service
        .create_credential(common::create_request("pce1", "secret"))
        .unwrap();

    let mut second = common::create_request("PCE1", "other");
    second.storage_location = StorageLocation::WorkingDirectory;
    let err = service.create_credential(second).unwrap_err();
    assert!(matches!(err, CredentialError::DuplicateName(_)));

    let listed = service.list_credentials().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "pce1");
    assert!(!common::workdir_file(&dir).exists());
}

#[test]
fn test_delete_then_get_is_not_found() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    service
        .create_credential(common::create_request("pce1", "secret"))
        .unwrap();

    service.delete_credential("pce1").unwrap();
    assert!(matches!(
        service.get_credential("pce1", false),
        Err(CredentialError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_credential("pce1"),
        Err(CredentialError::NotFound(_))
    ));
}

#[test]
fn test_listing_is_redacted_and_idempotent() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    service
        .create_credential(common::create_request("beta", "secret-b"))
        .unwrap();
    service
        .create_credential(common::create_request("alpha", "secret-a"))
        .unwrap();

    let first = service.list_credentials().unwrap();
    let second = service.list_credentials().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["alpha", "beta"]
    );

    let json = serde_json::to_string(&first).unwrap();
    assert!(!json.contains("secret-a"));
    assert!(!json.contains("secret-b"));

    let redacted = service.get_credential("alpha", false).unwrap();
    assert!(redacted.api_key.is_none());
}

#[test]
fn test_records_from_every_file_are_listed() {
    let dir = common::temp_dir();
    let service = common::service(&dir);

    service
        .create_credential(common::create_request("home-pce", "k1"))
        .unwrap();
    let mut local = common::create_request("local-pce", "k2");
    local.storage_location = StorageLocation::WorkingDirectory;
    service.create_credential(local).unwrap();

    let listed = service.list_credentials().unwrap();
    assert_eq!(listed.len(), 2);
    let local = listed.iter().find(|c| c.name == "local-pce").unwrap();
    assert_eq!(
        local.originating_file,
        common::workdir_file(&dir).display().to_string()
    );
}

#[test]
fn test_update_fields_keeps_secret() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    let mut request = common::create_request("pce1", "secret");
    request.encrypt = true;
    service.create_credential(request).unwrap();

    let store = service.store();
    let before = store.get("pce1", SecretAccess::Full).unwrap();

    let update = UpdateCredentialRequest {
        patch: CredentialPatch {
            port: Some(443),
            verify_ssl: Some(false),
            ..CredentialPatch::default()
        },
        ..UpdateCredentialRequest::default()
    };
    let summary = service.update_credential("pce1", &update).unwrap();
    assert_eq!(summary.port, 443);
    assert!(!summary.verify_ssl);
    assert!(summary.api_key_encrypted);

    let after = store.get("pce1", SecretAccess::Full).unwrap();
    assert_eq!(before.api_key, after.api_key);
    assert_eq!(before.fqdn, after.fqdn);
}

#[test]
fn test_update_with_invalid_port_changes_nothing() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    service
        .create_credential(common::create_request("pce1", "secret"))
        .unwrap();
    let before = fs::read(common::home_file(&dir)).unwrap();

    let update = UpdateCredentialRequest {
        patch: CredentialPatch {
            port: Some(70_000),
            ..CredentialPatch::default()
        },
        ..UpdateCredentialRequest::default()
    };
    assert!(matches!(
        service.update_credential("pce1", &update),
        Err(CredentialError::Validation(_))
    ));
    assert_eq!(fs::read(common::home_file(&dir)).unwrap(), before);
}

#[test]
fn test_corrupt_registry_file_is_storage_error() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    let path = common::home_file(&dir);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{ not json").unwrap();

    let err = service.list_credentials().unwrap_err();
    assert!(matches!(err, CredentialError::StorageIo { .. }));
}

#[test]
fn test_show_resolves_fqdn() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    service
        .create_credential(common::create_request("pce1", "secret"))
        .unwrap();

    let detail = service.find_credential("PCE.example.com", false).unwrap();
    assert_eq!(detail.summary.name, "pce1");

    assert!(matches!(
        service.get_credential("pce.example.com", false),
        Err(CredentialError::NotFound(_))
    ));
}

#[test]
fn test_create_into_explicit_registry_file_stays_unique() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    let target = common::workdir_file(&dir);

    let mut request = common::create_request("pce1", "secret");
    request.storage_location = StorageLocation::Path(target.clone());
    service.create_credential(request.clone()).unwrap();

    let listed = service.list_credentials().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].originating_file, target.display().to_string());

    assert!(matches!(
        service.create_credential(request),
        Err(CredentialError::DuplicateName(_))
    ));
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(raw.as_array().unwrap().len(), 1);
}

#[test]
fn test_create_outside_registry_files_is_rejected() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    let stray = dir.path().join("stray").join("credentials.json");

    let mut request = common::create_request("pce1", "secret");
    request.storage_location = StorageLocation::Path(stray.clone());

    assert!(matches!(
        service.create_credential(request),
        Err(CredentialError::Validation(_))
    ));
    assert!(!stray.exists());
    assert!(service.list_credentials().unwrap().is_empty());
}

#[test]
fn test_entry_without_verify_ssl_is_malformed() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    let path = common::home_file(&dir);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        r#"[{"name": "pce1", "fqdn": "pce.example.com", "port": 8443, "org_id": 1,
             "api_user": "api_123", "api_key": "secret"}]"#,
    )
    .unwrap();

    assert!(matches!(
        service.list_credentials(),
        Err(CredentialError::StorageIo { .. })
    ));
}

#[test]
fn test_fernet_encrypted_key_is_kept_but_not_revealed() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    let path = common::home_file(&dir);
    let raw_key = "$encrypted$:ssh-Fernet:QUJD:REVG:gAAAAA";
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        format!(
            r#"[{{"name": "old", "fqdn": "pce.example.com", "port": 8443, "org_id": 1,
                 "api_user": "api_123", "api_key": "{raw_key}", "verify_ssl": true}}]"#
        ),
    )
    .unwrap();

    let listed = service.list_credentials().unwrap();
    assert!(listed[0].api_key_encrypted);
    assert!(matches!(
        service.get_credential("old", true),
        Err(CredentialError::DecryptionFailed(_))
    ));

    let patch = UpdateCredentialRequest {
        patch: CredentialPatch {
            port: Some(443),
            ..Default::default()
        },
        ..Default::default()
    };
    service.update_credential("old", &patch).unwrap();
    assert!(fs::read_to_string(&path).unwrap().contains(raw_key));
}

#[test]
fn test_delete_removes_shadowed_copies() {
    let dir = common::temp_dir();
    let service = common::service(&dir);
    service
        .create_credential(common::create_request("pce1", "secret"))
        .unwrap();

    let workdir = common::workdir_file(&dir);
    fs::create_dir_all(workdir.parent().unwrap()).unwrap();
    fs::write(
        &workdir,
        r#"[{"name": "PCE1", "fqdn": "other.example.com", "port": 443, "org_id": 2,
             "api_user": "api_9", "api_key": "shadowed", "verify_ssl": true}]"#,
    )
    .unwrap();

    service.delete_credential("pce1").unwrap();
    assert!(matches!(
        service.get_credential("pce1", false),
        Err(CredentialError::NotFound(_))
    ));
    assert!(service.list_credentials().unwrap().is_empty());
}
