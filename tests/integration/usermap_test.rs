// tests/integration/usermap_test.rs

use super::test_helpers::{MockFacility, MockMapper, init_tracing};
use attls::core::usermap::{
    DISTINGUISHED_NAME_MAX_LEN, REGISTRY_NAME_MAX_LEN, UserMapError, map_certificate,
    map_distinguished_name,
};
use std::sync::atomic::Ordering;

fn mapper() -> MockMapper {
    MockMapper {
        by_certificate: vec![(b"partner-der".to_vec(), "APPUSER")],
        by_distinguished_name: vec![("CN=Partner,O=Example", "ldap://registry", "DNUSER")],
        ..MockMapper::default()
    }
}

#[test]
fn test_map_cached_certificate() {
    init_tracing();
    let facility = MockFacility::secure();
    facility.set_certificate(b"partner-der");
    let mut ctx = facility.context(50, false);
    let mapper = mapper();

    let certificate = ctx.certificate().unwrap();
    let response = map_certificate(&mapper, &certificate).unwrap();
    assert!(response.is_success());
    assert_eq!(response.user_id, "APPUSER");

    // Mapping is never cached.
    map_certificate(&mapper, &certificate).unwrap();
    assert_eq!(mapper.calls.load(Ordering::SeqCst), 2);
    assert_eq!(facility.query_calls(), 1);
}

#[test]
fn test_unmapped_certificate_passes_codes_through() {
    init_tracing();
    let mapper = mapper();
    let response = map_certificate(&mapper, b"stranger").unwrap();
    assert!(!response.is_success());
    assert_eq!(response.user_id, "");
    assert_eq!(
        (response.rc, response.saf_rc, response.racf_rc, response.racf_rs),
        (8, 8, 8, 48)
    );
}

#[test]
fn test_empty_certificate_is_rejected_locally() {
    init_tracing();
    let mapper = mapper();
    assert_eq!(
        map_certificate(&mapper, &[]).unwrap_err(),
        UserMapError::EmptyCertificate
    );
    assert_eq!(mapper.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_map_distinguished_name() {
    init_tracing();
    let mapper = mapper();
    let response =
        map_distinguished_name(&mapper, "CN=Partner,O=Example", "ldap://registry").unwrap();
    assert_eq!(response.user_id, "DNUSER");

    let response = map_distinguished_name(&mapper, "CN=Partner,O=Example", "other").unwrap();
    assert!(!response.is_success());
}

#[test]
fn test_name_limits() {
    init_tracing();
    let mapper = mapper();
    let dn = "C".repeat(DISTINGUISHED_NAME_MAX_LEN);
    let registry = "R".repeat(REGISTRY_NAME_MAX_LEN);
    assert!(map_distinguished_name(&mapper, &dn, &registry).is_ok());

    let long_dn = "C".repeat(DISTINGUISHED_NAME_MAX_LEN + 1);
    assert_eq!(
        map_distinguished_name(&mapper, &long_dn, "r").unwrap_err(),
        UserMapError::DistinguishedNameTooLong {
            len: DISTINGUISHED_NAME_MAX_LEN + 1,
            max: DISTINGUISHED_NAME_MAX_LEN
        }
    );

    let long_registry = "R".repeat(REGISTRY_NAME_MAX_LEN + 1);
    assert!(matches!(
        map_distinguished_name(&mapper, "CN=x", &long_registry),
        Err(UserMapError::RegistryNameTooLong { .. })
    ));
    assert_eq!(mapper.calls.load(Ordering::SeqCst), 1);
}
