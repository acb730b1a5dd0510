// tests/integration/context_test.rs

use super::test_helpers::{MockFacility, init_tracing, secure_block};
use attls::core::block::MetadataBlock;
use attls::core::errors::CodeDomain;
use attls::core::facility::CallStatus;
use attls::core::{
    AttlsError, AttlsFlags, Fips140, Protocol, SecurityType, StatConn, StatPolicy,
};

#[test]
fn test_all_scalars_come_from_one_query() {
    init_tracing();
    let facility = MockFacility::secure();
    let mut ctx = facility.context(3, false);

    assert!(!ctx.is_query_loaded());
    assert_eq!(ctx.stat_policy().unwrap(), StatPolicy::Enabled);
    assert_eq!(ctx.stat_conn().unwrap(), StatConn::Secure);
    assert_eq!(ctx.protocol().unwrap(), Protocol::Tls1_3);
    assert_eq!(ctx.negotiated_cipher2().unwrap(), "4X");
    assert_eq!(ctx.security_type().unwrap(), SecurityType::Server);
    assert_eq!(ctx.user_id().unwrap(), "USER01");
    assert_eq!(ctx.fips140().unwrap(), Fips140::Off);
    assert_eq!(ctx.flags().unwrap(), AttlsFlags::empty());
    assert_eq!(ctx.negotiated_cipher4().unwrap(), "1301");
    assert_eq!(ctx.negotiated_key_share().unwrap(), "0029");

    assert!(ctx.is_query_loaded());
    assert!(!ctx.is_certificate_loaded());
    assert_eq!(facility.query_calls(), 1);
}

#[test]
fn test_certificate_is_a_separate_lazy_query() {
    init_tracing();
    let facility = MockFacility::secure();
    facility.set_certificate(b"\x30\x82\x01\x0a");
    let mut ctx = facility.context(3, false);

    ctx.user_id().unwrap();
    assert_eq!(facility.query_calls(), 1);

    let cert = ctx.certificate().unwrap();
    assert_eq!(&cert[..], b"\x30\x82\x01\x0a");
    assert_eq!(facility.query_calls(), 2);

    // Both epochs are now cached.
    ctx.certificate().unwrap();
    ctx.protocol().unwrap();
    assert_eq!(facility.query_calls(), 2);
}

#[test]
fn test_always_load_certificate_uses_combined_query() {
    init_tracing();
    let facility = MockFacility::secure();
    facility.set_certificate(b"DER");
    let mut ctx = facility.context(3, true);

    assert_eq!(ctx.stat_conn().unwrap(), StatConn::Secure);
    assert!(ctx.is_certificate_loaded());
    assert_eq!(&ctx.certificate().unwrap()[..], b"DER");
    assert_eq!(facility.query_calls(), 1);
    assert_eq!(
        facility
            .combined_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[test]
fn test_certificate_first_then_metadata_with_eager_context() {
    init_tracing();
    let facility = MockFacility::secure();
    facility.set_certificate(b"DER");
    let mut ctx = facility.context(3, true);

    ctx.certificate().unwrap();
    // The certificate is already cached, so only metadata is fetched.
    ctx.user_id().unwrap();
    assert_eq!(
        facility
            .metadata_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert_eq!(facility.query_calls(), 2);
}

#[test]
fn test_invalidate_refetches_changed_state() {
    init_tracing();
    let facility = MockFacility::new(
        MetadataBlock::builder()
            .stat_policy(4)
            .stat_conn(2)
            .build(),
    );
    let mut ctx = facility.context(9, false);
    assert_eq!(ctx.stat_conn().unwrap(), StatConn::HandshakeInProgress);

    facility.set_block(secure_block());
    // Still the cached epoch.
    assert_eq!(ctx.stat_conn().unwrap(), StatConn::HandshakeInProgress);

    ctx.invalidate();
    assert!(!ctx.is_query_loaded());
    assert_eq!(ctx.stat_conn().unwrap(), StatConn::Secure);
    assert_eq!(facility.query_calls(), 2);
}

#[test]
fn test_failed_query_caches_nothing() {
    init_tracing();
    let facility = MockFacility::secure();
    let status = CallStatus::new(-1, 121, 0x7df2_0a20);
    facility.fail_with(Some(status));
    let mut ctx = facility.context(3, false);

    assert_eq!(
        ctx.stat_policy().unwrap_err(),
        AttlsError::PrivilegedCall(status)
    );
    assert!(!ctx.is_query_loaded());

    facility.fail_with(None);
    assert_eq!(ctx.stat_policy().unwrap(), StatPolicy::Enabled);
    assert_eq!(facility.query_calls(), 2);
}

#[test]
fn test_unknown_code_fails_only_its_field() {
    init_tracing();
    let facility = MockFacility::new(
        MetadataBlock::builder()
            .stat_policy(4)
            .stat_conn(3)
            .protocol(3, 9)
            .fips140(77)
            .user_id("JOE")
            .build(),
    );
    let mut ctx = facility.context(3, false);

    match ctx.protocol().unwrap_err() {
        AttlsError::UnrecognizedCode(err) => {
            assert_eq!(err.domain, CodeDomain::Protocol);
            assert_eq!((err.code, err.code2), (3, Some(9)));
        }
        other => panic!("expected an unrecognized protocol, got {other:?}"),
    }
    assert!(matches!(
        ctx.fips140(),
        Err(AttlsError::UnrecognizedCode(_))
    ));
    assert_eq!(ctx.stat_policy().unwrap(), StatPolicy::Enabled);
    assert_eq!(ctx.user_id().unwrap(), "JOE");
    assert_eq!(facility.query_calls(), 1);
}

#[test]
fn test_certificate_larger_than_buffer_is_rejected() {
    init_tracing();
    let facility = MockFacility::secure();
    facility.set_certificate(&[0x30; 64]);
    let mut ctx = facility.context(3, false).with_certificate_buffer_len(16);

    assert_eq!(
        ctx.certificate().unwrap_err(),
        AttlsError::CertificateTruncated {
            reported: 64,
            capacity: 16
        }
    );
    assert!(!ctx.is_certificate_loaded());
}

#[test]
fn test_empty_certificate_is_cached() {
    init_tracing();
    let facility = MockFacility::secure();
    let mut ctx = facility.context(3, false);

    assert!(ctx.certificate().unwrap().is_empty());
    assert!(ctx.certificate().unwrap().is_empty());
    assert_eq!(facility.query_calls(), 1);
}

#[test]
fn test_non_secure_connection() {
    init_tracing();
    let facility = MockFacility::new(
        MetadataBlock::builder()
            .stat_policy(2)
            .stat_conn(1)
            .protocol(0, 0)
            .build(),
    );
    let mut ctx = facility.context(3, false);

    assert_eq!(ctx.stat_policy().unwrap(), StatPolicy::NoPolicy);
    assert!(!ctx.stat_conn().unwrap().is_secure());
    assert_eq!(ctx.protocol().unwrap(), Protocol::NonSecure);
    assert_eq!(ctx.user_id().unwrap(), "");
    assert_eq!(ctx.negotiated_cipher4().unwrap(), "");
}

#[test]
fn test_queries_are_exported_as_metrics() {
    init_tracing();
    let facility = MockFacility::secure();
    let mut ctx = facility.context(3, false);
    ctx.stat_policy().unwrap();
    ctx.stat_policy().unwrap();

    let text = attls::core::metrics::gather_metrics();
    assert!(text.contains("attls_queries_total{kind=\"metadata\"}"));
    assert!(text.contains("attls_cache_hits_total"));
}

#[test]
fn test_eager_context_keeps_metadata_when_certificate_is_too_large() {
    init_tracing();
    let facility = MockFacility::secure();
    facility.set_certificate(&[0x30; 64]);
    let mut ctx = facility.context(3, true).with_certificate_buffer_len(16);

    assert_eq!(ctx.stat_policy().unwrap(), StatPolicy::Enabled);
    assert_eq!(ctx.stat_policy().unwrap(), StatPolicy::Enabled);
    assert!(ctx.is_query_loaded());
    assert!(!ctx.is_certificate_loaded());
    assert_eq!(facility.query_calls(), 1);

    // The oversized certificate is reported by the certificate accessor.
    assert_eq!(
        ctx.certificate().unwrap_err(),
        AttlsError::CertificateTruncated {
            reported: 64,
            capacity: 16
        }
    );
    assert_eq!(ctx.user_id().unwrap(), "USER01");
    assert_eq!(facility.query_calls(), 2);
}
