//! Engine behaviour across phases and repeated calls

use hickory_proto::rr::RecordType;

use flow_sniffer::sniff::{SniffEntry, SniffResult, Sniffer, SnifferRegistry};
use flow_sniffer::SniffError;

use super::fixtures::{
    calls, client_hello, dns_query, tcp_ctx, udp_ctx, Scripted, HTTP_REQUEST, UNKNOWN_PAYLOAD,
};

// ============================================================================
// Built-in pipeline scenarios
// ============================================================================

#[test]
fn test_http_host_after_empty_metadata_phase() {
    let ctx = tcp_ctx("93.184.216.34:80");
    let mut sniffer = Sniffer::new(&SnifferRegistry::new());

    assert_eq!(sniffer.sniff(&ctx, &[], true), Err(SniffError::UnknownContent));

    let result = sniffer.sniff(&ctx, HTTP_REQUEST, false).unwrap();
    assert_eq!(result.protocol(), "http");
    assert_eq!(result.domain(), "a.com");
}

#[test]
fn test_tls_record_header_then_full_client_hello() {
    let ctx = tcp_ctx("93.184.216.34:443");
    let mut sniffer = Sniffer::new(&SnifferRegistry::new());
    let hello = client_hello("www.example.com");

    assert_eq!(
        sniffer.sniff(&ctx, &hello[..3], false),
        Err(SniffError::NeedMoreData)
    );
    // HTTP and BitTorrent rejected the first byte; DNS sits in the other phase
    assert_eq!(sniffer.entry_names(), vec!["tls", "dns"]);

    let result = sniffer.sniff(&ctx, &hello, false).unwrap();
    assert_eq!(result.protocol(), "tls");
    assert_eq!(result.domain(), "www.example.com");
    assert!(result.protocol_is_subset_of("tls"));
    assert!(result.protocol_is_subset_of("tls1.3"));

    let SniffResult::Tls(tls) = result else {
        panic!("expected a TLS result");
    };
    assert_eq!(tls.alpn, vec!["h2".to_string(), "http/1.1".to_string()]);
    assert_eq!(tls.supported_versions, vec![0x0304, 0x0303]);
}

#[test]
fn test_unknown_payload_is_rejected_idempotently() {
    let ctx = tcp_ctx("93.184.216.34:443");
    let mut sniffer = Sniffer::new(&SnifferRegistry::new());

    assert_eq!(
        sniffer.sniff(&ctx, UNKNOWN_PAYLOAD, false),
        Err(SniffError::UnknownContent)
    );
    assert_eq!(
        sniffer.sniff(&ctx, UNKNOWN_PAYLOAD, false),
        Err(SniffError::UnknownContent)
    );
    assert_eq!(sniffer.len(), 4);
}

#[test]
fn test_dns_query_only_in_metadata_phase() {
    let ctx = udp_ctx("8.8.8.8:53");
    let query = dns_query("example.com.", RecordType::A, 0x2345);

    let mut sniffer = Sniffer::new(&SnifferRegistry::new());
    assert_eq!(
        sniffer.sniff(&ctx, &query, false),
        Err(SniffError::UnknownContent)
    );

    let result = sniffer.sniff(&ctx, &query, true).unwrap();
    assert_eq!(result.protocol(), "dns");
    assert_eq!(result.domain(), "example.com");
    assert!(result.as_composite().is_none());
}

#[test]
fn test_dns_ignores_non_address_queries() {
    let ctx = udp_ctx("8.8.8.8:53");
    let query = dns_query("example.com.", RecordType::MX, 0x2345);

    let mut sniffer = Sniffer::new(&SnifferRegistry::new());
    assert_eq!(
        sniffer.sniff(&ctx, &query, true),
        Err(SniffError::UnknownContent)
    );
}

#[test]
fn test_metadata_phase_keeps_payload_entries() {
    let ctx = tcp_ctx("93.184.216.34:443");
    let mut sniffer = Sniffer::new(&SnifferRegistry::new());
    let hello = client_hello("example.org");

    assert!(sniffer.sniff(&ctx, &[], true).is_err());
    assert_eq!(sniffer.entry_names(), vec!["http", "tls", "bittorrent", "dns"]);

    assert_eq!(sniffer.sniff(&ctx, &hello, false).unwrap().domain(), "example.org");
}

// ============================================================================
// Engine properties with scripted entries
// ============================================================================

#[test]
fn test_rejected_entries_are_never_retried() {
    let ctx = tcp_ctx("10.0.0.1:80");
    let pending = Scripted::new("pending", Err(SniffError::NeedMoreData));
    let rejecting = Scripted::new("rejecting", Err(SniffError::UnknownContent));
    let pending_calls = pending.counter();
    let rejecting_calls = rejecting.counter();

    let mut sniffer = Sniffer::from_entries(vec![
        SniffEntry::payload(rejecting),
        SniffEntry::payload(pending),
    ]);

    for _ in 0..3 {
        assert_eq!(sniffer.sniff(&ctx, b"x", false), Err(SniffError::NeedMoreData));
    }
    assert_eq!(sniffer.entry_names(), vec!["pending"]);
    assert_eq!(calls(&rejecting_calls), 1);
    assert_eq!(calls(&pending_calls), 3);
}

#[test]
fn test_first_success_wins() {
    let ctx = tcp_ctx("10.0.0.1:80");
    let first = Scripted::new("first", Ok(SniffResult::other("alpha", "a.example")));
    let second = Scripted::new("second", Ok(SniffResult::other("beta", "b.example")));
    let second_calls = second.counter();

    let mut sniffer =
        Sniffer::from_entries(vec![SniffEntry::payload(first), SniffEntry::payload(second)]);

    let result = sniffer.sniff(&ctx, b"x", false).unwrap();
    assert_eq!(result.protocol(), "alpha");
    assert_eq!(calls(&second_calls), 0);
}

#[test]
fn test_phases_run_disjoint_entries() {
    let ctx = tcp_ctx("10.0.0.1:80");
    let meta = Scripted::new("meta", Err(SniffError::UnknownContent));
    let payload = Scripted::new("payload", Err(SniffError::UnknownContent));
    let meta_calls = meta.counter();
    let payload_calls = payload.counter();

    let mut sniffer =
        Sniffer::from_entries(vec![SniffEntry::metadata(meta), SniffEntry::payload(payload)]);

    assert!(sniffer.sniff(&ctx, &[], true).is_err());
    assert_eq!((calls(&meta_calls), calls(&payload_calls)), (1, 0));

    assert!(sniffer.sniff(&ctx, b"x", false).is_err());
    assert_eq!((calls(&meta_calls), calls(&payload_calls)), (1, 1));
}

#[test]
fn test_dns_result_paired_with_later_metadata_result() {
    let ctx = udp_ctx("10.0.0.1:53");
    let query = dns_query("example.com.", RecordType::AAAA, 0x2345);
    let domain_source = Scripted::new("domain", Ok(SniffResult::fake_dns("mapped.example")));

    let mut entries = vec![SniffEntry::metadata(flow_sniffer::sniff::DnsSniffer)];
    entries.push(SniffEntry::metadata(domain_source));
    let mut sniffer = Sniffer::from_entries(entries);

    let result = sniffer.sniff(&ctx, &query, true).unwrap();
    let composite = result.as_composite().unwrap();
    assert_eq!(result.protocol(), "dns");
    assert_eq!(result.domain(), "mapped.example");
    assert_eq!(composite.domain_of_protocol_result(), "example.com");
    assert_eq!(composite.protocol_of_domain_result(), "fakedns");
}

#[test]
fn test_alternative_replaces_builtin_pipeline() {
    let registry = SnifferRegistry::new().with_alternative(
        || Box::new(Scripted::new("custom", Ok(SniffResult::other("custom", "c.example")))),
        false,
    );
    let mut sniffer = Sniffer::new(&registry);
    assert_eq!(sniffer.entry_names(), vec!["custom"]);

    let ctx = tcp_ctx("10.0.0.1:443");
    let hello = client_hello("www.example.com");
    let result = sniffer.sniff(&ctx, &hello, false).unwrap();
    assert_eq!(result.protocol(), "custom");
    assert_eq!(result.domain(), "c.example");

    // Each pipeline gets its own instance
    let other = Sniffer::new(&registry);
    assert_eq!(other.len(), 1);
}
