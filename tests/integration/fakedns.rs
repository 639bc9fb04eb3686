//! Fake-DNS composition with the in-memory engine

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hickory_proto::rr::RecordType;

use flow_sniffer::config::FakeDnsConfig;
use flow_sniffer::fakedns::FakeDnsManager;
use flow_sniffer::net::SniffContext;
use flow_sniffer::sniff::{Sniffer, SnifferRegistry};
use flow_sniffer::SniffError;

use super::fixtures::{client_hello, dns_query, HTTP_REQUEST, UNKNOWN_PAYLOAD};

fn manager() -> Arc<FakeDnsManager> {
    let config = FakeDnsConfig::new().with_ipv4_pool("198.18.0.0/24".parse().unwrap());
    Arc::new(FakeDnsManager::new(&config))
}

fn fake_destination(manager: &FakeDnsManager, domain: &str, port: u16) -> SocketAddr {
    let ip = manager.map_domain_ipv4(domain).unwrap();
    SocketAddr::new(IpAddr::V4(ip), port)
}

#[test]
fn test_pipeline_order() {
    let sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager()));
    assert_eq!(
        sniffer.entry_names(),
        vec!["fakedns+others", "http", "tls", "bittorrent", "dns", "fakedns"]
    );
}

#[test]
fn test_metadata_phase_resolves_fake_destination() {
    let manager = manager();
    let ctx = SniffContext::tcp(fake_destination(&manager, "example.com", 443));
    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager));

    let result = sniffer.sniff(&ctx, &[], true).unwrap();
    assert_eq!(result.protocol(), "fakedns");
    assert_eq!(result.domain(), "example.com");
}

#[test]
fn test_payload_composed_with_fake_domain() {
    let manager = manager();
    let ctx = SniffContext::tcp(fake_destination(&manager, "example.com", 443));
    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager));
    let hello = client_hello("cover.example.net");

    assert_eq!(
        sniffer.sniff(&ctx, &hello[..3], false),
        Err(SniffError::NeedMoreData)
    );

    let result = sniffer.sniff(&ctx, &hello, false).unwrap();
    assert_eq!(result.protocol(), "tls");
    assert_eq!(result.domain(), "example.com");

    let composite = result.as_composite().unwrap();
    assert_eq!(composite.protocol_of_domain_result(), "fakedns");
    assert_eq!(composite.domain_of_protocol_result(), "cover.example.net");
}

#[test]
fn test_unrecognized_payload_falls_back_to_fake_domain() {
    let manager = manager();
    let ctx = SniffContext::tcp(fake_destination(&manager, "example.com", 8443));
    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager));

    let result = sniffer.sniff(&ctx, UNKNOWN_PAYLOAD, false).unwrap();
    assert_eq!(result.protocol(), "fakedns");
    assert_eq!(result.domain(), "example.com");
    assert!(result.as_composite().is_none());
}

#[test]
fn test_unmapped_fake_destination() {
    let manager = manager();
    let unmapped: SocketAddr = "198.18.0.200:80".parse().unwrap();
    assert!(manager.is_fake_ip(unmapped.ip()));

    let ctx = SniffContext::tcp(unmapped);
    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager));

    assert_eq!(sniffer.sniff(&ctx, &[], true), Err(SniffError::UnknownContent));

    let result = sniffer.sniff(&ctx, HTTP_REQUEST, false).unwrap();
    assert_eq!(result.protocol(), "fakedns+others");
    assert_eq!(result.domain(), "a.com");
    assert!(result.protocol_is_subset_of("http"));
}

#[test]
fn test_real_destination_uses_plain_sniffers() {
    let ctx = SniffContext::tcp("93.184.216.34:80".parse().unwrap());
    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager()));

    assert_eq!(sniffer.sniff(&ctx, &[], true), Err(SniffError::UnknownContent));

    let result = sniffer.sniff(&ctx, HTTP_REQUEST, false).unwrap();
    assert_eq!(result.protocol(), "http");
    assert_eq!(result.domain(), "a.com");
}

#[test]
fn test_dns_query_to_fake_destination() {
    let manager = manager();
    let ctx = SniffContext::udp(fake_destination(&manager, "resolver.example", 53));
    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager));
    let query = dns_query("www.example.com.", RecordType::A, 0x2345);

    let result = sniffer.sniff(&ctx, &query, true).unwrap();
    assert_eq!(result.protocol(), "dns");
    assert_eq!(result.domain(), "resolver.example");
    assert_eq!(
        result.as_composite().unwrap().domain_of_protocol_result(),
        "www.example.com"
    );
}

#[test]
fn test_expired_mapping_becomes_unmapped() {
    let config = FakeDnsConfig::new().with_ipv4_pool("198.18.0.0/24".parse().unwrap());
    let manager = Arc::new(FakeDnsManager::with_ttl(
        &config,
        std::time::Duration::from_millis(10),
    ));
    let ctx = SniffContext::tcp(fake_destination(&manager, "example.com", 80));
    std::thread::sleep(std::time::Duration::from_millis(20));

    let mut sniffer = Sniffer::new(&SnifferRegistry::new().with_fake_dns(manager));
    let result = sniffer.sniff(&ctx, HTTP_REQUEST, false).unwrap();
    assert_eq!(result.protocol(), "fakedns+others");
    assert_eq!(result.domain(), "a.com");
}
