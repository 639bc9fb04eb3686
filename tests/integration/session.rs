//! Dispatcher-side driver, budgets and configuration

use std::collections::HashMap;
use std::time::Duration;

use hickory_proto::rr::RecordType;
use tokio::io::AsyncWriteExt;

use flow_sniffer::config::{apply_env_overrides, load_config_str, Config, SniffConfig};
use flow_sniffer::config::{ENV_FAKEDNS, ENV_LOG_LEVEL, ENV_MAX_BYTES};
use flow_sniffer::net::Network;
use flow_sniffer::sniff::{SniffResult, SniffSession, SnifferRegistry};
use flow_sniffer::{ConfigError, SessionError, SniffError};

use super::fixtures::{client_hello, dns_query, tcp_ctx, udp_ctx, HTTP_REQUEST};

fn registry() -> SnifferRegistry {
    SnifferRegistry::new()
}

// ============================================================================
// Session outcomes
// ============================================================================

#[test]
fn test_datagram_dns_query() {
    let ctx = udp_ctx("8.8.8.8:53");
    let mut session = SniffSession::new(&registry(), ctx, &SniffConfig::default()).unwrap();
    let query = dns_query("example.com.", RecordType::A, 0x2345);

    let result = session.sniff_datagram(&query).unwrap();
    assert_eq!(result.protocol(), "dns");
    assert_eq!(result.domain(), "example.com");
}

#[test]
fn test_datagram_unknown() {
    let ctx = udp_ctx("8.8.8.8:4000");
    let mut session = SniffSession::new(&registry(), ctx, &SniffConfig::default()).unwrap();

    assert!(matches!(
        session.sniff_datagram(&[0x16, 0x03, 0x01]),
        Err(SessionError::Sniff(SniffError::UnknownContent))
    ));
}

#[test]
fn test_metadata_and_content_are_combined() {
    let ctx = tcp_ctx("10.0.0.1:80");
    let registry = registry().with_alternative(
        || {
            Box::new(super::fixtures::Scripted::new(
                "meta",
                Ok(SniffResult::other("meta", "meta.example")),
            ))
        },
        true,
    );
    let mut session = SniffSession::new(&registry, ctx, &SniffConfig::default()).unwrap();

    // Only a metadata entry exists, so the content phase rejects everything
    let result = session.feed(HTTP_REQUEST).unwrap();
    assert_eq!(result.protocol(), "meta");
    assert_eq!(result.domain(), "meta.example");
}

#[test]
fn test_tls_client_hello_in_chunks() {
    let config = SniffConfig {
        max_attempts: 64,
        max_bytes: 4096,
        ..Default::default()
    };
    let mut session =
        SniffSession::new(&registry(), tcp_ctx("93.184.216.34:443"), &config).unwrap();
    let hello = client_hello("chunked.example.com");

    let mut outcome = None;
    for chunk in hello.chunks(16) {
        match session.feed(chunk) {
            Err(SessionError::Sniff(SniffError::NeedMoreData)) => {}
            other => {
                outcome = Some(other);
                break;
            }
        }
    }

    let result = outcome.unwrap().unwrap();
    assert_eq!(result.domain(), "chunked.example.com");
    assert_eq!(session.buffered(), &hello[..]);
}

#[test]
fn test_attempt_budget_exhausted() {
    let config = SniffConfig {
        max_attempts: 3,
        ..Default::default()
    };
    let mut session =
        SniffSession::new(&registry(), tcp_ctx("93.184.216.34:443"), &config).unwrap();
    let hello = client_hello("slow.example.com");

    assert!(session.feed(&hello[..2]).is_err());
    assert!(session.feed(&hello[2..4]).is_err());
    assert!(matches!(
        session.feed(&hello[4..6]),
        Err(SessionError::BudgetExhausted {
            attempts: 3,
            bytes: 6
        })
    ));
}

#[test]
fn test_network_not_sniffed() {
    let config = SniffConfig {
        networks: vec![Network::Tcp],
        ..Default::default()
    };
    assert!(matches!(
        SniffSession::new(&registry(), udp_ctx("8.8.8.8:53"), &config),
        Err(SessionError::Disabled)
    ));
}

#[tokio::test]
async fn test_stream_with_split_client_hello() {
    let config = SniffConfig {
        max_attempts: 8,
        read_timeout_ms: 1000,
        ..Default::default()
    };
    let mut session =
        SniffSession::new(&registry(), tcp_ctx("93.184.216.34:443"), &config).unwrap();
    let hello = client_hello("stream.example.com");

    let (mut client, mut server) = tokio::io::duplex(4096);
    let writer = tokio::spawn({
        let hello = hello.clone();
        async move {
            client.write_all(&hello[..3]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.write_all(&hello[3..]).await.unwrap();
            client
        }
    });

    let result = session.sniff_stream(&mut server).await.unwrap();
    assert_eq!(result.protocol(), "tls");
    assert_eq!(result.domain(), "stream.example.com");
    assert_eq!(session.into_buffer().as_ref(), &hello[..]);

    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_stream_silent_client_exhausts_budget() {
    let config = SniffConfig {
        max_attempts: 2,
        read_timeout_ms: 10,
        ..Default::default()
    };
    let mut session =
        SniffSession::new(&registry(), tcp_ctx("93.184.216.34:443"), &config).unwrap();

    let (_client, mut server) = tokio::io::duplex(64);
    assert!(matches!(
        session.sniff_stream(&mut server).await,
        Err(SessionError::BudgetExhausted { attempts: 2, bytes: 0 })
    ));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_env_overrides() {
    let vars: HashMap<&str, &str> = [
        (ENV_LOG_LEVEL, "debug"),
        (ENV_MAX_BYTES, "4096"),
        (ENV_FAKEDNS, "true"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    apply_env_overrides(&mut config, |name| vars.get(name).map(ToString::to_string)).unwrap();

    assert_eq!(config.log.level, "debug");
    assert_eq!(config.sniff.max_bytes, 4096);
    assert!(config.fakedns.enabled);
}

#[test]
fn test_env_override_rejects_bad_values() {
    let mut config = Config::default();
    let err = apply_env_overrides(&mut config, |name| {
        (name == ENV_MAX_BYTES).then(|| "lots".to_string())
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::EnvError { .. }));

    let mut config = Config::default();
    let err = apply_env_overrides(&mut config, |name| {
        (name == ENV_MAX_BYTES).then(|| "0".to_string())
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_config_drives_session() {
    let config = load_config_str(
        r#"{ "sniff": { "metadata_only": true, "networks": ["udp"] } }"#,
    )
    .unwrap();

    assert!(matches!(
        SniffSession::new(&registry(), tcp_ctx("10.0.0.1:80"), &config.sniff),
        Err(SessionError::Disabled)
    ));

    let mut session =
        SniffSession::new(&registry(), udp_ctx("8.8.8.8:53"), &config.sniff).unwrap();
    let query = dns_query("meta.example.", RecordType::AAAA, 0x2345);
    assert_eq!(session.sniff_datagram(&query).unwrap().domain(), "meta.example");
    assert_eq!(session.attempts(), 0);
}
