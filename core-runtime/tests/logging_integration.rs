//! Integration tests for the runtime crate's public surface.

use bridge_traits::time::LogLevel;
use core_runtime::config::{AdapterConfig, ListenerRemovalPolicy};
use core_runtime::events::{BindingEvent, EventBus, EventStream, LifecycleEvent};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::time::Duration;

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_invalid_custom_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_adapter=notalevel");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_redaction_of_contact_payload_fields() {
    assert_eq!(redact_if_sensitive("phoneNumbers", "555-0100"), "[REDACTED]");
    assert!(!redact_if_sensitive("emails", "bob@example.org").contains("example.org"));
    assert_eq!(redact_if_sensitive("displayName", "Bob"), "Bob");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("_doc/images/a.png"), "a.png");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_round_trip() {
    let config = AdapterConfig::builder()
        .default_wait_timeout(Duration::from_millis(250))
        .listener_removal(ListenerRemovalPolicy::Lenient)
        .event_buffer_size(32)
        .build()
        .unwrap();

    assert_eq!(config.default_wait_timeout, Duration::from_millis(250));
    assert_eq!(config.event_buffer_size, 32);
}

#[tokio::test]
async fn test_event_stream_recv_skips_filtered_events() {
    let bus = EventBus::new(8);
    let mut stream = EventStream::new(bus.subscribe())
        .filter(|event| matches!(event, LifecycleEvent::Binding(BindingEvent::Unbound { .. })));

    bus.emit(LifecycleEvent::Binding(BindingEvent::Bound {
        handle_id: "vp".to_string(),
        event_type: "play".to_string(),
    }));
    bus.emit(LifecycleEvent::Binding(BindingEvent::Unbound {
        handle_id: "vp".to_string(),
        event_type: "play".to_string(),
    }));

    let event = stream.recv().await.unwrap();
    assert!(matches!(
        event,
        LifecycleEvent::Binding(BindingEvent::Unbound { .. })
    ));
}
