//! Tests for the log format compiler

use log_replay::config::APACHE_COMBINED_FORMAT;
use log_replay::infra::{FieldClass, FieldKind, FormatError, LogFormat};

#[test]
fn test_combined_format_field_order() {
    let format = LogFormat::compile(APACHE_COMBINED_FORMAT).unwrap();
    let kinds: Vec<&FieldKind> = format.extractors().iter().map(|e| &e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            &FieldKind::Host,
            &FieldKind::Logname,
            &FieldKind::User,
            &FieldKind::Time,
            &FieldKind::Request,
            &FieldKind::Status,
            &FieldKind::SentBytes,
            &FieldKind::Header("Referer".into()),
            &FieldKind::Header("User-Agent".into()),
        ]
    );
    assert_eq!(format.source(), APACHE_COMBINED_FORMAT);
    assert!(format.regex().as_str().starts_with('^'));
}

#[test]
fn test_vhost_combined_line() {
    let format = LogFormat::compile("%v:%p %h %l %u %t \"%r\" %>s %O \"%{Referer}i\" \"%{User-Agent}i\"")
        .unwrap();
    let line = r#"www.example.com:443 198.51.100.20 - - [02/Jan/2024:03:04:05 +0100] "GET /feed.xml HTTP/2.0" 200 5120 "-" "Feedly/1.0""#;
    let parsed = format.extract(line).expect("vhost line matches");

    assert_eq!(parsed.get(&FieldKind::ServerName), Some("www.example.com"));
    assert_eq!(parsed.get(&FieldKind::Port), Some("443"));
    assert_eq!(parsed.get(&FieldKind::Host), Some("198.51.100.20"));
    assert_eq!(parsed.get(&FieldKind::Request), Some("GET /feed.xml HTTP/2.0"));
    assert_eq!(
        parsed.first_of(FieldClass::Timestamp).map(|(_, v)| v),
        Some("02/Jan/2024:03:04:05 +0100")
    );
}

#[test]
fn test_time_accepts_any_bracketed_text() {
    let format = LogFormat::compile("%h %t %U").unwrap();
    let parsed = format.extract("h1 [2024-01-01T00:00:00Z] /x").unwrap();
    assert_eq!(parsed.get(&FieldKind::Time), Some("2024-01-01T00:00:00Z"));
}

#[test]
fn test_timing_and_scheme_fields() {
    let format = LogFormat::compile("%S %a %D %T %I %b").unwrap();
    let parsed = format.extract("https 10.1.2.3 1534 0.002 321 -").unwrap();
    assert_eq!(parsed.get(&FieldKind::Scheme), Some("https"));
    assert_eq!(parsed.get(&FieldKind::ServeTimeMicros), Some("1534"));
    assert_eq!(parsed.get(&FieldKind::RequestTime), Some("0.002"));
    assert_eq!(parsed.get(&FieldKind::ReceivedBytes), Some("321"));
    assert_eq!(parsed.get(&FieldKind::ResponseBytes), Some("-"));

    let classes: Vec<FieldClass> = parsed.iter().map(|(k, _)| k.class()).collect();
    assert_eq!(classes[1], FieldClass::Identity);
    assert_eq!(classes[5], FieldClass::ByteCount);
}

#[test]
fn test_unknown_directive_is_reported() {
    match LogFormat::compile("%h %{X}z") {
        Err(FormatError::UnknownDirective(d)) => assert_eq!(d, "%{X}z"),
        other => panic!("expected unknown directive, got {other:?}"),
    }
}
