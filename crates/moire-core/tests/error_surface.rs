use moire_core::errors::{ErrorInfo, MoireError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("sample", "S1")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = MoireError::Config(sample_info("ladder-missing-one", "ladder lacks 1.0"));
    assert_eq!(err.info().code, "ladder-missing-one");
    assert!(err.info().context.contains_key("reason"));
    assert!(err.to_string().starts_with("config error"));
}

#[test]
fn data_error_surface() {
    let err = MoireError::Data(sample_info("data-allele-count", "length mismatch"));
    assert_eq!(err.info().code, "data-allele-count");
    assert!(err.info().context.contains_key("sample"));
}

#[test]
fn degenerate_init_surface() {
    let err = MoireError::DegenerateInit(
        sample_info("init-non-finite", "likelihood is not finite").with_hint("check data"),
    );
    let rendered = err.to_string();
    assert!(rendered.contains("degenerate initialization"));
    assert!(rendered.contains("hint: check data"));
}

#[test]
fn serde_error_surface() {
    let err = MoireError::serde("yaml", "bad indent");
    assert_eq!(err.info().code, "yaml");
    assert_eq!(err.info().message, "bad indent");
}

#[test]
fn errors_round_trip_through_json() {
    let err = MoireError::Data(sample_info("D001", "empty locus"));
    let json = serde_json::to_string(&err).expect("serialize");
    let decoded: MoireError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}
