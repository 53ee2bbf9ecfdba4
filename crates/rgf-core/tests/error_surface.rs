use rgf_core::errors::{ErrorInfo, RgfError};

#[test]
fn error_payload_roundtrips_through_json() {
    let err = RgfError::Flow(
        ErrorInfo::new("divergence", "coupling magnitude exceeded bound")
            .with_context("max_abs", "1.2e7")
            .with_context("flow_time", "3.25")
            .with_hint("lower the initial step or tighten the divergence bound"),
    );
    let json = serde_json::to_string(&err).unwrap();
    let back: RgfError = serde_json::from_str(&json).unwrap();
    assert_eq!(err, back);
    assert_eq!(back.code(), "divergence");
}

#[test]
fn display_includes_code_and_context() {
    let err = RgfError::Solve(
        ErrorInfo::new("no-convergence", "no seed reached tolerance").with_context("seeds", "3"),
    );
    let text = err.to_string();
    assert!(text.contains("no-convergence"));
    assert!(text.contains("seeds=3"));
}
