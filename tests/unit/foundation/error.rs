use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        HalationError::capability("x")
            .to_string()
            .contains("capability missing:")
    );
    assert!(
        HalationError::allocation("x")
            .to_string()
            .contains("allocation error:")
    );
    assert!(
        HalationError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        HalationError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = HalationError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
