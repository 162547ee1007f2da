//! Diagnostics reported for a loaded document

use insta::assert_snapshot;
use octofhir_hqmf::{HqmfError, Severity, TransformOptions, to_model, to_model_with_options};
use serde_json::json;

fn document() -> serde_json::Value {
    json!({
        "id": "lint",
        "data_criteria": [
            {
                "id": "both",
                "code_list_id": "2.16.840.1.113883.3.464.1.72",
                "inline_code_list": {"LOINC": ["4548-4", "4548-4"]}
            },
            {
                "id": "late",
                "temporal_references": [{"type": "EBS", "reference": "gone"}]
            }
        ],
        "population_criteria": [{"id": "IPP", "reference": "both"}]
    })
}

#[test]
fn test_diagnostic_messages() {
    let model = to_model(&document()).unwrap();
    let diagnostics = model.diagnostics();
    assert_eq!(diagnostics.len(), 2);

    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_snapshot!(diagnostics[0].to_string(), @"error: HQMF0102 - unknown data criteria 'gone' [late]");
    assert_eq!(diagnostics[1].severity, Severity::Warning);
    assert_snapshot!(
        diagnostics[1].to_string(),
        @"warning: HQMF0110 - both code_list_id and inline_code_list are set [both]"
    );
}

#[test]
fn test_error_message() {
    let err = to_model_with_options(&document(), &TransformOptions::eager()).unwrap_err();
    assert_snapshot!(err.to_string(), @"HQMF0102: 'late' references unknown data criteria 'gone'");
}

#[test]
fn test_duplicate_codes_survive() {
    let model = to_model(&document()).unwrap();
    let codes = model
        .data_criteria("both")
        .and_then(|c| c.inline_code_list.as_ref())
        .unwrap();
    assert_eq!(codes["LOINC"], vec!["4548-4", "4548-4"]);
    assert_eq!(model.to_structural(), document());
}

#[test]
fn test_not_an_object() {
    let err = to_model(&json!([])).unwrap_err();
    assert!(matches!(err, HqmfError::MalformedStructural { .. }));
    assert_snapshot!(err.to_string(), @"HQMF0002: expected an object, found an array at $");
}
