use super::*;
use crate::model::{ComplianceStatus, ControlEvidence};
use crate::test_support::ScriptedCompletion;

fn requirement(controls: &[&str]) -> Requirement {
    Requirement {
        name: "Data Protection".to_string(),
        description: "Customer data must be protected".to_string(),
        controls: controls.iter().map(|control| control.to_string()).collect(),
    }
}

fn evidence() -> Vec<RetrievedEvidence> {
    vec![
        RetrievedEvidence {
            chunk_id: 0,
            label: "Section 1".to_string(),
            score: 0.6,
            text: "Vendor encrypts customer data at rest using AES-256.".to_string(),
        },
        RetrievedEvidence {
            chunk_id: 1,
            label: "Exhibit B".to_string(),
            score: 0.5,
            text: "Vendor keeps audit logs for one year.".to_string(),
        },
    ]
}

fn covered(name: &str, chunk_id: i64, quote: &str) -> String {
    format!(
        r#"{{"name": "{name}", "covered": true, "evidence": [{{"chunk_id": {chunk_id}, "label": "Section 1", "quote": "{quote}"}}]}}"#
    )
}

fn uncovered(name: &str) -> String {
    format!(r#"{{"name": "{name}", "covered": false, "evidence": []}}"#)
}

fn response(controls: &[String]) -> String {
    format!(
        r#"{{"requirement": "Data Protection", "controls": [{}], "rationale": "checked", "gaps": ["gap"], "recommendations": ["fix"]}}"#,
        controls.join(", ")
    )
}

#[test]
fn empty_evidence_skips_model_and_is_non_compliant() {
    for controls in [vec![], vec!["Encrypt at rest", "Audit logging"]] {
        let completion = ScriptedCompletion::new(Vec::new());
        let verdict = ComplianceScorer::new(&completion)
            .score(&requirement(&controls), &[])
            .expect("no-evidence scoring should succeed");

        assert_eq!(completion.call_count(), 0);
        assert_eq!(verdict.status, ComplianceStatus::NonCompliant);
        assert_eq!(verdict.confidence, 20);
        assert_eq!(verdict.controls.len(), controls.len());
        assert!(verdict.controls.iter().all(|control| !control.covered));
        assert_eq!(
            verdict.gaps,
            vec!["No evidence found above similarity threshold.".to_string()]
        );
    }
}

#[test]
fn all_controls_covered_is_fully_compliant() {
    let body = response(&[
        covered("Encrypt at rest", 0, "encrypts customer data at rest"),
        covered("Key management", 0, "AES-256"),
        covered("Audit logging", 1, "keeps audit logs"),
    ]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(
            &requirement(&["Encrypt at rest", "Key management", "Audit logging"]),
            &evidence(),
        )
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::FullyCompliant);
    assert_eq!(verdict.confidence, 95);
    assert_eq!(verdict.rationale, "checked");
    assert_eq!(verdict.recommendations, vec!["fix".to_string()]);
}

#[test]
fn no_controls_covered_is_non_compliant_with_floor_confidence() {
    let body = response(&[
        uncovered("Encrypt at rest"),
        uncovered("Key management"),
        uncovered("Audit logging"),
    ]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(
            &requirement(&["Encrypt at rest", "Key management", "Audit logging"]),
            &evidence(),
        )
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::NonCompliant);
    assert_eq!(verdict.confidence, 20);
}

#[test]
fn one_of_three_covered_is_partially_compliant() {
    let body = response(&[
        covered("Encrypt at rest", 0, "encrypts customer data at rest"),
        uncovered("Key management"),
        uncovered("Audit logging"),
    ]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(
            &requirement(&["Encrypt at rest", "Key management", "Audit logging"]),
            &evidence(),
        )
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::PartiallyCompliant);
    assert!((30..=95).contains(&verdict.confidence));
}

#[test]
fn half_coverage_confidence_follows_formula() {
    let body = response(&[
        covered("Encrypt at rest", 0, "encrypts customer data at rest"),
        uncovered("Audit logging"),
    ]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest", "Audit logging"]), &evidence())
        .expect("scoring should succeed");

    // 20 + 30 coverage, +5 quotes, +5 strong retrieval.
    assert_eq!(verdict.status, ComplianceStatus::PartiallyCompliant);
    assert_eq!(verdict.confidence, 60);
}

#[test]
fn covered_without_evidence_is_repaired_before_status() {
    let body = response(&[
        covered("Encrypt at rest", 0, "encrypts customer data at rest"),
        r#"{"name": "Audit logging", "covered": true, "evidence": []}"#.to_string(),
    ]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest", "Audit logging"]), &evidence())
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::PartiallyCompliant);
    assert!(verdict.controls[0].covered);
    assert!(!verdict.controls[1].covered);
}

#[test]
fn blank_quotes_do_not_count_as_evidence() {
    let blank = r#"{"name": "Encrypt at rest", "covered": true, "evidence": [{"chunk_id": 0, "label": "Section 1", "quote": "   "}]}"#;
    let body = response(&[blank.to_string()]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::NonCompliant);
    assert_eq!(verdict.confidence, 20);
    assert!(verdict.controls[0].evidence.is_empty());
}

#[test]
fn upstream_status_and_confidence_are_ignored() {
    let body = r#"{"requirement": "Data Protection", "status": "Fully Compliant", "confidence": 99,
        "controls": [{"name": "Encrypt at rest", "covered": false, "evidence": []}],
        "rationale": "", "gaps": [], "recommendations": []}"#;
    let completion = ScriptedCompletion::new(vec![body]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::NonCompliant);
    assert_eq!(verdict.confidence, 20);
}

#[test]
fn json_is_recovered_from_surrounding_prose() {
    let body = format!(
        "Here is my assessment:\n```json\n{}\n```\nLet me know if you need more.",
        response(&[covered("Encrypt at rest", 0, "AES-256")])
    );
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("brace extraction should recover the JSON");

    assert_eq!(verdict.status, ComplianceStatus::FullyCompliant);
    assert_eq!(
        verdict.controls[0].evidence,
        vec![ControlEvidence {
            chunk_id: 0,
            label: "Section 1".to_string(),
            quote: "AES-256".to_string(),
        }]
    );
}

#[test]
fn unrecoverable_response_is_an_error_for_the_requirement() {
    let completion = ScriptedCompletion::new(vec!["I am unable to evaluate this contract."]);

    let error = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect_err("malformed response should fail");

    let message = format!("{error:#}");
    assert!(message.contains("malformed compliance response"));
    assert!(message.contains("Data Protection"));
}

#[test]
fn model_call_failure_propagates() {
    let completion = ScriptedCompletion::with_failure("rate limited");

    let error = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect_err("model failure should propagate");

    assert!(format!("{error:#}").contains("rate limited"));
}

#[test]
fn missing_controls_fall_back_to_catalog_controls() {
    let completion = ScriptedCompletion::new(vec![
        r#"{"requirement": "Data Protection", "rationale": "nothing relevant"}"#,
    ]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest", "Audit logging"]), &evidence())
        .expect("scoring should succeed");

    let names = verdict
        .controls
        .iter()
        .map(|control| control.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["Encrypt at rest", "Audit logging"]);
    assert_eq!(verdict.status, ComplianceStatus::NonCompliant);
    assert_eq!(verdict.rationale, "nothing relevant");
}

#[test]
fn verdict_uses_catalog_requirement_name() {
    let body = r#"{"requirement": "Something Else", "controls": [], "rationale": ""}"#;
    let completion = ScriptedCompletion::new(vec![body]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("scoring should succeed");

    assert_eq!(verdict.requirement, "Data Protection");
}

#[test]
fn quote_outside_cited_chunk_still_counts() {
    let body = response(&[covered("Encrypt at rest", 1, "encrypts customer data at rest")]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    let verdict = ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("scoring should succeed");

    assert_eq!(verdict.status, ComplianceStatus::FullyCompliant);
}

#[test]
fn prompt_lists_controls_and_evidence_headers() {
    let body = response(&[uncovered("Encrypt at rest")]);
    let completion = ScriptedCompletion::new(vec![body.as_str()]);

    ComplianceScorer::new(&completion)
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("scoring should succeed");

    let prompt = completion.last_prompt().expect("prompt should be recorded");
    assert!(prompt.contains("Requirement: Data Protection"));
    assert!(prompt.contains("- Encrypt at rest"));
    assert!(prompt.contains("[chunk_id=0 | label=Section 1 | score=0.600]"));
    assert!(prompt.contains("[chunk_id=1 | label=Exhibit B | score=0.500]"));
}

#[test]
fn scorer_handles_consecutive_requirements() {
    let completion = ScriptedCompletion::new(Vec::new());
    completion.push_response(&response(&[covered("Encrypt at rest", 0, "AES-256")]));
    completion.push_response(&response(&[uncovered("Audit logging")]));
    let scorer = ComplianceScorer::new(&completion);

    let first = scorer
        .score(&requirement(&["Encrypt at rest"]), &evidence())
        .expect("first scoring should succeed");
    let second = scorer
        .score(&requirement(&["Audit logging"]), &evidence())
        .expect("second scoring should succeed");

    assert_eq!(completion.call_count(), 2);
    assert_eq!(first.status, ComplianceStatus::FullyCompliant);
    assert_eq!(second.status, ComplianceStatus::NonCompliant);
}

#[test]
fn confidence_stays_within_evidenced_bounds() {
    assert_eq!(
        compute_confidence(0, 3, 1, 0.1, ComplianceStatus::NonCompliant),
        30
    );
    assert_eq!(
        compute_confidence(3, 3, 6, 0.9, ComplianceStatus::FullyCompliant),
        95
    );
    assert_eq!(
        compute_confidence(0, 0, 0, 0.9, ComplianceStatus::NonCompliant),
        20
    );
    for covered_count in 0..=4 {
        for score in [0.0, 0.3, 0.5] {
            let status = ComplianceStatus::from_coverage(covered_count, 4);
            let confidence = compute_confidence(covered_count, 4, 1, score, status);
            assert!((30..=95).contains(&confidence));
        }
    }
}

#[test]
fn retrieval_score_band_edges_adjust_confidence() {
    let partial = ComplianceStatus::PartiallyCompliant;
    assert_eq!(compute_confidence(1, 2, 1, 0.40, partial), 60);
    assert_eq!(compute_confidence(1, 2, 1, 0.3999, partial), 55);
    assert_eq!(compute_confidence(1, 2, 1, 0.30, partial), 55);
    assert_eq!(compute_confidence(1, 2, 1, 0.25, partial), 55);
    assert_eq!(compute_confidence(1, 2, 1, 0.2499, partial), 50);
}

#[test]
fn parse_accepts_string_chunk_ids_and_rejects_non_objects() {
    let parsed = parse_claim_response(
        r#"{"controls": [{"name": "A", "covered": true, "evidence": [{"chunk_id": "4", "quote": "x"}]}], "gaps": "single gap"}"#,
    );
    match parsed {
        ClaimParse::Parsed(claim) => {
            let controls = claim.controls.expect("controls should parse");
            assert_eq!(controls[0].evidence[0].chunk_id, 4);
            assert_eq!(claim.gaps, vec!["single gap".to_string()]);
        }
        ClaimParse::MalformedResponse { reason } => {
            panic!("unexpected malformed response: {reason}")
        }
    }

    assert!(matches!(
        parse_claim_response("[1, 2, 3]"),
        ClaimParse::MalformedResponse { .. }
    ));
    assert!(matches!(
        parse_claim_response("} nothing {"),
        ClaimParse::MalformedResponse { .. }
    ));
}
