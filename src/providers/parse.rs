//! Boundary parsing for JSON-shaped collaborator responses.
//!
//! Generators and evaluators often answer through loosely structured text
//! with a JSON payload embedded somewhere inside (a fenced code block, or a
//! bare object). These helpers pull the payload out and convert it into the
//! typed records, failing fast with a typed error on malformed input instead
//! of letting loosely-typed data travel inward.

use crate::errors::{EvaluationError, PlanningError};
use crate::evaluation::{Decision, Evaluation, GapAnalysis};
use crate::money::Cents;
use crate::pilot::{PilotId, PilotStrategy};

/// Parse a generator response into strategies, checking the plan fits the
/// total budget.
///
/// Expected payload shape:
///
/// ```json
/// {
///   "strategies": [
///     {
///       "id": "pilot-a",
///       "tier": "standard",
///       "budget_cents": 4000,
///       "probe_units": 2,
///       "full_units": 8,
///       "rationale": "single-shot, cheapest"
///     }
///   ]
/// }
/// ```
pub fn parse_strategies(
    output: &str,
    total_budget: Cents,
) -> Result<Vec<PilotStrategy>, PlanningError> {
    let json_str = extract_json(output)
        .ok_or_else(|| PlanningError::new("no JSON payload in generator response"))?;
    let value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| PlanningError::new(format!("invalid JSON in generator response: {e}")))?;

    let items = value
        .get("strategies")
        .and_then(|v| v.as_array())
        .ok_or_else(|| PlanningError::new("generator response missing 'strategies' array"))?;

    let mut strategies = Vec::with_capacity(items.len());
    let mut planned_total = Cents::ZERO;
    for (index, item) in items.iter().enumerate() {
        let strategy = parse_strategy(item)
            .ok_or_else(|| PlanningError::new(format!("strategy {index} is malformed")))?;
        planned_total = planned_total
            .checked_add(strategy.allocated_budget)
            .ok_or_else(|| PlanningError::new("planned allocations overflow"))?;
        strategies.push(strategy);
    }

    if planned_total > total_budget {
        return Err(PlanningError::new(format!(
            "planned allocations {planned_total} exceed total budget {total_budget}"
        )));
    }

    Ok(strategies)
}

/// Parse a single strategy object. Returns None if required fields are
/// missing or mistyped.
fn parse_strategy(value: &serde_json::Value) -> Option<PilotStrategy> {
    let id = value.get("id").and_then(|v| v.as_str())?;
    let budget_cents = value.get("budget_cents").and_then(|v| v.as_u64())?;

    let tier = value
        .get("tier")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let probe_units = value
        .get("probe_units")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as u32;
    let full_units = value
        .get("full_units")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as u32;
    let rationale = value
        .get("rationale")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(
        PilotStrategy::new(id, tier, Cents(budget_cents), probe_units, full_units)
            .with_rationale(rationale),
    )
}

/// Parse an evaluator response for `pilot` into an `Evaluation`.
///
/// `score` is required; the decision defaults from the score when absent,
/// and the multiplier defaults to 1.0 for continue / 0.0 for cancel.
pub fn parse_evaluation(output: &str, pilot: &PilotId) -> Result<Evaluation, EvaluationError> {
    let json_str = extract_json(output)
        .ok_or_else(|| EvaluationError::new("no JSON payload in evaluator response"))?;
    let value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| EvaluationError::new(format!("invalid JSON in evaluator response: {e}")))?;

    let score = value
        .get("score")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| EvaluationError::new("evaluator response missing numeric 'score'"))?;
    if score > 100 {
        return Err(EvaluationError::new(format!(
            "score {score} outside 0-100"
        )));
    }
    let score = score as u8;

    let decision = match value.get("decision").and_then(|v| v.as_str()) {
        Some("continue") => Decision::Continue,
        Some("cancel") => Decision::Cancel,
        Some(other) => {
            return Err(EvaluationError::new(format!(
                "unknown decision '{other}', expected continue|cancel"
            )));
        }
        None => {
            if score >= 65 {
                Decision::Continue
            } else {
                Decision::Cancel
            }
        }
    };

    let budget_multiplier = value
        .get("budget_multiplier")
        .and_then(|v| v.as_f64())
        .unwrap_or(match decision {
            Decision::Continue => 1.0,
            Decision::Cancel => 0.0,
        });

    let gaps = GapAnalysis {
        matched: parse_string_list(&value, "matched"),
        missing: parse_string_list(&value, "missing"),
        quality_issues: parse_string_list(&value, "quality_issues"),
    };

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Ok(
        Evaluation::new(pilot.clone(), score, decision, budget_multiplier)
            .with_gaps(gaps)
            .with_reasoning(reasoning),
    )
}

fn parse_string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Extract JSON from output that may contain markdown or other text.
pub(crate) fn extract_json(output: &str) -> Option<String> {
    // Try to find JSON in a code block
    if let Some(start) = output.find("```json") {
        let after_marker = &output[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return Some(after_marker[..end].trim().to_string());
        }
    }

    // Try to find JSON in a generic code block
    if let Some(start) = output.find("```") {
        let after_marker = &output[start + 3..];
        if let Some(end) = after_marker.find("```") {
            if let Some(json_start) = after_marker[..end].find('{') {
                let content = &after_marker[json_start..end];
                if !content.is_empty() {
                    return Some(content.trim().to_string());
                }
            }
        }
    }

    // Try to find a raw JSON object
    if let Some(start) = output.find('{') {
        let mut depth = 0;
        let mut end = start;
        for (i, c) in output[start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        if depth == 0 && end > start {
            return Some(output[start..end].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pilot::ProductionTier;

    // =========================================
    // JSON extraction tests
    // =========================================

    #[test]
    fn test_extract_json_code_block() {
        let output = r#"
Here is the plan:
```json
{"strategies": []}
```
"#;
        let json = extract_json(output).unwrap();
        assert!(json.contains("strategies"));
    }

    #[test]
    fn test_extract_json_raw() {
        let output = r#"The plan is {"strategies": []} as discussed."#;
        let json = extract_json(output).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
    }

    #[test]
    fn test_extract_json_nested_braces() {
        let output = r#"{"a": {"b": {"c": 1}}} trailing"#;
        let json = extract_json(output).unwrap();
        assert_eq!(json, r#"{"a": {"b": {"c": 1}}}"#);
    }

    #[test]
    fn test_extract_json_none_when_absent() {
        assert!(extract_json("no payload here").is_none());
    }

    // =========================================
    // Strategy parsing tests
    // =========================================

    #[test]
    fn test_parse_strategies_complete() {
        let output = r#"
```json
{
  "strategies": [
    {"id": "a", "tier": "draft", "budget_cents": 4000, "probe_units": 2, "full_units": 8, "rationale": "cheap and fast"},
    {"id": "b", "tier": "premium", "budget_cents": 6000, "probe_units": 1, "full_units": 4}
  ]
}
```
"#;
        let strategies = parse_strategies(output, Cents(15_000)).unwrap();
        assert_eq!(strategies.len(), 2);
        assert_eq!(strategies[0].id, PilotId::new("a"));
        assert_eq!(strategies[0].tier, ProductionTier::Draft);
        assert_eq!(strategies[0].allocated_budget, Cents(4_000));
        assert_eq!(strategies[0].rationale, "cheap and fast");
        // Defaults where optional fields are absent.
        assert_eq!(strategies[1].probe_units, 1);
        assert_eq!(strategies[1].rationale, "");
    }

    #[test]
    fn test_parse_strategies_unknown_tier_defaults_to_standard() {
        let output = r#"{"strategies": [{"id": "a", "tier": "deluxe", "budget_cents": 100}]}"#;
        let strategies = parse_strategies(output, Cents(1_000)).unwrap();
        assert_eq!(strategies[0].tier, ProductionTier::Standard);
    }

    #[test]
    fn test_parse_strategies_missing_required_field_fails() {
        let output = r#"{"strategies": [{"id": "a"}]}"#;
        let err = parse_strategies(output, Cents(1_000)).unwrap_err();
        assert!(err.message.contains("malformed"));
    }

    #[test]
    fn test_parse_strategies_over_budget_fails() {
        let output = r#"{"strategies": [
            {"id": "a", "budget_cents": 9000},
            {"id": "b", "budget_cents": 9000}
        ]}"#;
        let err = parse_strategies(output, Cents(15_000)).unwrap_err();
        assert!(err.message.contains("exceed"));
    }

    #[test]
    fn test_parse_strategies_not_json_fails() {
        let err = parse_strategies("I could not come up with a plan.", Cents(1_000)).unwrap_err();
        assert!(err.message.contains("no JSON payload"));
    }

    // =========================================
    // Evaluation parsing tests
    // =========================================

    #[test]
    fn test_parse_evaluation_complete() {
        let output = r#"
```json
{
  "score": 85,
  "decision": "continue",
  "budget_multiplier": 0.75,
  "matched": ["subject", "palette"],
  "missing": ["motion"],
  "quality_issues": ["banding in gradients"],
  "reasoning": "Strong stills, no motion test yet."
}
```
"#;
        let eval = parse_evaluation(output, &PilotId::new("b")).unwrap();
        assert_eq!(eval.score, 85);
        assert_eq!(eval.decision, Decision::Continue);
        assert_eq!(eval.budget_multiplier, 0.75);
        assert_eq!(eval.gaps.matched.len(), 2);
        assert_eq!(eval.gaps.missing, vec!["motion".to_string()]);
        assert!(eval.reasoning.contains("motion"));
    }

    #[test]
    fn test_parse_evaluation_decision_defaults_from_score() {
        let eval = parse_evaluation(r#"{"score": 70}"#, &PilotId::new("a")).unwrap();
        assert_eq!(eval.decision, Decision::Continue);
        assert_eq!(eval.budget_multiplier, 1.0);

        let eval = parse_evaluation(r#"{"score": 40}"#, &PilotId::new("a")).unwrap();
        assert_eq!(eval.decision, Decision::Cancel);
        assert_eq!(eval.budget_multiplier, 0.0);
    }

    #[test]
    fn test_parse_evaluation_missing_score_fails() {
        let err = parse_evaluation(r#"{"decision": "continue"}"#, &PilotId::new("a")).unwrap_err();
        assert!(err.message.contains("score"));
    }

    #[test]
    fn test_parse_evaluation_score_out_of_range_fails() {
        let err = parse_evaluation(r#"{"score": 120}"#, &PilotId::new("a")).unwrap_err();
        assert!(err.message.contains("0-100"));
    }

    #[test]
    fn test_parse_evaluation_unknown_decision_fails() {
        let err =
            parse_evaluation(r#"{"score": 80, "decision": "maybe"}"#, &PilotId::new("a"))
                .unwrap_err();
        assert!(err.message.contains("maybe"));
    }
}
