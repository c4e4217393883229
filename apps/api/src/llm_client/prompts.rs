// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to all rewrite prompts.
pub const FACT_PRESERVATION_INSTRUCTION: &str = "\
    CRITICAL: Do NOT invent facts. Every skill, employer, date, metric and credential \
    in your output must already be present in the resume you were given. \
    You may reword, reorder words within a line, and surface keywords from the job \
    description only where the resume already supports them.";

/// Appended to the original prompt when a previous answer broke the rules.
/// Replace: {previous_json}, {issues}
pub const RETRY_FEEDBACK_TEMPLATE: &str = r#"

---

Your previous answer was REJECTED because it violated these rules:
{issues}

Previous answer:
{previous_json}

Produce a corrected answer that fixes EVERY issue above while keeping the improvements that were valid. Return the complete JSON object again, not a diff."#;

/// Renders the retry appendix for a rejected candidate.
pub fn retry_feedback(previous_json: &str, issues: &[String]) -> String {
    let issues = issues
        .iter()
        .map(|issue| format!("- {issue}"))
        .collect::<Vec<_>>()
        .join("\n");
    fill_template(
        RETRY_FEEDBACK_TEMPLATE,
        &[("issues", issues.as_str()), ("previous_json", previous_json)],
    )
}

/// Substitutes `{name}` placeholders in a single left-to-right pass.
///
/// Inserted values are never scanned again, so text such as a job description
/// that itself contains `{units_json}` is carried through literally. Braces
/// that do not name a known placeholder are kept as they are.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let filled = values.iter().find_map(|(name, value)| {
            tail[1..]
                .strip_prefix(name)?
                .starts_with('}')
                .then_some((*value, name.len() + 2))
        });
        match filled {
            Some((value, len)) => {
                out.push_str(value);
                rest = &tail[len..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_feedback_lists_every_issue() {
        let text = retry_feedback(
            r#"{"changes":[]}"#,
            &["header.email changed".to_string(), "bullet too long".to_string()],
        );
        assert!(text.contains("- header.email changed\n- bullet too long"));
        assert!(text.contains(r#"Previous answer:
{"changes":[]}"#));
    }

    #[test]
    fn test_retry_feedback_keeps_placeholder_text_in_issues() {
        let text = retry_feedback(
            r#"{"changes":["mentions {issues}"]}"#,
            &["bullets[0] is \"{previous_json}\"".to_string()],
        );
        assert!(text.contains(r#"- bullets[0] is "{previous_json}""#));
        assert!(text.contains(r#"{"changes":["mentions {issues}"]}"#));
    }

    #[test]
    fn test_fill_template_is_single_pass() {
        let filled = fill_template(
            "Job: {job}\nData: {data}\nLiteral: {\"id\": 0} {unknown}",
            &[("job", "copy {data} here"), ("data", "[1, 2]")],
        );
        assert_eq!(
            filled,
            "Job: copy {data} here\nData: [1, 2]\nLiteral: {\"id\": 0} {unknown}"
        );
    }
}
