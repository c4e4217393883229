// All LLM prompt constants for the rewrite module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the unit-patch strategy.
/// Replace: {json_only}, {fact_preservation}
pub const UNIT_PATCH_SYSTEM_TEMPLATE: &str = r#"You are an expert resume writer. Your task is to tailor a resume for a specific job description.

You will receive ONLY the text nodes from a Word document (the contents of <w:t> tags), each with an id.

CRITICAL RULES:
1. ONLY propose edits to text content for existing ids. Do NOT add or remove ids.
2. Keep formatting intact by editing as few nodes as possible.
3. Do NOT include unchanged nodes in the edits list.
4. If a change needs more words, add them into the nearest relevant node(s).
5. In the "changes" array, list each modification you made as a brief description (e.g., "Added 'Python' keyword to skills section").

{fact_preservation}

Return a JSON object with this EXACT schema:
{
  "changes": ["Added 'Kubernetes' to the skills line"],
  "edits": [{"id": 12, "text": "replacement text for node 12"}]
}

{json_only}"#;

/// User prompt for the unit-patch strategy.
/// Replace: {units_json}, {job_description}, {job_context}
pub const UNIT_PATCH_PROMPT_TEMPLATE: &str = r#"Resume text nodes (id -> text):
{units_json}

---

Job Description:
{job_description}
{job_context}
Tailor the resume by proposing edits to ONLY the text nodes above."#;

/// System prompt for the structured strategy.
/// Replace: {json_only}, {fact_preservation}, {tolerance_percent}
pub const STRUCTURED_SYSTEM_TEMPLATE: &str = r#"You are an expert resume writer. Your task is to tailor a structured resume for a specific job description.

You will receive the resume as JSON. Return the SAME structure with improved wording.

CRITICAL RULES:
1. Copy these fields byte-for-byte, never change them: header.name, header.email, header.phone, header.linkedin, experience[].company, experience[].companyMeta, experience[].roles[].meta, education[].school, education[].location, education[].dates, projects[].dates.
2. Keep every list the same length and in the same order: education, experience, each experience's roles, each role's bullets, projects, each project's bullets, extras. Do NOT add, remove, merge or split entries.
3. A rewritten bullet or role title may be at most {tolerance_percent}% longer than the original it replaces. Shorter is always fine.
4. In the "changes" array, list each modification you made as a brief description.

{fact_preservation}

Return a JSON object with this EXACT schema:
{
  "data": { ...the full resume, same shape as the input... },
  "changes": ["Reworded the first Acme bullet around distributed systems"]
}

{json_only}"#;

/// User prompt for the structured strategy.
/// Replace: {resume_json}, {job_description}, {job_context}
pub const STRUCTURED_PROMPT_TEMPLATE: &str = r#"Resume (JSON):
{resume_json}

---

Job Description:
{job_description}
{job_context}
Tailor the resume for this job while following every rule."#;

/// Optional company / role lines shared by both strategies.
pub fn job_context(company_name: Option<&str>, role_name: Option<&str>) -> String {
    let mut lines = String::new();
    if let Some(company) = company_name.filter(|c| !c.trim().is_empty()) {
        lines.push_str(&format!("\nCompany: {company}"));
    }
    if let Some(role) = role_name.filter(|r| !r.trim().is_empty()) {
        lines.push_str(&format!("\nRole: {role}"));
    }
    if !lines.is_empty() {
        lines.push('\n');
    }
    lines
}
