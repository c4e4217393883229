//! Canonical resume shape and structural validation.
//!
//! Validation here is purely about shape: required keys and value types. Rules
//! that compare a rewrite against its original (identical contact fields, bullet
//! budgets, …) live in `rewrite::validator`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResumeHeader {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub linkedin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeEducation {
    pub school: String,
    pub location: String,
    pub dates: String,
    pub degree: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRole {
    pub title: String,
    pub meta: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeExperience {
    pub company: String,
    pub company_meta: String,
    pub roles: Vec<ResumeRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProject {
    pub name: String,
    pub dates: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResumeSkills {
    pub technical: String,
    pub financial: String,
    pub languages: String,
}

/// A resume as a typed tree. List order is meaningful everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResumeData {
    pub header: ResumeHeader,
    pub education: Vec<ResumeEducation>,
    pub experience: Vec<ResumeExperience>,
    pub projects: Vec<ResumeProject>,
    pub skills: ResumeSkills,
    pub extras: Vec<String>,
}

/// One structural problem, addressed by JSON path (`experience[0].roles[1].title`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validates arbitrary JSON against the resume shape.
///
/// Every problem is reported, not just the first. Unknown keys are ignored.
pub fn validate_resume_value(value: &Value) -> Result<ResumeData, Vec<SchemaError>> {
    let mut errors = Vec::new();
    check_resume(value, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value(value.clone()).map_err(|e| {
        vec![SchemaError {
            path: "$".to_string(),
            message: e.to_string(),
        }]
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Shape walkers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Shape {
    Text,
    TextList,
    Object(fn(&Value, &str, &mut Vec<SchemaError>)),
    ObjectList(fn(&Value, &str, &mut Vec<SchemaError>)),
}

fn check_resume(value: &Value, errors: &mut Vec<SchemaError>) {
    check_fields(
        value,
        "",
        &[
            ("header", Shape::Object(check_header)),
            ("education", Shape::ObjectList(check_education)),
            ("experience", Shape::ObjectList(check_experience)),
            ("projects", Shape::ObjectList(check_project)),
            ("skills", Shape::Object(check_skills)),
            ("extras", Shape::TextList),
        ],
        errors,
    );
}

fn check_header(value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    check_text_fields(value, path, &["name", "phone", "email", "linkedin"], errors);
}

fn check_education(value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    check_text_fields(
        value,
        path,
        &["school", "location", "dates", "degree", "details"],
        errors,
    );
}

fn check_experience(value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    check_fields(
        value,
        path,
        &[
            ("company", Shape::Text),
            ("companyMeta", Shape::Text),
            ("roles", Shape::ObjectList(check_role)),
        ],
        errors,
    );
}

fn check_role(value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    check_fields(
        value,
        path,
        &[
            ("title", Shape::Text),
            ("meta", Shape::Text),
            ("bullets", Shape::TextList),
        ],
        errors,
    );
}

fn check_project(value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    check_fields(
        value,
        path,
        &[
            ("name", Shape::Text),
            ("dates", Shape::Text),
            ("bullets", Shape::TextList),
        ],
        errors,
    );
}

fn check_skills(value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    check_text_fields(value, path, &["technical", "financial", "languages"], errors);
}

fn check_text_fields(value: &Value, path: &str, keys: &[&str], errors: &mut Vec<SchemaError>) {
    let fields: Vec<(&str, Shape)> = keys.iter().map(|k| (*k, Shape::Text)).collect();
    check_fields(value, path, &fields, errors);
}

fn check_fields(value: &Value, path: &str, fields: &[(&str, Shape)], errors: &mut Vec<SchemaError>) {
    let Some(object) = value.as_object() else {
        errors.push(type_error(path_or_root(path), "object", value));
        return;
    };

    for (key, shape) in fields {
        let field_path = join(path, key);
        match object.get(*key) {
            None => errors.push(SchemaError {
                path: field_path,
                message: "required field is missing".to_string(),
            }),
            Some(field) => check_shape(field, &field_path, *shape, errors),
        }
    }
}

fn check_shape(value: &Value, path: &str, shape: Shape, errors: &mut Vec<SchemaError>) {
    match shape {
        Shape::Text => {
            if !value.is_string() {
                errors.push(type_error(path.to_string(), "string", value));
            }
        }
        Shape::Object(check) => check(value, path, errors),
        Shape::TextList | Shape::ObjectList(_) => {
            let Some(items) = value.as_array() else {
                errors.push(type_error(path.to_string(), "array", value));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{index}]");
                match shape {
                    Shape::ObjectList(check) => check(item, &item_path, errors),
                    _ => check_shape(item, &item_path, Shape::Text, errors),
                }
            }
        }
    }
}

fn type_error(path: String, expected: &str, found: &Value) -> SchemaError {
    SchemaError {
        path,
        message: format!("expected {expected}, found {}", kind_of(found)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn path_or_root(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}
