//! Invariant Validator for structured rewrites.
//!
//! Compares a candidate `ResumeData` against the original and reports every
//! violated invariant. The walk never stops early: one issue per violation,
//! each naming the path and both values.
//!
//! Invariants:
//! - identity fields are byte-identical (contact header, company / role
//!   metadata, education identity, project dates)
//! - every collection keeps its length; entries are matched by index
//! - bullets may grow by at most `tolerance` (rounded up to whole characters)

use crate::resume::{ResumeData, ResumeEducation, ResumeExperience, ResumeProject, ResumeRole};

/// Default growth budget for a rewritten bullet.
pub const DEFAULT_BULLET_TOLERANCE: f64 = 0.10;

/// Absorbs float noise so that e.g. `40 * 1.1` is a limit of 44, not 45.
const LIMIT_EPSILON: f64 = 1e-9;

/// Returns every invariant the candidate violates. Empty means valid.
pub fn validate(candidate: &ResumeData, original: &ResumeData, tolerance: f64) -> Vec<String> {
    let mut walker = Walker {
        issues: Vec::new(),
        tolerance,
    };

    let (c, o) = (&candidate.header, &original.header);
    walker.identical("header.name", &o.name, &c.name);
    walker.identical("header.email", &o.email, &c.email);
    walker.identical("header.phone", &o.phone, &c.phone);
    walker.identical("header.linkedin", &o.linkedin, &c.linkedin);

    walker.each("education", &original.education, &candidate.education, Walker::education);
    walker.each("experience", &original.experience, &candidate.experience, Walker::experience);
    walker.each("projects", &original.projects, &candidate.projects, Walker::project);
    walker.count("extras", original.extras.len(), candidate.extras.len());

    walker.issues
}

/// Longest allowed rewrite of a bullet that was `original_len` characters.
pub fn bullet_limit(original_len: usize, tolerance: f64) -> usize {
    ((original_len as f64) * (1.0 + tolerance) - LIMIT_EPSILON).ceil().max(0.0) as usize
}

struct Walker {
    issues: Vec<String>,
    tolerance: f64,
}

impl Walker {
    fn identical(&mut self, path: &str, original: &str, candidate: &str) {
        if original != candidate {
            self.issues.push(format!(
                "{path} must stay unchanged: expected {original:?}, found {candidate:?}"
            ));
        }
    }

    /// Records a count issue and returns whether the lengths match.
    fn count(&mut self, path: &str, original: usize, candidate: usize) -> bool {
        if original != candidate {
            self.issues.push(format!(
                "{path} must keep {original} entries, found {candidate}"
            ));
            return false;
        }
        true
    }

    /// Checks the count of a collection and, when it matches, visits entries
    /// pairwise by index.
    fn each<T>(
        &mut self,
        path: &str,
        original: &[T],
        candidate: &[T],
        visit: fn(&mut Self, &str, &T, &T),
    ) {
        if !self.count(path, original.len(), candidate.len()) {
            return;
        }
        for (index, (o, c)) in original.iter().zip(candidate).enumerate() {
            visit(self, &format!("{path}[{index}]"), o, c);
        }
    }

    fn education(&mut self, path: &str, o: &ResumeEducation, c: &ResumeEducation) {
        self.identical(&format!("{path}.school"), &o.school, &c.school);
        self.identical(&format!("{path}.location"), &o.location, &c.location);
        self.identical(&format!("{path}.dates"), &o.dates, &c.dates);
    }

    fn experience(&mut self, path: &str, o: &ResumeExperience, c: &ResumeExperience) {
        self.identical(&format!("{path}.company"), &o.company, &c.company);
        self.identical(&format!("{path}.companyMeta"), &o.company_meta, &c.company_meta);
        self.each(&format!("{path}.roles"), &o.roles, &c.roles, Walker::role);
    }

    fn role(&mut self, path: &str, o: &ResumeRole, c: &ResumeRole) {
        self.identical(&format!("{path}.meta"), &o.meta, &c.meta);
        self.bullets(&format!("{path}.bullets"), &o.bullets, &c.bullets);
    }

    fn project(&mut self, path: &str, o: &ResumeProject, c: &ResumeProject) {
        self.identical(&format!("{path}.dates"), &o.dates, &c.dates);
        self.bullets(&format!("{path}.bullets"), &o.bullets, &c.bullets);
    }

    fn bullets(&mut self, path: &str, original: &[String], candidate: &[String]) {
        if !self.count(path, original.len(), candidate.len()) {
            return;
        }
        for (index, (o, c)) in original.iter().zip(candidate).enumerate() {
            let original_len = o.chars().count();
            let candidate_len = c.chars().count();
            let limit = bullet_limit(original_len, self.tolerance);
            if candidate_len > limit {
                self.issues.push(format!(
                    "{path}[{index}] is {candidate_len} characters, limit is {limit} \
                     (original {original_len}): {c:?}"
                ));
            }
        }
    }
}
