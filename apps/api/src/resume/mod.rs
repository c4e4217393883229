pub mod schema;

pub use schema::{
    validate_resume_value, ResumeData, ResumeEducation, ResumeExperience, ResumeProject,
    ResumeRole,
};
