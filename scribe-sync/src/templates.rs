//! Built-in clinical note templates
//!
//! Section keys are snake_case; headers in free text are matched against
//! their title-cased form.

use crate::document::Template;

pub const SOAP: &str = "soap";
pub const HISTORY: &str = "history";
pub const CONSULTATION: &str = "consultation";
pub const PROGRESS: &str = "progress";

/// All built-in templates, in catalog order
pub fn builtin() -> Vec<Template> {
    vec![soap(), history(), consultation(), progress()]
}

/// Look up a built-in template by format id
pub fn find(id: &str) -> Option<Template> {
    builtin().into_iter().find(|template| template.id == id)
}

pub fn soap() -> Template {
    Template::new(
        SOAP,
        "SOAP Note",
        ["subjective", "objective", "assessment", "plan"],
    )
}

pub fn history() -> Template {
    Template::new(
        HISTORY,
        "History & Physical",
        [
            "chief_complaint",
            "history_of_present_illness",
            "past_medical_history",
            "medications",
            "allergies",
            "social_history",
            "family_history",
            "review_of_systems",
        ],
    )
}

pub fn consultation() -> Template {
    Template::new(
        CONSULTATION,
        "Consultation Note",
        [
            "reason_for_consultation",
            "history_of_present_illness",
            "examination",
            "assessment",
            "recommendations",
        ],
    )
}

pub fn progress() -> Template {
    Template::new(
        PROGRESS,
        "Progress Note",
        ["interval_history", "examination", "assessment", "plan"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_builtin() {
        assert_eq!(find("soap").unwrap().sections.len(), 4);
        assert!(find("discharge").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<String> = builtin().into_iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), builtin().len());
    }
}
