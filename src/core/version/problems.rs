use serde::Serialize;

/// Ordered so that the running maximum is the worst problem seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ProblemSeverity {
    #[default]
    None,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchProblem {
    pub severity: ProblemSeverity,
    pub description: String,
}

/// Non-fatal issues attached to a patch or profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemContainer {
    problems: Vec<PatchProblem>,
    severity: ProblemSeverity,
}

impl ProblemContainer {
    pub fn add_problem(&mut self, severity: ProblemSeverity, description: impl Into<String>) {
        self.severity = self.severity.max(severity);
        self.problems.push(PatchProblem {
            severity,
            description: description.into(),
        });
    }

    /// Escalate without recording a message (used when folding patch severities).
    pub fn raise_severity(&mut self, severity: ProblemSeverity) {
        self.severity = self.severity.max(severity);
    }

    pub fn problems(&self) -> &[PatchProblem] {
        &self.problems
    }

    pub fn problem_severity(&self) -> ProblemSeverity {
        self.severity
    }

    pub fn has_errors(&self) -> bool {
        self.severity == ProblemSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_running_maximum() {
        let mut problems = ProblemContainer::default();
        assert_eq!(problems.problem_severity(), ProblemSeverity::None);
        problems.add_problem(ProblemSeverity::Error, "broken");
        problems.add_problem(ProblemSeverity::Warning, "meh");
        assert_eq!(problems.problem_severity(), ProblemSeverity::Error);
        assert_eq!(problems.problems().len(), 2);
        assert!(problems.has_errors());
    }
}
