use crate::traits::QuestionClassifier;
use crate::Result;
use async_trait::async_trait;
use evidence_search::Query;
use serde::{Deserialize, Serialize};

/// Input to round-one classification.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyRequest<'a> {
    pub question: &'a str,
    pub transcript: Option<&'a str>,
    pub has_repos: bool,
    pub has_external: bool,
}

/// Which sources to consult in round one, and with what query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    pub repo_query: Option<String>,
    pub external_query: Option<String>,
}

/// Looks everything up that is available, using the question as the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    #[must_use]
    pub fn classify_now(request: &ClassifyRequest<'_>) -> Classification {
        let question = request.question.trim();
        let repo_query = (request.has_repos && Query::parse(question).is_searchable())
            .then(|| question.to_string());
        let external_query =
            (request.has_external && !question.is_empty()).then(|| question.to_string());
        Classification {
            repo_query,
            external_query,
        }
    }
}

#[async_trait]
impl QuestionClassifier for HeuristicClassifier {
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification> {
        Ok(Self::classify_now(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(question: &str, has_repos: bool, has_external: bool) -> ClassifyRequest<'_> {
        ClassifyRequest {
            question,
            transcript: None,
            has_repos,
            has_external,
        }
    }

    #[test]
    fn uses_every_available_source() {
        let c = HeuristicClassifier::classify_now(&request("  Where is ParseConfig? ", true, true));
        assert_eq!(c.repo_query.as_deref(), Some("Where is ParseConfig?"));
        assert_eq!(c.external_query.as_deref(), Some("Where is ParseConfig?"));
    }

    #[test]
    fn skips_repo_lookup_for_unsearchable_questions() {
        let c = HeuristicClassifier::classify_now(&request("is it?", true, true));
        assert_eq!(c.repo_query, None);
        assert_eq!(c.external_query.as_deref(), Some("is it?"));

        let none = HeuristicClassifier::classify_now(&request("ParseConfig", false, false));
        assert_eq!(none, Classification::default());
    }
}
