use crate::config::ApprovalVocabulary;
use crate::pr::{Comment, ReviewState};

/// Decides whether a single comment signs off on a PR.
///
/// Review verdicts win outright. Otherwise the text is checked, in order,
/// against the non-approval vocabulary (any hit vetoes), the explicit
/// approval tokens (matched as whole words), and the implicit approval
/// phrases (matched anywhere). Matching ignores case.
#[derive(Debug, Clone)]
pub struct ApprovalAnalyzer {
    explicit_approvals: Vec<String>,
    explicit_non_approvals: Vec<String>,
    implicit_approval_phrases: Vec<String>,
}

fn normalized(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// True if `needle` occurs in `haystack` with no alphanumeric character
/// directly on either side.
fn contains_token(haystack: &str, needle: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

impl ApprovalAnalyzer {
    pub fn new(vocabulary: &ApprovalVocabulary) -> Self {
        Self {
            explicit_approvals: normalized(&vocabulary.explicit_approvals),
            explicit_non_approvals: normalized(&vocabulary.explicit_non_approvals),
            implicit_approval_phrases: normalized(&vocabulary.implicit_approval_phrases),
        }
    }

    pub fn is_approval(&self, comment: &Comment) -> bool {
        match comment.review_state {
            Some(ReviewState::Approved) => return true,
            Some(ReviewState::ChangesRequested) | Some(ReviewState::Dismissed) => return false,
            _ => {}
        }

        let text = comment.text.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        if self.explicit_non_approvals.iter().any(|p| contains_token(&text, p)) {
            return false;
        }
        self.explicit_approvals.iter().any(|t| contains_token(&text, t))
            || self.implicit_approval_phrases.iter().any(|p| text.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostingKind;
    use crate::pr::fixtures::comment;

    fn analyzer() -> ApprovalAnalyzer {
        ApprovalAnalyzer::new(&ApprovalVocabulary::defaults_for(HostingKind::GitHub))
    }

    fn says(text: &str) -> Comment {
        comment(1, "bob", text)
    }

    #[test]
    fn test_explicit_tokens() {
        let a = analyzer();
        assert!(a.is_approval(&says("LGTM")));
        assert!(a.is_approval(&says("lgtm!")));
        assert!(a.is_approval(&says(":+1: nice")));
        assert!(a.is_approval(&says("👍")));
        assert!(a.is_approval(&says("+1")));
    }

    #[test]
    fn test_tokens_need_word_boundaries() {
        let a = analyzer();
        assert!(!a.is_approval(&says("the approvedness of this is unclear")));
        assert!(!a.is_approval(&says("1+1 is 2")));
    }

    #[test]
    fn test_implicit_phrases() {
        let a = analyzer();
        assert!(a.is_approval(&says("This looks good to me, thanks")));
        assert!(a.is_approval(&says("I think it's Ready to merge")));
        assert!(!a.is_approval(&says("Could you rename this variable?")));
    }

    #[test]
    fn test_non_approvals_veto() {
        let a = analyzer();
        assert!(!a.is_approval(&says("not lgtm yet")));
        assert!(!a.is_approval(&says("-1, please do not merge")));
        assert!(!a.is_approval(&says("Not approved until tests pass")));
        assert!(!a.is_approval(&says("I don't approve of this approach")));
    }

    #[test]
    fn test_review_state_wins() {
        let a = analyzer();
        let mut approved = says("");
        approved.review_state = Some(ReviewState::Approved);
        assert!(a.is_approval(&approved));

        let mut rejected = says("lgtm apart from the tests");
        rejected.review_state = Some(ReviewState::ChangesRequested);
        assert!(!a.is_approval(&rejected));

        let mut commented = says("lgtm");
        commented.review_state = Some(ReviewState::Commented);
        assert!(a.is_approval(&commented));
    }

    #[test]
    fn test_blank_comment_is_not_approval() {
        assert!(!analyzer().is_approval(&says("   ")));
    }

    #[test]
    fn test_empty_vocabulary_only_trusts_reviews() {
        let a = ApprovalAnalyzer::new(&ApprovalVocabulary::default());
        assert!(!a.is_approval(&says("lgtm")));
    }
}
