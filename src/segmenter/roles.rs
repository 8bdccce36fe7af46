use crate::config::SiteProfile;
use crate::markup::MarkupBlock;
use crate::models::Sender;

/// Role evidence for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSignal {
    pub sender: Sender,
    /// Serial of the element that carried the evidence. Blocks sharing a
    /// container belong to the same turn.
    pub container: Option<usize>,
}

/// Decides which side of the conversation a block belongs to.
pub trait RoleClassifier {
    fn classify(&self, block: &MarkupBlock) -> Option<RoleSignal>;
}

impl<F> RoleClassifier for F
where
    F: Fn(&MarkupBlock) -> Option<RoleSignal>,
{
    fn classify(&self, block: &MarkupBlock) -> Option<RoleSignal> {
        self(block)
    }
}

/// Classifies by attribute tokens on the enclosing elements, innermost first.
/// An element hinting at both roles is skipped.
#[derive(Debug, Clone)]
pub struct MarkupHintClassifier {
    user_hints: Vec<String>,
    assistant_hints: Vec<String>,
}

impl MarkupHintClassifier {
    pub fn new(profile: &SiteProfile) -> Self {
        Self {
            user_hints: lowercase(&profile.user_hints),
            assistant_hints: lowercase(&profile.assistant_hints),
        }
    }
}

impl RoleClassifier for MarkupHintClassifier {
    fn classify(&self, block: &MarkupBlock) -> Option<RoleSignal> {
        block.ancestors.iter().rev().find_map(|ancestor| {
            let user = self.user_hints.iter().any(|hint| ancestor.has_hint(hint));
            let assistant = self.assistant_hints.iter().any(|hint| ancestor.has_hint(hint));
            let sender = match (user, assistant) {
                (true, false) => Sender::User,
                (false, true) => Sender::Assistant,
                _ => return None,
            };
            Some(RoleSignal {
                sender,
                container: Some(ancestor.serial),
            })
        })
    }
}

fn lowercase(values: &[String]) -> Vec<String> {
    values.iter().map(|value| value.to_lowercase()).collect()
}
