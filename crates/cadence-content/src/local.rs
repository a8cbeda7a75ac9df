use crate::{ContentProvider, Generated, IssueContent};
use cadence_core::synth;

/// Deterministic provider backed by [`synth`]. Same input, same output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProvider;

#[async_trait::async_trait]
impl ContentProvider for LocalProvider {
    async fn commit_message(&self, context: &str) -> Generated<String> {
        Generated::fresh(synth::commit_message(context))
    }

    async fn issue_content(&self, topic: &str) -> Generated<IssueContent> {
        let (title, body) = synth::issue_content(topic);
        Generated::fresh(IssueContent { title, body })
    }

    async fn code_snippet(&self, filename: &str) -> Generated<String> {
        Generated::fresh(synth::code_snippet(filename))
    }
}
