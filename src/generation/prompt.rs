use itertools::Itertools;

use super::ChatMessage;

pub const SYSTEM_PROMPT: &str = "Use the following context to answer a users question. \
If you cannot find the answer in the context, say you don't know the answer.";

/// Build the system + user message pair for a question.
///
/// Context texts are joined with newlines in the order given, which callers
/// keep as the ranked retrieval order.
#[inline]
pub fn build_messages<S: AsRef<str>>(question: &str, context: &[S]) -> Vec<ChatMessage> {
    let context = context.iter().map(AsRef::<str>::as_ref).join("\n");
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Context:\n{context}\n\nQuestion:\n{question}\n"
        )),
    ]
}
