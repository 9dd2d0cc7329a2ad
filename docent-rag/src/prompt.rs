//! Grounded prompt construction.

use std::fmt::Write;

use docent_retriever::RankedResult;

const GROUNDED_PREAMBLE: &str = "You are a careful assistant answering questions about a private document \
collection. Answer using only the documents below. If they do not contain \
enough information, say so plainly instead of guessing.";

const UNGROUNDED_PREAMBLE: &str = "You are a careful assistant answering questions about a private document \
collection. No supporting documents were found for this question. Tell the \
reader that the collection contains no relevant material; if you answer from \
general knowledge anyway, label it clearly as ungrounded.";

/// Render the retrieval results and question into a single prompt.
///
/// `sources` must already be sorted by descending similarity (the pipeline
/// guarantees this); each becomes a numbered block with its source document
/// and score. Zero sources switches to an explicit "nothing found" preamble
/// rather than silently answering ungrounded.
pub fn build_prompt(question: &str, sources: &[RankedResult]) -> String {
    let mut prompt = String::new();
    if sources.is_empty() {
        prompt.push_str(UNGROUNDED_PREAMBLE);
        prompt.push_str("\n\nQuestion: ");
        prompt.push_str(question);
        prompt.push_str("\n\nAnswer:");
        return prompt;
    }

    prompt.push_str(GROUNDED_PREAMBLE);
    prompt.push_str("\n\n");
    for (i, source) in sources.iter().enumerate() {
        // Infallible for String, but write! keeps the formatting readable.
        let _ = write!(
            prompt,
            "[Document {n}] (similarity: {similarity:.3})\nSource: {name}\nContent: {content}\n\n",
            n = i + 1,
            similarity = source.similarity,
            name = source.document_name,
            content = source.content,
        );
    }
    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt.push_str("\n\nAnswer based on the documents above:");
    prompt
}
