use indoc::formatdoc;

use crate::index::PointResult;

const NO_CONTEXT: &str = "No specific context provided.";

#[must_use]
pub fn build_prompt(query: &str, sources: &[PointResult]) -> String {
    let context = if sources.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        sources
            .iter()
            .map(|source| source.payload.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    formatdoc!(
        "Based *only* on the following context extracted from the documents, please answer the question.
        If the context doesn't contain the answer, state that the information is not available in the provided text.
        Do not use any prior knowledge.

        Context:
        {context}

        Question: {query}

        Answer:",
        context = context,
        query = query,
    )
}
