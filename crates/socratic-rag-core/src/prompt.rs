//! Prompt templates for the orchestration loop and the evaluator.
//!
//! | Builder | Step | Output contract |
//! |---------|------|-----------------|
//! | [`meta_cognition`] | decide | exactly one decision token |
//! | [`keyword_extraction`] | extract | up to 3 search terms |
//! | [`summarize`] | compress | short summary of the snippets |
//! | [`final_answer`] | generate | direct answer |
//! | [`final_hint`] | generate | hint that withholds the answer |
//! | [`evaluation`] | score | `{"score": <int>, "reason": "<string>"}` |

use crate::llm::Prompt;

/// Token the model emits when the context is sufficient.
pub const CAN_ANSWER_TOKEN: &str = "CAN_ANSWER";
/// Token the model emits when more retrieval is needed.
pub const CANNOT_ANSWER_TOKEN: &str = "CANNOT_ANSWER";

/// Ask whether the accumulated context is enough to answer now.
pub fn meta_cognition(question: &str, context: &str) -> Prompt {
    Prompt::user(format!(
        "User question: {question}\n\
         Current context:\n{context}\n\
         Can the question be answered using only the information above?"
    ))
    .with_system(format!(
        "You are a metacognitive agent. Judge whether a final answer can be given \
         right now from the context and question alone. Reply with exactly one word: \
         {CAN_ANSWER_TOKEN} or {CANNOT_ANSWER_TOKEN}."
    ))
}

/// Ask for search terms derived from the question alone.
pub fn keyword_extraction(question: &str) -> Prompt {
    Prompt::user(format!(
        "Question: {question}\n\
         List at most 3 search keywords (nouns or named entities) for retrieving \
         relevant documents. Output only the keywords separated by spaces."
    ))
}

/// Ask for a short summary of the retrieved snippets.
pub fn summarize(snippets: &str) -> Prompt {
    Prompt::user(format!(
        "Search results:\n{snippets}\n\
         Summarize only the key points of the above in at most 100 characters."
    ))
}

/// Final prompt in answer mode.
pub fn final_answer(context: &str, question: &str) -> Prompt {
    Prompt::user(format!(
        "Summarized context so far:\n{context}\n\
         Question: {question}\n\
         Answer the question directly and concisely, using the context where it helps. \
         Reply in the same language as the question."
    ))
}

/// Final prompt in hint mode.
pub fn final_hint(context: &str, question: &str) -> Prompt {
    Prompt::user(format!(
        "Summarized context so far:\n{context}\n\
         Question: {question}\n\
         Do not give the answer directly. Write a hint instead. The hint must be easy \
         to follow, specific, and point the user toward the next step of reasoning so \
         they can reach the answer themselves. Never state the final answer. \
         Reply in the same language as the question."
    ))
}

/// Ask a strict reviewer for a JSON score of a (question, answer) pair.
pub fn evaluation(question: &str, answer: &str) -> Prompt {
    Prompt::user(format!("Question:\n{question}\n\nAnswer:\n{answer}")).with_system(
        "You are a strict reviewer. Score the following answer to the question from \
         1 to 10 and give a brief reason (at most 100 characters). Output JSON only, \
         nothing else. Format: {\"score\": <int>, \"reason\": \"<string>\"} \
         Example: {\"score\": 8, \"reason\": \"Accurate and well explained.\"}",
    )
}
