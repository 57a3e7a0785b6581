//! Grounded prompt composition

use docqa_common::generation::{ANSWER_HEADING, CONTEXT_HEADING, QUESTION_HEADING, UNANSWERED};
use docqa_search::ScoredChunk;

/// Separator between retrieved chunks in the context section
const CHUNK_SEPARATOR: &str = "\n\n";

/// Builds the prompt sent to the generator for a question
#[derive(Debug, Clone)]
pub struct PromptComposer {
    instruction: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            instruction: format!(
                "Answer the question as detailed as possible from the provided context. \
                 Make sure to provide all details.\n\
                 If the answer is not in the provided context, just say, \"{}\"\n\
                 Do not provide incorrect information.",
                UNANSWERED
            ),
        }
    }
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Prompt with `chunks` as context, in the order given
    pub fn compose(&self, question: &str, chunks: &[ScoredChunk]) -> String {
        let context = chunks
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR);

        format!(
            "{instruction}\n\n{context_heading}\n{context}\n\n{question_heading}\n{question}\n\n{answer_heading}\n",
            instruction = self.instruction,
            context_heading = CONTEXT_HEADING,
            context = context,
            question_heading = QUESTION_HEADING,
            question = question.trim(),
            answer_heading = ANSWER_HEADING,
        )
    }
}

/// Whether a generated answer is the "not in context" phrase
///
/// Surrounding whitespace, quotes and a missing final period are tolerated.
pub fn is_unanswered(text: &str) -> bool {
    let normalize = |s: &str| {
        s.trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim()
            .trim_end_matches('.')
            .to_lowercase()
    };
    normalize(text) == normalize(UNANSWERED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_common::models::Chunk;

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                source_id: "doc.pdf".to_string(),
                chunk_index: 0,
                start_offset: 0,
                text: text.to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = PromptComposer::new().compose(
            "  What is the capital of France? ",
            &[scored("The capital of France is Paris.", 0.9), scored("Lyon is a city.", 0.4)],
        );

        assert!(prompt.contains("just say, \"Answer is not available in the context.\""));
        assert!(prompt.contains(
            "Context:\nThe capital of France is Paris.\n\nLyon is a city.\n\nQuestion:\nWhat is the capital of France?\n\nAnswer:\n"
        ));
        let context_at = prompt.find("Context:").unwrap();
        assert!(prompt.find("Paris").unwrap() > context_at);
    }

    #[test]
    fn test_instruction_has_no_section_headings() {
        let composer = PromptComposer::new();
        for heading in [CONTEXT_HEADING, QUESTION_HEADING, ANSWER_HEADING] {
            assert!(!composer.instruction().contains(heading));
        }
    }

    #[test]
    fn test_is_unanswered() {
        assert!(is_unanswered("Answer is not available in the context."));
        assert!(is_unanswered("  \"Answer is not available in the context.\"\n"));
        assert!(is_unanswered("answer is not available in the context"));
        assert!(!is_unanswered("Paris. Answer is not available in the context."));
        assert!(!is_unanswered("The capital of France is Paris."));
    }
}
