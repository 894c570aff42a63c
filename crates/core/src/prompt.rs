use crate::models::SearchHit;

pub const REFUSAL: &str = "I cannot find specific information on that in the provided documents.";

const RETRIEVAL_SYSTEM: &str = "You are an AI assistant designed for healthcare professionals. \
Your primary goal is to provide accurate and concise answers to medical questions \
strictly based on the provided local medical documents.";

const DOCUMENT_SYSTEM: &str = "You are an AI assistant designed for healthcare professionals. \
Answer the question using only the content of the document supplied by the user. \
Do not invent information.";

pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Retrieved chunk texts separated by blank lines, in rank order.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn retrieval_prompt(context: &str, question: &str) -> Prompt {
    let user = format!(
        "If the information required to answer the question is not explicitly present in the provided context, \
state clearly, \"{REFUSAL}\" Do not invent information.\n\n\
Focus on being direct and factual. Avoid conversational filler.\n\n\
Context: {context}\n\n\
Question: {question}"
    );

    Prompt {
        system: RETRIEVAL_SYSTEM.to_string(),
        user,
    }
}

pub fn document_prompt(document_text: &str, question: &str) -> Prompt {
    let user = format!(
        "Document content:\n{document_text}\n\n\
If the document does not contain the answer, say so plainly.\n\n\
Question: {question}"
    );

    Prompt {
        system: DOCUMENT_SYSTEM.to_string(),
        user,
    }
}

/// The first `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            chunk: Chunk {
                chunk_id: text.to_string(),
                document_id: "doc".to_string(),
                source_name: "doc.pdf".to_string(),
                chunk_index: 0,
                start_offset: 0,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn context_joins_chunks_in_rank_order() {
        let context = build_context(&[hit("first"), hit("second")]);
        assert_eq!(context, "first\n\nsecond");
    }

    #[test]
    fn retrieval_prompt_contains_refusal_context_and_question() {
        let prompt = retrieval_prompt("Administer 500mg.", "What is the dosage?");
        assert!(prompt.user.contains(REFUSAL));
        assert!(prompt.user.contains("Context: Administer 500mg."));
        assert!(prompt.user.ends_with("Question: What is the dosage?"));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("ñandú", 2), "ña");
    }
}
