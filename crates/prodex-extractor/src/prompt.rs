//! Prompt assembly for extraction calls

/// Instruction block describing the expected payload shape.
///
/// Kept in one place so the parser, validator, and prompt never drift
/// apart on section names.
const EXTRACTION_INSTRUCTIONS: &str = r#"You are extracting structured product data from documentation.

Return ONLY a JSON object with exactly these four keys, each an array:
- "relations": [{"relation_type": string, "related_product": string, "context": string, "confidence": number}]
- "specifications": [{"category": string, "name": string, "raw_value": string, "value": number or null, "unit": string or null, "confidence": number}]
- "data_tables": [{"title": string, "headers": [string], "rows": [[string]], "confidence": number}]
- "faq": [{"question": string, "answer": string, "confidence": number}]

Rules:
- Every confidence is a number between 0 and 1 reflecting how certain you are.
- "value" is the number parsed from "raw_value" when one exists, otherwise null.
- Use empty arrays for sections with no findings. No markdown fences, no commentary."#;

/// Build the extraction prompt for one chunk
pub fn extraction_prompt(product_id: &str, chunk_text: &str, chunk_index: usize, chunk_count: usize) -> String {
    let mut prompt = String::with_capacity(EXTRACTION_INSTRUCTIONS.len() + chunk_text.len() + 256);
    prompt.push_str(EXTRACTION_INSTRUCTIONS);
    prompt.push_str(&format!(
        "\n\nProduct: {}\nDocument part {} of {}:\n\n",
        product_id,
        chunk_index + 1,
        chunk_count
    ));
    prompt.push_str(chunk_text);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_chunk_position_and_text() {
        let prompt = extraction_prompt("PX-100", "the document body", 1, 3);
        assert!(prompt.contains("Product: PX-100"));
        assert!(prompt.contains("part 2 of 3"));
        assert!(prompt.ends_with("the document body"));
        assert!(prompt.contains("\"specifications\""));
    }
}
