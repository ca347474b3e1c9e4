//! Prompt templates for the chat model.
//!
//! The section headings are shared with [`crate::answer`]; the parser finds
//! sections by these exact names.

use crate::retriever::Hit;

pub const ANSWER_HEADING: &str = "### Answer";
pub const SUGGESTIONS_HEADING: &str = "### Product Improvement Suggestions";
pub const MARKETING_HEADING: &str = "### Marketing Suggestions";
pub const SOURCES_HEADING: &str = "### Sources";

/// Label of the optional block carrying external insights.
pub const INSIGHTS_LABEL: &str = "Additional Insights:";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Renders hits as `Source / Product / Excerpt` blocks, in input order.
pub fn render_context(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| {
            format!(
                "Source: {}\nProduct: {}\nExcerpt: {}\n",
                h.source, h.product_name, h.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Plain RAG prompt: concise answer with a trailing `Sources:` list.
pub fn build_basic_prompt(question: &str, hits: &[Hit]) -> String {
    let context_block = render_context(hits);
    format!(
        "You are a helpful assistant that answers questions about skincare products using the provided context. \
Use the context to cite product pages and ingredients. If the answer cannot be found in the context, say you don't know and suggest checking the product pages.

Context:
{context_block}

Question: {question}

Answer concisely and list the source URLs you used at the end under 'Sources:'.
"
    )
}

/// Three-task prompt (retrieval answer, improvement reasoning, marketing) with fixed section headings.
/// `insights` is rendered as a labeled block only when present and non-blank.
pub fn build_prompt(question: &str, hits: &[Hit], insights: Option<&str>) -> String {
    let context_block = render_context(hits);
    let insights_block = insights
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("\n{INSIGHTS_LABEL}\n{s}\n"))
        .unwrap_or_default();

    format!(
        "
You are a skincare marketing specialist RAG system.

FIRST TASK - Product Retrieval:
Use ONLY the context to answer the user's question.
If the answer cannot be found in the context, say \"I don't know\".
List matching products with citations.

SECOND TASK - Product Improvement Reasoning:
Using the extracted product ingredients AND the external insights provided,
determine:
1. What these products do well.
2. What could be improved.
3. How the product could be optimized.

THIRD TASK - Marketing Suggestions:
Based on the above reasoning, suggest marketing angles or product improvements
that would better address the user's concern.

Context:
{context_block}
{insights_block}
User Question:
{question}

Return the answer in this format:

{ANSWER_HEADING}
<normal RAG answer>

{SUGGESTIONS_HEADING}
<improvement suggestions based on insights + product data>

{MARKETING_HEADING}
<marketing suggestions based on insights + product data>

{SOURCES_HEADING}
<list URLs or metadata sources>
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ChunkMeta;

    fn hit(id: i64, name: &str, text: &str) -> Hit {
        Hit {
            id,
            score: 0.5,
            product_id: format!("p{id}"),
            product_name: name.to_string(),
            text: text.to_string(),
            source: format!("https://example.com/{id}"),
            meta: ChunkMeta::default(),
        }
    }

    #[test]
    fn no_insights_block_without_insights() {
        let p = build_prompt("dry skin?", &[hit(1, "UreaRepair", "10% urea")], None);
        assert!(!p.contains("Additional Insights"));
        let blank = build_prompt("dry skin?", &[], Some("   "));
        assert!(!blank.contains("Additional Insights"));
    }

    #[test]
    fn insights_rendered_once() {
        let p = build_prompt("dry skin?", &[hit(1, "UreaRepair", "10% urea")], Some("low ceramides"));
        assert_eq!(p.matches("low ceramides").count(), 1);
        assert_eq!(p.matches(INSIGHTS_LABEL).count(), 1);
    }

    #[test]
    fn hits_render_in_order_with_separator() {
        let hits = [hit(2, "B", "second text"), hit(1, "A", "first text")];
        let ctx = render_context(&hits);
        assert_eq!(
            ctx,
            "Source: https://example.com/2\nProduct: B\nExcerpt: second text\n\
\n\n---\n\n\
Source: https://example.com/1\nProduct: A\nExcerpt: first text\n"
        );
    }

    #[test]
    fn prompt_is_deterministic_and_lists_headings_in_order() {
        let hits = [hit(1, "A", "x")];
        let a = build_prompt("q", &hits, Some("i"));
        assert_eq!(a, build_prompt("q", &hits, Some("i")));
        let positions: Vec<usize> = [ANSWER_HEADING, SUGGESTIONS_HEADING, MARKETING_HEADING, SOURCES_HEADING]
            .iter()
            .map(|h| a.find(h).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn basic_prompt_asks_for_sources() {
        let p = build_basic_prompt("which urea cream?", &[hit(1, "UreaRepair", "10% urea")]);
        assert!(p.contains("Question: which urea cream?"));
        assert!(p.contains("Product: UreaRepair"));
        assert!(p.contains("'Sources:'"));
    }
}
