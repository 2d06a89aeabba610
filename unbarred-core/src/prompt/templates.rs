//! Fixed reply texts and instruction fragments.
//!
//! The wording here is observable behavior: the model is told to answer with
//! these exact strings, and the pipeline emits some of them directly.

pub const MISSING_JURISDICTION_REPLY: &str =
    "Please include your city or county jurisdiction and resubmit your question.";

pub const STATE_FEDERAL_REPLY: &str =
    "This system handles only local (county/city) laws. Please consult your state or federal agency.";

pub const LEGAL_ADVICE_REPLY: &str =
    "This system cannot provide legal advice or predict outcomes. Please consult an attorney.";

pub const VAGUE_QUESTION_REPLY: &str =
    "Could you clarify the activity and location? Please rephrase your question with more detail.";

pub const UNSUPPORTED_JURISDICTION_REPLY: &str =
    "This system currently supports Alameda, Calaveras, and Sierra Madre only. Please resubmit your question using one of these locations.";

/// Sent without calling the model when retrieval produced no context.
pub const NOT_FOUND_REPLY: &str =
    "The information is not available in the current documents. **No relevant documents were found for this question and jurisdiction.**";

/// Sent in buffered mode when generation fails.
pub const GENERATION_FAILURE_REPLY: &str =
    "Sorry, an answer could not be generated right now. Please try again in a moment.";

pub const GREETINGS: [&str; 7] = [
    "hi",
    "hello",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

pub(crate) const ROLE: &str =
    "You are a legal research assistant specializing in **California county-level laws**.";

pub(crate) const PARAGRAPH_SHAPE: &str = "\
Answer in one or two short paragraphs of plain prose. Address only what the documents support.
Cite every rule you rely on inline in this format:
`[Source: {jurisdiction}, Title X, Chapter Y, Section Z]`";

pub(crate) const BULLETS_SHAPE: &str = "\
**Summarize clearly** in 2-3 factual sentences. Address only what the documents support.
Then list **bullet-point regulations**, including:
   - A plain-language summary of each rule
   - A source citation in this format:
     `[Source: {jurisdiction}, Title X, Chapter Y, Section Z]`";
