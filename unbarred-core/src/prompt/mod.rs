//! Prompt construction and the greeting short-circuit.
//!
//! Out-of-scope questions are classified by the model itself: the instruction
//! prompt lists the categories in order together with the exact reply for
//! each, and the model answers substantively only when none applies.

pub mod templates;

use crate::config::AnswerFormat;
use crate::jurisdiction::{Jurisdiction, UNSPECIFIED_LABEL};
pub use templates::{
    GENERATION_FAILURE_REPLY, GREETINGS, LEGAL_ADVICE_REPLY, MISSING_JURISDICTION_REPLY,
    NOT_FOUND_REPLY, STATE_FEDERAL_REPLY, UNSUPPORTED_JURISDICTION_REPLY, VAGUE_QUESTION_REPLY,
};

/// True when the query is a bare greeting, optionally followed by a single
/// `!`, or contains `"<greeting> in "` as a whole word, as in "hello in Alameda".
pub fn is_greeting(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    let bare = normalized.strip_suffix('!').unwrap_or(&normalized);

    GREETINGS.iter().any(|greeting| {
        let with_in = format!("{} in ", greeting);
        bare == *greeting
            || normalized.starts_with(&with_in)
            || normalized.contains(&format!(" {}", with_in))
    })
}

/// Friendly reply to a greeting, naming the selected jurisdiction.
pub fn greeting_reply(jurisdiction: Option<Jurisdiction>) -> String {
    match jurisdiction {
        Some(j) => format!(
            "Hello! You're researching {}. Which local law or ordinance would you like to know about?",
            j.label()
        ),
        None => format!(
            "Hello! {} is selected. Which jurisdiction's local laws would you like to research: {}?",
            UNSPECIFIED_LABEL,
            supported_names()
        ),
    }
}

/// Label substituted into prompts and citations.
pub fn jurisdiction_label(jurisdiction: Option<Jurisdiction>) -> &'static str {
    jurisdiction.map(Jurisdiction::label).unwrap_or(UNSPECIFIED_LABEL)
}

/// Builds the instruction prompt for one question.
///
/// The context block is inserted verbatim; callers bound its size.
pub fn build_prompt(
    query: &str,
    context: &str,
    jurisdiction: Option<Jurisdiction>,
    format: AnswerFormat,
) -> String {
    let label = jurisdiction_label(jurisdiction);
    let citation_label = jurisdiction.map(Jurisdiction::label).unwrap_or("<Jurisdiction>");
    let shape = match format {
        AnswerFormat::Paragraph => templates::PARAGRAPH_SHAPE,
        AnswerFormat::Bullets => templates::BULLETS_SHAPE,
    }
    .replace("{jurisdiction}", citation_label);

    format!(
        r#"{role}

Your system supports **only** the following jurisdictions:
{supported}

Selected jurisdiction: {label}

You have access to a collection of retrieved legal documents (see "Context"). Using only these, answer the user's local legal question.

---

## Classification (apply the first rule that matches):

1. **Missing jurisdiction**: no jurisdiction is selected and the question names none.
   Reply exactly: "{missing}"
2. **State or federal question**: the question concerns state or federal law.
   Reply exactly: "{state}"
3. **Legal advice or outcome prediction**: the user asks what will happen to them, whether they are liable, or what they should do in their case.
   Reply exactly: "{advice}"
4. **Vague or subjective question**: the activity or place is unclear.
   Reply exactly: "{vague}"
5. **Outside supported jurisdictions**: the question names a county or city not listed above.
   Reply exactly: "{unsupported}"
6. Otherwise give a substantive answer as described below.

## Answer shape:

{shape}

## Rules:

- Use only the Context. If it does not answer the question, explain the reason and return:
  "The information is not available in the current documents. **reason**"
- Do not speculate, generalize, or mention unrelated jurisdictions or federal/state law.
- Return **only the answer**. Do not include system notes or commentary.

---

## Context (retrieved legal text):
{context}

## Question:
{query}

## Answer:
"#,
        role = templates::ROLE,
        supported = supported_list(),
        label = label,
        missing = MISSING_JURISDICTION_REPLY,
        state = STATE_FEDERAL_REPLY,
        advice = LEGAL_ADVICE_REPLY,
        vague = VAGUE_QUESTION_REPLY,
        unsupported = UNSUPPORTED_JURISDICTION_REPLY,
        shape = shape,
        context = context,
        query = query,
    )
}

/// Prompt for the clarification pre-pass: the model returns a follow-up
/// question for an unanswerable query, or nothing.
pub fn build_clarification_prompt(query: &str) -> String {
    format!(
        r#"You are a legal research assistant.

Your job is to analyze a user's legal question and decide whether it is specific and answerable based on **local county laws** in California.
The system only supports: **{names}.**

If the question is clear and supported, return an empty string.

If the question falls into one of the categories below, return a short follow-up message asking for clarification:

1. **Missing Location**
   Ask: "{missing}"

2. **State/Federal-Level Question**
   Ask: "{state}"

3. **Legal Outcome or Liability Prediction**
   Ask: "{advice}"

4. **Vague or Subjective Question**
   Ask: "{vague}"

5. **Outside Supported Jurisdictions**
   Ask: "{unsupported}"

User question:
"{query}"

Return only the follow-up message as plain text. If no clarification is needed, return an empty string.
"#,
        names = supported_names(),
        missing = MISSING_JURISDICTION_REPLY,
        state = STATE_FEDERAL_REPLY,
        advice = LEGAL_ADVICE_REPLY,
        vague = VAGUE_QUESTION_REPLY,
        unsupported = UNSUPPORTED_JURISDICTION_REPLY,
        query = query,
    )
}

/// Interprets the pre-pass answer. Models asked for "an empty string" often
/// answer with a literal pair of quotes, so those count as no follow-up.
pub fn parse_clarification(answer: &str) -> Option<String> {
    let trimmed = answer.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

fn supported_list() -> String {
    Jurisdiction::ALL
        .iter()
        .map(|j| match j.kind() {
            "City" => format!("- {} (City)", j.label()),
            _ => format!("- {}", j.label()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn supported_names() -> String {
    let labels: Vec<&str> = Jurisdiction::ALL.iter().map(|j| j.label()).collect();
    match labels.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, and {}", rest.join(", "), last),
        Some((last, _)) => last.to_string(),
        None => String::new(),
    }
}
