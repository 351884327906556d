//! Decoding of raw model text into typed conversation data.
//!
//! Nothing here returns an error to the caller. Malformed payloads degrade
//! to a placeholder message (student calls) or a default verdict (grader calls).

use pcksim_schema::{
    DemonstratedSkill, Message, MisconceptionRisk, MissedOpportunity, PckVerdict,
    PedagogicalQuality, PersonaProfile, PredictedStudentState, ResponseTone, ScenarioAlignment,
    UnderstandingLevel, DEFAULT_FEEDBACK_MESSAGE, DEFAULT_HOW_ADDRESSED,
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Stand-in line when the student payload cannot be read at all.
pub const THINKING_PLACEHOLDER: &str = "אני צריך רגע לחשוב על זה...";

const RAW_PREVIEW_CHARS: usize = 200;

/// Result of a validating decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Ok(T),
    Malformed(String),
}

impl<T> Decoded<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Decoded::Ok(value) => Some(value),
            Decoded::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Decoded::Malformed(_))
    }
}

/// Messages and optional verdict extracted from one model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResult {
    pub messages: Vec<Message>,
    pub verdict: Option<PckVerdict>,
}

/// One entry of the student model's `who_should_respond` reasoning.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RespondDecision {
    #[serde(default)]
    pub student: String,
    #[serde(default)]
    pub should_respond: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: String,
}

/// The optional `thinking` block of a student payload.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Thinking {
    #[serde(default)]
    pub teacher_message_summary: Option<String>,
    #[serde(default)]
    pub context_analysis: Option<String>,
    #[serde(default)]
    pub who_should_respond: Vec<RespondDecision>,
    #[serde(default)]
    pub pck_analysis: Option<Value>,
}

/// A student reply before speaker validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentPayload {
    pub thinking: Option<Thinking>,
    /// `(speaker, text)` pairs; either side may be missing.
    pub entries: Vec<(Option<String>, Option<String>)>,
    pub pck_feedback: Option<Value>,
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let (open, skip) = if let Some(at) = trimmed.find("```json") {
        (at, "```json".len())
    } else if let Some(at) = trimmed.find("```") {
        (at, "```".len())
    } else {
        return trimmed;
    };
    let body = &trimmed[open + skip..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn decode_object(raw: &str) -> Decoded<Map<String, Value>> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Decoded::Malformed("empty payload".into());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Decoded::Ok(map),
        Ok(other) => Decoded::Malformed(format!("expected a JSON object, got {}", kind(&other))),
        Err(e) => Decoded::Malformed(format!("invalid JSON: {e}")),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(RAW_PREVIEW_CHARS).collect()
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| non_empty_str(Some(v)))
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================
// Student payloads
// ============================================================

pub fn decode_student_payload(raw: &str) -> Decoded<StudentPayload> {
    let mut map = match decode_object(raw) {
        Decoded::Ok(map) => map,
        Decoded::Malformed(reason) => return Decoded::Malformed(reason),
    };

    let thinking = map
        .remove("thinking")
        .and_then(|v| serde_json::from_value::<Thinking>(v).ok());

    let entries = match map.remove("responses") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                (
                    non_empty_str(item.get("student")),
                    non_empty_str(item.get("message")),
                )
            })
            .collect(),
        Some(other) => {
            tracing::warn!(
                "student payload 'responses' is {}, treating as no responses",
                kind(&other)
            );
            Vec::new()
        }
        None => {
            tracing::warn!("student payload has no 'responses' array, treating as no responses");
            Vec::new()
        }
    };

    Decoded::Ok(StudentPayload {
        thinking,
        entries,
        pck_feedback: map.remove("pck_feedback").filter(Value::is_object),
    })
}

/// Turn a student-call reply into messages attributed to session personas.
///
/// With an empty persona list every speaker is accepted and title-cased.
pub fn parse_student_response(raw: &str, personas: &[PersonaProfile]) -> ParsedResult {
    if raw.trim().is_empty() {
        tracing::debug!("empty student reply, no responses this turn");
        return ParsedResult::default();
    }

    let payload = match decode_student_payload(raw) {
        Decoded::Ok(payload) => payload,
        Decoded::Malformed(reason) => {
            tracing::warn!(
                "malformed student payload ({reason}), raw: {}",
                preview(raw)
            );
            return ParsedResult {
                messages: personas
                    .first()
                    .map(|p| Message::student(&p.name, THINKING_PLACEHOLDER))
                    .into_iter()
                    .collect(),
                verdict: None,
            };
        }
    };

    match &payload.thinking {
        Some(thinking) => log_thinking(thinking),
        None => tracing::debug!("student payload has no 'thinking' block"),
    }

    let mut messages = Vec::with_capacity(payload.entries.len());
    for (speaker, text) in payload.entries {
        let (Some(speaker), Some(text)) = (speaker, text) else {
            tracing::warn!("skipping student entry without speaker or message");
            continue;
        };
        match canonical_speaker(&speaker, personas) {
            Some(name) => messages.push(Message::student(name, &text)),
            None => tracing::warn!(persona = %speaker, "skipping entry from unknown student"),
        }
    }
    tracing::debug!(count = messages.len(), "student responses parsed");

    ParsedResult {
        messages,
        verdict: payload
            .pck_feedback
            .map(|v| verdict_from_object(v.as_object().cloned().unwrap_or_default())),
    }
}

fn log_thinking(thinking: &Thinking) {
    tracing::debug!(
        summary = thinking.teacher_message_summary.as_deref().unwrap_or("N/A"),
        context = thinking.context_analysis.as_deref().unwrap_or("N/A"),
        "student model reasoning"
    );
    for decision in &thinking.who_should_respond {
        tracing::debug!(
            persona = %decision.student,
            respond = decision.should_respond,
            confidence = %decision.confidence,
            "{}",
            decision.reason
        );
    }
}

fn canonical_speaker(raw: &str, personas: &[PersonaProfile]) -> Option<String> {
    let wanted = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if personas.is_empty() {
        return Some(title_case(&wanted));
    }
    personas
        .iter()
        .find(|p| p.name.trim().to_lowercase() == wanted.to_lowercase())
        .map(|p| p.name.clone())
}

fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================
// Grader payloads
// ============================================================

/// Decode a grader reply, filling absent or unreadable fields with defaults.
pub fn decode_verdict(raw: &str) -> Decoded<PckVerdict> {
    match decode_object(raw) {
        Decoded::Ok(map) => Decoded::Ok(verdict_from_object(map)),
        Decoded::Malformed(reason) => Decoded::Malformed(reason),
    }
}

/// Never fails; a malformed reply yields [`PckVerdict::default`].
pub fn parse_verdict(raw: &str) -> PckVerdict {
    match decode_verdict(raw) {
        Decoded::Ok(verdict) => verdict,
        Decoded::Malformed(reason) => {
            tracing::warn!(
                "malformed grader payload ({reason}), using default verdict; raw: {}",
                preview(raw)
            );
            PckVerdict::default()
        }
    }
}

fn verdict_from_object(map: Map<String, Value>) -> PckVerdict {
    let str_field = |key: &str| map.get(key).and_then(Value::as_str);

    if !map.contains_key("pedagogical_quality") || !map.contains_key("predicted_student_state") {
        tracing::warn!("incomplete grader payload, filling in defaults");
    }

    PckVerdict {
        pedagogical_quality: str_field("pedagogical_quality")
            .and_then(PedagogicalQuality::parse)
            .unwrap_or_default(),
        addressed_misconception: map
            .get("addressed_misconception")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        how_addressed: non_empty_str(map.get("how_addressed"))
            .unwrap_or_else(|| DEFAULT_HOW_ADDRESSED.to_string()),
        misconception_risk: str_field("misconception_risk")
            .and_then(MisconceptionRisk::parse)
            .unwrap_or_default(),
        demonstrated_skills: objects(map.get("demonstrated_skills"))
            .filter_map(|o| {
                Some(DemonstratedSkill {
                    skill_id: non_empty_str(o.get("skill_id"))?,
                    evidence: non_empty_str(o.get("evidence")).unwrap_or_default(),
                })
            })
            .collect(),
        missed_opportunities: objects(map.get("missed_opportunities"))
            .filter_map(|o| {
                Some(MissedOpportunity {
                    skill_id: non_empty_str(o.get("skill_id"))?,
                    suggestion: non_empty_str(o.get("what_could_have_been_done"))
                        .or_else(|| non_empty_str(o.get("suggestion")))
                        .unwrap_or_default(),
                })
            })
            .collect(),
        predicted_student_state: map
            .get("predicted_student_state")
            .and_then(Value::as_object)
            .map(predicted_state)
            .unwrap_or_default(),
        feedback_message: non_empty_str(map.get("feedback_message_hebrew"))
            .or_else(|| non_empty_str(map.get("feedback_message")))
            .unwrap_or_else(|| DEFAULT_FEEDBACK_MESSAGE.to_string()),
        scenario_alignment: map
            .get("scenario_alignment")
            .and_then(Value::as_object)
            .map(alignment)
            .unwrap_or_default(),
    }
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn predicted_state(state: &Map<String, Value>) -> PredictedStudentState {
    PredictedStudentState {
        understanding_level: state
            .get("understanding_level")
            .and_then(Value::as_str)
            .and_then(UnderstandingLevel::parse)
            .unwrap_or_default(),
        likely_reactions: string_list(state.get("likely_reactions")),
        who_should_respond: string_list(state.get("who_should_respond")),
        response_tone: state
            .get("response_tone")
            .and_then(Value::as_str)
            .and_then(ResponseTone::parse)
            .unwrap_or_default(),
    }
}

fn alignment(value: &Map<String, Value>) -> ScenarioAlignment {
    let defaults = ScenarioAlignment::default();
    let score = value
        .get("alignment_score")
        .and_then(Value::as_f64)
        .map(|s| s.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(defaults.alignment_score);
    ScenarioAlignment {
        moving_toward_goals: value
            .get("moving_toward_goals")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.moving_toward_goals),
        alignment_score: score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    fn personas() -> Vec<PersonaProfile> {
        Registry::builtin()
            .unwrap()
            .select_personas(2, None)
            .unwrap()
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("here:\n```\n{}\n```\nbye"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn well_formed_reply_becomes_messages() {
        let raw = json!({
            "thinking": {
                "teacher_message_summary": "שאלה על הגדרה",
                "who_should_respond": [{"student": "Sheila", "should_respond": true, "reason": "נשאלה", "confidence": "high"}]
            },
            "responses": [
                {"student": " sheila ", "message": "  אה,\nעכשיו הבנתי  "},
                {"student": "BRITTANY", "message": "וגם אני"}
            ]
        })
        .to_string();
        let parsed = parse_student_response(&raw, &personas());
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[0].speaker_id(), "Sheila");
        assert_eq!(parsed.messages[0].text(), "אה,עכשיו הבנתי");
        assert_eq!(parsed.messages[1].speaker_id(), "Brittany");
        assert!(parsed.verdict.is_none());
    }

    #[test]
    fn empty_responses_is_a_valid_silent_turn() {
        let parsed = parse_student_response(r#"{"responses":[]}"#, &personas());
        assert!(parsed.messages.is_empty());
        assert_eq!(parse_student_response("   ", &personas()), ParsedResult::default());
    }

    #[test]
    fn missing_or_wrong_responses_field_means_silence() {
        assert!(parse_student_response(r#"{"thinking":{}}"#, &personas())
            .messages
            .is_empty());
        assert!(parse_student_response(r#"{"responses":"Sheila: hi"}"#, &personas())
            .messages
            .is_empty());
    }

    #[test]
    fn non_json_reply_degrades_to_placeholder() {
        let parsed = parse_student_response("Sheila: I think it's a rhombus", &personas());
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.messages[0].speaker_id(), "Sheila");
        assert_eq!(parsed.messages[0].text(), THINKING_PLACEHOLDER);

        assert!(parse_student_response("[1,2]", &[]).messages.is_empty());
    }

    #[test]
    fn incomplete_and_unknown_entries_are_skipped() {
        let raw = json!({
            "responses": [
                {"student": "Sheila"},
                {"message": "no speaker"},
                {"student": "Brittany", "message": "   "},
                {"student": "Mallory", "message": "not in this class"},
                {"student": "Brittany", "message": "כן"}
            ]
        })
        .to_string();
        let parsed = parse_student_response(&raw, &personas());
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.messages[0].speaker_id(), "Brittany");
    }

    #[test]
    fn without_personas_names_are_title_cased() {
        let raw = r#"{"responses":[{"student":"mary  ANN","message":"hi"}]}"#;
        let parsed = parse_student_response(raw, &[]);
        assert_eq!(parsed.messages[0].speaker_id(), "Mary Ann");
    }

    #[test]
    fn embedded_pck_feedback_is_decoded() {
        let raw = r#"{"responses":[],"pck_feedback":{"pedagogical_quality":"positive"}}"#;
        let parsed = parse_student_response(raw, &personas());
        let verdict = parsed.verdict.unwrap();
        assert_eq!(verdict.pedagogical_quality, PedagogicalQuality::Positive);
    }

    #[test]
    fn full_verdict_decodes() {
        let raw = format!(
            "```json\n{}\n```",
            json!({
                "pedagogical_quality": "problematic",
                "addressed_misconception": false,
                "how_addressed": "המורה עבר הלאה",
                "misconception_risk": "high",
                "demonstrated_skills": [],
                "missed_opportunities": [{"skill_id": "s1", "what_could_have_been_done": "דוגמה נגדית"}],
                "predicted_student_state": {
                    "understanding_level": "more_confused",
                    "likely_reactions": ["למה?"],
                    "who_should_respond": ["Sheila"],
                    "response_tone": "challenge_logic"
                },
                "feedback_message_hebrew": "כדאי לחזור להגדרה",
                "scenario_alignment": {"moving_toward_goals": false, "alignment_score": 20}
            })
        );
        let verdict = decode_verdict(&raw).ok().unwrap();
        assert_eq!(verdict.pedagogical_quality, PedagogicalQuality::Problematic);
        assert_eq!(verdict.misconception_risk, MisconceptionRisk::High);
        assert_eq!(verdict.missed_opportunities[0].suggestion, "דוגמה נגדית");
        assert_eq!(
            verdict.predicted_student_state.understanding_level,
            UnderstandingLevel::MoreConfused
        );
        assert_eq!(
            verdict.predicted_student_state.response_tone,
            ResponseTone::Frustrated
        );
        assert_eq!(verdict.feedback_message, "כדאי לחזור להגדרה");
        assert_eq!(verdict.scenario_alignment.alignment_score, 20);
        assert!(!verdict.scenario_alignment.moving_toward_goals);
    }

    #[test]
    fn non_json_grader_reply_yields_default_verdict() {
        assert!(decode_verdict("I think the teacher did well").is_malformed());
        let verdict = parse_verdict("I think the teacher did well");
        assert_eq!(verdict.pedagogical_quality, PedagogicalQuality::Neutral);
        assert_eq!(verdict.misconception_risk, MisconceptionRisk::Medium);
        assert!(verdict.demonstrated_skills.is_empty());
        assert!(verdict.missed_opportunities.is_empty());
        assert_eq!(
            verdict.predicted_student_state.understanding_level,
            UnderstandingLevel::Same
        );
        assert_eq!(verdict.how_addressed, DEFAULT_HOW_ADDRESSED);
        assert_eq!(verdict.feedback_message, DEFAULT_FEEDBACK_MESSAGE);
    }

    #[test]
    fn partial_verdict_keeps_known_fields() {
        let verdict = parse_verdict(
            r#"{"pedagogical_quality":"POSITIVE","misconception_risk":"extreme","scenario_alignment":{"alignment_score":250}}"#,
        );
        assert_eq!(verdict.pedagogical_quality, PedagogicalQuality::Positive);
        assert_eq!(verdict.misconception_risk, MisconceptionRisk::Medium);
        assert_eq!(verdict.scenario_alignment.alignment_score, 100);
        assert!(verdict.scenario_alignment.moving_toward_goals);
        assert_eq!(verdict.predicted_student_state, PredictedStudentState::default());
    }

    #[test]
    fn skill_entries_without_id_are_dropped() {
        let verdict = parse_verdict(
            r#"{"demonstrated_skills":[{"evidence":"x"},{"skill_id":"s2","evidence":"quote"}, 7]}"#,
        );
        assert_eq!(verdict.demonstrated_skills.len(), 1);
        assert_eq!(verdict.demonstrated_skills[0].skill_id, "s2");
    }
}
