use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Fallback text for `how_addressed` when the grader leaves it out.
pub const DEFAULT_HOW_ADDRESSED: &str = "לא ניתן לקבוע";
/// Fallback teacher-facing feedback when the grader leaves it out.
pub const DEFAULT_FEEDBACK_MESSAGE: &str = "המורה התקדם בשיעור";
/// Display name used for the human side of the conversation.
pub const TEACHER_SPEAKER: &str = "Teacher";

// ============================================================
// Conversation messages
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
    System,
}

impl Role {
    /// Role name expected by chat-style model APIs.
    pub fn model_role(&self) -> &'static str {
        match self {
            Role::Teacher => "user",
            Role::Student => "assistant",
            Role::System => "system",
        }
    }
}

/// One utterance in the conversation. Text never contains a line break.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    speaker_id: String,
    #[serde(deserialize_with = "deserialize_single_line")]
    text: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, speaker_id: impl Into<String>, text: impl AsRef<str>) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            text: single_line(text.as_ref()),
            role,
            image: None,
            created_at: Utc::now(),
        }
    }

    pub fn teacher(text: impl AsRef<str>) -> Self {
        Self::new(Role::Teacher, TEACHER_SPEAKER, text)
    }

    pub fn student(name: impl Into<String>, text: impl AsRef<str>) -> Self {
        Self::new(Role::Student, name, text)
    }

    pub fn system(text: impl AsRef<str>) -> Self {
        Self::new(Role::System, "system", text)
    }

    /// Attach a PNG image (e.g. a drawing) to the message.
    pub fn with_image(mut self, png: Vec<u8>) -> Self {
        self.image = Some(png);
        self
    }

    pub fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.speaker_id, self.text)
    }
}

fn single_line(raw: &str) -> String {
    raw.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

fn deserialize_single_line<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(single_line(&raw))
}

// ============================================================
// Scenarios
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    Teacher,
    Students,
}

impl Initiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Initiator::Teacher => "teacher",
            Initiator::Students => "students",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    /// Lesson topic shown to the students.
    pub text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub initiated_by: Initiator,
    #[serde(default)]
    pub initial_prompt: Option<String>,
    #[serde(default)]
    pub target_pck_skills: Vec<String>,
    #[serde(default)]
    pub misconception_focus: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_list")]
    pub lesson_goals: Vec<String>,
    #[serde(default)]
    pub pck_guidance: Option<String>,
}

impl Scenario {
    pub fn lesson_goals_text(&self) -> Option<String> {
        if self.lesson_goals.is_empty() {
            None
        } else {
            Some(self.lesson_goals.join("; "))
        }
    }
}

fn deserialize_string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(goal)) if goal.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(goal)) => vec![goal],
        Some(OneOrMany::Many(goals)) => goals,
    })
}

// ============================================================
// Personas
// ============================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ParticipationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationLevel::Low => "low",
            ParticipationLevel::Medium => "medium",
            ParticipationLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Participation {
    #[serde(default)]
    pub baseline: ParticipationLevel,
    #[serde(default)]
    pub speaks_when: Vec<String>,
    #[serde(default)]
    pub avoids_when: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateResponse {
    pub after_good_scaffold: String,
    pub after_counterexample: String,
}

/// Behavioral profile of one simulated student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaProfile {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub participation: Participation,
    #[serde(default)]
    pub reasoning_style: Vec<String>,
    #[serde(default)]
    pub misconception_tendencies: Vec<String>,
    #[serde(default)]
    pub update_response: Option<UpdateResponse>,
    #[serde(default)]
    pub escalation_if_confused: Option<String>,
}

// ============================================================
// PCK taxonomy
// ============================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalizedText {
    #[serde(default)]
    pub en: Option<String>,
    #[serde(default)]
    pub he: Option<String>,
}

impl LocalizedText {
    /// Hebrew first, English as fallback.
    pub fn preferred(&self) -> &str {
        self.he
            .as_deref()
            .or(self.en.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillExample {
    pub text: String,
    pub why: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillExamples {
    #[serde(default)]
    pub positive: Vec<SkillExample>,
    #[serde(default)]
    pub negative: Vec<SkillExample>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeacherMistake {
    pub mistake: String,
    pub example: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentScenario {
    pub context: String,
    pub student_says: String,
    pub misconception: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PckSkill {
    pub skill_id: String,
    pub skill_name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub student_scenario: Option<StudentScenario>,
    #[serde(default)]
    pub examples: SkillExamples,
    #[serde(default)]
    pub common_teacher_mistakes: Vec<TeacherMistake>,
}

// ============================================================
// Grader verdict (wire names are the archived-log contract)
// ============================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PedagogicalQuality {
    Positive,
    #[default]
    Neutral,
    Problematic,
}

impl PedagogicalQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Problematic => "problematic",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "problematic" => Some(Self::Problematic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MisconceptionRisk {
    Low,
    #[default]
    Medium,
    High,
}

impl MisconceptionRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnderstandingLevel {
    Improved,
    #[default]
    Same,
    Confused,
    MoreConfused,
}

impl UnderstandingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improved => "improved",
            Self::Same => "same",
            Self::Confused => "confused",
            Self::MoreConfused => "more_confused",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "improved" => Some(Self::Improved),
            "same" => Some(Self::Same),
            "confused" => Some(Self::Confused),
            "more_confused" => Some(Self::MoreConfused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTone {
    Confident,
    #[default]
    Hesitant,
    Confused,
    Frustrated,
}

impl ResponseTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confident => "confident",
            Self::Hesitant => "hesitant",
            Self::Confused => "confused",
            Self::Frustrated => "frustrated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "confident" => Some(Self::Confident),
            "hesitant" => Some(Self::Hesitant),
            "confused" => Some(Self::Confused),
            // graders sometimes answer with the escalation wording from the rubric
            "frustrated" | "challenging" | "challenge_logic" => Some(Self::Frustrated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemonstratedSkill {
    pub skill_id: String,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissedOpportunity {
    pub skill_id: String,
    #[serde(rename = "what_could_have_been_done", alias = "suggestion", default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictedStudentState {
    pub understanding_level: UnderstandingLevel,
    #[serde(default)]
    pub likely_reactions: Vec<String>,
    #[serde(default)]
    pub who_should_respond: Vec<String>,
    pub response_tone: ResponseTone,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScenarioAlignment {
    pub moving_toward_goals: bool,
    pub alignment_score: u8,
}

impl Default for ScenarioAlignment {
    fn default() -> Self {
        Self {
            moving_toward_goals: true,
            alignment_score: 50,
        }
    }
}

/// Grader output for one teacher turn.
///
/// Every field falls back to its default on decode, so older logs that only
/// carry `feedback_message`, `detected_skills` and `missed_opportunities` load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PckVerdict {
    pub pedagogical_quality: PedagogicalQuality,
    pub addressed_misconception: bool,
    pub how_addressed: String,
    pub misconception_risk: MisconceptionRisk,
    #[serde(alias = "detected_skills")]
    pub demonstrated_skills: Vec<DemonstratedSkill>,
    #[serde(default)]
    pub missed_opportunities: Vec<MissedOpportunity>,
    pub predicted_student_state: PredictedStudentState,
    #[serde(rename = "feedback_message_hebrew", alias = "feedback_message")]
    pub feedback_message: String,
    #[serde(default)]
    pub scenario_alignment: ScenarioAlignment,
}

impl Default for PckVerdict {
    fn default() -> Self {
        Self {
            pedagogical_quality: PedagogicalQuality::default(),
            addressed_misconception: false,
            how_addressed: DEFAULT_HOW_ADDRESSED.to_string(),
            misconception_risk: MisconceptionRisk::default(),
            demonstrated_skills: Vec::new(),
            missed_opportunities: Vec::new(),
            predicted_student_state: PredictedStudentState::default(),
            feedback_message: DEFAULT_FEEDBACK_MESSAGE.to_string(),
            scenario_alignment: ScenarioAlignment::default(),
        }
    }
}

impl PckVerdict {
    pub fn is_problematic(&self) -> bool {
        self.pedagogical_quality == PedagogicalQuality::Problematic
    }
}

// ============================================================
// Conversation log
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeacherLine {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentLine {
    pub name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnLogEntry {
    pub turn_number: u32,
    pub timestamp: DateTime<Utc>,
    pub teacher: TeacherLine,
    pub students: Vec<StudentLine>,
    #[serde(default)]
    pub pck_feedback: Option<PckVerdict>,
}

/// Scenario fields kept with a session log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSnapshot {
    pub text: String,
    #[serde(default, deserialize_with = "deserialize_string_or_list")]
    pub lesson_goals: Vec<String>,
    #[serde(default)]
    pub misconception_focus: Option<String>,
    #[serde(default)]
    pub target_pck_skills: Vec<String>,
    pub initiated_by: Initiator,
}

impl From<&Scenario> for ScenarioSnapshot {
    fn from(scenario: &Scenario) -> Self {
        Self {
            text: scenario.text.clone(),
            lesson_goals: scenario.lesson_goals.clone(),
            misconception_focus: scenario.misconception_focus.clone(),
            target_pck_skills: scenario.target_pck_skills.clone(),
            initiated_by: scenario.initiated_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaSnapshot {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl From<&PersonaProfile> for PersonaSnapshot {
    fn from(persona: &PersonaProfile) -> Self {
        Self {
            name: persona.name.clone(),
            description: persona.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_teacher_messages: u32,
    pub total_student_messages: u32,
    #[serde(rename = "totalPCKFeedbacks")]
    pub total_pck_feedbacks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub scenario: ScenarioSnapshot,
    pub students: Vec<PersonaSnapshot>,
    #[serde(default)]
    pub turns: Vec<TurnLogEntry>,
    #[serde(default)]
    pub stats: SessionStats,
    #[serde(default)]
    pub summary_feedback: Option<String>,
}

/// One row of the saved-sessions index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionListing {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub scenario: String,
    pub turns_count: usize,
}

impl From<&ConversationSession> for SessionListing {
    fn from(session: &ConversationSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            scenario: session.scenario.text.chars().take(100).collect(),
            turns_count: session.turns.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> ConversationSession {
        let now = Utc::now();
        ConversationSession {
            session_id: "session_1_abc".into(),
            start_time: now,
            end_time: None,
            scenario: ScenarioSnapshot {
                text: "אלכסונים במרובעים".into(),
                lesson_goals: vec![],
                misconception_focus: Some("אלכסונים מאונכים => מעויין".into()),
                target_pck_skills: vec!["kcs-x".into()],
                initiated_by: Initiator::Students,
            },
            students: vec![PersonaSnapshot {
                name: "Sheila".into(),
                description: "shy".into(),
            }],
            turns: vec![
                TurnLogEntry {
                    turn_number: 1,
                    timestamp: now,
                    teacher: TeacherLine {
                        message: "מה ההגדרה של מלבן?".into(),
                        timestamp: now,
                    },
                    students: vec![StudentLine {
                        name: "Sheila".into(),
                        message: "מרובע עם ארבע זוויות ישרות".into(),
                        timestamp: now,
                    }],
                    pck_feedback: Some(PckVerdict::default()),
                },
                TurnLogEntry {
                    turn_number: 2,
                    timestamp: now,
                    teacher: TeacherLine {
                        message: "יפה".into(),
                        timestamp: now,
                    },
                    students: vec![],
                    pck_feedback: None,
                },
            ],
            stats: SessionStats {
                total_teacher_messages: 2,
                total_student_messages: 1,
                total_pck_feedbacks: 1,
                duration_minutes: None,
            },
            summary_feedback: None,
        }
    }

    #[test]
    fn message_text_drops_newlines() {
        let msg = Message::teacher("\na\nb");
        assert_eq!(msg.text(), "ab");
        assert_eq!(msg.role(), Role::Teacher);
        assert_eq!(msg.speaker_id(), TEACHER_SPEAKER);
    }

    #[test]
    fn message_deserialize_drops_newlines() {
        let raw = serde_json::json!({
            "speaker_id": "Sheila",
            "text": "line one\r\nline two",
            "role": "student",
            "created_at": "2025-01-01T00:00:00Z"
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.text(), "line oneline two");
        assert!(msg.image().is_none());
    }

    #[test]
    fn role_maps_to_model_roles() {
        assert_eq!(Role::Teacher.model_role(), "user");
        assert_eq!(Role::Student.model_role(), "assistant");
        assert_eq!(Role::System.model_role(), "system");
    }

    #[test]
    fn default_verdict_uses_documented_defaults() {
        let verdict = PckVerdict::default();
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["pedagogical_quality"], "neutral");
        assert_eq!(json["misconception_risk"], "medium");
        assert_eq!(json["predicted_student_state"]["understanding_level"], "same");
        assert_eq!(json["feedback_message_hebrew"], DEFAULT_FEEDBACK_MESSAGE);
        assert_eq!(json["how_addressed"], DEFAULT_HOW_ADDRESSED);
        assert_eq!(json["scenario_alignment"]["alignment_score"], 50);
        assert_eq!(json["scenario_alignment"]["moving_toward_goals"], true);
        assert!(json["demonstrated_skills"].as_array().unwrap().is_empty());
    }

    #[test]
    fn missed_opportunity_uses_wire_field_name() {
        let missed = MissedOpportunity {
            skill_id: "kcs-x".into(),
            suggestion: "לשאול על ההגדרה".into(),
        };
        let json = serde_json::to_value(&missed).unwrap();
        assert_eq!(json["what_could_have_been_done"], "לשאול על ההגדרה");
    }

    #[test]
    fn session_json_uses_archived_field_names() {
        let json = serde_json::to_value(sample_session()).unwrap();
        assert!(json.get("sessionId").is_some());
        assert!(json["stats"].get("totalPCKFeedbacks").is_some());
        assert_eq!(json["turns"][0]["turnNumber"], 1);
        assert!(json["turns"][0]["pckFeedback"].is_object());
        assert!(json["turns"][1]["pckFeedback"].is_null());
        assert_eq!(json["turns"][0]["teacher"]["message"], "מה ההגדרה של מלבן?");
        assert!(json["summaryFeedback"].is_null());
    }

    #[test]
    fn session_roundtrip_keeps_turns_including_null_verdicts() {
        let session = sample_session();
        let json = serde_json::to_string(&session).unwrap();
        let restored: ConversationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.turns, session.turns);
        assert_eq!(restored, session);
    }

    const BROWSER_ERA_LOG: &str = r#"{
  "sessionId": "session_1718000000000_a1b2c3d4e",
  "startTime": "2024-06-10T08:00:00.000Z",
  "endTime": "2024-06-10T08:14:00.000Z",
  "scenario": {
    "text": "האם כל ריבוע הוא מלבן?",
    "lesson_goals": "יחסי הכלה בין מרובעים",
    "initiated_by": "students"
  },
  "students": [{ "name": "Sheila", "description": "Careful" }, { "name": "Rishi" }],
  "turns": [
    {
      "turnNumber": 1,
      "timestamp": "2024-06-10T08:01:00.000Z",
      "teacher": { "message": "מה ההגדרה של מלבן?", "timestamp": "2024-06-10T08:01:00.000Z" },
      "students": [
        { "name": "Sheila", "message": "ארבע זוויות ישרות", "timestamp": "2024-06-10T08:01:05.000Z" }
      ],
      "pckFeedback": {
        "feedback_message": "שאלה טובה על ההגדרה",
        "feedback_type": "positive",
        "detected_skills": [{ "skill_id": "kcs-square-rectangle-inclusion-7th", "evidence": "שאל על ההגדרה", "confidence": 0.8 }],
        "missed_opportunities": [{ "skill_id": "kcs-rectangle-visual-prototype-7th", "suggestion": "להראות דוגמה נגדית", "priority": "medium" }],
        "timestamp": "2024-06-10T08:01:06.000Z"
      }
    },
    {
      "turnNumber": 2,
      "timestamp": "2024-06-10T08:02:00.000Z",
      "teacher": { "message": "נכון", "timestamp": "2024-06-10T08:02:00.000Z" },
      "students": [],
      "pckFeedback": null
    }
  ],
  "stats": { "totalTeacherMessages": 2, "totalStudentMessages": 1, "totalPCKFeedbacks": 1, "durationMinutes": 14 },
  "summaryFeedback": null
}"#;

    #[test]
    fn browser_era_log_with_short_feedback_loads() {
        let session: ConversationSession = serde_json::from_str(BROWSER_ERA_LOG).unwrap();
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.students[1].description, "");

        let verdict = session.turns[0].pck_feedback.as_ref().unwrap();
        assert_eq!(verdict.feedback_message, "שאלה טובה על ההגדרה");
        assert_eq!(verdict.pedagogical_quality, PedagogicalQuality::Neutral);
        assert_eq!(verdict.how_addressed, DEFAULT_HOW_ADDRESSED);
        assert_eq!(verdict.demonstrated_skills[0].evidence, "שאל על ההגדרה");
        assert_eq!(verdict.missed_opportunities[0].suggestion, "להראות דוגמה נגדית");
        assert_eq!(verdict.scenario_alignment, ScenarioAlignment::default());
        assert!(session.turns[1].pck_feedback.is_none());
        assert_eq!(session.stats.duration_minutes, Some(14));
    }

    #[test]
    fn listing_truncates_scenario_by_characters() {
        let mut session = sample_session();
        session.scenario.text = "א".repeat(150);
        let listing = SessionListing::from(&session);
        assert_eq!(listing.scenario.chars().count(), 100);
        assert_eq!(listing.turns_count, 2);
    }

    #[test]
    fn lesson_goals_accept_string_or_list() {
        let single: Scenario = serde_yaml::from_str(
            "id: a\ntext: t\ninitiated_by: teacher\nlesson_goals: goal one\n",
        )
        .unwrap();
        assert_eq!(single.lesson_goals, vec!["goal one".to_string()]);

        let many: Scenario = serde_yaml::from_str(
            "id: b\ntext: t\ninitiated_by: students\nlesson_goals: [g1, g2]\n",
        )
        .unwrap();
        assert_eq!(many.lesson_goals_text().as_deref(), Some("g1; g2"));
        assert_eq!(many.initiated_by, Initiator::Students);
    }

    #[test]
    fn lenient_enum_parsing() {
        assert_eq!(
            ResponseTone::parse("challenging"),
            Some(ResponseTone::Frustrated)
        );
        assert_eq!(
            UnderstandingLevel::parse(" More_Confused "),
            Some(UnderstandingLevel::MoreConfused)
        );
        assert_eq!(PedagogicalQuality::parse("great"), None);
        assert_eq!(MisconceptionRisk::parse("HIGH"), Some(MisconceptionRisk::High));
    }
}
