use chrono::{DateTime, Utc};
use pcksim_schema::{
    ConversationSession, Message, PckVerdict, PersonaProfile, PersonaSnapshot, Scenario,
    ScenarioSnapshot, SessionStats, StudentLine, TeacherLine, TurnLogEntry,
};
use rand::Rng;

use crate::error::OrchestratorError;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// `session_<unix-millis>_<9 base36 chars>`
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("session_{}_{suffix}", Utc::now().timestamp_millis())
}

/// Append-only turn log for one session.
#[derive(Debug, Clone)]
pub struct ConversationLogger {
    session: ConversationSession,
}

impl ConversationLogger {
    pub fn new(scenario: &Scenario, personas: &[PersonaProfile]) -> Self {
        Self::with_id(generate_session_id(), scenario, personas)
    }

    pub fn with_id(id: impl Into<String>, scenario: &Scenario, personas: &[PersonaProfile]) -> Self {
        let session = ConversationSession {
            session_id: id.into(),
            start_time: Utc::now(),
            end_time: None,
            scenario: ScenarioSnapshot::from(scenario),
            students: personas.iter().map(PersonaSnapshot::from).collect(),
            turns: Vec::new(),
            stats: SessionStats::default(),
            summary_feedback: None,
        };
        tracing::info!(session_id = %session.session_id, "conversation log started");
        Self { session }
    }

    /// Continue a stored session.
    pub fn resume(session: ConversationSession) -> Self {
        Self { session }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn snapshot(&self) -> ConversationSession {
        self.session.clone()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.session.stats
    }

    pub fn turns(&self) -> &[TurnLogEntry] {
        &self.session.turns
    }

    pub fn is_ended(&self) -> bool {
        self.session.end_time.is_some()
    }

    /// The teacher text is stored exactly as the history holds it (newlines stripped).
    pub fn add_turn(
        &mut self,
        teacher_text: &str,
        students: &[Message],
        verdict: Option<PckVerdict>,
    ) -> &TurnLogEntry {
        let now = Utc::now();
        let stats = &mut self.session.stats;
        stats.total_teacher_messages += 1;
        stats.total_student_messages += students.len() as u32;
        if verdict.is_some() {
            stats.total_pck_feedbacks += 1;
        }

        let turn_number = self.session.turns.len() as u32 + 1;
        self.session.turns.push(TurnLogEntry {
            turn_number,
            timestamp: now,
            teacher: TeacherLine {
                message: Message::teacher(teacher_text).text().to_string(),
                timestamp: now,
            },
            students: students
                .iter()
                .map(|m| StudentLine {
                    name: m.speaker_id().to_string(),
                    message: m.text().to_string(),
                    timestamp: m.created_at(),
                })
                .collect(),
            pck_feedback: verdict,
        });
        tracing::debug!(
            session_id = %self.session.session_id,
            turn = turn_number,
            students = students.len(),
            "turn logged"
        );
        &self.session.turns[self.session.turns.len() - 1]
    }

    /// Up to `n` most recent non-null verdicts, oldest first.
    pub fn recent_verdicts(&self, n: usize) -> Vec<PckVerdict> {
        let mut window: Vec<PckVerdict> = self
            .session
            .turns
            .iter()
            .rev()
            .filter_map(|t| t.pck_feedback.clone())
            .take(n)
            .collect();
        window.reverse();
        window
    }

    /// Whether any logged verdict has marked the misconception as addressed.
    pub fn misconception_addressed(&self) -> bool {
        self.session
            .turns
            .iter()
            .filter_map(|t| t.pck_feedback.as_ref())
            .any(|v| v.addressed_misconception)
    }

    /// Stamp the end time. Repeated calls keep the first stamp.
    pub fn end_session(&mut self) -> &ConversationSession {
        if self.session.end_time.is_none() {
            self.end_at(Utc::now());
        }
        &self.session
    }

    fn end_at(&mut self, end: DateTime<Utc>) {
        let millis = (end - self.session.start_time).num_milliseconds();
        self.session.end_time = Some(end);
        self.session.stats.duration_minutes = Some((millis as f64 / 60_000.0).round() as i64);
        tracing::info!(
            session_id = %self.session.session_id,
            turns = self.session.turns.len(),
            duration_minutes = ?self.session.stats.duration_minutes,
            "conversation log ended"
        );
    }

    pub fn attach_summary(&mut self, text: impl Into<String>) -> Result<(), OrchestratorError> {
        if self.session.summary_feedback.is_some() {
            return Err(OrchestratorError::SummaryAlreadyAttached(
                self.session.session_id.clone(),
            ));
        }
        self.session.summary_feedback = Some(text.into());
        Ok(())
    }
}
