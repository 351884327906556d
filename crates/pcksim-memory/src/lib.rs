//! Session-log persistence keyed by session id.

mod file_store;
mod memory_store;

pub use file_store::{export_session, FileSessionStore, SESSION_FILE_PREFIX};
pub use memory_store::InMemorySessionStore;

use anyhow::{bail, Result};
use async_trait::async_trait;
use pcksim_schema::{ConversationSession, SessionListing};

/// Key-value store for finished and in-progress session logs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session under its id.
    async fn save_session(&self, session: &ConversationSession) -> Result<()>;

    /// `Ok(None)` when no session has that id.
    async fn load_session(&self, id: &str) -> Result<Option<ConversationSession>>;

    /// Newest first.
    async fn list_sessions(&self) -> Result<Vec<SessionListing>>;

    /// Returns whether the session existed.
    async fn delete_session(&self, id: &str) -> Result<bool>;

    /// Store an end-of-session summary. Returns whether the session was found.
    async fn save_summary(&self, id: &str, summary: &str) -> Result<bool> {
        match self.load_session(id).await? {
            Some(mut session) => {
                session.summary_feedback = Some(summary.to_string());
                self.save_session(&session).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Ids end up in file names; only `[A-Za-z0-9_-]` is accepted.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!("invalid session id: {id:?}");
    }
    Ok(())
}

pub(crate) fn sort_newest_first(listings: &mut [SessionListing]) {
    listings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone, Utc};
    use pcksim_schema::{
        ConversationSession, Initiator, PckVerdict, PersonaSnapshot, ScenarioSnapshot,
        SessionStats, StudentLine, TeacherLine, TurnLogEntry,
    };

    pub fn session(id: &str, minutes_after_epoch: i64) -> ConversationSession {
        let start = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()
            + Duration::minutes(minutes_after_epoch);
        ConversationSession {
            session_id: id.to_string(),
            start_time: start,
            end_time: Some(start + Duration::minutes(12)),
            scenario: ScenarioSnapshot {
                text: "ריבוע הוא מלבן? ".repeat(10),
                lesson_goals: vec!["יחסי הכלה".into()],
                misconception_focus: Some("ריבוע אינו מלבן".into()),
                target_pck_skills: vec!["kcs-square-rectangle-inclusion-7th".into()],
                initiated_by: Initiator::Students,
            },
            students: vec![PersonaSnapshot {
                name: "Sheila".into(),
                description: "Careful".into(),
            }],
            turns: vec![
                TurnLogEntry {
                    turn_number: 1,
                    timestamp: start,
                    teacher: TeacherLine {
                        message: "מה ההגדרה של מלבן?".into(),
                        timestamp: start,
                    },
                    students: vec![StudentLine {
                        name: "Sheila".into(),
                        message: "אה, אז ריבוע הוא מלבן".into(),
                        timestamp: start,
                    }],
                    pck_feedback: Some(PckVerdict::default()),
                },
                TurnLogEntry {
                    turn_number: 2,
                    timestamp: start,
                    teacher: TeacherLine {
                        message: "נכון".into(),
                        timestamp: start,
                    },
                    students: vec![],
                    pck_feedback: None,
                },
            ],
            stats: SessionStats {
                total_teacher_messages: 2,
                total_student_messages: 1,
                total_pck_feedbacks: 1,
                duration_minutes: Some(12),
            },
            summary_feedback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_checked() {
        assert!(validate_session_id("session_1700000000000_k3j9x0abc").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id("a b").is_err());
    }
}
