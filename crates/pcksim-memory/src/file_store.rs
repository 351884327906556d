use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pcksim_schema::{ConversationSession, SessionListing};
use tracing::warn;

use crate::{sort_newest_first, validate_session_id, SessionStore};

pub const SESSION_FILE_PREFIX: &str = "conversation_log_";
const SESSION_FILE_EXT: &str = "json";

/// One pretty-printed JSON file per session under a directory.
pub struct FileSessionStore {
    sessions_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(sessions_dir: impl AsRef<Path>) -> Self {
        Self {
            sessions_dir: sessions_dir.as_ref().to_path_buf(),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir
            .join(format!("{SESSION_FILE_PREFIX}{id}.{SESSION_FILE_EXT}"))
    }

    async fn read_session(path: &Path) -> Result<Option<ConversationSession>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session log {}", path.display()))?;
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save_session(&self, session: &ConversationSession) -> Result<()> {
        validate_session_id(&session.session_id)?;
        tokio::fs::create_dir_all(&self.sessions_dir)
            .await
            .with_context(|| format!("failed to create {}", self.sessions_dir.display()))?;

        let path = self.session_path(&session.session_id);
        let json = serde_json::to_string_pretty(session)?;
        write_atomic(&path, json.as_bytes()).await?;
        tracing::debug!(
            session_id = %session.session_id,
            turns = session.turns.len(),
            "session saved to {}",
            path.display()
        );
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<Option<ConversationSession>> {
        validate_session_id(id)?;
        Self::read_session(&self.session_path(id)).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionListing>> {
        let mut dir = match tokio::fs::read_dir(&self.sessions_dir).await {
            Ok(dir) => dir,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut listings = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_FILE_EXT) {
                continue;
            }
            let is_session_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(SESSION_FILE_PREFIX));
            if !is_session_file {
                continue;
            }

            match Self::read_session(&path).await {
                Ok(Some(session)) => listings.push(SessionListing::from(&session)),
                Ok(None) => {}
                Err(error) => warn!(path = %path.display(), "skipping unreadable session log: {error:#}"),
            }
        }

        sort_newest_first(&mut listings);
        Ok(listings)
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        validate_session_id(id)?;
        match tokio::fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid session path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}

/// Write a stored session to `<dir>/conversation_<id>_<YYYY-MM-DD>.json`.
pub async fn export_session(store: &dyn SessionStore, id: &str, dir: &Path) -> Result<PathBuf> {
    let session = store
        .load_session(id)
        .await?
        .ok_or_else(|| anyhow!("session not found: {id}"))?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!(
        "conversation_{}_{}.json",
        session.session_id,
        session.start_time.format("%Y-%m-%d")
    ));
    let json = serde_json::to_string_pretty(&session)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(session_id = %id, "session exported to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::session;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_then_load_reproduces_turns() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path().join("sessions"));
        let original = session("session_1_abc", 0);

        store.save_session(&original).await.expect("save");
        assert!(store.session_path("session_1_abc").exists());

        let loaded = store
            .load_session("session_1_abc")
            .await
            .expect("load")
            .expect("present");
        assert_eq!(loaded.turns, original.turns);
        assert!(loaded.turns[1].pck_feedback.is_none());
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn file_uses_camel_case_log_format() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path());
        store.save_session(&session("s1", 0)).await.expect("save");

        let raw = tokio::fs::read_to_string(store.session_path("s1"))
            .await
            .expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["turns"][0]["turnNumber"], 1);
        assert_eq!(value["turns"][0]["pckFeedback"]["pedagogical_quality"], "neutral");
        assert!(value["turns"][1]["pckFeedback"].is_null());
        assert_eq!(value["stats"]["totalPCKFeedbacks"], 1);
        assert!(value["summaryFeedback"].is_null());
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path());
        assert!(store.load_session("nope").await.expect("load").is_none());
        assert!(!store.delete_session("nope").await.expect("delete"));
        assert!(!store.save_summary("nope", "x").await.expect("summary"));
        assert!(store.list_sessions().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_skips_foreign_files() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path());
        store.save_session(&session("older", 0)).await.expect("save");
        store.save_session(&session("newer", 60)).await.expect("save");
        tokio::fs::write(tmp.path().join("notes.json"), "{}")
            .await
            .expect("write");
        tokio::fs::write(tmp.path().join("conversation_log_broken.json"), "{")
            .await
            .expect("write");

        let listings = store.list_sessions().await.expect("list");
        let ids: Vec<&str> = listings.iter().map(|l| l.session_id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older"]);
        assert_eq!(listings[0].turns_count, 2);
        assert_eq!(listings[0].scenario.chars().count(), 100);
    }

    #[tokio::test]
    async fn delete_and_summary() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path());
        store.save_session(&session("s1", 0)).await.expect("save");

        assert!(store.save_summary("s1", "## 📊 ניתוח כללי").await.expect("summary"));
        let loaded = store.load_session("s1").await.expect("load").expect("present");
        assert_eq!(loaded.summary_feedback.as_deref(), Some("## 📊 ניתוח כללי"));

        assert!(store.delete_session("s1").await.expect("delete"));
        assert!(store.load_session("s1").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn export_names_file_by_start_date() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path().join("sessions"));
        store.save_session(&session("s1", 0)).await.expect("save");

        let out = tmp.path().join("exports");
        let path = export_session(&store, "s1", &out).await.expect("export");
        assert_eq!(path, out.join("conversation_s1_2025-03-02.json"));
        let raw = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(raw.contains("\"sessionId\": \"s1\""));

        assert!(export_session(&store, "missing", &out).await.is_err());
    }

    #[tokio::test]
    async fn lists_and_loads_browser_era_logs() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path());
        let log = serde_json::json!({
            "sessionId": "session_1718000000000_a1b2c3d4e",
            "startTime": "2024-06-10T08:00:00.000Z",
            "endTime": null,
            "scenario": { "text": "ריבוע ומלבן", "initiated_by": "teacher" },
            "students": [{ "name": "Sheila", "description": "Careful" }],
            "turns": [{
                "turnNumber": 1,
                "timestamp": "2024-06-10T08:01:00.000Z",
                "teacher": { "message": "מה זה ריבוע?", "timestamp": "2024-06-10T08:01:00.000Z" },
                "students": [],
                "pckFeedback": {
                    "feedback_message": "נסה לשאול על ההגדרה",
                    "feedback_type": "suggestion",
                    "detected_skills": [],
                    "missed_opportunities": [],
                    "timestamp": "2024-06-10T08:01:02.000Z"
                }
            }],
            "stats": { "totalTeacherMessages": 1, "totalStudentMessages": 0, "totalPCKFeedbacks": 1 },
            "summaryFeedback": null
        });
        tokio::fs::write(
            store.session_path("session_1718000000000_a1b2c3d4e"),
            serde_json::to_string_pretty(&log).expect("json"),
        )
        .await
        .expect("write");

        let listings = store.list_sessions().await.expect("list");
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].turns_count, 1);

        let loaded = store
            .load_session("session_1718000000000_a1b2c3d4e")
            .await
            .expect("load")
            .expect("present");
        let verdict = loaded.turns[0].pck_feedback.as_ref().expect("verdict");
        assert_eq!(verdict.feedback_message, "נסה לשאול על ההגדרה");
    }

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let tmp = TempDir::new().expect("tempdir");
        let store = FileSessionStore::new(tmp.path());
        assert!(store.load_session("../x").await.is_err());
    }
}
