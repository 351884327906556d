use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};
use pcksim_memory::{export_session, SessionStore};
use pcksim_schema::ConversationSession;

use crate::{first_line, SessionCommands};

pub(crate) async fn handle_sessions_command(
    store: &dyn SessionStore,
    cmd: SessionCommands,
) -> Result<()> {
    match cmd {
        SessionCommands::List => {
            let listings = store.list_sessions().await?;
            if listings.is_empty() {
                println!("No stored sessions.");
                return Ok(());
            }
            println!(
                "{:<36} {:<17} {:>5}  SCENARIO",
                "ID", "STARTED", "TURNS"
            );
            for listing in listings {
                let status = if listing.end_time.is_some() { "" } else { " (open)" };
                println!(
                    "{:<36} {:<17} {:>5}  {}{}",
                    listing.session_id,
                    local_time(listing.start_time),
                    listing.turns_count,
                    first_line(&listing.scenario),
                    status
                );
            }
        }
        SessionCommands::Show { id, json } => {
            let session = load(store, &id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print!("{}", render_transcript(&session));
            }
        }
        SessionCommands::Delete { id } => {
            if store.delete_session(&id).await? {
                println!("Deleted session {id}.");
            } else {
                return Err(anyhow!("session not found: {id}"));
            }
        }
        SessionCommands::Export { id, out } => {
            let path = export_session(store, &id, &out).await?;
            println!("Exported to {}", path.display());
        }
    }
    Ok(())
}

async fn load(store: &dyn SessionStore, id: &str) -> Result<ConversationSession> {
    store
        .load_session(id)
        .await?
        .ok_or_else(|| anyhow!("session not found: {id}"))
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn render_transcript(session: &ConversationSession) -> String {
    let mut out = String::new();
    out.push_str(&format!("Session {}\n", session.session_id));
    out.push_str(&format!("Started: {}\n", local_time(session.start_time)));
    if let Some(end) = session.end_time {
        out.push_str(&format!("Ended:   {}\n", local_time(end)));
    }
    out.push_str(&format!("Scenario: {}\n", session.scenario.text.trim()));
    let names: Vec<&str> = session.students.iter().map(|s| s.name.as_str()).collect();
    out.push_str(&format!("Students: {}\n", names.join(", ")));

    for turn in &session.turns {
        out.push_str(&format!(
            "\n--- Turn {} ---\nTeacher: {}\n",
            turn.turn_number, turn.teacher.message
        ));
        for line in &turn.students {
            out.push_str(&format!("{}: {}\n", line.name, line.message));
        }
        if let Some(verdict) = &turn.pck_feedback {
            out.push_str(&format!(
                "[PCK {} | risk {}] {}\n",
                verdict.pedagogical_quality.as_str(),
                verdict.misconception_risk.as_str(),
                verdict.feedback_message
            ));
        }
    }

    let stats = &session.stats;
    out.push_str(&format!(
        "\n{} teacher messages, {} student messages, {} PCK verdicts",
        stats.total_teacher_messages, stats.total_student_messages, stats.total_pck_feedbacks
    ));
    if let Some(minutes) = stats.duration_minutes {
        out.push_str(&format!(", {minutes} min"));
    }
    out.push('\n');

    if let Some(summary) = &session.summary_feedback {
        out.push('\n');
        out.push_str(summary);
        out.push('\n');
    }
    out
}
