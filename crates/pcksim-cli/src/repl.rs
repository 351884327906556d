use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use pcksim_core::{Opening, Orchestrator, OrchestratorError, TurnOutcome};
use pcksim_memory::SessionStore;
use pcksim_schema::{Message, PckVerdict, PersonaProfile, Scenario};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::App;

const HELP: &str = "Commands: /undo  /feedback  /image <png> <text>  /end  /summary  /help  quit";

/// One line typed at the teacher prompt.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Empty,
    Quit,
    Help,
    Undo,
    Feedback,
    End,
    Summary,
    Image { path: &'a str, text: &'a str },
    Say(&'a str),
    Unknown(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if line == "quit" || line == "exit" {
            return Self::Quit;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Say(line);
        };
        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));
        match name {
            "undo" => Self::Undo,
            "feedback" => Self::Feedback,
            "end" => Self::End,
            "summary" => Self::Summary,
            "help" => Self::Help,
            "image" if !rest.is_empty() => {
                let (path, text) = rest
                    .split_once(char::is_whitespace)
                    .map(|(path, text)| (path, text.trim()))
                    .unwrap_or((rest, ""));
                Self::Image { path, text }
            }
            _ => Self::Unknown(line),
        }
    }
}

pub(crate) async fn run_chat(
    app: App,
    scenario_id: Option<&str>,
    students: &[String],
    seed: Option<u64>,
) -> Result<()> {
    let scenario = pick_scenario(&app, scenario_id, seed)?;
    let personas = app
        .registry
        .select_personas(app.config.num_students, Some(students))?;
    let store: Arc<dyn SessionStore> = app.store.clone();
    let orchestrator = Arc::new(
        Orchestrator::new(
            app.config.clone(),
            app.registry.clone(),
            app.router.clone(),
            scenario,
            personas,
        )?
        .with_store(store),
    );

    print_banner(orchestrator.scenario(), orchestrator.personas());
    println!("Session {}", orchestrator.session_id().await);
    println!("{HELP}");
    println!("---");

    match with_interrupt(&orchestrator, orchestrator.start()).await? {
        Opening::StudentsSpoke(messages) => print_messages(&messages),
        Opening::TeacherPrompt(Some(prompt)) => println!("(suggested opening) {prompt}"),
        Opening::TeacherPrompt(None) | Opening::AlreadyStarted => {}
        Opening::Cancelled => println!("(opening cancelled, you have the floor)"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Teacher> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Unknown(cmd) => println!("Unknown command: {cmd}\n{HELP}"),
            ReplCommand::Undo => match orchestrator.undo_last().await? {
                Some(message) => println!("(removed) {message}"),
                None => println!("(nothing to undo)"),
            },
            ReplCommand::Feedback => match orchestrator.last_verdict().await {
                Some(verdict) => print_verdict(&verdict),
                None => println!("(no PCK feedback yet)"),
            },
            ReplCommand::End => {
                let session = orchestrator.end_session().await?;
                println!(
                    "Session ended after {} turns; saved as {}",
                    session.turns.len(),
                    app.store.session_path(&session.session_id).display()
                );
                return Ok(());
            }
            ReplCommand::Summary => match orchestrator.request_session_summary().await {
                Ok(summary) => {
                    println!("{summary}");
                    return Ok(());
                }
                Err(e) => println!("Cannot summarize: {e:#}"),
            },
            ReplCommand::Image { path, text } => {
                let image = match tokio::fs::read(path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        println!("Cannot read {path}: {e}");
                        continue;
                    }
                };
                teach(&orchestrator, text, Some(image)).await?;
            }
            ReplCommand::Say(text) => teach(&orchestrator, text, None).await?,
        }
    }

    if !orchestrator.history().await.is_empty() {
        let session = orchestrator.end_session().await?;
        tracing::info!(session_id = %session.session_id, "session closed");
    }
    Ok(())
}

async fn teach(orchestrator: &Arc<Orchestrator>, text: &str, image: Option<Vec<u8>>) -> Result<()> {
    let outcome = with_interrupt(
        orchestrator,
        orchestrator.submit_teacher_message(text, image),
    )
    .await;
    match outcome {
        Ok(TurnOutcome::Completed { messages, .. }) if messages.is_empty() => {
            println!("(the class is quiet)");
        }
        Ok(TurnOutcome::Completed { messages, .. }) => print_messages(&messages),
        Ok(TurnOutcome::Cancelled) => println!("(turn cancelled, your message was withdrawn)"),
        Err(e @ (OrchestratorError::EmptyTeacherMessage | OrchestratorError::SessionEnded)) => {
            println!("{e}");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Run `fut` with Ctrl-C mapped to cancelling the in-flight turn.
async fn with_interrupt<F: Future>(orchestrator: &Arc<Orchestrator>, fut: F) -> F::Output {
    let watcher = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                orchestrator.cancel_turn();
            }
        })
    };
    let output = fut.await;
    watcher.abort();
    output
}

fn pick_scenario(app: &App, scenario_id: Option<&str>, seed: Option<u64>) -> Result<Scenario> {
    if let Some(id) = scenario_id {
        return app.registry.scenario(id).cloned().ok_or_else(|| {
            let known: Vec<&str> = app.registry.scenarios().iter().map(|s| s.id.as_str()).collect();
            anyhow!("unknown scenario: {id} (known: {})", known.join(", "))
        });
    }
    let chosen = match seed {
        Some(seed) => app
            .registry
            .choose_scenario(&mut StdRng::seed_from_u64(seed)),
        None => app.registry.choose_scenario(&mut rand::thread_rng()),
    };
    chosen.cloned().ok_or_else(|| anyhow!("catalog has no scenarios"))
}

fn print_banner(scenario: &Scenario, personas: &[PersonaProfile]) {
    if let Some(name) = &scenario.name {
        println!("{name}");
    }
    println!("{}", scenario.text.trim());
    if let Some(goals) = scenario.lesson_goals_text() {
        println!("Lesson goals: {goals}");
    }
    let names: Vec<&str> = personas.iter().map(|p| p.name.as_str()).collect();
    println!("Students: {}", names.join(", "));
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        println!("{message}");
    }
}

fn print_verdict(verdict: &PckVerdict) {
    println!(
        "PCK: {} (misconception risk {}, alignment {}/100)",
        verdict.pedagogical_quality.as_str(),
        verdict.misconception_risk.as_str(),
        verdict.scenario_alignment.alignment_score
    );
    println!("  {}", verdict.feedback_message);
    if verdict.addressed_misconception {
        println!("  Misconception addressed: {}", verdict.how_addressed);
    }
    for skill in &verdict.demonstrated_skills {
        println!("  + {}: {}", skill.skill_id, skill.evidence);
    }
    for missed in &verdict.missed_opportunities {
        println!("  - {}: {}", missed.skill_id, missed.suggestion);
    }
}
