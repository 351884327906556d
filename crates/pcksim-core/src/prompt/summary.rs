use pcksim_schema::{ConversationSession, PckSkill};

use super::{PromptBuilder, Section, TEACHER_LABEL_HE};
use crate::registry::Registry;

const NOT_SPECIFIED: &str = "לא צוין";

struct SummaryContext<'a> {
    session: &'a ConversationSession,
    skills: Vec<&'a PckSkill>,
}

fn summary_sections<'a>() -> Vec<Section<SummaryContext<'a>>> {
    vec![
        Section {
            id: "role",
            render: |_| {
                Some(
                    "אתה מומחה בידע תוכן פדגוגי (PCK) בגיאומטריה. תפקידך לספק ניתוח מקיף אך תמציתי של ביצועי המורה בשיחה זו."
                        .to_string(),
                )
            },
        },
        Section {
            id: "lesson",
            render: render_lesson,
        },
        Section {
            id: "skills",
            render: render_skills,
        },
        Section {
            id: "conversation",
            render: render_conversation,
        },
        Section {
            id: "stats",
            render: render_stats,
        },
        Section {
            id: "guidelines",
            render: |_| Some(GUIDELINES.to_string()),
        },
        Section {
            id: "output_format",
            render: |_| Some(OUTPUT_FORMAT.to_string()),
        },
    ]
}

/// End-of-session analysis over the whole turn log.
pub fn compile_summary_prompt(session: &ConversationSession, registry: &Registry) -> String {
    let ctx = SummaryContext {
        session,
        skills: registry.resolve_skills(&session.scenario.target_pck_skills),
    };
    PromptBuilder::new(summary_sections()).compile(&ctx)
}

fn render_lesson(ctx: &SummaryContext<'_>) -> Option<String> {
    let scenario = &ctx.session.scenario;
    let goals = if scenario.lesson_goals.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        scenario.lesson_goals.join("; ")
    };
    Some(format!(
        "**הקשר השיעור:**\n{}\n\n**מטרות השיעור:**\n{goals}\n\n**תפיסה שגויה שהשיעור התמקד בה:**\n{}",
        scenario.text,
        scenario
            .misconception_focus
            .as_deref()
            .unwrap_or(NOT_SPECIFIED)
    ))
}

fn render_skills(ctx: &SummaryContext<'_>) -> Option<String> {
    if ctx.skills.is_empty() {
        return None;
    }
    let mut out = String::from("## מיומנות PCK מרכזית לתרחיש זה:\n");
    for skill in &ctx.skills {
        out.push_str(&format!("\n**{}**\n", skill.skill_name.preferred()));
        out.push_str(&format!("תיאור: {}\n", skill.description.preferred()));
        out.push_str("מה מצפים מהמורה:\n");
        for indicator in &skill.indicators {
            out.push_str(&format!("- {indicator}\n"));
        }
    }
    Some(out.trim_end().to_string())
}

fn render_conversation(ctx: &SummaryContext<'_>) -> Option<String> {
    let turns = &ctx.session.turns;
    let mut out = format!("**השיחה המלאה ({} תגובות):**\n", turns.len());
    for turn in turns {
        out.push_str(&format!("\n--- תור {} ---\n", turn.turn_number));
        out.push_str(&format!("{TEACHER_LABEL_HE}: {}\n", turn.teacher.message));
        for student in &turn.students {
            out.push_str(&format!("{}: {}\n", student.name, student.message));
        }
        if let Some(feedback) = &turn.pck_feedback {
            out.push_str(&format!("[משוב מיידי: {}]\n", feedback.feedback_message));
        }
    }
    Some(out.trim_end().to_string())
}

fn render_stats(ctx: &SummaryContext<'_>) -> Option<String> {
    let stats = &ctx.session.stats;
    let duration = stats
        .duration_minutes
        .map(|m| m.to_string())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    Some(format!(
        "**סטטיסטיקה:**\n- תגובות מורה: {}\n- תגובות תלמידים: {}\n- משך זמן: {duration} דקות",
        stats.total_teacher_messages, stats.total_student_messages
    ))
}

const GUIDELINES: &str = "---

**הנחיות לניתוח:**

1. **התמקד בעיקר במיומנות ה-PCK המרכזית** שהוגדרה למעלה: האם המורה הפגין אותה?
2. **אך אל תהיה מוגבל רק לזה**, אפשר לדבר גם על היבטים כלליים של ההוראה
3. **התאם את הניתוח לשיחה הספציפית**, בלי מבנה נוקשה
4. **אם המורה הפגין את המיומנות, תן קרדיט. אם לא, הסבר מה חסר**
5. **היה אמיתי**: לא כל שיחה צריכה 2 דברים טובים ו-2 רעים
6. **דוגמאות ספציפיות** מהשיחה: ציטוטים והתנהגויות
7. **טיפים קצרים וממוקדים**, בלי לחזור על אותו דבר";

const OUTPUT_FORMAT: &str = "---

**פורמט הניתוח (בעברית):**

## 📊 ניתוח כללי

[פסקה ראשונה: סיכום כללי של השיחה, איך המורה התמודד עם התלמידים ומה בלט. התמקד במיומנות ה-PCK המרכזית אם רלוונטי]

[פסקה שנייה: הערכה מעמיקה יותר. האם המורה הגיע למטרות השיעור? איך טיפל בתפיסה השגויה?]

## 💡 טיפים לשיפור

- [טיפ קצר וממוקד 1]
- [טיפ קצר וממוקד 2]
- [טיפ קצר וממוקד 3]
- [אם יש עוד משהו חשוב, טיפ 4]

---

**חשוב**:
- אל תפצל ל\"מה עשית טוב\" ו\"מה ניתן לשפר\" כשני חלקים נפרדים, שלב הכל בפסקאות
- הטיפים פרקטיים וישימים, לא חזרה על הפסקאות
- היה תמציתי: 2 פסקאות ו-3-4 טיפים
- אם המיומנות המרכזית לא התבטאה, הדגש זאת והסבר למה היא הייתה חשובה כאן";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pcksim_schema::{
        Initiator, PckVerdict, ScenarioSnapshot, SessionStats, StudentLine, TeacherLine,
        TurnLogEntry,
    };

    fn session() -> ConversationSession {
        let now = Utc::now();
        ConversationSession {
            session_id: "session_1_abcdefghi".into(),
            start_time: now,
            end_time: Some(now),
            scenario: ScenarioSnapshot {
                text: "מלבנים וריבועים".into(),
                lesson_goals: vec!["יחסי הכלה".into(), "הגדרות".into()],
                misconception_focus: None,
                target_pck_skills: vec!["kcs-square-rectangle-inclusion-7th".into()],
                initiated_by: Initiator::Students,
            },
            students: vec![],
            turns: vec![
                TurnLogEntry {
                    turn_number: 1,
                    timestamp: now,
                    teacher: TeacherLine {
                        message: "מה ההגדרה של מלבן?".into(),
                        timestamp: now,
                    },
                    students: vec![StudentLine {
                        name: "Casey".into(),
                        message: "מרובע עם 4 זוויות ישרות".into(),
                        timestamp: now,
                    }],
                    pck_feedback: Some(PckVerdict {
                        feedback_message: "חזרה מצוינת להגדרה".into(),
                        ..PckVerdict::default()
                    }),
                },
                TurnLogEntry {
                    turn_number: 2,
                    timestamp: now,
                    teacher: TeacherLine {
                        message: "נכון".into(),
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
                duration_minutes: Some(4),
            },
            summary_feedback: None,
        }
    }

    #[test]
    fn summary_prompt_covers_every_turn() {
        let registry = Registry::builtin().unwrap();
        let prompt = compile_summary_prompt(&session(), &registry);
        assert!(prompt.starts_with("אתה מומחה בידע תוכן פדגוגי (PCK)"));
        assert!(prompt.contains("**מטרות השיעור:**\nיחסי הכלה; הגדרות"));
        assert!(prompt.contains(&format!("**תפיסה שגויה שהשיעור התמקד בה:**\n{NOT_SPECIFIED}")));
        assert!(prompt.contains("## מיומנות PCK מרכזית לתרחיש זה:"));
        assert!(prompt.contains("**השיחה המלאה (2 תגובות):**"));
        assert!(prompt.contains("--- תור 1 ---\nמורה: מה ההגדרה של מלבן?\nCasey: מרובע עם 4 זוויות ישרות\n[משוב מיידי: חזרה מצוינת להגדרה]"));
        assert!(prompt.contains("--- תור 2 ---\nמורה: נכון"));
        assert!(prompt.contains("- משך זמן: 4 דקות"));
        assert!(prompt.contains("## 📊 ניתוח כללי"));
        assert!(prompt.contains("## 💡 טיפים לשיפור"));
    }

    #[test]
    fn unknown_skills_drop_the_rubric_section() {
        let registry = Registry::builtin().unwrap();
        let mut session = session();
        session.scenario.target_pck_skills = vec!["ghost".into()];
        session.stats.duration_minutes = None;
        let prompt = compile_summary_prompt(&session, &registry);
        assert!(!prompt.contains("מיומנות PCK מרכזית"));
        assert!(prompt.contains(&format!("- משך זמן: {NOT_SPECIFIED} דקות")));
    }
}
