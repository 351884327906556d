use pcksim_schema::{Message, PckSkill, PckVerdict, Scenario};

use super::{hebrew_transcript, trailing_problematic, PromptBuilder, Section};
use crate::error::PromptError;

const NOT_SPECIFIED: &str = "לא צוין";
const NO_HISTORY: &str = "אין היסטוריה קודמת - זו התגובה הראשונה של המורה";
const ANSWER_JSON_ONLY: &str = "תשובה JSON בלבד, ללא טקסט נוסף:";

/// Inputs for one grading call.
#[derive(Debug, Clone)]
pub struct GraderPromptContext<'a> {
    pub teacher_message: &'a str,
    /// Conversation before the message under analysis.
    pub history: &'a [Message],
    pub scenario: Option<&'a Scenario>,
    pub target_skills: Vec<&'a PckSkill>,
    /// Recent verdicts, oldest first.
    pub verdict_window: &'a [PckVerdict],
}

impl<'a> GraderPromptContext<'a> {
    pub fn new(teacher_message: &'a str, history: &'a [Message]) -> Self {
        Self {
            teacher_message,
            history,
            scenario: None,
            target_skills: Vec::new(),
            verdict_window: &[],
        }
    }

    pub fn with_scenario(mut self, scenario: &'a Scenario, skills: Vec<&'a PckSkill>) -> Self {
        self.scenario = Some(scenario);
        self.target_skills = skills;
        self
    }

    pub fn with_verdict_window(mut self, window: &'a [PckVerdict]) -> Self {
        self.verdict_window = window;
        self
    }
}

/// Grader prompt sections, in render order.
pub fn grader_sections<'a>() -> Vec<Section<GraderPromptContext<'a>>> {
    vec![
        Section {
            id: "role",
            render: render_role,
        },
        Section {
            id: "scenario_context",
            render: render_scenario_context,
        },
        Section {
            id: "skills_rubric",
            render: render_skills_rubric,
        },
        Section {
            id: "history",
            render: render_history,
        },
        Section {
            id: "teacher_message",
            render: render_teacher_message,
        },
        Section {
            id: "verdict_window",
            render: render_verdict_window,
        },
        Section {
            id: "response_schema",
            render: render_response_schema,
        },
        Section {
            id: "calibration",
            render: render_calibration,
        },
        Section {
            id: "skill_detection",
            render: render_skill_detection,
        },
    ]
}

pub fn compile_grader_prompt(ctx: &GraderPromptContext<'_>) -> Result<String, PromptError> {
    if ctx.teacher_message.trim().is_empty() {
        return Err(PromptError::EmptyTeacherMessage);
    }
    Ok(PromptBuilder::new(grader_sections()).compile(ctx))
}

fn render_role(_: &GraderPromptContext<'_>) -> Option<String> {
    Some(
        "אתה מומחה PCK (Pedagogical Content Knowledge) שמנתח מהלך הוראתי של מורה לגאומטריה."
            .to_string(),
    )
}

fn render_scenario_context(ctx: &GraderPromptContext<'_>) -> Option<String> {
    let Some(scenario) = ctx.scenario else {
        return Some("## הקשר התרחיש\nאין הקשר תרחיש".to_string());
    };
    let goals = scenario.lesson_goals_text();
    let mut out = format!(
        "## הקשר התרחיש
**רמת כיתה**: {}
**נושא**: {}
**מטרות השיעור**: {}
**תפיסה שגויה ממוקדת**: {}",
        scenario.grade_level.as_deref().unwrap_or("חטיבת ביניים"),
        scenario.name.as_deref().unwrap_or("גאומטריה"),
        goals.as_deref().unwrap_or(NOT_SPECIFIED),
        scenario
            .misconception_focus
            .as_deref()
            .unwrap_or(NOT_SPECIFIED),
    );
    if let Some(guidance) = &scenario.pck_guidance {
        out.push_str(&format!("\n\n## דפוסי תגובה אופטימליים של מורה:\n{guidance}"));
    }
    Some(out)
}

fn render_skills_rubric(ctx: &GraderPromptContext<'_>) -> Option<String> {
    if ctx.target_skills.is_empty() {
        return None;
    }
    let mut out = String::from("## מיומנויות PCK שהתרחיש בודק:\n");
    for skill in &ctx.target_skills {
        out.push_str(&format!("\n**{}**\n", skill.skill_name.preferred()));
        out.push_str(&format!("מזהה: {}\n", skill.skill_id));
        out.push_str(&format!("תיאור: {}\n", skill.description.preferred()));
        out.push_str("מה לחפש:\n");
        for indicator in &skill.indicators {
            out.push_str(&format!("- {indicator}\n"));
        }
        if !skill.examples.positive.is_empty() {
            out.push_str("דוגמאות חיוביות:\n");
            for ex in &skill.examples.positive {
                out.push_str(&format!("- \"{}\" ({})\n", ex.text, ex.why));
            }
        }
        if !skill.examples.negative.is_empty() {
            out.push_str("דוגמאות שליליות:\n");
            for ex in &skill.examples.negative {
                out.push_str(&format!("- \"{}\" ({})\n", ex.text, ex.why));
            }
        }
        if !skill.common_teacher_mistakes.is_empty() {
            out.push_str("טעויות נפוצות של מורים:\n");
            for m in &skill.common_teacher_mistakes {
                out.push_str(&format!("- {}: \"{}\"\n", m.mistake, m.example));
            }
        }
    }
    Some(out.trim_end().to_string())
}

fn render_history(ctx: &GraderPromptContext<'_>) -> Option<String> {
    let transcript = hebrew_transcript(ctx.history);
    let body = if transcript.is_empty() {
        NO_HISTORY.to_string()
    } else {
        transcript
    };
    Some(format!("## היסטוריית השיחה:\n{body}"))
}

fn render_teacher_message(ctx: &GraderPromptContext<'_>) -> Option<String> {
    Some(format!(
        "## ההודעה האחרונה של המורה שיש לנתח:\n\"{}\"",
        ctx.teacher_message.trim()
    ))
}

fn render_verdict_window(ctx: &GraderPromptContext<'_>) -> Option<String> {
    let window = ctx.verdict_window;
    if window.is_empty() {
        return None;
    }
    let mut out = format!(
        "## 📊 היסטוריית משוב קודמת ({} תורות אחרונים):\n",
        window.len()
    );
    for (idx, verdict) in window.iter().enumerate() {
        out.push_str(&format!(
            "\n**תור {} לפני כעת:**
- איכות פדגוגית: {}
- הודעת משוב: \"{}\"
- רמת הבנה חזויה: {}\n",
            window.len() - idx,
            verdict.pedagogical_quality.as_str(),
            verdict.feedback_message,
            verdict.predicted_student_state.understanding_level.as_str(),
        ));
    }

    out.push_str(
        "\n⚠️ **כללי התמדה (Persistence Rules):**
- אם אותה בעיה מתודולוגית חוזרת על עצמה ללא תיקון מפורש מהמורה, אסור שהמשוב ישתפר מ\"problematic\" ל\"neutral\" או \"positive\"
- משוב צריך להתרכך רק אחרי מהלך תיקון מפורש (כגון: חזרה להגדרה פורמלית, בדיקה שיטתית)
- אם היו 2+ משובים בעייתיים רצופים, תן ל-predicted_student_state אינדיקציה להגברת הביטוי (frustrated)",
    );

    let streak = trailing_problematic(window);
    if streak >= 2 {
        out.push_str(&format!(
            "\n\n🔥 **הסלמה נדרשת:** {streak} התורות האחרונים סומנו \"problematic\". \
אלא אם המורה ביצע כעת מהלך תיקון מפורש, קבע response_tone: \"frustrated\" \
והוסף ל-likely_reactions ביטויים כמו \"זה לא ממש עונה על השאלה שלי\"."
        ));
    }
    Some(out)
}

fn render_response_schema(_: &GraderPromptContext<'_>) -> Option<String> {
    Some(
        r#"---

## המשימה שלך:
נתח את ההודעה האחרונה של המורה וספק תגובה JSON מפורטת עם המבנה הבא:

```json
{
  "pedagogical_quality": "positive" | "neutral" | "problematic",
  "addressed_misconception": true/false,
  "how_addressed": "בעברית: הסבר קצר איך המורה התייחס/לא התייחס לתפיסה המוטעית",
  "misconception_risk": "low" | "medium" | "high",
  "demonstrated_skills": [
    {"skill_id": "...", "evidence": "ציטוט או תיאור"}
  ],
  "missed_opportunities": [
    {"skill_id": "...", "what_could_have_been_done": "בעברית: מה היה כדאי לעשות"}
  ],
  "predicted_student_state": {
    "understanding_level": "improved" | "same" | "confused" | "more_confused",
    "likely_reactions": ["תגובה אפשרית 1", "תגובה אפשרית 2"],
    "who_should_respond": ["שם תלמיד 1", "שם תלמיד 2"],
    "response_tone": "confident" | "hesitant" | "confused" | "frustrated"
  },
  "feedback_message_hebrew": "משוב קצר למורה בעברית (2-3 משפטים)",
  "scenario_alignment": {
    "moving_toward_goals": true/false,
    "alignment_score": 0-100
  }
}
```"#
            .to_string(),
    )
}

fn render_calibration(_: &GraderPromptContext<'_>) -> Option<String> {
    Some(
        "## 🎯 כללי כיול משוב - CRITICAL CALIBRATION RULES:

### 1️⃣ רעיון נכון אבל ביצוע רך (Right Idea, Soft Execution):
**אל תסמן \"positive\" אם:**
- המורה אומר דברים נכונים אבל לא משתמש בהגדרות פורמליות
- המורה מכוון בכיוון הנכון אבל לא מבקש בדיקה לוגית שיטתית
- המורה נותן הסבר חלקי ללא השלמה מדויקת

**השתמש ב-\"positive\" רק אחרי מהלך תיקון מפורש:**
- חזרה להגדרה הפורמלית: \"מה ההגדרה של מלבן?\"
- בקשה לבדיקה שיטתית: \"בואו נבדוק האם מתקיימים כל תנאי ההגדרה\"
- הנחיה לגילוי לוגי: \"איזה תנאים חייבים להתקיים?\"

### 2️⃣ נטישה אפיסטמית (Epistemic Abdication):
**ביטויים שחייבים לגרום ל-\"problematic\":**
- \"לא צריך להיתקע על זה\"
- \"זה רק רעיון כללי\"
- \"זה לא כל כך חשוב\"
- \"סתם תסמכו עליי\"
- \"זה יותר תחושה\"
- \"אל תחשבו על זה יותר מדי\"
- \"זה סבבה גם ככה\"

כאשר מורה משתמש בשפה כזו: pedagogical_quality הוא \"problematic\", feedback_message_hebrew מתייחס לבעיה במפורש, ו-missed_opportunities כולל את המיומנות הרלוונטית.

### 3️⃣ הסלמת תגובות תלמידים אחרי משוב שלילי מתמשך:
אם היסטוריית המשוב מראה 2+ תורות רצופים עם \"problematic\":
- קבע predicted_student_state.response_tone ל-\"frustrated\"
- הוסף ל-likely_reactions ביטויים כמו:
  • \"אני לא בטוח שהבנתי את מה שאמרת\"
  • \"זה לא ממש עונה על השאלה שלי\"
  • \"רגע, איך זה קשור למה ששאלתי?\"
**חשוב:** אל תשנה את הפרסונות, רק הגבר את עוצמת הביטוי."
            .to_string(),
    )
}

fn render_skill_detection(_: &GraderPromptContext<'_>) -> Option<String> {
    Some(format!(
        "## 🚨 הנחיות קריטיות לזיהוי מיומנויות PCK:

1. **לא כל תגובה טובה היא מיומנות PCK ספציפית.** רוב התגובות הן המשך שיחה רגיל.
2. **demonstrated_skills צריך להיות ריק [] ברוב המקרים.**
3. זהה מיומנות רק אם כל התנאים הבאים מתקיימים יחד:

א. **התלמיד הציג טעות או תפיסה שגויה** בתור הנוכחי או הקודם
ב. **תגובת המורה מכוונת ספציפית לטיפול בטעות זו**, ולא רק ממשיכה הלאה
ג. **המורה הפגין לפחות אחד מהאינדיקטורים** של המיומנות כפי שמופיעים למעלה

✅ תלמיד: \"אבל זה ריבוע, לא מלבן\" / מורה: \"בואו נבדוק - מה ההגדרה של מלבן?\" ← זיהוי מיומנות
❌ מורה: \"היום נדבר על מלבנים וריבועים\" ← אין טעות של תלמיד, אין זיהוי
❌ תלמיד: \"למה ריבוע נחשב מלבן?\" / מורה: \"כי יש לו את כל התכונות של מלבן\" ← תשובה טובה ללא אינדיקטור

**missed_opportunities:** רק כאשר התלמיד הציג טעות והמורה לא טיפל בה או טיפל בה בצורה בעייתית.

**predicted_student_state.understanding_level** משקף את איכות ההוראה בתור הנוכחי:
- \"improved\": חזרה מפורשת להגדרה, בדיקה שיטתית של תנאים, או הסבר מדויק שעונה על השאלה
- \"same\": דברים נכונים ללא דיוק פורמלי, או המשך הלאה בלי לטפל בשאלה
- \"confused\" / \"more_confused\": נטישה אפיסטמית, הסבר מבלבל, תיקון סמכותי בלי הסבר, או המשך של בעיה מתור קודם

- השתמש ב-skill_id בדיוק כפי שמופיע למעלה
- ב-evidence צטט בדיוק מה המורה אמר
- אל תחליש משוב חיובי כאשר ההוראה חזקה באמת
- אל תניח תיקון עתידי, הערך רק את התור הנוכחי
- אם אותה בעיה נמשכת, אל תרכך את המשוב

{ANSWER_JSON_ONLY}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use pcksim_schema::PedagogicalQuality;

    fn verdict(quality: PedagogicalQuality, feedback: &str) -> PckVerdict {
        PckVerdict {
            pedagogical_quality: quality,
            feedback_message: feedback.to_string(),
            ..PckVerdict::default()
        }
    }

    #[test]
    fn empty_teacher_message_is_rejected() {
        let ctx = GraderPromptContext::new("   ", &[]);
        assert_eq!(
            compile_grader_prompt(&ctx),
            Err(PromptError::EmptyTeacherMessage)
        );
    }

    #[test]
    fn minimal_prompt_has_fixed_sections_in_order() {
        let ctx = GraderPromptContext::new("מה ההגדרה של מלבן?", &[]);
        let prompt = compile_grader_prompt(&ctx).unwrap();
        assert!(prompt.starts_with("אתה מומחה PCK"));
        assert!(prompt.contains("אין הקשר תרחיש"));
        assert!(prompt.contains(NO_HISTORY));
        assert!(prompt.contains("\"מה ההגדרה של מלבן?\""));
        assert!(!prompt.contains("היסטוריית משוב קודמת"));
        assert!(prompt.ends_with(ANSWER_JSON_ONLY));

        let active = PromptBuilder::new(grader_sections()).active_sections(&ctx);
        assert_eq!(
            active,
            vec![
                "role",
                "scenario_context",
                "history",
                "teacher_message",
                "response_schema",
                "calibration",
                "skill_detection"
            ]
        );
    }

    #[test]
    fn scenario_and_skills_are_rendered() {
        let registry = Registry::builtin().unwrap();
        let scenario = registry.scenario("equal-diagonals").unwrap();
        let skills = registry.resolve_skills(&scenario.target_pck_skills);
        let skill_name = skills[0].skill_name.preferred().to_string();
        let ctx = GraderPromptContext::new("נבדוק", &[]).with_scenario(scenario, skills);
        let prompt = compile_grader_prompt(&ctx).unwrap();
        assert!(prompt.contains(&format!("**{skill_name}**")));
        assert!(prompt.contains("מה לחפש:"));
        assert!(prompt.contains(&format!(
            "**תפיסה שגויה ממוקדת**: {}",
            scenario.misconception_focus.as_deref().unwrap()
        )));
    }

    #[test]
    fn history_uses_hebrew_labels() {
        let history = vec![
            Message::student("Casey", "ריבוע זה לא מלבן"),
            Message::teacher("למה את חושבת כך?"),
        ];
        let ctx = GraderPromptContext::new("מה ההגדרה של מלבן?", &history);
        let prompt = compile_grader_prompt(&ctx).unwrap();
        assert!(prompt.contains("## היסטוריית השיחה:\nCasey: ריבוע זה לא מלבן\nמורה: למה את חושבת כך?"));
    }

    #[test]
    fn verdict_window_counts_back_from_now() {
        let window = vec![
            verdict(PedagogicalQuality::Neutral, "ראשון"),
            verdict(PedagogicalQuality::Positive, "שני"),
        ];
        let ctx = GraderPromptContext::new("x", &[]).with_verdict_window(&window);
        let section = PromptBuilder::new(grader_sections())
            .render_section("verdict_window", &ctx)
            .unwrap();
        assert!(section.contains("(2 תורות אחרונים)"));
        let oldest = section.find("**תור 2 לפני כעת:**").unwrap();
        let newest = section.find("**תור 1 לפני כעת:**").unwrap();
        assert!(oldest < newest);
        assert!(section.contains("- הודעת משוב: \"ראשון\""));
        assert!(!section.contains("הסלמה נדרשת"));
    }

    #[test]
    fn problematic_streak_adds_escalation() {
        let window = vec![
            verdict(PedagogicalQuality::Positive, "a"),
            verdict(PedagogicalQuality::Problematic, "b"),
            verdict(PedagogicalQuality::Problematic, "c"),
        ];
        let ctx = GraderPromptContext::new("x", &[]).with_verdict_window(&window);
        let prompt = compile_grader_prompt(&ctx).unwrap();
        assert!(prompt.contains("כללי התמדה"));
        assert!(prompt.contains("הסלמה נדרשת"));
    }
}
