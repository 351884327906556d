use pcksim_schema::{
    Initiator, PckSkill, PckVerdict, PedagogicalQuality, PersonaProfile, Scenario,
    UnderstandingLevel,
};
use serde_json::json;

use super::{trailing_problematic, PromptBuilder, Section};
use crate::error::PromptError;

pub const VERDICT_OVERRIDE_HEADER: &str =
    "CRITICAL: PCK EXPERT ANALYSIS - THIS OVERRIDES ALL OTHER INSTRUCTIONS";
pub const SHOW_UNDERSTANDING_DIRECTIVE: &str = "Students MUST show understanding progress";
pub const PERSIST_CONFUSION_DIRECTIVE: &str =
    "Students should show confusion or persist in the misconception";
pub const PARTIAL_PROGRESS_DIRECTIVE: &str = "Students make modest progress or stay similar";
pub const ESCALATION_DIRECTIVE: &str = "PERSISTENCE ESCALATION";
pub const MISCONCEPTION_INTRO_HEADER: &str = "MISCONCEPTION LIFECYCLE - INTRODUCTION";
pub const MISCONCEPTION_RESOLUTION_HEADER: &str = "MISCONCEPTION LIFECYCLE - RESOLUTION";

const SCENE: &str = "The user is a teacher, and you are playing multiple middle-school students \
in a geometry lesson. The whole conversation happens in Hebrew.";

const RESPONSE_INSTRUCTIONS: &str = "The students are subtle about their personalities but \
always stay in character. They talk to the teacher and sometimes to each other, and they are \
sometimes wrong. Each student speaks only for themself. Reply with the JSON object described at \
the top of these instructions and nothing else.";

const RULE: &str = "========================================";

/// Inputs for one student-response call.
#[derive(Debug, Clone)]
pub struct StudentPromptContext<'a> {
    pub personas: &'a [PersonaProfile],
    pub scenario: &'a Scenario,
    /// Already resolved against the registry; unknown ids are gone.
    pub target_skills: Vec<&'a PckSkill>,
    pub addendum: &'a str,
    /// This turn's grader verdict, if the grader answered.
    pub verdict: Option<&'a PckVerdict>,
    /// Earlier verdicts, oldest first.
    pub prior_verdicts: &'a [PckVerdict],
    /// Whether any earlier verdict reported the misconception as addressed.
    pub misconception_addressed: bool,
}

impl<'a> StudentPromptContext<'a> {
    pub fn new(
        personas: &'a [PersonaProfile],
        scenario: &'a Scenario,
        addendum: &'a str,
        verdict: Option<&'a PckVerdict>,
    ) -> Self {
        Self {
            personas,
            scenario,
            target_skills: Vec::new(),
            addendum,
            verdict,
            prior_verdicts: &[],
            misconception_addressed: false,
        }
    }

    pub fn with_target_skills(mut self, skills: Vec<&'a PckSkill>) -> Self {
        self.target_skills = skills;
        self
    }

    pub fn with_prior_verdicts(mut self, verdicts: &'a [PckVerdict]) -> Self {
        self.prior_verdicts = verdicts;
        self
    }

    pub fn with_misconception_addressed(mut self, addressed: bool) -> Self {
        self.misconception_addressed = addressed;
        self
    }

    fn addressed(&self) -> bool {
        self.misconception_addressed || self.verdict.is_some_and(|v| v.addressed_misconception)
    }

    /// Problematic verdicts at the tail of the window, current verdict included.
    fn problematic_streak(&self) -> usize {
        trailing_problematic(self.prior_verdicts.iter().chain(self.verdict))
    }

    fn escalates(&self) -> bool {
        let current_addresses = self.verdict.is_some_and(|v| v.addressed_misconception);
        self.problematic_streak() >= 2 && !current_addresses
    }

    /// Cycles through the real names so examples never show placeholders.
    fn name_at(&self, idx: usize) -> &str {
        self.personas
            .get(idx % self.personas.len().max(1))
            .map(|p| p.name.as_str())
            .unwrap_or_default()
    }
}

/// Student prompt sections, in render order.
pub fn student_sections<'a>() -> Vec<Section<StudentPromptContext<'a>>> {
    vec![
        Section {
            id: "format_contract",
            render: render_format_contract,
        },
        Section {
            id: "participation",
            render: render_participation,
        },
        Section {
            id: "decision_process",
            render: render_decision_process,
        },
        Section {
            id: "reaction_rules",
            render: render_reaction_rules,
        },
        Section {
            id: "worked_examples",
            render: render_worked_examples,
        },
        Section {
            id: "scene",
            render: render_scene,
        },
        Section {
            id: "lesson_context",
            render: render_lesson_context,
        },
        Section {
            id: "misconception_lifecycle",
            render: render_misconception_lifecycle,
        },
        Section {
            id: "target_skills",
            render: render_target_skills,
        },
        Section {
            id: "verdict_override",
            render: render_verdict_override,
        },
        Section {
            id: "persistence_escalation",
            render: render_persistence_escalation,
        },
        Section {
            id: "conversation_guidelines",
            render: render_conversation_guidelines,
        },
        Section {
            id: "personas",
            render: render_personas,
        },
        Section {
            id: "persona_usage",
            render: render_persona_usage,
        },
        Section {
            id: "response_instructions",
            render: render_response_instructions,
        },
    ]
}

/// Build the instruction for the student-response call.
pub fn compile_student_prompt(ctx: &StudentPromptContext<'_>) -> Result<String, PromptError> {
    if ctx.personas.is_empty() {
        return Err(PromptError::NoPersonas);
    }
    Ok(PromptBuilder::new(student_sections()).compile(ctx))
}

/// Extra instruction for the very first student response of a session.
///
/// Student-initiated scenarios open on an empty history; teacher-initiated
/// ones once the teacher's opening line is the only entry.
pub fn first_turn_addendum(scenario: &Scenario, history_len: usize) -> Option<String> {
    let context = scenario
        .initial_prompt
        .as_deref()
        .map(|p| format!("Context: {p}"))
        .unwrap_or_default();

    match (scenario.initiated_by, history_len) {
        (Initiator::Students, 0) => Some(format!(
            "🎯 CRITICAL INSTRUCTION - FIRST MESSAGE: This is the VERY FIRST message of today's geometry lesson.

RESPONSE PATTERN FOR FIRST MESSAGE:
- START WITH 1-2 STUDENTS ONLY
- The first student introduces the problem or question
- If a second student speaks, they BUILD ON what the first one said
- Everyone else waits for the teacher's answer before joining

CONVERSATION BUILDING:
- Use phrases like: \"נכון, וגם...\", \"אני חושב שזה קשור ל...\", \"רגע, אז...\"
- Make it one flowing exchange, not separate statements

{context}

Example of a good first message:
תלמיד א': \"מורה, אמרת לנו שבמעויין האלכסונים מאונכים זה לזה.\"
תלמיד ב': \"נכון. וגם בריבוע האלכסונים מאונכים.\"

Do NOT wait for the teacher to speak first. The students open the lesson."
        )),
        (Initiator::Teacher, 1) => Some(format!(
            "🎯 FIRST RESPONSE TO TEACHER: This is the FIRST student response to the teacher's \
opening message. Students respond to what the teacher said: ask clarifying questions, share \
first thoughts or confusion, or engage with the topic the teacher introduced. {context} \
Be responsive and curious. NOT ALL STUDENTS need to respond; typically 1-2 students answer an \
opening."
        )),
        _ => None,
    }
}

/// JSON schema hint sent with the student call.
pub fn student_response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "responses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "student": {
                            "type": "string",
                            "description": "The exact name of the student speaking"
                        },
                        "message": {
                            "type": "string",
                            "description": "The student's message"
                        }
                    },
                    "required": ["student", "message"]
                }
            }
        },
        "required": ["responses"]
    })
}

fn render_format_contract(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let roster = ctx
        .personas
        .iter()
        .enumerate()
        .map(|(idx, p)| format!("{}. {}", idx + 1, p.name))
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!(
        "{RULE}
🚨 MANDATORY JSON FORMAT - NO EXCEPTIONS 🚨
{RULE}
The students in this conversation are:
{roster}

You MUST respond with valid JSON in exactly this shape:
{{\"thinking\": {{...}}, \"responses\": [{{\"student\": \"<exact name>\", \"message\": \"<what the student says>\"}}]}}

FORMAT REQUIREMENTS:
1. Each student MUST have their OWN separate object in the responses array
2. NEVER write text outside the JSON structure
3. NEVER combine students under one response object
4. Use the exact student names listed above
5. INCLUDE the \"thinking\" field with your analysis
6. \"responses\" may be an empty array when nobody has a reason to speak"
    ))
}

fn render_participation(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let mut out = String::from(
        "🎭 NATURAL CONVERSATION FLOW (CRITICAL):
- NOT ALL students must respond to every teacher message
- Students respond when they are addressed directly, have a question or confusion, want to build on what was said, or think differently
- Students stay quiet when they have nothing new to add, the teacher is clearly talking to someone else, or they are still thinking
- The number of responses can be 0, 1, 2 or more. Zero responses is a valid turn
- Responses should feel natural, not forced

Participation triggers:",
    );
    for persona in ctx.personas {
        let p = &persona.participation;
        out.push_str(&format!(
            "\n- {} (baseline={}): speaks when [{}]; avoids speaking when [{}]",
            persona.name,
            p.baseline.as_str(),
            p.speaks_when.join(", "),
            p.avoids_when.join(", ")
        ));
    }
    Some(out)
}

fn render_decision_process(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let names = ctx
        .personas
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "🧠 DECISION PROCESS (MUST INCLUDE IN OUTPUT as \"thinking\"):
Before writing responses, analyze:
STEP 1: Summarize the teacher's LATEST message briefly (\"teacher_message_summary\")
STEP 2: What question or topic is the teacher addressing? Did the teacher answer an earlier student question? (\"context_analysis\")
STEP 3: For EACH student ({names}) decide (\"who_should_respond\": [{{\"student\", \"should_respond\", \"reason\", \"confidence\"}}]):
  - Should they respond? (true/false)
  - Why or why not? Be specific
  - If they asked a question before and the teacher answered it, they acknowledge the answer instead of repeating the question
  - Confidence level (high/medium/low)
STEP 4: Write responses ONLY for students who should respond with high or medium confidence"
    ))
}

fn render_reaction_rules(_: &StudentPromptContext<'_>) -> Option<String> {
    Some(
        "⚠️ CRITICAL CONVERSATION RULES - RESPONDING TO THE TEACHER'S EXPLANATIONS:
- Students MUST react to the teacher's explanation. They cannot ignore it or repeat the same question
- The reaction is AUTHENTIC to the quality of the explanation:

  📗 The explanation was good and the student understood:
     - Show it: \"אה עכשיו הבנתי!\", \"אוקיי זה הגיוני\", \"נכון, אז...\"
     - Apply it: \"אז זה אומר שגם מלבן הוא...\", \"רגע אז אם...\"
     - Ask a DIFFERENT, DEEPER follow-up question

  📘 The explanation was unclear and the student is still confused:
     - Be honest: \"רגע, אני עדיין לא מבין\", \"אני לא בטוח שהבנתי\", \"זה עדיין לא ברור לי\"
     - Ask about a SPECIFIC PART: \"מה זה אומר ש...?\", \"למה דווקא...?\"

  📙 The student THINKS they understood but didn't:
     - Confident but wrong: \"אה, אז כל מרובע עם אלכסונים מאונכים זה מעויין!\"
     - Apply the idea incorrectly so the teacher can spot and correct it

- NEVER repeat the exact same question
- Progress naturally: question → answer → reaction → next step
- React to what the teacher JUST SAID, not to something from several turns ago"
            .to_string(),
    )
}

fn render_worked_examples(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let first = ctx.name_at(0);
    let second = ctx.name_at(1);
    let third = ctx.name_at(2);
    let topic = &ctx.scenario.text;
    let misconception = ctx
        .scenario
        .misconception_focus
        .as_deref()
        .unwrap_or("a property that holds in one direction only");

    Some(format!(
        "✅ CORRECT EXAMPLES for this lesson (topic: {topic}):

EXAMPLE 1 - the student understood the explanation:
{{
  \"thinking\": {{
    \"teacher_message_summary\": \"המורה הסביר שריבוע הוא מקרה מיוחד של מלבן\",
    \"context_analysis\": \"{first} שאל/ה האם ריבוע זה מלבן, המורה נתן הסבר טוב\",
    \"who_should_respond\": [{{\"student\": \"{first}\", \"should_respond\": true, \"reason\": \"קיבל/ה הסבר טוב, צריך/ה להראות הבנה\", \"confidence\": \"high\"}}]
  }},
  \"responses\": [{{\"student\": \"{first}\", \"message\": \"אה עכשיו הבנתי! אז כל ריבוע הוא גם מלבן כי יש לו 4 זוויות ישרות?\"}}]
}}

EXAMPLE 2 - the student is still confused after the explanation:
{{
  \"thinking\": {{
    \"teacher_message_summary\": \"המורה הסביר על אלכסונים מאונכים במעויין\",
    \"context_analysis\": \"{second} שאל/ה למה האלכסונים מאונכים, ההסבר היה מורכב\",
    \"who_should_respond\": [{{\"student\": \"{second}\", \"should_respond\": true, \"reason\": \"עדיין מבולבל/ת אחרי ההסבר\", \"confidence\": \"high\"}}]
  }},
  \"responses\": [{{\"student\": \"{second}\", \"message\": \"רגע, אני עדיין לא מבין למה דווקא במעויין האלכסונים מאונכים. מה המיוחד במעויין?\"}}]
}}

EXAMPLE 3 - the student THINKS they understood but holds the misconception ({misconception}):
{{
  \"thinking\": {{
    \"teacher_message_summary\": \"המורה הסביר שבמעויין האלכסונים מאונכים\",
    \"context_analysis\": \"{third} הקשיב/ה, אבל עלול/ה לחשוב שזה עובד גם בכיוון ההפוך\",
    \"who_should_respond\": [{{\"student\": \"{third}\", \"should_respond\": true, \"reason\": \"יכול/ה להראות תפיסה שגויה\", \"confidence\": \"medium\"}}]
  }},
  \"responses\": [{{\"student\": \"{third}\", \"message\": \"אוקיי, אז אם אני רואה מרובע שהאלכסונים שלו מאונכים, אני יודע שזה מעויין, נכון?\"}}]
}}

EXAMPLE 4 - nobody has a reason to speak:
{{\"thinking\": {{\"teacher_message_summary\": \"המורה נותן/ת לכיתה זמן לחשוב\", \"context_analysis\": \"אין שאלה פתוחה\", \"who_should_respond\": []}}, \"responses\": []}}

❌ WRONG - repeating a question the teacher already answered:
{{\"responses\": [{{\"student\": \"{first}\", \"message\": \"אבל ריבוע זה מלבן?\"}}]}}

❌ WRONG - not using JSON:
\"אוקיי, אז אם האלכסונים שווים...\""
    ))
}

fn render_scene(ctx: &StudentPromptContext<'_>) -> Option<String> {
    Some(format!(
        "{RULE}\n\n{SCENE}\n\n📚 THIS WEEK'S LESSON TOPIC (MANDATORY - students must stay on this topic):\n{}",
        ctx.scenario.text
    ))
}

fn render_lesson_context(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let scenario = ctx.scenario;
    let mut out = String::from("🎓 LESSON CONTEXT:\n");
    match scenario.initiated_by {
        Initiator::Teacher => {
            out.push_str(
                "The TEACHER is leading this lesson and has started the conversation.\n\
Students respond naturally to what the teacher says or asks. They are in 'receiving mode': \
answering questions, asking for clarification, engaging with the teacher's topic.",
            );
            if let Some(goals) = scenario.lesson_goals_text() {
                out.push_str(&format!("\n\nThe teacher's goals for this lesson are:\n{goals}"));
            }
        }
        Initiator::Students => {
            out.push_str(
                "The STUDENTS are initiating this conversation. They have questions or confusion \
about today's topic.\nWhen the conversation starts, ONE or TWO students present their question \
to the teacher. Others can join after the teacher responds. Don't have everyone speak at once.",
            );
            if let Some(prompt) = &scenario.initial_prompt {
                out.push_str(&format!("\nContext: {prompt}"));
            }
        }
    }
    Some(out)
}

fn render_misconception_lifecycle(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let focus = ctx.scenario.misconception_focus.as_deref()?;
    let mut out = format!("🎯 TARGETED MISCONCEPTION FOR THIS LESSON:\n{focus}\n\n");

    if ctx.addressed() {
        out.push_str(&format!(
            "⚠️ {MISCONCEPTION_RESOLUTION_HEADER}:
The teacher has already addressed this misconception.
- DO NOT re-introduce or repeat the misconception
- Students who held it show how their thinking changed, or name the specific part that is still unclear
- If the teacher used a counterexample or went back to the definition, students engage with that
- Move the conversation forward: a deeper question or a related case"
        ));
    } else {
        out.push_str(&format!(
            "⚠️ {MISCONCEPTION_INTRO_HEADER}:
- ONE or TWO students naturally express this misconception early in the conversation
- Choose them by their misconception tendencies
- Present it as genuine thinking, not a deliberate error, confident or unsure according to the student's personality
- Once the teacher addresses it well, students react to the explanation instead of repeating the misconception

Natural progression: misconception expressed → teacher addresses it → student reaction → conversation moves on"
        ));
    }
    Some(out)
}

fn render_target_skills(ctx: &StudentPromptContext<'_>) -> Option<String> {
    if ctx.target_skills.is_empty() {
        return None;
    }
    let listed = ctx
        .target_skills
        .iter()
        .map(|s| format!("- {} ({})", s.skill_id, s.skill_name.preferred()))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!(
        "📋 PCK SKILLS BEING ASSESSED IN THIS SCENARIO:
The students' questions and misconceptions should create opportunities for the teacher to show:
{listed}"
    ))
}

fn render_verdict_override(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let verdict = ctx.verdict?;
    let banner = "=".repeat(80);
    let mut out = format!(
        "{banner}
🎯🎯🎯 {VERDICT_OVERRIDE_HEADER} 🎯🎯🎯
{banner}
A PCK expert has analyzed the teacher's last instructional move.
⚠️ THIS ANALYSIS TAKES PRIORITY OVER THE MISCONCEPTION LIFECYCLE AND THE GENERIC REACTION RULES ABOVE!
⚠️ Student reactions MUST reflect the pedagogical quality determined by the expert!

**Overall Pedagogical Quality**: {}
**Misconception {} Addressed**: {}
**Misconception Risk Level**: {}
",
        verdict.pedagogical_quality.as_str(),
        if verdict.addressed_misconception {
            "WAS"
        } else {
            "WAS NOT"
        },
        verdict.how_addressed,
        verdict.misconception_risk.as_str(),
    );

    if !verdict.demonstrated_skills.is_empty() {
        out.push_str("\n**PCK Skills Demonstrated**:\n");
        for skill in &verdict.demonstrated_skills {
            out.push_str(&format!("- {}: {}\n", skill.skill_id, skill.evidence));
        }
    }
    if !verdict.missed_opportunities.is_empty() {
        out.push_str("\n**Missed Opportunities**:\n");
        for missed in &verdict.missed_opportunities {
            out.push_str(&format!("- {}: {}\n", missed.skill_id, missed.suggestion));
        }
    }

    let state = &verdict.predicted_student_state;
    out.push_str("\n**🚨 PREDICTED STUDENT STATE - FOLLOW THESE INSTRUCTIONS 🚨**:\n");
    out.push_str(&format!(
        "- Understanding level: {}\n",
        state.understanding_level.as_str()
    ));
    if !state.who_should_respond.is_empty() {
        out.push_str(&format!(
            "- Who should respond: {}\n",
            state.who_should_respond.join(", ")
        ));
    }
    out.push_str(&format!("- Response tone: {}\n", state.response_tone.as_str()));
    if !state.likely_reactions.is_empty() {
        out.push_str("- Likely reactions:\n");
        for reaction in &state.likely_reactions {
            out.push_str(&format!("  • {reaction}\n"));
        }
    }

    out.push_str("\n⚠️ **MANDATORY ALIGNMENT RULES** (NON-NEGOTIABLE):\n");
    match verdict.pedagogical_quality {
        PedagogicalQuality::Positive => out.push_str(&format!(
            "  → {SHOW_UNDERSTANDING_DIRECTIVE}: at least one student expresses advancing understanding
  → Use expressions like: 'אה עכשיו הבנתי!', 'אז זה אומר ש...', 'נכון, אז...'
  → Students apply or demonstrate what they learned
  → DO NOT ask the same question again
  → Move to the next idea or a deeper question\n"
        )),
        PedagogicalQuality::Problematic => out.push_str(&format!(
            "  → {PERSIST_CONFUSION_DIRECTIVE}
  → Use expressions like: 'אני עדיין לא מבין', 'רגע, אז...', 'למה?'
  → Do not pretend the explanation resolved anything\n"
        )),
        PedagogicalQuality::Neutral => out.push_str(&format!(
            "  → {PARTIAL_PROGRESS_DIRECTIVE}
  → Partial understanding with a follow-up question
  → No sudden full breakthrough\n"
        )),
    }

    out.push_str("\n**Additional Rules:**\n");
    out.push_str("- Follow the 'who_should_respond' guidance from the PCK expert\n");
    out.push_str("- Match the 'response_tone' predicted by the PCK expert\n");
    out.push_str("- Use the 'likely_reactions' as guidance for what students might say\n");
    match (state.understanding_level, verdict.pedagogical_quality) {
        (UnderstandingLevel::Improved, q) if q != PedagogicalQuality::Problematic => {
            out.push_str("- Understanding level is 'improved': show the improvement, do not repeat the confusion\n");
        }
        (UnderstandingLevel::Confused | UnderstandingLevel::MoreConfused, q)
            if q != PedagogicalQuality::Positive =>
        {
            out.push_str("- Understanding level is confused: the confusion MUST be visible\n");
        }
        _ => {}
    }
    if verdict.addressed_misconception {
        out.push_str("- The misconception was addressed: the student who held it acknowledges the clarification\n");
    }
    Some(out)
}

fn render_persistence_escalation(ctx: &StudentPromptContext<'_>) -> Option<String> {
    if !ctx.escalates() {
        return None;
    }
    Some(format!(
        "🔥 {ESCALATION_DIRECTIVE}:
The teacher's last {} moves were rated problematic and the misconception is still unresolved.
- Students MUST NOT suddenly understand this turn
- Raise the intensity of the reaction: response tone frustrated, push back on the explanation
- Use reactions like: \"אני לא בטוח שהבנתי את מה שאמרת\", \"זה לא ממש עונה על השאלה שלי\", \"רגע, איך זה קשור למה ששאלתי?\"
- Keep each student's personality; only the intensity rises",
        ctx.problematic_streak()
    ))
}

fn render_conversation_guidelines(_: &StudentPromptContext<'_>) -> Option<String> {
    Some(
        "💬 CONVERSATION BUILDING GUIDELINES:
- Students can build on each other's comments ('נכון', 'וגם', 'אז', 'רגע')
- Students can raise independent points when relevant
- Not everyone needs to speak every turn
- ALWAYS address the teacher in second person (אתה/את, אמרת, שאלת)
- NEVER refer to the teacher in third person (המורה, המורה אמרה)
- Use SIMPLE, NATURAL Hebrew like real 13-14 year old Israelis
- Keep sentences SHORT and CASUAL, no formal academic language
- Use everyday expressions: 'רגע', 'אז', 'אבל', 'אה', 'טוב', 'אוקיי', 'למה'

🚫 AVOID CONVERSATION LOOPS:
- DO NOT repeat a question the teacher already answered clearly
- DO NOT stay stuck on the same confusion after a good explanation
- Conversation progresses: question → explanation → reaction → new topic or deeper question"
            .to_string(),
    )
}

fn render_personas(ctx: &StudentPromptContext<'_>) -> Option<String> {
    let mut out = String::from(
        "👥 STUDENT PERSONAS:\nEach student has structured behavioral fields. Use them to shape responses:\n",
    );
    for persona in ctx.personas {
        out.push_str(&format!("\n{}", persona.description));
        let p = &persona.participation;
        out.push_str(&format!(
            "\n  • Participation: baseline={}, speaks_when=[{}], avoids_when=[{}]",
            p.baseline.as_str(),
            p.speaks_when.join(", "),
            p.avoids_when.join(", ")
        ));
        if !persona.reasoning_style.is_empty() {
            out.push_str(&format!(
                "\n  • Reasoning style: [{}]",
                persona.reasoning_style.join(", ")
            ));
        }
        if !persona.misconception_tendencies.is_empty() {
            out.push_str(&format!(
                "\n  • Misconception tendencies: [{}]",
                persona.misconception_tendencies.join(", ")
            ));
        }
        if let Some(update) = &persona.update_response {
            out.push_str(&format!(
                "\n  • Update response: after_good_scaffold=\"{}\", after_counterexample=\"{}\"",
                update.after_good_scaffold, update.after_counterexample
            ));
        }
        if let Some(escalation) = &persona.escalation_if_confused {
            out.push_str(&format!("\n  • Escalation if confused: {escalation}"));
        }
        out.push('\n');
    }
    Some(out.trim_end().to_string())
}

fn render_persona_usage(_: &StudentPromptContext<'_>) -> Option<String> {
    Some(
        "💡 USING PERSONA FIELDS WITH THE PCK ANALYSIS:
- Match each student's update_response to the predicted understanding level
- Improved understanding → use the student's \"after_good_scaffold\" behavior
- Growing confusion → use the student's \"escalation_if_confused\" behavior
- High misconception risk → let a student with matching misconception tendencies speak
- Respect each student's participation baseline and speaks_when/avoids_when conditions"
            .to_string(),
    )
}

fn render_response_instructions(ctx: &StudentPromptContext<'_>) -> Option<String> {
    if ctx.addendum.trim().is_empty() {
        Some(RESPONSE_INSTRUCTIONS.to_string())
    } else {
        Some(format!("{RESPONSE_INSTRUCTIONS}\n{}", ctx.addendum))
    }
}
