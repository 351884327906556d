//! Instruction documents for the student, grader and summary calls.
//!
//! Each document is an ordered list of [`Section`]s rendered against a
//! context value. A section that renders `None` is left out entirely.

mod grader;
mod student;
mod summary;

pub use grader::{compile_grader_prompt, grader_sections, GraderPromptContext};
pub use student::{
    compile_student_prompt, first_turn_addendum, student_response_schema, student_sections,
    StudentPromptContext, ESCALATION_DIRECTIVE, MISCONCEPTION_INTRO_HEADER,
    MISCONCEPTION_RESOLUTION_HEADER, PARTIAL_PROGRESS_DIRECTIVE, PERSIST_CONFUSION_DIRECTIVE,
    SHOW_UNDERSTANDING_DIRECTIVE, VERDICT_OVERRIDE_HEADER,
};
pub use summary::compile_summary_prompt;

use pcksim_schema::{Message, PckVerdict, Role};

/// Label used for the teacher in Hebrew transcripts.
pub(crate) const TEACHER_LABEL_HE: &str = "מורה";

/// One named block of an instruction document.
pub struct Section<C: ?Sized> {
    pub id: &'static str,
    pub render: fn(&C) -> Option<String>,
}

impl<C: ?Sized> Clone for Section<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for Section<C> {}

/// Ordered sections, composed deterministically.
pub struct PromptBuilder<C: ?Sized> {
    sections: Vec<Section<C>>,
}

impl<C: ?Sized> PromptBuilder<C> {
    pub fn new(sections: Vec<Section<C>>) -> Self {
        Self { sections }
    }

    pub fn section_ids(&self) -> Vec<&'static str> {
        self.sections.iter().map(|s| s.id).collect()
    }

    /// Render a single section by id.
    pub fn render_section(&self, id: &str, ctx: &C) -> Option<String> {
        self.sections
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| (s.render)(ctx))
    }

    /// Ids of the sections that produce output for `ctx`, in order.
    pub fn active_sections(&self, ctx: &C) -> Vec<&'static str> {
        self.sections
            .iter()
            .filter(|s| (s.render)(ctx).is_some())
            .map(|s| s.id)
            .collect()
    }

    pub fn compile(&self, ctx: &C) -> String {
        let parts: Vec<String> = self
            .sections
            .iter()
            .filter_map(|s| (s.render)(ctx))
            .filter(|text| !text.trim().is_empty())
            .collect();
        parts.join("\n\n")
    }
}

/// Number of problematic verdicts at the end of `verdicts`.
pub fn trailing_problematic<'a, I>(verdicts: I) -> usize
where
    I: IntoIterator<Item = &'a PckVerdict>,
    I::IntoIter: DoubleEndedIterator,
{
    verdicts
        .into_iter()
        .rev()
        .take_while(|v| v.is_problematic())
        .count()
}

/// `מורה: …` / `<name>: …` lines. System messages are not part of the transcript.
pub(crate) fn hebrew_transcript(history: &[Message]) -> String {
    history
        .iter()
        .filter_map(|m| match m.role() {
            Role::Teacher => Some(format!("{TEACHER_LABEL_HE}: {}", m.text())),
            Role::Student => Some(format!("{}: {}", m.speaker_id(), m.text())),
            Role::System => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcksim_schema::PedagogicalQuality;

    struct Ctx {
        flag: bool,
    }

    const SECTIONS: &[Section<Ctx>] = &[
        Section {
            id: "first",
            render: |_| Some("A".into()),
        },
        Section {
            id: "optional",
            render: |c| c.flag.then(|| "B".into()),
        },
        Section {
            id: "blank",
            render: |_| Some("   ".into()),
        },
        Section {
            id: "last",
            render: |_| Some("C".into()),
        },
    ];

    #[test]
    fn builder_skips_absent_and_blank_sections() {
        let builder = PromptBuilder::new(SECTIONS.to_vec());
        assert_eq!(builder.compile(&Ctx { flag: false }), "A\n\nC");
        assert_eq!(builder.compile(&Ctx { flag: true }), "A\n\nB\n\nC");
        assert_eq!(
            builder.active_sections(&Ctx { flag: false }),
            vec!["first", "blank", "last"]
        );
        assert_eq!(builder.render_section("optional", &Ctx { flag: false }), None);
        assert_eq!(builder.section_ids().len(), 4);
    }

    fn verdict(quality: PedagogicalQuality) -> PckVerdict {
        PckVerdict {
            pedagogical_quality: quality,
            ..PckVerdict::default()
        }
    }

    #[test]
    fn trailing_problematic_counts_only_the_tail() {
        let window = vec![
            verdict(PedagogicalQuality::Problematic),
            verdict(PedagogicalQuality::Positive),
            verdict(PedagogicalQuality::Problematic),
            verdict(PedagogicalQuality::Problematic),
        ];
        assert_eq!(trailing_problematic(&window), 2);
        assert_eq!(trailing_problematic(&window[..2]), 0);
        assert_eq!(trailing_problematic(&Vec::<PckVerdict>::new()), 0);
    }

    #[test]
    fn transcript_uses_hebrew_teacher_label() {
        let history = vec![
            Message::teacher("שלום"),
            Message::system("hidden"),
            Message::student("Sheila", "היי"),
        ];
        assert_eq!(hebrew_transcript(&history), "מורה: שלום\nSheila: היי");
    }
}
