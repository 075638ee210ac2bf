use std::io::Read;
use std::ops::Range;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static CATALOG_EN: Lazy<QuestionBank> = Lazy::new(|| {
    let f = std::fs::File::open("resources/questions_en.json").unwrap();
    let reader = std::io::BufReader::new(f);
    let catalog: Catalog = serde_json::from_reader(reader).unwrap();
    QuestionBank::from_catalog(Language::En, catalog, &SectionLayout::default())
});

static CATALOG_DE: Lazy<QuestionBank> = Lazy::new(|| {
    let f = std::fs::File::open("resources/questions_de.json").unwrap();
    let reader = std::io::BufReader::new(f);
    let catalog: Catalog = serde_json::from_reader(reader).unwrap();
    QuestionBank::from_catalog(Language::De, catalog, &SectionLayout::default())
});

/// Locale of the active question catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    De,
}

impl Language {
    /// Resolve a locale tag. Unrecognized tags fall back to English
    /// instead of failing, so a bad `--lang` still yields a usable bank.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "de" | "ge" | "deu" | "german" => Language::De,
            _ => Language::En,
        }
    }
}

/// One of the three fixed question groupings of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    One,
    Two,
    Three,
}

/// The section partition as data: ordered `(section, index range)` spans.
///
/// The stock instrument is 30 questions split 10/10/10, but scoring only
/// ever consults the spans, so a test layout can take any shape.
#[derive(Debug, Clone)]
pub struct SectionLayout {
    spans: Vec<(Section, Range<usize>)>,
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self::new(vec![
            (Section::One, 0..10),
            (Section::Two, 10..20),
            (Section::Three, 20..30),
        ])
    }
}

impl SectionLayout {
    pub fn new(spans: Vec<(Section, Range<usize>)>) -> Self {
        Self { spans }
    }

    pub fn total_questions(&self) -> usize {
        self.spans.iter().map(|(_, span)| span.end).max().unwrap_or(0)
    }

    /// Section owning the given question index.
    ///
    /// Indices are only ever produced by iterating a bank of the same
    /// layout, so an index outside every span is a caller defect.
    pub fn section_of(&self, index: usize) -> Section {
        self.spans
            .iter()
            .find(|(_, span)| span.contains(&index))
            .map(|(section, _)| *section)
            .unwrap_or_else(|| panic!("question index {index} is outside the section layout"))
    }
}

/// The ordinal choice recorded per question, with its fixed point weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Never,
    Sometimes,
    Often,
}

impl Answer {
    /// Parse the wire/UI code. Anything outside 0..=2 is rejected.
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Answer::Never),
            1 => Ok(Answer::Sometimes),
            2 => Ok(Answer::Often),
            _ => Err(Error::IllegalAnswer),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Answer::Never => 0,
            Answer::Sometimes => 1,
            Answer::Often => 2,
        }
    }

    /// Point weight of the choice. An invariant of the instrument, not
    /// configurable per question.
    pub fn weight(self) -> u32 {
        match self {
            Answer::Never => 1,
            Answer::Sometimes => 2,
            Answer::Often => 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerOption {
    pub code: u8,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionBlock {
    pub title: String,
    pub label: String,
    pub questions: Vec<String>,
}

/// Raw shape of a `resources/questions_*.json` catalog.
#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub answers: Vec<AnswerOption>,
    pub sections: Vec<SectionBlock>,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub index: usize,
    pub text: String,
    pub section: Section,
}

#[derive(Debug, Clone)]
pub struct SectionLabel {
    pub section: Section,
    pub title: String,
    pub label: String,
}

/// Immutable, language-tagged master of the 30 questions.
#[derive(Debug)]
pub struct QuestionBank {
    language: Language,
    answer_options: Vec<AnswerOption>,
    section_labels: Vec<SectionLabel>,
    questions: Vec<Question>,
}

impl QuestionBank {
    /// The bank for a language. Both catalogs flatten to the same
    /// 30-question layout; only the text differs between them.
    pub fn load(language: Language) -> &'static QuestionBank {
        match language {
            Language::En => &CATALOG_EN,
            Language::De => &CATALOG_DE,
        }
    }

    fn from_catalog(language: Language, catalog: Catalog, layout: &SectionLayout) -> Self {
        assert_eq!(
            catalog.sections.len(),
            layout.spans.len(),
            "catalog section blocks must match the layout"
        );
        let mut section_labels = Vec::with_capacity(catalog.sections.len());
        let mut questions = Vec::new();
        for (block, (section, _)) in catalog.sections.into_iter().zip(&layout.spans) {
            section_labels.push(SectionLabel {
                section: *section,
                title: block.title,
                label: block.label,
            });
            for text in block.questions {
                let index = questions.len();
                questions.push(Question {
                    index,
                    text,
                    section: layout.section_of(index),
                });
            }
        }
        assert_eq!(
            questions.len(),
            layout.total_questions(),
            "catalog question count must match the layout"
        );
        Self {
            language,
            answer_options: catalog.answers,
            section_labels,
            questions,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at the given index. Out of range is a caller defect.
    pub fn question_at(&self, index: usize) -> &Question {
        &self.questions[index]
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answer_options(&self) -> &[AnswerOption] {
        &self.answer_options
    }

    pub fn section_label(&self, section: Section) -> &SectionLabel {
        self.section_labels
            .iter()
            .find(|entry| entry.section == section)
            .expect("every section of the layout carries a label")
    }
}

/// One session's answers, one optional slot per question index.
///
/// The single source of truth for progress. Slots start unanswered and
/// are only ever overwritten in place; the store never grows, shrinks
/// or reorders.
#[derive(Debug, Clone)]
pub struct AnswerStore {
    slots: Vec<Option<Answer>>,
}

impl AnswerStore {
    pub fn new(total_questions: usize) -> Self {
        Self {
            slots: vec![None; total_questions],
        }
    }

    pub fn for_layout(layout: &SectionLayout) -> Self {
        Self::new(layout.total_questions())
    }

    pub fn total_questions(&self) -> usize {
        self.slots.len()
    }

    /// Record the choice for a question. Last write wins; answering the
    /// same question again replaces the prior choice, never accumulates.
    pub fn record(&mut self, index: usize, answer: Answer) {
        assert!(
            index < self.slots.len(),
            "question index {index} out of range for a {}-question store",
            self.slots.len()
        );
        self.slots[index] = Some(answer);
    }

    pub fn answer_at(&self, index: usize) -> Option<Answer> {
        self.slots[index]
    }

    pub fn answered_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Lowest unanswered index, or `None` once complete. The ascending
    /// order is user-visible: it decides which question a blocked
    /// submission redirects to.
    pub fn first_unanswered(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn is_complete(&self) -> bool {
        self.answered_count() == self.slots.len()
    }

    /// Clear every slot for a fresh session.
    pub fn reset(&mut self) {
        self.slots.fill(None);
    }

    /// Per-section sums of answer weights (never 1pt, sometimes 2pt,
    /// often 3pt). Unanswered questions contribute nothing, so the sums
    /// are meaningful mid-session too.
    ///
    /// Recomputed from the slots on every call; the store can mutate
    /// between calls and there is no cache to go stale.
    pub fn section_scores(&self, layout: &SectionLayout) -> SectionScores {
        let mut scores = SectionScores::default();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(answer) = slot {
                *scores.entry(layout.section_of(index)) += answer.weight();
            }
        }
        scores
    }

    pub fn can_submit(&self) -> bool {
        self.is_complete()
    }

    /// The single decision point in front of score dispatch. An
    /// incomplete store yields a navigation instruction back to the
    /// first gap, never an error and never a dispatch.
    pub fn resolve_submit(&self, layout: &SectionLayout) -> SubmitIntent {
        match self.first_unanswered() {
            Some(index) => SubmitIntent::Blocked { redirect_to: index },
            None => SubmitIntent::Allowed {
                scores: self.section_scores(layout),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SectionScores {
    pub section_one: u32,
    pub section_two: u32,
    pub section_three: u32,
}

impl SectionScores {
    pub fn get(&self, section: Section) -> u32 {
        match section {
            Section::One => self.section_one,
            Section::Two => self.section_two,
            Section::Three => self.section_three,
        }
    }

    fn entry(&mut self, section: Section) -> &mut u32 {
        match section {
            Section::One => &mut self.section_one,
            Section::Two => &mut self.section_two,
            Section::Three => &mut self.section_three,
        }
    }

    pub fn as_triple(self) -> (u32, u32, u32) {
        (self.section_one, self.section_two, self.section_three)
    }

    pub fn total(self) -> u32 {
        self.section_one + self.section_two + self.section_three
    }
}

/// Outcome of asking whether submission may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitIntent {
    Blocked { redirect_to: usize },
    Allowed { scores: SectionScores },
}

/// Outcome of driving a submission through the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Blocked { redirect_to: usize },
    Sent { scores: SectionScores },
    SendFailed { scores: SectionScores },
    AlreadySent,
}

/// Receiver for computed section scores. The real transport (a
/// transactional-email service) lives behind this seam.
pub trait ScoreSink {
    fn send(&mut self, scores: &SectionScores) -> Result<(), Error>;
}

/// Cursor over the questions plus the submission state machine.
///
/// Display position only: moving the cursor never touches answers, and
/// recording an answer never moves the cursor.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: usize,
    total: usize,
    acknowledged: bool,
}

impl Navigator {
    pub fn new(total_questions: usize) -> Self {
        assert!(
            total_questions > 0,
            "a questionnaire needs at least one question"
        );
        Self {
            current: 0,
            total: total_questions,
            acknowledged: false,
        }
    }

    pub fn for_layout(layout: &SectionLayout) -> Self {
        Self::new(layout.total_questions())
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// True once a dispatch has been accepted by the sink.
    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn next(&mut self) {
        if self.current + 1 < self.total {
            self.current += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.current > 0 {
            self.current -= 1;
        }
    }

    /// Move straight to a question. Out of range is a caller defect,
    /// never clamped.
    pub fn jump_to(&mut self, index: usize) {
        assert!(
            index < self.total,
            "question index {index} out of range for a {}-question session",
            self.total
        );
        self.current = index;
    }

    /// Apply the completion gate and, when it allows, forward the scores
    /// to the sink. A blocked attempt jumps the cursor to the first gap.
    /// Scores go out at most once per session: after an acknowledged
    /// send, further calls return [`SubmitOutcome::AlreadySent`] without
    /// reaching the sink. A failed send leaves the flag unset so the
    /// user may retry manually; nothing is retried automatically and
    /// the computed scores stay valid either way.
    pub fn submit(
        &mut self,
        store: &AnswerStore,
        layout: &SectionLayout,
        sink: &mut dyn ScoreSink,
    ) -> SubmitOutcome {
        if self.acknowledged {
            return SubmitOutcome::AlreadySent;
        }
        match store.resolve_submit(layout) {
            SubmitIntent::Blocked { redirect_to } => {
                tracing::debug!(redirect_to, "submission blocked, answers missing");
                self.jump_to(redirect_to);
                SubmitOutcome::Blocked { redirect_to }
            }
            SubmitIntent::Allowed { scores } => match sink.send(&scores) {
                Ok(()) => {
                    self.acknowledged = true;
                    tracing::info!(
                        section_one = scores.section_one,
                        section_two = scores.section_two,
                        section_three = scores.section_three,
                        "section scores dispatched"
                    );
                    SubmitOutcome::Sent { scores }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "score dispatch failed");
                    SubmitOutcome::SendFailed { scores }
                }
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("answer code must be 0, 1 or 2")]
    IllegalAnswer,
    #[error("row {row}: expected {expected} fields, got {got}")]
    MalformedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("score dispatch failed: {0}")]
    Dispatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Parse a headerless CSV of prerecorded sessions, one row per
/// respondent: `id, code0, ..., code29`. An empty code field leaves that
/// question unanswered, so partially filled sessions survive the round
/// trip. Faults are reported per row, not for the whole batch.
pub fn read_bulk<R: Read>(reader: R) -> impl Iterator<Item = Result<(String, AnswerStore), Error>> {
    let layout = SectionLayout::default();
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_records()
        .enumerate()
        .map(move |(row, record)| parse_row(row + 1, &record?, &layout))
}

fn parse_row(
    row: usize,
    record: &csv::StringRecord,
    layout: &SectionLayout,
) -> Result<(String, AnswerStore), Error> {
    let total = layout.total_questions();
    if record.len() != total + 1 {
        return Err(Error::MalformedRow {
            row,
            expected: total + 1,
            got: record.len(),
        });
    }
    let id = record[0].to_string();
    let mut store = AnswerStore::for_layout(layout);
    for (index, field) in record.iter().skip(1).enumerate() {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let code = field.parse::<u8>().map_err(|_| Error::IllegalAnswer)?;
        store.record(index, Answer::from_code(code)?);
    }
    Ok((id, store))
}
