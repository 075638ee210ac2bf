use std::io::stdin;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use learning_stylecheck::{
    Answer, AnswerStore, Error, Language, Navigator, QuestionBank, ScoreSink, Section,
    SectionLayout, SectionScores, SubmitOutcome,
};

#[derive(Parser)]
struct Args {
    /// Locale tag of the question catalog. Unknown tags fall back to English.
    #[arg(long, default_value = "en")]
    lang: String,
}

/// Navigation labels and completion messages, per language. The engine
/// never reads these; they belong to the terminal surface.
struct Messages {
    prompt: &'static str,
    invalid: &'static str,
    blocked: &'static str,
    sent: &'static str,
    send_failed: &'static str,
    already_sent: &'static str,
}

const MESSAGES_EN: Messages = Messages {
    prompt: "0-2 = answer, n = next, p = previous, l = language, s = submit, q = quit",
    invalid: "Please answer with 0, 1 or 2.",
    blocked: "Oops, looks like you haven't answered all the questions. Continuing at question",
    sent: "Well done! Scores for each section:",
    send_failed: "Your scores could not be sent. Please submit again.",
    already_sent: "Your scores were already submitted.",
};

const MESSAGES_DE: Messages = Messages {
    prompt: "0-2 = Antwort, n = weiter, p = zurück, l = Sprache, s = absenden, q = beenden",
    invalid: "Bitte mit 0, 1 oder 2 antworten.",
    blocked: "Es sind noch nicht alle Fragen beantwortet. Weiter bei Frage",
    sent: "Geschafft! Punkte je Abschnitt:",
    send_failed: "Die Punkte konnten nicht gesendet werden. Bitte erneut absenden.",
    already_sent: "Die Punkte wurden bereits übermittelt.",
};

fn messages(language: Language) -> &'static Messages {
    match language {
        Language::En => &MESSAGES_EN,
        Language::De => &MESSAGES_DE,
    }
}

/// Stands in for the transactional-email service: prints the payload it
/// would send.
struct StdoutSink;

impl ScoreSink for StdoutSink {
    fn send(&mut self, scores: &SectionScores) -> Result<(), Error> {
        let payload = serde_json::to_string(scores).map_err(|e| Error::Dispatch(e.to_string()))?;
        println!("dispatching scores: {payload}");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut language = Language::from_tag(&args.lang);
    let layout = SectionLayout::default();
    let mut store = AnswerStore::for_layout(&layout);
    let mut nav = Navigator::for_layout(&layout);
    let mut sink = StdoutSink;
    let mut buffer = String::new();

    loop {
        let bank = QuestionBank::load(language);
        let msgs = messages(language);
        let question = bank.question_at(nav.current());
        let section = bank.section_label(question.section);

        println!();
        println!("{} ({})", section.title, section.label);
        println!("{}. {}", question.index + 1, question.text);
        for option in bank.answer_options() {
            println!("  {} => {}", option.code, option.text);
        }
        println!(
            "[{}/{}] {}",
            store.answered_count(),
            store.total_questions(),
            msgs.prompt
        );

        buffer.clear();
        if stdin().read_line(&mut buffer).unwrap() == 0 {
            break;
        }
        match buffer.trim() {
            "q" => break,
            "n" => nav.next(),
            "p" => nav.prev(),
            // answers persist across the switch; only the text changes
            "l" => {
                language = match language {
                    Language::En => Language::De,
                    Language::De => Language::En,
                };
            }
            "s" => match nav.submit(&store, &layout, &mut sink) {
                SubmitOutcome::Blocked { redirect_to } => {
                    println!("{} {}.", msgs.blocked, redirect_to + 1);
                }
                SubmitOutcome::Sent { scores } => {
                    println!("{}", msgs.sent);
                    for sect in [Section::One, Section::Two, Section::Three] {
                        let label = bank.section_label(sect);
                        println!("  {} ({}): {}", label.title, label.label, scores.get(sect));
                    }
                    break;
                }
                SubmitOutcome::SendFailed { .. } => println!("{}", msgs.send_failed),
                SubmitOutcome::AlreadySent => println!("{}", msgs.already_sent),
            },
            input => match record_answer(input, nav.current(), &mut store) {
                Ok(()) => nav.next(),
                Err(_) => println!("{}", msgs.invalid),
            },
        }
    }
}

fn record_answer(value: &str, index: usize, store: &mut AnswerStore) -> Result<(), Error> {
    let code = value.parse::<u8>().map_err(|_| Error::IllegalAnswer)?;
    store.record(index, Answer::from_code(code)?);
    Ok(())
}
