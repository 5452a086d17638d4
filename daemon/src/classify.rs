use crate::vocabulary::{Action, Vocabulary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedCommand {
    Create,
    Open,
    Save,
    Close,
    Literal(String),
}

/// Matches a transcript against the vocabulary.
///
/// Create and Open need an exact match so dictated sentences do not trigger
/// them; Save and Close only need to appear somewhere in the utterance.
/// Checks run in the fixed order Create, Open, Save, Close; anything else is
/// dictation.
pub fn classify(transcript: &str, vocabulary: &Vocabulary) -> ClassifiedCommand {
    let text = transcript.trim().to_lowercase();

    if text == vocabulary.phrase(Action::Create) {
        ClassifiedCommand::Create
    } else if text == vocabulary.phrase(Action::Open) {
        ClassifiedCommand::Open
    } else if text.contains(vocabulary.phrase(Action::Save)) {
        ClassifiedCommand::Save
    } else if text.contains(vocabulary.phrase(Action::Close)) {
        ClassifiedCommand::Close
    } else {
        ClassifiedCommand::Literal(text)
    }
}
