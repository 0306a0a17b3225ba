//! Failure taxonomy and the localized messages shown to the user for each kind.
//!
//! Every remote-call failure is caught where it happens, logged for operators,
//! and replaced by one fixed sentence from this table. The table is read-only;
//! the locale is picked once from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote speech service an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    SpeechToText,
    TextToSpeech,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::SpeechToText => f.write_str("speech-to-text"),
            Service::TextToSpeech => f.write_str("text-to-speech"),
        }
    }
}

/// Every failure mode of the three external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionFailed { service: Service },
    TranscriptionFailed,
    GenerationFailed,
    AudioGenerationFailed,
    AudioPathInvalidShape,
    AudioPathNotFound,
    TranslationFailed,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::ConnectionFailed {
            service: Service::TextToSpeech,
        },
        ErrorKind::ConnectionFailed {
            service: Service::SpeechToText,
        },
        ErrorKind::TranscriptionFailed,
        ErrorKind::GenerationFailed,
        ErrorKind::AudioGenerationFailed,
        ErrorKind::AudioPathInvalidShape,
        ErrorKind::AudioPathNotFound,
        ErrorKind::TranslationFailed,
    ];

    /// Stable machine-readable code, used in logs and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailed {
                service: Service::TextToSpeech,
            } => "TTS_CONNECTION_FAILED",
            ErrorKind::ConnectionFailed {
                service: Service::SpeechToText,
            } => "STT_CONNECTION_FAILED",
            ErrorKind::TranscriptionFailed => "TRANSCRIPTION_FAILED",
            ErrorKind::GenerationFailed => "GENERATION_FAILED",
            ErrorKind::AudioGenerationFailed => "AUDIO_GENERATION_FAILED",
            ErrorKind::AudioPathInvalidShape => "INVALID_AUDIO_PATH",
            ErrorKind::AudioPathNotFound => "AUDIO_PATH_NOT_FOUND",
            ErrorKind::TranslationFailed => "TRANSLATION_FAILED",
        }
    }

    /// Severity the failure is surfaced with.
    ///
    /// Missing or malformed audio paths only cost the voice track, so they
    /// are warnings; everything else is an error.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::AudioPathInvalidShape | ErrorKind::AudioPathNotFound => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Language of the user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Twi,
    English,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A localized warning or error produced while running a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

/// Read-only lookup from [`ErrorKind`] to a sentence in the configured locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorCatalog {
    locale: Locale,
}

impl ErrorCatalog {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn message(&self, kind: ErrorKind) -> &'static str {
        match self.locale {
            Locale::Twi => twi(kind),
            Locale::English => english(kind),
        }
    }

    pub fn notice(&self, kind: ErrorKind) -> Notice {
        Notice {
            severity: kind.severity(),
            kind,
            code: kind.code(),
            message: self.message(kind).to_string(),
        }
    }
}

fn twi(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ConnectionFailed {
            service: Service::TextToSpeech,
        } => "Mepakyɛw, me nsa nka kasa adwinnadeɛ no mprempren. Bɔ mmɔden bio akyire yi.",
        ErrorKind::ConnectionFailed {
            service: Service::SpeechToText,
        } => "Mepakyɛw, adwinnadeɛ a ɛsesɛ nne mu no nnyɛ adwuma seesei.",
        ErrorKind::TranscriptionFailed => {
            "Mepakyɛw, mantumi ante deɛ wokaeɛ no yie. Bɔ mmɔden bio."
        }
        ErrorKind::GenerationFailed => {
            "Mepakyɛw, m'atwerɛ adwinnadeɛ no anyɛ adwuma yie. Bɔ mmɔden bio."
        }
        ErrorKind::AudioGenerationFailed => {
            "Mepakyɛw, asɛm ato me wɔ ɛnne no a mɛpagya mu. Mantumi anyɛ no yie."
        }
        ErrorKind::AudioPathInvalidShape => {
            "Kasa adwinnadeɛ no de biribi a ɛnsɛ amena me. Mantumi annye ɛnne no."
        }
        ErrorKind::AudioPathNotFound => "Me nsa kaa kwan no deɛ, nanso ɛnne no nni hɔ. Mepakyɛw.",
        ErrorKind::TranslationFailed => "Mepakyɛw, menntumi nkyerɛ aseɛ.",
    }
}

fn english(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ConnectionFailed {
            service: Service::TextToSpeech,
        } => "Sorry, I cannot reach the speech tool right now. Please try again later.",
        ErrorKind::ConnectionFailed {
            service: Service::SpeechToText,
        } => "Sorry, the tool that understands your voice is not working at the moment.",
        ErrorKind::TranscriptionFailed => {
            "Sorry, I could not hear what you said clearly. Please try again."
        }
        ErrorKind::GenerationFailed => "Sorry, my writing tool did not work properly. Please try again.",
        ErrorKind::AudioGenerationFailed => {
            "Sorry, something went wrong while producing the voice. I could not finish it."
        }
        ErrorKind::AudioPathInvalidShape => {
            "The speech tool sent back something unexpected. I could not get the voice."
        }
        ErrorKind::AudioPathNotFound => "I received the audio location, but the voice file is missing. Sorry.",
        ErrorKind::TranslationFailed => "Sorry, I could not translate this.",
    }
}
