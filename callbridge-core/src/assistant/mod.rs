//! The constituency assistant: grounding text, fallbacks and the text backend.
//!
//! Both the text chat and the voice session are grounded with a system
//! instruction. The text one embeds the full candidate roster; the voice one
//! is a shorter conversational brief.

pub mod conversation;
pub mod gemini;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use conversation::{ChatMessage, ChatRole, Conversation};
pub use gemini::GeminiTextClient;

/// Shown when the backend answered with no text.
pub const NO_ANSWER_REPLY: &str =
    "দুঃখিত, আমি এই মুহূর্তে উত্তর দিতে পারছি না। (Sorry, I can't answer right now.)";

/// Shown on any backend error or timeout.
pub const OFFLINE_REPLY: &str = "AI অ্যাসিস্ট্যান্ট বর্তমানে অফলাইনে আছে। অনুগ্রহ করে পরে আবার চেষ্টা করুন। (AI Assistant is currently offline. Please try again later.)";

/// First message of every transcript.
pub const GREETING: &str = "Namaste! I am your Dhaka-17 Assistant. You can text me or click the phone icon for a real-time voice call in Banglish. আপনার জিজ্ঞাসার উত্তর দিতে আমি প্রস্তুত!";

/// A candidate record as handed over by the data layer.
///
/// Unknown fields in the incoming JSON are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub party: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub manifesto: String,
    #[serde(default)]
    pub focus_issues: Vec<String>,
}

impl Candidate {
    /// One grounding line: `Name (Party): manifesto. Focuses on: a, b`.
    pub fn context_line(&self) -> String {
        format!(
            "{} ({}): {}. Focuses on: {}",
            self.name,
            self.party,
            self.manifesto,
            self.focus_issues.join(", ")
        )
    }
}

/// The two candidates the portal ships with.
pub fn default_roster() -> Vec<Candidate> {
    vec![
        Candidate {
            id: "c1".into(),
            name: "Mohammad Rahim".into(),
            party: "Bangladesh Awami League".into(),
            symbol: "Boat (Nouka)".into(),
            manifesto:
                "Leading Dhaka-17 into the Smart Bangladesh era with world-class infrastructure."
                    .into(),
            focus_issues: vec!["Smart City".into(), "Security".into(), "Connectivity".into()],
        },
        Candidate {
            id: "c2".into(),
            name: "Dr. Farhana Karim".into(),
            party: "Bangladesh Nationalist Party".into(),
            symbol: "Sheaf of Paddy (Dhaner Shish)".into(),
            manifesto: "Restoring democracy and prioritizing eco-urbanism in the heart of Dhaka."
                .into(),
            focus_issues: vec!["Democracy".into(), "Eco-Planning".into(), "Healthcare".into()],
        },
    ]
}

/// Roster lines joined by newlines.
pub fn candidates_context(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(Candidate::context_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// System instruction for the text chat, with the roster embedded.
pub fn text_system_instruction(candidates: &[Candidate]) -> String {
    format!(
        "You are the official Dhaka-17 Election Assistant.\n\
         You help Bangladeshi citizens understand the election process in the Constituency 190 (Gulshan, Banani, Baridhara, Cantonment).\n\
         \n\
         CRITICAL: You are bilingual.\n\
         - If the user asks in Bengali, reply in Bengali.\n\
         - If they use English, reply in English or \"Banglish\" (Mixing English terms with Bengali grammar).\n\
         - If the query is unclear, ask for clarification politely.\n\
         \n\
         Tone: Extremely polite (use 'Apni' for you), patriotic, and neutral.\n\
         \n\
         Candidate Context:\n\
         {}\n\
         \n\
         Common Locations: Gulshan 1, Gulshan 2, Banani, Baridhara, Baridhara DOHS, Mohakhali, Cantonment.\n\
         \n\
         If a user asks about local issues, mention that candidates are focused on Smart City initiatives and eco-urbanism.\n\
         Stay away from political bias. Always encourage people to vote! \"আপনার ভোট, আপনার শক্তি\" (Your vote, your power).",
        candidates_context(candidates)
    )
}

/// System instruction for the voice session.
pub fn voice_system_instruction() -> String {
    "You are the Dhaka-17 Election Assistant.\n\
     Constituency context: Gulshan, Banani, Baridhara, Cantonment.\n\
     Bilingual capability: Use Bengali and English mixed (Banglish).\n\
     Keep it very conversational and helpful. Speak in a friendly, professional Bangladeshi accent."
        .to_string()
}

/// One grounded request/response exchange with a text model.
pub trait TextBackend: Send + Sync + 'static {
    /// Returns the reply text, possibly empty.
    fn generate<'a>(
        &'a self,
        system_instruction: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<String>>;
}
