//! Agent personas and task templates for the note-generation crew.
//!
//! Every prompt lives here so the wording can change without touching the
//! runtime's retry or error handling. The runtime sends each agent's persona
//! as the system message and the task description (plus the outputs of the
//! tasks it depends on) as the user message.

use crate::config::Preference;

/// Role, goal and backstory of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

pub const NOTE_WRITER: Persona = Persona {
    role: "Study Notes Writer",
    goal: "Write accurate, well-organised study notes that a student can learn from",
    backstory: "You are an experienced teacher who condenses any subject into clear \
notes: definitions first, then key ideas, then examples and common pitfalls.",
};

pub const IMAGE_SCOUT: Persona = Persona {
    role: "Illustration Researcher",
    goal: "Pick the single image that best illustrates a set of study notes",
    backstory: "You are a picture editor for textbooks. You know which diagrams and \
photos help students remember a topic and how to find them with a web image search.",
};

pub const CONTENT_STRUCTURER: Persona = Persona {
    role: "Content Structurer",
    goal: "Reorganise raw notes into a logical sequence of short sections",
    backstory: "You are an instructional designer. You reorder material so every \
section builds on the previous one, and you remove repetition.",
};

pub const PDF_FORMATTER: Persona = Persona {
    role: "Document Formatter",
    goal: "Produce the final plain-text body of a printable notes document",
    backstory: "You prepare manuscripts for print. You know the typesetter only \
understands plain paragraphs separated by blank lines.",
};

/// Length guidance matching the user's preference.
fn length_guidance(preference: &Preference) -> String {
    match preference {
        Preference::Short => "Keep the notes short: about one page, only the essentials.".into(),
        Preference::Long => {
            "Make the notes long and thorough: several pages covering every important aspect."
                .into()
        }
        Preference::Other(p) => format!("The reader asked for this length: \"{p}\"."),
    }
}

pub fn generate_notes_description(topic: &str, preference: &Preference) -> String {
    format!(
        "Write study notes on the topic \"{topic}\".\n\
         {guidance}\n\
         Cover the definition, the core concepts, how they relate, and a worked example.",
        guidance = length_guidance(preference)
    )
}

pub const GENERATE_NOTES_OUTPUT: &str =
    "Complete study notes on the topic, written as prose paragraphs and short lists.";

pub fn search_images_description(topic: &str) -> String {
    format!(
        "Using the study notes provided as context, describe the one image that would best \
         illustrate \"{topic}\" and give the exact web image search query to find it."
    )
}

pub const SEARCH_IMAGES_OUTPUT: &str =
    "One sentence describing the image, followed by a line `Query: <search query>`.";

pub const STRUCTURE_CONTENT_DESCRIPTION: &str = "Restructure the study notes provided as \
context into a logical order of sections. Give each section a short title line. Merge \
duplicated points and keep every fact.";

pub const STRUCTURE_CONTENT_OUTPUT: &str = "The same notes, reorganised into titled sections.";

pub const GENERATE_PDF_DESCRIPTION: &str = "Turn the structured notes provided as context \
into the final body text of a printable document. Use plain text only: no Markdown \
syntax, no tables, no code fences. Separate every paragraph and every section title \
with one blank line.";

pub const GENERATE_PDF_OUTPUT: &str =
    "Plain-text document body, paragraphs separated by blank lines.";

/// Wrap a dependency's output as context for a downstream task.
pub fn context_block(task_id: &str, output: &str) -> String {
    format!("Context from task `{task_id}`:\n\"\"\"\n{output}\n\"\"\"")
}
