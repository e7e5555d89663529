//! The note-generation task graph and the runtime seam that executes it.
//!
//! A [`Crew`] is plain data: agents, and tasks that name the earlier tasks
//! whose output they need. Executing it is the job of a [`TaskRuntime`]; the
//! library ships [`crate::pipeline::llm::LlmRuntime`], and tests plug in
//! scripted runtimes through [`crate::NotesConfigBuilder::runtime`].
//!
//! ```text
//! generate_notes ──┬──▶ search_images
//!                  └──▶ structure_content ──▶ generate_pdf
//! ```

use crate::config::Preference;
use crate::error::NotesError;
use crate::prompts::{self, Persona};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identifies a task inside the note-generation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GenerateNotes,
    SearchImages,
    StructureContent,
    GeneratePdf,
}

impl TaskKind {
    pub fn id(&self) -> &'static str {
        match self {
            TaskKind::GenerateNotes => "generate_notes",
            TaskKind::SearchImages => "search_images",
            TaskKind::StructureContent => "structure_content",
            TaskKind::GeneratePdf => "generate_pdf",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A configured role handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl From<Persona> for Agent {
    fn from(p: Persona) -> Self {
        Self {
            role: p.role.to_string(),
            goal: p.goal.to_string(),
            backstory: p.backstory.to_string(),
        }
    }
}

impl Agent {
    /// System message describing this agent to the provider.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}.\n\nYour goal: {}\n\n{}",
            self.role, self.goal, self.backstory
        )
    }
}

/// One unit of work with declared input dependencies.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub agent: Agent,
    pub description: String,
    pub expected_output: String,
    /// Tasks whose output is passed to this one as context.
    pub context: Vec<TaskKind>,
}

/// An ordered task graph plus the agents that run it.
#[derive(Debug, Clone)]
pub struct Crew {
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
}

impl Crew {
    /// Check the graph is well formed: at least one task, unique task kinds,
    /// and every dependency registered before the task that needs it.
    pub fn validate(&self) -> Result<(), NotesError> {
        if self.tasks.is_empty() {
            return Err(NotesError::InvalidCrew("crew has no tasks".into()));
        }
        let mut seen = HashSet::new();
        for task in &self.tasks {
            for dep in &task.context {
                if !seen.contains(dep) {
                    return Err(NotesError::InvalidCrew(format!(
                        "task '{}' depends on '{}', which is not registered before it",
                        task.kind, dep
                    )));
                }
            }
            if !seen.insert(task.kind) {
                return Err(NotesError::InvalidCrew(format!(
                    "task '{}' is registered twice",
                    task.kind
                )));
            }
        }
        Ok(())
    }
}

/// Build the fixed four-task note-generation crew for a topic.
pub fn note_crew(topic: &str, preference: &Preference) -> Crew {
    let writer = Agent::from(prompts::NOTE_WRITER);
    let scout = Agent::from(prompts::IMAGE_SCOUT);
    let structurer = Agent::from(prompts::CONTENT_STRUCTURER);
    let formatter = Agent::from(prompts::PDF_FORMATTER);

    let tasks = vec![
        Task {
            kind: TaskKind::GenerateNotes,
            agent: writer.clone(),
            description: prompts::generate_notes_description(topic, preference),
            expected_output: prompts::GENERATE_NOTES_OUTPUT.to_string(),
            context: vec![],
        },
        Task {
            kind: TaskKind::SearchImages,
            agent: scout.clone(),
            description: prompts::search_images_description(topic),
            expected_output: prompts::SEARCH_IMAGES_OUTPUT.to_string(),
            context: vec![TaskKind::GenerateNotes],
        },
        Task {
            kind: TaskKind::StructureContent,
            agent: structurer.clone(),
            description: prompts::STRUCTURE_CONTENT_DESCRIPTION.to_string(),
            expected_output: prompts::STRUCTURE_CONTENT_OUTPUT.to_string(),
            context: vec![TaskKind::GenerateNotes],
        },
        Task {
            kind: TaskKind::GeneratePdf,
            agent: formatter.clone(),
            description: prompts::GENERATE_PDF_DESCRIPTION.to_string(),
            expected_output: prompts::GENERATE_PDF_OUTPUT.to_string(),
            context: vec![TaskKind::StructureContent],
        },
    ];

    Crew {
        agents: vec![writer, scout, structurer, formatter],
        tasks,
    }
}

/// Output of a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task: TaskKind,
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Aggregated result of a crew run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Output of the last task in the graph.
    pub final_text: String,
    pub tasks: Vec<TaskOutput>,
}

impl CrewOutput {
    /// Assemble from per-task outputs; the final text is the last task's.
    pub fn from_tasks(tasks: Vec<TaskOutput>) -> Self {
        let final_text = tasks.last().map(|t| t.text.clone()).unwrap_or_default();
        Self { final_text, tasks }
    }
}

/// Executes a [`Crew`] and returns its aggregated text.
///
/// Implementations run tasks in registration order; any failure is fatal to
/// the run and must be reported as [`NotesError::Orchestration`].
#[async_trait]
pub trait TaskRuntime: Send + Sync {
    async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput, NotesError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_crew_has_four_tasks_in_order() {
        let crew = note_crew("docker", &Preference::Short);
        let kinds: Vec<TaskKind> = crew.tasks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TaskKind::GenerateNotes,
                TaskKind::SearchImages,
                TaskKind::StructureContent,
                TaskKind::GeneratePdf,
            ]
        );
        assert_eq!(crew.agents.len(), 4);
        crew.validate().expect("built-in crew is valid");
    }

    #[test]
    fn note_crew_dependencies() {
        let crew = note_crew("docker", &Preference::Long);
        let deps = |k: TaskKind| {
            crew.tasks
                .iter()
                .find(|t| t.kind == k)
                .map(|t| t.context.clone())
                .unwrap()
        };
        assert!(deps(TaskKind::GenerateNotes).is_empty());
        assert_eq!(deps(TaskKind::SearchImages), vec![TaskKind::GenerateNotes]);
        assert_eq!(deps(TaskKind::StructureContent), vec![TaskKind::GenerateNotes]);
        assert_eq!(deps(TaskKind::GeneratePdf), vec![TaskKind::StructureContent]);
    }

    #[test]
    fn topic_reaches_notes_and_image_tasks() {
        let crew = note_crew("Quantum tunnelling", &Preference::Short);
        assert!(crew.tasks[0].description.contains("Quantum tunnelling"));
        assert!(crew.tasks[1].description.contains("Quantum tunnelling"));
    }

    #[test]
    fn validate_rejects_forward_dependency() {
        let mut crew = note_crew("docker", &Preference::Short);
        crew.tasks.swap(0, 2);
        let err = crew.validate().unwrap_err();
        assert!(matches!(err, NotesError::InvalidCrew(_)), "got {err:?}");
    }

    #[test]
    fn validate_rejects_duplicates_and_empty() {
        let mut crew = note_crew("docker", &Preference::Short);
        let first = crew.tasks[0].clone();
        crew.tasks.push(first);
        assert!(crew.validate().is_err());

        let empty = Crew {
            agents: vec![],
            tasks: vec![],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn crew_output_takes_last_task_text() {
        let out = CrewOutput::from_tasks(vec![
            TaskOutput {
                task: TaskKind::GenerateNotes,
                text: "draft".into(),
                input_tokens: 1,
                output_tokens: 2,
                duration_ms: 3,
                attempts: 1,
            },
            TaskOutput {
                task: TaskKind::GeneratePdf,
                text: "final".into(),
                input_tokens: 1,
                output_tokens: 2,
                duration_ms: 3,
                attempts: 1,
            },
        ]);
        assert_eq!(out.final_text, "final");
    }

    #[test]
    fn agent_prompt_includes_persona() {
        let agent = Agent::from(prompts::NOTE_WRITER);
        let p = agent.system_prompt();
        assert!(p.contains(prompts::NOTE_WRITER.role));
        assert!(p.contains(prompts::NOTE_WRITER.goal));
        assert!(p.contains(prompts::NOTE_WRITER.backstory));
    }

    #[test]
    fn task_kind_ids() {
        assert_eq!(TaskKind::StructureContent.to_string(), "structure_content");
        let json = serde_json::to_string(&TaskKind::GeneratePdf).unwrap();
        assert_eq!(json, "\"generate_pdf\"");
    }
}
