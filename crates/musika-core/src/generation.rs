//! Argument template for the generation workload.

use serde::{Deserialize, Serialize};

use crate::domain::Trigger;

/// Samples generated per episode.
pub const NUM_SAMPLES: u32 = 1;

/// How the workload is invoked inside the environment.
///
/// The command is always built as an argument vector; parameters are never
/// spliced into a shell string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTemplate {
    /// Interpreter and script, e.g. `["python", "musika_generate.py"]`.
    pub program: Vec<String>,
    /// Output directory as seen from inside the environment.
    pub save_path: String,
    pub mixed_precision: bool,
}

impl Default for GenerationTemplate {
    fn default() -> Self {
        GenerationTemplate {
            program: vec!["python".to_string(), "musika_generate.py".to_string()],
            save_path: "/output".to_string(),
            mixed_precision: false,
        }
    }
}

impl GenerationTemplate {
    pub fn with_save_path(mut self, save_path: impl Into<String>) -> Self {
        self.save_path = save_path.into();
        self
    }

    pub fn build_argv(&self, load_path: &str, trigger: &Trigger) -> Vec<String> {
        let mut argv = self.program.clone();
        argv.extend([
            "--load_path".to_string(),
            load_path.to_string(),
            "--num_samples".to_string(),
            NUM_SAMPLES.to_string(),
            "--seconds".to_string(),
            trigger.duration_seconds.to_string(),
            "--truncation".to_string(),
            trigger.truncation.to_string(),
            "--save_path".to_string(),
            self.save_path.clone(),
            "--mixed_precision".to_string(),
            // The script parses Python literals.
            if self.mixed_precision { "True" } else { "False" }.to_string(),
        ]);
        argv
    }
}
