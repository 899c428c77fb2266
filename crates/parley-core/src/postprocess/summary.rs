//! Human-readable call summary

use std::fmt;
use std::time::Duration;

/// Whether a second-opinion review of the result is still outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpertValidation {
    Pending,
    Complete,
    Disabled,
}

impl fmt::Display for ExpertValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpertValidation::Pending => write!(f, "pending"),
            ExpertValidation::Complete => write!(f, "complete"),
            ExpertValidation::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSummary {
    pub tool_name: String,
    pub status: String,
    pub steps: u32,
    pub duration: Duration,
    pub model: Option<String>,
    pub approx_tokens: u64,
    pub continuation_id: Option<String>,
    pub expert_validation: ExpertValidation,
    pub progress: Vec<String>,
}

impl CallSummary {
    /// One-line form kept in the session cache
    pub fn short(&self) -> String {
        format!(
            "{} {} after {} step(s) on {}",
            self.tool_name,
            self.status,
            self.steps,
            self.model.as_deref().unwrap_or("no model")
        )
    }
}

impl fmt::Display for CallSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} summary ---", self.tool_name)?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Steps completed: {}", self.steps)?;
        writeln!(f, "Duration: {:.1}s", self.duration.as_secs_f64())?;
        if let Some(model) = &self.model {
            writeln!(f, "Model: {}", model)?;
        }
        writeln!(f, "Approx. tokens: ~{}", self.approx_tokens)?;
        if let Some(id) = &self.continuation_id {
            writeln!(f, "Continuation id: {}", id)?;
        }
        write!(f, "Expert validation: {}", self.expert_validation)?;
        if !self.progress.is_empty() {
            write!(f, "\nProgress:")?;
            for line in &self.progress {
                write!(f, "\n  - {}", line)?;
            }
        }
        Ok(())
    }
}
