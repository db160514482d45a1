//! Bounded, ordered step history used as planner context.
//!
//! Entries append in strict step order. When the rendering would exceed the
//! character budget, whole oldest entries are evicted into a compressed
//! prefix line each, so chronology stays contiguous: a summarized prefix
//! followed by full recent entries, nothing missing from the middle.

use tracing::debug;

use super::types::HistoryEntry;

#[derive(Debug, Clone)]
pub struct HistoryManager {
    budget: usize,
    compressed: Vec<String>,
    entries: Vec<HistoryEntry>,
}

impl HistoryManager {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            compressed: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Append one completed step and re-establish the budget.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        self.enforce_budget();
    }

    /// Full entries still retained (the contiguous suffix).
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.compressed.is_empty() && self.entries.is_empty()
    }

    /// Rendering used verbatim in planner prompts.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        if !self.compressed.is_empty() {
            sections.push(format!("(compressed)\n{}", self.compressed.join("\n")));
        }
        sections.extend(self.entries.iter().map(HistoryEntry::render));
        sections.join("\n")
    }

    pub fn rendered_len(&self) -> usize {
        self.render().chars().count()
    }

    fn enforce_budget(&mut self) {
        // Always keep the newest entry in full, whatever the budget.
        while self.rendered_len() > self.budget && self.entries.len() > 1 {
            let evicted = self.entries.remove(0);
            debug!(
                target: "agent-core",
                step = evicted.step,
                "history entry compressed"
            );
            self.compressed.push(evicted.compressed());
        }
        // The compressed prefix itself cannot grow without bound: collapse it
        // into a single span line when it dominates the budget.
        if self.compressed.len() > 1 && self.rendered_len() > self.budget {
            let first_step = leading_step(&self.compressed[0]);
            let last_step = leading_step(self.compressed.last().unwrap());
            self.compressed = vec![format!(
                "steps {first_step}-{last_step}: {} earlier actions elided",
                self.compressed.len()
            )];
        }
    }
}

fn leading_step(line: &str) -> String {
    line.chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect()
}
