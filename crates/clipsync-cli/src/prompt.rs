//! Interactive prompts for the sync resolver
//!
//! Implements the core's `DecisionProvider` on top of stdin/stdout.

use std::io::{self, Write};

use anyhow::Result;

use clipsync_core::sync::{Candidate, DecisionProvider, SyncKey};

/// Shown whenever an action token is expected
const ACTION_HELP: &str = "[i]gnore, [p]ostpone, [a]dd";

/// Decision provider backed by the terminal
#[derive(Default)]
pub struct CliDecisionProvider;

impl CliDecisionProvider {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> Result<String> {
        print!("  > ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }
}

impl DecisionProvider for CliDecisionProvider {
    fn choose_action(&mut self, key: &SyncKey) -> Result<String> {
        println!();
        println!(
            "No reference key is known for \"{}\" by \"{}\".",
            key.title, key.author
        );
        println!("Choose an action: {}", ACTION_HELP);
        self.read_line()
    }

    fn choose_candidate(&mut self, key: &SyncKey, candidates: &[Candidate]) -> Result<String> {
        println!();
        if candidates.is_empty() {
            println!("No matching items found.");
        } else {
            println!("Matching items:");
            for candidate in candidates {
                println!("  {}", candidate);
            }
        }
        println!(
            "Select the item key to pair with \"{}\" by \"{}\", or re-issue an action ({}) prefixed with '!':",
            key.title, key.author, ACTION_HELP
        );
        self.read_line()
    }
}
