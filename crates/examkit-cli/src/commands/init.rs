//! The `examkit init` command.

use std::path::Path;

use anyhow::Result;

use examkit_store::default_config_toml;

pub fn execute() -> Result<()> {
    if Path::new("examkit.toml").exists() {
        println!("examkit.toml already exists, skipping.");
    } else {
        std::fs::write("examkit.toml", default_config_toml())?;
        println!("Created examkit.toml");
    }

    std::fs::create_dir_all("assessments")?;
    let example_path = Path::new("assessments/example.toml");
    if example_path.exists() {
        println!("assessments/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_ASSESSMENT)?;
        println!("Created assessments/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: examkit validate --assessment assessments/example.toml");
    println!("  2. Run: examkit import");
    println!("  3. Run: examkit take --assessment-id 1 --student 1");

    Ok(())
}

const EXAMPLE_ASSESSMENT: &str = r#"[assessment]
id = 1
title = "Example Quiz"
description = "A short quiz to get started"
duration_secs = 90
status = "published"

[[questions]]
id = 1
text = "What is the capital of France?"
kind = "multiple_choice"
points = 2
options = ["Paris", "London", "Rome"]
answer = "A"

[[questions]]
id = 2
text = "Which city is the capital of Italy?"
kind = "multiple_choice"
points = 2
options = ["Paris", "London", "Rome"]
answer = "Rome"

[[questions]]
id = 3
text = "In one or two sentences, why do capitals often sit on rivers?"
kind = "free_text"
points = 5
"#;
