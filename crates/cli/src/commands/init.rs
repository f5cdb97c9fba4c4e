//! `codewright run --init` — write the default config and project directory.

use codewright_config::AppConfig;
use std::path::Path;

pub fn run(project_root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();

    println!("Codewright — Setup");
    println!("==================\n");

    if AppConfig::write_default(&config_path)? {
        println!("✅ Created config at: {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
    }

    let project_dir = project_root.join(".codewright");
    if project_dir.is_dir() {
        println!("  Project directory exists: {}", project_dir.display());
    } else {
        std::fs::create_dir_all(&project_dir)?;
        println!("✅ Created project directory: {}", project_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Set your API key: export OPENROUTER_API_KEY='sk-or-v1-...'");
    println!("   2. Start a session:  codewright run");
    println!("   3. Or run one task:  codewright run \"add a --json flag to the CLI\"\n");
    Ok(())
}
