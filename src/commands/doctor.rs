//! `tasksync doctor` command.

use crate::config::SyncConfig;
use crate::remote::GitHubClient;

/// Execute the `doctor` command: a fast-fail connectivity self-test that
/// checks authentication, repository access, and issue access in order.
///
/// # Errors
///
/// Returns an error string when configuration is incomplete or any check
/// fails.
pub fn run() -> Result<(), String> {
    let config = SyncConfig::from_env().map_err(|err| err.to_string())?;
    let runtime = super::runtime()?;
    let client = GitHubClient::new(&config).map_err(|err| err.to_string())?;

    println!("Checking {}/{} via {}", config.owner, config.repo, config.api_base_url);
    let checks = runtime.block_on(client.check_connection());

    let mut all_passed = true;
    for check in &checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  [{status}] {}", check.name);
        if !check.passed {
            println!("         {}", check.detail);
            all_passed = false;
        }
    }

    if all_passed {
        println!("Connection OK.");
        Ok(())
    } else {
        Err("Connection check failed".to_string())
    }
}
