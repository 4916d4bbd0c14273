#[cfg(not(unix))]
compile_error!("Only unix targets are currently supported");

use std::path::PathBuf;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let config_content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let courier: courier::Courier = ron::from_str(&config_content)
        .with_context(|| format!("Invalid config in {}", config_path.display()))?;

    courier.run().await
}

/// Find the configuration file using the following precedence:
/// 1. `COURIER_CONFIG` environment variable
/// 2. ./courier.config.ron (current working directory)
/// 3. /etc/courier/courier.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("COURIER_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "COURIER_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./courier.config.ron"),
        PathBuf::from("/etc/courier/courier.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - COURIER_CONFIG environment variable\n{paths_tried}"
    )
}
