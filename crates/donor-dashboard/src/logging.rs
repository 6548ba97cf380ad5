use anyhow::anyhow;
use tracing::Level;

/// Installs the global fmt subscriber on stderr so stdout stays clean for
/// command output.
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .map_err(|e| anyhow!("invalid log level {level:?}: {e}"))?;
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// `-v` raises the configured level to debug, `-vv` to trace.
pub fn effective_level(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
