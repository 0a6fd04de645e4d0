//! CLI entrypoint wiring
//!
//! Parses arguments, builds the execution context and dispatches to the
//! command handlers. Embedders can skip the parser and call
//! [`execute_command_with_context`] with a pre-built command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{parse_cli_args, usage_text, version_text, CliCommand};
use crate::command_handlers::{
    handle_devices, handle_identify, handle_reclassify, handle_scan, handle_status,
    handle_update_vendors,
};
use crate::storage::SqliteStorage;

pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Execution context for command dispatch.
///
/// Handlers read the database path from here and write human-readable
/// output through the output hook, so embedders and tests can redirect
/// both.
#[derive(Clone)]
pub struct AppContext {
    db_path: PathBuf,
    output_hook: OutputHook,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppContext {
    pub fn from_env() -> Self {
        Self {
            db_path: SqliteStorage::default_path(),
            output_hook: Arc::new(|line| println!("{}", line)),
        }
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn with_output_hook(mut self, output_hook: OutputHook) -> Self {
        self.output_hook = output_hook;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn emit_line(&self, line: &str) {
        (self.output_hook)(line);
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parsed = parse_cli_args(args)?;
    let mut context = AppContext::from_env();
    if let Some(path) = parsed.db_path {
        context = context.with_db_path(path);
    }
    execute_command_with_context(parsed.command, &context).await
}

/// Execute a pre-parsed command with an explicit execution context.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    match command {
        CliCommand::Help => {
            context.emit_line(&usage_text());
            Ok(())
        }
        CliCommand::Version => {
            context.emit_line(&version_text());
            Ok(())
        }
        CliCommand::Status => handle_status(context).await,
        CliCommand::Scan { cidr } => handle_scan(&cidr, context).await,
        CliCommand::Devices {
            identified,
            vendor,
            min_score,
        } => handle_devices(identified, vendor.as_deref(), min_score, context).await,
        CliCommand::Identify { target } => handle_identify(&target, context).await,
        CliCommand::Reclassify => handle_reclassify(context).await,
        CliCommand::UpdateVendors => handle_update_vendors(context).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{execute_command_with_context, AppContext, OutputHook};
    use crate::cli::CliCommand;

    fn capture_context() -> (AppContext, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let hook: OutputHook = Arc::new(move |line| {
            sink.lock()
                .expect("output lock should not be poisoned")
                .push(line.to_string());
        });
        (AppContext::from_env().with_output_hook(hook), lines)
    }

    #[tokio::test]
    async fn help_command_writes_usage_to_output_hook() {
        let (context, lines) = capture_context();

        execute_command_with_context(CliCommand::Help, &context)
            .await
            .expect("help command should succeed");

        let output = lines
            .lock()
            .expect("output lock should not be poisoned")
            .join("\n");
        assert!(output.contains("Usage:"));
        assert!(output.contains("fleetmon scan --cidr"));
    }

    #[tokio::test]
    async fn version_command_reports_package_version() {
        let (context, lines) = capture_context();

        execute_command_with_context(CliCommand::Version, &context)
            .await
            .expect("version command should succeed");

        let output = lines
            .lock()
            .expect("output lock should not be poisoned")
            .join("\n");
        assert!(output.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn context_db_path_override_sticks() {
        let context = AppContext::from_env().with_db_path("/tmp/fleetmon-test.db".into());
        assert_eq!(
            context.db_path(),
            std::path::Path::new("/tmp/fleetmon-test.db")
        );
    }
}
