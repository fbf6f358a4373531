//! Worker-side client subcommands. Output is pretty-printed JSON on stdout.

use std::path::Path;

use anyhow::{Context, Result, bail};
use cadre_client::CoordinatorClient;
use cadre_core::types::{Capabilities, RegisterRequest, SuccessResponse, SyncRequest};
use cadre_settings::CadreSettings;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::Command;

pub(crate) async fn run(settings: &CadreSettings, command: Command) -> Result<()> {
    let client = cadre_client::connect(settings)
        .await
        .context("Failed to open coordinator client")?;
    debug!(mode = %client.mode(), "client ready");
    execute(client.as_ref(), command).await
}

async fn execute(client: &dyn CoordinatorClient, command: Command) -> Result<()> {
    match command {
        Command::Register {
            session_id,
            kind,
            max_tasks,
            specializations,
        } => {
            let capabilities = Capabilities {
                max_concurrent_tasks: max_tasks,
                specializations: specializations.into_iter().collect(),
            };
            let resp = client
                .register(RegisterRequest {
                    session_id: session_id.into(),
                    kind,
                    capabilities,
                })
                .await?;
            print_json(&resp)
        }
        Command::Heartbeat { session_id } => print_success(client.heartbeat(&session_id).await?),
        Command::Deregister { session_id } => print_success(client.deregister(&session_id).await?),
        Command::Claim { session_id, task_id } => {
            print_success(client.claim(&session_id, &task_id).await?)
        }
        Command::Complete {
            session_id,
            task_id,
            result,
        } => {
            let result = result.as_deref().map_or(Value::Null, parse_result);
            print_success(client.complete(&session_id, &task_id, result).await?)
        }
        Command::Assign { task_id } => print_json(&client.assign(&task_id).await?),
        Command::Task { task_id } => match client.get_task(&task_id).await? {
            Some(task) => print_json(&task),
            None => bail!("task '{task_id}' not found"),
        },
        Command::Status => print_json(&client.status().await?),
        Command::Sync { file } => {
            let req = read_sync_file(&file)?;
            client.sync(req).await?;
            print_success(true)
        }
        Command::Serve { .. } => bail!("serve is not a client command"),
    }
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_result(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

fn read_sync_file(path: &Path) -> Result<SyncRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sync file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse sync file: {}", path.display()))
}

fn print_success(success: bool) -> Result<()> {
    print_json(&SuccessResponse { success })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}
