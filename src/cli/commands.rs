use super::{parse_assignment, Cli, Commands, ConfigAction, ConnectorAction};
use crate::agent::{AgentForm, ApiSubmit, FormMode};
use crate::api::ApiClient;
use crate::config::{read_config_file_snapshot, validate_config, Config};
use crate::editor::ItemKind;
use crate::forms::ValueMode;
use crate::realtime::{ChatSession, ConnectionState, ObservableNode, ReconnectPolicy, Sender, StatusWatcher};
use crate::toast::{ToastKind, ToastService};
use anyhow::{anyhow, bail, Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Execute one parsed command against the loaded configuration.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let Cli {
        config: config_path,
        command,
    } = cli;
    let command = match command {
        Commands::Config(opts) => return run_config(opts.action, config_path.as_deref(), &config),
        Commands::Version => {
            println!("agentdash {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        other => other,
    };

    let client = ApiClient::new(&config.api).context("Cannot build API client")?;
    let value_mode = ValueMode::from_flag(config.forms.save_all_fields_as_string);
    let toasts = ToastService::new(config.toast.default_duration());

    match command {
        Commands::Agents => {
            let list = client.list_agents().await?;
            for agent in &list.agents {
                let state = if list.is_active(agent) { "active" } else { "inactive" };
                println!("{:<32} {}", agent.name(), state);
            }
            info!("{} agents", list.agents.len());
        }
        Commands::Status { name } => {
            let status = client.status_history(&name).await?;
            println!("{}: {}", name, if status.active { "active" } else { "inactive" });
            for entry in &status.history {
                println!("  {}", entry);
            }
        }
        Commands::Pause { name } => {
            client.pause_agent(&name).await?;
            println!("Agent \"{}\" paused", name);
        }
        Commands::Start { name } => {
            client.start_agent(&name).await?;
            println!("Agent \"{}\" started", name);
        }
        Commands::Delete { name } => {
            client.delete_agent(&name).await?;
            println!("Agent \"{}\" deleted", name);
        }
        Commands::Export(opts) => {
            let exported = client.export_agent(&opts.name).await?;
            let text = serde_json::to_string_pretty(&exported)?;
            match opts.output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Cannot write '{}'", path.display()))?;
                    println!("Exported \"{}\" to {}", opts.name, path.display());
                }
                None => println!("{}", text),
            }
        }
        Commands::Import { file } => {
            let contents =
                std::fs::read(&file).with_context(|| format!("Cannot read '{}'", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("agent.json")
                .to_string();
            client.import_agent(&file_name, contents).await?;
            println!("Imported {}", file.display());
        }
        Commands::Create { file } => {
            let agent_config = read_config_file_snapshot(&file)?;
            let meta = client.agent_meta().await?;
            let mut form = AgentForm::new(FormMode::Create, meta, value_mode);
            form.hydrate(&agent_config)?;
            let result = form.submit(&ApiSubmit::Create(&client), &toasts).await;
            report(&toasts);
            result?;
        }
        Commands::Set { name, assignments } => {
            let mut form = load_form(&client, &name, value_mode).await?;
            for assignment in &assignments {
                let (key, value) = parse_assignment(assignment)?;
                form.set_field(&key, value)?;
            }
            save_form(&client, &mut form, &name, &toasts).await?;
        }
        Commands::Connector(opts) => match opts.action {
            ConnectorAction::Add {
                name,
                connector_type,
                assignments,
            } => {
                let mut form = load_form(&client, &name, value_mode).await?;
                let editor = form.editor_mut(ItemKind::Connector);
                editor.add();
                let index = editor.len() - 1;
                editor.change_type(index, &connector_type)?;
                for assignment in &assignments {
                    let (key, value) = parse_assignment(assignment)?;
                    editor.change_field(index, &key, value)?;
                }
                save_form(&client, &mut form, &name, &toasts).await?;
            }
            ConnectorAction::Remove { name, index } => {
                let mut form = load_form(&client, &name, value_mode).await?;
                let position = index
                    .checked_sub(1)
                    .ok_or_else(|| anyhow!("Connector positions start at 1"))?;
                let removed = form.editor_mut(ItemKind::Connector).remove(position)?;
                info!("Removing connector '{}'", removed.discriminant);
                save_form(&client, &mut form, &name, &toasts).await?;
            }
        },
        Commands::Meta => {
            let meta = client.agent_meta().await?;
            for (section, fields) in meta.fields_by_section() {
                println!("[{}]", section);
                for field in fields {
                    println!("  {:<36} {:<9} {}", field.name, kind_name(field), field.label);
                }
            }
            let connectors: Vec<String> =
                meta.connector_groups().into_iter().map(|g| g.name).collect();
            println!("connectors: {}", connectors.join(", "));
            let actions: Vec<String> = meta.action_groups().into_iter().map(|g| g.name).collect();
            println!("actions: {}", actions.join(", "));
        }
        Commands::Chat { name, message } => {
            chat(&client, &config, &name, &message).await?;
        }
        Commands::Watch { name } => {
            watch(&client, &config, &name).await?;
        }
        Commands::Config(_) | Commands::Version => {}
    }

    Ok(())
}

fn run_config(action: ConfigAction, path: Option<&str>, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.api.token.is_some() {
                shown.api.token = Some("********".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigAction::Validate => {
            let errors = validate_config(config);
            if !errors.is_empty() {
                for error in &errors {
                    eprintln!("{}", error);
                }
                bail!("Configuration has {} error(s)", errors.len());
            }
            println!("Configuration is valid");
        }
        ConfigAction::Init => {
            let path = path.unwrap_or("agentdash.json");
            if Path::new(path).exists() {
                bail!("'{}' already exists", path);
            }
            Config::write_default(path)?;
            println!("Wrote {}", path);
        }
    }
    Ok(())
}

async fn load_form(client: &ApiClient, name: &str, value_mode: ValueMode) -> Result<AgentForm> {
    let meta = client.agent_meta().await?;
    let agent_config = client.agent_config(name).await?;
    Ok(AgentForm::edit(name, meta, &agent_config, value_mode)?)
}

async fn save_form(
    client: &ApiClient,
    form: &mut AgentForm,
    name: &str,
    toasts: &ToastService,
) -> Result<()> {
    if !form.is_dirty() {
        println!("No changes");
        return Ok(());
    }
    let result = form
        .submit(&ApiSubmit::Update(client, name.to_string()), toasts)
        .await;
    report(toasts);
    Ok(result?)
}

/// Print the toast the last operation raised.
fn report(toasts: &ToastService) {
    if let Some(toast) = toasts.visible() {
        match toast.kind {
            ToastKind::Error | ToastKind::Warning => eprintln!("{}", toast.message),
            ToastKind::Success | ToastKind::Info => println!("{}", toast.message),
        }
    }
}

async fn chat(client: &ApiClient, config: &Config, name: &str, message: &str) -> Result<()> {
    let timeout = Duration::from_secs(config.api.timeout_secs);
    let session = ChatSession::open(
        client,
        name,
        ReconnectPolicy::from_config(&config.realtime),
        config.chat.sending_failsafe(),
    );

    let mut connection = session.watch_connection();
    let connected = matches!(
        tokio::time::timeout(
            timeout,
            connection.wait_for(|state| *state == ConnectionState::Connected),
        )
        .await,
        Ok(Ok(_))
    );
    if !connected {
        warn!("Event stream for '{}' not connected; the reply may be missed", name);
    }

    let before = session.messages().len();
    session.send(message).await?;

    let replied = tokio::time::timeout(
        timeout,
        session.wait_until(|state| {
            state.error().is_some()
                || state.messages()[before.min(state.messages().len())..]
                    .iter()
                    .any(|m| m.sender == Sender::Agent)
        }),
    )
    .await;

    let snapshot = session.snapshot();
    for reply in snapshot.messages().iter().skip(before) {
        if reply.sender == Sender::Agent {
            println!("{}", reply.content);
        }
    }
    if let Some(error) = snapshot.error() {
        bail!("{}", error);
    }
    if replied.is_err() {
        bail!("No reply from \"{}\" within {}s", name, timeout.as_secs());
    }
    Ok(())
}

async fn watch(client: &ApiClient, config: &Config, name: &str) -> Result<()> {
    let watcher = StatusWatcher::open(client, name, ReconnectPolicy::from_config(&config.realtime));
    if let Err(e) = watcher.refresh().await {
        warn!("Cannot load status history for '{}': {}", name, e);
    }
    let mut updates = watcher.subscribe();
    let mut connection = watcher.watch_connection();
    print_status(&watcher);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                eprintln!("-- {} --", state);
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                updates.borrow_and_update();
                print_status(&watcher);
            }
        }
    }
    Ok(())
}

fn print_status(watcher: &StatusWatcher) {
    let view = watcher.snapshot();
    let active = if view.active { "active" } else { "inactive" };
    println!("status: {} ({})", view.status.as_deref().unwrap_or("-"), active);
    if let Some(error) = &view.error {
        println!("error: {}", error);
    }
    print!("{}", render_tree(&view.tree()));
    println!();
}

/// Indented outline of an observable tree, one node per line.
pub(crate) fn render_tree(nodes: &[ObservableNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(&mut out, node, 0);
    }
    out
}

fn render_node(out: &mut String, node: &ObservableNode, depth: usize) {
    let observable = &node.observable;
    let state = if observable.is_complete() { "done" } else { "running" };
    let icon = if observable.icon.is_empty() { "-" } else { observable.icon.as_str() };
    let _ = write!(
        out,
        "{:indent$}{} {} #{} [{}]",
        "",
        icon,
        observable.name,
        observable.id,
        state,
        indent = depth * 2
    );
    if !observable.progress.is_empty() {
        let _ = write!(out, " ({} steps)", observable.progress.len());
    }
    out.push('\n');
    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

fn kind_name(field: &crate::forms::FieldDefinition) -> String {
    serde_json::to_value(field.kind)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{Observable, ObservableStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn tree_renders_children_indented() {
        let mut store = ObservableStore::new();
        store.apply(Observable {
            id: 2,
            parent_id: Some(1),
            name: "search".into(),
            icon: "globe".into(),
            progress: vec![json!({"step": 1})],
            ..Default::default()
        });
        store.apply(Observable {
            id: 1,
            name: "job".into(),
            completion: Some(json!({"ok": true})),
            ..Default::default()
        });

        assert_eq!(
            render_tree(&store.tree()),
            "- job #1 [done]\n  globe search #2 [running] (1 steps)\n"
        );
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agentdash.json");
        let path = path.to_str().unwrap();
        run_config(ConfigAction::Init, Some(path), &Config::default()).unwrap();
        assert!(run_config(ConfigAction::Init, Some(path), &Config::default()).is_err());
    }

    #[test]
    fn validate_reports_errors() {
        let mut config = Config::default();
        config.toast.default_duration_ms = 0;
        assert!(run_config(ConfigAction::Validate, None, &config).is_err());
        assert!(run_config(ConfigAction::Validate, None, &Config::default()).is_ok());
    }
}
