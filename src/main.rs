#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use careroute::agent::{
    prompt, AgentDispatcher, AgentInvoker, AgentRequest, DispatchError, OfflineInvoker,
};
use careroute::routing::{
    builtin, AgentId, LanguageHint, Router, RoutingEngine, RoutingEngineHandle, RoutingRequest,
    RoutingResult, RuleSetDocument, UserContext,
};
use careroute::sessions::{create_conversation_store, ConversationStore, UserProfile};
use careroute::{Config, RulesCommands};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `careroute` - picks the healthcare agent that should answer a message.
#[derive(Parser, Debug)]
#[command(name = "careroute")]
#[command(version)]
#[command(about = "Routes health chat messages to the right specialist agent.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a single message and print the decision
    #[command(long_about = "\
Route a single message and print the decision.

Scores the message against every agent's rule set and prints the \
selected agent, its confidence, and the reasons behind the choice. \
Use --json for machine-readable output.

Examples:
  careroute route -m \"I have a headache and feel dizzy\"
  careroute route -m \"我好焦慮\" --json
  careroute route -m \"it hurts more today\" --prior-agent illness_monitor
  careroute route -m \"I can't breathe\" --reply")]
    Route {
        /// Message text to route
        #[arg(short, long)]
        message: String,

        /// Language hint (en, zh-HK, auto)
        #[arg(short, long, default_value = "auto")]
        language: LanguageHint,

        /// Agent that handled the previous turn
        #[arg(long)]
        prior_agent: Option<AgentId>,

        /// Age group of the user (carried to the agent prompt)
        #[arg(long)]
        age_group: Option<String>,

        /// Print the routing result as JSON
        #[arg(long)]
        json: bool,

        /// Also print the selected agent's offline reply
        #[arg(long)]
        reply: bool,
    },

    /// Interactive session with continuity across turns
    #[command(long_about = "\
Start an interactive routing session.

Each line read from stdin is routed with the context of the previous \
turns and answered with the selected agent's offline reply. Use \
--verbose to also print the routing reasons. End with Ctrl-D.

Examples:
  careroute chat
  careroute chat --age-group elderly --verbose")]
    Chat {
        /// Age group of the user (carried to the agent prompt)
        #[arg(long)]
        age_group: Option<String>,

        /// Print routing reasons for every turn
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the agents and their configured rules
    Agents,

    /// Export or validate rule sets
    #[command(long_about = "\
Export or validate routing rule sets.

Examples:
  careroute rules export
  careroute rules check ./rules.toml")]
    Rules {
        #[command(subcommand)]
        rules_command: RulesCommands,
    },

    /// Manage configuration
    #[command(long_about = "\
Manage careroute configuration.

Inspect and export configuration settings. Use 'schema' to dump \
the full JSON Schema for the config file, which documents every \
available key, type, and default value.

Examples:
  careroute config schema              # print JSON Schema to stdout
  careroute config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `careroute`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(careroute completions bash)
  careroute completions zsh > ~/.zfunc/_careroute
  careroute completions fish > ~/.config/fish/completions/careroute.fish")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("CAREROUTE_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Route {
            message,
            language,
            prior_agent,
            age_group,
            json,
            reply,
        } => {
            let engine = config.build_engine().await?;
            let context = UserContext {
                age_group,
                prior_agent,
                recent_message_count: usize::from(prior_agent.is_some()),
            };
            let request = RoutingRequest::new(message.clone())
                .with_language(language)
                .with_context(context.clone());
            let result = engine.route(&request);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", format_routing(&result));
            }

            if reply {
                let agent_request = AgentRequest {
                    agent: result.selected_agent,
                    message,
                    language: result.language,
                    system_prompt: prompt::system_prompt(
                        config.agents.display_name(result.selected_agent),
                        result.selected_agent,
                        result.language,
                        &context,
                    ),
                    user_context: context,
                    conversation_id: None,
                };
                let answer = OfflineInvoker.invoke(&agent_request).await?;
                println!();
                println!("{}", answer.text);
            }
            Ok(())
        }

        Commands::Chat { age_group, verbose } => run_chat(&config, age_group, verbose).await,

        Commands::Agents => {
            let engine = config.build_engine().await?;
            print!("{}", format_agents(&engine, &config));
            Ok(())
        }

        Commands::Rules { rules_command } => match rules_command {
            RulesCommands::Export { configured } => {
                let document = if configured {
                    config.load_rule_document().await?
                } else {
                    builtin::default_document()
                };
                print!("{}", document.to_toml()?);
                Ok(())
            }
            RulesCommands::Check { path } => {
                let expanded = shellexpand::tilde(&path).into_owned();
                let contents = tokio::fs::read_to_string(&expanded)
                    .await
                    .with_context(|| format!("Failed to read rule set: {expanded}"))?;
                let document = RuleSetDocument::from_toml(&contents)
                    .with_context(|| format!("Failed to parse rule set: {expanded}"))?;
                let engine = RoutingEngine::from_document(&document, config.policy())
                    .with_context(|| format!("Rule set rejected: {expanded}"))?;
                let (groups, patterns, hard) = rule_counts(&engine);
                println!(
                    "✅ {expanded}: rule set '{}' is valid ({groups} keyword groups, {patterns} patterns, {hard} hard triggers)",
                    engine.version()
                );
                Ok(())
            }
        },

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(careroute::Config);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&schema).context("Failed to serialize JSON Schema")?
                );
                Ok(())
            }
        },
    }
}

async fn run_chat(config: &Config, age_group: Option<String>, verbose: bool) -> Result<()> {
    let router = Arc::new(RoutingEngineHandle::new(config.build_engine().await?));
    let store: Arc<dyn ConversationStore> = Arc::from(create_conversation_store());
    let conversation_id = uuid::Uuid::new_v4().to_string();
    if age_group.is_some() {
        store
            .set_profile(&conversation_id, UserProfile { age_group })
            .await?;
    }

    let dispatcher = AgentDispatcher::new(
        router,
        Arc::new(OfflineInvoker),
        store,
        config.agents.assistant_name.clone(),
    )
    .with_display_names(config.agents.display_names.clone());

    println!(
        "{} is listening (conversation {conversation_id}). Ctrl-D to quit.",
        config.agents.assistant_name
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        match dispatcher.handle(&conversation_id, message, None).await {
            Ok(outcome) => {
                if verbose {
                    print!("{}", format_routing(&outcome.routing));
                }
                println!("[{}] {}", outcome.routing.selected_agent, outcome.reply.text);
            }
            Err(DispatchError::Invoke { routing, source }) => {
                tracing::warn!(error = %source, "Falling back to offline reply");
                println!(
                    "[{}] {}",
                    routing.selected_agent,
                    prompt::offline_reply(routing.selected_agent, routing.language)
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn format_routing(result: &RoutingResult) -> String {
    let mut out = String::new();
    let marker = if result.emergency_override { "🚨 " } else { "" };
    out.push_str(&format!("{marker}Agent:       {}\n", result.selected_agent));
    out.push_str(&format!("Confidence:  {:.2}\n", result.confidence));
    out.push_str(&format!("Language:    {}\n", result.language.as_str()));
    out.push_str(&format!("Rule set:    {}\n", result.rule_set_version));
    out.push_str("Reasons:\n");
    for reason in &result.reasons {
        out.push_str(&format!("  - {reason}\n"));
    }
    out.push_str("Scores:\n");
    for (agent, score) in &result.scores_by_agent {
        out.push_str(&format!("  {:<16} {score:.2}\n", agent.as_str()));
    }
    out
}

fn rule_counts(engine: &RoutingEngine) -> (usize, usize, usize) {
    engine
        .rules()
        .definitions()
        .iter()
        .fold((0, 0, 0), |(groups, patterns, hard), def| {
            (
                groups + def.keyword_groups.len(),
                patterns + def.patterns.len(),
                hard + def.patterns.iter().filter(|p| p.hard_trigger).count(),
            )
        })
}

fn format_agents(engine: &RoutingEngine, config: &Config) -> String {
    let mut out = format!("Rule set {} ({} agents):\n\n", engine.version(), AgentId::ALL.len());
    out.push_str("  AGENT            NAME          BOOST  GROUPS  PATTERNS  HARD\n");
    for def in engine.rules().definitions() {
        out.push_str(&format!(
            "  {:<16} {:<13} {:>5.2}  {:>6}  {:>8}  {:>4}\n",
            def.agent_id.as_str(),
            config.agents.display_name(def.agent_id),
            def.base_confidence_boost,
            def.keyword_groups.len(),
            def.patterns.len(),
            def.patterns.iter().filter(|p| p.hard_trigger).count(),
        ));
    }
    out
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
