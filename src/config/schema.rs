use crate::agent::prompt;
use crate::routing::{
    builtin, rules, AgentId, Language, RoutingEngine, RoutingPolicy, RuleSetDocument,
};
use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_DIR_ENV: &str = "CAREROUTE_CONFIG_DIR";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level careroute configuration, loaded from `config.toml`.
///
/// Resolution order: `CAREROUTE_CONFIG_DIR` env → `~/.careroute/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Scoring constants and the rule-set source (`[routing]`).
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Agent naming and reply language (`[agents]`).
    #[serde(default)]
    pub agents: AgentsConfig,
}

// ── Routing ───────────────────────────────────────────────────────

/// Routing engine configuration (`[routing]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoutingConfig {
    /// Raw score that maps to confidence 1.0. Must be > 0. Default: `1.0`.
    #[serde(default = "default_normalization_constant")]
    pub normalization_constant: f64,
    /// Confidence reported when a hard emergency trigger fires. Default: `0.95`.
    #[serde(default = "default_emergency_confidence_floor")]
    pub emergency_confidence_floor: f64,
    /// Confidence of the wellness_coach fallback. Default: `0.1`.
    #[serde(default = "default_default_confidence")]
    pub default_confidence: f64,
    /// Selections below this carry a low-confidence reason. Default: `0.4`.
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
    /// Raw-score bonus for the agent that handled the previous turn. Default: `0.05`.
    #[serde(default = "default_continuity_boost")]
    pub continuity_boost: f64,
    /// Optional TOML rule-set file; `~` is expanded. Relative paths resolve
    /// against the config directory. Unset means the built-in table.
    /// Overridden by `CAREROUTE_RULES_PATH`.
    #[serde(default)]
    pub rules_path: Option<String>,
}

fn default_normalization_constant() -> f64 {
    rules::DEFAULT_NORMALIZATION_CONSTANT
}

fn default_emergency_confidence_floor() -> f64 {
    rules::DEFAULT_EMERGENCY_CONFIDENCE_FLOOR
}

fn default_default_confidence() -> f64 {
    rules::DEFAULT_FALLBACK_CONFIDENCE
}

fn default_low_confidence_threshold() -> f64 {
    rules::DEFAULT_LOW_CONFIDENCE_THRESHOLD
}

fn default_continuity_boost() -> f64 {
    rules::DEFAULT_CONTINUITY_BOOST
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            normalization_constant: default_normalization_constant(),
            emergency_confidence_floor: default_emergency_confidence_floor(),
            default_confidence: default_default_confidence(),
            low_confidence_threshold: default_low_confidence_threshold(),
            continuity_boost: default_continuity_boost(),
            rules_path: None,
        }
    }
}

impl RoutingConfig {
    pub fn to_policy(&self, default_language: Language) -> RoutingPolicy {
        RoutingPolicy {
            normalization_constant: self.normalization_constant,
            emergency_confidence_floor: self.emergency_confidence_floor,
            default_confidence: self.default_confidence,
            low_confidence_threshold: self.low_confidence_threshold,
            continuity_boost: self.continuity_boost,
            default_language,
        }
    }
}

// ── Agents ────────────────────────────────────────────────────────

/// Agent presentation settings (`[agents]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentsConfig {
    /// Name the assistant introduces itself with. Default: `"CareBuddy"`.
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    /// Reply language when the hint is `auto` and the text is inconclusive.
    #[serde(default = "default_language_default")]
    pub language_default: Language,
    /// Per-agent names used in prompts instead of `assistant_name`.
    #[serde(default)]
    pub display_names: BTreeMap<AgentId, String>,
}

fn default_assistant_name() -> String {
    "CareBuddy".into()
}

fn default_language_default() -> Language {
    Language::En
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            language_default: default_language_default(),
            display_names: BTreeMap::new(),
        }
    }
}

impl AgentsConfig {
    pub fn display_name(&self, agent: AgentId) -> &str {
        prompt::display_name(&self.display_names, &self.assistant_name, agent)
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".careroute").join("config.toml"),
            routing: RoutingConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".careroute"))
}

fn resolve_config_dir() -> Result<(PathBuf, &'static str)> {
    if let Ok(custom) = std::env::var(CONFIG_DIR_ENV) {
        let custom = custom.trim();
        if !custom.is_empty() {
            let expanded = shellexpand::tilde(custom);
            return Ok((PathBuf::from(expanded.as_ref()), CONFIG_DIR_ENV));
        }
    }
    Ok((default_config_dir()?, "default"))
}

fn parse_env_f64(name: &str) -> Option<f64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring non-numeric env override");
            None
        }
    }
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let (config_dir, source) = resolve_config_dir()?;
        let config = Self::load_or_init_in(&config_dir).await?;
        tracing::debug!(source, "Config directory resolved");
        Ok(config)
    }

    /// Load `config.toml` from `config_dir`, writing defaults when it is missing.
    pub async fn load_or_init_in(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;
            config
        } else {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Directory holding `config.toml`.
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.routing.to_policy(self.agents.language_default)
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Rule-set checks that need the compiled rules run in [`Self::build_engine`].
    pub fn validate(&self) -> Result<()> {
        self.policy()
            .validate_ranges()
            .context("Invalid [routing] configuration")?;

        if let Some(path) = &self.routing.rules_path {
            if path.trim().is_empty() {
                anyhow::bail!("routing.rules_path must not be empty when set");
            }
        }

        if self.agents.assistant_name.trim().is_empty() {
            anyhow::bail!("agents.assistant_name must not be empty");
        }
        for (agent, name) in &self.agents.display_names {
            if name.trim().is_empty() {
                anyhow::bail!("agents.display_names.{agent} must not be empty");
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CAREROUTE_RULES_PATH") {
            if !path.trim().is_empty() {
                self.routing.rules_path = Some(path);
            }
        }

        if let Some(value) = parse_env_f64("CAREROUTE_NORMALIZATION_CONSTANT") {
            self.routing.normalization_constant = value;
        }

        if let Some(value) = parse_env_f64("CAREROUTE_LOW_CONFIDENCE_THRESHOLD") {
            self.routing.low_confidence_threshold = value;
        }
    }

    /// Resolved location of the configured rule-set file, if any.
    pub fn rules_file(&self) -> Option<PathBuf> {
        let raw = self.routing.rules_path.as_deref()?;
        let expanded = PathBuf::from(shellexpand::tilde(raw.trim()).as_ref());
        if expanded.is_absolute() {
            Some(expanded)
        } else {
            Some(self.config_dir().join(expanded))
        }
    }

    /// Read the configured rule set, or the built-in table when none is set.
    pub async fn load_rule_document(&self) -> Result<RuleSetDocument> {
        let Some(path) = self.rules_file() else {
            return Ok(builtin::default_document());
        };
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read rule set: {}", path.display()))?;
        RuleSetDocument::from_toml(&contents)
            .with_context(|| format!("Failed to parse rule set: {}", path.display()))
    }

    /// Build the routing engine described by this config.
    pub async fn build_engine(&self) -> Result<RoutingEngine> {
        let document = self.load_rule_document().await?;
        let engine = RoutingEngine::from_document(&document, self.policy())
            .context("Invalid routing rule set")?;
        tracing::info!(
            version = engine.version(),
            source = if self.routing.rules_path.is_some() { "file" } else { "builtin" },
            "Routing engine ready"
        );
        Ok(engine)
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Router, RoutingRequest};
    use tokio::sync::{Mutex, MutexGuard};
    use tokio::test;

    const CUSTOM_RULES: &str = r#"
version = "clinic-7"

[[agents]]
agent_id = "safety_guardian"
base_confidence_boost = 0.3

[[agents.patterns]]
label = "code red"
pattern = '(?i)\bcode red\b'
weight = 0.6
hard_trigger = true

[[agents]]
agent_id = "illness_monitor"
base_confidence_boost = 0.2

[[agents.keyword_groups]]
label = "clinic"
weight = 0.5
keywords = ["rash"]

[[agents]]
agent_id = "mental_health"
base_confidence_boost = 0.2

[[agents]]
agent_id = "wellness_coach"
base_confidence_boost = 0.1
"#;

    #[test]
    async fn config_defaults() {
        let c = Config::default();
        assert!((c.routing.normalization_constant - 1.0).abs() < f64::EPSILON);
        assert!((c.routing.emergency_confidence_floor - 0.95).abs() < f64::EPSILON);
        assert!((c.routing.default_confidence - 0.1).abs() < f64::EPSILON);
        assert!((c.routing.low_confidence_threshold - 0.4).abs() < f64::EPSILON);
        assert!(c.routing.rules_path.is_none());
        assert_eq!(c.agents.assistant_name, "CareBuddy");
        assert_eq!(c.agents.language_default, Language::En);
        assert!(c.config_path.to_string_lossy().contains(".careroute"));
        c.validate().unwrap();
    }

    #[test]
    async fn empty_file_parses_to_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert!((parsed.routing.continuity_boost - 0.05).abs() < f64::EPSILON);
        assert_eq!(parsed.agents.assistant_name, "CareBuddy");
    }

    #[test]
    async fn partial_sections_keep_remaining_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[routing]
low_confidence_threshold = 0.5

[agents]
language_default = "zh-HK"

[agents.display_names]
safety_guardian = "SafetyBuddy"
"#,
        )
        .unwrap();
        assert!((parsed.routing.low_confidence_threshold - 0.5).abs() < f64::EPSILON);
        assert!((parsed.routing.normalization_constant - 1.0).abs() < f64::EPSILON);
        assert_eq!(parsed.agents.language_default, Language::ZhHk);
        assert_eq!(parsed.agents.display_name(AgentId::SafetyGuardian), "SafetyBuddy");
        assert_eq!(parsed.agents.display_name(AgentId::WellnessCoach), "CareBuddy");
        assert_eq!(parsed.policy().default_language, Language::ZhHk);
    }

    #[test]
    async fn config_schema_export_contains_expected_contract_shape() {
        let schema = schemars::schema_for!(Config);
        let schema_json = serde_json::to_value(&schema).expect("schema should serialize to json");

        assert_eq!(
            schema_json
                .get("$schema")
                .and_then(serde_json::Value::as_str),
            Some("https://json-schema.org/draft/2020-12/schema")
        );

        let properties = schema_json
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .expect("schema should expose top-level properties");
        assert!(properties.contains_key("routing"));
        assert!(properties.contains_key("agents"));
        assert!(!properties.contains_key("config_path"));
    }

    #[test]
    async fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.routing.normalization_constant = 0.0;
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("normalization_constant"));

        let mut config = Config::default();
        config.routing.low_confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agents.assistant_name = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("assistant_name"));

        let mut config = Config::default();
        config.routing.rules_path = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    async fn config_save_and_load_tmpdir() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config {
            config_path: dir.path().join("config.toml"),
            ..Config::default()
        };
        config.routing.low_confidence_threshold = 0.3;
        config.agents.assistant_name = "Ah Care".into();
        config.save().await.unwrap();

        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let loaded = Config::load_or_init_in(dir.path()).await.unwrap();
        assert!((loaded.routing.low_confidence_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(loaded.agents.assistant_name, "Ah Care");
        assert_eq!(loaded.config_path, dir.path().join("config.toml"));

        // No temp files left behind by the atomic write.
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().contains(".tmp-"));
        }
    }

    #[test]
    async fn load_or_init_writes_defaults_when_missing() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("nested");

        let config = Config::load_or_init_in(&config_dir).await.unwrap();
        assert!(config_dir.join("config.toml").exists());
        assert_eq!(config.agents.assistant_name, "CareBuddy");

        let written = fs::read_to_string(config_dir.join("config.toml")).await.unwrap();
        assert!(written.contains("[routing]"));
        assert!(written.contains("[agents]"));
    }

    #[test]
    async fn load_or_init_rejects_invalid_file() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[routing]\nnormalization_constant = -1.0\n",
        )
        .await
        .unwrap();

        assert!(Config::load_or_init_in(dir.path()).await.is_err());
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            CONFIG_DIR_ENV,
            "CAREROUTE_RULES_PATH",
            "CAREROUTE_NORMALIZATION_CONSTANT",
            "CAREROUTE_LOW_CONFIDENCE_THRESHOLD",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[test]
    async fn env_override_rules_path() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("CAREROUTE_RULES_PATH", "/etc/careroute/rules.toml");
        config.apply_env_overrides();
        assert_eq!(
            config.routing.rules_path.as_deref(),
            Some("/etc/careroute/rules.toml")
        );

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_numeric_values() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("CAREROUTE_NORMALIZATION_CONSTANT", "2.0");
        std::env::set_var("CAREROUTE_LOW_CONFIDENCE_THRESHOLD", " 0.25 ");
        config.apply_env_overrides();
        assert!((config.routing.normalization_constant - 2.0).abs() < f64::EPSILON);
        assert!((config.routing.low_confidence_threshold - 0.25).abs() < f64::EPSILON);

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_ignores_garbage_numbers() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("CAREROUTE_NORMALIZATION_CONSTANT", "lots");
        config.apply_env_overrides();
        assert!((config.routing.normalization_constant - 1.0).abs() < f64::EPSILON);

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_invalid_value_fails_validation_on_load() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let dir = tempfile::tempdir().unwrap();

        std::env::set_var("CAREROUTE_LOW_CONFIDENCE_THRESHOLD", "3");
        let result = Config::load_or_init_in(dir.path()).await;
        clear_env_test_vars();
        assert!(result.is_err());
    }

    #[test]
    async fn load_or_init_honours_config_dir_env() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let dir = tempfile::tempdir().unwrap();

        std::env::set_var(CONFIG_DIR_ENV, dir.path());
        let config = Config::load_or_init().await;
        clear_env_test_vars();

        let config = config.unwrap();
        assert_eq!(config.config_path, dir.path().join("config.toml"));
        assert_eq!(config.config_dir(), dir.path());
    }

    // ── Rule-set source ──────────────────────────────────────

    #[test]
    async fn builtin_rules_when_no_path_configured() {
        let config = Config::default();
        assert_eq!(
            config.load_rule_document().await.unwrap().version,
            builtin::BUILTIN_VERSION
        );
        let engine = config.build_engine().await.unwrap();
        assert_eq!(engine.version(), builtin::BUILTIN_VERSION);
    }

    #[test]
    async fn relative_rules_path_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rules.toml"), CUSTOM_RULES)
            .await
            .unwrap();

        let mut config = Config {
            config_path: dir.path().join("config.toml"),
            ..Config::default()
        };
        config.routing.rules_path = Some("rules.toml".into());
        assert_eq!(config.rules_file(), Some(dir.path().join("rules.toml")));

        let engine = config.build_engine().await.unwrap();
        assert_eq!(engine.version(), "clinic-7");

        let result = engine.route(&RoutingRequest::new("CODE RED on ward 3"));
        assert!(result.emergency_override);
        let result = engine.route(&RoutingRequest::new("my child has a rash"));
        assert_eq!(result.selected_agent, AgentId::IllnessMonitor);
    }

    #[test]
    async fn missing_rules_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            config_path: dir.path().join("config.toml"),
            ..Config::default()
        };
        config.routing.rules_path = Some("absent.toml".into());
        let err = config.build_engine().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read rule set"));
    }

    #[test]
    async fn invalid_rules_file_is_rejected_at_build_time() {
        let dir = tempfile::tempdir().unwrap();
        // Safety no longer has the strictly largest boost.
        let broken = CUSTOM_RULES.replacen("base_confidence_boost = 0.2", "base_confidence_boost = 0.3", 1);
        fs::write(dir.path().join("rules.toml"), broken).await.unwrap();

        let mut config = Config {
            config_path: dir.path().join("config.toml"),
            ..Config::default()
        };
        config.routing.rules_path = Some(dir.path().join("rules.toml").display().to_string());
        let err = config.build_engine().await.unwrap_err();
        assert!(format!("{err:#}").contains("strictly greater"));
    }
}
