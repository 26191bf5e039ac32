use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::chunker::{PartitionStrategy, TextChunker, DEFAULT_TARGET_TOKENS};
use crate::client::{QwenMtClient, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::config::{find_default_config, load_config, AppConfig, Domains, DEFAULT_CONFIG_FILE};
use crate::terminology::{Glossary, TermPair};
use crate::tokens::{TiktokenCounter, DEFAULT_ENCODING};

use super::translator::{EmptyChunkPolicy, TranslationOptions};

pub const CONFIG_ENV: &str = "CHUNKED_MT_CONFIG";
pub const API_KEY_ENV: &str = "ALIYUN_API_KEY";

/// Values given on the command line; each one beats the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub domains: Option<String>,
    pub target_tokens: Option<usize>,
    pub strategy: Option<PartitionStrategy>,
    pub workers: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Config file actually loaded, if any.
    pub config_path: Option<PathBuf>,

    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,

    pub source_lang: String,
    pub target_lang: String,
    pub domains: Option<String>,
    pub glossary: Glossary,
    pub tm_list: Vec<TermPair>,

    pub target_tokens: usize,
    pub strategy: PartitionStrategy,
    pub encoding: String,
    pub workers: usize,
    pub empty_chunk_policy: EmptyChunkPolicy,

    pub trace_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            source_lang: "zh".to_string(),
            target_lang: "en".to_string(),
            domains: None,
            glossary: Glossary::new(),
            tm_list: Vec::new(),
            target_tokens: DEFAULT_TARGET_TOKENS,
            strategy: PartitionStrategy::default(),
            encoding: DEFAULT_ENCODING.to_string(),
            workers: 1,
            empty_chunk_policy: EmptyChunkPolicy::default(),
            trace_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Locates and loads the config file, then layers CLI values and the
    /// environment on top.
    pub fn from_args(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let workdir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, DEFAULT_CONFIG_FILE));

        let mut file_cfg = AppConfig::default();
        let mut loaded_from = None;
        if let Some(p) = cfg_file {
            // an explicit path that does not exist is an error; discovery never yields one
            file_cfg = load_config(&p)?;
            tracing::debug!(path = %p.display(), "loaded config");
            loaded_from = Some(p);
        }

        let env_api_key = std::env::var(API_KEY_ENV).ok();
        Self::resolve(file_cfg, loaded_from, overrides, env_api_key)
    }

    /// Merges CLI values, file values and defaults, in that order of precedence.
    pub fn resolve(
        file_cfg: AppConfig,
        config_path: Option<PathBuf>,
        overrides: ConfigOverrides,
        env_api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let api_key = overrides
            .api_key
            .or(file_cfg.api.api_key)
            .or(file_cfg.api_key)
            .or(env_api_key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let model = non_blank(overrides.model)
            .or_else(|| non_blank(file_cfg.api.model))
            .unwrap_or(defaults.model);
        let base_url = non_blank(file_cfg.api.base_url).unwrap_or(defaults.base_url);
        let timeout = file_cfg
            .api
            .timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let source_lang = non_blank(overrides.source_lang)
            .or_else(|| non_blank(file_cfg.translation.source_lang))
            .unwrap_or(defaults.source_lang);
        let target_lang = non_blank(overrides.target_lang)
            .or_else(|| non_blank(file_cfg.translation.target_lang))
            .unwrap_or(defaults.target_lang);
        let domains = non_blank(overrides.domains).or_else(|| {
            file_cfg
                .translation
                .domains
                .as_ref()
                .and_then(Domains::first)
                .map(str::to_string)
        });

        let glossary = Glossary::from_pairs(
            file_cfg
                .terminology
                .terms
                .map(|t| t.into_pairs())
                .unwrap_or_default(),
        );
        let tm_list = if file_cfg.translation.tm_list.is_empty() {
            file_cfg.tm_list
        } else {
            file_cfg.translation.tm_list
        };

        let chunking = file_cfg.chunking;
        let target_tokens = overrides
            .target_tokens
            .or(chunking.target_tokens)
            .unwrap_or(defaults.target_tokens);
        let strategy = match (overrides.strategy, chunking.strategy.as_deref()) {
            (Some(s), _) => s,
            (None, Some(s)) => s
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("chunking.strategy")?,
            (None, None) => defaults.strategy,
        };
        let encoding = non_blank(chunking.encoding).unwrap_or(defaults.encoding);
        let workers = overrides
            .workers
            .or(chunking.workers)
            .unwrap_or(defaults.workers)
            .max(1);
        let empty_chunk_policy = match chunking.empty_chunk_policy.as_deref() {
            Some(s) => s
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("chunking.empty_chunk_policy")?,
            None => defaults.empty_chunk_policy,
        };

        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let trace_dir = non_blank(file_cfg.pipeline.trace_dir)
            .map(PathBuf::from)
            .map(|p| match (p.is_relative(), config_dir.as_ref()) {
                (true, Some(dir)) => dir.join(p),
                _ => p,
            });

        Ok(Self {
            config_path,
            api_key,
            model,
            base_url,
            timeout,
            source_lang,
            target_lang,
            domains,
            glossary,
            tm_list,
            target_tokens,
            strategy,
            encoding,
            workers,
            empty_chunk_policy,
            trace_dir,
        })
    }

    pub fn translation_options(&self) -> TranslationOptions {
        TranslationOptions {
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            domains: self.domains.clone(),
            terms: self.glossary.to_vec(),
            tm_list: self.tm_list.clone(),
        }
    }

    pub fn build_chunker(&self) -> anyhow::Result<TextChunker<TiktokenCounter>> {
        let counter = TiktokenCounter::new(&self.encoding).context("load tokenizer")?;
        tracing::debug!(
            encoding = counter.name(),
            target_tokens = self.target_tokens,
            strategy = self.strategy.as_str(),
            "tokenizer loaded"
        );
        Ok(TextChunker::new(counter)
            .with_target_tokens(self.target_tokens)
            .with_strategy(self.strategy))
    }

    /// Only called when a remote request is about to be made.
    pub fn build_client(&self) -> anyhow::Result<QwenMtClient> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow!("API key not provided: pass --api-key, set api_key in the config, or set {API_KEY_ENV}")
        })?;
        QwenMtClient::new(api_key, &self.model, &self.base_url, self.timeout).context("build HTTP client")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Writes a commented default config into `dir`. Refuses to replace an
/// existing file unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(DEFAULT_CONFIG_FILE);
    if cfg_path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            cfg_path.display()
        ));
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"# API key; ALIYUN_API_KEY is used when unset here and on the command line.
# api_key = "sk-..."

[api]
model = "qwen-mt-plus"
base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
timeout_secs = 120

[translation]
source_lang = "zh"
target_lang = "en"
# Free-text description of the document's domain, sent with every request.
# domains = "The sentence is from technical documentation about machine learning."

# Translation memory examples.
# tm_list = [
#   { source = "你好，世界", target = "Hello, world" },
# ]

[terminology]
# terms = [
#   { source = "模型", target = "model" },
# ]

[chunking]
target_tokens = 3500
# "dp" (min-max optimal) or "greedy"
strategy = "dp"
encoding = "cl100k_base"
workers = 1
# "keep" an echo-only chunk as empty text, or "fail" the document
empty_chunk_policy = "keep"

[pipeline]
# Per-chunk raw and cleaned responses; relative to this file.
# trace_dir = "_trace"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> AppConfig {
        toml::from_str(toml_text).expect("toml")
    }

    #[test]
    fn defaults_without_any_input() {
        let cfg = PipelineConfig::resolve(AppConfig::default(), None, ConfigOverrides::default(), None)
            .expect("resolve");
        assert_eq!(cfg.source_lang, "zh");
        assert_eq!(cfg.target_lang, "en");
        assert_eq!(cfg.model, "qwen-mt-plus");
        assert_eq!(cfg.target_tokens, 3500);
        assert_eq!(cfg.strategy, PartitionStrategy::Optimal);
        assert_eq!(cfg.encoding, "cl100k_base");
        assert_eq!(cfg.workers, 1);
        assert!(cfg.api_key.is_none());
        assert!(cfg.domains.is_none());
        assert!(cfg.build_client().is_err());
    }

    #[test]
    fn api_key_precedence() {
        let file = parse("api_key = \"file\"\n[api]\napi_key = \"api-section\"\n");
        let resolve = |file: AppConfig, cli: Option<&str>, env: Option<&str>| {
            PipelineConfig::resolve(
                file,
                None,
                ConfigOverrides {
                    api_key: cli.map(str::to_string),
                    ..ConfigOverrides::default()
                },
                env.map(str::to_string),
            )
            .expect("resolve")
            .api_key
        };
        assert_eq!(resolve(file.clone(), Some("cli"), Some("env")).as_deref(), Some("cli"));
        assert_eq!(resolve(file, None, Some("env")).as_deref(), Some("api-section"));
        assert_eq!(
            resolve(parse("api_key = \"file\""), None, Some("env")).as_deref(),
            Some("file")
        );
        assert_eq!(resolve(AppConfig::default(), None, Some("env")).as_deref(), Some("env"));
        assert_eq!(resolve(AppConfig::default(), None, Some("  ")), None);
    }

    #[test]
    fn cli_values_beat_file_values() {
        let file = parse(
            r#"
[api]
model = "qwen-mt-turbo"
[translation]
source_lang = "ja"
target_lang = "de"
domains = "legal"
[chunking]
target_tokens = 1000
strategy = "greedy"
workers = 2
"#,
        );
        let cfg = PipelineConfig::resolve(
            file,
            None,
            ConfigOverrides {
                model: Some("qwen-mt-plus".into()),
                target_lang: Some("en".into()),
                domains: Some("medical".into()),
                target_tokens: Some(2000),
                strategy: Some(PartitionStrategy::Optimal),
                workers: Some(0),
                ..ConfigOverrides::default()
            },
            None,
        )
        .expect("resolve");
        assert_eq!(cfg.model, "qwen-mt-plus");
        assert_eq!(cfg.source_lang, "ja");
        assert_eq!(cfg.target_lang, "en");
        assert_eq!(cfg.domains.as_deref(), Some("medical"));
        assert_eq!(cfg.target_tokens, 2000);
        assert_eq!(cfg.strategy, PartitionStrategy::Optimal);
        assert_eq!(cfg.workers, 1);
    }

    #[test]
    fn builds_translation_options() {
        let file = parse(
            r#"
tm_list = [{ source = "top", target = "level" }]
[translation]
domains = ["news", "unused"]
[terminology]
terms = [{ source = "模型", target = "model" }, { source = "模型", target = "models" }]
"#,
        );
        let cfg = PipelineConfig::resolve(file, None, ConfigOverrides::default(), None).expect("resolve");
        let opts = cfg.translation_options();
        assert_eq!(opts.domains.as_deref(), Some("news"));
        assert_eq!(opts.terms, vec![TermPair::new("模型", "models")]);
        assert_eq!(opts.tm_list, vec![TermPair::new("top", "level")]);
    }

    #[test]
    fn bad_strategy_is_an_error() {
        let file = parse("[chunking]\nstrategy = \"random\"\n");
        let err = PipelineConfig::resolve(file, None, ConfigOverrides::default(), None).unwrap_err();
        assert!(format!("{err:#}").contains("chunking.strategy"));
    }

    #[test]
    fn trace_dir_is_relative_to_config_file() {
        let file = parse("[pipeline]\ntrace_dir = \"_trace\"\n");
        let cfg = PipelineConfig::resolve(
            file,
            Some(PathBuf::from("/etc/chunked-mt/chunked-mt.toml")),
            ConfigOverrides::default(),
            None,
        )
        .expect("resolve");
        assert_eq!(cfg.trace_dir, Some(PathBuf::from("/etc/chunked-mt/_trace")));
    }

    #[test]
    fn init_config_writes_loadable_file_once() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = init_default_config(tmp.path(), false).expect("init");
        let cfg = load_config(&path).expect("load");
        let resolved = PipelineConfig::resolve(cfg, Some(path.clone()), ConfigOverrides::default(), None)
            .expect("resolve");
        assert_eq!(resolved.target_tokens, 3500);
        assert_eq!(resolved.strategy, PartitionStrategy::Optimal);

        assert!(init_default_config(tmp.path(), false).is_err());
        assert_eq!(init_default_config(tmp.path(), true).expect("force"), path);
    }
}
