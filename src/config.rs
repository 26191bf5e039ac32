use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::terminology::TermPair;

pub const DEFAULT_CONFIG_FILE: &str = "chunked-mt.toml";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Translation memory; `[translation].tm_list` takes precedence when non-empty.
    #[serde(default)]
    pub tm_list: Vec<TermPair>,

    #[serde(default)]
    pub api: ApiSection,
    #[serde(default, alias = "translation_options")]
    pub translation: TranslationSection,
    #[serde(default)]
    pub terminology: TerminologySection,
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ApiSection {
    #[serde(default)]
    pub model: Option<String>,
    /// OpenAI-compatible endpoint root; `/chat/completions` is appended.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TranslationSection {
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub domains: Option<Domains>,
    #[serde(default)]
    pub tm_list: Vec<TermPair>,
}

/// Domain hint, written either as one string or as a list of which only the
/// first entry is used.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Domains {
    One(String),
    Many(Vec<String>),
}

impl Domains {
    pub fn first(&self) -> Option<&str> {
        let s = match self {
            Self::One(s) => s.as_str(),
            Self::Many(v) => v.first()?.as_str(),
        };
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TerminologySection {
    #[serde(default)]
    pub terms: Option<TermsSpec>,
}

/// `{ "模型" = "model" }` or `[{ source = "模型", target = "model" }]`.
///
/// The map form is read in key order; use the list form to control order.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TermsSpec {
    Map(BTreeMap<String, String>),
    List(Vec<TermPair>),
}

impl TermsSpec {
    pub fn into_pairs(self) -> Vec<TermPair> {
        match self {
            Self::Map(m) => m.into_iter().map(|(s, t)| TermPair::new(s, t)).collect(),
            Self::List(v) => v,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChunkingSection {
    #[serde(default)]
    pub target_tokens: Option<usize>,
    /// "greedy" or "dp" (alias "optimal").
    #[serde(default)]
    pub strategy: Option<String>,
    /// tiktoken encoding name, e.g. "cl100k_base".
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    /// "keep" or "fail".
    #[serde(default)]
    pub empty_chunk_policy: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// Directory for per-chunk raw/cleaned responses. Relative paths resolve
    /// against the config file's directory.
    #[serde(default)]
    pub trace_dir: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

/// Reads a TOML config, or JSON when the file ends in `.json`.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let cfg: AppConfig = if is_json {
        serde_json::from_str(&text).context("parse config json")?
    } else {
        toml::from_str(&text).context("parse config toml")?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, body).expect("write config");
        p
    }

    #[test]
    fn loads_toml_sections() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let p = write(
            tmp.path(),
            "chunked-mt.toml",
            r#"
api_key = "top"

[api]
model = "qwen-mt-turbo"
timeout_secs = 30

[translation]
source_lang = "ja"
target_lang = "en"
domains = ["Light novel prose.", "ignored"]

[terminology]
terms = [{ source = "魔法", target = "magic" }]

[chunking]
target_tokens = 2000
strategy = "greedy"
workers = 4
"#,
        );
        let cfg = load_config(&p).expect("load");
        assert_eq!(cfg.api_key.as_deref(), Some("top"));
        assert_eq!(cfg.api.model.as_deref(), Some("qwen-mt-turbo"));
        assert_eq!(cfg.api.timeout_secs, Some(30));
        assert_eq!(cfg.translation.source_lang.as_deref(), Some("ja"));
        assert_eq!(
            cfg.translation.domains.as_ref().and_then(Domains::first),
            Some("Light novel prose.")
        );
        let terms = cfg.terminology.terms.expect("terms").into_pairs();
        assert_eq!(terms, vec![TermPair::new("魔法", "magic")]);
        assert_eq!(cfg.chunking.target_tokens, Some(2000));
        assert_eq!(cfg.chunking.strategy.as_deref(), Some("greedy"));
        assert_eq!(cfg.chunking.workers, Some(4));
    }

    #[test]
    fn loads_json_with_translation_options_alias() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let p = write(
            tmp.path(),
            "ranobe.json",
            r#"{
  "api": {"model": "qwen-mt-plus"},
  "translation_options": {
    "source_lang": "zh",
    "target_lang": "en",
    "domains": "Technical documentation.",
    "tm_list": [{"source": "你好", "target": "Hello"}]
  },
  "terminology": {"terms": {"模型": "model", "数据": "data"}}
}"#,
        );
        let cfg = load_config(&p).expect("load");
        assert_eq!(
            cfg.translation.domains,
            Some(Domains::One("Technical documentation.".into()))
        );
        assert_eq!(cfg.translation.tm_list, vec![TermPair::new("你好", "Hello")]);
        let terms = cfg.terminology.terms.expect("terms").into_pairs();
        assert_eq!(terms.len(), 2);
        assert!(terms.contains(&TermPair::new("模型", "model")));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let p = write(tmp.path(), "chunked-mt.toml", "");
        let cfg = load_config(&p).expect("load");
        assert!(cfg.api_key.is_none());
        assert!(cfg.translation.domains.is_none());
        assert!(cfg.chunking.target_tokens.is_none());
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let p = write(tmp.path(), "chunked-mt.toml", "[chunking\n");
        let err = load_config(&p).unwrap_err();
        assert!(format!("{err:#}").contains("parse config toml"));
    }

    #[test]
    fn blank_or_empty_domains_are_absent() {
        assert_eq!(Domains::One("   ".into()).first(), None);
        assert_eq!(Domains::Many(vec![]).first(), None);
        assert_eq!(Domains::Many(vec![" legal ".into()]).first(), Some("legal"));
    }

    #[test]
    fn finds_config_in_parent_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        let p = write(tmp.path(), DEFAULT_CONFIG_FILE, "");
        assert_eq!(find_file_upwards(&nested, DEFAULT_CONFIG_FILE, 8), Some(p));
        assert_eq!(find_file_upwards(&nested, DEFAULT_CONFIG_FILE, 1), None);
    }
}
