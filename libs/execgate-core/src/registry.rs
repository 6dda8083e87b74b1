use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

/// Container recipe for a language executed by the in-house sandbox runner
/// instead of the external judge. Purely data: adding a sandboxed language
/// is a registry entry, never a code change in the dispatch path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxProfile {
    pub image: String,
    pub source_file: String,
    pub run_cmd: Vec<String>,
}

/// Judge-facing parameters for a supported language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub id: u32,
    pub name: String,
    pub identifier: String,
    #[serde(rename = "cpuTimeLimit")]
    pub cpu_time_limit: f32,
    #[serde(rename = "memoryLimit")]
    pub memory_limit_kb: u32,
    #[serde(rename = "enableNetwork")]
    pub enable_network: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxProfile>,
}

const DEFAULT_CPU_TIME_LIMIT: f32 = 5.0;
const DEFAULT_MEMORY_LIMIT_KB: u32 = 512_000;

fn judge_language(id: u32, name: &str, identifier: &str) -> LanguageConfig {
    LanguageConfig {
        id,
        name: name.to_string(),
        identifier: identifier.to_string(),
        cpu_time_limit: DEFAULT_CPU_TIME_LIMIT,
        memory_limit_kb: DEFAULT_MEMORY_LIMIT_KB,
        enable_network: false,
        sandbox: None,
    }
}

/// Open registry mapping case-insensitive language identifiers to
/// configurations. Reads are concurrent; add/remove are rare administrative
/// writes behind the same lock. Unknown identifiers return `None` rather
/// than an error -- the orchestrator turns that into an execution failure.
pub struct LanguageRegistry {
    languages: RwLock<HashMap<String, LanguageConfig>>,
}

impl LanguageRegistry {
    pub fn new(entries: Vec<LanguageConfig>) -> Self {
        let languages = entries
            .into_iter()
            .map(|config| (config.identifier.to_lowercase(), config))
            .collect();
        LanguageRegistry {
            languages: RwLock::new(languages),
        }
    }

    /// The default language table: the judge's compiler/runtime ids, with Go
    /// additionally carrying a sandbox profile for container execution.
    pub fn with_defaults() -> Self {
        let mut go = judge_language(60, "Go", "go");
        go.sandbox = Some(SandboxProfile {
            image: "golang:1.21-alpine".to_string(),
            source_file: "main.go".to_string(),
            run_cmd: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cd /app && go mod init main >/dev/null 2>&1; go run main.go".to_string(),
            ],
        });

        Self::new(vec![
            go,
            judge_language(62, "Java", "java"),
            judge_language(54, "C++ (GCC 9.2.0)", "cpp"),
            judge_language(50, "C (GCC 9.2.0)", "c"),
            judge_language(73, "Rust", "rust"),
            judge_language(71, "Python (3.8.1)", "python"),
            judge_language(63, "JavaScript (Node.js 12.14.0)", "javascript"),
            judge_language(74, "TypeScript (3.7.4)", "typescript"),
            judge_language(51, "C# (Mono 6.6.0.161)", "csharp"),
            judge_language(68, "PHP (7.4.1)", "php"),
            judge_language(72, "Ruby (2.7.0)", "ruby"),
            judge_language(83, "Swift (5.2.3)", "swift"),
            judge_language(78, "Kotlin (1.3.70)", "kotlin"),
            judge_language(81, "Scala (2.13.2)", "scala"),
        ])
    }

    pub fn get(&self, identifier: &str) -> Option<LanguageConfig> {
        let normalized = identifier.to_lowercase();
        let languages = self.languages.read().unwrap_or_else(|e| e.into_inner());
        let config = languages.get(&normalized).cloned();

        if config.is_none() {
            let mut known: Vec<&String> = languages.keys().collect();
            known.sort();
            warn!(
                language = identifier,
                normalized = %normalized,
                supported = ?known,
                "Unsupported language requested"
            );
        }

        config
    }

    pub fn is_supported(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    /// Owned copies; mutating the returned Vec never affects the registry.
    pub fn list(&self) -> Vec<LanguageConfig> {
        let languages = self.languages.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<LanguageConfig> = languages.values().cloned().collect();
        list.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        list
    }

    pub fn add(&self, config: LanguageConfig) {
        let key = config.identifier.to_lowercase();
        info!(identifier = %key, judge_id = config.id, "Language added to registry");
        let mut languages = self.languages.write().unwrap_or_else(|e| e.into_inner());
        languages.insert(key, config);
    }

    pub fn remove(&self, identifier: &str) -> bool {
        let key = identifier.to_lowercase();
        let mut languages = self.languages.write().unwrap_or_else(|e| e.into_inner());
        let removed = languages.remove(&key).is_some();
        if removed {
            info!(identifier = %key, "Language removed from registry");
        }
        removed
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
