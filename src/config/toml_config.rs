use crate::core::driver::{ImportSettings, DEFAULT_BATCH_SIZE};
use crate::core::loader::DEFAULT_CHUNK_SIZE;
use crate::core::mapper::DEFAULT_IMPORT_DATE_FIELD;
use crate::core::purge::PurgeSettings;
use crate::core::reconciler::DuplicateCheckPolicy;
use crate::domain::target::ImportTarget;
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{
    validate_delimiter, validate_non_empty_string, validate_positive_number, validate_unique,
    validate_url, Validate,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "postventa-import.toml";

static ENV_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub purge: PurgeSection,
    /// 追加或覆寫內建的匯入目標 (以 name 比對)
    #[serde(default)]
    pub targets: Vec<ImportTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
    pub timeout_seconds: Option<u64>,
}

fn default_schema_path() -> String {
    "/rest/v1".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            schema_path: default_schema_path(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub batch_pause_ms: u64,
    pub chunk_pause_ms: u64,
    pub delimiter: String,
    pub import_date_field: String,
    pub duplicate_check_failure: DuplicateCheckPolicy,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_pause_ms: 10,
            chunk_pause_ms: 1,
            delimiter: ";".to_string(),
            import_date_field: DEFAULT_IMPORT_DATE_FIELD.to_string(),
            duplicate_check_failure: DuplicateCheckPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeSection {
    pub batch_size: usize,
    pub max_attempts: usize,
    pub pause_ms: u64,
}

impl Default for PurgeSection {
    fn default() -> Self {
        let defaults = PurgeSettings::default();
        Self {
            batch_size: defaults.batch_size,
            max_attempts: defaults.max_attempts,
            pause_ms: defaults.pause.as_millis() as u64,
        }
    }
}

/// 命令列參數優先於設定檔
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub chunk_size: Option<usize>,
    pub store_url: Option<String>,
    pub api_key: Option<String>,
}

impl ImportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SUPABASE_KEY})，未設定的保持原樣
    pub fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(batch_size) = overrides.batch_size {
            self.import.batch_size = batch_size;
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.import.chunk_size = chunk_size;
        }
        if let Some(url) = &overrides.store_url {
            self.store.url = url.clone();
        }
        if let Some(api_key) = &overrides.api_key {
            self.store.api_key = api_key.clone();
        }
    }

    pub fn import_settings(&self) -> Result<ImportSettings> {
        Ok(ImportSettings {
            batch_size: self.import.batch_size,
            chunk_size: self.import.chunk_size,
            batch_pause: Duration::from_millis(self.import.batch_pause_ms),
            chunk_pause: Duration::from_millis(self.import.chunk_pause_ms),
            delimiter: validate_delimiter("import.delimiter", &self.import.delimiter)?,
            import_date_field: self.import.import_date_field.clone(),
            duplicate_policy: self.import.duplicate_check_failure,
        })
    }

    pub fn purge_settings(&self) -> PurgeSettings {
        PurgeSettings {
            batch_size: self.purge.batch_size,
            max_attempts: self.purge.max_attempts,
            pause: Duration::from_millis(self.purge.pause_ms),
            ..PurgeSettings::default()
        }
    }

    /// 內建目標加上設定檔中的目標；同名時以設定檔為準
    pub fn targets(&self) -> Vec<ImportTarget> {
        let mut targets = ImportTarget::builtin();
        for custom in &self.targets {
            match targets.iter_mut().find(|t| t.name == custom.name) {
                Some(existing) => *existing = custom.clone(),
                None => targets.push(custom.clone()),
            }
        }
        targets
    }

    pub fn target(&self, name: &str) -> Result<ImportTarget> {
        self.targets()
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ImportError::UnknownTarget {
                name: name.to_string(),
            })
    }

    /// 只檢查匯入參數與目標定義，不需要資料庫連線資訊
    pub fn validate_pipeline(&self) -> Result<()> {
        validate_positive_number("import.batch_size", self.import.batch_size, 1)?;
        validate_positive_number("import.chunk_size", self.import.chunk_size, 1)?;
        validate_delimiter("import.delimiter", &self.import.delimiter)?;
        validate_non_empty_string("import.import_date_field", &self.import.import_date_field)?;
        validate_positive_number("purge.batch_size", self.purge.batch_size, 1)?;
        validate_positive_number("purge.max_attempts", self.purge.max_attempts, 1)?;

        validate_unique("targets", self.targets.iter().map(|t| t.name.as_str()))?;
        for target in &self.targets {
            target.validate()?;
        }
        Ok(())
    }

    pub fn validate_store(&self) -> Result<()> {
        validate_url("store.url", &self.store.url)?;
        if self.store.api_key.trim().is_empty() {
            return Err(ImportError::MissingConfigError {
                field: "store.api_key".to_string(),
            });
        }
        if let Some(timeout) = self.store.timeout_seconds {
            validate_positive_number("store.timeout_seconds", timeout as usize, 1)?;
        }
        Ok(())
    }
}

impl Validate for ImportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_store()?;
        self.validate_pipeline()
    }
}
