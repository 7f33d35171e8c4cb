use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日誌輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 終端機用的精簡單行格式
    #[default]
    Compact,
    /// 排程執行時輸出 JSON，方便集中收集
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

/// 沒有設定 RUST_LOG 時使用的過濾規則
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "postventa_import=debug,info"
    } else {
        "postventa_import=info,warn"
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// 安裝全域 subscriber。已經安裝過時保留原本的設定，回傳 false。
pub fn init_logger(format: LogFormat, verbose: bool) -> bool {
    let (compact, json) = match format {
        LogFormat::Compact => (Some(fmt::layer().with_target(verbose).compact()), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_current_span(false).with_span_list(false)),
        ),
    };

    tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(compact)
        .with(json)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for verbose in [false, true] {
            let directives = default_directives(verbose);
            assert!(directives.starts_with("postventa_import="));
            assert!(EnvFilter::try_new(directives).is_ok());
        }
        assert!(default_directives(true).contains("debug"));
        assert!(!default_directives(false).contains("debug"));
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Compact);
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_logger(LogFormat::Compact, false);
        assert!(!init_logger(LogFormat::Json, true));
    }
}
