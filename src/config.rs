use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::models::Credentials;

/// 会话池允许的最小 / 最大会话数
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 5;

/// 运行模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 打开帖子，收集图片链接，输出 JSON
    #[default]
    Discover,
    /// 读取 JSON，下载图片
    Download,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discover" => Ok(RunMode::Discover),
            "download" => Ok(RunMode::Download),
            other => Err(ConfigError::InvalidValue {
                name: "HARVEST_MODE".to_string(),
                value: other.to_string(),
                expected_type: "discover | download".to_string(),
            }),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: RunMode,
    /// 并行会话数量（会被限制在 1-5）
    pub worker_count: usize,
    /// 帖子列表文件，每行一个 URL
    pub post_list_file: String,
    /// 发现阶段输出的 JSON 文件
    pub discovery_output: String,
    /// 是否额外写一份纯文本结果
    pub write_text_report: bool,
    /// 下载阶段读取的 JSON 文件
    pub download_input: String,
    /// 图片保存目录
    pub output_dir: String,
    // --- 浏览器配置 ---
    pub headless: bool,
    pub chrome_executable: Option<String>,
    /// 设置后连接已有浏览器，而不是自己启动
    pub browser_debug_port: Option<u16>,
    // --- 账号 ---
    pub fb_email: Option<String>,
    pub fb_password: Option<String>,
    pub fb_cookie_c_user: Option<String>,
    pub fb_cookie_xs: Option<String>,
    pub request_timeout_secs: u64,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::Discover,
            worker_count: 3,
            post_list_file: "posts.txt".to_string(),
            discovery_output: "image_urls.json".to_string(),
            write_text_report: true,
            download_input: "image_urls.json".to_string(),
            output_dir: "downloads".to_string(),
            headless: true,
            chrome_executable: None,
            browser_debug_port: None,
            fb_email: None,
            fb_password: None,
            fb_cookie_c_user: None,
            fb_cookie_xs: None,
            request_timeout_secs: 30,
            output_log_file: "harvest_log.txt".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认值 → `HARVEST_CONFIG` 指向的 TOML → 环境变量
    pub fn load() -> AppResult<Self> {
        match std::env::var("HARVEST_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?.with_env_overrides(),
            Err(_) => Self::from_env(),
        }
    }

    /// 默认值 → 环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::File(FileError::TomlParseFailed { source, .. }) => {
                AppError::File(FileError::TomlParseFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        let d = self;
        Ok(Self {
            mode: env_parse("HARVEST_MODE")?.unwrap_or(d.mode),
            worker_count: env_parse("WORKER_COUNT")?.unwrap_or(d.worker_count),
            post_list_file: std::env::var("POST_LIST_FILE").unwrap_or(d.post_list_file),
            discovery_output: std::env::var("DISCOVERY_OUTPUT").unwrap_or(d.discovery_output),
            write_text_report: env_parse("WRITE_TEXT_REPORT")?.unwrap_or(d.write_text_report),
            download_input: std::env::var("DOWNLOAD_INPUT").unwrap_or(d.download_input),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(d.output_dir),
            headless: env_parse("HEADLESS")?.unwrap_or(d.headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(d.chrome_executable),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT")?.or(d.browser_debug_port),
            fb_email: std::env::var("FB_EMAIL").ok().or(d.fb_email),
            fb_password: std::env::var("FB_PASSWORD").ok().or(d.fb_password),
            fb_cookie_c_user: std::env::var("FB_COOKIE_C_USER").ok().or(d.fb_cookie_c_user),
            fb_cookie_xs: std::env::var("FB_COOKIE_XS").ok().or(d.fb_cookie_xs),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(d.request_timeout_secs),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(d.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING")?.unwrap_or(d.verbose_logging),
        })
    }

    /// 实际使用的会话数
    pub fn effective_workers(&self) -> usize {
        clamp_workers(self.worker_count)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 凭据优先级：cookie > 账号密码；都没有则匿名
    pub fn credentials(&self) -> Option<Credentials> {
        if let (Some(c_user), Some(xs)) = (&self.fb_cookie_c_user, &self.fb_cookie_xs) {
            if !c_user.is_empty() && !xs.is_empty() {
                return Some(Credentials::Cookies {
                    c_user: c_user.clone(),
                    xs: xs.clone(),
                });
            }
        }
        match (&self.fb_email, &self.fb_password) {
            (Some(identity), Some(secret)) if !identity.is_empty() && !secret.is_empty() => {
                Some(Credentials::Login {
                    identity: identity.clone(),
                    secret: secret.clone(),
                })
            }
            _ => None,
        }
    }
}

pub fn clamp_workers(requested: usize) -> usize {
    requested.clamp(MIN_WORKERS, MAX_WORKERS)
}

fn env_parse<T: FromStr>(name: &str) -> AppResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::Config(ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw.clone(),
                expected_type: std::any::type_name::<T>().to_string(),
            })
        }),
        Err(_) => Ok(None),
    }
}
