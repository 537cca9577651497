use crate::utils::error::{PredictError, MAX_UPLOAD_BYTES};
use crate::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型来源（路径或 URL），为空时服务以未就绪状态运行
    pub model_source: Option<String>,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 存储配置
    pub store_config: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 单次推理超时
    pub inference_timeout: Duration,

    /// 上传文件大小上限（字节）
    pub max_upload_size: usize,
}

impl ServerConfig {
    /// multipart 边界和头部的额外开销，body 上限略大于文件上限，
    /// 这样刚好超限的文件能被精确识别为 TooLarge
    pub const MULTIPART_OVERHEAD: usize = 16 * 1024;

    pub fn body_limit(&self) -> usize {
        self.max_upload_size + Self::MULTIPART_OVERHEAD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Firestore,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// 预测记录所在集合
    pub collection: String,

    pub firestore_project: Option<String>,

    pub firestore_database: String,

    /// 静态访问令牌；为空时从元数据服务器获取
    pub firestore_token: Option<String>,

    /// 单次写入超时
    pub write_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            collection: "predictions".to_string(),
            firestore_project: None,
            firestore_database: "(default)".to_string(),
            firestore_token: None,
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_source: Option<String>,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        if bind_addr.trim().is_empty() {
            return Err(PredictError::Config("Bind address must not be empty".to_string()));
        }

        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores).max(1);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            inference_timeout: Duration::from_secs(30),
            max_upload_size: MAX_UPLOAD_BYTES,
        };

        let model_source = model_source.filter(|s| !s.trim().is_empty());

        Ok(Self {
            bind_addr,
            model_source,
            workers,
            dev_mode,
            onnx_config,
            server_config,
            store_config: StoreConfig::default(),
        })
    }

    pub fn with_store(mut self, store_config: StoreConfig) -> Result<Self> {
        if store_config.kind == StoreKind::Firestore && store_config.firestore_project.is_none() {
            return Err(PredictError::Config(
                "Firestore store requires a project id".to_string(),
            ));
        }
        self.store_config = store_config;
        Ok(self)
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.server_config.inference_timeout = timeout;
        self
    }
}
