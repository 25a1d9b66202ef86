/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 是否无头模式运行浏览器
    pub headless: bool,
    /// 后端 API 基础地址
    pub api_base_url: String,
    /// 每个搜索词最多翻页数
    pub max_search_pages: usize,
    /// 页面加载最大重试次数
    pub max_page_retries: usize,
    /// 搜索阶段最大重试次数
    pub max_search_retries: usize,
    /// 详情阶段最大重试次数
    pub max_detail_retries: usize,
    /// 整体执行最大重试次数
    pub max_execution_retries: usize,
    /// 滑块验证码最大尝试次数
    pub max_captcha_attempts: usize,
    /// 并行搜索会话数（1 = 单会话顺序执行）
    pub parallel_sessions: usize,
    /// CSV 输出文件
    pub output_csv_file: String,
    /// 图片报告输出文件
    pub output_images_report: String,
    /// 通知方式: desktop / log / none
    pub notifier_kind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: false,
            api_base_url: "https://tiendaback.probusiness.pe".to_string(),
            max_search_pages: 1,
            max_page_retries: 3,
            max_search_retries: 3,
            max_detail_retries: 3,
            max_execution_retries: 3,
            max_captcha_attempts: 5,
            parallel_sessions: 1,
            output_csv_file: "alibaba_products_optimized.csv".to_string(),
            output_images_report: "alibaba_images_report.txt".to_string(),
            notifier_kind: "desktop".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(default.api_base_url),
            max_search_pages: std::env::var("MAX_SEARCH_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_search_pages),
            max_page_retries: std::env::var("MAX_PAGE_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_page_retries),
            max_search_retries: std::env::var("MAX_SEARCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_search_retries),
            max_detail_retries: std::env::var("MAX_DETAIL_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_detail_retries),
            max_execution_retries: std::env::var("MAX_EXECUTION_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_execution_retries),
            max_captcha_attempts: std::env::var("MAX_CAPTCHA_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_captcha_attempts),
            parallel_sessions: std::env::var("PARALLEL_SESSIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.parallel_sessions),
            output_csv_file: std::env::var("OUTPUT_CSV_FILE").unwrap_or(default.output_csv_file),
            output_images_report: std::env::var("OUTPUT_IMAGES_REPORT").unwrap_or(default.output_images_report),
            notifier_kind: std::env::var("NOTIFIER").unwrap_or(default.notifier_kind),
        }
    }

    /// 获取任务列表接口地址
    pub fn get_products_url(&self) -> String {
        format!("{}/api/getProductsToScrapping", self.api_base_url)
    }

    /// 标记完成接口地址
    pub fn mark_completed_url(&self) -> String {
        format!("{}/api/markProductsCompleted", self.api_base_url)
    }

    /// 单条产品提交接口地址
    pub fn send_products_url(&self) -> String {
        format!("{}/api/products", self.api_base_url)
    }

    /// JSON 镜像文件路径（与 CSV 同名）
    pub fn output_json_file(&self) -> String {
        self.output_csv_file.replace(".csv", ".json")
    }
}
