use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

// CONFIGURATION STRUCTS
// config.json maps straight into these types; missing keys fall back to the defaults.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub vs_currency: String, // e.g., "usd"
    pub order: String,       // e.g., "market_cap_desc"
    pub per_page: u32,
    pub page: u32,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://api.coingecko.com/api/v3/coins/markets".to_string(),
            vs_currency: "usd".to_string(),
            order: "market_cap_desc".to_string(),
            per_page: 50,
            page: 1,
            request_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorkbookConfig {
    pub path: PathBuf,
    pub sheet_name: String,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Live_Crypto_Data.xlsx"),
            sheet_name: "Crypto Data".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub workbook: WorkbookConfig,
    pub poll_interval_secs: u64,
    pub top_n: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            workbook: WorkbookConfig::default(),
            poll_interval_secs: 300,
            top_n: 5,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Creates a manager whose directory sits next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// Creates a manager rooted at `base_dir`, creating the directory up front
    /// so later saves never have to check for it.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !fs::try_exists(&base_dir).await? {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    fn json_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// **Generic Save Function**
    /// Serializes `data` as pretty JSON. The bytes go to a .tmp file first and are
    /// then renamed over the target, so a crash mid-write leaves the old file valid.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.json_path(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    /// **Generic Load Function**
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json validates the bytes itself, no need for read_to_string.
        let content = fs::read(self.json_path(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Loads `filename`, or writes `T::default()` there and returns it when the file
    /// does not exist yet. A file that exists but fails to parse is an error.
    pub async fn load_or_init<T>(&self, filename: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        if fs::try_exists(self.json_path(filename)).await? {
            return self.load(filename).await;
        }

        let data = T::default();
        self.save(filename, &data).await?;
        Ok(data)
    }
}
