// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Pantryscan

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::normalize::RowFilter;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Upload handling settings
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Filler-row filter for the table fallback parser
    #[serde(default)]
    pub normalizer: RowFilter,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by the CORS layer (the dev frontend ports)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; `GOOGLE_API_KEY` / `GEMINI_API_KEY` env vars take precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    /// Item detection prompt; `{timestamp}` is substituted per request
    #[serde(default = "default_items_prompt")]
    pub items: String,
    /// Freshness assessment prompt; `{timestamp}` is substituted per request
    #[serde(default = "default_freshness_prompt")]
    pub freshness: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: String,
    /// Keep a copy of accepted uploads under `dir` (served at /uploads)
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }
fn default_engine_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String { "gemini-2.0-flash".to_string() }
fn default_timeout() -> u64 { 60 }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_true() -> bool { true }
fn default_max_size_mb() -> u64 { 10 }

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_items_prompt() -> String {
    "You are a grocery item detector. Analyze this image and identify all grocery items, \
     food products, and household items visible.\n\
     \n\
     For each distinct item:\n\
     1. Identify the item name\n\
     2. Count how many instances of this item are present\n\
     \n\
     INSTRUCTIONS:\n\
     - Focus only on grocery items, food products, and household goods\n\
     - Be specific with item descriptions (e.g., \"Red Apple\" not just \"Apple\")\n\
     - Count items accurately, including multiples of the same item\n\
     - When multiple similar items are in a package, count the package as 1 item\n\
     \n\
     FORMAT YOUR RESPONSE AS A VALID JSON ARRAY ONLY:\n\
     [\n\
       {\n\
         \"itemName\": \"Item Name\",\n\
         \"count\": number,\n\
         \"timestamp\": \"{timestamp}\"\n\
       }\n\
     ]\n\
     \n\
     DO NOT include any explanatory text or markdown formatting - ONLY the JSON array."
        .to_string()
}

fn default_freshness_prompt() -> String {
    "You are a produce freshness expert. Analyze this image and identify all fresh produce \
     items like fruits and vegetables.\n\
     \n\
     For each produce item:\n\
     1. Identify the specific type (e.g., \"Gala Apple\" rather than just \"Apple\")\n\
     2. Assess its current freshness state in detail\n\
     3. Provide an estimate of remaining shelf life in days\n\
     \n\
     ASSESSMENT GUIDELINES:\n\
     - Be detailed in your freshness assessment (color, texture, visible signs)\n\
     - Provide specific shelf life estimates (e.g., \"3-4 days\" not \"a few days\")\n\
     - Consider normal storage conditions\n\
     - If produce appears overripe, note this clearly\n\
     \n\
     FORMAT YOUR RESPONSE AS A VALID JSON ARRAY ONLY:\n\
     [\n\
       {\n\
         \"produce\": \"Produce Type\",\n\
         \"freshness\": \"Detailed freshness assessment\",\n\
         \"expectedLifespan\": \"X days\",\n\
         \"timestamp\": \"{timestamp}\"\n\
       }\n\
     ]\n\
     \n\
     DO NOT include any explanatory text or markdown formatting - ONLY the JSON array.\n\
     If no fresh produce is found, return an empty array []."
        .to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ai_engine: EngineConfig::default(),
            prompts: PromptConfig::default(),
            uploads: UploadConfig::default(),
            normalizer: RowFilter::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            items: default_items_prompt(),
            freshness: default_freshness_prompt(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            persist: true,
            max_size_mb: default_max_size_mb(),
        }
    }
}

impl EngineConfig {
    /// Resolve the API key: environment variables win over the config file
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .or_else(|| self.api_key.clone())
    }

    /// Resolve the model name, honoring the `GEMINI_MODEL` override
    pub fn resolve_model(&self) -> String {
        std::env::var("GEMINI_MODEL").unwrap_or_else(|_| self.model.clone())
    }
}

impl UploadConfig {
    /// Upload size ceiling in bytes
    pub fn max_bytes(&self) -> usize {
        (self.max_size_mb as usize) * 1024 * 1024
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::PantryscanError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
