// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Detection orchestrator: image in, typed records out
//!
//! Validates the upload, builds the kind-specific prompt, calls the vision
//! oracle, and normalizes whatever text comes back. An oracle reply the
//! normalizer cannot make sense of is an empty detection, not an error.
//! Only input validation and the oracle call itself can fail.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use image::GenericImageView;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PromptConfig;
use crate::gemini::Oracle;
use crate::normalize::{self, InventoryItem, ProduceItem, RowFilter};
use crate::{PantryscanError, Result};

/// Default upload size ceiling (10 MiB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Detection pipeline shared by the web handlers and the CLI
pub struct Detector {
    oracle: Arc<dyn Oracle>,
    prompts: PromptConfig,
    filter: RowFilter,
    max_image_bytes: usize,
}

struct ImagePayload {
    base64: String,
    mime_type: &'static str,
}

impl Detector {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        prompts: PromptConfig,
        filter: RowFilter,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            oracle,
            prompts,
            filter,
            max_image_bytes,
        }
    }

    /// Detect grocery items in an image
    pub async fn detect_inventory(&self, image: &[u8]) -> Result<Vec<InventoryItem>> {
        let payload = self.prepare(image)?;
        let prompt = render_prompt(&self.prompts.items);

        let text = self
            .oracle
            .generate(&prompt, &payload.base64, payload.mime_type)
            .await?;
        debug!("Oracle returned {} characters", text.len());

        let items = normalize::normalize(&text, &self.filter);
        info!("Detected {} inventory items", items.len());
        Ok(items)
    }

    /// Assess the freshness of produce in an image
    pub async fn detect_freshness(&self, image: &[u8]) -> Result<Vec<ProduceItem>> {
        let payload = self.prepare(image)?;
        let prompt = render_prompt(&self.prompts.freshness);

        let text = self
            .oracle
            .generate(&prompt, &payload.base64, payload.mime_type)
            .await?;
        debug!("Oracle returned {} characters", text.len());

        let produce = normalize::normalize(&text, &self.filter);
        info!("Detected {} produce items", produce.len());
        Ok(produce)
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Validate and encode the image for the oracle
    fn prepare(&self, image: &[u8]) -> Result<ImagePayload> {
        if image.is_empty() {
            return Err(PantryscanError::InvalidImage(
                "Uploaded file is empty. Please upload a valid image.".to_string(),
            ));
        }
        if image.len() > self.max_image_bytes {
            return Err(PantryscanError::ImageTooLarge {
                size: image.len(),
                limit: self.max_image_bytes,
            });
        }

        match prepare_image(image) {
            Ok(jpeg) => Ok(ImagePayload {
                base64: general_purpose::STANDARD.encode(&jpeg),
                mime_type: "image/jpeg",
            }),
            Err(e) => {
                warn!("Image re-encode failed: {}, sending raw bytes", e);
                Ok(ImagePayload {
                    base64: general_purpose::STANDARD.encode(image),
                    mime_type: "image/jpeg",
                })
            }
        }
    }
}

/// Substitute the per-request timestamp into a prompt template
fn render_prompt(template: &str) -> String {
    template.replace("{timestamp}", &Utc::now().to_rfc3339())
}

/// Downscale large images for faster oracle round-trips
fn prepare_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;

    // Resize if too large (max 1024px on longest side)
    let img = if img.width() > 1024 || img.height() > 1024 {
        img.resize(1024, 1024, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    // Convert to JPEG for consistent encoding
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    img.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

    Ok(buffer)
}
