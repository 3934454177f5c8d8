//! Local PaddleOCR models run through `pure-onnx-ocr`.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ProviderOutput, TextProvider};
use crate::error::ProviderError;
use crate::models::config::LocalOcrConfig;

/// Height of a reading-order row in pixels.
const ROW_HEIGHT: f64 = 20.0;

/// OCR on the local machine. Unavailable until the model files exist.
pub struct LocalOcrProvider {
    config: LocalOcrConfig,
}

impl LocalOcrProvider {
    pub fn new(config: LocalOcrConfig) -> Self {
        Self { config }
    }

    fn model_files(&self) -> [std::path::PathBuf; 3] {
        [
            self.config.model_path(&self.config.detection_model),
            self.config.model_path(&self.config.recognition_model),
            self.config.model_path(&self.config.dictionary),
        ]
    }

    /// Decode an image and run detection plus recognition over it.
    ///
    /// Returns the text in reading order and the mean box confidence.
    pub fn recognize(&self, bytes: &[u8]) -> Result<(String, f32), ProviderError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| ProviderError::UnsupportedInput(e.to_string()))?;

        let [det, rec, dict] = self.model_files();
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det)
            .rec_model_path(&rec)
            .dictionary_path(&dict)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("local_ocr: {}", e)))?;

        let results = engine
            .run_from_image(&image)
            .map_err(|e| ProviderError::Request(format!("local_ocr: {}", e)))?;
        debug!("local OCR returned {} text regions", results.len());

        if results.is_empty() {
            return Err(ProviderError::EmptyText);
        }

        let mut boxes: Vec<(f64, f64, String, f32)> = results
            .iter()
            .map(|r| {
                let (x, y) = r
                    .bounding_box
                    .exterior()
                    .coords()
                    .next()
                    .map(|c| (c.x, c.y))
                    .unwrap_or((0.0, 0.0));
                (x, y, r.text.replace("[UNK]", " "), r.confidence as f32)
            })
            .collect();

        boxes.sort_by(|a, b| {
            let row_a = (a.1 / ROW_HEIGHT) as i64;
            let row_b = (b.1 / ROW_HEIGHT) as i64;
            row_a
                .cmp(&row_b)
                .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        });

        let confidence = boxes.iter().map(|b| b.3).sum::<f32>() / boxes.len() as f32;
        let text = boxes
            .iter()
            .map(|b| b.2.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok((text, confidence))
    }
}

#[async_trait]
impl TextProvider for LocalOcrProvider {
    fn name(&self) -> &'static str {
        "local_ocr"
    }

    fn is_available(&self) -> bool {
        self.model_files().iter().all(|p| p.exists())
    }

    async fn extract(
        &self,
        bytes: &[u8],
        _filename_hint: Option<&str>,
    ) -> Result<ProviderOutput, ProviderError> {
        let start = Instant::now();
        let data = bytes.to_vec();
        let provider = Self::new(self.config.clone());

        let (text, confidence) = tokio::task::spawn_blocking(move || provider.recognize(&data))
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))??;

        let elapsed = start.elapsed().as_millis() as u64;
        info!("Local OCR complete: {} chars in {}ms", text.len(), elapsed);
        Ok(ProviderOutput::new(text, confidence, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_unavailable_without_models() {
        let provider = LocalOcrProvider::new(LocalOcrConfig {
            model_dir: PathBuf::from("/nonexistent/ledgr-models"),
            ..Default::default()
        });
        assert!(!provider.is_available());
    }

    #[test]
    fn test_bad_image_is_unsupported() {
        let provider = LocalOcrProvider::new(LocalOcrConfig::default());
        assert!(matches!(
            provider.recognize(b"not an image"),
            Err(ProviderError::UnsupportedInput(_))
        ));
    }
}
