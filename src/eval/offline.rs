//! Deterministic offline stand-ins for the external collaborators.
//!
//! [`OfflineRenderer`] lays documents out with a simple typographic model
//! instead of a real rasterizer, and [`OfflineEvaluator`] scores pages
//! with a legibility heuristic instead of a vision-language model. They
//! let the search loop run end to end (CLI, benches, demos) with zero
//! external services, and they are deterministic per (document, config)
//! pair so caching stays valid.

use crate::schema::RenderingConfig;

use super::{BenchmarkTask, Document, EvalFailure, EvaluationResult, PageImage, Renderer};

/// A4 page size in points.
const PAGE_W_PT: f64 = 595.0;
const PAGE_H_PT: f64 = 842.0;

/// Renders documents with an approximate typographic layout model.
#[derive(Debug, Default)]
pub struct OfflineRenderer;

impl OfflineRenderer {
    /// Characters that fit on one page under this config.
    fn chars_per_page(config: &RenderingConfig) -> f64 {
        let font_size = config.float("font_size").unwrap_or(10.0).max(1.0);
        let line_height = config.float("line_height").unwrap_or(1.2).max(0.5);
        let margin = config.float("margin_pt").unwrap_or(20.0).max(0.0);
        let h_scale = config.float("horizontal_scale").unwrap_or(1.0).max(0.1);
        let density = config.float("glyph_density").unwrap_or(0.6);

        let usable_w = (PAGE_W_PT - 2.0 * margin).max(1.0);
        let usable_h = (PAGE_H_PT - 2.0 * margin).max(1.0);

        let char_w = 0.6 * font_size * h_scale;
        let line_pt = font_size * line_height;

        let per_line = usable_w / char_w.max(0.1);
        let lines = usable_h / line_pt.max(0.1);

        // Density target packs glyphs tighter or looser around the
        // nominal layout.
        (per_line * lines * (0.5 + density)).max(1.0)
    }
}

impl Renderer for OfflineRenderer {
    fn render(
        &self,
        document: &Document,
        config: &RenderingConfig,
    ) -> Result<Vec<PageImage>, EvalFailure> {
        if document.text.is_empty() {
            return Err(EvalFailure::MalformedInput(format!(
                "document {} is empty",
                document.id
            )));
        }

        let dpi = config.int("dpi").unwrap_or(72).max(1) as f64;
        let width = (PAGE_W_PT / 72.0 * dpi).round() as u32;
        let height = (PAGE_H_PT / 72.0 * dpi).round() as u32;

        let chars = document.text.chars().count() as f64;
        let per_page = Self::chars_per_page(config);
        let pages = (chars / per_page).ceil().max(1.0) as usize;

        // Thumbnail payload only: a full-resolution raster is the real
        // renderer's job.
        let ink = match config.choice("color_mode") {
            Some("grayscale") => 96u8,
            Some("high-contrast") => 0u8,
            _ => 32u8,
        };
        let coverage = (chars / (per_page * pages as f64)).clamp(0.0, 1.0);

        let mut out = Vec::with_capacity(pages);
        for page in 0..pages {
            let mut data = vec![255u8; 64 * 64];
            let filled = if page + 1 == pages {
                (64.0 * 64.0 * coverage) as usize
            } else {
                64 * 64
            };
            for px in data.iter_mut().take(filled) {
                *px = ink;
            }
            out.push(PageImage {
                width,
                height,
                data,
            });
        }
        Ok(out)
    }
}

/// Scores pages with a deterministic legibility model: glyphs that map to
/// too few pixels lose accuracy, and compression falls as page area in
/// vision tokens grows relative to the text-token baseline.
#[derive(Debug, Default)]
pub struct OfflineEvaluator;

/// Approximate vision-transformer patch edge in pixels.
const PATCH_PX: f64 = 28.0;

/// Approximate characters per text token.
const CHARS_PER_TOKEN: f64 = 4.0;

impl super::Evaluator for OfflineEvaluator {
    fn evaluate(
        &self,
        pages: &[PageImage],
        task: &BenchmarkTask,
    ) -> Result<EvaluationResult, EvalFailure> {
        if pages.is_empty() {
            return Err(EvalFailure::MalformedInput(format!(
                "no pages rendered for task {}",
                task.id
            )));
        }

        let chars = task.document.text.chars().count().max(1) as f64;
        let page_area: f64 = pages
            .iter()
            .map(|p| f64::from(p.width) * f64::from(p.height))
            .sum();

        // Pixels available per character tell us how legible the glyphs
        // are to the model.
        let px_per_char = page_area / chars;
        let glyph_px = (px_per_char * 0.5).sqrt();
        let accuracy = logistic((glyph_px - 14.0) / 4.0).clamp(0.0, 1.0);

        let text_tokens = chars / CHARS_PER_TOKEN;
        let vision_tokens: f64 = pages
            .iter()
            .map(|p| (f64::from(p.width) / PATCH_PX) * (f64::from(p.height) / PATCH_PX))
            .sum();
        let compression_ratio = (1.0 - vision_tokens / text_tokens).clamp(0.0, 1.0);

        let latency_ms = pages.len() as f64 * 40.0 + vision_tokens * 0.02;

        Ok(EvaluationResult {
            accuracy,
            compression_ratio,
            latency_ms,
            pages: pages.len(),
        })
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
