//! Decorative-image heuristic.
//!
//! Corporate PDFs repeat the same small logo on every page. Describing it
//! costs a paid request and adds nothing to the transcript, so images that
//! look like a logo are skipped before any service call. The classifier is a
//! pure function of a few grayscale statistics; false positives and negatives
//! are expected.
//!
//! An image counts as decorative when ALL of:
//!
//! | statistic | rule |
//! |-----------|------|
//! | aspect ratio | 0.8 < w/h < 1.2 |
//! | mean brightness | > 200 (0–255) |
//! | brightness std-dev | < 60 |
//! | size | width < 300 and height < 300 |

use image::DynamicImage;
use tracing::warn;

/// Grayscale statistics the heuristic runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub mean_brightness: f64,
    pub std_brightness: f64,
}

impl ImageStats {
    /// Compute statistics over the luma (8-bit grayscale) channel.
    pub fn from_image(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let n = (width as u64 * height as u64) as f64;

        if n == 0.0 {
            return Self {
                width,
                height,
                mean_brightness: 0.0,
                std_brightness: 0.0,
            };
        }

        let (sum, sum_sq) = gray.as_raw().iter().fold((0f64, 0f64), |(s, sq), &p| {
            let v = p as f64;
            (s + v, sq + v * v)
        });
        let mean = sum / n;
        // Population variance; clamp rounding noise below zero.
        let variance = (sum_sq / n - mean * mean).max(0.0);

        Self {
            width,
            height,
            mean_brightness: mean,
            std_brightness: variance.sqrt(),
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Thresholds of the decorative-image rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoFilter {
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_mean_brightness: f64,
    pub max_std_brightness: f64,
    pub max_side: u32,
}

impl Default for LogoFilter {
    fn default() -> Self {
        Self {
            min_aspect: 0.8,
            max_aspect: 1.2,
            min_mean_brightness: 200.0,
            max_std_brightness: 60.0,
            max_side: 300,
        }
    }
}

impl LogoFilter {
    pub fn classify(&self, stats: &ImageStats) -> bool {
        let aspect = stats.aspect_ratio();
        aspect > self.min_aspect
            && aspect < self.max_aspect
            && stats.mean_brightness > self.min_mean_brightness
            && stats.std_brightness < self.max_std_brightness
            && stats.width < self.max_side
            && stats.height < self.max_side
    }

    /// Classify an already-decoded image.
    pub fn is_decorative_image(&self, image: &DynamicImage) -> bool {
        self.classify(&ImageStats::from_image(image))
    }

    /// Classify raw image bytes.
    ///
    /// Undecodable bytes are reported as not decorative: the image is sent
    /// for analysis rather than silently dropped.
    pub fn is_decorative(&self, image_bytes: &[u8]) -> bool {
        match image::load_from_memory(image_bytes) {
            Ok(image) => self.is_decorative_image(&image),
            Err(e) => {
                warn!("Logo detection could not decode image: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Grayscale image alternating `mean - spread` / `mean + spread` in a
    /// checkerboard, giving exactly that mean and standard deviation.
    fn checker(w: u32, h: u32, mean: u8, spread: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([mean - spread])
            } else {
                Luma([mean + spread])
            }
        }))
    }

    fn png(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn stats_of_checkerboard() {
        let stats = ImageStats::from_image(&checker(100, 100, 200, 20));
        assert_eq!((stats.width, stats.height), (100, 100));
        assert!((stats.mean_brightness - 200.0).abs() < 1e-9);
        assert!((stats.std_brightness - 20.0).abs() < 1e-9);
    }

    #[test]
    fn small_bright_flat_square_is_decorative() {
        // 100×100, mean ≈ 250 (255 is the ceiling of u8), std 5.
        let img = checker(100, 100, 250, 5);
        assert!(LogoFilter::default().is_decorative(&png(&img)));

        let stats = ImageStats {
            width: 100,
            height: 100,
            mean_brightness: 255.0,
            std_brightness: 5.0,
        };
        assert!(LogoFilter::default().classify(&stats));
    }

    #[test]
    fn large_dark_busy_image_is_not_decorative() {
        let stats = ImageStats {
            width: 800,
            height: 600,
            mean_brightness: 120.0,
            std_brightness: 80.0,
        };
        assert!(!LogoFilter::default().classify(&stats));
        assert!(!LogoFilter::default().is_decorative(&png(&checker(800, 600, 120, 80))));
    }

    #[test]
    fn corrupt_bytes_fail_open() {
        assert!(!LogoFilter::default().is_decorative(b"definitely not an image"));
        assert!(!LogoFilter::default().is_decorative(&[]));
    }

    #[test]
    fn each_rule_can_veto() {
        let f = LogoFilter::default();
        let base = ImageStats {
            width: 240,
            height: 240,
            mean_brightness: 220.0,
            std_brightness: 10.0,
        };
        assert!(f.classify(&base));
        assert!(!f.classify(&ImageStats { width: 120, ..base }));
        assert!(!f.classify(&ImageStats { mean_brightness: 200.0, ..base }));
        assert!(!f.classify(&ImageStats { std_brightness: 60.0, ..base }));
        assert!(!f.classify(&ImageStats { width: 300, height: 300, ..base }));
    }
}
