//! Region classifier with dual confidence thresholds.

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GrayImage};

use crate::essence::Label;
use crate::vision::preprocess::{region_to_gray, Identity, Preprocessor};
use crate::vision::ncc::IntegralImage;
use crate::vision::templates::{ReferenceTemplateStore, TemplateSource};
use crate::vision::RecognitionError;

/// Scores at or above this are confident matches.
pub const HIGH_THRESH: f32 = 0.75;
/// Scores below this are reported as unrecognized.
pub const LOW_THRESH: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    High,
    Low,
    Unrecognized,
}

/// Result of classifying one region.
///
/// `score` is reported even when no label is returned.
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub label: Option<Label>,
    pub score: f32,
    pub confidence: Confidence,
}

impl Recognition {
    /// Nothing matched at all (no templates, or none fit the region).
    pub fn unrecognized() -> Self {
        Self {
            label: None,
            score: f32::NEG_INFINITY,
            confidence: Confidence::Unrecognized,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.label.is_some()
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({:.3})", label, self.score),
            None => write!(f, "? ({:.3})", self.score),
        }
    }
}

/// Matches regions against the templates of a fixed, ordered label list.
///
/// Ties go to the label declared first.
pub struct Recognizer {
    name: String,
    store: ReferenceTemplateStore,
    region_preprocessor: Arc<dyn Preprocessor>,
    high_thresh: f32,
    low_thresh: f32,
}

impl Recognizer {
    pub fn new(name: impl Into<String>, labels: Vec<Label>, source: Arc<dyn TemplateSource>) -> Self {
        Self {
            name: name.into(),
            store: ReferenceTemplateStore::new(labels, source),
            region_preprocessor: Arc::new(Identity),
            high_thresh: HIGH_THRESH,
            low_thresh: LOW_THRESH,
        }
    }

    pub fn with_thresholds(mut self, high: f32, low: f32) -> Self {
        self.high_thresh = high;
        self.low_thresh = low;
        self
    }

    /// Sets the transforms applied to captured regions and to templates at load time.
    pub fn with_preprocessing(
        mut self,
        region: impl Preprocessor + 'static,
        template: impl Preprocessor + 'static,
    ) -> Self {
        self.region_preprocessor = Arc::new(region);
        self.store = self.store.with_preprocessor(Arc::new(template));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[Label] {
        self.store.labels()
    }

    pub fn low_thresh(&self) -> f32 {
        self.low_thresh
    }

    /// Loads templates now instead of on first classification.
    ///
    /// Returns the number of labels that can be recognized.
    pub fn load_templates(&self) -> usize {
        let count = self.store.get().len();
        tracing::info!(
            "[{}] {} of {} labels have templates",
            self.name,
            count,
            self.store.labels().len()
        );
        count
    }

    /// The region exactly as it is compared against templates.
    pub fn preprocess(&self, region: &DynamicImage) -> Result<GrayImage, RecognitionError> {
        Ok(self.region_preprocessor.apply(region_to_gray(region)?))
    }

    /// Classifies a captured region.
    pub fn classify(&self, region: &DynamicImage) -> Result<Recognition, RecognitionError> {
        let gray = region_to_gray(region)?;
        Ok(self.classify_gray(gray))
    }

    /// Classifies a region already converted to grayscale.
    pub fn classify_gray(&self, region: GrayImage) -> Recognition {
        let region = self.region_preprocessor.apply(region);
        let integral = IntegralImage::new(&region);

        let mut best_label: Option<&Label> = None;
        let mut best_score = f32::NEG_INFINITY;

        for entry in self.store.get() {
            for template in &entry.templates {
                let Some(score) = integral.best_match(template) else {
                    tracing::warn!(
                        "[{}] template {}x{} for {} larger than region {}x{}, skipped",
                        self.name,
                        template.width(),
                        template.height(),
                        entry.label,
                        region.width(),
                        region.height()
                    );
                    continue;
                };
                tracing::trace!("[{}] {}: {:.4}", self.name, entry.label, score);
                if score > best_score {
                    best_score = score;
                    best_label = Some(&entry.label);
                }
            }
        }

        let Some(label) = best_label else {
            return Recognition::unrecognized();
        };

        if best_score >= self.high_thresh {
            Recognition {
                label: Some(label.clone()),
                score: best_score,
                confidence: Confidence::High,
            }
        } else if best_score >= self.low_thresh {
            tracing::warn!("[{}] low confidence: {} ({:.3})", self.name, label, best_score);
            Recognition {
                label: Some(label.clone()),
                score: best_score,
                confidence: Confidence::Low,
            }
        } else {
            tracing::warn!(
                "[{}] unrecognized, best was {} ({:.3})",
                self.name,
                label,
                best_score
            );
            Recognition {
                label: None,
                score: best_score,
                confidence: Confidence::Unrecognized,
            }
        }
    }
}
