//! Reference template loading and caching.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use image::DynamicImage;

use crate::essence::Label;
use crate::vision::preprocess::{template_to_gray, Identity, Preprocessor};
use crate::vision::ncc::PreparedTemplate;

/// Image file extensions recognized as templates.
const TEMPLATE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp", "gif"];

/// Supplies the raw reference images for a label.
pub trait TemplateSource: Send + Sync {
    fn templates_for(&self, label: &str) -> Result<Vec<DynamicImage>>;
}

/// Templates stored on disk.
///
/// A label owns every image named `<label>*` directly inside the directory, plus
/// every image below the sub-directory `<label>/`.
#[derive(Clone, Debug)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Template file paths for `label`, sorted so load order is stable.
    pub fn paths_for(&self, label: &str) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        if self.dir.is_dir() {
            for entry in fs::read_dir(&self.dir)
                .with_context(|| format!("read template dir {}", self.dir.display()))?
            {
                let path = entry?.path();
                let matches_label = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(label));
                if matches_label && path.is_file() && is_template_file(&path) {
                    paths.push(path);
                }
            }
        }

        let sub_dir = self.dir.join(label);
        if sub_dir.is_dir() {
            collect_recursive(&sub_dir, &mut paths)?;
        }

        paths.sort();
        Ok(paths)
    }
}

fn is_template_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn collect_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_recursive(&path, out)?;
        } else if is_template_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

impl TemplateSource for DirectoryTemplates {
    fn templates_for(&self, label: &str) -> Result<Vec<DynamicImage>> {
        let mut images = Vec::new();
        for path in self.paths_for(label)? {
            match image::open(&path) {
                Ok(img) => images.push(img),
                Err(e) => tracing::warn!("Failed to decode template {}: {}", path.display(), e),
            }
        }
        Ok(images)
    }
}

/// Templates held in memory, keyed by label.
#[derive(Clone, Debug, Default)]
pub struct MemoryTemplates {
    images: HashMap<Label, Vec<DynamicImage>>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<Label>, image: DynamicImage) -> Self {
        self.insert(label, image);
        self
    }

    pub fn insert(&mut self, label: impl Into<Label>, image: DynamicImage) {
        self.images.entry(label.into()).or_default().push(image);
    }
}

impl TemplateSource for MemoryTemplates {
    fn templates_for(&self, label: &str) -> Result<Vec<DynamicImage>> {
        Ok(self.images.get(label).cloned().unwrap_or_default())
    }
}

/// Prepared templates of one label.
#[derive(Debug)]
pub struct LabelTemplates {
    pub label: Label,
    pub templates: Vec<PreparedTemplate>,
}

/// Lazily loads and caches the templates of a fixed label list.
///
/// Loading happens once, on first access. The cached list keeps the label
/// declaration order; labels without any template are logged and left out.
pub struct ReferenceTemplateStore {
    labels: Vec<Label>,
    source: Arc<dyn TemplateSource>,
    preprocessor: Arc<dyn Preprocessor>,
    loaded: OnceLock<Vec<LabelTemplates>>,
}

impl ReferenceTemplateStore {
    pub fn new(labels: Vec<Label>, source: Arc<dyn TemplateSource>) -> Self {
        Self {
            labels,
            source,
            preprocessor: Arc::new(Identity),
            loaded: OnceLock::new(),
        }
    }

    /// Same store with a different template transform. Drops any cached templates.
    pub fn with_preprocessor(self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        Self {
            labels: self.labels,
            source: self.source,
            preprocessor,
            loaded: OnceLock::new(),
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Templates of every recognizable label, loading them on first call.
    pub fn get(&self) -> &[LabelTemplates] {
        self.loaded.get_or_init(|| self.load())
    }

    fn load(&self) -> Vec<LabelTemplates> {
        let mut loaded = Vec::with_capacity(self.labels.len());
        for label in &self.labels {
            let images = match self.source.templates_for(label) {
                Ok(images) => images,
                Err(e) => {
                    tracing::warn!("Failed to load templates for {}: {:#}", label, e);
                    Vec::new()
                }
            };
            if images.is_empty() {
                tracing::warn!("No templates for label {}, it will never be recognized", label);
                continue;
            }
            let templates = images
                .iter()
                .map(|img| PreparedTemplate::new(&self.preprocessor.apply(template_to_gray(img))))
                .collect::<Vec<_>>();
            tracing::debug!("Loaded {} template(s) for {}", templates.len(), label);
            loaded.push(LabelTemplates {
                label: label.clone(),
                templates,
            });
        }
        loaded
    }
}
