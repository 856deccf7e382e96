//! Per-job orchestration: detection, adapter selection, kit expansion, then
//! per-entity fan-out through analysis, normalization, and composition into
//! the final ImportReport. Entity failures stay entity-scoped; only an
//! unreadable or empty bundle fails the job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::adapters::{self, EntityKind, RawEntity};
use crate::analyze::{self, remote::RemoteClassifier};
use crate::bundle::SourceBundle;
use crate::compose::{self, PageInputs, SharedChrome};
use crate::detect::{self, DetectionResult};
use crate::error::ImportError;
use crate::extract;
use crate::kit;
use crate::normalize;
use crate::report::{ImportItemResult, ImportReport, Issue, Outcome, Stage};
use crate::schema::{Block, BlockType, CandidateBlock};

const ENTITY_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Detecting,
    Extracting,
    Analyzing,
    Normalizing,
    Composing,
    Completed,
    Failed,
}

struct Job {
    id: String,
    state: JobState,
}

impl Job {
    fn new(id: &str) -> Job {
        Job {
            id: id.to_string(),
            state: JobState::Detecting,
        }
    }

    fn advance(&mut self, next: JobState) {
        info!("job {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

/// One entity's passage through the pipeline. Scratch state scoped to this
/// job run; nothing survives into the report except the composed page and
/// its issues.
struct Work {
    source_id: String,
    entity: Option<RawEntity>,
    failure: Option<Issue>,
    cancelled: bool,
    header: Option<CandidateBlock>,
    footer: Option<CandidateBlock>,
    body: Vec<CandidateBlock>,
    header_block: Option<Block>,
    footer_block: Option<Block>,
    blocks: Vec<Block>,
    issues: Vec<Issue>,
}

impl Work {
    fn pending(entity: RawEntity) -> Work {
        Work {
            source_id: entity.source_id.clone(),
            entity: Some(entity),
            failure: None,
            cancelled: false,
            header: None,
            footer: None,
            body: Vec::new(),
            header_block: None,
            footer_block: None,
            blocks: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn failed(error: &ImportError) -> Work {
        let source_id = match error {
            ImportError::AdapterExtractionFailed { source_id, .. } => source_id.clone(),
            other => other.to_string(),
        };
        Work {
            source_id,
            entity: None,
            failure: Some(
                Issue::new(Stage::Extracting, "adapter extraction failed")
                    .with_detail(error.to_string()),
            ),
            cancelled: false,
            header: None,
            footer: None,
            body: Vec::new(),
            header_block: None,
            footer_block: None,
            blocks: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// Run one import job end to end. `cancel` stops fan-out of new entity work
/// promptly; entities already in flight finish so no half-normalized block is
/// ever emitted.
pub async fn run(
    bundle: &SourceBundle,
    job_id: &str,
    cancel: Arc<AtomicBool>,
) -> Result<ImportReport, ImportError> {
    let started_at = Utc::now();
    let mut job = Job::new(job_id);

    let detection = detect::detect(bundle);
    info!(
        "job {}: platform {:?} (confidence {:.2})",
        job.id, detection.platform, detection.confidence
    );

    job.advance(JobState::Extracting);
    let (mut works, shared, assets) = match extract_entities(bundle, &detection) {
        Ok(parts) => parts,
        Err(error) => {
            job.advance(JobState::Failed);
            return Err(error);
        }
    };
    if works.is_empty() {
        job.advance(JobState::Failed);
        return Err(ImportError::BundleUnreadable(format!(
            "{}: no entities extracted",
            bundle.root.display()
        )));
    }

    job.advance(JobState::Analyzing);
    analyze_entities(&mut works, &cancel).await;

    job.advance(JobState::Normalizing);
    let platform = detection.platform;
    works.par_iter_mut().for_each(|work| {
        if work.entity.is_none() || work.cancelled {
            return;
        }
        let slug = work
            .entity
            .as_ref()
            .and_then(|e| e.attr("slug"))
            .unwrap_or(&work.source_id)
            .to_string();
        let mut counter = 0;
        if let Some(candidate) = work.header.take() {
            let n = normalize::normalize_tree(candidate, platform, &slug, &mut counter);
            work.issues.extend(n.issues);
            work.header_block = Some(n.block);
        }
        for candidate in std::mem::take(&mut work.body) {
            let n = normalize::normalize_tree(candidate, platform, &slug, &mut counter);
            work.issues.extend(n.issues);
            work.blocks.push(n.block);
        }
        if let Some(candidate) = work.footer.take() {
            let n = normalize::normalize_tree(candidate, platform, &slug, &mut counter);
            work.issues.extend(n.issues);
            work.footer_block = Some(n.block);
        }
    });

    job.advance(JobState::Composing);
    let items: Vec<ImportItemResult> = works
        .into_iter()
        .map(|work| compose_item(work, &shared))
        .collect();

    job.advance(JobState::Completed);
    let summary = ImportReport::summarize(&items);
    Ok(ImportReport {
        job_id: job.id,
        platform: detection
            .platform
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| "unknown".into()),
        started_at,
        finished_at: Utc::now(),
        items,
        assets,
        summary,
    })
}

/// Kit expansion runs before the adapter so kit payloads arrive as discrete
/// page candidates; the adapter then covers everything else in the bundle.
fn extract_entities(
    bundle: &SourceBundle,
    detection: &DetectionResult,
) -> Result<(Vec<Work>, SharedChrome, Vec<String>), ImportError> {
    let mut results = Vec::new();
    for doc in bundle.json_docs() {
        if kit::is_kit(&doc.content) {
            if let Some(entities) = kit::unbundle(&doc.name, &doc.content) {
                results.extend(entities.into_iter().map(Ok));
            }
        }
    }
    let adapter = adapters::select_adapter(detection);
    results.extend(adapter.extract(bundle));

    let mut works = Vec::new();
    let mut shared = SharedChrome::new();
    let mut assets = Vec::new();

    for result in results {
        match result {
            Ok(entity) => match entity.kind {
                EntityKind::Page => works.push(Work::pending(entity)),
                EntityKind::Section => {
                    if let Some((id, block)) = normalize_shared_chrome(&entity, detection) {
                        shared.insert(id, block);
                    }
                }
                EntityKind::Asset => {
                    if !assets.contains(&entity.source_id) {
                        assets.push(entity.source_id);
                    }
                }
            },
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!("entity extraction failed: {}", error);
                works.push(Work::failed(&error));
            }
        }
    }
    Ok((works, shared, assets))
}

/// Shared kit chrome is normalized once and attached by reference at
/// composition, so every page referencing it sees identical content.
fn normalize_shared_chrome(
    entity: &RawEntity,
    detection: &DetectionResult,
) -> Option<(String, Block)> {
    let markup = entity.raw_markup.as_deref()?;
    let kind = entity.attr(kit::CHROME_KIND_ATTR)?;
    let candidate = match kind {
        "header" => extract::chrome::detect_header(markup).0.unwrap_or_else(|| {
            CandidateBlock::new(Some(BlockType::Header), 0.5)
                .with_prop("title", extract::strip_tags(markup))
        }),
        _ => extract::chrome::detect_footer(markup).0.unwrap_or_else(|| {
            CandidateBlock::new(Some(BlockType::Footer), 0.5)
                .with_prop("text", extract::strip_tags(markup))
        }),
    };
    let mut counter = 0;
    let n = normalize::normalize_tree(candidate, detection.platform, &entity.source_id, &mut counter);
    Some((entity.source_id.clone(), n.block))
}

/// Streaming fan-out: one task per entity behind a semaphore,
/// results funneled back over a channel and written into their slot by index
/// so report ordering matches the bundle's entity ordering.
async fn analyze_entities(works: &mut [Work], cancel: &Arc<AtomicBool>) {
    let remote = Arc::new(RemoteClassifier::from_env());
    let semaphore = Arc::new(Semaphore::new(ENTITY_CONCURRENCY));
    let total = works.iter().filter(|w| w.entity.is_some()).count();

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len}")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    type Analyzed = (
        usize,
        Option<CandidateBlock>,
        Option<CandidateBlock>,
        Vec<CandidateBlock>,
        usize,
    );
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Analyzed>(ENTITY_CONCURRENCY * 2);

    for (idx, work) in works.iter_mut().enumerate() {
        let Some(entity) = work.entity.clone() else {
            continue;
        };
        // Cancellation stops new fan-out; already-spawned entities run to
        // completion below.
        if cancel.load(Ordering::SeqCst) {
            work.cancelled = true;
            continue;
        }

        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let remote = Arc::clone(&remote);
        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let (header, footer, candidates) = candidates_for(&entity);
            let mut analyzed = Vec::with_capacity(candidates.len());
            let mut fallbacks = 0;
            for candidate in candidates {
                let analysis = analyze::analyze(candidate, remote.as_ref().as_ref()).await;
                if analysis.fallback_used {
                    fallbacks += 1;
                }
                analyzed.push(analysis.block);
            }
            let _ = tx.send((idx, header, footer, analyzed, fallbacks)).await;
        });
    }
    drop(tx);

    while let Some((idx, header, footer, body, fallbacks)) = rx.recv().await {
        let work = &mut works[idx];
        work.header = header;
        work.footer = footer;
        work.body = body;
        if fallbacks > 0 {
            work.issues.push(
                Issue::new(
                    Stage::Analyzing,
                    "classification service unavailable, local rules used",
                )
                .with_detail(format!("{} fragment(s)", fallbacks)),
            );
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
}

/// Product entities carry their fields as adapter attributes; everything else
/// goes through the markup extractors.
fn candidates_for(
    entity: &RawEntity,
) -> (Option<CandidateBlock>, Option<CandidateBlock>, Vec<CandidateBlock>) {
    if entity.attr("entity_type") == Some("product") {
        let mut product = CandidateBlock::new(Some(BlockType::Product), 1.0)
            .with_prop("title", entity.attr("product_title").unwrap_or_default())
            .with_prop("price", entity.attr("product_price").unwrap_or("0"));
        if let Some(image) = entity.attr("product_image") {
            product = product.with_prop("imageUrl", image);
        }
        let mut body = vec![product];

        let description = entity
            .raw_markup
            .as_deref()
            .map(extract::strip_tags)
            .unwrap_or_default();
        if !description.is_empty() {
            body.push(
                CandidateBlock::new(Some(BlockType::Text), analyze::STRUCTURAL)
                    .with_prop("text", description),
            );
        }
        return (None, None, body);
    }

    let markup = entity.raw_markup.as_deref().unwrap_or_default();
    let extracted = extract::extract_page(markup);
    (extracted.header, extracted.footer, extracted.body)
}

fn compose_item(work: Work, shared: &SharedChrome) -> ImportItemResult {
    if let Some(issue) = work.failure {
        return ImportItemResult {
            source_id: work.source_id,
            outcome: Outcome::Failed,
            page: None,
            issues: vec![issue],
        };
    }
    if work.cancelled {
        return ImportItemResult {
            source_id: work.source_id,
            outcome: Outcome::Skipped,
            page: None,
            issues: vec![Issue::new(
                Stage::Analyzing,
                "job cancelled before entity was processed",
            )],
        };
    }

    let entity = work.entity.expect("pending work always has an entity");
    let slug = entity
        .attr("slug")
        .unwrap_or(&work.source_id)
        .to_string();
    let title = entity.attr("title").unwrap_or(&slug).to_string();

    let mut issues = work.issues;
    let inputs = PageInputs {
        slug: slug.clone(),
        title,
        blocks: work.blocks,
        header: work.header_block,
        footer: work.footer_block,
        shared_header_ref: entity.attr(kit::SHARED_HEADER_ATTR).map(String::from),
        shared_footer_ref: entity.attr(kit::SHARED_FOOTER_ATTR).map(String::from),
    };

    match compose::compose(inputs, shared, &mut issues) {
        Ok(page) => {
            let outcome = if issues.is_empty() {
                Outcome::Imported
            } else {
                Outcome::PartiallyImported
            };
            ImportItemResult {
                source_id: work.source_id,
                outcome,
                page: Some(page),
                issues,
            }
        }
        Err(error) => {
            issues.push(
                Issue::new(Stage::Composing, "page has no content blocks")
                    .with_detail(error.to_string()),
            );
            ImportItemResult {
                source_id: work.source_id,
                outcome: Outcome::Skipped,
                page: None,
                issues,
            }
        }
    }
}
