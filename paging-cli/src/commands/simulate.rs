//! Page through a synthetic source.
//!
//! The synthetic source serves `pages` pages keyed by page index. It can
//! be told to return empty pages that still name a next key, to fail
//! every Nth call, and to sleep a random amount before answering. The
//! command plays the renderer: it prints each fused update, scrolls to
//! the end of the list whenever an append is allowed, and retries
//! failed loads.

use anyhow::{bail, Result};
use async_trait::async_trait;
use pagekit_client::{
    EqCallback, ListDiffer, Pager, PagingConfig, PagingSource, PagingUpdate, RenderSignal,
};
use pagekit_types::{LoadError, LoadParams, LoadResult, LoadState, PagingEvent};
use rand::Rng;
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the stream may stay silent before the run is abandoned.
const STALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Options of the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    /// Pages the source holds.
    pub pages: u64,
    /// Page size override.
    pub page_size: Option<usize>,
    /// Every Nth page is empty.
    pub empty_every: Option<u64>,
    /// Every Nth call fails.
    pub fail_every: Option<u64>,
    /// Append request limit.
    pub appends: Option<usize>,
    /// Retry limit.
    pub max_retries: u32,
    /// Upper bound of the per-call delay.
    pub jitter_ms: u64,
    /// JSON output.
    pub json: bool,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            pages: 5,
            page_size: None,
            empty_every: None,
            fail_every: None,
            appends: None,
            max_retries: 3,
            jitter_ms: 0,
            json: false,
        }
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Items in the final list.
    pub items: usize,
    /// Version of the final list.
    pub version: u64,
    /// Append requests issued.
    pub appends: usize,
    /// Retries issued.
    pub retries: u32,
    /// Calls the source answered.
    pub source_calls: u64,
}

/// Source serving numbered pages of strings.
struct SyntheticSource {
    pages: u64,
    empty_every: Option<u64>,
    fail_every: Option<u64>,
    jitter_ms: u64,
    calls: AtomicU64,
}

impl SyntheticSource {
    fn new(args: &SimulateArgs) -> Self {
        Self {
            pages: args.pages,
            empty_every: args.empty_every.filter(|n| *n > 0),
            fail_every: args.fail_every.filter(|n| *n > 0),
            jitter_ms: args.jitter_ms,
            calls: AtomicU64::new(0),
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn page(&self, key: u64, page_size: usize) -> Vec<String> {
        let empty = self.empty_every.is_some_and(|n| (key + 1) % n == 0);
        if empty || key >= self.pages {
            return Vec::new();
        }
        (0..page_size).map(|i| format!("item-{}-{}", key, i)).collect()
    }
}

#[async_trait]
impl PagingSource<u64, String> for SyntheticSource {
    async fn load(&self, params: LoadParams<u64>) -> LoadResult<u64, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.jitter_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=self.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_every.is_some_and(|n| call % n == 0) {
            return LoadResult::failure(LoadError::message(format!(
                "synthetic failure on call {}",
                call
            )));
        }

        let next_key = (params.key + 1 < self.pages).then_some(params.key + 1);
        LoadResult::success(self.page(params.key, params.page_size), next_key)
    }
}

/// Run the simulate command.
pub async fn run<W: Write>(
    paging: PagingConfig,
    args: &SimulateArgs,
    out: &mut W,
) -> Result<Summary> {
    let paging = match args.page_size {
        Some(size) => paging.with_page_size(size),
        None => paging,
    };
    paging.validate()?;

    let source = Arc::new(SyntheticSource::new(args));
    let pager: Pager<u64, String> = Pager::new(Arc::clone(&source), 0, paging);
    let (collector, mut updates) = pager.flow(ListDiffer::new(EqCallback), RenderSignal::new());

    let append_limit = args.appends.unwrap_or(usize::MAX);
    let mut appends = 0;
    let mut retries = 0;

    loop {
        let update = match tokio::time::timeout(STALL_TIMEOUT, updates.recv()).await {
            Ok(Some(update)) => update,
            Ok(None) => bail!("Update stream closed unexpectedly"),
            Err(_) => bail!("No update for {:?}, paging stalled", STALL_TIMEOUT),
        };
        print_update(out, &update, args.json)?;

        let Some(event) = update.event() else {
            continue;
        };
        let states = event.item.states();
        if states.is_loading() {
            continue;
        }

        if let Some(load_type) = states.failure_load_type() {
            if retries >= args.max_retries {
                bail!("{} kept failing after {} retries", load_type, retries);
            }
            retries += 1;
            tracing::debug!("Retrying {} (attempt {})", load_type, retries);
            collector.retry()?;
            continue;
        }

        if states.is_fully() || appends >= append_limit {
            break;
        }
        if states.is_allow_append() {
            appends += 1;
            let len = collector.snapshot().items.len();
            if len == 0 {
                collector.append()?;
            } else {
                collector.on_item_visible(len - 1)?;
            }
        }
    }

    let snapshot = collector.snapshot();
    collector.close()?;

    let summary = Summary {
        items: snapshot.items.len(),
        version: snapshot.version.value(),
        appends,
        retries,
        source_calls: source.calls(),
    };
    print_summary(out, &summary, args.json)?;
    Ok(summary)
}

fn print_update<W: Write>(out: &mut W, update: &PagingUpdate<String>, as_json: bool) -> Result<()> {
    let Some(event) = update.event() else {
        if as_json {
            writeln!(out, "{}", json!({ "type": "scroll_to_first" }))?;
        } else {
            writeln!(out, "scroll to first")?;
        }
        return Ok(());
    };

    let (kind, detail) = match &event.item {
        PagingEvent::LoadStateUpdate { load_type, .. } => ("state", load_type.to_string()),
        PagingEvent::LoadDataSuccess {
            data, load_type, ..
        } => ("data", format!("{} +{}", load_type, data.len())),
        PagingEvent::ListStateUpdate { op, .. } => ("local", op.kind().to_string()),
    };
    let states = event.item.states();

    if as_json {
        let line = json!({
            "type": kind,
            "version": event.version.value(),
            "detail": detail,
            "changes": update.changes().len(),
            "refresh": describe(&states.refresh),
            "append": describe(&states.append),
        });
        writeln!(out, "{}", line)?;
    } else {
        writeln!(
            out,
            "v{:<4} {:<6} {:<14} changes={:<3} refresh={} append={}",
            event.version,
            kind,
            detail,
            update.changes().len(),
            describe(&states.refresh),
            describe(&states.append),
        )?;
    }
    Ok(())
}

fn print_summary<W: Write>(out: &mut W, summary: &Summary, as_json: bool) -> Result<()> {
    if as_json {
        let line = json!({
            "type": "summary",
            "items": summary.items,
            "version": summary.version,
            "appends": summary.appends,
            "retries": summary.retries,
            "source_calls": summary.source_calls,
        });
        writeln!(out, "{}", line)?;
    } else {
        writeln!(
            out,
            "loaded {} items (version {}, {} appends, {} retries, {} source calls)",
            summary.items, summary.version, summary.appends, summary.retries, summary.source_calls
        )?;
    }
    Ok(())
}

fn describe(state: &LoadState) -> String {
    match state {
        LoadState::Incomplete => "incomplete".to_string(),
        LoadState::Loading => "loading".to_string(),
        LoadState::Success { is_fully: true } => "done".to_string(),
        LoadState::Success { is_fully: false } => "success".to_string(),
        LoadState::Failure(err) => format!("failed({})", err),
    }
}
