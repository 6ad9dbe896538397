use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::cache::{CacheRecord, CrawlCache, Outcome};
use crate::db::EntryStore;
use crate::errlog::ErrorLog;
use crate::error::{ItemError, PersistenceError};
use crate::fetcher::Fetch;
use crate::graph::{LangLinks, LinkGraph};
use crate::parser::{self, Parsed};
use crate::resume::find_resume_point;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Ignore every "already done" signal and fetch again.
    pub force_redo: bool,
    /// IDs processed between checkpoints.
    pub commit_interval: usize,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            force_redo: false,
            commit_interval: 1000,
            progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub start: i64,
    pub processed: usize,
    pub skipped: usize,
    pub fetched: usize,
    pub from_cache: usize,
    pub created: usize,
    pub existing: usize,
    pub empty: usize,
    pub errors: usize,
    pub checkpoints: usize,
}

/// What happened to one PRID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Already in the store, the snapshot, or the cache as error/empty.
    Skipped,
    Created,
    /// Parsed, but an entry was already stored (only reachable with force-redo).
    Existing,
    Empty,
    Failed,
}

/// Sequential, checkpointed ingestion over a PRID range.
///
/// Per ID: check → fetch (or replay from cache) → parse → stage entry and
/// links. Every `commit_interval` IDs the store is flushed and then the
/// snapshot saved. Nothing staged survives a crash before the next checkpoint;
/// the cache is written through, so redone IDs are replayed without refetching.
pub struct Ingestor<S: EntryStore, F: Fetch> {
    store: S,
    fetcher: F,
    cache: CrawlCache,
    graph: LinkGraph,
    errors: ErrorLog,
    opts: IngestOptions,
    since_checkpoint: usize,
    stats: IngestStats,
}

impl<S: EntryStore, F: Fetch> Ingestor<S, F> {
    pub fn new(
        store: S,
        fetcher: F,
        cache: CrawlCache,
        graph: LinkGraph,
        errors: ErrorLog,
        opts: IngestOptions,
    ) -> Self {
        Ingestor {
            store,
            fetcher,
            cache,
            graph,
            errors,
            opts,
            since_checkpoint: 0,
            stats: IngestStats::default(),
        }
    }

    /// Ingest `[begin, end)`, starting from the resume point, and finish with
    /// a checkpoint regardless of interval alignment.
    pub fn run(&mut self, begin: i64, end: i64) -> Result<IngestStats> {
        let start = if self.opts.force_redo {
            begin
        } else {
            find_resume_point(begin, end, |id| self.is_visited(id))?
        };
        self.stats.start = start;
        info!(begin, end, start, "Starting crawl");

        let pb = if self.opts.progress {
            ProgressBar::new(end.saturating_sub(start).max(0) as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        for id in start..end {
            self.advance(id)?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        self.checkpoint(end)?;
        Ok(self.stats.clone())
    }

    /// Process one ID and checkpoint if the interval is reached.
    pub fn advance(&mut self, id: i64) -> Result<Step> {
        let step = self.step(id)?;
        self.stats.processed += 1;
        self.since_checkpoint += 1;
        if self.since_checkpoint >= self.opts.commit_interval.max(1) {
            self.checkpoint(id)?;
        }
        Ok(step)
    }

    /// Flush staged entries, then persist the snapshot. Failures here are fatal.
    pub fn checkpoint(&mut self, position: i64) -> Result<()> {
        self.store.flush()?;
        self.graph.save()?;
        self.since_checkpoint = 0;
        self.stats.checkpoints += 1;
        info!(position, "Committing to DB @ {}", position);
        Ok(())
    }

    /// Entry stored or snapshot membership. Probe used by the resume search.
    fn is_visited(&self, id: i64) -> Result<bool, PersistenceError> {
        Ok(self.graph.has(id) || self.store.contains(id)?)
    }

    /// Done when visited, or when the cache holds an error/empty outcome. In
    /// the latter case the snapshot gets its empty entry back, since a crash
    /// may have lost it after the cache write.
    fn is_done(&mut self, id: i64) -> Result<bool> {
        if self.is_visited(id)? {
            return Ok(true);
        }
        let cached = matches!(
            self.cache.outcome(id)?,
            Some(Outcome::Error) | Some(Outcome::Empty)
        );
        if cached {
            self.graph.set(id, LangLinks::new());
        }
        Ok(cached)
    }

    pub fn step(&mut self, id: i64) -> Result<Step> {
        if !self.opts.force_redo && self.is_done(id)? {
            debug!(id, "Idx({}) exists", id);
            self.stats.skipped += 1;
            return Ok(Step::Skipped);
        }

        let Some(html) = self.raw_document(id)? else {
            return Ok(Step::Failed);
        };

        match parser::parse_article(id, &html) {
            Ok(Parsed::Empty) => {
                self.cache.record(id, &CacheRecord::Empty)?;
                self.graph.set(id, LangLinks::new());
                self.stats.empty += 1;
                info!(id, "PIB({}) found empty", id);
                Ok(Step::Empty)
            }
            Ok(Parsed::Article(article)) => match self.store.insert_if_absent(&article.entry()) {
                Ok(created) => {
                    self.graph.set(id, article.links);
                    if created {
                        self.stats.created += 1;
                        info!(id, lang = %article.lang, "PIB({}) properly parsed", id);
                        Ok(Step::Created)
                    } else {
                        self.stats.existing += 1;
                        debug!(id, "PIB({}) already stored, kept as is", id);
                        Ok(Step::Existing)
                    }
                }
                Err(e @ PersistenceError::Unavailable(_)) => Err(e.into()),
                // Not marked attempted: the next run replays it from the cache.
                Err(e) => {
                    self.report(ItemError::new(id, e))?;
                    Ok(Step::Failed)
                }
            },
            Err(e) => {
                self.mark_failed(id)?;
                self.report(ItemError::new(id, e))?;
                Ok(Step::Failed)
            }
        }
    }

    /// Cached document if one was fetched before, otherwise one network attempt.
    fn raw_document(&mut self, id: i64) -> Result<Option<String>> {
        if !self.opts.force_redo {
            if let Some(CacheRecord::Success(html)) = self.cache.lookup(id)? {
                self.stats.from_cache += 1;
                debug!(id, "replaying from cache");
                return Ok(Some(html));
            }
        }
        match self.fetcher.fetch(id) {
            Ok(html) => {
                self.cache.record(id, &CacheRecord::Success(html.clone()))?;
                self.stats.fetched += 1;
                Ok(Some(html))
            }
            Err(e) => {
                self.mark_failed(id)?;
                self.report(ItemError::new(id, e))?;
                Ok(None)
            }
        }
    }

    fn mark_failed(&mut self, id: i64) -> Result<()> {
        self.cache.record(id, &CacheRecord::Error)?;
        self.graph.set(id, LangLinks::new());
        Ok(())
    }

    fn report(&mut self, err: ItemError) -> Result<()> {
        warn!(id = err.id, "{}", err);
        self.stats.errors += 1;
        self.errors.append(err.id)
    }
}

#[cfg(test)]
impl<S: EntryStore, F: Fetch> Ingestor<S, F> {
    fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    fn cache(&self) -> &CrawlCache {
        &self.cache
    }

    fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::db::{self, SqliteStore};
    use crate::errlog;
    use crate::error::FetchError;
    use crate::parser::tests::release_html;

    /// Serves canned documents; anything else is a 404.
    struct MapFetcher {
        docs: HashMap<i64, String>,
        calls: RefCell<Vec<i64>>,
    }

    impl MapFetcher {
        fn new(docs: HashMap<i64, String>) -> Self {
            MapFetcher { docs, calls: RefCell::new(Vec::new()) }
        }

        fn calls(&self) -> Vec<i64> {
            self.calls.borrow().clone()
        }
    }

    impl Fetch for MapFetcher {
        fn fetch(&self, id: i64) -> Result<String, FetchError> {
            self.calls.borrow_mut().push(id);
            self.docs.get(&id).cloned().ok_or(FetchError::Status(404))
        }
    }

    fn doc(id: i64) -> String {
        let hindi = (id + 1000).to_string();
        release_html(
            &format!("<p>Release number {} on the national programme for rural roads.</p>", id),
            "15 JUN 2020 03:45PM by PIB New Delhi",
            &[("Hindi", hindi.as_str())],
        )
    }

    fn docs(range: std::ops::Range<i64>) -> HashMap<i64, String> {
        range.map(|id| (id, doc(id))).collect()
    }

    struct Paths {
        _dir: tempfile::TempDir,
        prefix: PathBuf,
    }

    impl Paths {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let prefix = dir.path().join("crawl");
            Paths { _dir: dir, prefix }
        }

        fn prefix(&self) -> &str {
            self.prefix.to_str().unwrap()
        }

        fn db(&self) -> String {
            format!("{}.entries.sqlite", self.prefix())
        }

        fn errors(&self) -> PathBuf {
            ErrorLog::path_for(self.prefix())
        }
    }

    fn open(
        paths: &Paths,
        docs: HashMap<i64, String>,
        opts: IngestOptions,
    ) -> Ingestor<SqliteStore, MapFetcher> {
        let store = SqliteStore::new(db::connect(&paths.db()).unwrap()).unwrap();
        Ingestor::new(
            store,
            MapFetcher::new(docs),
            CrawlCache::open(paths.prefix()).unwrap(),
            LinkGraph::load(LinkGraph::snapshot_path(paths.prefix())).unwrap(),
            ErrorLog::open(paths.errors()).unwrap(),
            opts,
        )
    }

    fn interval(n: usize) -> IngestOptions {
        IngestOptions { commit_interval: n, ..Default::default() }
    }

    fn stored_ids(paths: &Paths) -> Vec<i64> {
        db::entry_ids(&db::connect(&paths.db()).unwrap()).unwrap()
    }

    #[test]
    fn missing_content_isolated_to_its_id() {
        let paths = Paths::new();
        let mut d = docs(100..106);
        d.insert(102, "<html><body><div class=\"ReleaseLang\"></div></body></html>".into());

        let mut ing = open(&paths, d, interval(2));
        let stats = ing.run(100, 106).unwrap();

        assert_eq!(stats.created, 5);
        assert_eq!(stats.errors, 1);
        assert_eq!(ing.cache().outcome(102).unwrap(), Some(Outcome::Error));
        assert!(ing.graph().has(102));
        assert!(ing.graph().get(102).unwrap().is_empty());
        drop(ing);

        assert_eq!(stored_ids(&paths), vec![100, 101, 103, 104, 105]);
        assert!(errlog::read_ids(paths.errors()).unwrap().contains(&102));
    }

    #[test]
    fn posted_on_stub_creates_no_entry() {
        let paths = Paths::new();
        let mut d = docs(1..3);
        d.insert(2, "<html><body><div id=\"PdfDiv\">Posted On:</div></body></html>".into());

        let mut ing = open(&paths, d, interval(10));
        let stats = ing.run(1, 3).unwrap();
        assert_eq!(stats.empty, 1);
        assert_eq!(ing.cache().outcome(2).unwrap(), Some(Outcome::Empty));
        drop(ing);
        assert_eq!(stored_ids(&paths), vec![1]);
    }

    #[test]
    fn links_staged_into_snapshot() {
        let paths = Paths::new();
        let mut d = HashMap::new();
        d.insert(
            10,
            release_html(
                "<p>The Cabinet approved the new scheme for farmers today.</p>",
                "15 JUN 2020 03:45PM by PIB Delhi",
                &[("Hindi", "55"), ("Tamil", "56")],
            ),
        );
        let mut ing = open(&paths, d, interval(10));
        ing.run(10, 11).unwrap();
        drop(ing);

        let g = LinkGraph::load(LinkGraph::snapshot_path(paths.prefix())).unwrap();
        let links = g.get(10).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links["Hindi"], "55");
        assert_eq!(links["Tamil"], "56");
    }

    #[test]
    fn second_run_is_a_no_op() {
        let paths = Paths::new();
        let first = {
            let mut ing = open(&paths, docs(0..20), interval(7));
            ing.run(0, 20).unwrap();
            let conn = db::connect(&paths.db()).unwrap();
            (0..20)
                .map(|id| db::get_entry(&conn, id).unwrap())
                .collect::<Vec<_>>()
        };

        let mut ing = open(&paths, docs(0..20), interval(7));
        let stats = ing.run(0, 20).unwrap();
        assert!(ing.fetcher().calls().is_empty());
        assert_eq!(stats.created, 0);
        assert_eq!(stats.start, 20);
        drop(ing);

        let conn = db::connect(&paths.db()).unwrap();
        let second: Vec<_> = (0..20).map(|id| db::get_entry(&conn, id).unwrap()).collect();
        assert_eq!(first, second);
        assert_eq!(stored_ids(&paths), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn crash_between_checkpoints() {
        let paths = Paths::new();
        {
            let mut ing = open(&paths, docs(0..10), interval(3));
            for id in 0..5 {
                ing.advance(id).unwrap();
            }
            // 3 and 4 are staged but not checkpointed; drop without a final checkpoint.
        }

        assert_eq!(stored_ids(&paths), vec![0, 1, 2]);
        let g = LinkGraph::load(LinkGraph::snapshot_path(paths.prefix())).unwrap();
        assert!(g.has(2) && !g.has(3) && !g.has(4));

        let mut ing = open(&paths, docs(0..10), interval(3));
        let stats = ing.run(0, 10).unwrap();
        assert_eq!(stats.start, 3);
        // In-flight IDs come back from the cache, not the network.
        assert_eq!(ing.fetcher().calls(), vec![5, 6, 7, 8, 9]);
        assert_eq!(stats.from_cache, 2);
        drop(ing);

        assert_eq!(stored_ids(&paths), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn checkpoints_follow_interval_plus_final() {
        let paths = Paths::new();
        let mut ing = open(&paths, docs(0..10), interval(4));
        let stats = ing.run(0, 10).unwrap();
        // after 4 and 8 processed, then the final one
        assert_eq!(stats.checkpoints, 3);
        assert!(LinkGraph::snapshot_path(paths.prefix()).exists());
    }

    #[test]
    fn fetch_failure_recorded_and_not_retried() {
        let paths = Paths::new();
        let mut d = docs(0..4);
        d.remove(&2);

        let mut ing = open(&paths, d.clone(), interval(10));
        let stats = ing.run(0, 4).unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(ing.cache().outcome(2).unwrap(), Some(Outcome::Error));
        drop(ing);

        // Even if the document shows up later, 2 stays done until forced.
        let mut ing = open(&paths, docs(0..4), interval(10));
        ing.run(0, 4).unwrap();
        assert!(ing.fetcher().calls().is_empty());
        drop(ing);
        assert_eq!(stored_ids(&paths), vec![0, 1, 3]);
        assert_eq!(errlog::read_ids(paths.errors()).unwrap(), vec![2]);
    }

    #[test]
    fn cache_gates_network_for_unstaged_ids() {
        let paths = Paths::new();
        {
            let mut cache = CrawlCache::open(paths.prefix()).unwrap();
            cache.record(1, &CacheRecord::Empty).unwrap();
            cache.record(2, &CacheRecord::Success(doc(2))).unwrap();
        }
        let mut ing = open(&paths, docs(0..4), interval(10));
        let stats = ing.run(0, 4).unwrap();
        assert_eq!(ing.fetcher().calls(), vec![0, 3]);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.from_cache, 1);
        drop(ing);
        assert_eq!(stored_ids(&paths), vec![0, 2, 3]);

        // The cached empty outcome is reflected back into the snapshot.
        let g = LinkGraph::load(LinkGraph::snapshot_path(paths.prefix())).unwrap();
        assert!(g.get(1).unwrap().is_empty());
    }

    #[test]
    fn empty_range_still_checkpoints_once() {
        let paths = Paths::new();
        let mut ing = open(&paths, docs(0..3), interval(10));
        let stats = ing.run(5, 5).unwrap();
        assert_eq!(stats.checkpoints, 1);
        assert_eq!(stats.processed, 0);
        assert!(ing.fetcher().calls().is_empty());
        assert!(LinkGraph::snapshot_path(paths.prefix()).exists());
    }

    #[test]
    fn force_redo_refetches_but_never_overwrites() {
        let paths = Paths::new();
        open(&paths, docs(0..3), interval(10)).run(0, 3).unwrap();

        let mut changed = docs(0..3);
        changed.insert(1, doc(99));
        let opts = IngestOptions { force_redo: true, ..interval(10) };
        let mut ing = open(&paths, changed, opts);
        let stats = ing.run(0, 3).unwrap();
        assert_eq!(ing.fetcher().calls(), vec![0, 1, 2]);
        assert_eq!(stats.existing, 3);
        drop(ing);

        let conn = db::connect(&paths.db()).unwrap();
        let e = db::get_entry(&conn, 1).unwrap().unwrap();
        assert!(e.content.contains("Release number 1 "));
    }
}
