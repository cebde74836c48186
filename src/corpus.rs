//! Corpus assembly and the process-wide build-once cache.

use std::fs;
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::parse::{LinkFilter, LinkSetPattern, SourceKind};
use crate::tree::{Children, LinkTree, NodeTag};

/// Source path standing for the standard input stream.
pub const STDIN_PATH: &str = "-";

/// One configured document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SourceEntry")]
pub struct SourceSpec {
    pub path: String,
    pub kind: SourceKind,
}

// Config form of a source: the kind may be left out and is then inferred.
#[derive(Deserialize)]
struct SourceEntry {
    path: String,
    #[serde(default)]
    kind: Option<SourceKind>,
}

impl From<SourceEntry> for SourceSpec {
    fn from(entry: SourceEntry) -> Self {
        match entry.kind {
            Some(kind) => Self::new(entry.path, kind),
            None => Self::infer(entry.path),
        }
    }
}

impl SourceSpec {
    pub fn new(path: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Source whose kind follows from the file name.
    pub fn infer(path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = SourceKind::for_path(&path);
        Self { path, kind }
    }

    fn read(&self) -> Result<String> {
        let bytes = if self.path == STDIN_PATH {
            let mut buf = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .map_err(|e| Error::io(&self.path, e))?;
            buf
        } else {
            fs::read(&self.path).map_err(|e| Error::io(&self.path, e))?
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Parse every source and merge the results under one `FileGroup` root.
///
/// Returns `None` when there are no sources or none of them holds a link
/// accepted by `filter`. Any read failure aborts the whole build.
pub fn build(
    grammar: &Grammar,
    sources: &[SourceSpec],
    filter: Option<LinkFilter<'_>>,
) -> Result<Option<LinkTree>> {
    let mut group = Children::new(Some(NodeTag::FileGroup));
    for source in sources {
        log::debug!("reading {} source {}", source.kind, source.path);
        let content = source.read()?;
        if let LinkTree::Children(mut file) = source.kind.extract(grammar, &content, filter) {
            if file.is_empty() {
                continue;
            }
            file.tag = Some(NodeTag::File {
                path: source.path.clone(),
            });
            group.push(LinkTree::Children(file));
        }
    }
    if group.is_empty() {
        return Ok(None);
    }
    Ok(Some(LinkTree::Children(group)))
}

/// Union of the links starting with any of `prefixes` across all sources.
pub fn build_link_set<S: AsRef<str>>(
    grammar: &Grammar,
    sources: &[SourceSpec],
    prefixes: &[S],
) -> Result<AHashSet<String>> {
    let pattern = LinkSetPattern::new(prefixes)?;
    let mut urls = AHashSet::new();
    for source in sources {
        let content = source.read()?;
        source
            .kind
            .collect_link_set(grammar, &pattern, &content, &mut urls);
    }
    Ok(urls)
}

/// Summary counts of a corpus tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub files: usize,
    pub headings: usize,
    pub links: usize,
    pub unique_urls: usize,
}

impl CorpusStats {
    pub fn of(tree: &LinkTree) -> Self {
        let mut stats = Self::default();
        let mut stack = vec![tree];
        while let Some(node) = stack.pop() {
            match node.tag() {
                Some(NodeTag::File { .. }) => stats.files += 1,
                Some(NodeTag::Heading(_)) => stats.headings += 1,
                _ => {}
            }
            stack.extend(node.children());
        }
        let mut urls = AHashSet::new();
        for link in tree.links() {
            stats.links += 1;
            urls.insert(link.url.as_str());
        }
        stats.unique_urls = urls.len();
        stats
    }
}

#[derive(Debug)]
enum BuildState {
    Unbuilt,
    Building,
    Ready(Arc<LinkTree>),
    Failed(Error),
}

/// The merged link tree of all configured sources, built on first use.
///
/// The first caller of [`Corpus::get_or_build`] runs the build while later
/// callers wait for it. The outcome, tree or error, is kept for the rest of
/// the process and never rebuilt.
#[derive(Debug)]
pub struct Corpus {
    grammar: Arc<Grammar>,
    sources: Vec<SourceSpec>,
    state: Mutex<BuildState>,
    settled: Condvar,
}

// Settles the cache as aborted if the build unwinds.
struct BuildGuard<'a> {
    corpus: &'a Corpus,
    armed: bool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.corpus.settle(BuildState::Failed(Error::BuildAborted));
        }
    }
}

impl Corpus {
    pub fn new(grammar: Arc<Grammar>, sources: Vec<SourceSpec>) -> Self {
        Self {
            grammar,
            sources,
            state: Mutex::new(BuildState::Unbuilt),
            settled: Condvar::new(),
        }
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    fn lock(&self) -> MutexGuard<'_, BuildState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, state: BuildState) {
        *self.lock() = state;
        self.settled.notify_all();
    }

    /// Whether a build has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(*self.lock(), BuildState::Ready(_) | BuildState::Failed(_))
    }

    /// The cached tree, building it first if this is the first request.
    pub fn get_or_build(&self) -> Result<Arc<LinkTree>> {
        // A missing source list is a configuration problem, not a latched
        // build failure.
        if self.sources.is_empty() {
            return Err(Error::NoSources);
        }

        let mut state = self.lock();
        loop {
            match &*state {
                BuildState::Ready(tree) => return Ok(Arc::clone(tree)),
                BuildState::Failed(err) => return Err(err.clone()),
                BuildState::Building => {
                    state = self
                        .settled
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                BuildState::Unbuilt => break,
            }
        }
        *state = BuildState::Building;
        drop(state);

        let mut guard = BuildGuard {
            corpus: self,
            armed: true,
        };
        let outcome = self.build_now();
        guard.armed = false;
        self.settle(match &outcome {
            Ok(tree) => BuildState::Ready(Arc::clone(tree)),
            Err(err) => BuildState::Failed(err.clone()),
        });
        outcome
    }

    fn build_now(&self) -> Result<Arc<LinkTree>> {
        log::info!("building corpus from {} source(s)", self.sources.len());
        let outcome = match build(&self.grammar, &self.sources, None) {
            Ok(Some(tree)) => {
                log::info!("corpus ready: {} links", tree.link_count());
                Ok(Arc::new(tree))
            }
            Ok(None) => Err(Error::NoLinks),
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            log::warn!("corpus build failed, keeping the error: {err}");
        }
        outcome
    }

    /// Collect links by prefix straight from the sources; nothing is cached.
    pub fn link_set<S: AsRef<str>>(&self, prefixes: &[S]) -> Result<AHashSet<String>> {
        if self.sources.is_empty() {
            return Err(Error::NoSources);
        }
        build_link_set(&self.grammar, &self.sources, prefixes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use tempfile::{NamedTempFile, TempDir};

    fn grammar() -> Arc<Grammar> {
        Arc::new(Grammar::new::<&str>(&[]).unwrap())
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_build_groups_files_in_order() {
        let dir = TempDir::new().unwrap();
        let org = write_file(&dir, "notes.org", "* Reading\nhttps://a.example/\n");
        let empty = write_file(&dir, "empty.txt", "no links here\n");
        let txt = write_file(&dir, "links.txt", "b.example and c.example\n");
        let sources = vec![SourceSpec::infer(&org), SourceSpec::infer(&empty), SourceSpec::infer(&txt)];

        let tree = build(&grammar(), &sources, None).unwrap().unwrap();
        assert_eq!(tree.tag(), Some(&NodeTag::FileGroup));
        let paths: Vec<&str> = tree
            .children()
            .iter()
            .map(|file| match file.tag() {
                Some(NodeTag::File { path }) => path.as_str(),
                other => panic!("unexpected tag {other:?}"),
            })
            .collect();
        assert_eq!(paths, vec![org.as_str(), txt.as_str()]);
        assert_eq!(tree.link_count(), 3);
    }

    #[test]
    fn test_build_without_links() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.txt", "nothing\n");
        assert!(build(&grammar(), &[SourceSpec::infer(path)], None).unwrap().is_none());
        assert!(build(&grammar(), &[], None).unwrap().is_none());
    }

    #[test]
    fn test_build_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let ok = write_file(&dir, "a.txt", "a.example\n");
        let missing = dir.path().join("missing.org").to_string_lossy().into_owned();
        let err = build(&grammar(), &[SourceSpec::infer(ok), SourceSpec::infer(&missing)], None)
            .unwrap_err();
        assert!(matches!(&err, Error::Io { path, .. } if *path == missing));
    }

    #[test]
    fn test_build_runs_once_for_concurrent_callers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "https://once.example/").unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let corpus = Corpus::new(grammar(), vec![SourceSpec::new(&path, SourceKind::PlainText)]);

        let trees: Vec<Arc<LinkTree>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| corpus.get_or_build().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(trees.iter().all(|t| Arc::ptr_eq(t, &trees[0])));

        // The source is not read again.
        drop(file);
        let again = corpus.get_or_build().unwrap();
        assert!(Arc::ptr_eq(&again, &trees[0]));
    }

    #[test]
    fn test_build_error_is_latched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("later.txt").to_string_lossy().into_owned();
        let corpus = Corpus::new(grammar(), vec![SourceSpec::infer(&path)]);

        let first = corpus.get_or_build().unwrap_err();
        assert_eq!(first.code(), "IO_ERROR");
        assert!(corpus.is_settled());

        fs::write(&path, "https://late.example/\n").unwrap();
        let second = corpus.get_or_build().unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_no_links_is_latched_and_no_sources_is_not() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.org", "* Empty\n");
        let corpus = Corpus::new(grammar(), vec![SourceSpec::infer(path)]);
        assert!(matches!(corpus.get_or_build(), Err(Error::NoLinks)));
        assert!(matches!(corpus.get_or_build(), Err(Error::NoLinks)));

        let empty = Corpus::new(grammar(), Vec::new());
        assert!(matches!(empty.get_or_build(), Err(Error::NoSources)));
        assert!(!empty.is_settled());
    }

    #[test]
    fn test_link_set_across_sources() {
        let dir = TempDir::new().unwrap();
        let org = write_file(&dir, "a.org", "<mid:one@host> and [[mid:two@host][Two]]\n");
        let txt = write_file(&dir, "b.txt", "mid:one@host mid:three@host https://x.example/\n");
        let corpus = Corpus::new(grammar(), vec![SourceSpec::infer(org), SourceSpec::infer(txt)]);

        let mut urls: Vec<String> = corpus.link_set(&["mid"]).unwrap().into_iter().collect();
        urls.sort();
        assert_eq!(urls, vec!["mid:one@host", "mid:three@host", "mid:two@host"]);
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let org = write_file(
            &dir,
            "a.org",
            "* One\nhttps://a.example/\n** Two\nhttps://a.example/\nhttps://b.example/\n",
        );
        let tree = build(&grammar(), &[SourceSpec::infer(org)], None).unwrap().unwrap();
        assert_eq!(
            CorpusStats::of(&tree),
            CorpusStats {
                files: 1,
                headings: 2,
                links: 3,
                unique_urls: 2,
            }
        );
    }

    #[test]
    fn test_source_spec_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            sources: Vec<SourceSpec>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[sources]]
            path = "notes.org"

            [[sources]]
            path = "list.md"
            kind = "org"
            "#,
        )
        .unwrap();
        assert_eq!(
            doc.sources,
            vec![
                SourceSpec::new("notes.org", SourceKind::Outline),
                SourceSpec::new("list.md", SourceKind::Outline),
            ]
        );
    }
}
