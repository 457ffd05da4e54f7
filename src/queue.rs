//! Pending review queue.
//!
//! Entries are addressed by id, never by position. Confirm and skip both
//! claim the entry with `remove_by_id` first, so two requests racing on the
//! same entry see exactly one success and one `StaleEntry`.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rustc_hash::FxHashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ResolveError;
use crate::feedback::FeedbackTracker;
use crate::models::{
    CatalogResult, FeedbackKind, FeedbackRecord, MatchCandidate, PendingEntry, PendingKind,
    Principal, Resolution, SourceDescriptor,
};
use crate::normalize::{strip_junk, DASH_SEPARATOR};
use crate::similarity::simple_ratio;

// ============================================================================
// Collaborators
// ============================================================================

/// Storage for pending entries and the feedback log.
pub trait Repository: Send + Sync {
    /// Entries of one user, in insertion order.
    fn get(&self, user_id: &str) -> Result<Vec<PendingEntry>, ResolveError>;

    fn append(&self, user_id: &str, entry: PendingEntry) -> Result<(), ResolveError>;

    /// Remove and return the entry, or `None` when it is already gone.
    fn remove_by_id(&self, user_id: &str, entry_id: Uuid) -> Result<Option<PendingEntry>, ResolveError>;

    fn append_feedback(&self, record: FeedbackRecord) -> Result<(), ResolveError>;

    /// Put back an entry claimed by a failed confirm.
    fn restore(&self, user_id: &str, entry: PendingEntry) -> Result<(), ResolveError> {
        self.append(user_id, entry)
    }
}

/// Target platform playlist writes.
pub trait PlaylistMutation: Send + Sync {
    fn add_track(&self, playlist_ref: &str, track_id: &str) -> Result<(), ResolveError>;
}

// ============================================================================
// In-memory repository
// ============================================================================

#[derive(Default)]
pub struct MemoryRepository {
    entries: Mutex<FxHashMap<String, Vec<PendingEntry>>>,
    feedback: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feedback(&self) -> Vec<FeedbackRecord> {
        self.feedback
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    fn lock_entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, FxHashMap<String, Vec<PendingEntry>>>, ResolveError> {
        self.entries
            .lock()
            .map_err(|_| ResolveError::Storage("pending queue lock poisoned".into()))
    }
}

impl Repository for MemoryRepository {
    fn get(&self, user_id: &str) -> Result<Vec<PendingEntry>, ResolveError> {
        Ok(self.lock_entries()?.get(user_id).cloned().unwrap_or_default())
    }

    fn append(&self, user_id: &str, entry: PendingEntry) -> Result<(), ResolveError> {
        self.lock_entries()?
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    fn remove_by_id(&self, user_id: &str, entry_id: Uuid) -> Result<Option<PendingEntry>, ResolveError> {
        let mut entries = self.lock_entries()?;
        let Some(queue) = entries.get_mut(user_id) else {
            return Ok(None);
        };
        Ok(queue
            .iter()
            .position(|e| e.entry_id == entry_id)
            .map(|idx| queue.remove(idx)))
    }

    fn append_feedback(&self, record: FeedbackRecord) -> Result<(), ResolveError> {
        self.feedback
            .lock()
            .map_err(|_| ResolveError::Storage("feedback log lock poisoned".into()))?
            .push(record);
        Ok(())
    }

    /// Reinserts by creation time so the entry keeps its place.
    fn restore(&self, user_id: &str, entry: PendingEntry) -> Result<(), ResolveError> {
        let mut entries = self.lock_entries()?;
        let queue = entries.entry(user_id.to_string()).or_default();
        let idx = queue
            .iter()
            .position(|e| e.created_at >= entry.created_at)
            .unwrap_or(queue.len());
        queue.insert(idx, entry);
        Ok(())
    }
}

// ============================================================================
// Review queue
// ============================================================================

/// What the user picked when confirming an entry.
#[derive(Debug, Clone)]
pub enum Choice {
    /// One of the entry's candidates, by target track id
    Candidate(String),
    /// A track found by the user outside the candidate list
    Manual(CatalogResult),
}

pub struct ReviewQueue {
    repository: Arc<dyn Repository>,
    playlist: Arc<dyn PlaylistMutation>,
    tracker: Arc<FeedbackTracker>,
    exact_ratio: f64,
}

impl ReviewQueue {
    pub fn new(
        repository: Arc<dyn Repository>,
        playlist: Arc<dyn PlaylistMutation>,
        tracker: Arc<FeedbackTracker>,
        exact_ratio: f64,
    ) -> Self {
        Self {
            repository,
            playlist,
            tracker,
            exact_ratio,
        }
    }

    pub fn tracker(&self) -> &FeedbackTracker {
        &self.tracker
    }

    pub fn enqueue(&self, user_id: &str, entry: PendingEntry) -> Result<Uuid, ResolveError> {
        let id = entry.entry_id;
        self.repository.append(user_id, entry)?;
        Ok(id)
    }

    /// Queue a resolution that needs a human. Auto-commits are not queued.
    pub fn enqueue_resolution(
        &self,
        user_id: &str,
        playlist_ref: &str,
        resolution: &Resolution,
    ) -> Result<Option<Uuid>, ResolveError> {
        let entry = match resolution {
            Resolution::AutoCommit { .. } => return Ok(None),
            Resolution::PendingReview {
                candidates,
                descriptor,
            } => PendingEntry::new(user_id, descriptor.clone(), candidates.clone(), playlist_ref, PendingKind::Review),
            Resolution::Unresolved {
                descriptor,
                candidates,
                ..
            } => PendingEntry::new(user_id, descriptor.clone(), candidates.clone(), playlist_ref, PendingKind::NoMatch),
        };
        self.enqueue(user_id, entry).map(Some)
    }

    pub fn list(&self, user_id: &str) -> Result<Vec<PendingEntry>, ResolveError> {
        self.repository.get(user_id)
    }

    /// Admins may read any queue; users only their own.
    pub fn list_as(&self, principal: &Principal, owner_user_id: &str) -> Result<Vec<PendingEntry>, ResolveError> {
        if !principal.can_access(owner_user_id) {
            return Err(ResolveError::Forbidden {
                actor: principal.user_id.clone(),
                owner: owner_user_id.to_string(),
            });
        }
        self.list(owner_user_id)
    }

    pub fn confirm(&self, user_id: &str, entry_id: Uuid, choice: Choice) -> Result<FeedbackRecord, ResolveError> {
        let entry = self
            .repository
            .get(user_id)?
            .into_iter()
            .find(|e| e.entry_id == entry_id)
            .ok_or(ResolveError::StaleEntry(entry_id))?;

        let (chosen, matched) = resolve_choice(&entry, choice)?;

        let Some(entry) = self.repository.remove_by_id(user_id, entry_id)? else {
            return Err(ResolveError::StaleEntry(entry_id));
        };

        if let Err(err) = self.playlist.add_track(&entry.target_playlist_ref, &chosen.target_track_id) {
            warn!(entry = %entry_id, track = %chosen.target_track_id, "confirm failed, entry restored: {err}");
            let playlist_ref = entry.target_playlist_ref.clone();
            self.repository.restore(user_id, entry)?;
            return Err(match err {
                ResolveError::PlaylistMutationFailure { .. } => err,
                other => ResolveError::PlaylistMutationFailure {
                    playlist_ref,
                    reason: other.to_string(),
                },
            });
        }

        let (kind, confidence, exact_match) = match matched {
            Some(candidate) => (
                FeedbackKind::Confirmation,
                candidate.overall_confidence,
                candidate.title_similarity >= self.exact_ratio,
            ),
            None => (
                FeedbackKind::Correction,
                0.0,
                manual_title_is_exact(&entry.descriptor, &chosen.title, self.exact_ratio),
            ),
        };
        let record = FeedbackRecord {
            user_id: user_id.to_string(),
            descriptor: entry.descriptor,
            chosen_candidate: Some(chosen),
            confidence,
            kind,
            exact_match,
            timestamp: Utc::now(),
        };
        self.record(record)
    }

    pub fn skip(&self, user_id: &str, entry_id: Uuid) -> Result<FeedbackRecord, ResolveError> {
        let Some(entry) = self.repository.remove_by_id(user_id, entry_id)? else {
            return Err(ResolveError::StaleEntry(entry_id));
        };
        let confidence = entry
            .candidates
            .first()
            .map(|c| c.overall_confidence)
            .unwrap_or(0.0);
        let record = FeedbackRecord {
            user_id: user_id.to_string(),
            descriptor: entry.descriptor,
            chosen_candidate: None,
            confidence,
            kind: FeedbackKind::Rejection,
            exact_match: false,
            timestamp: Utc::now(),
        };
        self.record(record)
    }

    fn record(&self, record: FeedbackRecord) -> Result<FeedbackRecord, ResolveError> {
        self.repository.append_feedback(record.clone())?;
        let state = self.tracker.observe(&record);
        info!(
            user = %record.user_id,
            kind = record.kind.as_str(),
            exact = record.exact_match,
            streak = state.exact_streak,
            "review decision"
        );
        Ok(record)
    }
}

/// A manual pick counts as exact when its title matches one dash or pipe
/// segment of the cleaned video title.
fn manual_title_is_exact(descriptor: &SourceDescriptor, title: &str, exact_ratio: f64) -> bool {
    let cleaned = strip_junk(&descriptor.raw_title);
    DASH_SEPARATOR
        .split(&cleaned)
        .flat_map(|segment| segment.split('|'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .any(|segment| simple_ratio(segment, title) >= exact_ratio)
}

/// The chosen track, plus the matching candidate when it came from the list.
fn resolve_choice(
    entry: &PendingEntry,
    choice: Choice,
) -> Result<(CatalogResult, Option<MatchCandidate>), ResolveError> {
    match choice {
        Choice::Candidate(track_id) => entry
            .candidates
            .iter()
            .find(|c| c.track_id() == track_id)
            .map(|c| (c.result.clone(), Some(c.clone())))
            .ok_or(ResolveError::UnknownCandidate {
                track_id,
                entry_id: entry.entry_id,
            }),
        Choice::Manual(result) => {
            let listed = entry
                .candidates
                .iter()
                .find(|c| c.track_id() == result.target_track_id)
                .cloned();
            Ok((result, listed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedbackConfig;
    use crate::models::SearchStrategy;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    #[derive(Default)]
    struct FakePlaylist {
        added: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    impl PlaylistMutation for FakePlaylist {
        fn add_track(&self, playlist_ref: &str, track_id: &str) -> Result<(), ResolveError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ResolveError::Storage("rate limited".into()));
            }
            self.added
                .lock()
                .unwrap()
                .push((playlist_ref.to_string(), track_id.to_string()));
            Ok(())
        }
    }

    fn candidate(id: &str, title_similarity: f64) -> MatchCandidate {
        MatchCandidate {
            result: CatalogResult {
                target_track_id: id.into(),
                title: format!("Title {id}"),
                artist: "Artist".into(),
                album: None,
                label: None,
            },
            strategy: SearchStrategy::ArtistQualified,
            title_similarity,
            artist_similarity: 1.0,
            title_token_set: 1.0,
            title_partial: 1.0,
            title_contains: true,
            artist_contains: true,
            trusted_source_bonus: 0.0,
            composite_score: 0.7,
            overall_confidence: 0.7,
        }
    }

    fn entry(user: &str, title: &str) -> PendingEntry {
        PendingEntry::new(
            user,
            SourceDescriptor::new(title, None),
            vec![candidate(&format!("{title}-1"), 1.0), candidate(&format!("{title}-2"), 0.5)],
            "playlist-1",
            PendingKind::Review,
        )
    }

    fn setup() -> (ReviewQueue, Arc<MemoryRepository>, Arc<FakePlaylist>) {
        let repo = Arc::new(MemoryRepository::new());
        let playlist = Arc::new(FakePlaylist::default());
        let tracker = Arc::new(FeedbackTracker::new(FeedbackConfig::default()));
        let queue = ReviewQueue::new(repo.clone(), playlist.clone(), tracker, 0.99);
        (queue, repo, playlist)
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let (queue, _, _) = setup();
        for title in ["a", "b", "c"] {
            queue.enqueue("u1", entry("u1", title)).unwrap();
        }
        let titles: Vec<_> = queue
            .list("u1")
            .unwrap()
            .into_iter()
            .map(|e| e.descriptor.raw_title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(queue.list("u2").unwrap().is_empty());
    }

    #[test]
    fn test_confirm_commits_and_records() {
        let (queue, repo, playlist) = setup();
        let id = queue.enqueue("u1", entry("u1", "a")).unwrap();
        let record = queue.confirm("u1", id, Choice::Candidate("a-1".into())).unwrap();

        assert_eq!(record.kind, FeedbackKind::Confirmation);
        assert!(record.exact_match);
        assert_eq!(
            playlist.added.lock().unwrap().clone(),
            vec![("playlist-1".to_string(), "a-1".to_string())]
        );
        assert!(queue.list("u1").unwrap().is_empty());
        assert_eq!(repo.feedback().len(), 1);
        assert_eq!(queue.tracker().state("u1").exact_streak, 1);
    }

    #[test]
    fn test_confirm_twice_is_stale() {
        let (queue, _, playlist) = setup();
        let id = queue.enqueue("u1", entry("u1", "a")).unwrap();
        queue.confirm("u1", id, Choice::Candidate("a-1".into())).unwrap();
        let err = queue.confirm("u1", id, Choice::Candidate("a-1".into())).unwrap_err();
        assert!(matches!(err, ResolveError::StaleEntry(stale) if stale == id));
        assert_eq!(playlist.added.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_candidate_leaves_entry() {
        let (queue, _, _) = setup();
        let id = queue.enqueue("u1", entry("u1", "a")).unwrap();
        let err = queue.confirm("u1", id, Choice::Candidate("zzz".into())).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownCandidate { .. }));
        assert_eq!(queue.list("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_manual_pick_is_correction() {
        let (queue, _, playlist) = setup();
        let id = queue.enqueue("u1", entry("u1", "a")).unwrap();
        let manual = CatalogResult {
            target_track_id: "elsewhere".into(),
            title: "Right Song".into(),
            artist: "Right Artist".into(),
            album: None,
            label: None,
        };
        let record = queue.confirm("u1", id, Choice::Manual(manual)).unwrap();
        assert_eq!(record.kind, FeedbackKind::Correction);
        assert!(!record.exact_match);
        assert_eq!(playlist.added.lock().unwrap()[0].1, "elsewhere");
    }

    #[test]
    fn test_manual_pick_matching_title_segment_is_exact() {
        let (queue, _, _) = setup();
        let id = queue
            .enqueue("u1", entry("u1", "Ed Sheeran - Perfect (Official Video)"))
            .unwrap();
        let manual = CatalogResult {
            target_track_id: "sp:perfect".into(),
            title: "Perfect".into(),
            artist: "Ed Sheeran".into(),
            album: None,
            label: None,
        };
        let record = queue.confirm("u1", id, Choice::Manual(manual)).unwrap();
        assert_eq!(record.kind, FeedbackKind::Correction);
        assert!(record.exact_match);
        assert_eq!(queue.tracker().state("u1").exact_streak, 1);
    }

    #[test]
    fn test_concurrent_appends_and_racing_confirms() {
        const THREADS: usize = 8;
        let (queue, _, playlist) = setup();
        let shared = queue.enqueue("u1", entry("u1", "shared")).unwrap();
        let barrier = Barrier::new(THREADS);

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let (queue, barrier) = (&queue, &barrier);
                    scope.spawn(move || {
                        let own = queue.enqueue("u1", entry("u1", &format!("own-{i}"))).unwrap();
                        barrier.wait();
                        (own, queue.confirm("u1", shared, Choice::Candidate("shared-1".into())))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|(_, r)| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter_map(|(_, r)| r.as_ref().err())
            .all(|err| matches!(err, ResolveError::StaleEntry(id) if *id == shared)));
        assert_eq!(playlist.added.lock().unwrap().len(), 1);

        let remaining: Vec<_> = queue.list("u1").unwrap().into_iter().map(|e| e.entry_id).collect();
        assert_eq!(remaining.len(), THREADS);
        assert!(results.iter().all(|(own, _)| remaining.contains(own)));
        assert!(!remaining.contains(&shared));
    }

    #[test]
    fn test_failed_mutation_restores_entry_in_place() {
        let (queue, repo, playlist) = setup();
        let first = queue.enqueue("u1", entry("u1", "a")).unwrap();
        queue.enqueue("u1", entry("u1", "b")).unwrap();
        playlist.fail.store(true, Ordering::SeqCst);

        let err = queue.confirm("u1", first, Choice::Candidate("a-1".into())).unwrap_err();
        assert!(matches!(err, ResolveError::PlaylistMutationFailure { .. }));
        let ids: Vec<_> = queue.list("u1").unwrap().into_iter().map(|e| e.entry_id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], first);
        assert!(repo.feedback().is_empty());
    }

    #[test]
    fn test_skip_records_rejection_and_resets_trust() {
        let (queue, repo, playlist) = setup();
        queue.tracker().set_trust("u1", true);
        let id = queue.enqueue("u1", entry("u1", "a")).unwrap();
        let record = queue.skip("u1", id).unwrap();
        assert_eq!(record.kind, FeedbackKind::Rejection);
        assert!(record.chosen_candidate.is_none());
        assert!(playlist.added.lock().unwrap().is_empty());
        assert_eq!(repo.feedback().len(), 1);
        assert!(!queue.tracker().state("u1").trust_exact_matches);
        assert!(matches!(queue.skip("u1", id), Err(ResolveError::StaleEntry(_))));
    }

    #[test]
    fn test_list_as_enforces_roles() {
        let (queue, _, _) = setup();
        queue.enqueue("alice", entry("alice", "a")).unwrap();
        assert_eq!(queue.list_as(&Principal::user("alice"), "alice").unwrap().len(), 1);
        assert_eq!(queue.list_as(&Principal::admin("root"), "alice").unwrap().len(), 1);
        let err = queue.list_as(&Principal::user("bob"), "alice").unwrap_err();
        assert!(matches!(err, ResolveError::Forbidden { .. }));
    }

    #[test]
    fn test_enqueue_resolution_kinds() {
        let (queue, _, _) = setup();
        let descriptor = SourceDescriptor::new("x", None);
        let review = Resolution::PendingReview {
            candidates: vec![candidate("r", 0.5)],
            descriptor: descriptor.clone(),
        };
        let unresolved = Resolution::Unresolved {
            descriptor: descriptor.clone(),
            reason: crate::models::UnresolvedReason::NoResults,
            candidates: Vec::new(),
        };
        let auto = Resolution::AutoCommit {
            best: candidate("a", 1.0),
            tier: crate::models::CommitTier::High,
        };
        assert!(queue.enqueue_resolution("u1", "p", &review).unwrap().is_some());
        assert!(queue.enqueue_resolution("u1", "p", &unresolved).unwrap().is_some());
        assert!(queue.enqueue_resolution("u1", "p", &auto).unwrap().is_none());
        let kinds: Vec<_> = queue.list("u1").unwrap().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![PendingKind::Review, PendingKind::NoMatch]);
    }
}
