/// Problem registry under concurrent use
///
/// Detection, resolution completion and user actions all touch a folder's
/// registry from different threads. Duplicate adds and absent removes must
/// stay no-ops under contention.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use syncheal::problem::{ProblemListener, ProblemRegistry};
use syncheal::{FileInfo, FolderId, FolderInfo, Problem, ProblemKind};

fn folder_id() -> FolderId {
	FolderId::new("shared").unwrap()
}

fn illegal(name: &str) -> Problem {
	let file = FileInfo::new(folder_id(), name).unwrap();
	Problem::new(ProblemKind::IllegalChars { file }).unwrap()
}

#[derive(Default)]
struct Counter {
	added: AtomicUsize,
	removed: AtomicUsize,
}

impl ProblemListener for Counter {
	fn problem_added(&self, _problem: &Problem) {
		self.added.fetch_add(1, Ordering::SeqCst);
	}

	fn problem_removed(&self, _problem: &Problem) {
		self.removed.fetch_add(1, Ordering::SeqCst);
	}
}

#[test]
fn test_same_problem_registered_once() {
	let registry = ProblemRegistry::for_folder(folder_id());
	assert!(registry.add(illegal("a?b")).unwrap());
	assert!(!registry.add(illegal("a?b")).unwrap());
	assert!(!registry.add(illegal("/a?b/")).unwrap());
	assert_eq!(registry.count(), 1);
}

#[test]
fn test_concurrent_adds_and_removes() {
	let registry = Arc::new(ProblemRegistry::for_folder(folder_id()));
	let counter = Arc::new(Counter::default());
	registry.add_listener(counter.clone());

	let threads = 8;
	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let registry = registry.clone();
			let barrier = barrier.clone();
			thread::spawn(move || {
				barrier.wait();
				for i in 0..100 {
					registry.add(illegal(&format!("file{}?", i))).unwrap();
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}

	assert_eq!(registry.count(), 100);
	assert_eq!(counter.added.load(Ordering::SeqCst), 100);

	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let registry = registry.clone();
			let barrier = barrier.clone();
			thread::spawn(move || {
				barrier.wait();
				(0..100).filter(|i| registry.remove(&illegal(&format!("file{}?", i)))).count()
			})
		})
		.collect();
	let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

	assert_eq!(removed, 100);
	assert!(registry.is_empty());
	assert_eq!(counter.removed.load(Ordering::SeqCst), 100);
}

#[test]
fn test_variants_with_same_subject_are_distinct() {
	let registry = ProblemRegistry::new();
	let folder = FolderInfo::new(folder_id(), "Shared");
	registry.add(Problem::new(ProblemKind::NoOwner { folder: folder.clone() }).unwrap()).unwrap();
	registry.add(Problem::new(ProblemKind::AccessDenied { folder: folder.clone() }).unwrap()).unwrap();
	registry.add(Problem::new(ProblemKind::NoOwner { folder }).unwrap()).unwrap();
	assert_eq!(registry.count(), 2);
}

#[test]
fn test_global_registry_accepts_any_folder() {
	let registry = ProblemRegistry::new();
	let other = FileInfo::new(FolderId::new("other").unwrap(), "x*").unwrap();
	registry.add(illegal("x*")).unwrap();
	registry.add(Problem::new(ProblemKind::IllegalChars { file: other }).unwrap()).unwrap();
	assert_eq!(registry.count(), 2);
}

// vim: ts=4
