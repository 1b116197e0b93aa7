//! Trim-length search.
//!
//! # How it works
//!
//! A damaged file is the original payload followed by an unknown number of
//! garbage bytes.  The only free parameter is that count, the *trim*.  For
//! each trim, starting at 0, the search assembles a sealed candidate and asks
//! the probe whether every record parses.  The first accepted candidate wins.
//!
//! Validity is not monotonic in the trim (a shorter payload can end on a
//! record boundary while a longer one dangles), so the scan is linear and
//! ascending, and every trim is tried exactly once.  The reported trim is
//! therefore the smallest one that works.
//!
//! [`RecoverySearch::attempt`] is the pure step; [`RecoverySearch::run`]
//! drives it and never performs I/O.
//!
//! ## Progress and cancellation
//!
//! `run()` accepts an optional progress callback invoked before each attempt
//! with `(trim, limit)`, and an optional cancellation flag checked once per
//! iteration.  A raised flag ends the search as `Unrecoverable` with
//! `cancelled = true`.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::{Attempt, Outcome, Rejection};
use crate::assemble::{assemble, CorruptedFile};
use crate::probe::ValidationProbe;

pub struct RecoverySearch<'a, P: ValidationProbe + ?Sized> {
    file:  &'a CorruptedFile,
    probe: &'a P,
    limit: usize,
}

impl<'a, P: ValidationProbe + ?Sized> RecoverySearch<'a, P> {
    pub fn new(file: &'a CorruptedFile, probe: &'a P) -> Self {
        Self { file, probe, limit: file.trim_max() }
    }

    /// Cap the largest trim tried.  Never raises the natural bound.
    pub fn with_max_trim(mut self, max_trim: Option<usize>) -> Self {
        if let Some(cap) = max_trim {
            self.limit = self.limit.min(cap);
        }
        self
    }

    /// Largest trim this search will try.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Build and probe the candidate for one trim.
    pub fn attempt(&self, trim: usize) -> Attempt {
        match assemble(self.file, trim) {
            Err(e) => Attempt::Rejected(Rejection::Impossible(e)),
            Ok(candidate) => match self.probe.validate(candidate.as_bytes()) {
                Ok(()) => Attempt::Accepted(candidate),
                Err(e) => Attempt::Rejected(Rejection::Invalid(e)),
            },
        }
    }

    pub fn run<F>(&self, cancel: Option<&AtomicBool>, mut progress: Option<&mut F>) -> Outcome
    where
        F: FnMut(usize, usize),
    {
        let mut attempts = 0usize;
        let mut last_error = None;

        for trim in 0..=self.limit {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!(trim, attempts, "search cancelled");
                return Outcome::Unrecoverable { attempts, cancelled: true, last_error };
            }
            if let Some(ref mut cb) = progress {
                cb(trim, self.limit);
            }

            attempts += 1;
            match self.attempt(trim) {
                Attempt::Accepted(candidate) => {
                    info!(trim, attempts, size = candidate.len(), "candidate accepted");
                    return Outcome::Recovered { candidate, attempts };
                }
                Attempt::Rejected(reason) => {
                    debug!(trim, %reason, "candidate rejected");
                    last_error = Some(reason);
                }
            }
        }

        warn!(attempts, limit = self.limit, "no trim produced a readable file");
        Outcome::Unrecoverable { attempts, cancelled: false, last_error }
    }
}

/// Run a full, uncancellable search without progress reporting.
pub fn search<P: ValidationProbe + ?Sized>(file: &CorruptedFile, probe: &P) -> Outcome {
    RecoverySearch::new(file, probe).run::<fn(usize, usize)>(None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ParseError;
    use std::cell::RefCell;

    fn corrupted(len: usize) -> CorruptedFile {
        let mut b = vec![14u8, 0x10, 0, 0, 0, 0, 0, 0];
        b.extend_from_slice(b".FIT");
        b.resize(len, 0x5A);
        CorruptedFile::new(b).unwrap()
    }

    /// Probe that accepts candidates whose trim is in `good`, logging every trim seen.
    fn probe_for<'a>(
        total: usize,
        good: &'a [usize],
        seen: &'a RefCell<Vec<usize>>,
    ) -> impl Fn(&[u8]) -> Result<(), ParseError> + 'a {
        move |candidate: &[u8]| {
            let trim = total - candidate.len();
            seen.borrow_mut().push(trim);
            if good.contains(&trim) {
                Ok(())
            } else {
                Err(ParseError::Rejected(format!("trim {trim}")))
            }
        }
    }

    #[test]
    fn reports_smallest_accepted_trim() {
        let file = corrupted(100);
        let seen = RefCell::new(Vec::new());
        let probe = probe_for(100, &[5, 9, 40], &seen);

        match search(&file, &probe) {
            Outcome::Recovered { candidate, attempts } => {
                assert_eq!(candidate.trim, 5);
                assert_eq!(attempts, 6);
                assert_eq!(candidate.len(), 95);
            }
            other => panic!("expected recovery, got {other:?}"),
        }
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn exhausts_every_trim_once() {
        let file = corrupted(64);
        let seen = RefCell::new(Vec::new());
        let probe = probe_for(64, &[], &seen);

        match search(&file, &probe) {
            Outcome::Unrecoverable { attempts, cancelled, last_error } => {
                assert_eq!(attempts, file.trim_max() + 1);
                assert!(!cancelled);
                assert!(matches!(last_error, Some(Rejection::Invalid(_))));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        let expected: Vec<usize> = (0..=file.trim_max()).collect();
        assert_eq!(*seen.borrow(), expected);
    }

    #[test]
    fn max_trim_caps_search() {
        let file = corrupted(64);
        let seen = RefCell::new(Vec::new());
        let probe = probe_for(64, &[30], &seen);

        let s = RecoverySearch::new(&file, &probe).with_max_trim(Some(10));
        assert_eq!(s.limit(), 10);
        let outcome = s.run::<fn(usize, usize)>(None, None);
        assert!(matches!(outcome, Outcome::Unrecoverable { attempts: 11, .. }));

        let s = RecoverySearch::new(&file, &probe).with_max_trim(Some(10_000));
        assert_eq!(s.limit(), file.trim_max());
    }

    #[test]
    fn cancellation_stops_before_next_attempt() {
        let file = corrupted(64);
        let seen = RefCell::new(Vec::new());
        let probe = probe_for(64, &[], &seen);
        let flag = AtomicBool::new(false);

        let mut progress = |trim: usize, _limit: usize| {
            if trim == 3 {
                flag.store(true, Ordering::Relaxed);
            }
        };
        let outcome = RecoverySearch::new(&file, &probe).run(Some(&flag), Some(&mut progress));
        match outcome {
            Outcome::Unrecoverable { attempts, cancelled, .. } => {
                assert!(cancelled);
                assert_eq!(attempts, 4);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn tiny_file_fails_with_impossible_trim() {
        let mut b = vec![12u8, 0x10, 0, 0, 0, 0, 0, 0];
        b.extend_from_slice(b".FIT");
        b.push(0);
        let file = CorruptedFile::new(b).unwrap();
        let accept_all = |_: &[u8]| -> Result<(), ParseError> { Ok(()) };

        match search(&file, &accept_all) {
            Outcome::Unrecoverable { attempts, last_error, .. } => {
                assert_eq!(attempts, 1);
                assert!(matches!(last_error, Some(Rejection::Impossible(_))));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
