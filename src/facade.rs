//! The caller-facing handle.
//!
//! A facade owns one onion, gates every request through its policy, and lets
//! at most one `poke`/`peek` run at a time. A request that finds the facade
//! busy is turned away with `NO/BUSY` immediately; callers retry if they
//! want to. `state()` and the other inspections never wait.
//!
//! Audit sinks are fed after the busy flag is released, so slow sink I/O
//! never extends the window in which other callers see `NO/BUSY`.
//!
//! ```text
//! IDLE --poke/peek--> BUSY --done (any outcome)--> IDLE
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::audit::{AuditLog, AuditRecord, AuditSink, FileAuditSink, Operation};
use crate::config::{FacadeConfig, DEFAULT_LABEL};
use crate::error::Result;
use crate::keys::Capability;
use crate::onion::Onion;
use crate::policy::Policy;
use crate::status::{Outcome, Peeled, Reason, Sealed, State};

/// State touched only from inside the exclusive section.
struct Core {
    onion: Onion,
    audit: AuditLog,
}

/// Releases the busy flag on every exit path, unwinding included.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A policy-enforcing handle around one onion. Share it with `Arc`.
pub struct Facade {
    label: String,
    policy: Policy,
    busy: AtomicBool,
    /// Set after the first successful write under WORM.
    locked: AtomicBool,
    /// Mirror of the onion length, readable without the exclusive section.
    depth: AtomicUsize,
    core: Mutex<Core>,
    /// Fed outside the exclusive section.
    sinks: Mutex<Vec<Box<dyn AuditSink>>>,
}

impl Facade {
    /// Create a facade around a fresh, empty onion.
    pub fn new(policy: Policy) -> Self {
        Self::with_label(policy, DEFAULT_LABEL)
    }

    /// Like `new`, with a label for logs and journal records.
    pub fn with_label(policy: Policy, label: impl Into<String>) -> Self {
        Self::build(Onion::new(), policy, label.into())
    }

    /// Wrap an existing onion, e.g. one taken from another facade with
    /// `into_onion`, under a new policy.
    ///
    /// Under WORM a non-empty onion counts as already written.
    pub fn around(onion: Onion, policy: Policy) -> Self {
        Self::around_with_label(onion, policy, DEFAULT_LABEL)
    }

    /// Like `around`, keeping the journal label of the previous owner.
    pub fn around_with_label(onion: Onion, policy: Policy, label: impl Into<String>) -> Self {
        Self::build(onion, policy, label.into())
    }

    /// Build from configuration, opening the audit file if one is named.
    pub fn from_config(config: &FacadeConfig) -> Result<Self> {
        let facade = Self::with_label(config.policy, config.label.clone());
        match &config.audit_path {
            Some(path) => Ok(facade.with_audit_sink(Box::new(FileAuditSink::new(path)?))),
            None => Ok(facade),
        }
    }

    fn build(onion: Onion, policy: Policy, label: String) -> Self {
        let locked = policy == Policy::Worm && !onion.is_empty();
        Self {
            label,
            policy,
            busy: AtomicBool::new(false),
            locked: AtomicBool::new(locked),
            depth: AtomicUsize::new(onion.len()),
            core: Mutex::new(Core {
                onion,
                audit: AuditLog::new(),
            }),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Forward every journal record to `sink` as well.
    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sinks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
        self
    }

    /// Seal `plaintext` into a new layer and hand back its capability.
    pub fn poke(&self, plaintext: &[u8]) -> Sealed {
        self.write(plaintext, false)
    }

    /// Seal `plaintext` into a new layer whose capability is discarded.
    ///
    /// The write counts against WORM like any other.
    pub fn poke_destructive(&self, plaintext: &[u8]) -> Outcome {
        self.write(plaintext, true).outcome
    }

    /// Peel the outermost layer with `capability`.
    pub fn peek(&self, capability: &Capability) -> Peeled {
        if let Err(reason) = self.policy.check_read() {
            debug!(label = %self.label, policy = %self.policy, "peek rejected by policy");
            return Peeled::rejected(reason);
        }
        let (peeled, record) = {
            let Some(_busy) = self.acquire() else {
                trace!(label = %self.label, "peek rejected: busy");
                return Peeled::rejected(Reason::Busy);
            };

            let mut core = self.core();
            let peeled = core.onion.pop(capability);
            let record = self.finish(&mut core, Operation::Peek, peeled.outcome);
            (peeled, record)
        };
        self.forward(record);
        peeled
    }

    /// `OK/BUSY` while an operation is in flight, `OK/KEY` when idle.
    pub fn state(&self) -> Outcome {
        if self.busy.load(Ordering::Acquire) {
            Outcome::ok(Reason::Busy)
        } else {
            Outcome::ok(Reason::Key)
        }
    }

    /// Snapshot of the journal. Takes the exclusive section.
    pub fn audit_records(&self) -> (Vec<AuditRecord>, Outcome) {
        let Some(_busy) = self.acquire() else {
            return (Vec::new(), Outcome::no(Reason::Busy));
        };
        let core = self.core();
        (core.audit.iter().cloned().collect(), Outcome::ok(Reason::Key))
    }

    /// The policy fixed at construction.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The label used in logs and journal records.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Layers in the owned onion as of the last completed operation.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Returns true if the owned onion holds no layers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a WORM facade has used its one write.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Give up the facade and keep the onion.
    pub fn into_onion(self) -> Onion {
        self.core
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .onion
    }

    fn write(&self, plaintext: &[u8], destructive: bool) -> Sealed {
        if let Err(reason) = self.policy.check_write(self.is_locked()) {
            debug!(label = %self.label, policy = %self.policy, "poke rejected by policy");
            return Sealed::rejected(reason);
        }

        let (sealed, record) = {
            let Some(_busy) = self.acquire() else {
                trace!(label = %self.label, "poke rejected: busy");
                return Sealed::rejected(Reason::Busy);
            };

            // A racing WORM writer may have committed between the gate and here.
            if let Err(reason) = self.policy.check_write(self.is_locked()) {
                return Sealed::rejected(reason);
            }

            let mut core = self.core();
            let sealed = core.onion.push(plaintext, destructive);
            if sealed.outcome.is_ok() && self.policy == Policy::Worm {
                self.locked.store(true, Ordering::Release);
            }

            let operation = if destructive {
                Operation::PokeDestructive
            } else {
                Operation::Poke
            };
            let record = self.finish(&mut core, operation, sealed.outcome);
            (sealed, record)
        };
        self.forward(record);
        sealed
    }

    /// Publish the new depth and journal the operation. Runs inside the
    /// exclusive section; the returned record still has to reach the sinks.
    fn finish(&self, core: &mut Core, operation: Operation, outcome: Outcome) -> AuditRecord {
        let depth = core.onion.len();
        self.depth.store(depth, Ordering::Release);

        if outcome.is_err() {
            warn!(label = %self.label, ?operation, %outcome, depth, "operation failed");
        } else {
            debug!(label = %self.label, ?operation, %outcome, depth, "operation complete");
        }

        let record = AuditRecord {
            label: self.label.clone(),
            operation,
            outcome,
            depth,
            timestamp: Utc::now(),
        };
        core.audit.append(record.clone());
        record
    }

    /// Hand a record to every attached sink. Called with the busy flag released.
    fn forward(&self, record: AuditRecord) {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        for sink in sinks.iter_mut() {
            sink.append(record.clone());
        }
    }

    fn acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Only reached while holding the busy flag, so never contended. A
    /// poisoned lock still holds a consistent onion: layers are appended or
    /// removed only after their seal or peel has completed.
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State for Facade {
    fn state(&self) -> Outcome {
        Facade::state(self)
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("label", &self.label)
            .field("policy", &self.policy)
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .field("locked", &self.is_locked())
            .field("depth", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use super::*;
    use crate::error::SpdgError;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_facade_is_shareable() {
        assert_send_sync::<Facade>();
    }

    #[test]
    fn test_busy_facade_rejects_and_reports() {
        let facade = Facade::new(Policy::Open);
        let capability = facade.poke(b"held").capability.unwrap();

        let guard = facade.acquire().unwrap();
        assert_eq!(facade.state(), Outcome::ok(Reason::Busy));
        assert_eq!(facade.poke(b"more").outcome, Outcome::no(Reason::Busy));
        assert_eq!(facade.peek(&capability).outcome, Outcome::no(Reason::Busy));
        assert_eq!(facade.audit_records().1, Outcome::no(Reason::Busy));
        assert_eq!(facade.len(), 1);
        drop(guard);

        assert_eq!(facade.state(), Outcome::ok(Reason::Key));
        assert_eq!(facade.peek(&capability).plaintext, b"held");
    }

    #[test]
    fn test_policy_rejection_wins_over_busy() {
        let facade = Facade::new(Policy::ReadOnly);
        let _guard = facade.acquire().unwrap();
        assert_eq!(facade.poke(b"x").outcome, Outcome::no(Reason::ReadOnly));
    }

    #[test]
    fn test_busy_flag_released_after_panic() {
        let facade = Facade::new(Policy::Open);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = facade.acquire().unwrap();
            panic!("operation aborted");
        }));
        assert!(result.is_err());
        assert_eq!(facade.state(), Outcome::ok(Reason::Key));
        assert!(facade.poke(b"after").outcome.is_ok());
    }

    #[test]
    fn test_journal_records_operations() {
        let facade = Facade::with_label(Policy::Open, "journal");
        let capability = facade.poke(b"a").capability.unwrap();
        assert!(facade.poke_destructive(b"b").is_ok());
        assert!(facade.peek(&capability).outcome.is_no());

        let (records, outcome) = facade.audit_records();
        assert_eq!(outcome, Outcome::ok(Reason::Key));
        let operations: Vec<Operation> = records.iter().map(|r| r.operation).collect();
        assert_eq!(
            operations,
            [Operation::Poke, Operation::PokeDestructive, Operation::Peek]
        );
        assert_eq!(records[1].outcome, Outcome::ok(Reason::Worm));
        assert_eq!(records[2].outcome, Outcome::no(Reason::Key));
        assert_eq!(records[2].depth, 2);
        assert!(records.iter().all(|r| r.label == "journal"));
    }

    #[test]
    fn test_failed_peek_keeps_depth_and_journals_err() {
        let mut onion = Onion::new();
        let capability = onion.push(b"damaged", false).capability.unwrap();
        onion.corrupt_top();
        let facade = Facade::around_with_label(onion, Policy::Open, "vault");

        let peeled = facade.peek(&capability);
        assert_eq!(peeled.outcome, Outcome::err(Reason::Key));
        assert_eq!(peeled.error, Some(SpdgError::DecryptionFailure));
        assert!(peeled.plaintext.is_empty());
        assert_eq!(facade.len(), 1);
        assert_eq!(facade.state(), Outcome::ok(Reason::Key));

        let (records, _) = facade.audit_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation, Operation::Peek);
        assert_eq!(records[0].outcome, Outcome::err(Reason::Key));
        assert_eq!(records[0].depth, 1);
        assert_eq!(records[0].label, "vault");
    }

    #[test]
    fn test_around_with_label_keeps_label() {
        let first = Facade::with_label(Policy::Open, "ledger");
        let _capability = first.poke(b"entry").capability.unwrap();

        let label = first.label().to_string();
        let second = Facade::around_with_label(first.into_onion(), Policy::ReadOnly, label);
        assert_eq!(second.label(), "ledger");
        assert_eq!(second.len(), 1);

        let reset = Facade::around(second.into_onion(), Policy::Open);
        assert_eq!(reset.label(), DEFAULT_LABEL);
    }

    /// Records what the facade reports while the sink is being fed.
    struct StateWitnessSink {
        facade: Arc<OnceLock<Arc<Facade>>>,
        seen: Arc<Mutex<Vec<Outcome>>>,
    }

    impl AuditSink for StateWitnessSink {
        fn append(&mut self, _record: AuditRecord) {
            if let Some(facade) = self.facade.get() {
                self.seen.lock().unwrap().push(facade.state());
            }
        }
    }

    #[test]
    fn test_sinks_run_after_release() {
        let handle = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let facade = Arc::new(Facade::new(Policy::Open).with_audit_sink(Box::new(
            StateWitnessSink {
                facade: Arc::clone(&handle),
                seen: Arc::clone(&seen),
            },
        )));
        assert!(handle.set(Arc::clone(&facade)).is_ok());

        let capability = facade.poke(b"x").capability.unwrap();
        assert!(facade.peek(&capability).outcome.is_ok());

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, [Outcome::ok(Reason::Key), Outcome::ok(Reason::Key)]);
    }

    #[test]
    fn test_state_trait_matches_inherent() {
        fn report(tier: &dyn State) -> Outcome {
            tier.state()
        }
        let facade = Facade::new(Policy::Open);
        assert_eq!(report(&facade), facade.state());
    }
}
