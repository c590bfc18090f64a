//! Plan Accumulator - one single-writer actor per build-plan identity.
//!
//! Producers hold cheap `PlanHandle` clones and send registrations over a
//! channel; the actor thread owns the `Plan` and applies them in arrival
//! order. Flush and stop are request/reply so callers block until done.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;

use super::plan::{AsAnyScope, DeclContext, EnsureRequest, FieldDecl, Plan};
use super::store::PlanStore;
use crate::types::PreconditionDescriptor;
use crate::utils::{Error, Result};

// ==================== Messages ====================

enum Message {
    Field {
        module: String,
        field: String,
        decl: FieldDecl,
    },
    Environment {
        module: String,
        context: DeclContext,
    },
    Preconditions {
        module: String,
        descriptors: Vec<PreconditionDescriptor>,
    },
    StructCheck(EnsureRequest),
    DefaultCheck(EnsureRequest),
    RemoteAsAny {
        scope: AsAnyScope,
        module: String,
        names: Vec<String>,
    },
    Snapshot(Sender<Plan>),
    Flush(Sender<Result<()>>),
    Stop(Sender<()>),
}

fn run_actor(store: PlanStore, mut plan: Plan, inbox: Receiver<Message>, alive: Arc<AtomicBool>) {
    // Unflushed registrations are dropped on stop; durable state stays as last flushed
    for message in inbox {
        match message {
            Message::Field { module, field, decl } => plan.register_field(&module, &field, decl),
            Message::Environment { module, context } => plan.register_environment(&module, context),
            Message::Preconditions { module, descriptors } => plan.register_preconditions(&module, descriptors),
            Message::StructCheck(request) => plan.register_struct_check(request),
            Message::DefaultCheck(request) => plan.register_default_check(request),
            Message::RemoteAsAny { scope, module, names } => plan.register_remote_as_any(&scope, &module, names),
            Message::Snapshot(reply) => {
                let _ = reply.send(plan.clone());
            }
            Message::Flush(reply) => {
                let result = store.save_plan(&plan);
                if result.is_ok() {
                    debug!("flushed plan to {}", store.dir().display());
                }
                let _ = reply.send(result);
            }
            Message::Stop(reply) => {
                alive.store(false, Ordering::SeqCst);
                let _ = reply.send(());
                return;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
}

// ==================== Handle ====================

/// Sending side of one live accumulator
#[derive(Debug, Clone)]
pub struct PlanHandle {
    dir: PathBuf,
    sender: Sender<Message>,
    alive: Arc<AtomicBool>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Field { .. } => "Field",
            Self::Environment { .. } => "Environment",
            Self::Preconditions { .. } => "Preconditions",
            Self::StructCheck(_) => "StructCheck",
            Self::DefaultCheck(_) => "DefaultCheck",
            Self::RemoteAsAny { .. } => "RemoteAsAny",
            Self::Snapshot(_) => "Snapshot",
            Self::Flush(_) => "Flush",
            Self::Stop(_) => "Stop",
        };
        f.write_str(name)
    }
}

impl PlanHandle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn stopped(&self) -> Error {
        Error::AccumulatorStopped {
            plan: self.dir.display().to_string(),
        }
    }

    /// Registrations never fail; after stop they are dropped with a warning
    fn send(&self, message: Message) {
        if let Err(mpsc::SendError(message)) = self.sender.send(message) {
            warn!(
                "plan accumulator for {} is stopped, dropping {:?} registration",
                self.dir.display(),
                message
            );
        }
    }

    pub fn register_field(&self, module: &str, field: &str, decl: FieldDecl) {
        self.send(Message::Field {
            module: module.to_string(),
            field: field.to_string(),
            decl,
        });
    }

    pub fn register_environment(&self, module: &str, context: DeclContext) {
        self.send(Message::Environment {
            module: module.to_string(),
            context,
        });
    }

    pub fn register_preconditions(&self, module: &str, descriptors: Vec<PreconditionDescriptor>) {
        self.send(Message::Preconditions {
            module: module.to_string(),
            descriptors,
        });
    }

    pub fn register_struct_check(&self, request: EnsureRequest) {
        self.send(Message::StructCheck(request));
    }

    pub fn register_default_check(&self, request: EnsureRequest) {
        self.send(Message::DefaultCheck(request));
    }

    pub fn register_remote_as_any(&self, scope: AsAnyScope, module: &str, names: Vec<String>) {
        self.send(Message::RemoteAsAny {
            scope,
            module: module.to_string(),
            names,
        });
    }

    /// The merged plan as of every registration sent before this call
    pub fn snapshot(&self) -> Result<Plan> {
        let (reply, response) = mpsc::channel();
        self.sender
            .send(Message::Snapshot(reply))
            .map_err(|_| self.stopped())?;
        response.recv().map_err(|_| self.stopped())
    }

    /// Persist the merged plan; durable once this returns
    pub fn flush(&self) -> Result<()> {
        let (reply, response) = mpsc::channel();
        self.sender.send(Message::Flush(reply)).map_err(|_| self.stopped())?;
        response.recv().map_err(|_| self.stopped())?
    }

    /// Terminate the actor without flushing. Stopping twice is a no-op.
    pub fn stop(&self) {
        let (reply, response) = mpsc::channel();
        if self.sender.send(Message::Stop(reply)).is_ok() {
            let _ = response.recv();
            info!("stopped plan accumulator for {}", self.dir.display());
        }
    }
}

// ==================== Registry ====================

/// Build-plan identity (its storage directory) to live accumulator
#[derive(Debug, Default)]
pub struct PlanRegistry {
    live: Mutex<HashMap<PathBuf, PlanHandle>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry for host integrations
    pub fn global() -> &'static PlanRegistry {
        static GLOBAL: OnceLock<PlanRegistry> = OnceLock::new();
        GLOBAL.get_or_init(PlanRegistry::new)
    }

    /// Start an accumulator for `dir`, or return the one already live.
    /// A plan persisted by an earlier run is merged in first.
    pub fn start(&self, dir: &Path) -> Result<PlanHandle> {
        let mut live = self.live.lock();
        if let Some(handle) = live.get(dir) {
            if handle.is_live() {
                debug!("plan accumulator for {} already live", dir.display());
                return Ok(handle.clone());
            }
        }

        let store = PlanStore::new(dir);
        let mut plan = Plan::new();
        if let Some(persisted) = store.load_plan()? {
            info!("merging persisted plan from {}", dir.display());
            plan.merge(persisted);
        }

        let (sender, inbox) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let actor_alive = Arc::clone(&alive);
        thread::Builder::new()
            .name(format!("plan-accumulator:{}", dir.display()))
            .spawn(move || run_actor(store, plan, inbox, actor_alive))
            .map_err(|e| Error::io(dir, e))?;

        let handle = PlanHandle {
            dir: dir.to_path_buf(),
            sender,
            alive,
        };
        live.insert(dir.to_path_buf(), handle.clone());
        info!("started plan accumulator for {}", dir.display());
        Ok(handle)
    }

    /// Same as `start`; reads better at call sites that may race
    pub fn ensure_started(&self, dir: &Path) -> Result<PlanHandle> {
        self.start(dir)
    }

    /// Whether a build pass is in progress for `dir`
    pub fn is_live(&self, dir: &Path) -> bool {
        self.live.lock().get(dir).map(PlanHandle::is_live).unwrap_or(false)
    }

    pub fn handle(&self, dir: &Path) -> Option<PlanHandle> {
        self.live.lock().get(dir).filter(|h| h.is_live()).cloned()
    }

    /// Stop without flushing
    pub fn stop(&self, dir: &Path) -> Result<()> {
        // Held until the actor is gone so `start` cannot hand out the dying handle
        let mut live = self.live.lock();
        if let Some(handle) = live.remove(dir) {
            handle.stop();
        }
        Ok(())
    }

    /// Flush then stop; a no-op if nothing is live for `dir`.
    /// A `start` racing with this call waits and then loads the flushed plan.
    pub fn ensure_flushed_and_stopped(&self, dir: &Path) -> Result<()> {
        let mut live = self.live.lock();
        match live.remove(dir) {
            Some(handle) if handle.is_live() => {
                let flushed = handle.flush();
                handle.stop();
                flushed
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Value;
    use crate::types::{Builtin, TypeExpr};
    use crate::utils::SourceLocation;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn int() -> FieldDecl {
        FieldDecl::new(TypeExpr::builtin(Builtin::Integer))
    }

    #[test]
    fn test_start_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let first = registry.start(dir.path()).unwrap();
        let second = registry.ensure_started(dir.path()).unwrap();

        first.register_field("A", "x", int());
        assert_eq!(second.snapshot().unwrap().pending_field_types["A"].len(), 1);
        registry.stop(dir.path()).unwrap();
    }

    #[test]
    fn test_registrations_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let handle = registry.start(dir.path()).unwrap();

        handle.register_field("A", "x", int());
        handle.register_field("A", "x", FieldDecl::new(TypeExpr::atom("ok")));
        handle.register_struct_check(EnsureRequest::new("A", vec![("x", Value::Integer(1))], SourceLocation::dummy()));
        handle.register_struct_check(EnsureRequest::new("A", vec![("x", Value::Integer(2))], SourceLocation::dummy()));
        handle.register_remote_as_any(AsAnyScope::Global, "M", vec!["t".to_string()]);

        let plan = handle.snapshot().unwrap();
        assert_eq!(plan.pending_field_types["A"]["x"].ty, TypeExpr::atom("ok"));
        assert_eq!(plan.structs_to_ensure.len(), 2);
        assert_eq!(plan.structs_to_ensure[1].fields["x"], Value::Integer(2));
        assert!(plan.remote_as_any.matches("A", "M", "t"));
        registry.stop(dir.path()).unwrap();
    }

    #[test]
    fn test_liveness() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        assert!(!registry.is_live(dir.path()));

        let handle = registry.start(dir.path()).unwrap();
        assert!(registry.is_live(dir.path()));
        assert!(registry.handle(dir.path()).is_some());

        registry.stop(dir.path()).unwrap();
        assert!(!registry.is_live(dir.path()));
        assert!(!handle.is_live());
    }

    #[test]
    fn test_independent_identities() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let ha = registry.start(a.path()).unwrap();
        let hb = registry.start(b.path()).unwrap();

        ha.register_field("A", "x", int());
        assert!(hb.snapshot().unwrap().is_empty());
        registry.stop(a.path()).unwrap();
        registry.stop(b.path()).unwrap();
    }

    #[test]
    fn test_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let handle = registry.start(dir.path()).unwrap();
        handle.stop();
        handle.stop();

        handle.register_field("A", "x", int());
        let err = handle.flush().unwrap_err();
        assert_eq!(err.kind(), "accumulator_stopped");
        assert!(handle.snapshot().is_err());
        registry.ensure_flushed_and_stopped(dir.path()).unwrap();
    }

    #[test]
    fn test_stop_does_not_flush() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let handle = registry.start(dir.path()).unwrap();
        handle.register_field("A", "x", int());
        registry.stop(dir.path()).unwrap();
        assert!(PlanStore::new(dir.path()).load_plan().unwrap().is_none());
    }

    #[test]
    fn test_merge_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let handle = registry.start(dir.path()).unwrap();
        handle.register_field("A", "x", int());
        handle.register_default_check(EnsureRequest::new("A", vec![], SourceLocation::dummy()));
        registry.ensure_flushed_and_stopped(dir.path()).unwrap();

        let handle = registry.start(dir.path()).unwrap();
        handle.register_field("B", "y", int());
        handle.register_default_check(EnsureRequest::new("B", vec![], SourceLocation::dummy()));
        let plan = handle.snapshot().unwrap();
        let modules: Vec<_> = plan.record_modules().cloned().collect();
        assert_eq!(modules, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(plan.struct_defaults_to_ensure.len(), 2);
        registry.stop(dir.path()).unwrap();
    }

    #[test]
    fn test_concurrent_producers_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let handle = registry.start(dir.path()).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let handle = handle.clone();
                thread::spawn(move || {
                    let module = format!("P{}", p);
                    for i in 0..25 {
                        handle.register_field(&module, &format!("f{}", i), int());
                        handle.register_struct_check(EnsureRequest::new(
                            &module,
                            vec![("seq", Value::Integer(i))],
                            SourceLocation::dummy(),
                        ));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let plan = handle.snapshot().unwrap();
        assert_eq!(plan.structs_to_ensure.len(), 100);
        for p in 0..4 {
            let module = format!("P{}", p);
            let fields: Vec<_> = plan.pending_field_types[&module].keys().cloned().collect();
            let expected: Vec<_> = (0..25).map(|i| format!("f{}", i)).collect();
            assert_eq!(fields, expected);

            let seqs: Vec<_> = plan
                .structs_to_ensure
                .iter()
                .filter(|r| r.module == module)
                .map(|r| r.fields["seq"].clone())
                .collect();
            let expected: Vec<_> = (0..25).map(Value::Integer).collect();
            assert_eq!(seqs, expected);
        }
        registry.stop(dir.path()).unwrap();
    }

    #[test]
    fn test_restart_racing_flush_sees_flushed_plan() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let registry = Arc::new(PlanRegistry::new());
            let handle = registry.start(dir.path()).unwrap();
            handle.register_field("A", "x", int());

            let path = dir.path().to_path_buf();
            let finisher = {
                let registry = Arc::clone(&registry);
                let path = path.clone();
                thread::spawn(move || registry.ensure_flushed_and_stopped(&path).unwrap())
            };
            let restarter = {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.ensure_started(&path).unwrap())
            };
            finisher.join().unwrap();
            let next = restarter.join().unwrap();

            // Either the old actor (now stopped) or a fresh one that merged the flush
            if next.is_live() {
                let plan = next.snapshot().unwrap();
                assert!(plan.pending_field_types["A"].contains_key("x"));
                registry.stop(dir.path()).unwrap();
            }
        }
    }

    #[test]
    fn test_reflush_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PlanRegistry::new();
        let handle = registry.start(dir.path()).unwrap();
        handle.register_field("A", "x", int());
        handle.register_preconditions("A", vec![PreconditionDescriptor::new("t", "ok", "a_ok")]);
        handle.flush().unwrap();
        handle.flush().unwrap();
        registry.stop(dir.path()).unwrap();

        let store = PlanStore::new(dir.path());
        let first = fs::read(store.plan_path()).unwrap();
        let first_pre = fs::read(store.preconditions_path()).unwrap();

        let other = PlanRegistry::new();
        other.start(dir.path()).unwrap().flush().unwrap();
        other.stop(dir.path()).unwrap();

        assert_eq!(fs::read(store.plan_path()).unwrap(), first);
        assert_eq!(fs::read(store.preconditions_path()).unwrap(), first_pre);
    }
}
