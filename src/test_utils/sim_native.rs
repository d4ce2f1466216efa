//! In-memory stand-in for `libfdb_c`
//!
//! Implements [`NativeApi`] with fake handle addresses and a versioned
//! in-memory keyspace per tenant. Futures become ready on the simulated
//! network thread (`run_network`), which invokes the registered callback the
//! way the real client does. Knobs let tests hold completions, fail commits,
//! reuse freed addresses and inspect protocol violations.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::ffi::c_char;
use std::ffi::c_void;
use std::ffi::CStr;
use std::ptr;
use std::slice;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::constants::*;
use crate::FDBDatabase;
use crate::FDBFuture;
use crate::FDBKeyValue;
use crate::FDBTenant;
use crate::FDBTransaction;
use crate::FdbBool;
use crate::FdbCallback;
use crate::FdbErrorCode;
use crate::NativeApi;
use crate::OptionScope;

const FIRST_ADDR: usize = 0x1000;
const ADDR_STEP: usize = 0x10;
const POISON: u8 = 0xDB;
const DEFAULT_RANGE_BATCH: usize = 100;

/// Misuse of the native API observed by the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DoubleFree { kind: &'static str, addr: usize },
    UseAfterFree { call: &'static str, addr: usize },
    DestroyedWithLiveChildren { kind: &'static str, addr: usize, children: usize },
    ReadAfterRelease { call: &'static str, addr: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SimValue {
    Unit,
    Int64(i64),
    Key(Vec<u8>),
    Value(Option<Vec<u8>>),
    KeyValues(Vec<(Vec<u8>, Vec<u8>)>, bool),
}

type SimResult = Result<SimValue, FdbErrorCode>;

enum SimEvent {
    Complete { addr: usize, serial: u64, result: SimResult },
    Stop,
}

/// Raw key-value descriptors pointing into the owning future's payload
struct KvArray(Vec<FDBKeyValue>);

// SAFETY: the pointers only reference buffers owned by the same `SimFuture`.
unsafe impl Send for KvArray {}
// SAFETY: as above; the array is never mutated after construction.
unsafe impl Sync for KvArray {}

struct SimFuture {
    serial: u64,
    ready: Option<SimResult>,
    callback: Option<(FdbCallback, usize)>,
    released: bool,
    watch: bool,
    kv: Option<KvArray>,
}

struct WatchRecord {
    addr: usize,
    serial: u64,
    key: Vec<u8>,
    seen: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
enum Mutation {
    Set(Vec<u8>, Vec<u8>),
    Clear(Vec<u8>),
    ClearRange(Vec<u8>, Vec<u8>),
    Atomic(Vec<u8>, Vec<u8>, i32),
}

impl Mutation {
    fn touches(
        &self,
        key: &[u8],
    ) -> bool {
        match self {
            Mutation::Set(k, _) | Mutation::Clear(k) | Mutation::Atomic(k, _, _) => k.as_slice() == key,
            Mutation::ClearRange(b, e) => b.as_slice() <= key && key < e.as_slice(),
        }
    }

    fn apply(
        &self,
        view: &mut BTreeMap<Vec<u8>, Vec<u8>>,
    ) {
        match self {
            Mutation::Set(k, v) => {
                view.insert(k.clone(), v.clone());
            }
            Mutation::Clear(k) => {
                view.remove(k);
            }
            Mutation::ClearRange(b, e) => {
                if b < e {
                    let doomed: Vec<Vec<u8>> = view.range(b.clone()..e.clone()).map(|(k, _)| k.clone()).collect();
                    for k in doomed {
                        view.remove(&k);
                    }
                }
            }
            Mutation::Atomic(k, param, op) => match atomic(view.get(k).map(|v| v.as_slice()), param, *op) {
                Some(v) => {
                    view.insert(k.clone(), v);
                }
                None => {
                    view.remove(k);
                }
            },
        }
    }
}

/// Resize a little-endian operand to `len` bytes.
fn resize_le(
    value: &[u8],
    len: usize,
) -> Vec<u8> {
    let mut out = value.to_vec();
    out.resize(len, 0);
    out
}

fn cmp_le(
    a: &[u8],
    b: &[u8],
) -> std::cmp::Ordering {
    a.iter().rev().cmp(b.iter().rev())
}

fn atomic(
    existing: Option<&[u8]>,
    param: &[u8],
    op: i32,
) -> Option<Vec<u8>> {
    let Some(existing) = existing else {
        return match op {
            20 => None,
            _ => Some(param.to_vec()),
        };
    };
    let current = resize_le(existing, param.len());
    let result = match op {
        2 => {
            let mut carry = 0u16;
            current
                .iter()
                .zip(param)
                .map(|(a, b)| {
                    let sum = *a as u16 + *b as u16 + carry;
                    carry = sum >> 8;
                    sum as u8
                })
                .collect()
        }
        6 => current.iter().zip(param).map(|(a, b)| a & b).collect(),
        7 => current.iter().zip(param).map(|(a, b)| a | b).collect(),
        8 => current.iter().zip(param).map(|(a, b)| a ^ b).collect(),
        12 => {
            if cmp_le(&current, param).is_ge() {
                current
            } else {
                param.to_vec()
            }
        }
        13 => {
            if cmp_le(&current, param).is_le() {
                current
            } else {
                param.to_vec()
            }
        }
        16 => existing.min(param).to_vec(),
        17 => existing.max(param).to_vec(),
        20 => {
            return if existing == param { None } else { Some(existing.to_vec()) };
        }
        _ => existing.to_vec(),
    };
    Some(result)
}

#[derive(Default)]
struct Keyspace {
    history: BTreeMap<Vec<u8>, Vec<(i64, Option<Vec<u8>>)>>,
    armed: Vec<WatchRecord>,
}

impl Keyspace {
    fn value_at(
        &self,
        key: &[u8],
        version: i64,
    ) -> Option<Vec<u8>> {
        self.history
            .get(key)
            .and_then(|h| h.iter().rev().find(|(v, _)| *v <= version))
            .and_then(|(_, value)| value.clone())
    }

    fn latest(
        &self,
        key: &[u8],
    ) -> Option<Vec<u8>> {
        self.history.get(key).and_then(|h| h.last()).and_then(|(_, value)| value.clone())
    }

    fn snapshot(
        &self,
        version: i64,
    ) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.history
            .keys()
            .filter_map(|k| self.value_at(k, version).map(|v| (k.clone(), v)))
            .collect()
    }

    fn written_after(
        &self,
        key: &[u8],
        version: i64,
    ) -> bool {
        self.history
            .get(key)
            .and_then(|h| h.last())
            .is_some_and(|(v, _)| *v > version)
    }

    fn range_written_after(
        &self,
        begin: &[u8],
        end: &[u8],
        version: i64,
    ) -> bool {
        if begin >= end {
            return false;
        }
        self.history
            .range(begin.to_vec()..end.to_vec())
            .any(|(_, h)| h.last().is_some_and(|(v, _)| *v > version))
    }

    fn write(
        &mut self,
        version: i64,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
    ) {
        self.history.entry(key).or_default().push((version, value));
    }

    fn apply(
        &mut self,
        version: i64,
        mutation: &Mutation,
    ) {
        match mutation {
            Mutation::Set(k, v) => self.write(version, k.clone(), Some(v.clone())),
            Mutation::Clear(k) => {
                if self.latest(k).is_some() {
                    self.write(version, k.clone(), None);
                }
            }
            Mutation::ClearRange(b, e) => {
                if b < e {
                    let live: Vec<Vec<u8>> = self
                        .history
                        .range(b.clone()..e.clone())
                        .filter(|(_, h)| h.last().is_some_and(|(_, v)| v.is_some()))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for k in live {
                        self.write(version, k, None);
                    }
                }
            }
            Mutation::Atomic(k, param, op) => {
                let current = self.latest(k);
                let next = atomic(current.as_deref(), param, *op);
                if next.is_some() || current.is_some() {
                    self.write(version, k.clone(), next);
                }
            }
        }
    }

    /// Removes and returns armed watches whose key no longer holds the value they saw.
    fn trigger(&mut self) -> Vec<(usize, u64)> {
        let mut fired = Vec::new();
        let armed = std::mem::take(&mut self.armed);
        for w in armed {
            if self.latest(&w.key) != w.seen {
                fired.push((w.addr, w.serial));
            } else {
                self.armed.push(w);
            }
        }
        fired
    }
}

#[derive(Default)]
struct Store {
    version: i64,
    spaces: HashMap<Option<Vec<u8>>, Keyspace>,
}

struct SimTransaction {
    parent: usize,
    space: Option<Vec<u8>>,
    read_version: Option<i64>,
    mutations: Vec<Mutation>,
    read_keys: Vec<Vec<u8>>,
    read_ranges: Vec<(Vec<u8>, Vec<u8>)>,
    watches: Vec<WatchRecord>,
    committed_version: Option<i64>,
    cancelled: bool,
}

impl SimTransaction {
    fn new(
        parent: usize,
        space: Option<Vec<u8>>,
    ) -> Self {
        Self {
            parent,
            space,
            read_version: None,
            mutations: Vec::new(),
            read_keys: Vec::new(),
            read_ranges: Vec::new(),
            watches: Vec::new(),
            committed_version: None,
            cancelled: false,
        }
    }

    fn read_version(
        &mut self,
        store: &Store,
    ) -> i64 {
        *self.read_version.get_or_insert(store.version)
    }

    /// The key as this transaction sees it: its snapshot plus its own writes.
    fn view_key(
        &mut self,
        store: &Store,
        key: &[u8],
    ) -> Option<Vec<u8>> {
        let rv = self.read_version(store);
        let base = store.spaces.get(&self.space).and_then(|s| s.value_at(key, rv));
        let mut view = BTreeMap::new();
        if let Some(v) = base {
            view.insert(key.to_vec(), v);
        }
        for m in self.mutations.iter().filter(|m| m.touches(key)) {
            m.apply(&mut view);
        }
        view.remove(key)
    }

    fn view_all(
        &mut self,
        store: &Store,
    ) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let rv = self.read_version(store);
        let mut view = store.spaces.get(&self.space).map(|s| s.snapshot(rv)).unwrap_or_default();
        for m in &self.mutations {
            m.apply(&mut view);
        }
        view
    }

    /// Clears per-attempt state; returns the watches that never became active.
    fn reset(&mut self) -> Vec<WatchRecord> {
        self.read_version = None;
        self.mutations.clear();
        self.read_keys.clear();
        self.read_ranges.clear();
        self.committed_version = None;
        self.cancelled = false;
        std::mem::take(&mut self.watches)
    }
}

struct Allocator {
    next: usize,
    free: Vec<usize>,
    freed: HashSet<usize>,
    reuse: bool,
}

impl Allocator {
    fn alloc(&mut self) -> usize {
        if self.reuse {
            if let Some(addr) = self.free.pop() {
                self.freed.remove(&addr);
                return addr;
            }
        }
        let addr = self.next;
        self.next += ADDR_STEP;
        addr
    }

    fn release(
        &mut self,
        addr: usize,
    ) {
        self.free.push(addr);
        self.freed.insert(addr);
    }
}

#[derive(Default)]
struct NetState {
    api_selected: bool,
    setup: bool,
    running: bool,
    stopped: bool,
}

struct SimDatabase {
    cluster_file: Option<String>,
}

struct SimTenant {
    db: usize,
    name: Vec<u8>,
}

pub struct SimNative {
    alloc: Mutex<Allocator>,
    net: Mutex<NetState>,
    events: mpsc::Sender<SimEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<SimEvent>>>,
    hold: AtomicBool,
    held: Mutex<Vec<SimEvent>>,
    next_serial: AtomicU64,
    futures: DashMap<usize, SimFuture>,
    databases: DashMap<usize, SimDatabase>,
    tenants: DashMap<usize, SimTenant>,
    transactions: DashMap<usize, SimTransaction>,
    store: Mutex<Store>,
    fail_next_commit: Mutex<Option<FdbErrorCode>>,
    range_batch: AtomicUsize,
    violations: Mutex<Vec<Violation>>,
    options_seen: Mutex<Vec<(OptionScope, i32, Option<Vec<u8>>)>>,
}

unsafe fn bytes_of(
    data: *const u8,
    len: i32,
) -> Vec<u8> {
    match usize::try_from(len) {
        Ok(len) if len > 0 && !data.is_null() => slice::from_raw_parts(data, len).to_vec(),
        _ => Vec::new(),
    }
}

unsafe fn param_of(
    data: *const u8,
    len: i32,
) -> Option<Vec<u8>> {
    (!data.is_null()).then(|| bytes_of(data, len))
}

fn is_retryable(code: FdbErrorCode) -> bool {
    matches!(
        code,
        ERROR_TRANSACTION_TOO_OLD | ERROR_FUTURE_VERSION | ERROR_NOT_COMMITTED | ERROR_COMMIT_UNKNOWN_RESULT | 1037
    )
}

fn is_maybe_committed(code: FdbErrorCode) -> bool {
    code == ERROR_COMMIT_UNKNOWN_RESULT
}

fn error_text(code: FdbErrorCode) -> &'static [u8] {
    match code {
        ERROR_SUCCESS => b"Success\0",
        ERROR_TRANSACTION_TOO_OLD => b"Transaction is too old to perform reads or be committed\0",
        ERROR_FUTURE_VERSION => b"Request for future version\0",
        ERROR_NOT_COMMITTED => b"Transaction not committed due to conflict with another transaction\0",
        ERROR_COMMIT_UNKNOWN_RESULT => b"Transaction may or may not have committed\0",
        ERROR_TRANSACTION_CANCELLED => b"Operation aborted because the transaction was cancelled\0",
        ERROR_OPERATION_CANCELLED => b"Asynchronous operation cancelled\0",
        ERROR_CLIENT_INVALID_OPERATION => b"Invalid API call\0",
        ERROR_INVALID_OPTION => b"Option not valid in this context\0",
        ERROR_NETWORK_NOT_SETUP => b"Action not possible before the network is configured\0",
        ERROR_NETWORK_ALREADY_SETUP => b"Network can be configured only once\0",
        ERROR_USED_DURING_COMMIT => b"Operation issued while a commit was outstanding\0",
        ERROR_NETWORK_STOPPED => b"Network can only be started once\0",
        ERROR_API_VERSION_ALREADY_SET => b"API version may be set only once\0",
        ERROR_API_VERSION_NOT_SUPPORTED => b"API version not supported\0",
        _ => b"Unknown error\0",
    }
}

/// Index into `keys` a selector resolves to, clamped to `0..=keys.len()`.
/// Unclamped index a selector points at; negative is before the first key.
fn selector_index(
    keys: &[&Vec<u8>],
    key: &[u8],
    or_equal: bool,
    offset: i32,
) -> i64 {
    let at_or_before = if or_equal {
        keys.partition_point(|k| k.as_slice() <= key)
    } else {
        keys.partition_point(|k| k.as_slice() < key)
    };
    at_or_before as i64 - 1 + offset as i64
}

fn resolve_selector(
    keys: &[&Vec<u8>],
    key: &[u8],
    or_equal: bool,
    offset: i32,
) -> usize {
    selector_index(keys, key, or_equal, offset).clamp(0, keys.len() as i64) as usize
}

impl SimNative {
    pub fn new() -> Arc<Self> {
        let (events, events_rx) = mpsc::channel();
        Arc::new(SimNative {
            alloc: Mutex::new(Allocator {
                next: FIRST_ADDR,
                free: Vec::new(),
                freed: HashSet::new(),
                reuse: false,
            }),
            net: Mutex::new(NetState::default()),
            events,
            events_rx: Mutex::new(Some(events_rx)),
            hold: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            next_serial: AtomicU64::new(1),
            futures: DashMap::new(),
            databases: DashMap::new(),
            tenants: DashMap::new(),
            transactions: DashMap::new(),
            store: Mutex::new(Store::default()),
            fail_next_commit: Mutex::new(None),
            range_batch: AtomicUsize::new(DEFAULT_RANGE_BATCH),
            violations: Mutex::new(Vec::new()),
            options_seen: Mutex::new(Vec::new()),
        })
    }

    // -
    // Knobs

    /// Hand out freed addresses again, most recently freed first.
    pub fn set_address_reuse(
        &self,
        reuse: bool,
    ) {
        self.alloc.lock().reuse = reuse;
    }

    /// Queue completions instead of delivering them.
    pub fn hold_completions(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Deliver everything queued and stop holding.
    pub fn release_held(&self) {
        let held = {
            let mut held = self.held.lock();
            self.hold.store(false, Ordering::SeqCst);
            std::mem::take(&mut *held)
        };
        for event in held {
            let _ = self.events.send(event);
        }
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// The next commit fails with `code`.
    pub fn fail_next_commit(
        &self,
        code: FdbErrorCode,
    ) {
        *self.fail_next_commit.lock() = Some(code);
    }

    /// Maximum pairs per range batch for streaming modes.
    pub fn set_range_batch(
        &self,
        batch: usize,
    ) {
        self.range_batch.store(batch.max(1), Ordering::SeqCst);
    }

    // -
    // Inspection

    pub fn violations(&self) -> Vec<Violation> {
        self.violations.lock().clone()
    }

    pub fn options_seen(&self) -> Vec<(OptionScope, i32, Option<Vec<u8>>)> {
        self.options_seen.lock().clone()
    }

    pub fn live_futures(&self) -> usize {
        self.futures.len()
    }

    pub fn live_transactions(&self) -> usize {
        self.transactions.len()
    }

    pub fn live_tenants(&self) -> usize {
        self.tenants.len()
    }

    pub fn live_databases(&self) -> usize {
        self.databases.len()
    }

    pub fn cluster_files(&self) -> Vec<Option<String>> {
        self.databases.iter().map(|d| d.cluster_file.clone()).collect()
    }

    pub fn is_future_ready(
        &self,
        addr: usize,
    ) -> bool {
        self.futures.get(&addr).is_some_and(|f| f.ready.is_some())
    }

    /// Latest committed value of `key`.
    pub fn read(
        &self,
        tenant: Option<&[u8]>,
        key: &[u8],
    ) -> Option<Vec<u8>> {
        let store = self.store.lock();
        store
            .spaces
            .get(&tenant.map(|t| t.to_vec()))
            .and_then(|s| s.latest(key))
    }

    /// Commits a single write outside any transaction; returns its version.
    pub fn put(
        &self,
        tenant: Option<&[u8]>,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> i64 {
        let (version, fired) = {
            let mut store = self.store.lock();
            store.version += 1;
            let version = store.version;
            let space = store.spaces.entry(tenant.map(|t| t.to_vec())).or_default();
            space.write(version, key.to_vec(), value.map(|v| v.to_vec()));
            (version, space.trigger())
        };
        for (addr, serial) in fired {
            self.deliver(addr, serial, Ok(SimValue::Unit));
        }
        version
    }

    // -
    // Internals

    fn violation(
        &self,
        v: Violation,
    ) {
        self.violations.lock().push(v);
    }

    fn bad_handle(
        &self,
        kind: &'static str,
        call: &'static str,
        addr: usize,
        destroying: bool,
    ) {
        let freed = self.alloc.lock().freed.contains(&addr);
        if destroying && freed {
            self.violation(Violation::DoubleFree { kind, addr });
        } else {
            self.violation(Violation::UseAfterFree { call, addr });
        }
    }

    fn new_future(
        &self,
        watch: bool,
    ) -> (usize, u64) {
        let addr = self.alloc.lock().alloc();
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        self.futures.insert(
            addr,
            SimFuture {
                serial,
                ready: None,
                callback: None,
                released: false,
                watch,
                kv: None,
            },
        );
        (addr, serial)
    }

    fn deliver(
        &self,
        addr: usize,
        serial: u64,
        result: SimResult,
    ) {
        let event = SimEvent::Complete { addr, serial, result };
        {
            let mut held = self.held.lock();
            if self.hold.load(Ordering::SeqCst) {
                held.push(event);
                return;
            }
        }
        let _ = self.events.send(event);
    }

    fn fail_watches(
        &self,
        watches: Vec<WatchRecord>,
        code: FdbErrorCode,
    ) {
        for w in watches {
            self.deliver(w.addr, w.serial, Err(code));
        }
    }

    /// Marks a future ready and runs its callback outside every lock.
    fn complete(
        &self,
        addr: usize,
        serial: u64,
        result: SimResult,
    ) {
        let callback = match self.futures.get_mut(&addr) {
            Some(mut f) if f.serial == serial && f.ready.is_none() => {
                f.ready = Some(result);
                f.callback.take()
            }
            _ => None,
        };
        if let Some((callback, param)) = callback {
            // SAFETY: the callback and its parameter were registered together.
            unsafe { callback(addr as *mut FDBFuture, param as *mut c_void) };
        }
    }

    /// Issues a future that completes with `result`.
    fn issue(
        &self,
        result: SimResult,
    ) -> *mut FDBFuture {
        let (addr, serial) = self.new_future(false);
        self.deliver(addr, serial, result);
        addr as *mut FDBFuture
    }

    fn with_tx<R>(
        &self,
        call: &'static str,
        tr: *mut FDBTransaction,
        f: impl FnOnce(&mut SimTransaction) -> R,
    ) -> Option<R> {
        let addr = tr as usize;
        match self.transactions.get_mut(&addr) {
            Some(mut tx) => Some(f(&mut tx)),
            None => {
                self.bad_handle("transaction", call, addr, false);
                None
            }
        }
    }

    fn disarm_watch(
        &self,
        addr: usize,
        serial: u64,
    ) {
        {
            let mut store = self.store.lock();
            for space in store.spaces.values_mut() {
                space.armed.retain(|w| !(w.addr == addr && w.serial == serial));
            }
        }
        for mut tx in self.transactions.iter_mut() {
            tx.watches.retain(|w| !(w.addr == addr && w.serial == serial));
        }
    }

    fn record_option(
        &self,
        scope: OptionScope,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) {
        // SAFETY: the caller passes a buffer valid for `value_length` bytes or null.
        let param = unsafe { param_of(value, value_length) };
        self.options_seen.lock().push((scope, option, param));
    }

    fn commit(
        &self,
        tx: &mut SimTransaction,
    ) -> (SimResult, Vec<(usize, u64, SimResult)>) {
        let mut effects = Vec::new();

        if tx.cancelled {
            for w in tx.watches.drain(..) {
                effects.push((w.addr, w.serial, Err(ERROR_TRANSACTION_CANCELLED)));
            }
            return (Err(ERROR_TRANSACTION_CANCELLED), effects);
        }
        if tx.committed_version.is_some() {
            return (Err(ERROR_USED_DURING_COMMIT), effects);
        }
        if let Some(code) = self.fail_next_commit.lock().take() {
            for w in tx.watches.drain(..) {
                effects.push((w.addr, w.serial, Err(code)));
            }
            return (Err(code), effects);
        }

        let mut store = self.store.lock();
        // Read-only commits never conflict.
        if let Some(rv) = tx.read_version.filter(|_| !tx.mutations.is_empty()) {
            let conflict = store.spaces.get(&tx.space).is_some_and(|space| {
                tx.read_keys.iter().any(|k| space.written_after(k, rv))
                    || tx.read_ranges.iter().any(|(b, e)| space.range_written_after(b, e, rv))
            });
            if conflict {
                for w in tx.watches.drain(..) {
                    effects.push((w.addr, w.serial, Err(ERROR_NOT_COMMITTED)));
                }
                return (Err(ERROR_NOT_COMMITTED), effects);
            }
        }

        let version = if tx.mutations.is_empty() {
            -1
        } else {
            store.version += 1;
            store.version
        };
        let space = store.spaces.entry(tx.space.clone()).or_default();
        for m in &tx.mutations {
            space.apply(version, m);
        }
        for (addr, serial) in space.trigger() {
            effects.push((addr, serial, Ok(SimValue::Unit)));
        }
        for w in tx.watches.drain(..) {
            if space.latest(&w.key) != w.seen {
                effects.push((w.addr, w.serial, Ok(SimValue::Unit)));
            } else {
                space.armed.push(w);
            }
        }
        tx.committed_version = Some(version);
        (Ok(SimValue::Unit), effects)
    }
}

impl NativeApi for SimNative {
    fn select_api_version(
        &self,
        runtime_version: i32,
        header_version: i32,
    ) -> FdbErrorCode {
        let mut net = self.net.lock();
        if net.api_selected {
            return ERROR_API_VERSION_ALREADY_SET;
        }
        if header_version > HEADER_API_VERSION || runtime_version > header_version || runtime_version < MIN_API_VERSION {
            return ERROR_API_VERSION_NOT_SUPPORTED;
        }
        net.api_selected = true;
        ERROR_SUCCESS
    }

    fn get_error(
        &self,
        code: FdbErrorCode,
    ) -> *const c_char {
        error_text(code).as_ptr() as *const c_char
    }

    fn error_predicate(
        &self,
        predicate_test: i32,
        code: FdbErrorCode,
    ) -> FdbBool {
        let hit = match predicate_test {
            ERROR_PREDICATE_RETRYABLE => is_retryable(code),
            ERROR_PREDICATE_MAYBE_COMMITTED => is_maybe_committed(code),
            ERROR_PREDICATE_RETRYABLE_NOT_COMMITTED => is_retryable(code) && !is_maybe_committed(code),
            _ => false,
        };
        hit as FdbBool
    }

    unsafe fn network_set_option(
        &self,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode {
        self.record_option(OptionScope::Network, option, value, value_length);
        ERROR_SUCCESS
    }

    fn setup_network(&self) -> FdbErrorCode {
        let mut net = self.net.lock();
        if !net.api_selected {
            return ERROR_CLIENT_INVALID_OPERATION;
        }
        if net.setup {
            return ERROR_NETWORK_ALREADY_SETUP;
        }
        net.setup = true;
        ERROR_SUCCESS
    }

    fn run_network(&self) -> FdbErrorCode {
        let rx = {
            let mut net = self.net.lock();
            if !net.setup {
                return ERROR_NETWORK_NOT_SETUP;
            }
            match self.events_rx.lock().take() {
                Some(rx) => {
                    net.running = true;
                    rx
                }
                None => return ERROR_NETWORK_STOPPED,
            }
        };

        while let Ok(event) = rx.recv() {
            match event {
                SimEvent::Complete { addr, serial, result } => self.complete(addr, serial, result),
                SimEvent::Stop => break,
            }
        }

        let mut net = self.net.lock();
        net.running = false;
        net.stopped = true;
        ERROR_SUCCESS
    }

    fn stop_network(&self) -> FdbErrorCode {
        let mut net = self.net.lock();
        if !net.setup {
            return ERROR_NETWORK_NOT_SETUP;
        }
        if net.stopped {
            return ERROR_NETWORK_STOPPED;
        }
        net.stopped = true;
        let _ = self.events.send(SimEvent::Stop);
        ERROR_SUCCESS
    }

    // -
    // Futures

    unsafe fn future_cancel(
        &self,
        future: *mut FDBFuture,
    ) {
        let addr = future as usize;
        let pending = match self.futures.get(&addr) {
            Some(f) => (f.ready.is_none()).then_some((f.serial, f.watch)),
            None => {
                self.bad_handle("future", "future_cancel", addr, false);
                return;
            }
        };
        if let Some((serial, watch)) = pending {
            if watch {
                self.disarm_watch(addr, serial);
            }
            self.complete(addr, serial, Err(ERROR_OPERATION_CANCELLED));
        }
    }

    unsafe fn future_destroy(
        &self,
        future: *mut FDBFuture,
    ) {
        let addr = future as usize;
        match self.futures.remove(&addr) {
            Some((_, f)) => {
                if f.watch && f.ready.is_none() {
                    self.disarm_watch(addr, f.serial);
                }
                self.alloc.lock().release(addr);
            }
            None => self.bad_handle("future", "future_destroy", addr, true),
        }
    }

    unsafe fn future_release_memory(
        &self,
        future: *mut FDBFuture,
    ) {
        let addr = future as usize;
        let Some(mut f) = self.futures.get_mut(&addr) else {
            self.bad_handle("future", "future_release_memory", addr, false);
            return;
        };
        f.released = true;
        match &mut f.ready {
            Some(Ok(SimValue::Value(Some(bytes)))) | Some(Ok(SimValue::Key(bytes))) => bytes.fill(POISON),
            Some(Ok(SimValue::KeyValues(kvs, _))) => {
                for (k, v) in kvs.iter_mut() {
                    k.fill(POISON);
                    v.fill(POISON);
                }
            }
            _ => {}
        }
    }

    unsafe fn future_is_ready(
        &self,
        future: *mut FDBFuture,
    ) -> FdbBool {
        let addr = future as usize;
        match self.futures.get(&addr) {
            Some(f) => f.ready.is_some() as FdbBool,
            None => {
                self.bad_handle("future", "future_is_ready", addr, false);
                0
            }
        }
    }

    unsafe fn future_set_callback(
        &self,
        future: *mut FDBFuture,
        callback: FdbCallback,
        callback_parameter: *mut c_void,
    ) -> FdbErrorCode {
        let addr = future as usize;
        let fire_now = match self.futures.get_mut(&addr) {
            Some(mut f) => {
                if f.callback.is_some() {
                    return ERROR_CLIENT_INVALID_OPERATION;
                }
                if f.ready.is_some() {
                    true
                } else {
                    f.callback = Some((callback, callback_parameter as usize));
                    false
                }
            }
            None => {
                self.bad_handle("future", "future_set_callback", addr, false);
                return ERROR_CLIENT_INVALID_OPERATION;
            }
        };
        if fire_now {
            callback(future, callback_parameter);
        }
        ERROR_SUCCESS
    }

    unsafe fn future_get_error(
        &self,
        future: *mut FDBFuture,
    ) -> FdbErrorCode {
        let addr = future as usize;
        match self.futures.get(&addr) {
            Some(f) => match &f.ready {
                Some(Err(code)) => *code,
                Some(Ok(_)) => ERROR_SUCCESS,
                None => ERROR_CLIENT_INVALID_OPERATION,
            },
            None => {
                self.bad_handle("future", "future_get_error", addr, false);
                ERROR_CLIENT_INVALID_OPERATION
            }
        }
    }

    unsafe fn future_get_int64(
        &self,
        future: *mut FDBFuture,
        out: *mut i64,
    ) -> FdbErrorCode {
        let addr = future as usize;
        let Some(f) = self.futures.get(&addr) else {
            self.bad_handle("future", "future_get_int64", addr, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        };
        match &f.ready {
            Some(Ok(SimValue::Int64(v))) => {
                *out = *v;
                ERROR_SUCCESS
            }
            Some(Err(code)) => *code,
            _ => ERROR_CLIENT_INVALID_OPERATION,
        }
    }

    unsafe fn future_get_key(
        &self,
        future: *mut FDBFuture,
        out_key: *mut *const u8,
        out_key_length: *mut i32,
    ) -> FdbErrorCode {
        let addr = future as usize;
        let Some(f) = self.futures.get(&addr) else {
            self.bad_handle("future", "future_get_key", addr, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        };
        if f.released {
            self.violation(Violation::ReadAfterRelease { call: "future_get_key", addr });
        }
        match &f.ready {
            Some(Ok(SimValue::Key(k))) => {
                *out_key = k.as_ptr();
                *out_key_length = k.len() as i32;
                ERROR_SUCCESS
            }
            Some(Err(code)) => *code,
            _ => ERROR_CLIENT_INVALID_OPERATION,
        }
    }

    unsafe fn future_get_value(
        &self,
        future: *mut FDBFuture,
        out_present: *mut FdbBool,
        out_value: *mut *const u8,
        out_value_length: *mut i32,
    ) -> FdbErrorCode {
        let addr = future as usize;
        let Some(f) = self.futures.get(&addr) else {
            self.bad_handle("future", "future_get_value", addr, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        };
        if f.released {
            self.violation(Violation::ReadAfterRelease { call: "future_get_value", addr });
        }
        match &f.ready {
            Some(Ok(SimValue::Value(Some(v)))) => {
                *out_present = 1;
                *out_value = v.as_ptr();
                *out_value_length = v.len() as i32;
                ERROR_SUCCESS
            }
            Some(Ok(SimValue::Value(None))) => {
                *out_present = 0;
                *out_value = ptr::null();
                *out_value_length = 0;
                ERROR_SUCCESS
            }
            Some(Err(code)) => *code,
            _ => ERROR_CLIENT_INVALID_OPERATION,
        }
    }

    unsafe fn future_get_keyvalue_array(
        &self,
        future: *mut FDBFuture,
        out_kv: *mut *const FDBKeyValue,
        out_count: *mut i32,
        out_more: *mut FdbBool,
    ) -> FdbErrorCode {
        let addr = future as usize;
        let Some(mut f) = self.futures.get_mut(&addr) else {
            self.bad_handle("future", "future_get_keyvalue_array", addr, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        };
        if f.released {
            self.violation(Violation::ReadAfterRelease {
                call: "future_get_keyvalue_array",
                addr,
            });
        }
        let f = &mut *f;
        match &f.ready {
            Some(Ok(SimValue::KeyValues(kvs, more))) => {
                let array = f.kv.get_or_insert_with(|| {
                    KvArray(
                        kvs.iter()
                            .map(|(k, v)| FDBKeyValue {
                                key: k.as_ptr(),
                                key_length: k.len() as i32,
                                value: v.as_ptr(),
                                value_length: v.len() as i32,
                            })
                            .collect(),
                    )
                });
                *out_kv = array.0.as_ptr();
                *out_count = array.0.len() as i32;
                *out_more = *more as FdbBool;
                ERROR_SUCCESS
            }
            Some(Err(code)) => *code,
            _ => ERROR_CLIENT_INVALID_OPERATION,
        }
    }

    // -
    // Database / tenant

    unsafe fn create_database(
        &self,
        cluster_file_path: *const c_char,
        out_database: *mut *mut FDBDatabase,
    ) -> FdbErrorCode {
        if !self.net.lock().setup {
            return ERROR_NETWORK_NOT_SETUP;
        }
        let cluster_file =
            (!cluster_file_path.is_null()).then(|| CStr::from_ptr(cluster_file_path).to_string_lossy().into_owned());
        let addr = self.alloc.lock().alloc();
        self.databases.insert(addr, SimDatabase { cluster_file });
        *out_database = addr as *mut FDBDatabase;
        ERROR_SUCCESS
    }

    unsafe fn database_destroy(
        &self,
        database: *mut FDBDatabase,
    ) {
        let addr = database as usize;
        if self.databases.remove(&addr).is_none() {
            self.bad_handle("database", "database_destroy", addr, true);
            return;
        }
        let children = self.tenants.iter().filter(|t| t.db == addr).count()
            + self.transactions.iter().filter(|t| t.parent == addr).count();
        if children > 0 {
            self.violation(Violation::DestroyedWithLiveChildren {
                kind: "database",
                addr,
                children,
            });
        }
        self.alloc.lock().release(addr);
    }

    unsafe fn database_open_tenant(
        &self,
        database: *mut FDBDatabase,
        tenant_name: *const u8,
        tenant_name_length: i32,
        out_tenant: *mut *mut FDBTenant,
    ) -> FdbErrorCode {
        let db = database as usize;
        if !self.databases.contains_key(&db) {
            self.bad_handle("database", "database_open_tenant", db, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        }
        let name = bytes_of(tenant_name, tenant_name_length);
        let addr = self.alloc.lock().alloc();
        self.tenants.insert(addr, SimTenant { db, name });
        *out_tenant = addr as *mut FDBTenant;
        ERROR_SUCCESS
    }

    unsafe fn database_create_transaction(
        &self,
        database: *mut FDBDatabase,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode {
        let db = database as usize;
        if !self.databases.contains_key(&db) {
            self.bad_handle("database", "database_create_transaction", db, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        }
        let addr = self.alloc.lock().alloc();
        self.transactions.insert(addr, SimTransaction::new(db, None));
        *out_transaction = addr as *mut FDBTransaction;
        ERROR_SUCCESS
    }

    unsafe fn database_set_option(
        &self,
        database: *mut FDBDatabase,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode {
        let db = database as usize;
        if !self.databases.contains_key(&db) {
            self.bad_handle("database", "database_set_option", db, false);
            return ERROR_CLIENT_INVALID_OPERATION;
        }
        self.record_option(OptionScope::Database, option, value, value_length);
        ERROR_SUCCESS
    }

    unsafe fn tenant_destroy(
        &self,
        tenant: *mut FDBTenant,
    ) {
        let addr = tenant as usize;
        let Some((_, t)) = self.tenants.remove(&addr) else {
            self.bad_handle("tenant", "tenant_destroy", addr, true);
            return;
        };
        if !self.databases.contains_key(&t.db) {
            self.violation(Violation::UseAfterFree {
                call: "tenant_destroy",
                addr: t.db,
            });
        }
        let children = self.transactions.iter().filter(|tx| tx.parent == addr).count();
        if children > 0 {
            self.violation(Violation::DestroyedWithLiveChildren {
                kind: "tenant",
                addr,
                children,
            });
        }
        self.alloc.lock().release(addr);
    }

    unsafe fn tenant_create_transaction(
        &self,
        tenant: *mut FDBTenant,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode {
        let parent = tenant as usize;
        let space = match self.tenants.get(&parent) {
            Some(t) => t.name.clone(),
            None => {
                self.bad_handle("tenant", "tenant_create_transaction", parent, false);
                return ERROR_CLIENT_INVALID_OPERATION;
            }
        };
        let addr = self.alloc.lock().alloc();
        self.transactions.insert(addr, SimTransaction::new(parent, Some(space)));
        *out_transaction = addr as *mut FDBTransaction;
        ERROR_SUCCESS
    }

    // -
    // Transactions

    unsafe fn transaction_destroy(
        &self,
        transaction: *mut FDBTransaction,
    ) {
        let addr = transaction as usize;
        let Some((_, mut tx)) = self.transactions.remove(&addr) else {
            self.bad_handle("transaction", "transaction_destroy", addr, true);
            return;
        };
        let watches = tx.reset();
        self.fail_watches(watches, ERROR_TRANSACTION_CANCELLED);
        self.alloc.lock().release(addr);
    }

    unsafe fn transaction_cancel(
        &self,
        transaction: *mut FDBTransaction,
    ) {
        let watches = self.with_tx("transaction_cancel", transaction, |tx| {
            tx.cancelled = true;
            std::mem::take(&mut tx.watches)
        });
        self.fail_watches(watches.unwrap_or_default(), ERROR_TRANSACTION_CANCELLED);
    }

    unsafe fn transaction_set_option(
        &self,
        transaction: *mut FDBTransaction,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode {
        match self.with_tx("transaction_set_option", transaction, |_| ()) {
            Some(()) => {
                self.record_option(OptionScope::Transaction, option, value, value_length);
                ERROR_SUCCESS
            }
            None => ERROR_CLIENT_INVALID_OPERATION,
        }
    }

    unsafe fn transaction_set_read_version(
        &self,
        transaction: *mut FDBTransaction,
        version: i64,
    ) {
        self.with_tx("transaction_set_read_version", transaction, |tx| {
            tx.read_version = Some(version);
        });
    }

    unsafe fn transaction_get_read_version(
        &self,
        transaction: *mut FDBTransaction,
    ) -> *mut FDBFuture {
        let result = self.with_tx("transaction_get_read_version", transaction, |tx| {
            if tx.cancelled {
                return Err(ERROR_TRANSACTION_CANCELLED);
            }
            let store = self.store.lock();
            Ok(SimValue::Int64(tx.read_version(&store)))
        });
        self.issue(result.unwrap_or(Err(ERROR_CLIENT_INVALID_OPERATION)))
    }

    unsafe fn transaction_get(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture {
        let key = bytes_of(key_name, key_name_length);
        let result = self.with_tx("transaction_get", transaction, |tx| {
            if tx.cancelled {
                return Err(ERROR_TRANSACTION_CANCELLED);
            }
            let store = self.store.lock();
            let value = tx.view_key(&store, &key);
            if snapshot == 0 {
                tx.read_keys.push(key.clone());
            }
            Ok(SimValue::Value(value))
        });
        self.issue(result.unwrap_or(Err(ERROR_CLIENT_INVALID_OPERATION)))
    }

    unsafe fn transaction_get_key(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        or_equal: FdbBool,
        offset: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture {
        let key = bytes_of(key_name, key_name_length);
        let result = self.with_tx("transaction_get_key", transaction, |tx| {
            if tx.cancelled {
                return Err(ERROR_TRANSACTION_CANCELLED);
            }
            let store = self.store.lock();
            let view = tx.view_all(&store);
            drop(store);

            let keys: Vec<&Vec<u8>> = view.keys().collect();
            let resolved = match selector_index(&keys, &key, or_equal != 0, offset) {
                idx if idx < 0 => Vec::new(),
                idx => keys.get(idx as usize).map_or(vec![0xff], |k| (*k).clone()),
            };
            if snapshot == 0 {
                let lo = resolved.clone().min(key.clone());
                let mut hi = resolved.clone().max(key);
                hi.push(0);
                tx.read_ranges.push((lo, hi));
            }
            Ok(SimValue::Key(resolved))
        });
        self.issue(result.unwrap_or(Err(ERROR_CLIENT_INVALID_OPERATION)))
    }

    #[allow(clippy::too_many_arguments)]
    unsafe fn transaction_get_range(
        &self,
        transaction: *mut FDBTransaction,
        begin_key_name: *const u8,
        begin_key_name_length: i32,
        begin_or_equal: FdbBool,
        begin_offset: i32,
        end_key_name: *const u8,
        end_key_name_length: i32,
        end_or_equal: FdbBool,
        end_offset: i32,
        limit: i32,
        _target_bytes: i32,
        mode: i32,
        _iteration: i32,
        snapshot: FdbBool,
        reverse: FdbBool,
    ) -> *mut FDBFuture {
        let begin_key = bytes_of(begin_key_name, begin_key_name_length);
        let end_key = bytes_of(end_key_name, end_key_name_length);
        let batch = self.range_batch.load(Ordering::SeqCst);

        let result = self.with_tx("transaction_get_range", transaction, |tx| {
            if tx.cancelled {
                return Err(ERROR_TRANSACTION_CANCELLED);
            }
            let store = self.store.lock();
            let view = tx.view_all(&store);
            drop(store);

            let keys: Vec<&Vec<u8>> = view.keys().collect();
            let b = resolve_selector(&keys, &begin_key, begin_or_equal != 0, begin_offset);
            let e = resolve_selector(&keys, &end_key, end_or_equal != 0, end_offset);
            let selected: Vec<&Vec<u8>> = if b < e { keys[b..e].to_vec() } else { Vec::new() };

            if snapshot == 0 {
                let lo = keys.get(b).map_or(begin_key.clone(), |k| (*k).clone().min(begin_key.clone()));
                let hi = keys.get(e).map_or(vec![0xff], |k| (*k).clone());
                tx.read_ranges.push((lo, hi));
            }

            let streaming_cap = if mode == -2 || mode == 0 { usize::MAX } else { batch };
            let limit_cap = if limit > 0 { limit as usize } else { usize::MAX };
            let cap = streaming_cap.min(limit_cap);

            let ordered: Box<dyn Iterator<Item = &&Vec<u8>>> =
                if reverse != 0 { Box::new(selected.iter().rev()) } else { Box::new(selected.iter()) };
            let kvs: Vec<(Vec<u8>, Vec<u8>)> = ordered
                .take(cap)
                .map(|k| ((*k).clone(), view[*k].clone()))
                .collect();
            let more = selected.len() > kvs.len();
            Ok(SimValue::KeyValues(kvs, more))
        });
        self.issue(result.unwrap_or(Err(ERROR_CLIENT_INVALID_OPERATION)))
    }

    unsafe fn transaction_set(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        value: *const u8,
        value_length: i32,
    ) {
        let m = Mutation::Set(bytes_of(key_name, key_name_length), bytes_of(value, value_length));
        self.with_tx("transaction_set", transaction, |tx| tx.mutations.push(m));
    }

    unsafe fn transaction_atomic_op(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        param: *const u8,
        param_length: i32,
        operation_type: i32,
    ) {
        let m = Mutation::Atomic(
            bytes_of(key_name, key_name_length),
            bytes_of(param, param_length),
            operation_type,
        );
        self.with_tx("transaction_atomic_op", transaction, |tx| tx.mutations.push(m));
    }

    unsafe fn transaction_clear(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    ) {
        let m = Mutation::Clear(bytes_of(key_name, key_name_length));
        self.with_tx("transaction_clear", transaction, |tx| tx.mutations.push(m));
    }

    unsafe fn transaction_clear_range(
        &self,
        transaction: *mut FDBTransaction,
        begin_key_name: *const u8,
        begin_key_name_length: i32,
        end_key_name: *const u8,
        end_key_name_length: i32,
    ) {
        let m = Mutation::ClearRange(
            bytes_of(begin_key_name, begin_key_name_length),
            bytes_of(end_key_name, end_key_name_length),
        );
        self.with_tx("transaction_clear_range", transaction, |tx| tx.mutations.push(m));
    }

    unsafe fn transaction_watch(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    ) -> *mut FDBFuture {
        let key = bytes_of(key_name, key_name_length);
        let (addr, serial) = self.new_future(true);
        let registered = self.with_tx("transaction_watch", transaction, |tx| {
            if tx.cancelled {
                return Err(ERROR_TRANSACTION_CANCELLED);
            }
            let store = self.store.lock();
            let seen = tx.view_key(&store, &key);
            tx.watches.push(WatchRecord { addr, serial, key, seen });
            Ok(())
        });
        match registered {
            Some(Ok(())) => {}
            Some(Err(code)) => self.deliver(addr, serial, Err(code)),
            None => self.deliver(addr, serial, Err(ERROR_CLIENT_INVALID_OPERATION)),
        }
        addr as *mut FDBFuture
    }

    unsafe fn transaction_commit(
        &self,
        transaction: *mut FDBTransaction,
    ) -> *mut FDBFuture {
        let (addr, serial) = self.new_future(false);
        let outcome = self.with_tx("transaction_commit", transaction, |tx| self.commit(tx));
        let result = match outcome {
            Some((result, effects)) => {
                for (watch, watch_serial, watch_result) in effects {
                    self.deliver(watch, watch_serial, watch_result);
                }
                result
            }
            None => Err(ERROR_CLIENT_INVALID_OPERATION),
        };
        self.deliver(addr, serial, result);
        addr as *mut FDBFuture
    }

    unsafe fn transaction_get_committed_version(
        &self,
        transaction: *mut FDBTransaction,
        out_version: *mut i64,
    ) -> FdbErrorCode {
        match self.with_tx("transaction_get_committed_version", transaction, |tx| tx.committed_version) {
            Some(Some(version)) => {
                *out_version = version;
                ERROR_SUCCESS
            }
            _ => ERROR_CLIENT_INVALID_OPERATION,
        }
    }

    unsafe fn transaction_on_error(
        &self,
        transaction: *mut FDBTransaction,
        error: FdbErrorCode,
    ) -> *mut FDBFuture {
        let outcome = self.with_tx("transaction_on_error", transaction, |tx| {
            if is_retryable(error) {
                (Ok(SimValue::Unit), tx.reset())
            } else {
                (Err(error), Vec::new())
            }
        });
        let result = match outcome {
            Some((result, watches)) => {
                self.fail_watches(watches, ERROR_TRANSACTION_CANCELLED);
                result
            }
            None => Err(ERROR_CLIENT_INVALID_OPERATION),
        };
        self.issue(result)
    }

    unsafe fn transaction_reset(
        &self,
        transaction: *mut FDBTransaction,
    ) {
        let watches = self.with_tx("transaction_reset", transaction, |tx| tx.reset());
        self.fail_watches(watches.unwrap_or_default(), ERROR_TRANSACTION_CANCELLED);
    }
}
