// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! In-process stand-in for a Houdini session.
//!
//! `MemoryHost` keeps a node graph in memory and answers every [`HostConnection`] operation,
//! including the bulk `opls -R`/`optype` listings. Faults can be injected (refused opens, severed
//! connections, broken or disabled listings, a slow catalogue, failing close) so the session,
//! executor and snapshot fallbacks can be exercised without a real host. It backs `--demo` and the
//! test suites.
//!
//! Scripts are a tiny line language, one statement per line:
//!
//! ```text
//! print <text>                  stdout, with newline
//! write <text>                  stdout, no newline
//! eprint <text>                 stderr, with newline
//! create <parent> <type> <name> add a node
//! delete <path>                 remove a node and its subtree
//! sleep <millis>
//! sever                         break every open connection, like `MemoryHost::sever`
//! fail <message>                raise
//! ```
//!
//! Blank lines, `#` comments and any other statement are accepted and do nothing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{ExecError, HostConnection, ScriptOutput, Stream, Transport, TransportError};
use crate::model::{join_path, HostValue, NodeStub, NodeTypeEntry, Scalar};

const SCENE_ROOT: &str = "/";
const DEFAULT_VERSION: &str = "20.5.123";
const UNTITLED: &str = "untitled.hip";
const ALWAYS: usize = usize::MAX;

/// Failure injected into the listing operations (`hscript`, `list_children`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFault {
    /// The connection resets mid-listing.
    Reset,
    /// The host answers with an error, e.g. a node deleted while it was being walked.
    Host,
}

#[derive(Debug, Clone)]
struct MemoryNode {
    type_name: String,
    children: Vec<String>,
}

#[derive(Debug, Clone)]
struct Graph {
    nodes: BTreeMap<String, MemoryNode>,
}

impl Graph {
    fn with_contexts() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            SCENE_ROOT.to_owned(),
            MemoryNode { type_name: "root".to_owned(), children: Vec::new() },
        );
        let mut graph = Self { nodes };
        for (name, type_name) in [("obj", "obj"), ("out", "out"), ("mat", "mat")] {
            // Contexts are fixed and unique.
            let _ = graph.add(SCENE_ROOT, type_name, name);
        }
        graph
    }

    fn add(&mut self, parent: &str, type_name: &str, name: &str) -> Result<String, String> {
        if name.is_empty() || name.contains('/') {
            return Err(format!("invalid node name: {name:?}"));
        }
        let path = join_path(parent, name);
        if self.nodes.contains_key(&path) {
            return Err(format!("node already exists: {path}"));
        }
        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return Err(format!("parent node not found: {parent}"));
        };
        parent_node.children.push(name.to_owned());
        self.nodes.insert(
            path.clone(),
            MemoryNode { type_name: type_name.to_owned(), children: Vec::new() },
        );
        Ok(path)
    }

    fn remove(&mut self, path: &str) -> Result<(), String> {
        if path == SCENE_ROOT {
            return Err("cannot delete the scene root".to_owned());
        }
        let Some(node) = self.nodes.remove(path) else {
            return Err(format!("node not found: {path}"));
        };
        for child in node.children {
            let _ = self.remove(&join_path(path, &child));
        }
        if let Some((parent, name)) = split_parent(path) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|child| child != name);
            }
        }
        Ok(())
    }

    fn stubs(&self, path: &str) -> Option<Vec<NodeStub>> {
        let node = self.nodes.get(path)?;
        Some(
            node.children
                .iter()
                .map(|name| {
                    let type_name = self
                        .nodes
                        .get(&join_path(path, name))
                        .map(|child| child.type_name.clone())
                        .unwrap_or_default();
                    NodeStub::new(name.clone(), type_name)
                })
                .collect(),
        )
    }

    /// `opls -R`: one header per parent that has children, depth first.
    fn recursive_listing(&self, root: &str) -> String {
        let mut out = String::new();
        let mut stack = vec![root.to_owned()];
        while let Some(path) = stack.pop() {
            let Some(node) = self.nodes.get(&path) else {
                continue;
            };
            if node.children.is_empty() {
                continue;
            }
            out.push_str(&path);
            out.push_str(":\n");
            for name in &node.children {
                out.push_str(name);
                out.push('\n');
            }
            out.push('\n');
            stack.extend(node.children.iter().rev().map(|name| join_path(&path, name)));
        }
        out
    }

    /// `optype <parent>/*`: name and type of every direct child.
    fn type_listing(&self, parent: &str) -> String {
        let mut out = String::new();
        for stub in self.stubs(parent).unwrap_or_default() {
            out.push_str(&format!("Name: {}\nOp Type: {}\n\n", stub.name, stub.type_name));
        }
        out
    }
}

fn split_parent(path: &str) -> Option<(&str, &str)> {
    let idx = path.rfind('/')?;
    let parent = if idx == 0 { SCENE_ROOT } else { &path[..idx] };
    Some((parent, &path[idx + 1..]))
}

#[derive(Debug)]
struct MemoryState {
    graph: Mutex<Graph>,
    version: String,
    hip_file: Mutex<String>,
    catalogue: Mutex<Vec<NodeTypeEntry>>,
    parameters: Mutex<BTreeMap<String, Vec<(String, HostValue)>>>,
    hscript_supported: AtomicBool,
    scripted_catalogue: AtomicBool,
    catalogue_delay: Mutex<Duration>,
    listing_fault: Mutex<Option<ListingFault>>,
    refused_opens: AtomicUsize,
    fail_close: AtomicBool,
    generation: AtomicU64,
    open_times: Mutex<Vec<Instant>>,
    round_trips: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory host graph; clones share state.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<MemoryState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// An empty scene with the `/obj`, `/out` and `/mat` contexts.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryState {
                graph: Mutex::new(Graph::with_contexts()),
                version: DEFAULT_VERSION.to_owned(),
                hip_file: Mutex::new(UNTITLED.to_owned()),
                catalogue: Mutex::new(default_catalogue()),
                parameters: Mutex::new(BTreeMap::new()),
                hscript_supported: AtomicBool::new(true),
                scripted_catalogue: AtomicBool::new(false),
                catalogue_delay: Mutex::new(Duration::ZERO),
                listing_fault: Mutex::new(None),
                refused_opens: AtomicUsize::new(0),
                fail_close: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                open_times: Mutex::new(Vec::new()),
                round_trips: AtomicUsize::new(0),
            }),
        }
    }

    /// A small populated scene used by `--demo`.
    pub fn demo() -> Self {
        let host = Self::new();
        {
            let mut graph = lock(&host.state.graph);
            let seed: &[(&str, &str, &str)] = &[
                ("/obj", "geo", "terrain"),
                ("/obj/terrain", "grid", "grid1"),
                ("/obj/terrain", "mountain", "mountain1"),
                ("/obj/terrain", "null", "OUT"),
                ("/obj", "geo", "rock"),
                ("/obj/rock", "sphere", "sphere1"),
                ("/obj", "cam", "cam1"),
                ("/obj", "hlight", "key_light"),
                ("/out", "karma", "karma1"),
            ];
            for (parent, type_name, name) in seed {
                let _ = graph.add(parent, type_name, name);
            }
        }
        host.set_parameters(
            "/obj/terrain/grid1",
            vec![
                ("size".to_owned(), HostValue::Vector(vec![100.0, 100.0])),
                ("rows".to_owned(), HostValue::Scalar(Scalar::Int(200))),
                ("orient".to_owned(), HostValue::Enum("zx".to_owned())),
            ],
        );
        host
    }

    /// Adds a node; returns its path.
    pub fn add_node(&self, parent: &str, type_name: &str, name: &str) -> Result<String, String> {
        lock(&self.state.graph).add(parent, type_name, name)
    }

    pub fn remove_node(&self, path: &str) -> Result<(), String> {
        lock(&self.state.graph).remove(path)
    }

    pub fn node_paths(&self) -> Vec<String> {
        lock(&self.state.graph).nodes.keys().cloned().collect()
    }

    /// Refuse the next `count` open attempts.
    pub fn refuse_opens(&self, count: usize) {
        self.state.refused_opens.store(count, Ordering::SeqCst);
    }

    pub fn refuse_all_opens(&self) {
        self.refuse_opens(ALWAYS);
    }

    pub fn open_attempts(&self) -> usize {
        lock(&self.state.open_times).len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        lock(&self.state.open_times).clone()
    }

    /// Breaks every connection opened so far; later opens work again.
    pub fn sever(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_hscript_supported(&self, supported: bool) {
        self.state.hscript_supported.store(supported, Ordering::SeqCst);
    }

    /// Answer the catalogue-collecting script with the catalogue as JSON.
    pub fn set_scripted_catalogue(&self, enabled: bool) {
        self.state.scripted_catalogue.store(enabled, Ordering::SeqCst);
    }

    /// Delay before the catalogue-collecting script answers.
    pub fn set_catalogue_delay(&self, delay: Duration) {
        *lock(&self.state.catalogue_delay) = delay;
    }

    pub fn set_listing_fault(&self, fault: Option<ListingFault>) {
        *lock(&self.state.listing_fault) = fault;
    }

    pub fn set_catalogue(&self, entries: Vec<NodeTypeEntry>) {
        *lock(&self.state.catalogue) = entries;
    }

    pub fn set_parameters(&self, path: &str, parameters: Vec<(String, HostValue)>) {
        lock(&self.state.parameters).insert(path.to_owned(), parameters);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn hip_file(&self) -> String {
        lock(&self.state.hip_file).clone()
    }

    /// Number of operations answered so far, across all connections.
    pub fn round_trips(&self) -> usize {
        self.state.round_trips.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryHost {
    fn open(&self, host: &str, port: u16) -> Result<Arc<dyn HostConnection>, TransportError> {
        lock(&self.state.open_times).push(Instant::now());
        let refused = self.state.refused_opens.load(Ordering::SeqCst);
        if refused > 0 {
            if refused != ALWAYS {
                self.state.refused_opens.store(refused - 1, Ordering::SeqCst);
            }
            return Err(TransportError::Refused(format!("{host}:{port}")));
        }
        Ok(Arc::new(MemoryConnection {
            state: self.state.clone(),
            generation: self.state.generation.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    state: Arc<MemoryState>,
    generation: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn round_trip(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.state.generation.load(Ordering::SeqCst) != self.generation {
            return Err(TransportError::Reset("memory host severed".to_owned()));
        }
        self.state.round_trips.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn listing_round_trip(&self, path: &str) -> Result<(), TransportError> {
        self.round_trip()?;
        match *lock(&self.state.listing_fault) {
            None => Ok(()),
            Some(ListingFault::Reset) => Err(TransportError::Reset("listing interrupted".to_owned())),
            Some(ListingFault::Host) => Err(TransportError::Host(format!("node vanished: {path}"))),
        }
    }

    fn run_statement(&self, line: &str, output: &ScriptOutput) -> Result<(), String> {
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        match verb {
            "print" => output.write(Stream::Stdout, &format!("{rest}\n")),
            "write" => output.write(Stream::Stdout, rest),
            "eprint" => output.write(Stream::Stderr, &format!("{rest}\n")),
            "create" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let [parent, type_name, name] = args.as_slice() else {
                    return Err("usage: create <parent> <type> <name>".to_owned());
                };
                lock(&self.state.graph).add(parent, type_name, name)?;
            }
            "delete" => lock(&self.state.graph).remove(rest.trim())?,
            "sleep" => {
                let millis: u64 =
                    rest.trim().parse().map_err(|_| format!("invalid duration: {rest}"))?;
                std::thread::sleep(Duration::from_millis(millis));
            }
            "sever" => {
                self.state.generation.fetch_add(1, Ordering::SeqCst);
            }
            "fail" => return Err(rest.to_owned()),
            _ => {}
        }
        Ok(())
    }

    fn scripted_catalogue(&self, output: &ScriptOutput) {
        let delay = *lock(&self.state.catalogue_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let entries = lock(&self.state.catalogue).clone();
        let mut categories: Vec<String> = Vec::new();
        for entry in &entries {
            if !categories.contains(&entry.category) {
                categories.push(entry.category.clone());
            }
        }
        let payload = serde_json::json!({ "types": entries, "categories": categories });
        output.write(Stream::Stdout, &format!("{payload}\n"));
    }
}

impl HostConnection for MemoryConnection {
    fn version(&self) -> Result<String, TransportError> {
        self.round_trip()?;
        Ok(self.state.version.clone())
    }

    fn hip_file(&self) -> Result<String, TransportError> {
        self.round_trip()?;
        Ok(lock(&self.state.hip_file).clone())
    }

    fn node_exists(&self, path: &str) -> Result<bool, TransportError> {
        self.round_trip()?;
        Ok(lock(&self.state.graph).nodes.contains_key(path))
    }

    fn list_children(&self, path: &str) -> Result<Vec<NodeStub>, TransportError> {
        self.listing_round_trip(path)?;
        lock(&self.state.graph)
            .stubs(path)
            .ok_or_else(|| TransportError::Host(format!("node not found: {path}")))
    }

    fn hscript(&self, command: &str) -> Result<String, TransportError> {
        if !self.state.hscript_supported.load(Ordering::SeqCst) {
            return Err(TransportError::Unsupported("hscript"));
        }
        self.listing_round_trip(command)?;
        let graph = lock(&self.state.graph);
        let mut words = command.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("opls"), Some("-R"), Some(root)) => Ok(graph.recursive_listing(root)),
            (Some("opls"), Some(path), None) => Ok(graph
                .stubs(path)
                .unwrap_or_default()
                .into_iter()
                .map(|stub| stub.name + "\n")
                .collect()),
            (Some("optype"), Some(pattern), None) => match pattern.strip_suffix("/*") {
                Some(parent) => Ok(graph.type_listing(if parent.is_empty() { SCENE_ROOT } else { parent })),
                None => Err(TransportError::Host(format!("unsupported optype pattern: {pattern}"))),
            },
            _ => Err(TransportError::Host(format!("unknown command: {command}"))),
        }
    }

    fn exec(&self, code: &str, output: &ScriptOutput) -> Result<(), ExecError> {
        self.round_trip()?;
        if self.state.scripted_catalogue.load(Ordering::SeqCst)
            && code.contains("nodeTypeCategories")
        {
            self.scripted_catalogue(output);
            return Ok(());
        }
        for (index, raw) in code.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.state.generation.load(Ordering::SeqCst) != self.generation {
                return Err(TransportError::Reset("memory host severed".to_owned()).into());
            }
            if let Err(message) = self.run_statement(line, output) {
                let traceback = format!(
                    "Traceback (most recent call last):\n  File \"<script>\", line {}, in <module>\n    {line}\nError: {message}\n",
                    index + 1
                );
                return Err(ExecError::Script { message, traceback });
            }
        }
        Ok(())
    }

    fn node_type_categories(&self) -> Result<Vec<String>, TransportError> {
        self.round_trip()?;
        let mut categories: Vec<String> = Vec::new();
        for entry in lock(&self.state.catalogue).iter() {
            if !categories.contains(&entry.category) {
                categories.push(entry.category.clone());
            }
        }
        Ok(categories)
    }

    fn node_types(&self, category: &str) -> Result<Vec<NodeTypeEntry>, TransportError> {
        self.round_trip()?;
        Ok(lock(&self.state.catalogue)
            .iter()
            .filter(|entry| entry.category == category)
            .cloned()
            .collect())
    }

    fn parameters(&self, path: &str) -> Result<Vec<(String, HostValue)>, TransportError> {
        self.round_trip()?;
        if !lock(&self.state.graph).nodes.contains_key(path) {
            return Err(TransportError::Host(format!("node not found: {path}")));
        }
        Ok(lock(&self.state.parameters).get(path).cloned().unwrap_or_default())
    }

    fn load_file(&self, path: &str) -> Result<(), TransportError> {
        self.round_trip()?;
        *lock(&self.state.graph) = Graph::with_contexts();
        *lock(&self.state.hip_file) = path.to_owned();
        Ok(())
    }

    fn new_file(&self) -> Result<(), TransportError> {
        self.round_trip()?;
        *lock(&self.state.graph) = Graph::with_contexts();
        *lock(&self.state.hip_file) = UNTITLED.to_owned();
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Reset("close failed".to_owned()));
        }
        Ok(())
    }
}

fn default_catalogue() -> Vec<NodeTypeEntry> {
    [
        ("Object", "geo", "Geometry"),
        ("Object", "cam", "Camera"),
        ("Object", "hlight", "Light"),
        ("Object", "null", "Null"),
        ("Sop", "box", "Box"),
        ("Sop", "grid", "Grid"),
        ("Sop", "sphere", "Sphere"),
        ("Sop", "mountain", "Mountain"),
        ("Sop", "attribnoise", "Attribute Noise"),
        ("Sop", "null", "Null"),
        ("Driver", "karma", "Karma"),
        ("Driver", "ifd", "Mantra"),
    ]
    .into_iter()
    .map(|(category, name, description)| NodeTypeEntry::new(category, name, description))
    .collect()
}
