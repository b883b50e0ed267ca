// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Drives a whole build: roots the graph, lets the analyzer pull in every
//! node that is needed, compiles methods on the worker pool in batches, and
//! hands the sorted result to the object writer.

mod countdown;
mod worker_pool;

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use log::{debug, info};

use crate::{
    codegen::CodegenStatistics,
    dump::{MapDumper, XmlDumper},
    graph::DependencyAnalyzer,
    node::compare_nodes,
    object_writer::ObjectWriter,
    type_system::{ModuleManifest, TypeSystemContext},
    CompilationError,
    CompilationResult,
    NodeFactory,
    NodeId,
    Platform,
    TypeSystemError,
};

use self::worker_pool::WorkerPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationOptions {
    platform: Platform,
    workers: usize,
    roots: Vec<String>,
    xml_dump: Option<PathBuf>,
    map_file: Option<PathBuf>,
}

impl CompilationOptions {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            workers: num_cpus::get(),
            roots: Vec::new(),
            xml_dump: None,
            map_file: None,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Roots a type (`Name`) or method (`Type::Method`) on top of the
    /// ones in the manifest.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.roots.push(root.into());
        self
    }

    #[must_use]
    pub fn with_xml_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.xml_dump = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_map_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_file = Some(path.into());
        self
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }
}

pub struct Compilation {
    factory: Arc<NodeFactory>,
    options: CompilationOptions,
}

impl Compilation {
    #[must_use]
    pub fn new(type_system: TypeSystemContext, options: CompilationOptions) -> Self {
        Self {
            factory: Arc::new(NodeFactory::new(type_system, options.platform())),
            options,
        }
    }

    pub fn from_manifest(manifest: &ModuleManifest, options: CompilationOptions) -> CompilationResult<Self> {
        let type_system = TypeSystemContext::from_manifest(manifest, options.platform().pointer_size())?;
        Ok(Self::new(type_system, options))
    }

    pub fn from_manifest_file(path: &Path, options: CompilationOptions) -> CompilationResult<Self> {
        let source = fs::read_to_string(path)
            .map_err(|error| CompilationError::Io { path: path.to_path_buf(), error })?;

        Self::from_manifest(&ModuleManifest::from_toml(&source)?, options)
    }

    #[must_use]
    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    pub fn compile(self) -> CompilationResult<CompiledModule> {
        let start = Instant::now();
        let factory = Arc::clone(&self.factory);

        let entry_point = self.entry_point()?;
        let roots = self.roots()?;

        let pool = WorkerPool::new(Arc::clone(&factory), self.options.workers());
        debug!("Compiling with {} workers", pool.worker_count());

        let mut analyzer = DependencyAnalyzer::new(&*factory);
        if let Some(entry_point) = entry_point {
            analyzer.add_root(entry_point, "entry point");
        }
        for (node, reason) in roots {
            analyzer.add_root(node, reason);
        }

        analyzer.compute_marked_nodes(|batch| {
            debug!("Compiling a batch of {} methods", batch.len());
            pool.compile_batch(batch)
        })?;

        let statistics = pool.shutdown();
        let (mut nodes, marked) = analyzer.into_marked();
        nodes.sort_by(|a, b| compare_nodes(&factory, *a, *b));

        info!(
            "Marked {} nodes, compiled {} methods ({} failed) in {:?}",
            nodes.len(),
            statistics.methods_compiled,
            statistics.methods_failed,
            start.elapsed(),
        );

        Ok(CompiledModule {
            factory,
            options: self.options,
            nodes,
            marked,
            entry_point,
            statistics,
        })
    }

    fn entry_point(&self) -> CompilationResult<Option<NodeId>> {
        let ctx = self.factory.type_system();
        let Some(name) = ctx.entry_point() else {
            return Ok(None);
        };

        let method = ctx.resolve_method_reference(name)
            .ok()
            .filter(|method| {
                let desc = ctx.method_desc(*method);
                !desc.is_abstract() && !desc.is_generic_definition()
            })
            .ok_or_else(|| CompilationError::MissingEntryPoint { name: name.to_string() })?;

        Ok(Some(self.factory.method_code(method)))
    }

    fn roots(&self) -> CompilationResult<Vec<(NodeId, &'static str)>> {
        let factory = &self.factory;
        let ctx = factory.type_system();
        let mut roots = Vec::new();

        let string = ctx.well_known().string;
        roots.push((factory.constructed_type(string), "string type"));
        roots.push((factory.constructed_type(ctx.array_type(string)), "string array type"));
        roots.push((factory.gc_statics_region_start(), "GC statics region"));
        roots.push((factory.gc_statics_region_end(), "GC statics region"));

        for name in ctx.roots().iter().chain(self.options.roots()) {
            let node = self.resolve_root(name)
                .map_err(|error| CompilationError::InvalidRoot { name: name.clone(), error })?;
            roots.push((node, "explicit root"));
        }

        Ok(roots)
    }

    fn resolve_root(&self, name: &str) -> Result<NodeId, TypeSystemError> {
        let ctx = self.factory.type_system();

        if !name.contains("::") {
            return Ok(self.factory.constructed_type(ctx.lookup_type(name)?));
        }

        let method = ctx.resolve_method_reference(name)?;
        let desc = ctx.method_desc(method);
        if desc.is_generic_definition() {
            return Err(TypeSystemError::InstantiationArity {
                method: ctx.method_display_name(method),
                expected: desc.generic_parameter_count(),
                actual: 0,
            });
        }

        if desc.is_abstract() {
            return Err(TypeSystemError::AbstractMethod { method: ctx.method_display_name(method) });
        }

        Ok(self.factory.method_code(method))
    }
}

/// The marked graph in its final order.
pub struct CompiledModule {
    factory: Arc<NodeFactory>,
    options: CompilationOptions,
    nodes: Vec<NodeId>,
    marked: HashSet<NodeId>,
    entry_point: Option<NodeId>,
    statistics: CodegenStatistics,
}

impl CompiledModule {
    #[must_use]
    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[must_use]
    pub fn is_marked(&self, node: NodeId) -> bool {
        self.marked.contains(&node)
    }

    #[must_use]
    pub const fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    #[must_use]
    pub const fn statistics(&self) -> CodegenStatistics {
        self.statistics
    }

    /// The sorted names of every marked node.
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|node| self.factory.display_name(*node)).collect()
    }

    pub fn object_bytes(&self) -> CompilationResult<Vec<u8>> {
        let writer = ObjectWriter::new(&self.factory, &self.nodes, &self.marked, self.entry_point);
        Ok(writer.write()?)
    }

    /// Writes the object file and whatever dumps the options ask for.
    pub fn emit(&self, path: &Path) -> CompilationResult<()> {
        let bytes = self.object_bytes()?;
        write_file(path, &bytes)?;
        info!("Wrote {} bytes to {}", bytes.len(), path.display());

        if let Some(path) = &self.options.xml_dump {
            write_file(path, self.xml_dump().as_bytes())?;
        }

        if let Some(path) = &self.options.map_file {
            write_file(path, self.map().as_bytes())?;
        }

        Ok(())
    }

    #[must_use]
    pub fn xml_dump(&self) -> String {
        XmlDumper::new(&self.factory).dump(&self.nodes)
    }

    #[must_use]
    pub fn map(&self) -> String {
        MapDumper::new(&self.factory, &self.marked).dump(&self.nodes)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> CompilationResult<()> {
    fs::write(path, contents)
        .map_err(|error| CompilationError::Io { path: path.to_path_buf(), error })
}
