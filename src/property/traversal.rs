//! Traversal specs compiled into a graph of resolved nodes.
//!
//! Named steps are resolved once, at compile time; a walk then follows node
//! indices and never looks names up. Cycles in the spec graph are allowed;
//! a walk visits each (object, node) pair at most once.

use std::collections::HashMap;
use std::collections::HashSet;

use super::resolve::field_value;
use crate::Context;
use crate::Fault;
use crate::FaultResult;
use crate::Field;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::PropertyFilterSpec;
use crate::SelectionSpec;
use crate::TraversalSpec;

#[derive(Debug, Clone)]
struct TraversalNode {
    kind: String,
    path: Option<Field>,
    skip: bool,
    next: Vec<usize>,
}

/// Compiled select sets of every object spec of one or more filter specs.
#[derive(Debug, Clone, Default)]
pub(crate) struct TraversalPlan {
    nodes: Vec<TraversalNode>,
    /// Entry nodes per object spec, in spec order
    entries: Vec<Vec<usize>>,
}

/// Objects reached by walking a plan.
#[derive(Debug, Default)]
pub(crate) struct Walk {
    pub refs: Vec<ManagedObjectReference>,
    seen: HashSet<ManagedObjectReference>,
    visited: HashSet<(ManagedObjectReference, usize)>,
    /// (object, property) pairs the walk read references from
    pub sources: HashSet<(ManagedObjectReference, String)>,
}

impl TraversalPlan {
    pub(crate) fn compile(specs: &[PropertyFilterSpec]) -> FaultResult<Self> {
        let mut named: HashMap<&str, &TraversalSpec> = HashMap::new();
        for spec in specs {
            for object in &spec.object_set {
                register(&object.select_set, &mut named);
            }
        }

        let mut compiler = Compiler {
            named,
            indices: HashMap::new(),
            nodes: Vec::new(),
        };
        let mut entries = Vec::new();
        for spec in specs {
            for object in &spec.object_set {
                entries.push(compiler.selection(&object.select_set)?);
            }
        }

        Ok(Self {
            nodes: compiler.nodes,
            entries,
        })
    }

    /// Walks from `root` along the steps of object spec number `entry`.
    pub(crate) fn walk(
        &self,
        ctx: &Context,
        entry: usize,
        root: &ManagedObject,
        out: &mut Walk,
    ) {
        if let Some(steps) = self.entries.get(entry) {
            self.step(ctx, steps, root, out);
        }
    }

    fn step(
        &self,
        ctx: &Context,
        steps: &[usize],
        obj: &ManagedObject,
        out: &mut Walk,
    ) {
        let schema = ctx.registry().schema();

        for &index in steps {
            let node = &self.nodes[index];
            if !schema.is_a(obj.kind(), &node.kind) {
                continue;
            }
            if !out.visited.insert((obj.reference().clone(), index)) {
                continue;
            }
            let Some(path) = &node.path else {
                continue;
            };
            out.sources.insert((obj.reference().clone(), path.root().to_string()));

            let value = field_value(schema, obj, path).ok().flatten();
            for reference in value.map(|v| v.references()).unwrap_or_default() {
                if !node.skip && out.seen.insert(reference.clone()) {
                    out.refs.push(reference.clone());
                }
                if let Some(child) = ctx.snapshot(&reference) {
                    self.step(ctx, &node.next, &child, out);
                }
            }
        }
    }
}

fn register<'a>(
    steps: &'a [SelectionSpec],
    named: &mut HashMap<&'a str, &'a TraversalSpec>,
) {
    for step in steps {
        if let SelectionSpec::Traversal(spec) = step {
            if let Some(name) = spec.name.as_deref().filter(|n| !n.is_empty()) {
                named.entry(name).or_insert(spec);
            }
            register(&spec.select_set, named);
        }
    }
}

struct Compiler<'a> {
    named: HashMap<&'a str, &'a TraversalSpec>,
    indices: HashMap<&'a str, usize>,
    nodes: Vec<TraversalNode>,
}

impl<'a> Compiler<'a> {
    fn selection(
        &mut self,
        steps: &'a [SelectionSpec],
    ) -> FaultResult<Vec<usize>> {
        steps.iter().map(|step| self.step(step)).collect()
    }

    fn step(
        &mut self,
        step: &'a SelectionSpec,
    ) -> FaultResult<usize> {
        match step {
            SelectionSpec::Traversal(spec) => match spec.name.as_deref().filter(|n| !n.is_empty()) {
                Some(name) => self.named(name),
                None => self.node(spec),
            },
            SelectionSpec::Named { name } => self.named(name),
        }
    }

    fn named(
        &mut self,
        name: &'a str,
    ) -> FaultResult<usize> {
        if let Some(&index) = self.indices.get(name) {
            return Ok(index);
        }
        let spec = *self
            .named
            .get(name)
            .ok_or_else(|| Fault::invalid_argument("undefined TraversalSpec name"))?;

        // reserve the slot first so self-references resolve to it
        let index = self.push(spec);
        self.indices.insert(name, index);
        self.nodes[index].next = self.selection(&spec.select_set)?;
        Ok(index)
    }

    fn node(
        &mut self,
        spec: &'a TraversalSpec,
    ) -> FaultResult<usize> {
        let index = self.push(spec);
        self.nodes[index].next = self.selection(&spec.select_set)?;
        Ok(index)
    }

    fn push(
        &mut self,
        spec: &TraversalSpec,
    ) -> usize {
        self.nodes.push(TraversalNode {
            kind: spec.kind.clone(),
            path: Field::parse(&spec.path),
            skip: spec.skip.unwrap_or(false),
            next: Vec::new(),
        });
        self.nodes.len() - 1
    }
}
