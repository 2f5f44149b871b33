//! Lookup table from archetype id to its schema and cash flow builder.

use serde::Serialize;
use serde_json::Value;

use crate::archetypes::{CashFlowBuild, CashFlowModel};
use crate::config::ProjectionOptions;
use crate::error::ProFormaError;
use crate::schema::FieldSpec;
use crate::ProFormaResult;

/// Discovery record for one archetype.
#[derive(Debug, Clone, Serialize)]
pub struct ArchetypeDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub methodology: &'static str,
    pub fields: &'static [FieldSpec],
    pub example_inputs: Value,
}

/// A validated assumption set (as JSON) and the build it produced.
#[derive(Debug, Clone)]
pub struct ValidatedBuild {
    pub assumptions: Value,
    pub build: CashFlowBuild,
}

type DescribeFn = fn() -> ArchetypeDescriptor;
type RunFn = fn(&Value, &ProjectionOptions) -> ProFormaResult<ValidatedBuild>;

#[derive(Clone, Copy)]
struct ArchetypeEntry {
    id: &'static str,
    describe: DescribeFn,
    run: RunFn,
}

fn describe<M: CashFlowModel>() -> ArchetypeDescriptor {
    ArchetypeDescriptor {
        id: M::ID,
        name: M::NAME,
        description: M::DESCRIPTION,
        methodology: M::METHODOLOGY,
        fields: M::fields(),
        example_inputs: M::example_inputs(),
    }
}

fn run<M: CashFlowModel>(raw: &Value, options: &ProjectionOptions) -> ProFormaResult<ValidatedBuild> {
    let assumptions = M::validate(raw)?;
    let build = M::build(&assumptions, options)?;
    Ok(ValidatedBuild {
        assumptions: serde_json::to_value(&assumptions)?,
        build,
    })
}

/// Registered archetypes, in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<ArchetypeEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every archetype compiled into this build.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "saas")]
        registry.register::<crate::archetypes::saas::Saas>();
        #[cfg(feature = "solar")]
        registry.register::<crate::archetypes::solar::Solar>();
        #[cfg(feature = "consulting")]
        registry.register::<crate::archetypes::consulting::Consulting>();
        registry
    }

    /// Add `M`, replacing any archetype already registered under `M::ID`.
    pub fn register<M: CashFlowModel>(&mut self) -> &mut Self {
        let entry = ArchetypeEntry {
            id: M::ID,
            describe: describe::<M>,
            run: run::<M>,
        };
        match self.entries.iter_mut().find(|e| e.id == M::ID) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn describe(&self, id: &str) -> ProFormaResult<ArchetypeDescriptor> {
        self.entry(id).map(|e| (e.describe)())
    }

    pub fn descriptors(&self) -> Vec<ArchetypeDescriptor> {
        self.entries.iter().map(|e| (e.describe)()).collect()
    }

    /// Validate `raw` against archetype `id` and build its cash flows.
    pub fn run(&self, id: &str, raw: &Value, options: &ProjectionOptions) -> ProFormaResult<ValidatedBuild> {
        let entry = self.entry(id)?;
        (entry.run)(raw, options)
    }

    fn entry(&self, id: &str) -> ProFormaResult<&ArchetypeEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ProFormaError::UnknownArchetype(id.to_string()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("archetypes", &self.ids()).finish()
    }
}
