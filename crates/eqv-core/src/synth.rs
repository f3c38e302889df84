//! Instance synthesizer — builds objects without running construction logic
//!
//! Every member is assigned directly from its cached red/black pair (or an
//! explicit value), so invalid-by-construction combinations are reachable.
//! Instances are immutable: "mutating" a member always yields a new instance
//! with a new identity, which is how checkers build mutation twins.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{Pair, Side, ValueCache};
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::generator;
use crate::registry::{RecordLayout, ResolvedEquality, TypeRegistry};
use crate::types::TypeId;
use crate::value::{Object, Value};

// ── Blueprint ─────────────────────────────────────────────

/// Everything needed to stamp out objects of one record type
#[derive(Clone)]
pub(crate) struct Blueprint {
    runtime: TypeId,
    ancestors: Arc<[TypeId]>,
    equality: ResolvedEquality,
}

impl Blueprint {
    /// Resolve runtime type, lineage and behavior for a record layout.
    ///
    /// Abstract records are instantiated as an anonymous concrete subtype.
    pub(crate) fn resolve(registry: &TypeRegistry, layout: &RecordLayout) -> Result<Self> {
        let equality = registry.equality_of(&layout.id)?.ok_or_else(|| {
            Error::synthesis(
                &layout.id,
                "equality is abstract and no viable subtype implements it",
            )
        })?;
        let (runtime, ancestors) = if layout.is_abstract {
            let mut lineage = vec![layout.id.clone()];
            lineage.extend(layout.ancestors.iter().cloned());
            (layout.id.concrete(), lineage)
        } else {
            (layout.id.clone(), layout.ancestors.clone())
        };
        Ok(Blueprint {
            runtime,
            ancestors: Arc::from(ancestors),
            equality,
        })
    }

    pub(crate) fn instantiate(&self, fields: BTreeMap<String, Value>) -> Object {
        Object::new(
            self.runtime.clone(),
            self.ancestors.clone(),
            fields,
            self.equality.behavior.clone(),
            self.equality.owner.clone(),
        )
    }
}

// ── Instance ──────────────────────────────────────────────

/// Which value a member of an instance holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Red,
    Black,
    /// Neither cached value (e.g. `null`, or a copy of the red value)
    Explicit,
}

/// A synthesized object plus the record of what each member was assigned
#[derive(Debug, Clone)]
pub struct Instance {
    object: Object,
    assignments: BTreeMap<String, Assignment>,
}

impl Instance {
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// The instance as a value, for passing to `equals`
    pub fn value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.object.get(member)
    }

    pub fn assignment(&self, member: &str) -> Option<Assignment> {
        self.assignments.get(member).copied()
    }

    /// The single member in which `other` differs, if it is a mutation twin
    pub fn twin_member(&self, other: &Instance) -> Option<&str> {
        let mut differing = self
            .object
            .fields()
            .iter()
            .filter(|(name, value)| other.get(name) != Some(*value))
            .map(|(name, _)| name.as_str());
        match (differing.next(), differing.next()) {
            (Some(name), None) => Some(name),
            _ => None,
        }
    }

    pub fn equals(&self, other: &Instance) -> crate::value::Outcome<bool> {
        self.object.equals(&other.value())
    }

    pub fn describe(&self) -> String {
        self.object.describe()
    }
}

// ── Synthesizer ───────────────────────────────────────────

/// Builds instances of the type under test
#[derive(Clone)]
pub struct Synthesizer {
    type_id: TypeId,
    blueprint: Blueprint,
    members: Vec<String>,
    pairs: BTreeMap<String, Pair>,
}

impl Synthesizer {
    /// Resolve the blueprint and every member's pair.
    ///
    /// # Errors
    /// Generation errors for a member are wrapped with that member's name;
    /// `SynthesisError` when the type has no instantiable form.
    pub fn prepare(
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
        cache: &mut ValueCache,
    ) -> Result<Self> {
        let layout = registry.layout(&descriptor.expr)?;
        let blueprint = Blueprint::resolve(registry, &layout)?;
        let mut pairs = BTreeMap::new();
        for member in &descriptor.members {
            let pair = generator::get_or_generate(registry, cache, &member.declared_type)
                .map_err(|e| e.in_member(&member.name))?;
            pairs.insert(member.name.clone(), pair);
        }
        Ok(Synthesizer {
            type_id: descriptor.type_id.clone(),
            blueprint,
            members: descriptor.members.iter().map(|m| m.name.clone()).collect(),
            pairs,
        })
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    /// Runtime type of synthesized instances
    pub fn runtime_type(&self) -> &TypeId {
        &self.blueprint.runtime
    }

    pub fn pair(&self, member: &str) -> Option<&Pair> {
        self.pairs.get(member)
    }

    /// Build an instance from explicit member values; the rest take red.
    pub fn synthesize(&self, member_values: &BTreeMap<String, Value>) -> Result<Instance> {
        if let Some(unknown) = member_values.keys().find(|k| !self.pairs.contains_key(*k)) {
            return Err(Error::synthesis(
                &self.type_id,
                format!("no member named '{}'", unknown),
            ));
        }
        let mut fields = BTreeMap::new();
        let mut assignments = BTreeMap::new();
        for name in &self.members {
            let pair = &self.pairs[name];
            let value = member_values
                .get(name)
                .cloned()
                .unwrap_or_else(|| pair.red.clone());
            assignments.insert(name.clone(), classify(pair, &value));
            fields.insert(name.clone(), value);
        }
        Ok(Instance {
            object: self.blueprint.instantiate(fields),
            assignments,
        })
    }

    /// Every member set to the same side of its pair
    pub fn synthesize_side(&self, side: Side) -> Instance {
        let mut fields = BTreeMap::new();
        let mut assignments = BTreeMap::new();
        for name in &self.members {
            fields.insert(name.clone(), self.pairs[name].side(side).clone());
            assignments.insert(
                name.clone(),
                match side {
                    Side::Red => Assignment::Red,
                    Side::Black => Assignment::Black,
                },
            );
        }
        Instance {
            object: self.blueprint.instantiate(fields),
            assignments,
        }
    }

    /// Mutation twin: `instance` with one member replaced
    pub fn clone_with_override(
        &self,
        instance: &Instance,
        member: &str,
        value: Value,
    ) -> Result<Instance> {
        let pair = self.pairs.get(member).ok_or_else(|| {
            Error::synthesis(&self.type_id, format!("no member named '{}'", member))
        })?;
        let mut assignments = instance.assignments.clone();
        assignments.insert(member.to_string(), classify(pair, &value));
        Ok(Instance {
            object: instance.object.with_field(member, value),
            assignments,
        })
    }

    /// Mutation twin with `member` flipped to the other side of its pair
    pub fn toggle(&self, instance: &Instance, member: &str) -> Result<Instance> {
        let pair = self.pairs.get(member).ok_or_else(|| {
            Error::synthesis(&self.type_id, format!("no member named '{}'", member))
        })?;
        let next = match instance.assignment(member) {
            Some(Assignment::Black) => pair.red.clone(),
            _ => pair.black.clone(),
        };
        self.clone_with_override(instance, member, next)
    }

    /// Same member values, different identity
    pub fn clone_identical(&self, instance: &Instance) -> Instance {
        Instance {
            object: instance.object.copy(),
            assignments: instance.assignments.clone(),
        }
    }

    /// Same member values as an instance of an anonymous subtype that
    /// inherits this type's behavior
    pub fn synthesize_subtype(&self, instance: &Instance) -> Instance {
        let mut lineage = vec![self.blueprint.runtime.clone()];
        lineage.extend(self.blueprint.ancestors.iter().cloned());
        Instance {
            object: instance
                .object
                .retyped(self.blueprint.runtime.subtype(), Arc::from(lineage)),
            assignments: instance.assignments.clone(),
        }
    }
}

fn classify(pair: &Pair, value: &Value) -> Assignment {
    if *value == pair.red {
        Assignment::Red
    } else if *value == pair.black {
        Assignment::Black
    } else {
        Assignment::Explicit
    }
}
