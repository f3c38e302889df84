//! Member-level checks
//!
//! Which members equality reads, and whether those members are safe to read:
//! final, persisted, nullable without raising, compared by value.

use super::{CheckContext, CheckerId, Note, Probe, Step};
use crate::value::Value;

/// Every non-excluded member changes the equality outcome when toggled;
/// excluded members change neither equality nor hash
pub(super) fn significant_fields(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::SignificantFields);
    let bases = ctx.bases();

    for member in &ctx.descriptor.members {
        let name = member.name.as_str();
        let mut used = false;
        for base in &bases {
            let twin = ctx.synth.toggle(base, name)?;
            let equal = probe.equals(base, &twin)?;
            if !member.is_excluded {
                used |= !equal;
                continue;
            }
            if !equal {
                return Err(probe.fail(
                    Some(name),
                    format!("equals relies on '{}', but it is excluded", name),
                ));
            }
            if probe.hash(base, Some(name))? != probe.hash(&twin, Some(name))? {
                return Err(probe.fail(
                    Some(name),
                    format!("hashCode relies on '{}', but it is excluded", name),
                ));
            }
        }
        if !member.is_excluded && !used {
            return Err(probe.fail(
                Some(name),
                format!("equals does not use '{}', or it is stateless", name),
            ));
        }
    }
    Ok(())
}

/// Significant members must be final
pub(super) fn mutability(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::Mutability);
    match ctx
        .descriptor
        .significant()
        .find(|m| !m.is_excluded && !m.is_final)
    {
        Some(member) => Err(probe.fail(
            Some(member.name.as_str()),
            format!("equals depends on mutable member '{}'", member.name),
        )),
        None => Ok(()),
    }
}

/// Significant members must not be transient
pub(super) fn transience(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::Transience);
    match ctx
        .descriptor
        .significant()
        .find(|m| !m.is_excluded && m.is_transient)
    {
        Some(member) => Err(probe.fail(
            Some(member.name.as_str()),
            format!(
                "'{}' is transient and should not be included in equals/hashCode",
                member.name
            ),
        )),
        None => Ok(()),
    }
}

/// A `null` in any nullable member survives equals, hash and render
pub(super) fn null_fields(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::NullFields);
    let nullable = ctx
        .descriptor
        .members
        .iter()
        .filter(|m| m.declared_type.is_nullable());

    for member in nullable {
        let name = Some(member.name.as_str());
        for base in ctx.bases() {
            let holed = ctx.synth.clone_with_override(&base, &member.name, Value::Null)?;
            let copy = ctx.synth.clone_identical(&holed);
            probe.equals_value(&holed, &base.value(), name)?;
            probe.equals_value(&base, &holed.value(), name)?;
            probe.equals_value(&holed, &copy.value(), name)?;
            probe.hash(&holed, name)?;
            probe.render(&holed, name)?;
        }
    }
    Ok(())
}

/// Object-valued members are compared with their own equality, not by
/// reference
pub(super) fn reference_equality(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::ReferenceEquality);
    for member in ctx.candidates() {
        for base in ctx.bases() {
            let Some(Value::Object(held)) = base.get(member) else {
                continue;
            };
            let copy = Value::Object(held.copy());
            // only meaningful when the member's own type calls the copy equal
            if held.equals(&copy) != Ok(true) {
                continue;
            }
            let twin = ctx.synth.clone_with_override(&base, member, copy)?;
            if !probe.equals(&base, &twin)? {
                return Err(probe.fail(
                    Some(member),
                    format!(
                        "equals does not use equals() for member '{}'; an equal copy of {} \
                         makes the objects unequal",
                        member,
                        held.describe()
                    ),
                ));
            }
        }
    }
    Ok(())
}
