//! Rendering and subtype checks

use super::{CheckContext, CheckerId, Note, Probe, Step};

/// Rendering the red and black instances never raises
pub(super) fn string_representation(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::StringRepresentation);
    for base in ctx.bases() {
        probe.render(&base, None)?;
    }
    Ok(())
}

/// An open type whose equality can be redefined must not consider an
/// instance of a trivial subtype equal to its own instances.
///
/// Skipped for final types, final equality, and relaxed inheritance.
pub(super) fn inheritance_safety(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let descriptor = ctx.descriptor;
    if !descriptor.open_to_redefinition() || ctx.config.relaxed_inheritance {
        tracing::debug!(
            type_id = %descriptor.type_id,
            is_final = descriptor.is_final,
            equality_final = descriptor.equality_final,
            relaxed = ctx.config.relaxed_inheritance,
            "inheritance safety not applicable"
        );
        return Ok(());
    }

    let probe = Probe::new(CheckerId::InheritanceSafety);
    for base in ctx.bases() {
        let sub = ctx.synth.synthesize_subtype(&base);
        let mut others = vec![ctx.synth.clone_identical(&base)];
        for member in ctx.candidates() {
            others.push(ctx.synth.toggle(&base, member)?);
        }
        for other in std::iter::once(&base).chain(&others) {
            if probe.equals(&sub, other)? || probe.equals(other, &sub)? {
                return Err(probe.fail(
                    other.twin_member(&base),
                    format!(
                        "{} is equal to an instance of a trivial subtype with equal members ({}). \
                         Make the type or its equality final, or relax inheritance checks",
                        other.describe(),
                        sub.object().type_id()
                    ),
                ));
            }
        }
    }
    Ok(())
}
