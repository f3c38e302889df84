//! Equivalence-relation checks: null and foreign arguments, reflexivity,
//! symmetry and transitivity

use super::{CheckContext, CheckerId, Failure, FailureKind, Note, Probe, Step};
use crate::synth::Instance;
use crate::value::Value;

/// `x.equals(null)` must answer `false` without raising
pub(super) fn non_nullity(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::NonNullity);
    for base in ctx.bases() {
        match base.object().equals(&Value::Null) {
            Ok(false) => {}
            Ok(true) => return Err(probe.fail(None, "true returned for null value")),
            Err(raised) => {
                let detail = format!("equals throws {} when passed null", raised.kind);
                return Err(Failure::violation(CheckerId::NonNullity, detail)
                    .with_kind(FailureKind::NullRejection)
                    .caused_by(raised)
                    .into());
            }
        }
    }
    Ok(())
}

/// `x.equals(unrelated)` must answer `false` without raising
pub(super) fn type_discrimination(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::TypeDiscrimination);
    for base in ctx.bases() {
        match base.object().equals(&ctx.unrelated) {
            Ok(false) => {}
            Ok(true) => {
                return Err(probe.fail(None, "equals returns true for an object of an unrelated type"))
            }
            Err(raised) => {
                let detail = format!("equals throws {}", raised.kind);
                return Err(Failure::violation(CheckerId::TypeDiscrimination, detail)
                    .with_kind(FailureKind::TypeMismatchRejection)
                    .caused_by(raised)
                    .into());
            }
        }
    }
    Ok(())
}

/// Every instance equals itself; identical copies are equal unless the
/// configuration says otherwise
pub(super) fn reflexivity(ctx: &CheckContext<'_>, notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::Reflexivity);
    let mut tolerated = false;
    for base in ctx.bases() {
        if !probe.equals(&base, &base)? {
            return Err(probe.fail(
                None,
                format!("object does not equal itself: {}", base.describe()),
            ));
        }

        let copy = ctx.synth.clone_identical(&base);
        let equal_to_copy = probe.equals(&base, &copy)?;
        if ctx.config.identical_copy {
            if equal_to_copy {
                return Err(probe.fail(
                    None,
                    format!(
                        "unnecessary identical-copy allowance, two identical copies are equal: {}",
                        base.describe()
                    ),
                ));
            }
        } else if !equal_to_copy {
            if ctx.config.versioned_entity {
                if tolerated {
                    continue;
                }
                tolerated = true;
                tracing::debug!(object = %base.describe(), "identical copy unequal; tolerated for versioned entity");
                notes.push(Note {
                    checker: CheckerId::Reflexivity,
                    member: None,
                    message: format!(
                        "object does not equal an identical copy of itself ({}); tolerated for a versioned entity",
                        base.describe()
                    ),
                });
                continue;
            }
            return Err(probe.fail(
                None,
                format!(
                    "object does not equal an identical copy of itself: {}. \
                     If this is intentional, allow identical copies to differ",
                    base.describe()
                ),
            ));
        }
    }
    Ok(())
}

/// `a.equals(b) == b.equals(a)` across copies, the opposite base and every
/// single-member twin
pub(super) fn symmetry(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::Symmetry);
    let [red, black] = ctx.bases();
    check_symmetric(&probe, &red, &black)?;
    for base in [red, black] {
        check_symmetric(&probe, &base, &ctx.synth.clone_identical(&base))?;
        for member in ctx.candidates() {
            let twin = ctx.synth.toggle(&base, member)?;
            check_symmetric(&probe, &base, &twin)?;
        }
    }
    Ok(())
}

fn check_symmetric(probe: &Probe, a: &Instance, b: &Instance) -> Step {
    let forward = probe.equals(a, b)?;
    let backward = probe.equals(b, a)?;
    if forward != backward {
        return Err(probe.fail(
            a.twin_member(b),
            format!(
                "{} equals {} is {}, but the reverse is {}",
                a.describe(),
                b.describe(),
                forward,
                backward
            ),
        ));
    }
    Ok(())
}

/// `a = b` and `b = c` imply `a = c`, over chains of single-member twins
pub(super) fn transitivity(ctx: &CheckContext<'_>, _notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::Transitivity);
    let members = ctx.candidates();
    for a in ctx.bases() {
        for first in &members {
            let b = ctx.synth.toggle(&a, first)?;
            if !probe.equals(&a, &b)? {
                continue;
            }
            for second in members.iter().filter(|m| *m != first) {
                let c = ctx.synth.toggle(&b, second)?;
                if probe.equals(&b, &c)? && !probe.equals(&a, &c)? {
                    return Err(probe.fail(
                        Some(*second),
                        format!(
                            "{} equals {} and {}, but the last two are not equal \
                             (members '{}' and '{}')",
                            b.describe(),
                            a.describe(),
                            c.describe(),
                            first,
                            second
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}
