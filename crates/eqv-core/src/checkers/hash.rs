//! Hash/equality coherence

use std::collections::BTreeMap;

use super::{CheckContext, CheckerId, Note, Probe, Step};
use crate::synth::Instance;

/// Mutually unequal instances sharing one hash before the hash is called degenerate
const DEGENERATE_GROUP: usize = 3;

/// Equal instances hash equally; a raising hash is a violation
pub(super) fn hash_coherence(ctx: &CheckContext<'_>, notes: &mut Vec<Note>) -> Step {
    let probe = Probe::new(CheckerId::HashCoherence);
    let mut sample: Vec<Instance> = Vec::new();

    for base in ctx.bases() {
        let mut related = vec![ctx.synth.clone_identical(&base)];
        for member in &ctx.descriptor.members {
            related.push(ctx.synth.toggle(&base, &member.name)?);
        }

        let base_hash = probe.hash(&base, None)?;
        for other in &related {
            if !probe.equals(&base, other)? {
                continue;
            }
            let member = base.twin_member(other);
            let other_hash = probe.hash(other, member)?;
            if base_hash == other_hash {
                continue;
            }
            let detail = match member {
                Some(name) => format!(
                    "hashCode relies on '{}', but equals does not: {} and {} are equal \
                     but hash to {} and {}",
                    name,
                    base.describe(),
                    other.describe(),
                    base_hash,
                    other_hash
                ),
                None => format!(
                    "hashCodes should be equal: {} and {} are equal but hash to {} and {}",
                    base.describe(),
                    other.describe(),
                    base_hash,
                    other_hash
                ),
            };
            return Err(probe.fail(member, detail));
        }

        sample.push(base);
        sample.extend(related);
    }

    note_degenerate_hash(&probe, &sample, notes)
}

fn note_degenerate_hash(probe: &Probe, sample: &[Instance], notes: &mut Vec<Note>) -> Step {
    let mut by_hash: BTreeMap<i64, Vec<&Instance>> = BTreeMap::new();
    for instance in sample {
        by_hash.entry(probe.hash(instance, None)?).or_default().push(instance);
    }

    for (hash, group) in by_hash {
        if group.len() < DEGENERATE_GROUP {
            continue;
        }
        let mut unequal: Vec<&Instance> = Vec::new();
        for candidate in group {
            let mut fresh = true;
            for kept in &unequal {
                if probe.equals(kept, candidate)? {
                    fresh = false;
                    break;
                }
            }
            if fresh {
                unequal.push(candidate);
            }
        }
        if unequal.len() >= DEGENERATE_GROUP {
            tracing::debug!(hash, instances = unequal.len(), "degenerate hash sample");
            notes.push(Note {
                checker: CheckerId::HashCoherence,
                member: None,
                message: format!(
                    "{} mutually unequal instances share hash code {}; the hash function may be degenerate",
                    unequal.len(),
                    hash
                ),
            });
            break;
        }
    }
    Ok(())
}
