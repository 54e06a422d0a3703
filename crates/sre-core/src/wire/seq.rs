//! Shard sequence
//!
//! An arena of shards owned by one wire (or by a nested-sequence shard).
//! Entries are addressed by [`ShardHandle`]s that carry the id of the owning
//! sequence, so a handle cannot be used against another sequence. While a
//! wire runs the sequence it is claimed; a second claimant is rejected.
//!
//! Activation keeps a resume cursor: when a shard suspends, the index and
//! the input it was given are stored, and the next activation of the
//! sequence re-enters that shard with the same input.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{SreError, SreResult};
use crate::shard::{Flow, Shard, Wake};
use crate::value::{DeepClone, Value};

use super::context::Context;

static NEXT_SEQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardHandle {
    owner: u64,
    id: u64,
}

struct Entry {
    id: u64,
    shard: Box<dyn Shard>,
    warmed: bool,
}

struct ResumePoint {
    index: usize,
    input: Value,
}

/// What a nested `Return` does to the sequence running it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnPolicy {
    /// Hand the `Return` to the caller
    Propagate,
    /// Treat it as normal completion
    Swallow,
}

#[derive(Debug)]
pub enum SeqOutcome {
    /// Every shard ran, or a swallowed `Return`
    Done(Value),
    Returned(Value),
    Stopped(Value),
    Restarted,
    Suspended(Wake),
}

pub struct ShardSeq {
    id: u64,
    next_entry: u64,
    entries: Vec<Entry>,
    resume: Option<ResumePoint>,
    owner: Option<String>,
}

impl Default for ShardSeq {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardSeq {
    pub fn new() -> Self {
        ShardSeq {
            id: NEXT_SEQ_ID.fetch_add(1, Ordering::Relaxed),
            next_entry: 0,
            entries: Vec::new(),
            resume: None,
            owner: None,
        }
    }

    pub fn from_shards(shards: impl IntoIterator<Item = Box<dyn Shard>>) -> Self {
        let mut seq = Self::new();
        for shard in shards {
            seq.push_unchecked(shard);
        }
        seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.shard.name()).collect()
    }

    pub(crate) fn push_unchecked(&mut self, shard: Box<dyn Shard>) -> ShardHandle {
        let id = self.next_entry;
        self.next_entry += 1;
        self.entries.push(Entry {
            id,
            shard,
            warmed: false,
        });
        ShardHandle { owner: self.id, id }
    }

    pub fn push(&mut self, shard: Box<dyn Shard>) -> SreResult<ShardHandle> {
        self.ensure_unclaimed()?;
        Ok(self.push_unchecked(shard))
    }

    /// Take a shard out of the sequence; it is not destroyed
    pub fn remove(&mut self, handle: ShardHandle) -> SreResult<Box<dyn Shard>> {
        self.ensure_unclaimed()?;
        let index = self.position(handle)?;
        Ok(self.entries.remove(index).shard)
    }

    pub fn get(&self, handle: ShardHandle) -> SreResult<&dyn Shard> {
        let index = self.position(handle)?;
        Ok(self.entries[index].shard.as_ref())
    }

    pub fn get_mut(&mut self, handle: ShardHandle) -> SreResult<&mut (dyn Shard + 'static)> {
        self.ensure_unclaimed()?;
        let index = self.position(handle)?;
        Ok(self.entries[index].shard.as_mut())
    }

    fn position(&self, handle: ShardHandle) -> SreResult<usize> {
        if handle.owner != self.id {
            return Err(SreError::ForeignShardHandle);
        }
        self.entries
            .iter()
            .position(|e| e.id == handle.id)
            .ok_or(SreError::ForeignShardHandle)
    }

    pub(crate) fn shards_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Shard>> {
        self.entries.iter_mut().map(|e| &mut e.shard)
    }

    fn ensure_unclaimed(&self) -> SreResult<()> {
        match &self.owner {
            Some(owner) => Err(SreError::AlreadyOwned(owner.clone())),
            None => Ok(()),
        }
    }

    /// Mark the sequence as run by `owner`
    pub fn claim(&mut self, owner: &str) -> SreResult<()> {
        self.ensure_unclaimed()?;
        self.owner = Some(owner.to_string());
        Ok(())
    }

    pub fn unclaim(&mut self) {
        self.owner = None;
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_suspended(&self) -> bool {
        self.resume.is_some()
    }

    /// Warm up every shard in order. On failure the shards warmed so far are
    /// cleaned up in reverse order before the error is returned.
    pub fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        for index in 0..self.entries.len() {
            let entry = &mut self.entries[index];
            tracing::trace!(shard = entry.shard.name(), "warm up");
            match entry.shard.warm_up(ctx) {
                Ok(()) => entry.warmed = true,
                Err(error) => {
                    let shard = entry.shard.name();
                    // the failing shard may hold partial resources
                    entry.shard.clean_up(ctx);
                    self.clean_up(ctx);
                    return Err(match error {
                        e @ SreError::WarmUp { .. } => e,
                        other => SreError::WarmUp {
                            shard,
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    /// Clean up warmed shards, newest first, and drop any resume cursor
    pub fn clean_up(&mut self, ctx: &mut Context<'_>) {
        self.resume = None;
        for entry in self.entries.iter_mut().rev() {
            if entry.warmed {
                entry.shard.clean_up(ctx);
                entry.warmed = false;
            }
        }
    }

    /// Run the sequence on `input`, or continue a suspended run.
    pub fn activate(
        &mut self,
        ctx: &mut Context<'_>,
        input: &Value,
        policy: ReturnPolicy,
    ) -> SreResult<SeqOutcome> {
        let mut index = 0;
        let mut owned: Option<Value> = None;
        if let Some(point) = self.resume.take() {
            index = point.index;
            owned = Some(point.input);
        }

        while index < self.entries.len() {
            if ctx.stop_requested() {
                return Ok(SeqOutcome::Stopped(take_current(owned, input)));
            }
            let flow = {
                let current = owned.as_ref().unwrap_or(input);
                self.entries[index].shard.activate(ctx, current)?
            };
            match flow {
                Flow::Continue(output) => {
                    owned = Some(output);
                    index += 1;
                }
                Flow::Return => {
                    let result = take_current(owned, input);
                    return Ok(match policy {
                        ReturnPolicy::Propagate => SeqOutcome::Returned(result),
                        ReturnPolicy::Swallow => SeqOutcome::Done(result),
                    });
                }
                Flow::Stop => return Ok(SeqOutcome::Stopped(take_current(owned, input))),
                Flow::Restart => return Ok(SeqOutcome::Restarted),
                Flow::Suspend(wake) => {
                    self.resume = Some(ResumePoint {
                        index,
                        input: take_current(owned, input),
                    });
                    return Ok(SeqOutcome::Suspended(wake));
                }
            }
        }
        Ok(SeqOutcome::Done(take_current(owned, input)))
    }
}

fn take_current(owned: Option<Value>, input: &Value) -> Value {
    owned.unwrap_or_else(|| input.deep_clone())
}

impl Drop for ShardSeq {
    fn drop(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            entry.shard.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::builtin::{Const, Pass};

    #[test]
    fn handles_are_bound_to_their_sequence() {
        let mut a = ShardSeq::new();
        let mut b = ShardSeq::new();
        let ha = a.push(Box::new(Const::new(Value::Int(1)))).expect("push");
        b.push(Box::new(Pass)).expect("push");

        assert!(a.get(ha).is_ok());
        assert!(matches!(b.get(ha), Err(SreError::ForeignShardHandle)));
        assert!(matches!(b.remove(ha), Err(SreError::ForeignShardHandle)));

        let removed = a.remove(ha).expect("remove");
        assert_eq!(removed.name(), "Const");
        assert!(matches!(a.get(ha), Err(SreError::ForeignShardHandle)));
    }

    #[test]
    fn a_claimed_sequence_rejects_a_second_owner() {
        let mut seq = ShardSeq::new();
        seq.claim("first").expect("claim");
        match seq.claim("second") {
            Err(SreError::AlreadyOwned(owner)) => assert_eq!(owner, "first"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(seq.push(Box::new(Pass)).is_err());
        seq.unclaim();
        assert!(seq.push(Box::new(Pass)).is_ok());
    }
}
