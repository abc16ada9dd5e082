//! The patch engine: a canonical sparse byte-diff type plus two on-disk
//! codecs for it (binary IPS in [`ips`], a readable text form in
//! [`ipst`]). Grounded on this codebase's `id1::flag` bitmap-over-addresses
//! shape — a `Patch` is the same idea applied to byte values instead of
//! flag bits.

pub mod ips;
pub mod ipst;

use std::collections::BTreeMap;

use crate::error::{Result, RomError};

/// One physical record as it appeared in a decoded IPS/IPST source: its
/// offset, length and whether it was an RLE run or a literal byte string.
/// Carried alongside `edits` purely so `to_ips`/`to_ipst` can reproduce the
/// exact original framing instead of re-deriving literal-vs-RLE from
/// scratch; any operation that changes the edit set (`diff`, `merge`,
/// `filter_against`) drops it, since the original framing no longer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub offset: u32,
    pub len: u32,
    pub rle: bool,
}

/// A sparse set of byte edits, keyed by absolute offset into the target
/// image. Never stores an edit that doesn't change anything relative to
/// the buffer it was diffed against.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    edits: BTreeMap<u32, u8>,
    frames: Option<Vec<Frame>>,
}

impl PartialEq for Patch {
    /// Compares only the logical edit set; original record framing (when
    /// present) is incidental to what a patch means.
    fn eq(&self, other: &Self) -> bool {
        self.edits == other.edits
    }
}

impl Eq for Patch {}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edits(edits: BTreeMap<u32, u8>) -> Self {
        Self { edits, frames: None }
    }

    /// Builds a patch that remembers the original record shape it was
    /// decoded from, so re-encoding can reproduce it exactly.
    pub(crate) fn from_edits_with_frames(edits: BTreeMap<u32, u8>, frames: Vec<Frame>) -> Self {
        Self { edits, frames: Some(frames) }
    }

    pub(crate) fn frames(&self) -> Option<&[Frame]> {
        self.frames.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn get(&self, offset: u32) -> Option<u8> {
        self.edits.get(&offset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.edits.iter().map(|(&offset, &value)| (offset, value))
    }

    /// Every byte where `after` differs from `before`. A byte present only
    /// in `after` (i.e. `after` is longer) counts as changed; a byte
    /// present only in `before` has nothing to record, since a `Patch`
    /// only ever overwrites existing bytes, never truncates.
    pub fn diff(before: &[u8], after: &[u8]) -> Self {
        let edits = after
            .iter()
            .enumerate()
            .filter(|&(i, &b)| before.get(i) != Some(&b))
            .map(|(i, &b)| (i as u32, b))
            .collect();
        Self { edits, frames: None }
    }

    /// Applies every edit to `buf` in place. An edit past the end of `buf`
    /// is fatal: this patch engine never grows the image.
    pub fn apply(&self, buf: &mut [u8]) -> Result<()> {
        for (&offset, &value) in &self.edits {
            let index = offset as usize;
            if index >= buf.len() {
                return Err(RomError::PatchExpandsRom { offset: offset as u64, image_len: buf.len() });
            }
            buf[index] = value;
        }
        Ok(())
    }

    /// Combines two patches; where both touch the same offset, `other`'s
    /// edit wins, matching last-writer-wins application order.
    pub fn merge(&self, other: &Patch) -> Patch {
        let mut edits = self.edits.clone();
        edits.extend(other.edits.iter().map(|(&k, &v)| (k, v)));
        Patch { edits, frames: None }
    }

    pub fn from_ips(bytes: &[u8]) -> Result<Patch> {
        ips::decode(bytes)
    }

    pub fn to_ips(&self) -> Result<Vec<u8>> {
        ips::encode(self)
    }

    pub fn from_ipst(text: &str) -> Result<Patch> {
        ipst::decode(text)
    }

    pub fn to_ipst(&self) -> String {
        ipst::encode(self)
    }

    /// Drops edits that would be no-ops against `baseline` — the same
    /// value is already there. Applying the result to `baseline` is
    /// idempotent with applying `self`, and repeated `filter_against` of
    /// an already-filtered patch returns an identical patch.
    pub fn filter_against(&self, baseline: &[u8]) -> Patch {
        let edits = self
            .edits
            .iter()
            .filter(|&(&offset, &value)| baseline.get(offset as usize) != Some(&value))
            .map(|(&k, &v)| (k, v))
            .collect();
        Patch { edits, frames: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_then_apply_round_trips() {
        let before = b"hello world".to_vec();
        let after = b"hellX world".to_vec();
        let patch = Patch::diff(&before, &after);
        assert_eq!(patch.len(), 1);
        let mut buf = before.clone();
        patch.apply(&mut buf).unwrap();
        assert_eq!(buf, after);
    }

    #[test]
    fn apply_past_end_is_fatal() {
        let mut edits = BTreeMap::new();
        edits.insert(10, 0xFF);
        let patch = Patch::from_edits(edits);
        let mut buf = vec![0u8; 4];
        assert!(matches!(patch.apply(&mut buf), Err(RomError::PatchExpandsRom { .. })));
    }

    #[test]
    fn merge_prefers_the_later_patch() {
        let mut a = BTreeMap::new();
        a.insert(0, 1);
        let mut b = BTreeMap::new();
        b.insert(0, 2);
        let merged = Patch::from_edits(a).merge(&Patch::from_edits(b));
        assert_eq!(merged.get(0), Some(2));
    }

    #[test]
    fn filter_against_drops_no_op_edits() {
        let baseline = vec![5u8, 5, 5];
        let mut edits = BTreeMap::new();
        edits.insert(0, 5); // no-op
        edits.insert(1, 9); // real change
        let patch = Patch::from_edits(edits).filter_against(&baseline);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get(1), Some(9));
    }

    #[test]
    fn filter_against_is_idempotent() {
        let baseline = vec![0u8; 4];
        let mut edits = BTreeMap::new();
        edits.insert(2, 7);
        let patch = Patch::from_edits(edits);
        let once = patch.filter_against(&baseline);
        let twice = once.filter_against(&baseline);
        assert_eq!(once, twice);
    }
}
